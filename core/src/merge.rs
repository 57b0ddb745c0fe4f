//! Combines an existing preference record with newly parsed fields.
//!
//! Scalar fields overwrite with provenance tracking; set fields union with
//! case-insensitive dedup. Marking an exercise to avoid always removes it
//! from the include list, and an avoided exercise can never re-enter the
//! include list through the same merge, so `include ∩ avoid = ∅` holds after
//! every call. The merge is idempotent: applying the same parse twice gives
//! the same record as applying it once.

use crate::preferences::{PartialPreferences, PreferenceRecord, SourceTag};

/// Union `incoming` into `base`, deduplicating case-insensitively while
/// keeping insertion order and first-seen casing.
fn union_ci(base: &[String], incoming: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(base.len() + incoming.len());
    let mut seen: Vec<String> = Vec::with_capacity(base.len() + incoming.len());
    for name in base.iter().chain(incoming.iter()) {
        let key = name.to_lowercase();
        if !seen.contains(&key) {
            seen.push(key);
            out.push(name.clone());
        }
    }
    out
}

fn remove_ci(base: &[String], to_remove: &[String]) -> Vec<String> {
    let removals: Vec<String> = to_remove.iter().map(|n| n.to_lowercase()).collect();
    base.iter()
        .filter(|name| !removals.contains(&name.to_lowercase()))
        .cloned()
        .collect()
}

/// Merge one set field under the absent-vs-cleared convention:
/// `None` leaves the field unchanged, `Some([])` clears it, `Some(names)`
/// unions case-insensitively.
fn merge_set(existing: &[String], parsed: Option<&Vec<String>>) -> Vec<String> {
    match parsed {
        None => existing.to_vec(),
        Some(names) if names.is_empty() => Vec::new(),
        Some(names) => union_ci(existing, names),
    }
}

/// Merge `parsed` into `existing` (or a fresh record when this is the first
/// turn). The step is carried over unchanged; callers advance it separately
/// through the transition table.
pub fn merge(existing: Option<&PreferenceRecord>, parsed: &PartialPreferences) -> PreferenceRecord {
    let base = existing.cloned().unwrap_or_default();
    let mut merged = PreferenceRecord { step: base.step, ..PreferenceRecord::new() };

    // Scalars: an explicit mention this turn wins; otherwise carry the old
    // value, downgrading explicit to inherited.
    match parsed.intensity {
        Some(value) => {
            merged.intensity = Some(value);
            merged.intensity_source = SourceTag::Explicit;
        }
        None => {
            merged.intensity = base.intensity;
            merged.intensity_source = match base.intensity_source {
                SourceTag::Explicit => SourceTag::Inherited,
                other => other,
            };
        }
    }
    match parsed.session_goal {
        Some(value) => {
            merged.session_goal = Some(value);
            merged.session_goal_source = SourceTag::Explicit;
        }
        None => {
            merged.session_goal = base.session_goal;
            merged.session_goal_source = match base.session_goal_source {
                SourceTag::Explicit => SourceTag::Inherited,
                other => other,
            };
        }
    }

    merged.muscle_targets = merge_set(&base.muscle_targets, parsed.muscle_targets.as_ref());
    merged.muscle_lessens = merge_set(&base.muscle_lessens, parsed.muscle_lessens.as_ref());
    merged.avoid_joints = merge_set(&base.avoid_joints, parsed.avoid_joints.as_ref());

    // Avoid wins: newly avoided names leave the include list before the
    // avoid union, and included names never cross into the avoid set.
    let mut includes = base.include_exercises.clone();
    let mut avoids = base.avoid_exercises.clone();
    if let Some(newly_avoided) = parsed.avoid_exercises.as_ref() {
        if newly_avoided.is_empty() {
            avoids = Vec::new();
        } else {
            includes = remove_ci(&includes, newly_avoided);
            avoids = union_ci(&avoids, newly_avoided);
        }
    }
    if let Some(newly_included) = parsed.include_exercises.as_ref() {
        if newly_included.is_empty() {
            includes = Vec::new();
        } else {
            includes = union_ci(&includes, newly_included);
        }
    }
    // An avoided name can never sit in the include list, whichever turn it
    // arrived on.
    merged.include_exercises = remove_ci(&includes, &avoids);
    merged.avoid_exercises = avoids;

    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preferences::{Intensity, SessionGoal};

    fn parsed_with_intensity(intensity: Intensity) -> PartialPreferences {
        PartialPreferences { intensity: Some(intensity), ..Default::default() }
    }

    #[test]
    fn first_turn_marks_mentioned_scalars_explicit() {
        let record = merge(None, &parsed_with_intensity(Intensity::High));
        assert_eq!(record.intensity, Some(Intensity::High));
        assert_eq!(record.intensity_source, SourceTag::Explicit);
        assert_eq!(record.session_goal, None);
        assert_eq!(record.session_goal_source, SourceTag::Default);
    }

    #[test]
    fn unmentioned_explicit_scalar_becomes_inherited() {
        let first = merge(None, &parsed_with_intensity(Intensity::High));
        let followup = PartialPreferences {
            session_goal: Some(SessionGoal::Stability),
            ..Default::default()
        };
        let second = merge(Some(&first), &followup);

        assert_eq!(second.intensity, Some(Intensity::High));
        assert_eq!(second.intensity_source, SourceTag::Inherited);
        assert_eq!(second.session_goal, Some(SessionGoal::Stability));
        assert_eq!(second.session_goal_source, SourceTag::Explicit);
    }

    #[test]
    fn inherited_stays_inherited_when_still_unmentioned() {
        let first = merge(None, &parsed_with_intensity(Intensity::Low));
        let second = merge(Some(&first), &PartialPreferences::default());
        let third = merge(Some(&second), &PartialPreferences::default());
        assert_eq!(third.intensity_source, SourceTag::Inherited);
        assert_eq!(third.intensity, Some(Intensity::Low));
    }

    #[test]
    fn set_fields_union_case_insensitively() {
        let first = merge(
            None,
            &PartialPreferences {
                muscle_targets: Some(vec!["Abs".into(), "glutes".into()]),
                ..Default::default()
            },
        );
        let second = merge(
            Some(&first),
            &PartialPreferences {
                muscle_targets: Some(vec!["abs".into(), "Back".into()]),
                ..Default::default()
            },
        );
        assert_eq!(second.muscle_targets, vec!["Abs", "glutes", "Back"]);
    }

    #[test]
    fn absent_list_is_unchanged_and_explicit_empty_clears() {
        let first = merge(
            None,
            &PartialPreferences {
                avoid_joints: Some(vec!["knee".into()]),
                ..Default::default()
            },
        );
        let untouched = merge(Some(&first), &PartialPreferences::default());
        assert_eq!(untouched.avoid_joints, vec!["knee"]);

        let cleared = merge(
            Some(&first),
            &PartialPreferences { avoid_joints: Some(Vec::new()), ..Default::default() },
        );
        assert!(cleared.avoid_joints.is_empty());
    }

    #[test]
    fn avoiding_an_included_exercise_removes_it_from_includes() {
        let first = merge(
            None,
            &PartialPreferences {
                include_exercises: Some(vec!["Bulgarian Split Squat".into()]),
                ..Default::default()
            },
        );
        let second = merge(
            Some(&first),
            &PartialPreferences {
                avoid_exercises: Some(vec!["Bulgarian Split Squat".into()]),
                ..Default::default()
            },
        );
        assert!(second.include_exercises.is_empty());
        assert_eq!(second.avoid_exercises, vec!["Bulgarian Split Squat"]);
    }

    #[test]
    fn including_an_avoided_exercise_does_not_unavoid_it() {
        let first = merge(
            None,
            &PartialPreferences {
                avoid_exercises: Some(vec!["Deadlift".into()]),
                ..Default::default()
            },
        );
        let second = merge(
            Some(&first),
            &PartialPreferences {
                include_exercises: Some(vec!["deadlift".into(), "Goblet Squat".into()]),
                ..Default::default()
            },
        );
        assert_eq!(second.include_exercises, vec!["Goblet Squat"]);
        assert_eq!(second.avoid_exercises, vec!["Deadlift"]);
    }

    #[test]
    fn include_and_avoid_stay_disjoint_across_update_sequences() {
        let turns = [
            PartialPreferences {
                include_exercises: Some(vec!["Deadlift".into(), "Bench Press".into()]),
                ..Default::default()
            },
            PartialPreferences {
                avoid_exercises: Some(vec!["bench press".into()]),
                ..Default::default()
            },
            PartialPreferences {
                include_exercises: Some(vec!["Bench Press".into(), "Row".into()]),
                avoid_exercises: Some(vec!["Deadlift".into()]),
                ..Default::default()
            },
        ];

        let mut record: Option<PreferenceRecord> = None;
        for parsed in &turns {
            let next = merge(record.as_ref(), parsed);
            for name in &next.include_exercises {
                assert!(
                    !next
                        .avoid_exercises
                        .iter()
                        .any(|a| a.eq_ignore_ascii_case(name)),
                    "{name} is in both include and avoid"
                );
            }
            record = Some(next);
        }
        let last = record.unwrap();
        assert_eq!(last.include_exercises, vec!["Row"]);
        assert_eq!(last.avoid_exercises, vec!["bench press", "Deadlift"]);
    }

    #[test]
    fn merge_is_idempotent() {
        let base = merge(
            None,
            &PartialPreferences {
                intensity: Some(Intensity::Moderate),
                include_exercises: Some(vec!["Deadlift".into()]),
                muscle_targets: Some(vec!["abs".into()]),
                ..Default::default()
            },
        );
        let parsed = PartialPreferences {
            intensity: Some(Intensity::High),
            session_goal: Some(SessionGoal::Strength),
            include_exercises: Some(vec!["Goblet Squat".into()]),
            avoid_exercises: Some(vec!["Deadlift".into()]),
            muscle_targets: Some(vec!["glutes".into()]),
            avoid_joints: Some(vec!["knee".into()]),
            ..Default::default()
        };

        let once = merge(Some(&base), &parsed);
        let twice = merge(Some(&once), &parsed);
        assert_eq!(once, twice);
    }
}
