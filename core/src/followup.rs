//! Composes the targeted follow-up question after the first collection turn,
//! and the confirmations sent after active-state amendments.

use crate::preferences::PreferenceRecord;
use crate::update::UpdatedField;

/// Fields worth asking about, in priority order. Session goal always leads
/// when missing; intensity is never asked (it has a sensible default).
fn fields_to_ask(preferences: &PreferenceRecord) -> Vec<UpdatedField> {
    let mut fields = Vec::new();

    if preferences.session_goal.is_none() {
        fields.push(UpdatedField::SessionGoal);
    }

    let candidates = [
        (UpdatedField::MuscleTargets, preferences.muscle_targets.is_empty()),
        (UpdatedField::AvoidJoints, preferences.avoid_joints.is_empty()),
        (UpdatedField::MuscleLessens, preferences.muscle_lessens.is_empty()),
        (UpdatedField::IncludeExercises, preferences.include_exercises.is_empty()),
        (UpdatedField::AvoidExercises, preferences.avoid_exercises.is_empty()),
    ];
    for (field, missing) in candidates {
        if fields.len() >= 2 {
            break;
        }
        if missing {
            fields.push(field);
        }
    }

    fields
}

fn question_for(field: UpdatedField) -> &'static str {
    match field {
        UpdatedField::SessionGoal => "what's your training focus - strength or stability?",
        UpdatedField::MuscleTargets => "any specific areas you want to work on?",
        UpdatedField::AvoidJoints => "anything we should be careful with?",
        UpdatedField::MuscleLessens => "any areas you'd rather go easy on?",
        UpdatedField::IncludeExercises => "any exercises you'd like to see in there?",
        UpdatedField::AvoidExercises => "anything you'd rather skip today?",
        UpdatedField::Intensity => "how hard do you want to go today?",
    }
}

/// The one follow-up question sent after the initial collection turn,
/// covering at most two missing fields.
pub fn followup_question(preferences: &PreferenceRecord) -> String {
    let fields = fields_to_ask(preferences);
    match fields.as_slice() {
        [] => {
            "Perfect! I've got all your preferences. Your workout will be tailored to how \
             you're feeling today. See you in the gym!"
                .to_string()
        }
        [only] => {
            let question = question_for(*only);
            let mut out = String::from("Got it! ");
            out.push_str(&capitalize(question));
            out
        }
        [first, second, ..] => {
            format!("Got it! {} Also, {}", capitalize(question_for(*first)), question_for(*second))
        }
    }
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// Closing line once the follow-up has been answered.
pub fn final_response() -> &'static str {
    "Great, thank you for that. If you have anything else to add, let me know."
}

/// Confirmation after an active-state amendment, naming what changed.
/// Single-field updates get a tailored sentence; multi-field updates list
/// the field names.
pub fn update_confirmation(updated: &[UpdatedField]) -> String {
    match updated {
        [] => "Got it. Let me know if you need any other changes.".to_string(),
        [UpdatedField::Intensity] => {
            "Got it, I've adjusted the intensity. Let me know if you need anything else changed."
                .to_string()
        }
        [UpdatedField::SessionGoal] => {
            "Perfect, I've updated your training focus. Anything else you'd like to adjust?"
                .to_string()
        }
        [UpdatedField::AvoidExercises] => {
            "No problem, I'll make sure to skip those. Let me know if there's anything else."
                .to_string()
        }
        [UpdatedField::IncludeExercises] => {
            "Great, I'll add those to your workout. Anything else you'd like to change?".to_string()
        }
        [UpdatedField::AvoidJoints] => {
            "Noted - I'll be careful with those areas. Let me know if you need other adjustments."
                .to_string()
        }
        fields => {
            let names = fields.iter().map(|f| f.display_name()).collect::<Vec<_>>().join(" and ");
            format!("Updated your {names}. Let me know if you need any other changes.")
        }
    }
}

/// Reply when an amendment message contained nothing actionable.
pub fn nothing_to_change() -> &'static str {
    "I didn't catch what you'd like to change. You can update things like intensity \
     (easy/hard), exercises to add/skip, or areas to focus on."
}

/// Reply to acknowledgements and questions in the active step.
pub fn general_query_reply() -> &'static str {
    "Your current preferences are set. If you need to change anything, just let me know!"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preferences::{Intensity, SessionGoal, SourceTag};

    fn record() -> PreferenceRecord {
        PreferenceRecord::new()
    }

    #[test]
    fn empty_record_asks_for_goal_plus_one_more() {
        let question = followup_question(&record());
        assert!(question.contains("training focus"));
        assert!(question.contains("areas you want to work on"));
    }

    #[test]
    fn known_goal_skips_the_goal_question() {
        let mut prefs = record();
        prefs.session_goal = Some(SessionGoal::Strength);
        prefs.session_goal_source = SourceTag::Explicit;

        let question = followup_question(&prefs);
        assert!(!question.contains("training focus"));
        assert!(question.contains("areas you want to work on"));
    }

    #[test]
    fn fully_specified_record_gets_a_confirmation() {
        let prefs = PreferenceRecord {
            intensity: Some(Intensity::High),
            intensity_source: SourceTag::Explicit,
            session_goal: Some(SessionGoal::Strength),
            session_goal_source: SourceTag::Explicit,
            muscle_targets: vec!["abs".into()],
            muscle_lessens: vec!["calves".into()],
            avoid_joints: vec!["knee".into()],
            include_exercises: vec!["Deadlift".into()],
            avoid_exercises: vec!["Burpee".into()],
            ..record()
        };
        assert!(followup_question(&prefs).starts_with("Perfect!"));
    }

    #[test]
    fn at_most_two_fields_are_asked() {
        let question = followup_question(&record());
        // goal + one more, never a third clause
        assert_eq!(question.matches('?').count(), 2);
    }

    #[test]
    fn single_intensity_update_gets_tailored_confirmation() {
        let reply = update_confirmation(&[UpdatedField::Intensity]);
        assert!(reply.contains("intensity"));
        assert!(!reply.contains(" and "));
    }

    #[test]
    fn multi_field_update_lists_field_names() {
        let reply =
            update_confirmation(&[UpdatedField::Intensity, UpdatedField::MuscleTargets]);
        assert!(reply.contains("intensity and target areas"));
    }
}
