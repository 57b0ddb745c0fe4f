//! Lexical parsing of amendment messages once a session is in the active
//! step. Keyword families are gated by an update-intent check so that an
//! unrelated sentence mentioning "light" or "back" does not rewrite the
//! record.

use std::sync::LazyLock;

use regex::Regex;

use crate::preferences::{Intensity, PartialPreferences, SessionGoal};

/// The rough shape of an amendment, used only for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateKind {
    Add,
    Remove,
    Change,
    Mixed,
}

/// Which record fields an amendment touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdatedField {
    Intensity,
    SessionGoal,
    MuscleTargets,
    MuscleLessens,
    AvoidJoints,
    IncludeExercises,
    AvoidExercises,
}

impl UpdatedField {
    /// The client-facing name used in confirmations.
    pub fn display_name(&self) -> &'static str {
        match self {
            UpdatedField::Intensity => "intensity",
            UpdatedField::SessionGoal => "training focus",
            UpdatedField::MuscleTargets => "target areas",
            UpdatedField::MuscleLessens => "areas to avoid",
            UpdatedField::IncludeExercises => "exercise selections",
            UpdatedField::AvoidExercises => "exercises to skip",
            UpdatedField::AvoidJoints => "joint protection",
        }
    }
}

/// What an amendment message asked for, before any catalog matching.
/// Exercise phrases still need the matcher to become canonical names.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedUpdate {
    pub updates: PartialPreferences,
    pub fields: Vec<UpdatedField>,
    pub kind: Option<UpdateKind>,
    /// Free-text exercise phrases to run through the matcher
    pub exercise_phrases: Vec<String>,
    /// Whether the phrases should be included or avoided
    pub exercise_action: Option<ExerciseAction>,
}

impl ParsedUpdate {
    pub fn has_updates(&self) -> bool {
        !self.fields.is_empty() || !self.exercise_phrases.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExerciseAction {
    Add,
    Remove,
}

static ADD_INTENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(add|include|also|plus|and|with|try|focus on)\b|\blet'?s\s+(do\s+)?|\b(want|wanna)\s+to\s+do\b")
        .expect("valid add-intent regex")
});
static REMOVE_INTENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(remove|skip|no|avoid|without|stop|don't|dont|exclude|delete)\b")
        .expect("valid remove-intent regex")
});
static NEGATIVE_WANT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(don't|dont|do not)\s+want").expect("valid negative-want regex")
});
static CHANGE_INTENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(change|switch|instead|replace|make it|update)\b")
        .expect("valid change-intent regex")
});
static UPDATE_CONTEXT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(actually|instead|change|make|go|feel|feeling|want|push|challenge|bring|destroy|crush|kick|let's|lets|need|take|today|now|add|remove|also|plus|switch|update)\b")
        .expect("valid update-context regex")
});

static INTENSITY_LOW_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(easy|easier|light|lighter|low|gentle|relax|tired)\b|take\s+it\s+easy")
        .expect("valid low-intensity regex")
});
static INTENSITY_MODERATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(moderate|medium|normal|regular)\b").expect("valid moderate-intensity regex")
});
static INTENSITY_HIGH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(hard|harder|heavy|intense|high|crush|destroy)\b|kick\s+(my\s+)?(butt|ass)|push\s+me|challenge\s+me|bring\s+it|all\s+out",
    )
    .expect("valid high-intensity regex")
});

static GOAL_STRENGTH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(strength|strong|heavy)\b").expect("valid strength-goal regex")
});
static GOAL_STABILITY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(stability|balance|control)\b").expect("valid stability-goal regex")
});

static MUSCLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(chest|back|shoulders|arms|legs|glutes|core|abs|triceps|biceps|quads|hamstrings|calves|delts|lats|traps)\b")
        .expect("valid muscle regex")
});
static MUSCLE_AVOID_CONTEXT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(sore|tired|rest|avoid|skip|no)\b").expect("valid muscle-avoid regex")
});
static MUSCLE_TARGET_CONTEXT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(work|hit|focus|target|add)\b").expect("valid muscle-target regex")
});

static JOINT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(knees?|shoulders?|wrists?|elbows?|ankles?|hips?|back|neck)\b")
        .expect("valid joint regex")
});
static JOINT_ISSUE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(hurt|hurting|pain|sore|protect|careful|issue|problem|ache|aching)\b")
        .expect("valid joint-issue regex")
});

static GENERAL_QUERY_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)\b(what|how|when|where|why|who)\b.*\?",
        r"(?i)\b(am i|are we|is it|should i)\b",
        r"(?i)\b(okay|ok|good|great|thanks|thank you|sounds good|perfect)\b",
        r"(?i)^(yes|no|maybe|sure)$",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid general-query regex"))
    .collect()
});

static EXERCISE_AFTER_INTENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:add|include|skip|remove|avoid|do|try)\s+(?:(?:some|the|that|those|these|any)\s+)?([a-z][a-z '\-]+?)(?:\s+(?:to|from|for|please|today|now|thanks)\b|[,.!?]|$)",
    )
    .expect("valid exercise-extraction regex")
});
static NEGATIVE_WANT_EXERCISE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:don'?t|dont)\s+want\s+(?:to\s+do\s+)?([a-z][a-z '\-]+?)(?:\s+(?:anymore|today|now|please|thanks)\b|[,.!?]|$)",
    )
    .expect("valid negative-want exercise regex")
});

fn has_update_context(message: &str) -> bool {
    UPDATE_CONTEXT_RE.is_match(message)
}

fn detect_intensity(message: &str) -> Option<Intensity> {
    if !has_update_context(message) {
        return None;
    }
    // Low/high idioms checked before the generic moderate words so "take it
    // easy today" never reads as moderate.
    if INTENSITY_LOW_RE.is_match(message) {
        return Some(Intensity::Low);
    }
    if INTENSITY_HIGH_RE.is_match(message) {
        return Some(Intensity::High);
    }
    if INTENSITY_MODERATE_RE.is_match(message) {
        return Some(Intensity::Moderate);
    }
    None
}

fn detect_session_goal(message: &str) -> Option<SessionGoal> {
    if !has_update_context(message) {
        return None;
    }
    if GOAL_STABILITY_RE.is_match(message) {
        return Some(SessionGoal::Stability);
    }
    if GOAL_STRENGTH_RE.is_match(message) {
        return Some(SessionGoal::Strength);
    }
    None
}

fn detect_muscles(message: &str) -> (Vec<String>, Vec<String>) {
    let mentions: Vec<String> = MUSCLE_RE
        .find_iter(message)
        .map(|m| m.as_str().to_lowercase())
        .collect();
    if mentions.is_empty() {
        return (Vec::new(), Vec::new());
    }
    if MUSCLE_AVOID_CONTEXT_RE.is_match(message) {
        (Vec::new(), mentions)
    } else if MUSCLE_TARGET_CONTEXT_RE.is_match(message) {
        (mentions, Vec::new())
    } else {
        (Vec::new(), Vec::new())
    }
}

fn detect_joints(message: &str) -> Vec<String> {
    if !JOINT_ISSUE_RE.is_match(message) {
        return Vec::new();
    }
    JOINT_RE
        .find_iter(message)
        .map(|m| m.as_str().to_lowercase().trim_end_matches('s').to_string())
        .collect()
}

fn detect_exercise_action(message: &str) -> Option<ExerciseAction> {
    if NEGATIVE_WANT_RE.is_match(message) {
        return Some(ExerciseAction::Remove);
    }
    let has_remove = REMOVE_INTENT_RE.is_match(message);
    let has_add = ADD_INTENT_RE.is_match(message);
    match (has_add, has_remove) {
        // "remove" keywords are the stronger signal when both appear
        (_, true) => Some(ExerciseAction::Remove),
        (true, false) => Some(ExerciseAction::Add),
        (false, false) => None,
    }
}

fn extract_exercise_phrases(message: &str) -> Vec<String> {
    let mut phrases: Vec<String> = Vec::new();
    for re in [&*NEGATIVE_WANT_EXERCISE_RE, &*EXERCISE_AFTER_INTENT_RE] {
        for caps in re.captures_iter(message) {
            if let Some(m) = caps.get(1) {
                let phrase = m.as_str().trim().to_lowercase();
                // Keyword-only captures ("it", muscle words) are not
                // exercise phrases.
                if phrase.len() > 2
                    && !MUSCLE_RE.is_match(&phrase)
                    && !phrases.iter().any(|p| p == &phrase)
                {
                    phrases.push(phrase);
                }
            }
        }
    }
    phrases
}

fn classify_kind(message: &str, fields: &[UpdatedField]) -> Option<UpdateKind> {
    if fields.is_empty() {
        return None;
    }
    let has_add = ADD_INTENT_RE.is_match(message);
    let has_remove = REMOVE_INTENT_RE.is_match(message);
    let has_change = CHANGE_INTENT_RE.is_match(message)
        || fields.contains(&UpdatedField::Intensity)
        || fields.contains(&UpdatedField::SessionGoal);

    Some(match (has_add, has_remove, has_change) {
        (true, true, _) | (true, _, true) => UpdateKind::Mixed,
        (_, _, true) => UpdateKind::Change,
        (true, false, false) => UpdateKind::Add,
        (false, true, false) => UpdateKind::Remove,
        (false, false, false) => UpdateKind::Change,
    })
}

/// True when the message reads as an acknowledgement or a question rather
/// than a change request.
pub fn is_general_query(message: &str) -> bool {
    GENERAL_QUERY_RES.iter().any(|re| re.is_match(message.trim()))
}

/// Parse an active-state amendment message. Muscle, joint, intensity, and
/// goal changes come back as ready-to-merge partial preferences; exercise
/// phrases come back raw for the matcher to canonicalize.
pub fn parse_update(message: &str) -> ParsedUpdate {
    let mut result = ParsedUpdate::default();

    if let Some(intensity) = detect_intensity(message) {
        result.updates.intensity = Some(intensity);
        result.fields.push(UpdatedField::Intensity);
    }

    if let Some(goal) = detect_session_goal(message) {
        result.updates.session_goal = Some(goal);
        result.fields.push(UpdatedField::SessionGoal);
    }

    if let Some(action) = detect_exercise_action(message) {
        let phrases = extract_exercise_phrases(message);
        if !phrases.is_empty() {
            result.exercise_action = Some(action);
            result.exercise_phrases = phrases;
        }
    }

    let (targets, lessens) = detect_muscles(message);
    if !targets.is_empty() {
        result.updates.muscle_targets = Some(targets);
        result.fields.push(UpdatedField::MuscleTargets);
    }
    if !lessens.is_empty() {
        result.updates.muscle_lessens = Some(lessens);
        result.fields.push(UpdatedField::MuscleLessens);
    }

    let joints = detect_joints(message);
    if !joints.is_empty() {
        result.updates.avoid_joints = Some(joints);
        result.fields.push(UpdatedField::AvoidJoints);
    }

    result.kind = classify_kind(message, &result.fields).or_else(|| {
        result.exercise_action.map(|action| match action {
            ExerciseAction::Add => UpdateKind::Add,
            ExerciseAction::Remove => UpdateKind::Remove,
        })
    });

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kick_my_butt_reads_as_high_intensity() {
        let parsed = parse_update("kick my butt");
        assert_eq!(parsed.updates.intensity, Some(Intensity::High));
        assert_eq!(parsed.fields, vec![UpdatedField::Intensity]);
    }

    #[test]
    fn take_it_easy_reads_as_low_intensity() {
        let parsed = parse_update("let's take it easy today");
        assert_eq!(parsed.updates.intensity, Some(Intensity::Low));
    }

    #[test]
    fn intensity_words_without_update_context_are_ignored() {
        let parsed = parse_update("my bag is really heavy");
        // "heavy" alone has no update-intent gate word around it
        assert_eq!(parsed.updates.intensity, None);
        assert!(!parsed.fields.contains(&UpdatedField::Intensity));
    }

    #[test]
    fn session_goal_detection_is_gated() {
        let parsed = parse_update("switch to stability work today");
        assert_eq!(parsed.updates.session_goal, Some(SessionGoal::Stability));

        let ungated = parse_update("balance is important in life");
        assert_eq!(ungated.updates.session_goal, None);
    }

    #[test]
    fn sore_muscles_route_to_lessens() {
        let parsed = parse_update("my hamstrings are sore");
        assert_eq!(parsed.updates.muscle_lessens, Some(vec!["hamstrings".to_string()]));
        assert_eq!(parsed.updates.muscle_targets, None);
    }

    #[test]
    fn focus_muscles_route_to_targets() {
        let parsed = parse_update("let's focus on glutes and abs");
        assert_eq!(
            parsed.updates.muscle_targets,
            Some(vec!["glutes".to_string(), "abs".to_string()])
        );
    }

    #[test]
    fn hurting_joints_are_collected_singular() {
        let parsed = parse_update("my knees hurt today");
        assert_eq!(parsed.updates.avoid_joints, Some(vec!["knee".to_string()]));
    }

    #[test]
    fn joint_mentions_without_an_issue_are_ignored() {
        let parsed = parse_update("knees to chest feels great");
        assert_eq!(parsed.updates.avoid_joints, None);
    }

    #[test]
    fn add_intent_extracts_exercise_phrases() {
        let parsed = parse_update("add deadlifts please");
        assert_eq!(parsed.exercise_action, Some(ExerciseAction::Add));
        assert_eq!(parsed.exercise_phrases, vec!["deadlifts"]);
        assert!(parsed.has_updates());
    }

    #[test]
    fn negative_want_is_a_removal() {
        let parsed = parse_update("I don't want lunges anymore");
        assert_eq!(parsed.exercise_action, Some(ExerciseAction::Remove));
        assert_eq!(parsed.exercise_phrases, vec!["lunges"]);
    }

    #[test]
    fn remove_beats_add_when_both_appear() {
        let parsed = parse_update("also skip burpees");
        assert_eq!(parsed.exercise_action, Some(ExerciseAction::Remove));
    }

    #[test]
    fn general_queries_are_detected() {
        assert!(is_general_query("what time do we start?"));
        assert!(is_general_query("thanks!"));
        assert!(is_general_query("yes"));
        assert!(is_general_query("sounds good"));
        assert!(!is_general_query("add deadlifts"));
    }

    #[test]
    fn unrelated_chatter_produces_no_updates() {
        let parsed = parse_update("see you at the gym");
        assert!(!parsed.has_updates());
        assert_eq!(parsed.kind, None);
    }

    #[test]
    fn intensity_change_classifies_as_change() {
        let parsed = parse_update("make it harder");
        assert_eq!(parsed.updates.intensity, Some(Intensity::High));
        assert!(matches!(parsed.kind, Some(UpdateKind::Change) | Some(UpdateKind::Mixed)));
    }
}
