//! The exercise-disambiguation sub-protocol: when a free-text phrase matches
//! more than one catalog exercise, the client picks from a numbered list.
//!
//! Numbering is continuous across phrases (1..N in encounter order) and
//! stable for the lifetime of one context. Replies are classified before
//! parsing so that clarification prompts can name what went wrong.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// One selectable catalog exercise.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct ExerciseOption {
    pub id: Uuid,
    pub name: String,
}

/// A phrase the matcher could not resolve to a single exercise.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AmbiguousMatch {
    /// The phrase as the client typed it
    pub phrase: String,
    pub candidates: Vec<ExerciseOption>,
}

/// Which conversation produced the pending context.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DisambiguationKind {
    PreferenceInitial,
    PreferenceUpdate,
}

/// The single pending disambiguation for a (user, session) pair.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DisambiguationContext {
    pub kind: DisambiguationKind,
    /// Ambiguous phrases in encounter order
    pub phrases: Vec<String>,
    /// All candidates, concatenated across phrases; option N is
    /// `options[N - 1]`
    pub options: Vec<ExerciseOption>,
    pub clarification_attempts: u32,
}

impl DisambiguationContext {
    /// Build a context from the ambiguous matches of one turn, numbering
    /// candidates 1..N continuously across phrases.
    pub fn from_matches(kind: DisambiguationKind, matches: &[AmbiguousMatch]) -> Self {
        DisambiguationContext {
            kind,
            phrases: matches.iter().map(|m| m.phrase.clone()).collect(),
            options: matches.iter().flat_map(|m| m.candidates.iter().cloned()).collect(),
            clarification_attempts: 0,
        }
    }
}

/// Compose the selection prompt enumerating every phrase's options.
pub fn selection_prompt(matches: &[AmbiguousMatch]) -> String {
    let mut message =
        String::from("I found multiple exercises matching your request. Please select by number:\n\n");

    let mut option_number = 1;
    for m in matches {
        message.push_str(&format!("For \"{}\":\n", m.phrase));
        for candidate in &m.candidates {
            message.push_str(&format!("{option_number}. {}\n", candidate.name));
            option_number += 1;
        }
        message.push('\n');
    }

    message.push_str("Reply with number(s) (e.g., '1' or '1,3')");
    message
}

/// Why a reply could not be read as a selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyError {
    /// Conversational words mixed in ("yes the first one")
    MixedContent,
    /// No digits at all
    NoNumbers,
    /// Digits present, but alongside non-connective text
    InvalidFormat,
}

/// Outcome of classifying a disambiguation reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedReply {
    Selections(Vec<usize>),
    Invalid(ReplyError),
}

static MIXED_CONTENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(yes|no|maybe|ok|sure|thanks|please|want|need|like|don't|dont)\b")
        .expect("valid mixed-content regex")
});
static VALID_SELECTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[\d\s,]+(\s+(and|&)\s+[\d\s,]+)*$").expect("valid selection regex")
});
static DIGITS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+").expect("valid digits regex"));

/// Classify a reply to a pending disambiguation and extract the selected
/// option numbers when it is valid.
pub fn parse_reply(message: &str) -> ParsedReply {
    let cleaned = message.trim().to_lowercase();

    if MIXED_CONTENT_RE.is_match(message) {
        return ParsedReply::Invalid(ReplyError::MixedContent);
    }

    if !VALID_SELECTION_RE.is_match(&cleaned) {
        let has_numbers = DIGITS_RE.is_match(&cleaned);
        return ParsedReply::Invalid(if has_numbers {
            ReplyError::InvalidFormat
        } else {
            ReplyError::NoNumbers
        });
    }

    let selections: Vec<usize> = DIGITS_RE
        .find_iter(&cleaned)
        .filter_map(|m| m.as_str().parse::<usize>().ok())
        .filter(|n| *n > 0)
        .collect();

    if selections.is_empty() {
        return ParsedReply::Invalid(ReplyError::NoNumbers);
    }

    ParsedReply::Selections(selections)
}

/// Error-specific clarification wording, referencing the valid range.
pub fn clarification_message(error: ReplyError, max_option: usize) -> String {
    match error {
        ReplyError::MixedContent => {
            if max_option == 1 {
                "I just need the number '1' to confirm your choice.".to_string()
            } else {
                format!("I just need the numbers (1-{max_option}). For example: \"1\" or \"1,3\"")
            }
        }
        ReplyError::NoNumbers => {
            if max_option == 1 {
                "Please reply with '1' to select that exercise.".to_string()
            } else {
                format!(
                    "Please reply with just the numbers of your choices (1-{max_option}). \
                     For example: \"2\" or \"1,3\""
                )
            }
        }
        ReplyError::InvalidFormat => format!(
            "Please use only numbers separated by commas. For example: \"1\" or \"2,4\" \
             (choose from 1-{max_option})"
        ),
    }
}

/// Message for numerically valid selections that fall outside `[1, N]`.
/// Out-of-range is a distinct error from format problems: the context is
/// kept, no clarification attempt is consumed, and the step does not move.
pub fn out_of_range_message(invalid: &[usize], max_option: usize) -> String {
    let list = invalid.iter().map(|n| n.to_string()).collect::<Vec<_>>().join(", ");
    format!("Invalid selection(s): {list}. Please choose from 1-{max_option}.")
}

/// Map valid selections to their options, or report which were out of range.
pub fn resolve_selections(
    context: &DisambiguationContext,
    selections: &[usize],
) -> Result<Vec<ExerciseOption>, Vec<usize>> {
    let out_of_range: Vec<usize> = selections
        .iter()
        .copied()
        .filter(|n| *n > context.options.len())
        .collect();
    if !out_of_range.is_empty() {
        return Err(out_of_range);
    }

    Ok(selections
        .iter()
        .map(|n| context.options[n - 1].clone())
        .collect())
}

/// Confirmation sent once selections resolve.
pub fn resolution_confirmation(selected: &[ExerciseOption]) -> String {
    let names = selected.iter().map(|o| o.name.as_str()).collect::<Vec<_>>().join(", ");
    format!("Perfect! I'll include {names}. ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn option(name: &str) -> ExerciseOption {
        ExerciseOption { id: Uuid::now_v7(), name: name.to_string() }
    }

    fn two_phrase_matches() -> Vec<AmbiguousMatch> {
        vec![
            AmbiguousMatch {
                phrase: "squats".to_string(),
                candidates: vec![option("Back Squat"), option("Goblet Squat")],
            },
            AmbiguousMatch {
                phrase: "press".to_string(),
                candidates: vec![
                    option("Overhead Press"),
                    option("Bench Press"),
                    option("Landmine Press"),
                ],
            },
        ]
    }

    #[test]
    fn numbering_is_continuous_across_phrases() {
        let matches = two_phrase_matches();
        let context =
            DisambiguationContext::from_matches(DisambiguationKind::PreferenceInitial, &matches);

        assert_eq!(context.options.len(), 5);
        assert_eq!(context.phrases, vec!["squats", "press"]);

        let prompt = selection_prompt(&matches);
        assert!(prompt.contains("For \"squats\":"));
        assert!(prompt.contains("1. Back Squat"));
        assert!(prompt.contains("2. Goblet Squat"));
        assert!(prompt.contains("For \"press\":"));
        assert!(prompt.contains("3. Overhead Press"));
        assert!(prompt.contains("5. Landmine Press"));
        assert!(prompt.ends_with("Reply with number(s) (e.g., '1' or '1,3')"));
    }

    #[test]
    fn selecting_three_resolves_to_second_phrases_first_candidate() {
        let matches = two_phrase_matches();
        let context =
            DisambiguationContext::from_matches(DisambiguationKind::PreferenceInitial, &matches);

        let resolved = resolve_selections(&context, &[3]).unwrap();
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].name, "Overhead Press");
    }

    #[test]
    fn conversational_replies_are_mixed_content() {
        assert_eq!(
            parse_reply("yes the first one"),
            ParsedReply::Invalid(ReplyError::MixedContent)
        );
        assert_eq!(parse_reply("sure, 1"), ParsedReply::Invalid(ReplyError::MixedContent));
    }

    #[test]
    fn replies_without_digits_are_no_numbers() {
        assert_eq!(parse_reply("the first one"), ParsedReply::Invalid(ReplyError::NoNumbers));
        assert_eq!(parse_reply("squats"), ParsedReply::Invalid(ReplyError::NoNumbers));
    }

    #[test]
    fn digits_with_extra_text_are_invalid_format() {
        assert_eq!(
            parse_reply("1 for squats"),
            ParsedReply::Invalid(ReplyError::InvalidFormat)
        );
        assert_eq!(parse_reply("#2"), ParsedReply::Invalid(ReplyError::InvalidFormat));
    }

    #[test]
    fn valid_replies_extract_all_numbers() {
        assert_eq!(parse_reply("1"), ParsedReply::Selections(vec![1]));
        assert_eq!(parse_reply(" 1, 3 "), ParsedReply::Selections(vec![1, 3]));
        assert_eq!(parse_reply("1 and 3"), ParsedReply::Selections(vec![1, 3]));
        assert_eq!(parse_reply("2 & 4"), ParsedReply::Selections(vec![2, 4]));
    }

    #[test]
    fn out_of_range_selections_are_reported_not_resolved() {
        let matches = two_phrase_matches();
        let context =
            DisambiguationContext::from_matches(DisambiguationKind::PreferenceInitial, &matches);

        assert_eq!(resolve_selections(&context, &[3, 7, 9]), Err(vec![7, 9]));
        assert_eq!(
            out_of_range_message(&[7, 9], 5),
            "Invalid selection(s): 7, 9. Please choose from 1-5."
        );
    }

    #[test]
    fn clarification_wording_is_error_specific() {
        let mixed = clarification_message(ReplyError::MixedContent, 4);
        let none = clarification_message(ReplyError::NoNumbers, 4);
        let format = clarification_message(ReplyError::InvalidFormat, 4);
        assert!(mixed.contains("1-4"));
        assert!(none.contains("1-4"));
        assert!(format.contains("1-4"));
        assert_ne!(mixed, none);
        assert_ne!(none, format);
        assert_ne!(mixed, format);

        assert_eq!(
            clarification_message(ReplyError::NoNumbers, 1),
            "Please reply with '1' to select that exercise."
        );
    }
}
