//! The linear flow: an ordered list of template-declared questions, asked
//! one at a time. Collected answers are mapped into a partial preference
//! record when the last step completes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::preferences::{Intensity, PartialPreferences, SessionGoal};

const MAX_TEXT_ANSWER_LEN: usize = 200;

/// How a step's answer is validated.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AnswerValidation {
    #[default]
    Text,
    Number,
    Choice,
}

/// One question in a linear flow template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearFlowStep {
    pub id: String,
    pub question: String,
    pub field_to_collect: String,
    #[serde(default)]
    pub validation: AnswerValidation,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub required: bool,
}

/// A full linear flow template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearFlow {
    pub steps: Vec<LinearFlowStep>,
    pub confirmation_message: String,
}

/// Per-session progress through a linear flow.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LinearFlowState {
    pub current_step_index: usize,
    pub collected_data: BTreeMap<String, Value>,
}

/// Validate one answer against its step. `Ok` carries the value to collect
/// (which may be `Null` for an optional skipped answer); `Err` carries the
/// re-prompt text.
pub fn validate_answer(answer: &str, step: &LinearFlowStep) -> Result<Value, String> {
    let trimmed = answer.trim();

    if trimmed.is_empty() {
        return if step.required {
            Err("This field is required. Please provide an answer.".to_string())
        } else {
            Ok(Value::Null)
        };
    }

    match step.validation {
        AnswerValidation::Choice => {
            if step.options.is_empty() {
                return Ok(Value::String(trimmed.to_string()));
            }

            if let Some(matched) =
                step.options.iter().find(|opt| opt.eq_ignore_ascii_case(trimmed))
            {
                return Ok(Value::String(matched.clone()));
            }

            // 1-based numeric index into the options list
            if let Ok(number) = trimmed.parse::<usize>() {
                if number >= 1 && number <= step.options.len() {
                    return Ok(Value::String(step.options[number - 1].clone()));
                }
            }

            Err(format!("Please choose from: {}", step.options.join(", ")))
        }
        AnswerValidation::Number => trimmed
            .parse::<i64>()
            .map(|n| Value::Number(n.into()))
            .map_err(|_| "Please provide a number.".to_string()),
        AnswerValidation::Text => {
            if trimmed.len() > MAX_TEXT_ANSWER_LEN {
                Err("Response is too long. Please keep it brief.".to_string())
            } else {
                Ok(Value::String(trimmed.to_string()))
            }
        }
    }
}

fn string_list(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .iter()
            .filter_map(|v| v.as_str())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        Value::String(s) => s
            .split(',')
            .map(|part| part.trim().to_string())
            .filter(|part| !part.is_empty())
            .collect(),
        _ => Vec::new(),
    }
}

/// Map a completed flow's collected answers into preference fields. Fields
/// the template never collected stay absent.
pub fn map_to_preferences(collected: &BTreeMap<String, Value>) -> PartialPreferences {
    let mut preferences = PartialPreferences::default();

    if let Some(value) = collected.get("intensity").and_then(|v| v.as_str()) {
        preferences.intensity = Intensity::parse(&value.to_lowercase());
    }
    if let Some(value) = collected.get("session_goal").and_then(|v| v.as_str()) {
        preferences.session_goal = SessionGoal::parse(&value.to_lowercase());
    }
    if let Some(value) = collected.get("muscle_targets") {
        let list = string_list(value);
        if !list.is_empty() {
            preferences.muscle_targets = Some(list);
        }
    }
    if let Some(value) = collected.get("avoid_exercises") {
        let list = string_list(value);
        if !list.is_empty() {
            preferences.avoid_exercises = Some(list);
        }
    }
    if let Some(value) = collected.get("avoid_joints") {
        let list = string_list(value);
        if !list.is_empty() {
            preferences.avoid_joints = Some(list);
        }
    }

    preferences
}

#[cfg(test)]
mod tests {
    use super::*;

    fn choice_step() -> LinearFlowStep {
        LinearFlowStep {
            id: "intensity".to_string(),
            question: "How hard today?".to_string(),
            field_to_collect: "intensity".to_string(),
            validation: AnswerValidation::Choice,
            options: vec!["Low".to_string(), "Moderate".to_string(), "High".to_string()],
            required: true,
        }
    }

    #[test]
    fn choice_accepts_case_insensitive_name() {
        let step = choice_step();
        assert_eq!(validate_answer("high", &step), Ok(Value::String("High".to_string())));
    }

    #[test]
    fn choice_accepts_one_based_index() {
        let step = choice_step();
        assert_eq!(validate_answer("2", &step), Ok(Value::String("Moderate".to_string())));
        assert!(validate_answer("4", &step).is_err());
        assert!(validate_answer("0", &step).is_err());
    }

    #[test]
    fn choice_rejection_lists_the_options() {
        let step = choice_step();
        let err = validate_answer("turbo", &step).unwrap_err();
        assert_eq!(err, "Please choose from: Low, Moderate, High");
    }

    #[test]
    fn required_empty_answer_is_rejected() {
        let step = choice_step();
        assert!(validate_answer("   ", &step).is_err());
    }

    #[test]
    fn optional_empty_answer_collects_null() {
        let step = LinearFlowStep { required: false, ..choice_step() };
        assert_eq!(validate_answer("", &step), Ok(Value::Null));
    }

    #[test]
    fn number_must_parse_as_integer() {
        let step = LinearFlowStep {
            validation: AnswerValidation::Number,
            options: Vec::new(),
            ..choice_step()
        };
        assert_eq!(validate_answer("7", &step), Ok(Value::Number(7.into())));
        assert!(validate_answer("seven", &step).is_err());
    }

    #[test]
    fn text_is_capped_at_200_chars() {
        let step = LinearFlowStep {
            validation: AnswerValidation::Text,
            options: Vec::new(),
            required: false,
            ..choice_step()
        };
        assert!(validate_answer(&"x".repeat(200), &step).is_ok());
        assert!(validate_answer(&"x".repeat(201), &step).is_err());
    }

    #[test]
    fn collected_answers_map_into_preferences() {
        let mut collected = BTreeMap::new();
        collected.insert("intensity".to_string(), Value::String("High".to_string()));
        collected.insert("session_goal".to_string(), Value::String("strength".to_string()));
        collected.insert(
            "avoid_exercises".to_string(),
            Value::String("burpees, box jumps".to_string()),
        );

        let preferences = map_to_preferences(&collected);
        assert_eq!(preferences.intensity, Some(Intensity::High));
        assert_eq!(preferences.session_goal, Some(SessionGoal::Strength));
        assert_eq!(
            preferences.avoid_exercises,
            Some(vec!["burpees".to_string(), "box jumps".to_string()])
        );
        assert_eq!(preferences.muscle_targets, None);
    }
}
