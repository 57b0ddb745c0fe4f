//! The generic state-machine flow: a session-declared graph of named states,
//! each carrying a handler tag and a condition → next-state map. Handlers
//! are a closed union; each variant owns its condition computation.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::preferences::PartialPreferences;

/// Fallback key in a state's `next_states` map.
pub const DEFAULT_CONDITION: &str = "default";

/// Custom handler logic selected by the template.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CustomKind {
    InjuryAssessment,
    MovementSelection,
}

/// How a state interprets the client's message.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Handler {
    /// Run the NL preference parser and branch on the shape of the result
    Preference,
    /// Expect a numeric selection
    Disambiguation,
    /// Template-defined logic (pain levels, movement keywords)
    Custom { kind: CustomKind },
    /// Keyword conditions: yes / no / skip / help
    #[default]
    Default,
}

/// One named state in the graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowState {
    pub id: String,
    pub prompt: String,
    #[serde(default)]
    pub handler: Handler,
    #[serde(default)]
    pub next_states: BTreeMap<String, String>,
}

/// A full state-machine flow template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateMachineFlow {
    pub initial_state: String,
    pub states: BTreeMap<String, FlowState>,
    #[serde(default)]
    pub final_states: Vec<String>,
}

impl StateMachineFlow {
    pub fn is_final(&self, state_id: &str) -> bool {
        self.final_states.iter().any(|s| s == state_id)
    }
}

/// Per-session progress through a state-machine flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateMachineContext {
    pub current_state: String,
    pub collected_data: BTreeMap<String, Value>,
    pub state_history: Vec<String>,
}

impl StateMachineContext {
    pub fn starting_at(initial_state: &str) -> Self {
        StateMachineContext {
            current_state: initial_state.to_string(),
            collected_data: BTreeMap::new(),
            state_history: vec![initial_state.to_string()],
        }
    }
}

/// What evaluating a message against a state produced: the branching
/// condition plus any data to fold into the collected set.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub condition: String,
    pub data: BTreeMap<String, Value>,
}

impl Evaluation {
    fn bare(condition: &str) -> Self {
        Evaluation { condition: condition.to_string(), data: BTreeMap::new() }
    }

    fn with_data(condition: &str, data: BTreeMap<String, Value>) -> Self {
        Evaluation { condition: condition.to_string(), data }
    }
}

static NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+").expect("valid number regex"));
static PAIN_LEVEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b([1-9]|10)\b").expect("valid pain-level regex"));
static PAIN_WORD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(pain|hurt|hurts|hurting)\b").expect("valid pain regex"));

const MOVEMENTS: [&str; 5] = ["squat", "hinge", "push", "pull", "lunge"];

/// Branch on the shape of a parsed preference message.
fn preference_condition(parsed: &PartialPreferences) -> &'static str {
    let has_targets = parsed.muscle_targets.as_ref().is_some_and(|t| !t.is_empty());
    if parsed.intensity.is_some() && !has_targets {
        return "has_intensity";
    }
    if has_targets && parsed.intensity.is_none() {
        return "has_targets";
    }
    let has_restrictions = parsed.avoid_exercises.as_ref().is_some_and(|a| !a.is_empty())
        || parsed.avoid_joints.as_ref().is_some_and(|j| !j.is_empty());
    if has_restrictions {
        return "has_restrictions";
    }
    DEFAULT_CONDITION
}

fn custom_condition(kind: CustomKind, message: &str) -> Evaluation {
    match kind {
        CustomKind::InjuryAssessment => {
            if PAIN_WORD_RE.is_match(message) {
                let level = PAIN_LEVEL_RE
                    .find(message)
                    .and_then(|m| m.as_str().parse::<i64>().ok())
                    .unwrap_or(5);
                let condition = if level > 5 { "high_pain" } else { "low_pain" };
                let mut data = BTreeMap::new();
                data.insert("pain_level".to_string(), json!(level));
                data.insert("description".to_string(), json!(message));
                return Evaluation::with_data(condition, data);
            }
            Evaluation::with_data(
                DEFAULT_CONDITION,
                BTreeMap::from([("response".to_string(), json!(message))]),
            )
        }
        CustomKind::MovementSelection => {
            let lower = message.to_lowercase();
            let found: Vec<&str> =
                MOVEMENTS.iter().copied().filter(|m| lower.contains(m)).collect();
            if !found.is_empty() {
                let mut data = BTreeMap::new();
                data.insert("selected_movements".to_string(), json!(found));
                return Evaluation::with_data("movements_selected", data);
            }
            Evaluation::with_data(
                DEFAULT_CONDITION,
                BTreeMap::from([("response".to_string(), json!(message))]),
            )
        }
    }
}

fn default_condition(message: &str) -> Evaluation {
    let lower = message.to_lowercase();
    let lower = lower.trim();
    if lower.contains("yes") || lower == "y" {
        return Evaluation::with_data(
            "yes",
            BTreeMap::from([("response".to_string(), json!(message))]),
        );
    }
    if lower.contains("no") || lower == "n" {
        return Evaluation::with_data(
            "no",
            BTreeMap::from([("response".to_string(), json!(message))]),
        );
    }
    if lower.contains("skip") {
        return Evaluation::bare("skip");
    }
    if lower.contains("help") || lower.contains('?') {
        return Evaluation::bare("help");
    }
    Evaluation::with_data(
        DEFAULT_CONDITION,
        BTreeMap::from([("response".to_string(), json!(message))]),
    )
}

/// Evaluate a message under a state's handler. `parsed` is the NL parser's
/// output and is only consulted by the `Preference` variant (the api layer
/// runs the parser before calling in; a degraded parse arrives as `None`).
pub fn evaluate(handler: Handler, message: &str, parsed: Option<&PartialPreferences>) -> Evaluation {
    match handler {
        Handler::Preference => {
            let empty = PartialPreferences::default();
            let parsed = parsed.unwrap_or(&empty);
            let mut data = BTreeMap::new();
            if let Ok(Value::Object(fields)) = serde_json::to_value(parsed) {
                for (key, value) in fields {
                    data.insert(key, value);
                }
            }
            Evaluation::with_data(preference_condition(parsed), data)
        }
        Handler::Disambiguation => {
            let selections: Vec<i64> = NUMBER_RE
                .find_iter(message)
                .filter_map(|m| m.as_str().parse::<i64>().ok())
                .collect();
            if selections.is_empty() {
                Evaluation::bare("invalid")
            } else {
                Evaluation::with_data(
                    "selected",
                    BTreeMap::from([("selections".to_string(), json!(selections))]),
                )
            }
        }
        Handler::Custom { kind } => custom_condition(kind, message),
        Handler::Default => default_condition(message),
    }
}

/// Follow `next_states[condition]`, falling back to the `default` key.
/// `None` means the state has no route for this condition; the caller
/// re-prompts the current state unchanged.
pub fn next_state<'a>(state: &'a FlowState, condition: &str) -> Option<&'a str> {
    state
        .next_states
        .get(condition)
        .or_else(|| state.next_states.get(DEFAULT_CONDITION))
        .map(String::as_str)
}

/// Substitute `{field}` placeholders in a prompt from collected data.
pub fn format_prompt(prompt: &str, collected: &BTreeMap<String, Value>) -> String {
    let mut out = prompt.to_string();
    for (key, value) in collected {
        let placeholder = format!("{{{key}}}");
        if out.contains(&placeholder) {
            let rendered = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            out = out.replace(&placeholder, &rendered);
        }
    }
    out
}

/// Map a completed flow's collected data into preference fields, including
/// the custom-handler conventions (movement selections become targets, high
/// pain forces low intensity).
pub fn map_to_preferences(collected: &BTreeMap<String, Value>) -> PartialPreferences {
    let mut preferences = crate::flows::linear::map_to_preferences(collected);

    if let Some(movements) = collected.get("selected_movements").and_then(|v| v.as_array()) {
        let list: Vec<String> = movements
            .iter()
            .filter_map(|v| v.as_str())
            .map(|s| s.to_string())
            .collect();
        if !list.is_empty() {
            preferences.muscle_targets = Some(list);
        }
    }
    if let Some(level) = collected.get("pain_level").and_then(|v| v.as_i64()) {
        if level > 5 {
            preferences.intensity = Some(crate::preferences::Intensity::Low);
        }
    }

    preferences
}
