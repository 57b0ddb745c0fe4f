use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::steps::ConversationStep;

/// How hard the client wants today's session to be.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Intensity {
    Low,
    Moderate,
    High,
}

impl Intensity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intensity::Low => "low",
            Intensity::Moderate => "moderate",
            Intensity::High => "high",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "low" => Some(Intensity::Low),
            "moderate" => Some(Intensity::Moderate),
            "high" => Some(Intensity::High),
            _ => None,
        }
    }
}

/// What the session is for.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionGoal {
    Strength,
    Stability,
}

impl SessionGoal {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionGoal::Strength => "strength",
            SessionGoal::Stability => "stability",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "strength" => Some(SessionGoal::Strength),
            "stability" => Some(SessionGoal::Stability),
            _ => None,
        }
    }
}

/// Why a scalar field holds its current value. `Explicit` means the client
/// said it this session; `Inherited` means it was carried forward from an
/// earlier turn; `Default` means nobody ever set it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SourceTag {
    Explicit,
    Inherited,
    Default,
}

impl SourceTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceTag::Explicit => "explicit",
            SourceTag::Inherited => "inherited",
            SourceTag::Default => "default",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "explicit" => Some(SourceTag::Explicit),
            "inherited" => Some(SourceTag::Inherited),
            "default" => Some(SourceTag::Default),
            _ => None,
        }
    }
}

/// The converged preference record for one (user, session) pair.
///
/// Set fields are insertion-ordered and case-insensitively deduplicated.
/// Invariant: `include_exercises` and `avoid_exercises` never share a name
/// (avoid wins) — enforced by the merge engine, relied on everywhere else.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct PreferenceRecord {
    pub intensity: Option<Intensity>,
    pub intensity_source: SourceTag,
    pub session_goal: Option<SessionGoal>,
    pub session_goal_source: SourceTag,
    pub muscle_targets: Vec<String>,
    pub muscle_lessens: Vec<String>,
    pub avoid_joints: Vec<String>,
    /// Canonical exercise names the client asked for
    pub include_exercises: Vec<String>,
    /// Canonical exercise names the client ruled out
    pub avoid_exercises: Vec<String>,
    pub step: ConversationStep,
}

impl PreferenceRecord {
    pub fn new() -> Self {
        PreferenceRecord {
            intensity: None,
            intensity_source: SourceTag::Default,
            session_goal: None,
            session_goal_source: SourceTag::Default,
            muscle_targets: Vec::new(),
            muscle_lessens: Vec::new(),
            avoid_joints: Vec::new(),
            include_exercises: Vec::new(),
            avoid_exercises: Vec::new(),
            step: ConversationStep::NotStarted,
        }
    }
}

impl Default for PreferenceRecord {
    fn default() -> Self {
        Self::new()
    }
}

/// What the NL parser (or the update parser) extracted from one message.
///
/// Every field is either present-with-value or absent, never a forced
/// default. For list fields, `None` means "not mentioned this turn" and
/// `Some(vec![])` means "explicitly cleared"; the merge engine treats the
/// two differently.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct PartialPreferences {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intensity: Option<Intensity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_goal: Option<SessionGoal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub muscle_targets: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub muscle_lessens: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avoid_joints: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_exercises: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avoid_exercises: Option<Vec<String>>,
}

impl PartialPreferences {
    /// True when no field was extracted at all.
    pub fn is_empty(&self) -> bool {
        self.intensity.is_none()
            && self.session_goal.is_none()
            && self.muscle_targets.is_none()
            && self.muscle_lessens.is_none()
            && self.avoid_joints.is_none()
            && self.include_exercises.is_none()
            && self.avoid_exercises.is_none()
    }
}
