//! Declarative conversation-flow definitions a session can opt into as an
//! alternative to the built-in legacy flow, plus their pure evaluation
//! logic. The api crate owns persistence and dispatch.

pub mod linear;
pub mod state_machine;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Which conversation strategy governs a session. Absent or unrecognized
/// configuration always means `Legacy`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum FlowType {
    #[default]
    Legacy,
    Linear,
    StateMachine,
}

impl FlowType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlowType::Legacy => "legacy",
            FlowType::Linear => "linear",
            FlowType::StateMachine => "stateMachine",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "legacy" => Some(FlowType::Legacy),
            "linear" => Some(FlowType::Linear),
            "stateMachine" => Some(FlowType::StateMachine),
            _ => None,
        }
    }
}
