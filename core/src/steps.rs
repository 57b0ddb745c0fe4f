use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::EngineError;

/// Where a preference-collection conversation currently stands.
///
/// The snake_case string values are the persisted wire format; any session
/// record written by another service interoperates through them.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConversationStep {
    NotStarted,
    InitialCollected,
    DisambiguationPending,
    DisambiguationClarifying,
    DisambiguationResolved,
    FollowupSent,
    PreferencesActive,
}

impl ConversationStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConversationStep::NotStarted => "not_started",
            ConversationStep::InitialCollected => "initial_collected",
            ConversationStep::DisambiguationPending => "disambiguation_pending",
            ConversationStep::DisambiguationClarifying => "disambiguation_clarifying",
            ConversationStep::DisambiguationResolved => "disambiguation_resolved",
            ConversationStep::FollowupSent => "followup_sent",
            ConversationStep::PreferencesActive => "preferences_active",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "not_started" => Some(ConversationStep::NotStarted),
            "initial_collected" => Some(ConversationStep::InitialCollected),
            "disambiguation_pending" => Some(ConversationStep::DisambiguationPending),
            "disambiguation_clarifying" => Some(ConversationStep::DisambiguationClarifying),
            "disambiguation_resolved" => Some(ConversationStep::DisambiguationResolved),
            "followup_sent" => Some(ConversationStep::FollowupSent),
            "preferences_active" => Some(ConversationStep::PreferencesActive),
            _ => None,
        }
    }

    /// Every step this one may legally move to.
    pub fn allowed_transitions(&self) -> &'static [ConversationStep] {
        use ConversationStep::*;
        match self {
            NotStarted => &[InitialCollected],
            InitialCollected => &[DisambiguationPending, FollowupSent],
            DisambiguationPending => &[DisambiguationClarifying, DisambiguationResolved],
            DisambiguationClarifying => &[DisambiguationResolved],
            DisambiguationResolved => &[FollowupSent],
            FollowupSent => &[PreferencesActive],
            // Active sessions only loop on themselves
            PreferencesActive => &[PreferencesActive],
        }
    }
}

/// What happened this turn, as far as step derivation cares.
#[derive(Debug, Clone, Copy, Default)]
pub struct TurnSignals {
    pub needs_disambiguation: bool,
    pub disambiguation_failed: bool,
    pub is_followup_response: bool,
}

/// What kind of reply the engine is waiting for in a given step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpectedResponse {
    Initial,
    Disambiguation,
    Followup,
    Update,
}

/// Whether `from -> to` appears in the transition table.
pub fn is_valid_transition(from: ConversationStep, to: ConversationStep) -> bool {
    from.allowed_transitions().contains(&to)
}

/// Check a transition against the table, producing the defect error for
/// anything outside it. Callers log the error and fall back to
/// `FollowupSent` rather than crashing the conversation.
pub fn validate_transition(
    from: ConversationStep,
    to: ConversationStep,
) -> Result<ConversationStep, EngineError> {
    if is_valid_transition(from, to) {
        Ok(to)
    } else {
        Err(EngineError::StateTransition {
            from: from.as_str().to_string(),
            to: to.as_str().to_string(),
        })
    }
}

/// Derive the next step from the current one and this turn's signals.
/// Returns `None` when the table has no transition for the situation
/// (e.g. a `followup_sent` session that did not actually answer).
pub fn next_step(current: ConversationStep, signals: TurnSignals) -> Option<ConversationStep> {
    use ConversationStep::*;
    match current {
        NotStarted => Some(InitialCollected),
        InitialCollected => {
            if signals.needs_disambiguation {
                Some(DisambiguationPending)
            } else {
                Some(FollowupSent)
            }
        }
        DisambiguationPending => {
            if signals.disambiguation_failed {
                Some(DisambiguationClarifying)
            } else {
                Some(DisambiguationResolved)
            }
        }
        DisambiguationClarifying => Some(DisambiguationResolved),
        DisambiguationResolved => Some(FollowupSent),
        FollowupSent => {
            if signals.is_followup_response {
                Some(PreferencesActive)
            } else {
                None
            }
        }
        PreferencesActive => Some(PreferencesActive),
    }
}

/// True only once collection has converged and messages are treated as
/// incremental amendments.
pub fn can_update_preferences(step: ConversationStep) -> bool {
    step == ConversationStep::PreferencesActive
}

/// What kind of response the engine expects next, if any.
pub fn expected_response_type(step: ConversationStep) -> Option<ExpectedResponse> {
    use ConversationStep::*;
    match step {
        NotStarted => Some(ExpectedResponse::Initial),
        DisambiguationPending | DisambiguationClarifying => Some(ExpectedResponse::Disambiguation),
        FollowupSent => Some(ExpectedResponse::Followup),
        PreferencesActive => Some(ExpectedResponse::Update),
        InitialCollected | DisambiguationResolved => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ConversationStep::*;

    const ALL: [ConversationStep; 7] = [
        NotStarted,
        InitialCollected,
        DisambiguationPending,
        DisambiguationClarifying,
        DisambiguationResolved,
        FollowupSent,
        PreferencesActive,
    ];

    #[test]
    fn step_strings_round_trip() {
        for step in ALL {
            assert_eq!(ConversationStep::parse(step.as_str()), Some(step));
        }
        assert_eq!(ConversationStep::parse("nonsense"), None);
    }

    #[test]
    fn derived_steps_always_land_inside_the_table() {
        let signal_combos = [
            TurnSignals::default(),
            TurnSignals { needs_disambiguation: true, ..Default::default() },
            TurnSignals { disambiguation_failed: true, ..Default::default() },
            TurnSignals { is_followup_response: true, ..Default::default() },
            TurnSignals {
                needs_disambiguation: true,
                disambiguation_failed: true,
                is_followup_response: true,
            },
        ];

        for from in ALL {
            for signals in signal_combos {
                if let Some(to) = next_step(from, signals) {
                    assert!(
                        is_valid_transition(from, to),
                        "derived {} -> {} is outside the table",
                        from.as_str(),
                        to.as_str()
                    );
                }
            }
        }
    }

    #[test]
    fn transitions_outside_the_table_are_rejected() {
        for from in ALL {
            for to in ALL {
                let allowed = from.allowed_transitions().contains(&to);
                assert_eq!(is_valid_transition(from, to), allowed);
                assert_eq!(validate_transition(from, to).is_ok(), allowed);
            }
        }
        // Spot-check a few pairs that must never happen
        assert!(!is_valid_transition(NotStarted, PreferencesActive));
        assert!(!is_valid_transition(PreferencesActive, NotStarted));
        assert!(!is_valid_transition(DisambiguationClarifying, DisambiguationClarifying));
    }

    #[test]
    fn disambiguation_branches_follow_signals() {
        assert_eq!(
            next_step(InitialCollected, TurnSignals { needs_disambiguation: true, ..Default::default() }),
            Some(DisambiguationPending)
        );
        assert_eq!(
            next_step(InitialCollected, TurnSignals::default()),
            Some(FollowupSent)
        );
        assert_eq!(
            next_step(DisambiguationPending, TurnSignals { disambiguation_failed: true, ..Default::default() }),
            Some(DisambiguationClarifying)
        );
        assert_eq!(
            next_step(DisambiguationPending, TurnSignals::default()),
            Some(DisambiguationResolved)
        );
    }

    #[test]
    fn followup_without_a_response_has_no_transition() {
        assert_eq!(next_step(FollowupSent, TurnSignals::default()), None);
        assert_eq!(
            next_step(FollowupSent, TurnSignals { is_followup_response: true, ..Default::default() }),
            Some(PreferencesActive)
        );
    }

    #[test]
    fn active_state_only_loops_on_itself() {
        assert_eq!(next_step(PreferencesActive, TurnSignals::default()), Some(PreferencesActive));
        assert!(can_update_preferences(PreferencesActive));
        for step in ALL {
            if step != PreferencesActive {
                assert!(!can_update_preferences(step));
            }
        }
    }

    #[test]
    fn expected_response_matches_step() {
        assert_eq!(expected_response_type(NotStarted), Some(ExpectedResponse::Initial));
        assert_eq!(
            expected_response_type(DisambiguationPending),
            Some(ExpectedResponse::Disambiguation)
        );
        assert_eq!(
            expected_response_type(DisambiguationClarifying),
            Some(ExpectedResponse::Disambiguation)
        );
        assert_eq!(expected_response_type(FollowupSent), Some(ExpectedResponse::Followup));
        assert_eq!(expected_response_type(PreferencesActive), Some(ExpectedResponse::Update));
        assert_eq!(expected_response_type(InitialCollected), None);
    }
}
