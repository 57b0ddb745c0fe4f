//! The linear strategy: walk a template's question list in order, validate
//! each answer, and fold the collected data into the preference record when
//! the last step completes.

use coachline_core::error::EngineError;
use coachline_core::flows::linear::{
    LinearFlow, LinearFlowState, map_to_preferences, validate_answer,
};
use coachline_core::merge::merge;
use coachline_core::messages::{InboundMessage, TurnReply};
use coachline_core::steps::ConversationStep;

use super::ConversationEngine;
use crate::stores::state_kinds;

pub async fn handle(
    engine: &ConversationEngine,
    msg: &InboundMessage,
    flow: &LinearFlow,
) -> Result<TurnReply, EngineError> {
    let stored = engine
        .flow_states
        .get(msg.user_id, msg.session_id, state_kinds::LINEAR_FLOW)
        .await?;

    let mut state = match stored {
        None => return start(engine, msg, flow).await,
        Some(value) => match serde_json::from_value::<LinearFlowState>(value) {
            Ok(state) => state,
            Err(err) => {
                tracing::warn!(
                    session_id = %msg.session_id,
                    error = %err,
                    "corrupt linear flow state; restarting flow"
                );
                return start(engine, msg, flow).await;
            }
        },
    };

    let Some(step) = flow.steps.get(state.current_step_index) else {
        return complete(engine, msg, flow, &state).await;
    };

    let value = match validate_answer(&msg.text, step) {
        Err(error_message) => {
            return Ok(TurnReply { reply: error_message, step: ConversationStep::NotStarted });
        }
        Ok(value) => value,
    };

    if !value.is_null() {
        state.collected_data.insert(step.field_to_collect.clone(), value);
    }
    state.current_step_index += 1;

    match flow.steps.get(state.current_step_index) {
        None => complete(engine, msg, flow, &state).await,
        Some(next) => {
            save_state(engine, msg, &state).await?;
            Ok(TurnReply {
                reply: next.question.clone(),
                step: ConversationStep::NotStarted,
            })
        }
    }
}

async fn start(
    engine: &ConversationEngine,
    msg: &InboundMessage,
    flow: &LinearFlow,
) -> Result<TurnReply, EngineError> {
    let Some(first) = flow.steps.first() else {
        // A template with no questions completes immediately.
        return complete(engine, msg, flow, &LinearFlowState::default()).await;
    };

    save_state(engine, msg, &LinearFlowState::default()).await?;

    tracing::info!(
        user_id = %msg.user_id,
        session_id = %msg.session_id,
        steps = flow.steps.len(),
        "linear flow started"
    );

    Ok(TurnReply { reply: first.question.clone(), step: ConversationStep::NotStarted })
}

async fn complete(
    engine: &ConversationEngine,
    msg: &InboundMessage,
    flow: &LinearFlow,
    state: &LinearFlowState,
) -> Result<TurnReply, EngineError> {
    let collected = map_to_preferences(&state.collected_data);
    let existing = engine.preferences.get(msg.user_id, msg.session_id).await?;

    let mut merged = merge(existing.as_ref(), &collected);
    // Declarative flows hand the session straight to active mode; the
    // legacy transition table does not govern them.
    merged.step = ConversationStep::PreferencesActive;
    engine.save_preferences(msg, &merged).await?;

    engine
        .flow_states
        .clear(msg.user_id, msg.session_id, state_kinds::LINEAR_FLOW)
        .await?;

    tracing::info!(
        user_id = %msg.user_id,
        session_id = %msg.session_id,
        collected = state.collected_data.len(),
        "linear flow complete"
    );

    Ok(TurnReply {
        reply: flow.confirmation_message.clone(),
        step: ConversationStep::PreferencesActive,
    })
}

async fn save_state(
    engine: &ConversationEngine,
    msg: &InboundMessage,
    state: &LinearFlowState,
) -> Result<(), EngineError> {
    let value =
        serde_json::to_value(state).map_err(|e| EngineError::Persistence(e.to_string()))?;
    engine
        .flow_states
        .put(msg.user_id, msg.session_id, msg.business_id, state_kinds::LINEAR_FLOW, &value)
        .await
}
