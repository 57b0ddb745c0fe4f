//! The generic state-machine strategy: evaluate each message under the
//! current state's handler, follow the condition routes, and persist the
//! collected data as preferences once a final state is reached.

use coachline_core::error::EngineError;
use coachline_core::flows::state_machine::{
    StateMachineContext, StateMachineFlow, evaluate, format_prompt, map_to_preferences,
    next_state, Handler,
};
use coachline_core::merge::merge;
use coachline_core::messages::{InboundMessage, TurnReply};
use coachline_core::steps::ConversationStep;

use super::ConversationEngine;
use crate::collaborators::parse_with_timeout;
use crate::stores::state_kinds;

pub async fn handle(
    engine: &ConversationEngine,
    msg: &InboundMessage,
    flow: &StateMachineFlow,
) -> Result<TurnReply, EngineError> {
    let stored = engine
        .flow_states
        .get(msg.user_id, msg.session_id, state_kinds::STATE_MACHINE_FLOW)
        .await?;

    let mut context = match stored {
        None => return start(engine, msg, flow).await,
        Some(value) => match serde_json::from_value::<StateMachineContext>(value) {
            Ok(context) => context,
            Err(err) => {
                tracing::warn!(
                    session_id = %msg.session_id,
                    error = %err,
                    "corrupt state machine context; restarting flow"
                );
                return start(engine, msg, flow).await;
            }
        },
    };

    if flow.is_final(&context.current_state) {
        return complete(engine, msg, flow, &context).await;
    }

    let Some(current) = flow.states.get(&context.current_state) else {
        tracing::error!(
            session_id = %msg.session_id,
            state = %context.current_state,
            "state machine context points at an unknown state"
        );
        return Err(EngineError::Validation(format!(
            "unknown flow state '{}'",
            context.current_state
        )));
    };

    // Only the preference handler needs the NL parser; a degraded parse
    // arrives as None and falls through to the default condition.
    let parsed = match current.handler {
        Handler::Preference => Some(parse_with_timeout(&engine.parser, &msg.text).await),
        _ => None,
    };

    let evaluation = evaluate(current.handler, &msg.text, parsed.as_ref());
    context.collected_data.extend(evaluation.data.clone());

    let Some(next_id) = next_state(current, &evaluation.condition) else {
        // No route for this condition and no default: re-prompt unchanged.
        return Ok(TurnReply {
            reply: format!("I didn't understand that. {}", current.prompt),
            step: ConversationStep::NotStarted,
        });
    };

    context.current_state = next_id.to_string();
    context.state_history.push(next_id.to_string());
    save_context(engine, msg, &context).await?;

    if flow.is_final(next_id) {
        return complete(engine, msg, flow, &context).await;
    }

    let Some(next) = flow.states.get(next_id) else {
        tracing::error!(
            session_id = %msg.session_id,
            state = %next_id,
            "state machine routed to an undeclared state"
        );
        return Err(EngineError::Validation(format!("unknown flow state '{next_id}'")));
    };

    Ok(TurnReply {
        reply: format_prompt(&next.prompt, &context.collected_data),
        step: ConversationStep::NotStarted,
    })
}

async fn start(
    engine: &ConversationEngine,
    msg: &InboundMessage,
    flow: &StateMachineFlow,
) -> Result<TurnReply, EngineError> {
    // The router guarantees the initial state exists.
    let initial = &flow.states[&flow.initial_state];
    let context = StateMachineContext::starting_at(&flow.initial_state);
    save_context(engine, msg, &context).await?;

    tracing::info!(
        user_id = %msg.user_id,
        session_id = %msg.session_id,
        initial_state = %flow.initial_state,
        "state machine flow started"
    );

    Ok(TurnReply {
        reply: format_prompt(&initial.prompt, &context.collected_data),
        step: ConversationStep::NotStarted,
    })
}

async fn complete(
    engine: &ConversationEngine,
    msg: &InboundMessage,
    flow: &StateMachineFlow,
    context: &StateMachineContext,
) -> Result<TurnReply, EngineError> {
    let collected = map_to_preferences(&context.collected_data);
    let existing = engine.preferences.get(msg.user_id, msg.session_id).await?;

    let mut merged = merge(existing.as_ref(), &collected);
    merged.step = ConversationStep::PreferencesActive;
    engine.save_preferences(msg, &merged).await?;

    engine
        .flow_states
        .clear(msg.user_id, msg.session_id, state_kinds::STATE_MACHINE_FLOW)
        .await?;

    tracing::info!(
        user_id = %msg.user_id,
        session_id = %msg.session_id,
        final_state = %context.current_state,
        visited = context.state_history.len(),
        "state machine flow complete"
    );

    let reply = flow
        .states
        .get(&context.current_state)
        .map(|s| s.prompt.clone())
        .unwrap_or_else(|| "Perfect! Your workout preferences have been saved.".to_string());

    Ok(TurnReply { reply, step: ConversationStep::PreferencesActive })
}

async fn save_context(
    engine: &ConversationEngine,
    msg: &InboundMessage,
    context: &StateMachineContext,
) -> Result<(), EngineError> {
    let value =
        serde_json::to_value(context).map_err(|e| EngineError::Persistence(e.to_string()))?;
    engine
        .flow_states
        .put(
            msg.user_id,
            msg.session_id,
            msg.business_id,
            state_kinds::STATE_MACHINE_FLOW,
            &value,
        )
        .await
}
