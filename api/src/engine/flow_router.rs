//! Picks the conversation strategy for a session. Anything short of a
//! well-formed configuration for a non-legacy flow (no session row, no
//! flow type, an unknown type, missing or malformed flow JSON) routes the
//! turn to the legacy flow rather than failing it.

use coachline_core::error::EngineError;
use coachline_core::flows::FlowType;
use coachline_core::flows::linear::LinearFlow;
use coachline_core::flows::state_machine::StateMachineFlow;
use coachline_core::messages::{InboundMessage, TurnReply};

use super::{ConversationEngine, legacy, linear, state_machine};

pub async fn route(
    engine: &ConversationEngine,
    msg: &InboundMessage,
) -> Result<TurnReply, EngineError> {
    let config = match engine.session_configs.get(msg.session_id).await {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(
                session_id = %msg.session_id,
                error = %err,
                "session config lookup failed; using legacy flow"
            );
            None
        }
    };

    let Some(config) = config else {
        return legacy::handle(engine, msg).await;
    };

    // Closed sessions keep their record for audit but stop conversing.
    if !config.is_open() {
        return Ok(TurnReply {
            reply: "This session has wrapped up. See you at your next check-in!".to_string(),
            step: engine.current_step(msg).await,
        });
    }

    let flow_type = config
        .flow_type
        .as_deref()
        .and_then(FlowType::parse)
        .unwrap_or_default();

    tracing::info!(
        session_id = %msg.session_id,
        flow_type = flow_type.as_str(),
        "routing inbound message"
    );

    match flow_type {
        FlowType::Linear => {
            let Some(flow) = config
                .flow_config
                .as_ref()
                .and_then(|v| serde_json::from_value::<LinearFlow>(v.clone()).ok())
            else {
                tracing::warn!(
                    session_id = %msg.session_id,
                    "linear flow configuration missing or malformed; using legacy flow"
                );
                return legacy::handle(engine, msg).await;
            };
            linear::handle(engine, msg, &flow).await
        }
        FlowType::StateMachine => {
            let Some(flow) = config
                .flow_config
                .as_ref()
                .and_then(|v| serde_json::from_value::<StateMachineFlow>(v.clone()).ok())
                .filter(|f| f.states.contains_key(&f.initial_state))
            else {
                tracing::warn!(
                    session_id = %msg.session_id,
                    "state machine configuration missing or malformed; using legacy flow"
                );
                return legacy::handle(engine, msg).await;
            };
            state_machine::handle(engine, msg, &flow).await
        }
        FlowType::Legacy => legacy::handle(engine, msg).await,
    }
}
