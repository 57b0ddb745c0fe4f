use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{Json, Router, routing::post};

use coachline_core::error::ApiError;
use coachline_core::messages::{InboundMessage, TurnReply};

use crate::error::AppError;
use crate::state::AppState;

/// Inbound messages are capped well above anything a real SMS carries.
const MAX_MESSAGE_LEN: usize = 2_000;

pub fn router() -> Router<AppState> {
    Router::new().route("/v1/messages", post(handle_message))
}

fn validate(msg: &InboundMessage) -> Result<(), AppError> {
    if msg.text.len() > MAX_MESSAGE_LEN {
        return Err(AppError::Validation {
            message: format!("text must be at most {MAX_MESSAGE_LEN} characters"),
            field: Some("text".to_string()),
            received: Some(serde_json::Value::Number(msg.text.len().into())),
            docs_hint: Some(
                "Send the client's message as typed; anything this long is not a chat message."
                    .to_string(),
            ),
        });
    }
    Ok(())
}

/// Process one inbound client message
///
/// Runs a full conversation turn: routes to the session's configured flow,
/// merges any extracted preferences, and returns the reply text. The reply
/// is also dispatched through the outbound transport.
#[utoipa::path(
    post,
    path = "/v1/messages",
    request_body = InboundMessage,
    responses(
        (status = 200, description = "Turn processed", body = TurnReply),
        (status = 400, description = "Validation error", body = ApiError)
    ),
    tag = "conversation"
)]
pub async fn handle_message(
    State(state): State<AppState>,
    Json(payload): Json<InboundMessage>,
) -> Result<impl IntoResponse, AppError> {
    validate(&payload)?;

    let reply = state.engine.process_message(&payload).await;
    Ok((StatusCode::OK, Json(reply)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use coachline_core::messages::Channel;
    use uuid::Uuid;

    fn msg(text: String) -> InboundMessage {
        InboundMessage {
            session_id: Uuid::now_v7(),
            user_id: Uuid::now_v7(),
            business_id: Uuid::now_v7(),
            channel: Channel::Sms,
            text,
        }
    }

    #[test]
    fn oversized_text_is_rejected() {
        assert!(validate(&msg("x".repeat(MAX_MESSAGE_LEN + 1))).is_err());
        assert!(validate(&msg("add deadlifts".to_string())).is_ok());
    }
}
