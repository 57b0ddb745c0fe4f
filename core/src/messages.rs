use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::steps::ConversationStep;

/// Delivery channel a message arrived on. The engine treats both the same;
/// the transport layer decides how the reply goes back out.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Sms,
    InApp,
}

/// One inbound client message, already stripped of transport details
/// (webhook signatures, carrier metadata). This is the engine's only input.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct InboundMessage {
    /// Training session the client is checked into
    pub session_id: Uuid,
    pub user_id: Uuid,
    pub business_id: Uuid,
    pub channel: Channel,
    /// Raw message text as typed by the client
    pub text: String,
}

/// The engine's answer for one turn: the reply text to send back and the
/// conversation step the session landed on.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TurnReply {
    pub reply: String,
    pub step: ConversationStep,
}

/// Direction of a logged message.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MessageDirection {
    Inbound,
    Outbound,
}

/// Greeting sent right after check-in, before any preference has been
/// collected.
pub fn preference_prompt(user_name: Option<&str>) -> String {
    let name = user_name.unwrap_or("there");
    format!(
        "You're checked in, {name}! What's your priority for today's session? \
         Examples: \"abs\" or \"stability work.\""
    )
}
