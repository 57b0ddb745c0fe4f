//! Durable-state contracts the engine writes through, with Postgres
//! implementations. Each store is atomic per (user, session) key; the
//! engine's per-session serialization does the rest.

pub mod postgres;

#[cfg(test)]
pub mod memory;

use coachline_core::disambiguation::DisambiguationContext;
use coachline_core::error::EngineError;
use coachline_core::messages::MessageDirection;
use coachline_core::preferences::PreferenceRecord;
use uuid::Uuid;

use crate::collaborators::BoxFuture;

/// Conversation-state kinds multiplexed over one table.
pub mod state_kinds {
    pub const DISAMBIGUATION: &str = "exercise_disambiguation";
    pub const LINEAR_FLOW: &str = "linear_flow";
    pub const STATE_MACHINE_FLOW: &str = "state_machine_flow";
}

/// The authoritative per-(user, session) preference record.
pub trait PreferenceStore: Send + Sync {
    fn get(
        &self,
        user_id: Uuid,
        session_id: Uuid,
    ) -> BoxFuture<'_, Result<Option<PreferenceRecord>, EngineError>>;

    fn upsert<'a>(
        &'a self,
        user_id: Uuid,
        session_id: Uuid,
        business_id: Uuid,
        record: &'a PreferenceRecord,
    ) -> BoxFuture<'a, Result<(), EngineError>>;
}

/// At most one pending disambiguation per (user, session). `put` replaces
/// any existing context; attempts are bumped by re-putting.
pub trait DisambiguationStore: Send + Sync {
    fn get_pending(
        &self,
        user_id: Uuid,
        session_id: Uuid,
    ) -> BoxFuture<'_, Result<Option<DisambiguationContext>, EngineError>>;

    fn put<'a>(
        &'a self,
        user_id: Uuid,
        session_id: Uuid,
        business_id: Uuid,
        context: &'a DisambiguationContext,
    ) -> BoxFuture<'a, Result<(), EngineError>>;

    fn delete(
        &self,
        user_id: Uuid,
        session_id: Uuid,
    ) -> BoxFuture<'_, Result<(), EngineError>>;
}

/// Progress state for the declarative flows, stored as opaque JSON.
pub trait FlowStateStore: Send + Sync {
    fn get<'a>(
        &'a self,
        user_id: Uuid,
        session_id: Uuid,
        kind: &'a str,
    ) -> BoxFuture<'a, Result<Option<serde_json::Value>, EngineError>>;

    fn put<'a>(
        &'a self,
        user_id: Uuid,
        session_id: Uuid,
        business_id: Uuid,
        kind: &'a str,
        state: &'a serde_json::Value,
    ) -> BoxFuture<'a, Result<(), EngineError>>;

    fn clear<'a>(
        &'a self,
        user_id: Uuid,
        session_id: Uuid,
        kind: &'a str,
    ) -> BoxFuture<'a, Result<(), EngineError>>;
}

/// A session's conversation-strategy configuration. The flow type stays a
/// raw string here; the router maps unknown values to the legacy flow.
#[derive(Debug, Clone, Default)]
pub struct SessionFlowConfig {
    pub status: Option<String>,
    pub flow_type: Option<String>,
    pub flow_config: Option<serde_json::Value>,
}

impl SessionFlowConfig {
    /// Sessions converse only while open. An unknown status reads as open
    /// so a missing column never silences a conversation.
    pub fn is_open(&self) -> bool {
        self.status.as_deref().is_none_or(|s| s == "open")
    }
}

pub trait SessionConfigStore: Send + Sync {
    fn get(
        &self,
        session_id: Uuid,
    ) -> BoxFuture<'_, Result<Option<SessionFlowConfig>, EngineError>>;
}

/// Best-effort conversation log. Failures are logged and swallowed; a lost
/// log line never fails a turn.
pub trait MessageLog: Send + Sync {
    fn record<'a>(
        &'a self,
        user_id: Uuid,
        business_id: Uuid,
        direction: MessageDirection,
        content: &'a str,
        metadata: serde_json::Value,
    ) -> BoxFuture<'a, Result<(), EngineError>>;
}
