//! The conversation engine: one entry point per inbound message, with all
//! work for a (user, session) pair serialized behind a keyed lock. Handlers
//! read, merge, and write through the store contracts; the outbound reply
//! and dashboard broadcast are dispatched only after the authoritative
//! write has committed and never roll it back.

pub mod disambiguation;
pub mod flow_router;
pub mod legacy;
pub mod linear;
pub mod state_machine;
pub mod update;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use coachline_core::error::EngineError;
use coachline_core::messages::{InboundMessage, MessageDirection, TurnReply};
use coachline_core::preferences::PreferenceRecord;
use coachline_core::steps::{self, ConversationStep};
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::collaborators::{
    ExerciseMatcher, NoopNotifier, OutboundSender, PreferenceNotifier, PreferenceParser,
};
use crate::stores::{
    DisambiguationStore, FlowStateStore, MessageLog, PreferenceStore, SessionConfigStore,
};

const UPSERT_ATTEMPTS: u32 = 3;
const UPSERT_BACKOFF_MS: u64 = 50;

/// Per-(user, session) serialization. Two concurrent messages for the same
/// session would race the read-merge-write cycle; everything else may
/// proceed in parallel.
#[derive(Default)]
pub struct SessionLocks {
    inner: Mutex<HashMap<(Uuid, Uuid), Arc<Mutex<()>>>>,
}

impl SessionLocks {
    pub async fn acquire(&self, user_id: Uuid, session_id: Uuid) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().await;
            map.entry((user_id, session_id)).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
        };
        lock.lock_owned().await
    }
}

pub struct ConversationEngine {
    pub(crate) preferences: Arc<dyn PreferenceStore>,
    pub(crate) disambiguations: Arc<dyn DisambiguationStore>,
    pub(crate) flow_states: Arc<dyn FlowStateStore>,
    pub(crate) session_configs: Arc<dyn SessionConfigStore>,
    pub(crate) message_log: Arc<dyn MessageLog>,
    pub(crate) parser: Arc<dyn PreferenceParser>,
    pub(crate) matcher: Arc<dyn ExerciseMatcher>,
    pub(crate) outbound: Arc<dyn OutboundSender>,
    pub(crate) notifier: Arc<dyn PreferenceNotifier>,
    locks: SessionLocks,
}

impl ConversationEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        preferences: Arc<dyn PreferenceStore>,
        disambiguations: Arc<dyn DisambiguationStore>,
        flow_states: Arc<dyn FlowStateStore>,
        session_configs: Arc<dyn SessionConfigStore>,
        message_log: Arc<dyn MessageLog>,
        parser: Arc<dyn PreferenceParser>,
        matcher: Arc<dyn ExerciseMatcher>,
        outbound: Arc<dyn OutboundSender>,
    ) -> Self {
        ConversationEngine {
            preferences,
            disambiguations,
            flow_states,
            session_configs,
            message_log,
            parser,
            matcher,
            outbound,
            notifier: Arc::new(NoopNotifier),
            locks: SessionLocks::default(),
        }
    }

    /// Replace the default no-op dashboard notifier.
    pub fn with_notifier(mut self, notifier: Arc<dyn PreferenceNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Process one inbound message to completion. Every user-visible
    /// failure becomes a polite reply; only unrecoverable defects surface
    /// as errors to the HTTP layer.
    pub async fn process_message(&self, msg: &InboundMessage) -> TurnReply {
        let _guard = self.locks.acquire(msg.user_id, msg.session_id).await;

        self.log_message(msg, MessageDirection::Inbound, &msg.text).await;

        let reply = match flow_router::route(self, msg).await {
            Ok(reply) => reply,
            Err(EngineError::NotFound(reason)) => {
                tracing::info!(
                    user_id = %msg.user_id,
                    session_id = %msg.session_id,
                    %reason,
                    "turn referenced missing state"
                );
                TurnReply {
                    reply: "Sorry, I couldn't find your session. Please check in first.".to_string(),
                    step: self.current_step(msg).await,
                }
            }
            Err(err) => {
                tracing::error!(
                    user_id = %msg.user_id,
                    session_id = %msg.session_id,
                    error = %err,
                    "turn failed"
                );
                TurnReply {
                    reply: "Sorry, something went wrong. Please try again.".to_string(),
                    step: self.current_step(msg).await,
                }
            }
        };

        self.log_message(msg, MessageDirection::Outbound, &reply.reply).await;
        self.dispatch_reply(msg.user_id, reply.reply.clone());

        reply
    }

    async fn current_step(&self, msg: &InboundMessage) -> ConversationStep {
        self.preferences
            .get(msg.user_id, msg.session_id)
            .await
            .ok()
            .flatten()
            .map(|r| r.step)
            .unwrap_or(ConversationStep::NotStarted)
    }

    /// Authoritative preference write, retried with linear backoff. On
    /// success the quick-projection notifier fires; its failure cannot
    /// affect the committed state.
    pub(crate) async fn save_preferences(
        &self,
        msg: &InboundMessage,
        record: &PreferenceRecord,
    ) -> Result<(), EngineError> {
        let mut last_err = None;
        for attempt in 1..=UPSERT_ATTEMPTS {
            match self
                .preferences
                .upsert(msg.user_id, msg.session_id, msg.business_id, record)
                .await
            {
                Ok(()) => {
                    let notifier = self.notifier.clone();
                    let session_id = msg.session_id;
                    let user_id = msg.user_id;
                    let snapshot = record.clone();
                    tokio::spawn(async move {
                        notifier.preferences_updated(session_id, user_id, &snapshot).await;
                    });
                    return Ok(());
                }
                Err(err) => {
                    tracing::warn!(
                        user_id = %msg.user_id,
                        session_id = %msg.session_id,
                        attempt,
                        error = %err,
                        "preference upsert failed"
                    );
                    last_err = Some(err);
                    if attempt < UPSERT_ATTEMPTS {
                        tokio::time::sleep(Duration::from_millis(UPSERT_BACKOFF_MS * attempt as u64))
                            .await;
                    }
                }
            }
        }
        Err(last_err.unwrap_or_else(|| EngineError::Persistence("upsert failed".to_string())))
    }

    /// Validate a step transition, logging loudly and falling back to
    /// `followup_sent` when a handler tries something outside the table.
    pub(crate) fn apply_transition(
        &self,
        msg: &InboundMessage,
        from: ConversationStep,
        to: ConversationStep,
    ) -> ConversationStep {
        match steps::validate_transition(from, to) {
            Ok(next) => next,
            Err(err) => {
                tracing::error!(
                    user_id = %msg.user_id,
                    session_id = %msg.session_id,
                    error = %err,
                    "step transition outside the table; falling back to followup_sent"
                );
                ConversationStep::FollowupSent
            }
        }
    }

    async fn log_message(&self, msg: &InboundMessage, direction: MessageDirection, content: &str) {
        let metadata = serde_json::json!({
            "session_id": msg.session_id,
            "channel": msg.channel,
        });
        if let Err(err) = self
            .message_log
            .record(msg.user_id, msg.business_id, direction, content, metadata)
            .await
        {
            tracing::warn!(error = %err, "failed to log message");
        }
    }

    /// Fire-and-forget reply dispatch, decoupled from persistence. A
    /// transport failure is logged; the committed state stands.
    fn dispatch_reply(&self, user_id: Uuid, text: String) {
        let outbound = self.outbound.clone();
        tokio::spawn(async move {
            if let Err(err) = outbound.send(user_id, &text).await {
                tracing::warn!(user_id = %user_id, error = %err, "outbound send failed");
            }
        });
    }
}
