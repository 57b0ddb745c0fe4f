//! In-memory store fakes for engine tests. Same contracts, no database.

use std::collections::HashMap;
use std::sync::Mutex;

use coachline_core::disambiguation::DisambiguationContext;
use coachline_core::error::EngineError;
use coachline_core::messages::MessageDirection;
use coachline_core::preferences::PreferenceRecord;
use uuid::Uuid;

use super::{
    DisambiguationStore, FlowStateStore, MessageLog, PreferenceStore, SessionConfigStore,
    SessionFlowConfig,
};
use crate::collaborators::BoxFuture;

type Key = (Uuid, Uuid);

#[derive(Default)]
pub struct MemoryPreferenceStore {
    records: Mutex<HashMap<Key, PreferenceRecord>>,
    /// When set, the next N upserts fail (exercises the retry path)
    pub fail_upserts: Mutex<u32>,
}

impl MemoryPreferenceStore {
    pub fn snapshot(&self, user_id: Uuid, session_id: Uuid) -> Option<PreferenceRecord> {
        self.records.lock().unwrap().get(&(user_id, session_id)).cloned()
    }
}

impl PreferenceStore for MemoryPreferenceStore {
    fn get(
        &self,
        user_id: Uuid,
        session_id: Uuid,
    ) -> BoxFuture<'_, Result<Option<PreferenceRecord>, EngineError>> {
        let record = self.snapshot(user_id, session_id);
        Box::pin(async move { Ok(record) })
    }

    fn upsert<'a>(
        &'a self,
        user_id: Uuid,
        session_id: Uuid,
        _business_id: Uuid,
        record: &'a PreferenceRecord,
    ) -> BoxFuture<'a, Result<(), EngineError>> {
        Box::pin(async move {
            {
                let mut failures = self.fail_upserts.lock().unwrap();
                if *failures > 0 {
                    *failures -= 1;
                    return Err(EngineError::Persistence("injected failure".to_string()));
                }
            }
            self.records.lock().unwrap().insert((user_id, session_id), record.clone());
            Ok(())
        })
    }
}

#[derive(Default)]
pub struct MemoryDisambiguationStore {
    contexts: Mutex<HashMap<Key, DisambiguationContext>>,
}

impl MemoryDisambiguationStore {
    pub fn snapshot(&self, user_id: Uuid, session_id: Uuid) -> Option<DisambiguationContext> {
        self.contexts.lock().unwrap().get(&(user_id, session_id)).cloned()
    }
}

impl DisambiguationStore for MemoryDisambiguationStore {
    fn get_pending(
        &self,
        user_id: Uuid,
        session_id: Uuid,
    ) -> BoxFuture<'_, Result<Option<DisambiguationContext>, EngineError>> {
        let context = self.snapshot(user_id, session_id);
        Box::pin(async move { Ok(context) })
    }

    fn put<'a>(
        &'a self,
        user_id: Uuid,
        session_id: Uuid,
        _business_id: Uuid,
        context: &'a DisambiguationContext,
    ) -> BoxFuture<'a, Result<(), EngineError>> {
        Box::pin(async move {
            self.contexts.lock().unwrap().insert((user_id, session_id), context.clone());
            Ok(())
        })
    }

    fn delete(&self, user_id: Uuid, session_id: Uuid) -> BoxFuture<'_, Result<(), EngineError>> {
        Box::pin(async move {
            self.contexts.lock().unwrap().remove(&(user_id, session_id));
            Ok(())
        })
    }
}

#[derive(Default)]
pub struct MemoryFlowStateStore {
    states: Mutex<HashMap<(Uuid, Uuid, String), serde_json::Value>>,
}

impl FlowStateStore for MemoryFlowStateStore {
    fn get<'a>(
        &'a self,
        user_id: Uuid,
        session_id: Uuid,
        kind: &'a str,
    ) -> BoxFuture<'a, Result<Option<serde_json::Value>, EngineError>> {
        Box::pin(async move {
            Ok(self
                .states
                .lock()
                .unwrap()
                .get(&(user_id, session_id, kind.to_string()))
                .cloned())
        })
    }

    fn put<'a>(
        &'a self,
        user_id: Uuid,
        session_id: Uuid,
        _business_id: Uuid,
        kind: &'a str,
        state: &'a serde_json::Value,
    ) -> BoxFuture<'a, Result<(), EngineError>> {
        Box::pin(async move {
            self.states
                .lock()
                .unwrap()
                .insert((user_id, session_id, kind.to_string()), state.clone());
            Ok(())
        })
    }

    fn clear<'a>(
        &'a self,
        user_id: Uuid,
        session_id: Uuid,
        kind: &'a str,
    ) -> BoxFuture<'a, Result<(), EngineError>> {
        Box::pin(async move {
            self.states.lock().unwrap().remove(&(user_id, session_id, kind.to_string()));
            Ok(())
        })
    }
}

#[derive(Default)]
pub struct MemorySessionConfigStore {
    configs: Mutex<HashMap<Uuid, SessionFlowConfig>>,
}

impl MemorySessionConfigStore {
    pub fn set(&self, session_id: Uuid, config: SessionFlowConfig) {
        self.configs.lock().unwrap().insert(session_id, config);
    }
}

impl SessionConfigStore for MemorySessionConfigStore {
    fn get(
        &self,
        session_id: Uuid,
    ) -> BoxFuture<'_, Result<Option<SessionFlowConfig>, EngineError>> {
        let config = self.configs.lock().unwrap().get(&session_id).cloned();
        Box::pin(async move { Ok(config) })
    }
}

#[derive(Default)]
pub struct MemoryMessageLog {
    pub entries: Mutex<Vec<(MessageDirection, String)>>,
}

impl MessageLog for MemoryMessageLog {
    fn record<'a>(
        &'a self,
        _user_id: Uuid,
        _business_id: Uuid,
        direction: MessageDirection,
        content: &'a str,
        _metadata: serde_json::Value,
    ) -> BoxFuture<'a, Result<(), EngineError>> {
        Box::pin(async move {
            self.entries.lock().unwrap().push((direction, content.to_string()));
            Ok(())
        })
    }
}
