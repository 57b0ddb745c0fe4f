//! Postgres implementations of the store contracts. All writes are
//! conditional upserts keyed on (user_id, session_id), which gives the
//! per-key atomicity the engine's read-modify-write cycle relies on.

use coachline_core::disambiguation::DisambiguationContext;
use coachline_core::error::EngineError;
use coachline_core::messages::MessageDirection;
use coachline_core::preferences::{
    Intensity, PreferenceRecord, SessionGoal, SourceTag,
};
use coachline_core::steps::ConversationStep;
use sqlx::PgPool;
use uuid::Uuid;

use super::{
    DisambiguationStore, FlowStateStore, MessageLog, PreferenceStore, SessionConfigStore,
    SessionFlowConfig, state_kinds,
};
use crate::collaborators::BoxFuture;

fn db_err(err: sqlx::Error) -> EngineError {
    EngineError::Persistence(err.to_string())
}

fn corrupt(what: &str, value: &str) -> EngineError {
    EngineError::Persistence(format!("corrupt {what} value in store: '{value}'"))
}

fn string_list(value: &serde_json::Value) -> Vec<String> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str())
                .map(|s| s.to_string())
                .collect()
        })
        .unwrap_or_default()
}

#[derive(sqlx::FromRow)]
struct PreferenceRow {
    intensity: Option<String>,
    intensity_source: String,
    session_goal: Option<String>,
    session_goal_source: String,
    muscle_targets: serde_json::Value,
    muscle_lessens: serde_json::Value,
    avoid_joints: serde_json::Value,
    include_exercises: serde_json::Value,
    avoid_exercises: serde_json::Value,
    step: String,
}

impl PreferenceRow {
    fn into_record(self) -> Result<PreferenceRecord, EngineError> {
        let intensity = match self.intensity.as_deref() {
            None => None,
            Some(value) => {
                Some(Intensity::parse(value).ok_or_else(|| corrupt("intensity", value))?)
            }
        };
        let session_goal = match self.session_goal.as_deref() {
            None => None,
            Some(value) => {
                Some(SessionGoal::parse(value).ok_or_else(|| corrupt("session_goal", value))?)
            }
        };

        Ok(PreferenceRecord {
            intensity,
            intensity_source: SourceTag::parse(&self.intensity_source)
                .ok_or_else(|| corrupt("intensity_source", &self.intensity_source))?,
            session_goal,
            session_goal_source: SourceTag::parse(&self.session_goal_source)
                .ok_or_else(|| corrupt("session_goal_source", &self.session_goal_source))?,
            muscle_targets: string_list(&self.muscle_targets),
            muscle_lessens: string_list(&self.muscle_lessens),
            avoid_joints: string_list(&self.avoid_joints),
            include_exercises: string_list(&self.include_exercises),
            avoid_exercises: string_list(&self.avoid_exercises),
            step: ConversationStep::parse(&self.step).ok_or_else(|| corrupt("step", &self.step))?,
        })
    }
}

pub struct PgPreferenceStore {
    pool: PgPool,
}

impl PgPreferenceStore {
    pub fn new(pool: PgPool) -> Self {
        PgPreferenceStore { pool }
    }
}

impl PreferenceStore for PgPreferenceStore {
    fn get(
        &self,
        user_id: Uuid,
        session_id: Uuid,
    ) -> BoxFuture<'_, Result<Option<PreferenceRecord>, EngineError>> {
        Box::pin(async move {
            let row = sqlx::query_as::<_, PreferenceRow>(
                r#"
                SELECT intensity, intensity_source, session_goal, session_goal_source,
                       muscle_targets, muscle_lessens, avoid_joints,
                       include_exercises, avoid_exercises, step
                FROM workout_preferences
                WHERE user_id = $1 AND session_id = $2
                "#,
            )
            .bind(user_id)
            .bind(session_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

            row.map(PreferenceRow::into_record).transpose()
        })
    }

    fn upsert<'a>(
        &'a self,
        user_id: Uuid,
        session_id: Uuid,
        business_id: Uuid,
        record: &'a PreferenceRecord,
    ) -> BoxFuture<'a, Result<(), EngineError>> {
        Box::pin(async move {
            sqlx::query(
                r#"
                INSERT INTO workout_preferences (
                    user_id, session_id, business_id,
                    intensity, intensity_source, session_goal, session_goal_source,
                    muscle_targets, muscle_lessens, avoid_joints,
                    include_exercises, avoid_exercises, step
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
                ON CONFLICT (user_id, session_id) DO UPDATE SET
                    intensity = EXCLUDED.intensity,
                    intensity_source = EXCLUDED.intensity_source,
                    session_goal = EXCLUDED.session_goal,
                    session_goal_source = EXCLUDED.session_goal_source,
                    muscle_targets = EXCLUDED.muscle_targets,
                    muscle_lessens = EXCLUDED.muscle_lessens,
                    avoid_joints = EXCLUDED.avoid_joints,
                    include_exercises = EXCLUDED.include_exercises,
                    avoid_exercises = EXCLUDED.avoid_exercises,
                    step = EXCLUDED.step,
                    updated_at = now()
                "#,
            )
            .bind(user_id)
            .bind(session_id)
            .bind(business_id)
            .bind(record.intensity.map(|i| i.as_str()))
            .bind(record.intensity_source.as_str())
            .bind(record.session_goal.map(|g| g.as_str()))
            .bind(record.session_goal_source.as_str())
            .bind(serde_json::json!(record.muscle_targets))
            .bind(serde_json::json!(record.muscle_lessens))
            .bind(serde_json::json!(record.avoid_joints))
            .bind(serde_json::json!(record.include_exercises))
            .bind(serde_json::json!(record.avoid_exercises))
            .bind(record.step.as_str())
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

            Ok(())
        })
    }
}

#[derive(sqlx::FromRow)]
struct StateRow {
    state: serde_json::Value,
}

pub struct PgDisambiguationStore {
    pool: PgPool,
}

impl PgDisambiguationStore {
    pub fn new(pool: PgPool) -> Self {
        PgDisambiguationStore { pool }
    }
}

impl DisambiguationStore for PgDisambiguationStore {
    fn get_pending(
        &self,
        user_id: Uuid,
        session_id: Uuid,
    ) -> BoxFuture<'_, Result<Option<DisambiguationContext>, EngineError>> {
        Box::pin(async move {
            let row = sqlx::query_as::<_, StateRow>(
                r#"
                SELECT state FROM conversation_state
                WHERE user_id = $1 AND session_id = $2 AND conversation_type = $3
                "#,
            )
            .bind(user_id)
            .bind(session_id)
            .bind(state_kinds::DISAMBIGUATION)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

            match row {
                None => Ok(None),
                Some(row) => serde_json::from_value(row.state)
                    .map(Some)
                    .map_err(|e| EngineError::Persistence(format!("corrupt disambiguation state: {e}"))),
            }
        })
    }

    fn put<'a>(
        &'a self,
        user_id: Uuid,
        session_id: Uuid,
        business_id: Uuid,
        context: &'a DisambiguationContext,
    ) -> BoxFuture<'a, Result<(), EngineError>> {
        Box::pin(async move {
            let state = serde_json::to_value(context)
                .map_err(|e| EngineError::Persistence(e.to_string()))?;
            sqlx::query(
                r#"
                INSERT INTO conversation_state (user_id, session_id, business_id, conversation_type, state)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (user_id, session_id, conversation_type)
                DO UPDATE SET state = EXCLUDED.state, updated_at = now()
                "#,
            )
            .bind(user_id)
            .bind(session_id)
            .bind(business_id)
            .bind(state_kinds::DISAMBIGUATION)
            .bind(state)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

            Ok(())
        })
    }

    fn delete(
        &self,
        user_id: Uuid,
        session_id: Uuid,
    ) -> BoxFuture<'_, Result<(), EngineError>> {
        Box::pin(async move {
            sqlx::query(
                r#"
                DELETE FROM conversation_state
                WHERE user_id = $1 AND session_id = $2 AND conversation_type = $3
                "#,
            )
            .bind(user_id)
            .bind(session_id)
            .bind(state_kinds::DISAMBIGUATION)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

            Ok(())
        })
    }
}

pub struct PgFlowStateStore {
    pool: PgPool,
}

impl PgFlowStateStore {
    pub fn new(pool: PgPool) -> Self {
        PgFlowStateStore { pool }
    }
}

impl FlowStateStore for PgFlowStateStore {
    fn get<'a>(
        &'a self,
        user_id: Uuid,
        session_id: Uuid,
        kind: &'a str,
    ) -> BoxFuture<'a, Result<Option<serde_json::Value>, EngineError>> {
        Box::pin(async move {
            let row = sqlx::query_as::<_, StateRow>(
                r#"
                SELECT state FROM conversation_state
                WHERE user_id = $1 AND session_id = $2 AND conversation_type = $3
                "#,
            )
            .bind(user_id)
            .bind(session_id)
            .bind(kind)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

            Ok(row.map(|r| r.state))
        })
    }

    fn put<'a>(
        &'a self,
        user_id: Uuid,
        session_id: Uuid,
        business_id: Uuid,
        kind: &'a str,
        state: &'a serde_json::Value,
    ) -> BoxFuture<'a, Result<(), EngineError>> {
        Box::pin(async move {
            sqlx::query(
                r#"
                INSERT INTO conversation_state (user_id, session_id, business_id, conversation_type, state)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (user_id, session_id, conversation_type)
                DO UPDATE SET state = EXCLUDED.state, updated_at = now()
                "#,
            )
            .bind(user_id)
            .bind(session_id)
            .bind(business_id)
            .bind(kind)
            .bind(state)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

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
            sqlx::query(
                r#"
                DELETE FROM conversation_state
                WHERE user_id = $1 AND session_id = $2 AND conversation_type = $3
                "#,
            )
            .bind(user_id)
            .bind(session_id)
            .bind(kind)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

            Ok(())
        })
    }
}

#[derive(sqlx::FromRow)]
struct SessionConfigRow {
    status: Option<String>,
    flow_type: Option<String>,
    flow_config: Option<serde_json::Value>,
}

pub struct PgSessionConfigStore {
    pool: PgPool,
}

impl PgSessionConfigStore {
    pub fn new(pool: PgPool) -> Self {
        PgSessionConfigStore { pool }
    }
}

impl SessionConfigStore for PgSessionConfigStore {
    fn get(
        &self,
        session_id: Uuid,
    ) -> BoxFuture<'_, Result<Option<SessionFlowConfig>, EngineError>> {
        Box::pin(async move {
            let row = sqlx::query_as::<_, SessionConfigRow>(
                r#"
                SELECT status, flow_type, flow_config FROM training_sessions WHERE id = $1
                "#,
            )
            .bind(session_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

            Ok(row.map(|r| SessionFlowConfig {
                status: r.status,
                flow_type: r.flow_type,
                flow_config: r.flow_config,
            }))
        })
    }
}

pub struct PgMessageLog {
    pool: PgPool,
}

impl PgMessageLog {
    pub fn new(pool: PgPool) -> Self {
        PgMessageLog { pool }
    }
}

impl MessageLog for PgMessageLog {
    fn record<'a>(
        &'a self,
        user_id: Uuid,
        business_id: Uuid,
        direction: MessageDirection,
        content: &'a str,
        metadata: serde_json::Value,
    ) -> BoxFuture<'a, Result<(), EngineError>> {
        Box::pin(async move {
            let direction = match direction {
                MessageDirection::Inbound => "inbound",
                MessageDirection::Outbound => "outbound",
            };
            sqlx::query(
                r#"
                INSERT INTO messages (id, user_id, business_id, direction, content, metadata)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(Uuid::now_v7())
            .bind(user_id)
            .bind(business_id)
            .bind(direction)
            .bind(content)
            .bind(metadata)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

            Ok(())
        })
    }
}
