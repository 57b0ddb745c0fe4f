use std::sync::Arc;

use sqlx::PgPool;

use crate::engine::ConversationEngine;
use crate::stores::PreferenceStore;

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub engine: Arc<ConversationEngine>,
    pub preferences: Arc<dyn PreferenceStore>,
}
