use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::{Json, Router, routing::get};
use uuid::Uuid;

use coachline_core::error::ApiError;
use coachline_core::preferences::PreferenceRecord;

use crate::error::AppError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route(
        "/v1/sessions/{session_id}/users/{user_id}/preferences",
        get(get_preferences),
    )
}

/// Read a client's current preference record for a session
///
/// Read-only dashboard view of the converged record, including provenance
/// tags and the conversation step.
#[utoipa::path(
    get,
    path = "/v1/sessions/{session_id}/users/{user_id}/preferences",
    params(
        ("session_id" = Uuid, Path, description = "Training session ID"),
        ("user_id" = Uuid, Path, description = "Client user ID")
    ),
    responses(
        (status = 200, description = "Current preference record", body = PreferenceRecord),
        (status = 404, description = "No record for this user and session", body = ApiError)
    ),
    tag = "preferences"
)]
pub async fn get_preferences(
    State(state): State<AppState>,
    Path((session_id, user_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, AppError> {
    let record = state
        .preferences
        .get(user_id, session_id)
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?
        .ok_or_else(|| {
            AppError::NotFound("No preference record for this user and session".to_string())
        })?;

    Ok(Json(record))
}
