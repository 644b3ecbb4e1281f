//! Session control handlers.

use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode};
use reelswarm_session::SessionSnapshot;
use reelswarm_torrent_core::ContentRecord;
use tracing::info;

use crate::http::errors::ApiError;
use crate::state::ApiState;

pub(crate) async fn start_session(
    State(state): State<Arc<ApiState>>,
    Json(record): Json<ContentRecord>,
) -> Result<(StatusCode, Json<SessionSnapshot>), ApiError> {
    let snapshot = state.sessions.start_session(&record).await?;
    info!(content_id = %record.id, session_id = ?snapshot.session_id, "session requested");
    Ok((StatusCode::ACCEPTED, Json(snapshot)))
}

pub(crate) async fn stop_session(
    State(state): State<Arc<ApiState>>,
) -> Result<StatusCode, ApiError> {
    state.sessions.stop_session().await?;
    Ok(StatusCode::NO_CONTENT)
}

pub(crate) async fn session_snapshot(
    State(state): State<Arc<ApiState>>,
) -> Result<Json<SessionSnapshot>, ApiError> {
    Ok(Json(state.sessions.snapshot().await?))
}
