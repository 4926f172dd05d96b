use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::report::ReportOutcome;
use crate::models::session::{SessionSummary, Turn};
use crate::session::service::KeyValidity;
use crate::state::AppState;

#[derive(Serialize)]
pub struct IssueKeyResponse {
    pub access_key: Uuid,
}

/// POST /api/v1/sessions
pub async fn handle_issue_key(
    State(state): State<AppState>,
) -> Result<Json<IssueKeyResponse>, AppError> {
    let access_key = state.sessions.issue_key().await?;
    Ok(Json(IssueKeyResponse { access_key }))
}

/// GET /api/v1/sessions — operator surface, no transcript bodies.
pub async fn handle_list_sessions(
    State(state): State<AppState>,
) -> Result<Json<Vec<SessionSummary>>, AppError> {
    let sessions = state.sessions.list_sessions().await?;
    Ok(Json(sessions))
}

/// GET /api/v1/sessions/:key/verify
pub async fn handle_verify_key(
    State(state): State<AppState>,
    Path(key): Path<Uuid>,
) -> Result<Json<KeyValidity>, AppError> {
    let validity = state.sessions.verify_key(key).await?;
    Ok(Json(validity))
}

#[derive(Deserialize)]
pub struct StartSessionRequest {
    pub user_name: String,
    pub role: String,
    pub duration_minutes: i32,
}

/// POST /api/v1/sessions/:key/start
pub async fn handle_start_session(
    State(state): State<AppState>,
    Path(key): Path<Uuid>,
    Json(req): Json<StartSessionRequest>,
) -> Result<StatusCode, AppError> {
    state
        .sessions
        .start_session(key, &req.user_name, &req.role, req.duration_minutes)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
pub struct SubmitTranscriptRequest {
    pub turns: Vec<Turn>,
}

/// POST /api/v1/sessions/:key/submit
pub async fn handle_submit_transcript(
    State(state): State<AppState>,
    Path(key): Path<Uuid>,
    Json(req): Json<SubmitTranscriptRequest>,
) -> Result<StatusCode, AppError> {
    state.sessions.submit_transcript(key, &req.turns).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/sessions/:key/report
pub async fn handle_get_report(
    State(state): State<AppState>,
    Path(key): Path<Uuid>,
) -> Result<Json<ReportOutcome>, AppError> {
    let report = state.sessions.get_report(key).await?;
    Ok(Json(report))
}
