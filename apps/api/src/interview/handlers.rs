use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;
use crate::interview::prompts::{InterviewMode, PromptContext};
use crate::models::session::Turn;
use crate::state::AppState;

/// Wire names match the two instruction templates: `position` interviews
/// against a target role + skills, `resume` against uploaded résumé text.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatMode {
    Position,
    Resume,
}

#[derive(Deserialize)]
pub struct ChatRequest {
    pub access_key: Uuid,
    pub mode: ChatMode,
    pub role: Option<String>,
    pub skills: Option<String>,
    pub resume_text: Option<String>,
    pub user_name: Option<String>,
    pub time_left_minutes: Option<f64>,
    pub history: Vec<Turn>,
}

#[derive(Serialize)]
pub struct ChatResponse {
    pub reply: String,
}

/// POST /api/v1/chat — advances the conversation by one interviewer utterance.
pub async fn handle_chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    let mode = match req.mode {
        ChatMode::Position => InterviewMode::RoleBased {
            role: req.role,
            skills: req.skills,
        },
        ChatMode::Resume => InterviewMode::ResumeBased {
            resume_text: req.resume_text,
        },
    };
    let ctx = PromptContext {
        mode,
        user_name: req.user_name,
        time_left_minutes: req.time_left_minutes,
    };

    let reply = state.sessions.advance(req.access_key, &req.history, &ctx).await?;
    Ok(Json(ChatResponse { reply }))
}
