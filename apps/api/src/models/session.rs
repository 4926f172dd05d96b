use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Lifecycle state of an interview session. Transitions are monotonic:
/// `Pending → InProgress → Completed`, never backward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "session_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Pending,
    InProgress,
    Completed,
}

/// Who produced a turn: the interviewer persona or the candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    Interviewer,
    Candidate,
}

/// One utterance in the interview transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub speaker: Speaker,
    pub text: String,
}

/// A persisted interview session row. `transcript` is stored as JSONB and is
/// append-only while in progress, frozen once completed.
#[derive(Debug, Clone, FromRow)]
pub struct SessionRow {
    pub access_key: Uuid,
    pub created_at: DateTime<Utc>,
    pub user_name: Option<String>,
    pub role: Option<String>,
    pub duration_minutes: Option<i32>,
    pub status: SessionStatus,
    pub transcript: sqlx::types::Json<Vec<Turn>>,
}

/// Operator-facing summary of a session (no transcript body).
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct SessionSummary {
    pub access_key: Uuid,
    pub created_at: DateTime<Utc>,
    pub user_name: Option<String>,
    pub role: Option<String>,
    pub status: SessionStatus,
    pub turn_count: i64,
}
