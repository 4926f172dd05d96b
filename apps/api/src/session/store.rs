//! Session Store — durable key-value persistence for interview sessions.
//!
//! Pure persistence plus state legality; business rules live in the lifecycle
//! service. Every mutating operation is a single guarded statement, so
//! concurrent writers against one key are linearized by the row lock and a
//! stale read can never overwrite a newer write. Distinct keys never contend.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::session::{SessionRow, SessionStatus, SessionSummary, Turn};

/// Result of attempting the `pending → in_progress` transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    NotFound,
    /// The session exists but is past `pending`; its fields were not touched.
    WrongState(SessionStatus),
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Creates a fresh `pending` row with an empty transcript.
    async fn insert(&self, key: Uuid) -> Result<(), AppError>;

    async fn fetch(&self, key: Uuid) -> Result<Option<SessionRow>, AppError>;

    /// Binds name/role/duration and moves `pending → in_progress`, guarded so
    /// the fields are set exactly once.
    async fn mark_started(
        &self,
        key: Uuid,
        user_name: &str,
        role: &str,
        duration_minutes: i32,
    ) -> Result<StartOutcome, AppError>;

    /// Stores the turn sequence verbatim and moves the session to `completed`
    /// whatever its prior status (lenient gate: a direct pending→completed
    /// jump is tolerated). Returns `false` for an unknown key.
    async fn store_transcript(&self, key: Uuid, turns: &[Turn]) -> Result<bool, AppError>;

    async fn list(&self) -> Result<Vec<SessionSummary>, AppError>;
}

// ────────────────────────────────────────────────────────────────────────────
// Postgres store
// ────────────────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionStore for PgStore {
    async fn insert(&self, key: Uuid) -> Result<(), AppError> {
        sqlx::query("INSERT INTO sessions (access_key) VALUES ($1)")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn fetch(&self, key: Uuid) -> Result<Option<SessionRow>, AppError> {
        let row: Option<SessionRow> = sqlx::query_as(
            r#"
            SELECT access_key, created_at, user_name, role, duration_minutes, status, transcript
            FROM sessions
            WHERE access_key = $1
            "#,
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn mark_started(
        &self,
        key: Uuid,
        user_name: &str,
        role: &str,
        duration_minutes: i32,
    ) -> Result<StartOutcome, AppError> {
        // Status guard in the statement itself: a second starter loses the race
        // at the row, not in application code.
        let result = sqlx::query(
            r#"
            UPDATE sessions
            SET user_name = $2, role = $3, duration_minutes = $4, status = 'in_progress'
            WHERE access_key = $1 AND status = 'pending'
            "#,
        )
        .bind(key)
        .bind(user_name)
        .bind(role)
        .bind(duration_minutes)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            return Ok(StartOutcome::Started);
        }

        match self.fetch(key).await? {
            None => Ok(StartOutcome::NotFound),
            Some(row) => Ok(StartOutcome::WrongState(row.status)),
        }
    }

    async fn store_transcript(&self, key: Uuid, turns: &[Turn]) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE sessions
            SET transcript = $2, status = 'completed'
            WHERE access_key = $1
            "#,
        )
        .bind(key)
        .bind(sqlx::types::Json(turns))
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn list(&self) -> Result<Vec<SessionSummary>, AppError> {
        let rows: Vec<SessionSummary> = sqlx::query_as(
            r#"
            SELECT access_key, created_at, user_name, role, status,
                   jsonb_array_length(transcript)::bigint AS turn_count
            FROM sessions
            ORDER BY created_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// In-memory store
// ────────────────────────────────────────────────────────────────────────────

/// Map-backed store with the same transition semantics as [`PgStore`].
/// Backs unit tests and local development without Postgres; the single mutex
/// trivially serializes writers.
#[derive(Default)]
pub struct MemoryStore {
    rows: Mutex<HashMap<Uuid, SessionRow>>,
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn insert(&self, key: Uuid) -> Result<(), AppError> {
        let mut rows = self.rows.lock().await;
        rows.insert(
            key,
            SessionRow {
                access_key: key,
                created_at: Utc::now(),
                user_name: None,
                role: None,
                duration_minutes: None,
                status: SessionStatus::Pending,
                transcript: sqlx::types::Json(Vec::new()),
            },
        );
        Ok(())
    }

    async fn fetch(&self, key: Uuid) -> Result<Option<SessionRow>, AppError> {
        Ok(self.rows.lock().await.get(&key).cloned())
    }

    async fn mark_started(
        &self,
        key: Uuid,
        user_name: &str,
        role: &str,
        duration_minutes: i32,
    ) -> Result<StartOutcome, AppError> {
        let mut rows = self.rows.lock().await;
        let Some(row) = rows.get_mut(&key) else {
            return Ok(StartOutcome::NotFound);
        };
        if row.status != SessionStatus::Pending {
            return Ok(StartOutcome::WrongState(row.status));
        }
        row.user_name = Some(user_name.to_string());
        row.role = Some(role.to_string());
        row.duration_minutes = Some(duration_minutes);
        row.status = SessionStatus::InProgress;
        Ok(StartOutcome::Started)
    }

    async fn store_transcript(&self, key: Uuid, turns: &[Turn]) -> Result<bool, AppError> {
        let mut rows = self.rows.lock().await;
        let Some(row) = rows.get_mut(&key) else {
            return Ok(false);
        };
        row.transcript = sqlx::types::Json(turns.to_vec());
        row.status = SessionStatus::Completed;
        Ok(true)
    }

    async fn list(&self) -> Result<Vec<SessionSummary>, AppError> {
        let rows = self.rows.lock().await;
        let mut summaries: Vec<SessionSummary> = rows
            .values()
            .map(|row| SessionSummary {
                access_key: row.access_key,
                created_at: row.created_at,
                user_name: row.user_name.clone(),
                role: row.role.clone(),
                status: row.status,
                turn_count: row.transcript.0.len() as i64,
            })
            .collect();
        summaries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(summaries)
    }
}
