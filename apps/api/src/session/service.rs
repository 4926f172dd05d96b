//! Session Lifecycle Service — the façade composing the store with the
//! orchestrator and the report synthesizer.
//!
//! The service owns all persisted-state mutation; the orchestrator and the
//! synthesizer are pure functions over data handed to them.

use std::sync::Arc;

use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::interview::orchestrator::advance_conversation;
use crate::interview::prompts::PromptContext;
use crate::interview::report::{synthesize_report, DEFAULT_ROLE_LABEL};
use crate::llm_client::GenerativeBackend;
use crate::models::report::ReportOutcome;
use crate::models::session::{SessionStatus, SessionSummary, Turn};
use crate::session::store::{SessionStore, StartOutcome};

/// Why a key failed verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VerifyFailure {
    NotFound,
    AlreadyCompleted,
}

/// Read-only validity check result. Always reported, never thrown: clients
/// probe keys before starting and expect a 200 either way.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct KeyValidity {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<VerifyFailure>,
}

impl KeyValidity {
    fn valid() -> Self {
        Self {
            valid: true,
            reason: None,
        }
    }

    fn invalid(reason: VerifyFailure) -> Self {
        Self {
            valid: false,
            reason: Some(reason),
        }
    }
}

#[derive(Clone)]
pub struct SessionService {
    store: Arc<dyn SessionStore>,
    backend: Arc<dyn GenerativeBackend>,
}

impl SessionService {
    pub fn new(store: Arc<dyn SessionStore>, backend: Arc<dyn GenerativeBackend>) -> Self {
        Self { store, backend }
    }

    /// Issues a fresh single-use access key. Keys are never reused.
    pub async fn issue_key(&self) -> Result<Uuid, AppError> {
        let key = Uuid::new_v4();
        self.store.insert(key).await?;
        info!("Issued access key {key}");
        Ok(key)
    }

    /// Read-only key check: unknown and already-completed keys are invalid.
    pub async fn verify_key(&self, key: Uuid) -> Result<KeyValidity, AppError> {
        Ok(match self.store.fetch(key).await? {
            None => KeyValidity::invalid(VerifyFailure::NotFound),
            Some(row) if row.status == SessionStatus::Completed => {
                KeyValidity::invalid(VerifyFailure::AlreadyCompleted)
            }
            Some(_) => KeyValidity::valid(),
        })
    }

    /// Binds name/role/duration and starts the interview. Rejected with
    /// `InvalidState` for sessions past `pending`; the bound fields are
    /// immutable after the first successful start.
    pub async fn start_session(
        &self,
        key: Uuid,
        user_name: &str,
        role: &str,
        duration_minutes: i32,
    ) -> Result<(), AppError> {
        if user_name.trim().is_empty() {
            return Err(AppError::MalformedInput("user_name must not be empty".to_string()));
        }
        if duration_minutes <= 0 {
            return Err(AppError::MalformedInput(
                "duration_minutes must be positive".to_string(),
            ));
        }

        match self
            .store
            .mark_started(key, user_name.trim(), role.trim(), duration_minutes)
            .await?
        {
            StartOutcome::Started => {
                info!("Session {key} started for role '{role}' ({duration_minutes} min)");
                Ok(())
            }
            StartOutcome::NotFound => Err(AppError::NotFound(format!("unknown access key {key}"))),
            StartOutcome::WrongState(status) => Err(AppError::InvalidState(format!(
                "session {key} cannot be started from status {status:?}"
            ))),
        }
    }

    /// Produces the next interviewer utterance. The key must exist and must
    /// not belong to a completed session; the check is cheap validation before
    /// the paid generative call.
    pub async fn advance(
        &self,
        key: Uuid,
        history: &[Turn],
        ctx: &PromptContext,
    ) -> Result<String, AppError> {
        let validity = self.verify_key(key).await?;
        match validity.reason {
            Some(VerifyFailure::NotFound) => {
                return Err(AppError::NotFound(format!("unknown access key {key}")))
            }
            Some(VerifyFailure::AlreadyCompleted) => {
                return Err(AppError::InvalidState(format!(
                    "session {key} is already completed"
                )))
            }
            None => {}
        }

        advance_conversation(self.backend.as_ref(), history, ctx).await
    }

    /// Stores the final transcript verbatim and completes the session.
    /// Lenient gate: any known session completes, including one that was never
    /// started (pending → completed).
    pub async fn submit_transcript(&self, key: Uuid, turns: &[Turn]) -> Result<(), AppError> {
        if self.store.store_transcript(key, turns).await? {
            info!("Session {key} completed with {} turns", turns.len());
            Ok(())
        } else {
            Err(AppError::NotFound(format!("unknown access key {key}")))
        }
    }

    /// Regenerates the evaluation report from the frozen transcript. Reports
    /// are recomputed on every call, never cached.
    pub async fn get_report(&self, key: Uuid) -> Result<ReportOutcome, AppError> {
        let row = self
            .store
            .fetch(key)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("unknown access key {key}")))?;

        if row.transcript.0.is_empty() {
            return Err(AppError::NotFound(format!(
                "no transcript stored for session {key}"
            )));
        }

        let role = row.role.as_deref().unwrap_or(DEFAULT_ROLE_LABEL);
        synthesize_report(self.backend.as_ref(), &row.transcript.0, role).await
    }

    pub async fn list_sessions(&self) -> Result<Vec<SessionSummary>, AppError> {
        self.store.list().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interview::prompts::InterviewMode;
    use crate::llm_client::{GenerateOutcome, MockGenerativeBackend};
    use crate::models::session::Speaker;
    use crate::session::store::MemoryStore;

    fn service_with(backend: MockGenerativeBackend) -> SessionService {
        SessionService::new(Arc::new(MemoryStore::default()), Arc::new(backend))
    }

    fn turn(speaker: Speaker, text: &str) -> Turn {
        Turn {
            speaker,
            text: text.to_string(),
        }
    }

    #[tokio::test]
    async fn test_full_interview_lifecycle() {
        let mut backend = MockGenerativeBackend::new();
        backend
            .expect_generate_reply()
            .withf(|system, _, _| system.contains("Asha") && !system.contains("Asha Rao"))
            .returning(|_, _, _| {
                Ok(GenerateOutcome::Text(
                    "Hello Asha, welcome! We're interviewing for the Backend Engineer position \
                     today. Could you tell me about yourself?"
                        .to_string(),
                ))
            });
        backend.expect_generate_structured().returning(|_, _, _| {
            Ok(GenerateOutcome::Text(
                r#"{"overall_score": 7, "summary": "Promising.", "qa_analysis": [
                    {"question": "Tell me about yourself", "user_answer": "Background summary",
                     "rating": 7, "feedback": "Could be more specific",
                     "better_answer": "Lead with measurable outcomes"}
                ]}"#
                .to_string(),
            ))
        });
        let service = service_with(backend);

        let key = service.issue_key().await.unwrap();
        assert!(service.verify_key(key).await.unwrap().valid);

        service
            .start_session(key, "Asha Rao", "Backend Engineer", 20)
            .await
            .unwrap();

        let ctx = PromptContext {
            mode: InterviewMode::RoleBased {
                role: Some("Backend Engineer".to_string()),
                skills: Some("Rust, PostgreSQL".to_string()),
            },
            user_name: Some("Asha Rao".to_string()),
            time_left_minutes: Some(20.0),
        };
        let greeting = service.advance(key, &[], &ctx).await.unwrap();
        assert!(greeting.contains("Asha"));

        let transcript = vec![
            turn(Speaker::Interviewer, &greeting),
            turn(Speaker::Candidate, "I have five years of backend experience."),
            turn(Speaker::Interviewer, "What did you build most recently?"),
        ];
        service.submit_transcript(key, &transcript).await.unwrap();

        let validity = service.verify_key(key).await.unwrap();
        assert!(!validity.valid);
        assert_eq!(validity.reason, Some(VerifyFailure::AlreadyCompleted));

        let candidate_turns = transcript
            .iter()
            .filter(|t| t.speaker == Speaker::Candidate)
            .count();
        match service.get_report(key).await.unwrap() {
            ReportOutcome::Report(report) => {
                assert!((1..=10).contains(&report.overall_score));
                assert!(report.qa_analysis.len() <= candidate_turns);
            }
            ReportOutcome::Raw { .. } => panic!("expected a structured report"),
        }
    }

    #[tokio::test]
    async fn test_verify_unknown_key() {
        let service = service_with(MockGenerativeBackend::new());
        let validity = service.verify_key(Uuid::new_v4()).await.unwrap();
        assert!(!validity.valid);
        assert_eq!(validity.reason, Some(VerifyFailure::NotFound));
    }

    #[tokio::test]
    async fn test_double_start_is_rejected() {
        let service = service_with(MockGenerativeBackend::new());
        let key = service.issue_key().await.unwrap();

        service.start_session(key, "Asha Rao", "Backend Engineer", 20).await.unwrap();
        let err = service
            .start_session(key, "Mallory", "Imposter", 1)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));
    }

    #[tokio::test]
    async fn test_start_validates_inputs_before_touching_store() {
        let service = service_with(MockGenerativeBackend::new());
        let key = service.issue_key().await.unwrap();

        let err = service.start_session(key, "   ", "Role", 20).await.unwrap_err();
        assert!(matches!(err, AppError::MalformedInput(_)));

        let err = service.start_session(key, "Asha", "Role", 0).await.unwrap_err();
        assert!(matches!(err, AppError::MalformedInput(_)));

        // Still pending after the rejected attempts.
        assert!(service.verify_key(key).await.unwrap().valid);
    }

    #[tokio::test]
    async fn test_advance_rejects_completed_session_before_backend_call() {
        // No expectation registered: a backend call would panic the mock.
        let service = service_with(MockGenerativeBackend::new());
        let key = service.issue_key().await.unwrap();
        service
            .submit_transcript(key, &[turn(Speaker::Candidate, "hi")])
            .await
            .unwrap();

        let ctx = PromptContext {
            mode: InterviewMode::ResumeBased { resume_text: None },
            user_name: None,
            time_left_minutes: None,
        };
        let err = service.advance(key, &[], &ctx).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));
    }

    #[tokio::test]
    async fn test_report_requires_stored_transcript() {
        let service = service_with(MockGenerativeBackend::new());
        let key = service.issue_key().await.unwrap();

        let err = service.get_report(key).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_report_defaults_role_label_when_never_started() {
        let mut backend = MockGenerativeBackend::new();
        backend
            .expect_generate_structured()
            .withf(|_, prompt, _| prompt.contains(DEFAULT_ROLE_LABEL))
            .returning(|_, _, _| {
                Ok(GenerateOutcome::Text(
                    r#"{"overall_score": 3, "summary": "Sparse.", "qa_analysis": []}"#.to_string(),
                ))
            });
        let service = service_with(backend);

        let key = service.issue_key().await.unwrap();
        service
            .submit_transcript(key, &[turn(Speaker::Candidate, "hello")])
            .await
            .unwrap();
        assert!(service.get_report(key).await.is_ok());
    }
}
