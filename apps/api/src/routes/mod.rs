pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::interview::handlers as interview_handlers;
use crate::resume;
use crate::session::handlers as session_handlers;
use crate::speech;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Session lifecycle
        .route(
            "/api/v1/sessions",
            post(session_handlers::handle_issue_key).get(session_handlers::handle_list_sessions),
        )
        .route(
            "/api/v1/sessions/:key/verify",
            get(session_handlers::handle_verify_key),
        )
        .route(
            "/api/v1/sessions/:key/start",
            post(session_handlers::handle_start_session),
        )
        .route(
            "/api/v1/sessions/:key/submit",
            post(session_handlers::handle_submit_transcript),
        )
        .route(
            "/api/v1/sessions/:key/report",
            get(session_handlers::handle_get_report),
        )
        // Conversation
        .route("/api/v1/chat", post(interview_handlers::handle_chat))
        // Capabilities
        .route("/api/v1/resume", post(resume::handle_resume_upload))
        .route("/api/v1/tts", post(speech::handle_tts))
        .route("/api/v1/stt", post(speech::handle_stt))
        .with_state(state)
}
