use std::sync::Arc;

use crate::llm_client::GenerativeBackend;
use crate::session::service::SessionService;
use crate::speech::SpeechClient;

/// Shared application state injected into all route handlers via Axum extractors.
///
/// Capability handles are explicit constructor parameters, never ambient
/// globals: the generative backend and the store travel inside the session
/// service, and tests swap them for mocks.
#[derive(Clone)]
pub struct AppState {
    pub sessions: SessionService,
    /// Direct backend handle for capabilities outside the session lifecycle
    /// (résumé name extraction).
    pub llm: Arc<dyn GenerativeBackend>,
    pub speech: SpeechClient,
}
