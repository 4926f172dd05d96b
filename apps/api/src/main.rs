mod config;
mod db;
mod errors;
mod interview;
mod llm_client;
mod models;
mod resume;
mod routes;
mod session;
mod speech;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::db::create_pool;
use crate::llm_client::GeminiClient;
use crate::routes::build_router;
use crate::session::service::SessionService;
use crate::session::store::PgStore;
use crate::speech::SpeechClient;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Parley API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL
    let pool = create_pool(&config.database_url).await?;
    let store = Arc::new(PgStore::new(pool));

    // Initialize the generative backend
    let llm: Arc<dyn llm_client::GenerativeBackend> =
        Arc::new(GeminiClient::new(config.google_api_key.clone()));
    info!("Generative backend initialized (model: {})", llm_client::MODEL);

    // Initialize the speech client
    let speech = SpeechClient::new(config.google_api_key.clone());
    info!("Speech client initialized");

    // Build app state
    let state = AppState {
        sessions: SessionService::new(store, llm.clone()),
        llm,
        speech,
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: tighten CORS in production

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
