//! HTTP server setup and routing
//!
//! Sets up the Axum server with curriculum, admin, flashcard, auth,
//! profile and SSE routes.

use crate::api::handlers;
use crate::api::sse;
use crate::auth::AuthGate;
use crate::state::{ProfileState, SharedState};
use axum::{
    Router,
    routing::{delete, get, post, put},
};
use std::net::SocketAddr;
use std::sync::Arc;
use studyhall_common::store::RemoteStore;
use studyhall_common::{Error, Result};
use tower_http::cors::CorsLayer;
use tracing::info;

/// Shared application context passed to all handlers
///
/// **Note:** AppContext implements Clone, which gives us `FromRef<AppContext>`
/// for free via Axum's blanket implementation.
#[derive(Clone)]
pub struct AppContext {
    pub state: Arc<SharedState>,
    pub store: Arc<dyn RemoteStore>,
    pub gate: Arc<AuthGate>,
    pub profile: Arc<ProfileState>,
    /// Substitute the bundled dataset when the remote read fails
    pub fallback_to_bundled: bool,
}

/// Build the full route table
pub fn create_router(ctx: AppContext) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        // Curriculum snapshot
        .route("/curriculum", get(handlers::get_curriculum))
        .route("/curriculum/reload", post(handlers::reload_curriculum))
        .route("/curriculum/seed", post(handlers::seed_bundled))
        // Ancestor-annotated lookups
        .route("/curriculum/subjects/:id", get(handlers::lookup_subject))
        .route("/lookup/chapter/:id", get(handlers::lookup_chapter))
        .route("/lookup/topic/:id", get(handlers::lookup_topic))
        .route("/lookup/subtopic/:id", get(handlers::lookup_subtopic))
        // Admin CRUD
        .route("/subjects", post(handlers::create_subject))
        .route("/subjects/:id", put(handlers::update_subject))
        .route("/subjects/:id", delete(handlers::delete_subject))
        .route("/chapters", post(handlers::create_chapter))
        .route("/chapters/:id", put(handlers::update_chapter))
        .route("/chapters/:id", delete(handlers::delete_chapter))
        .route("/topics", post(handlers::create_topic))
        .route("/topics/:id", put(handlers::update_topic))
        .route("/topics/:id", delete(handlers::delete_topic))
        .route("/subtopics", post(handlers::create_subtopic))
        .route("/subtopics/:id", put(handlers::update_subtopic))
        .route("/subtopics/:id", delete(handlers::delete_subtopic))
        // Flashcards
        .route("/chapters/:id/flashcards", get(handlers::list_flashcards))
        .route("/chapters/:id/flashcards", post(handlers::create_flashcard))
        .route("/flashcards/:id", put(handlers::update_flashcard))
        .route("/flashcards/:id", delete(handlers::delete_flashcard))
        // Auth
        .route("/auth/session", get(handlers::get_session))
        .route("/auth/login", post(handlers::login))
        .route("/auth/bypass", post(handlers::login_bypass))
        .route("/auth/logout", post(handlers::logout))
        // Local profile
        .route("/profile/theme", get(handlers::get_theme))
        .route("/profile/theme", put(handlers::set_theme))
        .route("/profile/progress", get(handlers::get_progress))
        .route("/profile/progress/:chapter_id", put(handlers::update_progress))
        // SSE events
        .route("/events", get(sse::event_stream))
        .layer(CorsLayer::permissive())
        .with_state(ctx)
}

/// Run the HTTP API server until a shutdown signal arrives
pub async fn run(port: u16, ctx: AppContext) -> Result<()> {
    let app = create_router(ctx);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("HTTP server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| Error::Internal(format!("HTTP server error: {}", e)))?;

    Ok(())
}

/// Resolve on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
