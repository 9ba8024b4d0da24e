//! Axum router construction.
//!
//! [`build`] assembles the complete application router, including:
//! - Cookie-session layer (in-memory store; sessions end with the browser)
//! - Request tracing layer
//! - Health / heartbeat route
//! - Account routes (`/login`, `/register`, `/logout`)
//! - Chat routes (`/`, `/chat`, `/view_past`)

mod auth;
mod chat;
mod health;

use std::sync::Arc;

use axum::Router;
use tower_http::trace::TraceLayer;
use tower_sessions::{MemoryStore, SessionManagerLayer};

use crate::state::AppState;

// ── Router builder ────────────────────────────────────────────────────────────

/// Build the complete Axum [`Router`] for the application.
pub fn build(state: Arc<AppState>) -> Router {
    // Sessions are cookie-keyed, stored in process memory, and expire with
    // the browser session.  `with_secure(false)` because the server speaks
    // plain HTTP; a TLS-terminating proxy is expected in front of it.
    let session_layer = SessionManagerLayer::new(MemoryStore::default()).with_secure(false);

    Router::new()
        .merge(health::router())
        .merge(auth::router())
        .merge(chat::router())
        .layer(session_layer)
        // Outermost layers execute first on the way in.
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
