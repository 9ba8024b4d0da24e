//! Unified server error type.
//!
//! Every handler returns `Result<T, ServerError>`, which implements
//! [`axum::response::IntoResponse`] so errors are automatically converted
//! to a minimal HTML response with an appropriate status code.
//!
//! **Security note:** Internal errors (Database, Session, Template) are logged
//! with full detail but only a generic message is returned to the caller so
//! that file paths, SQL, or other implementation details never leak to
//! clients. Expected failures (model API down, unreadable receipt) never reach
//! this type; the chat flow degrades them to in-chat messages instead.

use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use thiserror::Error;
use tracing::error;

/// All errors that can occur in the trackit-server request lifecycle.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Propagated from the SQLite (or other) store.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Propagated from the cookie-session layer.
    #[error("session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    /// A page template failed to render.
    #[error("template error: {0}")]
    Template(#[from] minijinja::Error),

    /// The caller sent an invalid or malformed request.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// An unclassified internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, client_message) = match &self {
            // Client-facing errors: expose the message directly.
            ServerError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),

            // Internal errors: log the full detail, return a generic message.
            ServerError::Database(e) => {
                error!(error = %e, "database error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Something went wrong. Please try again.".to_owned(),
                )
            }
            ServerError::Session(e) => {
                error!(error = %e, "session error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Something went wrong. Please try again.".to_owned(),
                )
            }
            ServerError::Template(e) => {
                error!(error = %e, "template render error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Something went wrong. Please try again.".to_owned(),
                )
            }
            ServerError::Internal(m) => {
                error!(message = %m, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Something went wrong. Please try again.".to_owned(),
                )
            }
        };
        let body = format!(
            "<!doctype html><html lang=\"en\"><head><meta charset=\"utf-8\">\
             <title>TrackIt</title></head><body><h1>TrackIt</h1>\
             <p>{client_message}</p><p><a href=\"/\">Back to chat</a></p></body></html>"
        );
        (status, Html(body)).into_response()
    }
}
