//! Cookie-session state: the signed-in user and the working transcript.
//!
//! The transcript lives in the session, not the database; it is the
//! conversation currently on screen.  Visiting the chat home starts it
//! over, and only completed turns are persisted to the chat log.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::response::Redirect;
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::warn;

use crate::error::ServerError;

/// Session key holding the signed-in user's ID.
const USER_ID_KEY: &str = "user_id";

/// Session key holding the working transcript.
const MESSAGES_KEY: &str = "messages";

/// One bubble in the transcript shown on the chat page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub text: String,
    pub is_user: bool,
}

impl TranscriptEntry {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_user: true,
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_user: false,
        }
    }
}

/// Mark `user_id` as signed in and start a fresh transcript.
pub async fn sign_in(session: &Session, user_id: i64) -> Result<(), ServerError> {
    session.insert(USER_ID_KEY, user_id).await?;
    session
        .insert(MESSAGES_KEY, Vec::<TranscriptEntry>::new())
        .await?;
    Ok(())
}

/// Drop the whole session: signed-in user, transcript, cookie.
pub async fn sign_out(session: &Session) -> Result<(), ServerError> {
    session.flush().await?;
    Ok(())
}

/// The working transcript (empty for a fresh session).
pub async fn transcript(session: &Session) -> Result<Vec<TranscriptEntry>, ServerError> {
    Ok(session
        .get::<Vec<TranscriptEntry>>(MESSAGES_KEY)
        .await?
        .unwrap_or_default())
}

/// Replace the working transcript.
pub async fn store_transcript(
    session: &Session,
    entries: &[TranscriptEntry],
) -> Result<(), ServerError> {
    session.insert(MESSAGES_KEY, entries).await?;
    Ok(())
}

/// Start the transcript over (visiting the chat home does this).
pub async fn reset_transcript(session: &Session) -> Result<(), ServerError> {
    session
        .insert(MESSAGES_KEY, Vec::<TranscriptEntry>::new())
        .await?;
    Ok(())
}

/// Extractor that requires a signed-in user.
///
/// Handlers taking [`AuthedUser`] never run for anonymous requests; the
/// browser is redirected to `/login` instead.
#[derive(Debug, Clone, Copy)]
pub struct AuthedUser(pub i64);

impl<S> FromRequestParts<S> for AuthedUser
where
    S: Send + Sync,
{
    type Rejection = Redirect;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let session = Session::from_request_parts(parts, state)
            .await
            .map_err(|(status, message)| {
                warn!(%status, message, "session layer unavailable; redirecting to login");
                Redirect::to("/login")
            })?;
        match session.get::<i64>(USER_ID_KEY).await {
            Ok(Some(user_id)) => Ok(AuthedUser(user_id)),
            Ok(None) => Err(Redirect::to("/login")),
            Err(e) => {
                warn!(error = %e, "failed to read session; redirecting to login");
                Err(Redirect::to("/login"))
            }
        }
    }
}
