//! Database abstraction layer.
//!
//! [`CredentialStore`] holds user accounts and [`ChatLogStore`] holds the
//! per-user chat log.  The default implementation of both is
//! [`sqlite::SqliteStore`].  To swap to another database (Postgres, …),
//! implement both traits for your new type and change the concrete type in
//! [`crate::state::AppState`].
//!
//! All trait methods use `impl Future` in their signatures (stable since Rust
//! 1.75) so no extra `async-trait` crate is required here.

pub mod sqlite;

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// A single row in the `chats` table: one user message paired with the
/// reply that was produced for it.
#[derive(Debug, Clone)]
pub struct ChatTurn {
    /// Auto-incremented row ID.
    pub chat_id: i64,
    /// Owner of the turn; history queries are always scoped to one user.
    pub user_id: i64,
    /// What the user sent (or the fixed receipt-upload marker).
    pub user_message: String,
    /// The reply that was shown for this turn.
    pub ai_response: String,
    /// When the turn was written.
    pub timestamp: DateTime<Utc>,
}

/// Failure modes of [`CredentialStore::register`].
#[derive(Debug, Error)]
pub enum RegisterError {
    /// The username is already taken.
    #[error("username already exists")]
    AlreadyExists,
    /// The store itself failed.
    #[error("store error: {0}")]
    Store(#[from] sqlx::Error),
}

/// Trait for account creation and credential verification.
///
/// Passwords never reach the store in clear text; both operations digest
/// them with [`hash_password`] first.
pub trait CredentialStore: Send + Sync + 'static {
    /// Create a new account and return its user ID.
    fn register(
        &self,
        username: &str,
        password: &str,
    ) -> impl std::future::Future<Output = Result<i64, RegisterError>> + Send;

    /// Check a username/password pair.  Returns the user ID on a match,
    /// `None` when either the user is unknown or the password is wrong.
    fn verify_login(
        &self,
        username: &str,
        password: &str,
    ) -> impl std::future::Future<Output = Result<Option<i64>, sqlx::Error>> + Send;
}

/// Trait for persisting and replaying completed chat turns.
pub trait ChatLogStore: Send + Sync + 'static {
    /// Append one completed turn for `user_id`.
    fn append_turn(
        &self,
        user_id: i64,
        user_message: &str,
        ai_response: &str,
    ) -> impl std::future::Future<Output = Result<(), sqlx::Error>> + Send;

    /// The most recent turns for `user_id`, newest first, at most `limit`.
    fn recent_turns(
        &self,
        user_id: i64,
        limit: i64,
    ) -> impl std::future::Future<Output = Result<Vec<ChatTurn>, sqlx::Error>> + Send;
}

/// Hex-encoded SHA-256 digest of a password, as stored in the `users` table.
pub fn hash_password(password: &str) -> String {
    hex::encode(Sha256::digest(password.as_bytes()))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn password_hash_is_stable_hex_sha256() {
        let digest = hash_password("hunter2");
        assert_eq!(digest.len(), 64);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(digest, hash_password("hunter2"));
        assert_ne!(digest, hash_password("hunter3"));
    }
}
