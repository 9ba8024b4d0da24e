//! SQLite implementation of [`CredentialStore`] and [`ChatLogStore`].
//!
//! Uses [`sqlx`] with the `sqlite` feature.  Migrations are run automatically
//! on startup via [`SqliteStore::connect`].
//!
//! # Migrations path
//!
//! `sqlx::migrate!("./migrations")` resolves the path **at compile time**
//! relative to `CARGO_MANIFEST_DIR` (the crate root), so the directory is
//! embedded into the binary.  The database file location is determined at
//! runtime by the `TRACKIT_DATABASE_URL` environment variable and is **not**
//! related to the current working directory at runtime.
//!
//! # Legacy databases
//!
//! Databases written before chat history was scoped per user have a `chats`
//! table without a `user_id` column.  [`SqliteStore::connect`] detects this
//! and adds the column in place; rows from before the upgrade keep a NULL
//! `user_id` and are invisible to every scoped query.
//!
//! # Queries
//!
//! The `sqlx::query` (runtime-verified) form is used deliberately so that no
//! `DATABASE_URL` environment variable is needed at compile time.

use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tracing::{info, warn};

use super::{ChatLogStore, ChatTurn, CredentialStore, RegisterError, hash_password};

/// SQLite-backed credential and chat-log store.
#[derive(Clone, Debug)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) the SQLite database at `url`, run pending migrations,
    /// and upgrade a legacy `chats` table if needed.
    ///
    /// `url` should be a sqlx-compatible SQLite URL, e.g.
    /// `"sqlite://trackit.db"` or `"sqlite::memory:"` for tests.
    pub async fn connect(url: &str) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        // An in-memory SQLite database lives inside a single connection, so
        // it needs a one-connection pool that never reaps its idle member.
        let in_memory = url.contains(":memory:") || url.contains("mode=memory");
        let pool = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?
        } else {
            SqlitePoolOptions::new().connect_with(options).await?
        };
        // Path is resolved relative to CARGO_MANIFEST_DIR at compile time.
        sqlx::migrate!("./migrations").run(&pool).await?;
        let store = Self { pool };
        store.ensure_user_column().await?;
        Ok(store)
    }

    /// Add `chats.user_id` when connecting to a database created before
    /// history was scoped per user.  Idempotent.
    async fn ensure_user_column(&self) -> Result<(), sqlx::Error> {
        let (present,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM pragma_table_info('chats') WHERE name = 'user_id'",
        )
        .fetch_one(&self.pool)
        .await?;
        if present == 0 {
            sqlx::query("ALTER TABLE chats ADD COLUMN user_id INTEGER")
                .execute(&self.pool)
                .await?;
            info!("added user_id column to legacy chats table");
        }
        Ok(())
    }
}

// ── CredentialStore ───────────────────────────────────────────────────────────

impl CredentialStore for SqliteStore {
    async fn register(&self, username: &str, password: &str) -> Result<i64, RegisterError> {
        let digest = hash_password(password);
        let result = sqlx::query("INSERT INTO users (username, password) VALUES (?1, ?2)")
            .bind(username)
            .bind(&digest)
            .execute(&self.pool)
            .await;
        match result {
            Ok(done) => Ok(done.last_insert_rowid()),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(RegisterError::AlreadyExists)
            }
            Err(e) => Err(RegisterError::Store(e)),
        }
    }

    async fn verify_login(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Option<i64>, sqlx::Error> {
        let digest = hash_password(password);
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT user_id FROM users WHERE username = ?1 AND password = ?2")
                .bind(username)
                .bind(&digest)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|(id,)| id))
    }
}

// ── ChatLogStore ──────────────────────────────────────────────────────────────

impl ChatLogStore for SqliteStore {
    async fn append_turn(
        &self,
        user_id: i64,
        user_message: &str,
        ai_response: &str,
    ) -> Result<(), sqlx::Error> {
        let timestamp = Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO chats (user_id, user_message, ai_response, timestamp) \
             VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(user_id)
        .bind(user_message)
        .bind(ai_response)
        .bind(&timestamp)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn recent_turns(&self, user_id: i64, limit: i64) -> Result<Vec<ChatTurn>, sqlx::Error> {
        let rows: Vec<(i64, String, String, String)> = sqlx::query_as(
            "SELECT chat_id, user_message, ai_response, timestamp \
             FROM chats WHERE user_id = ?1 \
             ORDER BY timestamp DESC, chat_id DESC LIMIT ?2",
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|(chat_id, user_message, ai_response, timestamp)| ChatTurn {
                chat_id,
                user_id,
                user_message,
                ai_response,
                timestamp: parse_timestamp(&timestamp),
            })
            .collect())
    }
}

/// Parse a stored timestamp.  New rows are written as RFC 3339; rows written
/// by the pre-scoping schema carry SQLite's `CURRENT_TIMESTAMP` format
/// (`YYYY-MM-DD HH:MM:SS`, UTC).
fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|naive| naive.and_utc())
        })
        .unwrap_or_else(|e| {
            warn!(raw = %raw, error = %e, "unparseable chat timestamp; substituting now");
            Utc::now()
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn memory_store() -> SqliteStore {
        SqliteStore::connect("sqlite::memory:").await.unwrap()
    }

    #[tokio::test]
    async fn register_then_login_round_trip() {
        let store = memory_store().await;
        let id = store.register("alice", "secret").await.unwrap();
        assert!(id > 0);
        let found = store.verify_login("alice", "secret").await.unwrap();
        assert_eq!(found, Some(id));
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_user_are_rejected() {
        let store = memory_store().await;
        store.register("bob", "secret").await.unwrap();
        assert_eq!(store.verify_login("bob", "wrong").await.unwrap(), None);
        assert_eq!(store.verify_login("nobody", "secret").await.unwrap(), None);
    }

    #[tokio::test]
    async fn duplicate_username_is_reported() {
        let store = memory_store().await;
        store.register("carol", "one").await.unwrap();
        let err = store.register("carol", "two").await.unwrap_err();
        assert!(matches!(err, RegisterError::AlreadyExists));
    }

    #[tokio::test]
    async fn passwords_are_stored_as_digests() {
        let store = memory_store().await;
        store.register("dave", "plaintext").await.unwrap();
        let (stored,): (String,) =
            sqlx::query_as("SELECT password FROM users WHERE username = 'dave'")
                .fetch_one(&store.pool)
                .await
                .unwrap();
        assert_ne!(stored, "plaintext");
        assert_eq!(stored, hash_password("plaintext"));
    }

    #[tokio::test]
    async fn history_is_scoped_capped_and_newest_first() {
        let store = memory_store().await;
        let alice = store.register("alice", "pw").await.unwrap();
        let bob = store.register("bob", "pw").await.unwrap();
        for i in 0..3 {
            store
                .append_turn(alice, &format!("question {i}"), &format!("answer {i}"))
                .await
                .unwrap();
        }
        store.append_turn(bob, "bob question", "bob answer").await.unwrap();

        let turns = store.recent_turns(alice, 2).await.unwrap();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].user_message, "question 2");
        assert_eq!(turns[1].user_message, "question 1");
        assert!(turns.iter().all(|t| t.user_id == alice));

        let bobs = store.recent_turns(bob, 50).await.unwrap();
        assert_eq!(bobs.len(), 1);
        assert_eq!(bobs[0].ai_response, "bob answer");
    }

    #[tokio::test]
    async fn empty_history_is_empty_not_an_error() {
        let store = memory_store().await;
        let id = store.register("erin", "pw").await.unwrap();
        assert!(store.recent_turns(id, 50).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn legacy_timestamp_format_is_parsed() {
        let store = memory_store().await;
        let id = store.register("frank", "pw").await.unwrap();
        sqlx::query(
            "INSERT INTO chats (user_id, user_message, ai_response, timestamp) \
             VALUES (?1, 'old', 'row', '2024-03-01 10:00:00')",
        )
        .bind(id)
        .execute(&store.pool)
        .await
        .unwrap();

        let turns = store.recent_turns(id, 10).await.unwrap();
        assert_eq!(turns.len(), 1);
        assert_eq!(
            turns[0].timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            "2024-03-01 10:00:00"
        );
    }

    #[tokio::test]
    async fn legacy_database_gains_user_id_column() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}/legacy.db", dir.path().display());

        // Build the pre-scoping schema by hand: chats without user_id.
        {
            let options = SqliteConnectOptions::from_str(&url)
                .unwrap()
                .create_if_missing(true);
            let pool = SqlitePoolOptions::new()
                .max_connections(1)
                .connect_with(options)
                .await
                .unwrap();
            sqlx::query(
                "CREATE TABLE users (user_id INTEGER PRIMARY KEY AUTOINCREMENT, \
                 username TEXT UNIQUE NOT NULL, password TEXT NOT NULL)",
            )
            .execute(&pool)
            .await
            .unwrap();
            sqlx::query(
                "CREATE TABLE chats (chat_id INTEGER PRIMARY KEY AUTOINCREMENT, \
                 user_message TEXT NOT NULL, ai_response TEXT NOT NULL, \
                 timestamp DATETIME DEFAULT CURRENT_TIMESTAMP)",
            )
            .execute(&pool)
            .await
            .unwrap();
            pool.close().await;
        }

        let store = SqliteStore::connect(&url).await.unwrap();
        let id = store.register("grace", "pw").await.unwrap();
        store.append_turn(id, "hello", "hi").await.unwrap();
        assert_eq!(store.recent_turns(id, 10).await.unwrap().len(), 1);

        // Reconnecting must not try to add the column twice.
        drop(store);
        let store = SqliteStore::connect(&url).await.unwrap();
        assert_eq!(store.recent_turns(id, 10).await.unwrap().len(), 1);
    }
}
