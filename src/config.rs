//! Server configuration, loaded from environment variables at startup.

use std::path::PathBuf;
use std::str::FromStr;

/// How an uploaded receipt is turned into a model answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiptStrategy {
    /// Preprocess the image locally, OCR it, and send the recognized text.
    Ocr,
    /// Upload the image to the model API and let the model read it directly.
    Vision,
}

impl FromStr for ReceiptStrategy {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ocr" => Ok(Self::Ocr),
            "vision" => Ok(Self::Vision),
            _ => Err(()),
        }
    }
}

/// Runtime configuration for trackit-server.
///
/// Every field has a sensible default so the server works out-of-the-box
/// without any environment variables set (model calls still need an API key).
#[derive(Debug, Clone)]
pub struct Config {
    /// TCP address to bind (default: `"0.0.0.0:8000"`).
    pub bind_address: String,

    /// SQLite (or other) database URL (default: `"sqlite://trackit.db"`).
    /// Supports any sqlx-compatible connection string – swap the scheme to
    /// migrate to Postgres (`postgres://…`).
    pub database_url: String,

    /// API key for the generative model backend. May be empty, in which case
    /// every model call degrades to the in-chat failure message.
    pub gemini_api_key: String,

    /// Model identifier passed to the generation endpoint
    /// (default: `"gemini-2.0-flash"`).
    pub model: String,

    /// Receipt handling strategy (default: [`ReceiptStrategy::Ocr`]).
    /// Unrecognized values fall back to the default; the active strategy is
    /// logged at startup.
    pub receipt_strategy: ReceiptStrategy,

    /// Directory where uploaded receipt images are written while a request
    /// is being processed (default: `"uploads"`). Created at startup.
    pub upload_dir: PathBuf,

    /// Command used to invoke the OCR engine (default: `"tesseract"`).
    pub tesseract_cmd: String,

    /// Maximum number of persisted turns returned by the history view
    /// (default: 50).
    pub history_limit: i64,

    /// `tracing` filter string, e.g. `"info"` or `"debug,tower_http=warn"`.
    pub log_level: String,

    /// When `true`, emit log records as newline-delimited JSON.
    pub log_json: bool,
}

impl Config {
    /// Build [`Config`] from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self {
            bind_address: env_or("TRACKIT_BIND", "0.0.0.0:8000"),
            database_url: env_or("TRACKIT_DATABASE_URL", "sqlite://trackit.db"),
            gemini_api_key: env_or("TRACKIT_GEMINI_API_KEY", ""),
            model: env_or("TRACKIT_MODEL", "gemini-2.0-flash"),
            receipt_strategy: parse_env("TRACKIT_RECEIPT_STRATEGY", ReceiptStrategy::Ocr),
            upload_dir: env_or("TRACKIT_UPLOAD_DIR", "uploads").into(),
            tesseract_cmd: env_or("TRACKIT_TESSERACT_CMD", "tesseract"),
            history_limit: parse_env("TRACKIT_HISTORY_LIMIT", 50),
            log_level: env_or("TRACKIT_LOG", "info"),
            log_json: std::env::var("TRACKIT_LOG_JSON")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
        }
    }
}

// ── private helpers ──────────────────────────────────────────────────────────

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}

fn parse_env<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
