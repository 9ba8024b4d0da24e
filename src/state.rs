//! Shared application state injected into every Axum handler.

use std::sync::Arc;

use crate::ai::ResponseGenerator;
use crate::config::Config;
use crate::db::sqlite::SqliteStore;
use crate::ocr::TextExtractor;
use crate::views::Pages;

/// State shared across all HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration (env-derived, immutable after startup).
    pub config: Arc<Config>,
    /// Persistent credential and chat-log store.
    pub store: Arc<SqliteStore>,
    /// Model backend producing chat replies.
    pub generator: Arc<dyn ResponseGenerator>,
    /// OCR engine for uploaded receipts.
    pub extractor: Arc<dyn TextExtractor>,
    /// Compiled page templates.
    pub pages: Arc<Pages>,
}
