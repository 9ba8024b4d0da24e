//! Chat routes: the conversation page, message handling, and history.
//!
//! `/chat` accepts a multipart form carrying a text query and/or a receipt
//! image and always answers with the re-rendered chat page.  Model and OCR
//! failures degrade to in-chat messages; only the unavailability of the
//! session or template layers surfaces as an HTTP error.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::Router;
use axum::extract::{Multipart, State};
use axum::response::Html;
use axum::routing::{get, post};
use tower_sessions::Session;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::ai::{RECEIPT_VISION_PROMPT, receipt_text_prompt};
use crate::config::ReceiptStrategy;
use crate::db::ChatLogStore;
use crate::error::ServerError;
use crate::session::{self, AuthedUser, TranscriptEntry};
use crate::state::AppState;

/// Fixed user-side marker shown and persisted for receipt turns.
const RECEIPT_UPLOADED: &str = "Receipt uploaded";

/// Shown when neither a query nor a receipt was submitted.
const PROMPT_FOR_INPUT: &str = "Please provide a query or upload a receipt.";

/// Shown (and persisted) when the receipt could not be read.
const UNREADABLE_RECEIPT: &str = "Sorry, I couldn’t read the receipt. Please upload a clearer image or type the details manually.";

/// Shown (never persisted) when the model backend is unavailable.
const GENERATION_UNAVAILABLE: &str =
    "Sorry, I couldn't come up with an answer just now. Please try again in a moment.";

/// Shown on the history view when no turns are stored.
const NO_PAST_CHATS: &str = "No past chats available.";

/// Register chat routes.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(home))
        .route("/chat", post(chat))
        .route("/view_past", get(view_past))
}

/// `GET /` – fresh chat page.  Starts the working transcript over.
async fn home(
    State(state): State<Arc<AppState>>,
    session: Session,
    AuthedUser(user_id): AuthedUser,
) -> Result<Html<String>, ServerError> {
    debug!(user_id, "starting fresh chat");
    session::reset_transcript(&session).await?;
    state.pages.chat(&[], false)
}

/// `POST /chat` – handle one submission and re-render the chat page.
async fn chat(
    State(state): State<Arc<AppState>>,
    session: Session,
    AuthedUser(user_id): AuthedUser,
    multipart: Multipart,
) -> Result<Html<String>, ServerError> {
    let submission = read_submission(multipart).await?;
    let mut messages = session::transcript(&session).await?;

    if let Some(receipt) = submission.receipt {
        let (reply, persist) = answer_receipt(&state, &receipt).await;
        messages.push(TranscriptEntry::user(RECEIPT_UPLOADED));
        messages.push(TranscriptEntry::model(reply.clone()));
        if persist {
            state
                .store
                .append_turn(user_id, RECEIPT_UPLOADED, &reply)
                .await
                .unwrap_or_else(|e| warn!(error = %e, "failed to persist receipt turn"));
        }
    } else if !submission.query.is_empty() {
        let query = submission.query;
        messages.push(TranscriptEntry::user(query.clone()));
        match state.generator.generate(&query).await {
            Ok(reply) => {
                messages.push(TranscriptEntry::model(reply.clone()));
                state
                    .store
                    .append_turn(user_id, &query, &reply)
                    .await
                    .unwrap_or_else(|e| warn!(error = %e, "failed to persist chat turn"));
            }
            Err(e) => {
                warn!(error = %e, "response generation failed");
                messages.push(TranscriptEntry::model(GENERATION_UNAVAILABLE));
            }
        }
    } else {
        messages.push(TranscriptEntry::model(PROMPT_FOR_INPUT));
    }

    session::store_transcript(&session, &messages).await?;
    state.pages.chat(&messages, false)
}

/// `GET /view_past` – the persisted history, newest first, input form hidden.
async fn view_past(
    State(state): State<Arc<AppState>>,
    AuthedUser(user_id): AuthedUser,
) -> Result<Html<String>, ServerError> {
    let turns = match state
        .store
        .recent_turns(user_id, state.config.history_limit)
        .await
    {
        Ok(turns) => turns,
        Err(e) => {
            warn!(error = %e, user_id, "failed to load chat history");
            Vec::new()
        }
    };
    if turns.is_empty() {
        let messages = [TranscriptEntry::model(NO_PAST_CHATS)];
        return state.pages.chat(&messages, true);
    }
    let mut messages = Vec::with_capacity(turns.len() * 2);
    for turn in turns {
        messages.push(TranscriptEntry::user(turn.user_message));
        messages.push(TranscriptEntry::model(format!(
            "{}, Time - {}",
            turn.ai_response,
            turn.timestamp.format("%Y-%m-%d %H:%M:%S")
        )));
    }
    state.pages.chat(&messages, true)
}

// ── Submission parsing ────────────────────────────────────────────────────────

/// Parsed `/chat` form: the text field plus an optional usable upload.
struct ChatSubmission {
    query: String,
    receipt: Option<ReceiptUpload>,
}

struct ReceiptUpload {
    file_name: String,
    content_type: String,
    bytes: Vec<u8>,
}

/// Read the multipart form.  Unknown fields (such as the submit button's
/// `action` value) are accepted and ignored.  A file field with an empty
/// filename is what browsers send when no file was chosen.
async fn read_submission(mut multipart: Multipart) -> Result<ChatSubmission, ServerError> {
    let mut query = String::new();
    let mut receipt = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::BadRequest(format!("invalid multipart form: {e}")))?
    {
        match field.name().unwrap_or("") {
            "query" => {
                query = field
                    .text()
                    .await
                    .map_err(|e| ServerError::BadRequest(format!("unreadable query field: {e}")))?;
            }
            "receipt_image" => {
                let file_name = field.file_name().unwrap_or("").to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ServerError::BadRequest(format!("unreadable file field: {e}")))?;
                if !file_name.is_empty() {
                    receipt = Some(ReceiptUpload {
                        file_name,
                        content_type,
                        bytes: bytes.to_vec(),
                    });
                }
            }
            _ => {}
        }
    }
    Ok(ChatSubmission {
        query: query.trim().to_owned(),
        receipt,
    })
}

// ── Receipt handling ──────────────────────────────────────────────────────────

/// Produce the reply for an uploaded receipt.  The boolean says whether the
/// turn belongs in the chat log: readable receipts and the unreadable-receipt
/// notice are part of the conversation; a model outage is not.
async fn answer_receipt(state: &AppState, receipt: &ReceiptUpload) -> (String, bool) {
    let staged = stage_upload(state, receipt).await;

    let outcome = match state.config.receipt_strategy {
        ReceiptStrategy::Ocr => answer_via_ocr(state, receipt).await,
        ReceiptStrategy::Vision => answer_via_vision(state, receipt).await,
    };

    if let Some(dir) = staged {
        cleanup_upload(&dir).await;
    }
    outcome
}

async fn answer_via_ocr(state: &AppState, receipt: &ReceiptUpload) -> (String, bool) {
    let extracted = match state.extractor.extract_text(&receipt.bytes).await {
        Ok(text) => text,
        Err(e) => {
            warn!(error = %e, file_name = %receipt.file_name, "receipt extraction failed");
            return (UNREADABLE_RECEIPT.to_owned(), true);
        }
    };
    debug!(chars = extracted.len(), "receipt text extracted");
    match state
        .generator
        .generate(&receipt_text_prompt(&extracted))
        .await
    {
        Ok(reply) => (reply, true),
        Err(e) => {
            warn!(error = %e, "response generation failed for receipt");
            (GENERATION_UNAVAILABLE.to_owned(), false)
        }
    }
}

async fn answer_via_vision(state: &AppState, receipt: &ReceiptUpload) -> (String, bool) {
    match state
        .generator
        .generate_with_image(RECEIPT_VISION_PROMPT, &receipt.bytes, &receipt.content_type)
        .await
    {
        Ok(reply) => (reply, true),
        Err(e) => {
            warn!(error = %e, "vision generation failed for receipt");
            (GENERATION_UNAVAILABLE.to_owned(), false)
        }
    }
}

/// Write the upload under a randomized directory inside the configured
/// upload dir.  Returns the directory for later cleanup, or `None` if
/// staging failed; the answer is produced from the in-memory bytes either
/// way, so staging failures only log.
async fn stage_upload(state: &AppState, receipt: &ReceiptUpload) -> Option<PathBuf> {
    let dir = state
        .config
        .upload_dir
        .join(format!("receipt-{}", Uuid::new_v4()));
    if let Err(e) = tokio::fs::create_dir_all(&dir).await {
        warn!(dir = %dir.display(), error = %e, "failed to create upload directory");
        return None;
    }
    let path = dir.join(sanitize_filename(&receipt.file_name));
    if let Err(e) = tokio::fs::write(&path, &receipt.bytes).await {
        warn!(path = %path.display(), error = %e, "failed to stage receipt upload");
        let _ = tokio::fs::remove_dir(&dir).await;
        return None;
    }
    info!(
        path = %path.display(),
        size_bytes = receipt.bytes.len(),
        "staged receipt upload"
    );
    Some(dir)
}

async fn cleanup_upload(dir: &Path) {
    if let Err(e) = tokio::fs::remove_dir_all(dir).await {
        warn!(dir = %dir.display(), error = %e, "failed to remove staged upload");
    }
}

/// Sanitize a browser-supplied filename to prevent directory traversal.
fn sanitize_filename(filename: &str) -> String {
    let cleaned: String = filename
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '.' || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.trim_matches('.').is_empty() {
        "receipt".to_owned()
    } else {
        cleaned
    }
}
