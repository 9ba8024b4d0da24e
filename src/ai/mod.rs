//! Response generation.
//!
//! [`ResponseGenerator`] is the seam between the chat flow and whatever
//! model backend produces replies.  The default implementation is
//! [`gemini::GeminiGenerator`]; tests substitute a stub.  The chat flow
//! never surfaces a [`GenerateError`] to the user as an HTTP error; every
//! failure degrades to an in-chat message instead.

pub mod gemini;

use async_trait::async_trait;
use thiserror::Error;

/// Fixed scope-enforcing preamble sent ahead of every user query.
pub const SYSTEM_PROMPT: &str = "You are an AI-based expense categorizer. Respond to queries about categorizing expenses or tracking financial management with helpful suggestions. Use natural, human-like language for out-of-scope queries, such as 'Hmm, I'm not really equipped to answer that—I'm all about expense tracking!', use more answers like this for out of scope queries'";

/// Instruction sent together with an uploaded receipt image when the
/// model reads the image directly ([`crate::config::ReceiptStrategy::Vision`]).
pub const RECEIPT_VISION_PROMPT: &str = "User uploaded a receipt image, attached to this request.\n\
Please:\n\
1. Identify and list individual expense items (e.g., item name, amount).\n\
2. Categorize each item (e.g., groceries, dining, utilities).\n\
3. Provide a total amount if possible.\n\
4. Summarize the receipt in a concise format.";

/// Categorization instruction wrapped around OCR output
/// ([`crate::config::ReceiptStrategy::Ocr`]).
pub fn receipt_text_prompt(extracted_text: &str) -> String {
    format!(
        "User uploaded a receipt with the following details:\n\
         {extracted_text}\n\
         Please:\n\
         1. Identify and list individual expense items (e.g., item name, amount).\n\
         2. Categorize each item (e.g., groceries, dining, utilities).\n\
         3. Provide a total amount if possible.\n\
         4. Summarize the receipt in a concise format."
    )
}

/// Failure modes of a generation call.
#[derive(Debug, Error)]
pub enum GenerateError {
    /// No API key was configured; the call was never attempted.
    #[error("no model API key configured")]
    MissingApiKey,

    /// The HTTP request itself failed (DNS, connect, timeout, body read).
    #[error("model request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The model API answered with a non-success status.
    #[error("model API returned status {status}: {body}")]
    Api { status: u16, body: String },

    /// The call succeeded but no usable text came back.
    #[error("model returned no text")]
    EmptyResponse,
}

/// Produces model replies for the chat flow.
#[async_trait]
pub trait ResponseGenerator: Send + Sync {
    /// Answer a plain text query.  Implementations prepend
    /// [`SYSTEM_PROMPT`] before sending.
    async fn generate(&self, query: &str) -> Result<String, GenerateError>;

    /// Answer a query about an attached image (receipt photo).
    async fn generate_with_image(
        &self,
        query: &str,
        image: &[u8],
        mime_type: &str,
    ) -> Result<String, GenerateError>;
}
