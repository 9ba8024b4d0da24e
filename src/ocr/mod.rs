//! Receipt text extraction.
//!
//! [`TextExtractor`] is the seam between the chat flow and the OCR engine.
//! The default implementation is [`tesseract::TesseractExtractor`], which
//! shells out to the Tesseract CLI.  Extraction failures never become HTTP
//! errors; the chat flow substitutes a fixed retry message instead.

pub mod tesseract;

use async_trait::async_trait;
use thiserror::Error;

/// Failure modes of a text extraction.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// The uploaded bytes could not be decoded or re-encoded as an image.
    #[error("image processing failed: {0}")]
    Image(#[from] image::ImageError),

    /// Spawning or talking to the OCR engine failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The OCR engine ran past the deadline and was killed.
    #[error("OCR engine timed out")]
    Timeout,

    /// The OCR engine exited with a non-zero status.
    #[error("OCR engine exited with status {status}: {stderr}")]
    Engine { status: i32, stderr: String },

    /// The engine ran fine but recognized nothing.
    #[error("no text recognized in image")]
    NoText,
}

/// Pulls text out of an uploaded receipt image.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    /// Extract whatever text the engine can find in `image` (raw upload
    /// bytes, any common format).
    async fn extract_text(&self, image: &[u8]) -> Result<String, ExtractError>;
}
