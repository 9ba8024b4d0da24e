//! Tesseract CLI implementation of [`TextExtractor`].
//!
//! The image is preprocessed in-process (grayscale, hard threshold) and
//! written to a randomized temp file, then `tesseract <file> stdout` is run
//! as a subprocess.  Keeping the engine out-of-process means a crash or
//! hang in Tesseract can never take the server down with it.

use image::GrayImage;
use tokio::process::Command;
use tokio::time::{Duration, timeout};
use tracing::{debug, warn};
use uuid::Uuid;

use super::{ExtractError, TextExtractor};

const OCR_TIMEOUT: Duration = Duration::from_secs(60);

/// Pixels below this luma become black, the rest white.
const BINARIZE_THRESHOLD: u8 = 128;

/// [`TextExtractor`] backed by the Tesseract CLI.
pub struct TesseractExtractor {
    command: String,
}

impl TesseractExtractor {
    /// `command` is the engine binary to invoke, usually just `"tesseract"`
    /// (resolved via `PATH`).
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

/// Grayscale plus hard-threshold binarization.  Receipt photos taken in
/// poor light OCR noticeably better as pure black-and-white.
fn binarize(image: &[u8]) -> Result<GrayImage, ExtractError> {
    let mut gray = image::load_from_memory(image)?.to_luma8();
    for pixel in gray.pixels_mut() {
        pixel.0[0] = if pixel.0[0] < BINARIZE_THRESHOLD { 0 } else { 255 };
    }
    Ok(gray)
}

#[async_trait::async_trait]
impl TextExtractor for TesseractExtractor {
    async fn extract_text(&self, image: &[u8]) -> Result<String, ExtractError> {
        let input_path = std::env::temp_dir().join(format!("trackit_ocr_{}.png", Uuid::new_v4()));

        // Decode, binarize, and re-encode on a blocking thread.
        let bytes = image.to_vec();
        let write_path = input_path.clone();
        tokio::task::spawn_blocking(move || -> Result<(), ExtractError> {
            let prepared = binarize(&bytes)?;
            prepared.save(&write_path)?;
            Ok(())
        })
        .await
        .map_err(|e| ExtractError::Io(std::io::Error::other(e)))??;

        let mut cmd = Command::new(&self.command);
        cmd.arg(&input_path).arg("stdout").kill_on_drop(true);
        let result = timeout(OCR_TIMEOUT, cmd.output()).await;

        // The input file is no longer needed whatever happened.
        if let Err(e) = tokio::fs::remove_file(&input_path).await {
            warn!(path = %input_path.display(), error = %e, "failed to remove OCR temp file");
        }

        let output = match result {
            Ok(output) => output?,
            Err(_) => return Err(ExtractError::Timeout),
        };
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(ExtractError::Engine {
                status: output.status.code().unwrap_or(-1),
                stderr,
            });
        }

        let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
        debug!(chars = text.len(), "OCR extraction finished");
        if text.is_empty() {
            return Err(ExtractError::NoText);
        }
        Ok(text)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use image::Luma;
    use std::io::Cursor;

    fn png_bytes(img: &GrayImage) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, image::ImageFormat::Png).unwrap();
        buf.into_inner()
    }

    #[test]
    fn binarize_splits_at_threshold() {
        let mut img = GrayImage::new(2, 1);
        img.put_pixel(0, 0, Luma([127]));
        img.put_pixel(1, 0, Luma([128]));

        let out = binarize(&png_bytes(&img)).unwrap();
        assert_eq!(out.get_pixel(0, 0).0[0], 0);
        assert_eq!(out.get_pixel(1, 0).0[0], 255);
    }

    #[test]
    fn garbage_bytes_are_an_image_error() {
        let err = binarize(b"definitely not an image").unwrap_err();
        assert!(matches!(err, ExtractError::Image(_)));
    }

    #[tokio::test]
    async fn missing_engine_is_an_io_error() {
        let extractor = TesseractExtractor::new("trackit-no-such-binary");
        let img = GrayImage::from_pixel(8, 8, Luma([255]));
        let err = extractor.extract_text(&png_bytes(&img)).await.unwrap_err();
        assert!(matches!(err, ExtractError::Io(_)));
    }
}
