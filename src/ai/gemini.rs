//! Gemini REST client implementing [`ResponseGenerator`].
//!
//! Talks to the `generateContent` endpoint directly over HTTPS.  Image
//! uploads go through the media upload endpoint first; the returned file
//! URI is then referenced from the generation request, so the image bytes
//! are sent exactly once.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{GenerateError, ResponseGenerator, SYSTEM_PROMPT};

const BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Cap on the upstream error body echoed into [`GenerateError::Api`].
const MAX_ERROR_BODY_CHARS: usize = 512;

// ── Wire types ────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(rename = "fileData", skip_serializing_if = "Option::is_none")]
    file_data: Option<FileData>,
}

impl Part {
    fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            file_data: None,
        }
    }

    fn file(mime_type: impl Into<String>, file_uri: impl Into<String>) -> Self {
        Self {
            text: None,
            file_data: Some(FileData {
                mime_type: mime_type.into(),
                file_uri: file_uri.into(),
            }),
        }
    }
}

#[derive(Debug, Serialize)]
struct FileData {
    #[serde(rename = "mimeType")]
    mime_type: String,
    #[serde(rename = "fileUri")]
    file_uri: String,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    file: UploadedFile,
}

#[derive(Debug, Deserialize)]
struct UploadedFile {
    uri: String,
}

// ── Client ────────────────────────────────────────────────────────────────────

/// Gemini-backed [`ResponseGenerator`].
pub struct GeminiGenerator {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl GeminiGenerator {
    /// `model` accepts both bare names (`"gemini-2.0-flash"`) and the
    /// `"models/…"` form some tooling produces.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        let model = model.into();
        let model = match model.strip_prefix("models/") {
            Some(rest) => rest.to_owned(),
            None => model,
        };
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            model,
        }
    }

    async fn generate_content(&self, parts: Vec<Part>) -> Result<String, GenerateError> {
        if self.api_key.is_empty() {
            return Err(GenerateError::MissingApiKey);
        }
        let url = format!("{BASE_URL}/v1beta/models/{}:generateContent", self.model);
        let request = GenerateContentRequest {
            contents: vec![Content { parts }],
        };
        debug!(model = %self.model, "sending generateContent request");
        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&request)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GenerateError::Api {
                status: status.as_u16(),
                body: truncate_body(body),
            });
        }
        let parsed: GenerateContentResponse = response.json().await?;
        first_text(parsed).ok_or(GenerateError::EmptyResponse)
    }

    /// Upload raw image bytes to the media endpoint; returns the file URI
    /// to reference from a generation request.
    async fn upload_image(&self, image: &[u8], mime_type: &str) -> Result<String, GenerateError> {
        if self.api_key.is_empty() {
            return Err(GenerateError::MissingApiKey);
        }
        let url = format!("{BASE_URL}/upload/v1beta/files");
        debug!(size_bytes = image.len(), mime_type, "uploading receipt image");
        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .header("X-Goog-Upload-Protocol", "raw")
            .header(reqwest::header::CONTENT_TYPE, mime_type)
            .body(image.to_vec())
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GenerateError::Api {
                status: status.as_u16(),
                body: truncate_body(body),
            });
        }
        let parsed: UploadResponse = response.json().await?;
        Ok(parsed.file.uri)
    }
}

#[async_trait]
impl ResponseGenerator for GeminiGenerator {
    async fn generate(&self, query: &str) -> Result<String, GenerateError> {
        let prompt = format!("{SYSTEM_PROMPT}\nUser query: {query}");
        self.generate_content(vec![Part::text(prompt)]).await
    }

    async fn generate_with_image(
        &self,
        query: &str,
        image: &[u8],
        mime_type: &str,
    ) -> Result<String, GenerateError> {
        let file_uri = self.upload_image(image, mime_type).await?;
        let prompt = format!("{SYSTEM_PROMPT}\nUser query: {query}");
        self.generate_content(vec![Part::text(prompt), Part::file(mime_type, file_uri)])
            .await
    }
}

/// First non-blank text part of the first candidate, if any.
fn first_text(response: GenerateContentResponse) -> Option<String> {
    response
        .candidates
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content)
        .and_then(|content| content.parts.into_iter().find_map(|part| part.text))
        .filter(|text| !text.trim().is_empty())
}

fn truncate_body(body: String) -> String {
    if body.chars().count() <= MAX_ERROR_BODY_CHARS {
        return body;
    }
    body.chars().take(MAX_ERROR_BODY_CHARS).collect()
}
