// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Gemini `generativelanguage` REST client for hosted AI inference

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::{ComparatorError, Result};

/// Models offered for selection, first entry is the default
pub const MODEL_OPTIONS: &[&str] = &[
    "models/gemini-1.0-pro-vision-latest",
    "models/gemini-pro-vision",
    "models/gemini-1.5-flash-latest",
    "models/gemini-1.5-flash",
    "models/gemini-1.5-flash-002",
    "models/gemini-1.5-flash-8b",
    "models/gemini-1.5-flash-8b-001",
    "models/gemini-1.5-flash-8b-latest",
    "models/gemini-2.5-flash-preview-04-17",
    "models/gemini-2.5-flash-preview-05-20",
    "models/gemini-2.5-flash-preview-04-17-thinking",
    "models/gemini-2.0-flash-exp",
    "models/gemini-2.0-flash",
    "models/gemini-2.0-flash-001",
    "models/gemini-2.0-flash-exp-image-generation",
    "models/gemini-2.0-flash-lite-001",
    "models/gemini-2.0-flash-lite",
    "models/gemini-2.0-flash-lite-preview-02-05",
    "models/gemini-2.0-flash-lite-preview",
    "models/gemini-2.0-flash-thinking-exp-01-21",
    "models/gemini-2.0-flash-thinking-exp",
    "models/gemini-2.0-flash-thinking-exp-1219",
    "models/learnlm-2.0-flash-experimental",
    "models/gemma-3-1b-it",
    "models/gemma-3-4b-it",
    "models/gemma-3-12b-it",
    "models/gemma-3-27b-it",
    "models/gemma-3n-e4b-it",
];

/// Inline binary payload of a request part
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Blob {
    pub mime_type: String,
    /// Base64-encoded bytes
    pub data: String,
}

/// One element of a request turn
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub enum Part {
    Text(String),
    InlineData(Blob),
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Part::Text(text.into())
    }

    pub fn image(mime_type: &str, bytes: &[u8]) -> Self {
        Part::InlineData(Blob {
            mime_type: mime_type.to_string(),
            data: general_purpose::STANDARD.encode(bytes),
        })
    }

    pub fn is_image(&self) -> bool {
        matches!(self, Part::InlineData(_))
    }
}

/// A single conversation turn
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Content {
    pub role: String,
    pub parts: Vec<Part>,
}

impl Content {
    pub fn user(parts: Vec<Part>) -> Self {
        Self { role: "user".to_string(), parts }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self { role: "model".to_string(), parts: vec![Part::text(text)] }
    }
}

/// What the model produced for a request
#[derive(Debug, Clone, PartialEq)]
pub enum GenerateOutcome {
    Text(String),
    Blocked(String),
    Empty,
}

impl GenerateOutcome {
    /// Convert into text, treating blocked and empty outcomes as errors
    pub fn into_text(self) -> Result<String> {
        match self {
            GenerateOutcome::Text(text) => Ok(text),
            GenerateOutcome::Blocked(reason) => Err(ComparatorError::Blocked(reason)),
            GenerateOutcome::Empty => Err(ComparatorError::EmptyResponse),
        }
    }
}

/// Anything that can turn a conversation into model output
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    async fn generate(&self, api_key: &str, model: &str, contents: &[Content]) -> Result<GenerateOutcome>;
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: &'a [Content],
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
    #[serde(default)]
    thought: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

#[derive(Deserialize)]
struct ModelsResponse {
    #[serde(default)]
    models: Vec<ModelInfo>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModelInfo {
    name: String,
    #[serde(default)]
    supported_generation_methods: Vec<String>,
}

/// Gemini API client
pub struct GeminiClient {
    client: Client,
    base_url: String,
}

impl GeminiClient {
    /// Create a new Gemini client
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;

        // Normalize URL
        let base_url = base_url.trim_end_matches('/').trim_end_matches("/models").to_string();

        Ok(Self { client, base_url })
    }

    fn model_url(&self, model: &str, method: &str) -> String {
        if model.starts_with("models/") {
            format!("{}/{}:{}", self.base_url, model, method)
        } else {
            format!("{}/models/{}:{}", self.base_url, model, method)
        }
    }

    /// Check that the API answers with the given key
    pub async fn health_check(&self, api_key: &str) -> Result<()> {
        let url = format!("{}/models", self.base_url);

        let response = self
            .client
            .get(&url)
            .header("x-goog-api-key", api_key)
            .query(&[("pageSize", "1")])
            .timeout(Duration::from_secs(10))
            .send()
            .await?;

        check_status(response).await.map(|_| ())
    }

    /// List models that support content generation
    pub async fn list_models(&self, api_key: &str) -> Result<Vec<String>> {
        let url = format!("{}/models", self.base_url);

        let response = self
            .client
            .get(&url)
            .header("x-goog-api-key", api_key)
            .query(&[("pageSize", "1000")])
            .send()
            .await?;

        let response = check_status(response).await?;
        let listing: ModelsResponse = response.json().await?;
        Ok(listing
            .models
            .into_iter()
            .filter(|m| {
                m.supported_generation_methods.is_empty()
                    || m.supported_generation_methods.iter().any(|g| g == "generateContent")
            })
            .map(|m| m.name)
            .collect())
    }
}

#[async_trait]
impl ContentGenerator for GeminiClient {
    async fn generate(&self, api_key: &str, model: &str, contents: &[Content]) -> Result<GenerateOutcome> {
        let url = self.model_url(model, "generateContent");
        let images = contents.iter().flat_map(|c| &c.parts).filter(|p| p.is_image()).count();

        debug!("Sending request to Gemini: model={} turns={} images={}", model, contents.len(), images);

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(&GenerateRequest { contents })
            .send()
            .await?;

        let response = check_status(response).await?;
        let body = response.text().await?;
        parse_generate_response(&body)
    }
}

/// Map non-success HTTP statuses onto error variants
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    warn!("Gemini returned status {}: {}", status, body);
    Err(status_error(status, body))
}

/// Error for a non-success status, preferring the provider's `error.message`
fn status_error(status: StatusCode, body: String) -> ComparatorError {
    let message = serde_json::from_str::<ErrorEnvelope>(&body)
        .map(|e| e.error.message)
        .unwrap_or(body);

    match status {
        StatusCode::FORBIDDEN => ComparatorError::PermissionDenied(message),
        StatusCode::BAD_REQUEST => ComparatorError::InvalidArgument(message),
        _ => ComparatorError::ApiStatus { status: status.as_u16(), message },
    }
}

/// Interpret a `generateContent` response body
fn parse_generate_response(body: &str) -> Result<GenerateOutcome> {
    let response: GenerateResponse = serde_json::from_str(body)?;

    if let Some(reason) = response.prompt_feedback.and_then(|f| f.block_reason) {
        return Ok(GenerateOutcome::Blocked(reason));
    }

    let Some(candidate) = response.candidates.into_iter().next() else {
        return Ok(GenerateOutcome::Empty);
    };

    let text: String = candidate
        .content
        .map(|c| {
            c.parts
                .into_iter()
                .filter(|p| !p.thought)
                .filter_map(|p| p.text)
                .collect()
        })
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Ok(match candidate.finish_reason.as_deref() {
            Some(reason @ ("SAFETY" | "RECITATION" | "BLOCKLIST" | "PROHIBITED_CONTENT")) => {
                GenerateOutcome::Blocked(reason.to_string())
            }
            _ => GenerateOutcome::Empty,
        });
    }

    Ok(GenerateOutcome::Text(text))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(status: u16, body: &'static str) -> reqwest::Response {
        reqwest::Response::from(http::Response::builder().status(status).body(body).unwrap())
    }

    fn status_of(status: u16, body: &'static str) -> ComparatorError {
        tokio_test::block_on(check_status(response(status, body))).unwrap_err()
    }

    #[test]
    fn test_status_mapping() {
        let err = status_of(403, r#"{"error":{"code":403,"message":"key revoked","status":"PERMISSION_DENIED"}}"#);
        assert!(matches!(&err, ComparatorError::PermissionDenied(m) if m == "key revoked"));
        assert!(err.revokes_key());

        let err = status_of(400, r#"{"error":{"message":"Unsupported MIME type"}}"#);
        assert!(matches!(&err, ComparatorError::InvalidArgument(m) if m == "Unsupported MIME type"));
        assert!(err.resets_model());

        let err = status_of(429, r#"{"error":{"message":"Resource exhausted"}}"#);
        assert!(matches!(
            &err,
            ComparatorError::ApiStatus { status: 429, message } if message == "Resource exhausted"
        ));
        assert!(!err.resets_model() && !err.revokes_key());
    }

    #[test]
    fn test_status_mapping_with_plain_body() {
        let err = status_of(502, "<html>Bad Gateway</html>");
        assert!(matches!(
            &err,
            ComparatorError::ApiStatus { status: 502, message } if message == "<html>Bad Gateway</html>"
        ));

        let err = status_of(403, "");
        assert!(matches!(&err, ComparatorError::PermissionDenied(m) if m.is_empty()));
    }

    #[test]
    fn test_success_passes_through() {
        let ok = tokio_test::block_on(check_status(response(200, "{}"))).unwrap();
        assert_eq!(ok.status(), StatusCode::OK);
    }

    #[test]
    fn test_request_serialization() {
        let contents = vec![Content::user(vec![Part::text("hello"), Part::image("image/png", b"abc")])];
        let json = serde_json::to_value(GenerateRequest { contents: &contents }).unwrap();

        assert_eq!(json["contents"][0]["role"], "user");
        assert_eq!(json["contents"][0]["parts"][0]["text"], "hello");
        assert_eq!(json["contents"][0]["parts"][1]["inlineData"]["mimeType"], "image/png");
        assert_eq!(json["contents"][0]["parts"][1]["inlineData"]["data"], "YWJj");
    }

    #[test]
    fn test_parse_text_response() {
        let body = r#"{
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": "Both are "}, {"text": "LDOs."}]},
                "finishReason": "STOP"
            }]
        }"#;
        assert_eq!(
            parse_generate_response(body).unwrap(),
            GenerateOutcome::Text("Both are LDOs.".to_string())
        );
    }

    #[test]
    fn test_thought_parts_are_skipped() {
        let body = r#"{"candidates": [{"content": {"parts": [
            {"text": "thinking...", "thought": true},
            {"text": "Answer"}
        ]}}]}"#;
        assert_eq!(parse_generate_response(body).unwrap(), GenerateOutcome::Text("Answer".to_string()));
    }

    #[test]
    fn test_parse_blocked_prompt() {
        let body = r#"{"promptFeedback": {"blockReason": "SAFETY"}}"#;
        assert_eq!(
            parse_generate_response(body).unwrap(),
            GenerateOutcome::Blocked("SAFETY".to_string())
        );
    }

    #[test]
    fn test_parse_empty_and_safety_stop() {
        assert_eq!(parse_generate_response("{}").unwrap(), GenerateOutcome::Empty);

        let body = r#"{"candidates": [{"finishReason": "SAFETY"}]}"#;
        assert_eq!(
            parse_generate_response(body).unwrap(),
            GenerateOutcome::Blocked("SAFETY".to_string())
        );
    }

    #[test]
    fn test_model_url() {
        let client = GeminiClient::new("https://example.test/v1beta/", Duration::from_secs(5)).unwrap();
        assert_eq!(
            client.model_url("models/gemini-2.0-flash", "generateContent"),
            "https://example.test/v1beta/models/gemini-2.0-flash:generateContent"
        );
        assert_eq!(
            client.model_url("gemma-3-4b-it", "generateContent"),
            "https://example.test/v1beta/models/gemma-3-4b-it:generateContent"
        );
    }

    #[test]
    fn test_outcome_into_text() {
        assert!(matches!(
            GenerateOutcome::Blocked("OTHER".into()).into_text(),
            Err(ComparatorError::Blocked(_))
        ));
        assert!(matches!(GenerateOutcome::Empty.into_text(), Err(ComparatorError::EmptyResponse)));
    }
}
