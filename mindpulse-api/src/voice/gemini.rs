//! Google Gemini client for audio analysis
//!
//! Thin wrapper around the Gemini `generateContent` endpoint. One request
//! carries the inline audio (base64) followed by the instruction prompt;
//! the text parts of the first candidate are returned verbatim.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use mindpulse_common::config::GeminiSettings;
use reqwest::header::{HeaderValue, CONTENT_TYPE};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

/// Upstream error bodies are cut to this many characters
const MAX_ERROR_BODY_CHARS: usize = 200;

/// Audio ready to be sent inline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioPayload {
    pub mime_type: String,
    pub data_base64: String,
}

impl AudioPayload {
    pub fn new(audio: &[u8], mime_type: &str) -> Self {
        Self {
            mime_type: mime_type.to_string(),
            data_base64: STANDARD.encode(audio),
        }
    }
}

/// Failure talking to the generative model
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UpstreamError {
    #[error("Gemini API key is not configured")]
    NotConfigured,

    #[error("Gemini API key contains characters not allowed in an HTTP header")]
    InvalidApiKey,

    #[error("Gemini request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Gemini API request failed: {0}")]
    Transport(String),

    #[error("Gemini API error {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to parse Gemini response: {0}")]
    Decode(String),

    #[error("Gemini response contained no text{}", blocked_suffix(.0))]
    EmptyResponse(Option<String>),
}

fn blocked_suffix(block_reason: &Option<String>) -> String {
    block_reason
        .as_ref()
        .map(|reason| format!(" (blocked: {})", reason))
        .unwrap_or_default()
}

impl UpstreamError {
    /// Transient failures worth another attempt
    pub fn is_retryable(&self) -> bool {
        match self {
            UpstreamError::Timeout(_) | UpstreamError::Transport(_) => true,
            UpstreamError::Status { status, .. } => *status == 429 || *status >= 500,
            UpstreamError::NotConfigured
            | UpstreamError::InvalidApiKey
            | UpstreamError::Decode(_)
            | UpstreamError::EmptyResponse(_) => false,
        }
    }
}

/// Multimodal model that turns audio plus a prompt into text
#[async_trait]
pub trait GenerativeModel: Send + Sync {
    /// Model identifier for logs and health output
    fn name(&self) -> &str;

    async fn generate(&self, audio: &AudioPayload, prompt: &str) -> Result<String, UpstreamError>;
}

// -- Response types --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiResponseContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponseContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

pub struct GeminiClient {
    client: reqwest::Client,
    api_key: Option<String>,
    model: String,
    base_url: String,
    timeout: Duration,
}

impl GeminiClient {
    /// Build a client from resolved settings
    ///
    /// A missing API key is not an error here; every call then fails with
    /// [`UpstreamError::NotConfigured`].
    pub fn new(settings: &GeminiSettings) -> Result<Self, UpstreamError> {
        let client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| UpstreamError::Transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key: settings.api_key.clone(),
            model: settings.model.clone(),
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            timeout: settings.timeout,
        })
    }

    pub fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }

    pub fn build_request_body(audio: &AudioPayload, prompt: &str) -> serde_json::Value {
        serde_json::json!({
            "contents": [{
                "parts": [
                    {
                        "inlineData": {
                            "mimeType": audio.mime_type,
                            "data": audio.data_base64
                        }
                    },
                    {"text": prompt}
                ]
            }]
        })
    }

    /// Concatenated text parts of the first candidate
    pub fn extract_text(response: &GeminiResponse) -> Result<String, UpstreamError> {
        let text: String = response
            .candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect()
            })
            .unwrap_or_default();

        if text.is_empty() {
            let block_reason = response
                .prompt_feedback
                .as_ref()
                .and_then(|f| f.block_reason.clone());
            return Err(UpstreamError::EmptyResponse(block_reason));
        }
        Ok(text)
    }

    fn map_send_error(&self, e: reqwest::Error) -> UpstreamError {
        if e.is_timeout() {
            UpstreamError::Timeout(self.timeout)
        } else {
            UpstreamError::Transport(e.to_string())
        }
    }
}

#[async_trait]
impl GenerativeModel for GeminiClient {
    fn name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, audio: &AudioPayload, prompt: &str) -> Result<String, UpstreamError> {
        let api_key = self.api_key.as_deref().ok_or(UpstreamError::NotConfigured)?;
        let api_key_header =
            HeaderValue::from_str(api_key).map_err(|_| UpstreamError::InvalidApiKey)?;

        info!(
            model = %self.model,
            mime_type = %audio.mime_type,
            audio_b64_len = audio.data_base64.len(),
            "Gemini voice analysis request"
        );

        let response = self
            .client
            .post(self.endpoint())
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .header("x-goog-api-key", api_key_header)
            .json(&Self::build_request_body(audio, prompt))
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            let truncated: String = error_body.chars().take(MAX_ERROR_BODY_CHARS).collect();
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                body: truncated,
            });
        }

        let gemini_response: GeminiResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                UpstreamError::Timeout(self.timeout)
            } else {
                UpstreamError::Decode(e.to_string())
            }
        })?;

        let text = Self::extract_text(&gemini_response)?;
        debug!(chars = text.len(), "Gemini response received");
        Ok(text)
    }
}
