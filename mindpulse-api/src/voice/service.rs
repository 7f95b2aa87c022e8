//! Voice analysis service
//!
//! Sends audio to the generative model with a fixed instruction prompt and
//! extracts the report. Transient upstream failures are retried with
//! exponential backoff up to `max_attempts` total calls; extraction
//! failures never are.

use backoff::backoff::Backoff;
use backoff::ExponentialBackoffBuilder;
use mindpulse_common::config::GeminiSettings;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use super::extractor::{extract, VoiceAnalysis};
use super::gemini::{AudioPayload, GenerativeModel, UpstreamError};
use super::{ExtractionError, VoiceAnalysisError};

/// Assumed when the upload carries no content type
pub const DEFAULT_MIME_TYPE: &str = "audio/webm";

/// Instruction sent alongside every audio clip
pub const VOICE_ANALYSIS_PROMPT: &str = r#"Analyze the following audio file and provide a voice analysis in JSON format.

Provide the analysis in exactly this JSON format:
{
    "Smoothness": "<percentage out of 100> %",
    "Control": "<percentage out of 100> %",
    "Liveliness": "<number between 0-1 with 2 decimal places>",
    "Energy_range": "<number> dB",
    "Clarity": "<number> ms",
    "Crispness": "<number between 0-1 with 2 decimal places>",
    "Speech": "<Normal/Emotional/Monotone>",
    "Pause": "<Regular/Fluent/Filled Pauses>"
}
"#;

const MAX_BACKOFF: Duration = Duration::from_secs(10);

/// Bounded retry for the model call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total calls including the first; at least 1
    pub max_attempts: u32,
    pub initial_backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_backoff,
        }
    }

    pub fn from_settings(settings: &GeminiSettings) -> Self {
        Self::new(settings.max_attempts, settings.initial_backoff)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(2, Duration::from_millis(500))
    }
}

#[derive(Clone)]
pub struct VoiceAnalysisService {
    model: Arc<dyn GenerativeModel>,
    retry: RetryPolicy,
}

impl VoiceAnalysisService {
    pub fn new(model: Arc<dyn GenerativeModel>, retry: RetryPolicy) -> Self {
        Self { model, retry }
    }

    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    /// Analyse an audio clip
    ///
    /// `mime_type` of `None` or empty falls back to [`DEFAULT_MIME_TYPE`].
    pub async fn analyze(
        &self,
        audio: &[u8],
        mime_type: Option<&str>,
    ) -> Result<VoiceAnalysis, VoiceAnalysisError> {
        if audio.is_empty() {
            return Err(VoiceAnalysisError::NoAudioProvided);
        }

        let mime_type = mime_type
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(DEFAULT_MIME_TYPE);
        let payload = AudioPayload::new(audio, mime_type);

        let text = self
            .generate_with_retry(&payload)
            .await
            .map_err(|e| ExtractionError::UpstreamFailure(e.to_string()))?;

        let analysis = extract(&text).map_err(|e| {
            warn!(error = %e, "Voice analysis response rejected");
            e
        })?;
        info!(bytes = audio.len(), mime_type, "Voice analysis complete");
        Ok(analysis)
    }

    async fn generate_with_retry(&self, payload: &AudioPayload) -> Result<String, UpstreamError> {
        let mut backoff = ExponentialBackoffBuilder::new()
            .with_initial_interval(self.retry.initial_backoff)
            .with_max_interval(MAX_BACKOFF)
            .with_multiplier(2.0)
            .with_max_elapsed_time(None)
            .build();

        let mut attempt = 1;
        loop {
            match self.model.generate(payload, VOICE_ANALYSIS_PROMPT).await {
                Ok(text) => return Ok(text),
                Err(e) if e.is_retryable() && attempt < self.retry.max_attempts => {
                    let delay = backoff
                        .next_backoff()
                        .unwrap_or(self.retry.initial_backoff);
                    warn!(
                        attempt,
                        max_attempts = self.retry.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Model call failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    warn!(attempt, error = %e, "Model call failed");
                    return Err(e);
                }
            }
        }
    }
}
