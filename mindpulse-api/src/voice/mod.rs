//! Voice-quality analysis
//!
//! Audio is sent to a generative model together with a fixed instruction
//! prompt; the model's free text is parsed into a [`VoiceAnalysis`].

pub mod extractor;
pub mod gemini;
pub mod service;

pub use extractor::{extract, VoiceAnalysis, REQUIRED_KEYS};
pub use gemini::{AudioPayload, GeminiClient, GenerativeModel, UpstreamError};
pub use service::{RetryPolicy, VoiceAnalysisService, DEFAULT_MIME_TYPE, VOICE_ANALYSIS_PROMPT};

use serde::Serialize;
use thiserror::Error;

/// Why a voice report could not be produced from the model
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractionError {
    /// No JSON object could be recovered from the model text
    #[error("Failed to parse JSON response")]
    MalformedResponse,

    /// An object was found but required keys are absent or unusable
    #[error("Response is missing required keys: {}", .missing.join(", "))]
    SchemaMismatch { missing: Vec<String> },

    /// The model call itself failed
    #[error("An error occurred: {0}")]
    UpstreamFailure(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VoiceAnalysisError {
    #[error("No audio file provided")]
    NoAudioProvided,

    #[error(transparent)]
    Extraction(#[from] ExtractionError),
}

/// Value of the `voice_analysis` member in HTTP responses
///
/// Either the eight-key report or `{"error": "<message>"}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum VoiceAnalysisPayload {
    Analysis(VoiceAnalysis),
    Error { error: String },
}

impl From<Result<VoiceAnalysis, ExtractionError>> for VoiceAnalysisPayload {
    fn from(result: Result<VoiceAnalysis, ExtractionError>) -> Self {
        match result {
            Ok(analysis) => VoiceAnalysisPayload::Analysis(analysis),
            Err(e) => VoiceAnalysisPayload::Error {
                error: e.to_string(),
            },
        }
    }
}
