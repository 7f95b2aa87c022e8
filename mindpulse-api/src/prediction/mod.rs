//! Mental fitness prediction
//!
//! Pipeline: validate raw answers → encode ([`encoder`]) → score with the
//! shared classifier ([`scorer`]) → integer percentage ([`service`]).

pub mod encoder;
pub mod scorer;
pub mod service;

pub use encoder::{encode, FeatureVector, SurveyField, SurveyInput, FEATURE_COUNT};
pub use scorer::{load_classifier, parse_classifier, Classifier, FitnessScorer};
pub use service::{probability_to_score, PredictionService, ScoreResult};

use thiserror::Error;

/// Errors on the prediction path
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PredictionError {
    /// A required survey field is absent
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    /// The request carries a key outside the survey field set
    #[error("Unexpected field: {field}")]
    UnexpectedField { field: String },

    /// A value is not in its field's vocabulary
    #[error("Unknown category {value:?} for field {field}")]
    UnknownCategory { field: String, value: String },

    /// The classifier artifact is missing, invalid or produced garbage
    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),
}

impl PredictionError {
    /// Offending field, when the error concerns one
    pub fn field(&self) -> Option<&str> {
        match self {
            PredictionError::MissingField { field }
            | PredictionError::UnexpectedField { field }
            | PredictionError::UnknownCategory { field, .. } => Some(field),
            PredictionError::ModelUnavailable(_) => None,
        }
    }
}
