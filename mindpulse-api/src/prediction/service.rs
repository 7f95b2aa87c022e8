//! Prediction service: raw request mapping → integer score
//!
//! Probabilities become percentages with round-half-up
//! (`f64::round` on a non-negative value), so 0.505 → 51 and 0.504 → 50.

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use super::encoder::{encode, SurveyField, SurveyInput};
use super::scorer::FitnessScorer;
use super::PredictionError;

/// Rounded percentage of the positive class, always within [0, 100]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ScoreResult(u8);

impl ScoreResult {
    pub fn value(self) -> u8 {
        self.0
    }
}

/// Convert a probability to a percentage score (round half up, clamped)
pub fn probability_to_score(probability: f64) -> ScoreResult {
    let percentage = (probability.clamp(0.0, 1.0) * 100.0).round();
    ScoreResult(percentage as u8)
}

/// Validates survey answers and scores them
#[derive(Clone)]
pub struct PredictionService {
    scorer: FitnessScorer,
}

impl PredictionService {
    pub fn new(scorer: FitnessScorer) -> Self {
        Self { scorer }
    }

    pub fn scorer(&self) -> &FitnessScorer {
        &self.scorer
    }

    /// Score a raw request mapping
    ///
    /// # Errors
    /// - `MissingField` for the first absent field in column order
    /// - `UnexpectedField` for a key outside the survey field set
    /// - `UnknownCategory` for out-of-vocabulary or non-string values
    /// - `ModelUnavailable` when the classifier misbehaves
    pub fn predict(&self, raw: &Map<String, Value>) -> Result<ScoreResult, PredictionError> {
        let input = validate(raw)?;
        let vector = encode(&input)?;
        let probability = self.scorer.score(&vector)?;
        let score = probability_to_score(probability);
        debug!(score = score.value(), "Prediction complete");
        Ok(score)
    }
}

/// Check the key set is exactly the six survey fields and collect values
fn validate(raw: &Map<String, Value>) -> Result<SurveyInput, PredictionError> {
    if let Some(missing) = SurveyField::ALL
        .iter()
        .find(|field| !raw.contains_key(field.key()))
    {
        return Err(PredictionError::MissingField {
            field: missing.key().to_string(),
        });
    }

    let mut input = SurveyInput::new();
    for (key, value) in raw {
        let field = SurveyField::from_key(key).ok_or_else(|| PredictionError::UnexpectedField {
            field: key.clone(),
        })?;
        let value = value
            .as_str()
            .ok_or_else(|| PredictionError::UnknownCategory {
                field: key.clone(),
                value: value.to_string(),
            })?;
        input.insert(field, value);
    }
    Ok(input)
}
