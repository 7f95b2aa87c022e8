//! Categorical encoder for survey answers
//!
//! Maps the six survey fields to integer codes. Each field has a closed,
//! case-sensitive vocabulary; a value's code is its zero-based position in
//! that vocabulary. The vocabulary table is built once and never mutated.

use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::fmt;

use super::PredictionError;

const GENDER_VOCABULARY: &[&str] = &["Male", "Female"];
const OCCUPATION_VOCABULARY: &[&str] = &["Corporate", "Student", "Business", "Housewife", "Others"];
const MOOD_SWINGS_VOCABULARY: &[&str] = &["Medium", "Low", "High"];
const TRISTATE_VOCABULARY: &[&str] = &["No", "Yes", "Maybe"];

/// Number of features the classifier expects
pub const FEATURE_COUNT: usize = 6;

/// One of the six survey questions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SurveyField {
    Gender,
    Occupation,
    MoodSwings,
    ChangesHabits,
    WorkInterest,
    SocialWeakness,
}

impl SurveyField {
    /// All fields in model column order
    pub const ALL: [SurveyField; FEATURE_COUNT] = [
        SurveyField::Gender,
        SurveyField::Occupation,
        SurveyField::MoodSwings,
        SurveyField::ChangesHabits,
        SurveyField::WorkInterest,
        SurveyField::SocialWeakness,
    ];

    /// Key used in request bodies and classifier artifacts
    pub fn key(self) -> &'static str {
        match self {
            SurveyField::Gender => "gender",
            SurveyField::Occupation => "Occupation",
            SurveyField::MoodSwings => "Mood_Swings",
            SurveyField::ChangesHabits => "Changes_Habits",
            SurveyField::WorkInterest => "Work_Interest",
            SurveyField::SocialWeakness => "Social_Weakness",
        }
    }

    /// Ordered closed vocabulary for this field
    pub fn vocabulary(self) -> &'static [&'static str] {
        match self {
            SurveyField::Gender => GENDER_VOCABULARY,
            SurveyField::Occupation => OCCUPATION_VOCABULARY,
            SurveyField::MoodSwings => MOOD_SWINGS_VOCABULARY,
            SurveyField::ChangesHabits | SurveyField::WorkInterest | SurveyField::SocialWeakness => {
                TRISTATE_VOCABULARY
            }
        }
    }

    pub fn from_key(key: &str) -> Option<SurveyField> {
        SurveyField::ALL.into_iter().find(|f| f.key() == key)
    }
}

impl fmt::Display for SurveyField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// field → (value → code)
static CODE_TABLE: Lazy<HashMap<SurveyField, HashMap<&'static str, u8>>> = Lazy::new(|| {
    SurveyField::ALL
        .into_iter()
        .map(|field| {
            let codes = field
                .vocabulary()
                .iter()
                .enumerate()
                .map(|(code, value)| (*value, code as u8))
                .collect();
            (field, codes)
        })
        .collect()
});

/// Survey answers keyed by field
///
/// Built from the raw request mapping by the prediction service; fields not
/// present in the request are simply absent here.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SurveyInput {
    answers: HashMap<SurveyField, String>,
}

impl SurveyInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: SurveyField, value: impl Into<String>) -> Self {
        self.insert(field, value);
        self
    }

    pub fn insert(&mut self, field: SurveyField, value: impl Into<String>) {
        self.answers.insert(field, value.into());
    }

    pub fn get(&self, field: SurveyField) -> Option<&str> {
        self.answers.get(&field).map(String::as_str)
    }
}

/// Encoded survey answers in model column order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureVector([u8; FEATURE_COUNT]);

impl FeatureVector {
    pub fn codes(&self) -> &[u8; FEATURE_COUNT] {
        &self.0
    }

    /// Codes as floating point features
    pub fn as_f64(&self) -> [f64; FEATURE_COUNT] {
        self.0.map(f64::from)
    }
}

/// Look up a single value's code
pub fn encode_value(field: SurveyField, value: &str) -> Result<u8, PredictionError> {
    CODE_TABLE
        .get(&field)
        .and_then(|codes| codes.get(value))
        .copied()
        .ok_or_else(|| PredictionError::UnknownCategory {
            field: field.key().to_string(),
            value: value.to_string(),
        })
}

/// Encode all six answers in column order
pub fn encode(input: &SurveyInput) -> Result<FeatureVector, PredictionError> {
    let mut codes = [0u8; FEATURE_COUNT];
    for (slot, field) in codes.iter_mut().zip(SurveyField::ALL) {
        let value = input.get(field).ok_or_else(|| PredictionError::MissingField {
            field: field.key().to_string(),
        })?;
        *slot = encode_value(field, value)?;
    }
    Ok(FeatureVector(codes))
}
