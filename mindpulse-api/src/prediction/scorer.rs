//! Fitness scorer backed by a pre-trained binary classifier
//!
//! The classifier is loaded once from a JSON artifact at startup and shared
//! read-only between request handlers. Two artifact kinds are supported:
//!
//! - `logistic_regression`: `p = sigmoid(coefficients · x + intercept)`
//! - `decision_forest`: mean positive-class probability over decision trees
//!   stored in flat node arrays (`children_left`, `children_right`,
//!   `feature`, `threshold`, `value`; a leaf has `children_left == -1`)
//!
//! Example artifact:
//! ```json
//! {
//!   "kind": "logistic_regression",
//!   "feature_names": ["gender", "Occupation", "Mood_Swings",
//!                     "Changes_Habits", "Work_Interest", "Social_Weakness"],
//!   "coefficients": [0.1, -0.2, 0.8, 0.5, -0.3, 0.4],
//!   "intercept": -0.6
//! }
//! ```

use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use super::encoder::{FeatureVector, SurveyField, FEATURE_COUNT};
use super::PredictionError;

/// Binary probabilistic classifier over the six encoded survey columns
pub trait Classifier: Send + Sync {
    /// Short human-readable description (kind and size)
    fn describe(&self) -> String;

    /// Probability of the positive class for one feature row
    fn predict_positive(&self, features: &[f64; FEATURE_COUNT]) -> f64;
}

/// On-disk artifact
#[derive(Debug, Deserialize)]
struct ArtifactFile {
    feature_names: Vec<String>,
    #[serde(flatten)]
    model: ModelSpec,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum ModelSpec {
    LogisticRegression {
        coefficients: Vec<f64>,
        intercept: f64,
    },
    DecisionForest {
        trees: Vec<DecisionTree>,
    },
}

/// Logistic regression over the encoded columns
#[derive(Debug, Clone)]
pub struct LogisticRegression {
    coefficients: [f64; FEATURE_COUNT],
    intercept: f64,
}

impl LogisticRegression {
    pub fn new(coefficients: [f64; FEATURE_COUNT], intercept: f64) -> Self {
        Self {
            coefficients,
            intercept,
        }
    }
}

impl Classifier for LogisticRegression {
    fn describe(&self) -> String {
        "logistic_regression".to_string()
    }

    fn predict_positive(&self, features: &[f64; FEATURE_COUNT]) -> f64 {
        let z = self
            .coefficients
            .iter()
            .zip(features)
            .map(|(w, x)| w * x)
            .sum::<f64>()
            + self.intercept;
        1.0 / (1.0 + (-z).exp())
    }
}

/// One decision tree in flat array form
#[derive(Debug, Clone, Deserialize)]
pub struct DecisionTree {
    pub children_left: Vec<i64>,
    pub children_right: Vec<i64>,
    pub feature: Vec<i64>,
    pub threshold: Vec<f64>,
    /// Positive-class probability at each node (only leaves are read)
    pub value: Vec<f64>,
}

impl DecisionTree {
    /// Check node arrays are consistent and every path terminates
    fn validate(&self, index: usize) -> Result<(), PredictionError> {
        let invalid =
            |reason: String| PredictionError::ModelUnavailable(format!("tree {}: {}", index, reason));

        let n = self.value.len();
        if n == 0 {
            return Err(invalid("no nodes".to_string()));
        }
        if [
            self.children_left.len(),
            self.children_right.len(),
            self.feature.len(),
            self.threshold.len(),
        ]
        .iter()
        .any(|len| *len != n)
        {
            return Err(invalid("node arrays have different lengths".to_string()));
        }

        for node in 0..n {
            let (left, right) = (self.children_left[node], self.children_right[node]);
            if left == -1 && right == -1 {
                continue;
            }
            // Children must point forward, which rules out cycles
            for child in [left, right] {
                if child <= node as i64 || child >= n as i64 {
                    return Err(invalid(format!("node {} has invalid child {}", node, child)));
                }
            }
            let feature = self.feature[node];
            if feature < 0 || feature >= FEATURE_COUNT as i64 {
                return Err(invalid(format!("node {} splits on feature {}", node, feature)));
            }
        }
        Ok(())
    }

    fn predict(&self, features: &[f64; FEATURE_COUNT]) -> f64 {
        let mut node = 0usize;
        while self.children_left[node] != -1 {
            let x = features[self.feature[node] as usize];
            node = if x <= self.threshold[node] {
                self.children_left[node] as usize
            } else {
                self.children_right[node] as usize
            };
        }
        self.value[node]
    }
}

/// Averaged ensemble of decision trees
#[derive(Debug, Clone)]
pub struct DecisionForest {
    trees: Vec<DecisionTree>,
}

impl DecisionForest {
    pub fn new(trees: Vec<DecisionTree>) -> Result<Self, PredictionError> {
        if trees.is_empty() {
            return Err(PredictionError::ModelUnavailable(
                "decision forest has no trees".to_string(),
            ));
        }
        for (index, tree) in trees.iter().enumerate() {
            tree.validate(index)?;
        }
        Ok(Self { trees })
    }
}

impl Classifier for DecisionForest {
    fn describe(&self) -> String {
        format!("decision_forest ({} trees)", self.trees.len())
    }

    fn predict_positive(&self, features: &[f64; FEATURE_COUNT]) -> f64 {
        let total: f64 = self.trees.iter().map(|t| t.predict(features)).sum();
        total / self.trees.len() as f64
    }
}

/// Parse and validate a classifier artifact from JSON text
pub fn parse_classifier(json: &str) -> Result<Arc<dyn Classifier>, PredictionError> {
    let artifact: ArtifactFile = serde_json::from_str(json)
        .map_err(|e| PredictionError::ModelUnavailable(format!("invalid artifact: {}", e)))?;

    let expected: Vec<&str> = SurveyField::ALL.iter().map(|f| f.key()).collect();
    if artifact.feature_names != expected {
        return Err(PredictionError::ModelUnavailable(format!(
            "artifact feature order {:?} does not match expected {:?}",
            artifact.feature_names, expected
        )));
    }

    let classifier: Arc<dyn Classifier> = match artifact.model {
        ModelSpec::LogisticRegression {
            coefficients,
            intercept,
        } => {
            let coefficients: [f64; FEATURE_COUNT] =
                coefficients.try_into().map_err(|c: Vec<f64>| {
                    PredictionError::ModelUnavailable(format!(
                        "expected {} coefficients, found {}",
                        FEATURE_COUNT,
                        c.len()
                    ))
                })?;
            Arc::new(LogisticRegression::new(coefficients, intercept))
        }
        ModelSpec::DecisionForest { trees } => Arc::new(DecisionForest::new(trees)?),
    };
    Ok(classifier)
}

/// Load the classifier artifact from disk
pub fn load_classifier(path: &Path) -> Result<Arc<dyn Classifier>, PredictionError> {
    let json = std::fs::read_to_string(path).map_err(|e| {
        PredictionError::ModelUnavailable(format!("cannot read {}: {}", path.display(), e))
    })?;
    let classifier = parse_classifier(&json)?;
    info!(
        "Loaded classifier from {}: {}",
        path.display(),
        classifier.describe()
    );
    Ok(classifier)
}

/// Scores encoded survey answers with the shared classifier
#[derive(Clone)]
pub struct FitnessScorer {
    classifier: Arc<dyn Classifier>,
}

impl FitnessScorer {
    pub fn new(classifier: Arc<dyn Classifier>) -> Self {
        Self { classifier }
    }

    pub fn describe(&self) -> String {
        self.classifier.describe()
    }

    /// Positive-class probability in [0, 1]
    pub fn score(&self, vector: &FeatureVector) -> Result<f64, PredictionError> {
        let probability = self.classifier.predict_positive(&vector.as_f64());
        debug!(codes = ?vector.codes(), probability, "Scored feature vector");
        if !probability.is_finite() {
            return Err(PredictionError::ModelUnavailable(format!(
                "classifier returned non-finite probability {}",
                probability
            )));
        }
        Ok(probability.clamp(0.0, 1.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prediction::encoder::{encode, SurveyInput};
    use std::io::Write;

    const FEATURES: &str = r#"["gender","Occupation","Mood_Swings","Changes_Habits","Work_Interest","Social_Weakness"]"#;

    fn logistic_json(coefficients: &str, intercept: f64) -> String {
        format!(
            r#"{{"kind":"logistic_regression","feature_names":{},"coefficients":{},"intercept":{}}}"#,
            FEATURES, coefficients, intercept
        )
    }

    /// Single stump on Mood_Swings: code <= 1.5 → 0.2, else 0.9
    fn stump() -> DecisionTree {
        DecisionTree {
            children_left: vec![1, -1, -1],
            children_right: vec![2, -1, -1],
            feature: vec![2, -2, -2],
            threshold: vec![1.5, -2.0, -2.0],
            value: vec![0.5, 0.2, 0.9],
        }
    }

    fn vector(mood: &str) -> FeatureVector {
        encode(
            &SurveyInput::new()
                .with(SurveyField::Gender, "Female")
                .with(SurveyField::Occupation, "Corporate")
                .with(SurveyField::MoodSwings, mood)
                .with(SurveyField::ChangesHabits, "No")
                .with(SurveyField::WorkInterest, "No")
                .with(SurveyField::SocialWeakness, "No"),
        )
        .unwrap()
    }

    #[test]
    fn test_logistic_zero_weights_is_half() {
        let classifier = parse_classifier(&logistic_json("[0,0,0,0,0,0]", 0.0)).unwrap();
        let p = classifier.predict_positive(&[1.0; FEATURE_COUNT]);
        assert!((p - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_logistic_uses_column_order() {
        // Only Mood_Swings carries weight
        let classifier = parse_classifier(&logistic_json("[0,0,1,0,0,0]", 0.0)).unwrap();
        let scorer = FitnessScorer::new(classifier);
        let low = scorer.score(&vector("Medium")).unwrap(); // code 0
        let high = scorer.score(&vector("High")).unwrap(); // code 2
        assert!((low - 0.5).abs() < 1e-12);
        assert!(high > 0.88 && high < 0.89, "sigmoid(2) ≈ 0.8808, got {}", high);
    }

    #[test]
    fn test_logistic_wrong_coefficient_count() {
        let result = parse_classifier(&logistic_json("[0,0,0]", 0.0));
        assert!(matches!(result, Err(PredictionError::ModelUnavailable(_))));
    }

    #[test]
    fn test_feature_order_mismatch_rejected() {
        let json = r#"{"kind":"logistic_regression","feature_names":["Occupation","gender","Mood_Swings","Changes_Habits","Work_Interest","Social_Weakness"],"coefficients":[0,0,0,0,0,0],"intercept":0}"#;
        let err = parse_classifier(json).err().unwrap();
        assert!(err.to_string().contains("feature order"));
    }

    #[test]
    fn test_unknown_kind_rejected() {
        let json = format!(r#"{{"kind":"svm","feature_names":{}}}"#, FEATURES);
        assert!(matches!(
            parse_classifier(&json),
            Err(PredictionError::ModelUnavailable(_))
        ));
    }

    #[test]
    fn test_forest_traversal_and_averaging() {
        let always_one = DecisionTree {
            children_left: vec![-1],
            children_right: vec![-1],
            feature: vec![-2],
            threshold: vec![-2.0],
            value: vec![1.0],
        };
        let forest = DecisionForest::new(vec![stump(), always_one]).unwrap();
        let scorer = FitnessScorer::new(Arc::new(forest));

        // Low → code 1 → left leaf 0.2; mean with 1.0
        assert!((scorer.score(&vector("Low")).unwrap() - 0.6).abs() < 1e-12);
        // High → code 2 → right leaf 0.9; mean with 1.0
        assert!((scorer.score(&vector("High")).unwrap() - 0.95).abs() < 1e-12);
    }

    #[test]
    fn test_forest_rejects_cycles() {
        let mut tree = stump();
        tree.children_left[0] = 0;
        assert!(DecisionForest::new(vec![tree]).is_err());
    }

    #[test]
    fn test_forest_rejects_bad_feature_index() {
        let mut tree = stump();
        tree.feature[0] = 6;
        assert!(DecisionForest::new(vec![tree]).is_err());
    }

    #[test]
    fn test_forest_rejects_ragged_arrays() {
        let mut tree = stump();
        tree.threshold.pop();
        assert!(DecisionForest::new(vec![tree]).is_err());
    }

    #[test]
    fn test_empty_forest_rejected() {
        assert!(DecisionForest::new(Vec::new()).is_err());
    }

    #[test]
    fn test_forest_artifact_parses() {
        let json = format!(
            r#"{{"kind":"decision_forest","feature_names":{},"trees":[{{"children_left":[1,-1,-1],"children_right":[2,-1,-1],"feature":[2,-2,-2],"threshold":[1.5,-2,-2],"value":[0.5,0.2,0.9]}}]}}"#,
            FEATURES
        );
        let classifier = parse_classifier(&json).unwrap();
        assert_eq!(classifier.describe(), "decision_forest (1 trees)");
    }

    #[test]
    fn test_load_missing_file() {
        let result = load_classifier(Path::new("/nonexistent/model.json"));
        assert!(matches!(result, Err(PredictionError::ModelUnavailable(_))));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(logistic_json("[0,0,0,0,0,0]", 1.0).as_bytes())
            .unwrap();
        let classifier = load_classifier(file.path()).unwrap();
        assert_eq!(classifier.describe(), "logistic_regression");
    }

    struct Broken;

    impl Classifier for Broken {
        fn describe(&self) -> String {
            "broken".to_string()
        }

        fn predict_positive(&self, _features: &[f64; FEATURE_COUNT]) -> f64 {
            f64::NAN
        }
    }

    #[test]
    fn test_non_finite_probability_is_model_unavailable() {
        let scorer = FitnessScorer::new(Arc::new(Broken));
        assert!(matches!(
            scorer.score(&vector("Low")),
            Err(PredictionError::ModelUnavailable(_))
        ));
    }
}
