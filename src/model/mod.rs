//! The pre-trained classifier artifact and the interface the service uses to query it.

mod xgboost;

use std::path::{Path, PathBuf};

pub use xgboost::{Objective, XgbClassifier};

use crate::record::{self, FEATURE_COUNT};

/// A loaded binary (or multi-class) classifier over one feature row.
///
/// Implementations are immutable after loading and are shared between
/// request handlers without locking.
pub trait Classifier: Send + Sync {
    /// Predicted class index for one row.
    fn predict_class(&self, row: &[f32]) -> usize;

    /// Probability of every class for one row, indexed by class.
    fn predict_proba(&self, row: &[f32]) -> Vec<f32>;

    fn num_features(&self) -> usize;

    /// Column names recorded in the artifact at training time, if any.
    fn feature_names(&self) -> Option<&[String]> {
        None
    }

    /// Short human readable summary used in startup logs.
    fn describe(&self) -> String;
}

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("failed to read model artifact {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("model artifact is not valid XGBoost JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("unsupported booster `{0}`, only gbtree and dart models can be served")]
    UnsupportedBooster(String),
    #[error("unsupported objective `{0}`")]
    UnsupportedObjective(String),
    #[error("tree {tree} is malformed: {reason}")]
    MalformedTree { tree: usize, reason: String },
    #[error("model was trained on {found} features but a student record has {expected}")]
    FeatureCount { expected: usize, found: usize },
    #[error("model feature {index} is `{found}` but the record field is `{expected}`")]
    FeatureName {
        index: usize,
        expected: &'static str,
        found: String,
    },
}

/// Loads the artifact at `path` and checks it was trained on the student record layout.
pub fn load_artifact(path: &Path) -> Result<XgbClassifier, ModelError> {
    let classifier = XgbClassifier::from_path(path)?;
    check_feature_layout(&classifier)?;
    Ok(classifier)
}

pub fn check_feature_layout(classifier: &dyn Classifier) -> Result<(), ModelError> {
    if classifier.num_features() != FEATURE_COUNT {
        return Err(ModelError::FeatureCount {
            expected: FEATURE_COUNT,
            found: classifier.num_features(),
        });
    }

    let Some(names) = classifier.feature_names() else {
        return Ok(());
    };
    if names.len() != FEATURE_COUNT {
        return Err(ModelError::FeatureCount {
            expected: FEATURE_COUNT,
            found: names.len(),
        });
    }
    for (index, (expected, found)) in record::feature_names().zip(names).enumerate() {
        if expected != found.as_str() {
            return Err(ModelError::FeatureName {
                index,
                expected,
                found: found.clone(),
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn fixture_path() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/binary_logistic.model.json")
    }

    fn fixture_value() -> serde_json::Value {
        let text = std::fs::read_to_string(fixture_path()).expect("fixture should exist");
        serde_json::from_str(&text).expect("fixture should be JSON")
    }

    fn write_temp(value: &serde_json::Value) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{value}").unwrap();
        file
    }

    #[test]
    fn loads_fixture_artifact() {
        let classifier = load_artifact(&fixture_path()).unwrap();
        assert_eq!(classifier.num_features(), FEATURE_COUNT);
        assert_eq!(classifier.num_trees(), 3);
        assert_eq!(classifier.objective(), Objective::BinaryLogistic);
    }

    #[test]
    fn missing_artifact_is_an_io_error() {
        let err = load_artifact(Path::new("does/not/exist.json")).unwrap_err();
        assert!(matches!(err, ModelError::Io { .. }));
        assert!(err.to_string().contains("does/not/exist.json"));
    }

    #[test]
    fn corrupt_artifact_is_a_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{\"learner\": ").unwrap();
        let err = load_artifact(file.path()).unwrap_err();
        assert!(matches!(err, ModelError::Parse(_)));
    }

    #[test]
    fn rejects_renamed_feature_columns() {
        let mut value = fixture_value();
        value["learner"]["feature_names"][3] = serde_json::json!("prev_grade");
        let file = write_temp(&value);

        let err = load_artifact(file.path()).unwrap_err();
        match err {
            ModelError::FeatureName {
                index,
                expected,
                found,
            } => {
                assert_eq!(index, 3);
                assert_eq!(expected, "previous_qualification_grade");
                assert_eq!(found, "prev_grade");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn rejects_wrong_feature_count() {
        let mut value = fixture_value();
        value["learner"]["learner_model_param"]["num_feature"] = serde_json::json!("16");
        value["learner"]["feature_names"] = serde_json::json!([]);
        let file = write_temp(&value);

        let err = load_artifact(file.path()).unwrap_err();
        assert!(matches!(
            err,
            ModelError::FeatureCount {
                expected: 17,
                found: 16
            }
        ));
    }

    #[test]
    fn artifacts_without_feature_names_are_accepted() {
        let mut value = fixture_value();
        value["learner"]
            .as_object_mut()
            .unwrap()
            .remove("feature_names");
        let file = write_temp(&value);

        let classifier = load_artifact(file.path()).unwrap();
        assert!(classifier.feature_names().is_none());
    }
}
