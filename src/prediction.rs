use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::Classifier;
use crate::record::StudentRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    Dropout,
    Graduate,
}

impl Outcome {
    /// Maps a model class index to its label. The artifact is trained with
    /// 0 = Dropout and 1 = Graduate.
    pub fn from_class_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Outcome::Dropout),
            1 => Some(Outcome::Graduate),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Dropout => "Dropout",
            Outcome::Graduate => "Graduate",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub prediction: Outcome,
    pub probability: f64,
}

#[derive(Debug, thiserror::Error)]
pub enum PredictError {
    #[error("model returned class index {0}, which has no outcome label")]
    UnknownClass(usize),
    #[error("model returned no class probabilities")]
    NoProbabilities,
}

/// Scores one record.
///
/// The reported probability is the largest class probability, not
/// necessarily the probability of the returned label. The two agree for a
/// binary model with a 0.5 decision threshold.
pub fn predict(
    classifier: &dyn Classifier,
    record: &StudentRecord,
) -> Result<PredictionResult, PredictError> {
    let row = record.to_features();
    let class = classifier.predict_class(&row);
    let confidence = classifier
        .predict_proba(&row)
        .into_iter()
        .reduce(f32::max)
        .ok_or(PredictError::NoProbabilities)?;

    let prediction = Outcome::from_class_index(class).ok_or(PredictError::UnknownClass(class))?;

    Ok(PredictionResult {
        prediction,
        probability: round_probability(f64::from(confidence)),
    })
}

pub fn round_probability(probability: f64) -> f64 {
    (probability * 100.0).round() / 100.0
}
