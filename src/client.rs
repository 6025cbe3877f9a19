use reqwest::Client;

use crate::prediction::PredictionResult;
use crate::record::StudentRecord;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("prediction service request failed: {0}")]
    Request(#[from] reqwest::Error),
}

/// Calls a running prediction service. One request per call, never retried.
#[derive(Debug, Clone)]
pub struct PredictClient {
    client: Client,
    predict_url: String,
}

impl PredictClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            predict_url: format!("{}/predict", base_url.trim_end_matches('/')),
        }
    }

    pub fn predict_url(&self) -> &str {
        &self.predict_url
    }

    pub async fn predict(&self, record: &StudentRecord) -> Result<PredictionResult, ClientError> {
        let result = self
            .client
            .post(&self.predict_url)
            .json(record)
            .send()
            .await?
            .error_for_status()?
            .json::<PredictionResult>()
            .await?;
        Ok(result)
    }
}
