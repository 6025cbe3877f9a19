use axum::{
    extract::{rejection::JsonRejection, State},
    response::IntoResponse,
    Json,
};
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

use crate::api::{error::ApiError, AppState};
use crate::prediction::{self, PredictionResult};
use crate::record::StudentRecord;

pub async fn root() -> impl IntoResponse {
    const MESSAGE: &str = "Student Dropout Risk Prediction API is running";
    Json(serde_json::json!({ "message": MESSAGE }))
}

pub async fn health() -> impl IntoResponse {
    // AppState is only built from a successfully loaded artifact
    Json(serde_json::json!({
        "status": "OK",
        "model_loaded": true
    }))
}

pub async fn predict(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<PredictionResult>, ApiError> {
    let Json(payload) = payload?;
    let record = StudentRecord::from_value(&payload)?;
    let result = prediction::predict(state.model.as_ref(), &record)?;

    tracing::info!(
        request_id = %Uuid::new_v4(),
        prediction = %result.prediction,
        probability = result.probability,
        "prediction served"
    );

    Ok(Json(result))
}
