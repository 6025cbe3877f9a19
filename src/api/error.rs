use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::prediction::PredictError;
use crate::record::{FieldIssue, ValidationError};

/// Errors a request handler can surface to the caller.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("request body could not be read: {0}")]
    Body(#[from] JsonRejection),
    #[error(transparent)]
    Prediction(#[from] PredictError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Validation(err) => {
                (StatusCode::UNPROCESSABLE_ENTITY, Json(json!({ "detail": err.issues })))
                    .into_response()
            }
            ApiError::Body(rejection) => {
                let issue = FieldIssue {
                    field: "body".to_string(),
                    message: rejection.body_text(),
                };
                (rejection.status(), Json(json!({ "detail": [issue] }))).into_response()
            }
            ApiError::Prediction(err) => {
                tracing::error!(error = %err, "prediction failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "detail": err.to_string() })),
                )
                    .into_response()
            }
        }
    }
}
