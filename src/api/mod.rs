//! HTTP inference service: `GET /`, `GET /health` and `POST /predict`.

mod error;
mod handlers;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub use error::ApiError;

use crate::model::{self, Classifier, ModelError};

/// Shared, read-only state handed to every request.
pub struct AppState {
    pub model: Arc<dyn Classifier>,
    pub model_path: PathBuf,
    pub loaded_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(model: Arc<dyn Classifier>, model_path: impl Into<PathBuf>) -> Self {
        Self {
            model,
            model_path: model_path.into(),
            loaded_at: Utc::now(),
        }
    }

    /// Loads the artifact once; the service must not start if this fails.
    pub fn load(model_path: &Path) -> Result<Self, ModelError> {
        let classifier = model::load_artifact(model_path)?;
        tracing::info!(
            path = %model_path.display(),
            model = %classifier.describe(),
            "model artifact loaded"
        );
        Ok(Self::new(Arc::new(classifier), model_path))
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route("/predict", post(handlers::predict))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn serve(listener: TcpListener, state: Arc<AppState>) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        tracing::info!(
            "prediction service started on http://{} (model {} loaded {})",
            addr,
            state.model_path.display(),
            state.loaded_at.format("%Y-%m-%d %H:%M:%S UTC")
        );
    }
    axum::serve(listener, router(state)).await
}
