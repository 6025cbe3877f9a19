//! Form dashboard that collects a student record and shows the predicted outcome.

pub mod form;
pub mod render;

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::State,
    response::Html,
    routing::get,
    Form, Router,
};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::client::PredictClient;
use crate::record::StudentRecord;
use form::FormValues;
use render::ResultView;

pub struct DashboardState {
    pub client: PredictClient,
}

pub fn router(state: Arc<DashboardState>) -> Router {
    Router::new()
        .route("/", get(show_form).post(submit_form))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(listener: TcpListener, state: Arc<DashboardState>) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        tracing::info!(
            "dashboard started on http://{} (predictions from {})",
            addr,
            state.client.predict_url()
        );
    }
    axum::serve(listener, router(state)).await
}

async fn show_form() -> Html<String> {
    let values = FormValues::from_record(&StudentRecord::default());
    Html(render::page(&values, &[], None))
}

async fn submit_form(
    State(state): State<Arc<DashboardState>>,
    Form(fields): Form<HashMap<String, String>>,
) -> Html<String> {
    let values = FormValues::from(fields);
    let record = match values.parse() {
        Ok(record) => record,
        Err(err) => return Html(render::page(&values, &err.issues, None)),
    };

    // any failure renders the generic message, the cause is not surfaced
    let view = match state.client.predict(&record).await {
        Ok(result) => ResultView::Prediction(result),
        Err(_) => ResultView::ConnectionError,
    };

    Html(render::page(&values, &[], Some(&view)))
}
