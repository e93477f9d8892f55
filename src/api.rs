pub(crate) mod health;
pub(crate) mod jobs;
pub(crate) mod metrics;
pub(crate) mod retry;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::app::AppState;

pub(crate) fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/metrics", get(metrics::exporter))
        .route("/run-building-job", get(jobs::run_building))
        .route("/run-land-job", get(jobs::run_land))
        .route("/run-all-jobs", get(jobs::run_all))
        .route("/retry-status", get(retry::status))
        .route("/reset-retry/{record_id}", post(retry::reset_one))
        .route("/reset-all-retry", post(retry::reset_all))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
