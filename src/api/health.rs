use axum::{Json, extract::State};
use serde::Serialize;

use crate::{app::AppState, util::time::to_iso_millis};

#[derive(Debug, Serialize)]
pub(crate) struct HealthReport {
    status: &'static str,
    timestamp: String,
    version: &'static str,
}

pub(crate) async fn health(State(state): State<AppState>) -> Json<HealthReport> {
    Json(HealthReport {
        status: "ok",
        timestamp: to_iso_millis(state.clock().now()),
        version: env!("CARGO_PKG_VERSION"),
    })
}
