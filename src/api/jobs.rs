use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use tracing::{error, info};

use crate::{app::AppState, domain::Domain};

#[derive(Debug, Serialize)]
struct Completed<T> {
    message: &'static str,
    result: T,
}

#[derive(Debug, Serialize)]
struct Failed<T> {
    error: &'static str,
    details: String,
    result: T,
}

fn respond<T: Serialize>(
    completed: &'static str,
    failed: &'static str,
    pass_error: Option<String>,
    result: T,
) -> axum::response::Response {
    match pass_error {
        None => Json(Completed {
            message: completed,
            result,
        })
        .into_response(),
        Some(details) => {
            error!(error = %details, "{failed}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(Failed {
                    error: failed,
                    details,
                    result,
                }),
            )
                .into_response()
        }
    }
}

pub(crate) async fn run_building(State(state): State<AppState>) -> impl IntoResponse {
    info!(domain = %Domain::Building, "pass triggered manually");
    let outcome = state.orchestrator().run_pass(Domain::Building).await;
    respond(
        "Building job completed",
        "Failed to run building job",
        outcome.error.clone(),
        outcome,
    )
}

pub(crate) async fn run_land(State(state): State<AppState>) -> impl IntoResponse {
    info!(domain = %Domain::Land, "pass triggered manually");
    let outcome = state.orchestrator().run_pass(Domain::Land).await;
    respond(
        "Land job completed",
        "Failed to run land job",
        outcome.error.clone(),
        outcome,
    )
}

pub(crate) async fn run_all(State(state): State<AppState>) -> impl IntoResponse {
    info!("all passes triggered manually");
    let outcome = state.orchestrator().run_all().await;
    respond(
        "All jobs completed",
        "Failed to run all jobs",
        outcome.error().map(str::to_string),
        outcome,
    )
}
