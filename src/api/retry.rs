use axum::{
    Json,
    extract::{Path, State},
};
use serde::Serialize;
use tracing::info;

use crate::{app::AppState, scheduler::RetryStatus};

#[derive(Debug, Serialize)]
pub(crate) struct ResetResponse {
    success: bool,
    message: String,
}

pub(crate) async fn status(State(state): State<AppState>) -> Json<RetryStatus> {
    Json(state.ledger().status())
}

pub(crate) async fn reset_one(
    State(state): State<AppState>,
    Path(record_id): Path<String>,
) -> Json<ResetResponse> {
    if state.ledger().reset(&record_id) {
        info!(record_id = %record_id, "retry history reset manually");
        Json(ResetResponse {
            success: true,
            message: format!("레코드 {record_id}의 재시도 이력이 리셋되었습니다."),
        })
    } else {
        Json(ResetResponse {
            success: false,
            message: format!("레코드 {record_id}의 재시도 이력이 없습니다."),
        })
    }
}

pub(crate) async fn reset_all(State(state): State<AppState>) -> Json<ResetResponse> {
    let count = state.ledger().reset_all();
    info!(count, "all retry history reset manually");
    Json(ResetResponse {
        success: true,
        message: format!("{count}개 레코드의 재시도 이력이 리셋되었습니다."),
    })
}
