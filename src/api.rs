//! Status surface for the sync daemon: liveness, last cycle, manual trigger.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

use crate::ingest::scheduler::{CycleOutcome, SyncJob};
use crate::reconcile::SyncReport;

#[derive(Clone)]
pub struct AppState {
    pub job: SyncJob,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/status", get(status))
        .route("/sync", post(trigger_sync))
        .with_state(state)
}

#[derive(Serialize)]
struct StatusOut {
    running: bool,
    last: Option<SyncReport>,
}

async fn status(State(state): State<AppState>) -> Json<StatusOut> {
    Json(StatusOut {
        running: state.job.is_running(),
        last: state.job.last_report(),
    })
}

// The cycle runs on its own task: a client that disconnects drops only the
// join handle, never a cycle halfway through its writes.
async fn trigger_sync(State(state): State<AppState>) -> Response {
    let job = state.job.clone();
    let handle = tokio::spawn(async move { job.run_cycle().await });
    match handle.await {
        Ok(CycleOutcome::Completed(report)) => Json(report).into_response(),
        Ok(CycleOutcome::Skipped) => {
            (StatusCode::CONFLICT, "sync already running").into_response()
        }
        Err(e) => {
            tracing::error!(target: "sync", error = ?e, "manual sync task failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "sync task failed").into_response()
        }
    }
}
