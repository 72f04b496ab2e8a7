use axum::extract::State;
use axum::Json;

use crate::dto::QueueResponse;
use crate::state::AppState;

/// `GET /queue` — observability endpoint, no admission beyond the common
/// pipeline (spec §4.8).
pub async fn queue(State(state): State<AppState>) -> Json<QueueResponse> {
    Json(QueueResponse {
        queue_length: state.queue.queue_length(),
        total_jobs: state.store.len().await,
        active_jobs: state.queue.active_jobs(),
        max_queue_size: state.queue.max_queue_size(),
        max_concurrent: state.config.max_concurrent_jobs,
        worker_running: true,
    })
}
