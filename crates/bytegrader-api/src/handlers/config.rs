use axum::extract::State;
use axum::Json;

use crate::dto::ConfigResponse;
use crate::state::AppState;

/// `GET /config` (admin) — redacted configuration introspection (spec
/// §4.8). Never echoes `valid_api_keys` or `allowed_ips` contents.
pub async fn config(State(state): State<AppState>) -> Json<ConfigResponse> {
    let config = &state.config;
    Json(ConfigResponse {
        port: config.port,
        max_file_size_mb: config.max_file_size_mb,
        grading_timeout_min: config.grading_timeout_min,
        queue_buffer_size: config.queue_buffer_size,
        cleanup_interval_hours: config.cleanup_interval_hours,
        completed_job_ttl_hours: config.completed_job_ttl_hours,
        failed_job_ttl_hours: config.failed_job_ttl_hours,
        old_file_ttl_hours: config.old_file_ttl_hours,
        require_api_key: config.require_api_key,
        rate_limit_enabled: config.rate_limit_enabled,
        rate_limit_requests: config.rate_limit_requests,
        rate_limit_window_min: config.rate_limit_window_min,
        max_concurrent_jobs: config.max_concurrent_jobs,
        max_queue_size: config.max_queue_size,
    })
}
