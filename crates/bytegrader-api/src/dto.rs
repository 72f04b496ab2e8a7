use bytegrader_core::Job;
use serde::Serialize;

#[derive(Serialize)]
pub struct SubmitResponse {
    pub job_id: String,
    pub status: &'static str,
    pub message: String,
}

#[derive(Serialize)]
pub struct StatusResponse {
    pub job: Job,
}

#[derive(Serialize)]
pub struct QueueResponse {
    pub queue_length: usize,
    pub total_jobs: usize,
    pub active_jobs: usize,
    pub max_queue_size: usize,
    pub max_concurrent: usize,
    pub worker_running: bool,
}

#[derive(Serialize)]
pub struct ConfigResponse {
    pub port: u16,
    pub max_file_size_mb: u64,
    pub grading_timeout_min: u64,
    pub queue_buffer_size: usize,
    pub cleanup_interval_hours: u64,
    pub completed_job_ttl_hours: i64,
    pub failed_job_ttl_hours: i64,
    pub old_file_ttl_hours: i64,
    pub require_api_key: bool,
    pub rate_limit_enabled: bool,
    pub rate_limit_requests: u32,
    pub rate_limit_window_min: u64,
    pub max_concurrent_jobs: usize,
    pub max_queue_size: usize,
}

#[derive(Serialize)]
pub struct VersionResponse {
    pub version: &'static str,
    pub build_time: &'static str,
    pub git_commit: &'static str,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}
