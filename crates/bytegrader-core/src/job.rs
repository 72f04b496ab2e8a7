//! Job record and lifecycle, grounded on `riptide-workers::job::Job` but
//! trimmed to the single-purpose autograder lifecycle: `queued -> processing
//! -> {completed, failed}`, no retry/priority/dead-letter machinery since
//! the dispatcher never retries (spec §4.6 edge cases: "no retry - the
//! client resubmits").

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque, URL-safe, time-sortable job identifier.
///
/// Encodes a UUIDv7 (time-ordered) as unpadded base64url, per spec §3.
pub fn new_job_id() -> String {
    let uuid = Uuid::now_v7();
    URL_SAFE_NO_PAD.encode(uuid.as_bytes())
}

/// Job status. Transitions are monotonic: `Queued -> Processing ->
/// {Completed, Failed}`. No other transition is valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

/// The grader's result document, `results/output.json` in the workspace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobResult {
    pub score: f64,
    pub feedback: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,
}

/// A single submission and its lifecycle state.
#[derive(Debug, Clone, Serialize)]
pub struct Job {
    pub id: String,
    pub filename: String,
    pub size_bytes: u64,
    pub assignment_id: String,
    pub username: String,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    /// Filesystem path of the stored archive. Never serialized to clients.
    #[serde(skip)]
    pub file_path: String,

    pub result: Option<JobResult>,
}

impl Job {
    pub fn new(filename: String, size_bytes: u64, assignment_id: String, username: String) -> Self {
        let now = Utc::now();
        Self {
            id: new_job_id(),
            filename,
            size_bytes,
            assignment_id,
            username,
            status: JobStatus::Queued,
            created_at: now,
            updated_at: now,
            file_path: String::new(),
            result: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.status, JobStatus::Completed | JobStatus::Failed)
    }

    pub fn mark_processing(&mut self) {
        self.status = JobStatus::Processing;
        self.updated_at = Utc::now();
    }

    pub fn mark_completed(&mut self, result: JobResult) {
        self.status = JobStatus::Completed;
        self.result = Some(result);
        self.updated_at = Utc::now();
    }

    pub fn mark_failed(&mut self, error: impl Into<String>) {
        self.status = JobStatus::Failed;
        self.result = Some(JobResult {
            score: 0.0,
            feedback: String::new(),
            error: error.into(),
        });
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_job_starts_queued() {
        let job = Job::new("hello.zip".into(), 1024, "test-stub".into(), "alice".into());
        assert_eq!(job.status, JobStatus::Queued);
        assert!(job.result.is_none());
        assert!(!job.is_terminal());
    }

    #[test]
    fn job_ids_are_unique_and_url_safe() {
        let a = new_job_id();
        let b = new_job_id();
        assert_ne!(a, b);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        assert!(!a.contains('='));
    }

    #[test]
    fn mark_completed_sets_terminal_result() {
        let mut job = Job::new("a.zip".into(), 10, "x".into(), "bob".into());
        job.mark_processing();
        assert_eq!(job.status, JobStatus::Processing);
        job.mark_completed(JobResult {
            score: 100.0,
            feedback: "ok".into(),
            error: String::new(),
        });
        assert!(job.is_terminal());
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.result.unwrap().score, 100.0);
    }

    #[test]
    fn mark_failed_sets_error_result() {
        let mut job = Job::new("a.zip".into(), 10, "x".into(), "bob".into());
        job.mark_failed("engine unavailable");
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.result.unwrap().error, "engine unavailable");
    }

    #[test]
    fn serialization_omits_file_path() {
        let mut job = Job::new("a.zip".into(), 10, "x".into(), "bob".into());
        job.file_path = "/var/bytegrader/jobs/abc/submission/submission.zip".into();
        let json = serde_json::to_string(&job).unwrap();
        assert!(!json.contains("file_path"));
        assert!(!json.contains("submission.zip"));
    }
}
