//! In-memory job table, guarded by a single reader-writer lock — the same
//! shape as `riptide-workers::queue::JobQueue`'s `job_cache:
//! Arc<RwLock<HashMap<Uuid, Job>>>`, minus the Redis-backed durability layer
//! the teacher pairs it with (this spec is explicitly in-memory only).

use crate::job::{Job, JobResult, JobStatus};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
pub struct JobStore {
    jobs: RwLock<HashMap<String, Job>>,
}

impl JobStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            jobs: RwLock::new(HashMap::new()),
        })
    }

    pub async fn insert(&self, job: Job) {
        let mut jobs = self.jobs.write().await;
        jobs.insert(job.id.clone(), job);
    }

    pub async fn get(&self, id: &str) -> Option<Job> {
        self.jobs.read().await.get(id).cloned()
    }

    pub async fn mark_processing(&self, id: &str) {
        if let Some(job) = self.jobs.write().await.get_mut(id) {
            job.mark_processing();
        }
    }

    pub async fn mark_completed(&self, id: &str, result: JobResult) {
        if let Some(job) = self.jobs.write().await.get_mut(id) {
            job.mark_completed(result);
        }
    }

    pub async fn mark_failed(&self, id: &str, error: impl Into<String>) {
        if let Some(job) = self.jobs.write().await.get_mut(id) {
            job.mark_failed(error);
        }
    }

    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Snapshot of every job, for the Janitor's TTL sweep. Cheap clone:
    /// jobs are small records with no large payload.
    pub async fn snapshot(&self) -> Vec<Job> {
        self.jobs.read().await.values().cloned().collect()
    }

    /// Remove jobs by id (Janitor only, per spec §3 ownership).
    pub async fn remove_many(&self, ids: &[String]) {
        let mut jobs = self.jobs.write().await;
        for id in ids {
            jobs.remove(id);
        }
    }

    /// Exclusive access to the underlying table for callers that must hold
    /// it across several operations — the Janitor's orphan sweep (spec §5)
    /// takes this once and keeps it for the whole directory enumeration so
    /// a Dispatcher launch can't insert a job between an orphan's existence
    /// check and its removal.
    pub async fn write_lock(&self) -> tokio::sync::RwLockWriteGuard<'_, HashMap<String, Job>> {
        self.jobs.write().await
    }
}

/// Decide which terminal/stale jobs the Janitor should reap, given the
/// current time and the configured TTLs (spec §4.7). Pure function so the
/// sweep logic is unit-testable without a filesystem.
pub fn jobs_to_reap(
    jobs: &[Job],
    now: DateTime<Utc>,
    old_file_ttl_hours: i64,
    failed_job_ttl_hours: i64,
    completed_job_ttl_hours: i64,
) -> Vec<String> {
    let old_file_ttl = chrono::Duration::hours(old_file_ttl_hours);
    let failed_ttl = chrono::Duration::hours(failed_job_ttl_hours);
    let completed_ttl = chrono::Duration::hours(completed_job_ttl_hours);

    jobs.iter()
        .filter(|job| {
            if now - job.created_at > old_file_ttl {
                return true;
            }
            match job.status {
                JobStatus::Failed => now - job.updated_at > failed_ttl,
                JobStatus::Completed => now - job.updated_at > completed_ttl,
                _ => false,
            }
        })
        .map(|job| job.id.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::Job;

    #[tokio::test]
    async fn insert_and_get_roundtrip() {
        let store = JobStore::new();
        let job = Job::new("a.zip".into(), 1, "x".into(), "alice".into());
        let id = job.id.clone();
        store.insert(job).await;
        let fetched = store.get(&id).await.unwrap();
        assert_eq!(fetched.id, id);
        assert_eq!(fetched.status, JobStatus::Queued);
    }

    #[tokio::test]
    async fn get_missing_returns_none() {
        let store = JobStore::new();
        assert!(store.get("nope").await.is_none());
    }

    #[tokio::test]
    async fn status_updates_are_visible_immediately() {
        let store = JobStore::new();
        let job = Job::new("a.zip".into(), 1, "x".into(), "alice".into());
        let id = job.id.clone();
        store.insert(job).await;

        store.mark_processing(&id).await;
        assert_eq!(store.get(&id).await.unwrap().status, JobStatus::Processing);

        store
            .mark_completed(
                &id,
                JobResult {
                    score: 90.0,
                    feedback: "nice".into(),
                    error: String::new(),
                },
            )
            .await;
        let job = store.get(&id).await.unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert!(job.result.is_some());
    }

    #[tokio::test]
    async fn remove_many_drops_entries() {
        let store = JobStore::new();
        let job = Job::new("a.zip".into(), 1, "x".into(), "alice".into());
        let id = job.id.clone();
        store.insert(job).await;
        store.remove_many(&[id.clone()]).await;
        assert!(store.get(&id).await.is_none());
    }

    #[test]
    fn reaps_jobs_past_old_file_ttl_regardless_of_status() {
        let now = Utc::now();
        let mut job = Job::new("a.zip".into(), 1, "x".into(), "alice".into());
        job.created_at = now - chrono::Duration::hours(100);
        job.status = JobStatus::Processing;
        let reap = jobs_to_reap(&[job.clone()], now, 72, 24, 24);
        assert_eq!(reap, vec![job.id]);
    }

    #[test]
    fn reaps_failed_jobs_past_their_ttl_only() {
        let now = Utc::now();
        let mut job = Job::new("a.zip".into(), 1, "x".into(), "alice".into());
        job.status = JobStatus::Failed;
        job.updated_at = now - chrono::Duration::hours(25);
        let reap = jobs_to_reap(&[job.clone()], now, 1000, 24, 24);
        assert_eq!(reap, vec![job.id]);
    }

    #[test]
    fn keeps_fresh_terminal_jobs() {
        let now = Utc::now();
        let mut job = Job::new("a.zip".into(), 1, "x".into(), "alice".into());
        job.status = JobStatus::Completed;
        job.updated_at = now;
        let reap = jobs_to_reap(&[job], now, 1000, 24, 24);
        assert!(reap.is_empty());
    }
}
