//! Periodic sweep of expired jobs and orphaned workspaces, grounded on
//! `riptide-workers`'s background GC task pattern (a `tokio::time::interval`
//! loop spawned once at boot) and `store::jobs_to_reap` for the decision
//! logic itself.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{info, warn};

use crate::config::Config;
use crate::store::{jobs_to_reap, JobStore};
use crate::workspace::Workspace;

pub struct Janitor {
    store: Arc<JobStore>,
    workspace: Workspace,
    old_file_ttl_hours: i64,
    failed_job_ttl_hours: i64,
    completed_job_ttl_hours: i64,
}

impl Janitor {
    pub fn new(store: Arc<JobStore>, workspace: Workspace, config: &Config) -> Self {
        Self {
            store,
            workspace,
            old_file_ttl_hours: config.old_file_ttl_hours,
            failed_job_ttl_hours: config.failed_job_ttl_hours,
            completed_job_ttl_hours: config.completed_job_ttl_hours,
        }
    }

    /// Run one sweep: reap expired job records + their workspaces, then
    /// separately sweep orphaned directories under `jobs/` (spec §4.7).
    pub async fn sweep_once(&self) {
        self.reap_expired_jobs().await;
        self.sweep_orphans().await;
    }

    async fn reap_expired_jobs(&self) {
        let now = Utc::now();
        let jobs = self.store.snapshot().await;
        let ids = jobs_to_reap(
            &jobs,
            now,
            self.old_file_ttl_hours,
            self.failed_job_ttl_hours,
            self.completed_job_ttl_hours,
        );
        if ids.is_empty() {
            return;
        }
        for id in &ids {
            if let Err(e) = self.workspace.destroy(id).await {
                warn!(job_id = id, error = %e, "failed to destroy expired workspace");
            }
        }
        self.store.remove_many(&ids).await;
        info!(count = ids.len(), "janitor reaped expired jobs");
    }

    /// Remove directories under `jobs/` with no live job record, once they
    /// are older than `old_file_ttl_hours` (to avoid racing a just-created
    /// workspace whose Job record hasn't been inserted yet).
    ///
    /// Holds the store's write lock for the whole enumeration (spec §5):
    /// a Dispatcher launch that calls `JobStore::insert` blocks until this
    /// sweep finishes, so a job can't be registered for a directory in the
    /// instant between this sweep reading the directory listing and it
    /// deciding that directory is orphaned.
    async fn sweep_orphans(&self) {
        let entries = match self.workspace.list_job_dirs().await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, "failed to list workspace jobs directory during orphan sweep");
                return;
            }
        };

        let ttl = Duration::from_secs((self.old_file_ttl_hours.max(0) as u64) * 3600);
        let now = std::time::SystemTime::now();
        let mut reaped = 0usize;
        let mut to_remove = Vec::new();

        {
            let jobs = self.store.write_lock().await;
            for (name, mtime) in &entries {
                if jobs.contains_key(name) {
                    continue;
                }
                let age = now.duration_since(*mtime).unwrap_or(Duration::ZERO);
                if age < ttl {
                    continue;
                }
                to_remove.push(name.clone());
            }
        }

        for name in to_remove {
            let path = self.workspace.job_dir(&name);
            if let Err(e) = self.workspace.destroy_orphan(&path).await {
                warn!(dir = name, error = %e, "failed to remove orphaned workspace");
            } else {
                reaped += 1;
            }
        }
        if reaped > 0 {
            info!(count = reaped, "janitor removed orphaned workspaces");
        }
    }
}

/// Spawn the periodic sweep task. Must be started once at boot.
pub fn spawn(janitor: Arc<Janitor>, interval_hours: u64) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(interval_hours.max(1) * 3600));
        interval.tick().await; // first tick fires immediately; skip the startup sweep
        loop {
            interval.tick().await;
            janitor.sweep_once().await;
        }
    })
}
