//! Per-job workspace directory tree on the shared volume.
//!
//! `<root>/jobs/<id>/{submission,results}/`. The engine never reads or
//! writes anything else inside a workspace (spec §3) — content validation
//! is the grader's job, not ours.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

/// Owns the filesystem bytes of one job.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    pub fn new(workspace_root: impl Into<PathBuf>) -> Self {
        Self {
            root: workspace_root.into(),
        }
    }

    pub fn jobs_dir(&self) -> PathBuf {
        self.root.join("jobs")
    }

    pub fn job_dir(&self, id: &str) -> PathBuf {
        self.jobs_dir().join(id)
    }

    pub fn submission_path(&self, id: &str) -> PathBuf {
        self.job_dir(id).join("submission").join("submission.zip")
    }

    pub fn results_dir(&self, id: &str) -> PathBuf {
        self.job_dir(id).join("results")
    }

    pub fn output_path(&self, id: &str) -> PathBuf {
        self.results_dir(id).join("output.json")
    }

    /// Create `submission/` and `results/` for a new job and write the
    /// uploaded archive bytes.
    pub async fn create(&self, id: &str, archive: &[u8]) -> Result<PathBuf> {
        let submission_dir = self.job_dir(id).join("submission");
        let results_dir = self.results_dir(id);

        fs::create_dir_all(&submission_dir)
            .await
            .with_context(|| format!("creating submission dir for job {id}"))?;
        fs::create_dir_all(&results_dir)
            .await
            .with_context(|| format!("creating results dir for job {id}"))?;
        set_mode(&submission_dir, 0o755).await?;
        set_mode(&results_dir, 0o755).await?;

        let archive_path = self.submission_path(id);
        fs::write(&archive_path, archive)
            .await
            .with_context(|| format!("writing submission archive for job {id}"))?;
        set_mode(&archive_path, 0o644).await?;

        debug!(job_id = id, path = %archive_path.display(), "workspace created");
        Ok(archive_path)
    }

    /// Read back the grader's result document, if present.
    pub async fn read_output(&self, id: &str) -> Option<Vec<u8>> {
        fs::read(self.output_path(id)).await.ok()
    }

    /// Remove the uploaded archive only (used when a job fails and the
    /// dispatcher wants to free space without destroying the queryable
    /// workspace, per spec §4.6 step 7).
    pub async fn delete_submission(&self, id: &str) -> Result<()> {
        let path = self.submission_path(id);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("deleting submission for job {id}")),
        }
    }

    /// Remove the entire job directory tree. Only the Janitor calls this
    /// during steady state (spec §3 ownership).
    pub async fn destroy(&self, id: &str) -> Result<()> {
        let dir = self.job_dir(id);
        match fs::remove_dir_all(&dir).await {
            Ok(()) => {
                info!(job_id = id, "workspace destroyed");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("destroying workspace for job {id}")),
        }
    }

    /// List job-id directories currently present under `jobs/`, for the
    /// Janitor's orphan sweep.
    pub async fn list_job_dirs(&self) -> Result<Vec<(String, std::time::SystemTime)>> {
        let jobs_dir = self.jobs_dir();
        let mut out = Vec::new();
        let mut entries = match fs::read_dir(&jobs_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(out),
            Err(e) => return Err(e).context("listing workspace jobs directory"),
        };
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            let mtime = entry.metadata().await?.modified()?;
            out.push((name, mtime));
        }
        Ok(out)
    }

    /// Remove an orphaned directory under `jobs/` by path, for the
    /// Janitor's orphan sweep (no live job record backs it).
    pub async fn destroy_orphan(&self, path: &Path) -> Result<()> {
        match fs::remove_dir_all(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("removing orphan {}", path.display())),
        }
    }
}

#[cfg(unix)]
async fn set_mode(path: &Path, mode: u32) -> Result<()> {
    let perms = std::fs::Permissions::from_mode(mode);
    fs::set_permissions(path, perms)
        .await
        .with_context(|| format!("setting mode on {}", path.display()))
}

#[cfg(not(unix))]
async fn set_mode(_path: &Path, _mode: u32) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn create_writes_archive_and_dirs() {
        let dir = tempdir().unwrap();
        let ws = Workspace::new(dir.path());
        let path = ws.create("job1", b"pk\x03\x04fake-zip").await.unwrap();
        assert!(path.exists());
        assert!(ws.results_dir("job1").exists());
        let bytes = fs::read(&path).await.unwrap();
        assert_eq!(bytes, b"pk\x03\x04fake-zip");
    }

    #[tokio::test]
    async fn destroy_removes_tree() {
        let dir = tempdir().unwrap();
        let ws = Workspace::new(dir.path());
        ws.create("job1", b"data").await.unwrap();
        ws.destroy("job1").await.unwrap();
        assert!(!ws.job_dir("job1").exists());
    }

    #[tokio::test]
    async fn destroy_missing_job_is_not_an_error() {
        let dir = tempdir().unwrap();
        let ws = Workspace::new(dir.path());
        ws.destroy("does-not-exist").await.unwrap();
    }

    #[tokio::test]
    async fn read_output_missing_returns_none() {
        let dir = tempdir().unwrap();
        let ws = Workspace::new(dir.path());
        ws.create("job1", b"data").await.unwrap();
        assert!(ws.read_output("job1").await.is_none());
    }

    #[tokio::test]
    async fn two_submissions_get_independent_workspaces() {
        let dir = tempdir().unwrap();
        let ws = Workspace::new(dir.path());
        ws.create("job1", b"one").await.unwrap();
        ws.create("job2", b"two").await.unwrap();
        assert_eq!(fs::read(ws.submission_path("job1")).await.unwrap(), b"one");
        assert_eq!(fs::read(ws.submission_path("job2")).await.unwrap(), b"two");
    }
}
