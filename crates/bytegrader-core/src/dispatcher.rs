//! Per-job grading protocol: load, resolve the assignment, run the
//! container, collect the result document. Grounded on
//! `riptide-workers::worker::Worker::process_job`'s load/execute/record
//! shape, generalized from a scrape task to a container-graded submission.

use std::time::Duration;

use tracing::{error, info, warn};

use crate::container::{ContainerEngine, ContainerError};
use crate::job::JobResult;
use crate::registry::{Registry, RegistryError};
use crate::store::JobStore;
use crate::workspace::Workspace;

const MAX_FABRICATED_ERROR_LEN: usize = 4 * 1024;

pub struct Dispatcher {
    store: std::sync::Arc<JobStore>,
    workspace: Workspace,
    registry: Registry,
    engine: std::sync::Arc<ContainerEngine>,
    default_timeout: Duration,
    volume_name: String,
}

impl Dispatcher {
    pub fn new(
        store: std::sync::Arc<JobStore>,
        workspace: Workspace,
        registry: Registry,
        engine: std::sync::Arc<ContainerEngine>,
        default_timeout: Duration,
        volume_name: impl Into<String>,
    ) -> Self {
        Self {
            store,
            workspace,
            registry,
            engine,
            default_timeout,
            volume_name: volume_name.into(),
        }
    }

    /// Run the full grading protocol for one job id (spec §4.6). Never
    /// panics on grading failure — all failure paths end in a `failed` Job
    /// with a populated `result.error`, never a propagated error.
    pub async fn dispatch(&self, job_id: &str) {
        self.store.mark_processing(job_id).await;
        info!(job_id, "job marked processing");

        let assignment_id = match self.store.get(job_id).await {
            Some(job) => job.assignment_id,
            None => {
                warn!(job_id, "dispatched job vanished from the store");
                return;
            }
        };

        let assignment = match self.registry.resolve(&assignment_id) {
            Ok(cfg) => cfg,
            Err(RegistryError::UnknownOrDisabled) | Err(RegistryError::InvalidAssignmentId) => {
                self.fail(job_id, "Assignment configuration not found or disabled")
                    .await;
                return;
            }
            Err(e) => {
                self.fail(job_id, format!("Assignment configuration error: {e}"))
                    .await;
                return;
            }
        };

        let timeout = if assignment.timeout_minutes > 0 {
            Duration::from_secs(assignment.timeout_minutes * 60)
        } else {
            self.default_timeout
        };

        let outcome = self
            .engine
            .run_grader(job_id, &self.volume_name, &assignment, timeout)
            .await;

        match outcome {
            Ok(run) => self.collect_result(job_id, run.exit_code, &run.stdout_and_stderr).await,
            Err(ContainerError::Timeout) => {
                self.fail(job_id, "grading timed out").await;
            }
            Err(e) => {
                self.fail(job_id, format!("container error: {e}")).await;
            }
        }
    }

    /// Step 6: result collection is attempted regardless of exit code.
    async fn collect_result(&self, job_id: &str, exit_code: i64, combined_output: &str) {
        match self.workspace.read_output(job_id).await {
            Some(bytes) => match serde_json::from_slice::<JobResult>(&bytes) {
                Ok(result) if result.error.is_empty() => {
                    self.store.mark_completed(job_id, result).await;
                    self.workspace.delete_submission(job_id).await.ok();
                    info!(job_id, exit_code, "job completed");
                }
                Ok(result) => {
                    let error = result.error.clone();
                    self.store.mark_failed(job_id, error).await;
                    self.workspace.delete_submission(job_id).await.ok();
                    warn!(job_id, exit_code, "job completed with an error result");
                }
                Err(e) => {
                    let snippet = String::from_utf8_lossy(&bytes);
                    let truncated = truncate(&snippet, MAX_FABRICATED_ERROR_LEN);
                    self.fail(
                        job_id,
                        format!("malformed result document: {e}; raw: {truncated}"),
                    )
                    .await;
                }
            },
            None if exit_code == 0 => {
                self.fail(job_id, "grader exited 0 without writing a result document")
                    .await;
            }
            None => {
                let truncated = truncate(combined_output, MAX_FABRICATED_ERROR_LEN);
                self.fail(
                    job_id,
                    format!("grader exited {exit_code} without a result document: {truncated}"),
                )
                .await;
            }
        }
    }

    async fn fail(&self, job_id: &str, error: impl Into<String>) {
        let error = error.into();
        error!(job_id, error = %error, "job failed");
        self.store.mark_failed(job_id, error).await;
        self.workspace.delete_submission(job_id).await.ok();
    }
}

fn truncate(s: &str, max: usize) -> &str {
    if s.len() <= max {
        s
    } else {
        let mut end = max;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        &s[..end]
    }
}
