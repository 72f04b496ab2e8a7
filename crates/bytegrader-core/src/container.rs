//! Docker Engine API wrapper: the one component the teacher has no
//! counterpart for (no crawler subsystem touches a container runtime), drawn
//! instead from `bollard`, the Docker client several repos in the pack
//! depend on directly for sandboxed-execution workloads. The
//! `query_parameters::*Builder` + `models::ContainerCreateBody` shape below
//! follows the pack's own `DockerBackend` (a test-validator harness that
//! launches containers the same way: create, start, stream logs, stop,
//! remove).

use anyhow::{anyhow, Context, Result};
use bollard::container::LogOutput;
use bollard::models::{ContainerCreateBody, HostConfig};
use bollard::query_parameters::{
    CreateContainerOptionsBuilder, LogsOptionsBuilder, RemoveContainerOptionsBuilder,
    StartContainerOptions, StopContainerOptionsBuilder, WaitContainerOptionsBuilder,
};
use bollard::Docker;
use futures::StreamExt;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::registry::AssignmentConfig;

/// Outcome of running a grader container to completion.
#[derive(Debug)]
pub struct RunOutcome {
    pub exit_code: i64,
    pub stdout_and_stderr: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ContainerError {
    #[error("container engine unreachable: {0}")]
    EngineUnavailable(String),
    #[error("container failed to start: {0}")]
    StartFailed(String),
    #[error("grading timed out")]
    Timeout,
    #[error("container wait failed: {0}")]
    WaitFailed(String),
}

/// Thin wrapper over a `bollard::Docker` handle, one per process.
pub struct ContainerEngine {
    docker: Docker,
}

impl ContainerEngine {
    /// Connect using the platform default (unix socket on Linux). Failure
    /// here is fatal at boot per spec §7.
    pub fn connect() -> Result<Self> {
        let docker = Docker::connect_with_local_defaults()
            .context("failed to connect to the container engine")?;
        Ok(Self { docker })
    }

    /// Verify the daemon actually answers, beyond socket construction.
    pub async fn ping(&self) -> Result<()> {
        self.docker
            .ping()
            .await
            .map(|_| ())
            .map_err(|e| anyhow!("container engine ping failed: {e}"))
    }

    /// Run one grader container to completion, mounting `volume_name` at
    /// `/workspace`, and return its exit code plus combined output. Honors
    /// `timeout` as a hard deadline: on expiry the container is stopped and
    /// `ContainerError::Timeout` is returned. Emits a heartbeat log line
    /// every 10 seconds while waiting, per spec §4.6 step 5.
    pub async fn run_grader(
        &self,
        job_id: &str,
        volume_name: &str,
        assignment: &AssignmentConfig,
        timeout: Duration,
    ) -> Result<RunOutcome, ContainerError> {
        let name = format!("bytegrader-{job_id}");

        let mut env: Vec<String> = vec![
            "BYTEGRADER_VOLUME_MODE=true".to_string(),
            format!("BYTEGRADER_JOB_ID={job_id}"),
        ];
        for (k, v) in &assignment.environment {
            env.push(format!("{k}={v}"));
        }

        let host_config = HostConfig {
            binds: Some(vec![format!("{volume_name}:/workspace")]),
            memory: assignment.resources.memory_mb.map(|mb| (mb as i64) * 1024 * 1024),
            nano_cpus: assignment
                .resources
                .cpu_limit
                .map(|cores| (cores * 1_000_000_000.0) as i64),
            pids_limit: assignment.resources.pids_limit.filter(|p| *p > 0),
            auto_remove: Some(true),
            ..Default::default()
        };

        let (uid, gid) = host_uid_gid();

        let config = ContainerCreateBody {
            image: Some(assignment.image.clone()),
            working_dir: Some("/workspace".to_string()),
            env: Some(env),
            user: Some(format!("{uid}:{gid}")),
            host_config: Some(host_config),
            ..Default::default()
        };

        let create_options = Some(CreateContainerOptionsBuilder::default().name(&name).build());

        let container = self
            .docker
            .create_container(create_options, config)
            .await
            .map_err(|e| ContainerError::StartFailed(e.to_string()))?;

        self.docker
            .start_container(&container.id, None::<StartContainerOptions>)
            .await
            .map_err(|e| ContainerError::StartFailed(e.to_string()))?;

        info!(job_id, container_id = %container.id, "grader container started");

        let result = self.wait_with_heartbeat(&container.id, timeout).await;

        let stdout_and_stderr = self.collect_logs(&container.id).await;

        match result {
            Ok(exit_code) => Ok(RunOutcome {
                exit_code,
                stdout_and_stderr,
            }),
            Err(ContainerError::Timeout) => {
                self.stop_container(&container.id).await;
                Err(ContainerError::Timeout)
            }
            Err(other) => Err(other),
        }
    }

    async fn wait_with_heartbeat(
        &self,
        container_id: &str,
        timeout: Duration,
    ) -> Result<i64, ContainerError> {
        let wait_options = Some(
            WaitContainerOptionsBuilder::default()
                .condition("not-running")
                .build(),
        );
        let mut wait_stream = self.docker.wait_container(container_id, wait_options);
        let deadline = tokio::time::sleep(timeout);
        tokio::pin!(deadline);
        let mut heartbeat = tokio::time::interval(Duration::from_secs(10));
        heartbeat.tick().await; // first tick fires immediately; consume it

        loop {
            tokio::select! {
                next = wait_stream.next() => {
                    return match next {
                        Some(Ok(response)) => Ok(response.status_code),
                        Some(Err(e)) => Err(ContainerError::WaitFailed(e.to_string())),
                        None => Err(ContainerError::WaitFailed("wait stream closed without a response".into())),
                    };
                }
                _ = heartbeat.tick() => {
                    debug!(container_id, "still running");
                }
                _ = &mut deadline => {
                    return Err(ContainerError::Timeout);
                }
            }
        }
    }

    async fn stop_container(&self, container_id: &str) {
        let options = Some(StopContainerOptionsBuilder::default().t(5).build());
        if let Err(e) = self.docker.stop_container(container_id, options).await {
            warn!(container_id, error = %e, "failed to stop timed-out container");
        }
        let _ = self
            .docker
            .remove_container(
                container_id,
                Some(RemoveContainerOptionsBuilder::default().force(true).build()),
            )
            .await;
    }

    async fn collect_logs(&self, container_id: &str) -> String {
        let options = Some(
            LogsOptionsBuilder::default()
                .stdout(true)
                .stderr(true)
                .tail("200")
                .build(),
        );
        let mut stream = self.docker.logs(container_id, options);
        let mut out = String::new();
        while let Some(chunk) = stream.next().await {
            match chunk {
                Ok(LogOutput::StdOut { message }) | Ok(LogOutput::StdErr { message }) => {
                    out.push_str(&String::from_utf8_lossy(&message));
                }
                Ok(_) => {}
                Err(_) => break,
            }
        }
        const MAX_LEN: usize = 8 * 1024;
        if out.len() > MAX_LEN {
            out.truncate(MAX_LEN);
            out.push_str("...[truncated]");
        }
        out
    }
}

#[cfg(unix)]
fn host_uid_gid() -> (u32, u32) {
    unsafe { (libc::getuid(), libc::getgid()) }
}

#[cfg(not(unix))]
fn host_uid_gid() -> (u32, u32) {
    (0, 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap as Map;

    fn stub_assignment() -> AssignmentConfig {
        AssignmentConfig {
            image: "demo/stub".into(),
            description: String::new(),
            timeout_minutes: 1,
            enabled: true,
            environment: Map::new(),
            resources: crate::registry::ResourceLimits::default(),
        }
    }

    #[test]
    fn host_uid_gid_formats_as_colon_pair() {
        let (uid, gid) = host_uid_gid();
        assert!(format!("{uid}:{gid}").contains(':'));
    }

    #[test]
    fn resource_limits_translate_to_container_units() {
        let assignment = AssignmentConfig {
            resources: crate::registry::ResourceLimits {
                memory_mb: Some(512),
                cpu_limit: Some(1.5),
                pids_limit: Some(64),
            },
            ..stub_assignment()
        };
        let memory_bytes = assignment.resources.memory_mb.map(|mb| (mb as i64) * 1024 * 1024);
        assert_eq!(memory_bytes, Some(512 * 1024 * 1024));
        let nano_cpus = assignment
            .resources
            .cpu_limit
            .map(|cores| (cores * 1_000_000_000.0) as i64);
        assert_eq!(nano_cpus, Some(1_500_000_000));
    }
}
