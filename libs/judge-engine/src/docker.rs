/// Docker isolate - runs commands inside a long-lived sandbox container
///
/// **Layout:**
/// The workspace host directory is bind-mounted into the container
/// (e.g. `-v /srv/judge:/code-tmp`). Artifacts are written on the host
/// side and executed through `docker exec` against the in-container path.
///
/// **Timeout enforcement:**
/// - Every command is wrapped in `timeout --signal=KILL <limit>` inside the
///   container, so it dies on schedule even if nobody is waiting on it
/// - If the exec has not returned after the limit plus a grace period,
///   every process referencing the run directory is killed with `pkill`
use crate::error::IsolateError;
use crate::isolate::{display_argv, Capture, Isolate, RawOutput};
use crate::workspace::Workspace;
use async_trait::async_trait;
use bollard::container::LogOutput;
use bollard::exec::{CreateExecOptions, StartExecOptions, StartExecResults};
use bollard::Docker;
use futures_util::stream::StreamExt;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Extra time given to the in-container `timeout` before the host gives up.
const KILL_GRACE: Duration = Duration::from_secs(2);

/// GNU `timeout` exit status when the limit was hit.
const TIMEOUT_EXIT_CODE: i64 = 124;
/// 128 + SIGKILL.
const KILLED_EXIT_CODE: i64 = 137;

/// Whether an exec was stopped by the in-container `timeout` guard.
///
/// A program can exit with 124 or 137 on its own, so the status only counts
/// once the limit has actually elapsed.
fn hit_time_limit(exit_code: Option<i64>, elapsed: Duration, limit: Duration) -> bool {
    matches!(exit_code, Some(TIMEOUT_EXIT_CODE) | Some(KILLED_EXIT_CODE)) && elapsed >= limit
}

pub struct DockerIsolate {
    docker: Docker,
    container: String,
    workspace: Workspace,
}

impl DockerIsolate {
    pub fn connect(container: impl Into<String>, workspace: Workspace) -> Result<Self, IsolateError> {
        let docker = Docker::connect_with_local_defaults()
            .map_err(|e| IsolateError::Unavailable(format!("failed to connect to Docker daemon: {}", e)))?;
        Ok(Self {
            docker,
            container: container.into(),
            workspace,
        })
    }

    /// Check the sandbox container exists and is running.
    pub async fn ensure_running(&self) -> Result<(), IsolateError> {
        let inspect = self
            .docker
            .inspect_container(&self.container, None::<bollard::container::InspectContainerOptions>)
            .await
            .map_err(|e| IsolateError::Unavailable(format!("container {}: {}", self.container, e)))?;

        let running = inspect.state.and_then(|s| s.running).unwrap_or(false);
        if !running {
            return Err(IsolateError::Unavailable(format!(
                "container {} is not running",
                self.container
            )));
        }

        info!(container = %self.container, "✓ Sandbox container is running");
        Ok(())
    }

    fn guarded_argv(argv: &[String], timeout: Duration) -> Vec<String> {
        let mut guarded = vec![
            "timeout".to_string(),
            "--signal=KILL".to_string(),
            format!("{:.3}s", timeout.as_secs_f64()),
        ];
        guarded.extend(argv.iter().cloned());
        guarded
    }

    /// Run an exec to completion and collect its output and exit code.
    async fn run_exec(&self, argv: Vec<String>, workdir: &Path) -> Result<(String, String, Option<i64>), IsolateError> {
        let exec = self
            .docker
            .create_exec(
                &self.container,
                CreateExecOptions {
                    cmd: Some(argv),
                    attach_stdout: Some(true),
                    attach_stderr: Some(true),
                    working_dir: Some(workdir.to_string_lossy().into_owned()),
                    ..Default::default()
                },
            )
            .await?;

        let started = self
            .docker
            .start_exec(
                &exec.id,
                Some(StartExecOptions {
                    detach: false,
                    ..Default::default()
                }),
            )
            .await?;

        // Frames past the cap are still read so the exec keeps making progress
        let mut stdout = Capture::default();
        let mut stderr = Capture::default();

        if let StartExecResults::Attached { mut output, .. } = started {
            while let Some(msg) = output.next().await {
                match msg {
                    Ok(LogOutput::StdOut { message }) => stdout.push(&message),
                    Ok(LogOutput::StdErr { message }) => stderr.push(&message),
                    Ok(_) => {}
                    Err(e) => {
                        return Err(IsolateError::Launch(format!("lost exec output stream: {}", e)));
                    }
                }
            }
        } else {
            return Err(IsolateError::Launch("exec started detached".to_string()));
        }

        let inspect = self.docker.inspect_exec(&exec.id).await?;
        Ok((stdout.into_text(), stderr.into_text(), inspect.exit_code))
    }

    /// Kill anything still running out of `workdir`.
    async fn kill_stragglers(&self, workdir: &Path) {
        let pattern = workdir.to_string_lossy().into_owned();
        let argv = vec!["pkill".to_string(), "-KILL".to_string(), "-f".to_string(), pattern];
        let root = self.workspace.sandbox_root().to_path_buf();

        match tokio::time::timeout(KILL_GRACE, self.run_exec(argv, &root)).await {
            Ok(Ok(_)) => debug!(workdir = %workdir.display(), "Killed lingering processes"),
            Ok(Err(e)) => warn!(workdir = %workdir.display(), error = %e, "Failed to kill lingering processes"),
            Err(_) => warn!(workdir = %workdir.display(), "Timed out killing lingering processes"),
        }
    }
}

#[async_trait]
impl Isolate for DockerIsolate {
    fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    fn describe(&self, argv: &[String]) -> String {
        format!("docker exec {} {}", self.container, display_argv(argv))
    }

    async fn exec(&self, argv: &[String], workdir: &Path, timeout: Duration) -> Result<RawOutput, IsolateError> {
        if argv.is_empty() {
            return Err(IsolateError::Launch("empty command".to_string()));
        }

        let start = Instant::now();
        let guarded = Self::guarded_argv(argv, timeout);

        match tokio::time::timeout(timeout + KILL_GRACE, self.run_exec(guarded, workdir)).await {
            Ok(Ok((stdout, stderr, exit_code))) => {
                let elapsed = start.elapsed();
                let timed_out = hit_time_limit(exit_code, elapsed, timeout);

                debug!(
                    container = %self.container,
                    exit_code = ?exit_code,
                    timed_out,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Exec finished"
                );

                Ok(RawOutput {
                    stdout,
                    stderr,
                    exit_code,
                    timed_out,
                    elapsed,
                })
            }
            Ok(Err(e)) => Err(e),
            Err(_) => {
                warn!(
                    container = %self.container,
                    timeout_ms = timeout.as_millis() as u64,
                    "Exec did not return in time - killing run processes"
                );
                self.kill_stragglers(workdir).await;
                Ok(RawOutput {
                    timed_out: true,
                    elapsed: start.elapsed(),
                    ..Default::default()
                })
            }
        }
    }
}
