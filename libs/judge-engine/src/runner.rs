/// Sandbox Runner - one artifact, one isolated run
///
/// **Lifecycle per call:**
/// 1. Stage the artifact into a fresh run directory
/// 2. Run each language step (compile, then run) with the remaining budget
/// 3. Classify: completed, non-zero exit, or timed out
/// 4. Remove the run directory, on every path
///
/// A run that fails is still an `Ok(RunReport)`; `Err` is reserved for the
/// isolate itself misbehaving (cannot write, cannot launch).
use crate::error::RunnerError;
use crate::isolate::Isolate;
use crate::language::LanguageProfile;
use crate::workspace::StagedArtifact;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, instrument, warn};

pub const DEFAULT_RUN_TIMEOUT: Duration = Duration::from_secs(10);

/// Generated source for one test case. Owned by exactly one run.
#[derive(Debug, Clone)]
pub struct PreparedArtifact {
    pub file_name: String,
    pub source_text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunVerdict {
    Completed,
    NonZeroExit(Option<i64>),
    TimedOut,
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub verdict: RunVerdict,
    /// Trimmed stdout when completed, otherwise the failure detail.
    pub output: String,
    /// Last command attempted, as `Isolate::describe` renders it.
    pub command: String,
    pub elapsed: Duration,
}

impl RunReport {
    pub fn completed(&self) -> bool {
        self.verdict == RunVerdict::Completed
    }
}

pub struct SandboxRunner {
    isolate: Arc<dyn Isolate>,
    timeout: Duration,
}

impl SandboxRunner {
    pub fn new(isolate: Arc<dyn Isolate>, timeout: Duration) -> Self {
        Self { isolate, timeout }
    }

    #[instrument(skip(self, profile, artifact), fields(language = %profile.id, bytes = artifact.source_text.len()))]
    pub async fn run(&self, profile: &LanguageProfile, artifact: &PreparedArtifact) -> Result<RunReport, RunnerError> {
        let workspace = self.isolate.workspace();

        let staged = match workspace.stage(&artifact.file_name, &artifact.source_text).await {
            Ok(staged) => staged,
            Err(source) => {
                let planned = profile
                    .commands(
                        &workspace.sandbox_root().join(&artifact.file_name),
                        workspace.sandbox_root(),
                    )
                    .first()
                    .map(|argv| self.isolate.describe(argv))
                    .unwrap_or_default();
                return Err(RunnerError { command: planned, source });
            }
        };

        let run_id = staged.run_id;
        let result = self.run_staged(profile, &staged).await;

        if let Err(e) = staged.release().await {
            warn!(run_id = %run_id, error = %e, "Failed to remove run directory");
        }

        if let Ok(report) = &result {
            debug!(
                run_id = %run_id,
                verdict = ?report.verdict,
                elapsed_ms = report.elapsed.as_millis() as u64,
                "Run finished"
            );
        }
        result
    }

    async fn run_staged(&self, profile: &LanguageProfile, staged: &StagedArtifact) -> Result<RunReport, RunnerError> {
        let start = Instant::now();
        let commands = profile.commands(&staged.sandbox_file(), staged.sandbox_dir());
        let mut command = String::new();
        let mut stdout = String::new();

        for argv in &commands {
            command = self.isolate.describe(argv);

            let remaining = self.timeout.saturating_sub(start.elapsed());
            if remaining.is_zero() {
                return Ok(self.timed_out(command, start.elapsed()));
            }

            let output = self
                .isolate
                .exec(argv, staged.sandbox_dir(), remaining)
                .await
                .map_err(|source| RunnerError {
                    command: command.clone(),
                    source,
                })?;

            if output.timed_out {
                return Ok(self.timed_out(command, start.elapsed()));
            }

            if output.exit_code != Some(0) {
                let detail = failure_detail(&output.stderr, &output.stdout, output.exit_code);
                return Ok(RunReport {
                    verdict: RunVerdict::NonZeroExit(output.exit_code),
                    output: detail,
                    command,
                    elapsed: start.elapsed(),
                });
            }

            stdout = output.stdout;
        }

        Ok(RunReport {
            verdict: RunVerdict::Completed,
            output: stdout.trim().to_string(),
            command,
            elapsed: start.elapsed(),
        })
    }

    fn timed_out(&self, command: String, elapsed: Duration) -> RunReport {
        RunReport {
            verdict: RunVerdict::TimedOut,
            output: format!(
                "Time limit exceeded: execution did not finish within {}ms",
                self.timeout.as_millis()
            ),
            command,
            elapsed,
        }
    }
}

/// Error stream if there is one, else stdout, else the exit code.
fn failure_detail(stderr: &str, stdout: &str, exit_code: Option<i64>) -> String {
    let stderr = stderr.trim();
    if !stderr.is_empty() {
        return stderr.to_string();
    }
    let stdout = stdout.trim();
    if !stdout.is_empty() {
        return stdout.to_string();
    }
    match exit_code {
        Some(code) => format!("Process exited with code {}", code),
        None => "Process exited without a status".to_string(),
    }
}
