/// Isolate - the execution environment a runner drives
///
/// An isolate exposes two primitives: a staging workspace reachable from
/// inside it, and "run this argument vector with a hard timeout". The
/// runner owns artifact lifecycle and step sequencing; an isolate only
/// executes one command and reports what happened.
///
/// Implementations:
/// - `DockerIsolate` (docker.rs): `docker exec` into a long-lived container
/// - `ProcessIsolate`: host processes, for development only
use crate::error::IsolateError;
use crate::workspace::Workspace;
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, warn};

/// Captured output is cut at this size per stream.
pub const MAX_CAPTURE_BYTES: usize = 1024 * 1024;

/// Raw result of one command.
#[derive(Debug, Clone, Default)]
pub struct RawOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i64>,
    pub timed_out: bool,
    pub elapsed: Duration,
}

#[async_trait]
pub trait Isolate: Send + Sync {
    fn workspace(&self) -> &Workspace;

    /// Human-readable form of a command, for error reports only.
    fn describe(&self, argv: &[String]) -> String;

    /// Run `argv` with `workdir` as the working directory (an in-isolate
    /// path). Must terminate the command once `timeout` has elapsed.
    ///
    /// `Err` means the command could not be launched or observed; a command
    /// that ran and failed is an `Ok` with a non-zero exit code.
    async fn exec(&self, argv: &[String], workdir: &Path, timeout: Duration) -> Result<RawOutput, IsolateError>;
}

/// Output kept from one stream, capped at `MAX_CAPTURE_BYTES`.
///
/// Bytes past the cap are counted and dropped, so the producer can keep
/// writing without the buffer growing.
#[derive(Debug, Default)]
pub struct Capture {
    kept: Vec<u8>,
    dropped: usize,
}

impl Capture {
    pub fn push(&mut self, chunk: &[u8]) {
        let room = MAX_CAPTURE_BYTES.saturating_sub(self.kept.len());
        let take = room.min(chunk.len());
        self.kept.extend_from_slice(&chunk[..take]);
        self.dropped += chunk.len() - take;
    }

    pub fn truncated(&self) -> bool {
        self.dropped > 0
    }

    /// Lossy UTF-8 decode, marked when anything was dropped.
    pub fn into_text(self) -> String {
        let mut text = String::from_utf8_lossy(&self.kept).into_owned();
        if self.truncated() {
            text.push_str("\n[output truncated]");
        }
        text
    }
}

/// Read a pipe to EOF into a `Capture`.
async fn drain<R: AsyncRead + Unpin>(pipe: Option<R>) -> std::io::Result<Capture> {
    let mut capture = Capture::default();
    let Some(mut pipe) = pipe else {
        return Ok(capture);
    };

    let mut chunk = [0u8; 8192];
    loop {
        let n = pipe.read(&mut chunk).await?;
        if n == 0 {
            return Ok(capture);
        }
        capture.push(&chunk[..n]);
    }
}

/// Join an argument vector for display, quoting where needed.
pub fn display_argv(argv: &[String]) -> String {
    argv.iter()
        .map(|arg| {
            let plain = !arg.is_empty()
                && arg
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || "-_./=:,+@%".contains(c));
            if plain {
                arg.clone()
            } else {
                format!("'{}'", arg.replace('\'', r"'\''"))
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Runs commands as plain child processes of this service.
///
/// Provides a private working directory and a hard timeout, and nothing
/// else: submitted code has the same privileges as the service.
pub struct ProcessIsolate {
    workspace: Workspace,
}

impl ProcessIsolate {
    pub fn new(workspace: Workspace) -> Self {
        Self { workspace }
    }
}

#[async_trait]
impl Isolate for ProcessIsolate {
    fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    fn describe(&self, argv: &[String]) -> String {
        display_argv(argv)
    }

    async fn exec(&self, argv: &[String], workdir: &Path, timeout: Duration) -> Result<RawOutput, IsolateError> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| IsolateError::Launch("empty command".to_string()))?;

        let start = Instant::now();
        let mut child = tokio::process::Command::new(program)
            .args(args)
            .current_dir(workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| IsolateError::Launch(format!("{}: {}", program, e)))?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let run = async {
            tokio::try_join!(drain(stdout), drain(stderr), child.wait())
        };

        let finished = tokio::time::timeout(timeout, run).await;
        match finished {
            Ok(Ok((stdout, stderr, status))) => {
                let elapsed = start.elapsed();
                debug!(
                    program = %program,
                    exit_code = ?status.code(),
                    truncated = stdout.truncated() || stderr.truncated(),
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Process finished"
                );
                Ok(RawOutput {
                    stdout: stdout.into_text(),
                    stderr: stderr.into_text(),
                    // Killed by a signal: no exit code, reported like a shell would
                    exit_code: Some(status.code().map(i64::from).unwrap_or(-1)),
                    timed_out: false,
                    elapsed,
                })
            }
            Ok(Err(e)) => Err(IsolateError::Launch(format!("{}: {}", program, e))),
            Err(_) => {
                if let Err(e) = child.start_kill() {
                    warn!(program = %program, error = %e, "Failed to kill timed out process");
                }
                warn!(program = %program, timeout_ms = timeout.as_millis() as u64, "Process timed out; killed");
                Ok(RawOutput {
                    timed_out: true,
                    elapsed: start.elapsed(),
                    ..Default::default()
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    fn isolate() -> (tempfile::TempDir, ProcessIsolate) {
        let root = tempfile::tempdir().unwrap();
        let isolate = ProcessIsolate::new(Workspace::local(root.path()));
        (root, isolate)
    }

    #[tokio::test]
    async fn test_captures_stdout_and_exit_code() {
        let (root, isolate) = isolate();
        let output = isolate
            .exec(&argv(&["sh", "-c", "echo hello; echo oops >&2; exit 3"]), root.path(), Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(output.stdout, "hello\n");
        assert_eq!(output.stderr, "oops\n");
        assert_eq!(output.exit_code, Some(3));
        assert!(!output.timed_out);
    }

    #[tokio::test]
    async fn test_timeout_kills_process() {
        let (root, isolate) = isolate();
        let start = Instant::now();
        let output = isolate
            .exec(&argv(&["sleep", "30"]), root.path(), Duration::from_millis(200))
            .await
            .unwrap();

        assert!(output.timed_out);
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_missing_program_is_launch_error() {
        let (root, isolate) = isolate();
        let err = isolate
            .exec(&argv(&["definitely-not-a-real-binary-xyz"]), root.path(), Duration::from_secs(1))
            .await
            .unwrap_err();

        assert!(matches!(err, IsolateError::Launch(_)));
    }

    #[tokio::test]
    async fn test_empty_command_is_launch_error() {
        let (root, isolate) = isolate();
        let err = isolate.exec(&[], root.path(), Duration::from_secs(1)).await.unwrap_err();
        assert!(matches!(err, IsolateError::Launch(_)));
    }

    #[test]
    fn test_display_argv_quotes_special_arguments() {
        assert_eq!(display_argv(&argv(&["python3", "/code-tmp/a/code.py"])), "python3 /code-tmp/a/code.py");
        assert_eq!(display_argv(&argv(&["sh", "-c", "echo hi"])), "sh -c 'echo hi'");
        assert_eq!(display_argv(&argv(&["it's"])), r"'it'\''s'");
    }

    #[test]
    fn test_capture_keeps_at_most_the_cap() {
        let mut capture = Capture::default();
        capture.push(&vec![b'a'; MAX_CAPTURE_BYTES - 4]);
        capture.push(b"bbbbbbbb");
        capture.push(&vec![b'c'; 1000]);

        assert!(capture.truncated());
        assert_eq!(capture.kept.len(), MAX_CAPTURE_BYTES);
        assert_eq!(capture.dropped, 1004);

        let text = capture.into_text();
        assert!(text.ends_with("bbbb\n[output truncated]"));
    }

    #[test]
    fn test_capture_under_cap_is_unmarked() {
        let mut capture = Capture::default();
        capture.push(b"hello\n");
        assert!(!capture.truncated());
        assert_eq!(capture.into_text(), "hello\n");
    }

    #[tokio::test]
    async fn test_flood_of_output_stays_bounded() {
        let (root, isolate) = isolate();
        let output = isolate
            .exec(
                &argv(&["sh", "-c", "head -c 400000000 /dev/zero"]),
                root.path(),
                Duration::from_secs(60),
            )
            .await
            .unwrap();

        // The writer ran to completion, so the pipe kept draining past the cap
        assert_eq!(output.exit_code, Some(0));
        assert!(!output.timed_out);
        assert!(output.stdout.ends_with("[output truncated]"));
        assert!(output.stdout.len() <= MAX_CAPTURE_BYTES + 32);
    }
}
