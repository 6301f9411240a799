// Test double: an isolate that replays scripted outputs and records calls

use crate::error::IsolateError;
use crate::isolate::{display_argv, Isolate, RawOutput};
use crate::workspace::Workspace;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub argv: Vec<String>,
    pub workdir: PathBuf,
    pub timeout: Duration,
    /// Contents of the staged file named in `argv`, read at exec time.
    pub source: Option<String>,
}

pub struct ScriptedIsolate {
    _root: tempfile::TempDir,
    workspace: Workspace,
    responses: Mutex<VecDeque<Result<RawOutput, IsolateError>>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedIsolate {
    pub fn new() -> Self {
        let root = tempfile::tempdir().expect("tempdir");
        let workspace = Workspace::local(root.path());
        Self {
            _root: root,
            workspace,
            responses: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn push_ok(&self, output: RawOutput) {
        self.responses.lock().unwrap().push_back(Ok(output));
    }

    pub fn push_stdout(&self, stdout: &str) {
        self.push_ok(RawOutput {
            stdout: stdout.to_string(),
            exit_code: Some(0),
            ..Default::default()
        });
    }

    pub fn push_err(&self, err: IsolateError) {
        self.responses.lock().unwrap().push_back(Err(err));
    }

    /// Workspace root; each run's workdir is a direct child of it.
    pub fn root(&self) -> &Path {
        self.workspace.host_root()
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Entries still present under the workspace root.
    pub fn staged_dirs_remaining(&self) -> Vec<PathBuf> {
        std::fs::read_dir(self.workspace.host_root())
            .map(|entries| entries.filter_map(|e| e.ok()).map(|e| e.path()).collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Isolate for ScriptedIsolate {
    fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    fn describe(&self, argv: &[String]) -> String {
        format!("scripted {}", display_argv(argv))
    }

    async fn exec(&self, argv: &[String], workdir: &Path, timeout: Duration) -> Result<RawOutput, IsolateError> {
        let source = argv
            .iter()
            .map(Path::new)
            .find(|p| p.starts_with(workdir) && p.is_file())
            .and_then(|p| std::fs::read_to_string(p).ok());

        self.calls.lock().unwrap().push(RecordedCall {
            argv: argv.to_vec(),
            workdir: workdir.to_path_buf(),
            timeout,
            source,
        });

        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(RawOutput { exit_code: Some(0), ..Default::default() }))
    }
}
