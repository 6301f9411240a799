/// Execution Orchestrator - the public entry point
///
/// **Pipeline, once per test case and in request order:**
/// 1. Bind the test input to named arguments (binder.rs)
/// 2. Wrap the body into a runnable artifact (wrap.rs)
/// 3. Run it in the isolate under the timeout (runner.rs)
/// 4. Grade the output (evaluator.rs)
///
/// **Failure handling:**
/// - Invalid requests are rejected before any sandbox interaction
/// - A test case that cannot be bound fails locally, without touching the sandbox
/// - Isolate faults (cannot write, cannot launch) abort the batch
/// - Timeouts and non-zero exits follow `RunErrorPolicy`: recorded as a
///   `Failed` outcome (default), or abort the batch
use crate::config::LanguageConfigManager;
use crate::docker::DockerIsolate;
use crate::error::{BindError, ExecutionError};
use crate::evaluator;
use crate::isolate::{Isolate, ProcessIsolate};
use crate::language::LanguageProfile;
use crate::runner::{PreparedArtifact, SandboxRunner};
use crate::workspace::Workspace;
use crate::{binder, wrap};
use anyhow::Context;
use judge_common::config::{BackendKind, RunErrorPolicy, Settings};
use judge_common::types::{ExecutionOutcome, ExecutionRequest, LanguageId, TestCase};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

/// Safety limits to prevent pathological inputs from reaching the sandbox
pub const MAX_SOURCE_CODE_BYTES: usize = 1024 * 1024; // 1MB
pub const MAX_TEST_INPUT_BYTES: usize = 10 * 1024 * 1024; // 10MB

pub struct Executor {
    languages: LanguageConfigManager,
    runner: SandboxRunner,
    policy: RunErrorPolicy,
}

impl Executor {
    pub fn new(languages: LanguageConfigManager, runner: SandboxRunner, policy: RunErrorPolicy) -> Self {
        Self {
            languages,
            runner,
            policy,
        }
    }

    /// Build the executor a process runs with: language table, artifact root
    /// (swept of stale runs) and the configured isolate backend.
    pub async fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let languages = LanguageConfigManager::load_or_builtin(&settings.languages_config)?;
        info!(languages = ?languages.list_languages(), "✓ Language configuration loaded");

        let workspace = Workspace::new(&settings.host_dir, &settings.container_dir);
        workspace
            .prepare_root()
            .await
            .with_context(|| format!("Failed to prepare artifact directory {}", settings.host_dir.display()))?;

        let isolate: Arc<dyn Isolate> = match settings.backend {
            BackendKind::Docker => {
                let docker = DockerIsolate::connect(settings.container.clone(), workspace)?;
                docker
                    .ensure_running()
                    .await
                    .context("Sandbox container check failed")?;
                Arc::new(docker)
            }
            BackendKind::Process => {
                warn!("Process backend runs submissions directly on the host; use for development only");
                Arc::new(ProcessIsolate::new(workspace))
            }
        };

        Ok(Self::new(
            languages,
            SandboxRunner::new(isolate, settings.run_timeout),
            settings.run_error_policy,
        ))
    }

    pub fn languages(&self) -> &LanguageConfigManager {
        &self.languages
    }

    #[instrument(
        skip(self, request),
        fields(
            language = %request.language,
            test_cases = request.test_cases.len(),
            source_size = request.code.len(),
        )
    )]
    pub async fn execute(&self, request: &ExecutionRequest) -> Result<Vec<ExecutionOutcome>, ExecutionError> {
        let profile = match validate(&self.languages, request) {
            Ok(profile) => profile,
            Err(e) => {
                info!(error = %e, "Request rejected");
                return Err(e);
            }
        };

        let start = Instant::now();
        let mut outcomes = Vec::with_capacity(request.test_cases.len());

        for (idx, test_case) in request.test_cases.iter().enumerate() {
            let test_num = idx + 1;

            let artifact = match prepare(profile, &request.code, test_case) {
                Ok(artifact) => artifact,
                Err(e) => {
                    warn!(test_num, error = %e, "Test input cannot be bound; marking failed");
                    outcomes.push(evaluator::failed_outcome(test_case, e.to_string()));
                    continue;
                }
            };

            let report = self.runner.run(profile, &artifact).await.map_err(|e| {
                warn!(test_num, command = %e.command, error = %e, "Sandbox failure; aborting remaining test cases");
                ExecutionError::from(e)
            })?;

            if !report.completed() && self.policy == RunErrorPolicy::Abort {
                warn!(test_num, verdict = ?report.verdict, "Run failed; aborting under abort policy");
                return Err(ExecutionError::Pipeline {
                    message: report.output,
                    command: report.command,
                });
            }

            let outcome = evaluator::evaluate_run(test_case, &report);
            debug!(
                test_num,
                verdict = ?report.verdict,
                status = outcome.status.as_str(),
                execution_ms = report.elapsed.as_millis() as u64,
                "Test result"
            );
            outcomes.push(outcome);
        }

        let passed = outcomes.iter().filter(|o| o.passed).count();
        info!(
            passed,
            failed = outcomes.len() - passed,
            execution_ms = start.elapsed().as_millis() as u64,
            "Execution completed"
        );

        Ok(outcomes)
    }
}

/// Resolve the language and check request-level limits.
pub fn validate<'a>(
    languages: &'a LanguageConfigManager,
    request: &ExecutionRequest,
) -> Result<&'a LanguageProfile, ExecutionError> {
    let profile = request
        .language
        .parse::<LanguageId>()
        .ok()
        .and_then(|id| languages.get_profile(&id))
        .ok_or_else(|| ExecutionError::RequestInvalid("Unsupported language.".to_string()))?;

    if request.test_cases.is_empty() {
        return Err(ExecutionError::RequestInvalid(
            "At least one test case is required.".to_string(),
        ));
    }
    if request.code.len() > MAX_SOURCE_CODE_BYTES {
        return Err(ExecutionError::RequestInvalid(format!(
            "Source code exceeds maximum size of {} bytes.",
            MAX_SOURCE_CODE_BYTES
        )));
    }
    if let Some(idx) = request
        .test_cases
        .iter()
        .position(|tc| tc.input.len() > MAX_TEST_INPUT_BYTES)
    {
        return Err(ExecutionError::RequestInvalid(format!(
            "Input of test case {} exceeds maximum size of {} bytes.",
            idx + 1,
            MAX_TEST_INPUT_BYTES
        )));
    }

    Ok(profile)
}

/// Generate the artifact for one test case.
pub fn prepare(profile: &LanguageProfile, code: &str, test_case: &TestCase) -> Result<PreparedArtifact, BindError> {
    let bindings = binder::bind(&test_case.input)?;
    let source_text = wrap::wrap(profile.id, code, &bindings)?;
    Ok(PreparedArtifact {
        file_name: profile.file_name.to_string(),
        source_text,
    })
}

/// Validate a request and generate its first test case's artifact.
pub fn preview(languages: &LanguageConfigManager, request: &ExecutionRequest) -> Result<PreparedArtifact, ExecutionError> {
    let profile = validate(languages, request)?;
    prepare(profile, &request.code, &request.test_cases[0])
        .map_err(|e| ExecutionError::RequestInvalid(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::IsolateError;
    use crate::isolate::RawOutput;
    use crate::runner::DEFAULT_RUN_TIMEOUT;
    use crate::testing::ScriptedIsolate;
    use judge_common::types::OutcomeStatus;
    use std::time::Duration;

    fn executor_with(isolate: Arc<ScriptedIsolate>, policy: RunErrorPolicy) -> Executor {
        Executor::new(
            LanguageConfigManager::builtin(),
            SandboxRunner::new(isolate, DEFAULT_RUN_TIMEOUT),
            policy,
        )
    }

    fn request(language: &str, code: &str, cases: &[(&str, &str)]) -> ExecutionRequest {
        ExecutionRequest {
            language: language.to_string(),
            code: code.to_string(),
            test_cases: cases
                .iter()
                .map(|(input, expected)| TestCase {
                    input: input.to_string(),
                    expected_output: expected.to_string(),
                })
                .collect(),
        }
    }

    #[tokio::test]
    async fn test_python_add_passes() {
        let isolate = Arc::new(ScriptedIsolate::new());
        isolate.push_stdout("5\n");
        let executor = executor_with(isolate.clone(), RunErrorPolicy::Record);

        let outcomes = executor
            .execute(&request("python", "return a+b", &[(r#"{"a":2,"b":3}"#, "5")]))
            .await
            .unwrap();

        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].your_output, "5");
        assert!(outcomes[0].passed);
        assert_eq!(outcomes[0].status, OutcomeStatus::Passed);

        let calls = isolate.calls();
        let source = calls[0].source.as_deref().unwrap();
        assert!(source.starts_with("def main(a, b):\n    return a+b\n"));
        assert!(source.contains("print(main(2, 3))"));
    }

    #[tokio::test]
    async fn test_python_add_wrong_expectation_fails() {
        let isolate = Arc::new(ScriptedIsolate::new());
        isolate.push_stdout("5\n");
        let executor = executor_with(isolate, RunErrorPolicy::Record);

        let outcomes = executor
            .execute(&request("python", "return a+b", &[(r#"{"a":2,"b":3}"#, "6")]))
            .await
            .unwrap();

        assert!(!outcomes[0].passed);
        assert_eq!(outcomes[0].status, OutcomeStatus::Failed);
        assert_eq!(outcomes[0].your_output, "5");
    }

    #[tokio::test]
    async fn test_identity_in_every_language() {
        for (language, body) in [("python", "return x"), ("javascript", "return x;"), ("java", "return x;")] {
            let isolate = Arc::new(ScriptedIsolate::new());
            if language == "java" {
                isolate.push_stdout("");
            }
            isolate.push_stdout("5\n");
            let executor = executor_with(isolate.clone(), RunErrorPolicy::Record);

            let outcomes = executor
                .execute(&request(language, body, &[(r#"{"x": 5}"#, "5")]))
                .await
                .unwrap();

            assert!(outcomes[0].passed, "{} identity should pass", language);
            let source = isolate.calls()[0].source.clone().unwrap();
            assert!(source.contains("x"), "{} source should name the argument", language);
        }
    }

    #[tokio::test]
    async fn test_unsupported_language_never_touches_sandbox() {
        let isolate = Arc::new(ScriptedIsolate::new());
        let executor = executor_with(isolate.clone(), RunErrorPolicy::Record);

        let err = executor
            .execute(&request("ruby", "x", &[("{}", "1")]))
            .await
            .unwrap_err();

        assert!(matches!(err, ExecutionError::RequestInvalid(_)));
        assert_eq!(err.to_string(), "Unsupported language.");
        assert!(isolate.calls().is_empty());
        assert!(isolate.staged_dirs_remaining().is_empty());
    }

    #[tokio::test]
    async fn test_disabled_language_is_unsupported() {
        let isolate = Arc::new(ScriptedIsolate::new());
        let languages = LanguageConfigManager::from_json(r#"{"languages": [{"name": "python"}]}"#).unwrap();
        let executor = Executor::new(
            languages,
            SandboxRunner::new(isolate.clone(), DEFAULT_RUN_TIMEOUT),
            RunErrorPolicy::Record,
        );

        let err = executor
            .execute(&request("java", "return 1;", &[("{}", "1")]))
            .await
            .unwrap_err();

        assert!(matches!(err, ExecutionError::RequestInvalid(_)));
        assert!(isolate.calls().is_empty());
    }

    #[tokio::test]
    async fn test_empty_test_case_list_is_rejected() {
        let isolate = Arc::new(ScriptedIsolate::new());
        let executor = executor_with(isolate.clone(), RunErrorPolicy::Record);

        let err = executor.execute(&request("python", "return 1", &[])).await.unwrap_err();

        assert!(matches!(err, ExecutionError::RequestInvalid(_)));
        assert!(isolate.calls().is_empty());
    }

    #[tokio::test]
    async fn test_oversized_source_is_rejected() {
        let isolate = Arc::new(ScriptedIsolate::new());
        let executor = executor_with(isolate.clone(), RunErrorPolicy::Record);
        let code = "x".repeat(MAX_SOURCE_CODE_BYTES + 1);

        let err = executor.execute(&request("python", &code, &[("{}", "1")])).await.unwrap_err();
        assert!(matches!(err, ExecutionError::RequestInvalid(_)));
        assert!(isolate.calls().is_empty());
    }

    #[tokio::test]
    async fn test_timeout_and_crash_are_recorded_and_batch_continues() {
        let isolate = Arc::new(ScriptedIsolate::new());
        isolate.push_ok(RawOutput { timed_out: true, ..Default::default() });
        isolate.push_ok(RawOutput {
            stdout: "5".into(),
            stderr: "TypeError: bad operand".into(),
            exit_code: Some(1),
            ..Default::default()
        });
        isolate.push_stdout("7");
        let executor = executor_with(isolate.clone(), RunErrorPolicy::Record);

        let outcomes = executor
            .execute(&request(
                "python",
                "return a+b",
                &[(r#"{"a":1,"b":1}"#, "2"), (r#"{"a":2,"b":3}"#, "5"), (r#"{"a":3,"b":4}"#, "7")],
            ))
            .await
            .unwrap();

        assert_eq!(outcomes.len(), 3);
        assert!(!outcomes[0].passed);
        assert!(outcomes[0].your_output.starts_with("Time limit exceeded"));
        assert!(!outcomes[1].passed);
        assert_eq!(outcomes[1].your_output, "TypeError: bad operand");
        assert!(outcomes[2].passed);
        assert_ne!(outcomes[0].your_output, outcomes[1].your_output);
        assert!(isolate.staged_dirs_remaining().is_empty());
    }

    #[tokio::test]
    async fn test_abort_policy_stops_on_first_failed_run() {
        let isolate = Arc::new(ScriptedIsolate::new());
        isolate.push_ok(RawOutput { timed_out: true, ..Default::default() });
        let executor = executor_with(isolate.clone(), RunErrorPolicy::Abort);

        let err = executor
            .execute(&request("javascript", "while(true){}", &[("{}", "1"), ("{}", "1")]))
            .await
            .unwrap_err();

        match err {
            ExecutionError::Pipeline { message, command } => {
                assert!(message.starts_with("Time limit exceeded"));
                assert!(command.contains("node"));
            }
            other => panic!("expected pipeline error, got {:?}", other),
        }
        assert_eq!(isolate.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_sandbox_fault_aborts_with_command() {
        let isolate = Arc::new(ScriptedIsolate::new());
        isolate.push_stdout("1");
        isolate.push_err(IsolateError::Launch("container keen_jang not found".into()));
        let executor = executor_with(isolate.clone(), RunErrorPolicy::Record);

        let err = executor
            .execute(&request("python", "return 1", &[("{}", "1"), ("{}", "1"), ("{}", "1")]))
            .await
            .unwrap_err();

        assert!(err.to_string().contains("keen_jang"));
        match err {
            ExecutionError::Pipeline { command, .. } => assert!(command.starts_with("scripted python3 ")),
            other => panic!("expected pipeline error, got {:?}", other),
        }
        assert_eq!(isolate.calls().len(), 2);
        assert!(isolate.staged_dirs_remaining().is_empty());
    }

    #[tokio::test]
    async fn test_unbindable_case_fails_locally() {
        let isolate = Arc::new(ScriptedIsolate::new());
        isolate.push_stdout("1");
        let executor = executor_with(isolate.clone(), RunErrorPolicy::Record);

        let outcomes = executor
            .execute(&request("java", "return grid;", &[(r#"{"grid": [[1]]}"#, "1"), (r#"{"n": 1}"#, "1")]))
            .await
            .unwrap();

        assert!(!outcomes[0].passed);
        assert!(outcomes[0].your_output.contains("grid"));
        // Only the second case reached the sandbox (compile + run)
        assert_eq!(isolate.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_non_object_input_runs_without_arguments() {
        let isolate = Arc::new(ScriptedIsolate::new());
        isolate.push_stdout("42");
        let executor = executor_with(isolate.clone(), RunErrorPolicy::Record);

        let outcomes = executor
            .execute(&request("javascript", "return 42;", &[("[1, 2]", "42")]))
            .await
            .unwrap();

        assert!(outcomes[0].passed);
        let source = isolate.calls()[0].source.clone().unwrap();
        assert!(source.contains("function main() {"));
        assert!(source.contains("console.log(main());"));
    }

    #[tokio::test]
    async fn test_java_compiles_then_runs_in_one_run_dir() {
        let isolate = Arc::new(ScriptedIsolate::new());
        isolate.push_stdout("");
        isolate.push_stdout("[1, 2, 3]\n");
        let executor = executor_with(isolate.clone(), RunErrorPolicy::Record);

        let outcomes = executor
            .execute(&request("java", "return nums;", &[(r#"{"nums": [1,2,3]}"#, "[1,2,3]")]))
            .await
            .unwrap();

        assert!(outcomes[0].passed);
        let calls = isolate.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].argv[0], "javac");
        assert_eq!(calls[1].argv[0], "java");

        let source = calls[0].source.clone().unwrap();
        assert!(source.contains("Object result = Solution.main(new int[]{1, 2, 3});"));

        // Both steps share the run directory and one time budget
        assert_eq!(calls[0].workdir, calls[1].workdir);
        assert_eq!(calls[0].workdir.parent(), Some(isolate.root()));
        assert!(calls[0].timeout <= DEFAULT_RUN_TIMEOUT);
        assert!(calls[1].timeout <= calls[0].timeout);
    }

    fn java_toolchain_available() -> bool {
        let works = |program: &str| {
            std::process::Command::new(program)
                .arg("-version")
                .stdout(std::process::Stdio::null())
                .stderr(std::process::Stdio::null())
                .status()
                .is_ok_and(|s| s.success())
        };
        works("javac") && works("java")
    }

    // Runs only where a JDK is installed; the scripted isolate cannot check what the driver prints
    #[tokio::test]
    async fn test_java_return_values_print_canonically() {
        if !java_toolchain_available() {
            eprintln!("⚠ javac/java not found, skipping");
            return;
        }

        let root = tempfile::tempdir().unwrap();
        let executor = Executor::new(
            LanguageConfigManager::builtin(),
            SandboxRunner::new(
                Arc::new(ProcessIsolate::new(Workspace::local(root.path()))),
                Duration::from_secs(60),
            ),
            RunErrorPolicy::Record,
        );

        let cases = [
            ("return nums;", r#"{"nums": [1, 2, 3]}"#, "[1, 2, 3]"),
            ("return words;", r#"{"words": ["a", "b"]}"#, "[a, b]"),
            ("return xs;", r#"{"xs": [5000000000]}"#, "[5000000000]"),
            ("return xs;", r#"{"xs": [1.5, 2.5]}"#, "[1.5, 2.5]"),
            ("return flags;", r#"{"flags": [true, false]}"#, "[true, false]"),
            ("return new int[][]{{1}, {2, 3}};", "{}", "[[1], [2, 3]]"),
            ("return new char[]{'a'};", "{}", "Unsupported array type"),
            ("return s;", r#"{"s": "[1, 2]"}"#, "[1, 2]"),
            ("return null;", "{}", "null"),
            ("return a + b;", r#"{"a": 2, "b": 3}"#, "5"),
        ];

        for (body, input, expected) in cases {
            let outcomes = executor
                .execute(&request("java", body, &[(input, expected)]))
                .await
                .unwrap();
            assert!(
                outcomes[0].passed,
                "{} with {}: expected {}, got {}",
                body, input, expected, outcomes[0].your_output
            );
            assert_eq!(outcomes[0].your_output, expected);
        }
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_from_settings_process_backend() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("artifacts");
        let stale = root.join(uuid::Uuid::new_v4().to_string());
        std::fs::create_dir_all(&stale).unwrap();

        let config = dir.path().join("languages.json");
        std::fs::write(
            &config,
            r#"{"languages": [{"name": "python", "steps": [{"command": "sh", "args": ["-c", "echo 5"]}]}]}"#,
        )
        .unwrap();

        let root_str = root.to_string_lossy().to_string();
        let config_str = config.to_string_lossy().to_string();
        let settings = Settings::from_lookup(|key| match key {
            "SANDBOX_BACKEND" => Some("process".to_string()),
            "SANDBOX_HOST_DIR" => Some(root_str.clone()),
            "LANGUAGES_CONFIG" => Some(config_str.clone()),
            _ => None,
        })
        .unwrap();

        let executor = Executor::from_settings(&settings).await.unwrap();
        assert!(!stale.exists(), "stale run directory should be swept");
        assert_eq!(executor.languages().list_languages(), vec![LanguageId::Python]);

        let outcomes = executor
            .execute(&request("python", "return a+b", &[(r#"{"a":2,"b":3}"#, "5")]))
            .await
            .unwrap();
        assert!(outcomes[0].passed);
        assert_eq!(std::fs::read_dir(&root).unwrap().count(), 0);
    }

    #[test]
    fn test_preview_returns_artifact() {
        let isolate = Arc::new(ScriptedIsolate::new());
        let executor = executor_with(isolate, RunErrorPolicy::Record);

        let artifact = preview(
            executor.languages(),
            &request("javascript", "return a * 2;", &[(r#"{"a": 4}"#, "8")]),
        )
        .unwrap();

        assert_eq!(artifact.file_name, "code.js");
        assert!(artifact.source_text.contains("console.log(main(4));"));
    }
}
