// CLI commands for running and inspecting submissions
use anyhow::{bail, Context, Result};
use judge_common::config::Settings;
use judge_common::types::{ErrorDetails, ErrorResponse, ExecuteResponse, ExecutionRequest, TestCase};
use judge_engine::config::LanguageConfigManager;
use judge_engine::{executor, ExecutionError, Executor};
use serde_json::Value;
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

/// Load an execution request file
fn load_request(path: &Path) -> Result<ExecutionRequest> {
    let content = fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

/// Environment settings, with the backend optionally overridden from the command line
fn load_settings(backend: Option<&str>) -> Result<Settings> {
    let settings = Settings::from_lookup(|key| match (key, backend) {
        ("SANDBOX_BACKEND", Some(backend)) => Some(backend.to_string()),
        _ => std::env::var(key).ok(),
    });
    settings.context("Invalid configuration")
}

/// Response body and whether the execution succeeded, in the HTTP service's wire shape
fn response_body(result: Result<ExecuteResponse, ExecutionError>) -> Result<(String, bool)> {
    let (body, ok) = match result {
        Ok(response) => (serde_json::to_string_pretty(&response)?, true),
        Err(ExecutionError::RequestInvalid(message)) => (
            serde_json::to_string_pretty(&ErrorResponse {
                error: message,
                details: None,
            })?,
            false,
        ),
        Err(ExecutionError::Pipeline { message, command }) => (
            serde_json::to_string_pretty(&ErrorResponse {
                error: "Code execution failed.".to_string(),
                details: Some(ErrorDetails {
                    message,
                    docker_command: command,
                }),
            })?,
            false,
        ),
    };
    Ok((body, ok))
}

/// Run a request file through the executor and print the results
pub async fn run_request(path: &Path, backend: Option<&str>) -> Result<()> {
    let request = load_request(path)?;
    let settings = load_settings(backend)?;
    info!(
        language = %request.language,
        test_cases = request.test_cases.len(),
        backend = ?settings.backend,
        "Running request from {}",
        path.display()
    );
    let executor = Executor::from_settings(&settings).await?;

    let result = executor
        .execute(&request)
        .await
        .map(|results| ExecuteResponse { results });
    let passed = result
        .as_ref()
        .map(|r| r.results.iter().filter(|o| o.passed).count())
        .unwrap_or(0);
    let total = request.test_cases.len();

    let (body, ok) = response_body(result)?;
    println!("{}", body);

    if !ok {
        warn!(path = %path.display(), "Execution failed");
        bail!("Execution failed");
    }
    eprintln!("✅ {}/{} test cases passed", passed, total);
    Ok(())
}

/// Print the generated program for one test case
pub fn wrap_code(language: &str, code_file: &Path, input: &str) -> Result<()> {
    let code = fs::read_to_string(code_file).with_context(|| format!("Failed to read {}", code_file.display()))?;

    // Validate the input up front so a typo is not silently treated as "no arguments"
    let parsed: Value = serde_json::from_str(input).context("Input must be valid JSON")?;
    if !parsed.is_object() {
        bail!("Input must be a JSON object of named arguments");
    }

    let settings = load_settings(None)?;
    let languages = LanguageConfigManager::load_or_builtin(&settings.languages_config)?;

    let request = ExecutionRequest {
        language: language.to_string(),
        code,
        test_cases: vec![TestCase {
            input: input.to_string(),
            expected_output: String::new(),
        }],
    };
    let artifact = executor::preview(&languages, &request)?;
    debug!(file = %artifact.file_name, bytes = artifact.source_text.len(), "Generated program");

    eprintln!("📄 {}", artifact.file_name);
    print!("{}", artifact.source_text);
    Ok(())
}

/// List enabled languages and their steps
pub fn list_languages() -> Result<()> {
    let settings = load_settings(None)?;
    let languages = LanguageConfigManager::load_or_builtin(&settings.languages_config)?;

    for id in languages.list_languages() {
        let Some(profile) = languages.get_profile(&id) else {
            continue;
        };
        println!("{} ({})", id, profile.file_name);
        for step in &profile.steps {
            println!("    {} {}", step.command, step.args.join(" "));
        }
    }
    Ok(())
}
