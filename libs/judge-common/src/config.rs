// Process settings, resolved once at startup from the environment

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
pub const DEFAULT_CONTAINER: &str = "judge-sandbox";
pub const DEFAULT_CONTAINER_DIR: &str = "/code-tmp";
pub const DEFAULT_RUN_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_LANGUAGES_CONFIG: &str = "config/languages.json";
pub const DEFAULT_MAX_CONCURRENT_EXECUTIONS: usize = 4;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?} ({reason})")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Which isolate implementation runs submissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// A long-lived container, reached with `docker exec`.
    Docker,
    /// Plain host processes. Development only: no isolation.
    Process,
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "docker" => Ok(BackendKind::Docker),
            "process" => Ok(BackendKind::Process),
            other => Err(format!("expected docker or process, got {}", other)),
        }
    }
}

/// What the orchestrator does when a single run times out or exits non-zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunErrorPolicy {
    /// Record a `Failed` outcome carrying the error text and keep going.
    #[default]
    Record,
    /// Stop the batch and report a pipeline error for the whole request.
    Abort,
}

impl FromStr for RunErrorPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "record" => Ok(RunErrorPolicy::Record),
            "abort" => Ok(RunErrorPolicy::Abort),
            other => Err(format!("expected record or abort, got {}", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub bind_addr: String,
    pub backend: BackendKind,
    pub container: String,
    /// Where artifacts are written on the host.
    pub host_dir: PathBuf,
    /// The same directory as seen from inside the isolate.
    pub container_dir: PathBuf,
    pub run_timeout: Duration,
    pub run_error_policy: RunErrorPolicy,
    pub languages_config: PathBuf,
    pub max_concurrent_executions: usize,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let backend = parse_or(&lookup, "SANDBOX_BACKEND", BackendKind::Docker)?;
        let timeout_ms: u64 = parse_or(&lookup, "RUN_TIMEOUT_MS", DEFAULT_RUN_TIMEOUT_MS)?;
        if timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                key: "RUN_TIMEOUT_MS",
                value: "0".to_string(),
                reason: "timeout must be positive".to_string(),
            });
        }
        let max_concurrent: usize = parse_or(
            &lookup,
            "MAX_CONCURRENT_EXECUTIONS",
            DEFAULT_MAX_CONCURRENT_EXECUTIONS,
        )?;
        if max_concurrent == 0 {
            return Err(ConfigError::InvalidValue {
                key: "MAX_CONCURRENT_EXECUTIONS",
                value: "0".to_string(),
                reason: "at least one execution must be allowed".to_string(),
            });
        }

        let host_dir = lookup("SANDBOX_HOST_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| std::env::temp_dir().join("judge-artifacts"));

        // The process backend runs on the host, so both views are the same path
        let container_dir = match backend {
            BackendKind::Process => host_dir.clone(),
            BackendKind::Docker => lookup("SANDBOX_CONTAINER_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CONTAINER_DIR)),
        };

        Ok(Self {
            bind_addr: lookup("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            backend,
            container: lookup("SANDBOX_CONTAINER").unwrap_or_else(|| DEFAULT_CONTAINER.to_string()),
            host_dir,
            container_dir,
            run_timeout: Duration::from_millis(timeout_ms),
            run_error_policy: parse_or(&lookup, "RUN_ERROR_POLICY", RunErrorPolicy::Record)?,
            languages_config: lookup("LANGUAGES_CONFIG")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_LANGUAGES_CONFIG)),
            max_concurrent_executions: max_concurrent,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: ToString,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key,
            value: raw.clone(),
            reason: e.to_string(),
        }),
    }
}
