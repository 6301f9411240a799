/// Language Adapter - per-language data table
///
/// Each language maps to a fixed artifact file name and an ordered list of
/// steps (compile, then run). Steps are argument vectors with `{file}` and
/// `{dir}` placeholders that are substituted with in-sandbox paths; nothing
/// is ever passed through a shell.
///
/// Wrapping a function body into a runnable program lives in `wrap.rs`.
use judge_common::types::LanguageId;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Class name the Java driver is compiled under.
pub const JAVA_MAIN_CLASS: &str = "Main";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandTemplate {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl CommandTemplate {
    pub fn new(command: &str, args: &[&str]) -> Self {
        Self {
            command: command.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }

    /// Argument vector with placeholders substituted.
    pub fn render(&self, file: &Path, dir: &Path) -> Vec<String> {
        let file = file.to_string_lossy();
        let dir = dir.to_string_lossy();
        std::iter::once(&self.command)
            .chain(self.args.iter())
            .map(|part| part.replace("{file}", &file).replace("{dir}", &dir))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguageProfile {
    pub id: LanguageId,
    pub file_name: &'static str,
    pub steps: Vec<CommandTemplate>,
}

impl LanguageProfile {
    pub fn builtin(id: LanguageId) -> Self {
        match id {
            LanguageId::Python => Self {
                id,
                file_name: "code.py",
                steps: vec![CommandTemplate::new("python3", &["{file}"])],
            },
            LanguageId::JavaScript => Self {
                id,
                file_name: "code.js",
                steps: vec![CommandTemplate::new("node", &["{file}"])],
            },
            LanguageId::Java => Self {
                id,
                file_name: "Main.java",
                steps: vec![
                    CommandTemplate::new("javac", &["-d", "{dir}", "{file}"]),
                    CommandTemplate::new("java", &["-cp", "{dir}", JAVA_MAIN_CLASS]),
                ],
            },
        }
    }

    pub fn extension(&self) -> &str {
        Path::new(self.file_name)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
    }

    /// Every step rendered against the given artifact location.
    pub fn commands(&self, file: &Path, dir: &Path) -> Vec<Vec<String>> {
        self.steps.iter().map(|step| step.render(file, dir)).collect()
    }
}
