// Language configuration management
// Loads enabled languages and optional step overrides from languages.json

use crate::language::{CommandTemplate, LanguageProfile};
use anyhow::{bail, Context, Result};
use judge_common::types::LanguageId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LanguageConfig {
    pub name: String,
    /// Replaces the built-in compile/run steps when present.
    #[serde(default)]
    pub steps: Option<Vec<CommandTemplate>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct LanguagesJson {
    languages: Vec<LanguageConfig>,
}

/// Language configuration manager
#[derive(Debug, Clone)]
pub struct LanguageConfigManager {
    profiles: BTreeMap<LanguageId, LanguageProfile>,
}

impl LanguageConfigManager {
    /// Every language enabled with its built-in steps.
    pub fn builtin() -> Self {
        let profiles = LanguageId::ALL
            .into_iter()
            .map(|id| (id, LanguageProfile::builtin(id)))
            .collect();
        Self { profiles }
    }

    /// Load languages.json. Only the languages it lists are enabled.
    pub fn load(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            bail!("Language config file not found: {}", config_path.display());
        }

        let content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;
        Self::from_json(&content)
            .with_context(|| format!("Failed to parse {}", config_path.display()))
    }

    /// Load languages.json if it exists, otherwise fall back to the built-in table.
    pub fn load_or_builtin(config_path: &Path) -> Result<Self> {
        if config_path.exists() {
            Self::load(config_path)
        } else {
            info!(path = %config_path.display(), "No language config file; using built-in languages");
            Ok(Self::builtin())
        }
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let languages_json: LanguagesJson =
            serde_json::from_str(content).context("Invalid language configuration JSON")?;

        let mut profiles = BTreeMap::new();
        for lang in languages_json.languages {
            let id: LanguageId = lang
                .name
                .parse()
                .with_context(|| format!("Unknown language '{}' in language config", lang.name))?;

            let mut profile = LanguageProfile::builtin(id);
            if let Some(steps) = lang.steps {
                if steps.is_empty() || steps.iter().any(|s| s.command.trim().is_empty()) {
                    bail!("Language '{}' must define at least one non-empty step", lang.name);
                }
                profile.steps = steps;
            }

            if profiles.insert(id, profile).is_some() {
                bail!("Language '{}' is configured more than once", lang.name);
            }
        }

        if profiles.is_empty() {
            bail!("No languages configured");
        }

        Ok(Self { profiles })
    }

    /// Get the profile for an enabled language
    pub fn get_profile(&self, language: &LanguageId) -> Option<&LanguageProfile> {
        self.profiles.get(language)
    }

    /// List all enabled languages, sorted
    pub fn list_languages(&self) -> Vec<LanguageId> {
        self.profiles.keys().copied().collect()
    }
}
