use serde::Deserialize;
use std::path::Path;
use tracing::info;

use super::error::Result;

const DEFAULT_CONFIG_PATH: &str = "/etc/vocabgate/wizard.toml";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WizardConfig {
    pub general: GeneralConfig,
    pub suggestions: SuggestionsConfig,
    pub admin: AdminConfig,
    pub completion: CompletionConfig,
}

impl Default for WizardConfig {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            suggestions: SuggestionsConfig::default(),
            admin: AdminConfig::default(),
            completion: CompletionConfig::default(),
        }
    }
}

impl WizardConfig {
    pub fn load() -> Result<Self> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            info!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config: WizardConfig = toml::from_str(&content)?;
        info!("Loaded config from {:?}", path);
        Ok(config)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub title: String,
    /// Dry run mode - the harness drives the wizard against simulated
    /// device services and never touches real configuration.
    pub dryrun: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            title: "Device Setup".to_string(),
            dryrun: false,
        }
    }
}

/// Language pair for the suggestions feature download.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SuggestionsConfig {
    pub enabled_by_default: bool,
    pub source_language: String,
    pub target_language: String,
}

impl Default for SuggestionsConfig {
    fn default() -> Self {
        Self {
            enabled_by_default: true,
            source_language: "es".to_string(),
            target_language: "fr".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AdminConfig {
    pub min_password_length: usize,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            min_password_length: 4,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CompletionConfig {
    /// Restart the host shell once setup is committed.
    pub restart: bool,
    /// Pause before the restart so the final screen is visible.
    pub finish_delay_ms: u64,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            restart: true,
            finish_delay_ms: 2000,
        }
    }
}
