//! # Settings
//!
//! Application settings read from an optional TOML file.
//!
//! Resolution order: `--config` path, then the `TRILAYER_CONFIG`
//! environment variable, then built-in defaults.
//!
//! ```toml
//! domain = "universal"
//!
//! [analysis]
//! propagation_max_depth = 4
//! anomaly_threshold = 2.5
//! ```

use serde::Deserialize;
use std::path::{Path, PathBuf};
use trilayer_core::{AnalysisConfig, InterchangeMapper, TrilayerError};

/// Environment variable naming a settings file.
pub const CONFIG_ENV: &str = "TRILAYER_CONFIG";

/// Largest settings file accepted (1 MB).
const MAX_SETTINGS_FILE_SIZE: u64 = 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Domain used when a command does not name one.
    pub domain: String,
    /// Thresholds passed to every analysis.
    pub analysis: AnalysisConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            domain: InterchangeMapper::DOMAIN.to_string(),
            analysis: AnalysisConfig::default(),
        }
    }
}

impl Settings {
    /// Parse and validate TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, TrilayerError> {
        let settings: Self = toml::from_str(content)
            .map_err(|e| TrilayerError::ConfigError(format!("Invalid settings: {}", e)))?;
        settings.analysis.validate()?;
        Ok(settings)
    }

    pub fn load_from_file(path: &Path) -> Result<Self, TrilayerError> {
        let metadata = std::fs::metadata(path).map_err(|e| {
            TrilayerError::IoError(format!("Cannot read settings '{}': {}", path.display(), e))
        })?;
        if metadata.len() > MAX_SETTINGS_FILE_SIZE {
            return Err(TrilayerError::ConfigError(format!(
                "Settings file {} bytes exceeds maximum allowed {} bytes",
                metadata.len(),
                MAX_SETTINGS_FILE_SIZE
            )));
        }
        let content = std::fs::read_to_string(path).map_err(|e| {
            TrilayerError::IoError(format!("Cannot read settings '{}': {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// CLI path, then `TRILAYER_CONFIG`, then defaults.
    pub fn resolve(cli_config: Option<&Path>) -> Result<Self, TrilayerError> {
        let env_config = std::env::var_os(CONFIG_ENV).map(PathBuf::from);
        Self::resolve_from(cli_config, env_config.as_deref())
    }

    /// [`resolve`](Self::resolve) with the environment lookup already done.
    pub fn resolve_from(
        cli_config: Option<&Path>,
        env_config: Option<&Path>,
    ) -> Result<Self, TrilayerError> {
        match cli_config.or(env_config) {
            Some(path) => {
                tracing::debug!(path = %path.display(), "loading settings");
                Self::load_from_file(path)
            }
            None => Ok(Self::default()),
        }
    }
}
