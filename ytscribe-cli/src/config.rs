use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CliError, Result};

/// Persistent settings, loaded from TOML and overridable per-invocation
/// with command-line flags.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Where transcript directories are created.
    pub output_dir: PathBuf,
    /// Where playlist config files live.
    pub configs_dir: PathBuf,
    /// Preferred transcript language code.
    pub language: String,
    /// Base delay between batch requests, in seconds.
    pub base_delay_secs: u64,
    /// Disable TLS certificate verification.
    pub insecure: bool,
    /// YouTube Data API key; enables the api discovery strategy.
    pub api_key: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("transcripts"),
            configs_dir: PathBuf::from("configs"),
            language: "en".to_owned(),
            base_delay_secs: 3,
            insecure: false,
            api_key: None,
        }
    }
}

impl AppConfig {
    /// Load from an explicit path, or the platform config dir, or fall back
    /// to defaults when no file exists. An explicit path that fails to read
    /// or parse is an error; the implicit one is allowed to be absent.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            let raw = std::fs::read_to_string(path).map_err(|e| {
                CliError::Config(format!("cannot read {}: {e}", path.display()))
            })?;
            return toml::from_str(&raw)
                .map_err(|e| CliError::Config(format!("invalid config {}: {e}", path.display())));
        }

        let Some(default_path) = Self::default_path() else {
            return Ok(Self::default());
        };
        match std::fs::read_to_string(&default_path) {
            Ok(raw) => {
                debug!(path = %default_path.display(), "loaded config");
                toml::from_str(&raw).map_err(|e| {
                    CliError::Config(format!("invalid config {}: {e}", default_path.display()))
                })
            }
            Err(_) => Ok(Self::default()),
        }
    }

    fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("ytscribe").join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = AppConfig::default();
        assert_eq!(config.language, "en");
        assert_eq!(config.base_delay_secs, 3);
        assert!(!config.insecure);
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let config: AppConfig = toml::from_str("language = \"de\"").unwrap();
        assert_eq!(config.language, "de");
        assert_eq!(config.base_delay_secs, 3);
    }
}
