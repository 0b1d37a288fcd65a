//! Configuration management for vlmeval.
//!
//! Configuration is loaded from the platform config directory with sensible
//! defaults. All config structs implement `Default`, so a missing file or a
//! partial file both work.

mod types;
mod validate;

pub use types::*;

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Root configuration structure for vlmeval.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Input and output locations
    pub general: GeneralConfig,

    /// Rate-limit and retry policy
    pub run: RunConfig,

    /// Provider endpoints and credentials
    pub providers: ProvidersConfig,

    /// Model catalogue
    pub models: ModelsConfig,

    /// Logging settings
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// Returns default configuration if the file doesn't exist.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default config file path.
    ///
    /// Uses platform-appropriate directories:
    /// - macOS: ~/Library/Application Support/org.vlmeval.vlmeval/config.toml
    /// - Linux: ~/.config/vlmeval/config.toml
    /// - Windows: C:\Users\<User>\AppData\Roaming\vlmeval\config\config.toml
    ///
    /// Falls back to ~/.vlmeval/config.toml if directory detection fails.
    pub fn default_path() -> PathBuf {
        directories::ProjectDirs::from("org", "vlmeval", "vlmeval")
            .map(|dirs| dirs.config_dir().to_path_buf().join("config.toml"))
            .unwrap_or_else(|| {
                let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
                PathBuf::from(home).join(".vlmeval").join("config.toml")
            })
    }

    /// Resolved segment index path (with ~ expansion).
    pub fn segments_index(&self) -> PathBuf {
        expand_path(&self.general.segments_index)
    }

    /// Resolved crops directory (with ~ expansion).
    pub fn crops_dir(&self) -> PathBuf {
        expand_path(&self.general.crops_dir)
    }

    /// Resolved output root (with ~ expansion).
    pub fn output_dir(&self) -> PathBuf {
        expand_path(&self.general.output_dir)
    }

    /// Serialize the config to a pretty TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ValidationError(e.to_string()))
    }
}

/// Expand a leading `~` in a path.
pub fn expand_path(path: &Path) -> PathBuf {
    let path_str = path.to_string_lossy();
    PathBuf::from(shellexpand::tilde(&path_str).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.run.delay_secs, 5);
        assert_eq!(config.run.retry_attempts, 3);
        assert_eq!(config.run.backoff, BackoffStrategy::Linear);
        assert_eq!(config.models.claude.max_tokens, 2048);
    }

    #[test]
    fn test_config_to_toml() {
        let config = Config::default();
        let toml = config.to_toml().unwrap();
        assert!(toml.contains("[general]"));
        assert!(toml.contains("[run]"));
        assert!(toml.contains("[providers.openrouter]"));
        assert!(toml.contains("[models.gemini-flash]"));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[run]
delay_secs = 10

[models.gemini]
model_id = "gemini-3-pro-preview"
api = "google"
max_tokens = 16384
"#,
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.run.delay_secs, 10);
        assert_eq!(config.run.retry_attempts, 3);
        assert_eq!(config.models.gemini.api, ApiKind::Google);
        assert_eq!(config.models.gemini.max_tokens, 16384);
        assert_eq!(config.models.qwen.model_id, "qwen2.5-vl-72b-instruct");
    }

    #[test]
    fn test_load_from_rejects_invalid_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[run]\nretry_attempts = 0\n").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("retry_attempts"));
    }

    #[test]
    fn test_load_from_rejects_unknown_api() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[models.claude]\nmodel_id = \"x\"\napi = \"ollama\"\nmax_tokens = 10\n",
        )
        .unwrap();

        assert!(matches!(
            Config::load_from(&path),
            Err(ConfigError::ParseError(_))
        ));
    }

    #[test]
    fn test_expand_path_without_tilde_is_unchanged() {
        let path = Path::new("data/crops");
        assert_eq!(expand_path(path), PathBuf::from("data/crops"));
    }
}
