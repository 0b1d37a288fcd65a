//! Error types for the evaluation dispatch engine.
//!
//! Errors are split by scope: configuration and terminal provider errors abort
//! a run, while transient, parse and write errors are recorded against a
//! single segment and the run moves on.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for vlmeval operations.
#[derive(Error, Debug)]
pub enum EvalError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Provider errors that escaped segment scope (terminal rejections)
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Artifact persistence errors
    #[error("Output error: {0}")]
    Output(#[from] OutputError),

    /// Segment index errors
    #[error("Segment index error: {0}")]
    Segments(#[from] SegmentError),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the config file from disk
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse TOML configuration
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Configuration values are invalid
    #[error("Invalid configuration: {0}")]
    ValidationError(String),

    /// No API key could be resolved for the selected provider
    #[error("{provider} API key not set. Set {env_var} or providers.{provider}.api_key in the config file.")]
    MissingCredentials { provider: String, env_var: String },
}

/// Failures raised by a provider adapter call.
#[derive(Error, Debug)]
pub enum ProviderError {
    /// Rate limits, 5xx responses and network trouble. Worth retrying.
    #[error("{message}")]
    Transient {
        message: String,
        status_code: Option<u16>,
    },

    /// Rejections that cannot succeed on retry (auth, malformed request).
    #[error("{message}")]
    Terminal {
        message: String,
        status_code: Option<u16>,
    },

    /// The provider answered but the body could not be normalized.
    #[error("Failed to parse provider response: {message}")]
    Parse {
        message: String,
        raw: serde_json::Value,
    },

    /// The per-request timeout elapsed before a response arrived.
    #[error("Request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
}

impl ProviderError {
    /// Whether retrying the same request could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient { .. } | Self::Timeout { .. })
    }

    /// Whether this failure must abort the whole run.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Terminal { .. })
    }

    /// HTTP status attached to the failure, if any.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Transient { status_code, .. } | Self::Terminal { status_code, .. } => {
                *status_code
            }
            _ => None,
        }
    }

    /// The raw provider payload kept for diagnosis, if any.
    pub fn raw_response(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Parse { raw, .. } => Some(raw),
            _ => None,
        }
    }
}

/// Failures while persisting run artifacts.
#[derive(Error, Debug)]
pub enum OutputError {
    /// A fresh run tried to claim a directory that already exists
    #[error("Run directory already exists: {0}")]
    RunDirExists(PathBuf),

    /// A resumed run pointed at a directory that is missing
    #[error("Run directory not found: {0}")]
    RunDirMissing(PathBuf),

    /// Filesystem failure while writing an artifact
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Filesystem failure while reading an artifact or summary back
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An existing artifact or summary is not valid JSON of the expected shape
    #[error("Corrupt file {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A resumed run directory belongs to a different model or prompt
    #[error("Run directory {dir} was started with {field} '{recorded}', not '{requested}'")]
    RunMismatch {
        dir: PathBuf,
        field: &'static str,
        recorded: String,
        requested: String,
    },

    /// Two distinct segments would be written to the same artifact file
    #[error("Segments {first} and {second} both map to artifact {artifact}")]
    ArtifactCollision {
        artifact: String,
        first: String,
        second: String,
    },

    /// Failure to serialize an artifact
    #[error("Failed to serialize artifact: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Failures while loading the segment index.
#[derive(Error, Debug)]
pub enum SegmentError {
    /// The index file could not be opened
    #[error("Failed to read segment index {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A row could not be decoded, including a required column missing
    /// from the header
    #[error("Malformed segment index row: {0}")]
    Csv(#[from] csv::Error),
}

/// Convenience type alias for vlmeval results.
pub type Result<T> = std::result::Result<T, EvalError>;

/// Convenience type alias for provider call results.
pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_and_timeout_are_retryable() {
        let err = ProviderError::Transient {
            message: "HTTP 429".to_string(),
            status_code: Some(429),
        };
        assert!(err.is_retryable());
        assert!(!err.is_terminal());
        assert!(ProviderError::Timeout { timeout_ms: 10 }.is_retryable());
    }

    #[test]
    fn test_terminal_is_not_retryable() {
        let err = ProviderError::Terminal {
            message: "HTTP 401: unauthorized".to_string(),
            status_code: Some(401),
        };
        assert!(!err.is_retryable());
        assert!(err.is_terminal());
        assert_eq!(err.status_code(), Some(401));
    }

    #[test]
    fn test_parse_error_keeps_raw_payload() {
        let raw = serde_json::json!({"unexpected": true});
        let err = ProviderError::Parse {
            message: "missing field `choices`".to_string(),
            raw: raw.clone(),
        };
        assert!(!err.is_retryable());
        assert!(!err.is_terminal());
        assert_eq!(err.raw_response(), Some(&raw));
    }

    #[test]
    fn test_missing_credentials_message_names_env_var() {
        let err = ConfigError::MissingCredentials {
            provider: "openrouter".to_string(),
            env_var: "OPENROUTER_API_KEY".to_string(),
        };
        assert!(err.to_string().contains("OPENROUTER_API_KEY"));
    }
}
