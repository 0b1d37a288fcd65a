//! Configuration validation with range checks.

use crate::error::ConfigError;

use super::{Config, ModelSelector};

/// Upper bound on the courtesy delay, in seconds.
const MAX_DELAY_SECS: u64 = 600;

impl Config {
    /// Validate configuration values are within acceptable ranges.
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.run.retry_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "run.retry_attempts must be >= 1".into(),
            ));
        }
        if self.run.request_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "run.request_timeout_ms must be > 0".into(),
            ));
        }
        if self.run.delay_secs > MAX_DELAY_SECS {
            return Err(ConfigError::ValidationError(format!(
                "run.delay_secs must be <= {MAX_DELAY_SECS}"
            )));
        }
        if !(0.0..=2.0).contains(&self.run.temperature) {
            return Err(ConfigError::ValidationError(
                "run.temperature must be between 0.0 and 2.0".into(),
            ));
        }

        for selector in ModelSelector::ALL {
            let model = self.models.get(selector);
            if model.model_id.trim().is_empty() {
                return Err(ConfigError::ValidationError(format!(
                    "models.{selector}.model_id must not be empty"
                )));
            }
            if model.max_tokens == 0 {
                return Err(ConfigError::ValidationError(format!(
                    "models.{selector}.max_tokens must be > 0"
                )));
            }
            let endpoint = self.providers.get(model.api).endpoint_for(model.api);
            if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
                return Err(ConfigError::ValidationError(format!(
                    "providers.{}.endpoint must be an http(s) URL, got '{endpoint}'",
                    model.api
                )));
            }
        }
        Ok(())
    }
}
