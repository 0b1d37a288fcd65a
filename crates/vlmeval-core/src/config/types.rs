//! Sub-configuration structs with their defaults.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// General settings: where inputs live and where runs are written.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// CSV index of detected page segments
    pub segments_index: PathBuf,

    /// Root of the cropped segment images
    pub crops_dir: PathBuf,

    /// Root under which one directory per run is created
    pub output_dir: PathBuf,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            segments_index: PathBuf::from("data/02_results/manuscripts_segments_index.csv"),
            crops_dir: PathBuf::from("data/02_results/crops"),
            output_dir: PathBuf::from("data/02_results/diagram_evaluations"),
        }
    }
}

/// How the wait between retry attempts grows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackoffStrategy {
    /// `base * attempt`
    #[default]
    Linear,
    /// `base * 2^(attempt - 1)`
    Exponential,
}

/// Rate-limit courtesy and retry policy for a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Delay after every completed request, in seconds
    pub delay_secs: u64,

    /// Total attempts per segment (first try included)
    pub retry_attempts: u32,

    /// Base backoff between retry attempts, in milliseconds
    pub retry_delay_ms: u64,

    /// Backoff growth between attempts
    pub backoff: BackoffStrategy,

    /// Per-request timeout, in milliseconds
    pub request_timeout_ms: u64,

    /// Sampling temperature sent to every provider
    pub temperature: f32,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            delay_secs: 5,
            retry_attempts: 3,
            retry_delay_ms: 2000,
            backoff: BackoffStrategy::Linear,
            request_timeout_ms: 120_000,
            temperature: 0.0,
        }
    }
}

/// The provider API families the engine can talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiKind {
    /// Anthropic Messages API
    Anthropic,
    /// Google generateContent API
    Google,
    /// AcademicCloud chat-completions gateway
    Academiccloud,
    /// OpenRouter chat-completions gateway
    Openrouter,
}

impl ApiKind {
    /// Whether this family speaks the OpenAI chat-completions contract.
    pub fn is_openai_compatible(self) -> bool {
        matches!(self, Self::Academiccloud | Self::Openrouter)
    }

    /// Environment variable conventionally holding this family's key.
    pub fn env_var(self) -> &'static str {
        match self {
            Self::Anthropic => "ANTHROPIC_API_KEY",
            Self::Google => "GOOGLE_API_KEY",
            Self::Academiccloud => "ACADEMICCLOUD_API_KEY",
            Self::Openrouter => "OPENROUTER_API_KEY",
        }
    }

    /// Public base URL of this family's API.
    pub fn default_endpoint(self) -> &'static str {
        match self {
            Self::Anthropic => "https://api.anthropic.com/v1",
            Self::Google => "https://generativelanguage.googleapis.com/v1beta",
            Self::Academiccloud => "https://chat-ai.academiccloud.de/v1",
            Self::Openrouter => "https://openrouter.ai/api/v1",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Anthropic => "anthropic",
            Self::Google => "google",
            Self::Academiccloud => "academiccloud",
            Self::Openrouter => "openrouter",
        }
    }
}

impl fmt::Display for ApiKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The fixed set of models a run can be started with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelSelector {
    Claude,
    Gemini,
    GeminiFlash,
    Gemma,
    Qwen,
}

impl ModelSelector {
    pub const ALL: [ModelSelector; 5] = [
        Self::Claude,
        Self::Gemini,
        Self::GeminiFlash,
        Self::Gemma,
        Self::Qwen,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Claude => "claude",
            Self::Gemini => "gemini",
            Self::GeminiFlash => "gemini-flash",
            Self::Gemma => "gemma",
            Self::Qwen => "qwen",
        }
    }
}

impl fmt::Display for ModelSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelSelector {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                let names: Vec<&str> = Self::ALL.iter().map(|m| m.as_str()).collect();
                format!("Unknown model '{s}'. Available models: {}", names.join(", "))
            })
    }
}

/// One entry of the model catalogue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Provider-side model identifier
    pub model_id: String,

    /// API family used to reach the model
    pub api: ApiKind,

    /// Output-token budget, including any reasoning tokens
    pub max_tokens: u32,
}

impl ModelConfig {
    fn new(model_id: &str, api: ApiKind, max_tokens: u32) -> Self {
        Self {
            model_id: model_id.to_string(),
            api,
            max_tokens,
        }
    }
}

/// Model catalogue, one entry per selector.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelsConfig {
    pub claude: ModelConfig,
    pub gemini: ModelConfig,
    #[serde(rename = "gemini-flash")]
    pub gemini_flash: ModelConfig,
    pub gemma: ModelConfig,
    pub qwen: ModelConfig,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            claude: ModelConfig::new("claude-sonnet-4-5-20250929", ApiKind::Anthropic, 2048),
            // Reasoning models spend part of the budget before any visible output.
            gemini: ModelConfig::new("google/gemini-3-pro-preview", ApiKind::Openrouter, 8192),
            gemini_flash: ModelConfig::new(
                "google/gemini-3-flash-preview",
                ApiKind::Openrouter,
                8192,
            ),
            gemma: ModelConfig::new("gemma-3-27b-it", ApiKind::Academiccloud, 2048),
            qwen: ModelConfig::new("qwen2.5-vl-72b-instruct", ApiKind::Academiccloud, 2048),
        }
    }
}

impl ModelsConfig {
    pub fn get(&self, selector: ModelSelector) -> &ModelConfig {
        match selector {
            ModelSelector::Claude => &self.claude,
            ModelSelector::Gemini => &self.gemini,
            ModelSelector::GeminiFlash => &self.gemini_flash,
            ModelSelector::Gemma => &self.gemma,
            ModelSelector::Qwen => &self.qwen,
        }
    }
}

/// Endpoint and credential for one provider family.
///
/// Either field may be left out of a config file; empty values fall back to
/// the family's public endpoint and its conventional environment variable.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    /// API base URL
    pub endpoint: String,

    /// API key (supports ${ENV_VAR} syntax)
    pub api_key: String,
}

impl EndpointConfig {
    fn new(kind: ApiKind) -> Self {
        Self {
            endpoint: kind.default_endpoint().to_string(),
            api_key: format!("${{{}}}", kind.env_var()),
        }
    }

    pub fn endpoint_for(&self, kind: ApiKind) -> &str {
        if self.endpoint.trim().is_empty() {
            kind.default_endpoint()
        } else {
            &self.endpoint
        }
    }

    pub fn api_key_for(&self, kind: ApiKind) -> String {
        if self.api_key.trim().is_empty() {
            format!("${{{}}}", kind.env_var())
        } else {
            self.api_key.clone()
        }
    }
}

/// Provider endpoints, one per API family.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub anthropic: EndpointConfig,
    pub google: EndpointConfig,
    pub academiccloud: EndpointConfig,
    pub openrouter: EndpointConfig,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            anthropic: EndpointConfig::new(ApiKind::Anthropic),
            google: EndpointConfig::new(ApiKind::Google),
            academiccloud: EndpointConfig::new(ApiKind::Academiccloud),
            openrouter: EndpointConfig::new(ApiKind::Openrouter),
        }
    }
}

impl ProvidersConfig {
    pub fn get(&self, kind: ApiKind) -> &EndpointConfig {
        match kind {
            ApiKind::Anthropic => &self.anthropic,
            ApiKind::Google => &self.google,
            ApiKind::Academiccloud => &self.academiccloud,
            ApiKind::Openrouter => &self.openrouter,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: error, warn, info, debug, trace
    pub level: String,

    /// Log format: "pretty" or "json"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selector_parse_roundtrip() {
        for selector in ModelSelector::ALL {
            assert_eq!(selector.as_str().parse::<ModelSelector>(), Ok(selector));
        }
        assert_eq!("GEMMA".parse::<ModelSelector>(), Ok(ModelSelector::Gemma));
    }

    #[test]
    fn test_selector_parse_unknown_lists_choices() {
        let err = "llava".parse::<ModelSelector>().unwrap_err();
        assert!(err.contains("llava"));
        assert!(err.contains("gemini-flash"));
    }

    #[test]
    fn test_default_catalogue_maps_each_selector_to_one_api() {
        let models = ModelsConfig::default();
        assert_eq!(models.get(ModelSelector::Claude).api, ApiKind::Anthropic);
        assert_eq!(models.get(ModelSelector::Gemini).api, ApiKind::Openrouter);
        assert_eq!(models.get(ModelSelector::Gemma).api, ApiKind::Academiccloud);
        assert_eq!(models.get(ModelSelector::Qwen).api, ApiKind::Academiccloud);
        assert_eq!(models.get(ModelSelector::Gemini).max_tokens, 8192);
    }

    #[test]
    fn test_default_api_keys_reference_env_vars() {
        let providers = ProvidersConfig::default();
        assert_eq!(providers.anthropic.api_key, "${ANTHROPIC_API_KEY}");
        assert_eq!(providers.openrouter.api_key, "${OPENROUTER_API_KEY}");
    }

    #[test]
    fn test_partial_provider_table_falls_back_per_field() {
        let providers: ProvidersConfig =
            toml::from_str("[academiccloud]\napi_key = \"ac-key\"\n").unwrap();
        let academic = &providers.academiccloud;
        assert_eq!(
            academic.endpoint_for(ApiKind::Academiccloud),
            "https://chat-ai.academiccloud.de/v1"
        );
        assert_eq!(academic.api_key_for(ApiKind::Academiccloud), "ac-key");
        assert_eq!(
            providers.google.api_key_for(ApiKind::Google),
            "${GOOGLE_API_KEY}"
        );
    }

    #[test]
    fn test_gateway_families_are_openai_compatible() {
        assert!(ApiKind::Academiccloud.is_openai_compatible());
        assert!(ApiKind::Openrouter.is_openai_compatible());
        assert!(!ApiKind::Anthropic.is_openai_compatible());
        assert!(!ApiKind::Google.is_openai_compatible());
    }
}
