//! Vision provider trait and request/response types.
//!
//! Defines the contract every provider family implements, the explicit
//! per-run `ProviderConfig` handed to each call, and the factory that maps an
//! `ApiKind` onto exactly one adapter.

use crate::config::{ApiKind, Config, ModelSelector};
use crate::error::{ConfigError, ProviderResult};
use crate::types::{FinishReason, TokenUsage};
use async_trait::async_trait;
use base64::Engine;
use serde::Serialize;
use std::fmt;
use std::path::Path;
use std::time::Duration;

/// Base64-encoded image ready to send to a provider.
#[derive(Debug, Clone)]
pub struct ImageInput {
    /// Base64-encoded image bytes
    pub data: String,
    /// MIME type (e.g., "image/jpeg", "image/png")
    pub media_type: String,
}

impl ImageInput {
    /// Create an `ImageInput` from raw bytes.
    ///
    /// The MIME type is sniffed from the bytes; the path extension is only
    /// consulted when the bytes are not a recognised image format.
    pub fn from_bytes(bytes: &[u8], path_hint: &Path) -> Self {
        let media_type = match image::guess_format(bytes) {
            Ok(format) => format.to_mime_type(),
            Err(_) => media_type_for_extension(path_hint),
        };

        Self {
            data: base64::engine::general_purpose::STANDARD.encode(bytes),
            media_type: media_type.to_string(),
        }
    }

    /// Return a data URL suitable for OpenAI-style APIs.
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.media_type, self.data)
    }
}

fn media_type_for_extension(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "gif" => "image/gif",
        other => {
            tracing::warn!("Unknown image extension '{other}', defaulting to image/jpeg");
            "image/jpeg"
        }
    }
}

/// One image plus the prompt to evaluate it with.
#[derive(Debug, Clone)]
pub struct EvalRequest {
    pub image: ImageInput,
    pub prompt: String,
}

impl EvalRequest {
    pub fn new(image: ImageInput, prompt: impl Into<String>) -> Self {
        Self {
            image,
            prompt: prompt.into(),
        }
    }
}

/// A provider response normalized across API families.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderResponse {
    /// Completion text (may be empty)
    pub text: String,
    /// Finish reason mapped to the closed vocabulary, if the provider sent one
    pub finish_reason: Option<FinishReason>,
    /// The provider's own finish value
    pub native_finish_reason: Option<String>,
    /// Token accounting, if reported
    pub usage: Option<TokenUsage>,
    /// Model identifier the provider reports
    pub model: String,
    /// Round-trip latency in milliseconds
    pub latency_ms: u64,
    /// The untouched response body
    pub raw: serde_json::Value,
}

/// Everything an adapter needs to reach one model. Fixed for a run.
#[derive(Clone, PartialEq)]
pub struct ProviderConfig {
    pub model_id: String,
    pub api: ApiKind,
    /// API base URL
    pub endpoint: String,
    pub api_key: String,
    /// Output-token budget, reasoning included
    pub max_output_tokens: u32,
    pub temperature: f32,
    /// Courtesy pause after every completed request
    pub inter_request_delay: Duration,
    /// Per-request timeout
    pub request_timeout: Duration,
}

impl ProviderConfig {
    /// Resolve the provider configuration for `selector` from the loaded config.
    ///
    /// Fails with `MissingCredentials` when the selected family has no key.
    pub fn resolve(config: &Config, selector: ModelSelector) -> Result<Self, ConfigError> {
        let model = config.models.get(selector);
        let endpoint = config.providers.get(model.api);
        let api_key = resolve_env_var(&endpoint.api_key_for(model.api)).ok_or_else(|| {
            ConfigError::MissingCredentials {
                provider: model.api.to_string(),
                env_var: model.api.env_var().to_string(),
            }
        })?;

        Ok(Self {
            model_id: model.model_id.clone(),
            api: model.api,
            endpoint: endpoint
                .endpoint_for(model.api)
                .trim_end_matches('/')
                .to_string(),
            api_key,
            max_output_tokens: model.max_tokens,
            temperature: config.run.temperature,
            inter_request_delay: Duration::from_secs(config.run.delay_secs),
            request_timeout: Duration::from_millis(config.run.request_timeout_ms),
        })
    }

    pub fn with_max_output_tokens(mut self, max_output_tokens: u32) -> Self {
        self.max_output_tokens = max_output_tokens;
        self
    }

    pub fn with_inter_request_delay(mut self, delay: Duration) -> Self {
        self.inter_request_delay = delay;
        self
    }

    /// Directory for this model's runs. A vendor prefix such as `google/`
    /// stays a parent directory.
    pub fn model_dir_name(&self) -> String {
        self.model_id.replace([':', '.', '-'], "_")
    }
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("model_id", &self.model_id)
            .field("api", &self.api)
            .field("endpoint", &self.endpoint)
            .field("api_key", &"<redacted>")
            .field("max_output_tokens", &self.max_output_tokens)
            .field("temperature", &self.temperature)
            .field("inter_request_delay", &self.inter_request_delay)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

/// Trait that all provider adapters implement.
///
/// Uses `async_trait` because native async fn in trait is not object-safe
/// (we need `Box<dyn VisionProvider>` for dynamic dispatch).
#[async_trait]
pub trait VisionProvider: Send + Sync {
    /// Provider name for logging (e.g., "anthropic", "openrouter").
    fn name(&self) -> &str;

    /// Send one image + prompt and normalize the answer.
    async fn evaluate(
        &self,
        request: &EvalRequest,
        config: &ProviderConfig,
    ) -> ProviderResult<ProviderResponse>;
}

/// The two halves of a provider's wire contract.
pub trait WireFormat {
    /// Serializable request body.
    type Body: Serialize + Send + Sync;

    /// Translate a request into the provider's payload.
    fn build_request(&self, request: &EvalRequest, config: &ProviderConfig) -> Self::Body;

    /// Normalize a raw response body. The raw value is preserved on the
    /// result, and on the error when parsing fails.
    fn parse_response(
        &self,
        raw: serde_json::Value,
        config: &ProviderConfig,
    ) -> ProviderResult<ProviderResponse>;
}

/// Resolve `${ENV_VAR}` references in config strings.
pub fn resolve_env_var(value: &str) -> Option<String> {
    if value.starts_with("${") && value.ends_with('}') {
        let var_name = &value[2..value.len() - 1];
        std::env::var(var_name).ok().filter(|v| !v.is_empty())
    } else if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Factory that binds each API family to its adapter.
pub struct ProviderFactory;

impl ProviderFactory {
    pub fn create(api: ApiKind) -> Box<dyn VisionProvider> {
        match api {
            ApiKind::Anthropic => Box::new(super::anthropic::AnthropicProvider::new()),
            ApiKind::Google => Box::new(super::gemini::GeminiProvider::new()),
            ApiKind::Academiccloud | ApiKind::Openrouter => Box::new(
                super::openai_compat::OpenAiCompatProvider::new(api.as_str()),
            ),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::path::PathBuf;

    pub(crate) fn test_config(api: ApiKind) -> ProviderConfig {
        ProviderConfig {
            model_id: "qwen2.5-vl-72b-instruct".to_string(),
            api,
            endpoint: "http://localhost:9".to_string(),
            api_key: "sk-test".to_string(),
            max_output_tokens: 2048,
            temperature: 0.0,
            inter_request_delay: Duration::ZERO,
            request_timeout: Duration::from_secs(5),
        }
    }

    pub(crate) fn test_request() -> EvalRequest {
        let image = ImageInput::from_bytes(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A], Path::new("crop.png"));
        EvalRequest::new(image, "Count the cuts.")
    }

    #[test]
    fn test_image_input_sniffs_png_bytes() {
        let input =
            ImageInput::from_bytes(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A], Path::new("crop.jpg"));
        assert_eq!(input.media_type, "image/png");
    }

    #[test]
    fn test_image_input_sniffs_jpeg_bytes() {
        let input = ImageInput::from_bytes(&[0xFF, 0xD8, 0xFF, 0xE0], Path::new("crop"));
        assert_eq!(input.media_type, "image/jpeg");
        assert!(!input.data.is_empty());
    }

    #[test]
    fn test_image_input_falls_back_to_extension() {
        let input = ImageInput::from_bytes(&[1, 2, 3], &PathBuf::from("crop.webp"));
        assert_eq!(input.media_type, "image/webp");
        let input = ImageInput::from_bytes(&[1, 2, 3], &PathBuf::from("crop.bin"));
        assert_eq!(input.media_type, "image/jpeg");
    }

    #[test]
    fn test_image_input_data_url() {
        let input = ImageInput::from_bytes(&[0xFF, 0xD8, 0xFF], Path::new("crop.jpg"));
        assert!(input.data_url().starts_with("data:image/jpeg;base64,"));
    }

    #[test]
    fn test_resolve_env_var() {
        // Non-env-var strings pass through
        assert_eq!(resolve_env_var("plain-key"), Some("plain-key".to_string()));
        // Empty returns None
        assert_eq!(resolve_env_var(""), None);
        // Unset env var returns None
        assert_eq!(resolve_env_var("${DEFINITELY_NOT_SET_VLMEVAL_123}"), None);
    }

    #[test]
    fn test_resolve_uses_literal_key_and_catalogue() {
        let mut config = Config::default();
        config.providers.academiccloud.api_key = "ac-key".to_string();
        config.providers.academiccloud.endpoint = "https://chat-ai.example/v1/".to_string();
        config.run.delay_secs = 7;

        let provider = ProviderConfig::resolve(&config, ModelSelector::Gemma).unwrap();
        assert_eq!(provider.model_id, "gemma-3-27b-it");
        assert_eq!(provider.api, ApiKind::Academiccloud);
        assert_eq!(provider.endpoint, "https://chat-ai.example/v1");
        assert_eq!(provider.api_key, "ac-key");
        assert_eq!(provider.max_output_tokens, 2048);
        assert_eq!(provider.inter_request_delay, Duration::from_secs(7));
    }

    #[test]
    fn test_resolve_missing_key_is_config_error() {
        let mut config = Config::default();
        config.providers.anthropic.api_key = "${DEFINITELY_NOT_SET_VLMEVAL_456}".to_string();
        let err = ProviderConfig::resolve(&config, ModelSelector::Claude).unwrap_err();
        assert!(matches!(err, ConfigError::MissingCredentials { .. }));
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let config = test_config(ApiKind::Openrouter);
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-test"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_model_dir_name() {
        let mut config = test_config(ApiKind::Openrouter);
        config.model_id = "google/gemini-3-pro-preview".to_string();
        assert_eq!(config.model_dir_name(), "google/gemini_3_pro_preview");
        config.model_id = "qwen2.5-vl-72b-instruct".to_string();
        assert_eq!(config.model_dir_name(), "qwen2_5_vl_72b_instruct");
    }

    #[test]
    fn test_factory_binds_gateways_to_one_adapter() {
        assert_eq!(ProviderFactory::create(ApiKind::Anthropic).name(), "anthropic");
        assert_eq!(ProviderFactory::create(ApiKind::Google).name(), "google");
        assert_eq!(ProviderFactory::create(ApiKind::Openrouter).name(), "openrouter");
        assert_eq!(
            ProviderFactory::create(ApiKind::Academiccloud).name(),
            "academiccloud"
        );
    }
}
