//! OpenAI-compatible gateway provider using the Chat Completions API.
//!
//! Serves every gateway that speaks the Chat Completions dialect (the
//! AcademicCloud SAIA endpoint, OpenRouter). The image travels as a data URL
//! in the user message, after the text block; some gateways silently drop the
//! prompt when the image comes first.

use super::clean::clean_output;
use super::provider::{EvalRequest, ProviderConfig, ProviderResponse, VisionProvider, WireFormat};
use super::transport::{is_transient_status, post_json};
use crate::error::{ProviderError, ProviderResult};
use crate::types::{FinishReason, TokenUsage};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Provider for any Chat Completions compatible gateway.
pub struct OpenAiCompatProvider {
    name: String,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            client: reqwest::Client::new(),
        }
    }
}

// --- Request types ---

#[derive(Debug, Serialize)]
pub struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: Vec<ChatContent>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type")]
enum ChatContent {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "image_url")]
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

// --- Response types ---

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    model: Option<String>,
    usage: Option<ChatUsage>,
    /// In-band error some gateways return with a 200 status
    error: Option<GatewayError>,
}

#[derive(Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<MessageContent>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Deserialize)]
struct ContentPart {
    text: Option<String>,
}

impl MessageContent {
    fn into_text(self) -> String {
        match self {
            Self::Text(text) => text,
            Self::Parts(parts) => parts
                .into_iter()
                .filter_map(|p| p.text)
                .collect::<Vec<_>>()
                .join(""),
        }
    }
}

#[derive(Deserialize)]
struct ChatUsage {
    prompt_tokens: Option<u32>,
    completion_tokens: Option<u32>,
    total_tokens: Option<u32>,
    completion_tokens_details: Option<CompletionDetails>,
}

#[derive(Deserialize)]
struct CompletionDetails {
    reasoning_tokens: Option<u32>,
}

#[derive(Deserialize)]
struct GatewayError {
    code: Option<serde_json::Value>,
    message: Option<String>,
}

fn map_finish_reason(reason: &str) -> Option<FinishReason> {
    match reason {
        "stop" | "tool_calls" | "function_call" => Some(FinishReason::Stop),
        "length" => Some(FinishReason::Length),
        "content_filter" => Some(FinishReason::Filtered),
        "error" => Some(FinishReason::Error),
        _ => None,
    }
}

impl WireFormat for OpenAiCompatProvider {
    type Body = ChatRequest;

    fn build_request(&self, request: &EvalRequest, config: &ProviderConfig) -> ChatRequest {
        ChatRequest {
            model: config.model_id.clone(),
            max_tokens: config.max_output_tokens,
            temperature: config.temperature,
            messages: vec![ChatMessage {
                role: "user",
                content: vec![
                    ChatContent::Text {
                        text: request.prompt.clone(),
                    },
                    ChatContent::ImageUrl {
                        image_url: ImageUrl {
                            url: request.image.data_url(),
                        },
                    },
                ],
            }],
        }
    }

    fn parse_response(
        &self,
        raw: serde_json::Value,
        config: &ProviderConfig,
    ) -> ProviderResult<ProviderResponse> {
        let resp: ChatResponse = match serde_json::from_value(raw.clone()) {
            Ok(resp) => resp,
            Err(e) => {
                return Err(ProviderError::Parse {
                    message: format!("{} response has unexpected shape: {e}", self.name),
                    raw,
                })
            }
        };

        if let (Some(error), true) = (&resp.error, resp.choices.is_empty()) {
            return Err(gateway_error(&self.name, error));
        }

        let Some(choice) = resp.choices.into_iter().next() else {
            return Err(ProviderError::Parse {
                message: format!("{} response has no choices", self.name),
                raw,
            });
        };

        let text = choice
            .message
            .and_then(|m| m.content)
            .map(MessageContent::into_text)
            .unwrap_or_default();

        let usage = resp.usage.map(|u| {
            TokenUsage::from_counts(
                u.prompt_tokens,
                u.completion_tokens,
                u.completion_tokens_details.and_then(|d| d.reasoning_tokens),
                u.total_tokens,
            )
        });

        Ok(ProviderResponse {
            text: clean_output(&text),
            finish_reason: choice.finish_reason.as_deref().and_then(map_finish_reason),
            native_finish_reason: choice.finish_reason,
            usage,
            model: resp.model.unwrap_or_else(|| config.model_id.clone()),
            latency_ms: 0,
            raw,
        })
    }
}

fn gateway_error(provider: &str, error: &GatewayError) -> ProviderError {
    let status_code = error
        .code
        .as_ref()
        .and_then(|c| c.as_u64())
        .and_then(|c| u16::try_from(c).ok());
    let message = format!(
        "{provider} returned an error: {}",
        error.message.as_deref().unwrap_or("unknown error")
    );
    match status_code {
        Some(code) if !is_transient_status(code) => ProviderError::Terminal {
            message,
            status_code,
        },
        _ => ProviderError::Transient {
            message,
            status_code,
        },
    }
}

#[async_trait]
impl VisionProvider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn evaluate(
        &self,
        request: &EvalRequest,
        config: &ProviderConfig,
    ) -> ProviderResult<ProviderResponse> {
        let start = Instant::now();
        let body = self.build_request(request, config);

        let builder = self
            .client
            .post(format!("{}/chat/completions", config.endpoint))
            .header("Authorization", format!("Bearer {}", config.api_key));
        let raw = post_json(builder, &body, config.request_timeout, &self.name).await?;

        let mut response = self.parse_response(raw, config)?;
        response.latency_ms = start.elapsed().as_millis() as u64;
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ApiKind, Config, ModelSelector};
    use crate::llm::provider::tests::{test_config, test_request};
    use serde_json::json;

    #[test]
    fn test_text_block_precedes_image_for_every_gateway_model() {
        let mut config = Config::default();
        for kind in [ApiKind::Academiccloud, ApiKind::Openrouter, ApiKind::Anthropic, ApiKind::Google] {
            let endpoint = match kind {
                ApiKind::Anthropic => &mut config.providers.anthropic,
                ApiKind::Google => &mut config.providers.google,
                ApiKind::Academiccloud => &mut config.providers.academiccloud,
                ApiKind::Openrouter => &mut config.providers.openrouter,
            };
            endpoint.api_key = "key".to_string();
        }

        let gateway_models: Vec<_> = ModelSelector::ALL
            .into_iter()
            .filter(|s| config.models.get(*s).api.is_openai_compatible())
            .collect();
        assert!(!gateway_models.is_empty());

        for selector in gateway_models {
            let provider_config = ProviderConfig::resolve(&config, selector).unwrap();
            let provider = OpenAiCompatProvider::new(provider_config.api.as_str());
            let body =
                serde_json::to_value(provider.build_request(&test_request(), &provider_config))
                    .unwrap();
            let content = &body["messages"][0]["content"];
            assert_eq!(content[0]["type"], "text", "{selector}: text must come first");
            assert_eq!(content[0]["text"], "Count the cuts.");
            assert_eq!(content[1]["type"], "image_url", "{selector}");
            assert!(content[1]["image_url"]["url"]
                .as_str()
                .unwrap()
                .starts_with("data:image/png;base64,"));
            assert_eq!(body["model"], provider_config.model_id.as_str());
        }
    }

    #[test]
    fn test_parse_success() {
        let provider = OpenAiCompatProvider::new("academiccloud");
        let config = test_config(ApiKind::Academiccloud);
        let raw = json!({
            "model": "qwen2.5-vl-72b-instruct",
            "choices": [{"message": {"role": "assistant", "content": "Here is the result: two cuts"}, "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 800, "completion_tokens": 5, "total_tokens": 805}
        });

        let resp = provider.parse_response(raw, &config).unwrap();
        assert_eq!(resp.text, "two cuts");
        assert_eq!(resp.finish_reason, Some(FinishReason::Stop));
        assert_eq!(resp.usage.unwrap().content_tokens, Some(5));
    }

    #[test]
    fn test_parse_reasoning_exhaustion() {
        let provider = OpenAiCompatProvider::new("openrouter");
        let config = test_config(ApiKind::Openrouter);
        let raw = json!({
            "model": "google/gemini-3-pro-preview",
            "choices": [{"message": {"role": "assistant", "content": null}, "finish_reason": "length"}],
            "usage": {
                "prompt_tokens": 1300,
                "completion_tokens": 2048,
                "total_tokens": 3348,
                "completion_tokens_details": {"reasoning_tokens": 2048}
            }
        });

        let resp = provider.parse_response(raw, &config).unwrap();
        assert_eq!(resp.text, "");
        assert_eq!(resp.finish_reason, Some(FinishReason::Length));
        let usage = resp.usage.unwrap();
        assert_eq!(usage.reasoning_tokens, Some(2048));
        assert_eq!(usage.content_tokens, Some(0));
    }

    #[test]
    fn test_parse_content_parts() {
        let provider = OpenAiCompatProvider::new("openrouter");
        let config = test_config(ApiKind::Openrouter);
        let raw = json!({
            "choices": [{"message": {"content": [{"type": "text", "text": "A tree diagram."}]}, "finish_reason": "stop"}]
        });
        let resp = provider.parse_response(raw, &config).unwrap();
        assert_eq!(resp.text, "A tree diagram.");
        assert_eq!(resp.model, config.model_id);
    }

    #[test]
    fn test_parse_empty_choices_is_parse_error() {
        let provider = OpenAiCompatProvider::new("academiccloud");
        let config = test_config(ApiKind::Academiccloud);
        let raw = json!({"choices": []});
        let err = provider.parse_response(raw.clone(), &config).unwrap_err();
        assert!(matches!(err, ProviderError::Parse { .. }));
        assert_eq!(err.raw_response(), Some(&raw));
    }

    #[test]
    fn test_unknown_finish_reason_is_absent() {
        assert_eq!(map_finish_reason("content_filter"), Some(FinishReason::Filtered));
        assert_eq!(map_finish_reason("eos"), None);
    }

    #[test]
    fn test_in_band_gateway_errors_are_classified() {
        let provider = OpenAiCompatProvider::new("openrouter");
        let config = test_config(ApiKind::Openrouter);

        let raw = json!({"error": {"code": 502, "message": "upstream overloaded"}});
        let err = provider.parse_response(raw, &config).unwrap_err();
        assert!(err.is_retryable());

        let raw = json!({"error": {"code": 401, "message": "no auth credentials"}});
        let err = provider.parse_response(raw, &config).unwrap_err();
        assert!(err.is_terminal());
    }
}
