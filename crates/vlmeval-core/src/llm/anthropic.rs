//! Anthropic provider using the Messages API.
//!
//! Sends image + prompt via the Anthropic Messages API with base64 image content blocks.

use super::clean::clean_output;
use super::provider::{EvalRequest, ProviderConfig, ProviderResponse, VisionProvider, WireFormat};
use super::transport::post_json;
use crate::error::{ProviderError, ProviderResult};
use crate::types::{FinishReason, TokenUsage};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Instant;

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic provider using the Messages API.
pub struct AnthropicProvider {
    client: reqwest::Client,
}

impl AnthropicProvider {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for AnthropicProvider {
    fn default() -> Self {
        Self::new()
    }
}

// --- Request types ---

#[derive(Debug, Serialize)]
pub struct MessagesRequest {
    model: String,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<Message>,
}

#[derive(Debug, Serialize)]
struct Message {
    role: &'static str,
    content: Vec<ContentBlock>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "image")]
    Image { source: ImageSource },
    #[serde(rename = "text")]
    Text { text: String },
}

#[derive(Debug, Serialize)]
struct ImageSource {
    #[serde(rename = "type")]
    source_type: &'static str,
    media_type: String,
    data: String,
}

// --- Response types ---

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ResponseContent>,
    model: Option<String>,
    stop_reason: Option<String>,
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct ResponseContent {
    #[serde(rename = "type")]
    kind: String,
    text: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    input_tokens: Option<u32>,
    output_tokens: Option<u32>,
}

fn map_stop_reason(reason: &str) -> FinishReason {
    match reason {
        "end_turn" | "stop_sequence" | "tool_use" | "pause_turn" => FinishReason::Stop,
        "max_tokens" => FinishReason::Length,
        "refusal" => FinishReason::Filtered,
        _ => FinishReason::Error,
    }
}

impl WireFormat for AnthropicProvider {
    type Body = MessagesRequest;

    fn build_request(&self, request: &EvalRequest, config: &ProviderConfig) -> MessagesRequest {
        MessagesRequest {
            model: config.model_id.clone(),
            max_tokens: config.max_output_tokens,
            temperature: config.temperature,
            messages: vec![Message {
                role: "user",
                content: vec![
                    ContentBlock::Image {
                        source: ImageSource {
                            source_type: "base64",
                            media_type: request.image.media_type.clone(),
                            data: request.image.data.clone(),
                        },
                    },
                    ContentBlock::Text {
                        text: request.prompt.clone(),
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
        let resp: MessagesResponse = match serde_json::from_value(raw.clone()) {
            Ok(resp) => resp,
            Err(e) => {
                return Err(ProviderError::Parse {
                    message: format!("Anthropic response has unexpected shape: {e}"),
                    raw,
                })
            }
        };

        let text = resp
            .content
            .iter()
            .filter(|c| c.kind == "text")
            .filter_map(|c| c.text.as_deref())
            .collect::<Vec<_>>()
            .join("");

        let usage = resp.usage.map(|u| {
            let total = match (u.input_tokens, u.output_tokens) {
                (Some(input), Some(output)) => Some(input.saturating_add(output)),
                _ => None,
            };
            TokenUsage::from_counts(u.input_tokens, u.output_tokens, None, total)
        });

        Ok(ProviderResponse {
            text: clean_output(&text),
            finish_reason: resp.stop_reason.as_deref().map(map_stop_reason),
            native_finish_reason: resp.stop_reason,
            usage,
            model: resp.model.unwrap_or_else(|| config.model_id.clone()),
            latency_ms: 0,
            raw,
        })
    }
}

#[async_trait]
impl VisionProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
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
            .post(format!("{}/messages", config.endpoint))
            .header("x-api-key", &config.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION);
        let raw = post_json(builder, &body, config.request_timeout, "Anthropic").await?;

        let mut response = self.parse_response(raw, config)?;
        response.latency_ms = start.elapsed().as_millis() as u64;
        Ok(response)
    }
}
