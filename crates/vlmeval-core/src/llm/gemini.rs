//! Google Gemini provider using the native `generateContent` API.

use super::clean::clean_output;
use super::provider::{EvalRequest, ProviderConfig, ProviderResponse, VisionProvider, WireFormat};
use super::transport::post_json;
use crate::error::{ProviderError, ProviderResult};
use crate::types::{FinishReason, TokenUsage};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Gemini provider talking to the Generative Language API directly.
pub struct GeminiProvider {
    client: reqwest::Client,
}

impl GeminiProvider {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for GeminiProvider {
    fn default() -> Self {
        Self::new()
    }
}

// --- Request types ---

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part {
    Text { text: String },
    InlineData { inline_data: InlineData },
}

#[derive(Debug, Serialize)]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

// --- Response types ---

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
    usage_metadata: Option<UsageMetadata>,
    model_version: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
    /// Set on thought-summary parts, which are not part of the answer
    #[serde(default)]
    thought: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    prompt_token_count: Option<u32>,
    candidates_token_count: Option<u32>,
    thoughts_token_count: Option<u32>,
    total_token_count: Option<u32>,
}

impl UsageMetadata {
    /// Gemini reports thinking tokens separately from candidate tokens; both
    /// come out of the same output budget.
    fn into_usage(self) -> TokenUsage {
        let completion = match (self.candidates_token_count, self.thoughts_token_count) {
            (Some(visible), Some(thoughts)) => Some(visible.saturating_add(thoughts)),
            (Some(visible), None) => Some(visible),
            (None, thoughts) => thoughts,
        };
        TokenUsage::from_counts(
            self.prompt_token_count,
            completion,
            self.thoughts_token_count,
            self.total_token_count,
        )
    }
}

fn map_finish_reason(reason: &str) -> FinishReason {
    match reason {
        "STOP" => FinishReason::Stop,
        "MAX_TOKENS" => FinishReason::Length,
        "SAFETY" | "RECITATION" | "BLOCKLIST" | "PROHIBITED_CONTENT" | "SPII" | "IMAGE_SAFETY" => {
            FinishReason::Filtered
        }
        _ => FinishReason::Error,
    }
}

impl WireFormat for GeminiProvider {
    type Body = GenerateContentRequest;

    fn build_request(
        &self,
        request: &EvalRequest,
        config: &ProviderConfig,
    ) -> GenerateContentRequest {
        GenerateContentRequest {
            contents: vec![Content {
                parts: vec![
                    Part::Text {
                        text: request.prompt.clone(),
                    },
                    Part::InlineData {
                        inline_data: InlineData {
                            mime_type: request.image.media_type.clone(),
                            data: request.image.data.clone(),
                        },
                    },
                ],
            }],
            generation_config: GenerationConfig {
                temperature: config.temperature,
                max_output_tokens: config.max_output_tokens,
            },
        }
    }

    fn parse_response(
        &self,
        raw: serde_json::Value,
        config: &ProviderConfig,
    ) -> ProviderResult<ProviderResponse> {
        let resp: GenerateContentResponse = match serde_json::from_value(raw.clone()) {
            Ok(resp) => resp,
            Err(e) => {
                return Err(ProviderError::Parse {
                    message: format!("Gemini response has unexpected shape: {e}"),
                    raw,
                })
            }
        };

        let usage = resp.usage_metadata.map(UsageMetadata::into_usage);
        let model = resp
            .model_version
            .unwrap_or_else(|| config.model_id.clone());

        let Some(candidate) = resp.candidates.into_iter().next() else {
            // A blocked prompt comes back with no candidates at all
            let block_reason = resp.prompt_feedback.and_then(|f| f.block_reason);
            return match block_reason {
                Some(reason) => Ok(ProviderResponse {
                    text: String::new(),
                    finish_reason: Some(FinishReason::Filtered),
                    native_finish_reason: Some(reason),
                    usage,
                    model,
                    latency_ms: 0,
                    raw,
                }),
                None => Err(ProviderError::Parse {
                    message: "Gemini response has no candidates".to_string(),
                    raw,
                }),
            };
        };

        let text = candidate
            .content
            .map(|c| {
                c.parts
                    .into_iter()
                    .filter(|p| !p.thought)
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        Ok(ProviderResponse {
            text: clean_output(&text),
            finish_reason: candidate.finish_reason.as_deref().map(map_finish_reason),
            native_finish_reason: candidate.finish_reason,
            usage,
            model,
            latency_ms: 0,
            raw,
        })
    }
}

#[async_trait]
impl VisionProvider for GeminiProvider {
    fn name(&self) -> &str {
        "google"
    }

    async fn evaluate(
        &self,
        request: &EvalRequest,
        config: &ProviderConfig,
    ) -> ProviderResult<ProviderResponse> {
        let start = Instant::now();
        let body = self.build_request(request, config);

        let url = format!(
            "{}/models/{}:generateContent",
            config.endpoint, config.model_id
        );
        let builder = self
            .client
            .post(url)
            .header("x-goog-api-key", &config.api_key);
        let raw = post_json(builder, &body, config.request_timeout, "Gemini").await?;

        let mut response = self.parse_response(raw, config)?;
        response.latency_ms = start.elapsed().as_millis() as u64;
        Ok(response)
    }
}
