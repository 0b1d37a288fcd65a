//! Vision-language model providers.
//!
//! Provides one adapter per API family (Anthropic Messages, Gemini
//! `generateContent`, and OpenAI-compatible Chat Completions gateways) behind
//! a common trait, plus the retry coordinator that drives each call.

pub(crate) mod anthropic;
pub(crate) mod clean;
pub(crate) mod gemini;
pub(crate) mod openai_compat;
pub(crate) mod provider;
pub(crate) mod retry;
pub(crate) mod transport;

#[cfg(test)]
pub(crate) mod mock;

pub use anthropic::AnthropicProvider;
pub use clean::clean_output;
pub use gemini::GeminiProvider;
pub use openai_compat::OpenAiCompatProvider;
pub use provider::{
    resolve_env_var, EvalRequest, ImageInput, ProviderConfig, ProviderFactory, ProviderResponse,
    VisionProvider, WireFormat,
};
pub use retry::{Attempted, RetryCoordinator, RetryPolicy};
