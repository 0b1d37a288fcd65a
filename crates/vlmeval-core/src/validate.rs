//! Classification of normalized provider responses.
//!
//! A response that came back over HTTP is not necessarily an answer: reasoning
//! models can spend their whole output budget thinking and return nothing.

use crate::llm::ProviderResponse;
use crate::types::FinishReason;
use serde::{Deserialize, Serialize};
use std::fmt;

/// What a provider response amounts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Non-empty answer
    Success,
    /// Empty answer because the output budget ran out
    TokenExhaustion,
    /// Empty answer blocked by a safety filter
    ContentFiltered,
    /// Empty answer with no explanation
    Malformed,
}

impl Outcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::TokenExhaustion => "token_exhaustion",
            Self::ContentFiltered => "content_filtered",
            Self::Malformed => "malformed",
        }
    }

    pub fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classifies responses against the output-token budget they were sent with.
#[derive(Debug, Clone, Copy)]
pub struct ResponseValidator {
    max_output_tokens: u32,
}

impl ResponseValidator {
    pub fn new(max_output_tokens: u32) -> Self {
        Self { max_output_tokens }
    }

    /// Classify one response.
    ///
    /// Any non-empty text is a success. Empty text is token exhaustion when
    /// the provider says it hit the length limit, or when it gave no finish
    /// reason but used the whole budget.
    pub fn classify(&self, response: &ProviderResponse) -> Outcome {
        if !response.text.trim().is_empty() {
            return Outcome::Success;
        }

        match response.finish_reason {
            Some(FinishReason::Length) => Outcome::TokenExhaustion,
            Some(FinishReason::Filtered) => Outcome::ContentFiltered,
            Some(FinishReason::Stop) | Some(FinishReason::Error) => Outcome::Malformed,
            None if self.budget_spent(response) => Outcome::TokenExhaustion,
            None => Outcome::Malformed,
        }
    }

    /// Finish reason recorded on the artifact. Providers that omit one get the
    /// value implied by the outcome.
    pub fn recorded_finish_reason(&self, response: &ProviderResponse, outcome: Outcome) -> FinishReason {
        response.finish_reason.unwrap_or(match outcome {
            Outcome::Success => FinishReason::Stop,
            Outcome::TokenExhaustion => FinishReason::Length,
            Outcome::ContentFiltered => FinishReason::Filtered,
            Outcome::Malformed => FinishReason::Error,
        })
    }

    fn budget_spent(&self, response: &ProviderResponse) -> bool {
        response
            .usage
            .and_then(|u| u.completion_tokens)
            .is_some_and(|used| used >= self.max_output_tokens)
    }
}
