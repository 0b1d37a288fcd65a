//! Shared HTTP transport for provider adapters.
//!
//! Sends a JSON body and sorts every failure into transient, terminal,
//! timeout or parse errors. Adapters only add URLs and auth headers.

use crate::error::{ProviderError, ProviderResult};
use serde::Serialize;
use std::time::Duration;

/// POST `body` and return the decoded JSON response.
pub(crate) async fn post_json<B: Serialize + ?Sized>(
    builder: reqwest::RequestBuilder,
    body: &B,
    timeout: Duration,
    provider: &str,
) -> ProviderResult<serde_json::Value> {
    let resp = builder
        .header("content-type", "application/json")
        .timeout(timeout)
        .json(body)
        .send()
        .await
        .map_err(|e| request_error(e, timeout, provider))?;

    let status = resp.status();
    let text = resp
        .text()
        .await
        .map_err(|e| request_error(e, timeout, provider))?;

    if !status.is_success() {
        let message = format!("{provider} HTTP {status}: {}", truncate(&text, 500));
        let status_code = Some(status.as_u16());
        return Err(if is_transient_status(status.as_u16()) {
            ProviderError::Transient {
                message,
                status_code,
            }
        } else {
            ProviderError::Terminal {
                message,
                status_code,
            }
        });
    }

    serde_json::from_str(&text).map_err(|e| ProviderError::Parse {
        message: format!("{provider} returned invalid JSON: {e}"),
        raw: serde_json::Value::String(text),
    })
}

/// Rate limits, request timeouts and server errors are worth another attempt.
/// Every other non-success status is a rejection of the request itself.
pub(crate) fn is_transient_status(code: u16) -> bool {
    code == 408 || code == 429 || (500..=599).contains(&code)
}

fn request_error(e: reqwest::Error, timeout: Duration, provider: &str) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout {
            timeout_ms: timeout.as_millis() as u64,
        }
    } else if e.is_builder() {
        ProviderError::Terminal {
            message: format!("{provider} request could not be built: {e}"),
            status_code: None,
        }
    } else {
        ProviderError::Transient {
            message: format!("{provider} request failed: {e}"),
            status_code: None,
        }
    }
}

fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
