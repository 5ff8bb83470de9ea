// ABOUTME: Shared HTTP plumbing for LLM providers
// ABOUTME: Builds the reqwest client, sends JSON requests, and maps failure statuses to ProviderError
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::time::Duration;

use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, error};

use crate::constants::llm::{CONNECT_TIMEOUT_SECS, REQUEST_TIMEOUT_SECS};
use crate::errors::ProviderError;

/// Longest error body excerpt carried in a `ProviderError`
const ERROR_BODY_EXCERPT: usize = 300;

/// Build the HTTP client every provider uses
pub(super) fn build_client(provider: &str) -> Result<Client, ProviderError> {
    Client::builder()
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .build()
        .map_err(|e| ProviderError::Configuration {
            provider: provider.to_owned(),
            reason: format!("failed to create HTTP client: {e}"),
        })
}

/// Send a prepared request and decode a successful JSON body
pub(super) async fn send_json<T: DeserializeOwned>(
    provider: &str,
    request: RequestBuilder,
) -> Result<T, ProviderError> {
    let response = request.send().await.map_err(|e| {
        error!(provider, error = %e, "Failed to send request to LLM API");
        ProviderError::Network {
            provider: provider.to_owned(),
            message: e.to_string(),
        }
    })?;

    let status = response.status();
    let body = response.text().await.map_err(|e| ProviderError::Network {
        provider: provider.to_owned(),
        message: format!("failed to read response body: {e}"),
    })?;

    if !status.is_success() {
        error!(provider, status = %status, "LLM API returned an error status");
        return Err(map_status(provider, status, &body));
    }

    debug!(provider, body_len = body.len(), "Received LLM API response");
    serde_json::from_str(&body).map_err(|e| ProviderError::InvalidResponse {
        provider: provider.to_owned(),
        message: format!("failed to parse response: {e}"),
    })
}

/// Map a non-success status and its body to a provider error
pub(super) fn map_status(provider: &str, status: StatusCode, body: &str) -> ProviderError {
    let message = error_message(body);
    let provider = provider.to_owned();

    match status.as_u16() {
        401 | 403 => ProviderError::AuthenticationFailed {
            provider,
            reason: message,
        },
        429 => ProviderError::RateLimited { provider, message },
        code => ProviderError::ApiError {
            provider,
            status_code: code,
            message,
            retryable: status.is_server_error(),
        },
    }
}

/// Pull a human readable message out of an error body
///
/// Understands `{"error": {"message"}}`, `{"error": "..."}` and
/// `{"message"}`; anything else is returned as a truncated excerpt.
fn error_message(body: &str) -> String {
    let from_json = serde_json::from_str::<Value>(body).ok().and_then(|json| {
        json.pointer("/error/message")
            .or_else(|| json.get("error").filter(|e| e.is_string()))
            .or_else(|| json.get("message"))
            .and_then(Value::as_str)
            .map(str::to_owned)
    });

    from_json.unwrap_or_else(|| {
        let excerpt: String = body.chars().take(ERROR_BODY_EXCERPT).collect();
        if excerpt.is_empty() {
            "empty response body".to_owned()
        } else {
            excerpt
        }
    })
}
