// ABOUTME: Anthropic Messages API provider
// ABOUTME: Sends the system prompt as a top-level field and authenticates with x-api-key
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::fmt::{Debug, Formatter, Result as FmtResult};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::config::{AnthropicOptions, ProviderConfig, ProviderOptions};
use super::http::{build_client, send_json};
use super::{ChatRequest, ChatResponse, LlmProvider, MessageRole, TokenUsage};
use crate::errors::ProviderError;

const PROVIDER_NAME: &str = "anthropic";

const API_URL: &str = "https://api.anthropic.com/v1/messages";

/// Value of the `anthropic-version` header
const API_VERSION: &str = "2023-06-01";

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<AnthropicMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_k: Option<u32>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    model: String,
    stop_reason: Option<String>,
    usage: Option<AnthropicUsage>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    input_tokens: u32,
    output_tokens: u32,
}

struct Session {
    client: Client,
    config: ProviderConfig,
    options: AnthropicOptions,
}

/// Anthropic Claude provider
#[derive(Default)]
pub struct AnthropicProvider {
    session: Option<Session>,
}

impl AnthropicProvider {
    /// Create an uninitialized provider
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn build_request<'a>(session: &'a Session, request: &'a ChatRequest) -> MessagesRequest<'a> {
        MessagesRequest {
            model: request.model.as_deref().unwrap_or(&session.config.model),
            max_tokens: session.config.max_tokens_for(request.max_tokens),
            system: request.system_prompt(),
            messages: request
                .conversation()
                .map(|m| AnthropicMessage {
                    role: if m.role == MessageRole::Assistant {
                        "assistant"
                    } else {
                        "user"
                    },
                    content: &m.content,
                })
                .collect(),
            temperature: session.options.temperature.or(request.temperature),
            top_k: session.options.top_k,
        }
    }

    fn into_chat_response(response: MessagesResponse) -> ChatResponse {
        let content = response
            .content
            .iter()
            .filter(|block| block.block_type == "text")
            .filter_map(|block| block.text.as_deref())
            .collect::<String>();

        ChatResponse {
            content,
            model: response.model,
            usage: response.usage.map(|u| TokenUsage {
                prompt_tokens: u.input_tokens,
                completion_tokens: u.output_tokens,
                total_tokens: u.input_tokens.saturating_add(u.output_tokens),
            }),
            finish_reason: response.stop_reason,
        }
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    fn name(&self) -> &'static str {
        PROVIDER_NAME
    }

    async fn initialize(&mut self, config: ProviderConfig) -> Result<(), ProviderError> {
        let ProviderOptions::Anthropic(options) = config.options.clone() else {
            return Err(config.wrong_kind(PROVIDER_NAME));
        };
        config.require_credentials(PROVIDER_NAME)?;

        self.session = Some(Session {
            client: build_client(PROVIDER_NAME)?,
            config,
            options,
        });
        Ok(())
    }

    #[instrument(skip(self, request), fields(provider = PROVIDER_NAME))]
    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, ProviderError> {
        let session = self
            .session
            .as_ref()
            .ok_or_else(|| ProviderError::NotInitialized {
                provider: PROVIDER_NAME.to_owned(),
            })?;

        let body = Self::build_request(session, request);
        debug!(model = body.model, "Sending Anthropic messages request");

        let http_request = session
            .client
            .post(API_URL)
            .header("x-api-key", &session.config.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body);

        let response: MessagesResponse = send_json(PROVIDER_NAME, http_request).await?;
        Ok(Self::into_chat_response(response))
    }

    async fn close(&mut self) {
        self.session = None;
    }
}

impl Debug for AnthropicProvider {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("AnthropicProvider")
            .field("initialized", &self.session.is_some())
            .finish_non_exhaustive()
    }
}
