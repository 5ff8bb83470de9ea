// ABOUTME: OpenAI chat completions provider, also usable with OpenAI-compatible endpoints
// ABOUTME: Bearer authentication, optional organization header, configurable base URL
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # `OpenAI` Provider
//!
//! Talks to `POST {base_url}/chat/completions`. The base URL defaults to the
//! public `OpenAI` API and can point at any compatible server (vLLM, Ollama,
//! `LocalAI`) through the `base_url` option.

use std::fmt::{Debug, Formatter, Result as FmtResult};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::config::{OpenAiOptions, ProviderConfig, ProviderOptions};
use super::http::{build_client, send_json};
use super::{ChatMessage, ChatRequest, ChatResponse, LlmProvider, TokenUsage};
use crate::errors::ProviderError;

const PROVIDER_NAME: &str = "openai";

/// Default API base URL
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

// ============================================================================
// API Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    messages: Vec<OpenAiMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct OpenAiMessage<'a> {
    role: &'static str,
    content: &'a str,
}

impl<'a> From<&'a ChatMessage> for OpenAiMessage<'a> {
    fn from(msg: &'a ChatMessage) -> Self {
        Self {
            role: msg.role.as_str(),
            content: &msg.content,
        }
    }
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
    #[serde(default)]
    usage: Option<OpenAiUsage>,
    model: String,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiUsage {
    #[serde(rename = "prompt_tokens")]
    prompt: u32,
    #[serde(rename = "completion_tokens")]
    completion: u32,
    #[serde(rename = "total_tokens")]
    total: u32,
}

// ============================================================================
// Provider Implementation
// ============================================================================

struct Session {
    client: Client,
    config: ProviderConfig,
    options: OpenAiOptions,
}

impl Session {
    fn api_url(&self, endpoint: &str) -> String {
        let base = self.options.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL);
        format!("{}/{endpoint}", base.trim_end_matches('/'))
    }
}

/// `OpenAI` chat completions provider
#[derive(Default)]
pub struct OpenAiProvider {
    session: Option<Session>,
}

impl OpenAiProvider {
    /// Create an uninitialized provider
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn build_request<'a>(
        session: &'a Session,
        request: &'a ChatRequest,
    ) -> OpenAiRequest<'a> {
        OpenAiRequest {
            model: request.model.as_deref().unwrap_or(&session.config.model),
            messages: request.messages.iter().map(OpenAiMessage::from).collect(),
            temperature: request.temperature,
            max_tokens: session.config.max_tokens_for(request.max_tokens),
        }
    }

    fn into_chat_response(response: OpenAiResponse) -> Result<ChatResponse, ProviderError> {
        let choice = response.choices.into_iter().next().ok_or_else(|| {
            ProviderError::InvalidResponse {
                provider: PROVIDER_NAME.to_owned(),
                message: "no completion choices returned".to_owned(),
            }
        })?;

        Ok(ChatResponse {
            content: choice.message.content.unwrap_or_default(),
            model: response.model,
            usage: response.usage.map(|u| TokenUsage {
                prompt_tokens: u.prompt,
                completion_tokens: u.completion,
                total_tokens: u.total,
            }),
            finish_reason: choice.finish_reason,
        })
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &'static str {
        PROVIDER_NAME
    }

    async fn initialize(&mut self, config: ProviderConfig) -> Result<(), ProviderError> {
        let ProviderOptions::OpenAi(options) = config.options.clone() else {
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
        debug!(model = body.model, messages = body.messages.len(), "Sending chat completion request");

        let mut http_request = session
            .client
            .post(session.api_url("chat/completions"))
            .bearer_auth(&session.config.api_key)
            .json(&body);
        if let Some(organization) = &session.options.organization {
            http_request = http_request.header("OpenAI-Organization", organization);
        }

        let response: OpenAiResponse = send_json(PROVIDER_NAME, http_request).await?;
        Self::into_chat_response(response)
    }

    async fn close(&mut self) {
        self.session = None;
    }
}

impl Debug for OpenAiProvider {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("OpenAiProvider")
            .field("initialized", &self.session.is_some())
            .finish_non_exhaustive()
    }
}
