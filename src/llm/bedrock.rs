// ABOUTME: AWS Bedrock provider using the Bedrock Runtime Converse API
// ABOUTME: Authenticates with a Bedrock API key sent as a bearer token, region from options
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::fmt::{Debug, Formatter, Result as FmtResult};

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::config::{BedrockOptions, ProviderConfig, ProviderOptions};
use super::http::{build_client, send_json};
use super::{ChatRequest, ChatResponse, LlmProvider, MessageRole, TokenUsage};
use crate::errors::ProviderError;

const PROVIDER_NAME: &str = "bedrock";

/// Region used when the configuration names none
const DEFAULT_REGION: &str = "us-east-1";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ConverseRequest {
    messages: Vec<ConverseMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    system: Vec<TextBlock>,
    inference_config: InferenceConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct ConverseMessage {
    role: String,
    #[serde(default)]
    content: Vec<TextBlock>,
}

#[derive(Debug, Serialize, Deserialize)]
struct TextBlock {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InferenceConfig {
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConverseResponse {
    output: ConverseOutput,
    stop_reason: Option<String>,
    usage: Option<ConverseUsage>,
}

#[derive(Debug, Deserialize)]
struct ConverseOutput {
    message: Option<ConverseMessage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConverseUsage {
    input_tokens: u32,
    output_tokens: u32,
    total_tokens: u32,
}

struct Session {
    client: Client,
    config: ProviderConfig,
    options: BedrockOptions,
}

impl Session {
    fn region(&self) -> &str {
        self.options.region.as_deref().unwrap_or(DEFAULT_REGION)
    }

    /// `https://bedrock-runtime.{region}.amazonaws.com/model/{model}/converse`
    ///
    /// Model ids contain `:` and `.`, so the id is pushed as one encoded path segment.
    fn converse_url(&self, model: &str) -> Result<Url, ProviderError> {
        let invalid = |reason: String| ProviderError::Configuration {
            provider: PROVIDER_NAME.to_owned(),
            reason,
        };
        let mut url = Url::parse(&format!(
            "https://bedrock-runtime.{}.amazonaws.com/",
            self.region()
        ))
        .map_err(|e| invalid(format!("invalid region '{}': {e}", self.region())))?;
        url.path_segments_mut()
            .map_err(|()| invalid("endpoint URL cannot carry a path".to_owned()))?
            .clear()
            .extend(["model", model, "converse"]);
        Ok(url)
    }
}

/// AWS Bedrock provider
#[derive(Default)]
pub struct BedrockProvider {
    session: Option<Session>,
}

impl BedrockProvider {
    /// Create an uninitialized provider
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn build_request(session: &Session, request: &ChatRequest) -> ConverseRequest {
        ConverseRequest {
            messages: request
                .conversation()
                .map(|m| ConverseMessage {
                    role: if m.role == MessageRole::Assistant {
                        "assistant".to_owned()
                    } else {
                        "user".to_owned()
                    },
                    content: vec![TextBlock {
                        text: Some(m.content.clone()),
                    }],
                })
                .collect(),
            system: request
                .system_prompt()
                .map(|text| vec![TextBlock { text: Some(text) }])
                .unwrap_or_default(),
            inference_config: InferenceConfig {
                max_tokens: session.config.max_tokens_for(request.max_tokens),
                temperature: request.temperature,
            },
        }
    }

    fn into_chat_response(response: ConverseResponse, model: &str) -> ChatResponse {
        let content = response
            .output
            .message
            .map(|m| {
                m.content
                    .into_iter()
                    .filter_map(|block| block.text)
                    .collect::<String>()
            })
            .unwrap_or_default();

        ChatResponse {
            content,
            model: model.to_owned(),
            usage: response.usage.map(|u| TokenUsage {
                prompt_tokens: u.input_tokens,
                completion_tokens: u.output_tokens,
                total_tokens: u.total_tokens,
            }),
            finish_reason: response.stop_reason,
        }
    }
}

#[async_trait]
impl LlmProvider for BedrockProvider {
    fn name(&self) -> &'static str {
        PROVIDER_NAME
    }

    async fn initialize(&mut self, config: ProviderConfig) -> Result<(), ProviderError> {
        let ProviderOptions::Bedrock(options) = config.options.clone() else {
            return Err(config.wrong_kind(PROVIDER_NAME));
        };
        config.require_credentials(PROVIDER_NAME)?;

        let session = Session {
            client: build_client(PROVIDER_NAME)?,
            config,
            options,
        };
        session.converse_url(&session.config.model)?;
        self.session = Some(session);
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

        let model = request.model.as_deref().unwrap_or(&session.config.model);
        debug!(
            model,
            region = session.region(),
            model_provider = ?session.options.model_provider,
            "Sending Bedrock converse request"
        );

        let http_request = session
            .client
            .post(session.converse_url(model)?)
            .bearer_auth(&session.config.api_key)
            .json(&Self::build_request(session, request));

        let response: ConverseResponse = send_json(PROVIDER_NAME, http_request).await?;
        Ok(Self::into_chat_response(response, model))
    }

    async fn close(&mut self) {
        self.session = None;
    }
}

impl Debug for BedrockProvider {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("BedrockProvider")
            .field("initialized", &self.session.is_some())
            .finish_non_exhaustive()
    }
}
