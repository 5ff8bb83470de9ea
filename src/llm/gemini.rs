// ABOUTME: Google Gemini LLM provider via the Generative Language generateContent API
// ABOUTME: Maps system messages to system_instruction and sampling settings to generation_config
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Gemini Provider
//!
//! Implementation of the `LlmProvider` trait for Google's Gemini models,
//! using API-key authentication against the public Generative Language API.

use std::fmt::{Debug, Formatter, Result as FmtResult};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::config::{GeminiOptions, ProviderConfig, ProviderOptions};
use super::http::{build_client, send_json};
use super::{ChatRequest, ChatResponse, LlmProvider, MessageRole, TokenUsage};
use crate::errors::ProviderError;

const PROVIDER_NAME: &str = "gemini";

/// Base URL for the Gemini API
const API_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

// ============================================================================
// API Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<ContentPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ContentPart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    max_output_tokens: u32,
    candidate_count: u32,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    candidates: Option<Vec<Candidate>>,
    #[serde(rename = "usageMetadata")]
    usage_metadata: Option<UsageMetadata>,
    #[serde(rename = "modelVersion")]
    model_version: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<GeminiContent>,
    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UsageMetadata {
    #[serde(rename = "promptTokenCount")]
    prompt: Option<u32>,
    #[serde(rename = "candidatesTokenCount")]
    candidates: Option<u32>,
    #[serde(rename = "totalTokenCount")]
    total: Option<u32>,
}

// ============================================================================
// Provider Implementation
// ============================================================================

struct Session {
    client: Client,
    config: ProviderConfig,
    options: GeminiOptions,
}

/// Google Gemini LLM provider
#[derive(Default)]
pub struct GeminiProvider {
    session: Option<Session>,
}

impl GeminiProvider {
    /// Create an uninitialized provider
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Gemini calls the assistant role "model"
    const fn convert_role(role: MessageRole) -> &'static str {
        match role {
            MessageRole::System | MessageRole::User => "user",
            MessageRole::Assistant => "model",
        }
    }

    fn text_content(role: Option<String>, text: String) -> GeminiContent {
        GeminiContent {
            role,
            parts: vec![ContentPart { text: Some(text) }],
        }
    }

    fn build_request(session: &Session, request: &ChatRequest) -> GeminiRequest {
        GeminiRequest {
            contents: request
                .conversation()
                .map(|m| {
                    Self::text_content(
                        Some(Self::convert_role(m.role).to_owned()),
                        m.content.clone(),
                    )
                })
                .collect(),
            system_instruction: request
                .system_prompt()
                .map(|text| Self::text_content(None, text)),
            generation_config: GenerationConfig {
                temperature: session.options.temperature.or(request.temperature),
                max_output_tokens: session.config.max_tokens_for(request.max_tokens),
                candidate_count: 1,
            },
        }
    }

    fn into_chat_response(response: GeminiResponse, model: &str) -> Result<ChatResponse, ProviderError> {
        let candidate = response
            .candidates
            .as_ref()
            .and_then(|c| c.first())
            .ok_or_else(|| ProviderError::InvalidResponse {
                provider: PROVIDER_NAME.to_owned(),
                message: "no candidates in Gemini response".to_owned(),
            })?;

        let content = candidate
            .content
            .as_ref()
            .map(|c| {
                c.parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect::<String>()
            })
            .unwrap_or_default();

        Ok(ChatResponse {
            content,
            model: response
                .model_version
                .clone()
                .unwrap_or_else(|| model.to_owned()),
            usage: response.usage_metadata.as_ref().map(|m| TokenUsage {
                prompt_tokens: m.prompt.unwrap_or(0),
                completion_tokens: m.candidates.unwrap_or(0),
                total_tokens: m.total.unwrap_or(0),
            }),
            finish_reason: candidate.finish_reason.clone(),
        })
    }
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    fn name(&self) -> &'static str {
        PROVIDER_NAME
    }

    async fn initialize(&mut self, config: ProviderConfig) -> Result<(), ProviderError> {
        let ProviderOptions::Gemini(options) = config.options.clone() else {
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

        let model = request.model.as_deref().unwrap_or(&session.config.model);
        let url = format!("{API_BASE_URL}/models/{model}:generateContent");
        debug!(model, location = ?session.options.location, "Sending request to Gemini API");

        let http_request = session
            .client
            .post(url)
            .query(&[("key", session.config.api_key.as_str())])
            .json(&Self::build_request(session, request));

        let response: GeminiResponse = send_json(PROVIDER_NAME, http_request).await?;
        Self::into_chat_response(response, model)
    }

    async fn close(&mut self) {
        self.session = None;
    }
}

impl Debug for GeminiProvider {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("GeminiProvider")
            .field("initialized", &self.session.is_some())
            // api key and client omitted
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ChatMessage;
    use serde_json::json;

    #[test]
    fn test_request_shape() {
        let options = GeminiOptions {
            temperature: Some(0.5),
            ..GeminiOptions::default()
        };
        let session = Session {
            client: Client::new(),
            config: ProviderConfig {
                name: "gemini".into(),
                api_key: "key".into(),
                model: "gemini-2.5-flash".into(),
                options: ProviderOptions::Gemini(options.clone()),
                default_max_tokens: 3000,
            },
            options,
        };
        let request = ChatRequest::new(vec![
            ChatMessage::system("You are a data analyst"),
            ChatMessage::user("explain"),
        ])
        .with_temperature(0.7);

        let body = serde_json::to_value(GeminiProvider::build_request(&session, &request)).unwrap();
        assert_eq!(body["system_instruction"]["parts"][0]["text"], "You are a data analyst");
        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(body["generation_config"]["max_output_tokens"], 3000);
        assert!((body["generation_config"]["temperature"].as_f64().unwrap() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_missing_candidates_is_invalid_response() {
        let response: GeminiResponse = serde_json::from_value(json!({})).unwrap();
        assert!(GeminiProvider::into_chat_response(response, "gemini-2.5-flash").is_err());
    }
}
