// ABOUTME: Typed provider configuration converted from stored LLM configurations
// ABOUTME: One option struct per provider kind; unknown or mistyped fields are rejected
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::fmt::{Debug, Formatter, Result as FmtResult};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::{ProviderError, ResolveError};
use crate::models::{LlmConfig, LlmProviderKind};

/// `OpenAI` options
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OpenAiOptions {
    /// Value for the `OpenAI-Organization` header
    #[serde(default)]
    pub organization: Option<String>,
    /// Default completion budget
    #[serde(default)]
    pub max_tokens: Option<u32>,
    /// Alternative base URL for `OpenAI`-compatible endpoints
    #[serde(default)]
    pub base_url: Option<String>,
}

/// Anthropic options
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AnthropicOptions {
    /// Default completion budget
    #[serde(default)]
    pub max_tokens_to_sample: Option<u32>,
    /// Pinned temperature; overrides the per-request value when set
    #[serde(default)]
    pub temperature: Option<f32>,
    /// Top-k sampling
    #[serde(default)]
    pub top_k: Option<u32>,
}

/// Gemini options
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GeminiOptions {
    /// Deployment location, informational for the public API
    #[serde(default)]
    pub location: Option<String>,
    /// Pinned temperature; overrides the per-request value when set
    #[serde(default)]
    pub temperature: Option<f32>,
    /// Default completion budget
    #[serde(default)]
    pub max_output_tokens: Option<u32>,
}

/// Bedrock options
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BedrockOptions {
    /// AWS region hosting the runtime endpoint
    #[serde(default)]
    pub region: Option<String>,
    /// Model vendor (anthropic, meta, amazon, ...)
    #[serde(default)]
    pub model_provider: Option<String>,
}

/// Provider specific options, one variant per provider kind
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderOptions {
    /// `OpenAI` or compatible
    OpenAi(OpenAiOptions),
    /// Anthropic
    Anthropic(AnthropicOptions),
    /// Google Gemini
    Gemini(GeminiOptions),
    /// AWS Bedrock
    Bedrock(BedrockOptions),
}

impl ProviderOptions {
    /// Parse the stored option object for a provider kind
    ///
    /// Zero numbers and empty strings count as unset, matching how option
    /// objects are normalized when configurations are saved.
    ///
    /// # Errors
    ///
    /// Returns the deserializer message on unknown fields or type mismatches
    pub fn parse(kind: LlmProviderKind, options: &Map<String, Value>) -> Result<Self, String> {
        Ok(match kind {
            LlmProviderKind::OpenAi => {
                let mut opts: OpenAiOptions = parse_object(options)?;
                opts.organization = non_empty(opts.organization);
                opts.base_url = non_empty(opts.base_url);
                opts.max_tokens = non_zero(opts.max_tokens);
                Self::OpenAi(opts)
            }
            LlmProviderKind::Anthropic => {
                let mut opts: AnthropicOptions = parse_object(options)?;
                opts.max_tokens_to_sample = non_zero(opts.max_tokens_to_sample);
                opts.top_k = non_zero(opts.top_k);
                Self::Anthropic(opts)
            }
            LlmProviderKind::Gemini => {
                let mut opts: GeminiOptions = parse_object(options)?;
                opts.location = non_empty(opts.location);
                opts.max_output_tokens = non_zero(opts.max_output_tokens);
                Self::Gemini(opts)
            }
            LlmProviderKind::Bedrock => {
                let mut opts: BedrockOptions = parse_object(options)?;
                opts.region = non_empty(opts.region);
                opts.model_provider = non_empty(opts.model_provider);
                Self::Bedrock(opts)
            }
        })
    }

    /// Provider kind these options belong to
    #[must_use]
    pub const fn kind(&self) -> LlmProviderKind {
        match self {
            Self::OpenAi(_) => LlmProviderKind::OpenAi,
            Self::Anthropic(_) => LlmProviderKind::Anthropic,
            Self::Gemini(_) => LlmProviderKind::Gemini,
            Self::Bedrock(_) => LlmProviderKind::Bedrock,
        }
    }

    /// Max tokens configured in the options, if any
    #[must_use]
    pub const fn max_tokens(&self) -> Option<u32> {
        match self {
            Self::OpenAi(opts) => opts.max_tokens,
            Self::Anthropic(opts) => opts.max_tokens_to_sample,
            Self::Gemini(opts) => opts.max_output_tokens,
            Self::Bedrock(_) => None,
        }
    }
}

/// Everything a provider needs to initialize
#[derive(Clone)]
pub struct ProviderConfig {
    /// Name of the stored configuration
    pub name: String,
    /// API key or token
    pub api_key: String,
    /// Model identifier
    pub model: String,
    /// Provider specific options
    pub options: ProviderOptions,
    /// Max tokens when neither the request nor the options set one
    pub default_max_tokens: u32,
}

impl ProviderConfig {
    /// Convert a stored configuration for the requested provider kind
    ///
    /// # Errors
    ///
    /// Returns `ResolveError::InvalidConfig` if the stored kind differs from
    /// `kind` or the options do not fit the provider
    pub fn from_llm_config(
        kind: LlmProviderKind,
        config: &LlmConfig,
        default_max_tokens: u32,
    ) -> Result<Self, ResolveError> {
        if config.provider != kind {
            return Err(ResolveError::InvalidConfig {
                name: config.name.clone(),
                reason: format!(
                    "configuration is for provider '{}', not '{kind}'",
                    config.provider
                ),
            });
        }

        let options =
            ProviderOptions::parse(kind, &config.options).map_err(|reason| {
                ResolveError::InvalidConfig {
                    name: config.name.clone(),
                    reason,
                }
            })?;

        Ok(Self {
            name: config.name.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            options,
            default_max_tokens,
        })
    }

    /// Completion budget for a request that may carry its own
    #[must_use]
    pub fn max_tokens_for(&self, requested: Option<u32>) -> u32 {
        requested
            .or_else(|| self.options.max_tokens())
            .unwrap_or(self.default_max_tokens)
    }

    /// Reject empty credentials
    ///
    /// # Errors
    ///
    /// Returns `ProviderError::Configuration` naming the missing field
    pub fn require_credentials(&self, provider: &str) -> Result<(), ProviderError> {
        let missing = if self.api_key.trim().is_empty() {
            Some("API key is required")
        } else if self.model.trim().is_empty() {
            Some("model is required")
        } else {
            None
        };
        missing.map_or(Ok(()), |reason| {
            Err(ProviderError::Configuration {
                provider: provider.to_owned(),
                reason: reason.to_owned(),
            })
        })
    }

    /// Error for a config handed to the wrong provider implementation
    #[must_use]
    pub fn wrong_kind(&self, provider: &str) -> ProviderError {
        ProviderError::Configuration {
            provider: provider.to_owned(),
            reason: format!(
                "received {} options for configuration '{}'",
                self.options.kind(),
                self.name
            ),
        }
    }
}

impl Debug for ProviderConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("ProviderConfig")
            .field("name", &self.name)
            .field("model", &self.model)
            .field("options", &self.options)
            .field("api_key", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

fn parse_object<T: DeserializeOwned>(options: &Map<String, Value>) -> Result<T, String> {
    serde_json::from_value(Value::Object(options.clone())).map_err(|e| e.to_string())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn non_zero(value: Option<u32>) -> Option<u32> {
    value.filter(|v| *v > 0)
}
