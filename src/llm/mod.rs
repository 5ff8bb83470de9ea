// ABOUTME: LLM provider abstraction layer for pluggable completion backends
// ABOUTME: Defines the provider contract, chat message types, and the per-request registry
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # LLM Provider Interface
//!
//! This module defines the contract that completion backends implement and
//! the registry that turns a stored [`LlmConfig`](crate::models::LlmConfig)
//! into a live, initialized provider.
//!
//! ## Key Concepts
//!
//! - **`LlmProvider`**: Async trait with `initialize`, `complete` and `close`
//! - **`ProviderConfig`**: Credentials plus a typed option struct per provider kind
//! - **`LlmProviderRegistry`**: Builds a fresh provider instance per resolution
//!
//! ## Example: Using a Provider
//!
//! ```rust,no_run
//! use smart_insights::llm::{ChatMessage, ChatRequest, LlmProvider};
//!
//! async fn example(provider: &dyn LlmProvider) {
//!     let request = ChatRequest::new(vec![
//!         ChatMessage::system("You are a PostgreSQL expert."),
//!         ChatMessage::user("Count the orders placed today"),
//!     ])
//!     .with_temperature(0.3);
//!     let response = provider.complete(&request).await;
//! }
//! ```

mod anthropic;
mod bedrock;
mod config;
mod gemini;
mod http;
mod openai;
mod registry;

pub use anthropic::AnthropicProvider;
pub use bedrock::BedrockProvider;
pub use config::{
    AnthropicOptions, BedrockOptions, GeminiOptions, OpenAiOptions, ProviderConfig,
    ProviderOptions,
};
pub use gemini::GeminiProvider;
pub use openai::OpenAiProvider;
pub use registry::{LlmProviderRegistry, ProviderFactory};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::ProviderError;

// ============================================================================
// Message Types
// ============================================================================

/// Role of a message in the conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// System instruction message
    System,
    /// User input message
    User,
    /// Assistant response message
    Assistant,
}

impl MessageRole {
    /// Convert to string representation for API calls
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// A single message in a chat conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Role of the message sender
    pub role: MessageRole,
    /// Content of the message
    pub content: String,
}

impl ChatMessage {
    /// Create a new chat message
    #[must_use]
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// Create a system message
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, content)
    }

    /// Create a user message
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    /// Create an assistant message
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// Configuration for a chat completion request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Conversation messages
    pub messages: Vec<ChatMessage>,
    /// Model override; the configured model is used when absent
    pub model: Option<String>,
    /// Temperature for response randomness (0.0 - 2.0)
    pub temperature: Option<f32>,
    /// Maximum tokens to generate
    pub max_tokens: Option<u32>,
}

impl ChatRequest {
    /// Create a new chat request with messages
    #[must_use]
    pub const fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            model: None,
            temperature: None,
            max_tokens: None,
        }
    }

    /// Set the model to use
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set the temperature
    #[must_use]
    pub const fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set the maximum tokens
    #[must_use]
    pub const fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// The system messages joined into one block, if any
    #[must_use]
    pub fn system_prompt(&self) -> Option<String> {
        let parts: Vec<&str> = self
            .messages
            .iter()
            .filter(|m| m.role == MessageRole::System)
            .map(|m| m.content.as_str())
            .collect();
        (!parts.is_empty()).then(|| parts.join("\n\n"))
    }

    /// Messages other than system messages, in order
    pub fn conversation(&self) -> impl Iterator<Item = &ChatMessage> {
        self.messages
            .iter()
            .filter(|m| m.role != MessageRole::System)
    }
}

/// Response from a chat completion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    /// Generated message content
    pub content: String,
    /// Model used for generation
    pub model: String,
    /// Token usage statistics
    pub usage: Option<TokenUsage>,
    /// Finish reason (stop, length, etc.)
    pub finish_reason: Option<String>,
}

/// Token usage statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Number of tokens in the prompt
    pub prompt_tokens: u32,
    /// Number of tokens in the completion
    pub completion_tokens: u32,
    /// Total tokens used
    pub total_tokens: u32,
}

// ============================================================================
// Provider Trait
// ============================================================================

/// LLM provider trait for chat completion
///
/// Instances are created fresh for every resolution and never shared between
/// orchestrations, so implementations may keep request-scoped state without
/// synchronization.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Unique provider identifier (e.g., "openai", "gemini")
    fn name(&self) -> &'static str;

    /// Validate credentials and build the API client
    ///
    /// # Errors
    ///
    /// Returns `ProviderError::Configuration` if the config belongs to another
    /// provider kind or carries an empty API key or model
    async fn initialize(&mut self, config: ProviderConfig) -> Result<(), ProviderError>;

    /// Perform a chat completion
    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, ProviderError>;

    /// Release client resources; the instance is unusable afterwards
    async fn close(&mut self);
}
