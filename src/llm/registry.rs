// ABOUTME: Registry resolving stored LLM configurations into fresh, initialized providers
// ABOUTME: Holds one factory per provider kind and never shares instances between requests
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use super::{
    AnthropicProvider, BedrockProvider, GeminiProvider, LlmProvider, OpenAiProvider,
    ProviderConfig,
};
use crate::errors::{ConfigKind, ResolveError};
use crate::models::LlmProviderKind;
use crate::storage::ConfigStore;

/// Builds an uninitialized provider instance
pub type ProviderFactory = Arc<dyn Fn() -> Box<dyn LlmProvider> + Send + Sync>;

/// Registry for LLM providers
///
/// Constructed once at startup and shared by reference. Every call to
/// [`resolve`](Self::resolve) returns an independent instance.
pub struct LlmProviderRegistry {
    store: Arc<dyn ConfigStore>,
    factories: HashMap<LlmProviderKind, ProviderFactory>,
    default_max_tokens: u32,
}

impl LlmProviderRegistry {
    /// Create a registry with no provider kinds registered
    #[must_use]
    pub fn new(store: Arc<dyn ConfigStore>, default_max_tokens: u32) -> Self {
        Self {
            store,
            factories: HashMap::new(),
            default_max_tokens,
        }
    }

    /// Create a registry with the built-in `OpenAI`, Anthropic, Gemini and Bedrock providers
    #[must_use]
    pub fn with_defaults(store: Arc<dyn ConfigStore>, default_max_tokens: u32) -> Self {
        Self::new(store, default_max_tokens)
            .with_factory(LlmProviderKind::OpenAi, || Box::new(OpenAiProvider::new()))
            .with_factory(LlmProviderKind::Anthropic, || {
                Box::new(AnthropicProvider::new())
            })
            .with_factory(LlmProviderKind::Gemini, || Box::new(GeminiProvider::new()))
            .with_factory(LlmProviderKind::Bedrock, || Box::new(BedrockProvider::new()))
    }

    /// Register (or replace) the factory for a provider kind
    #[must_use]
    pub fn with_factory<F>(mut self, kind: LlmProviderKind, factory: F) -> Self
    where
        F: Fn() -> Box<dyn LlmProvider> + Send + Sync + 'static,
    {
        self.factories.insert(kind, Arc::new(factory));
        self
    }

    /// Provider kinds that can be resolved
    #[must_use]
    pub fn supported_kinds(&self) -> Vec<LlmProviderKind> {
        LlmProviderKind::ALL
            .into_iter()
            .filter(|kind| self.factories.contains_key(kind))
            .collect()
    }

    /// Resolve a provider kind and configuration name into a live provider
    ///
    /// # Errors
    ///
    /// - `ConfigNotFound` if no configuration matches `(provider, config_name)`
    /// - `UnsupportedProvider` if no factory is registered for the kind
    /// - `InvalidConfig` if the stored options do not fit the provider
    /// - `InitializationError` if the provider rejects the credentials
    /// - `Store` if the configuration store fails
    pub async fn resolve(
        &self,
        provider: &str,
        config_name: &str,
    ) -> Result<Box<dyn LlmProvider>, ResolveError> {
        let config = self
            .store
            .load_llm_config(provider, config_name)
            .await?
            .ok_or_else(|| ResolveError::ConfigNotFound {
                kind: ConfigKind::Llm,
                name: format!("{provider}/{config_name}"),
            })?;

        let kind = config.provider;
        let factory = self
            .factories
            .get(&kind)
            .ok_or_else(|| ResolveError::UnsupportedProvider(provider.to_owned()))?;
        let mut instance = factory();

        let provider_config =
            ProviderConfig::from_llm_config(kind, &config, self.default_max_tokens)?;

        instance.initialize(provider_config).await.map_err(|e| {
            warn!(provider = %kind, config = config_name, error = %e, "LLM provider initialization failed");
            ResolveError::InitializationError {
                provider: kind.to_string(),
                reason: e.message().to_owned(),
            }
        })?;

        debug!(provider = %kind, config = config_name, "LLM provider resolved");
        Ok(instance)
    }
}
