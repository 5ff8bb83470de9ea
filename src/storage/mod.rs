// ABOUTME: Storage abstraction for configurations and assistant responses
// ABOUTME: Defines ConfigStore and ResponseStore traits plus the backend factory
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Storage layer
//!
//! Two traits split the persisted state: [`ConfigStore`] holds named
//! database and LLM credential bundles, [`ResponseStore`] holds assistant
//! responses. Both backends implement both traits so a single handle can be
//! shared by the registries, the response log and the HTTP layer.

/// Process-memory backend
pub mod memory;
/// `SQLite` backend
#[cfg(feature = "sqlite")]
pub mod sqlite;

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::config::StorageUrl;
use crate::errors::{AppError, AppResult};
use crate::models::{AssistantResponse, DatabaseConfig, LlmConfig};

pub use memory::MemoryStorage;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStorage;

/// Named database and LLM configurations
#[async_trait]
pub trait ConfigStore: Send + Sync {
    // ================================
    // Database configurations
    // ================================

    /// Store a new database configuration
    ///
    /// # Errors
    ///
    /// Returns `RESOURCE_ALREADY_EXISTS` if the name is taken
    async fn save_database_config(&self, config: &DatabaseConfig) -> AppResult<()>;

    /// Load a database configuration by name
    async fn load_database_config(&self, name: &str) -> AppResult<Option<DatabaseConfig>>;

    /// All database configurations, ordered by name
    async fn list_database_configs(&self) -> AppResult<Vec<DatabaseConfig>>;

    /// Remove a database configuration
    ///
    /// # Errors
    ///
    /// Returns `RESOURCE_NOT_FOUND` if no configuration has that name
    async fn delete_database_config(&self, name: &str) -> AppResult<()>;

    // ================================
    // LLM configurations
    // ================================

    /// Store a new LLM configuration
    ///
    /// # Errors
    ///
    /// Returns `RESOURCE_ALREADY_EXISTS` if `(provider, name)` is taken
    async fn save_llm_config(&self, config: &LlmConfig) -> AppResult<()>;

    /// Load an LLM configuration by provider kind and name
    ///
    /// The provider is matched case-insensitively against the stored kind.
    async fn load_llm_config(&self, provider: &str, name: &str) -> AppResult<Option<LlmConfig>>;

    /// All LLM configurations, ordered by provider then name
    async fn list_llm_configs(&self) -> AppResult<Vec<LlmConfig>>;

    /// Remove an LLM configuration
    ///
    /// # Errors
    ///
    /// Returns `RESOURCE_NOT_FOUND` if no configuration matches
    async fn delete_llm_config(&self, provider: &str, name: &str) -> AppResult<()>;
}

/// Persisted assistant responses
#[async_trait]
pub trait ResponseStore: Send + Sync {
    /// Insert a freshly accepted response
    ///
    /// # Errors
    ///
    /// Returns `RESOURCE_ALREADY_EXISTS` if the uuid is already stored
    async fn insert_response(&self, response: &AssistantResponse) -> AppResult<()>;

    /// Load a response by id
    async fn load_response(&self, id: Uuid) -> AppResult<Option<AssistantResponse>>;

    /// Overwrite an existing response
    ///
    /// # Errors
    ///
    /// Returns `RESOURCE_NOT_FOUND` if the uuid is unknown
    async fn save_response(&self, response: &AssistantResponse) -> AppResult<()>;

    /// All responses, newest first
    async fn list_responses(&self) -> AppResult<Vec<AssistantResponse>>;
}

/// A backend implementing both stores
pub trait Storage: ConfigStore + ResponseStore {}

impl<T: ConfigStore + ResponseStore> Storage for T {}

/// Shared handles to the selected backend
#[derive(Clone)]
pub struct StorageHandles {
    /// Configuration store
    pub configs: Arc<dyn ConfigStore>,
    /// Response store
    pub responses: Arc<dyn ResponseStore>,
}

impl StorageHandles {
    /// Share one backend as both stores
    #[must_use]
    pub fn from_backend<S: Storage + 'static>(backend: Arc<S>) -> Self {
        Self {
            configs: backend.clone(),
            responses: backend,
        }
    }
}

/// Open the backend named by the storage URL
///
/// # Errors
///
/// Returns an error if the `SQLite` database cannot be opened or migrated,
/// or if `SQLite` storage was requested without the `sqlite` feature
pub async fn open(url: &StorageUrl) -> AppResult<StorageHandles> {
    match url {
        StorageUrl::Memory => Ok(StorageHandles::from_backend(Arc::new(MemoryStorage::new()))),
        #[cfg(feature = "sqlite")]
        StorageUrl::SqliteFile { .. } | StorageUrl::SqliteMemory => {
            let storage = SqliteStorage::open(url).await?;
            Ok(StorageHandles::from_backend(Arc::new(storage)))
        }
        #[cfg(not(feature = "sqlite"))]
        StorageUrl::SqliteFile { .. } | StorageUrl::SqliteMemory => Err(AppError::config(
            "SQLite storage requested but the sqlite feature is disabled",
        )),
    }
}

/// Normalized key for an LLM configuration lookup
pub(crate) fn llm_key(provider: &str, name: &str) -> (String, String) {
    (provider.trim().to_lowercase(), name.to_owned())
}

pub(crate) fn llm_config_label(provider: &str, name: &str) -> String {
    format!("LLM configuration '{provider}/{name}'")
}

pub(crate) fn response_not_found(id: Uuid) -> AppError {
    AppError::not_found(format!("Assistant response {id}"))
}
