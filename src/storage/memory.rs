// ABOUTME: In-memory storage backend for configurations and assistant responses
// ABOUTME: Uses tokio RwLock guarded maps; contents are lost on restart
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{llm_config_label, llm_key, response_not_found, ConfigStore, ResponseStore};
use crate::errors::{AppError, AppResult};
use crate::models::{AssistantResponse, DatabaseConfig, LlmConfig};

#[derive(Default)]
struct ResponseTable {
    by_id: HashMap<Uuid, AssistantResponse>,
    // acceptance order, oldest first
    order: Vec<Uuid>,
}

/// Process-memory storage
#[derive(Default)]
pub struct MemoryStorage {
    database_configs: RwLock<BTreeMap<String, DatabaseConfig>>,
    llm_configs: RwLock<BTreeMap<(String, String), LlmConfig>>,
    responses: RwLock<ResponseTable>,
}

impl MemoryStorage {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConfigStore for MemoryStorage {
    async fn save_database_config(&self, config: &DatabaseConfig) -> AppResult<()> {
        let mut configs = self.database_configs.write().await;
        if configs.contains_key(&config.name) {
            return Err(AppError::already_exists(format!(
                "Database configuration '{}'",
                config.name
            )));
        }
        configs.insert(config.name.clone(), config.clone());
        Ok(())
    }

    async fn load_database_config(&self, name: &str) -> AppResult<Option<DatabaseConfig>> {
        Ok(self.database_configs.read().await.get(name).cloned())
    }

    async fn list_database_configs(&self) -> AppResult<Vec<DatabaseConfig>> {
        Ok(self.database_configs.read().await.values().cloned().collect())
    }

    async fn delete_database_config(&self, name: &str) -> AppResult<()> {
        self.database_configs
            .write()
            .await
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| AppError::not_found(format!("Database configuration '{name}'")))
    }

    async fn save_llm_config(&self, config: &LlmConfig) -> AppResult<()> {
        let key = llm_key(config.provider.as_str(), &config.name);
        let mut configs = self.llm_configs.write().await;
        if configs.contains_key(&key) {
            return Err(AppError::already_exists(llm_config_label(
                config.provider.as_str(),
                &config.name,
            )));
        }
        configs.insert(key, config.clone());
        Ok(())
    }

    async fn load_llm_config(&self, provider: &str, name: &str) -> AppResult<Option<LlmConfig>> {
        Ok(self
            .llm_configs
            .read()
            .await
            .get(&llm_key(provider, name))
            .cloned())
    }

    async fn list_llm_configs(&self) -> AppResult<Vec<LlmConfig>> {
        Ok(self.llm_configs.read().await.values().cloned().collect())
    }

    async fn delete_llm_config(&self, provider: &str, name: &str) -> AppResult<()> {
        self.llm_configs
            .write()
            .await
            .remove(&llm_key(provider, name))
            .map(|_| ())
            .ok_or_else(|| AppError::not_found(llm_config_label(provider, name)))
    }
}

#[async_trait]
impl ResponseStore for MemoryStorage {
    async fn insert_response(&self, response: &AssistantResponse) -> AppResult<()> {
        let mut table = self.responses.write().await;
        if table.by_id.contains_key(&response.uuid) {
            return Err(AppError::already_exists(format!(
                "Assistant response {}",
                response.uuid
            )));
        }
        table.order.push(response.uuid);
        table.by_id.insert(response.uuid, response.clone());
        Ok(())
    }

    async fn load_response(&self, id: Uuid) -> AppResult<Option<AssistantResponse>> {
        Ok(self.responses.read().await.by_id.get(&id).cloned())
    }

    async fn save_response(&self, response: &AssistantResponse) -> AppResult<()> {
        let mut table = self.responses.write().await;
        let slot = table
            .by_id
            .get_mut(&response.uuid)
            .ok_or_else(|| response_not_found(response.uuid))?;
        *slot = response.clone();
        Ok(())
    }

    async fn list_responses(&self) -> AppResult<Vec<AssistantResponse>> {
        let table = self.responses.read().await;
        Ok(table
            .order
            .iter()
            .rev()
            .filter_map(|id| table.by_id.get(id).cloned())
            .collect())
    }
}
