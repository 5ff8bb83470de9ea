// ABOUTME: Configuration route handlers for named database and LLM credential bundles
// ABOUTME: Create, list, fetch and delete configs, validating type-specific options on create
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Configuration management routes
//!
//! Database configurations are keyed by name. LLM configurations are keyed by
//! provider kind and name, so `/llm/openai/default` and `/llm/gemini/default`
//! are different entries.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::info;

use crate::errors::{AppError, ResolveError};
use crate::llm::ProviderOptions;
use crate::models::{DatabaseConfig, DatabaseType, LlmConfig};
use crate::server::ServerResources;
use crate::sources::postgres::connect_options;
use crate::storage::{llm_config_label, ConfigStore};

/// Configuration management routes
pub struct ConfigurationRoutes;

impl ConfigurationRoutes {
    /// Create all configuration management routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route(
                "/databases",
                get(Self::handle_list_databases).post(Self::handle_create_database),
            )
            .route(
                "/databases/:name",
                get(Self::handle_get_database).delete(Self::handle_delete_database),
            )
            .route(
                "/llm",
                get(Self::handle_list_llm).post(Self::handle_create_llm),
            )
            .route(
                "/llm/:provider/:name",
                get(Self::handle_get_llm).delete(Self::handle_delete_llm),
            )
            .with_state(resources)
    }

    fn configs(resources: &ServerResources) -> &dyn ConfigStore {
        resources.storage.configs.as_ref()
    }

    // ================================
    // Database configurations
    // ================================

    async fn handle_create_database(
        State(resources): State<Arc<ServerResources>>,
        payload: Result<Json<DatabaseConfig>, JsonRejection>,
    ) -> Result<Response, AppError> {
        let config = parse_payload(payload)?;
        config.validate()?;
        validate_database_options(&config)?;

        Self::configs(&resources).save_database_config(&config).await?;
        info!(name = %config.name, db_type = %config.db_type, "Database configuration created");
        Ok(created("Database configuration created successfully"))
    }

    async fn handle_list_databases(
        State(resources): State<Arc<ServerResources>>,
    ) -> Result<Json<Vec<DatabaseConfig>>, AppError> {
        Ok(Json(Self::configs(&resources).list_database_configs().await?))
    }

    async fn handle_get_database(
        State(resources): State<Arc<ServerResources>>,
        Path(name): Path<String>,
    ) -> Result<Json<DatabaseConfig>, AppError> {
        Self::configs(&resources)
            .load_database_config(&name)
            .await?
            .map(Json)
            .ok_or_else(|| AppError::not_found(format!("Database configuration '{name}'")))
    }

    async fn handle_delete_database(
        State(resources): State<Arc<ServerResources>>,
        Path(name): Path<String>,
    ) -> Result<Json<serde_json::Value>, AppError> {
        Self::configs(&resources).delete_database_config(&name).await?;
        info!(name = %name, "Database configuration deleted");
        Ok(Json(json!({"message": "Database configuration deleted successfully"})))
    }

    // ================================
    // LLM configurations
    // ================================

    async fn handle_create_llm(
        State(resources): State<Arc<ServerResources>>,
        payload: Result<Json<LlmConfig>, JsonRejection>,
    ) -> Result<Response, AppError> {
        let config = parse_payload(payload)?;
        config.validate()?;
        ProviderOptions::parse(config.provider, &config.options).map_err(|reason| {
            AppError::invalid_input(format!("Invalid type-specific options: {reason}"))
        })?;

        Self::configs(&resources).save_llm_config(&config).await?;
        info!(provider = %config.provider, name = %config.name, "LLM configuration created");
        Ok(created("LLM configuration created successfully"))
    }

    async fn handle_list_llm(
        State(resources): State<Arc<ServerResources>>,
    ) -> Result<Json<Vec<LlmConfig>>, AppError> {
        Ok(Json(Self::configs(&resources).list_llm_configs().await?))
    }

    async fn handle_get_llm(
        State(resources): State<Arc<ServerResources>>,
        Path((provider, name)): Path<(String, String)>,
    ) -> Result<Json<LlmConfig>, AppError> {
        Self::configs(&resources)
            .load_llm_config(&provider, &name)
            .await?
            .map(Json)
            .ok_or_else(|| AppError::not_found(llm_config_label(&provider, &name)))
    }

    async fn handle_delete_llm(
        State(resources): State<Arc<ServerResources>>,
        Path((provider, name)): Path<(String, String)>,
    ) -> Result<Json<serde_json::Value>, AppError> {
        Self::configs(&resources)
            .delete_llm_config(&provider, &name)
            .await?;
        info!(provider = %provider, name = %name, "LLM configuration deleted");
        Ok(Json(json!({"message": "LLM configuration deleted successfully"})))
    }
}

fn parse_payload<T: DeserializeOwned>(
    payload: Result<Json<T>, JsonRejection>,
) -> Result<T, AppError> {
    payload.map(|Json(value)| value).map_err(|rejection| {
        AppError::invalid_input(format!("Invalid request payload: {}", rejection.body_text()))
    })
}

fn created(message: &str) -> Response {
    (StatusCode::CREATED, Json(json!({ "message": message }))).into_response()
}

/// Reject `PostgreSQL` options the connector would refuse at resolution time
///
/// Other database types are stored as given; they fail when resolved.
fn validate_database_options(config: &DatabaseConfig) -> Result<(), AppError> {
    if config.db_type != DatabaseType::PostgreSql {
        return Ok(());
    }
    match connect_options(config) {
        Ok(_) => Ok(()),
        Err(ResolveError::InvalidConfig { reason, .. }) => Err(AppError::invalid_input(format!(
            "Invalid type-specific options: {reason}"
        ))),
        Err(other) => Err(other.into()),
    }
}
