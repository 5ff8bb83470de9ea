// ABOUTME: SQLite storage backend for configurations and assistant responses
// ABOUTME: Creates its tables on open and keeps update lists as JSON text columns
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use uuid::Uuid;

use super::{llm_config_label, llm_key, response_not_found, ConfigStore, ResponseStore};
use crate::config::StorageUrl;
use crate::errors::{AppError, AppResult};
use crate::models::{AssistantResponse, DatabaseConfig, LlmConfig, ResponseStatus, Update};

/// `SQLite` backed storage
#[derive(Clone)]
pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    /// Open (creating if needed) the database named by the storage URL and run migrations
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is not a `SQLite` URL, the database cannot
    /// be opened, or migrations fail
    pub async fn open(url: &StorageUrl) -> AppResult<Self> {
        let pool = match url {
            StorageUrl::SqliteFile { .. } => {
                let base = url
                    .to_connection_string()
                    .ok_or_else(|| AppError::config("missing SQLite path"))?;
                // Ensure SQLite creates the database file if it doesn't exist
                SqlitePool::connect(&format!("{base}?mode=rwc")).await
            }
            // A single long-lived connection keeps the in-memory database alive
            StorageUrl::SqliteMemory => {
                SqlitePoolOptions::new()
                    .max_connections(1)
                    .min_connections(1)
                    .idle_timeout(None)
                    .max_lifetime(None)
                    .connect("sqlite::memory:")
                    .await
            }
            StorageUrl::Memory => {
                return Err(AppError::config(
                    "SqliteStorage cannot open a process-memory storage URL",
                ))
            }
        }
        .map_err(|e| AppError::storage(format!("failed to open {url}: {e}")))?;

        let storage = Self { pool };
        storage.migrate().await?;
        Ok(storage)
    }

    /// Create tables if they do not exist
    ///
    /// # Errors
    ///
    /// Returns an error if a DDL statement fails
    pub async fn migrate(&self) -> AppResult<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS database_configs (
                name TEXT PRIMARY KEY,
                db_type TEXT NOT NULL,
                host TEXT NOT NULL,
                port TEXT NOT NULL,
                db_name TEXT NOT NULL,
                username TEXT NOT NULL,
                password TEXT NOT NULL,
                options TEXT NOT NULL DEFAULT '{}',
                created_at TEXT NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS llm_configs (
                provider TEXT NOT NULL,
                name TEXT NOT NULL,
                api_key TEXT NOT NULL,
                model TEXT NOT NULL,
                options TEXT NOT NULL DEFAULT '{}',
                created_at TEXT NOT NULL,
                PRIMARY KEY (provider, name)
            )
            ",
        )
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS assistant_responses (
                uuid TEXT PRIMARY KEY,
                question TEXT NOT NULL,
                success INTEGER NOT NULL,
                status TEXT NOT NULL,
                response TEXT NOT NULL DEFAULT '[]',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_assistant_responses_created_at ON assistant_responses(created_at)",
        )
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;

        Ok(())
    }

    /// Close the pool
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn storage_error(e: sqlx::Error) -> AppError {
    AppError::storage(e.to_string()).with_source(e)
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.is_unique_violation())
}

fn options_to_text(options: &Map<String, Value>) -> AppResult<String> {
    Ok(serde_json::to_string(options)?)
}

fn options_from_text(text: &str) -> AppResult<Map<String, Value>> {
    Ok(serde_json::from_str(text)?)
}

fn row_to_database_config(row: &SqliteRow) -> AppResult<DatabaseConfig> {
    let db_type: String = row.try_get("db_type").map_err(storage_error)?;
    let options: String = row.try_get("options").map_err(storage_error)?;
    Ok(DatabaseConfig {
        name: row.try_get("name").map_err(storage_error)?,
        db_type: db_type.parse()?,
        host: row.try_get("host").map_err(storage_error)?,
        port: row.try_get("port").map_err(storage_error)?,
        db_name: row.try_get("db_name").map_err(storage_error)?,
        username: row.try_get("username").map_err(storage_error)?,
        password: row.try_get("password").map_err(storage_error)?,
        options: options_from_text(&options)?,
    })
}

fn row_to_llm_config(row: &SqliteRow) -> AppResult<LlmConfig> {
    let provider: String = row.try_get("provider").map_err(storage_error)?;
    let options: String = row.try_get("options").map_err(storage_error)?;
    Ok(LlmConfig {
        name: row.try_get("name").map_err(storage_error)?,
        provider: provider.parse()?,
        api_key: row.try_get("api_key").map_err(storage_error)?,
        model: row.try_get("model").map_err(storage_error)?,
        options: options_from_text(&options)?,
    })
}

fn row_to_response(row: &SqliteRow) -> AppResult<AssistantResponse> {
    let uuid: String = row.try_get("uuid").map_err(storage_error)?;
    let status: String = row.try_get("status").map_err(storage_error)?;
    let updates: String = row.try_get("response").map_err(storage_error)?;
    Ok(AssistantResponse {
        uuid: Uuid::parse_str(&uuid)
            .map_err(|e| AppError::storage(format!("corrupt response id '{uuid}': {e}")))?,
        question: row.try_get("question").map_err(storage_error)?,
        success: row.try_get("success").map_err(storage_error)?,
        status: status.parse::<ResponseStatus>()?,
        response: serde_json::from_str::<Vec<Update>>(&updates)?,
    })
}

#[async_trait]
impl ConfigStore for SqliteStorage {
    async fn save_database_config(&self, config: &DatabaseConfig) -> AppResult<()> {
        sqlx::query(
            r"
            INSERT INTO database_configs
                (name, db_type, host, port, db_name, username, password, options, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ",
        )
        .bind(&config.name)
        .bind(config.db_type.as_str())
        .bind(&config.host)
        .bind(&config.port)
        .bind(&config.db_name)
        .bind(&config.username)
        .bind(&config.password)
        .bind(options_to_text(&config.options)?)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::already_exists(format!("Database configuration '{}'", config.name))
            } else {
                storage_error(e)
            }
        })?;
        Ok(())
    }

    async fn load_database_config(&self, name: &str) -> AppResult<Option<DatabaseConfig>> {
        let row = sqlx::query("SELECT * FROM database_configs WHERE name = $1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_error)?;
        row.as_ref().map(row_to_database_config).transpose()
    }

    async fn list_database_configs(&self) -> AppResult<Vec<DatabaseConfig>> {
        let rows = sqlx::query("SELECT * FROM database_configs ORDER BY name")
            .fetch_all(&self.pool)
            .await
            .map_err(storage_error)?;
        rows.iter().map(row_to_database_config).collect()
    }

    async fn delete_database_config(&self, name: &str) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM database_configs WHERE name = $1")
            .bind(name)
            .execute(&self.pool)
            .await
            .map_err(storage_error)?;
        if result.rows_affected() == 0 {
            return Err(AppError::not_found(format!("Database configuration '{name}'")));
        }
        Ok(())
    }

    async fn save_llm_config(&self, config: &LlmConfig) -> AppResult<()> {
        sqlx::query(
            r"
            INSERT INTO llm_configs (provider, name, api_key, model, options, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ",
        )
        .bind(config.provider.as_str())
        .bind(&config.name)
        .bind(&config.api_key)
        .bind(&config.model)
        .bind(options_to_text(&config.options)?)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::already_exists(llm_config_label(config.provider.as_str(), &config.name))
            } else {
                storage_error(e)
            }
        })?;
        Ok(())
    }

    async fn load_llm_config(&self, provider: &str, name: &str) -> AppResult<Option<LlmConfig>> {
        let (provider, name) = llm_key(provider, name);
        let row = sqlx::query("SELECT * FROM llm_configs WHERE provider = $1 AND name = $2")
            .bind(provider)
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_error)?;
        row.as_ref().map(row_to_llm_config).transpose()
    }

    async fn list_llm_configs(&self) -> AppResult<Vec<LlmConfig>> {
        let rows = sqlx::query("SELECT * FROM llm_configs ORDER BY provider, name")
            .fetch_all(&self.pool)
            .await
            .map_err(storage_error)?;
        rows.iter().map(row_to_llm_config).collect()
    }

    async fn delete_llm_config(&self, provider: &str, name: &str) -> AppResult<()> {
        let (key_provider, key_name) = llm_key(provider, name);
        let result = sqlx::query("DELETE FROM llm_configs WHERE provider = $1 AND name = $2")
            .bind(key_provider)
            .bind(key_name)
            .execute(&self.pool)
            .await
            .map_err(storage_error)?;
        if result.rows_affected() == 0 {
            return Err(AppError::not_found(llm_config_label(provider, name)));
        }
        Ok(())
    }
}

#[async_trait]
impl ResponseStore for SqliteStorage {
    async fn insert_response(&self, response: &AssistantResponse) -> AppResult<()> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            r"
            INSERT INTO assistant_responses
                (uuid, question, success, status, response, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ",
        )
        .bind(response.uuid.to_string())
        .bind(&response.question)
        .bind(response.success)
        .bind(response.status.as_str())
        .bind(serde_json::to_string(&response.response)?)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::already_exists(format!("Assistant response {}", response.uuid))
            } else {
                storage_error(e)
            }
        })?;
        Ok(())
    }

    async fn load_response(&self, id: Uuid) -> AppResult<Option<AssistantResponse>> {
        let row = sqlx::query("SELECT * FROM assistant_responses WHERE uuid = $1")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_error)?;
        row.as_ref().map(row_to_response).transpose()
    }

    async fn save_response(&self, response: &AssistantResponse) -> AppResult<()> {
        let result = sqlx::query(
            r"
            UPDATE assistant_responses
            SET success = $1, status = $2, response = $3, updated_at = $4
            WHERE uuid = $5
            ",
        )
        .bind(response.success)
        .bind(response.status.as_str())
        .bind(serde_json::to_string(&response.response)?)
        .bind(Utc::now().to_rfc3339())
        .bind(response.uuid.to_string())
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;
        if result.rows_affected() == 0 {
            return Err(response_not_found(response.uuid));
        }
        Ok(())
    }

    async fn list_responses(&self) -> AppResult<Vec<AssistantResponse>> {
        let rows =
            sqlx::query("SELECT * FROM assistant_responses ORDER BY created_at DESC, rowid DESC")
                .fetch_all(&self.pool)
                .await
                .map_err(storage_error)?;
        rows.iter().map(row_to_response).collect()
    }
}
