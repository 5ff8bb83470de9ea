// ABOUTME: Named database and LLM configuration bundles read by the registries
// ABOUTME: Generic stored shapes; provider- and driver-specific options are parsed at resolution time
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::{AppError, AppResult};

/// Database engines a configuration may declare
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DatabaseType {
    /// `PostgreSQL`
    #[serde(rename = "postgresql")]
    PostgreSql,
    /// `MySQL`
    #[serde(rename = "mysql")]
    MySql,
    /// `MongoDB`
    #[serde(rename = "mongodb")]
    MongoDb,
}

impl DatabaseType {
    /// Wire representation
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PostgreSql => "postgresql",
            Self::MySql => "mysql",
            Self::MongoDb => "mongodb",
        }
    }
}

impl fmt::Display for DatabaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DatabaseType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [Self::PostgreSql, Self::MySql, Self::MongoDb]
            .into_iter()
            .find(|db_type| db_type.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| AppError::invalid_input(format!("unknown database type: {s}")))
    }
}

/// Connection bundle for a data source, keyed by `name`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Unique configuration name
    pub name: String,
    /// Database engine
    #[serde(rename = "type")]
    pub db_type: DatabaseType,
    /// Host name or socket directory
    pub host: String,
    /// Port, stored as text
    pub port: String,
    /// Database name
    pub db_name: String,
    /// Login user
    pub username: String,
    /// Login password
    pub password: String,
    /// Engine-specific options
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub options: Map<String, Value>,
}

impl DatabaseConfig {
    /// Check that every required field is present and non-blank
    ///
    /// # Errors
    ///
    /// Returns a `MISSING_REQUIRED_FIELD` error naming the first blank field.
    pub fn validate(&self) -> AppResult<()> {
        require_fields(&[
            ("name", &self.name),
            ("host", &self.host),
            ("port", &self.port),
            ("db_name", &self.db_name),
            ("username", &self.username),
            ("password", &self.password),
        ])
    }
}

/// LLM provider kinds with a built-in implementation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LlmProviderKind {
    /// `OpenAI` chat completions (and compatible endpoints)
    #[serde(rename = "openai")]
    OpenAi,
    /// Anthropic messages API
    #[serde(rename = "anthropic")]
    Anthropic,
    /// Google Gemini `generateContent`
    #[serde(rename = "gemini")]
    Gemini,
    /// AWS Bedrock Converse API
    #[serde(rename = "bedrock")]
    Bedrock,
}

impl LlmProviderKind {
    /// Every kind, in listing order
    pub const ALL: [Self; 4] = [Self::OpenAi, Self::Anthropic, Self::Gemini, Self::Bedrock];

    /// Wire representation
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
            Self::Gemini => "gemini",
            Self::Bedrock => "bedrock",
        }
    }
}

impl fmt::Display for LlmProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LlmProviderKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| AppError::invalid_input(format!("unknown LLM provider: {s}")))
    }
}

/// Credential bundle for an LLM provider, keyed by `(type, name)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Configuration name, unique per provider kind
    pub name: String,
    /// Provider kind
    #[serde(rename = "type")]
    pub provider: LlmProviderKind,
    /// API key or token
    pub api_key: String,
    /// Model identifier
    pub model: String,
    /// Provider-specific options, interpreted only by the matching provider
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub options: Map<String, Value>,
}

impl LlmConfig {
    /// Check that every required field is present and non-blank
    ///
    /// # Errors
    ///
    /// Returns a `MISSING_REQUIRED_FIELD` error naming the first blank field.
    pub fn validate(&self) -> AppResult<()> {
        require_fields(&[
            ("name", &self.name),
            ("api_key", &self.api_key),
            ("model", &self.model),
        ])
    }
}

fn require_fields(fields: &[(&str, &String)]) -> AppResult<()> {
    fields
        .iter()
        .find(|(_, value)| value.trim().is_empty())
        .map_or(Ok(()), |(field, _)| Err(AppError::missing_field(field)))
}
