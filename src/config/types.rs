// ABOUTME: Core configuration type definitions for environment, logging and storage settings
// ABOUTME: Contains LogLevel, Environment, and StorageUrl used across config modules
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::PathBuf;

use crate::errors::{AppError, AppResult};

/// Strongly typed log level configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Error level - only critical errors
    Error,
    /// Warning level - potential issues
    Warn,
    /// Info level - normal operational messages (default)
    #[default]
    Info,
    /// Debug level - detailed debugging information
    Debug,
    /// Trace level - very verbose tracing
    Trace,
}

impl LogLevel {
    /// Convert to `tracing::Level`
    #[must_use]
    pub const fn to_tracing_level(&self) -> tracing::Level {
        match self {
            Self::Error => tracing::Level::ERROR,
            Self::Warn => tracing::Level::WARN,
            Self::Info => tracing::Level::INFO,
            Self::Debug => tracing::Level::DEBUG,
            Self::Trace => tracing::Level::TRACE,
        }
    }

    /// Parse from string with fallback
    #[must_use]
    pub fn from_str_or_default(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "error" => Self::Error,
            "warn" => Self::Warn,
            "debug" => Self::Debug,
            "trace" => Self::Trace,
            _ => Self::Info,
        }
    }
}

impl Display for LogLevel {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warn => write!(f, "warn"),
            Self::Info => write!(f, "info"),
            Self::Debug => write!(f, "debug"),
            Self::Trace => write!(f, "trace"),
        }
    }
}

/// Deployment environment
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Development environment (default)
    #[default]
    Development,
    /// Production environment
    Production,
    /// Testing environment for automated tests
    Testing,
}

impl Environment {
    /// Parse from string with fallback
    #[must_use]
    pub fn from_str_or_default(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "testing" | "test" => Self::Testing,
            _ => Self::Development,
        }
    }

    /// Check if this is a production environment
    #[must_use]
    pub const fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

impl Display for Environment {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Development => write!(f, "development"),
            Self::Production => write!(f, "production"),
            Self::Testing => write!(f, "testing"),
        }
    }
}

/// Where configurations and assistant responses are kept
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum StorageUrl {
    /// Process memory, lost on restart
    #[default]
    Memory,
    /// `SQLite` database file
    SqliteFile {
        /// Path to the database file
        path: PathBuf,
    },
    /// In-memory `SQLite` (for testing the persistent backend)
    SqliteMemory,
}

impl StorageUrl {
    /// Parse from string with validation
    ///
    /// # Errors
    ///
    /// Returns an error if the URL names an unsupported backend
    pub fn parse_url(s: &str) -> AppResult<Self> {
        let s = s.trim();
        if s.is_empty() || s.eq_ignore_ascii_case("memory") {
            return Ok(Self::Memory);
        }
        match s.strip_prefix("sqlite:") {
            Some(":memory:") => Ok(Self::SqliteMemory),
            Some(path) if !path.is_empty() => Ok(Self::SqliteFile {
                path: PathBuf::from(path.trim_start_matches("//")),
            }),
            _ => Err(AppError::invalid_input(format!(
                "unsupported storage URL '{s}': expected 'memory' or 'sqlite:<path>'"
            ))),
        }
    }

    /// Convert to a `sqlx` connection string, `None` for process memory
    #[must_use]
    pub fn to_connection_string(&self) -> Option<String> {
        match self {
            Self::Memory => None,
            Self::SqliteFile { path } => Some(format!("sqlite:{}", path.display())),
            Self::SqliteMemory => Some("sqlite::memory:".to_owned()),
        }
    }
}

impl Display for StorageUrl {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self.to_connection_string() {
            Some(url) => write!(f, "{url}"),
            None => write!(f, "memory"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_url_parsing() {
        assert_eq!(StorageUrl::parse_url("memory").unwrap(), StorageUrl::Memory);
        assert_eq!(
            StorageUrl::parse_url("sqlite::memory:").unwrap(),
            StorageUrl::SqliteMemory
        );
        assert_eq!(
            StorageUrl::parse_url("sqlite:./data/insights.db").unwrap(),
            StorageUrl::SqliteFile {
                path: PathBuf::from("./data/insights.db")
            }
        );
        assert!(StorageUrl::parse_url("redis://localhost").is_err());
    }

    #[test]
    fn test_log_level_fallback() {
        assert_eq!(LogLevel::from_str_or_default("DEBUG"), LogLevel::Debug);
        assert_eq!(LogLevel::from_str_or_default("verbose"), LogLevel::Info);
    }
}
