// ABOUTME: Resolution errors raised by the LLM provider and source registries
// ABOUTME: Distinguishes missing configs, unsupported kinds, bad shapes, init and connection failures
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::fmt;

use thiserror::Error;

use super::{AppError, ErrorCode};

/// Which configuration family a lookup targeted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKind {
    /// A named `DatabaseConfig`
    Database,
    /// A named `LlmConfig`
    Llm,
}

impl fmt::Display for ConfigKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Database => write!(f, "database"),
            Self::Llm => write!(f, "LLM"),
        }
    }
}

/// Failure to turn a configuration name into a live provider or connector
#[derive(Debug, Error)]
pub enum ResolveError {
    /// No configuration with that name exists in the store
    #[error("{kind} configuration '{name}' not found")]
    ConfigNotFound {
        /// Configuration family
        kind: ConfigKind,
        /// Requested name
        name: String,
    },
    /// No provider implementation exists for the requested kind
    #[error("unsupported LLM provider: {0}")]
    UnsupportedProvider(String),
    /// No connector implementation exists for the database type
    #[error("unsupported database type: {0}")]
    UnsupportedDatabase(String),
    /// The stored configuration does not fit the provider or connector
    #[error("invalid configuration '{name}': {reason}")]
    InvalidConfig {
        /// Configuration name
        name: String,
        /// What did not fit
        reason: String,
    },
    /// The provider refused the converted configuration
    #[error("failed to initialize {provider} provider: {reason}")]
    InitializationError {
        /// Provider name
        provider: String,
        /// Why initialization failed
        reason: String,
    },
    /// The source database could not be reached
    #[error("failed to connect to '{name}': {reason}")]
    ConnectionError {
        /// Database configuration name
        name: String,
        /// Driver error text
        reason: String,
    },
    /// The configuration store itself failed
    #[error("configuration store error: {0}")]
    Store(#[from] AppError),
}

impl From<ResolveError> for AppError {
    fn from(error: ResolveError) -> Self {
        match error {
            ResolveError::Store(inner) => inner,
            other => {
                let code = match &other {
                    ResolveError::ConfigNotFound { .. } => ErrorCode::ConfigMissing,
                    ResolveError::UnsupportedProvider(_)
                    | ResolveError::UnsupportedDatabase(_)
                    | ResolveError::InvalidConfig { .. }
                    | ResolveError::InitializationError { .. } => ErrorCode::ConfigInvalid,
                    ResolveError::ConnectionError { .. } => ErrorCode::ExternalServiceUnavailable,
                    ResolveError::Store(_) => ErrorCode::StorageError,
                };
                Self::new(code, other.to_string())
            }
        }
    }
}
