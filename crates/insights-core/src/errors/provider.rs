// ABOUTME: Error type returned by LLM provider implementations
// ABOUTME: Carries a stable code, a message and a retryable flag, and converts into AppError
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Provider Errors
//!
//! Structured failures of a completion backend. The retryable flag is
//! informational: the engine never retries a failed call.

use thiserror::Error;

use super::{AppError, ErrorCode};

/// Errors produced by an LLM provider
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    /// The provider API answered with a non-success status
    #[error("{provider} API error ({status_code}): {message}")]
    ApiError {
        /// Provider name
        provider: String,
        /// HTTP status returned by the API
        status_code: u16,
        /// Message extracted from the error body
        message: String,
        /// Whether the same call could succeed later
        retryable: bool,
    },
    /// The provider throttled the request
    #[error("{provider} rate limit exceeded: {message}")]
    RateLimited {
        /// Provider name
        provider: String,
        /// Message extracted from the error body
        message: String,
    },
    /// Credentials were rejected
    #[error("{provider} authentication failed: {reason}")]
    AuthenticationFailed {
        /// Provider name
        provider: String,
        /// Reason reported by the API
        reason: String,
    },
    /// The request never produced an HTTP response
    #[error("{provider} network error: {message}")]
    Network {
        /// Provider name
        provider: String,
        /// Transport error text
        message: String,
    },
    /// The API answered but the body was unusable
    #[error("{provider} returned an invalid response: {message}")]
    InvalidResponse {
        /// Provider name
        provider: String,
        /// What was wrong with the body
        message: String,
    },
    /// The provider was given settings it cannot use
    #[error("{provider} configuration error: {reason}")]
    Configuration {
        /// Provider name
        provider: String,
        /// What was wrong with the settings
        reason: String,
    },
    /// `complete` was called before a successful `initialize`
    #[error("{provider} provider is not initialized")]
    NotInitialized {
        /// Provider name
        provider: String,
    },
}

impl ProviderError {
    /// Stable machine-readable code for this error
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::ApiError { .. } => "api_error",
            Self::RateLimited { .. } => "rate_limited",
            Self::AuthenticationFailed { .. } => "authentication_failed",
            Self::Network { .. } => "network_error",
            Self::InvalidResponse { .. } => "invalid_response",
            Self::Configuration { .. } => "configuration_error",
            Self::NotInitialized { .. } => "not_initialized",
        }
    }

    /// Whether the failed call could succeed if repeated later
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::ApiError { retryable, .. } => *retryable,
            Self::RateLimited { .. } | Self::Network { .. } => true,
            Self::AuthenticationFailed { .. }
            | Self::InvalidResponse { .. }
            | Self::Configuration { .. }
            | Self::NotInitialized { .. } => false,
        }
    }

    /// Human-readable message without the provider prefix
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::ApiError { message, .. }
            | Self::RateLimited { message, .. }
            | Self::Network { message, .. }
            | Self::InvalidResponse { message, .. } => message,
            Self::AuthenticationFailed { reason, .. } | Self::Configuration { reason, .. } => {
                reason
            }
            Self::NotInitialized { .. } => "provider is not initialized",
        }
    }
}

impl From<ProviderError> for AppError {
    fn from(error: ProviderError) -> Self {
        let code = match &error {
            ProviderError::ApiError { .. } | ProviderError::InvalidResponse { .. } => {
                ErrorCode::ExternalServiceError
            }
            ProviderError::RateLimited { .. } => ErrorCode::ExternalRateLimited,
            ProviderError::AuthenticationFailed { .. } => ErrorCode::ExternalAuthFailed,
            ProviderError::Network { .. } => ErrorCode::ExternalServiceUnavailable,
            ProviderError::Configuration { .. } => ErrorCode::ConfigInvalid,
            ProviderError::NotInitialized { .. } => ErrorCode::InternalError,
        };
        Self::new(code, error.to_string()).with_source(error)
    }
}
