// ABOUTME: Data model shared by the engine, storage backends and HTTP layer
// ABOUTME: Re-exports assistant request/response types and database/LLM configuration types
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Core data models

/// Assistant requests, responses and progress updates
pub mod assistant;
/// Named database and LLM configurations
pub mod config;

pub use assistant::{
    AssistantRequest, AssistantRequestOptions, AssistantResponse, ResponseStatus, Update,
    UpdateKind,
};
pub use config::{DatabaseConfig, DatabaseType, LlmConfig, LlmProviderKind};
