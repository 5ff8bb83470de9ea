// ABOUTME: Core types for the Smart Insights orchestration engine
// ABOUTME: Foundation crate with the error system and the assistant/config data model
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![deny(unsafe_code)]

//! # Insights Core
//!
//! Foundation crate shared by the engine, the storage backends and the HTTP
//! layer. It changes rarely, which keeps incremental builds of the main crate
//! cheap.
//!
//! ## Modules
//!
//! - **errors**: `AppError`, `ErrorCode`, provider and resolution errors
//! - **models**: assistant requests/responses, updates, database and LLM configs

/// Unified error handling with standard error codes and HTTP responses
pub mod errors;

/// Assistant and configuration data model
pub mod models;
