// ABOUTME: Route module organization for the Smart Insights HTTP endpoints
// ABOUTME: Groups assistant, configuration and health routes by domain
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Route module
//!
//! Each domain module contains route definitions and thin handlers that
//! delegate to the service layer or the configuration store.

/// Question intake and response polling
pub mod assistant;
/// Database and LLM configuration management
pub mod configuration;
/// Liveness and health endpoints
pub mod health;

pub use assistant::AssistantRoutes;
pub use configuration::ConfigurationRoutes;
pub use health::HealthRoutes;
