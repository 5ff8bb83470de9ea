// ABOUTME: Health check route handlers for service monitoring and status endpoints
// ABOUTME: Provides the ping liveness probe and a health report with admission usage
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Health check routes for service monitoring

use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use serde_json::{json, Value};

use crate::constants::service;
use crate::server::ServerResources;

/// Health routes implementation
pub struct HealthRoutes;

impl HealthRoutes {
    /// Create all health check routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        async fn ping_handler() -> Json<Value> {
            Json(json!({ "status": "ok" }))
        }

        async fn health_handler(State(resources): State<Arc<ServerResources>>) -> Json<Value> {
            let admission = resources.assistant.admission();
            Json(json!({
                "status": "healthy",
                "service": service::NAME,
                "version": service::VERSION,
                "environment": resources.config.environment.to_string(),
                "orchestrations": {
                    "limit": admission.limit(),
                    "in_flight": admission.in_flight(),
                },
                "timestamp": chrono::Utc::now().to_rfc3339()
            }))
        }

        Router::new()
            .route("/ping", get(ping_handler))
            .route("/health", get(health_handler))
            .with_state(resources)
    }
}
