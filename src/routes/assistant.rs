// ABOUTME: Assistant route handlers for asking questions and polling their progress
// ABOUTME: POST accepts and launches an orchestration, GET endpoints return response snapshots
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Assistant routes
//!
//! `POST /assistant/ask` answers `201 Created` as soon as the question is
//! stored. Callers then poll `GET /assistant/ask/{id}` until the status is
//! `completed` or `failed`.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use uuid::Uuid;

use crate::errors::{AppError, ErrorCode};
use crate::models::{AssistantRequest, AssistantResponse};
use crate::server::ServerResources;

/// Assistant routes
pub struct AssistantRoutes;

impl AssistantRoutes {
    /// Create all assistant routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/assistant/ask", post(Self::handle_ask))
            .route("/assistant/ask/:id", get(Self::handle_get_response))
            .route("/assistant/histories", get(Self::handle_histories))
            .with_state(resources)
    }

    async fn handle_ask(
        State(resources): State<Arc<ServerResources>>,
        payload: Result<Json<AssistantRequest>, JsonRejection>,
    ) -> Result<Response, AppError> {
        let Json(request) = payload.map_err(|rejection| {
            AppError::invalid_input(format!("Invalid request payload: {}", rejection.body_text()))
        })?;

        let accepted = resources.assistant.ask(request).await?;
        Ok((StatusCode::CREATED, Json(accepted.response)).into_response())
    }

    async fn handle_get_response(
        State(resources): State<Arc<ServerResources>>,
        Path(id): Path<String>,
    ) -> Result<Json<AssistantResponse>, AppError> {
        let id = Uuid::parse_str(&id).map_err(|e| {
            AppError::new(ErrorCode::InvalidFormat, format!("Invalid response id '{id}': {e}"))
        })?;
        Ok(Json(resources.assistant.get(id).await?))
    }

    async fn handle_histories(
        State(resources): State<Arc<ServerResources>>,
    ) -> Result<Json<Vec<AssistantResponse>>, AppError> {
        Ok(Json(resources.assistant.histories().await?))
    }
}
