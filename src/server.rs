// ABOUTME: HTTP server assembly: shared resources, router construction and graceful shutdown
// ABOUTME: Wires storage, registries, response log and orchestrator into the axum application
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Server
//!
//! [`ServerResources`] is built once at startup and shared by every handler
//! through `Arc`. Registries are explicit objects held here rather than
//! process-wide singletons, so tests can assemble resources around fakes
//! with [`ServerResources::with_components`].

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::admission::AdmissionController;
use crate::config::ServerConfig;
use crate::constants::orchestration::INTERRUPTED_MESSAGE;
use crate::errors::AppResult;
use crate::llm::LlmProviderRegistry;
use crate::orchestrator::Orchestrator;
use crate::response_log::ResponseLog;
use crate::routes::{AssistantRoutes, ConfigurationRoutes, HealthRoutes};
use crate::services::AssistantService;
use crate::sources::{PostgresDriver, SourceRegistry, SourceResolver};
use crate::storage::{self, StorageHandles};

/// Long-lived state shared by all handlers
pub struct ServerResources {
    /// Loaded configuration
    pub config: Arc<ServerConfig>,
    /// Configuration and response stores
    pub storage: StorageHandles,
    /// Source connection pools
    pub sources: Arc<dyn SourceResolver>,
    /// LLM provider factories
    pub llm: Arc<LlmProviderRegistry>,
    /// Per-request progress log
    pub log: Arc<ResponseLog>,
    /// Question intake and polling
    pub assistant: AssistantService,
}

impl ServerResources {
    /// Open the configured storage and build the default registries
    ///
    /// Responses a previous process left `in_progress` are failed before any
    /// new question is accepted.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage backend cannot be opened, the
    /// admission limit is invalid or stored responses cannot be listed
    pub async fn new(config: ServerConfig) -> AppResult<Self> {
        let storage = storage::open(&config.storage).await?;
        let sources: Arc<dyn SourceResolver> = Arc::new(SourceRegistry::new(
            storage.configs.clone(),
            PostgresDriver::new(config.source_pool.clone()),
        ));
        let llm = Arc::new(LlmProviderRegistry::with_defaults(
            storage.configs.clone(),
            config.orchestration.default_max_tokens,
        ));
        let resources = Self::with_components(config, storage, sources, llm)?;

        let interrupted = resources.log.fail_unfinished(INTERRUPTED_MESSAGE).await?;
        if interrupted > 0 {
            warn!(interrupted, "Failed responses left in progress by a previous run");
        }
        Ok(resources)
    }

    /// Assemble resources around caller-supplied registries
    ///
    /// # Errors
    ///
    /// Returns an error if the admission limit is invalid
    pub fn with_components(
        config: ServerConfig,
        storage: StorageHandles,
        sources: Arc<dyn SourceResolver>,
        llm: Arc<LlmProviderRegistry>,
    ) -> AppResult<Self> {
        let admission = AdmissionController::new(config.orchestration.max_concurrent)?;
        let log = Arc::new(ResponseLog::new(storage.responses.clone()));
        let orchestrator = Arc::new(Orchestrator::new(
            Arc::clone(&log),
            Arc::clone(&sources),
            Arc::clone(&llm),
        ));
        let assistant = AssistantService::new(Arc::clone(&log), orchestrator, admission);

        Ok(Self {
            config: Arc::new(config),
            storage,
            sources,
            llm,
            log,
            assistant,
        })
    }

    /// Stop admitting, let admitted runs finish within the grace period, then
    /// fail whatever is still in progress and close every source pool
    pub async fn shutdown(&self) {
        self.assistant.admission().close();

        let grace = self.config.orchestration.shutdown_grace();
        if !self.assistant.drain(grace).await {
            warn!(
                active = self.assistant.active_runs(),
                grace_secs = grace.as_secs(),
                "Orchestrations still running after shutdown grace period"
            );
        }

        match self.log.fail_unfinished(INTERRUPTED_MESSAGE).await {
            Ok(0) => {}
            Ok(interrupted) => warn!(interrupted, "Failed responses interrupted by shutdown"),
            Err(e) => warn!(error = %e, "Could not sweep unfinished responses"),
        }

        self.sources.close_all().await;
        info!("Server resources released");
    }
}

/// Build the application router
pub fn build_router(resources: &Arc<ServerResources>) -> Router {
    Router::new()
        .merge(AssistantRoutes::routes(Arc::clone(resources)))
        .merge(ConfigurationRoutes::routes(Arc::clone(resources)))
        .merge(HealthRoutes::routes(Arc::clone(resources)))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Serve HTTP until SIGINT or SIGTERM, then release resources
///
/// # Errors
///
/// Returns an error if the address is invalid, the port cannot be bound, or
/// the server fails while running
pub async fn serve(resources: Arc<ServerResources>) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", resources.config.host, resources.config.http_port)
        .parse()
        .context("invalid server address/port")?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {addr}"))?;
    info!(%addr, "HTTP server listening");

    axum::serve(listener, build_router(&resources))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failure")?;

    resources.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    info!("Shutdown signal received");
}
