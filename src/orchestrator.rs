// ABOUTME: Question-to-report pipeline: schema fetch, SQL generation, execution and report writing
// ABOUTME: Records every step in the response log and always leaves the response in a terminal status
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Orchestrator
//!
//! One run moves through
//! `Started → SchemaFetched → QueryGenerated → QueryExecuted → ReportGenerated → Completed`.
//! The first failing step ends the run in `Failed`; nothing is retried.
//!
//! Every step reports progress through the [`ResponseLog`] so pollers see the
//! run advance. [`Orchestrator::run`] writes the terminal status itself, and
//! [`Orchestrator::record_failure`] lets a supervisor do the same when the
//! run never returned.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::constants::orchestration::{
    REPORT_SYSTEM_PROMPT, REPORT_TEMPERATURE, SQL_SYSTEM_PROMPT, SQL_TEMPERATURE,
    TERMINAL_WRITE_ATTEMPTS, TERMINAL_WRITE_RETRY_MS,
};
use crate::errors::{AppError, AppResult, ErrorCode};
use crate::llm::{ChatMessage, ChatRequest, LlmProvider, LlmProviderRegistry};
use crate::models::{AssistantRequest, ResponseStatus, UpdateKind};
use crate::prompt::{
    extract_tagged, report_prompt, sql_generation_prompt, validate_query, MARKDOWN_TAG, SQL_TAG,
};
use crate::response_log::ResponseLog;
use crate::sources::{Connector, QueryResult, SourceResolver};

/// Pipeline position of one orchestration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchestrationState {
    /// Task launched, nothing fetched yet
    Started,
    /// Schema description available
    SchemaFetched,
    /// SQL extracted from the model reply
    QueryGenerated,
    /// Query rows collected
    QueryExecuted,
    /// Markdown report extracted
    ReportGenerated,
    /// Report stored, status `completed`
    Completed,
    /// Stopped on an error, status `failed`
    Failed,
}

impl OrchestrationState {
    /// Whether the run has ended
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Name used in logs
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::SchemaFetched => "schema_fetched",
            Self::QueryGenerated => "query_generated",
            Self::QueryExecuted => "query_executed",
            Self::ReportGenerated => "report_generated",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for OrchestrationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a run stopped: the state it was leaving, a step summary and the cause
#[derive(Debug)]
struct StepFailure {
    from: OrchestrationState,
    summary: &'static str,
    cause: String,
}

impl StepFailure {
    fn new(from: OrchestrationState, summary: &'static str, cause: impl fmt::Display) -> Self {
        Self {
            from,
            summary,
            cause: cause.to_string(),
        }
    }
}

impl fmt::Display for StepFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.summary, self.cause)
    }
}

/// Runs the question-to-report pipeline for accepted requests
pub struct Orchestrator {
    log: Arc<ResponseLog>,
    sources: Arc<dyn SourceResolver>,
    llm: Arc<LlmProviderRegistry>,
}

impl Orchestrator {
    /// Create an orchestrator over shared registries and the response log
    #[must_use]
    pub fn new(
        log: Arc<ResponseLog>,
        sources: Arc<dyn SourceResolver>,
        llm: Arc<LlmProviderRegistry>,
    ) -> Self {
        Self { log, sources, llm }
    }

    /// Drive one request to a terminal state and record it
    ///
    /// Returns `Completed` or `Failed`. Errors never escape: every failure is
    /// written to the response log as an `error` update.
    #[instrument(skip(self, request), fields(response_id = %id, source = %request.db_configuration_name))]
    pub async fn run(&self, id: Uuid, request: &AssistantRequest) -> OrchestrationState {
        let started = Instant::now();
        info!("Starting orchestration");

        let state = match self.execute(id, request).await {
            Ok(markdown) => match self
                .conclude(id, UpdateKind::FinalResponse, markdown, ResponseStatus::Completed, true)
                .await
            {
                Ok(()) => OrchestrationState::Completed,
                Err(e) => {
                    warn!(error = %e, "Final response could not be stored");
                    self.record_failure(id, &format!("Failed to store final response: {e}"))
                        .await;
                    OrchestrationState::Failed
                }
            },
            Err(failure) => {
                warn!(failed_after = %failure.from, error = %failure, "Orchestration failed");
                self.record_failure(id, &failure.to_string()).await;
                OrchestrationState::Failed
            }
        };

        info!(
            state = %state,
            elapsed_ms = started.elapsed().as_millis(),
            "Orchestration finished"
        );
        state
    }

    /// Append an `error` update and mark the response `failed`
    ///
    /// Used by [`run`](Self::run) and by supervisors whose run aborted.
    /// A response that is already terminal is left unchanged.
    pub async fn record_failure(&self, id: Uuid, message: &str) {
        match self
            .conclude(id, UpdateKind::Error, message.to_owned(), ResponseStatus::Failed, false)
            .await
        {
            Ok(()) => {}
            Err(e) if e.code == ErrorCode::ResourceLocked => {
                debug!(response_id = %id, "Response already terminal, failure not recorded");
            }
            Err(e) => {
                error!(response_id = %id, error = %e, "Failed to record orchestration failure");
            }
        }
    }

    async fn execute(&self, id: Uuid, request: &AssistantRequest) -> Result<String, StepFailure> {
        use OrchestrationState::{QueryExecuted, QueryGenerated, SchemaFetched, Started};

        let connector = self
            .sources
            .resolve(&request.db_configuration_name)
            .await
            .map_err(|e| StepFailure::new(Started, "Failed to connect to database", e))?;

        let schema = self
            .fetch_schema(id, connector.as_ref())
            .await
            .map_err(|e| StepFailure::new(Started, "Failed to fetch database schema", e))?;

        let options = &request.options;
        let mut provider = self
            .llm
            .resolve(&options.llm_provider, &options.llm_config)
            .await
            .map_err(|e| StepFailure::new(SchemaFetched, "Failed to load LLM provider", e))?;

        let outcome = async {
            let sql = self
                .generate_query(id, provider.as_ref(), &schema, &request.question)
                .await?;

            let result = self
                .run_query(id, connector.as_ref(), &sql)
                .await
                .map_err(|e| StepFailure::new(QueryGenerated, "Failed to execute query", e))?;

            self.generate_report(id, provider.as_ref(), &request.question, &result)
                .await
                .map_err(|e| StepFailure::new(QueryExecuted, "Failed to generate final response", e))
        }
        .await;

        provider.close().await;
        outcome
    }

    /// `Started → SchemaFetched`
    async fn fetch_schema(&self, id: Uuid, connector: &dyn Connector) -> AppResult<String> {
        self.note(id, UpdateKind::StepOutput, "Fetching database schema...")
            .await;
        let schema = connector.get_schema().await?;
        self.note(
            id,
            UpdateKind::DebugLog,
            format!("Processed tables: {}", schema.table_names().join(", ")),
        )
        .await;
        self.note(id, UpdateKind::StepOutput, "Schema retrieval completed")
            .await;
        Ok(schema.describe())
    }

    /// `SchemaFetched → QueryGenerated`
    async fn generate_query(
        &self,
        id: Uuid,
        provider: &dyn LlmProvider,
        schema: &str,
        question: &str,
    ) -> Result<String, StepFailure> {
        let failed = |cause: &dyn fmt::Display| {
            StepFailure::new(
                OrchestrationState::SchemaFetched,
                "Failed to generate SQL query",
                cause,
            )
        };

        self.note(
            id,
            UpdateKind::StepOutput,
            "Generating SQL query... please wait",
        )
        .await;

        let request = ChatRequest::new(vec![
            ChatMessage::system(SQL_SYSTEM_PROMPT),
            ChatMessage::user(sql_generation_prompt(schema, question)),
        ])
        .with_temperature(SQL_TEMPERATURE);
        let completion = provider.complete(&request).await.map_err(|e| failed(&e))?;

        let sql = extract_tagged(SQL_TAG, &completion.content);
        if sql.is_empty() {
            return Err(failed(&"no SQL query found in LLM response"));
        }
        self.note(id, UpdateKind::StepOutput, sql.as_str()).await;

        validate_query(&sql).map_err(|e| {
            StepFailure::new(
                OrchestrationState::SchemaFetched,
                "Generated SQL query failed validation",
                e,
            )
        })?;
        Ok(sql)
    }

    /// `QueryGenerated → QueryExecuted`
    async fn run_query(
        &self,
        id: Uuid,
        connector: &dyn Connector,
        sql: &str,
    ) -> AppResult<QueryResult> {
        let result = connector.execute_query(sql).await?;
        self.note(id, UpdateKind::StepOutput, "Query executed successfully")
            .await;
        Ok(result)
    }

    /// `QueryExecuted → ReportGenerated`
    async fn generate_report(
        &self,
        id: Uuid,
        provider: &dyn LlmProvider,
        question: &str,
        result: &QueryResult,
    ) -> Result<String, String> {
        let rows = result.rows_json().map_err(|e| e.to_string())?;
        self.note(id, UpdateKind::StepOutput, "Generating report...")
            .await;

        let request = ChatRequest::new(vec![
            ChatMessage::system(REPORT_SYSTEM_PROMPT),
            ChatMessage::user(report_prompt(question, &rows)),
        ])
        .with_temperature(REPORT_TEMPERATURE);
        let completion = provider
            .complete(&request)
            .await
            .map_err(|e| e.to_string())?;

        let markdown = extract_tagged(MARKDOWN_TAG, &completion.content);
        if markdown.is_empty() {
            return Err("no markdown content found in LLM response".to_owned());
        }
        Ok(markdown)
    }

    /// Append an update; a failed write is logged and the run continues
    async fn note(&self, id: Uuid, kind: UpdateKind, text: impl Into<String>) {
        if let Err(e) = self.log.append_update(id, kind, text).await {
            error!(response_id = %id, kind = %kind, error = %e, "Failed to append update");
        }
    }

    /// Store the closing update and terminal status, retrying storage errors
    async fn conclude(
        &self,
        id: Uuid,
        kind: UpdateKind,
        text: String,
        status: ResponseStatus,
        success: bool,
    ) -> AppResult<()> {
        let mut attempt = 1;
        loop {
            match self
                .log
                .conclude(id, kind, text.clone(), status, success)
                .await
            {
                Err(e) if attempt < TERMINAL_WRITE_ATTEMPTS && is_retryable(&e) => {
                    warn!(response_id = %id, attempt, error = %e, "Terminal status write failed, retrying");
                    attempt += 1;
                    tokio::time::sleep(Duration::from_millis(TERMINAL_WRITE_RETRY_MS)).await;
                }
                outcome => return outcome,
            }
        }
    }
}

/// Storage failures may clear up; a locked or missing response will not
fn is_retryable(error: &AppError) -> bool {
    !matches!(
        error.code,
        ErrorCode::ResourceLocked | ErrorCode::ResourceNotFound | ErrorCode::InvalidInput
    )
}
