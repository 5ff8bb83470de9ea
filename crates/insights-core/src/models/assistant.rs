// ABOUTME: Assistant request, response and progress update types
// ABOUTME: Defines the persisted AssistantResponse JSON shape polled by callers
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{AppError, AppResult};

/// LLM selection carried by an assistant request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssistantRequestOptions {
    /// Provider kind, e.g. `openai`
    pub llm_provider: String,
    /// Name of the stored LLM configuration
    pub llm_config: String,
}

/// A natural-language question about a registered data source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssistantRequest {
    /// Name of the stored database configuration to query
    pub db_configuration_name: String,
    /// The user's question
    pub question: String,
    /// LLM selection
    pub options: AssistantRequestOptions,
}

impl AssistantRequest {
    /// Check that every required field is present and non-blank
    ///
    /// The provider kind is only checked for presence here. An unknown kind is
    /// accepted and fails later, during orchestration.
    ///
    /// # Errors
    ///
    /// Returns a `MISSING_REQUIRED_FIELD` error naming the first blank field.
    pub fn validate(&self) -> AppResult<()> {
        let fields = [
            ("db_configuration_name", &self.db_configuration_name),
            ("question", &self.question),
            ("options.llm_provider", &self.options.llm_provider),
            ("options.llm_config", &self.options.llm_config),
        ];
        for (field, value) in fields {
            if value.trim().is_empty() {
                return Err(AppError::missing_field(field));
            }
        }
        Ok(())
    }
}

/// Lifecycle status of an assistant response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    /// Accepted, orchestration not finished
    InProgress,
    /// Orchestration produced a report
    Completed,
    /// Orchestration stopped on an error
    Failed,
}

impl ResponseStatus {
    /// Whether no further status change is permitted
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Wire representation
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for ResponseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResponseStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(AppError::invalid_input(format!(
                "unknown response status: {other}"
            ))),
        }
    }
}

/// Kind of a progress update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateKind {
    /// User-facing progress line
    StepOutput,
    /// Diagnostic detail
    DebugLog,
    /// Failure description
    Error,
    /// The final markdown report
    FinalResponse,
}

impl UpdateKind {
    /// Wire representation
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::StepOutput => "step_output",
            Self::DebugLog => "debug_log",
            Self::Error => "error",
            Self::FinalResponse => "final_response",
        }
    }
}

impl fmt::Display for UpdateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One immutable, timestamped entry in a response's history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Update {
    /// Update text
    pub text: String,
    /// When the update was appended
    pub timestamp: DateTime<Utc>,
    /// Update kind
    #[serde(rename = "type")]
    pub kind: UpdateKind,
}

impl Update {
    /// Create an update stamped with the current time
    #[must_use]
    pub fn now(kind: UpdateKind, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            timestamp: Utc::now(),
            kind,
        }
    }
}

/// Progressive status and result of one question
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssistantResponse {
    /// Identifier generated at acceptance
    pub uuid: Uuid,
    /// The question being answered
    pub question: String,
    /// False once the orchestration failed
    pub success: bool,
    /// Lifecycle status
    pub status: ResponseStatus,
    /// Append-ordered updates
    #[serde(default)]
    pub response: Vec<Update>,
}

impl AssistantResponse {
    /// Build a freshly accepted response with its initial progress line
    #[must_use]
    pub fn accepted(uuid: Uuid, question: impl Into<String>) -> Self {
        Self {
            uuid,
            question: question.into(),
            success: true,
            status: ResponseStatus::InProgress,
            response: vec![Update::now(
                UpdateKind::StepOutput,
                "Processing your request...",
            )],
        }
    }

    /// Updates of one kind, in append order
    pub fn updates_of(&self, kind: UpdateKind) -> impl Iterator<Item = &Update> {
        self.response.iter().filter(move |update| update.kind == kind)
    }

    /// The final report, if the orchestration completed
    #[must_use]
    pub fn final_response(&self) -> Option<&str> {
        self.updates_of(UpdateKind::FinalResponse)
            .next()
            .map(|update| update.text.as_str())
    }
}
