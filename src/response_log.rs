// ABOUTME: Append-only progress log for assistant responses, keyed by request id
// ABOUTME: Serializes load-modify-store mutations and enforces monotonic status transitions
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Response Log
//!
//! Every mutation loads the full response, changes it and stores it back while
//! holding one writer lock, so concurrent appends never interleave into a
//! corrupted update list. Reads go straight to the store.
//!
//! Status transitions are monotonic: `in_progress` may move to `completed` or
//! `failed`, after which the record is frozen and further appends or status
//! changes fail with `RESOURCE_LOCKED`.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::errors::{AppError, AppResult, ErrorCode};
use crate::models::{AssistantResponse, ResponseStatus, Update, UpdateKind};
use crate::storage::{response_not_found, ResponseStore};

/// Progressive per-request status and update store
pub struct ResponseLog {
    store: Arc<dyn ResponseStore>,
    write_lock: Mutex<()>,
}

impl ResponseLog {
    /// Wrap a response store
    #[must_use]
    pub fn new(store: Arc<dyn ResponseStore>) -> Self {
        Self {
            store,
            write_lock: Mutex::new(()),
        }
    }

    /// Accept a question: generate its id and store it `in_progress`
    ///
    /// # Errors
    ///
    /// Returns an error if the store rejects the insert
    pub async fn create(&self, question: &str) -> AppResult<AssistantResponse> {
        let response = AssistantResponse::accepted(Uuid::new_v4(), question);
        let _guard = self.write_lock.lock().await;
        self.store.insert_response(&response).await?;
        debug!(response_id = %response.uuid, "Assistant response created");
        Ok(response)
    }

    /// Append one update to a running response
    ///
    /// # Errors
    ///
    /// Returns `RESOURCE_NOT_FOUND` for an unknown id and `RESOURCE_LOCKED`
    /// once the response has reached a terminal status
    pub async fn append_update(
        &self,
        id: Uuid,
        kind: UpdateKind,
        text: impl Into<String>,
    ) -> AppResult<()> {
        let _guard = self.write_lock.lock().await;
        let mut response = self.load_existing(id).await?;
        if response.status.is_terminal() {
            return Err(AppError::locked(format!(
                "Assistant response {id} is {} and accepts no further updates",
                response.status
            )));
        }
        response.response.push(Update::now(kind, text));
        self.store.save_response(&response).await
    }

    /// Move a response to a new status
    ///
    /// Re-asserting `in_progress` on a running response is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `RESOURCE_NOT_FOUND` for an unknown id and `RESOURCE_LOCKED`
    /// if the response already has a terminal status
    pub async fn set_status(&self, id: Uuid, status: ResponseStatus, success: bool) -> AppResult<()> {
        let _guard = self.write_lock.lock().await;
        let mut response = self.load_existing(id).await?;
        if response.status.is_terminal() {
            return Err(AppError::locked(format!(
                "Assistant response {id} is already {}",
                response.status
            )));
        }
        if status == ResponseStatus::InProgress {
            return Ok(());
        }
        response.status = status;
        response.success = success;
        self.store.save_response(&response).await?;
        debug!(response_id = %id, status = %status, success, "Assistant response finalized");
        Ok(())
    }

    /// Append the closing update and set a terminal status in one write
    ///
    /// Either both changes are stored or neither is, so a stored
    /// `final_response` always comes with `completed`.
    ///
    /// # Errors
    ///
    /// Returns `RESOURCE_NOT_FOUND` for an unknown id, `RESOURCE_LOCKED` if the
    /// response is already terminal, `INVALID_INPUT` for a non-terminal status,
    /// or the store error if the write fails
    pub async fn conclude(
        &self,
        id: Uuid,
        kind: UpdateKind,
        text: impl Into<String>,
        status: ResponseStatus,
        success: bool,
    ) -> AppResult<()> {
        if !status.is_terminal() {
            return Err(AppError::invalid_input(format!(
                "cannot conclude assistant response {id} as {status}"
            )));
        }
        let _guard = self.write_lock.lock().await;
        let mut response = self.load_existing(id).await?;
        if response.status.is_terminal() {
            return Err(AppError::locked(format!(
                "Assistant response {id} is already {}",
                response.status
            )));
        }
        response.response.push(Update::now(kind, text));
        response.status = status;
        response.success = success;
        self.store.save_response(&response).await?;
        debug!(response_id = %id, status = %status, success, "Assistant response concluded");
        Ok(())
    }

    /// Fail every response still `in_progress`, recording `message` as its error
    ///
    /// Run at startup and at the end of shutdown so no response outlives the
    /// process that was answering it. Returns how many responses were failed.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be listed; individual write
    /// failures are logged and skipped
    pub async fn fail_unfinished(&self, message: &str) -> AppResult<usize> {
        let mut failed = 0;
        for response in self.store.list_responses().await? {
            if response.status.is_terminal() {
                continue;
            }
            match self
                .conclude(response.uuid, UpdateKind::Error, message, ResponseStatus::Failed, false)
                .await
            {
                Ok(()) => failed += 1,
                Err(e) if e.code == ErrorCode::ResourceLocked => {}
                Err(e) => {
                    warn!(response_id = %response.uuid, error = %e, "Failed to close unfinished response");
                }
            }
        }
        Ok(failed)
    }

    /// Current snapshot of a response
    ///
    /// # Errors
    ///
    /// Returns `RESOURCE_NOT_FOUND` for an unknown id
    pub async fn get(&self, id: Uuid) -> AppResult<AssistantResponse> {
        self.load_existing(id).await
    }

    /// Every stored response, newest first
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read
    pub async fn list_all(&self) -> AppResult<Vec<AssistantResponse>> {
        self.store.list_responses().await
    }

    async fn load_existing(&self, id: Uuid) -> AppResult<AssistantResponse> {
        self.store
            .load_response(id)
            .await?
            .ok_or_else(|| response_not_found(id))
    }
}
