// ABOUTME: Assistant service: accepts questions, launches supervised orchestrations, serves snapshots
// ABOUTME: Gates concurrent runs through admission control and converts aborted runs into failures
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::admission::AdmissionController;
use crate::errors::AppResult;
use crate::models::{AssistantRequest, AssistantResponse};
use crate::orchestrator::Orchestrator;
use crate::response_log::ResponseLog;

/// Error text recorded when a run ends without returning
pub const ABORTED_MESSAGE: &str = "Orchestration aborted unexpectedly";

const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Counts one live supervisor; the count drops even if the task is cancelled
struct SupervisorGuard(Arc<AtomicUsize>);

impl SupervisorGuard {
    fn enter(active: &Arc<AtomicUsize>) -> Self {
        active.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(active))
    }
}

impl Drop for SupervisorGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// A question accepted for background processing
#[derive(Debug)]
pub struct AcceptedQuestion {
    /// Snapshot taken at acceptance, status `in_progress`
    pub response: AssistantResponse,
    /// Supervising task; dropping it detaches the run
    pub task: JoinHandle<()>,
}

/// Entry point for asking questions and polling their progress
#[derive(Clone)]
pub struct AssistantService {
    log: Arc<ResponseLog>,
    orchestrator: Arc<Orchestrator>,
    admission: AdmissionController,
    active: Arc<AtomicUsize>,
}

impl AssistantService {
    /// Create the service
    #[must_use]
    pub fn new(
        log: Arc<ResponseLog>,
        orchestrator: Arc<Orchestrator>,
        admission: AdmissionController,
    ) -> Self {
        Self {
            log,
            orchestrator,
            admission,
            active: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Validate and store a question, then start answering it in the background
    ///
    /// The run is not tied to the caller: dropping the returned task handle
    /// or the HTTP connection does not stop it.
    ///
    /// # Errors
    ///
    /// Returns `MISSING_REQUIRED_FIELD` for a blank field, or a storage error
    /// if the response cannot be created
    pub async fn ask(&self, request: AssistantRequest) -> AppResult<AcceptedQuestion> {
        request.validate()?;
        let response = self.log.create(&request.question).await?;
        info!(
            response_id = %response.uuid,
            source = %request.db_configuration_name,
            provider = %request.options.llm_provider,
            "Question accepted"
        );
        let task = self.launch(response.uuid, request);
        Ok(AcceptedQuestion { response, task })
    }

    /// Current snapshot of one response
    ///
    /// # Errors
    ///
    /// Returns `RESOURCE_NOT_FOUND` for an unknown id
    pub async fn get(&self, id: Uuid) -> AppResult<AssistantResponse> {
        self.log.get(id).await
    }

    /// Every response, newest first
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read
    pub async fn histories(&self) -> AppResult<Vec<AssistantResponse>> {
        self.log.list_all().await
    }

    /// Admission limit and current usage
    #[must_use]
    pub const fn admission(&self) -> &AdmissionController {
        &self.admission
    }

    /// Supervisors still running, queued or admitted
    #[must_use]
    pub fn active_runs(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Wait until every supervisor has written its terminal status
    ///
    /// Returns `false` if runs were still active when `grace` elapsed.
    pub async fn drain(&self, grace: Duration) -> bool {
        let drained = async {
            while self.active_runs() > 0 {
                tokio::time::sleep(DRAIN_POLL_INTERVAL).await;
            }
        };
        tokio::time::timeout(grace, drained).await.is_ok()
    }

    /// Supervise one run
    ///
    /// The supervisor holds the admission permit and runs the pipeline in a
    /// child task, so a panic inside the pipeline surfaces here as a
    /// `JoinError` and the permit is released when the supervisor returns.
    fn launch(&self, id: Uuid, request: AssistantRequest) -> JoinHandle<()> {
        let admission = self.admission.clone();
        let orchestrator = Arc::clone(&self.orchestrator);
        let guard = SupervisorGuard::enter(&self.active);

        tokio::spawn(async move {
            let _guard = guard;
            let _permit = match admission.acquire().await {
                Ok(permit) => permit,
                Err(e) => {
                    error!(response_id = %id, error = %e, "Orchestration not admitted");
                    orchestrator
                        .record_failure(id, &format!("Orchestration not admitted: {e}"))
                        .await;
                    return;
                }
            };
            debug!(response_id = %id, in_flight = admission.in_flight(), "Orchestration admitted");

            let child = {
                let orchestrator = Arc::clone(&orchestrator);
                tokio::spawn(async move { orchestrator.run(id, &request).await })
            };

            if let Err(join_error) = child.await {
                error!(response_id = %id, error = %join_error, "Orchestration task aborted");
                orchestrator.record_failure(id, ABORTED_MESSAGE).await;
            }
        })
    }
}
