// ABOUTME: Bounded concurrency gate for orchestrations backed by a counting semaphore
// ABOUTME: Permits are owned guards so every exit path, including task faults, releases the slot
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::errors::{AppError, AppResult};

/// Limits how many orchestrations run at once
///
/// Waiters are not served in any guaranteed order and there is no deadline:
/// an acquire simply waits until a slot frees.
#[derive(Clone)]
pub struct AdmissionController {
    semaphore: Arc<Semaphore>,
    limit: usize,
}

/// One admission slot, released on drop
#[must_use = "dropping the permit releases the slot immediately"]
pub struct AdmissionPermit {
    _permit: OwnedSemaphorePermit,
}

impl AdmissionController {
    /// Create a controller admitting at most `limit` orchestrations
    ///
    /// # Errors
    ///
    /// Returns an error if `limit` is zero or exceeds the semaphore maximum
    pub fn new(limit: usize) -> AppResult<Self> {
        if limit == 0 || limit > Semaphore::MAX_PERMITS {
            return Err(AppError::config(format!(
                "admission limit must be between 1 and {}, got {limit}",
                Semaphore::MAX_PERMITS
            )));
        }
        Ok(Self {
            semaphore: Arc::new(Semaphore::new(limit)),
            limit,
        })
    }

    /// Wait for a free slot
    ///
    /// # Errors
    ///
    /// Returns an error only if the controller has been closed
    pub async fn acquire(&self) -> AppResult<AdmissionPermit> {
        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| AppError::internal("admission controller is closed"))?;
        Ok(AdmissionPermit { _permit: permit })
    }

    /// Configured limit
    #[must_use]
    pub const fn limit(&self) -> usize {
        self.limit
    }

    /// Slots currently free
    #[must_use]
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Orchestrations currently admitted
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.limit.saturating_sub(self.available())
    }

    /// Stop admitting; pending and future acquires fail
    pub fn close(&self) {
        self.semaphore.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_permit_released_on_drop() {
        let controller = AdmissionController::new(2).unwrap();
        let first = controller.acquire().await.unwrap();
        let _second = controller.acquire().await.unwrap();
        assert_eq!(controller.in_flight(), 2);
        assert_eq!(controller.available(), 0);

        drop(first);
        assert_eq!(controller.in_flight(), 1);
    }

    #[test]
    fn test_zero_limit_rejected() {
        assert!(AdmissionController::new(0).is_err());
    }
}
