// ABOUTME: Tests for the orchestration admission controller
// ABOUTME: Verifies the concurrency bound, release on drop and behavior after close
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use smart_insights::admission::AdmissionController;

#[tokio::test]
async fn test_acquire_waits_for_free_slot() {
    let controller = AdmissionController::new(1).unwrap();
    let held = controller.acquire().await.unwrap();

    let waiting = tokio::time::timeout(Duration::from_millis(50), controller.acquire()).await;
    assert!(waiting.is_err(), "second acquire must wait while the slot is held");

    drop(held);
    let _permit = tokio::time::timeout(Duration::from_secs(1), controller.acquire())
        .await
        .expect("slot should free after drop")
        .unwrap();
    assert_eq!(controller.in_flight(), 1);
}

#[tokio::test]
async fn test_concurrent_holders_never_exceed_limit() {
    let controller = AdmissionController::new(3).unwrap();
    let active = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let tasks: Vec<_> = (0..12)
        .map(|_| {
            let controller = controller.clone();
            let active = Arc::clone(&active);
            let peak = Arc::clone(&peak);
            tokio::spawn(async move {
                let _permit = controller.acquire().await.unwrap();
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                active.fetch_sub(1, Ordering::SeqCst);
            })
        })
        .collect();

    for task in tasks {
        task.await.unwrap();
    }

    assert!(peak.load(Ordering::SeqCst) <= 3);
    assert_eq!(controller.in_flight(), 0);
    assert_eq!(controller.available(), controller.limit());
}

#[tokio::test]
async fn test_panicking_holder_releases_slot() {
    let controller = AdmissionController::new(1).unwrap();
    let inner = controller.clone();

    let result = tokio::spawn(async move {
        let _permit = inner.acquire().await.unwrap();
        panic!("holder failed");
    })
    .await;
    assert!(result.is_err());

    assert_eq!(controller.in_flight(), 0);
    let _permit = controller.acquire().await.unwrap();
}

#[tokio::test]
async fn test_closed_controller_rejects_acquire() {
    let controller = AdmissionController::new(2).unwrap();
    controller.close();
    assert!(controller.acquire().await.is_err());
}
