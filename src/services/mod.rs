// ABOUTME: Domain service layer for business logic extracted from route handlers
// ABOUTME: Provides the assistant service shared by the HTTP layer and tests
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Domain service layer
//!
//! Route handlers stay thin and delegate here, so the same rules apply
//! whether a question arrives over HTTP or from an embedding application.

/// Question intake, supervised background orchestration and polling
pub mod assistant;

pub use assistant::{AcceptedQuestion, AssistantService};
