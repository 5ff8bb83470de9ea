// ABOUTME: Re-exports the unified error types from insights-core
// ABOUTME: Lets server modules use crate::errors without naming the core crate
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Error handling re-exports
//!
//! The error taxonomy lives in `insights-core` so that the HTTP mapping and
//! the domain errors are shared by every crate in the workspace.

pub use insights_core::errors::*;
