// ABOUTME: Re-exports the request, response and configuration models from insights-core
// ABOUTME: Keeps crate::models as the single import path inside the server crate
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Data models re-exports

pub use insights_core::models::*;
