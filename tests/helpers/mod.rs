// ABOUTME: Helper modules shared by HTTP route integration tests
// ABOUTME: Re-exports the in-process axum request driver
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

pub mod axum_test;
