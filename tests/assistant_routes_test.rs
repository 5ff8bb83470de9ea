// ABOUTME: HTTP tests for question intake, response polling and history listing
// ABOUTME: Drives the full router in-process with fake sources and a scripted LLM
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;
mod helpers;

use axum::http::StatusCode;
use common::{
    ask_request, wait_for_terminal, FakeConnector, FakeSourceResolver, LlmScript, TestHarness,
    DB_NAME, TOP_PRODUCTS_REPORT,
};
use helpers::axum_test::AxumTestRequest;
use serde_json::{json, Value};
use smart_insights::models::{AssistantResponse, ResponseStatus};
use smart_insights::server::build_router;
use uuid::Uuid;

async fn harness() -> TestHarness {
    TestHarness::new(
        FakeSourceResolver::with(DB_NAME, FakeConnector::products()),
        LlmScript::happy_path(3),
    )
    .await
}

#[tokio::test]
async fn test_ask_returns_created_in_progress() {
    let harness = harness().await;
    let app = build_router(&harness.resources);

    let body: Value = AxumTestRequest::post("/assistant/ask")
        .json(&ask_request(DB_NAME, "Top products?"))
        .send(app)
        .await
        .assert_status(StatusCode::CREATED)
        .json();

    assert_eq!(body["status"], "in_progress");
    assert_eq!(body["success"], true);
    assert_eq!(body["question"], "Top products?");
    assert_eq!(body["response"][0]["type"], "step_output");
    assert_eq!(body["response"][0]["text"], "Processing your request...");
    assert!(Uuid::parse_str(body["uuid"].as_str().unwrap()).is_ok());
}

#[tokio::test]
async fn test_poll_reaches_completed() {
    let harness = harness().await;

    let created: AssistantResponse = AxumTestRequest::post("/assistant/ask")
        .json(&ask_request(DB_NAME, "Top products?"))
        .send(build_router(&harness.resources))
        .await
        .assert_status(StatusCode::CREATED)
        .json();
    wait_for_terminal(harness.assistant(), created.uuid).await;

    let polled: AssistantResponse = AxumTestRequest::get(&format!("/assistant/ask/{}", created.uuid))
        .send(build_router(&harness.resources))
        .await
        .assert_status(StatusCode::OK)
        .json();

    assert_eq!(polled.uuid, created.uuid);
    assert_eq!(polled.status, ResponseStatus::Completed);
    assert_eq!(polled.final_response(), Some(TOP_PRODUCTS_REPORT));
}

#[tokio::test]
async fn test_blank_question_rejected() {
    let harness = harness().await;

    let body: Value = AxumTestRequest::post("/assistant/ask")
        .json(&ask_request(DB_NAME, "   "))
        .send(build_router(&harness.resources))
        .await
        .assert_status(StatusCode::BAD_REQUEST)
        .json();

    assert_eq!(body["error"]["code"], "MISSING_REQUIRED_FIELD");
    assert_eq!(body["error"]["message"], "question is required");
    assert!(harness.assistant().histories().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_malformed_body_rejected() {
    let harness = harness().await;

    let missing_options: Value = AxumTestRequest::post("/assistant/ask")
        .json(&json!({ "db_configuration_name": DB_NAME, "question": "q" }))
        .send(build_router(&harness.resources))
        .await
        .assert_status(StatusCode::BAD_REQUEST)
        .json();
    assert_eq!(missing_options["error"]["code"], "INVALID_INPUT");

    let not_json: Value = AxumTestRequest::post("/assistant/ask")
        .raw_json("{not json")
        .send(build_router(&harness.resources))
        .await
        .assert_status(StatusCode::BAD_REQUEST)
        .json();
    assert!(not_json["error"]["message"]
        .as_str()
        .unwrap()
        .starts_with("Invalid request payload: "));
}

#[tokio::test]
async fn test_unknown_database_is_accepted_then_fails() {
    let harness = harness().await;

    let created: AssistantResponse = AxumTestRequest::post("/assistant/ask")
        .json(&ask_request("nowhere", "q"))
        .send(build_router(&harness.resources))
        .await
        .assert_status(StatusCode::CREATED)
        .json();

    let done = wait_for_terminal(harness.assistant(), created.uuid).await;
    assert_eq!(done.status, ResponseStatus::Failed);
    assert!(!done.success);
}

#[tokio::test]
async fn test_unknown_id_not_found() {
    let harness = harness().await;

    let body: Value = AxumTestRequest::get(&format!("/assistant/ask/{}", Uuid::new_v4()))
        .send(build_router(&harness.resources))
        .await
        .assert_status(StatusCode::NOT_FOUND)
        .json();
    assert_eq!(body["error"]["code"], "RESOURCE_NOT_FOUND");
}

#[tokio::test]
async fn test_malformed_id_rejected() {
    let harness = harness().await;

    let body: Value = AxumTestRequest::get("/assistant/ask/not-a-uuid")
        .send(build_router(&harness.resources))
        .await
        .assert_status(StatusCode::BAD_REQUEST)
        .json();
    assert_eq!(body["error"]["code"], "INVALID_FORMAT");
}

#[tokio::test]
async fn test_histories_newest_first() {
    let harness = harness().await;

    for question in ["first", "second"] {
        AxumTestRequest::post("/assistant/ask")
            .json(&ask_request(DB_NAME, question))
            .send(build_router(&harness.resources))
            .await
            .assert_status(StatusCode::CREATED);
    }

    let histories: Vec<AssistantResponse> = AxumTestRequest::get("/assistant/histories")
        .send(build_router(&harness.resources))
        .await
        .assert_status(StatusCode::OK)
        .json();

    let questions: Vec<_> = histories.iter().map(|r| r.question.as_str()).collect();
    assert_eq!(questions, vec!["second", "first"]);
}
