// ABOUTME: End-to-end tests of the question-to-report pipeline with fake sources and scripted LLMs
// ABOUTME: Covers every failing step, query screening, admission bounds, shutdown and terminal write failures
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use std::time::Duration;

use common::{
    ask_request, markdown_reply, sql_reply, wait_for_terminal, FakeConnector, FakeSourceResolver,
    LlmScript, QueryBehavior, TestHarness, DB_NAME, TOP_PRODUCTS_REPORT, TOP_PRODUCTS_SQL,
};
use smart_insights::constants::orchestration::{
    INTERRUPTED_MESSAGE, REPORT_TEMPERATURE, SQL_TEMPERATURE,
};
use smart_insights::errors::ProviderError;
use smart_insights::llm::MessageRole;
use smart_insights::models::{AssistantResponse, ResponseStatus, UpdateKind};
use smart_insights::services::assistant::ABORTED_MESSAGE;

const QUESTION: &str = "What are the top 5 products by quantity sold?";

async fn ask_and_wait(harness: &TestHarness, db: &str) -> AssistantResponse {
    let accepted = harness.assistant().ask(ask_request(db, QUESTION)).await.unwrap();
    assert_eq!(accepted.response.status, ResponseStatus::InProgress);
    accepted.task.await.unwrap();
    wait_for_terminal(harness.assistant(), accepted.response.uuid).await
}

async fn wait_until_admitted(harness: &TestHarness) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while harness.assistant().admission().in_flight() == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("orchestration was never admitted");
}

fn error_texts(response: &AssistantResponse) -> Vec<&str> {
    response
        .updates_of(UpdateKind::Error)
        .map(|u| u.text.as_str())
        .collect()
}

fn assert_failed_with(response: &AssistantResponse, expected: &str) {
    assert_eq!(response.status, ResponseStatus::Failed);
    assert!(!response.success);
    assert!(response.final_response().is_none());
    let errors = error_texts(response);
    assert_eq!(errors.len(), 1, "exactly one error update: {errors:?}");
    assert_eq!(errors[0], expected);
}

// ============================================================================
// Happy path
// ============================================================================

#[tokio::test]
async fn test_question_completes_with_report() {
    let connector = FakeConnector::products();
    let harness = TestHarness::new(
        FakeSourceResolver::with(DB_NAME, connector.clone()),
        LlmScript::happy_path(1),
    )
    .await;

    let response = ask_and_wait(&harness, DB_NAME).await;

    assert_eq!(response.status, ResponseStatus::Completed);
    assert!(response.success);
    assert_eq!(response.question, QUESTION);
    assert_eq!(response.updates_of(UpdateKind::FinalResponse).count(), 1);
    assert_eq!(response.final_response(), Some(TOP_PRODUCTS_REPORT));
    assert!(error_texts(&response).is_empty());
    assert_eq!(connector.executed(), vec![TOP_PRODUCTS_SQL.to_owned()]);

    let steps: Vec<_> = response
        .updates_of(UpdateKind::StepOutput)
        .map(|u| u.text.as_str())
        .collect();
    assert_eq!(
        steps,
        vec![
            "Processing your request...",
            "Fetching database schema...",
            "Schema retrieval completed",
            "Generating SQL query... please wait",
            TOP_PRODUCTS_SQL,
            "Query executed successfully",
            "Generating report...",
        ]
    );

    let debug: Vec<_> = response
        .updates_of(UpdateKind::DebugLog)
        .map(|u| u.text.as_str())
        .collect();
    assert_eq!(debug, vec!["Processed tables: products, orders"]);

    let last = response.response.last().unwrap();
    assert_eq!(last.kind, UpdateKind::FinalResponse);
}

#[tokio::test]
async fn test_llm_calls_carry_prompts_and_temperatures() {
    let harness = TestHarness::new(
        FakeSourceResolver::with(DB_NAME, FakeConnector::products()),
        LlmScript::happy_path(1),
    )
    .await;

    ask_and_wait(&harness, DB_NAME).await;

    let requests = harness.script.requests();
    assert_eq!(requests.len(), 2);

    let sql_call = &requests[0];
    assert_eq!(sql_call.temperature, Some(SQL_TEMPERATURE));
    assert_eq!(sql_call.messages[0].role, MessageRole::System);
    let sql_prompt = &sql_call.messages[1].content;
    assert!(sql_prompt.contains("Table: products"));
    assert!(sql_prompt.contains(QUESTION));

    let report_call = &requests[1];
    assert_eq!(report_call.temperature, Some(REPORT_TEMPERATURE));
    let report_prompt = &report_call.messages[1].content;
    assert!(report_prompt.contains(r#""name":"product-0""#));
    assert!(report_prompt.contains(QUESTION));
}

#[tokio::test]
async fn test_provider_closed_after_run() {
    let harness = TestHarness::new(
        FakeSourceResolver::with(DB_NAME, FakeConnector::products()),
        LlmScript::new([Ok(String::new())]),
    )
    .await;

    ask_and_wait(&harness, DB_NAME).await;

    assert_eq!(harness.script.created(), 1);
    assert_eq!(harness.script.closed(), 1);
}

#[tokio::test]
async fn test_empty_result_set_still_reports() {
    let connector = FakeConnector::new(common::products_schema(), common::product_rows(0));
    let harness = TestHarness::new(
        FakeSourceResolver::with(DB_NAME, connector),
        LlmScript::new([
            Ok(sql_reply("select * from products where qty < 0")),
            Ok(markdown_reply("No rows matched.")),
        ]),
    )
    .await;

    let response = ask_and_wait(&harness, DB_NAME).await;

    assert_eq!(response.status, ResponseStatus::Completed);
    assert_eq!(response.final_response(), Some("No rows matched."));
    assert!(harness.script.requests()[1].messages[1].content.contains("[]"));
}

// ============================================================================
// Failing steps
// ============================================================================

#[tokio::test]
async fn test_unknown_database_fails() {
    let harness = TestHarness::new(FakeSourceResolver::default(), LlmScript::happy_path(1)).await;

    let response = ask_and_wait(&harness, "missing_db").await;

    assert_failed_with(
        &response,
        "Failed to connect to database: database configuration 'missing_db' not found",
    );
    assert_eq!(harness.script.created(), 0);
}

#[tokio::test]
async fn test_schema_failure_fails() {
    let connector = FakeConnector::products().with_schema_error("permission denied for schema");
    let harness = TestHarness::new(
        FakeSourceResolver::with(DB_NAME, connector),
        LlmScript::happy_path(1),
    )
    .await;

    let response = ask_and_wait(&harness, DB_NAME).await;

    assert_eq!(response.status, ResponseStatus::Failed);
    let errors = error_texts(&response);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].starts_with("Failed to fetch database schema: "));
    assert!(errors[0].contains("permission denied for schema"));
}

#[tokio::test]
async fn test_unknown_llm_config_fails() {
    let harness = TestHarness::new(
        FakeSourceResolver::with(DB_NAME, FakeConnector::products()),
        LlmScript::happy_path(1),
    )
    .await;
    let mut request = ask_request(DB_NAME, QUESTION);
    request.options.llm_config = "nope".to_owned();

    let accepted = harness.assistant().ask(request).await.unwrap();
    accepted.task.await.unwrap();
    let response = wait_for_terminal(harness.assistant(), accepted.response.uuid).await;

    assert_failed_with(
        &response,
        "Failed to load LLM provider: LLM configuration 'openai/nope' not found",
    );
    // schema was fetched before the provider lookup
    assert!(response
        .updates_of(UpdateKind::StepOutput)
        .any(|u| u.text == "Schema retrieval completed"));
}

#[tokio::test]
async fn test_reply_without_sql_tag_fails() {
    let connector = FakeConnector::products();
    let harness = TestHarness::new(
        FakeSourceResolver::with(DB_NAME, connector.clone()),
        LlmScript::new([Ok(String::new())]),
    )
    .await;

    let response = ask_and_wait(&harness, DB_NAME).await;

    assert_failed_with(
        &response,
        "Failed to generate SQL query: no SQL query found in LLM response",
    );
    assert!(connector.executed().is_empty());
}

#[tokio::test]
async fn test_provider_error_fails_sql_step() {
    let harness = TestHarness::new(
        FakeSourceResolver::with(DB_NAME, FakeConnector::products()),
        LlmScript::new([Err(ProviderError::RateLimited {
            provider: "openai".to_owned(),
            message: "slow down".to_owned(),
        })]),
    )
    .await;

    let response = ask_and_wait(&harness, DB_NAME).await;

    assert_failed_with(
        &response,
        "Failed to generate SQL query: openai rate limit exceeded: slow down",
    );
}

#[tokio::test]
async fn test_forbidden_query_never_executes() {
    let connector = FakeConnector::products();
    let harness = TestHarness::new(
        FakeSourceResolver::with(DB_NAME, connector.clone()),
        LlmScript::new([Ok(sql_reply("drop table products"))]),
    )
    .await;

    let response = ask_and_wait(&harness, DB_NAME).await;

    assert_eq!(response.status, ResponseStatus::Failed);
    let errors = error_texts(&response);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].starts_with("Generated SQL query failed validation: "));
    assert!(errors[0].contains("forbidden keyword: drop"));
    assert!(connector.executed().is_empty());
    // the rejected query is still visible to the caller
    assert!(response
        .updates_of(UpdateKind::StepOutput)
        .any(|u| u.text == "drop table products"));
    assert_eq!(harness.script.closed(), 1);
}

#[tokio::test]
async fn test_query_failure_fails() {
    let connector = FakeConnector::products()
        .with_query(QueryBehavior::Fail("relation \"products\" does not exist".to_owned()));
    let harness = TestHarness::new(
        FakeSourceResolver::with(DB_NAME, connector),
        LlmScript::happy_path(1),
    )
    .await;

    let response = ask_and_wait(&harness, DB_NAME).await;

    assert_eq!(response.status, ResponseStatus::Failed);
    let errors = error_texts(&response);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].starts_with("Failed to execute query: "));
    assert!(errors[0].contains("does not exist"));
    assert_eq!(harness.script.requests().len(), 1);
}

#[tokio::test]
async fn test_reply_without_markdown_tag_fails() {
    let harness = TestHarness::new(
        FakeSourceResolver::with(DB_NAME, FakeConnector::products()),
        LlmScript::new([Ok(sql_reply(TOP_PRODUCTS_SQL)), Ok("plain text".to_owned())]),
    )
    .await;

    let response = ask_and_wait(&harness, DB_NAME).await;

    assert_failed_with(
        &response,
        "Failed to generate final response: no markdown content found in LLM response",
    );
    assert_eq!(harness.script.closed(), 1);
}

#[tokio::test]
async fn test_panicking_run_is_recorded_as_aborted() {
    let connector = FakeConnector::products().with_query(QueryBehavior::Panic);
    let harness = TestHarness::with_limit(
        FakeSourceResolver::with(DB_NAME, connector),
        LlmScript::happy_path(2),
        1,
    )
    .await;

    let response = ask_and_wait(&harness, DB_NAME).await;
    assert_failed_with(&response, ABORTED_MESSAGE);

    // the admission slot was released
    assert_eq!(harness.assistant().admission().in_flight(), 0);
}

// ============================================================================
// Admission
// ============================================================================

#[tokio::test]
async fn test_concurrent_runs_respect_limit() {
    let connector = FakeConnector::products().with_delay(Duration::from_millis(40));
    let harness = TestHarness::with_limit(
        FakeSourceResolver::with(DB_NAME, connector.clone()),
        LlmScript::happy_path(6),
        2,
    )
    .await;

    let mut accepted = Vec::new();
    for _ in 0..6 {
        accepted.push(harness.assistant().ask(ask_request(DB_NAME, QUESTION)).await.unwrap());
    }

    for question in accepted {
        question.task.await.unwrap();
        let response = wait_for_terminal(harness.assistant(), question.response.uuid).await;
        assert_eq!(response.status, ResponseStatus::Completed);
    }

    assert!(connector.max_active() <= 2, "peak {}", connector.max_active());
    assert!(connector.max_active() >= 1);
    assert_eq!(harness.assistant().admission().in_flight(), 0);
}

#[tokio::test]
async fn test_run_continues_after_caller_drops_handle() {
    let harness = TestHarness::new(
        FakeSourceResolver::with(DB_NAME, FakeConnector::products()),
        LlmScript::happy_path(1),
    )
    .await;

    let accepted = harness.assistant().ask(ask_request(DB_NAME, QUESTION)).await.unwrap();
    let id = accepted.response.uuid;
    drop(accepted);

    let response = wait_for_terminal(harness.assistant(), id).await;
    assert_eq!(response.status, ResponseStatus::Completed);
}

#[tokio::test]
async fn test_shutdown_rejects_queued_runs() {
    let harness = TestHarness::new(
        FakeSourceResolver::with(DB_NAME, FakeConnector::products()),
        LlmScript::happy_path(1),
    )
    .await;
    harness.resources.shutdown().await;
    assert_eq!(harness.sources.closed(), 1);

    let response = ask_and_wait(&harness, DB_NAME).await;

    assert_eq!(response.status, ResponseStatus::Failed);
    let errors = error_texts(&response);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].starts_with("Orchestration not admitted: "));
}

#[tokio::test]
async fn test_shutdown_waits_for_running_orchestrations() {
    let harness = TestHarness::new(
        FakeSourceResolver::with(
            DB_NAME,
            FakeConnector::products().with_delay(Duration::from_millis(100)),
        ),
        LlmScript::happy_path(1),
    )
    .await;

    let accepted = harness.assistant().ask(ask_request(DB_NAME, QUESTION)).await.unwrap();
    wait_until_admitted(&harness).await;
    harness.resources.shutdown().await;

    assert_eq!(harness.assistant().active_runs(), 0);
    let response = harness.assistant().get(accepted.response.uuid).await.unwrap();
    assert_eq!(response.status, ResponseStatus::Completed);
    assert_eq!(response.final_response(), Some(TOP_PRODUCTS_REPORT));
}

#[tokio::test]
async fn test_shutdown_fails_runs_outliving_grace_period() {
    let harness = TestHarness::with_config(
        FakeSourceResolver::with(
            DB_NAME,
            FakeConnector::products().with_delay(Duration::from_millis(300)),
        ),
        LlmScript::happy_path(1),
        |config| config.orchestration.shutdown_grace_secs = 0,
    )
    .await;

    let accepted = harness.assistant().ask(ask_request(DB_NAME, QUESTION)).await.unwrap();
    wait_until_admitted(&harness).await;
    harness.resources.shutdown().await;

    let response = harness.assistant().get(accepted.response.uuid).await.unwrap();
    assert_failed_with(&response, INTERRUPTED_MESSAGE);

    // The run finishing later cannot reopen the response
    accepted.task.await.unwrap();
    let response = harness.assistant().get(accepted.response.uuid).await.unwrap();
    assert_failed_with(&response, INTERRUPTED_MESSAGE);
}

// ============================================================================
// Terminal writes
// ============================================================================

#[tokio::test]
async fn test_completion_write_retried_after_storage_error() {
    let harness = TestHarness::new(
        FakeSourceResolver::with(DB_NAME, FakeConnector::products()),
        LlmScript::happy_path(1),
    )
    .await;
    harness.responses.fail_completions(1);

    let response = ask_and_wait(&harness, DB_NAME).await;

    assert_eq!(response.status, ResponseStatus::Completed);
    assert!(response.success);
    assert_eq!(response.updates_of(UpdateKind::FinalResponse).count(), 1);
    assert!(error_texts(&response).is_empty());
}

#[tokio::test]
async fn test_unstorable_report_fails_run() {
    let harness = TestHarness::new(
        FakeSourceResolver::with(DB_NAME, FakeConnector::products()),
        LlmScript::happy_path(1),
    )
    .await;
    harness.responses.fail_completions(usize::MAX);

    let response = ask_and_wait(&harness, DB_NAME).await;

    assert_eq!(response.status, ResponseStatus::Failed);
    assert!(!response.success);
    assert!(response.final_response().is_none());
    let errors = error_texts(&response);
    assert_eq!(errors.len(), 1);
    assert!(
        errors[0].starts_with("Failed to store final response: "),
        "{}",
        errors[0]
    );
}
