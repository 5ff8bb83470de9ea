// ABOUTME: Tests for prompt rendering, tagged reply extraction and generated query screening
// ABOUTME: Covers placeholder substitution, tag edge cases and the forbidden keyword filter
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

use smart_insights::errors::ErrorCode;
use smart_insights::prompt::{
    extract_tagged, report_prompt, sql_generation_prompt, validate_query, MARKDOWN_TAG, SQL_TAG,
};

// ============================================================================
// Templates
// ============================================================================

#[test]
fn test_sql_prompt_embeds_schema_and_question() {
    let prompt = sql_generation_prompt("Table: products", "Which product sells best?");

    assert!(prompt.contains("Table: products"));
    assert!(prompt.contains("User Question: Which product sells best?"));
    assert!(prompt.contains("<sql>"));
    assert!(!prompt.contains("{schema}"));
    assert!(!prompt.contains("{question}"));
}

#[test]
fn test_report_prompt_embeds_results() {
    let rows = r#"[{"name":"widget","sum":120}]"#;
    let prompt = report_prompt("Top products?", rows);

    assert!(prompt.contains("User Question: Top products?"));
    assert!(prompt.contains(rows));
    assert!(prompt.contains("<markdown>"));
    assert!(!prompt.contains("{results}"));
}

#[test]
fn test_unknown_braces_are_left_alone() {
    let prompt = report_prompt("count {x}", "[]");
    assert!(prompt.contains("count {x}"));
}

// ============================================================================
// Tag extraction
// ============================================================================

#[test]
fn test_extract_trims_payload() {
    let raw = "Sure!\n<sql>\n  select 1\n</sql>\nanything else";
    assert_eq!(extract_tagged(SQL_TAG, raw), "select 1");
}

#[test]
fn test_extract_takes_first_pair() {
    let raw = "<markdown>first</markdown><markdown>second</markdown>";
    assert_eq!(extract_tagged(MARKDOWN_TAG, raw), "first");
}

#[test]
fn test_extract_missing_tags_yield_empty() {
    assert_eq!(extract_tagged(SQL_TAG, "no tags here"), "");
    assert_eq!(extract_tagged(SQL_TAG, "select 1"), "");
    assert_eq!(extract_tagged(SQL_TAG, "select 1</sql>"), "");
    assert_eq!(extract_tagged(SQL_TAG, "<markdown>select 1</markdown>"), "");
}

#[test]
fn test_extract_blank_payload_is_empty() {
    assert_eq!(extract_tagged(SQL_TAG, "<sql>   \n </sql>"), "");
}

// ============================================================================
// Query screening
// ============================================================================

#[test]
fn test_plain_select_passes() {
    validate_query("select name from products").unwrap();
    validate_query("  SELECT count(*) FROM orders  ").unwrap();
}

#[test]
fn test_forbidden_keywords_rejected() {
    for sql in [
        "drop table products",
        "select 1; delete from orders",
        "SELECT * FROM t; TRUNCATE t",
        "insert into t values (1)",
        "alter table t add column c int",
        "create table t (id int)",
    ] {
        let err = validate_query(sql).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidInput, "{sql}");
        assert!(err.message.contains("forbidden keyword"), "{sql}");
    }
}

#[test]
fn test_keyword_inside_identifier_rejected() {
    let err = validate_query("select updated_at from products").unwrap_err();
    assert!(err.message.contains("update"));
}

#[test]
fn test_table_name_containing_keyword_rejected() {
    let err = validate_query("select * from updates_log").unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidInput);
    assert!(err.message.contains("forbidden keyword: update"));
}

#[test]
fn test_keyword_in_literal_rejected() {
    assert!(validate_query("select 'please drop by' as greeting").is_err());
}

#[test]
fn test_non_select_rejected() {
    let err = validate_query("with t as (select 1) select * from t").unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidInput);
    assert!(err.message.contains("must start with SELECT"));
}
