// ABOUTME: Prompt templates for SQL and report generation plus reply parsing helpers
// ABOUTME: Renders compile-time markdown templates, extracts tagged payloads, and screens generated SQL
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Prompt Builder
//!
//! Templates are loaded at compile time from markdown files. Both ask the
//! model to wrap its answer in a single tag pair (`<sql>` or `<markdown>`),
//! which [`extract_tagged`] pulls back out.
//!
//! [`validate_query`] is a lexical filter, not a SQL parser. It rejects any
//! text containing a forbidden keyword as a substring, so a benign
//! identifier such as `updated_at` is rejected too, and a keyword hidden in a
//! comment or literal is judged the same way as real SQL.

use crate::errors::{AppError, AppResult};

/// Template for the SQL generation call
pub const SQL_GENERATION_TEMPLATE: &str = include_str!("sql_generation.md");

/// Template for the report generation call
pub const REPORT_TEMPLATE: &str = include_str!("report.md");

/// Tag wrapping the generated SQL
pub const SQL_TAG: &str = "sql";

/// Tag wrapping the generated report
pub const MARKDOWN_TAG: &str = "markdown";

/// Keywords that disqualify a generated query
pub const FORBIDDEN_KEYWORDS: [&str; 7] = [
    "drop", "truncate", "delete", "update", "insert", "alter", "create",
];

/// Render the SQL generation prompt for a schema description and question
#[must_use]
pub fn sql_generation_prompt(schema: &str, question: &str) -> String {
    render(
        SQL_GENERATION_TEMPLATE,
        &[("schema", schema), ("question", question)],
    )
}

/// Render the report prompt for a question and JSON-serialized query result
#[must_use]
pub fn report_prompt(question: &str, result_json: &str) -> String {
    render(
        REPORT_TEMPLATE,
        &[("question", question), ("results", result_json)],
    )
}

/// Return the trimmed text between the first `<tag>` and the next `</tag>`
///
/// Returns an empty string if either delimiter is missing. Callers treat an
/// empty result as a failed generation.
#[must_use]
pub fn extract_tagged(tag: &str, raw: &str) -> String {
    let open = format!("<{tag}>");
    let close = format!("</{tag}>");

    let Some(start) = raw.find(&open).map(|idx| idx + open.len()) else {
        return String::new();
    };
    raw[start..]
        .find(&close)
        .map(|len| raw[start..start + len].trim().to_owned())
        .unwrap_or_default()
}

/// Screen a generated query before execution
///
/// # Errors
///
/// Returns `INVALID_INPUT` if the lowercased query contains a forbidden
/// keyword anywhere, or does not start with `select`
pub fn validate_query(sql: &str) -> AppResult<()> {
    let normalized = sql.trim().to_lowercase();

    if let Some(keyword) = FORBIDDEN_KEYWORDS
        .iter()
        .find(|keyword| normalized.contains(*keyword))
    {
        return Err(AppError::invalid_input(format!(
            "query contains forbidden keyword: {keyword}"
        )));
    }

    if !normalized.starts_with("select") {
        return Err(AppError::invalid_input("query must start with SELECT"));
    }

    Ok(())
}

/// Substitute `{name}` placeholders in a single pass over the template
///
/// Values are never rescanned, so a question containing `{schema}` stays literal.
fn render(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(
        template.len() + values.iter().map(|(_, value)| value.len()).sum::<usize>(),
    );
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let candidate = &rest[open..];
        let substituted = values.iter().find_map(|(name, value)| {
            let placeholder_len = name.len() + 2;
            let matches = candidate.len() >= placeholder_len
                && candidate[1..].starts_with(name)
                && candidate[1 + name.len()..].starts_with('}');
            matches.then_some((placeholder_len, *value))
        });

        match substituted {
            Some((consumed, value)) => {
                out.push_str(value);
                rest = &candidate[consumed..];
            }
            None => {
                out.push('{');
                rest = &candidate[1..];
            }
        }
    }
    out.push_str(rest);
    out
}
