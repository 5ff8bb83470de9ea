// ABOUTME: Source database connectors and the registry that pools their connections
// ABOUTME: Connector trait, introspected schema model, and ping-verified pool reuse per config name
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Data Sources
//!
//! A [`Connector`] introspects and queries one data source. Connectors are
//! cheap handles over a shared connection pool; the [`SourceRegistry`] owns
//! the pools, one per database configuration name, and hands out a fresh
//! connector per resolution.
//!
//! Pool creation is driver specific and sits behind [`SourceDriver`], so the
//! registry's reuse and liveness logic can be exercised with an in-memory
//! driver in tests.

/// `PostgreSQL` driver and connector
pub mod postgres;

use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::errors::{AppResult, ConfigKind, ResolveError};
use crate::models::DatabaseConfig;
use crate::storage::ConfigStore;

pub use postgres::PostgresDriver;

// ============================================================================
// Schema model
// ============================================================================

/// One column of a table or view
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnInfo {
    /// Column name
    pub name: String,
    /// Declared SQL type
    pub data_type: String,
    /// Whether NULL is allowed
    pub nullable: bool,
    /// Default expression, if any
    pub default: Option<String>,
    /// Maximum character length for character types
    pub char_max_length: Option<i32>,
    /// Column comment
    pub description: Option<String>,
}

/// A foreign key constraint, possibly spanning several columns
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForeignKeyInfo {
    /// Constraint name
    pub name: String,
    /// Referencing columns, in key order
    pub columns: Vec<String>,
    /// Referenced table
    pub ref_table: String,
    /// Referenced columns, aligned with `columns`
    pub ref_columns: Vec<String>,
    /// `ON UPDATE` rule
    pub on_update: String,
    /// `ON DELETE` rule
    pub on_delete: String,
}

/// A secondary index
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexInfo {
    /// Index name
    pub name: String,
    /// Indexed columns, in key order
    pub columns: Vec<String>,
    /// Whether the index enforces uniqueness
    pub unique: bool,
    /// Access method, e.g. `btree`
    pub index_type: String,
}

/// A base table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableInfo {
    /// Table name
    pub name: String,
    /// Columns in ordinal order
    pub columns: Vec<ColumnInfo>,
    /// Primary key columns
    pub primary_key: Vec<String>,
    /// Outgoing foreign keys
    pub foreign_keys: Vec<ForeignKeyInfo>,
    /// Non-primary indexes
    pub indexes: Vec<IndexInfo>,
}

impl TableInfo {
    /// A table with columns only
    #[must_use]
    pub fn new(name: impl Into<String>, columns: Vec<ColumnInfo>) -> Self {
        Self {
            name: name.into(),
            columns,
            primary_key: Vec::new(),
            foreign_keys: Vec::new(),
            indexes: Vec::new(),
        }
    }
}

/// A view
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ViewInfo {
    /// View name
    pub name: String,
    /// Columns in ordinal order
    pub columns: Vec<ColumnInfo>,
    /// View definition SQL
    pub definition: Option<String>,
    /// View comment
    pub description: Option<String>,
}

/// Introspected structure of a data source
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DatabaseSchema {
    /// Base tables, ordered by name
    pub tables: Vec<TableInfo>,
    /// Views, ordered by name
    pub views: Vec<ViewInfo>,
}

impl DatabaseSchema {
    /// Names of every table, in schema order
    #[must_use]
    pub fn table_names(&self) -> Vec<&str> {
        self.tables.iter().map(|t| t.name.as_str()).collect()
    }

    /// Render the schema as the text block embedded in the SQL generation prompt
    #[must_use]
    pub fn describe(&self) -> String {
        let mut out = String::from("Database Schema:\n\n");
        for table in &self.tables {
            let _ = writeln!(out, "Table: {}", table.name);
            out.push_str("Columns:\n");
            for column in &table.columns {
                let _ = writeln!(out, "  - {}", describe_column(column));
            }
            if !table.primary_key.is_empty() {
                let _ = writeln!(out, "Primary key: ({})", table.primary_key.join(", "));
            }
            if !table.foreign_keys.is_empty() {
                out.push_str("Foreign keys:\n");
                for fk in &table.foreign_keys {
                    let _ = writeln!(
                        out,
                        "  - {}: ({}) references {}({}) on update {} on delete {}",
                        fk.name,
                        fk.columns.join(", "),
                        fk.ref_table,
                        fk.ref_columns.join(", "),
                        fk.on_update,
                        fk.on_delete
                    );
                }
            }
            if !table.indexes.is_empty() {
                out.push_str("Indexes:\n");
                for index in &table.indexes {
                    let unique = if index.unique { "unique " } else { "" };
                    let _ = writeln!(
                        out,
                        "  - {}: {unique}{} ({})",
                        index.name,
                        index.index_type,
                        index.columns.join(", ")
                    );
                }
            }
            out.push('\n');
        }

        for view in &self.views {
            let _ = writeln!(out, "View: {}", view.name);
            if let Some(description) = &view.description {
                let _ = writeln!(out, "Description: {description}");
            }
            out.push_str("Columns:\n");
            for column in &view.columns {
                let _ = writeln!(out, "  - {}", describe_column(column));
            }
            if let Some(definition) = &view.definition {
                let _ = writeln!(out, "Definition: {}", definition.trim());
            }
            out.push('\n');
        }
        out
    }
}

fn describe_column(column: &ColumnInfo) -> String {
    let mut line = format!("{} {}", column.name, column.data_type);
    if let Some(length) = column.char_max_length {
        let _ = write!(line, "({length})");
    }
    if !column.nullable {
        line.push_str(" NOT NULL");
    }
    if let Some(default) = &column.default {
        let _ = write!(line, " DEFAULT {default}");
    }
    if let Some(description) = &column.description {
        let _ = write!(line, " -- {description}");
    }
    line
}

/// Tabular query output: column names plus one JSON object per row
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueryResult {
    /// Column names in select order
    pub columns: Vec<String>,
    /// Rows keyed by column name
    pub rows: Vec<Map<String, Value>>,
}

impl QueryResult {
    /// Rows as a JSON array, the form embedded in the report prompt
    ///
    /// # Errors
    ///
    /// Returns an internal error if serialization fails
    pub fn rows_json(&self) -> AppResult<String> {
        serde_json::to_string(&self.rows).map_err(Into::into)
    }
}

// ============================================================================
// Connector and driver traits
// ============================================================================

/// Schema introspection and query execution against one data source
///
/// Connectors do not check that a query is read-only. Callers validate the
/// text before [`execute_query`](Self::execute_query).
#[async_trait]
pub trait Connector: Send + Sync {
    /// Introspect tables, views, keys and indexes
    async fn get_schema(&self) -> AppResult<DatabaseSchema>;

    /// Execute a query and collect every row
    async fn execute_query(&self, sql: &str) -> AppResult<QueryResult>;
}

/// Opens and checks pools for one database engine
#[async_trait]
pub trait SourceDriver: Send + Sync + 'static {
    /// Shared, internally synchronized pool handle
    type Pool: Clone + Send + Sync + 'static;

    /// Open a pool for the configuration and verify it with an initial ping
    async fn connect(&self, config: &DatabaseConfig) -> Result<Self::Pool, ResolveError>;

    /// Cheap liveness check
    async fn ping(&self, pool: &Self::Pool) -> bool;

    /// Connector over an existing pool
    fn connector(&self, pool: Self::Pool) -> Arc<dyn Connector>;

    /// Close every connection of the pool
    async fn close(&self, pool: Self::Pool);
}

/// Name-to-connector resolution, as consumed by the orchestrator
#[async_trait]
pub trait SourceResolver: Send + Sync {
    /// Resolve a database configuration name into a connector
    async fn resolve(&self, name: &str) -> Result<Arc<dyn Connector>, ResolveError>;

    /// Close every pooled connection
    async fn close_all(&self);
}

// ============================================================================
// Registry
// ============================================================================

/// Pools source connections per database configuration name
pub struct SourceRegistry<D: SourceDriver> {
    store: Arc<dyn ConfigStore>,
    driver: D,
    pools: Mutex<HashMap<String, D::Pool>>,
}

impl<D: SourceDriver> SourceRegistry<D> {
    /// Create a registry with no open pools
    #[must_use]
    pub fn new(store: Arc<dyn ConfigStore>, driver: D) -> Self {
        Self {
            store,
            driver,
            pools: Mutex::new(HashMap::new()),
        }
    }

    /// Number of pools currently held
    pub async fn pool_count(&self) -> usize {
        self.pools.lock().await.len()
    }
}

#[async_trait]
impl<D: SourceDriver> SourceResolver for SourceRegistry<D> {
    /// Reuse a live pool, replace a dead one, or open a new one
    ///
    /// The pool map stays locked for the whole resolution so two requests for
    /// the same name never open two pools.
    async fn resolve(&self, name: &str) -> Result<Arc<dyn Connector>, ResolveError> {
        let mut pools = self.pools.lock().await;

        if let Some(pool) = pools.get(name).cloned() {
            if self.driver.ping(&pool).await {
                debug!(source = name, "Reusing pooled source connection");
                return Ok(self.driver.connector(pool));
            }
            warn!(source = name, "Pooled source connection failed ping, reconnecting");
            pools.remove(name);
            self.driver.close(pool).await;
        }

        let config = self
            .store
            .load_database_config(name)
            .await?
            .ok_or_else(|| ResolveError::ConfigNotFound {
                kind: ConfigKind::Database,
                name: name.to_owned(),
            })?;

        let pool = self.driver.connect(&config).await?;
        info!(source = name, db_type = %config.db_type, "Opened source connection pool");
        pools.insert(name.to_owned(), pool.clone());
        Ok(self.driver.connector(pool))
    }

    async fn close_all(&self) {
        let drained: Vec<(String, D::Pool)> = self.pools.lock().await.drain().collect();
        for (name, pool) in drained {
            self.driver.close(pool).await;
            debug!(source = %name, "Closed source connection pool");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(name: &str, data_type: &str, nullable: bool) -> ColumnInfo {
        ColumnInfo {
            name: name.into(),
            data_type: data_type.into(),
            nullable,
            default: None,
            char_max_length: None,
            description: None,
        }
    }

    #[test]
    fn test_describe_renders_keys_and_views() {
        let mut orders = TableInfo::new(
            "orders",
            vec![
                column("id", "integer", false),
                ColumnInfo {
                    char_max_length: Some(64),
                    description: Some("buyer email".into()),
                    ..column("email", "character varying", true)
                },
                column("product_id", "integer", false),
            ],
        );
        orders.primary_key = vec!["id".into()];
        orders.foreign_keys = vec![ForeignKeyInfo {
            name: "orders_product_fk".into(),
            columns: vec!["product_id".into()],
            ref_table: "products".into(),
            ref_columns: vec!["id".into()],
            on_update: "NO ACTION".into(),
            on_delete: "CASCADE".into(),
        }];
        let schema = DatabaseSchema {
            tables: vec![orders],
            views: vec![ViewInfo {
                name: "daily_sales".into(),
                columns: vec![column("day", "date", true)],
                definition: Some(" SELECT 1;".into()),
                description: None,
            }],
        };

        let text = schema.describe();
        assert!(text.starts_with("Database Schema:\n\nTable: orders\n"));
        assert!(text.contains("  - id integer NOT NULL\n"));
        assert!(text.contains("  - email character varying(64) -- buyer email\n"));
        assert!(text.contains("Primary key: (id)"));
        assert!(text.contains("(product_id) references products(id)"));
        assert!(text.contains("View: daily_sales\n"));
        assert!(text.contains("Definition: SELECT 1;"));
        assert_eq!(schema.table_names(), vec!["orders"]);
    }

    #[test]
    fn test_rows_json_is_array_of_objects() {
        let mut row = Map::new();
        row.insert("name".into(), Value::from("widget"));
        row.insert("qty".into(), Value::from(3));
        let result = QueryResult {
            columns: vec!["name".into(), "qty".into()],
            rows: vec![row],
        };
        assert_eq!(result.rows_json().unwrap(), r#"[{"name":"widget","qty":3}]"#);
    }
}
