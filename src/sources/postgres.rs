// ABOUTME: PostgreSQL source driver: pooled connections, catalog introspection and dynamic row decoding
// ABOUTME: Builds connect options from stored configs and converts result columns to JSON by type
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::collections::BTreeMap;
use std::net::IpAddr;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde_json::{Map, Value};
use sqlx::postgres::types::{Oid, PgInterval, PgMoney};
use sqlx::postgres::{
    PgConnectOptions, PgPool, PgPoolOptions, PgRow, PgSslMode, PgTypeInfo, PgTypeKind,
    PgValueFormat,
};
use sqlx::{Column, Decode, Executor, Postgres, Row, Statement, Type, TypeInfo, ValueRef};
use tracing::{debug, instrument};
use uuid::Uuid;

use super::{
    ColumnInfo, Connector, DatabaseSchema, ForeignKeyInfo, IndexInfo, QueryResult, SourceDriver,
    TableInfo, ViewInfo,
};
use crate::config::SourcePoolConfig;
use crate::constants::source_pool::{DEFAULT_SCHEMA, DEFAULT_SSL_MODE};
use crate::errors::{AppError, AppResult, ResolveError};
use crate::models::{DatabaseConfig, DatabaseType};

/// Fractional digits of the `money` type under the default `lc_monetary`
const MONEY_SCALE: u32 = 2;

/// Address family tags used by the binary `inet` encoding
const PGSQL_AF_INET: u8 = 2;
const PGSQL_AF_INET6: u8 = 3;

// ============================================================================
// Catalog queries
// ============================================================================

/// Columns of every relation of one type in a schema, with comments
const COLUMNS_QUERY: &str = r"
SELECT c.table_name::text          AS table_name,
       c.column_name::text         AS column_name,
       c.data_type::text           AS data_type,
       (c.is_nullable = 'YES')     AS nullable,
       c.column_default::text      AS column_default,
       c.character_maximum_length::int4 AS char_max_length,
       pgd.description::text       AS description
FROM information_schema.columns c
JOIN information_schema.tables t
  ON t.table_schema = c.table_schema AND t.table_name = c.table_name
JOIN pg_catalog.pg_namespace n ON n.nspname = c.table_schema
JOIN pg_catalog.pg_class cl ON cl.relnamespace = n.oid AND cl.relname = c.table_name
LEFT JOIN pg_catalog.pg_description pgd
  ON pgd.objoid = cl.oid AND pgd.objsubid = c.ordinal_position
WHERE c.table_schema = $1 AND t.table_type = $2
ORDER BY c.table_name, c.ordinal_position
";

const PRIMARY_KEYS_QUERY: &str = r"
SELECT t.relname::text AS table_name,
       a.attname::text AS column_name
FROM pg_catalog.pg_index i
JOIN pg_catalog.pg_class t ON t.oid = i.indrelid
JOIN pg_catalog.pg_namespace n ON n.oid = t.relnamespace
JOIN pg_catalog.pg_attribute a ON a.attrelid = i.indrelid AND a.attnum = ANY(i.indkey)
WHERE n.nspname = $1 AND i.indisprimary
ORDER BY t.relname, array_position(i.indkey::int2[], a.attnum)
";

const FOREIGN_KEYS_QUERY: &str = r"
SELECT tc.table_name::text      AS table_name,
       tc.constraint_name::text AS constraint_name,
       kcu.column_name::text    AS column_name,
       ccu.table_name::text     AS ref_table,
       ccu.column_name::text    AS ref_column,
       rc.update_rule::text     AS on_update,
       rc.delete_rule::text     AS on_delete
FROM information_schema.table_constraints tc
JOIN information_schema.key_column_usage kcu
  ON tc.constraint_name = kcu.constraint_name AND tc.table_schema = kcu.table_schema
JOIN information_schema.constraint_column_usage ccu
  ON ccu.constraint_name = tc.constraint_name AND ccu.table_schema = tc.table_schema
JOIN information_schema.referential_constraints rc
  ON rc.constraint_name = tc.constraint_name AND rc.constraint_schema = tc.table_schema
WHERE tc.constraint_type = 'FOREIGN KEY' AND tc.table_schema = $1
ORDER BY tc.table_name, tc.constraint_name, kcu.ordinal_position
";

/// Secondary indexes; primary key indexes are reported as the primary key
const INDEXES_QUERY: &str = r"
SELECT t.relname::text AS table_name,
       i.relname::text AS index_name,
       array_agg(a.attname::text ORDER BY array_position(ix.indkey::int2[], a.attnum)) AS columns,
       ix.indisunique  AS is_unique,
       am.amname::text AS index_type
FROM pg_catalog.pg_class t
JOIN pg_catalog.pg_namespace n ON n.oid = t.relnamespace
JOIN pg_catalog.pg_index ix ON t.oid = ix.indrelid
JOIN pg_catalog.pg_class i ON i.oid = ix.indexrelid
JOIN pg_catalog.pg_am am ON i.relam = am.oid
JOIN pg_catalog.pg_attribute a ON a.attrelid = t.oid AND a.attnum = ANY(ix.indkey)
WHERE n.nspname = $1 AND t.relkind = 'r' AND NOT ix.indisprimary
GROUP BY t.relname, i.relname, ix.indisunique, am.amname
ORDER BY t.relname, i.relname
";

const VIEWS_QUERY: &str = r"
SELECT v.table_name::text      AS view_name,
       v.view_definition::text AS definition,
       obj_description(cl.oid, 'pg_class') AS description
FROM information_schema.views v
JOIN pg_catalog.pg_namespace n ON n.nspname = v.table_schema
JOIN pg_catalog.pg_class cl ON cl.relnamespace = n.oid AND cl.relname = v.table_name
WHERE v.table_schema = $1
ORDER BY v.table_name
";

#[derive(Debug, sqlx::FromRow)]
struct ColumnRow {
    table_name: String,
    column_name: String,
    data_type: String,
    nullable: bool,
    column_default: Option<String>,
    char_max_length: Option<i32>,
    description: Option<String>,
}

#[derive(Debug, sqlx::FromRow)]
struct PrimaryKeyRow {
    table_name: String,
    column_name: String,
}

#[derive(Debug, sqlx::FromRow)]
struct ForeignKeyRow {
    table_name: String,
    constraint_name: String,
    column_name: String,
    ref_table: String,
    ref_column: String,
    on_update: String,
    on_delete: String,
}

#[derive(Debug, sqlx::FromRow)]
struct IndexRow {
    table_name: String,
    index_name: String,
    columns: Vec<String>,
    is_unique: bool,
    index_type: String,
}

#[derive(Debug, sqlx::FromRow)]
struct ViewRow {
    view_name: String,
    definition: Option<String>,
    description: Option<String>,
}

/// Raw catalog rows for one schema
#[derive(Debug, Default)]
struct CatalogRows {
    table_columns: Vec<ColumnRow>,
    view_columns: Vec<ColumnRow>,
    primary_keys: Vec<PrimaryKeyRow>,
    foreign_keys: Vec<ForeignKeyRow>,
    indexes: Vec<IndexRow>,
    views: Vec<ViewRow>,
}

impl From<ColumnRow> for ColumnInfo {
    fn from(row: ColumnRow) -> Self {
        Self {
            name: row.column_name,
            data_type: row.data_type,
            nullable: row.nullable,
            default: row.column_default,
            char_max_length: row.char_max_length,
            description: row.description,
        }
    }
}

fn group_columns(rows: Vec<ColumnRow>) -> BTreeMap<String, Vec<ColumnInfo>> {
    let mut grouped: BTreeMap<String, Vec<ColumnInfo>> = BTreeMap::new();
    for row in rows {
        grouped
            .entry(row.table_name.clone())
            .or_default()
            .push(row.into());
    }
    grouped
}

/// Fold flat catalog rows into per-table structures
///
/// Foreign key rows repeat once per referenced column for composite keys, so
/// column lists are deduplicated while keeping their first-seen order.
fn assemble_schema(rows: CatalogRows) -> DatabaseSchema {
    let mut tables: BTreeMap<String, TableInfo> = group_columns(rows.table_columns)
        .into_iter()
        .map(|(name, columns)| (name.clone(), TableInfo::new(name, columns)))
        .collect();

    for pk in rows.primary_keys {
        if let Some(table) = tables.get_mut(&pk.table_name) {
            table.primary_key.push(pk.column_name);
        }
    }

    for fk in rows.foreign_keys {
        let Some(table) = tables.get_mut(&fk.table_name) else {
            continue;
        };
        let position = table
            .foreign_keys
            .iter()
            .position(|existing| existing.name == fk.constraint_name);
        let entry = if let Some(index) = position {
            &mut table.foreign_keys[index]
        } else {
            table.foreign_keys.push(ForeignKeyInfo {
                name: fk.constraint_name,
                columns: Vec::new(),
                ref_table: fk.ref_table,
                ref_columns: Vec::new(),
                on_update: fk.on_update,
                on_delete: fk.on_delete,
            });
            let last = table.foreign_keys.len() - 1;
            &mut table.foreign_keys[last]
        };
        if !entry.columns.contains(&fk.column_name) {
            entry.columns.push(fk.column_name);
        }
        if !entry.ref_columns.contains(&fk.ref_column) {
            entry.ref_columns.push(fk.ref_column);
        }
    }

    for index in rows.indexes {
        if let Some(table) = tables.get_mut(&index.table_name) {
            table.indexes.push(IndexInfo {
                name: index.index_name,
                columns: index.columns,
                unique: index.is_unique,
                index_type: index.index_type,
            });
        }
    }

    let mut view_columns = group_columns(rows.view_columns);
    let views = rows
        .views
        .into_iter()
        .map(|view| ViewInfo {
            columns: view_columns.remove(&view.view_name).unwrap_or_default(),
            name: view.view_name,
            definition: view.definition,
            description: view.description,
        })
        .collect();

    DatabaseSchema {
        tables: tables.into_values().collect(),
        views,
    }
}

// ============================================================================
// Row decoding
// ============================================================================

fn decode_error(column: &str, type_name: &str, error: &sqlx::Error) -> AppError {
    AppError::database(format!(
        "failed to decode column '{column}' of type {type_name}: {error}"
    ))
}

fn unsupported(message: String) -> sqlx::Error {
    sqlx::Error::Decode(message.into())
}

/// Convert one column of a result row to JSON, dispatching on its Postgres type
///
/// `NUMERIC` and `MONEY` are rendered as strings to keep their precision.
/// Enums, domains and arrays follow their labels, base types and element
/// types. Anything else sent in text format is kept as that text, and a
/// binary value with no decoder is an error rather than a silent `null`.
fn decode_value(row: &PgRow, index: usize, type_info: &PgTypeInfo) -> Result<Value, sqlx::Error> {
    let raw = row.try_get_raw(index)?;
    if raw.is_null() {
        return Ok(Value::Null);
    }

    match type_info.kind() {
        PgTypeKind::Enum(_) => return decode_text(row, index),
        PgTypeKind::Domain(base) => return decode_value(row, index, base),
        PgTypeKind::Array(element) => {
            let label_elements = matches!(element.kind(), PgTypeKind::Enum(_));
            return decode_array_of(row, index, element.name(), label_elements);
        }
        _ => {}
    }

    let type_name = type_info.name();
    if let Some(element) = type_name.strip_suffix("[]") {
        return decode_array_of(row, index, element, false);
    }

    let value = match type_name {
        "BOOL" => Value::from(row.try_get_unchecked::<bool, _>(index)?),
        "INT2" => Value::from(row.try_get_unchecked::<i16, _>(index)?),
        "INT4" => Value::from(row.try_get_unchecked::<i32, _>(index)?),
        "INT8" => Value::from(row.try_get_unchecked::<i64, _>(index)?),
        "OID" => Value::from(row.try_get_unchecked::<Oid, _>(index)?.0),
        "FLOAT4" => Value::from(f64::from(row.try_get_unchecked::<f32, _>(index)?)),
        "FLOAT8" => Value::from(row.try_get_unchecked::<f64, _>(index)?),
        "NUMERIC" => Value::String(row.try_get_unchecked::<Decimal, _>(index)?.to_string()),
        "MONEY" => Value::String(
            row.try_get_unchecked::<PgMoney, _>(index)?
                .to_decimal(MONEY_SCALE)
                .to_string(),
        ),
        "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" | "CITEXT" | "XML" | "UNKNOWN" => {
            return decode_text(row, index);
        }
        "\"CHAR\"" | "CHAR" => Value::String(format_char(row.try_get_unchecked::<i8, _>(index)?)),
        "JSON" | "JSONB" => row.try_get_unchecked::<Value, _>(index)?,
        "UUID" => Value::String(row.try_get_unchecked::<Uuid, _>(index)?.to_string()),
        "TIMESTAMPTZ" => Value::String(
            row.try_get_unchecked::<DateTime<Utc>, _>(index)?
                .to_rfc3339(),
        ),
        "TIMESTAMP" => Value::String(
            row.try_get_unchecked::<NaiveDateTime, _>(index)?
                .and_utc()
                .to_rfc3339(),
        ),
        "DATE" => Value::String(row.try_get_unchecked::<NaiveDate, _>(index)?.to_string()),
        "TIME" => Value::String(row.try_get_unchecked::<NaiveTime, _>(index)?.to_string()),
        "INTERVAL" => Value::String(format_interval(
            &row.try_get_unchecked::<PgInterval, _>(index)?,
        )),
        "BYTEA" => Value::String(format_bytea(&row.try_get_unchecked::<Vec<u8>, _>(index)?)),
        "INET" | "CIDR" => {
            let bytes = raw.as_bytes().map_err(sqlx::Error::Decode)?;
            match raw.format() {
                PgValueFormat::Text => Value::String(String::from_utf8_lossy(bytes).into_owned()),
                PgValueFormat::Binary => Value::String(
                    format_inet(bytes, type_name == "CIDR")
                        .ok_or_else(|| unsupported(format!("malformed {type_name} value")))?,
                ),
            }
        }
        _ => {
            let bytes = raw.as_bytes().map_err(sqlx::Error::Decode)?;
            text_fallback(type_name, raw.format(), bytes).map_err(unsupported)?
        }
    };
    Ok(value)
}

fn decode_text(row: &PgRow, index: usize) -> Result<Value, sqlx::Error> {
    Ok(Value::String(row.try_get_unchecked::<String, _>(index)?))
}

/// Decode a one-dimensional array by its element type name
fn decode_array_of(
    row: &PgRow,
    index: usize,
    element: &str,
    label_elements: bool,
) -> Result<Value, sqlx::Error> {
    if label_elements {
        return decode_array::<String>(row, index, Value::String);
    }
    match element {
        "BOOL" => decode_array::<bool>(row, index, Value::from),
        "INT2" => decode_array::<i16>(row, index, Value::from),
        "INT4" => decode_array::<i32>(row, index, Value::from),
        "INT8" => decode_array::<i64>(row, index, Value::from),
        "FLOAT4" => decode_array::<f32>(row, index, |v| Value::from(f64::from(v))),
        "FLOAT8" => decode_array::<f64>(row, index, Value::from),
        "NUMERIC" => decode_array::<Decimal>(row, index, |v| Value::String(v.to_string())),
        "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" => decode_array::<String>(row, index, Value::String),
        "UUID" => decode_array::<Uuid>(row, index, |v| Value::String(v.to_string())),
        "DATE" => decode_array::<NaiveDate>(row, index, |v| Value::String(v.to_string())),
        "TIMESTAMPTZ" => {
            decode_array::<DateTime<Utc>>(row, index, |v| Value::String(v.to_rfc3339()))
        }
        "TIMESTAMP" => decode_array::<NaiveDateTime>(row, index, |v| {
            Value::String(v.and_utc().to_rfc3339())
        }),
        "JSON" | "JSONB" => decode_array::<Value>(row, index, |v| v),
        other => Err(unsupported(format!("no decoder for arrays of {other}"))),
    }
}

fn decode_array<T>(row: &PgRow, index: usize, convert: fn(T) -> Value) -> Result<Value, sqlx::Error>
where
    T: for<'r> Decode<'r, Postgres> + Type<Postgres>,
{
    let items = row.try_get_unchecked::<Vec<Option<T>>, _>(index)?;
    Ok(Value::Array(
        items
            .into_iter()
            .map(|item| item.map_or(Value::Null, convert))
            .collect(),
    ))
}

/// Keep a text-format value as is; binary values need a dedicated decoder
fn text_fallback(type_name: &str, format: PgValueFormat, bytes: &[u8]) -> Result<Value, String> {
    match format {
        PgValueFormat::Text => Ok(Value::String(String::from_utf8_lossy(bytes).into_owned())),
        PgValueFormat::Binary => Err(format!("no decoder for binary {type_name} values")),
    }
}

/// Render an interval the way `psql` prints it, e.g. `1 year 2 mons 3 days 04:05:06.5`
fn format_interval(interval: &PgInterval) -> String {
    let plural = |n: i64, unit: &str| {
        if n.abs() == 1 {
            format!("{n} {unit}")
        } else {
            format!("{n} {unit}s")
        }
    };

    let mut parts = Vec::new();
    let years = i64::from(interval.months / 12);
    let months = i64::from(interval.months % 12);
    if years != 0 {
        parts.push(plural(years, "year"));
    }
    if months != 0 {
        parts.push(plural(months, "mon"));
    }
    if interval.days != 0 {
        parts.push(plural(i64::from(interval.days), "day"));
    }

    let micros = interval.microseconds;
    if micros != 0 || parts.is_empty() {
        let sign = if micros < 0 { "-" } else { "" };
        let micros = micros.unsigned_abs();
        let seconds = micros / 1_000_000;
        let fraction = micros % 1_000_000;
        let mut clock = format!(
            "{sign}{:02}:{:02}:{:02}",
            seconds / 3600,
            (seconds / 60) % 60,
            seconds % 60
        );
        if fraction != 0 {
            let digits = format!("{fraction:06}");
            clock.push('.');
            clock.push_str(digits.trim_end_matches('0'));
        }
        parts.push(clock);
    }
    parts.join(" ")
}

/// UTF-8 payloads stay readable; anything else uses Postgres hex output
fn format_bytea(bytes: &[u8]) -> String {
    std::str::from_utf8(bytes).map_or_else(
        |_| {
            let hex: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
            format!("\\x{hex}")
        },
        str::to_owned,
    )
}

fn format_char(code: i8) -> String {
    char::from(code.to_ne_bytes()[0]).to_string()
}

/// Parse the binary `inet`/`cidr` wire form: family, bits, is-cidr flag, length, address
fn format_inet(bytes: &[u8], cidr: bool) -> Option<String> {
    let (&family, rest) = bytes.split_first()?;
    let (&bits, rest) = rest.split_first()?;
    let (_, rest) = rest.split_first()?;
    let (&len, address) = rest.split_first()?;
    let address = address.get(..usize::from(len))?;

    let (ip, full_mask) = match family {
        PGSQL_AF_INET => (IpAddr::from(<[u8; 4]>::try_from(address).ok()?), 32),
        PGSQL_AF_INET6 => (IpAddr::from(<[u8; 16]>::try_from(address).ok()?), 128),
        _ => return None,
    };
    if cidr || bits != full_mask {
        Some(format!("{ip}/{bits}"))
    } else {
        Some(ip.to_string())
    }
}

fn decode_row(row: &PgRow) -> AppResult<Map<String, Value>> {
    let mut object = Map::new();
    for (index, column) in row.columns().iter().enumerate() {
        let type_info = column.type_info();
        let value = decode_value(row, index, type_info)
            .map_err(|e| decode_error(column.name(), type_info.name(), &e))?;
        object.insert(column.name().to_owned(), value);
    }
    Ok(object)
}

// ============================================================================
// Driver
// ============================================================================

/// Pool handle plus the schema it introspects
#[derive(Debug, Clone)]
pub struct PostgresSource {
    pool: PgPool,
    schema: String,
}

/// Opens `PostgreSQL` pools with a fixed sizing policy
#[derive(Debug, Clone, Default)]
pub struct PostgresDriver {
    pool_config: SourcePoolConfig,
}

impl PostgresDriver {
    /// Create a driver applying `pool_config` to every pool it opens
    #[must_use]
    pub const fn new(pool_config: SourcePoolConfig) -> Self {
        Self { pool_config }
    }

    fn pool_options(&self) -> PgPoolOptions {
        PgPoolOptions::new()
            .max_connections(self.pool_config.max_connections)
            .min_connections(self.pool_config.min_connections)
            .idle_timeout(Some(self.pool_config.idle_timeout()))
            .max_lifetime(Some(self.pool_config.max_lifetime()))
            .acquire_timeout(self.pool_config.acquire_timeout())
    }
}

/// Translate a stored configuration into connect options and the schema to introspect
///
/// # Errors
///
/// `UnsupportedDatabase` for non-Postgres types, `InvalidConfig` for a bad
/// port, SSL mode or option type
pub fn connect_options(
    config: &DatabaseConfig,
) -> Result<(PgConnectOptions, String), ResolveError> {
    if config.db_type != DatabaseType::PostgreSql {
        return Err(ResolveError::UnsupportedDatabase(config.db_type.to_string()));
    }
    let invalid = |reason: String| ResolveError::InvalidConfig {
        name: config.name.clone(),
        reason,
    };

    let port: u16 = config
        .port
        .trim()
        .parse()
        .map_err(|_| invalid(format!("port '{}' is not a valid port number", config.port)))?;

    let string_option = |key: &str, default: &str| -> Result<String, ResolveError> {
        match config.options.get(key) {
            None | Some(Value::Null) => Ok(default.to_owned()),
            Some(Value::String(s)) if s.trim().is_empty() => Ok(default.to_owned()),
            Some(Value::String(s)) => Ok(s.trim().to_owned()),
            Some(other) => Err(invalid(format!("option '{key}' must be a string, got {other}"))),
        }
    };

    let ssl_mode_text = string_option("ssl_mode", DEFAULT_SSL_MODE)?;
    let ssl_mode = PgSslMode::from_str(&ssl_mode_text)
        .map_err(|_| invalid(format!("unknown ssl_mode '{ssl_mode_text}'")))?;
    let schema = string_option("schema", DEFAULT_SCHEMA)?;

    let options = PgConnectOptions::new()
        .host(&config.host)
        .port(port)
        .username(&config.username)
        .password(&config.password)
        .database(&config.db_name)
        .ssl_mode(ssl_mode)
        .application_name(crate::constants::service::NAME);

    Ok((options, schema))
}

#[async_trait]
impl SourceDriver for PostgresDriver {
    type Pool = PostgresSource;

    #[instrument(skip(self, config), fields(source = %config.name))]
    async fn connect(&self, config: &DatabaseConfig) -> Result<Self::Pool, ResolveError> {
        let (options, schema) = connect_options(config)?;
        let connection_error = |e: sqlx::Error| ResolveError::ConnectionError {
            name: config.name.clone(),
            reason: e.to_string(),
        };

        let pool = self
            .pool_options()
            .connect_with(options)
            .await
            .map_err(connection_error)?;

        if let Err(e) = pool.execute("SELECT 1").await {
            pool.close().await;
            return Err(connection_error(e));
        }

        debug!(schema = %schema, "Source pool verified");
        Ok(PostgresSource { pool, schema })
    }

    async fn ping(&self, source: &Self::Pool) -> bool {
        !source.pool.is_closed() && source.pool.execute("SELECT 1").await.is_ok()
    }

    fn connector(&self, source: Self::Pool) -> Arc<dyn Connector> {
        Arc::new(PostgresConnector { source })
    }

    async fn close(&self, source: Self::Pool) {
        source.pool.close().await;
    }
}

// ============================================================================
// Connector
// ============================================================================

/// Connector over a shared `PostgreSQL` pool
#[derive(Debug, Clone)]
pub struct PostgresConnector {
    source: PostgresSource,
}

impl PostgresConnector {
    async fn fetch<T>(&self, query: &'static str, relation_type: Option<&str>) -> AppResult<Vec<T>>
    where
        T: for<'r> sqlx::FromRow<'r, PgRow> + Send + Unpin,
    {
        let mut statement = sqlx::query_as::<_, T>(query).bind(&self.source.schema);
        if let Some(relation_type) = relation_type {
            statement = statement.bind(relation_type);
        }
        statement
            .fetch_all(&self.source.pool)
            .await
            .map_err(|e| AppError::database(format!("schema introspection failed: {e}")))
    }
}

#[async_trait]
impl Connector for PostgresConnector {
    #[instrument(skip(self), fields(schema = %self.source.schema))]
    async fn get_schema(&self) -> AppResult<DatabaseSchema> {
        let rows = CatalogRows {
            table_columns: self.fetch(COLUMNS_QUERY, Some("BASE TABLE")).await?,
            view_columns: self.fetch(COLUMNS_QUERY, Some("VIEW")).await?,
            primary_keys: self.fetch(PRIMARY_KEYS_QUERY, None).await?,
            foreign_keys: self.fetch(FOREIGN_KEYS_QUERY, None).await?,
            indexes: self.fetch(INDEXES_QUERY, None).await?,
            views: self.fetch(VIEWS_QUERY, None).await?,
        };
        let schema = assemble_schema(rows);
        debug!(
            tables = schema.tables.len(),
            views = schema.views.len(),
            "Schema introspected"
        );
        Ok(schema)
    }

    #[instrument(skip(self, sql))]
    async fn execute_query(&self, sql: &str) -> AppResult<QueryResult> {
        let rows = sqlx::query(sql)
            .fetch_all(&self.source.pool)
            .await
            .map_err(|e| AppError::database(format!("query execution failed: {e}")))?;

        let columns = if let Some(first) = rows.first() {
            first.columns().iter().map(|c| c.name().to_owned()).collect()
        } else {
            // No rows to read names from, so describe the statement instead
            let statement = self
                .source
                .pool
                .prepare(sql)
                .await
                .map_err(|e| AppError::database(format!("query preparation failed: {e}")))?;
            statement
                .columns()
                .iter()
                .map(|c| c.name().to_owned())
                .collect()
        };

        let rows = rows.iter().map(decode_row).collect::<AppResult<Vec<_>>>()?;
        debug!(rows = rows.len(), "Query executed");
        Ok(QueryResult { columns, rows })
    }
}
