//! Database gateway over a shared SQLite connection pool
//!
//! The gateway is the explicitly owned resource handle threaded through
//! the controller. A single `DatabaseGateway` (backed by `SqlitePool`)
//! is safe to share across concurrent, independent workflow runs.

use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::{Column, Row, TypeInfo, ValueRef};
use std::time::Instant;
use tracing::{debug, info, warn};

use sqlpilot_core::GatewayError;

/// Number of sample rows included in schema descriptions.
const SCHEMA_SAMPLE_ROWS: u32 = 3;

/// Outcome of executing a SQL string.
///
/// Malformed SQL and empty result sets both map to `Failure`: the
/// workflow treats them identically as retryable feedback for the
/// generation step. Only connection-level faults are errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionOutcome {
    /// At least one row, rendered as text tuples
    Rows(String),
    /// Query failed or returned no rows
    Failure,
}

/// Read-only SQLite gateway shared by workflow runs.
#[derive(Debug, Clone)]
pub struct DatabaseGateway {
    pool: SqlitePool,
}

impl DatabaseGateway {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to a SQLite database by URL (e.g. `sqlite://mydb.db`).
    pub async fn connect(url: &str) -> Result<Self, GatewayError> {
        let pool = SqlitePool::connect(url)
            .await
            .map_err(|e| GatewayError::Connection(e.to_string()))?;
        Ok(Self::new(pool))
    }

    /// The underlying pool, for fixtures and health checks.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Execute a SQL string and return rows or a failure indicator.
    ///
    /// Never returns `Err` for malformed SQL; only a dead connection or
    /// pool is a `GatewayError`.
    pub async fn execute(&self, query: &str) -> Result<ExecutionOutcome, GatewayError> {
        let start = Instant::now();
        debug!(query, "executing SQL");

        let rows = match sqlx::query(query).fetch_all(&self.pool).await {
            Ok(rows) => rows,
            Err(e) if is_connection_fault(&e) => {
                return Err(GatewayError::Connection(e.to_string()));
            }
            Err(e) => {
                warn!(query, error = %e, "query failed");
                return Ok(ExecutionOutcome::Failure);
            }
        };

        let elapsed_ms = start.elapsed().as_millis() as u64;
        if rows.is_empty() {
            info!(elapsed_ms, "query returned no rows");
            return Ok(ExecutionOutcome::Failure);
        }

        info!(rows_returned = rows.len(), elapsed_ms, "query completed");
        Ok(ExecutionOutcome::Rows(render_rows(&rows)))
    }

    /// Names of the user tables, sorted, excluding SQLite internals.
    pub async fn list_tables(&self) -> Result<Vec<String>, GatewayError> {
        let rows = sqlx::query(
            "SELECT name FROM sqlite_master \
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%' \
             ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| GatewayError::Metadata(e.to_string()))?;

        rows.iter()
            .map(|row| {
                row.try_get::<String, _>(0)
                    .map_err(|e| GatewayError::Metadata(e.to_string()))
            })
            .collect()
    }

    /// `CREATE TABLE` DDL plus sample rows for the given tables.
    pub async fn table_schema(&self, tables: &[String]) -> Result<String, GatewayError> {
        let mut sections = Vec::with_capacity(tables.len());

        for table in tables {
            let ddl: Option<String> = sqlx::query(
                "SELECT sql FROM sqlite_master WHERE type = 'table' AND name = ?1",
            )
            .bind(table)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| GatewayError::Metadata(e.to_string()))?
            .and_then(|row| row.try_get(0).ok());

            let Some(ddl) = ddl else {
                warn!(table, "requested schema for unknown table");
                sections.push(format!("-- table '{table}' does not exist"));
                continue;
            };

            let sample_query = format!(
                "SELECT * FROM {} LIMIT {}",
                quote_identifier(table),
                SCHEMA_SAMPLE_ROWS
            );
            let sample_rows = sqlx::query(&sample_query)
                .fetch_all(&self.pool)
                .await
                .map_err(|e| GatewayError::Metadata(e.to_string()))?;

            sections.push(render_schema_section(table, &ddl, &sample_rows));
        }

        Ok(sections.join("\n\n"))
    }
}

/// Whether a sqlx error means the database itself is unreachable, as
/// opposed to the query text being at fault.
fn is_connection_fault(error: &sqlx::Error) -> bool {
    matches!(
        error,
        sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::Protocol(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed
            | sqlx::Error::Configuration(_)
    )
}

/// Double-quote a SQL identifier.
fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Render rows as a list of text tuples, e.g. `[(1, 'Sunny'), (2, 'Arhun')]`.
fn render_rows(rows: &[SqliteRow]) -> String {
    let tuples: Vec<String> = rows
        .iter()
        .map(|row| {
            let fields: Vec<String> = (0..row.columns().len())
                .map(|i| render_value(row, i))
                .collect();
            format!("({})", fields.join(", "))
        })
        .collect();
    format!("[{}]", tuples.join(", "))
}

/// Schema section in the shape the generation service expects: the DDL
/// followed by a commented sample of the table's contents.
fn render_schema_section(table: &str, ddl: &str, sample_rows: &[SqliteRow]) -> String {
    let mut section = String::from(ddl.trim());

    section.push_str(&format!(
        "\n\n/*\n{} rows from {} table:\n",
        sample_rows.len(),
        table
    ));
    if let Some(first) = sample_rows.first() {
        let header: Vec<&str> = first.columns().iter().map(|c| c.name()).collect();
        section.push_str(&header.join("\t"));
        section.push('\n');
    }
    for row in sample_rows {
        let fields: Vec<String> = (0..row.columns().len())
            .map(|i| render_plain_value(row, i))
            .collect();
        section.push_str(&fields.join("\t"));
        section.push('\n');
    }
    section.push_str("*/");
    section
}

/// Render one column value in tuple form (strings single-quoted).
fn render_value(row: &SqliteRow, index: usize) -> String {
    match raw_value(row, index) {
        RawValue::Null => "NULL".to_string(),
        RawValue::Integer(v) => v.to_string(),
        RawValue::Real(v) => v.to_string(),
        RawValue::Text(v) => format!("'{}'", v.replace('\'', "''")),
        RawValue::Blob => "<blob>".to_string(),
    }
}

/// Render one column value without quoting (for sample-row tables).
fn render_plain_value(row: &SqliteRow, index: usize) -> String {
    match raw_value(row, index) {
        RawValue::Null => "NULL".to_string(),
        RawValue::Integer(v) => v.to_string(),
        RawValue::Real(v) => v.to_string(),
        RawValue::Text(v) => v,
        RawValue::Blob => "<blob>".to_string(),
    }
}

enum RawValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob,
}

fn raw_value(row: &SqliteRow, index: usize) -> RawValue {
    let Ok(raw) = row.try_get_raw(index) else {
        return RawValue::Null;
    };
    if raw.is_null() {
        return RawValue::Null;
    }

    match raw.type_info().name() {
        "INTEGER" | "BOOLEAN" => row
            .try_get::<i64, _>(index)
            .map(RawValue::Integer)
            .unwrap_or(RawValue::Null),
        "REAL" => row
            .try_get::<f64, _>(index)
            .map(RawValue::Real)
            .unwrap_or(RawValue::Null),
        "BLOB" => RawValue::Blob,
        _ => row
            .try_get::<String, _>(index)
            .map(RawValue::Text)
            .unwrap_or(RawValue::Null),
    }
}
