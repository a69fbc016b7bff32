//! Scoped execution engine over the backing dataset.
//!
//! Every request gets a fresh in-memory DuckDB connection (the *scope*),
//! into which a permission-filtered view named [`SECURE_VIEW`] is installed
//! before any untrusted SQL runs. The raw registration of the dataset only
//! exists while the scope is being set up; it is dropped again once the
//! secure view has been defined, so by the time a candidate query executes
//! the scoped view is the only nameable relation. Scopes never outlive the
//! request and share no state, which is what keeps one tenant's view out of
//! another tenant's execution context.

use std::path::PathBuf;

use chrono::{DateTime, NaiveDate, NaiveTime};
use duckdb::Connection;
use duckdb::types::{TimeUnit, ValueRef};
use serde::Serialize;
use tracing::{debug, warn};

use crate::context::{AccessContext, Visibility};
use crate::error::{Result, ShadowviewError};
use crate::validate;

/// The one relation a candidate query may reference.
pub const SECURE_VIEW: &str = "secure_sales";

/// Internal registration of the unfiltered dataset. Exists only between
/// scope setup and secure-view creation; never visible to untrusted SQL.
const RAW_VIEW: &str = "raw_sales";

/// One column of the scoped view, as reported by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnInfo {
    pub name: String,
    pub type_name: String,
}

/// Renders column descriptions in the line format the generation backend is
/// prompted with: `- <name> (<TYPE>)`.
pub fn render_schema(columns: &[ColumnInfo]) -> String {
    columns
        .iter()
        .map(|c| format!("- {} ({})", c.name, c.type_name))
        .collect::<Vec<_>>()
        .join("\n")
}

/// An owned result cell. Temporal engine values are rendered to text so the
/// result is self-describing without dragging engine types across the API.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    Double(f64),
    Text(String),
}

impl Value {
    fn from_ref(value: ValueRef<'_>) -> Value {
        match value {
            ValueRef::Null => Value::Null,
            ValueRef::Boolean(b) => Value::Boolean(b),
            ValueRef::TinyInt(i) => Value::Integer(i64::from(i)),
            ValueRef::SmallInt(i) => Value::Integer(i64::from(i)),
            ValueRef::Int(i) => Value::Integer(i64::from(i)),
            ValueRef::BigInt(i) => Value::Integer(i),
            ValueRef::HugeInt(i) => Value::Integer(i as i64),
            ValueRef::UTinyInt(i) => Value::Integer(i64::from(i)),
            ValueRef::USmallInt(i) => Value::Integer(i64::from(i)),
            ValueRef::UInt(i) => Value::Integer(i64::from(i)),
            ValueRef::UBigInt(i) => Value::Integer(i as i64),
            ValueRef::Float(f) => Value::Double(f64::from(f)),
            ValueRef::Double(f) => Value::Double(f),
            ValueRef::Decimal(d) => Value::Text(d.to_string()),
            ValueRef::Text(s) => Value::Text(String::from_utf8_lossy(s).to_string()),
            ValueRef::Timestamp(unit, v) => match DateTime::from_timestamp_micros(to_micros(unit, v)) {
                Some(ts) => Value::Text(ts.naive_utc().format("%Y-%m-%d %H:%M:%S").to_string()),
                None => Value::Null,
            },
            ValueRef::Date32(d) => {
                // chrono counts days from CE; the engine from the Unix epoch.
                match NaiveDate::from_num_days_from_ce_opt(d + 719_163) {
                    Some(date) => Value::Text(date.format("%Y-%m-%d").to_string()),
                    None => Value::Null,
                }
            }
            ValueRef::Time64(unit, t) => {
                let micros = to_micros(unit, t);
                let secs = (micros / 1_000_000) as u32;
                let nanos = ((micros % 1_000_000) * 1_000) as u32;
                match NaiveTime::from_num_seconds_from_midnight_opt(secs, nanos) {
                    Some(time) => Value::Text(time.format("%H:%M:%S").to_string()),
                    None => Value::Null,
                }
            }
            // Nested and exotic types are not part of the fact table contract.
            _ => Value::Null,
        }
    }
}

fn to_micros(unit: TimeUnit, v: i64) -> i64 {
    match unit {
        TimeUnit::Second => v.saturating_mul(1_000_000),
        TimeUnit::Millisecond => v.saturating_mul(1_000),
        TimeUnit::Microsecond => v,
        TimeUnit::Nanosecond => v / 1_000,
    }
}

/// In-memory result of one scoped query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
    pub row_count: usize,
}

/// Request-scoped execution context. The connection is the resource; scope
/// release is its `Drop`, which runs on every exit path.
struct Scope {
    conn: Connection,
}

/// Stateless entry point for permission-scoped execution. Holds only
/// configuration; all per-request state lives in the scope.
pub struct SecureEngine {
    dataset: PathBuf,
    group_column: String,
    memory_limit: String,
}

impl SecureEngine {
    pub fn new(
        dataset: impl Into<PathBuf>,
        group_column: impl Into<String>,
        memory_limit: impl Into<String>,
    ) -> Self {
        Self {
            dataset: dataset.into(),
            group_column: group_column.into(),
            memory_limit: memory_limit.into(),
        }
    }

    pub fn group_column(&self) -> &str {
        &self.group_column
    }

    /// Runs one validated candidate query under `ctx` and collects the
    /// result set. Order of operations is fixed: scope, secure view,
    /// validation, execution. The scope is torn down when this returns,
    /// success or failure.
    pub fn execute(&self, sql: &str, ctx: &AccessContext) -> Result<QueryResult> {
        ctx.ensure_valid()?;
        let scope = self.open_scope()?;
        self.install_secure_view(&scope, ctx)?;
        validate::ensure_read_only(sql)?;
        debug!(subject = ctx.subject_id(), "running scoped query");
        collect(&scope.conn, sql)
    }

    /// Column names and types of the scoped view under `ctx`, in declared
    /// order. Exactly what the generation backend may learn about the data:
    /// a restricted identity differs from an unrestricted one in rows, not
    /// columns, so this never leaks anything beyond the table shape.
    pub fn describe_schema(&self, ctx: &AccessContext) -> Result<Vec<ColumnInfo>> {
        ctx.ensure_valid()?;
        let scope = self.open_scope()?;
        self.install_secure_view(&scope, ctx)?;
        describe_relation(&scope.conn, SECURE_VIEW)
            .map_err(|e| ShadowviewError::Execution(e.to_string()))
    }

    /// Distinct values of the group column in the raw dataset. Operator and
    /// identity-resolution helper; never reachable from untrusted SQL.
    pub fn distinct_groups(&self) -> Result<Vec<String>> {
        let scope = self.open_scope()?;
        self.register_raw(&scope)?;
        let sql = format!(
            "SELECT DISTINCT {col} FROM {RAW_VIEW} WHERE {col} IS NOT NULL ORDER BY 1",
            col = quote_ident(&self.group_column)
        );
        let mut stmt = scope
            .conn
            .prepare(&sql)
            .map_err(|e| ShadowviewError::Execution(e.to_string()))?;
        let mut rows = stmt
            .query([])
            .map_err(|e| ShadowviewError::Execution(e.to_string()))?;
        let mut groups = Vec::new();
        while let Some(row) = rows
            .next()
            .map_err(|e| ShadowviewError::Execution(e.to_string()))?
        {
            let group: String = row
                .get(0)
                .map_err(|e| ShadowviewError::Execution(e.to_string()))?;
            groups.push(group);
        }
        Ok(groups)
    }

    fn open_scope(&self) -> Result<Scope> {
        let conn = Connection::open_in_memory()
            .map_err(|e| ShadowviewError::ViewConstruction(format!("failed to open scope: {e}")))?;
        // Ceiling per scope, so a pathological query (unbounded cross join)
        // is bounded by configuration rather than the host's memory.
        conn.execute_batch(&format!(
            "SET memory_limit='{}';",
            escape_literal(&self.memory_limit)
        ))
        .map_err(|e| ShadowviewError::ViewConstruction(format!("failed to apply memory limit: {e}")))?;
        Ok(Scope { conn })
    }

    fn register_raw(&self, scope: &Scope) -> Result<()> {
        scope
            .conn
            .execute_batch(&format!(
                "CREATE VIEW {RAW_VIEW} AS SELECT * FROM {}",
                self.dataset_source()
            ))
            .map_err(|e| {
                ShadowviewError::ViewConstruction(format!(
                    "failed to register dataset '{}': {e}",
                    self.dataset.display()
                ))
            })
    }

    /// Installs [`SECURE_VIEW`] for `ctx` and removes the raw registration.
    ///
    /// The filter predicate is the row-visibility invariant. When the
    /// configured group column does not exist in the actual dataset schema
    /// the view is empty for everyone: a misconfigured column name must
    /// never degrade into serving the unfiltered dataset.
    fn install_secure_view(&self, scope: &Scope, ctx: &AccessContext) -> Result<()> {
        self.register_raw(scope)?;
        let columns = describe_relation(&scope.conn, RAW_VIEW).map_err(|e| {
            ShadowviewError::ViewConstruction(format!("failed to inspect dataset schema: {e}"))
        })?;
        let group_column_present = columns.iter().any(|c| c.name == self.group_column);

        let source = self.dataset_source();
        let view_sql = if !group_column_present {
            warn!(
                column = %self.group_column,
                "group column missing from dataset; scoped view is empty"
            );
            format!("CREATE VIEW {SECURE_VIEW} AS SELECT * FROM {source} WHERE 1 = 0")
        } else {
            match ctx.visibility() {
                Visibility::All => {
                    format!("CREATE VIEW {SECURE_VIEW} AS SELECT * FROM {source}")
                }
                Visibility::Groups(groups) if groups.is_empty() => {
                    format!("CREATE VIEW {SECURE_VIEW} AS SELECT * FROM {source} WHERE 1 = 0")
                }
                Visibility::Groups(groups) => {
                    // Group values come from upstream configuration, not a
                    // bind-parameter path; quotes in them must be inert by
                    // the time they land in the view definition.
                    let list = groups
                        .iter()
                        .map(|g| format!("'{}'", escape_literal(g)))
                        .collect::<Vec<_>>()
                        .join(", ");
                    format!(
                        "CREATE VIEW {SECURE_VIEW} AS SELECT * FROM {source} WHERE {} IN ({list})",
                        quote_ident(&self.group_column)
                    )
                }
            }
        };
        scope.conn.execute_batch(&view_sql).map_err(|e| {
            ShadowviewError::ViewConstruction(format!("failed to create scoped view: {e}"))
        })?;
        // The scoped view reads the dataset source directly, so the raw
        // registration can go away before any untrusted SQL runs.
        scope
            .conn
            .execute_batch(&format!("DROP VIEW {RAW_VIEW}"))
            .map_err(|e| {
                ShadowviewError::ViewConstruction(format!(
                    "failed to retract raw registration: {e}"
                ))
            })
    }

    fn dataset_source(&self) -> String {
        format!(
            "read_parquet('{}')",
            escape_literal(&self.dataset.display().to_string())
        )
    }
}

/// Runs `sql` on an established scope and materializes the full result set.
fn collect(conn: &Connection, sql: &str) -> Result<QueryResult> {
    let mut stmt = conn
        .prepare(sql)
        .map_err(|e| ShadowviewError::Execution(e.to_string()))?;
    let mut rows = stmt
        .query([])
        .map_err(|e| ShadowviewError::Execution(e.to_string()))?;

    let mut collected: Vec<Vec<Value>> = Vec::new();
    while let Some(row) = rows
        .next()
        .map_err(|e| ShadowviewError::Execution(e.to_string()))?
    {
        let column_count = row.as_ref().column_count();
        let mut cells = Vec::with_capacity(column_count);
        for i in 0..column_count {
            let value_ref = row
                .get_ref(i)
                .map_err(|e| ShadowviewError::Execution(e.to_string()))?;
            cells.push(Value::from_ref(value_ref));
        }
        collected.push(cells);
    }
    drop(rows);

    let columns: Vec<String> = stmt.column_names().into_iter().map(|c| c.to_string()).collect();
    let row_count = collected.len();
    Ok(QueryResult { columns, rows: collected, row_count })
}

/// `DESCRIBE <relation>`: name and type per column, declared order.
fn describe_relation(conn: &Connection, relation: &str) -> duckdb::Result<Vec<ColumnInfo>> {
    let mut stmt = conn.prepare(&format!("DESCRIBE {relation}"))?;
    let mut rows = stmt.query([])?;
    let mut columns = Vec::new();
    while let Some(row) = rows.next()? {
        columns.push(ColumnInfo {
            name: row.get(0)?,
            type_name: row.get(1)?,
        });
    }
    Ok(columns)
}

fn escape_literal(s: &str) -> String {
    s.replace('\'', "''")
}

fn quote_ident(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}
