//! Read-only screening of candidate SQL.
//!
//! Candidate queries arrive as untrusted text, either typed by an operator
//! or produced by the generation backend. Before anything touches the
//! execution scope the text must parse as exactly one statement of a
//! read-only whitelist: `SELECT`/`WITH` queries, `DESCRIBE`, and `SHOW`.
//! Everything else is rejected, including unknown statement kinds, so new
//! parser features fail closed rather than open.
//!
//! Validation is deliberately independent of view scoping: a query is
//! syntactically safe or not regardless of which rows it will touch. Which
//! table names resolve at all is decided by the scope, where only the
//! secure view is registered.

use sqlparser::ast::{Query, SetExpr, Statement};
use sqlparser::dialect::DuckDbDialect;
use sqlparser::parser::Parser;

use crate::error::{Result, ShadowviewError};

/// Checks that `sql` is a single read-only statement in the engine's
/// dialect. Performs no rewriting.
pub fn ensure_read_only(sql: &str) -> Result<()> {
    let dialect = DuckDbDialect {};
    let statements = Parser::parse_sql(&dialect, sql)
        .map_err(|e| ShadowviewError::InvalidSyntax(e.to_string()))?;

    match statements.as_slice() {
        [] => Err(ShadowviewError::InvalidSyntax("empty statement".into())),
        [stmt] => ensure_statement_read_only(stmt),
        _ => Err(ShadowviewError::Forbidden(
            "multi-statement scripts are not allowed".into(),
        )),
    }
}

fn ensure_statement_read_only(stmt: &Statement) -> Result<()> {
    match stmt {
        Statement::Query(query) => ensure_query_read_only(query),
        other => {
            // DESCRIBE and SHOW are pure introspection in the target engine.
            // Classified on the canonical rendering of the parsed statement
            // rather than AST variants, which reshuffle between parser
            // releases; anything else fails closed. Note EXPLAIN is not
            // here: EXPLAIN ANALYZE executes its inner statement.
            match statement_kind(other).as_str() {
                "DESCRIBE" | "DESC" | "SHOW" => Ok(()),
                kind => Err(ShadowviewError::Forbidden(format!(
                    "only read statements are allowed, got: {kind}"
                ))),
            }
        }
    }
}

fn ensure_query_read_only(query: &Query) -> Result<()> {
    if let Some(with) = &query.with {
        for cte in &with.cte_tables {
            ensure_query_read_only(&cte.query)?;
        }
    }
    ensure_body_read_only(&query.body)
}

fn ensure_body_read_only(body: &SetExpr) -> Result<()> {
    match body {
        SetExpr::Select(_) | SetExpr::Values(_) => Ok(()),
        SetExpr::Query(inner) => ensure_query_read_only(inner),
        SetExpr::SetOperation { left, right, .. } => {
            ensure_body_read_only(left)?;
            ensure_body_read_only(right)
        }
        // Insert/Update/Delete bodies and anything the parser grows later.
        other => Err(ShadowviewError::Forbidden(format!(
            "only read statements are allowed, got: {}",
            statement_kind_text(&other.to_string())
        ))),
    }
}

/// First keyword of the statement, for error messages that name the
/// offending construct without echoing the whole query.
fn statement_kind(stmt: &Statement) -> String {
    statement_kind_text(&stmt.to_string())
}

fn statement_kind_text(rendered: &str) -> String {
    rendered
        .split_whitespace()
        .next()
        .unwrap_or("unknown")
        .to_uppercase()
}
