//! Bounded self-correction loop around the engine.
//!
//! The agent owns the protocol between the generation backend and the
//! scoped executor: fetch the identity's schema description, obtain a
//! candidate query, execute it, and on a retryable failure hand the error
//! back to the backend for a corrected query, a bounded number of times.
//! Each attempt is an independent `execute` call, so nothing from a failed
//! attempt survives into the next one.
//!
//! Text that already starts with a read keyword bypasses generation and
//! runs exactly once. That is an operational affordance for people who know
//! what they want to run, not a security boundary: the bypassed text passes
//! through the same validation and scoping as everything else.

use std::time::Instant;

use tracing::{info, warn};

use crate::context::AccessContext;
use crate::engine::{QueryResult, SecureEngine, render_schema};
use crate::error::Result;
use crate::propose::{ChatTurn, QueryProposer};

/// Leading keywords that select the direct-SQL path.
const BYPASS_KEYWORDS: [&str; 4] = ["SELECT", "WITH", "DESCRIBE", "SHOW"];

/// What one agent round produced: either a result set or a message for the
/// user (clarifying question, disabled backend, ...).
#[derive(Debug)]
pub enum Outcome {
    Rows {
        sql: String,
        result: QueryResult,
        message: String,
    },
    Chat {
        message: String,
    },
}

pub struct Agent<'a> {
    engine: &'a SecureEngine,
    proposer: &'a dyn QueryProposer,
    max_retries: usize,
}

impl<'a> Agent<'a> {
    pub fn new(engine: &'a SecureEngine, proposer: &'a dyn QueryProposer, max_retries: usize) -> Self {
        Self { engine, proposer, max_retries }
    }

    pub fn process(
        &self,
        question: &str,
        ctx: &AccessContext,
        history: &[ChatTurn],
    ) -> Result<Outcome> {
        let columns = self.engine.describe_schema(ctx)?;
        let schema = render_schema(&columns);

        let (mut sql, manual) = if is_manual_sql(question) {
            (question.to_string(), true)
        } else {
            let proposal = self.proposer.propose_query(question, &schema, history);
            match proposal.query {
                Some(q) => (q, false),
                None => return Ok(Outcome::Chat { message: proposal.explanation }),
            }
        };

        let mut attempt = 0;
        loop {
            let started = Instant::now();
            match self.engine.execute(&sql, ctx) {
                Ok(result) => {
                    let elapsed = started.elapsed().as_secs_f64();
                    // Deliberately identical wording for filtered-empty and
                    // genuinely-empty results.
                    let message = if result.row_count > 0 {
                        format!("Found {} records in {elapsed:.4}s.", result.row_count)
                    } else {
                        format!("Query executed successfully in {elapsed:.4}s but returned no data.")
                    };
                    info!(rows = result.row_count, manual, "scoped query complete");
                    return Ok(Outcome::Rows { sql, result, message });
                }
                Err(e) if !e.is_retryable() || manual || attempt >= self.max_retries => {
                    return Err(e);
                }
                Err(e) => {
                    attempt += 1;
                    warn!(attempt, error = %e, "scoped query failed, requesting correction");
                    let correction = correction_question(question, &sql, &e.to_string());
                    let proposal = self.proposer.propose_query(&correction, &schema, &[]);
                    match proposal.query {
                        Some(fixed) => sql = fixed,
                        None => return Err(e),
                    }
                }
            }
        }
    }
}

/// True when the text's head is a read keyword at a word boundary, e.g.
/// `select ...` but not `selected products`.
fn is_manual_sql(text: &str) -> bool {
    let head = text.trim_start().to_uppercase();
    BYPASS_KEYWORDS.iter().any(|kw| {
        head.strip_prefix(kw)
            .is_some_and(|rest| !rest.starts_with(|c: char| c.is_alphanumeric() || c == '_'))
    })
}

fn correction_question(question: &str, failed_sql: &str, error: &str) -> String {
    format!(
        "The previous SQL query failed with this error: \"{error}\".\n\
         Original question: \"{question}\"\n\
         Failed SQL: {failed_sql}\n\
         Correct the SQL so it runs on DuckDB and return only JSON with the fixed query."
    )
}
