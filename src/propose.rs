//! Interface to the external query-generation collaborator.
//!
//! The core never talks to a specific generation backend. Anything that can
//! turn a question plus a schema description into a [`Proposal`] can drive
//! the agent loop, including deterministic stand-ins in tests. The shipped
//! binary uses [`DisabledProposer`] until a backend is wired up, which
//! leaves the manual-SQL path fully functional.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// One prior exchange, oldest first, passed along for follow-up questions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: String,
    pub content: String,
}

/// What the generation backend came back with. `query: None` means it had
/// nothing to run and `explanation` is a message for the user, typically a
/// clarifying question.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Proposal {
    #[serde(default, alias = "sql")]
    pub query: Option<String>,
    #[serde(default)]
    pub explanation: String,
}

pub trait QueryProposer {
    fn propose_query(&self, question: &str, schema: &str, history: &[ChatTurn]) -> Proposal;
}

/// Stand-in for deployments without a generation backend. Always declines
/// to propose, pointing the caller at the direct-SQL path.
pub struct DisabledProposer;

impl QueryProposer for DisabledProposer {
    fn propose_query(&self, _question: &str, _schema: &str, _history: &[ChatTurn]) -> Proposal {
        Proposal {
            query: None,
            explanation: "No query-generation backend is configured. Submit SQL directly \
                          (SELECT/WITH/DESCRIBE/SHOW) against the scoped view."
                .to_string(),
        }
    }
}

lazy_static! {
    // Greedy on purpose: grabs the outermost object even when the
    // explanation itself contains braces.
    static ref JSON_OBJECT: Regex = Regex::new(r"(?s)\{.*\}").unwrap();
}

/// Pulls a [`Proposal`] out of raw model text. Generation backends wrap
/// their JSON in markdown fences or chatter more often than not; this strips
/// the noise and parses the outermost object. Returns `None` when no
/// parseable object is present.
pub fn extract_proposal(raw: &str) -> Option<Proposal> {
    let cleaned = raw.replace("```json", "").replace("```", "");
    let blob = JSON_OBJECT.find(&cleaned)?;
    serde_json::from_str(blob.as_str()).ok()
}
