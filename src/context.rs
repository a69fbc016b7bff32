//! Caller identity and row visibility.
//!
//! An [`AccessContext`] is the single object that travels with a request and
//! decides which rows of the fact table the caller may see. It is built once
//! per inbound request by the identity resolution step, never mutated while
//! a query is in flight, and never persisted.

use serde::{Deserialize, Serialize};

use crate::error::{Result, ShadowviewError};

/// Reserved entry in the wire-level group list meaning unrestricted visibility.
pub const ALL_SENTINEL: &str = "ALL";

/// Which group values of the fact table an identity may see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Visibility {
    /// Unrestricted: the scoped view is an unfiltered projection.
    All,
    /// Only rows whose group column matches one of these values. An empty
    /// list means no rows at all.
    Groups(Vec<String>),
}

impl Visibility {
    /// Builds visibility from the wire-level group list, where a literal
    /// `"ALL"` entry is the unrestricted sentinel.
    pub fn from_groups(groups: Vec<String>) -> Self {
        if groups.iter().any(|g| g == ALL_SENTINEL) {
            Visibility::All
        } else {
            Visibility::Groups(groups)
        }
    }
}

/// Immutable description of one caller for the lifetime of one request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "WireContext", into = "WireContext")]
pub struct AccessContext {
    subject_id: String,
    role: String,
    visibility: Visibility,
}

/// External wire shape: `{subject_id, role, allowed_groups: ["ALL"] | [...]}`.
#[derive(Serialize, Deserialize)]
struct WireContext {
    subject_id: String,
    #[serde(default)]
    role: String,
    allowed_groups: Vec<String>,
}

impl From<WireContext> for AccessContext {
    fn from(w: WireContext) -> Self {
        AccessContext::new(w.subject_id, w.role, Visibility::from_groups(w.allowed_groups))
    }
}

impl From<AccessContext> for WireContext {
    fn from(ctx: AccessContext) -> Self {
        let allowed_groups = match ctx.visibility {
            Visibility::All => vec![ALL_SENTINEL.to_string()],
            Visibility::Groups(groups) => groups,
        };
        WireContext { subject_id: ctx.subject_id, role: ctx.role, allowed_groups }
    }
}

impl AccessContext {
    pub fn new(subject_id: impl Into<String>, role: impl Into<String>, visibility: Visibility) -> Self {
        Self {
            subject_id: subject_id.into(),
            role: role.into(),
            visibility,
        }
    }

    pub fn subject_id(&self) -> &str {
        &self.subject_id
    }

    /// Informational only; the access decision is driven entirely by
    /// [`AccessContext::visibility`].
    pub fn role(&self) -> &str {
        &self.role
    }

    pub fn visibility(&self) -> &Visibility {
        &self.visibility
    }

    /// True when the identity may see rows carrying `group`. Exact,
    /// case-sensitive match against the allowed list.
    pub fn can_view(&self, group: &str) -> bool {
        match &self.visibility {
            Visibility::All => true,
            Visibility::Groups(groups) => groups.iter().any(|g| g == group),
        }
    }

    /// True when the identity can see any rows at all.
    pub fn has_any_visibility(&self) -> bool {
        match &self.visibility {
            Visibility::All => true,
            Visibility::Groups(groups) => !groups.is_empty(),
        }
    }

    /// A malformed identity is rejected outright; it is never treated as
    /// "allow all".
    pub fn ensure_valid(&self) -> Result<()> {
        if self.subject_id.trim().is_empty() {
            return Err(ShadowviewError::Identity(
                "subject_id must not be empty".into(),
            ));
        }
        Ok(())
    }
}

/// Development stub exchanging a bearer token for an [`AccessContext`].
///
/// Real deployments decode a JWT and look the group list up in the
/// permission store; until that lands, a fixed token map keeps the rest of
/// the system honest. Unknown or missing tokens resolve to a guest with no
/// visibility, so the failure mode is always "no rows".
pub fn resolve_token(token: Option<&str>) -> AccessContext {
    match token {
        Some("admin_secret") => AccessContext::new("admin", "admin", Visibility::All),
        Some("sales_sj") => AccessContext::new(
            "user_1",
            "sales",
            Visibility::Groups(vec!["Sandjest".to_string()]),
        ),
        _ => AccessContext::new("guest", "viewer", Visibility::Groups(Vec::new())),
    }
}
