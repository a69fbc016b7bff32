//! Shadowview – row-level access control for a natural-language-to-SQL surface.
//!
//! Shadowview sits between untrusted SQL (typed by an operator or produced
//! by a text-generation backend) and a single columnar fact table, and
//! guarantees that each caller only ever sees the rows its permissions
//! allow:
//! * An [`context::AccessContext`] carries the caller's identity and the
//!   explicit list of group values it may see (or the "all" sentinel).
//! * [`validate`] parses a candidate query with the engine's SQL dialect and
//!   rejects everything outside a single-statement, read-only subset.
//! * [`engine::SecureEngine`] opens a fresh in-memory execution scope per
//!   request, installs a permission-filtered *shadow view* as the only
//!   nameable relation, and runs the validated query against it.
//! * [`agent::Agent`] wraps the engine in the bounded self-correction
//!   protocol used with the generation backend, including the direct-SQL
//!   bypass for hand-written queries.
//!
//! ## Modules
//! * [`context`] – Caller identity, visibility, and the token stub.
//! * [`validate`] – Read-only screening of candidate SQL.
//! * [`engine`] – Scope lifecycle, secure view construction, execution and
//!   schema introspection.
//! * [`propose`] – The shape of the external generation collaborator.
//! * [`agent`] – Retry protocol around engine + proposer.
//! * [`config`] – Layered runtime settings.
//! * [`server`] – HTTP surface (blackbox query + whitebox steps).
//!
//! ## Quick Start
//! ```no_run
//! use shadowview::context::{AccessContext, Visibility};
//! use shadowview::engine::SecureEngine;
//!
//! let engine = SecureEngine::new("data/sales.parquet", "Brand", "2GB");
//! let ctx = AccessContext::new(
//!     "user_1",
//!     "sales",
//!     Visibility::Groups(vec!["Brand_A".to_string()]),
//! );
//! let result = engine
//!     .execute("SELECT SUM(Revenue) FROM secure_sales", &ctx)
//!     .unwrap();
//! assert_eq!(result.row_count, 1);
//! ```
//!
//! ## Security model
//! Three independent layers have to fail before a row leaks: the view
//! filter (rows outside the identity's groups are not in the view), the
//! validator (mutating and multi-statement SQL never executes), and the
//! scope (no relation other than the shadow view is registered when
//! untrusted SQL runs). A blocked result is indistinguishable from an empty
//! one, and misconfiguration of the group column fails closed to an empty
//! view.

pub mod agent;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod propose;
pub mod server;
pub mod validate;
