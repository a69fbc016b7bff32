use std::path::PathBuf;

use duckdb::Connection;
use tempfile::TempDir;

use shadowview::context::{AccessContext, Visibility};
use shadowview::engine::{SecureEngine, render_schema};

/// Two declared columns, in this order: Revenue (DOUBLE), Brand (VARCHAR).
fn fixture(dir: &TempDir) -> PathBuf {
    let path = dir.path().join("sales.parquet");
    let conn = Connection::open_in_memory().expect("open fixture connection");
    conn.execute_batch(&format!(
        "COPY (
            SELECT * FROM (VALUES
                (CAST(100.5 AS DOUBLE), 'Brand_A'),
                (CAST(50.0 AS DOUBLE), 'Brand_B')
            ) AS t(\"Revenue\", \"Brand\")
        ) TO '{}' (FORMAT PARQUET)",
        path.display()
    ))
    .expect("write fixture parquet");
    path
}

fn sales(groups: &[&str]) -> AccessContext {
    AccessContext::new(
        "user_1",
        "sales",
        Visibility::Groups(groups.iter().map(|g| g.to_string()).collect()),
    )
}

#[test]
fn schema_lists_columns_in_declared_order() {
    let dir = TempDir::new().unwrap();
    let engine = SecureEngine::new(fixture(&dir), "Brand", "2GB");
    let ctx = AccessContext::new("admin", "admin", Visibility::All);
    let columns = engine.describe_schema(&ctx).expect("describe ok");
    assert_eq!(columns.len(), 2);
    assert_eq!(columns[0].name, "Revenue");
    assert_eq!(columns[0].type_name, "DOUBLE");
    assert_eq!(columns[1].name, "Brand");
    assert_eq!(columns[1].type_name, "VARCHAR");
}

#[test]
fn rendered_schema_matches_prompt_format() {
    let dir = TempDir::new().unwrap();
    let engine = SecureEngine::new(fixture(&dir), "Brand", "2GB");
    let ctx = AccessContext::new("admin", "admin", Visibility::All);
    let rendered = render_schema(&engine.describe_schema(&ctx).expect("describe ok"));
    assert_eq!(rendered, "- Revenue (DOUBLE)\n- Brand (VARCHAR)");
}

#[test]
fn restricted_identity_sees_same_columns() {
    // Rows are filtered, columns are not: a restricted caller must get the
    // identical description an unrestricted one does.
    let dir = TempDir::new().unwrap();
    let engine = SecureEngine::new(fixture(&dir), "Brand", "2GB");
    let unrestricted = engine
        .describe_schema(&AccessContext::new("admin", "admin", Visibility::All))
        .expect("describe ok");
    let restricted = engine
        .describe_schema(&sales(&["Brand_A"]))
        .expect("describe ok");
    let none = engine.describe_schema(&sales(&[])).expect("describe ok");
    assert_eq!(unrestricted, restricted);
    assert_eq!(unrestricted, none);
}

#[test]
fn empty_view_still_describes_columns() {
    let dir = TempDir::new().unwrap();
    // Misconfigured group column: the view is empty but its shape is intact.
    let engine = SecureEngine::new(fixture(&dir), "Niche", "2GB");
    let columns = engine.describe_schema(&sales(&["Brand_A"])).expect("describe ok");
    assert_eq!(columns.len(), 2);
    let rows = engine
        .execute("SELECT * FROM secure_sales", &sales(&["Brand_A"]))
        .expect("query ok");
    assert_eq!(rows.row_count, 0);
}
