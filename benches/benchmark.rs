use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};
use duckdb::Connection;
use tempfile::TempDir;

use shadowview::context::{AccessContext, Visibility};
use shadowview::engine::SecureEngine;

fn fixture(dir: &TempDir, rows: usize) -> std::path::PathBuf {
    let path = dir.path().join("bench.parquet");
    let conn = Connection::open_in_memory().expect("open fixture connection");
    conn.execute_batch(&format!(
        "COPY (
            SELECT
                'Brand_' || CAST(i % 10 AS VARCHAR) AS \"Brand\",
                CAST(i AS DOUBLE) / 7.0 AS \"Revenue\",
                CAST(i % 100 AS INTEGER) AS \"Clicks\"
            FROM range({rows}) t(i)
        ) TO '{}' (FORMAT PARQUET)",
        path.display()
    ))
    .expect("write fixture parquet");
    path
}

fn scoped_execution(c: &mut Criterion) {
    let dir = TempDir::new().unwrap();
    let engine = SecureEngine::new(fixture(&dir, 50_000), "Brand", "2GB");
    let admin = AccessContext::new("admin", "admin", Visibility::All);
    let restricted = AccessContext::new(
        "user_1",
        "sales",
        Visibility::Groups(vec!["Brand_1".to_string(), "Brand_2".to_string()]),
    );

    c.bench_function("scope build + aggregate, all groups", |b| {
        b.iter(|| {
            let result = engine
                .execute(black_box("SELECT SUM(Revenue) FROM secure_sales"), &admin)
                .expect("query ok");
            black_box(result.row_count)
        })
    });

    c.bench_function("scope build + aggregate, two groups", |b| {
        b.iter(|| {
            let result = engine
                .execute(
                    black_box("SELECT Brand, SUM(Revenue) FROM secure_sales GROUP BY Brand"),
                    &restricted,
                )
                .expect("query ok");
            black_box(result.row_count)
        })
    });

    c.bench_function("schema description", |b| {
        b.iter(|| {
            let columns = engine.describe_schema(&restricted).expect("describe ok");
            black_box(columns.len())
        })
    });
}

criterion_group!(benches, scoped_execution);
criterion_main!(benches);
