//! Benchmarks for the per-statement and per-cell hot paths.
//!
//! - statement classification
//! - the binary heuristic and byte normalization
//! - building a row-returning result
//!
//! Run with: `cargo bench`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use sqlbridge::db::{classify, looks_binary, normalize_bytes, use_target, CellValue, QueryResult};
use std::time::Duration;

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

const SHORT_SELECT: &str = "SELECT * FROM users";

const LEADING_WHITESPACE: &str = "\n\n\t    select id, name from users where id = 1";

const LONG_INSERT: &str = "INSERT INTO orders (user_id, total, status, created_at) VALUES \
    (1, 10.50, 'pending', now()), (2, 99.00, 'shipped', now()), (3, 5.25, 'pending', now()), \
    (4, 12.00, 'cancelled', now()), (5, 42.42, 'shipped', now())";

const UNKNOWN: &str = "VACUUM ANALYZE orders";

fn text_bytes(len: usize) -> Vec<u8> {
    "The quick brown fox jumps over the lazy dog.\n"
        .bytes()
        .cycle()
        .take(len)
        .collect()
}

fn binary_bytes(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 256) as u8).collect()
}

// ---------------------------------------------------------------------------
// Benchmark groups
// ---------------------------------------------------------------------------

fn bench_classify(c: &mut Criterion) {
    let mut group = c.benchmark_group("classify");

    let cases = [
        ("short_select", SHORT_SELECT),
        ("leading_whitespace", LEADING_WHITESPACE),
        ("long_insert", LONG_INSERT),
        ("unknown", UNKNOWN),
    ];

    for (name, sql) in &cases {
        group.bench_with_input(BenchmarkId::new("classify", name), sql, |b, sql| {
            b.iter(|| classify(black_box(sql)));
        });
    }

    group.bench_function("use_target", |b| {
        b.iter(|| use_target(black_box("USE `analytics`;")));
    });

    group.finish();
}

fn bench_binary_heuristic(c: &mut Criterion) {
    let mut group = c.benchmark_group("binary_heuristic");

    for len in [16usize, 100, 64 * 1024] {
        let text = text_bytes(len);
        let binary = binary_bytes(len);
        group.bench_with_input(BenchmarkId::new("looks_binary_text", len), &text, |b, bytes| {
            b.iter(|| looks_binary(black_box(bytes)));
        });
        group.bench_with_input(BenchmarkId::new("normalize_text", len), &text, |b, bytes| {
            b.iter(|| normalize_bytes(black_box(bytes)));
        });
        group.bench_with_input(BenchmarkId::new("normalize_binary", len), &binary, |b, bytes| {
            b.iter(|| normalize_bytes(black_box(bytes)));
        });
    }

    group.finish();
}

fn bench_result_building(c: &mut Criterion) {
    let mut group = c.benchmark_group("result");

    let columns: Vec<String> = ["id", "name", "price", "note"].iter().map(|s| s.to_string()).collect();
    let rows: Vec<Vec<CellValue>> = (0..1000)
        .map(|i| {
            vec![
                CellValue::Int(i),
                CellValue::text(format!("item {}", i)),
                CellValue::Float(i as f64 * 1.5),
                CellValue::Null,
            ]
        })
        .collect();

    group.bench_function("rows_1000", |b| {
        b.iter(|| {
            QueryResult::rows(
                black_box(columns.clone()),
                black_box(rows.clone()),
                Duration::from_millis(3),
            )
        });
    });

    group.bench_function("display_1000", |b| {
        b.iter(|| {
            rows.iter()
                .flat_map(|row| row.iter().map(|c| c.display()))
                .count()
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_classify,
    bench_binary_heuristic,
    bench_result_building,
);
criterion_main!(benches);
