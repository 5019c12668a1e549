//! Benchmarks for counts-table parsing and aggregation.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rnapost::dataset::Dataset;
use std::fmt::Write as _;
use std::path::Path;

fn synthetic_counts(rows: usize) -> String {
    let mut raw = String::from("Geneid\tChr\tLength\tcounts\n");
    for i in 0..rows {
        let _ = writeln!(raw, "ENSG{i:08}.2\tchr{}\t{}\t{}", i % 22 + 1, 500 + i, i * 7 % 9001);
    }
    raw
}

fn dataset_benchmark(c: &mut Criterion) {
    let raw = synthetic_counts(10_000);
    c.bench_function("parse_10k", |b| {
        b.iter(|| Dataset::parse(black_box(&raw), Path::new("bench.tsv")).unwrap())
    });

    let dataset = Dataset::parse(&raw, Path::new("bench.tsv")).unwrap();
    c.bench_function("top_features_50", |b| {
        b.iter(|| black_box(dataset.top_features(50)))
    });
    c.bench_function("median_count", |b| b.iter(|| black_box(dataset.median_count())));
}

criterion_group!(benches, dataset_benchmark);
criterion_main!(benches);
