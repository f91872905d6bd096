//! Benchmarks for structured-payload extraction.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use queryflow::core::QueryArtifact;
use queryflow::parser;

const FENCED: &str = "Here is the query you asked for:\n```json\n{\"sql_query\": \"SELECT COUNT(*) FROM electric_vehicles WHERE County = 'King'\", \"explanation\": \"Counts rows for King County.\"}\n```\nLet me know if you need anything else.";

fn parser_benchmark(c: &mut Criterion) {
    let padded = format!("{}{FENCED}{}", "prose ".repeat(500), " trailing".repeat(500));

    c.bench_function("parse_fenced", |b| {
        b.iter(|| parser::parse(black_box(FENCED)))
    });

    c.bench_function("parse_as_query", |b| {
        b.iter(|| parser::parse_as::<QueryArtifact>(black_box(FENCED)))
    });

    c.bench_function("parse_padded", |b| {
        b.iter(|| parser::parse(black_box(&padded)))
    });
}

criterion_group!(benches, parser_benchmark);
criterion_main!(benches);
