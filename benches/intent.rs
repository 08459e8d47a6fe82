//! Benchmarks for rule-based intent classification (§4.5): entity lookup,
//! temporal, aspect-filter, and semantic-search-default queries should all
//! classify in well under a millisecond since no network call is involved.

#![allow(missing_docs)]

use criterion::{criterion_group, criterion_main, Criterion};
use mnemograph::intent_classifier::classify_intent;
use std::hint::black_box;

const ENTITY_QUERY: &str = "what do you know about my manager Alice";
const TEMPORAL_QUERY: &str = "what happened in the last 7 days";
const ASPECT_QUERY: &str = "what are my preferences";
const SEMANTIC_QUERY: &str = "anything related to deploying the staging cluster this quarter";

fn bench_classify_intent(c: &mut Criterion) {
    let mut group = c.benchmark_group("classify_intent");

    group.bench_function("entity_lookup", |b| {
        b.iter(|| classify_intent(black_box(ENTITY_QUERY)));
    });
    group.bench_function("temporal", |b| {
        b.iter(|| classify_intent(black_box(TEMPORAL_QUERY)));
    });
    group.bench_function("aspect_filter", |b| {
        b.iter(|| classify_intent(black_box(ASPECT_QUERY)));
    });
    group.bench_function("semantic_default", |b| {
        b.iter(|| classify_intent(black_box(SEMANTIC_QUERY)));
    });

    group.finish();
}

criterion_group!(benches, bench_classify_intent);
criterion_main!(benches);
