//! Benchmarks for the graph engine's neighbor lookup and path search
//! (§4.6) over a synthetic edge set.

#![allow(missing_docs)]

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use mnemograph::graph::{find_paths, get_neighbors};
use mnemograph::models::GraphEdge;
use std::hint::black_box;

/// Builds a chain-plus-fanout graph of `n` entities: `entity_0 -> entity_1
/// -> ... -> entity_{n-1}`, each also linked to a shared `"hub"` entity.
fn synthetic_edges(n: usize) -> Vec<GraphEdge> {
    let mut edges = Vec::with_capacity(n * 2);
    for i in 0..n.saturating_sub(1) {
        edges.push(GraphEdge::new(format!("entity_{i}"), "relates_to", format!("entity_{}", i + 1), 0.8));
    }
    for i in 0..n {
        edges.push(GraphEdge::new(format!("entity_{i}"), "shares_facts", "hub", 0.5));
    }
    edges
}

fn bench_get_neighbors(c: &mut Criterion) {
    let mut group = c.benchmark_group("get_neighbors");

    for size in [100usize, 1_000, 10_000] {
        let edges = synthetic_edges(size);
        group.throughput(Throughput::Elements(edges.len() as u64));
        group.bench_with_input(BenchmarkId::new("depth_1", size), &edges, |b, edges| {
            b.iter(|| get_neighbors(black_box(edges), black_box("hub"), 1));
        });
        group.bench_with_input(BenchmarkId::new("depth_3", size), &edges, |b, edges| {
            b.iter(|| get_neighbors(black_box(edges), black_box("hub"), 3));
        });
    }

    group.finish();
}

fn bench_find_paths(c: &mut Criterion) {
    let mut group = c.benchmark_group("find_paths");

    for size in [100usize, 1_000, 5_000] {
        let edges = synthetic_edges(size);
        group.throughput(Throughput::Elements(edges.len() as u64));
        group.bench_with_input(BenchmarkId::new("entity_0_to_hub", size), &edges, |b, edges| {
            b.iter(|| find_paths(black_box(edges), black_box("entity_0"), black_box(Some("hub")), 3, 20));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_get_neighbors, bench_find_paths);
criterion_main!(benches);
