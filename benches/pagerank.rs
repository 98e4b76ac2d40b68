//! Criterion benchmarks for the CPU `PageRank` pipeline
//!
//! Covers:
//! - Representation construction (dense matrix vs compact CSR)
//! - Single kernel step per representation
//! - Full solve to convergence

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::hint::black_box;
use trueno_pagerank::backend::{Accelerator, CpuAccelerator, RankKernel};
use trueno_pagerank::{
    pagerank, CompactAdjacency, DenseTransitionMatrix, Graph, Representation,
    RepresentationPolicy, SolverConfig,
};

/// Generate scale-free graph (Barabási-Albert model approximation)
fn generate_scale_free_graph(num_nodes: usize, edges_per_node: usize) -> Graph {
    let mut edges = Vec::new();
    let mut rng_state = 12345_u64; // Simple LCG for reproducibility

    for node in 0..num_nodes {
        for _ in 0..edges_per_node {
            // Simple pseudo-random target selection
            rng_state = rng_state.wrapping_mul(1103515245).wrapping_add(12345);
            let target = (rng_state % num_nodes as u64) as u32;

            if target != node as u32 {
                edges.push((node as u32, target));
            }
        }
    }

    Graph::from_edges(num_nodes, &edges).unwrap()
}

/// Benchmark: representation construction
fn bench_construction(c: &mut Criterion) {
    let mut group = c.benchmark_group("construction");

    for size in [100, 500, 1000].iter() {
        let graph = generate_scale_free_graph(*size, 3);

        group.bench_with_input(BenchmarkId::new("dense", size), &graph, |b, graph| {
            b.iter(|| {
                let matrix = DenseTransitionMatrix::from_graph(black_box(graph.clone())).unwrap();
                black_box(matrix);
            });
        });

        group.bench_with_input(BenchmarkId::new("compact", size), &graph, |b, graph| {
            b.iter(|| {
                let adjacency = CompactAdjacency::from_graph(black_box(graph.clone())).unwrap();
                black_box(adjacency);
            });
        });
    }

    group.finish();
}

/// Benchmark: one power-iteration step
fn bench_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("step");
    let cpu = CpuAccelerator::new().unwrap();

    for size in [100, 500, 1000].iter() {
        let graph = generate_scale_free_graph(*size, 3);

        for policy in [RepresentationPolicy::Dense, RepresentationPolicy::Compact] {
            let repr = Representation::build(graph.clone(), &policy).unwrap();
            let id = BenchmarkId::new(repr.kind().to_string(), size);
            let initial = repr.initial_scores();
            let mut kernel = cpu.upload(repr, &initial).unwrap();

            group.bench_function(id, |b| {
                b.iter(|| {
                    let delta = kernel.step(black_box(0.85)).unwrap();
                    black_box(delta);
                });
            });
        }
    }

    group.finish();
}

/// Benchmark: full solve (build + iterate + extract)
fn bench_pagerank(c: &mut Criterion) {
    let mut group = c.benchmark_group("pagerank");
    let config = SolverConfig::default().with_policy(RepresentationPolicy::Compact);

    for size in [100, 1000, 10_000].iter() {
        let graph = generate_scale_free_graph(*size, 3);

        group.bench_with_input(BenchmarkId::new("compact", size), &graph, |b, graph| {
            b.iter(|| {
                let result = pagerank(black_box(graph.clone()), &config).unwrap();
                black_box(result);
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_construction, bench_step, bench_pagerank);
criterion_main!(benches);
