//! Benchmarks for project analysis.
//!
//! ## Full runs
//! - Project analysis throughput (files/sec) and scaling with project size
//!
//! ## Incremental runs
//! - Re-analysis after a one-file change
//!
//! ## Queries
//! - Symbol search, call graph and cycle detection on an analysed project

use codegraph::query::{call_graph, find_cycles};
use codegraph::search::{SearchQuery, search};
use codegraph::{AnalysisOptions, AnalysisSnapshot, Analyzer, CancellationFlag, MemoryProvider};
use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use std::sync::Arc;
use tokio::runtime::Runtime;

// ============================================================================
// Fixture Generation
// ============================================================================

/// Python module `i` with `functions` functions, each calling into the next
/// module so the project has cross-file imports, calls and one import cycle.
fn generate_module(i: usize, modules: usize, functions: usize) -> String {
    let next = (i + 1) % modules;
    let mut src = format!("from mod{next} import func{next}_0\n\n\n");
    src.push_str(&format!("class Service{i}:\n"));
    src.push_str("    def handle(self, items):\n");
    src.push_str("        total = 0\n");
    src.push_str("        for item in items:\n");
    src.push_str("            if item > 0 and item < 100:\n");
    src.push_str("                total += self.score(item)\n");
    src.push_str("        return total\n\n");
    src.push_str("    def score(self, item):\n");
    src.push_str("        return item * 2\n\n\n");
    for f in 0..functions {
        src.push_str(&format!("def func{i}_{f}(x):\n"));
        src.push_str("    if x is None:\n        return 0\n");
        if f + 1 < functions {
            src.push_str(&format!("    return func{i}_{}(x)\n\n\n", f + 1));
        } else {
            src.push_str(&format!("    return func{next}_0(x)\n\n\n"));
        }
    }
    src
}

fn generate_project(modules: usize, functions: usize) -> (Arc<MemoryProvider>, Vec<String>) {
    let provider = MemoryProvider::new();
    let mut files = Vec::with_capacity(modules);
    for i in 0..modules {
        let path = format!("mod{i}.py");
        provider.insert(path.clone(), generate_module(i, modules, functions));
        files.push(path);
    }
    (Arc::new(provider), files)
}

fn analyze(rt: &Runtime, provider: Arc<MemoryProvider>, files: &[String]) -> AnalysisSnapshot {
    let analyzer = Analyzer::new(AnalysisOptions::default()).unwrap();
    rt.block_on(analyzer.analyze_project("bench", files, provider, &CancellationFlag::new()))
        .unwrap()
}

// ============================================================================
// Benchmarks
// ============================================================================

fn bench_full_analysis(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("analyze_project");
    group.sample_size(20);

    for modules in [10usize, 50, 200] {
        let (provider, files) = generate_project(modules, 10);
        group.throughput(Throughput::Elements(modules as u64));
        group.bench_with_input(BenchmarkId::from_parameter(modules), &modules, |b, _| {
            let analyzer = Analyzer::new(AnalysisOptions::default()).unwrap();
            b.to_async(&rt).iter(|| {
                let analyzer = analyzer.clone();
                let provider = provider.clone();
                let files = files.clone();
                async move {
                    let snapshot = analyzer
                        .analyze_project("bench", &files, provider, &CancellationFlag::new())
                        .await
                        .unwrap();
                    black_box(snapshot.graph.symbol_count())
                }
            });
        });
    }
    group.finish();
}

fn bench_incremental(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let (provider, files) = generate_project(100, 10);
    let previous = analyze(&rt, provider.clone(), &files);
    provider.insert("mod0.py", generate_module(0, 100, 12));

    c.bench_function("reanalyze_one_changed_file", |b| {
        let analyzer = Analyzer::new(AnalysisOptions::default()).unwrap();
        b.to_async(&rt).iter(|| {
            let analyzer = analyzer.clone();
            let provider = provider.clone();
            let files = files.clone();
            let previous = &previous;
            async move {
                let snapshot = analyzer
                    .reanalyze(previous, &files, provider, &CancellationFlag::new())
                    .await
                    .unwrap();
                black_box(snapshot.stats.files_reused)
            }
        });
    });
}

fn bench_queries(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let (provider, files) = generate_project(200, 10);
    let snapshot = analyze(&rt, provider, &files);
    let graph = &snapshot.graph;
    let root = graph
        .symbols()
        .find(|s| s.name == "func0_0")
        .map(|s| s.id.clone())
        .unwrap();

    let mut group = c.benchmark_group("queries");
    group.bench_function("search_prefix", |b| {
        let query = SearchQuery::new("func1");
        b.iter(|| black_box(search(graph, &query).unwrap().len()))
    });
    group.bench_function("call_graph_depth_3", |b| {
        b.iter(|| black_box(call_graph(graph, &root, Some(3)).unwrap().nodes.len()))
    });
    group.bench_function("call_graph_unbounded", |b| {
        b.iter(|| black_box(call_graph(graph, &root, None).unwrap().nodes.len()))
    });
    group.bench_function("import_cycles", |b| {
        b.iter(|| black_box(find_cycles(graph, None).len()))
    });
    group.finish();
}

criterion_group!(benches, bench_full_analysis, bench_incremental, bench_queries);
criterion_main!(benches);
