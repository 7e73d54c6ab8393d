//! End-to-end analysis scenarios.
//!
//! Each test runs a whole project through the analyzer and checks the
//! resulting graph, metrics and diagnostics.

use codegraph::query::{self, find_cycles};
use codegraph::*;
use pretty_assertions::assert_eq;
use std::fs;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;

// ============================================================================
// Helpers
// ============================================================================

fn memory(files: &[(&str, &str)]) -> Arc<MemoryProvider> {
    let provider = MemoryProvider::new();
    for (path, src) in files {
        provider.insert(*path, *src);
    }
    Arc::new(provider)
}

fn paths(files: &[(&str, &str)]) -> Vec<String> {
    files.iter().map(|(p, _)| p.to_string()).collect()
}

async fn analyze(files: &[(&str, &str)], options: AnalysisOptions) -> AnalysisSnapshot {
    Analyzer::new(options)
        .unwrap()
        .analyze_project("scenario", &paths(files), memory(files), &CancellationFlag::new())
        .await
        .unwrap()
}

fn symbol<'g>(graph: &'g SymbolGraph, path: &str, qualified: &str) -> &'g Symbol {
    graph
        .symbols()
        .find(|s| s.file_path == path && s.qualified_name == qualified)
        .unwrap_or_else(|| panic!("no symbol {qualified} in {path}"))
}

// ============================================================================
// Scenarios
// ============================================================================

#[tokio::test]
async fn two_files_import_and_call() {
    let files = [
        ("a.py", "from b import helper\n\ndef main():\n    helper()\n"),
        ("b.py", "def helper():\n    return 1\n"),
    ];
    let snapshot = analyze(&files, AnalysisOptions::default().with_call_graph(true)).await;
    let graph = &snapshot.graph;
    let main = symbol(graph, "a.py", "main");
    let helper = symbol(graph, "b.py", "helper");

    let calls = graph.outgoing(&main.id, Some(RelationType::Calls));
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].target, helper.id);
    assert_eq!(calls[0].confidence, 1.0);

    let deps = snapshot.project.dependency_graph.as_ref().unwrap();
    assert_eq!(deps.nodes.len(), 2);
    assert_eq!(deps.edges.len(), 1);
    assert_eq!(deps.edges[0].source, graph.module_of("a.py").unwrap().id);
    assert_eq!(deps.edges[0].target, graph.module_of("b.py").unwrap().id);

    let calls = snapshot.project.call_graph.as_ref().unwrap();
    assert!(calls.edge(&main.id, &helper.id).is_some());

    let a = graph.file("a.py").unwrap();
    assert_eq!(a.imports, vec![helper.id.clone()]);
    assert_eq!(snapshot.project.unresolved_count, 0);
    assert!(snapshot.project.errors.is_empty());
    assert!(graph.validate().is_ok());
}

#[tokio::test]
async fn three_ifs_and_a_loop_score_five() {
    let src = "def f(x):\n    if x > 0:\n        pass\n    if x > 1:\n        pass\n    if x > 2:\n        pass\n    for i in range(x):\n        pass\n";
    let snapshot = analyze(&[("f.py", src)], AnalysisOptions::default()).await;
    let f = symbol(&snapshot.graph, "f.py", "f");
    assert_eq!(f.metrics.cyclomatic, 5);
    assert_eq!(snapshot.project.metrics.max_complexity, 5);
    assert_eq!(snapshot.project.files[0].complexity, 5);
}

#[tokio::test]
async fn mutual_import_is_one_cycle() {
    let files = [
        ("a.py", "from b import g\n\ndef f():\n    return g()\n"),
        ("b.py", "from a import f\n\ndef g():\n    return 1\n"),
    ];
    let snapshot = analyze(&files, AnalysisOptions::default()).await;
    let cycles = find_cycles(&snapshot.graph, None);
    assert_eq!(cycles.len(), 1);
    assert_eq!(cycles[0].edge_type, RelationType::Imports);
    assert_eq!(cycles[0].files, vec!["a.py".to_string(), "b.py".to_string()]);
    assert_eq!(cycles[0].component_size, 2);

    // calls only run one way
    assert!(find_cycles(&snapshot.graph, Some(RelationType::Calls)).is_empty());
}

#[tokio::test]
async fn cycles_through_a_shared_file_are_reported_separately() {
    let files = [
        ("a.py", "from b import g\n\ndef f():\n    return g()\n"),
        ("b.py", "from a import f\nfrom c import h\n\ndef g():\n    return h()\n"),
        ("c.py", "from b import g\n\ndef h():\n    return 1\n"),
    ];
    let snapshot = analyze(&files, AnalysisOptions::default()).await;
    let cycles = find_cycles(&snapshot.graph, None);
    let names: Vec<Vec<String>> = cycles.iter().map(|c| c.names.clone()).collect();
    assert_eq!(
        names,
        vec![
            vec!["a.py".to_string(), "b.py".to_string()],
            vec!["b.py".to_string(), "c.py".to_string()],
        ]
    );
    assert!(cycles.iter().all(|c| c.component_size == 3));
}

#[tokio::test]
async fn unterminated_string_is_a_diagnostic_not_a_failure() {
    let files = [
        ("good.py", "def ok():\n    return 1\n"),
        ("bad.py", "print(\"unterminated\n"),
    ];
    let snapshot = analyze(&files, AnalysisOptions::default()).await;
    let project = &snapshot.project;

    assert_eq!(project.files.len(), 1);
    assert_eq!(project.files[0].path, "good.py");
    assert_eq!(project.errors.len(), 1);
    assert_eq!(project.errors[0].path, "bad.py");
    assert_eq!(project.errors[0].severity, Severity::Error);
    assert!(matches!(
        project.errors[0].error,
        AnalysisError::ParseFailure { .. }
    ));
}

#[tokio::test]
async fn tolerant_run_keeps_partial_file() {
    let files = [("bad.py", "def ok():\n    return 1\n\ndef broken(:\n    pass\n")];
    let snapshot = analyze(&files, AnalysisOptions::default().with_tolerate_syntax_errors(true)).await;
    let record = snapshot.graph.file("bad.py").unwrap();
    assert!(record.incomplete);
    assert!(snapshot.project.errors.is_empty());
    assert_eq!(symbol(&snapshot.graph, "bad.py", "ok").kind, SymbolKind::Function);
}

#[tokio::test]
async fn broken_callable_scores_zero_and_is_flagged() {
    let src = "def ok():\n    return 1\n\n\ndef broken(x):\n    y = x +\n    return y\n";
    let snapshot = analyze(&[("bad.py", src)], AnalysisOptions::default().with_tolerate_syntax_errors(true)).await;
    let graph = &snapshot.graph;

    let ok = symbol(graph, "bad.py", "ok");
    assert!(!ok.metrics.incomplete);
    assert_eq!(ok.metrics.cyclomatic, 1);

    let broken: Vec<&Symbol> = graph
        .symbols()
        .filter(|s| s.kind.is_callable() && s.metrics.incomplete)
        .collect();
    assert!(!broken.is_empty());
    for s in broken {
        assert_eq!(s.metrics.cyclomatic, 0, "{}", s.qualified_name);
        assert_eq!(s.metrics.cognitive, 0, "{}", s.qualified_name);
    }
}

/// Cancels the run from inside the provider once `after` files were read.
struct CancelAfter {
    inner: MemoryProvider,
    cancel: CancellationFlag,
    reads: AtomicUsize,
    after: usize,
}

impl FileProvider for CancelAfter {
    fn read(&self, path: &str) -> AnalysisResult<Vec<u8>> {
        if self.reads.fetch_add(1, Ordering::SeqCst) + 1 == self.after {
            self.cancel.cancel();
        }
        self.inner.read(path)
    }
}

#[tokio::test]
async fn cancelling_between_files_stops_the_run() {
    let cancel = CancellationFlag::new();
    let inner = MemoryProvider::new();
    let mut files = Vec::new();
    for i in 0..6 {
        let path = format!("m{i}.py");
        inner.insert(path.clone(), format!("def f{i}():\n    return {i}\n"));
        files.push(path);
    }
    let provider = Arc::new(CancelAfter {
        inner,
        cancel: cancel.clone(),
        reads: AtomicUsize::new(0),
        after: 2,
    });

    let result = Analyzer::new(AnalysisOptions::default().with_concurrency(1))
        .unwrap()
        .analyze_project("p", &files, provider.clone(), &cancel)
        .await;
    assert!(matches!(result, Err(AnalysisError::RunCancelled)));
    assert!(provider.reads.load(Ordering::SeqCst) < files.len());
}

#[tokio::test]
async fn rust_inline_modules_nest_under_the_file() {
    let files = [("src/lib.rs", "mod inner {\n    pub fn f() {}\n}\n\npub fn g() {\n    inner::f();\n}\n")];
    let snapshot = analyze(&files, AnalysisOptions::default()).await;
    let graph = &snapshot.graph;
    assert!(graph.validate().is_ok(), "{:?}", graph.validate());

    let root = graph.module_of("src/lib.rs").unwrap();
    assert!(root.is_file_module());
    let inner = symbol(graph, "src/lib.rs", "inner");
    assert_eq!(inner.kind, SymbolKind::Module);
    assert!(!inner.is_file_module());
    assert_eq!(inner.parent.as_ref(), Some(&root.id));

    let f = symbol(graph, "src/lib.rs", "inner.f");
    let g = symbol(graph, "src/lib.rs", "g");
    let calls = graph.outgoing(&g.id, Some(RelationType::Calls));
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].target, f.id);
    assert_eq!(snapshot.project.metrics.total_files, 1);
}

#[tokio::test]
async fn cancelled_run_returns_no_project() {
    let files = [("a.py", "x = 1\n")];
    let cancel = CancellationFlag::new();
    cancel.cancel();
    let result = Analyzer::new(AnalysisOptions::default())
        .unwrap()
        .analyze_project("p", &paths(&files), memory(&files), &cancel)
        .await;
    assert!(matches!(result, Err(AnalysisError::RunCancelled)));
}

#[tokio::test]
async fn mixed_languages_on_disk() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    fs::create_dir_all(root.join("web")).unwrap();
    fs::create_dir_all(root.join("svc")).unwrap();
    fs::write(
        root.join("web/util.js"),
        "export function clamp(v) {\n  if (v < 0) {\n    return 0;\n  }\n  return v;\n}\n",
    )
    .unwrap();
    fs::write(
        root.join("web/app.js"),
        "import { clamp } from './util';\n\nexport function render(v) {\n  return clamp(v);\n}\n",
    )
    .unwrap();
    fs::write(
        root.join("svc/main.go"),
        "package main\n\nfunc main() {\n\trun()\n}\n\nfunc run() {}\n",
    )
    .unwrap();
    fs::write(root.join("README.md"), "# demo\n").unwrap();

    let analyzer = Analyzer::new(AnalysisOptions::default()).unwrap();
    let files = FileDiscovery::new()
        .with_extensions(analyzer.registry().extensions())
        .discover(root)
        .unwrap();
    assert_eq!(files, vec!["svc/main.go", "web/app.js", "web/util.js"]);

    let snapshot = analyzer
        .analyze_project(
            "mixed",
            &files,
            Arc::new(FsProvider::with_root(root)),
            &CancellationFlag::new(),
        )
        .await
        .unwrap();
    let graph = &snapshot.graph;
    let metrics = &snapshot.project.metrics;
    assert_eq!(metrics.total_files, 3);
    assert_eq!(metrics.language_distribution.get(&Language::Go), Some(&1));
    assert_eq!(metrics.language_distribution.get(&Language::JavaScript), Some(&2));

    let render = symbol(graph, "web/app.js", "render");
    let clamp = symbol(graph, "web/util.js", "clamp");
    let callees = query::callees(graph, &render.id).unwrap();
    assert_eq!(callees[0].id, clamp.id);
    assert_eq!(clamp.metrics.cyclomatic, 2);

    let main = symbol(graph, "svc/main.go", "main");
    let view = query::call_graph(graph, &main.id, None).unwrap();
    assert_eq!(view.nodes.len(), 2);
}

#[tokio::test]
async fn relationships_can_be_disabled() {
    let files = [
        ("a.py", "from b import helper\n\ndef main():\n    helper()\n"),
        ("b.py", "def helper():\n    return 1\n"),
    ];
    let options = AnalysisOptions::default()
        .with_relationships(false)
        .with_dependency_graph(false);
    let snapshot = analyze(&files, options).await;
    assert!(
        snapshot
            .graph
            .relationships()
            .all(|r| r.kind == RelationType::Contains)
    );
    assert!(snapshot.project.dependency_graph.is_none());
    assert!(snapshot.graph.validate().is_ok());
}
