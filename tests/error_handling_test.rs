//! Error handling tests.
//!
//! Run-level failures abort with an error; per-file failures become
//! diagnostics on the project and the run goes on.

use codegraph::*;
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

async fn run(options: AnalysisOptions, files: &[&str], provider: Arc<dyn FileProvider>) -> AnalysisResult<AnalysisSnapshot> {
    let files: Vec<String> = files.iter().map(|f| f.to_string()).collect();
    Analyzer::new(options)?
        .analyze_project("errors", &files, provider, &CancellationFlag::new())
        .await
}

#[tokio::test]
async fn invalid_options_are_rejected() {
    let cases = [
        AnalysisOptions::default().with_concurrency(0),
        AnalysisOptions::default().with_excludes(["src/[oops"]),
        AnalysisOptions::default()
            .with_relationships(false)
            .with_call_graph(true),
        AnalysisOptions::default().with_thresholds(ComplexityThresholds {
            high_complexity: 0,
            high_cognitive: 15,
        }),
    ];
    for options in cases {
        let provider = Arc::new(MemoryProvider::new().with_file("a.py", "x = 1\n"));
        let result = run(options, &["a.py"], provider).await;
        assert!(matches!(result, Err(AnalysisError::InvalidInput(_))));
    }
}

#[tokio::test]
async fn empty_or_fully_filtered_lists_are_invalid() {
    let provider = Arc::new(MemoryProvider::new().with_file("a.py", "x = 1\n"));
    let result = run(AnalysisOptions::default(), &[], provider.clone()).await;
    assert!(matches!(result, Err(AnalysisError::InvalidInput(_))));

    let options = AnalysisOptions::default().with_excludes(["**/*.py"]);
    let result = run(options, &["a.py"], provider).await;
    assert!(matches!(result, Err(AnalysisError::InvalidInput(_))));
}

#[tokio::test]
async fn per_file_failures_become_diagnostics() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("ok.go"), "package ok\n\nfunc Ok() {}\n").unwrap();
    fs::write(dir.path().join("notes.txt"), "plain text\n").unwrap();
    fs::write(dir.path().join("broken.rs"), "fn main( {\n").unwrap();

    let provider = Arc::new(FsProvider::with_root(dir.path()));
    let snapshot = run(
        AnalysisOptions::default(),
        &["ok.go", "notes.txt", "broken.rs", "missing.py"],
        provider,
    )
    .await
    .unwrap();

    let project = &snapshot.project;
    assert_eq!(project.files.len(), 1);
    let kinds: Vec<(&str, Severity)> = project
        .errors
        .iter()
        .map(|d| (d.path.as_str(), d.severity))
        .collect();
    assert_eq!(
        kinds,
        vec![
            ("broken.rs", Severity::Error),
            ("missing.py", Severity::Error),
            ("notes.txt", Severity::Warning),
        ]
    );
    assert!(matches!(project.errors[0].error, AnalysisError::ParseFailure { .. }));
    assert!(matches!(project.errors[1].error, AnalysisError::FileNotFound { .. }));
    assert!(matches!(project.errors[2].error, AnalysisError::UnsupportedLanguage { .. }));
    assert_eq!(snapshot.stats.files_failed, 3);
}

#[tokio::test]
async fn all_files_failing_still_yields_a_project() {
    let provider = Arc::new(MemoryProvider::new());
    let snapshot = run(AnalysisOptions::default(), &["gone.py"], provider)
        .await
        .unwrap();
    assert!(snapshot.project.files.is_empty());
    assert_eq!(snapshot.project.errors.len(), 1);
    assert_eq!(snapshot.project.metrics.total_files, 0);
}

#[test]
fn errors_serialize_with_kind_and_detail() {
    let err = AnalysisError::FileNotFound {
        path: "src/a.py".into(),
    };
    let value: Value = serde_json::to_value(&err).unwrap();
    assert_eq!(
        value,
        json!({"kind": "file_not_found", "detail": {"path": "src/a.py"}})
    );

    let diagnostic = FileDiagnostic::from_error("README.md", AnalysisError::UnsupportedLanguage {
        path: "README.md".into(),
        tag: "md".into(),
    });
    let value: Value = serde_json::to_value(&diagnostic).unwrap();
    assert_eq!(value["severity"], "warning");
    assert_eq!(value["error"]["kind"], "unsupported_language");

    let back: FileDiagnostic = serde_json::from_value(value).unwrap();
    assert_eq!(back, diagnostic);
}

#[test]
fn config_file_errors_are_reported() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("options.json");
    assert!(matches!(
        AnalysisOptions::from_json_file(&path),
        Err(AnalysisError::Io { .. })
    ));

    fs::write(&path, "{ not json").unwrap();
    assert!(matches!(
        AnalysisOptions::from_json_file(&path),
        Err(AnalysisError::InvalidInput(_))
    ));

    fs::write(&path, r#"{"max_concurrency": 2, "extensions": ["py"]}"#).unwrap();
    let options = AnalysisOptions::from_json_file(&path).unwrap();
    assert_eq!(options.max_concurrency, 2);
    assert_eq!(options.extensions, vec!["py".to_string()]);
    assert!(options.include_relationships);
}
