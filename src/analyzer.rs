//! Analysis runs.
//!
//! A project run has three stages:
//! 1. per-file extraction (read, parse, normalize) on blocking worker tasks,
//!    at most `max_concurrency` at a time, results kept in input order
//! 2. a barrier: resolution starts once every file has finished
//! 3. cross-file resolution, graph assembly and project aggregates
//!
//! Per-file failures become diagnostics on the project. Invalid options and
//! cancellation abort the run without a project.

use crate::config::AnalysisOptions;
use crate::error::{AnalysisError, AnalysisResult, FileDiagnostic};
use crate::graph::SymbolGraph;
use crate::metrics::project::derive_project_metrics;
use crate::normalize::{NormalizeOptions, NormalizedFile, normalize};
use crate::parsing::AdapterRegistry;
use crate::provider::FileProvider;
use crate::query::{self, GraphView};
use crate::relations::{self, ResolutionStats};
use crate::types::*;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tracing::{debug, info, warn};

// ============================================================================
// Cancellation
// ============================================================================

/// Shared flag checked between files. Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

// ============================================================================
// Results
// ============================================================================

/// Result of analysing one file on its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileAnalysis {
    pub file: FileRecord,
    pub symbols: Vec<Symbol>,
    /// Edges resolvable within the file.
    pub relationships: Vec<Relationship>,
    pub unresolved: Vec<UnresolvedReference>,
}

/// Counters of one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RunStats {
    pub files_requested: usize,
    pub files_analyzed: usize,
    /// Files whose extraction was carried over from a previous snapshot.
    pub files_reused: usize,
    pub files_failed: usize,
    pub resolution: ResolutionStats,
    pub duration_ms: u64,
}

/// Summary record of an analysed project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    /// Sorted by path.
    pub files: Vec<FileRecord>,
    pub metrics: ProjectMetrics,
    pub errors: Vec<FileDiagnostic>,
    pub dependency_graph: Option<GraphView>,
    pub call_graph: Option<GraphView>,
    pub unresolved_count: usize,
}

/// Everything one project run produced. Immutable once built.
#[derive(Debug)]
pub struct AnalysisSnapshot {
    pub project: Project,
    pub graph: Arc<SymbolGraph>,
    /// Per-file extraction results, sorted by path, kept for incremental runs.
    pub files: Vec<Arc<NormalizedFile>>,
    pub options: AnalysisOptions,
    pub stats: RunStats,
}

impl AnalysisSnapshot {
    pub fn project_id(&self) -> &str {
        &self.project.id
    }

    pub fn normalized(&self, path: &str) -> Option<&Arc<NormalizedFile>> {
        self.files
            .binary_search_by(|f| f.path.as_str().cmp(path))
            .ok()
            .map(|i| &self.files[i])
    }
}

// ============================================================================
// Analyzer
// ============================================================================

/// Runs analyses with one set of options and adapters.
#[derive(Clone)]
pub struct Analyzer {
    registry: Arc<AdapterRegistry>,
    options: AnalysisOptions,
}

impl std::fmt::Debug for Analyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Analyzer")
            .field("languages", &self.registry.languages())
            .field("options", &self.options)
            .finish()
    }
}

impl Analyzer {
    /// Analyzer over every built-in language.
    pub fn new(options: AnalysisOptions) -> AnalysisResult<Self> {
        Self::with_registry(AdapterRegistry::with_defaults(), options)
    }

    pub fn with_registry(registry: AdapterRegistry, options: AnalysisOptions) -> AnalysisResult<Self> {
        options.validate()?;
        Ok(Self {
            registry: Arc::new(registry),
            options,
        })
    }

    pub fn options(&self) -> &AnalysisOptions {
        &self.options
    }

    pub fn registry(&self) -> &AdapterRegistry {
        &self.registry
    }

    fn normalize_options(&self) -> NormalizeOptions {
        NormalizeOptions {
            include_reads: self.options.include_relationships && self.options.include_references,
            tolerate_errors: self.options.tolerate_syntax_errors,
        }
    }

    /// Analyse one file in isolation. Only references resolvable inside the
    /// file become edges.
    pub fn analyze_file(
        &self,
        path: &str,
        language: Option<Language>,
        provider: &dyn FileProvider,
    ) -> AnalysisResult<FileAnalysis> {
        let path = relations::modules::normalize_path(path);
        let bytes = provider.read(&path)?;
        let file = Arc::new(extract(
            &self.registry,
            &path,
            language,
            bytes,
            self.normalize_options(),
        )?);

        let (relationships, unresolved, imports) = if self.options.include_relationships {
            let mut resolution = relations::resolve(std::slice::from_ref(&file));
            let imports = resolution.imports.pop().unwrap_or_default();
            (resolution.relationships, resolution.unresolved, imports)
        } else {
            (relations::contains_edges(&file).collect(), Vec::new(), Vec::new())
        };

        Ok(FileAnalysis {
            file: file_record(&file, imports),
            symbols: file.symbols.clone(),
            relationships,
            unresolved,
        })
    }

    /// Analyse a list of files as one project.
    pub async fn analyze_project(
        &self,
        name: &str,
        files: &[String],
        provider: Arc<dyn FileProvider>,
        cancel: &CancellationFlag,
    ) -> AnalysisResult<AnalysisSnapshot> {
        self.run(name, files, provider, cancel, None).await
    }

    /// Shared driver for full and incremental runs. With `previous`, files
    /// whose content hash is unchanged reuse their earlier extraction.
    pub(crate) async fn run(
        &self,
        name: &str,
        files: &[String],
        provider: Arc<dyn FileProvider>,
        cancel: &CancellationFlag,
        previous: Option<&AnalysisSnapshot>,
    ) -> AnalysisResult<AnalysisSnapshot> {
        let started = Instant::now();
        let paths = self.select_files(files)?;
        if cancel.is_cancelled() {
            return Err(AnalysisError::RunCancelled);
        }
        info!(project = name, files = paths.len(), "analysis started");

        let normalize_options = self.normalize_options();
        let reusable: Arc<HashMap<String, Arc<NormalizedFile>>> = Arc::new(
            previous
                .filter(|p| p.options == self.options)
                .map(|p| p.files.iter().map(|f| (f.path.clone(), Arc::clone(f))).collect())
                .unwrap_or_default(),
        );

        let mut results = stream::iter(paths.iter().cloned())
            .map(|path| {
                let registry = Arc::clone(&self.registry);
                let provider = Arc::clone(&provider);
                let reusable = Arc::clone(&reusable);
                let cancel = cancel.clone();
                async move {
                    if cancel.is_cancelled() {
                        return (path, Err(AnalysisError::RunCancelled));
                    }
                    let task_path = path.clone();
                    let outcome = tokio::task::spawn_blocking(
                        move || -> AnalysisResult<(Arc<NormalizedFile>, bool)> {
                            let bytes = provider.read(&task_path)?;
                            if let Some(old) = reusable.get(&task_path) {
                                if old.content_hash == content_hash(&bytes) {
                                    return Ok((Arc::clone(old), true));
                                }
                            }
                            extract(&registry, &task_path, None, bytes, normalize_options)
                                .map(|f| (Arc::new(f), false))
                        },
                    )
                    .await
                    .unwrap_or_else(|e| Err(AnalysisError::Internal(format!("worker failed: {e}"))));
                    (path, outcome)
                }
            })
            .buffered(self.options.max_concurrency);

        let mut stats = RunStats {
            files_requested: paths.len(),
            ..RunStats::default()
        };
        let mut extracted: Vec<Arc<NormalizedFile>> = Vec::with_capacity(paths.len());
        let mut errors = Vec::new();
        while let Some((path, outcome)) = results.next().await {
            if cancel.is_cancelled() {
                info!(project = name, "analysis cancelled");
                return Err(AnalysisError::RunCancelled);
            }
            match outcome {
                Ok((file, reused)) => {
                    debug!(path = %path, symbols = file.symbols.len(), reused, "file extracted");
                    stats.files_analyzed += 1;
                    stats.files_reused += usize::from(reused);
                    extracted.push(file);
                }
                Err(AnalysisError::RunCancelled) => return Err(AnalysisError::RunCancelled),
                Err(e) => {
                    warn!(path = %path, error = %e, "file skipped");
                    stats.files_failed += 1;
                    errors.push(FileDiagnostic::from_error(path, e));
                }
            }
        }

        let mut snapshot = self.assemble(name, extracted, errors);
        stats.resolution = snapshot.stats.resolution;
        stats.duration_ms = started.elapsed().as_millis() as u64;
        snapshot.stats = stats;
        info!(
            project = name,
            files = snapshot.project.files.len(),
            symbols = snapshot.graph.symbol_count(),
            relationships = snapshot.graph.relationship_count(),
            failed = stats.files_failed,
            duration_ms = stats.duration_ms,
            "analysis finished"
        );
        Ok(snapshot)
    }

    /// Normalize, dedupe, sort and filter the requested paths.
    fn select_files(&self, files: &[String]) -> AnalysisResult<Vec<String>> {
        if files.is_empty() {
            return Err(AnalysisError::InvalidInput("file list is empty".into()));
        }
        let filter = self.options.file_filter()?;
        let selected: BTreeSet<String> = files
            .iter()
            .map(|p| relations::modules::normalize_path(p))
            .filter(|p| !p.is_empty() && filter.accepts(p))
            .collect();
        if selected.is_empty() {
            return Err(AnalysisError::InvalidInput(
                "no files left after extension and exclude filters".into(),
            ));
        }
        Ok(selected.into_iter().collect())
    }

    /// Resolution, graph assembly and aggregates over extracted files.
    pub(crate) fn assemble(
        &self,
        name: &str,
        mut files: Vec<Arc<NormalizedFile>>,
        errors: Vec<FileDiagnostic>,
    ) -> AnalysisSnapshot {
        files.sort_by(|a, b| a.path.cmp(&b.path));

        let resolution = if self.options.include_relationships {
            relations::resolve(&files)
        } else {
            relations::Resolution {
                relationships: files.iter().flat_map(|f| relations::contains_edges(f)).collect(),
                imports: vec![Vec::new(); files.len()],
                ..relations::Resolution::default()
            }
        };
        debug!(
            sites = resolution.stats.sites,
            resolved = resolution.stats.resolved,
            unresolved = resolution.stats.unresolved,
            ambiguous = resolution.stats.ambiguous,
            "references resolved"
        );

        let records: Vec<FileRecord> = files
            .iter()
            .zip(&resolution.imports)
            .map(|(file, imports)| file_record(file, imports.clone()))
            .collect();

        let mut builder = SymbolGraph::builder();
        for file in &files {
            for symbol in &file.symbols {
                builder.add_symbol(symbol.clone());
            }
        }
        for record in &records {
            builder.add_file(record.clone());
        }
        for relationship in &resolution.relationships {
            builder.add_relationship(relationship.clone());
        }
        let unresolved_count = resolution.unresolved.len();
        for reference in resolution.unresolved {
            builder.add_unresolved(reference);
        }
        let graph = builder.build();

        let symbols: Vec<Symbol> = graph.symbols().cloned().collect();
        let relationships: Vec<Relationship> = graph.relationships().cloned().collect();
        let metrics = derive_project_metrics(
            &records,
            &symbols,
            &relationships,
            &self.options.thresholds,
        );

        let project = Project {
            id: project_id_for(name),
            name: name.to_string(),
            files: records,
            metrics,
            errors,
            dependency_graph: self
                .options
                .include_dependency_graph
                .then(|| query::dependency_graph(&graph)),
            call_graph: self
                .options
                .include_call_graph
                .then(|| query::project_call_graph(&graph)),
            unresolved_count,
        };

        AnalysisSnapshot {
            project,
            graph: Arc::new(graph),
            files,
            options: self.options.clone(),
            stats: RunStats {
                resolution: resolution.stats,
                ..RunStats::default()
            },
        }
    }
}

/// Read-independent extraction of one file: adapter lookup, parse, normalize.
fn extract(
    registry: &AdapterRegistry,
    path: &str,
    language: Option<Language>,
    bytes: Vec<u8>,
    options: NormalizeOptions,
) -> AnalysisResult<NormalizedFile> {
    let adapter = registry.resolve(path, language.map(|l| l.as_str()))?;
    let parsed = adapter.parse(path, bytes, options.tolerate_errors)?;
    Ok(normalize(&parsed, adapter.normalizer(), options))
}

/// File record from an extracted file and its resolved imports.
pub fn file_record(file: &NormalizedFile, imports: Vec<SymbolId>) -> FileRecord {
    let module = file.module();
    let (complexity, cognitive_complexity) = file.complexity();
    FileRecord {
        path: file.path.clone(),
        language: file.language,
        total_lines: file.lines.total,
        code_lines: file.lines.code,
        comment_lines: file.lines.comment,
        blank_lines: file.lines.blank,
        size_bytes: file.size_bytes,
        content_hash: file.content_hash.clone(),
        complexity,
        cognitive_complexity,
        maintainability_index: module.metrics.maintainability_index,
        module_id: module.id.clone(),
        symbols: file.symbols.iter().map(|s| s.id.clone()).collect(),
        imports,
        exports: file.exported().map(|s| s.id.clone()).collect(),
        incomplete: file.incomplete,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::MemoryProvider;
    use pretty_assertions::assert_eq;

    fn provider(files: &[(&str, &str)]) -> Arc<MemoryProvider> {
        let provider = MemoryProvider::new();
        for (path, src) in files {
            provider.insert(*path, *src);
        }
        Arc::new(provider)
    }

    fn paths(files: &[(&str, &str)]) -> Vec<String> {
        files.iter().map(|(p, _)| p.to_string()).collect()
    }

    #[test]
    fn test_analyze_file_record() {
        let provider = provider(&[(
            "calc.py",
            "# helpers\n\ndef add(a, b):\n    return a + b\n\n\ndef twice(x):\n    return add(x, x)\n",
        )]);
        let analyzer = Analyzer::new(AnalysisOptions::default()).unwrap();
        let analysis = analyzer.analyze_file("calc.py", None, provider.as_ref()).unwrap();

        assert_eq!(analysis.file.language, Language::Python);
        assert_eq!(analysis.file.total_lines, 8);
        assert_eq!(analysis.file.comment_lines, 1);
        assert_eq!(analysis.file.blank_lines, 3);
        assert_eq!(analysis.file.complexity, 2);
        assert_eq!(analysis.file.symbols.len(), 3);
        assert_eq!(analysis.file.exports.len(), 2);
        assert!(
            analysis
                .relationships
                .iter()
                .any(|r| r.kind == RelationType::Calls)
        );
    }

    #[test]
    fn test_analyze_file_errors() {
        let provider = provider(&[("notes.txt", "hello"), ("bad.js", "let s = ('open;\n")]);
        let analyzer = Analyzer::new(AnalysisOptions::default()).unwrap();
        assert!(matches!(
            analyzer.analyze_file("missing.py", None, provider.as_ref()),
            Err(AnalysisError::FileNotFound { .. })
        ));
        assert!(matches!(
            analyzer.analyze_file("notes.txt", None, provider.as_ref()),
            Err(AnalysisError::UnsupportedLanguage { .. })
        ));
        assert!(matches!(
            analyzer.analyze_file("bad.js", None, provider.as_ref()),
            Err(AnalysisError::ParseFailure { .. })
        ));
        // explicit language wins over the extension
        let analysis = analyzer
            .analyze_file("notes.txt", Some(Language::Python), provider.as_ref());
        assert!(analysis.is_ok());
    }

    #[test]
    fn test_deeply_nested_input_does_not_exhaust_the_stack() {
        let depth = 3000;
        let deep = format!("def deep():\n    return {}1{}\n", "(".repeat(depth), ")".repeat(depth));
        let broken = format!("def deep():\n    return {}1{}\n", "(".repeat(depth), ")".repeat(depth - 1));
        let provider = provider(&[("deep.py", deep.as_str()), ("broken.py", broken.as_str())]);
        let analyzer = Analyzer::new(AnalysisOptions::default()).unwrap();

        let analysis = analyzer.analyze_file("deep.py", None, provider.as_ref()).unwrap();
        let function = analysis.symbols.iter().find(|s| s.name == "deep").unwrap();
        assert_eq!(function.metrics.cyclomatic, 1);

        assert!(matches!(
            analyzer.analyze_file("broken.py", None, provider.as_ref()),
            Err(AnalysisError::ParseFailure { .. })
        ));
    }

    #[tokio::test]
    async fn test_project_run_collects_diagnostics() {
        let files = [
            ("b.py", "def helper():\n    return 1\n"),
            ("a.py", "from b import helper\n\ndef main():\n    return helper()\n"),
            ("README.md", "# readme\n"),
        ];
        let analyzer = Analyzer::new(AnalysisOptions::default()).unwrap();
        let snapshot = analyzer
            .analyze_project("demo", &paths(&files), provider(&files), &CancellationFlag::new())
            .await
            .unwrap();

        let project = &snapshot.project;
        let names: Vec<&str> = project.files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(names, vec!["a.py", "b.py"]);
        assert_eq!(project.errors.len(), 1);
        assert_eq!(project.errors[0].severity, crate::error::Severity::Warning);
        assert_eq!(project.id, project_id_for("demo"));
        assert_eq!(snapshot.stats.files_analyzed, 2);
        assert_eq!(snapshot.stats.files_failed, 1);
        assert!(project.dependency_graph.is_some());
        assert!(project.call_graph.is_none());
        assert_eq!(project.metrics.total_files, 2);
        assert!(snapshot.graph.validate().is_ok());
    }

    #[tokio::test]
    async fn test_invalid_input_and_cancellation() {
        let files = [("a.py", "x = 1\n")];
        let analyzer = Analyzer::new(AnalysisOptions::default()).unwrap();
        let result = analyzer
            .analyze_project("p", &[], provider(&files), &CancellationFlag::new())
            .await;
        assert!(matches!(result, Err(AnalysisError::InvalidInput(_))));

        let cancel = CancellationFlag::new();
        cancel.cancel();
        let result = analyzer
            .analyze_project("p", &paths(&files), provider(&files), &cancel)
            .await;
        assert!(matches!(result, Err(AnalysisError::RunCancelled)));

        let filtered = Analyzer::new(AnalysisOptions::new().with_extensions(["go"])).unwrap();
        let result = filtered
            .analyze_project("p", &paths(&files), provider(&files), &CancellationFlag::new())
            .await;
        assert!(matches!(result, Err(AnalysisError::InvalidInput(_))));
    }

    #[test]
    fn test_invalid_options_rejected_up_front() {
        let options = AnalysisOptions::new().with_concurrency(0);
        assert!(matches!(
            Analyzer::new(options),
            Err(AnalysisError::InvalidInput(_))
        ));
    }
}
