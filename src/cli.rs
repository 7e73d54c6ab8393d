//! codegraph - CLI for the code analysis engine
//!
//! Analyses a workspace on every invocation and answers one question about it.
//!
//! # Usage
//!
//! ```bash
//! # Project summary: files, metrics, diagnostics
//! codegraph analyze --workspace /path/to/repo
//!
//! # One file on its own
//! codegraph file src/main.py
//!
//! # Ranked symbol search
//! codegraph search Analyzer --kind class
//!
//! # Call graph of a symbol, two hops deep
//! codegraph calls handle_request --depth 2
//!
//! # File dependencies and import cycles
//! codegraph deps
//! codegraph cycles
//! ```
//!
//! Symbols are named by id, qualified name or plain name; a plain name picks
//! the best search hit. `--json` prints machine-readable output. Errors go to
//! stderr, results to stdout. Exit codes: 0 = success, 1 = error.

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use codegraph::query::{self, Cycle, GraphView, ImpactReport, RelatedSymbol, SymbolReference};
use codegraph::search::{self, SearchHit, SearchQuery};
use codegraph::{
    AnalysisOptions, AnalysisSnapshot, Analyzer, CancellationFlag,
    FileAnalysis, FileDiagnostic, FileDiscovery, FsProvider, Language, Project, RelationType,
    Symbol, SymbolGraph, SymbolId, SymbolKind,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "codegraph")]
#[command(version)]
#[command(about = "Multi-language code analysis: symbols, metrics, call and dependency graphs")]
#[command(long_about = r#"
codegraph parses Python, JavaScript, TypeScript, Go and Rust sources into one
symbol graph and answers questions about it:

  - complexity and maintainability metrics per symbol, file and project
  - call graphs, file dependency graphs and circular dependencies
  - ranked symbol search, related symbols and change impact

Designed for automation: use --json for machine-readable output.
"#)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Workspace directory to analyze
    #[arg(short, long, global = true, default_value = ".")]
    workspace: PathBuf,

    /// Output JSON instead of human-readable text
    #[arg(long, global = true)]
    json: bool,

    /// Analysis options as JSON; flags below override it
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Files analysed in parallel (default: $CODEGRAPH_CONCURRENCY or CPU count)
    #[arg(long, global = true)]
    concurrency: Option<usize>,

    /// Only analyse these extensions (repeatable)
    #[arg(long = "ext", global = true)]
    extensions: Vec<String>,

    /// Skip paths matching this glob (repeatable)
    #[arg(long = "exclude", global = true)]
    excludes: Vec<String>,

    /// Keep partial results from files with syntax errors
    #[arg(long, global = true)]
    tolerant: bool,

    /// Record variable and field reads as REFERENCES edges
    #[arg(long, global = true)]
    references: bool,

    /// Debug logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyse the workspace and print a project summary
    Analyze {
        /// Also list every file with its metrics
        #[arg(long)]
        files: bool,
    },

    /// Analyse one file on its own
    File {
        /// Path relative to the workspace
        path: String,

        /// Language tag overriding the extension (python, javascript, ...)
        #[arg(long)]
        language: Option<String>,
    },

    /// Ranked symbol search
    Search {
        /// Search text
        query: String,

        /// Restrict to symbol kinds (repeatable)
        #[arg(short, long)]
        kind: Vec<String>,

        /// Only exact name matches
        #[arg(long)]
        exact: bool,

        /// Case-sensitive matching
        #[arg(long)]
        case_sensitive: bool,

        /// Maximum results to return
        #[arg(short = 'n', long, default_value = "20")]
        limit: usize,

        /// Skip this many results before the limit applies
        #[arg(long, default_value = "0")]
        offset: usize,
    },

    /// Call graph, callers or callees of a symbol
    Calls {
        /// Symbol id, qualified name or name
        symbol: String,

        /// Direction: graph, callers or callees
        #[arg(short, long, default_value = "graph")]
        direction: String,

        /// Maximum call depth for the graph
        #[arg(long)]
        depth: Option<usize>,
    },

    /// File-level dependency graph
    Deps,

    /// Circular dependencies
    Cycles {
        /// Edge type (IMPORTS, CALLS, EXTENDS, ...)
        #[arg(long, default_value = "IMPORTS")]
        edge_type: String,
    },

    /// Symbols affected by a change to a symbol
    Impact {
        /// Symbol id, qualified name or name
        symbol: String,

        /// Maximum reverse distance
        #[arg(long)]
        depth: Option<usize>,
    },

    /// Direct neighbors and reference sites of a symbol
    Related {
        /// Symbol id, qualified name or name
        symbol: String,

        /// Maximum neighbors
        #[arg(short = 'n', long, default_value = "20")]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging (only to stderr to keep stdout clean)
    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .init();

    let workspace = cli.workspace.clone();
    let workspace = workspace.canonicalize().unwrap_or(workspace);

    match run_command(&cli, &workspace).await {
        Ok(output) => {
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&output)?);
            } else {
                print_human_readable(&output);
            }
            Ok(())
        }
        Err(e) => {
            if cli.json {
                let err = serde_json::json!({
                    "error": format!("{e:#}")
                });
                eprintln!("{}", serde_json::to_string_pretty(&err)?);
            } else {
                eprintln!("Error: {e:#}");
            }
            std::process::exit(1);
        }
    }
}

/// Config file first, then flag overrides.
fn load_options(cli: &Cli) -> Result<AnalysisOptions> {
    let mut options = match &cli.config {
        Some(path) => AnalysisOptions::from_json_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => AnalysisOptions::default(),
    };
    if let Some(n) = cli.concurrency {
        options = options.with_concurrency(n);
    }
    if !cli.extensions.is_empty() {
        options = options.with_extensions(cli.extensions.iter().cloned());
    }
    if !cli.excludes.is_empty() {
        let mut patterns = options.exclude_patterns.clone();
        patterns.extend(cli.excludes.iter().cloned());
        options = options.with_excludes(patterns);
    }
    if cli.tolerant {
        options = options.with_tolerate_syntax_errors(true);
    }
    if cli.references {
        options = options.with_references(true);
    }
    Ok(options)
}

async fn analyze_workspace(analyzer: &Analyzer, workspace: &Path) -> Result<AnalysisSnapshot> {
    let discovery = FileDiscovery::new()
        .with_extensions(analyzer.registry().extensions())
        .discover(workspace)
        .with_context(|| format!("Failed to list files in {}", workspace.display()))?;
    let name = workspace
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| workspace.display().to_string());
    let provider = Arc::new(FsProvider::with_root(workspace));
    analyzer
        .analyze_project(&name, &discovery, provider, &CancellationFlag::new())
        .await
        .with_context(|| format!("Failed to analyze {}", workspace.display()))
}

/// Find a symbol by id, then qualified name, then best name match.
fn resolve_symbol(graph: &SymbolGraph, text: &str) -> Result<SymbolId> {
    let id = SymbolId(text.to_string());
    if graph.contains(&id) {
        return Ok(id);
    }
    if let Some(symbol) = graph.symbols().find(|s| s.qualified_name == text) {
        return Ok(symbol.id.clone());
    }
    search::search(graph, &SearchQuery::new(text).exact(true).with_limit(1))?
        .into_iter()
        .next()
        .map(|hit| hit.symbol.id)
        .ok_or_else(|| anyhow!("No symbol named {text:?}"))
}

fn symbol_label(graph: &SymbolGraph, id: &SymbolId) -> String {
    graph
        .symbol(id)
        .map(|s| format!("{} ({}) at {}:{}", display_name(s), s.kind, s.file_path, s.location.start_line))
        .unwrap_or_else(|| id.to_string())
}

fn display_name(symbol: &Symbol) -> &str {
    if symbol.is_file_module() {
        &symbol.file_path
    } else {
        &symbol.qualified_name
    }
}

async fn run_command(cli: &Cli, workspace: &Path) -> Result<Output> {
    let analyzer = Analyzer::new(load_options(cli)?).context("Invalid analysis options")?;

    match &cli.command {
        Commands::Analyze { files } => {
            let snapshot = analyze_workspace(&analyzer, workspace).await?;
            let mut project = snapshot.project.clone();
            if !files {
                project.files.clear();
            }
            Ok(Output::Analyze {
                symbols: snapshot.graph.symbol_count(),
                relationships: snapshot.graph.relationship_count(),
                cycles: query::find_cycles(&snapshot.graph, None).len(),
                project: Box::new(project),
            })
        }
        Commands::File { path, language } => {
            let language = match language {
                Some(tag) => Some(
                    Language::from_tag(tag).ok_or_else(|| anyhow!("Unknown language {tag:?}"))?,
                ),
                None => None,
            };
            let provider = FsProvider::with_root(workspace);
            let analysis = analyzer
                .analyze_file(path, language, &provider)
                .with_context(|| format!("Failed to analyze {path}"))?;
            Ok(Output::File {
                analysis: Box::new(analysis),
            })
        }
        Commands::Search {
            query,
            kind,
            exact,
            case_sensitive,
            limit,
            offset,
        } => {
            let kinds = kind
                .iter()
                .map(|k| SymbolKind::from_tag(k).ok_or_else(|| anyhow!("Unknown symbol kind {k:?}")))
                .collect::<Result<Vec<_>>>()?;
            let search_query = SearchQuery::new(query.clone())
                .with_kinds(kinds)
                .exact(*exact)
                .case_sensitive(*case_sensitive)
                .with_limit(*limit)
                .with_offset(*offset);
            let snapshot = analyze_workspace(&analyzer, workspace).await?;
            Ok(Output::Search {
                query: query.clone(),
                results: search::search(&snapshot.graph, &search_query)?,
            })
        }
        Commands::Calls {
            symbol,
            direction,
            depth,
        } => {
            let snapshot = analyze_workspace(&analyzer, workspace).await?;
            let graph = &snapshot.graph;
            let id = resolve_symbol(graph, symbol)?;
            let label = symbol_label(graph, &id);
            match direction.as_str() {
                "graph" => Ok(Output::CallGraph {
                    symbol: label,
                    view: query::call_graph(graph, &id, *depth)?,
                }),
                "callers" | "callees" => {
                    let found = if direction == "callers" {
                        query::callers(graph, &id)?
                    } else {
                        query::callees(graph, &id)?
                    };
                    Ok(Output::Calls {
                        symbol: label,
                        direction: direction.clone(),
                        results: found.into_iter().map(|s| symbol_label(graph, &s.id)).collect(),
                    })
                }
                _ => Err(anyhow!("Direction must be 'graph', 'callers' or 'callees'")),
            }
        }
        Commands::Deps => {
            let snapshot = analyze_workspace(&analyzer, workspace).await?;
            Ok(Output::Deps {
                view: query::dependency_graph(&snapshot.graph),
            })
        }
        Commands::Cycles { edge_type } => {
            let edge_type = RelationType::from_tag(edge_type)
                .ok_or_else(|| anyhow!("Unknown edge type {edge_type:?}"))?;
            let snapshot = analyze_workspace(&analyzer, workspace).await?;
            Ok(Output::Cycles {
                cycles: query::find_cycles(&snapshot.graph, Some(edge_type)),
            })
        }
        Commands::Impact { symbol, depth } => {
            let snapshot = analyze_workspace(&analyzer, workspace).await?;
            let id = resolve_symbol(&snapshot.graph, symbol)?;
            Ok(Output::Impact {
                symbol: symbol_label(&snapshot.graph, &id),
                report: query::impact(&snapshot.graph, &id, *depth)?,
            })
        }
        Commands::Related { symbol, limit } => {
            let snapshot = analyze_workspace(&analyzer, workspace).await?;
            let graph = &snapshot.graph;
            let id = resolve_symbol(graph, symbol)?;
            Ok(Output::Related {
                symbol: symbol_label(graph, &id),
                related: query::related(graph, &id, *limit)?,
                references: query::references(graph, &id)?,
            })
        }
    }
}

#[derive(serde::Serialize)]
#[serde(tag = "type")]
enum Output {
    Analyze {
        project: Box<Project>,
        symbols: usize,
        relationships: usize,
        cycles: usize,
    },
    File {
        analysis: Box<FileAnalysis>,
    },
    Search {
        query: String,
        results: Vec<SearchHit>,
    },
    CallGraph {
        symbol: String,
        view: GraphView,
    },
    Calls {
        symbol: String,
        direction: String,
        results: Vec<String>,
    },
    Deps {
        view: GraphView,
    },
    Cycles {
        cycles: Vec<Cycle>,
    },
    Impact {
        symbol: String,
        report: ImpactReport,
    },
    Related {
        symbol: String,
        related: Vec<RelatedSymbol>,
        references: Vec<SymbolReference>,
    },
}

fn print_view(view: &GraphView) {
    let name = |id: &SymbolId| {
        view.node(id)
            .map(|n| {
                if n.kind == SymbolKind::Module && n.qualified_name.is_empty() {
                    n.file_path.clone()
                } else {
                    n.qualified_name.clone()
                }
            })
            .unwrap_or_else(|| id.to_string())
    };
    println!("{} nodes, {} edges", view.nodes.len(), view.edges.len());
    for edge in &view.edges {
        let count = if edge.count > 1 {
            format!(" x{}", edge.count)
        } else {
            String::new()
        };
        println!(
            "  {} -> {}{} ({:.2})",
            name(&edge.source),
            name(&edge.target),
            count,
            edge.confidence
        );
    }
    if view.truncated {
        println!("  (truncated at depth limit)");
    }
}

fn print_diagnostics(errors: &[FileDiagnostic]) {
    if errors.is_empty() {
        return;
    }
    println!("Diagnostics:");
    for d in errors {
        println!("  {:?} {}: {}", d.severity, d.path, d.error);
    }
}

fn print_human_readable(output: &Output) {
    match output {
        Output::Analyze {
            project,
            symbols,
            relationships,
            cycles,
        } => {
            let m = &project.metrics;
            println!("Project: {} ({})", project.name, project.id);
            println!(
                "Files: {}  Lines: {} ({} code, {} comment)",
                m.total_files, m.total_lines, m.total_code_lines, m.total_comment_lines
            );
            println!(
                "Symbols: {}  Relationships: {}  Unresolved: {}  Import cycles: {}",
                symbols, relationships, project.unresolved_count, cycles
            );
            println!(
                "Complexity: avg {:.2}, max {}  Cognitive: avg {:.2}, max {}, {} hard to read",
                m.average_complexity, m.max_complexity, m.average_cognitive, m.max_cognitive, m.hard_to_read
            );
            println!(
                "Maintainability: {:.1}  Technical debt: {:.1}%  Quality: {:.1}",
                m.maintainability_score,
                m.technical_debt_ratio * 100.0,
                m.quality_score
            );
            for file in &project.files {
                println!(
                    "  {} [{}] {} lines, cc {}, mi {:.1}",
                    file.path,
                    file.language,
                    file.total_lines,
                    file.complexity,
                    file.maintainability_index
                );
            }
            print_diagnostics(&project.errors);
        }
        Output::File { analysis } => {
            let f = &analysis.file;
            println!("File: {} [{}]", f.path, f.language);
            println!(
                "Lines: {} ({} code, {} comment, {} blank)  Complexity: {}  MI: {:.1}",
                f.total_lines,
                f.code_lines,
                f.comment_lines,
                f.blank_lines,
                f.complexity,
                f.maintainability_index
            );
            println!("Symbols:");
            for s in &analysis.symbols {
                if s.is_file_module() {
                    continue;
                }
                println!(
                    "  {} ({}) line {}, cc {}, cognitive {}",
                    s.qualified_name,
                    s.kind,
                    s.location.start_line,
                    s.metrics.cyclomatic,
                    s.metrics.cognitive
                );
            }
            println!(
                "{} relationships, {} unresolved references",
                analysis.relationships.len(),
                analysis.unresolved.len()
            );
        }
        Output::Search { query, results } => {
            println!("Search: \"{}\"", query);
            println!("Found {} results:", results.len());
            for hit in results {
                let s = &hit.symbol;
                println!(
                    "  {:?} {} ({}) at {}:{} [{} refs]",
                    hit.match_kind,
                    s.qualified_name,
                    s.kind,
                    s.file_path,
                    s.location.start_line,
                    hit.references_count
                );
            }
        }
        Output::CallGraph { symbol, view } => {
            println!("Call graph of {}:", symbol);
            print_view(view);
        }
        Output::Calls {
            symbol,
            direction,
            results,
        } => {
            println!("{} of {}:", direction, symbol);
            println!("Found {} results:", results.len());
            for r in results {
                println!("  {}", r);
            }
        }
        Output::Deps { view } => {
            println!("Dependency graph:");
            print_view(view);
        }
        Output::Cycles { cycles } => {
            println!("Found {} cycles:", cycles.len());
            for c in cycles {
                let mut path = c.names.clone();
                if let Some(first) = c.names.first() {
                    path.push(first.clone());
                }
                println!(
                    "  [{}] {} (component of {})",
                    c.edge_type,
                    path.join(" -> "),
                    c.component_size
                );
            }
        }
        Output::Impact { symbol, report } => {
            println!("Impact of {} (depth {}):", symbol, report.max_depth);
            println!(
                "{} symbols in {} files",
                report.affected.len(),
                report.files.len()
            );
            for a in &report.affected {
                println!("  {} {} ({}) in {}", a.distance, a.qualified_name, a.kind, a.file_path);
            }
        }
        Output::Related {
            symbol,
            related,
            references,
        } => {
            println!("Related to {}:", symbol);
            for r in related {
                println!(
                    "  {:?} {} {} ({}) {:.2}",
                    r.direction,
                    r.relation,
                    display_name(&r.symbol),
                    r.symbol.kind,
                    r.confidence
                );
            }
            println!("{} references:", references.len());
            for r in references {
                let line = r.location.as_ref().map(|l| l.start_line).unwrap_or(0);
                println!("  {} {} at {}:{}", r.kind, r.source_name, r.file_path, line);
            }
        }
    }
}
