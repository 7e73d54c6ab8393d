//! Analysis options.
//!
//! Options are plain serde data so callers can load them from JSON and then
//! override individual fields with the builder-style setters.

use crate::error::{AnalysisError, AnalysisResult};
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Environment variable that overrides the default worker count.
pub const CONCURRENCY_ENV: &str = "CODEGRAPH_CONCURRENCY";

/// Thresholds used to flag symbols as high complexity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComplexityThresholds {
    /// Cyclomatic complexity above which a symbol counts as technical debt.
    pub high_complexity: u32,
    /// Cognitive complexity above which a symbol is reported as hard to read.
    pub high_cognitive: u32,
}

impl Default for ComplexityThresholds {
    fn default() -> Self {
        Self {
            high_complexity: 10,
            high_cognitive: 15,
        }
    }
}

/// Options for single-file and project analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisOptions {
    /// Resolve references into relationships. Without it only CONTAINS edges exist.
    pub include_relationships: bool,
    /// Record plain identifier reads as USES/REFERENCES sites.
    pub include_references: bool,
    /// Attach the project-wide call graph view to the project.
    pub include_call_graph: bool,
    /// Attach the file dependency graph view to the project.
    pub include_dependency_graph: bool,
    pub thresholds: ComplexityThresholds,
    /// Only analyse files with these extensions (without dot). Empty means all.
    pub extensions: Vec<String>,
    /// Glob patterns of paths to skip.
    pub exclude_patterns: Vec<String>,
    /// Maximum number of files processed at once.
    pub max_concurrency: usize,
    /// Keep trees with syntax errors instead of failing the file.
    pub tolerate_syntax_errors: bool,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            include_relationships: true,
            include_references: false,
            include_call_graph: false,
            include_dependency_graph: true,
            thresholds: ComplexityThresholds::default(),
            extensions: Vec::new(),
            exclude_patterns: Vec::new(),
            max_concurrency: default_concurrency(),
            tolerate_syntax_errors: false,
        }
    }
}

fn default_concurrency() -> usize {
    std::env::var(CONCURRENCY_ENV)
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .filter(|n| *n > 0)
        .or_else(|| std::thread::available_parallelism().ok().map(|n| n.get()))
        .unwrap_or(4)
}

impl AnalysisOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load options from a JSON file. Missing fields take their defaults.
    pub fn from_json_file(path: &Path) -> AnalysisResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| AnalysisError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        serde_json::from_str(&text)
            .map_err(|e| AnalysisError::InvalidInput(format!("{}: {e}", path.display())))
    }

    pub fn with_relationships(mut self, enabled: bool) -> Self {
        self.include_relationships = enabled;
        self
    }

    pub fn with_references(mut self, enabled: bool) -> Self {
        self.include_references = enabled;
        self
    }

    pub fn with_call_graph(mut self, enabled: bool) -> Self {
        self.include_call_graph = enabled;
        self
    }

    pub fn with_dependency_graph(mut self, enabled: bool) -> Self {
        self.include_dependency_graph = enabled;
        self
    }

    pub fn with_thresholds(mut self, thresholds: ComplexityThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extensions = extensions
            .into_iter()
            .map(|e| e.into().trim_start_matches('.').to_ascii_lowercase())
            .collect();
        self
    }

    pub fn with_excludes<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_patterns = patterns.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_concurrency(mut self, max: usize) -> Self {
        self.max_concurrency = max;
        self
    }

    pub fn with_tolerate_syntax_errors(mut self, enabled: bool) -> Self {
        self.tolerate_syntax_errors = enabled;
        self
    }

    /// Reject conflicting or unusable option combinations.
    pub fn validate(&self) -> AnalysisResult<()> {
        if self.max_concurrency == 0 {
            return Err(AnalysisError::InvalidInput(
                "max_concurrency must be at least 1".into(),
            ));
        }
        if self.thresholds.high_complexity == 0 {
            return Err(AnalysisError::InvalidInput(
                "high complexity threshold must be at least 1".into(),
            ));
        }
        if !self.include_relationships {
            let dependent = [
                (self.include_references, "include_references"),
                (self.include_call_graph, "include_call_graph"),
                (self.include_dependency_graph, "include_dependency_graph"),
            ];
            if let Some((_, name)) = dependent.iter().find(|(on, _)| *on) {
                return Err(AnalysisError::InvalidInput(format!(
                    "{name} requires include_relationships"
                )));
            }
        }
        self.exclude_set()?;
        Ok(())
    }

    /// Compile the exclude patterns.
    pub fn exclude_set(&self) -> AnalysisResult<GlobSet> {
        let mut builder = GlobSetBuilder::new();
        for pattern in &self.exclude_patterns {
            let glob = Glob::new(pattern).map_err(|e| {
                AnalysisError::InvalidInput(format!("invalid exclude pattern `{pattern}`: {e}"))
            })?;
            builder.add(glob);
        }
        builder
            .build()
            .map_err(|e| AnalysisError::InvalidInput(format!("invalid exclude patterns: {e}")))
    }

    /// Compiled file filter for a run.
    pub fn file_filter(&self) -> AnalysisResult<FileFilter> {
        Ok(FileFilter {
            extensions: self.extensions.clone(),
            excludes: self.exclude_set()?,
        })
    }
}

/// Extension and exclude-pattern filter applied to the supplied file list.
#[derive(Debug, Clone)]
pub struct FileFilter {
    extensions: Vec<String>,
    excludes: GlobSet,
}

impl FileFilter {
    pub fn accepts(&self, path: &str) -> bool {
        if self.excludes.is_match(path) {
            return false;
        }
        if self.extensions.is_empty() {
            return true;
        }
        Path::new(path)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| {
                let e = e.to_ascii_lowercase();
                self.extensions.iter().any(|allowed| *allowed == e)
            })
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let options = AnalysisOptions::default();
        assert!(options.include_relationships);
        assert_eq!(options.thresholds.high_complexity, 10);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_conflicting_options_rejected() {
        let options = AnalysisOptions::new()
            .with_relationships(false)
            .with_dependency_graph(false)
            .with_call_graph(true);
        match options.validate() {
            Err(AnalysisError::InvalidInput(msg)) => assert!(msg.contains("include_call_graph")),
            other => panic!("expected InvalidInput, got {other:?}"),
        }
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let options = AnalysisOptions::new().with_concurrency(0);
        assert!(matches!(
            options.validate(),
            Err(AnalysisError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_bad_glob_rejected() {
        let options = AnalysisOptions::new().with_excludes(["src/[".to_string()]);
        assert!(matches!(
            options.validate(),
            Err(AnalysisError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_file_filter() {
        let filter = AnalysisOptions::new()
            .with_extensions([".py", "RS"])
            .with_excludes(["**/vendor/**"])
            .file_filter()
            .unwrap();
        assert!(filter.accepts("src/app.py"));
        assert!(filter.accepts("src/lib.rs"));
        assert!(!filter.accepts("src/app.ts"));
        assert!(!filter.accepts("third/vendor/lib.rs"));
    }

    #[test]
    fn test_partial_json_takes_defaults() {
        let options: AnalysisOptions =
            serde_json::from_str(r#"{"include_references": true, "thresholds": {"high_complexity": 5}}"#)
                .unwrap();
        assert!(options.include_references);
        assert_eq!(options.thresholds.high_complexity, 5);
        assert_eq!(options.thresholds.high_cognitive, 15);
        assert!(options.include_relationships);
    }
}
