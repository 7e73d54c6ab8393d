//! Directory expansion for the CLI.
//!
//! Walks a directory while respecting .gitignore rules and returns the source
//! files an analyzer can take, as `/`-separated paths relative to the root.

use crate::error::{AnalysisError, AnalysisResult};
use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;
use std::collections::BTreeSet;
use std::path::Path;

/// Discovers source files under a root directory.
#[derive(Debug, Clone)]
pub struct FileDiscovery {
    /// Extensions to keep, without the dot. Empty keeps everything.
    extensions: BTreeSet<String>,
    /// Additional exclude patterns
    exclude_patterns: Vec<String>,
    /// Whether to apply default excludes
    default_excludes: bool,
    /// Whether to include hidden files
    include_hidden: bool,
    /// Max file size (bytes)
    max_file_size: u64,
}

impl Default for FileDiscovery {
    fn default() -> Self {
        Self {
            extensions: BTreeSet::new(),
            exclude_patterns: Vec::new(),
            default_excludes: true,
            include_hidden: false,
            max_file_size: 2 * 1024 * 1024,
        }
    }
}

impl FileDiscovery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep only files with one of these extensions.
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.extensions = extensions
            .into_iter()
            .map(|e| e.as_ref().trim_start_matches('.').to_ascii_lowercase())
            .collect();
        self
    }

    /// Add an exclude pattern.
    pub fn with_exclude(mut self, pattern: &str) -> Self {
        self.exclude_patterns.push(pattern.to_string());
        self
    }

    /// Disable default excludes.
    pub fn without_default_excludes(mut self) -> Self {
        self.default_excludes = false;
        self
    }

    /// Include hidden files.
    pub fn include_hidden(mut self) -> Self {
        self.include_hidden = true;
        self
    }

    /// Override max file size.
    pub fn with_max_file_size(mut self, max_file_size: u64) -> Self {
        self.max_file_size = max_file_size;
        self
    }

    /// All matching files under `root`, relative and sorted.
    pub fn discover(&self, root: &Path) -> AnalysisResult<Vec<String>> {
        if !root.is_dir() {
            return Err(AnalysisError::InvalidInput(format!(
                "{} is not a directory",
                root.display()
            )));
        }
        let default_excludes = if self.default_excludes {
            build_globset(default_exclude_patterns())?
        } else {
            GlobSet::empty()
        };
        let user_excludes = build_globset(self.exclude_patterns.iter().map(|s| s.as_str()))?;

        let walker = WalkBuilder::new(root)
            .hidden(!self.include_hidden)
            .git_ignore(true)
            .git_global(true)
            .git_exclude(true)
            .require_git(false)
            .build();

        let mut files = BTreeSet::new();
        for entry in walker.filter_map(|e| e.ok()) {
            if !entry.file_type().is_some_and(|t| t.is_file()) {
                continue;
            }
            let path = entry.path();
            let rel = path.strip_prefix(root).unwrap_or(path);
            if default_excludes.is_match(rel) || user_excludes.is_match(rel) {
                continue;
            }
            if !self.extension_matches(rel) || !self.size_ok(&entry) {
                continue;
            }
            let rel = rel.to_string_lossy().replace('\\', "/");
            files.insert(rel);
        }

        Ok(files.into_iter().collect())
    }

    fn extension_matches(&self, path: &Path) -> bool {
        if self.extensions.is_empty() {
            return true;
        }
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| self.extensions.contains(&e.to_ascii_lowercase()))
    }

    fn size_ok(&self, entry: &ignore::DirEntry) -> bool {
        entry
            .metadata()
            .map(|m| m.len() <= self.max_file_size)
            .unwrap_or(false)
    }
}

fn default_exclude_patterns() -> Vec<&'static str> {
    vec![
        "**/.git/**",
        "**/target/**",
        "**/node_modules/**",
        "**/dist/**",
        "**/build/**",
        "**/vendor/**",
        "**/.venv/**",
        "**/__pycache__/**",
        "**/.next/**",
        "**/*.min.js",
    ]
}

fn build_globset<'a>(patterns: impl IntoIterator<Item = &'a str>) -> AnalysisResult<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern)
            .map_err(|e| AnalysisError::InvalidInput(format!("bad exclude pattern {pattern:?}: {e}")))?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| AnalysisError::InvalidInput(format!("exclude patterns: {e}")))
}
