//! File content providers.
//!
//! The engine never walks the file system itself; it asks a provider for the
//! bytes of each path it was given.

use crate::error::{AnalysisError, AnalysisResult};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::PathBuf;

/// Source of file bytes, keyed by the path strings handed to the analyzer.
pub trait FileProvider: Send + Sync {
    fn read(&self, path: &str) -> AnalysisResult<Vec<u8>>;
}

/// Reads files from disk, optionally relative to a root directory.
#[derive(Debug, Clone, Default)]
pub struct FsProvider {
    root: Option<PathBuf>,
}

impl FsProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve relative paths against `root`.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }
}

impl FileProvider for FsProvider {
    fn read(&self, path: &str) -> AnalysisResult<Vec<u8>> {
        let full = match &self.root {
            Some(root) => root.join(path),
            None => PathBuf::from(path),
        };
        std::fs::read(&full).map_err(|e| match e.kind() {
            ErrorKind::NotFound => AnalysisError::FileNotFound {
                path: path.to_string(),
            },
            _ => AnalysisError::Io {
                path: path.to_string(),
                message: e.to_string(),
            },
        })
    }
}

/// In-memory provider, used by tests and by callers that already hold content.
#[derive(Debug, Default)]
pub struct MemoryProvider {
    files: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(self, path: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        self.insert(path, content);
        self
    }

    pub fn insert(&self, path: impl Into<String>, content: impl Into<Vec<u8>>) {
        self.files.write().insert(path.into(), content.into());
    }

    pub fn remove(&self, path: &str) -> bool {
        self.files.write().remove(path).is_some()
    }
}

impl FileProvider for MemoryProvider {
    fn read(&self, path: &str) -> AnalysisResult<Vec<u8>> {
        self.files
            .read()
            .get(path)
            .cloned()
            .ok_or_else(|| AnalysisError::FileNotFound {
                path: path.to_string(),
            })
    }
}
