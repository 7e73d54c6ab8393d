//! Error types for analysis runs.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced by the analysis engine.
///
/// Per-file variants (`UnsupportedLanguage`, `ParseFailure`, `FileNotFound`, `Io`)
/// are recorded as diagnostics during a project run; run-level variants
/// (`InvalidInput`, `RunCancelled`) abort the run.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum AnalysisError {
    #[error("unsupported language `{tag}` for {path}")]
    UnsupportedLanguage { path: String, tag: String },

    #[error("parse failure in {path} at {line}:{column}: {message}")]
    ParseFailure {
        path: String,
        line: u32,
        column: u32,
        message: String,
    },

    #[error("file not found: {path}")]
    FileNotFound { path: String },

    #[error("failed to read {path}: {message}")]
    Io { path: String, message: String },

    #[error("analysis run cancelled")]
    RunCancelled,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("unknown project: {0}")]
    UnknownProject(String),

    #[error("unknown symbol: {0}")]
    UnknownSymbol(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AnalysisError {
    /// Path of the file the error refers to, if any.
    pub fn path(&self) -> Option<&str> {
        match self {
            AnalysisError::UnsupportedLanguage { path, .. }
            | AnalysisError::ParseFailure { path, .. }
            | AnalysisError::FileNotFound { path }
            | AnalysisError::Io { path, .. } => Some(path),
            _ => None,
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            AnalysisError::UnsupportedLanguage { .. } => Severity::Warning,
            _ => Severity::Error,
        }
    }
}

/// Result alias for engine operations.
pub type AnalysisResult<T> = std::result::Result<T, AnalysisError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

/// A per-file failure recorded on a project run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDiagnostic {
    pub path: String,
    pub severity: Severity,
    pub error: AnalysisError,
}

impl FileDiagnostic {
    pub fn from_error(path: impl Into<String>, error: AnalysisError) -> Self {
        Self {
            path: path.into(),
            severity: error.severity(),
            error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_failure_message_carries_location() {
        let err = AnalysisError::ParseFailure {
            path: "src/a.py".into(),
            line: 3,
            column: 7,
            message: "unexpected token".into(),
        };
        assert_eq!(
            err.to_string(),
            "parse failure in src/a.py at 3:7: unexpected token"
        );
        assert_eq!(err.path(), Some("src/a.py"));
        assert_eq!(err.severity(), Severity::Error);
    }

    #[test]
    fn test_unsupported_language_is_warning() {
        let err = AnalysisError::UnsupportedLanguage {
            path: "README.md".into(),
            tag: "md".into(),
        };
        assert_eq!(err.path(), Some("README.md"));
        assert_eq!(err.severity(), Severity::Warning);
        assert_eq!(AnalysisError::RunCancelled.path(), None);
    }

    #[test]
    fn test_error_serializes_with_kind_tag() {
        let json = serde_json::to_value(AnalysisError::FileNotFound {
            path: "gone.rs".into(),
        })
        .unwrap();
        assert_eq!(json["kind"], "file_not_found");
        assert_eq!(json["detail"]["path"], "gone.rs");
    }
}
