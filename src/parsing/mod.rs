//! Grammar adapters.
//!
//! Each supported language wraps one tree-sitter grammar behind
//! [`GrammarAdapter`]. Adding a language means registering another adapter;
//! nothing else in the pipeline is language specific.

pub mod go;
pub mod javascript;
pub mod python;
pub mod rust;
pub mod typescript;

use crate::error::{AnalysisError, AnalysisResult};
use crate::normalize::Normalizer;
use crate::types::Language;
use std::path::Path;
use std::sync::Arc;
use tree_sitter::{Node, Parser, Tree};

/// A successfully parsed file.
///
/// In tolerant mode the tree may still contain ERROR or MISSING nodes; the
/// normalizer flags symbols covering them as incomplete.
pub struct ParsedTree {
    pub path: String,
    pub language: Language,
    pub tree: Tree,
    pub source: Vec<u8>,
}

impl ParsedTree {
    pub fn root(&self) -> Node<'_> {
        self.tree.root_node()
    }

    pub fn has_errors(&self) -> bool {
        self.tree.root_node().has_error()
    }

    /// Source text of a node. Sources are validated as UTF-8 before parsing.
    pub fn text(&self, node: Node) -> &str {
        node_text(&self.source, node)
    }
}

/// Text of a node, or the empty string when the range is not valid UTF-8.
pub fn node_text<'s>(source: &'s [u8], node: Node) -> &'s str {
    source
        .get(node.start_byte()..node.end_byte())
        .and_then(|bytes| std::str::from_utf8(bytes).ok())
        .unwrap_or("")
}

/// Uniform parse interface over one concrete grammar.
pub trait GrammarAdapter: Send + Sync {
    /// Language tag this adapter is registered under.
    fn language(&self) -> Language;

    /// The tree-sitter grammar.
    fn grammar(&self) -> tree_sitter::Language;

    /// File extensions (without dot) this adapter handles.
    fn extensions(&self) -> &'static [&'static str];

    /// Language-specific normalization hooks.
    fn normalizer(&self) -> &dyn Normalizer;

    /// Parse raw bytes into a tree.
    ///
    /// Fails atomically: either a whole tree is returned or a `ParseFailure`
    /// carrying the first error location. Syntax errors only fail the parse
    /// when `tolerate_errors` is false.
    fn parse(
        &self,
        path: &str,
        source: Vec<u8>,
        tolerate_errors: bool,
    ) -> AnalysisResult<ParsedTree> {
        if let Err(e) = std::str::from_utf8(&source) {
            let (line, column) = line_col_at(&source, e.valid_up_to());
            return Err(AnalysisError::ParseFailure {
                path: path.to_string(),
                line,
                column,
                message: "source is not valid UTF-8".into(),
            });
        }

        let mut parser = Parser::new();
        parser
            .set_language(&self.grammar())
            .map_err(|e| AnalysisError::Internal(format!("parser.set_language: {e}")))?;

        let tree = parser
            .parse(&source, None)
            .ok_or_else(|| AnalysisError::ParseFailure {
                path: path.to_string(),
                line: 1,
                column: 1,
                message: "parser produced no tree".into(),
            })?;

        if !tolerate_errors && tree.root_node().has_error() {
            if let Some(node) = first_error(tree.root_node()) {
                let pos = node.start_position();
                let message = if node.is_missing() {
                    format!("missing `{}`", node.kind())
                } else {
                    let snippet: String = node_text(&source, node).chars().take(24).collect();
                    format!("syntax error near `{}`", snippet.trim())
                };
                return Err(AnalysisError::ParseFailure {
                    path: path.to_string(),
                    line: pos.row as u32 + 1,
                    column: pos.column as u32 + 1,
                    message,
                });
            }
        }

        Ok(ParsedTree {
            path: path.to_string(),
            language: self.language(),
            tree,
            source,
        })
    }
}

/// First ERROR or MISSING node in document order.
pub fn first_error(node: Node) -> Option<Node> {
    let mut stack = vec![node];
    while let Some(current) = stack.pop() {
        if current.is_error() || current.is_missing() {
            return Some(current);
        }
        let mut cursor = current.walk();
        let flagged: Vec<Node> = current
            .children(&mut cursor)
            .filter(|child| child.has_error() || child.is_missing())
            .collect();
        stack.extend(flagged.into_iter().rev());
    }
    None
}

fn line_col_at(source: &[u8], offset: usize) -> (u32, u32) {
    let before = &source[..offset.min(source.len())];
    let line = bytecount::count(before, b'\n') as u32 + 1;
    let line_start = before
        .iter()
        .rposition(|b| *b == b'\n')
        .map(|i| i + 1)
        .unwrap_or(0);
    (line, (offset - line_start) as u32 + 1)
}

/// Registered adapters, looked up by language tag or file extension.
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    adapters: Vec<Arc<dyn GrammarAdapter>>,
}

impl AdapterRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in language.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(python::PythonAdapter::new()));
        registry.register(Arc::new(javascript::JavaScriptAdapter::new()));
        registry.register(Arc::new(typescript::TypeScriptAdapter::typescript()));
        registry.register(Arc::new(typescript::TypeScriptAdapter::tsx()));
        registry.register(Arc::new(go::GoAdapter::new()));
        registry.register(Arc::new(rust::RustAdapter::new()));
        registry
    }

    pub fn register(&mut self, adapter: Arc<dyn GrammarAdapter>) {
        self.adapters.push(adapter);
    }

    pub fn languages(&self) -> Vec<Language> {
        let mut langs: Vec<Language> = self.adapters.iter().map(|a| a.language()).collect();
        langs.sort();
        langs.dedup();
        langs
    }

    /// All extensions handled by some adapter.
    pub fn extensions(&self) -> Vec<&'static str> {
        self.adapters
            .iter()
            .flat_map(|a| a.extensions().iter().copied())
            .collect()
    }

    pub fn for_path(&self, path: &str) -> Option<Arc<dyn GrammarAdapter>> {
        let ext = extension_of(path)?;
        self.adapters
            .iter()
            .find(|a| a.extensions().contains(&ext.as_str()))
            .cloned()
    }

    pub fn for_language(&self, language: Language) -> Option<Arc<dyn GrammarAdapter>> {
        self.adapters
            .iter()
            .find(|a| a.language() == language)
            .cloned()
    }

    /// Pick the adapter for a file.
    ///
    /// An explicit tag wins over the extension, but among adapters sharing the
    /// tag the one claiming the file's extension is preferred (`.tsx`).
    pub fn resolve(&self, path: &str, tag: Option<&str>) -> AnalysisResult<Arc<dyn GrammarAdapter>> {
        match tag {
            Some(tag) => {
                let unsupported = || AnalysisError::UnsupportedLanguage {
                    path: path.to_string(),
                    tag: tag.to_string(),
                };
                let language = Language::from_tag(tag).ok_or_else(unsupported)?;
                if let Some(adapter) = self.for_path(path).filter(|a| a.language() == language) {
                    return Ok(adapter);
                }
                self.for_language(language).ok_or_else(unsupported)
            }
            None => self.for_path(path).ok_or_else(|| AnalysisError::UnsupportedLanguage {
                path: path.to_string(),
                tag: extension_of(path).unwrap_or_default(),
            }),
        }
    }
}

fn extension_of(path: &str) -> Option<String> {
    Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_resolves_by_extension() {
        let registry = AdapterRegistry::with_defaults();
        assert_eq!(
            registry.resolve("a/b.py", None).unwrap().language(),
            Language::Python
        );
        assert_eq!(
            registry.resolve("main.go", None).unwrap().language(),
            Language::Go
        );
        let tsx = registry.resolve("view.tsx", None).unwrap();
        assert!(tsx.extensions().contains(&"tsx"));
        assert_eq!(registry.languages().len(), 5);
    }

    #[test]
    fn test_registry_tag_prefers_matching_extension() {
        let registry = AdapterRegistry::with_defaults();
        let adapter = registry.resolve("view.tsx", Some("typescript")).unwrap();
        assert!(adapter.extensions().contains(&"tsx"));
        let adapter = registry.resolve("script", Some("python")).unwrap();
        assert_eq!(adapter.language(), Language::Python);
    }

    #[test]
    fn test_registry_unsupported() {
        let registry = AdapterRegistry::with_defaults();
        assert!(matches!(
            registry.resolve("notes.md", None),
            Err(AnalysisError::UnsupportedLanguage { .. })
        ));
        assert!(matches!(
            registry.resolve("a.py", Some("cobol")),
            Err(AnalysisError::UnsupportedLanguage { .. })
        ));
        let empty = AdapterRegistry::new();
        assert!(matches!(
            empty.resolve("a.py", Some("python")),
            Err(AnalysisError::UnsupportedLanguage { .. })
        ));
    }

    #[test]
    fn test_parse_failure_reports_location() {
        let registry = AdapterRegistry::with_defaults();
        let adapter = registry.resolve("bad.py", None).unwrap();
        let source = b"def ok():\n    return 1\n\ndef broken(:\n    pass\n".to_vec();
        match adapter.parse("bad.py", source, false) {
            Err(AnalysisError::ParseFailure { path, line, .. }) => {
                assert_eq!(path, "bad.py");
                assert!(line >= 4);
            }
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("expected parse failure"),
        }
    }

    #[test]
    fn test_tolerant_parse_keeps_tree() {
        let registry = AdapterRegistry::with_defaults();
        let adapter = registry.resolve("bad.py", None).unwrap();
        let tree = adapter
            .parse("bad.py", b"def broken(:\n    pass\n".to_vec(), true)
            .unwrap();
        assert!(tree.has_errors());
    }

    #[test]
    fn test_invalid_utf8_is_parse_failure() {
        let registry = AdapterRegistry::with_defaults();
        let adapter = registry.resolve("a.js", None).unwrap();
        let err = adapter
            .parse("a.js", vec![b'x', b'\n', 0xff, 0xfe], false)
            .err()
            .unwrap();
        assert!(matches!(
            err,
            AnalysisError::ParseFailure { line: 2, column: 1, .. }
        ));
    }
}
