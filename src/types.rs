//! Core types for the analysis engine.
//!
//! This module defines the language-neutral data model shared by every stage:
//! - Symbols and their metrics
//! - Relationships between symbols
//! - Files and projects

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;

// ============================================================================
// Identifiers
// ============================================================================

/// Stable identifier for a symbol.
///
/// Derived from file path, qualified name and kind, never from insertion order,
/// so re-analysing unchanged source yields the same identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SymbolId(pub String);

impl SymbolId {
    pub fn derive(file_path: &str, qualified_name: &str, kind: SymbolKind) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(file_path.as_bytes());
        hasher.update([0u8]);
        hasher.update(qualified_name.as_bytes());
        hasher.update([0u8]);
        hasher.update(kind.as_str().as_bytes());
        let digest = hasher.finalize();
        SymbolId(hex::encode(&digest[..16]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SymbolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SymbolId {
    fn from(value: &str) -> Self {
        SymbolId(value.to_string())
    }
}

/// Identifier of a project, derived from its name.
pub fn project_id_for(name: &str) -> String {
    let digest = Sha256::digest(name.as_bytes());
    hex::encode(&digest[..8])
}

/// Hex SHA-256 of file content.
pub fn content_hash(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

// ============================================================================
// Languages
// ============================================================================

/// Languages with a registered grammar adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
    JavaScript,
    TypeScript,
    Go,
    Rust,
}

impl Language {
    pub const ALL: [Language; 5] = [
        Language::Python,
        Language::JavaScript,
        Language::TypeScript,
        Language::Go,
        Language::Rust,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::JavaScript => "javascript",
            Language::TypeScript => "typescript",
            Language::Go => "go",
            Language::Rust => "rust",
        }
    }

    /// Parse a language tag. Accepts common aliases (`py`, `js`, `ts`, `rs`).
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "python" | "py" => Some(Language::Python),
            "javascript" | "js" => Some(Language::JavaScript),
            "typescript" | "ts" => Some(Language::TypeScript),
            "go" | "golang" => Some(Language::Go),
            "rust" | "rs" => Some(Language::Rust),
            _ => None,
        }
    }

    /// Detect a language from a file extension (without the dot).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "py" | "pyw" | "pyi" => Some(Language::Python),
            "js" | "mjs" | "cjs" | "jsx" => Some(Language::JavaScript),
            "ts" | "mts" | "cts" | "tsx" => Some(Language::TypeScript),
            "go" => Some(Language::Go),
            "rs" => Some(Language::Rust),
            _ => None,
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Symbols
// ============================================================================

/// Canonical symbol kinds. Language constructs are mapped onto these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind {
    Module,
    Class,
    Interface,
    Enum,
    Function,
    Method,
    Variable,
    Constant,
    TypeAlias,
}

impl SymbolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SymbolKind::Module => "module",
            SymbolKind::Class => "class",
            SymbolKind::Interface => "interface",
            SymbolKind::Enum => "enum",
            SymbolKind::Function => "function",
            SymbolKind::Method => "method",
            SymbolKind::Variable => "variable",
            SymbolKind::Constant => "constant",
            SymbolKind::TypeAlias => "type_alias",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "module" => Some(SymbolKind::Module),
            "class" | "struct" => Some(SymbolKind::Class),
            "interface" | "trait" => Some(SymbolKind::Interface),
            "enum" => Some(SymbolKind::Enum),
            "function" | "fn" => Some(SymbolKind::Function),
            "method" => Some(SymbolKind::Method),
            "variable" | "var" => Some(SymbolKind::Variable),
            "constant" | "const" => Some(SymbolKind::Constant),
            "type_alias" | "type" => Some(SymbolKind::TypeAlias),
            _ => None,
        }
    }

    /// Functions and methods carry their own complexity.
    pub fn is_callable(&self) -> bool {
        matches!(self, SymbolKind::Function | SymbolKind::Method)
    }

    /// Kinds that can be extended, implemented or instantiated.
    pub fn is_type_like(&self) -> bool {
        matches!(
            self,
            SymbolKind::Class | SymbolKind::Interface | SymbolKind::Enum | SymbolKind::TypeAlias
        )
    }

    pub fn is_value(&self) -> bool {
        matches!(self, SymbolKind::Variable | SymbolKind::Constant)
    }
}

impl fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Access level of a symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessLevel {
    #[default]
    Public,
    Private,
    Protected,
    Package,
}

/// Location of a syntax element in a file. Lines and columns are 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Location {
    pub start_line: u32,
    pub start_column: u32,
    pub end_line: u32,
    pub end_column: u32,
    pub start_byte: usize,
    pub end_byte: usize,
}

impl Location {
    pub fn from_node(node: tree_sitter::Node) -> Self {
        let start = node.start_position();
        let end = node.end_position();
        Self {
            start_line: start.row as u32 + 1,
            start_column: start.column as u32 + 1,
            end_line: end.row as u32 + 1,
            end_column: end.column as u32 + 1,
            start_byte: node.start_byte(),
            end_byte: node.end_byte(),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.start_line, self.start_column)
    }
}

/// Boolean modifiers of a symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SymbolFlags {
    pub is_abstract: bool,
    pub is_static: bool,
    pub is_async: bool,
    pub is_exported: bool,
}

/// A declared parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub type_annotation: Option<String>,
    pub default_value: Option<String>,
}

/// Declared parameter list and return type, as written in source.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Signature {
    pub parameters: Vec<Parameter>,
    pub return_type: Option<String>,
}

/// Halstead token counts and derived measures.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Halstead {
    pub distinct_operators: u32,
    pub distinct_operands: u32,
    pub total_operators: u32,
    pub total_operands: u32,
    pub volume: f64,
    pub difficulty: f64,
    pub effort: f64,
}

/// Per-symbol metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolMetrics {
    pub cyclomatic: u32,
    pub cognitive: u32,
    pub lines_of_code: u32,
    pub comment_lines: u32,
    pub max_nesting: u32,
    pub halstead: Halstead,
    /// Bounded to 0..=100.
    pub maintainability_index: f64,
    /// Set when the body contained syntax errors; complexity is then 0.
    pub incomplete: bool,
}

impl Default for SymbolMetrics {
    fn default() -> Self {
        Self {
            cyclomatic: 0,
            cognitive: 0,
            lines_of_code: 0,
            comment_lines: 0,
            max_nesting: 0,
            halstead: Halstead::default(),
            maintainability_index: 100.0,
            incomplete: false,
        }
    }
}

/// A named code element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Symbol {
    pub id: SymbolId,
    pub name: String,
    /// Dot-joined names of structural ancestors below the module.
    pub qualified_name: String,
    pub kind: SymbolKind,
    pub language: Language,
    pub file_path: String,
    pub location: Location,
    pub parent: Option<SymbolId>,
    pub metrics: SymbolMetrics,
    pub access: AccessLevel,
    pub flags: SymbolFlags,
    pub docstring: Option<String>,
    pub signature: Option<Signature>,
}

impl Symbol {
    /// The root symbol of a file. Nested modules (Rust `mod` items) have a
    /// parent and are not file modules.
    pub fn is_file_module(&self) -> bool {
        self.kind == SymbolKind::Module && self.parent.is_none()
    }
}

// ============================================================================
// Relationships
// ============================================================================

/// Relationship (edge) types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationType {
    Calls,
    Uses,
    References,
    Extends,
    Implements,
    Instantiates,
    Imports,
    Exports,
    Overrides,
    Returns,
    Accepts,
    Throws,
    Contains,
}

impl RelationType {
    pub const ALL: [RelationType; 13] = [
        RelationType::Calls,
        RelationType::Uses,
        RelationType::References,
        RelationType::Extends,
        RelationType::Implements,
        RelationType::Instantiates,
        RelationType::Imports,
        RelationType::Exports,
        RelationType::Overrides,
        RelationType::Returns,
        RelationType::Accepts,
        RelationType::Throws,
        RelationType::Contains,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RelationType::Calls => "CALLS",
            RelationType::Uses => "USES",
            RelationType::References => "REFERENCES",
            RelationType::Extends => "EXTENDS",
            RelationType::Implements => "IMPLEMENTS",
            RelationType::Instantiates => "INSTANTIATES",
            RelationType::Imports => "IMPORTS",
            RelationType::Exports => "EXPORTS",
            RelationType::Overrides => "OVERRIDES",
            RelationType::Returns => "RETURNS",
            RelationType::Accepts => "ACCEPTS",
            RelationType::Throws => "THROWS",
            RelationType::Contains => "CONTAINS",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        let upper = tag.trim().to_ascii_uppercase();
        Self::ALL.into_iter().find(|t| t.as_str() == upper)
    }

    /// Edge types along which a change propagates to dependents.
    pub fn is_dependency(&self) -> bool {
        matches!(
            self,
            RelationType::Calls
                | RelationType::Uses
                | RelationType::References
                | RelationType::Extends
                | RelationType::Implements
                | RelationType::Instantiates
                | RelationType::Imports
                | RelationType::Overrides
                | RelationType::Returns
                | RelationType::Accepts
                | RelationType::Throws
        )
    }
}

impl fmt::Display for RelationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A directed, typed edge between two symbols.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    pub kind: RelationType,
    pub source: SymbolId,
    pub target: SymbolId,
    /// 1.0 for lexically resolved edges, lower for heuristic matches.
    pub confidence: f32,
    /// Reference site. `None` for structural edges.
    pub location: Option<Location>,
    pub file_path: String,
}

/// What kind of syntax produced a reference site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceKind {
    Call,
    New,
    Read,
    TypeMention,
    ParameterType,
    ReturnType,
    Throw,
    Extends,
    Implements,
    Import,
}

/// A reference site whose target could not be determined.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnresolvedReference {
    pub source: SymbolId,
    pub name: String,
    pub qualifier: Option<String>,
    pub kind: ReferenceKind,
    pub location: Location,
    pub file_path: String,
    pub confidence: f32,
}

// ============================================================================
// Files and projects
// ============================================================================

/// One analysed source file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    pub path: String,
    pub language: Language,
    pub total_lines: u32,
    pub code_lines: u32,
    pub comment_lines: u32,
    pub blank_lines: u32,
    pub size_bytes: u64,
    pub content_hash: String,
    /// Sum of function and method cyclomatic complexity.
    pub complexity: u32,
    pub cognitive_complexity: u32,
    pub maintainability_index: f64,
    pub module_id: SymbolId,
    /// Owned symbols in declaration order, module symbol first.
    pub symbols: Vec<SymbolId>,
    pub imports: Vec<SymbolId>,
    pub exports: Vec<SymbolId>,
    pub incomplete: bool,
}

/// Buckets of function/method cyclomatic complexity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ComplexityDistribution {
    /// 1..=5
    pub low: u32,
    /// 6..=10
    pub medium: u32,
    /// 11..=20
    pub high: u32,
    /// above 20
    pub very_high: u32,
}

/// Aggregate metrics of a project. Always derived, never edited.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProjectMetrics {
    pub total_files: u32,
    pub total_lines: u32,
    pub total_code_lines: u32,
    pub total_comment_lines: u32,
    pub total_symbols: u32,
    pub total_functions: u32,
    pub total_classes: u32,
    pub average_complexity: f64,
    pub max_complexity: u32,
    pub average_cognitive: f64,
    pub max_cognitive: u32,
    /// Callables above the cognitive complexity threshold.
    pub hard_to_read: u32,
    pub maintainability_score: f64,
    pub technical_debt_ratio: f64,
    pub quality_score: f64,
    pub graph_density: f64,
    pub complexity_distribution: ComplexityDistribution,
    pub language_distribution: BTreeMap<Language, u32>,
    pub symbol_kind_distribution: BTreeMap<SymbolKind, u32>,
    pub relationship_distribution: BTreeMap<RelationType, u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_id_is_stable_and_kind_sensitive() {
        let a = SymbolId::derive("src/a.py", "Service.start", SymbolKind::Method);
        let b = SymbolId::derive("src/a.py", "Service.start", SymbolKind::Method);
        let c = SymbolId::derive("src/a.py", "Service.start", SymbolKind::Function);
        let d = SymbolId::derive("src/b.py", "Service.start", SymbolKind::Method);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
        assert_eq!(a.as_str().len(), 32);
    }

    #[test]
    fn test_language_detection() {
        assert_eq!(Language::from_extension("pyi"), Some(Language::Python));
        assert_eq!(Language::from_extension("TSX"), Some(Language::TypeScript));
        assert_eq!(Language::from_extension("mjs"), Some(Language::JavaScript));
        assert_eq!(Language::from_extension("java"), None);
        assert_eq!(Language::from_tag("rs"), Some(Language::Rust));
        assert_eq!(Language::from_tag("cobol"), None);
    }

    #[test]
    fn test_relation_type_tags() {
        for kind in RelationType::ALL {
            assert_eq!(RelationType::from_tag(kind.as_str()), Some(kind));
        }
        assert_eq!(RelationType::from_tag("imports"), Some(RelationType::Imports));
        let json = serde_json::to_string(&RelationType::Instantiates).unwrap();
        assert_eq!(json, "\"INSTANTIATES\"");
    }

    #[test]
    fn test_location_from_node_is_one_based() {
        let mut parser = tree_sitter::Parser::new();
        parser
            .set_language(&tree_sitter_python::LANGUAGE.into())
            .unwrap();
        let tree = parser.parse("x = 1\n", None).unwrap();
        let loc = Location::from_node(tree.root_node().child(0).unwrap());
        assert_eq!(loc.start_line, 1);
        assert_eq!(loc.start_column, 1);
        assert_eq!(loc.end_line, 1);
    }
}
