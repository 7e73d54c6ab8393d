//! AST normalization.
//!
//! A single walker turns any grammar's parse tree into the language-neutral
//! symbol stream. Language differences live behind [`Normalizer`] hooks and the
//! [`NodeRules`] mapping table; node kinds missing from the table are ignored.
//!
//! The walker produces, per file:
//! - symbols in declaration order, module symbol first
//! - the containment forest (parent index per symbol)
//! - raw reference sites with their enclosing symbol, for later resolution
//! - import bindings and declared supertypes
//! - line counts and per-symbol metrics

pub mod lines;

use crate::metrics::{self, ControlFlowRules};
use crate::parsing::{ParsedTree, node_text};
use crate::types::*;
use lines::{LineCounts, LineTable};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tree_sitter::Node;

// ============================================================================
// Language tables and hooks
// ============================================================================

/// Per-grammar mapping table.
#[derive(Debug)]
pub struct NodeRules {
    /// Grammar node kind -> canonical symbol kind.
    pub symbols: &'static [(&'static str, SymbolKind)],
    pub comments: &'static [&'static str],
    /// Statements handled by [`Normalizer::imports`]. Not descended into.
    pub imports: &'static [&'static str],
    /// Blocks that attach supertypes to a type declared elsewhere (Rust `impl`).
    pub detached: &'static [&'static str],
    /// Leaf kinds that name a type inside annotations.
    pub type_names: &'static [&'static str],
    /// Type names never resolved against the project.
    pub builtin_types: &'static [&'static str],
    pub control: ControlFlowRules,
}

impl NodeRules {
    pub fn symbol_kind(&self, node_kind: &str) -> Option<SymbolKind> {
        self.symbols
            .iter()
            .find(|(k, _)| *k == node_kind)
            .map(|(_, kind)| *kind)
    }
}

/// A reference found in source, before resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawReference {
    pub kind: ReferenceKind,
    pub name: String,
    /// Receiver or namespace text for member access (`self`, `os.path`).
    pub qualifier: Option<String>,
    pub location: Location,
}

/// A reference with the local index of its innermost enclosing symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceSite {
    pub owner: usize,
    pub reference: RawReference,
}

/// Declared supertype of a class-like symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupertypeRef {
    pub name: String,
    pub qualifier: Option<String>,
    /// `Extends` or `Implements`.
    pub relation: RelationType,
    pub location: Location,
}

/// Supertypes declared away from the type itself, e.g. `impl Trait for Type`.
#[derive(Debug, Clone, PartialEq)]
pub struct DetachedSupertypes {
    pub owner: String,
    pub supertypes: Vec<SupertypeRef>,
}

/// Module part of an import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleSpec {
    pub segments: Vec<String>,
    /// Parent-directory hops for relative imports; 0 is the importer's directory.
    pub relative: Option<usize>,
    pub raw: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportedItem {
    Module,
    Name(String),
    Default,
    Glob,
}

/// One name bound by an import statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportBinding {
    /// Name visible in the importing file; `None` for side-effect imports.
    pub local_name: Option<String>,
    pub module: ModuleSpec,
    pub item: ImportedItem,
    pub location: Location,
}

/// Docstring text plus the rows it occupies when it lives inside the body.
#[derive(Debug, Clone, PartialEq)]
pub struct Docstring {
    pub text: String,
    pub span: Option<(usize, usize, usize)>,
}

/// Annotation nodes of a callable.
#[derive(Default)]
pub struct TypeNodes<'t> {
    pub parameters: Vec<Node<'t>>,
    pub returns: Option<Node<'t>>,
}

/// Language-specific normalization hooks. Defaults cover the common shape of
/// tree-sitter grammars (`name` fields, `function`/`class` kinds).
pub trait Normalizer: Send + Sync {
    fn rules(&self) -> &'static NodeRules;

    /// Canonical kind of a node, given the kind of the enclosing symbol.
    fn classify(&self, node: Node, _source: &[u8], scope: SymbolKind) -> Option<SymbolKind> {
        refine_kind(self.rules().symbol_kind(node.kind())?, scope)
    }

    fn name(&self, node: Node, source: &[u8]) -> Option<String> {
        field_text(node, "name", source)
    }

    fn access(&self, _node: Node, _source: &[u8], _name: &str) -> AccessLevel {
        AccessLevel::Public
    }

    fn flags(&self, _node: Node, _source: &[u8], _scope: SymbolKind) -> SymbolFlags {
        SymbolFlags::default()
    }

    fn docstring(&self, _node: Node, _source: &[u8]) -> Option<Docstring> {
        None
    }

    fn signature(&self, _node: Node, _source: &[u8]) -> Option<Signature> {
        None
    }

    fn type_nodes<'t>(&self, _node: Node<'t>) -> TypeNodes<'t> {
        TypeNodes::default()
    }

    /// Node whose subtree is measured for complexity.
    fn measure_root<'t>(&self, node: Node<'t>) -> Node<'t> {
        node
    }

    fn supertypes(&self, _node: Node, _source: &[u8]) -> Vec<SupertypeRef> {
        Vec::new()
    }

    /// Type a callable belongs to when not lexically nested in it (Go receivers,
    /// Rust `impl` blocks).
    fn owner_type(&self, _node: Node, _source: &[u8]) -> Option<String> {
        None
    }

    fn detached_supertypes(&self, _node: Node, _source: &[u8]) -> Option<DetachedSupertypes> {
        None
    }

    fn imports(&self, _node: Node, _source: &[u8]) -> Vec<ImportBinding> {
        Vec::new()
    }

    /// Calls, instantiations and throws at this node.
    fn references(&self, node: Node, source: &[u8], out: &mut Vec<RawReference>);

    /// Whether an identifier node is a plain read.
    fn is_read(&self, _node: Node) -> bool {
        false
    }
}

/// Functions declared in a type body are methods; values declared inside
/// callables are locals and not symbols.
pub fn refine_kind(kind: SymbolKind, scope: SymbolKind) -> Option<SymbolKind> {
    match kind {
        SymbolKind::Function if scope.is_type_like() => Some(SymbolKind::Method),
        SymbolKind::Variable | SymbolKind::Constant if scope.is_callable() => None,
        other => Some(other),
    }
}

// ============================================================================
// Shared helpers for language hooks
// ============================================================================

pub fn text<'s>(node: Node, source: &'s [u8]) -> &'s str {
    node_text(source, node)
}

pub fn field_text(node: Node, field: &str, source: &[u8]) -> Option<String> {
    node.child_by_field_name(field)
        .map(|n| node_text(source, n).to_string())
        .filter(|s| !s.is_empty())
}

/// Whether any direct child (named or anonymous) has the given kind.
pub fn has_child_kind(node: Node, kind: &str) -> bool {
    let mut cursor = node.walk();
    let found = node.children(&mut cursor).any(|c| c.kind() == kind);
    found
}

pub fn ancestor_of_kind<'t>(node: Node<'t>, kinds: &[&str]) -> Option<Node<'t>> {
    let mut current = node.parent();
    while let Some(n) = current {
        if kinds.contains(&n.kind()) {
            return Some(n);
        }
        current = n.parent();
    }
    None
}

/// Comment block immediately preceding `node` (or its wrapper), joined by
/// newlines. `accept` filters comment texts; `skip` lists kinds that may sit
/// between the comments and the node (attributes, decorators).
pub fn leading_comments(
    node: Node,
    source: &[u8],
    comment_kinds: &[&str],
    skip: &[&str],
    accept: impl Fn(&str) -> bool,
) -> Option<String> {
    let mut lines = Vec::new();
    let mut expected_row = node.start_position().row;
    let mut current = node.prev_sibling();

    while let Some(sib) = current {
        let kind = sib.kind();
        if comment_kinds.contains(&kind) {
            let comment = text(sib, source).trim();
            if !accept(comment) || sib.end_position().row + 1 < expected_row {
                break;
            }
            lines.push(comment.to_string());
            expected_row = sib.start_position().row;
        } else if skip.contains(&kind) {
            expected_row = sib.start_position().row;
        } else {
            break;
        }
        current = sib.prev_sibling();
    }

    if lines.is_empty() {
        return None;
    }
    lines.reverse();
    Some(lines.join("\n"))
}

/// Strip comment markers from a doc comment block.
pub fn clean_comment(raw: &str) -> String {
    raw.lines()
        .map(|line| {
            let line = line.trim();
            let line = line
                .trim_start_matches("///")
                .trim_start_matches("//!")
                .trim_start_matches("//")
                .trim_start_matches("/**")
                .trim_start_matches("/*")
                .trim_end_matches("*/")
                .trim_start_matches('*');
            line.trim()
        })
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Last path segment of a dotted, `::` or `/` separated name.
pub fn last_segment(path: &str) -> &str {
    path.rsplit(['.', ':', '/'])
        .find(|s| !s.is_empty())
        .unwrap_or(path)
}

/// Split `receiver.member` style callee text into qualifier and name.
pub fn split_member(path: &str, separator: &str) -> (Option<String>, String) {
    match path.rfind(separator) {
        Some(i) => {
            let qualifier = path[..i].trim();
            let name = path[i + separator.len()..].trim();
            (
                Some(qualifier.to_string()).filter(|q| !q.is_empty()),
                name.to_string(),
            )
        }
        None => (None, path.trim().to_string()),
    }
}

// ============================================================================
// Output
// ============================================================================

/// Options that change what the walker records.
#[derive(Debug, Clone, Copy, Default)]
pub struct NormalizeOptions {
    pub include_reads: bool,
    pub tolerate_errors: bool,
}

/// Phase-1 product for one file: everything cross-file resolution needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedFile {
    pub path: String,
    pub language: Language,
    pub content_hash: String,
    pub size_bytes: u64,
    pub symbols: Vec<Symbol>,
    /// Structural parent index per symbol; `None` only for the module symbol.
    pub parents: Vec<Option<usize>>,
    pub sites: Vec<ReferenceSite>,
    pub supertypes: Vec<(usize, SupertypeRef)>,
    pub imports: Vec<ImportBinding>,
    pub lines: LineCounts,
    pub incomplete: bool,
}

impl NormalizedFile {
    pub fn module(&self) -> &Symbol {
        &self.symbols[0]
    }

    /// Exported symbols declared at module level.
    pub fn exported(&self) -> impl Iterator<Item = &Symbol> {
        self.symbols
            .iter()
            .zip(&self.parents)
            .filter(|(s, parent)| **parent == Some(0) && s.flags.is_exported)
            .map(|(s, _)| s)
    }

    /// Index of the first type-like symbol with this name.
    pub fn type_named(&self, name: &str) -> Option<usize> {
        self.symbols
            .iter()
            .position(|s| s.kind.is_type_like() && s.name == name)
    }

    /// Sum of function and method complexity.
    pub fn complexity(&self) -> (u32, u32) {
        let module = self.module();
        (module.metrics.cyclomatic, module.metrics.cognitive)
    }
}

// ============================================================================
// Walker
// ============================================================================

struct Draft<'t> {
    node: Node<'t>,
    kind: SymbolKind,
    name: String,
    parent: Option<usize>,
    location: Location,
    access: AccessLevel,
    flags: SymbolFlags,
    docstring: Option<String>,
    signature: Option<Signature>,
    owner_type: Option<String>,
}

struct Walker<'t, 'n> {
    normalizer: &'n dyn Normalizer,
    rules: &'static NodeRules,
    source: &'t [u8],
    options: NormalizeOptions,
    drafts: Vec<Draft<'t>>,
    sites: Vec<ReferenceSite>,
    supertypes: Vec<(usize, SupertypeRef)>,
    detached: Vec<(usize, DetachedSupertypes)>,
    imports: Vec<ImportBinding>,
    comment_spans: Vec<(usize, usize, usize)>,
}

/// Normalize one parsed file.
pub fn normalize(
    parsed: &ParsedTree,
    normalizer: &dyn Normalizer,
    options: NormalizeOptions,
) -> NormalizedFile {
    let source = parsed.source.as_slice();
    let root = parsed.root();
    let rules = normalizer.rules();

    let module_name = Path::new(&parsed.path)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(&parsed.path)
        .to_string();

    let mut walker = Walker {
        normalizer,
        rules,
        source,
        options,
        drafts: Vec::new(),
        sites: Vec::new(),
        supertypes: Vec::new(),
        detached: Vec::new(),
        imports: Vec::new(),
        comment_spans: Vec::new(),
    };

    let module_doc = normalizer.docstring(root, source);
    if let Some(span) = module_doc.as_ref().and_then(|d| d.span) {
        walker.comment_spans.push(span);
    }
    walker.drafts.push(Draft {
        node: root,
        kind: SymbolKind::Module,
        name: module_name,
        parent: None,
        location: whole_file_location(source),
        access: AccessLevel::Public,
        flags: SymbolFlags::default(),
        docstring: module_doc.map(|d| d.text),
        signature: None,
        owner_type: None,
    });

    let mut cursor = root.walk();
    let top: Vec<Node> = root.children(&mut cursor).collect();
    for child in top {
        walker.walk(child, 0);
    }

    walker.attach_owners();
    walker.finish(parsed)
}

fn whole_file_location(source: &[u8]) -> Location {
    let newlines = bytecount::count(source, b'\n');
    let trailing = source.last().is_some_and(|b| *b == b'\n');
    let end_line = if trailing || source.is_empty() {
        newlines.max(1)
    } else {
        newlines + 1
    };
    let last_line_len = source
        .iter()
        .rev()
        .skip(usize::from(trailing))
        .take_while(|b| **b != b'\n')
        .count();
    Location {
        start_line: 1,
        start_column: 1,
        end_line: end_line as u32,
        end_column: last_line_len as u32 + 1,
        start_byte: 0,
        end_byte: source.len(),
    }
}

impl<'t> Walker<'t, '_> {
    /// Pre-order walk on an explicit stack; nesting depth of the input does
    /// not grow the call stack.
    fn walk(&mut self, node: Node<'t>, scope: usize) {
        let mut stack = vec![(node, scope)];
        while let Some((node, scope)) = stack.pop() {
            let Some(next_scope) = self.visit(node, scope) else {
                continue;
            };
            let mut cursor = node.walk();
            let children: Vec<Node<'t>> = node.children(&mut cursor).collect();
            stack.extend(children.into_iter().rev().map(|child| (child, next_scope)));
        }
    }

    /// Handle one node. Returns the scope for its children, or `None` when
    /// the subtree is consumed here.
    fn visit(&mut self, node: Node<'t>, scope: usize) -> Option<usize> {
        let kind = node.kind();

        if self.rules.comments.contains(&kind) {
            let start = node.start_position();
            self.comment_spans
                .push((start.row, start.column, node.end_position().row));
            return None;
        }

        if self.rules.imports.contains(&kind) {
            self.imports
                .extend(self.normalizer.imports(node, self.source));
            return None;
        }

        if self.rules.detached.contains(&kind) {
            if let Some(detached) = self.normalizer.detached_supertypes(node, self.source) {
                self.detached.push((scope, detached));
            }
        }

        let mut next_scope = scope;
        let scope_kind = self.drafts[scope].kind;
        if let Some(symbol_kind) = self.normalizer.classify(node, self.source, scope_kind) {
            if let Some(name) = self.normalizer.name(node, self.source) {
                next_scope = self.push_draft(node, symbol_kind, name, scope);
            }
        }

        let mut found = Vec::new();
        self.normalizer.references(node, self.source, &mut found);
        if self.options.include_reads && self.normalizer.is_read(node) {
            found.push(RawReference {
                kind: ReferenceKind::Read,
                name: text(node, self.source).to_string(),
                qualifier: None,
                location: Location::from_node(node),
            });
        }
        self.sites.extend(found.into_iter().map(|reference| ReferenceSite {
            owner: next_scope,
            reference,
        }));
        Some(next_scope)
    }

    fn push_draft(&mut self, node: Node<'t>, kind: SymbolKind, name: String, scope: usize) -> usize {
        let normalizer = self.normalizer;
        let source = self.source;
        let scope_kind = self.drafts[scope].kind;
        let index = self.drafts.len();

        let docstring = normalizer.docstring(node, source);
        if let Some(span) = docstring.as_ref().and_then(|d| d.span) {
            self.comment_spans.push(span);
        }

        let access = normalizer.access(node, source, &name);
        self.drafts.push(Draft {
            node,
            kind,
            parent: Some(scope),
            location: Location::from_node(node),
            access,
            flags: normalizer.flags(node, source, scope_kind),
            docstring: docstring.map(|d| d.text),
            signature: if kind.is_callable() {
                normalizer.signature(node, source)
            } else {
                None
            },
            owner_type: if kind.is_callable() {
                normalizer.owner_type(node, source)
            } else {
                None
            },
            name,
        });

        for supertype in normalizer.supertypes(node, source) {
            self.supertypes.push((index, supertype));
        }

        if kind.is_callable() {
            let types = normalizer.type_nodes(node);
            for param in types.parameters {
                self.type_sites(param, index, ReferenceKind::ParameterType);
            }
            if let Some(ret) = types.returns {
                self.type_sites(ret, index, ReferenceKind::ReturnType);
            }
        }

        index
    }

    /// Record every non-builtin type name under an annotation node.
    fn type_sites(&mut self, node: Node<'t>, owner: usize, kind: ReferenceKind) {
        let mut stack = vec![node];
        let mut seen = HashSet::new();
        while let Some(current) = stack.pop() {
            if self.rules.type_names.contains(&current.kind()) {
                let name = text(current, self.source);
                if !name.is_empty()
                    && !self.rules.builtin_types.contains(&name)
                    && seen.insert(name.to_string())
                {
                    self.sites.push(ReferenceSite {
                        owner,
                        reference: RawReference {
                            kind,
                            name: name.to_string(),
                            qualifier: None,
                            location: Location::from_node(current),
                        },
                    });
                }
                continue;
            }
            let mut cursor = current.walk();
            let children: Vec<Node<'t>> = current.named_children(&mut cursor).collect();
            stack.extend(children.into_iter().rev());
        }
    }

    /// Move receiver-bound callables under their type and attach detached
    /// supertypes to their owner. Methods of a type declared in another file
    /// keep the owner name for their qualified name.
    fn attach_owners(&mut self) {
        let type_index: HashMap<String, usize> = self
            .drafts
            .iter()
            .enumerate()
            .filter(|(_, d)| d.kind.is_type_like())
            .rev()
            .map(|(i, d)| (d.name.clone(), i))
            .collect();

        for i in 0..self.drafts.len() {
            let Some(owner) = self.drafts[i].owner_type.clone() else {
                continue;
            };
            self.drafts[i].kind = SymbolKind::Method;
            if let Some(&target) = type_index.get(&owner) {
                if target != i {
                    self.drafts[i].parent = Some(target);
                    self.drafts[i].owner_type = None;
                }
            }
        }

        for (scope, detached) in std::mem::take(&mut self.detached) {
            let owner = type_index.get(&detached.owner).copied().unwrap_or(scope);
            for supertype in detached.supertypes {
                self.supertypes.push((owner, supertype));
            }
        }
    }

    fn finish(self, parsed: &ParsedTree) -> NormalizedFile {
        let source = self.source;
        let rules = self.rules;
        let normalizer = self.normalizer;
        let table = LineTable::build(source, &self.comment_spans);
        let drafts = self.drafts;

        // Qualified names from the parent chain, module excluded.
        let qualified: Vec<String> = (0..drafts.len())
            .map(|i| {
                if i == 0 {
                    return String::new();
                }
                let mut parts = vec![drafts[i].name.as_str()];
                if let Some(owner) = &drafts[i].owner_type {
                    parts.push(owner.as_str());
                }
                let mut guard = 0;
                let mut current = drafts[i].parent;
                while let Some(p) = current {
                    if p == 0 || guard > drafts.len() {
                        break;
                    }
                    parts.push(drafts[p].name.as_str());
                    current = drafts[p].parent;
                    guard += 1;
                }
                parts.reverse();
                parts.join(".")
            })
            .collect();

        // Stable ids; repeated (qualified name, kind) pairs get an ordinal.
        let mut occurrences: HashMap<(&str, SymbolKind), u32> = HashMap::new();
        let ids: Vec<SymbolId> = drafts
            .iter()
            .zip(&qualified)
            .map(|(draft, qname)| {
                let seen = occurrences.entry((qname.as_str(), draft.kind)).or_insert(0);
                let key = if *seen == 0 {
                    qname.clone()
                } else {
                    format!("{qname}#{seen}")
                };
                *seen += 1;
                SymbolId::derive(&parsed.path, &key, draft.kind)
            })
            .collect();

        // Own complexity of callables; nested symbols are boundaries.
        let boundaries: HashSet<usize> = drafts.iter().skip(1).map(|d| d.node.id()).collect();
        let mut measured: Vec<metrics::Complexity> = vec![metrics::Complexity::default(); drafts.len()];
        let mut incomplete = vec![false; drafts.len()];
        for (i, draft) in drafts.iter().enumerate() {
            let broken = self.options.tolerate_errors && draft.node.has_error();
            incomplete[i] = broken;
            if draft.kind.is_callable() && !broken {
                let root = normalizer.measure_root(draft.node);
                measured[i] = metrics::measure(root, source, &rules.control, &boundaries);
            }
        }

        // Containers sum the callables below them.
        let mut totals = measured.clone();
        for (i, draft) in drafts.iter().enumerate() {
            if !draft.kind.is_callable() {
                continue;
            }
            let mut current = draft.parent;
            let mut guard = 0;
            while let Some(p) = current {
                if guard > drafts.len() {
                    break;
                }
                if !drafts[p].kind.is_callable() {
                    totals[p].cyclomatic += measured[i].cyclomatic;
                    totals[p].cognitive += measured[i].cognitive;
                    totals[p].max_nesting = totals[p].max_nesting.max(measured[i].max_nesting);
                }
                current = drafts[p].parent;
                guard += 1;
            }
        }

        let parents: Vec<Option<usize>> = drafts.iter().map(|d| d.parent).collect();
        let symbols: Vec<Symbol> = drafts
            .into_iter()
            .enumerate()
            .map(|(i, draft)| {
                let lines = table.counts(draft.location.start_line, draft.location.end_line);
                let complexity = totals[i];
                let halstead = metrics::halstead(draft.node, source, rules.comments);
                let (cyclomatic, cognitive) = if incomplete[i] && draft.kind.is_callable() {
                    (0, 0)
                } else {
                    (complexity.cyclomatic, complexity.cognitive)
                };
                Symbol {
                    id: ids[i].clone(),
                    name: draft.name,
                    qualified_name: qualified[i].clone(),
                    kind: draft.kind,
                    language: parsed.language,
                    file_path: parsed.path.clone(),
                    location: draft.location,
                    parent: draft.parent.map(|p| ids[p].clone()),
                    metrics: SymbolMetrics {
                        cyclomatic,
                        cognitive,
                        lines_of_code: lines.code,
                        comment_lines: lines.comment,
                        max_nesting: complexity.max_nesting,
                        halstead,
                        maintainability_index: metrics::maintainability_index(
                            cyclomatic.max(1),
                            lines.code,
                            lines.comment,
                        ),
                        incomplete: incomplete[i],
                    },
                    access: draft.access,
                    flags: draft.flags,
                    docstring: draft.docstring,
                    signature: draft.signature,
                }
            })
            .collect();

        NormalizedFile {
            path: parsed.path.clone(),
            language: parsed.language,
            content_hash: content_hash(source),
            size_bytes: source.len() as u64,
            symbols,
            parents,
            sites: self.sites,
            supertypes: self.supertypes,
            imports: self.imports,
            lines: table.whole(),
            incomplete: parsed.has_errors(),
        }
    }
}
