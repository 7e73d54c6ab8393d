//! Rust grammar adapter.

use super::GrammarAdapter;
use crate::metrics::ControlFlowRules;
use crate::normalize::*;
use crate::types::*;
use tree_sitter::Node;

const COMMENTS: &[&str] = &["line_comment", "block_comment"];

pub static RUST_RULES: NodeRules = NodeRules {
    symbols: &[
        ("function_item", SymbolKind::Function),
        ("function_signature_item", SymbolKind::Function),
        ("struct_item", SymbolKind::Class),
        ("union_item", SymbolKind::Class),
        ("enum_item", SymbolKind::Enum),
        ("trait_item", SymbolKind::Interface),
        ("mod_item", SymbolKind::Module),
        ("const_item", SymbolKind::Constant),
        ("static_item", SymbolKind::Variable),
        ("type_item", SymbolKind::TypeAlias),
    ],
    comments: COMMENTS,
    imports: &["use_declaration"],
    detached: &["impl_item"],
    type_names: &["type_identifier"],
    builtin_types: &[
        "Self", "String", "Vec", "Option", "Result", "Box", "Rc", "Arc", "HashMap", "HashSet",
        "BTreeMap", "BTreeSet", "VecDeque", "Cow", "PhantomData", "Send", "Sync", "Sized",
        "Copy", "Clone", "Debug", "Default", "Display", "Eq", "PartialEq", "Ord", "PartialOrd",
        "Hash", "Iterator", "IntoIterator", "Fn", "FnMut", "FnOnce", "From", "Into", "AsRef",
        "Error",
    ],
    control: ControlFlowRules {
        branches: &["if_expression"],
        else_ifs: &[],
        elses: &["else_clause"],
        loops: &["for_expression", "while_expression", "loop_expression"],
        cases: &["match_arm"],
        switches: &["match_expression"],
        handlers: &[],
        conditionals: &[],
        boolean_kinds: &["binary_expression"],
        boolean_operators: &["&&", "||"],
        lambdas: &["closure_expression"],
    },
};

/// Rust adapter (`.rs`).
pub struct RustAdapter;

impl RustAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl GrammarAdapter for RustAdapter {
    fn language(&self) -> Language {
        Language::Rust
    }

    fn grammar(&self) -> tree_sitter::Language {
        tree_sitter_rust::LANGUAGE.into()
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["rs"]
    }

    fn normalizer(&self) -> &dyn Normalizer {
        self
    }
}

impl Normalizer for RustAdapter {
    fn rules(&self) -> &'static NodeRules {
        &RUST_RULES
    }

    fn access(&self, node: Node, source: &[u8], _name: &str) -> AccessLevel {
        let mut cursor = node.walk();
        let visibility = node
            .children(&mut cursor)
            .find(|c| c.kind() == "visibility_modifier")
            .map(|c| text(c, source).trim().to_string());
        match visibility.as_deref() {
            Some("pub") => AccessLevel::Public,
            Some(_) => AccessLevel::Package,
            // Trait items and trait impl items carry the trait's visibility.
            None if enclosing_trait_scope(node) => AccessLevel::Public,
            None => AccessLevel::Private,
        }
    }

    fn flags(&self, node: Node, source: &[u8], _scope: SymbolKind) -> SymbolFlags {
        let callable = matches!(node.kind(), "function_item" | "function_signature_item");
        let is_async = {
            let mut cursor = node.walk();
            let found = node
                .children(&mut cursor)
                .any(|c| c.kind() == "function_modifiers" && text(c, source).contains("async"));
            found
        };
        let in_impl = impl_of(node).is_some();
        let takes_self = node
            .child_by_field_name("parameters")
            .is_some_and(|p| has_child_kind(p, "self_parameter"));
        SymbolFlags {
            is_abstract: node.kind() == "function_signature_item",
            is_static: callable && in_impl && !takes_self,
            is_async,
            is_exported: self.access(node, source, "") == AccessLevel::Public,
        }
    }

    fn docstring(&self, node: Node, source: &[u8]) -> Option<Docstring> {
        let raw = if node.kind() == "source_file" {
            inner_doc(node, source)?
        } else {
            leading_comments(node, source, COMMENTS, &["attribute_item"], |c| {
                c.starts_with("///") || c.starts_with("/**")
            })?
        };
        Some(Docstring {
            text: clean_comment(&raw),
            span: None,
        })
    }

    fn signature(&self, node: Node, source: &[u8]) -> Option<Signature> {
        let params = node.child_by_field_name("parameters")?;
        let mut parameters = Vec::new();
        let mut cursor = params.walk();
        for param in params.named_children(&mut cursor) {
            match param.kind() {
                "parameter" => parameters.push(Parameter {
                    name: field_text(param, "pattern", source).unwrap_or_default(),
                    type_annotation: field_text(param, "type", source),
                    default_value: None,
                }),
                "self_parameter" => parameters.push(Parameter {
                    name: "self".into(),
                    type_annotation: Some(text(param, source).to_string()),
                    default_value: None,
                }),
                _ => {}
            }
        }
        Some(Signature {
            parameters,
            return_type: field_text(node, "return_type", source),
        })
    }

    fn type_nodes<'t>(&self, node: Node<'t>) -> TypeNodes<'t> {
        let mut types = TypeNodes {
            returns: node.child_by_field_name("return_type"),
            ..TypeNodes::default()
        };
        if let Some(params) = node.child_by_field_name("parameters") {
            let mut cursor = params.walk();
            for param in params.named_children(&mut cursor) {
                if let Some(ty) = param.child_by_field_name("type") {
                    types.parameters.push(ty);
                }
            }
        }
        types
    }

    fn supertypes(&self, node: Node, source: &[u8]) -> Vec<SupertypeRef> {
        if node.kind() != "trait_item" {
            return Vec::new();
        }
        let Some(bounds) = node.child_by_field_name("bounds") else {
            return Vec::new();
        };
        let mut out = Vec::new();
        let mut cursor = bounds.walk();
        for bound in bounds.named_children(&mut cursor) {
            if let Some(supertype) = type_ref(bound, source, RelationType::Extends) {
                out.push(supertype);
            }
        }
        out
    }

    fn owner_type(&self, node: Node, source: &[u8]) -> Option<String> {
        impl_of(node).and_then(|imp| impl_type_ident(imp, source))
    }

    fn detached_supertypes(&self, node: Node, source: &[u8]) -> Option<DetachedSupertypes> {
        let owner = impl_type_ident(node, source)?;
        let trait_node = node.child_by_field_name("trait")?;
        let supertype = type_ref(trait_node, source, RelationType::Implements)?;
        Some(DetachedSupertypes {
            owner,
            supertypes: vec![supertype],
        })
    }

    fn imports(&self, node: Node, source: &[u8]) -> Vec<ImportBinding> {
        let mut out = Vec::new();
        if let Some(argument) = node.child_by_field_name("argument") {
            let location = Location::from_node(node);
            collect_use_tree(argument, source, "", &location, &mut out);
        }
        out
    }

    fn references(&self, node: Node, source: &[u8], out: &mut Vec<RawReference>) {
        match node.kind() {
            "call_expression" => {
                if let Some((qualifier, name)) = node
                    .child_by_field_name("function")
                    .and_then(|f| callee(f, source))
                {
                    out.push(RawReference {
                        kind: ReferenceKind::Call,
                        name,
                        qualifier,
                        location: Location::from_node(node),
                    });
                }
            }
            "struct_expression" => {
                let Some(name_node) = node.child_by_field_name("name") else {
                    return;
                };
                let path = strip_generics(text(name_node, source));
                let (qualifier, name) = split_member(path, "::");
                if name != "Self" {
                    out.push(RawReference {
                        kind: ReferenceKind::New,
                        name,
                        qualifier,
                        location: Location::from_node(node),
                    });
                }
            }
            _ => {}
        }
    }

    fn is_read(&self, node: Node) -> bool {
        if node.kind() != "identifier" {
            return false;
        }
        let Some(parent) = node.parent() else {
            return false;
        };
        let is_field = |field: &str| {
            parent
                .child_by_field_name(field)
                .is_some_and(|n| n.id() == node.id())
        };
        match parent.kind() {
            "let_declaration" | "for_expression" => !is_field("pattern"),
            "assignment_expression" | "compound_assignment_expr" => !is_field("left"),
            "call_expression" => !is_field("function"),
            "function_item" | "function_signature_item" | "parameter" | "closure_parameters"
            | "scoped_identifier" | "macro_invocation" | "mod_item" | "const_item"
            | "static_item" | "tuple_pattern" | "struct_pattern" | "tuple_struct_pattern"
            | "match_pattern" | "field_pattern" | "ref_pattern" | "mut_pattern"
            | "or_pattern" | "slice_pattern" | "captured_pattern" => false,
            _ => true,
        }
    }
}

/// `impl` block directly containing this item.
fn impl_of(node: Node) -> Option<Node> {
    let list = node.parent().filter(|p| p.kind() == "declaration_list")?;
    list.parent().filter(|p| p.kind() == "impl_item")
}

fn enclosing_trait_scope(node: Node) -> bool {
    let Some(list) = node.parent().filter(|p| p.kind() == "declaration_list") else {
        return false;
    };
    match list.parent() {
        Some(p) if p.kind() == "trait_item" => true,
        Some(p) if p.kind() == "impl_item" => p.child_by_field_name("trait").is_some(),
        _ => false,
    }
}

/// Base type name of an impl (`Foo` for `impl<T> Foo<T>`).
fn impl_type_ident(node: Node, source: &[u8]) -> Option<String> {
    let ty = node.child_by_field_name("type")?;
    let path = strip_generics(text(ty, source)).trim_start_matches(['&', ' ']);
    let name = last_segment(path);
    (!name.is_empty()).then(|| name.to_string())
}

fn strip_generics(path: &str) -> &str {
    path.split('<').next().unwrap_or(path).trim()
}

fn type_ref(node: Node, source: &[u8], relation: RelationType) -> Option<SupertypeRef> {
    if !matches!(
        node.kind(),
        "type_identifier" | "scoped_type_identifier" | "generic_type"
    ) {
        return None;
    }
    let (qualifier, name) = split_member(strip_generics(text(node, source)), "::");
    if name.is_empty() || RUST_RULES.builtin_types.contains(&name.as_str()) {
        return None;
    }
    Some(SupertypeRef {
        name,
        qualifier,
        relation,
        location: Location::from_node(node),
    })
}

fn callee(function: Node, source: &[u8]) -> Option<(Option<String>, String)> {
    match function.kind() {
        "identifier" => Some((None, text(function, source).to_string())),
        "scoped_identifier" => Some(split_member(strip_generics(text(function, source)), "::")),
        "field_expression" => {
            let value = function.child_by_field_name("value")?;
            let field = function.child_by_field_name("field")?;
            Some((
                Some(text(value, source).to_string()),
                text(field, source).to_string(),
            ))
        }
        "generic_function" => callee(function.child_by_field_name("function")?, source),
        _ => None,
    }
}

/// Leading `//!` comments of a file.
fn inner_doc(root: Node, source: &[u8]) -> Option<String> {
    let mut lines = Vec::new();
    let mut cursor = root.walk();
    for child in root.children(&mut cursor) {
        let comment = text(child, source).trim();
        if child.kind() == "line_comment" && comment.starts_with("//!") {
            lines.push(comment.to_string());
        } else {
            break;
        }
    }
    (!lines.is_empty()).then(|| lines.join("\n"))
}

fn join_path(prefix: &str, path: &str) -> String {
    if prefix.is_empty() {
        path.to_string()
    } else {
        format!("{prefix}::{path}")
    }
}

/// Module spec for a `::` path; `crate`, `self` and `super` are dropped and the
/// rest is matched by suffix.
fn module_spec(path: &str) -> ModuleSpec {
    ModuleSpec {
        segments: path
            .split("::")
            .map(str::trim)
            .filter(|s| !s.is_empty() && !matches!(*s, "crate" | "self" | "super"))
            .map(str::to_string)
            .collect(),
        relative: None,
        raw: path.to_string(),
    }
}

/// Bind `path` as an item: everything but the last segment is the module.
fn item_binding(path: &str, alias: Option<String>, location: &Location) -> ImportBinding {
    let (module, name) = split_member(path, "::");
    match module {
        Some(module) => ImportBinding {
            local_name: Some(alias.unwrap_or_else(|| name.clone())),
            module: module_spec(&module),
            item: ImportedItem::Name(name),
            location: location.clone(),
        },
        None => ImportBinding {
            local_name: Some(alias.unwrap_or_else(|| name.clone())),
            module: module_spec(&name),
            item: ImportedItem::Module,
            location: location.clone(),
        },
    }
}

fn collect_use_tree(
    node: Node,
    source: &[u8],
    prefix: &str,
    location: &Location,
    out: &mut Vec<ImportBinding>,
) {
    match node.kind() {
        "identifier" | "scoped_identifier" | "crate" | "super" => {
            let path = join_path(prefix, text(node, source));
            out.push(item_binding(&path, None, location));
        }
        "self" => {
            // `use a::b::{self}` binds the module itself
            if !prefix.is_empty() {
                out.push(ImportBinding {
                    local_name: Some(last_segment(prefix).to_string()),
                    module: module_spec(prefix),
                    item: ImportedItem::Module,
                    location: location.clone(),
                });
            }
        }
        "use_as_clause" => {
            let (Some(path), Some(alias)) = (
                node.child_by_field_name("path"),
                field_text(node, "alias", source),
            ) else {
                return;
            };
            let path = join_path(prefix, text(path, source));
            if alias != "_" {
                out.push(item_binding(&path, Some(alias), location));
            }
        }
        "use_wildcard" => {
            let raw = text(node, source);
            let path = raw.strip_suffix('*').unwrap_or(raw).trim_end_matches("::");
            let path = if path.is_empty() {
                prefix.to_string()
            } else {
                join_path(prefix, path)
            };
            if !path.is_empty() {
                out.push(ImportBinding {
                    local_name: None,
                    module: module_spec(&path),
                    item: ImportedItem::Glob,
                    location: location.clone(),
                });
            }
        }
        "scoped_use_list" => {
            let new_prefix = match node.child_by_field_name("path") {
                Some(path) => join_path(prefix, text(path, source)),
                None => prefix.to_string(),
            };
            if let Some(list) = node.child_by_field_name("list") {
                collect_use_tree(list, source, &new_prefix, location, out);
            }
        }
        "use_list" => {
            let mut cursor = node.walk();
            for child in node.named_children(&mut cursor) {
                collect_use_tree(child, source, prefix, location, out);
            }
        }
        _ => {}
    }
}
