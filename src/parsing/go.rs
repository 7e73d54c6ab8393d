//! Go grammar adapter.
//!
//! Go has no lexical class bodies: methods name their type through the
//! receiver, and a package spans every file in its directory.

use super::GrammarAdapter;
use crate::metrics::ControlFlowRules;
use crate::normalize::*;
use crate::types::*;
use tree_sitter::Node;

pub static GO_RULES: NodeRules = NodeRules {
    symbols: &[
        ("function_declaration", SymbolKind::Function),
        ("method_declaration", SymbolKind::Method),
        ("method_elem", SymbolKind::Method),
        ("method_spec", SymbolKind::Method),
        ("type_spec", SymbolKind::Class),
        ("type_alias", SymbolKind::TypeAlias),
        ("var_spec", SymbolKind::Variable),
        ("const_spec", SymbolKind::Constant),
    ],
    comments: &["comment"],
    imports: &["import_declaration"],
    detached: &[],
    type_names: &["type_identifier"],
    builtin_types: &[
        "bool", "byte", "complex64", "complex128", "error", "float32", "float64", "int", "int8",
        "int16", "int32", "int64", "rune", "string", "uint", "uint8", "uint16", "uint32",
        "uint64", "uintptr", "any", "comparable",
    ],
    control: ControlFlowRules {
        branches: &["if_statement"],
        else_ifs: &[],
        elses: &[],
        loops: &["for_statement"],
        cases: &["expression_case", "type_case", "communication_case"],
        switches: &[
            "expression_switch_statement",
            "type_switch_statement",
            "select_statement",
        ],
        handlers: &[],
        conditionals: &[],
        boolean_kinds: &["binary_expression"],
        boolean_operators: &["&&", "||"],
        lambdas: &["func_literal"],
    },
};

const DECLARATION_GROUPS: &[&str] = &["type_declaration", "const_declaration", "var_declaration"];

/// Go adapter (`.go`).
pub struct GoAdapter;

impl GoAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for GoAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl GrammarAdapter for GoAdapter {
    fn language(&self) -> Language {
        Language::Go
    }

    fn grammar(&self) -> tree_sitter::Language {
        tree_sitter_go::LANGUAGE.into()
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["go"]
    }

    fn normalizer(&self) -> &dyn Normalizer {
        self
    }
}

fn is_exported_name(name: &str) -> bool {
    name.chars().next().is_some_and(char::is_uppercase)
}

impl Normalizer for GoAdapter {
    fn rules(&self) -> &'static NodeRules {
        &GO_RULES
    }

    fn classify(&self, node: Node, _source: &[u8], scope: SymbolKind) -> Option<SymbolKind> {
        let kind = match node.kind() {
            "type_spec" => match node.child_by_field_name("type")?.kind() {
                "struct_type" => SymbolKind::Class,
                "interface_type" => SymbolKind::Interface,
                _ => SymbolKind::TypeAlias,
            },
            other => GO_RULES.symbol_kind(other)?,
        };
        refine_kind(kind, scope)
    }

    fn access(&self, _node: Node, _source: &[u8], name: &str) -> AccessLevel {
        if is_exported_name(name) {
            AccessLevel::Public
        } else {
            AccessLevel::Package
        }
    }

    fn flags(&self, node: Node, source: &[u8], _scope: SymbolKind) -> SymbolFlags {
        let name = field_text(node, "name", source).unwrap_or_default();
        SymbolFlags {
            is_abstract: matches!(node.kind(), "method_elem" | "method_spec"),
            is_static: false,
            is_async: false,
            is_exported: is_exported_name(&name),
        }
    }

    fn docstring(&self, node: Node, source: &[u8]) -> Option<Docstring> {
        let raw = if node.kind() == "source_file" {
            let mut cursor = node.walk();
            let package = node
                .children(&mut cursor)
                .find(|c| c.kind() == "package_clause")?;
            leading_comments(package, source, &["comment"], &[], |_| true)?
        } else {
            leading_comments(node, source, &["comment"], &[], |_| true).or_else(|| {
                node.parent()
                    .filter(|p| DECLARATION_GROUPS.contains(&p.kind()))
                    .and_then(|p| leading_comments(p, source, &["comment"], &[], |_| true))
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
            if !matches!(
                param.kind(),
                "parameter_declaration" | "variadic_parameter_declaration"
            ) {
                continue;
            }
            let type_annotation = field_text(param, "type", source);
            let mut names = param.walk();
            let declared: Vec<String> = param
                .children_by_field_name("name", &mut names)
                .map(|n| text(n, source).to_string())
                .collect();
            if declared.is_empty() {
                parameters.push(Parameter {
                    name: String::new(),
                    type_annotation,
                    default_value: None,
                });
            } else {
                for name in declared {
                    parameters.push(Parameter {
                        name,
                        type_annotation: type_annotation.clone(),
                        default_value: None,
                    });
                }
            }
        }
        Some(Signature {
            parameters,
            return_type: field_text(node, "result", source),
        })
    }

    fn type_nodes<'t>(&self, node: Node<'t>) -> TypeNodes<'t> {
        let mut types = TypeNodes {
            returns: node.child_by_field_name("result"),
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
        let mut out = Vec::new();
        let Some(body) = node
            .child_by_field_name("type")
            .filter(|_| node.kind() == "type_spec")
        else {
            return out;
        };
        match body.kind() {
            "struct_type" => {
                let mut cursor = body.walk();
                for list in body.named_children(&mut cursor) {
                    let mut fields = list.walk();
                    for field in list.named_children(&mut fields) {
                        // embedded fields have a type but no name
                        if field.kind() != "field_declaration"
                            || field.child_by_field_name("name").is_some()
                        {
                            continue;
                        }
                        if let Some(ty) = field.child_by_field_name("type") {
                            push_embedded(ty, source, &mut out);
                        }
                    }
                }
            }
            "interface_type" => {
                let mut cursor = body.walk();
                for elem in body.named_children(&mut cursor) {
                    match elem.kind() {
                        "type_elem" | "constraint_elem" => {
                            if let Some(ty) = elem.named_child(0) {
                                push_embedded(ty, source, &mut out);
                            }
                        }
                        "type_identifier" | "qualified_type" => {
                            push_embedded(elem, source, &mut out)
                        }
                        _ => {}
                    }
                }
            }
            _ => {}
        }
        out
    }

    fn owner_type(&self, node: Node, source: &[u8]) -> Option<String> {
        if node.kind() != "method_declaration" {
            return None;
        }
        let receiver = node.child_by_field_name("receiver")?;
        let mut cursor = receiver.walk();
        let param = receiver
            .named_children(&mut cursor)
            .find(|p| p.kind() == "parameter_declaration")?;
        let ty = text(param.child_by_field_name("type")?, source);
        let name = ty.trim_start_matches('*').split('[').next().unwrap_or(ty).trim();
        (!name.is_empty()).then(|| name.to_string())
    }

    fn imports(&self, node: Node, source: &[u8]) -> Vec<ImportBinding> {
        let mut specs = Vec::new();
        let mut stack = vec![node];
        while let Some(current) = stack.pop() {
            if current.kind() == "import_spec" {
                specs.push(current);
                continue;
            }
            let mut cursor = current.walk();
            let children: Vec<Node> = current.named_children(&mut cursor).collect();
            stack.extend(children.into_iter().rev());
        }

        let mut out = Vec::new();
        for spec in specs {
            let Some(path) = field_text(spec, "path", source) else {
                continue;
            };
            let path = path.trim_matches(|c| c == '"' || c == '`').to_string();
            let module = ModuleSpec {
                segments: path
                    .split('/')
                    .filter(|s| !s.is_empty() && *s != ".")
                    .map(str::to_string)
                    .collect(),
                relative: path.starts_with("./").then_some(0),
                raw: path.clone(),
            };
            let alias = field_text(spec, "name", source);
            let (local_name, item) = match alias.as_deref() {
                Some(".") => (None, ImportedItem::Glob),
                Some("_") => (None, ImportedItem::Module),
                Some(alias) => (Some(alias.to_string()), ImportedItem::Module),
                None => (
                    Some(last_segment(&path).to_string()),
                    ImportedItem::Module,
                ),
            };
            out.push(ImportBinding {
                local_name,
                module,
                item,
                location: Location::from_node(spec),
            });
        }
        out
    }

    fn references(&self, node: Node, source: &[u8], out: &mut Vec<RawReference>) {
        match node.kind() {
            "call_expression" => {
                let Some(function) = node.child_by_field_name("function") else {
                    return;
                };
                let target = match function.kind() {
                    "identifier" => Some((None, text(function, source).to_string())),
                    "selector_expression" => function
                        .child_by_field_name("operand")
                        .zip(function.child_by_field_name("field"))
                        .map(|(operand, field)| {
                            (
                                Some(text(operand, source).to_string()),
                                text(field, source).to_string(),
                            )
                        }),
                    _ => None,
                };
                if let Some((qualifier, name)) = target {
                    out.push(RawReference {
                        kind: ReferenceKind::Call,
                        name,
                        qualifier,
                        location: Location::from_node(node),
                    });
                }
            }
            "composite_literal" => {
                let Some(ty) = node.child_by_field_name("type") else {
                    return;
                };
                let ty = match ty.kind() {
                    "generic_type" => ty.child_by_field_name("type").unwrap_or(ty),
                    _ => ty,
                };
                if matches!(ty.kind(), "type_identifier" | "qualified_type") {
                    let (qualifier, name) = split_member(text(ty, source), ".");
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
            "call_expression" => !is_field("function"),
            "function_declaration" | "parameter_declaration"
            | "variadic_parameter_declaration" | "var_spec" | "const_spec" | "labeled_statement"
            | "range_clause" | "label_name" => false,
            "expression_list" => !parent.parent().is_some_and(|gp| {
                matches!(
                    gp.kind(),
                    "short_var_declaration" | "assignment_statement" | "range_clause"
                ) && gp
                    .child_by_field_name("left")
                    .is_some_and(|left| left.id() == parent.id())
            }),
            _ => true,
        }
    }
}

fn push_embedded(ty: Node, source: &[u8], out: &mut Vec<SupertypeRef>) {
    let ty = if ty.kind() == "pointer_type" {
        match ty.named_child(0) {
            Some(inner) => inner,
            None => return,
        }
    } else {
        ty
    };
    let ty = if ty.kind() == "generic_type" {
        ty.child_by_field_name("type").unwrap_or(ty)
    } else {
        ty
    };
    if !matches!(ty.kind(), "type_identifier" | "qualified_type") {
        return;
    }
    let (qualifier, name) = split_member(text(ty, source), ".");
    out.push(SupertypeRef {
        name,
        qualifier,
        relation: RelationType::Extends,
        location: Location::from_node(ty),
    });
}
