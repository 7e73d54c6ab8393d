//! Python grammar adapter.

use super::GrammarAdapter;
use crate::metrics::ControlFlowRules;
use crate::normalize::*;
use crate::types::*;
use tree_sitter::Node;

pub static PYTHON_RULES: NodeRules = NodeRules {
    symbols: &[
        ("function_definition", SymbolKind::Function),
        ("class_definition", SymbolKind::Class),
        ("assignment", SymbolKind::Variable),
    ],
    comments: &["comment"],
    imports: &[
        "import_statement",
        "import_from_statement",
        "future_import_statement",
    ],
    detached: &[],
    type_names: &["identifier"],
    builtin_types: &[
        "int", "str", "float", "bool", "bytes", "complex", "None", "object", "list", "dict",
        "set", "frozenset", "tuple", "type", "Any", "Optional", "Union", "List", "Dict", "Set",
        "Tuple", "Callable", "Iterable", "Iterator", "Sequence", "Mapping", "Generator",
        "Awaitable", "Self", "typing",
    ],
    control: ControlFlowRules {
        branches: &["if_statement"],
        else_ifs: &["elif_clause"],
        elses: &["else_clause"],
        loops: &["for_statement", "while_statement"],
        cases: &["case_clause"],
        switches: &["match_statement"],
        handlers: &["except_clause", "except_group_clause"],
        conditionals: &["conditional_expression"],
        boolean_kinds: &["boolean_operator"],
        boolean_operators: &["and", "or"],
        lambdas: &["lambda"],
    },
};

/// Python adapter (`.py`, `.pyw`, `.pyi`).
pub struct PythonAdapter;

impl PythonAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for PythonAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl GrammarAdapter for PythonAdapter {
    fn language(&self) -> Language {
        Language::Python
    }

    fn grammar(&self) -> tree_sitter::Language {
        tree_sitter_python::LANGUAGE.into()
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["py", "pyw", "pyi"]
    }

    fn normalizer(&self) -> &dyn Normalizer {
        self
    }
}

impl Normalizer for PythonAdapter {
    fn rules(&self) -> &'static NodeRules {
        &PYTHON_RULES
    }

    fn classify(&self, node: Node, source: &[u8], scope: SymbolKind) -> Option<SymbolKind> {
        let kind = PYTHON_RULES.symbol_kind(node.kind())?;
        if kind == SymbolKind::Variable {
            // Only plain `name = value` statements declare variables.
            if node.parent()?.kind() != "expression_statement" {
                return None;
            }
            let name = node.child_by_field_name("left")?;
            if name.kind() != "identifier" {
                return None;
            }
            if is_constant_name(text(name, source)) {
                return refine_kind(SymbolKind::Constant, scope);
            }
        }
        refine_kind(kind, scope)
    }

    fn name(&self, node: Node, source: &[u8]) -> Option<String> {
        match node.kind() {
            "assignment" => field_text(node, "left", source),
            _ => field_text(node, "name", source),
        }
    }

    fn access(&self, _node: Node, _source: &[u8], name: &str) -> AccessLevel {
        if name.starts_with("__") && !name.ends_with("__") {
            AccessLevel::Private
        } else if name.starts_with('_') && !name.starts_with("__") {
            AccessLevel::Protected
        } else {
            AccessLevel::Public
        }
    }

    fn flags(&self, node: Node, source: &[u8], scope: SymbolKind) -> SymbolFlags {
        let decorators = decorators_of(node, source);
        let has = |names: &[&str]| {
            decorators
                .iter()
                .any(|d| names.contains(&last_segment(d.split('(').next().unwrap_or(d))))
        };
        let name = field_text(node, "name", source)
            .or_else(|| field_text(node, "left", source))
            .unwrap_or_default();

        let is_abstract = match node.kind() {
            "class_definition" => node
                .child_by_field_name("superclasses")
                .map(|s| {
                    let t = text(s, source);
                    t.contains("ABC") || t.contains("Protocol")
                })
                .unwrap_or(false),
            _ => has(&["abstractmethod", "abstractproperty"]),
        };

        SymbolFlags {
            is_abstract,
            is_static: has(&["staticmethod", "classmethod"]),
            is_async: has_child_kind(node, "async"),
            is_exported: scope == SymbolKind::Module && !name.starts_with('_'),
        }
    }

    fn docstring(&self, node: Node, source: &[u8]) -> Option<Docstring> {
        let body = match node.kind() {
            "module" => node,
            "function_definition" | "class_definition" => node.child_by_field_name("body")?,
            _ => return None,
        };
        let first = body.named_child(0)?;
        if first.kind() != "expression_statement" {
            return None;
        }
        let string = first.named_child(0)?;
        if string.kind() != "string" {
            return None;
        }
        let start = first.start_position();
        Some(Docstring {
            text: clean_docstring(text(string, source)),
            span: Some((start.row, start.column, first.end_position().row)),
        })
    }

    fn signature(&self, node: Node, source: &[u8]) -> Option<Signature> {
        let params = node.child_by_field_name("parameters")?;
        let mut parameters = Vec::new();
        let mut cursor = params.walk();
        for param in params.named_children(&mut cursor) {
            let parameter = match param.kind() {
                "identifier" | "list_splat_pattern" | "dictionary_splat_pattern" => Parameter {
                    name: text(param, source).to_string(),
                    type_annotation: None,
                    default_value: None,
                },
                "typed_parameter" => Parameter {
                    name: param
                        .named_child(0)
                        .map(|n| text(n, source).to_string())
                        .unwrap_or_default(),
                    type_annotation: field_text(param, "type", source),
                    default_value: None,
                },
                "default_parameter" | "typed_default_parameter" => Parameter {
                    name: field_text(param, "name", source).unwrap_or_default(),
                    type_annotation: field_text(param, "type", source),
                    default_value: field_text(param, "value", source),
                },
                _ => continue,
            };
            parameters.push(parameter);
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
        let Some(bases) = node.child_by_field_name("superclasses") else {
            return Vec::new();
        };
        let mut out = Vec::new();
        let mut cursor = bases.walk();
        for base in bases.named_children(&mut cursor) {
            if !matches!(base.kind(), "identifier" | "attribute") {
                continue;
            }
            let (qualifier, name) = split_member(text(base, source), ".");
            if name == "object" {
                continue;
            }
            out.push(SupertypeRef {
                name,
                qualifier,
                relation: RelationType::Extends,
                location: Location::from_node(base),
            });
        }
        out
    }

    fn imports(&self, node: Node, source: &[u8]) -> Vec<ImportBinding> {
        let location = Location::from_node(node);
        let mut out = Vec::new();
        match node.kind() {
            "import_statement" => {
                let mut cursor = node.walk();
                for child in node.named_children(&mut cursor) {
                    let (path, alias) = match child.kind() {
                        "dotted_name" => (text(child, source), None),
                        "aliased_import" => (
                            child
                                .child_by_field_name("name")
                                .map(|n| text(n, source))
                                .unwrap_or_default(),
                            field_text(child, "alias", source),
                        ),
                        _ => continue,
                    };
                    if path.is_empty() {
                        continue;
                    }
                    out.push(ImportBinding {
                        local_name: Some(alias.unwrap_or_else(|| path.to_string())),
                        module: dotted_module(path, None),
                        item: ImportedItem::Module,
                        location: location.clone(),
                    });
                }
            }
            "import_from_statement" => {
                let Some(module_node) = node.child_by_field_name("module_name") else {
                    return out;
                };
                let module = match module_node.kind() {
                    "relative_import" => {
                        let mut dots = 0;
                        let mut path = "";
                        let mut cursor = module_node.walk();
                        for part in module_node.named_children(&mut cursor) {
                            match part.kind() {
                                "import_prefix" => dots = text(part, source).len(),
                                "dotted_name" => path = text(part, source),
                                _ => {}
                            }
                        }
                        dotted_module(path, Some(dots.saturating_sub(1)))
                    }
                    _ => dotted_module(text(module_node, source), None),
                };

                if has_child_kind(node, "wildcard_import") {
                    out.push(ImportBinding {
                        local_name: None,
                        module,
                        item: ImportedItem::Glob,
                        location,
                    });
                    return out;
                }

                let mut cursor = node.walk();
                for name_node in node.children_by_field_name("name", &mut cursor) {
                    let (name, alias) = match name_node.kind() {
                        "aliased_import" => (
                            field_text(name_node, "name", source).unwrap_or_default(),
                            field_text(name_node, "alias", source),
                        ),
                        _ => (text(name_node, source).to_string(), None),
                    };
                    if name.is_empty() {
                        continue;
                    }
                    out.push(ImportBinding {
                        local_name: Some(alias.unwrap_or_else(|| name.clone())),
                        module: module.clone(),
                        item: ImportedItem::Name(name),
                        location: location.clone(),
                    });
                }
            }
            _ => {}
        }
        out
    }

    fn references(&self, node: Node, source: &[u8], out: &mut Vec<RawReference>) {
        match node.kind() {
            "call" => {
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
            "raise_statement" => {
                let Some(raised) = node.named_child(0) else {
                    return;
                };
                let target = match raised.kind() {
                    "call" => raised.child_by_field_name("function"),
                    _ => Some(raised),
                };
                if let Some((qualifier, name)) = target.and_then(|t| callee(t, source)) {
                    out.push(RawReference {
                        kind: ReferenceKind::Throw,
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
            "default_parameter" | "typed_default_parameter" => is_field("value"),
            "function_definition" | "class_definition" | "parameters" | "typed_parameter"
            | "lambda_parameters"
            | "global_statement" | "nonlocal_statement" | "list_splat_pattern"
            | "dictionary_splat_pattern" | "pattern_list" | "tuple_pattern" | "type"
            | "as_pattern_target" | "decorator" => false,
            "attribute" => is_field("object"),
            "call" => !is_field("function"),
            "keyword_argument" => !is_field("name"),
            "assignment" | "augmented_assignment" | "for_statement" | "for_in_clause" => {
                !is_field("left")
            }
            _ => true,
        }
    }
}

fn is_constant_name(name: &str) -> bool {
    name.chars().any(|c| c.is_ascii_alphabetic())
        && name
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}

fn dotted_module(path: &str, relative: Option<usize>) -> ModuleSpec {
    ModuleSpec {
        segments: path
            .split('.')
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        relative,
        raw: path.to_string(),
    }
}

/// Callee name and qualifier of a call target.
fn callee(target: Node, source: &[u8]) -> Option<(Option<String>, String)> {
    match target.kind() {
        "identifier" => Some((None, text(target, source).to_string())),
        "attribute" => {
            let object = target.child_by_field_name("object")?;
            let attr = target.child_by_field_name("attribute")?;
            Some((
                Some(text(object, source).to_string()),
                text(attr, source).to_string(),
            ))
        }
        _ => None,
    }
}

fn decorators_of(node: Node, source: &[u8]) -> Vec<String> {
    let Some(parent) = node.parent().filter(|p| p.kind() == "decorated_definition") else {
        return Vec::new();
    };
    let mut cursor = parent.walk();
    let decorators = parent
        .named_children(&mut cursor)
        .filter(|c| c.kind() == "decorator")
        .map(|d| text(d, source).trim_start_matches('@').trim().to_string())
        .collect();
    decorators
}

fn clean_docstring(raw: &str) -> String {
    let mut s = raw.trim();
    s = s.trim_start_matches(['r', 'R', 'u', 'U', 'b', 'B', 'f', 'F']);
    for quote in ["\"\"\"", "'''", "\"", "'"] {
        if s.starts_with(quote) && s.ends_with(quote) && s.len() >= 2 * quote.len() {
            s = &s[quote.len()..s.len() - quote.len()];
            break;
        }
    }
    s.lines()
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn normalize_source(src: &str) -> NormalizedFile {
        let adapter = PythonAdapter::new();
        let parsed = adapter
            .parse("pkg/service.py", src.as_bytes().to_vec(), false)
            .unwrap();
        normalize(
            &parsed,
            &adapter,
            NormalizeOptions {
                include_reads: true,
                tolerate_errors: false,
            },
        )
    }

    const SAMPLE: &str = r#""""Service module."""
from .base import Base as BaseService
import os.path
from ..util import *

MAX_RETRIES = 3


class Service(BaseService):
    """Runs jobs."""

    limit = 10

    def __init__(self, repo: Repo):
        self._repo = repo

    @staticmethod
    def build() -> "Service":
        return Service(None)

    async def run(self, job, retries=MAX_RETRIES):
        if not job:
            raise ValueError("empty")
        return self._process(job)

    def __secret(self):
        pass


def helper(x):
    return os.path.join(x, "y")
"#;

    #[test]
    fn test_extract_symbols() {
        let file = normalize_source(SAMPLE);
        let names: Vec<(&str, SymbolKind)> = file
            .symbols
            .iter()
            .map(|s| (s.qualified_name.as_str(), s.kind))
            .collect();
        assert_eq!(
            names,
            vec![
                ("", SymbolKind::Module),
                ("MAX_RETRIES", SymbolKind::Constant),
                ("Service", SymbolKind::Class),
                ("Service.limit", SymbolKind::Variable),
                ("Service.__init__", SymbolKind::Method),
                ("Service.build", SymbolKind::Method),
                ("Service.run", SymbolKind::Method),
                ("Service.__secret", SymbolKind::Method),
                ("helper", SymbolKind::Function),
            ]
        );
        assert_eq!(file.module().name, "service");
        assert_eq!(file.module().docstring.as_deref(), Some("Service module."));
    }

    #[test]
    fn test_symbol_attributes() {
        let file = normalize_source(SAMPLE);
        let find = |q: &str| file.symbols.iter().find(|s| s.qualified_name == q).unwrap();

        let class = find("Service");
        assert_eq!(class.docstring.as_deref(), Some("Runs jobs."));
        assert_eq!(class.location.start_line, 9);
        assert!(class.flags.is_exported);

        let run = find("Service.run");
        assert!(run.flags.is_async);
        assert!(!run.flags.is_exported);
        assert_eq!(run.metrics.cyclomatic, 2);
        let sig = run.signature.as_ref().unwrap();
        assert_eq!(sig.parameters.len(), 3);
        assert_eq!(sig.parameters[2].default_value.as_deref(), Some("MAX_RETRIES"));

        assert!(find("Service.build").flags.is_static);
        assert_eq!(find("Service.__secret").access, AccessLevel::Private);
        assert_eq!(find("Service.__init__").access, AccessLevel::Public);

        // class sums its methods
        let methods: u32 = file
            .symbols
            .iter()
            .filter(|s| s.kind == SymbolKind::Method)
            .map(|s| s.metrics.cyclomatic)
            .sum();
        assert_eq!(class.metrics.cyclomatic, methods);
    }

    #[test]
    fn test_imports() {
        let file = normalize_source(SAMPLE);
        assert_eq!(file.imports.len(), 3);

        let base = &file.imports[0];
        assert_eq!(base.local_name.as_deref(), Some("BaseService"));
        assert_eq!(base.module.segments, vec!["base".to_string()]);
        assert_eq!(base.module.relative, Some(0));
        assert_eq!(base.item, ImportedItem::Name("Base".into()));

        let os = &file.imports[1];
        assert_eq!(os.local_name.as_deref(), Some("os.path"));
        assert_eq!(os.item, ImportedItem::Module);

        let glob = &file.imports[2];
        assert_eq!(glob.module.relative, Some(1));
        assert_eq!(glob.item, ImportedItem::Glob);
    }

    #[test]
    fn test_references_and_supertypes() {
        let file = normalize_source(SAMPLE);
        let calls: Vec<(Option<&str>, &str)> = file
            .sites
            .iter()
            .filter(|s| s.reference.kind == ReferenceKind::Call)
            .map(|s| (s.reference.qualifier.as_deref(), s.reference.name.as_str()))
            .collect();
        assert!(calls.contains(&(None, "Service")));
        assert!(calls.contains(&(Some("self"), "_process")));
        assert!(calls.contains(&(Some("os.path"), "join")));

        let throws: Vec<&str> = file
            .sites
            .iter()
            .filter(|s| s.reference.kind == ReferenceKind::Throw)
            .map(|s| s.reference.name.as_str())
            .collect();
        assert_eq!(throws, vec!["ValueError"]);

        let params: Vec<&str> = file
            .sites
            .iter()
            .filter(|s| s.reference.kind == ReferenceKind::ParameterType)
            .map(|s| s.reference.name.as_str())
            .collect();
        assert_eq!(params, vec!["Repo"]);

        assert_eq!(file.supertypes.len(), 1);
        assert_eq!(file.supertypes[0].1.name, "BaseService");

        let reads: Vec<&str> = file
            .sites
            .iter()
            .filter(|s| s.reference.kind == ReferenceKind::Read)
            .map(|s| s.reference.name.as_str())
            .collect();
        assert!(reads.contains(&"MAX_RETRIES"));
        assert!(!reads.contains(&"helper"));
    }

    #[test]
    fn test_local_assignments_are_not_symbols() {
        let file = normalize_source("def f():\n    total = 1\n    return total\n");
        assert_eq!(file.symbols.len(), 2);
        assert_eq!(file.lines.code, 3);
    }

    #[test]
    fn test_identifiers_stable_under_unrelated_rename() {
        let a = normalize_source("def keep():\n    pass\n\ndef other():\n    pass\n");
        let b = normalize_source("def keep():\n    pass\n\ndef renamed():\n    pass\n");
        assert_eq!(a.symbols[1].id, b.symbols[1].id);
        assert_ne!(a.symbols[2].id, b.symbols[2].id);
    }

    #[test]
    fn test_duplicate_definitions_get_distinct_ids() {
        let file = normalize_source("def f():\n    pass\n\ndef f():\n    return 1\n");
        assert_eq!(file.symbols.len(), 3);
        assert_ne!(file.symbols[1].id, file.symbols[2].id);
    }
}
