//! JavaScript grammar adapter.
//!
//! [`EcmaNormalizer`] handles both the JavaScript and TypeScript grammars; the
//! TypeScript node kinds it knows about simply never occur in JavaScript trees.

use super::GrammarAdapter;
use crate::metrics::ControlFlowRules;
use crate::normalize::*;
use crate::types::*;
use tree_sitter::Node;

pub(crate) const ECMA_CONTROL: ControlFlowRules = ControlFlowRules {
    branches: &["if_statement"],
    else_ifs: &[],
    elses: &["else_clause"],
    loops: &[
        "for_statement",
        "for_in_statement",
        "while_statement",
        "do_statement",
    ],
    cases: &["switch_case"],
    switches: &["switch_statement"],
    handlers: &["catch_clause"],
    conditionals: &["ternary_expression"],
    boolean_kinds: &["binary_expression"],
    boolean_operators: &["&&", "||", "??"],
    lambdas: &[
        "arrow_function",
        "function_expression",
        "function",
        "generator_function",
    ],
};

pub static JAVASCRIPT_RULES: NodeRules = NodeRules {
    symbols: &[
        ("function_declaration", SymbolKind::Function),
        ("generator_function_declaration", SymbolKind::Function),
        ("class_declaration", SymbolKind::Class),
        ("method_definition", SymbolKind::Method),
        ("field_definition", SymbolKind::Variable),
        ("variable_declarator", SymbolKind::Variable),
    ],
    comments: &["comment"],
    imports: &["import_statement"],
    detached: &[],
    type_names: &[],
    builtin_types: &[],
    control: ECMA_CONTROL,
};

const FUNCTION_VALUES: &[&str] = &[
    "arrow_function",
    "function_expression",
    "function",
    "generator_function",
];

const SOURCE_EXTENSIONS: &[&str] = &[
    ".d.ts", ".js", ".jsx", ".mjs", ".cjs", ".ts", ".tsx", ".mts", ".cts",
];

/// Normalization hooks shared by the JavaScript and TypeScript grammars.
pub struct EcmaNormalizer {
    rules: &'static NodeRules,
}

impl EcmaNormalizer {
    pub fn new(rules: &'static NodeRules) -> Self {
        Self { rules }
    }
}

/// JavaScript adapter (`.js`, `.jsx`, `.mjs`, `.cjs`).
pub struct JavaScriptAdapter {
    normalizer: EcmaNormalizer,
}

impl JavaScriptAdapter {
    pub fn new() -> Self {
        Self {
            normalizer: EcmaNormalizer::new(&JAVASCRIPT_RULES),
        }
    }
}

impl Default for JavaScriptAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl GrammarAdapter for JavaScriptAdapter {
    fn language(&self) -> Language {
        Language::JavaScript
    }

    fn grammar(&self) -> tree_sitter::Language {
        tree_sitter_javascript::LANGUAGE.into()
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["js", "jsx", "mjs", "cjs"]
    }

    fn normalizer(&self) -> &dyn Normalizer {
        &self.normalizer
    }
}

impl Normalizer for EcmaNormalizer {
    fn rules(&self) -> &'static NodeRules {
        self.rules
    }

    fn classify(&self, node: Node, _source: &[u8], scope: SymbolKind) -> Option<SymbolKind> {
        let kind = self.rules.symbol_kind(node.kind())?;
        match node.kind() {
            // Object literal methods are not class members.
            "method_definition" if node.parent()?.kind() != "class_body" => None,
            "variable_declarator" => {
                if node.child_by_field_name("name")?.kind() != "identifier" {
                    return None;
                }
                let value_kind = node.child_by_field_name("value").map(|v| v.kind());
                if value_kind.is_some_and(|k| FUNCTION_VALUES.contains(&k)) {
                    return refine_kind(SymbolKind::Function, scope);
                }
                let is_const = node
                    .parent()
                    .is_some_and(|decl| decl.kind() == "lexical_declaration" && has_child_kind(decl, "const"));
                refine_kind(
                    if is_const {
                        SymbolKind::Constant
                    } else {
                        SymbolKind::Variable
                    },
                    scope,
                )
            }
            _ => refine_kind(kind, scope),
        }
    }

    fn name(&self, node: Node, source: &[u8]) -> Option<String> {
        match node.kind() {
            "field_definition" => field_text(node, "property", source),
            _ => field_text(node, "name", source),
        }
    }

    fn access(&self, node: Node, source: &[u8], name: &str) -> AccessLevel {
        if name.starts_with('#') {
            return AccessLevel::Private;
        }
        let mut cursor = node.walk();
        let modifier = node
            .children(&mut cursor)
            .find(|c| c.kind() == "accessibility_modifier")
            .map(|c| text(c, source).trim().to_string());
        match modifier.as_deref() {
            Some("private") => AccessLevel::Private,
            Some("protected") => AccessLevel::Protected,
            _ => AccessLevel::Public,
        }
    }

    fn flags(&self, node: Node, _source: &[u8], _scope: SymbolKind) -> SymbolFlags {
        let function = function_node(node);
        SymbolFlags {
            is_abstract: matches!(
                node.kind(),
                "abstract_class_declaration" | "abstract_method_signature"
            ) || has_child_kind(node, "abstract"),
            is_static: has_child_kind(node, "static"),
            is_async: has_child_kind(function, "async"),
            is_exported: export_wrapper(node).is_some(),
        }
    }

    fn docstring(&self, node: Node, source: &[u8]) -> Option<Docstring> {
        let anchor = export_wrapper(node).unwrap_or_else(|| declaration_of(node));
        let raw = leading_comments(anchor, source, &["comment"], &["decorator"], |c| {
            c.starts_with("/**")
        })?;
        Some(Docstring {
            text: clean_comment(&raw),
            span: None,
        })
    }

    fn signature(&self, node: Node, source: &[u8]) -> Option<Signature> {
        let function = function_node(node);
        let mut parameters = Vec::new();
        if let Some(single) = function.child_by_field_name("parameter") {
            parameters.push(Parameter {
                name: text(single, source).to_string(),
                type_annotation: None,
                default_value: None,
            });
        }
        if let Some(params) = function.child_by_field_name("parameters") {
            let mut cursor = params.walk();
            for param in params.named_children(&mut cursor) {
                if let Some(parameter) = parameter_of(param, source) {
                    parameters.push(parameter);
                }
            }
        }
        Some(Signature {
            parameters,
            return_type: field_text(function, "return_type", source)
                .map(|t| t.trim_start_matches(':').trim().to_string()),
        })
    }

    fn type_nodes<'t>(&self, node: Node<'t>) -> TypeNodes<'t> {
        let function = function_node(node);
        let mut types = TypeNodes {
            returns: function.child_by_field_name("return_type"),
            ..TypeNodes::default()
        };
        if let Some(params) = function.child_by_field_name("parameters") {
            let mut cursor = params.walk();
            for param in params.named_children(&mut cursor) {
                if let Some(ty) = param.child_by_field_name("type") {
                    types.parameters.push(ty);
                }
            }
        }
        types
    }

    fn measure_root<'t>(&self, node: Node<'t>) -> Node<'t> {
        function_node(node)
    }

    fn supertypes(&self, node: Node, source: &[u8]) -> Vec<SupertypeRef> {
        let mut out = Vec::new();
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            match child.kind() {
                "class_heritage" => {
                    let mut inner = child.walk();
                    for clause in child.named_children(&mut inner) {
                        match clause.kind() {
                            "extends_clause" => {
                                push_type_refs(clause, source, RelationType::Extends, &mut out)
                            }
                            "implements_clause" => {
                                push_type_refs(clause, source, RelationType::Implements, &mut out)
                            }
                            // JavaScript: `extends <expression>` directly
                            _ => push_type_ref(clause, source, RelationType::Extends, &mut out),
                        }
                    }
                }
                "extends_type_clause" => {
                    push_type_refs(child, source, RelationType::Extends, &mut out)
                }
                _ => {}
            }
        }
        out
    }

    fn imports(&self, node: Node, source: &[u8]) -> Vec<ImportBinding> {
        let Some(module) = node
            .child_by_field_name("source")
            .map(|s| module_spec(strip_quotes(text(s, source))))
        else {
            return Vec::new();
        };
        let location = Location::from_node(node);
        let mut out = Vec::new();
        let binding = |local: String, item: ImportedItem| ImportBinding {
            local_name: Some(local),
            module: module.clone(),
            item,
            location: location.clone(),
        };

        let mut cursor = node.walk();
        let clause = node
            .named_children(&mut cursor)
            .find(|c| c.kind() == "import_clause");
        let Some(clause) = clause else {
            // side-effect import
            return vec![ImportBinding {
                local_name: None,
                module,
                item: ImportedItem::Module,
                location,
            }];
        };

        let mut cursor = clause.walk();
        for part in clause.named_children(&mut cursor) {
            match part.kind() {
                "identifier" => out.push(binding(text(part, source).to_string(), ImportedItem::Default)),
                "namespace_import" => {
                    if let Some(local) = part.named_child(0) {
                        out.push(binding(text(local, source).to_string(), ImportedItem::Module));
                    }
                }
                "named_imports" => {
                    let mut inner = part.walk();
                    for spec in part.named_children(&mut inner) {
                        if spec.kind() != "import_specifier" {
                            continue;
                        }
                        let Some(name) = field_text(spec, "name", source) else {
                            continue;
                        };
                        let local = field_text(spec, "alias", source).unwrap_or_else(|| name.clone());
                        let item = if name == "default" {
                            ImportedItem::Default
                        } else {
                            ImportedItem::Name(strip_quotes(&name).to_string())
                        };
                        out.push(binding(local, item));
                    }
                }
                _ => {}
            }
        }
        out
    }

    fn references(&self, node: Node, source: &[u8], out: &mut Vec<RawReference>) {
        let (kind, target) = match node.kind() {
            "call_expression" => (ReferenceKind::Call, node.child_by_field_name("function")),
            "new_expression" => (ReferenceKind::New, node.child_by_field_name("constructor")),
            "throw_statement" => {
                let thrown = node.named_child(0);
                let target = match thrown {
                    Some(t) if t.kind() == "new_expression" => t.child_by_field_name("constructor"),
                    Some(t) if t.kind() == "call_expression" => t.child_by_field_name("function"),
                    other => other,
                };
                (ReferenceKind::Throw, target)
            }
            _ => return,
        };
        if let Some((qualifier, name)) = target.and_then(|t| callee(t, source)) {
            out.push(RawReference {
                kind,
                name,
                qualifier,
                location: Location::from_node(node),
            });
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
            "variable_declarator" => !is_field("name"),
            "assignment_expression" | "augmented_assignment_expression" | "for_in_statement" => {
                !is_field("left")
            }
            "call_expression" => !is_field("function"),
            "new_expression" => !is_field("constructor"),
            "arrow_function" => !is_field("parameter"),
            "function_declaration" | "generator_function_declaration" | "class_declaration"
            | "function_expression" | "class" | "formal_parameters" | "required_parameter"
            | "optional_parameter" | "catch_clause" | "import_specifier" | "export_specifier"
            | "namespace_import" | "import_clause" | "labeled_statement" | "break_statement"
            | "continue_statement" | "array_pattern" | "object_pattern" | "rest_pattern"
            | "assignment_pattern" | "pair_pattern" | "class_heritage" => false,
            _ => true,
        }
    }
}

/// The function node carrying parameters and body; declarators bound to a
/// function value delegate to that value.
fn function_node(node: Node) -> Node {
    if node.kind() == "variable_declarator" {
        if let Some(value) = node
            .child_by_field_name("value")
            .filter(|v| FUNCTION_VALUES.contains(&v.kind()))
        {
            return value;
        }
    }
    node
}

/// Statement that owns a declaration for comment lookup.
fn declaration_of(node: Node) -> Node {
    if node.kind() == "variable_declarator" {
        if let Some(parent) = node
            .parent()
            .filter(|p| matches!(p.kind(), "lexical_declaration" | "variable_declaration"))
        {
            return parent;
        }
    }
    node
}

fn export_wrapper(node: Node) -> Option<Node> {
    declaration_of(node)
        .parent()
        .filter(|p| p.kind() == "export_statement")
}

fn parameter_of(param: Node, source: &[u8]) -> Option<Parameter> {
    match param.kind() {
        "identifier" | "rest_pattern" | "object_pattern" | "array_pattern" => Some(Parameter {
            name: text(param, source).to_string(),
            type_annotation: None,
            default_value: None,
        }),
        "assignment_pattern" => Some(Parameter {
            name: field_text(param, "left", source).unwrap_or_default(),
            type_annotation: None,
            default_value: field_text(param, "right", source),
        }),
        "required_parameter" | "optional_parameter" => Some(Parameter {
            name: field_text(param, "pattern", source).unwrap_or_default(),
            type_annotation: field_text(param, "type", source)
                .map(|t| t.trim_start_matches(':').trim().to_string()),
            default_value: field_text(param, "value", source),
        }),
        _ => None,
    }
}

fn callee(target: Node, source: &[u8]) -> Option<(Option<String>, String)> {
    match target.kind() {
        "identifier" => Some((None, text(target, source).to_string())),
        "member_expression" => {
            let object = target.child_by_field_name("object")?;
            let property = target.child_by_field_name("property")?;
            Some((
                Some(text(object, source).to_string()),
                text(property, source).to_string(),
            ))
        }
        _ => None,
    }
}

fn push_type_refs(clause: Node, source: &[u8], relation: RelationType, out: &mut Vec<SupertypeRef>) {
    let mut cursor = clause.walk();
    for child in clause.named_children(&mut cursor) {
        push_type_ref(child, source, relation, out);
    }
}

fn push_type_ref(node: Node, source: &[u8], relation: RelationType, out: &mut Vec<SupertypeRef>) {
    if !matches!(
        node.kind(),
        "identifier"
            | "member_expression"
            | "type_identifier"
            | "nested_type_identifier"
            | "generic_type"
    ) {
        return;
    }
    let path = text(node, source);
    let path = path.split('<').next().unwrap_or(path).trim();
    let (qualifier, name) = split_member(path, ".");
    if !name.is_empty() {
        out.push(SupertypeRef {
            name,
            qualifier,
            relation,
            location: Location::from_node(node),
        });
    }
}

fn strip_quotes(s: &str) -> &str {
    s.trim_matches(|c| c == '"' || c == '\'' || c == '`')
}

/// Module spec for an import source. `./` and `../` prefixes make the import
/// relative; known source extensions are dropped.
pub(crate) fn module_spec(raw: &str) -> ModuleSpec {
    let mut rest = raw;
    let mut relative = None;
    if rest.starts_with("./") || rest.starts_with("../") || rest == "." || rest == ".." {
        let mut hops = 0;
        loop {
            if let Some(r) = rest.strip_prefix("./") {
                rest = r;
            } else if let Some(r) = rest.strip_prefix("../") {
                rest = r;
                hops += 1;
            } else if rest == ".." {
                rest = "";
                hops += 1;
            } else if rest == "." {
                rest = "";
            } else {
                break;
            }
        }
        relative = Some(hops);
    }
    for ext in SOURCE_EXTENSIONS {
        if let Some(stripped) = rest.strip_suffix(ext) {
            rest = stripped;
            break;
        }
    }
    ModuleSpec {
        segments: rest
            .split('/')
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        relative,
        raw: raw.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn normalize_source(src: &str) -> NormalizedFile {
        let adapter = JavaScriptAdapter::new();
        let parsed = adapter
            .parse("src/service.js", src.as_bytes().to_vec(), false)
            .unwrap();
        normalize(
            &parsed,
            adapter.normalizer(),
            NormalizeOptions {
                include_reads: true,
                tolerate_errors: false,
            },
        )
    }

    const SAMPLE: &str = r#"import Base, { helper as h, util } from './lib/base';
import * as path from 'path';

/** Max retries. */
export const MAX_RETRIES = 3;

export class Service extends Base {
  #secret = 1;

  static create() {
    return new Service();
  }

  async run(job) {
    if (!job || job.empty) {
      throw new Error('empty');
    }
    return h(job) ? this.process(job) : util.noop();
  }
}

export const format = (value) => {
  return path.join(value, 'x');
};

function internal() {}
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
                ("Service.#secret", SymbolKind::Variable),
                ("Service.create", SymbolKind::Method),
                ("Service.run", SymbolKind::Method),
                ("format", SymbolKind::Function),
                ("internal", SymbolKind::Function),
            ]
        );
    }

    #[test]
    fn test_symbol_attributes() {
        let file = normalize_source(SAMPLE);
        let find = |q: &str| file.symbols.iter().find(|s| s.qualified_name == q).unwrap();

        assert_eq!(find("MAX_RETRIES").docstring.as_deref(), Some("Max retries."));
        assert!(find("MAX_RETRIES").flags.is_exported);
        assert!(find("Service").flags.is_exported);
        assert!(find("format").flags.is_exported);
        assert!(!find("internal").flags.is_exported);
        assert_eq!(find("Service.#secret").access, AccessLevel::Private);
        assert!(find("Service.create").flags.is_static);

        let run = find("Service.run");
        assert!(run.flags.is_async);
        // if, ||, ternary
        assert_eq!(run.metrics.cyclomatic, 4);
        assert_eq!(run.metrics.cognitive, 3);

        let format = find("format");
        assert_eq!(format.metrics.cyclomatic, 1);
        assert_eq!(format.metrics.cognitive, 0);
        assert_eq!(format.signature.as_ref().unwrap().parameters[0].name, "value");
    }

    #[test]
    fn test_imports() {
        let file = normalize_source(SAMPLE);
        let bindings: Vec<(Option<&str>, &ImportedItem, Option<usize>)> = file
            .imports
            .iter()
            .map(|b| (b.local_name.as_deref(), &b.item, b.module.relative))
            .collect();
        assert_eq!(
            bindings,
            vec![
                (Some("Base"), &ImportedItem::Default, Some(0)),
                (Some("h"), &ImportedItem::Name("helper".into()), Some(0)),
                (Some("util"), &ImportedItem::Name("util".into()), Some(0)),
                (Some("path"), &ImportedItem::Module, None),
            ]
        );
        assert_eq!(file.imports[0].module.segments, vec!["lib", "base"]);
    }

    #[test]
    fn test_references() {
        let file = normalize_source(SAMPLE);
        let refs: Vec<(ReferenceKind, Option<&str>, &str)> = file
            .sites
            .iter()
            .filter(|s| s.reference.kind != ReferenceKind::Read)
            .map(|s| {
                (
                    s.reference.kind,
                    s.reference.qualifier.as_deref(),
                    s.reference.name.as_str(),
                )
            })
            .collect();
        assert!(refs.contains(&(ReferenceKind::New, None, "Service")));
        assert!(refs.contains(&(ReferenceKind::Throw, None, "Error")));
        assert!(refs.contains(&(ReferenceKind::Call, None, "h")));
        assert!(refs.contains(&(ReferenceKind::Call, Some("this"), "process")));
        assert!(refs.contains(&(ReferenceKind::Call, Some("path"), "join")));

        assert_eq!(file.supertypes.len(), 1);
        assert_eq!(file.supertypes[0].1.name, "Base");
        assert_eq!(file.supertypes[0].1.relation, RelationType::Extends);
    }

    #[test]
    fn test_module_spec() {
        let spec = module_spec("../../shared/util.js");
        assert_eq!(spec.relative, Some(2));
        assert_eq!(spec.segments, vec!["shared", "util"]);
        let spec = module_spec("lodash/fp");
        assert_eq!(spec.relative, None);
        assert_eq!(spec.segments, vec!["lodash", "fp"]);
        assert_eq!(module_spec(".").segments, Vec::<String>::new());
    }
}
