//! TypeScript and TSX grammar adapters.

use super::GrammarAdapter;
use super::javascript::{ECMA_CONTROL, EcmaNormalizer};
use crate::normalize::{NodeRules, Normalizer};
use crate::types::{Language, SymbolKind};

pub static TYPESCRIPT_RULES: NodeRules = NodeRules {
    symbols: &[
        ("function_declaration", SymbolKind::Function),
        ("generator_function_declaration", SymbolKind::Function),
        ("function_signature", SymbolKind::Function),
        ("class_declaration", SymbolKind::Class),
        ("abstract_class_declaration", SymbolKind::Class),
        ("interface_declaration", SymbolKind::Interface),
        ("enum_declaration", SymbolKind::Enum),
        ("type_alias_declaration", SymbolKind::TypeAlias),
        ("method_definition", SymbolKind::Method),
        ("method_signature", SymbolKind::Method),
        ("abstract_method_signature", SymbolKind::Method),
        ("public_field_definition", SymbolKind::Variable),
        ("variable_declarator", SymbolKind::Variable),
    ],
    comments: &["comment"],
    imports: &["import_statement"],
    detached: &[],
    type_names: &["type_identifier"],
    builtin_types: &[
        "Array", "ReadonlyArray", "Promise", "Record", "Partial", "Required", "Readonly",
        "Pick", "Omit", "Exclude", "Extract", "NonNullable", "ReturnType", "Parameters",
        "Map", "Set", "WeakMap", "WeakSet", "Date", "RegExp", "Error", "Function", "Object",
        "Iterable", "Iterator", "AsyncIterable",
    ],
    control: ECMA_CONTROL,
};

/// TypeScript adapter; one instance per grammar flavour.
pub struct TypeScriptAdapter {
    grammar: tree_sitter::Language,
    extensions: &'static [&'static str],
    normalizer: EcmaNormalizer,
}

impl TypeScriptAdapter {
    /// Plain TypeScript (`.ts`, `.mts`, `.cts`).
    pub fn typescript() -> Self {
        Self {
            grammar: tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            extensions: &["ts", "mts", "cts"],
            normalizer: EcmaNormalizer::new(&TYPESCRIPT_RULES),
        }
    }

    /// TypeScript with JSX (`.tsx`).
    pub fn tsx() -> Self {
        Self {
            grammar: tree_sitter_typescript::LANGUAGE_TSX.into(),
            extensions: &["tsx"],
            normalizer: EcmaNormalizer::new(&TYPESCRIPT_RULES),
        }
    }
}

impl GrammarAdapter for TypeScriptAdapter {
    fn language(&self) -> Language {
        Language::TypeScript
    }

    fn grammar(&self) -> tree_sitter::Language {
        self.grammar.clone()
    }

    fn extensions(&self) -> &'static [&'static str] {
        self.extensions
    }

    fn normalizer(&self) -> &dyn Normalizer {
        &self.normalizer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::{NormalizeOptions, NormalizedFile, normalize};
    use crate::types::*;
    use pretty_assertions::assert_eq;

    fn normalize_with(adapter: &TypeScriptAdapter, path: &str, src: &str) -> NormalizedFile {
        let parsed = adapter.parse(path, src.as_bytes().to_vec(), false).unwrap();
        normalize(&parsed, adapter.normalizer(), NormalizeOptions::default())
    }

    const SAMPLE: &str = r#"import { Repo } from "./repo";

export interface Store extends Base<string> {
  lookup(key: string): Item;
}

export enum Mode { A, B }

export type Key = string;

export abstract class Cache implements Store {
  private items: Map<string, Item> = new Map();

  protected abstract evict(key: Key): void;

  public lookup(key: string): Item {
    return this.items.get(key);
  }
}

export function build(repo: Repo): Cache {
  return new LruCache(repo);
}
"#;

    #[test]
    fn test_extract_symbols() {
        let file = normalize_with(&TypeScriptAdapter::typescript(), "src/cache.ts", SAMPLE);
        let names: Vec<(&str, SymbolKind)> = file
            .symbols
            .iter()
            .map(|s| (s.qualified_name.as_str(), s.kind))
            .collect();
        assert_eq!(
            names,
            vec![
                ("", SymbolKind::Module),
                ("Store", SymbolKind::Interface),
                ("Store.lookup", SymbolKind::Method),
                ("Mode", SymbolKind::Enum),
                ("Key", SymbolKind::TypeAlias),
                ("Cache", SymbolKind::Class),
                ("Cache.items", SymbolKind::Variable),
                ("Cache.evict", SymbolKind::Method),
                ("Cache.lookup", SymbolKind::Method),
                ("build", SymbolKind::Function),
            ]
        );
        assert!(file.symbols.iter().all(|s| s.language == Language::TypeScript));
    }

    #[test]
    fn test_modifiers() {
        let file = normalize_with(&TypeScriptAdapter::typescript(), "src/cache.ts", SAMPLE);
        let find = |q: &str| file.symbols.iter().find(|s| s.qualified_name == q).unwrap();
        assert_eq!(find("Cache.items").access, AccessLevel::Private);
        let evict = find("Cache.evict");
        assert_eq!(evict.access, AccessLevel::Protected);
        assert!(evict.flags.is_abstract);
        assert!(find("Cache").flags.is_abstract);
        assert!(find("Cache").flags.is_exported);
        assert_eq!(find("Cache.lookup").access, AccessLevel::Public);

        let sig = find("build").signature.clone().unwrap();
        assert_eq!(sig.parameters[0].name, "repo");
        assert_eq!(sig.parameters[0].type_annotation.as_deref(), Some("Repo"));
        assert_eq!(sig.return_type.as_deref(), Some("Cache"));
    }

    #[test]
    fn test_heritage_and_type_sites() {
        let file = normalize_with(&TypeScriptAdapter::typescript(), "src/cache.ts", SAMPLE);
        let supertypes: Vec<(&str, RelationType)> = file
            .supertypes
            .iter()
            .map(|(_, s)| (s.name.as_str(), s.relation))
            .collect();
        assert_eq!(
            supertypes,
            vec![
                ("Base", RelationType::Extends),
                ("Store", RelationType::Implements),
            ]
        );

        let sites: Vec<(ReferenceKind, &str)> = file
            .sites
            .iter()
            .map(|s| (s.reference.kind, s.reference.name.as_str()))
            .collect();
        assert!(sites.contains(&(ReferenceKind::ParameterType, "Key")));
        assert!(sites.contains(&(ReferenceKind::ParameterType, "Repo")));
        assert!(sites.contains(&(ReferenceKind::ReturnType, "Item")));
        assert!(sites.contains(&(ReferenceKind::ReturnType, "Cache")));
        assert!(sites.contains(&(ReferenceKind::New, "LruCache")));
        assert!(!sites.contains(&(ReferenceKind::ReturnType, "void")));
        assert!(!sites.contains(&(ReferenceKind::ParameterType, "string")));
    }

    #[test]
    fn test_tsx_component() {
        let src = "export function View(props: Props) {\n  return <div>{props.title}</div>;\n}\n";
        let file = normalize_with(&TypeScriptAdapter::tsx(), "src/view.tsx", src);
        assert_eq!(file.symbols.len(), 2);
        assert_eq!(file.symbols[1].name, "View");
        assert!(file.symbols[1].flags.is_exported);
    }
}
