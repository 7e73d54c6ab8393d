//! Relationship extraction.
//!
//! Phase 1 happens in the normalizer: every file yields its symbols, import
//! bindings, declared supertypes and raw reference sites without looking at
//! any other file. [`resolve`] is phase 2, a pure function over the union of
//! those tables. It never fails: references it cannot bind become
//! [`UnresolvedReference`] records instead of edges.
//!
//! Unqualified names are looked up in this order:
//! 1. the lexical scope chain (class bodies only when the reference sits
//!    directly in them)
//! 2. import bindings, most recent first
//! 3. glob imports, most recent first
//! 4. other files of the same Go package
//!
//! Confidence: 1.0 lexical, imported or explicitly qualified; 0.9 member of
//! the enclosing class through `self`/`this`; 0.7 member found on a resolved
//! supertype; `0.5 / k` for a receiver-unknown call matching `k` methods.

pub mod modules;

use crate::normalize::{ImportBinding, ImportedItem, NormalizedFile};
use crate::types::*;
use modules::{ModuleIndex, directory_of};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

pub const CONFIDENCE_EXACT: f32 = 1.0;
pub const CONFIDENCE_SELF_MEMBER: f32 = 0.9;
pub const CONFIDENCE_INHERITED: f32 = 0.7;
pub const CONFIDENCE_NAME_ONLY: f32 = 0.5;

const SELF_NAMES: &[&str] = &["self", "this", "Self", "cls"];

/// (file index, symbol index)
type Loc = (usize, usize);

/// Counters reported after resolution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionStats {
    pub sites: usize,
    pub resolved: usize,
    pub unresolved: usize,
    /// Name-only matches with more than one candidate.
    pub ambiguous: usize,
}

/// Phase-2 output, indexed like the input files.
#[derive(Debug, Default)]
pub struct Resolution {
    pub relationships: Vec<Relationship>,
    pub unresolved: Vec<UnresolvedReference>,
    /// Resolved import targets per file.
    pub imports: Vec<Vec<SymbolId>>,
    pub stats: ResolutionStats,
}

/// What a name or import binding stands for.
#[derive(Debug, Clone, PartialEq)]
enum Target {
    Symbol(Loc),
    /// A module: one file, or several for a Go package.
    Files(Vec<usize>),
    /// Bound to something outside the analyzed files.
    External,
}

/// CONTAINS edges of one file, parent to child.
pub fn contains_edges(file: &NormalizedFile) -> impl Iterator<Item = Relationship> + '_ {
    file.parents
        .iter()
        .enumerate()
        .filter_map(move |(i, parent)| {
            let parent = (*parent)?;
            Some(Relationship {
                kind: RelationType::Contains,
                source: file.symbols[parent].id.clone(),
                target: file.symbols[i].id.clone(),
                confidence: CONFIDENCE_EXACT,
                location: None,
                file_path: file.path.clone(),
            })
        })
}

/// Resolve every phase-1 table into relationships.
///
/// Deterministic for a given file order; callers sort files by path.
pub fn resolve(files: &[Arc<NormalizedFile>]) -> Resolution {
    let mut resolver = Resolver::new(files);
    let mut out = Resolution {
        imports: vec![Vec::new(); files.len()],
        ..Resolution::default()
    };

    for file in files {
        out.relationships.extend(contains_edges(file));
    }
    resolver.emit_imports(&mut out);
    resolver.resolve_supertypes(&mut out);
    resolver.emit_overrides(&mut out);
    resolver.resolve_sites(&mut out);
    resolver.emit_exports(&mut out);
    out
}

struct Resolver<'a> {
    files: &'a [Arc<NormalizedFile>],
    index: ModuleIndex,
    /// Child indices per file, per symbol.
    children: Vec<Vec<Vec<usize>>>,
    /// Resolved target per file, per import binding.
    bindings: Vec<Vec<Target>>,
    /// Methods of a type declared in another file, keyed by (directory,
    /// owner type name).
    detached: HashMap<(&'a str, &'a str), Vec<Loc>>,
    methods_by_name: HashMap<&'a str, Vec<Loc>>,
    /// Resolved direct supertypes per type.
    supers: HashMap<Loc, Vec<Loc>>,
}

impl<'a> Resolver<'a> {
    fn new(files: &'a [Arc<NormalizedFile>]) -> Self {
        let index = ModuleIndex::build(files.iter().map(|f| (f.path.as_str(), f.language)));

        let mut children = Vec::with_capacity(files.len());
        let mut detached: HashMap<(&str, &str), Vec<Loc>> = HashMap::new();
        let mut methods_by_name: HashMap<&str, Vec<Loc>> = HashMap::new();
        for (fi, file) in files.iter().enumerate() {
            let mut kids = vec![Vec::new(); file.symbols.len()];
            for (si, parent) in file.parents.iter().enumerate() {
                if let Some(p) = parent {
                    kids[*p].push(si);
                }
            }
            children.push(kids);

            for (si, symbol) in file.symbols.iter().enumerate() {
                if symbol.kind != SymbolKind::Method {
                    continue;
                }
                methods_by_name.entry(&symbol.name).or_default().push((fi, si));
                if file.parents[si] == Some(0) {
                    if let Some((owner, _)) = symbol.qualified_name.rsplit_once('.') {
                        detached
                            .entry((directory_of(&file.path), owner))
                            .or_default()
                            .push((fi, si));
                    }
                }
            }
        }

        let mut resolver = Self {
            files,
            index,
            children,
            bindings: Vec::new(),
            detached,
            methods_by_name,
            supers: HashMap::new(),
        };
        resolver.bindings = files
            .iter()
            .enumerate()
            .map(|(fi, file)| {
                file.imports
                    .iter()
                    .map(|binding| resolver.resolve_binding(fi, binding))
                    .collect()
            })
            .collect();
        resolver
    }

    fn symbol(&self, loc: Loc) -> &'a Symbol {
        &self.files[loc.0].symbols[loc.1]
    }

    /// Method whose type lives in another file; not visible as a plain name.
    fn is_detached_method(&self, loc: Loc) -> bool {
        self.symbol(loc).kind == SymbolKind::Method && self.files[loc.0].parents[loc.1] == Some(0)
    }

    fn child_named(&self, loc: Loc, name: &str) -> Option<Loc> {
        self.children[loc.0][loc.1]
            .iter()
            .map(|&c| (loc.0, c))
            .find(|&c| self.symbol(c).name == name && !self.is_detached_method(c))
    }

    fn top_level(&self, file: usize, name: &str) -> Option<Loc> {
        self.child_named((file, 0), name)
    }

    fn top_level_in(&self, files: &[usize], name: &str) -> Option<Loc> {
        files.iter().find_map(|&f| self.top_level(f, name))
    }

    fn detached_methods(&self, ty: Loc) -> &[Loc] {
        let key = (
            directory_of(&self.files[ty.0].path),
            self.symbol(ty).qualified_name.as_str(),
        );
        self.detached.get(&key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Member declared on the type itself, in its body or detached.
    fn member(&self, ty: Loc, name: &str) -> Option<Loc> {
        self.child_named(ty, name).or_else(|| {
            self.detached_methods(ty)
                .iter()
                .copied()
                .find(|&m| self.symbol(m).name == name)
        })
    }

    /// Member found on a supertype, nearest first.
    fn inherited_member(&self, ty: Loc, name: &str) -> Option<Loc> {
        let mut queue: VecDeque<Loc> = self.supers.get(&ty).into_iter().flatten().copied().collect();
        let mut seen: HashSet<Loc> = HashSet::from([ty]);
        while let Some(current) = queue.pop_front() {
            if !seen.insert(current) {
                continue;
            }
            if let Some(found) = self.member(current, name) {
                return Some(found);
            }
            queue.extend(self.supers.get(&current).into_iter().flatten().copied());
        }
        None
    }

    // ------------------------------------------------------------------
    // Imports
    // ------------------------------------------------------------------

    fn resolve_binding(&self, fi: usize, binding: &ImportBinding) -> Target {
        let file = &self.files[fi];
        let found = self
            .index
            .resolve(&file.path, &binding.module, file.language)
            .map(|fs| fs.iter().copied().filter(|&f| f != fi).collect::<Vec<_>>())
            .filter(|fs| !fs.is_empty());

        let target = match &binding.item {
            ImportedItem::Module | ImportedItem::Glob => found.map(Target::Files),
            ImportedItem::Name(name) => {
                if let Some(loc) = found.as_deref().and_then(|fs| self.top_level_in(fs, name)) {
                    return Target::Symbol(loc);
                }
                let mut submodule = binding.module.clone();
                submodule.segments.push(name.clone());
                self.index
                    .resolve(&file.path, &submodule, file.language)
                    .map(|fs| Target::Files(fs.to_vec()))
                    .or(found.map(Target::Files))
            }
            ImportedItem::Default => found.map(|fs| {
                let local = binding.local_name.as_deref().unwrap_or_default();
                fs.iter()
                    .find_map(|&f| {
                        self.top_level(f, local)
                            .filter(|&loc| self.symbol(loc).flags.is_exported)
                    })
                    .map(Target::Symbol)
                    .unwrap_or(Target::Files(fs))
            }),
        };
        target.unwrap_or(Target::External)
    }

    fn emit_imports(&self, out: &mut Resolution) {
        for (fi, file) in self.files.iter().enumerate() {
            let module = &file.module().id;
            let mut seen = HashSet::new();
            for (binding, target) in file.imports.iter().zip(&self.bindings[fi]) {
                let targets: Vec<Loc> = match target {
                    Target::Symbol(loc) => vec![*loc],
                    Target::Files(fs) => fs.iter().map(|&f| (f, 0)).collect(),
                    Target::External => {
                        let name = match &binding.item {
                            ImportedItem::Name(name) => name.clone(),
                            _ => binding
                                .local_name
                                .clone()
                                .unwrap_or_else(|| binding.module.raw.clone()),
                        };
                        out.unresolved.push(UnresolvedReference {
                            source: module.clone(),
                            name,
                            qualifier: Some(binding.module.raw.clone()),
                            kind: ReferenceKind::Import,
                            location: binding.location.clone(),
                            file_path: file.path.clone(),
                            confidence: 0.0,
                        });
                        continue;
                    }
                };
                for loc in targets {
                    let target = &self.symbol(loc).id;
                    out.relationships.push(Relationship {
                        kind: RelationType::Imports,
                        source: module.clone(),
                        target: target.clone(),
                        confidence: CONFIDENCE_EXACT,
                        location: Some(binding.location.clone()),
                        file_path: file.path.clone(),
                    });
                    if seen.insert(target.clone()) {
                        out.imports[fi].push(target.clone());
                    }
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Name lookup
    // ------------------------------------------------------------------

    fn lexical(&self, fi: usize, owner: usize, name: &str) -> Option<Loc> {
        let file = &self.files[fi];
        let mut scope = Some(owner);
        let mut guard = 0;
        while let Some(s) = scope {
            if s == owner || !file.symbols[s].kind.is_type_like() {
                if let Some(found) = self.child_named((fi, s), name) {
                    return Some(found);
                }
            }
            scope = file.parents[s];
            guard += 1;
            if guard > file.symbols.len() {
                break;
            }
        }
        None
    }

    fn lookup(&self, fi: usize, owner: usize, name: &str) -> Option<Target> {
        if let Some(loc) = self.lexical(fi, owner, name) {
            return Some(Target::Symbol(loc));
        }
        let file = &self.files[fi];
        let bindings = file.imports.iter().zip(&self.bindings[fi]).rev();

        for (binding, target) in bindings.clone() {
            if binding.item != ImportedItem::Glob && binding.local_name.as_deref() == Some(name) {
                return Some(target.clone());
            }
        }
        for (binding, target) in bindings {
            if let (ImportedItem::Glob, Target::Files(fs)) = (&binding.item, target) {
                if let Some(loc) = self.top_level_in(fs, name) {
                    return Some(Target::Symbol(loc));
                }
            }
        }
        if file.language == Language::Go {
            let package: Vec<usize> = self
                .index
                .package_of(fi)
                .iter()
                .copied()
                .filter(|&f| f != fi)
                .collect();
            if let Some(loc) = self.top_level_in(&package, name) {
                return Some(Target::Symbol(loc));
            }
        }
        None
    }

    /// Nearest enclosing type of a symbol, following detached methods to
    /// their owner.
    fn enclosing_type(&self, fi: usize, owner: usize) -> Option<Loc> {
        let file = &self.files[fi];
        let mut scope = Some(owner);
        let mut guard = 0;
        while let Some(s) = scope {
            if file.symbols[s].kind.is_type_like() {
                return Some((fi, s));
            }
            if self.is_detached_method((fi, s)) {
                let (owner_name, _) = file.symbols[s].qualified_name.rsplit_once('.')?;
                return self
                    .index
                    .package_of(fi)
                    .iter()
                    .chain(std::iter::once(&fi))
                    .find_map(|&f| self.files[f].type_named(owner_name).map(|t| (f, t)));
            }
            scope = file.parents[s];
            guard += 1;
            if guard > file.symbols.len() {
                break;
            }
        }
        None
    }

    /// Walk `path` from a resolved target through module members and type
    /// members.
    fn navigate(&self, start: Target, path: &[&str]) -> Option<Loc> {
        let mut current = start;
        for segment in path {
            current = match current {
                Target::Symbol(loc) => {
                    let symbol = self.symbol(loc);
                    let next = if symbol.kind == SymbolKind::Module {
                        self.child_named(loc, segment)
                    } else if symbol.kind.is_type_like() {
                        self.member(loc, segment)
                            .or_else(|| self.inherited_member(loc, segment))
                    } else {
                        None
                    };
                    Target::Symbol(next?)
                }
                Target::Files(fs) => Target::Symbol(self.top_level_in(&fs, segment)?),
                Target::External => return None,
            };
        }
        match current {
            Target::Symbol(loc) => Some(loc),
            Target::Files(fs) => fs.first().map(|&f| (f, 0)),
            Target::External => None,
        }
    }

    /// Resolve a name with an optional qualifier from a site inside `owner`.
    /// Returns the target, its confidence and the candidate count for
    /// name-only matches.
    fn resolve_reference(
        &self,
        fi: usize,
        owner: usize,
        qualifier: Option<&str>,
        name: &str,
        kind: ReferenceKind,
    ) -> Option<(Loc, f32, usize)> {
        let Some(qualifier) = qualifier else {
            return match self.lookup(fi, owner, name)? {
                Target::External => None,
                target => self.navigate(target, &[]).map(|loc| (loc, CONFIDENCE_EXACT, 1)),
            };
        };

        let segments: Vec<&str> = qualifier
            .split("::")
            .flat_map(|s| s.split('.'))
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();
        let language = self.files[fi].language;

        if let [single] = segments.as_slice() {
            if SELF_NAMES.contains(single) {
                if let Some(ty) = self.enclosing_type(fi, owner) {
                    if let Some(found) = self.member(ty, name) {
                        return Some((found, CONFIDENCE_SELF_MEMBER, 1));
                    }
                    if let Some(found) = self.inherited_member(ty, name) {
                        return Some((found, CONFIDENCE_INHERITED, 1));
                    }
                }
                return self.name_only(fi, name, kind);
            }
        }

        let Some((head, rest)) = segments.split_first() else {
            return self.name_only(fi, name, kind);
        };
        match self.lookup(fi, owner, head) {
            Some(Target::External) => None,
            Some(target) => {
                let mut path = rest.to_vec();
                path.push(name);
                match self.navigate(target, &path) {
                    Some(found) => Some((found, CONFIDENCE_EXACT, 1)),
                    None => self.name_only(fi, name, kind),
                }
            }
            None => {
                // Go receivers are plain identifiers naming the enclosing type.
                if language == Language::Go && rest.is_empty() {
                    if let Some(found) = self
                        .enclosing_type(fi, owner)
                        .and_then(|ty| self.member(ty, name))
                    {
                        return Some((found, CONFIDENCE_SELF_MEMBER, 1));
                    }
                }
                // Rust paths from the crate root.
                if qualifier.contains("::") {
                    let spec = crate::normalize::ModuleSpec {
                        segments: segments
                            .iter()
                            .filter(|s| !matches!(**s, "crate" | "self" | "super"))
                            .map(|s| s.to_string())
                            .collect(),
                        relative: None,
                        raw: qualifier.to_string(),
                    };
                    if let Some(found) = self
                        .index
                        .resolve(&self.files[fi].path, &spec, language)
                        .and_then(|fs| self.top_level_in(fs, name))
                    {
                        return Some((found, CONFIDENCE_EXACT, 1));
                    }
                }
                self.name_only(fi, name, kind)
            }
        }
    }

    /// Receiver-unknown calls: match by method name across the project.
    fn name_only(&self, fi: usize, name: &str, kind: ReferenceKind) -> Option<(Loc, f32, usize)> {
        if kind != ReferenceKind::Call {
            return None;
        }
        let candidates = self.methods_by_name.get(name)?;
        let k = candidates.len();
        let first = candidates
            .iter()
            .copied()
            .find(|loc| loc.0 == fi)
            .or_else(|| candidates.first().copied())?;
        Some((first, CONFIDENCE_NAME_ONLY / k as f32, k))
    }

    // ------------------------------------------------------------------
    // Edges
    // ------------------------------------------------------------------

    fn resolve_supertypes(&mut self, out: &mut Resolution) {
        let mut supers: HashMap<Loc, Vec<Loc>> = HashMap::new();
        for (fi, file) in self.files.iter().enumerate() {
            for (owner, supertype) in &file.supertypes {
                let kind = match supertype.relation {
                    RelationType::Implements => ReferenceKind::Implements,
                    _ => ReferenceKind::Extends,
                };
                let resolved = self
                    .resolve_reference(fi, *owner, supertype.qualifier.as_deref(), &supertype.name, kind)
                    .filter(|(loc, _, _)| self.symbol(*loc).kind.is_type_like() && *loc != (fi, *owner));
                out.stats.sites += 1;
                match resolved {
                    Some((loc, confidence, _)) => {
                        out.stats.resolved += 1;
                        supers.entry((fi, *owner)).or_default().push(loc);
                        out.relationships.push(Relationship {
                            kind: supertype.relation,
                            source: file.symbols[*owner].id.clone(),
                            target: self.symbol(loc).id.clone(),
                            confidence,
                            location: Some(supertype.location.clone()),
                            file_path: file.path.clone(),
                        });
                    }
                    None => {
                        out.stats.unresolved += 1;
                        out.unresolved.push(UnresolvedReference {
                            source: file.symbols[*owner].id.clone(),
                            name: supertype.name.clone(),
                            qualifier: supertype.qualifier.clone(),
                            kind,
                            location: supertype.location.clone(),
                            file_path: file.path.clone(),
                            confidence: 0.0,
                        });
                    }
                }
            }
        }
        self.supers = supers;
    }

    /// Methods of the type, in its body or detached.
    fn methods_of(&self, ty: Loc) -> Vec<Loc> {
        let mut methods: Vec<Loc> = self.children[ty.0][ty.1]
            .iter()
            .map(|&c| (ty.0, c))
            .filter(|&c| self.symbol(c).kind.is_callable())
            .collect();
        methods.extend_from_slice(self.detached_methods(ty));
        methods
    }

    fn emit_overrides(&self, out: &mut Resolution) {
        let mut types: Vec<Loc> = self.supers.keys().copied().collect();
        types.sort_unstable();
        for ty in types {
            for method in self.methods_of(ty) {
                let symbol = self.symbol(method);
                let Some(base) = self
                    .inherited_member(ty, &symbol.name)
                    .filter(|&b| self.symbol(b).kind.is_callable() && b != method)
                else {
                    continue;
                };
                out.relationships.push(Relationship {
                    kind: RelationType::Overrides,
                    source: symbol.id.clone(),
                    target: self.symbol(base).id.clone(),
                    confidence: CONFIDENCE_EXACT,
                    location: Some(symbol.location.clone()),
                    file_path: symbol.file_path.clone(),
                });
            }
        }
    }

    fn edge_kind(&self, kind: ReferenceKind, target: Loc) -> RelationType {
        let target_kind = self.symbol(target).kind;
        match kind {
            ReferenceKind::Call if target_kind.is_type_like() => RelationType::Instantiates,
            ReferenceKind::Call => RelationType::Calls,
            ReferenceKind::New => RelationType::Instantiates,
            ReferenceKind::Throw => RelationType::Throws,
            ReferenceKind::ParameterType => RelationType::Accepts,
            ReferenceKind::ReturnType => RelationType::Returns,
            ReferenceKind::Read if target_kind.is_value() => RelationType::Uses,
            ReferenceKind::Read | ReferenceKind::TypeMention => RelationType::References,
            ReferenceKind::Extends => RelationType::Extends,
            ReferenceKind::Implements => RelationType::Implements,
            ReferenceKind::Import => RelationType::Imports,
        }
    }

    fn resolve_sites(&self, out: &mut Resolution) {
        for (fi, file) in self.files.iter().enumerate() {
            for site in &file.sites {
                let reference = &site.reference;
                out.stats.sites += 1;
                let source = &file.symbols[site.owner].id;
                match self.resolve_reference(
                    fi,
                    site.owner,
                    reference.qualifier.as_deref(),
                    &reference.name,
                    reference.kind,
                ) {
                    Some((target, confidence, candidates)) => {
                        out.stats.resolved += 1;
                        if candidates > 1 {
                            out.stats.ambiguous += 1;
                        }
                        out.relationships.push(Relationship {
                            kind: self.edge_kind(reference.kind, target),
                            source: source.clone(),
                            target: self.symbol(target).id.clone(),
                            confidence,
                            location: Some(reference.location.clone()),
                            file_path: file.path.clone(),
                        });
                    }
                    None => {
                        out.stats.unresolved += 1;
                        out.unresolved.push(UnresolvedReference {
                            source: source.clone(),
                            name: reference.name.clone(),
                            qualifier: reference.qualifier.clone(),
                            kind: reference.kind,
                            location: reference.location.clone(),
                            file_path: file.path.clone(),
                            confidence: 0.0,
                        });
                    }
                }
            }
        }
    }

    fn emit_exports(&self, out: &mut Resolution) {
        for file in self.files {
            let module = &file.module().id;
            for symbol in file.exported() {
                out.relationships.push(Relationship {
                    kind: RelationType::Exports,
                    source: module.clone(),
                    target: symbol.id.clone(),
                    confidence: CONFIDENCE_EXACT,
                    location: None,
                    file_path: file.path.clone(),
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::{NormalizeOptions, normalize};
    use crate::parsing::AdapterRegistry;
    use pretty_assertions::assert_eq;

    fn normalize_all(sources: &[(&str, &str)]) -> Vec<Arc<NormalizedFile>> {
        let registry = AdapterRegistry::with_defaults();
        let mut files: Vec<Arc<NormalizedFile>> = sources
            .iter()
            .map(|(path, src)| {
                let adapter = registry.resolve(path, None).unwrap();
                let parsed = adapter.parse(path, src.as_bytes().to_vec(), false).unwrap();
                Arc::new(normalize(
                    &parsed,
                    adapter.normalizer(),
                    NormalizeOptions {
                        include_reads: true,
                        tolerate_errors: false,
                    },
                ))
            })
            .collect();
        files.sort_by(|a, b| a.path.cmp(&b.path));
        files
    }

    fn id_of(files: &[Arc<NormalizedFile>], path: &str, qualified: &str) -> SymbolId {
        files
            .iter()
            .find(|f| f.path == path)
            .and_then(|f| f.symbols.iter().find(|s| s.qualified_name == qualified))
            .map(|s| s.id.clone())
            .unwrap_or_else(|| panic!("no symbol {qualified} in {path}"))
    }

    fn edges(
        resolution: &Resolution,
        kind: RelationType,
        source: &SymbolId,
    ) -> Vec<(SymbolId, f32)> {
        resolution
            .relationships
            .iter()
            .filter(|r| r.kind == kind && &r.source == source)
            .map(|r| (r.target.clone(), r.confidence))
            .collect()
    }

    #[test]
    fn test_two_file_import_and_call() {
        let files = normalize_all(&[
            ("a.py", "from b import helper\n\ndef main():\n    helper()\n"),
            ("b.py", "def helper():\n    return 1\n"),
        ]);
        let resolution = resolve(&files);
        let main = id_of(&files, "a.py", "main");
        let helper = id_of(&files, "b.py", "helper");
        let module_a = id_of(&files, "a.py", "");

        assert_eq!(
            edges(&resolution, RelationType::Calls, &main),
            vec![(helper.clone(), 1.0)]
        );
        assert_eq!(
            edges(&resolution, RelationType::Imports, &module_a),
            vec![(helper.clone(), 1.0)]
        );
        assert_eq!(resolution.imports[0], vec![helper]);
        assert!(resolution.unresolved.is_empty());
    }

    #[test]
    fn test_member_confidence_levels() {
        let files = normalize_all(&[(
            "svc.py",
            "class Base:\n    def ping(self):\n        pass\n\n    def save(self):\n        pass\n\n\
             class Child(Base):\n    def save(self):\n        self.ping()\n        self.save()\n\n\
             class Other:\n    def save(self):\n        pass\n\n\
             def run(x):\n    x.save()\n",
        )]);
        let resolution = resolve(&files);
        let child_save = id_of(&files, "svc.py", "Child.save");
        let base_ping = id_of(&files, "svc.py", "Base.ping");
        let base_save = id_of(&files, "svc.py", "Base.save");

        assert_eq!(
            edges(&resolution, RelationType::Calls, &child_save),
            vec![(base_ping, CONFIDENCE_INHERITED), (child_save.clone(), CONFIDENCE_SELF_MEMBER)]
        );
        assert_eq!(
            edges(&resolution, RelationType::Overrides, &child_save),
            vec![(base_save.clone(), 1.0)]
        );

        // three methods named `save`; first candidate in file order
        let run = id_of(&files, "svc.py", "run");
        let calls = edges(&resolution, RelationType::Calls, &run);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, base_save);
        assert!((calls[0].1 - 0.5 / 3.0).abs() < 1e-6);
        assert_eq!(resolution.stats.ambiguous, 1);

        let child = id_of(&files, "svc.py", "Child");
        let base = id_of(&files, "svc.py", "Base");
        assert_eq!(edges(&resolution, RelationType::Extends, &child), vec![(base, 1.0)]);
    }

    #[test]
    fn test_unresolved_and_instantiation() {
        let files = normalize_all(&[(
            "app.py",
            "LIMIT = 3\n\nclass Job:\n    pass\n\ndef make():\n    missing()\n    return Job(LIMIT)\n",
        )]);
        let resolution = resolve(&files);
        let make = id_of(&files, "app.py", "make");
        let job = id_of(&files, "app.py", "Job");
        let limit = id_of(&files, "app.py", "LIMIT");

        assert_eq!(
            edges(&resolution, RelationType::Instantiates, &make),
            vec![(job, 1.0)]
        );
        assert_eq!(edges(&resolution, RelationType::Uses, &make), vec![(limit, 1.0)]);
        let missing: Vec<_> = resolution
            .unresolved
            .iter()
            .filter(|u| u.name == "missing")
            .collect();
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].source, make);
        assert_eq!(missing[0].confidence, 0.0);
        assert!(
            !resolution
                .relationships
                .iter()
                .any(|r| r.kind == RelationType::Calls && r.source == make)
        );
    }

    #[test]
    fn test_external_imports_are_unresolved_records() {
        let files = normalize_all(&[(
            "tool.py",
            "import os\n\ndef where():\n    return os.getcwd()\n",
        )]);
        let resolution = resolve(&files);
        assert!(
            resolution
                .unresolved
                .iter()
                .any(|u| u.kind == ReferenceKind::Import && u.qualifier.as_deref() == Some("os"))
        );
        assert!(
            resolution
                .unresolved
                .iter()
                .any(|u| u.kind == ReferenceKind::Call && u.name == "getcwd")
        );
    }

    #[test]
    fn test_javascript_relative_import_and_override() {
        let files = normalize_all(&[
            (
                "src/base.js",
                "export class Base {\n  render() {}\n}\n",
            ),
            (
                "src/views/page.js",
                "import { Base } from '../base';\n\nexport class Page extends Base {\n  render() {\n    return new Base();\n  }\n}\n",
            ),
        ]);
        let resolution = resolve(&files);
        let page = id_of(&files, "src/views/page.js", "Page");
        let base = id_of(&files, "src/base.js", "Base");
        let page_render = id_of(&files, "src/views/page.js", "Page.render");
        let base_render = id_of(&files, "src/base.js", "Base.render");

        assert_eq!(edges(&resolution, RelationType::Extends, &page), vec![(base.clone(), 1.0)]);
        assert_eq!(
            edges(&resolution, RelationType::Overrides, &page_render),
            vec![(base_render, 1.0)]
        );
        assert_eq!(
            edges(&resolution, RelationType::Instantiates, &page_render),
            vec![(base.clone(), 1.0)]
        );
        let module_base = id_of(&files, "src/base.js", "");
        assert_eq!(
            edges(&resolution, RelationType::Exports, &module_base),
            vec![(base, 1.0)]
        );
    }

    #[test]
    fn test_go_package_siblings_and_receivers() {
        let files = normalize_all(&[
            (
                "jobs/worker.go",
                "package jobs\n\ntype Worker struct{}\n\nfunc (w *Worker) Start() {\n\tw.Stop()\n\tlogf()\n}\n",
            ),
            (
                "jobs/stop.go",
                "package jobs\n\nfunc (w *Worker) Stop() {}\n\nfunc logf() {}\n",
            ),
        ]);
        let resolution = resolve(&files);
        let start = id_of(&files, "jobs/worker.go", "Worker.Start");
        let stop = id_of(&files, "jobs/stop.go", "Worker.Stop");
        let logf = id_of(&files, "jobs/stop.go", "logf");

        assert_eq!(
            edges(&resolution, RelationType::Calls, &start),
            vec![(stop, CONFIDENCE_SELF_MEMBER), (logf, 1.0)]
        );
    }

    #[test]
    fn test_rust_use_and_associated_call() {
        let files = normalize_all(&[
            (
                "src/store.rs",
                "pub struct Store;\n\nimpl Store {\n    pub fn open() -> Store {\n        Store\n    }\n}\n",
            ),
            (
                "src/main.rs",
                "use crate::store::Store;\n\nfn main() {\n    let s = Store::open();\n}\n",
            ),
        ]);
        let resolution = resolve(&files);
        let main = id_of(&files, "src/main.rs", "main");
        let open = id_of(&files, "src/store.rs", "Store.open");
        assert_eq!(
            edges(&resolution, RelationType::Calls, &main),
            vec![(open, 1.0)]
        );
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let sources = [
            ("a.py", "from b import f\n\ndef g():\n    f()\n    g()\n"),
            ("b.py", "from a import g\n\ndef f():\n    g()\n"),
        ];
        let first = resolve(&normalize_all(&sources));
        let second = resolve(&normalize_all(&sources));
        assert_eq!(first.relationships, second.relationships);
        assert_eq!(first.unresolved, second.unresolved);
    }

    #[test]
    fn test_contains_forest() {
        let files = normalize_all(&[(
            "m.py",
            "class A:\n    def f(self):\n        def inner():\n            pass\n",
        )]);
        let contains: Vec<_> = contains_edges(&files[0]).collect();
        assert_eq!(contains.len(), 3);
        assert!(contains.iter().all(|r| r.location.is_none()));
    }
}
