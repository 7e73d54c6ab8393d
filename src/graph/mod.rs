//! The symbol graph.
//!
//! One immutable snapshot per analysis run: symbols are nodes, relationships
//! are edges, and every edge endpoint is a node of the same snapshot.
//! Unresolved references are kept beside the graph and never become edges.
//!
//! Node and edge insertion order follows the analysis order (files sorted by
//! path, symbols in declaration order), so iteration is deterministic.

use crate::error::{AnalysisError, AnalysisResult};
use crate::types::*;
use petgraph::Direction;
use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::visit::{EdgeRef, IntoEdgeReferences};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Immutable symbol graph of one project run.
#[derive(Debug, Clone, Default)]
pub struct SymbolGraph {
    graph: StableDiGraph<Symbol, Relationship>,
    nodes: HashMap<SymbolId, NodeIndex>,
    files: BTreeMap<String, FileRecord>,
    unresolved: Vec<UnresolvedReference>,
}

/// Accumulates a graph. Edges whose endpoints are missing are dropped.
#[derive(Debug, Default)]
pub struct GraphBuilder {
    inner: SymbolGraph,
    dropped_edges: usize,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_file(&mut self, file: FileRecord) {
        self.inner.files.insert(file.path.clone(), file);
    }

    /// Add a symbol. A second symbol with the same id replaces the first.
    pub fn add_symbol(&mut self, symbol: Symbol) {
        match self.inner.nodes.get(&symbol.id) {
            Some(&idx) => self.inner.graph[idx] = symbol,
            None => {
                let id = symbol.id.clone();
                let idx = self.inner.graph.add_node(symbol);
                self.inner.nodes.insert(id, idx);
            }
        }
    }

    /// Add an edge if both endpoints exist. Returns whether it was added.
    pub fn add_relationship(&mut self, relationship: Relationship) -> bool {
        let (Some(&source), Some(&target)) = (
            self.inner.nodes.get(&relationship.source),
            self.inner.nodes.get(&relationship.target),
        ) else {
            self.dropped_edges += 1;
            return false;
        };
        self.inner.graph.add_edge(source, target, relationship);
        true
    }

    pub fn add_unresolved(&mut self, reference: UnresolvedReference) {
        self.inner.unresolved.push(reference);
    }

    /// Edges rejected for a missing endpoint so far.
    pub fn dropped_edges(&self) -> usize {
        self.dropped_edges
    }

    pub fn build(self) -> SymbolGraph {
        if self.dropped_edges > 0 {
            tracing::debug!(dropped = self.dropped_edges, "dropped dangling edges");
        }
        self.inner
    }
}

impl SymbolGraph {
    pub fn builder() -> GraphBuilder {
        GraphBuilder::new()
    }

    // ========================================================================
    // Lookups
    // ========================================================================

    pub fn symbol(&self, id: &SymbolId) -> Option<&Symbol> {
        self.nodes.get(id).map(|&idx| &self.graph[idx])
    }

    pub fn contains(&self, id: &SymbolId) -> bool {
        self.nodes.contains_key(id)
    }

    /// All symbols in insertion order.
    pub fn symbols(&self) -> impl Iterator<Item = &Symbol> {
        self.graph.node_indices().map(move |idx| &self.graph[idx])
    }

    /// All relationships in insertion order.
    pub fn relationships(&self) -> impl Iterator<Item = &Relationship> {
        self.graph.edge_indices().map(move |idx| &self.graph[idx])
    }

    pub fn symbol_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn relationship_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn file(&self, path: &str) -> Option<&FileRecord> {
        self.files.get(path)
    }

    /// File records sorted by path.
    pub fn files(&self) -> impl Iterator<Item = &FileRecord> {
        self.files.values()
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    pub fn unresolved(&self) -> &[UnresolvedReference] {
        &self.unresolved
    }

    /// Module symbol of a file.
    pub fn module_of(&self, path: &str) -> Option<&Symbol> {
        self.files.get(path).and_then(|f| self.symbol(&f.module_id))
    }

    /// Symbols owned by a file, declaration order.
    pub fn symbols_in(&self, path: &str) -> Vec<&Symbol> {
        self.files
            .get(path)
            .map(|f| f.symbols.iter().filter_map(|id| self.symbol(id)).collect())
            .unwrap_or_default()
    }

    // ========================================================================
    // Edges
    // ========================================================================

    pub(crate) fn index_of(&self, id: &SymbolId) -> Option<NodeIndex> {
        self.nodes.get(id).copied()
    }

    pub(crate) fn node(&self, idx: NodeIndex) -> &Symbol {
        &self.graph[idx]
    }

    pub(crate) fn inner(&self) -> &StableDiGraph<Symbol, Relationship> {
        &self.graph
    }

    /// Edges leaving `id`, optionally restricted to one type, in insertion order.
    pub fn outgoing(&self, id: &SymbolId, kind: Option<RelationType>) -> Vec<&Relationship> {
        self.edges_of(id, kind, Direction::Outgoing)
    }

    /// Edges arriving at `id`, optionally restricted to one type, in insertion order.
    pub fn incoming(&self, id: &SymbolId, kind: Option<RelationType>) -> Vec<&Relationship> {
        self.edges_of(id, kind, Direction::Incoming)
    }

    fn edges_of(
        &self,
        id: &SymbolId,
        kind: Option<RelationType>,
        direction: Direction,
    ) -> Vec<&Relationship> {
        let Some(idx) = self.index_of(id) else {
            return Vec::new();
        };
        let mut edges: Vec<_> = self
            .graph
            .edges_directed(idx, direction)
            .filter(|e| kind.is_none_or(|k| e.weight().kind == k))
            .map(|e| (e.id(), e.weight()))
            .collect();
        edges.sort_by_key(|(edge, _)| *edge);
        edges.into_iter().map(|(_, rel)| rel).collect()
    }

    /// Number of incoming edges of the given types.
    pub fn in_degree(&self, id: &SymbolId, kinds: &[RelationType]) -> usize {
        self.index_of(id)
            .map(|idx| {
                self.graph
                    .edges_directed(idx, Direction::Incoming)
                    .filter(|e| kinds.contains(&e.weight().kind))
                    .count()
            })
            .unwrap_or(0)
    }

    // ========================================================================
    // Derived snapshots
    // ========================================================================

    /// Copy of the graph without one file: its record, its symbols, every
    /// edge touching them and its unresolved references are removed.
    /// Imports of other files that pointed into it are dropped as well.
    pub fn without_file(&self, path: &str) -> SymbolGraph {
        let mut next = self.clone();
        let Some(record) = next.files.remove(path) else {
            return next;
        };
        let removed: HashSet<&SymbolId> = record.symbols.iter().collect();
        for id in &record.symbols {
            if let Some(idx) = next.nodes.remove(id) {
                next.graph.remove_node(idx);
            }
        }
        next.unresolved.retain(|u| u.file_path != path);
        for file in next.files.values_mut() {
            file.imports.retain(|id| !removed.contains(id));
            file.exports.retain(|id| !removed.contains(id));
        }
        next
    }

    /// Check the structural invariants of a snapshot.
    ///
    /// - every edge has both endpoints in the graph
    /// - CONTAINS edges form a forest rooted at the file module symbols
    /// - confidences lie in [0, 1] and maintainability in [0, 100]
    pub fn validate(&self) -> AnalysisResult<()> {
        let broken = |msg: String| Err(AnalysisError::Internal(msg));

        for edge in self.graph.edge_references() {
            let rel = edge.weight();
            if !self.contains(&rel.source) || !self.contains(&rel.target) {
                return broken(format!("dangling {} edge {} -> {}", rel.kind, rel.source, rel.target));
            }
            if !(0.0..=1.0).contains(&rel.confidence) {
                return broken(format!("confidence {} out of range", rel.confidence));
            }
        }

        let mut roots = HashSet::new();
        for record in self.files.values() {
            match self.symbol(&record.module_id) {
                Some(root) if root.kind == SymbolKind::Module => {
                    roots.insert(record.module_id.clone());
                }
                _ => return broken(format!("file {} has no module symbol", record.path)),
            }
        }

        for idx in self.graph.node_indices() {
            let symbol = &self.graph[idx];
            let parents = self
                .graph
                .edges_directed(idx, Direction::Incoming)
                .filter(|e| e.weight().kind == RelationType::Contains)
                .count();
            let expected = usize::from(!roots.contains(&symbol.id));
            if parents != expected {
                return broken(format!(
                    "{} `{}` has {parents} containing parents",
                    symbol.kind, symbol.qualified_name
                ));
            }
            let mi = symbol.metrics.maintainability_index;
            if !(0.0..=100.0).contains(&mi) {
                return broken(format!("maintainability {mi} out of range"));
            }
        }

        // A forest: following parents from any node reaches a file module.
        for idx in self.graph.node_indices() {
            let mut current = idx;
            let mut steps = 0;
            while !roots.contains(&self.graph[current].id) {
                let Some(parent) = self
                    .graph
                    .edges_directed(current, Direction::Incoming)
                    .find(|e| e.weight().kind == RelationType::Contains)
                    .map(|e| e.source())
                else {
                    return broken("containment chain without a module root".into());
                };
                current = parent;
                steps += 1;
                if steps > self.graph.node_count() {
                    return broken("containment cycle".into());
                }
            }
        }
        Ok(())
    }
}
