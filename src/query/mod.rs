//! Graph queries over one immutable snapshot.
//!
//! Every traversal keeps an explicit visited set, so cyclic call or import
//! structures are walked once. Results are ordered by insertion order of the
//! underlying graph and never depend on hash iteration order.

pub mod cycles;

pub use cycles::{Cycle, CycleScan, cycles_in, find_cycles};

use crate::error::{AnalysisError, AnalysisResult};
use crate::graph::SymbolGraph;
use crate::types::*;
use petgraph::Direction;
use petgraph::stable_graph::NodeIndex;
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};

/// Reverse traversal depth used when the caller gives none.
pub const DEFAULT_IMPACT_DEPTH: usize = 5;

// ============================================================================
// Views
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewNode {
    pub id: SymbolId,
    pub name: String,
    pub qualified_name: String,
    pub kind: SymbolKind,
    pub file_path: String,
    /// Distance from the root of a rooted view.
    pub depth: Option<usize>,
}

impl ViewNode {
    fn from_symbol(symbol: &Symbol, depth: Option<usize>) -> Self {
        Self {
            id: symbol.id.clone(),
            name: symbol.name.clone(),
            qualified_name: symbol.qualified_name.clone(),
            kind: symbol.kind,
            file_path: symbol.file_path.clone(),
            depth,
        }
    }
}

/// Parallel edges of one type merged into one, with their count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewEdge {
    pub source: SymbolId,
    pub target: SymbolId,
    pub kind: RelationType,
    pub count: u32,
    /// Highest confidence among the merged edges.
    pub confidence: f32,
}

/// A projection of the symbol graph returned by graph queries.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GraphView {
    pub root: Option<SymbolId>,
    pub nodes: Vec<ViewNode>,
    pub edges: Vec<ViewEdge>,
    /// Set when the depth bound cut off further edges.
    pub truncated: bool,
}

impl GraphView {
    pub fn node(&self, id: &SymbolId) -> Option<&ViewNode> {
        self.nodes.iter().find(|n| &n.id == id)
    }

    pub fn edge(&self, source: &SymbolId, target: &SymbolId) -> Option<&ViewEdge> {
        self.edges
            .iter()
            .find(|e| &e.source == source && &e.target == target)
    }
}

/// Merges parallel edges while keeping first-seen order.
#[derive(Default)]
struct EdgeMerger {
    edges: Vec<ViewEdge>,
    slots: HashMap<(SymbolId, SymbolId, RelationType), usize>,
}

impl EdgeMerger {
    fn add(&mut self, source: &SymbolId, target: &SymbolId, kind: RelationType, confidence: f32) {
        let key = (source.clone(), target.clone(), kind);
        match self.slots.get(&key) {
            Some(&slot) => {
                let edge = &mut self.edges[slot];
                edge.count += 1;
                edge.confidence = edge.confidence.max(confidence);
            }
            None => {
                self.slots.insert(key, self.edges.len());
                self.edges.push(ViewEdge {
                    source: source.clone(),
                    target: target.clone(),
                    kind,
                    count: 1,
                    confidence,
                });
            }
        }
    }

    fn finish(self) -> Vec<ViewEdge> {
        self.edges
    }
}

fn require(graph: &SymbolGraph, id: &SymbolId) -> AnalysisResult<NodeIndex> {
    graph
        .index_of(id)
        .ok_or_else(|| AnalysisError::UnknownSymbol(id.to_string()))
}

/// Edges of one node in a direction, in insertion order.
fn sorted_edges(
    graph: &SymbolGraph,
    idx: NodeIndex,
    direction: Direction,
) -> Vec<(NodeIndex, &Relationship)> {
    let mut edges: Vec<_> = graph
        .inner()
        .edges_directed(idx, direction)
        .map(|e| {
            let other = match direction {
                Direction::Outgoing => e.target(),
                Direction::Incoming => e.source(),
            };
            (e.id(), other, e.weight())
        })
        .collect();
    edges.sort_by_key(|(edge, _, _)| *edge);
    edges
        .into_iter()
        .map(|(_, other, rel)| (other, rel))
        .collect()
}

// ============================================================================
// Call and dependency graphs
// ============================================================================

/// Call graph reachable from `root` over CALLS edges.
///
/// `depth` bounds the BFS distance; `Some(0)` returns the root alone and
/// `None` follows every reachable call.
pub fn call_graph(
    graph: &SymbolGraph,
    root: &SymbolId,
    depth: Option<usize>,
) -> AnalysisResult<GraphView> {
    let start = require(graph, root)?;

    let mut view = GraphView {
        root: Some(root.clone()),
        ..GraphView::default()
    };
    let mut distance: HashMap<NodeIndex, usize> = HashMap::from([(start, 0)]);
    let mut queue = VecDeque::from([start]);
    let mut merger = EdgeMerger::default();
    view.nodes.push(ViewNode::from_symbol(graph.node(start), Some(0)));

    while let Some(current) = queue.pop_front() {
        let d = distance[&current];
        for (next, rel) in sorted_edges(graph, current, Direction::Outgoing) {
            if rel.kind != RelationType::Calls {
                continue;
            }
            if !distance.contains_key(&next) {
                if depth.is_some_and(|max| d >= max) {
                    view.truncated = true;
                    continue;
                }
                distance.insert(next, d + 1);
                view.nodes
                    .push(ViewNode::from_symbol(graph.node(next), Some(d + 1)));
                queue.push_back(next);
            }
            merger.add(&rel.source, &rel.target, rel.kind, rel.confidence);
        }
    }
    view.edges = merger.finish();
    Ok(view)
}

/// Every CALLS edge of the project, merged.
pub fn project_call_graph(graph: &SymbolGraph) -> GraphView {
    let mut merger = EdgeMerger::default();
    let mut involved: HashSet<&SymbolId> = HashSet::new();
    for rel in graph.relationships().filter(|r| r.kind == RelationType::Calls) {
        involved.insert(&rel.source);
        involved.insert(&rel.target);
        merger.add(&rel.source, &rel.target, rel.kind, rel.confidence);
    }
    GraphView {
        root: None,
        nodes: graph
            .symbols()
            .filter(|s| involved.contains(&s.id))
            .map(|s| ViewNode::from_symbol(s, None))
            .collect(),
        edges: merger.finish(),
        truncated: false,
    }
}

/// File-level dependency graph: module symbols as nodes, IMPORTS edges
/// lifted to the imported symbol's file and merged.
pub fn dependency_graph(graph: &SymbolGraph) -> GraphView {
    let nodes: Vec<ViewNode> = graph
        .files()
        .filter_map(|f| graph.symbol(&f.module_id))
        .map(|s| ViewNode::from_symbol(s, None))
        .collect();

    let mut merger = EdgeMerger::default();
    for rel in graph.relationships().filter(|r| r.kind == RelationType::Imports) {
        let Some(target) = graph
            .symbol(&rel.target)
            .and_then(|s| graph.file(&s.file_path))
        else {
            continue;
        };
        if target.module_id == rel.source {
            continue;
        }
        merger.add(&rel.source, &target.module_id, rel.kind, rel.confidence);
    }
    let mut edges = merger.finish();
    edges.sort_by(|a, b| {
        let path = |id: &SymbolId| graph.symbol(id).map(|s| s.file_path.clone());
        path(&a.source)
            .cmp(&path(&b.source))
            .then_with(|| path(&a.target).cmp(&path(&b.target)))
    });
    GraphView {
        root: None,
        nodes,
        edges,
        truncated: false,
    }
}

// ============================================================================
// Neighborhood
// ============================================================================

/// Symbols calling `id`, one hop, first call site order.
pub fn callers<'g>(graph: &'g SymbolGraph, id: &SymbolId) -> AnalysisResult<Vec<&'g Symbol>> {
    one_hop(graph, id, Direction::Incoming, RelationType::Calls)
}

/// Symbols called by `id`, one hop, first call site order.
pub fn callees<'g>(graph: &'g SymbolGraph, id: &SymbolId) -> AnalysisResult<Vec<&'g Symbol>> {
    one_hop(graph, id, Direction::Outgoing, RelationType::Calls)
}

fn one_hop<'g>(
    graph: &'g SymbolGraph,
    id: &SymbolId,
    direction: Direction,
    kind: RelationType,
) -> AnalysisResult<Vec<&'g Symbol>> {
    let idx = require(graph, id)?;
    let mut seen = HashSet::new();
    Ok(sorted_edges(graph, idx, direction)
        .into_iter()
        .filter(|(_, rel)| rel.kind == kind)
        .filter(|(other, _)| seen.insert(*other))
        .map(|(other, _)| graph.node(other))
        .collect())
}

/// Whether a neighbor sits at the source or target end of the edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeDirection {
    Outgoing,
    Incoming,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelatedSymbol {
    pub symbol: Symbol,
    pub relation: RelationType,
    pub direction: EdgeDirection,
    pub confidence: f32,
}

/// Immediate neighbors across all edge types, both directions, ordered by
/// confidence (highest first) and then by name.
pub fn related(
    graph: &SymbolGraph,
    id: &SymbolId,
    limit: usize,
) -> AnalysisResult<Vec<RelatedSymbol>> {
    let idx = require(graph, id)?;
    let mut best: HashMap<(NodeIndex, RelationType, EdgeDirection), f32> = HashMap::new();
    let mut order: Vec<(NodeIndex, RelationType, EdgeDirection)> = Vec::new();

    for (direction, edge_direction) in [
        (Direction::Outgoing, EdgeDirection::Outgoing),
        (Direction::Incoming, EdgeDirection::Incoming),
    ] {
        for (other, rel) in sorted_edges(graph, idx, direction) {
            if other == idx {
                continue;
            }
            let key = (other, rel.kind, edge_direction);
            match best.get_mut(&key) {
                Some(confidence) => *confidence = confidence.max(rel.confidence),
                None => {
                    best.insert(key, rel.confidence);
                    order.push(key);
                }
            }
        }
    }

    let mut related: Vec<RelatedSymbol> = order
        .into_iter()
        .map(|key| RelatedSymbol {
            symbol: graph.node(key.0).clone(),
            relation: key.1,
            direction: key.2,
            confidence: best[&key],
        })
        .collect();
    related.sort_by(|a, b| {
        b.confidence
            .total_cmp(&a.confidence)
            .then_with(|| a.symbol.name.cmp(&b.symbol.name))
            .then_with(|| a.symbol.id.cmp(&b.symbol.id))
    });
    related.truncate(limit);
    Ok(related)
}

/// One incoming reference to a symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolReference {
    pub source: SymbolId,
    pub source_name: String,
    pub kind: RelationType,
    pub location: Option<Location>,
    pub file_path: String,
    pub confidence: f32,
}

/// Incoming reference sites of `id`; structural edges are left out.
pub fn references(graph: &SymbolGraph, id: &SymbolId) -> AnalysisResult<Vec<SymbolReference>> {
    let idx = require(graph, id)?;
    Ok(sorted_edges(graph, idx, Direction::Incoming)
        .into_iter()
        .filter(|(_, rel)| !matches!(rel.kind, RelationType::Contains | RelationType::Exports))
        .map(|(other, rel)| SymbolReference {
            source: rel.source.clone(),
            source_name: graph.node(other).qualified_name.clone(),
            kind: rel.kind,
            location: rel.location.clone(),
            file_path: rel.file_path.clone(),
            confidence: rel.confidence,
        })
        .collect())
}

// ============================================================================
// Impact analysis
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpactedSymbol {
    pub id: SymbolId,
    pub qualified_name: String,
    pub kind: SymbolKind,
    pub file_path: String,
    pub distance: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpactReport {
    pub root: SymbolId,
    pub max_depth: usize,
    /// Dependents in BFS order.
    pub affected: Vec<ImpactedSymbol>,
    /// Files holding an affected symbol, sorted.
    pub files: Vec<String>,
}

/// Symbols that depend on `id`, directly or transitively, following
/// dependency edges backwards up to `max_depth` hops.
pub fn impact(
    graph: &SymbolGraph,
    id: &SymbolId,
    max_depth: Option<usize>,
) -> AnalysisResult<ImpactReport> {
    let start = require(graph, id)?;
    let max_depth = max_depth.unwrap_or(DEFAULT_IMPACT_DEPTH);

    let mut seen = HashSet::from([start]);
    let mut queue = VecDeque::from([(start, 0usize)]);
    let mut affected = Vec::new();
    while let Some((current, d)) = queue.pop_front() {
        if d >= max_depth {
            continue;
        }
        for (other, rel) in sorted_edges(graph, current, Direction::Incoming) {
            if !rel.kind.is_dependency() || !seen.insert(other) {
                continue;
            }
            let symbol = graph.node(other);
            affected.push(ImpactedSymbol {
                id: symbol.id.clone(),
                qualified_name: symbol.qualified_name.clone(),
                kind: symbol.kind,
                file_path: symbol.file_path.clone(),
                distance: d + 1,
            });
            queue.push_back((other, d + 1));
        }
    }

    let mut files: Vec<String> = affected.iter().map(|a| a.file_path.clone()).collect();
    files.sort();
    files.dedup();
    Ok(ImpactReport {
        root: id.clone(),
        max_depth,
        affected,
        files,
    })
}
