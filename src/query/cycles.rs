//! Circular dependency detection.
//!
//! Tarjan's SCC pass finds the strongly connected components in one linear
//! sweep. Each non-trivial component yields:
//!
//! 1. a representative cycle, the shortest path from its first node back to
//!    itself (BFS restricted to the component), always reported;
//! 2. further elementary cycles, each rooted at its smallest node, up to
//!    [`MAX_CYCLES_PER_COMPONENT`] per component.
//!
//! The elementary search runs on an edge budget of [`CYCLE_SEARCH_BUDGET`]
//! visits per component edge, so a scan performs at most
//! `(3 + CYCLE_SEARCH_BUDGET) * E` edge visits however many cycles exist.

use crate::graph::SymbolGraph;
use crate::types::*;
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};

/// Cap on cycles reported for one strongly connected component.
pub const MAX_CYCLES_PER_COMPONENT: usize = 10;

/// Edge visits granted to the elementary cycle search, per component edge.
pub const CYCLE_SEARCH_BUDGET: usize = 4;

/// One elementary cycle of a strongly connected component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cycle {
    pub edge_type: RelationType,
    /// Path order; the last node links back to the first.
    pub nodes: Vec<SymbolId>,
    pub names: Vec<String>,
    /// Files touched by the cycle, sorted.
    pub files: Vec<String>,
    /// Size of the whole component the cycle was taken from.
    pub component_size: usize,
}

/// Result of a cycle scan over plain indices.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleScan {
    /// Cycles grouped by component (components ordered by first node); the
    /// representative comes first in each group.
    pub cycles: Vec<Vec<usize>>,
    /// Size of the component each cycle belongs to, parallel to `cycles`.
    pub component_sizes: Vec<usize>,
    /// Number of non-trivial components.
    pub components: usize,
    /// Edge traversals performed over all passes.
    pub edge_visits: usize,
}

/// Find cycles in a graph given as an edge list over `0..node_count`.
/// Edges with an endpoint outside that range are ignored.
pub fn cycles_in(node_count: usize, edges: &[(usize, usize)]) -> CycleScan {
    let mut graph: DiGraph<(), ()> = DiGraph::with_capacity(node_count, edges.len());
    for _ in 0..node_count {
        graph.add_node(());
    }
    for &(a, b) in edges {
        if a < node_count && b < node_count {
            graph.add_edge(NodeIndex::new(a), NodeIndex::new(b), ());
        }
    }

    let mut scan = CycleScan {
        edge_visits: graph.edge_count(),
        ..CycleScan::default()
    };

    let mut components: Vec<Vec<NodeIndex>> = tarjan_scc(&graph)
        .into_iter()
        .filter(|c| c.len() > 1 || graph.contains_edge(c[0], c[0]))
        .collect();
    for component in &mut components {
        component.sort_unstable();
    }
    components.sort_unstable_by_key(|c| c[0]);

    scan.components = components.len();
    for component in components {
        let members: HashSet<NodeIndex> = component.iter().copied().collect();
        let representative = shortest_return(&graph, component[0], &members, &mut scan.edge_visits);

        let mut adjacency: HashMap<NodeIndex, Vec<NodeIndex>> = HashMap::new();
        let mut component_edges = 0;
        for &node in &component {
            let mut targets: Vec<NodeIndex> = Vec::new();
            for edge in graph.edges(node) {
                scan.edge_visits += 1;
                if members.contains(&edge.target()) {
                    targets.push(edge.target());
                }
            }
            targets.sort_unstable();
            targets.dedup();
            component_edges += targets.len();
            adjacency.insert(node, targets);
        }

        let mut found = vec![representative];
        let budget = CYCLE_SEARCH_BUDGET * component_edges;
        for cycle in elementary_cycles(&adjacency, &component, budget, &mut scan.edge_visits) {
            if found.len() == MAX_CYCLES_PER_COMPONENT {
                break;
            }
            if !found.contains(&cycle) {
                found.push(cycle);
            }
        }
        for cycle in found {
            scan.component_sizes.push(component.len());
            scan.cycles.push(cycle.into_iter().map(NodeIndex::index).collect());
        }
    }
    scan
}

/// Elementary cycles of one component, each rooted at its smallest node.
///
/// Backtracking search on an explicit stack: from every start node, extend a
/// simple path through larger nodes and record it whenever an edge returns
/// to the start. Stops after `MAX_CYCLES_PER_COMPONENT` cycles or `budget`
/// edge visits.
fn elementary_cycles(
    adjacency: &HashMap<NodeIndex, Vec<NodeIndex>>,
    component: &[NodeIndex],
    budget: usize,
    visits: &mut usize,
) -> Vec<Vec<NodeIndex>> {
    let mut cycles = Vec::new();
    let mut spent = 0;
    'starts: for &start in component {
        let mut path = vec![start];
        let mut cursors = vec![0usize];
        let mut on_path = HashSet::from([start]);
        while let Some(&node) = path.last() {
            let depth = path.len() - 1;
            let targets = adjacency.get(&node).map(Vec::as_slice).unwrap_or(&[]);
            let Some(&next) = targets.get(cursors[depth]) else {
                path.pop();
                cursors.pop();
                on_path.remove(&node);
                continue;
            };
            if spent == budget {
                break 'starts;
            }
            spent += 1;
            cursors[depth] += 1;
            if next == start {
                cycles.push(path.clone());
                if cycles.len() == MAX_CYCLES_PER_COMPONENT {
                    break 'starts;
                }
            } else if next > start && on_path.insert(next) {
                path.push(next);
                cursors.push(0);
            }
        }
    }
    *visits += spent;
    cycles
}

/// Shortest path from `start` back to itself inside one component.
fn shortest_return(
    graph: &DiGraph<(), ()>,
    start: NodeIndex,
    members: &HashSet<NodeIndex>,
    visits: &mut usize,
) -> Vec<NodeIndex> {
    let mut previous: HashMap<NodeIndex, NodeIndex> = HashMap::new();
    let mut queue = VecDeque::from([start]);
    let mut seen = HashSet::from([start]);

    while let Some(node) = queue.pop_front() {
        let mut targets: Vec<NodeIndex> = graph.edges(node).map(|e| e.target()).collect();
        targets.sort_unstable();
        for next in targets {
            *visits += 1;
            if next == start {
                let mut path = vec![node];
                let mut current = node;
                while let Some(&p) = previous.get(&current) {
                    path.push(p);
                    current = p;
                }
                path.reverse();
                return path;
            }
            if members.contains(&next) && seen.insert(next) {
                previous.insert(next, node);
                queue.push_back(next);
            }
        }
    }
    // Unreachable for a strongly connected component.
    vec![start]
}

/// Cycles over one edge type.
///
/// IMPORTS (the default) is evaluated between files: both endpoints are
/// lifted to their file's module symbol. Other types are evaluated between
/// symbols. Cycles of one component are adjacent in the result, its
/// shortest cycle first.
pub fn find_cycles(graph: &SymbolGraph, edge_type: Option<RelationType>) -> Vec<Cycle> {
    let edge_type = edge_type.unwrap_or(RelationType::Imports);
    let file_level = edge_type == RelationType::Imports;

    let lift = |id: &SymbolId| -> Option<SymbolId> {
        if !file_level {
            return Some(id.clone());
        }
        let symbol = graph.symbol(id)?;
        graph.file(&symbol.file_path).map(|f| f.module_id.clone())
    };

    let mut lifted: Vec<(SymbolId, SymbolId)> = Vec::new();
    for rel in graph.relationships().filter(|r| r.kind == edge_type) {
        let (Some(source), Some(target)) = (lift(&rel.source), lift(&rel.target)) else {
            continue;
        };
        if file_level && source == target {
            continue;
        }
        lifted.push((source, target));
    }

    // Index nodes in symbol order so results follow analysis order.
    let involved: HashSet<&SymbolId> = lifted.iter().flat_map(|(a, b)| [a, b]).collect();
    let ids: Vec<&SymbolId> = graph
        .symbols()
        .map(|s| &s.id)
        .filter(|id| involved.contains(id))
        .collect();
    let positions: HashMap<&SymbolId, usize> =
        ids.iter().enumerate().map(|(i, id)| (*id, i)).collect();
    let edges: Vec<(usize, usize)> = lifted
        .iter()
        .filter_map(|(a, b)| Some((*positions.get(a)?, *positions.get(b)?)))
        .collect();

    let scan = cycles_in(ids.len(), &edges);
    scan.cycles
        .into_iter()
        .zip(scan.component_sizes)
        .map(|(path, component_size)| {
            let nodes: Vec<SymbolId> = path.iter().map(|&i| ids[i].clone()).collect();
            let symbols: Vec<&Symbol> = nodes.iter().filter_map(|id| graph.symbol(id)).collect();
            let names = symbols
                .iter()
                .map(|s| {
                    if s.is_file_module() {
                        s.file_path.clone()
                    } else {
                        s.qualified_name.clone()
                    }
                })
                .collect();
            let mut files: Vec<String> = symbols.iter().map(|s| s.file_path.clone()).collect();
            files.sort();
            files.dedup();
            Cycle {
                edge_type,
                nodes,
                names,
                files,
                component_size,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acyclic_graph_has_no_cycles() {
        let scan = cycles_in(4, &[(0, 1), (1, 2), (0, 2), (2, 3)]);
        assert!(scan.cycles.is_empty());
        assert!(scan.edge_visits <= 8);
    }

    #[test]
    fn test_shortest_cycle_first_then_the_rest() {
        // 0 <-> 1, and 2 -> 3 -> 4 -> 2 with a chord 2 -> 4
        let scan = cycles_in(6, &[(0, 1), (1, 0), (2, 3), (3, 4), (4, 2), (2, 4), (4, 5)]);
        assert_eq!(scan.cycles, vec![vec![0, 1], vec![2, 4], vec![2, 3, 4]]);
        assert_eq!(scan.component_sizes, vec![2, 3, 3]);
        assert_eq!(scan.components, 2);
    }

    #[test]
    fn test_cycles_sharing_a_node_are_all_reported() {
        // a <-> b and b <-> c form one component with two cycles
        let scan = cycles_in(3, &[(0, 1), (1, 0), (1, 2), (2, 1)]);
        assert_eq!(scan.cycles, vec![vec![0, 1], vec![1, 2]]);
        assert_eq!(scan.components, 1);
    }

    #[test]
    fn test_cycles_per_component_are_capped() {
        let mut edges = Vec::new();
        for a in 0..5 {
            for b in 0..5 {
                if a != b {
                    edges.push((a, b));
                }
            }
        }
        let scan = cycles_in(5, &edges);
        assert_eq!(scan.cycles.len(), MAX_CYCLES_PER_COMPONENT);
        assert_eq!(scan.components, 1);
        assert!(scan.edge_visits <= (3 + CYCLE_SEARCH_BUDGET) * edges.len());
    }

    #[test]
    fn test_self_loop_is_a_cycle() {
        let scan = cycles_in(2, &[(1, 1), (0, 1)]);
        assert_eq!(scan.cycles, vec![vec![1]]);
    }

    #[test]
    fn test_out_of_range_edges_ignored() {
        let scan = cycles_in(1, &[(0, 3), (3, 0)]);
        assert!(scan.cycles.is_empty());
    }
}
