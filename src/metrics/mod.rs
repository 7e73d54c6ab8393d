//! Metric calculation.
//!
//! Complexity is computed by walking a symbol's subtree against a per-language
//! [`ControlFlowRules`] table. Nested symbols are boundaries: their bodies are
//! measured on their own and not counted again in the enclosing symbol.
//!
//! Cognitive complexity model (version [`COGNITIVE_MODEL_VERSION`]):
//!
//! | construct                                   | increment         | nests |
//! |---------------------------------------------|-------------------|-------|
//! | `if`, loop, `catch`/`except`, `?:`          | 1 + nesting depth | yes   |
//! | `switch`/`match` (once, not per case)       | 1 + nesting depth | yes   |
//! | `else`, `else if`, `elif`                   | 1                 | no    |
//! | run of identical boolean operators          | 1                 | no    |
//! | lambda / closure                            | 0                 | yes   |

pub mod maintainability;
pub mod project;

pub use maintainability::{MI_MODEL_VERSION, maintainability_index, technical_debt_ratio};
pub use project::derive_project_metrics;

use crate::types::Halstead;
use std::collections::{HashMap, HashSet};
use tree_sitter::Node;

/// Version of the cognitive weighting table above.
pub const COGNITIVE_MODEL_VERSION: u32 = 1;

/// Control-flow node kinds of one grammar.
#[derive(Debug)]
pub struct ControlFlowRules {
    /// `if`-like statements. An `if` in else position counts as else-if.
    pub branches: &'static [&'static str],
    /// Dedicated else-if clauses (Python `elif`).
    pub else_ifs: &'static [&'static str],
    pub elses: &'static [&'static str],
    pub loops: &'static [&'static str],
    /// Case arms; wildcard arms (`_`) are not decisions.
    pub cases: &'static [&'static str],
    pub switches: &'static [&'static str],
    pub handlers: &'static [&'static str],
    pub conditionals: &'static [&'static str],
    /// Binary node kinds that may carry a short-circuit operator.
    pub boolean_kinds: &'static [&'static str],
    pub boolean_operators: &'static [&'static str],
    pub lambdas: &'static [&'static str],
}

/// Complexity of one symbol body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Complexity {
    pub cyclomatic: u32,
    pub cognitive: u32,
    pub max_nesting: u32,
}

struct Accumulator<'a> {
    rules: &'a ControlFlowRules,
    source: &'a [u8],
    boundaries: &'a HashSet<usize>,
    decisions: u32,
    cognitive: u32,
    max_nesting: u32,
}

/// Measure the subtree under `node`, skipping nodes whose id is in `boundaries`.
pub fn measure(
    node: Node,
    source: &[u8],
    rules: &ControlFlowRules,
    boundaries: &HashSet<usize>,
) -> Complexity {
    let mut acc = Accumulator {
        rules,
        source,
        boundaries,
        decisions: 0,
        cognitive: 0,
        max_nesting: 0,
    };
    let mut cursor = node.walk();
    let mut stack: Vec<(Node, u32)> = node.children(&mut cursor).map(|child| (child, 0)).collect();
    while let Some((current, nesting)) = stack.pop() {
        let Some(child_nesting) = acc.visit(current, nesting) else {
            continue;
        };
        let mut cursor = current.walk();
        stack.extend(current.children(&mut cursor).map(|child| (child, child_nesting)));
    }
    Complexity {
        cyclomatic: 1 + acc.decisions,
        cognitive: acc.cognitive,
        max_nesting: acc.max_nesting,
    }
}

impl Accumulator<'_> {
    /// Score one node and return the nesting for its children, or `None` at
    /// a boundary.
    fn visit(&mut self, node: Node, nesting: u32) -> Option<u32> {
        if self.boundaries.contains(&node.id()) {
            return None;
        }
        let kind = node.kind();
        let rules = self.rules;
        let mut child_nesting = nesting;

        if rules.branches.contains(&kind) {
            self.decisions += 1;
            if self.in_else_position(node) {
                self.cognitive += 1;
            } else {
                self.cognitive += 1 + nesting;
                child_nesting = nesting + 1;
            }
        } else if rules.else_ifs.contains(&kind) {
            self.decisions += 1;
            self.cognitive += 1;
        } else if rules.elses.contains(&kind) {
            if !self.wraps_branch(node) {
                self.cognitive += 1;
            }
        } else if self.is_alternative(node) {
            // bare `else { }` block (Go)
            self.cognitive += 1;
        } else if rules.loops.contains(&kind)
            || rules.handlers.contains(&kind)
            || rules.conditionals.contains(&kind)
        {
            self.decisions += 1;
            self.cognitive += 1 + nesting;
            child_nesting = nesting + 1;
        } else if rules.switches.contains(&kind) {
            self.cognitive += 1 + nesting;
            child_nesting = nesting + 1;
        } else if rules.cases.contains(&kind) {
            if !self.is_wildcard_case(node) {
                self.decisions += 1;
            }
        } else if rules.lambdas.contains(&kind) {
            child_nesting = nesting + 1;
        } else if let Some(op) = self.boolean_operator(node) {
            self.decisions += 1;
            let continues_run = node
                .parent()
                .and_then(|p| self.boolean_operator(p))
                .is_some_and(|parent_op| parent_op == op);
            if !continues_run {
                self.cognitive += 1;
            }
        }

        self.max_nesting = self.max_nesting.max(child_nesting);
        Some(child_nesting)
    }

    fn boolean_operator(&self, node: Node) -> Option<&'static str> {
        if !self.rules.boolean_kinds.contains(&node.kind()) {
            return None;
        }
        let op = node.child_by_field_name("operator")?.kind();
        self.rules
            .boolean_operators
            .iter()
            .copied()
            .find(|candidate| *candidate == op)
    }

    /// `if` reached through an else clause or the `alternative` field.
    fn in_else_position(&self, node: Node) -> bool {
        match node.parent() {
            Some(parent) if self.rules.elses.contains(&parent.kind()) => true,
            _ => self.is_alternative(node),
        }
    }

    fn is_alternative(&self, node: Node) -> bool {
        node.parent().is_some_and(|parent| {
            self.rules.branches.contains(&parent.kind())
                && parent
                    .child_by_field_name("alternative")
                    .is_some_and(|alt| alt.id() == node.id())
        })
    }

    fn wraps_branch(&self, node: Node) -> bool {
        let mut cursor = node.walk();
        let wraps = node
            .named_children(&mut cursor)
            .any(|child| self.rules.branches.contains(&child.kind()));
        wraps
    }

    fn is_wildcard_case(&self, node: Node) -> bool {
        node.named_child(0)
            .and_then(|pattern| {
                self.source
                    .get(pattern.start_byte()..pattern.end_byte())
                    .map(|b| b.trim_ascii() == b"_")
            })
            .unwrap_or(false)
    }
}

/// Halstead measures over the leaves under `node`.
///
/// Anonymous leaves are operators, named leaves are operands. Comment leaves
/// are ignored.
pub fn halstead(node: Node, source: &[u8], comment_kinds: &[&str]) -> Halstead {
    let mut operators: HashMap<&str, u32> = HashMap::new();
    let mut operands: HashMap<&[u8], u32> = HashMap::new();

    let mut cursor = node.walk();
    let mut descending = true;
    loop {
        if descending {
            let current = cursor.node();
            if current.child_count() == 0 && !comment_kinds.contains(&current.kind()) {
                if current.is_named() {
                    let text = source
                        .get(current.start_byte()..current.end_byte())
                        .unwrap_or_default();
                    *operands.entry(text).or_default() += 1;
                } else {
                    *operators.entry(current.kind()).or_default() += 1;
                }
            }
            if cursor.goto_first_child() {
                continue;
            }
        }
        if cursor.goto_next_sibling() {
            descending = true;
            continue;
        }
        if !cursor.goto_parent() {
            break;
        }
        descending = false;
        if cursor.node().id() == node.id() {
            break;
        }
    }

    let n1 = operators.len() as u32;
    let n2 = operands.len() as u32;
    let total_operators: u32 = operators.values().sum();
    let total_operands: u32 = operands.values().sum();
    let vocabulary = n1 + n2;
    let length = total_operators + total_operands;

    let volume = if vocabulary > 0 {
        length as f64 * (vocabulary as f64).log2()
    } else {
        0.0
    };
    let difficulty = if n2 > 0 {
        (n1 as f64 / 2.0) * (total_operands as f64 / n2 as f64)
    } else {
        0.0
    };

    Halstead {
        distinct_operators: n1,
        distinct_operands: n2,
        total_operators,
        total_operands,
        volume,
        difficulty,
        effort: difficulty * volume,
    }
}
