use std::{collections::HashSet, fmt};

use serde::Serialize;

use crate::{
    error::Error,
    graph::{Node, NodeId, TermGraph},
    term::Term,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    Shape,
    Cycle,
    Internal,
}

/// One broken invariant. `path` names the node from the root down, e.g.
/// `root.h.f` for the outer function of the step of a recursion.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "violation", rename_all = "snake_case")]
pub enum Violation {
    ProjectionIndex {
        path: String,
        n: usize,
        i: usize,
    },
    CompositionWidth {
        path: String,
        expected: usize,
        actual: usize,
    },
    CompositionInnerArity {
        path: String,
        index: usize,
        arity: usize,
        expected: usize,
    },
    RecursionStepArity {
        path: String,
        expected: usize,
        actual: usize,
    },
    CycleDetected {
        path: String,
        node: NodeId,
    },
    Internal {
        path: String,
        message: String,
    },
}

impl Violation {
    pub fn kind(&self) -> ViolationKind {
        match self {
            Violation::CycleDetected { .. } => ViolationKind::Cycle,
            Violation::Internal { .. } => ViolationKind::Internal,
            _ => ViolationKind::Shape,
        }
    }

    pub fn path(&self) -> &str {
        match self {
            Violation::ProjectionIndex { path, .. }
            | Violation::CompositionWidth { path, .. }
            | Violation::CompositionInnerArity { path, .. }
            | Violation::RecursionStepArity { path, .. }
            | Violation::CycleDetected { path, .. }
            | Violation::Internal { path, .. } => path,
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::ProjectionIndex { path, n, i } => {
                write!(f, "{path}: projection index must be between 1 and {n}, got {i}")
            }
            Violation::CompositionWidth {
                path,
                expected,
                actual,
            } => write!(
                f,
                "{path}: composition arity mismatch, f requires {expected} functions, got {actual}"
            ),
            Violation::CompositionInnerArity {
                path,
                index,
                arity,
                expected,
            } => write!(
                f,
                "{path}: all g functions must have the same arity, g[{index}] has arity {arity}, expected {expected}"
            ),
            Violation::RecursionStepArity {
                path,
                expected,
                actual,
            } => write!(f, "{path}: h must have arity {expected}, got {actual}"),
            Violation::CycleDetected { path, node } => {
                write!(f, "{path}: circular dependency detected at node {node}")
            }
            Violation::Internal { path, message } => write!(f, "{path}: validation error: {message}"),
        }
    }
}

/// Why an argument vector cannot be fed to a term.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArgumentViolation {
    Count { expected: usize, actual: usize },
    Negative { index: usize, value: i64 },
}

impl fmt::Display for ArgumentViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgumentViolation::Count { expected, actual } => write!(
                f,
                "argument count mismatch: function requires {expected} arguments, got {actual}"
            ),
            ArgumentViolation::Negative { index, value } => write!(
                f,
                "argument {index} is {value}, negative arguments are not supported"
            ),
        }
    }
}

impl From<ArgumentViolation> for Error {
    fn from(violation: ArgumentViolation) -> Self {
        match violation {
            ArgumentViolation::Count { expected, actual } => {
                Error::ArityMismatch { expected, actual }
            }
            ArgumentViolation::Negative { index, value } => Error::NegativeArgument { index, value },
        }
    }
}

pub fn validate(term: &Term) -> Vec<Violation> {
    validate_graph(&TermGraph::from_term(term))
}

pub fn is_valid(term: &Term) -> bool {
    validate(term).is_empty()
}

pub fn is_graph_valid(graph: &TermGraph) -> bool {
    validate_graph(graph).is_empty()
}

/// Walks everything reachable from the root and reports every violation.
///
/// A node is on the current path between entering and leaving it. Meeting a
/// node that is already on the path is a cycle: it is reported and that edge
/// is not followed. Meeting it again after it was left is plain sharing, and
/// the node is not checked or descended into a second time.
pub fn validate_graph(graph: &TermGraph) -> Vec<Violation> {
    enum Visit {
        Enter(NodeId, String),
        Exit(NodeId),
    }

    let mut violations = vec![];
    let mut on_path = HashSet::new();
    let mut finished = HashSet::new();
    let mut pending = vec![Visit::Enter(graph.root(), "root".to_string())];
    let mut visited = 0usize;

    while let Some(visit) = pending.pop() {
        let (id, path) = match visit {
            Visit::Exit(id) => {
                on_path.remove(&id);
                finished.insert(id);
                continue;
            }
            Visit::Enter(id, path) => (id, path),
        };
        let Some(node) = graph.node(id) else {
            violations.push(Violation::Internal {
                path,
                message: format!("node {id} does not exist"),
            });
            continue;
        };
        if on_path.contains(&id) {
            violations.push(Violation::CycleDetected { path, node: id });
            continue;
        }
        if finished.contains(&id) {
            continue;
        }
        visited += 1;

        check_node(graph, node, &path, &mut violations);

        on_path.insert(id);
        pending.push(Visit::Exit(id));
        pending.extend(
            node.labelled_children()
                .into_iter()
                .rev()
                .map(|(label, child)| Visit::Enter(child, format!("{path}.{label}"))),
        );
    }

    log::debug!(
        "validated {} node visits, {} violation(s)",
        visited,
        violations.len()
    );
    violations
}

/// Checks one node against its own contract. Arities that cannot be worked
/// out (looping or dangling chains) are skipped here and reported on
/// descent instead.
fn check_node(graph: &TermGraph, node: &Node, path: &str, violations: &mut Vec<Violation>) {
    match node {
        Node::Projection { n, i } if *i < 1 || *i > *n => {
            violations.push(Violation::ProjectionIndex {
                path: path.to_string(),
                n: *n,
                i: *i,
            });
        }
        Node::Composition { outer, inner } => {
            if let Some(expected) = graph.arity(*outer) {
                if inner.len() != expected {
                    violations.push(Violation::CompositionWidth {
                        path: path.to_string(),
                        expected,
                        actual: inner.len(),
                    });
                }
            }
            let arities: Vec<Option<usize>> = inner.iter().map(|g| graph.arity(*g)).collect();
            if let Some(Some(expected)) = arities.first().copied() {
                for (index, arity) in arities.into_iter().enumerate() {
                    match arity {
                        Some(arity) if arity != expected => {
                            violations.push(Violation::CompositionInnerArity {
                                path: path.to_string(),
                                index,
                                arity,
                                expected,
                            })
                        }
                        _ => {}
                    }
                }
            }
        }
        Node::PrimitiveRecursion { base, step } => {
            if let (Some(base), Some(actual)) = (graph.arity(*base), graph.arity(*step)) {
                if actual != base + 2 {
                    violations.push(Violation::RecursionStepArity {
                        path: path.to_string(),
                        expected: base + 2,
                        actual,
                    });
                }
            }
        }
        _ => {}
    }
}

/// `None` when `args` can be evaluated by `term`.
pub fn validate_arguments(term: &Term, args: &[i64]) -> Option<ArgumentViolation> {
    if args.len() != term.arity() {
        return Some(ArgumentViolation::Count {
            expected: term.arity(),
            actual: args.len(),
        });
    }
    args.iter()
        .enumerate()
        .find(|(_, value)| **value < 0)
        .map(|(index, value)| ArgumentViolation::Negative {
            index,
            value: *value,
        })
}
