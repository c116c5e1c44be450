//! Node-table form of a term.
//!
//! A node editor or a stored node table names children by index instead of
//! owning them, so the same node can be shared by several parents or even be
//! its own ancestor. [`Term`] trees cannot express either; this module is
//! where they are represented, validated and turned back into trees.

use std::{collections::HashSet, fmt};

use serde::Serialize;
use serde_json::Value;

use crate::{
    error::{Error, Result},
    term::{Natural, Term, TermKind, as_index, field, natural_field, read_tag},
};

/// Largest tree [`TermGraph::to_term`] will build.
pub const DEFAULT_MAX_TERM_NODES: usize = 1_000_000;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct NodeId(pub usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A [`Term`] variant whose children are node ids. Nothing is checked when a
/// node is created.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Node {
    Zero,
    Successor,
    Constant {
        value: Natural,
        arity: usize,
    },
    Projection {
        n: usize,
        i: usize,
    },
    Composition {
        #[serde(rename = "f")]
        outer: NodeId,
        #[serde(rename = "g_list")]
        inner: Vec<NodeId>,
    },
    PrimitiveRecursion {
        #[serde(rename = "g")]
        base: NodeId,
        #[serde(rename = "h")]
        step: NodeId,
    },
}

impl Node {
    pub fn kind(&self) -> TermKind {
        match self {
            Node::Zero => TermKind::Zero,
            Node::Successor => TermKind::Successor,
            Node::Constant { .. } => TermKind::Constant,
            Node::Projection { .. } => TermKind::Projection,
            Node::Composition { .. } => TermKind::Composition,
            Node::PrimitiveRecursion { .. } => TermKind::PrimitiveRecursion,
        }
    }

    pub fn children(&self) -> Vec<NodeId> {
        self.labelled_children()
            .into_iter()
            .map(|(_, id)| id)
            .collect()
    }

    /// Children paired with the record field they hang off.
    pub fn labelled_children(&self) -> Vec<(String, NodeId)> {
        match self {
            Node::Composition { outer, inner } => {
                let mut children = vec![("f".to_string(), *outer)];
                children.extend(
                    inner
                        .iter()
                        .enumerate()
                        .map(|(index, id)| (format!("g_list[{index}]"), *id)),
                );
                children
            }
            Node::PrimitiveRecursion { base, step } => {
                vec![("g".to_string(), *base), ("h".to_string(), *step)]
            }
            _ => vec![],
        }
    }

    fn from_value(value: &Value) -> Result<Node> {
        let (kind, record) = read_tag(value)?;
        let node_id = |name: &'static str| -> Result<NodeId> {
            Ok(NodeId(as_index(field(record, kind, name)?, name)?))
        };
        let node = match kind {
            TermKind::Zero => Node::Zero,
            TermKind::Successor => Node::Successor,
            TermKind::Constant => Node::Constant {
                value: natural_field(record, kind, "value")?,
                arity: match record.get("arity") {
                    Some(arity) => as_index(arity, "arity")?,
                    None => 0,
                },
            },
            TermKind::Projection => Node::Projection {
                n: as_index(field(record, kind, "n")?, "n")?,
                i: as_index(field(record, kind, "i")?, "i")?,
            },
            TermKind::Composition => Node::Composition {
                outer: node_id("f")?,
                inner: field(record, kind, "g_list")?
                    .as_array()
                    .ok_or_else(|| Error::Malformed("`g_list` must be an array".into()))?
                    .iter()
                    .map(|id| as_index(id, "g_list").map(NodeId))
                    .collect::<Result<Vec<_>>>()?,
            },
            TermKind::PrimitiveRecursion => Node::PrimitiveRecursion {
                base: node_id("g")?,
                step: node_id("h")?,
            },
        };
        Ok(node)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct TermGraph {
    root: NodeId,
    nodes: Vec<Node>,
}

impl TermGraph {
    pub fn new(nodes: Vec<Node>, root: NodeId) -> Self {
        Self { root, nodes }
    }

    /// One node per term node with the root at `#0`; every node gets its slot
    /// when its parent is laid out, so children always follow their parent.
    pub fn from_term(term: &Term) -> Self {
        let mut nodes = vec![Node::Zero];
        let mut pending = vec![(term, NodeId(0))];
        while let Some((term, id)) = pending.pop() {
            let mut reserve = || -> NodeId {
                nodes.push(Node::Zero);
                NodeId(nodes.len() - 1)
            };
            let node = match term {
                Term::Zero => Node::Zero,
                Term::Successor => Node::Successor,
                Term::Constant { value, arity } => Node::Constant {
                    value: *value,
                    arity: *arity,
                },
                Term::Projection { n, i } => Node::Projection { n: *n, i: *i },
                Term::Composition { outer, inner } => {
                    let outer_id = reserve();
                    let inner_ids: Vec<NodeId> = inner.iter().map(|_| reserve()).collect();
                    pending.push((outer.as_ref(), outer_id));
                    pending.extend(inner.iter().zip(inner_ids.iter().copied()));
                    Node::Composition {
                        outer: outer_id,
                        inner: inner_ids,
                    }
                }
                Term::PrimitiveRecursion { base, step } => {
                    let base_id = reserve();
                    let step_id = reserve();
                    pending.push((base.as_ref(), base_id));
                    pending.push((step.as_ref(), step_id));
                    Node::PrimitiveRecursion {
                        base: base_id,
                        step: step_id,
                    }
                }
            };
            nodes[id.0] = node;
        }
        Self {
            root: NodeId(0),
            nodes,
        }
    }

    pub fn push(&mut self, node: Node) -> NodeId {
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }

    /// Replaces a node in place, which is how back references get wired in.
    pub fn replace(&mut self, id: NodeId, node: Node) -> Result<()> {
        let slot = self
            .nodes
            .get_mut(id.0)
            .ok_or(Error::DanglingNode { node: id })?;
        *slot = node;
        Ok(())
    }

    pub fn set_root(&mut self, root: NodeId) {
        self.root = root;
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Arity of the node, or `None` when the chain it depends on loops or
    /// points at a missing node.
    pub fn arity(&self, id: NodeId) -> Option<usize> {
        let mut offset = 0;
        let mut current = id;
        let mut seen = HashSet::new();
        loop {
            if !seen.insert(current) {
                return None;
            }
            match self.node(current)? {
                Node::Zero | Node::Successor => return Some(offset + 1),
                Node::Constant { arity, .. } => return Some(offset + arity),
                Node::Projection { n, .. } => return Some(offset + n),
                Node::Composition { inner, .. } => match inner.first() {
                    Some(first) => current = *first,
                    None => return Some(offset),
                },
                Node::PrimitiveRecursion { base, .. } => {
                    offset += 1;
                    current = *base;
                }
            }
        }
    }

    /// Rebuilds the tree under the root. Shared nodes are copied into every
    /// parent; a node that is its own ancestor is an error.
    pub fn to_term(&self) -> Result<Term> {
        self.to_term_within(DEFAULT_MAX_TERM_NODES)
    }

    /// [`TermGraph::to_term`], giving up with `TermTooLarge` once the tree
    /// would exceed `max_nodes` nodes.
    pub fn to_term_within(&self, max_nodes: usize) -> Result<Term> {
        enum Visit {
            Enter(NodeId),
            Exit(NodeId),
        }

        let mut on_path = HashSet::new();
        let mut expanded = 0usize;
        let mut built: Vec<Term> = vec![];
        let mut pending = vec![Visit::Enter(self.root)];
        while let Some(visit) = pending.pop() {
            match visit {
                Visit::Enter(id) => {
                    let node = self.node(id).ok_or(Error::DanglingNode { node: id })?;
                    if !on_path.insert(id) {
                        return Err(Error::CycleDetected { node: id });
                    }
                    expanded += 1;
                    if expanded > max_nodes {
                        return Err(Error::TermTooLarge { limit: max_nodes });
                    }
                    pending.push(Visit::Exit(id));
                    pending.extend(node.children().into_iter().rev().map(Visit::Enter));
                }
                Visit::Exit(id) => {
                    on_path.remove(&id);
                    let node = self.node(id).ok_or(Error::DanglingNode { node: id })?;
                    let children = built.split_off(built.len() - node.children().len());
                    built.push(assemble(node, children));
                }
            }
        }
        built
            .pop()
            .ok_or(Error::DanglingNode { node: self.root })
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<TermGraph> {
        let value: Value = serde_json::from_str(json)?;
        TermGraph::from_value(&value)
    }

    /// Reads `{"root": <id>, "nodes": [..]}`. References are not resolved
    /// here, that is the validator's job.
    pub fn from_value(value: &Value) -> Result<TermGraph> {
        let root = value
            .get("root")
            .map(|root| as_index(root, "root"))
            .transpose()?
            .unwrap_or(0);
        let nodes = value
            .get("nodes")
            .and_then(Value::as_array)
            .ok_or_else(|| Error::Malformed("node table must have a `nodes` array".into()))?
            .iter()
            .map(Node::from_value)
            .collect::<Result<Vec<_>>>()?;
        Ok(TermGraph::new(nodes, NodeId(root)))
    }
}

/// `children` holds the already built children in record order.
fn assemble(node: &Node, children: Vec<Term>) -> Term {
    match node {
        Node::Zero => Term::Zero,
        Node::Successor => Term::Successor,
        Node::Constant { value, arity } => Term::Constant {
            value: *value,
            arity: *arity,
        },
        Node::Projection { n, i } => Term::Projection { n: *n, i: *i },
        Node::Composition { .. } => {
            let mut children = children.into_iter();
            // Composition always lists its outer node first.
            let outer = children.next().unwrap_or(Term::Zero);
            Term::Composition {
                outer: Box::new(outer),
                inner: children.collect(),
            }
        }
        Node::PrimitiveRecursion { .. } => {
            let mut children = children.into_iter();
            let base = children.next().unwrap_or(Term::Zero);
            let step = children.next().unwrap_or(Term::Zero);
            Term::PrimitiveRecursion {
                base: Box::new(base),
                step: Box::new(step),
            }
        }
    }
}
