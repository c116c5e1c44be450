use thiserror::Error;

use crate::{graph::NodeId, term::TermKind};

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Every way building, decoding or evaluating a term can fail.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// A construction contract does not hold (projection bounds, composition
    /// width, recursion arities).
    #[error("shape error: {message}")]
    ShapeError { message: String },

    #[error("cycle detected at node {node}")]
    CycleDetected { node: NodeId },

    #[error("node {node} is referenced but does not exist")]
    DanglingNode { node: NodeId },

    #[error("node table expands to more than {limit} term nodes")]
    TermTooLarge { limit: usize },

    #[error("arity mismatch: expected {expected} arguments, got {actual}")]
    ArityMismatch { expected: usize, actual: usize },

    #[error("argument {index} is negative ({value}), only natural numbers are supported")]
    NegativeArgument { index: usize, value: i64 },

    #[error("maximum recursion depth {limit} exceeded")]
    DepthExceeded { limit: usize },

    #[error("maximum step count {limit} exceeded")]
    StepsExceeded { limit: u64 },

    #[error("unknown function type: {0:?}")]
    UnknownVariant(String),

    #[error("record of type {kind} is missing field `{field}`")]
    MissingField { kind: TermKind, field: &'static str },

    #[error("malformed record: {0}")]
    Malformed(String),

    #[error("invalid json: {0}")]
    Json(String),

    #[error("arithmetic overflow")]
    ArithmeticOverflow,

    #[error("{0} is evaluated structurally, not directly")]
    NotALeaf(TermKind),
}

impl Error {
    pub(crate) fn shape(message: impl Into<String>) -> Self {
        Self::ShapeError {
            message: message.into(),
        }
    }

    /// Ceiling breaches abort an evaluation without saying anything about the
    /// term itself.
    pub fn is_ceiling(&self) -> bool {
        matches!(self, Self::DepthExceeded { .. } | Self::StepsExceeded { .. })
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}
