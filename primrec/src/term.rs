use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, de};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Every argument and result in the calculus is a natural number.
pub type Natural = u64;

/// One node of a primitive recursive function definition.
///
/// The variants can be built directly, which skips every shape check; the
/// validator reports what such a term gets wrong. [`Term::projection`],
/// [`Term::composition`] and [`Term::primitive_recursion`] check their
/// contracts up front, and so does deserialization.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Term {
    /// `Z(x) = 0`
    Zero,
    /// `S(x) = x + 1`
    Successor,
    /// `C(x1..xn) = value`, ignoring its `arity` arguments.
    Constant { value: Natural, arity: usize },
    /// `P(x1..xn) = xi`, with `i` counted from 1.
    Projection { n: usize, i: usize },
    /// `outer(inner1(x..), inner2(x..), ..)`
    Composition {
        #[serde(rename = "f")]
        outer: Box<Term>,
        #[serde(rename = "g_list")]
        inner: Vec<Term>,
    },
    /// `f(0, y..) = base(y..)` and `f(x+1, y..) = step(x, f(x, y..), y..)`
    PrimitiveRecursion {
        #[serde(rename = "g")]
        base: Box<Term>,
        #[serde(rename = "h")]
        step: Box<Term>,
    },
}

/// The closed set of term tags, spelled the way records spell them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TermKind {
    Zero,
    Successor,
    Constant,
    Projection,
    Composition,
    PrimitiveRecursion,
}

impl TermKind {
    pub const ALL: [TermKind; 6] = [
        TermKind::Zero,
        TermKind::Successor,
        TermKind::Constant,
        TermKind::Projection,
        TermKind::Composition,
        TermKind::PrimitiveRecursion,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Zero => "zero",
            Self::Successor => "successor",
            Self::Constant => "constant",
            Self::Projection => "projection",
            Self::Composition => "composition",
            Self::PrimitiveRecursion => "primitive_recursion",
        }
    }

    pub fn is_leaf(self) -> bool {
        !matches!(self, Self::Composition | Self::PrimitiveRecursion)
    }
}

impl fmt::Display for TermKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TermKind {
    type Err = Error;

    fn from_str(tag: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == tag)
            .ok_or_else(|| Error::UnknownVariant(tag.to_string()))
    }
}

impl Term {
    pub fn constant(value: Natural, arity: usize) -> Term {
        Term::Constant { value, arity }
    }

    pub fn projection(n: usize, i: usize) -> Result<Term> {
        if i < 1 || i > n {
            return Err(Error::shape(format!(
                "projection index must be between 1 and {n}, got {i}"
            )));
        }
        Ok(Term::Projection { n, i })
    }

    pub fn composition(outer: Term, inner: Vec<Term>) -> Result<Term> {
        if inner.len() != outer.arity() {
            return Err(Error::shape(format!(
                "composition requires {} inner functions, got {}",
                outer.arity(),
                inner.len()
            )));
        }
        if let Some(first) = inner.first() {
            let expected = first.arity();
            if let Some((index, g)) = inner
                .iter()
                .enumerate()
                .find(|(_, g)| g.arity() != expected)
            {
                return Err(Error::shape(format!(
                    "composition inner function {index} has arity {}, expected {expected}",
                    g.arity()
                )));
            }
        }
        Ok(Term::Composition {
            outer: Box::new(outer),
            inner,
        })
    }

    pub fn primitive_recursion(base: Term, step: Term) -> Result<Term> {
        if step.arity() != base.arity() + 2 {
            return Err(Error::shape(format!(
                "primitive recursion step must have arity {}, got {}",
                base.arity() + 2,
                step.arity()
            )));
        }
        Ok(Term::PrimitiveRecursion {
            base: Box::new(base),
            step: Box::new(step),
        })
    }

    pub fn kind(&self) -> TermKind {
        match self {
            Term::Zero => TermKind::Zero,
            Term::Successor => TermKind::Successor,
            Term::Constant { .. } => TermKind::Constant,
            Term::Projection { .. } => TermKind::Projection,
            Term::Composition { .. } => TermKind::Composition,
            Term::PrimitiveRecursion { .. } => TermKind::PrimitiveRecursion,
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.kind().is_leaf()
    }

    /// Number of arguments the term accepts, read off its own fields.
    pub fn arity(&self) -> usize {
        match self {
            Term::Zero | Term::Successor => 1,
            Term::Constant { arity, .. } => *arity,
            Term::Projection { n, .. } => *n,
            Term::Composition { inner, .. } => inner.first().map_or(0, Term::arity),
            Term::PrimitiveRecursion { base, .. } => base.arity() + 1,
        }
    }

    /// Direct application of a leaf. Composition and primitive recursion
    /// have to go through the [`Evaluator`](crate::evaluator::Evaluator).
    pub fn apply(&self, args: &[Natural]) -> Result<Natural> {
        match self {
            Term::Zero => {
                expect_exactly(1, args)?;
                Ok(0)
            }
            Term::Successor => {
                let x = args.first().ok_or(Error::ArityMismatch {
                    expected: 1,
                    actual: 0,
                })?;
                x.checked_add(1).ok_or(Error::ArithmeticOverflow)
            }
            Term::Constant { value, arity } => {
                expect_exactly(*arity, args)?;
                Ok(*value)
            }
            Term::Projection { n, i } => {
                if args.len() < *n {
                    return Err(Error::ArityMismatch {
                        expected: *n,
                        actual: args.len(),
                    });
                }
                i.checked_sub(1)
                    .and_then(|index| args.get(index))
                    .copied()
                    .ok_or_else(|| {
                        Error::shape(format!("projection index must be between 1 and {n}, got {i}"))
                    })
            }
            Term::Composition { .. } | Term::PrimitiveRecursion { .. } => {
                Err(Error::NotALeaf(self.kind()))
            }
        }
    }

    /// Direct sub-terms, in record order.
    pub fn children(&self) -> Vec<&Term> {
        match self {
            Term::Composition { outer, inner } => {
                let mut children = Vec::with_capacity(inner.len() + 1);
                children.push(outer.as_ref());
                children.extend(inner.iter());
                children
            }
            Term::PrimitiveRecursion { base, step } => vec![base.as_ref(), step.as_ref()],
            _ => vec![],
        }
    }

    pub fn node_count(&self) -> usize {
        let mut count = 0;
        let mut pending = vec![self];
        while let Some(term) = pending.pop() {
            count += 1;
            pending.extend(term.children());
        }
        count
    }

    /// Longest root-to-leaf path, counted in nodes.
    pub fn height(&self) -> usize {
        let mut height = 0;
        let mut pending = vec![(self, 1)];
        while let Some((term, level)) = pending.pop() {
            height = height.max(level);
            pending.extend(term.children().into_iter().map(|child| (child, level + 1)));
        }
        height
    }

    pub fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Term> {
        let value: Value = serde_json::from_str(json)?;
        Term::from_value(&value)
    }

    /// Decodes a tagged record, dispatching strictly on the known tags and
    /// running the same checks as the checked constructors.
    pub fn from_value(value: &Value) -> Result<Term> {
        let (kind, record) = read_tag(value)?;
        match kind {
            TermKind::Zero => Ok(Term::Zero),
            TermKind::Successor => Ok(Term::Successor),
            TermKind::Constant => {
                let value = natural_field(record, kind, "value")?;
                let arity = match record.get("arity") {
                    Some(arity) => as_index(arity, "arity")?,
                    None => 0,
                };
                Ok(Term::constant(value, arity))
            }
            TermKind::Projection => {
                let n = as_index(field(record, kind, "n")?, "n")?;
                let i = as_index(field(record, kind, "i")?, "i")?;
                Term::projection(n, i)
            }
            TermKind::Composition => {
                let outer = Term::from_value(field(record, kind, "f")?)?;
                let inner = field(record, kind, "g_list")?
                    .as_array()
                    .ok_or_else(|| Error::Malformed("`g_list` must be an array".into()))?
                    .iter()
                    .map(Term::from_value)
                    .collect::<Result<Vec<_>>>()?;
                Term::composition(outer, inner)
            }
            TermKind::PrimitiveRecursion => {
                let base = Term::from_value(field(record, kind, "g")?)?;
                let step = Term::from_value(field(record, kind, "h")?)?;
                Term::primitive_recursion(base, step)
            }
        }
    }
}

impl<'de> Deserialize<'de> for Term {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Term::from_value(&value).map_err(de::Error::custom)
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Zero => f.write_str("Z"),
            Term::Successor => f.write_str("S"),
            Term::Constant { value, arity } => write!(f, "C{value}^{arity}"),
            Term::Projection { n, i } => write!(f, "P{i}^{n}"),
            Term::Composition { outer, inner } => {
                write!(f, "Comp({outer};")?;
                for (index, g) in inner.iter().enumerate() {
                    let separator = if index == 0 { " " } else { ", " };
                    write!(f, "{separator}{g}")?;
                }
                f.write_str(")")
            }
            Term::PrimitiveRecursion { base, step } => write!(f, "Rec({base}, {step})"),
        }
    }
}

fn expect_exactly(expected: usize, args: &[Natural]) -> Result<()> {
    if args.len() != expected {
        return Err(Error::ArityMismatch {
            expected,
            actual: args.len(),
        });
    }
    Ok(())
}

/// Shared by the tree and node-table decoders.
pub(crate) fn read_tag(value: &Value) -> Result<(TermKind, &Map<String, Value>)> {
    let record = value
        .as_object()
        .ok_or_else(|| Error::Malformed(format!("expected a record, found {value}")))?;
    let tag = record
        .get("type")
        .ok_or_else(|| Error::Malformed("record has no `type` tag".into()))?
        .as_str()
        .ok_or_else(|| Error::Malformed("`type` tag must be a string".into()))?;
    Ok((tag.parse()?, record))
}

pub(crate) fn field<'v>(
    record: &'v Map<String, Value>,
    kind: TermKind,
    field: &'static str,
) -> Result<&'v Value> {
    record
        .get(field)
        .ok_or(Error::MissingField { kind, field })
}

pub(crate) fn natural_field(
    record: &Map<String, Value>,
    kind: TermKind,
    name: &'static str,
) -> Result<Natural> {
    let value = field(record, kind, name)?;
    value
        .as_u64()
        .ok_or_else(|| Error::Malformed(format!("`{name}` must be a natural number, found {value}")))
}

pub(crate) fn as_index(value: &Value, name: &str) -> Result<usize> {
    value
        .as_u64()
        .and_then(|v| usize::try_from(v).ok())
        .ok_or_else(|| Error::Malformed(format!("`{name}` must be a natural number, found {value}")))
}
