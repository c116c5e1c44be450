//! Textbook functions built from the primitives.

use crate::term::Term;

pub const NAMES: [&str; 3] = ["addition", "multiplication", "factorial"];

/// `add(0, y) = y`, `add(x+1, y) = S(add(x, y))`
pub fn addition() -> Term {
    Term::PrimitiveRecursion {
        base: Box::new(Term::Projection { n: 1, i: 1 }),
        step: Box::new(Term::Composition {
            outer: Box::new(Term::Successor),
            inner: vec![Term::Projection { n: 3, i: 2 }],
        }),
    }
}

/// `mult(0, y) = 0`, `mult(x+1, y) = add(mult(x, y), y)`
pub fn multiplication() -> Term {
    Term::PrimitiveRecursion {
        base: Box::new(Term::Zero),
        step: Box::new(Term::Composition {
            outer: Box::new(addition()),
            inner: vec![Term::Projection { n: 3, i: 2 }, Term::Projection { n: 3, i: 3 }],
        }),
    }
}

/// `fact(0) = 1`, `fact(x+1) = mult(S(x), fact(x))`
pub fn factorial() -> Term {
    Term::PrimitiveRecursion {
        base: Box::new(Term::Constant { value: 1, arity: 0 }),
        step: Box::new(Term::Composition {
            outer: Box::new(multiplication()),
            inner: vec![
                Term::Composition {
                    outer: Box::new(Term::Successor),
                    inner: vec![Term::Projection { n: 2, i: 1 }],
                },
                Term::Projection { n: 2, i: 2 },
            ],
        }),
    }
}

pub fn by_name(name: &str) -> Option<Term> {
    match name {
        "addition" | "add" => Some(addition()),
        "multiplication" | "mult" => Some(multiplication()),
        "factorial" | "fact" => Some(factorial()),
        _ => None,
    }
}
