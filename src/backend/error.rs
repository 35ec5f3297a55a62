//! The ISO error taxonomy as structured `error(Kind, Context)` terms.
//!
//! Builtins and the interpreter raise `PrologError`, whose payload is the
//! term a `throw/1` of the same fault would carry. Errors therefore flow
//! through catch/3 like any thrown ball, and an uncaught one surfaces from
//! `Interpreter::solve` as a distinct outcome rather than a host panic.

use std::fmt;

use super::symbol::CompoundTag;
use super::term::Term;

#[derive(Debug, Clone)]
pub struct PrologError {
    /// The thrown term, e.g. `error(type_error(callable, 7), _)`
    pub ball: Term,
}

impl PrologError {
    /// Wrap an arbitrary thrown term (throw/1)
    pub fn from_ball(ball: Term) -> Self {
        PrologError { ball }
    }

    fn tagged(kind: Term) -> Self {
        PrologError {
            ball: Term::compound("error", vec![kind, Term::var()]),
        }
    }

    /// A required argument was an unbound variable
    pub fn instantiation() -> Self {
        Self::tagged(Term::atom("instantiation_error"))
    }

    /// Argument of the wrong kind
    pub fn type_error(expected: &str, culprit: Term) -> Self {
        Self::tagged(Term::compound(
            "type_error",
            vec![Term::atom(expected), culprit],
        ))
    }

    /// Valid type, out-of-range value
    pub fn domain_error(domain: &str, culprit: Term) -> Self {
        Self::tagged(Term::compound(
            "domain_error",
            vec![Term::atom(domain), culprit],
        ))
    }

    /// Missing predicate, stream or source
    pub fn existence_error(object_type: &str, culprit: Term) -> Self {
        Self::tagged(Term::compound(
            "existence_error",
            vec![Term::atom(object_type), culprit],
        ))
    }

    /// Missing procedure, with its predicate indicator as culprit
    pub fn unknown_procedure(tag: CompoundTag) -> Self {
        Self::existence_error("procedure", indicator(tag))
    }

    /// Operation not allowed on the target
    pub fn permission_error(operation: &str, object_type: &str, culprit: Term) -> Self {
        Self::tagged(Term::compound(
            "permission_error",
            vec![Term::atom(operation), Term::atom(object_type), culprit],
        ))
    }

    /// Exceeds an implementation limit
    pub fn representation_error(limit: &str) -> Self {
        Self::tagged(Term::compound(
            "representation_error",
            vec![Term::atom(limit)],
        ))
    }

    /// Arithmetic fault: zero_divisor, undefined, float_overflow, int_overflow
    pub fn evaluation_error(what: &str) -> Self {
        Self::tagged(Term::compound("evaluation_error", vec![Term::atom(what)]))
    }

    /// Host resource exhausted
    pub fn resource_error(resource: &str) -> Self {
        Self::tagged(Term::compound("resource_error", vec![Term::atom(resource)]))
    }

    /// Parser fault
    pub fn syntax_error(detail: &str) -> Self {
        Self::tagged(Term::compound("syntax_error", vec![Term::atom(detail)]))
    }

    /// Host I/O or internal fault
    pub fn system_error() -> Self {
        Self::tagged(Term::atom("system_error"))
    }

    /// Raised when the per-interpreter interrupt flag is observed
    pub fn user_interrupt() -> Self {
        Self::tagged(Term::atom("user_interrupt"))
    }
}

/// `Name/Arity` predicate indicator term
pub fn indicator(tag: CompoundTag) -> Term {
    Term::compound(
        "/",
        vec![Term::Atom(tag.name), Term::int(tag.arity as i64)],
    )
}

impl fmt::Display for PrologError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.ball)
    }
}

impl std::error::Error for PrologError {}
