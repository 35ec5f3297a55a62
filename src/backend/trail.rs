// Trail: the undo log of variable bindings.
//
// Every binding goes through `bind`, which records the cell before mutating
// it, so unwinding to a saved mark restores every variable bound after that
// mark to unbound, in strict reverse order.

use std::sync::Arc;

use super::term::{Term, VarCell};

/// Opaque position in the trail, captured by `mark` and consumed by `undo_to`
pub type TrailMark = usize;

#[derive(Default)]
pub struct Trail {
    entries: Vec<Arc<VarCell>>,
}

impl Trail {
    pub fn new() -> Self {
        Trail::default()
    }

    /// Current trail position
    #[inline]
    pub fn mark(&self) -> TrailMark {
        self.entries.len()
    }

    /// Bind an unbound variable, recording the write first so a failure in
    /// the middle of a unification still unwinds correctly.
    #[inline]
    pub fn bind(&mut self, cell: &Arc<VarCell>, value: Term) {
        self.entries.push(Arc::clone(cell));
        cell.set(value);
    }

    /// Unwind to a saved mark: every variable bound after it becomes unbound
    pub fn undo_to(&mut self, mark: TrailMark) {
        while self.entries.len() > mark {
            let cell = self.entries.pop().expect("trail entry above mark");
            cell.reset();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_undo_restores_in_lifo_order() {
        let mut trail = Trail::new();
        let x = Term::var();
        let y = Term::var();
        let mark = trail.mark();
        if let (Term::Var(cx), Term::Var(cy)) = (&x, &y) {
            trail.bind(cx, Term::atom("a"));
            trail.bind(cy, Term::atom("b"));
            assert!(cx.is_bound());
            assert!(cy.is_bound());
            trail.undo_to(mark);
            assert!(!cx.is_bound());
            assert!(!cy.is_bound());
        }
    }

    #[test]
    fn test_partial_undo() {
        let mut trail = Trail::new();
        let x = Term::var();
        let y = Term::var();
        if let (Term::Var(cx), Term::Var(cy)) = (&x, &y) {
            trail.bind(cx, Term::atom("a"));
            let mark = trail.mark();
            trail.bind(cy, Term::atom("b"));
            trail.undo_to(mark);
            assert!(cx.is_bound(), "bindings below the mark survive");
            assert!(!cy.is_bound());
        }
    }
}
