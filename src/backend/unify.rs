// Structural unification over a work-list, producing trail entries.
//
// The work-list form keeps the host call stack shallow on deep terms; the
// trail records every binding before the cell is written, so a failure in
// the middle of a unification unwinds exactly.

use smallvec::SmallVec;

use super::term::Term;
use super::trail::Trail;

type WorkList = SmallVec<[(Term, Term); 16]>;

/// Unify two terms, recording bindings on the trail. On failure the caller
/// unwinds the trail to its own mark; this function does not unwind.
pub fn unify(trail: &mut Trail, a: &Term, b: &Term) -> bool {
    solve(trail, a, b, false)
}

/// Unification variant that refuses to bind a variable to a term containing
/// that variable.
pub fn unify_with_occurs_check(trail: &mut Trail, a: &Term, b: &Term) -> bool {
    solve(trail, a, b, true)
}

fn solve(trail: &mut Trail, a: &Term, b: &Term, occurs_check: bool) -> bool {
    let mut work: WorkList = SmallVec::new();
    work.push((a.clone(), b.clone()));

    while let Some((x, y)) = work.pop() {
        let x = x.deref();
        let y = y.deref();
        match (&x, &y) {
            (Term::Var(vx), Term::Var(vy)) => {
                if vx.id != vy.id {
                    trail.bind(vx, y.clone());
                }
            }
            (Term::Var(vx), _) => {
                if occurs_check && y.occurs(vx.id) {
                    return false;
                }
                trail.bind(vx, y.clone());
            }
            (_, Term::Var(vy)) => {
                if occurs_check && x.occurs(vy.id) {
                    return false;
                }
                trail.bind(vy, x.clone());
            }
            (Term::Atom(ax), Term::Atom(ay)) => {
                if ax != ay {
                    return false;
                }
            }
            (Term::Int(nx), Term::Int(ny)) => {
                if nx != ny {
                    return false;
                }
            }
            // NaN != NaN, so unification of NaN with itself fails, as required
            (Term::Float(fx), Term::Float(fy)) => {
                if fx != fy {
                    return false;
                }
            }
            (Term::Decimal(dx), Term::Decimal(dy)) => {
                if dx != dy {
                    return false;
                }
            }
            (Term::Handle(hx), Term::Handle(hy)) => {
                if hx.id != hy.id {
                    return false;
                }
            }
            (Term::Compound(cx), Term::Compound(cy)) => {
                if cx.tag != cy.tag {
                    return false;
                }
                for (p, q) in cx.args.iter().zip(cy.args.iter()) {
                    work.push((p.clone(), q.clone()));
                }
            }
            _ => return false,
        }
    }
    true
}
