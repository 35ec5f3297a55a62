// Term model: tagged variants for variables, atoms, numbers, compounds and
// opaque handles, plus dereferencing, renaming and the standard order.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;

use bigdecimal::BigDecimal;
use num_bigint::BigInt;
use parking_lot::Mutex;

use super::symbol::{atom, Atom, CompoundTag};

/// Process-wide counter for variable and handle identities
static NEXT_ID: AtomicU64 = AtomicU64::new(1);

fn fresh_id() -> u64 {
    NEXT_ID.fetch_add(1, AtomicOrdering::Relaxed)
}

/// A logical variable: a cell with a mutable binding slot and a stable identity.
///
/// Two unbound variables are distinct iff their identities differ. The slot is
/// written only through the trail, which asserts the cell is currently unbound,
/// so no binding chain can contain a self-loop and dereferencing terminates.
pub struct VarCell {
    pub id: u64,
    slot: Mutex<Option<Term>>,
}

impl VarCell {
    fn new() -> Self {
        VarCell {
            id: fresh_id(),
            slot: Mutex::new(None),
        }
    }

    /// Current binding, or None when unbound
    #[inline]
    pub fn binding(&self) -> Option<Term> {
        self.slot.lock().clone()
    }

    #[inline]
    pub fn is_bound(&self) -> bool {
        self.slot.lock().is_some()
    }

    /// Install a binding. The cell must be unbound; the trail enforces this.
    #[inline]
    pub(crate) fn set(&self, value: Term) {
        let mut slot = self.slot.lock();
        debug_assert!(slot.is_none(), "rebinding bound variable _G{}", self.id);
        *slot = Some(value);
    }

    /// Remove the binding. Called only while unwinding the trail.
    #[inline]
    pub(crate) fn reset(&self) {
        *self.slot.lock() = None;
    }
}

impl fmt::Debug for VarCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.binding() {
            Some(t) => write!(f, "_G{} = {}", self.id, t),
            None => write!(f, "_G{}", self.id),
        }
    }
}

/// A compound term: functor tag plus ordered argument vector, arity >= 1
#[derive(Debug)]
pub struct Compound {
    pub tag: CompoundTag,
    pub args: Vec<Term>,
}

/// An implementation-owned opaque value, compared by identity.
/// Used for stream handles and other host resources.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct Handle {
    pub id: u64,
}

impl Handle {
    pub fn fresh() -> Self {
        Handle { id: fresh_id() }
    }
}

/// A Prolog term
#[derive(Clone, Debug)]
pub enum Term {
    /// An unbound-or-bound logical variable (shared cell)
    Var(Arc<VarCell>),
    /// An interned symbolic constant
    Atom(Atom),
    /// Arbitrary-precision signed integer
    Int(BigInt),
    /// IEEE-754 double
    Float(f64),
    /// Arbitrary-precision decimal, distinct from Float
    Decimal(BigDecimal),
    /// Functor + arguments
    Compound(Arc<Compound>),
    /// Host-owned opaque value
    Handle(Handle),
}

impl Term {
    /// Create a fresh unbound variable
    pub fn var() -> Term {
        Term::Var(Arc::new(VarCell::new()))
    }

    pub fn atom(name: &str) -> Term {
        Term::Atom(atom(name))
    }

    pub fn int(n: i64) -> Term {
        Term::Int(BigInt::from(n))
    }

    pub fn compound(name: &str, args: Vec<Term>) -> Term {
        debug_assert!(!args.is_empty(), "compound terms have arity >= 1");
        let tag = CompoundTag::new(atom(name), args.len());
        Term::Compound(Arc::new(Compound { tag, args }))
    }

    pub fn compound_tagged(tag: CompoundTag, args: Vec<Term>) -> Term {
        debug_assert_eq!(tag.arity, args.len());
        Term::Compound(Arc::new(Compound { tag, args }))
    }

    /// The empty list atom `[]`
    pub fn nil() -> Term {
        Term::atom("[]")
    }

    /// List cell `'.'(head, tail)`
    pub fn cons(head: Term, tail: Term) -> Term {
        Term::compound(".", vec![head, tail])
    }

    /// Build a proper list from the items
    pub fn list(items: Vec<Term>) -> Term {
        let mut t = Term::nil();
        for item in items.into_iter().rev() {
            t = Term::cons(item, t);
        }
        t
    }

    /// Build a partial list ending in `tail`
    pub fn partial_list(items: Vec<Term>, tail: Term) -> Term {
        let mut t = tail;
        for item in items.into_iter().rev() {
            t = Term::cons(item, t);
        }
        t
    }

    /// Dereference: follow the binding chain to its root, which is either an
    /// unbound variable or a non-variable term.
    pub fn deref(&self) -> Term {
        let mut t = self.clone();
        loop {
            match t {
                Term::Var(ref cell) => match cell.binding() {
                    Some(next) => t = next,
                    None => return t,
                },
                other => return other,
            }
        }
    }

    /// The (functor, arity) key of a callable term: atoms get arity 0.
    /// Returns None for variables and non-callable terms. Does not deref.
    pub fn callable_tag(&self) -> Option<CompoundTag> {
        match self {
            Term::Atom(a) => Some(CompoundTag::new(*a, 0)),
            Term::Compound(c) => Some(c.tag),
            _ => None,
        }
    }

    pub fn is_atom(&self, name: &str) -> bool {
        matches!(self, Term::Atom(a) if *a == name)
    }

    pub fn is_nil(&self) -> bool {
        self.is_atom("[]")
    }

    pub fn is_number(&self) -> bool {
        matches!(self, Term::Int(_) | Term::Float(_) | Term::Decimal(_))
    }

    pub fn is_atomic(&self) -> bool {
        matches!(
            self,
            Term::Atom(_) | Term::Int(_) | Term::Float(_) | Term::Decimal(_) | Term::Handle(_)
        )
    }

    pub fn is_callable(&self) -> bool {
        matches!(self, Term::Atom(_) | Term::Compound(_))
    }

    /// Decompose a list into its elements. Fails on partial or improper lists.
    /// All intermediate cells are dereferenced.
    pub fn list_elements(&self) -> Option<Vec<Term>> {
        let mut items = Vec::new();
        let mut t = self.deref();
        loop {
            match t {
                Term::Atom(a) if a == "[]" => return Some(items),
                Term::Compound(ref c) if c.tag.name == "." && c.tag.arity == 2 => {
                    items.push(c.args[0].clone());
                    t = c.args[1].deref();
                }
                _ => return None,
            }
        }
    }

    /// True when the term contains no unbound variables
    pub fn is_ground(&self) -> bool {
        match self.deref() {
            Term::Var(_) => false,
            Term::Compound(c) => c.args.iter().all(|a| a.is_ground()),
            _ => true,
        }
    }

    /// Collect the distinct unbound variables, in first-occurrence order
    pub fn variables(&self) -> Vec<Arc<VarCell>> {
        let mut seen = Vec::new();
        fn walk(t: &Term, seen: &mut Vec<Arc<VarCell>>) {
            match t.deref() {
                Term::Var(cell) => {
                    if !seen.iter().any(|c: &Arc<VarCell>| c.id == cell.id) {
                        seen.push(cell);
                    }
                }
                Term::Compound(c) => {
                    for a in &c.args {
                        walk(a, seen);
                    }
                }
                _ => {}
            }
        }
        walk(self, &mut seen);
        seen
    }

    /// True when the variable with the given identity occurs in this term
    pub fn occurs(&self, var_id: u64) -> bool {
        match self.deref() {
            Term::Var(cell) => cell.id == var_id,
            Term::Compound(c) => c.args.iter().any(|a| a.occurs(var_id)),
            _ => false,
        }
    }
}

/// Copy a term, replacing every distinct unbound variable with a fresh one.
/// Bound variables are replaced by a copy of their value. The map carries the
/// old-identity to fresh-variable correspondence across calls.
pub fn copy_term(t: &Term, map: &mut HashMap<u64, Term>) -> Term {
    match t.deref() {
        Term::Var(cell) => map.entry(cell.id).or_insert_with(Term::var).clone(),
        Term::Compound(c) => {
            let args = c.args.iter().map(|a| copy_term(a, map)).collect();
            Term::compound_tagged(c.tag, args)
        }
        other => other,
    }
}

/// Copy a term with a throwaway variable map
pub fn copy_term_fresh(t: &Term) -> Term {
    copy_term(t, &mut HashMap::new())
}

fn number_value_cmp(a: &Term, b: &Term) -> Option<Ordering> {
    // Compare by mathematical value across Int/Float/Decimal
    let to_decimal = |t: &Term| -> Option<BigDecimal> {
        match t {
            Term::Int(n) => Some(BigDecimal::from(n.clone())),
            Term::Float(f) => BigDecimal::try_from(*f).ok(),
            Term::Decimal(d) => Some(d.clone()),
            _ => None,
        }
    };
    match (a, b) {
        (Term::Int(x), Term::Int(y)) => Some(x.cmp(y)),
        (Term::Float(x), Term::Float(y)) => x.partial_cmp(y).or(Some(Ordering::Equal)),
        _ => {
            let x = to_decimal(a)?;
            let y = to_decimal(b)?;
            Some(x.cmp(&y))
        }
    }
}

fn kind_rank(t: &Term) -> u8 {
    match t {
        Term::Var(_) => 0,
        Term::Float(_) | Term::Decimal(_) | Term::Int(_) => 1,
        Term::Atom(_) => 2,
        Term::Handle(_) => 3,
        Term::Compound(_) => 4,
    }
}

// Rank inside the number group when values compare equal: Float < Decimal < Int
fn number_kind_rank(t: &Term) -> u8 {
    match t {
        Term::Float(_) => 0,
        Term::Decimal(_) => 1,
        _ => 2,
    }
}

/// The standard order of terms:
/// Var < Number < Atom < Handle < Compound; variables by identity, numbers by
/// value, atoms alphabetically, compounds by arity, then name, then arguments.
pub fn compare_terms(a: &Term, b: &Term) -> Ordering {
    let a = a.deref();
    let b = b.deref();
    let (ra, rb) = (kind_rank(&a), kind_rank(&b));
    if ra != rb {
        return ra.cmp(&rb);
    }
    match (&a, &b) {
        (Term::Var(x), Term::Var(y)) => x.id.cmp(&y.id),
        (Term::Atom(x), Term::Atom(y)) => x.cmp(y),
        (Term::Handle(x), Term::Handle(y)) => x.id.cmp(&y.id),
        (Term::Compound(x), Term::Compound(y)) => x
            .tag
            .arity
            .cmp(&y.tag.arity)
            .then_with(|| x.tag.name.cmp(&y.tag.name))
            .then_with(|| {
                for (xa, ya) in x.args.iter().zip(y.args.iter()) {
                    let ord = compare_terms(xa, ya);
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                Ordering::Equal
            }),
        _ => number_value_cmp(&a, &b)
            .unwrap_or(Ordering::Equal)
            .then_with(|| number_kind_rank(&a).cmp(&number_kind_rank(&b))),
    }
}

/// True when the terms are equal up to a consistent renaming of variables.
/// Used by round-trip checks; `==/2` compares variables by identity instead.
pub fn variant(a: &Term, b: &Term) -> bool {
    fn walk(a: &Term, b: &Term, map: &mut HashMap<u64, u64>, seen: &mut HashMap<u64, u64>) -> bool {
        let a = a.deref();
        let b = b.deref();
        match (&a, &b) {
            (Term::Var(x), Term::Var(y)) => {
                // the mapping must be a bijection
                let forward = *map.entry(x.id).or_insert(y.id);
                let backward = *seen.entry(y.id).or_insert(x.id);
                forward == y.id && backward == x.id
            }
            (Term::Compound(x), Term::Compound(y)) => {
                x.tag == y.tag
                    && x.args
                        .iter()
                        .zip(y.args.iter())
                        .all(|(p, q)| walk(p, q, map, seen))
            }
            _ => a == b,
        }
    }
    walk(a, b, &mut HashMap::new(), &mut HashMap::new())
}

/// Structural equality after dereferencing (the `==/2` relation):
/// variables by identity, numbers by kind and value.
impl PartialEq for Term {
    fn eq(&self, other: &Self) -> bool {
        let a = self.deref();
        let b = other.deref();
        match (&a, &b) {
            (Term::Var(x), Term::Var(y)) => x.id == y.id,
            (Term::Atom(x), Term::Atom(y)) => x == y,
            (Term::Int(x), Term::Int(y)) => x == y,
            (Term::Float(x), Term::Float(y)) => x == y,
            (Term::Decimal(x), Term::Decimal(y)) => x == y,
            (Term::Handle(x), Term::Handle(y)) => x.id == y.id,
            (Term::Compound(x), Term::Compound(y)) => {
                x.tag == y.tag && x.args.iter().zip(y.args.iter()).all(|(p, q)| p == q)
            }
            _ => false,
        }
    }
}

impl Eq for Term {}

/// Format a float so it reads back as a Prolog float: always with a decimal
/// point or exponent, shortest round-trip digits.
pub fn format_float(f: f64) -> String {
    if f.is_nan() {
        return "nan".to_string();
    }
    if f.is_infinite() {
        return if f > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    let mut s = format!("{:?}", f);
    if !s.contains('.') {
        match s.find(['e', 'E']) {
            Some(pos) => s.insert_str(pos, ".0"),
            None => s.push_str(".0"),
        }
    }
    s
}

/// Format a decimal with its `d` suffix, normalizing the exponent marker
pub fn format_decimal(d: &BigDecimal) -> String {
    let mut s = d.normalized().to_string();
    s = s.replace('E', "e").replace("e+", "e");
    s.push('d');
    s
}

// Canonical, operator-free rendering used by logging and error contexts.
// The writer module produces the operator-aware, quoted surface syntax.
impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.deref() {
            Term::Var(cell) => write!(f, "_G{}", cell.id),
            Term::Atom(a) => write!(f, "{}", a),
            Term::Int(n) => write!(f, "{}", n),
            Term::Float(x) => write!(f, "{}", format_float(x)),
            Term::Decimal(d) => write!(f, "{}", format_decimal(&d)),
            Term::Handle(h) => write!(f, "$handle({})", h.id),
            Term::Compound(c) => {
                if c.tag.name == "." && c.tag.arity == 2 {
                    write!(f, "[{}", c.args[0])?;
                    let mut tail = c.args[1].deref();
                    loop {
                        match tail {
                            Term::Atom(a) if a == "[]" => break,
                            Term::Compound(ref cc) if cc.tag.name == "." && cc.tag.arity == 2 => {
                                write!(f, ",{}", cc.args[0])?;
                                tail = cc.args[1].deref();
                            }
                            other => {
                                write!(f, "|{}", other)?;
                                break;
                            }
                        }
                    }
                    return write!(f, "]");
                }
                write!(f, "{}(", c.tag.name)?;
                for (i, a) in c.args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}", a)?;
                }
                write!(f, ")")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_variables_are_distinct() {
        let a = Term::var();
        let b = Term::var();
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
    }

    #[test]
    fn test_deref_follows_chains() {
        let x = Term::var();
        let y = Term::var();
        if let (Term::Var(cx), Term::Var(cy)) = (&x, &y) {
            cx.set(y.clone());
            cy.set(Term::atom("end"));
        }
        assert!(x.deref().is_atom("end"));
    }

    #[test]
    fn test_list_roundtrip() {
        let l = Term::list(vec![Term::int(1), Term::int(2), Term::int(3)]);
        let items = l.list_elements().unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(items[0], Term::int(1));
        assert_eq!(format!("{}", l), "[1,2,3]");
    }

    #[test]
    fn test_partial_list_is_not_proper() {
        let l = Term::partial_list(vec![Term::int(1)], Term::var());
        assert!(l.list_elements().is_none());
        assert!(!l.is_ground());
    }

    #[test]
    fn test_copy_term_shares_renamed_variables() {
        let x = Term::var();
        let t = Term::compound("f", vec![x.clone(), x.clone(), Term::atom("a")]);
        let copy = copy_term_fresh(&t);
        match copy.deref() {
            Term::Compound(c) => {
                assert_eq!(c.args[0], c.args[1], "shared variable stays shared");
                assert_ne!(c.args[0], x, "copy uses a fresh variable");
                assert!(c.args[2].is_atom("a"));
            }
            _ => panic!("expected compound"),
        }
    }

    #[test]
    fn test_variant() {
        let x = Term::var();
        let y = Term::var();
        let t1 = Term::compound("f", vec![x.clone(), x.clone(), y.clone()]);
        let a = Term::var();
        let b = Term::var();
        let t2 = Term::compound("f", vec![a.clone(), a.clone(), b.clone()]);
        assert!(variant(&t1, &t2));
        // sharing structure must agree
        let t3 = Term::compound("f", vec![a.clone(), b.clone(), b.clone()]);
        assert!(!variant(&t1, &t3));
        assert!(variant(&Term::atom("k"), &Term::atom("k")));
        assert!(!variant(&Term::int(1), &Term::Float(1.0)));
    }

    #[test]
    fn test_standard_order() {
        let v = Term::var();
        let n = Term::int(42);
        let a = Term::atom("zebra");
        let c = Term::compound("f", vec![Term::int(1)]);
        assert_eq!(compare_terms(&v, &n), Ordering::Less);
        assert_eq!(compare_terms(&n, &a), Ordering::Less);
        assert_eq!(compare_terms(&a, &c), Ordering::Less);
        // same value, different kind: float precedes integer
        assert_eq!(
            compare_terms(&Term::Float(1.0), &Term::int(1)),
            Ordering::Less
        );
    }

    #[test]
    fn test_int_float_not_structurally_equal() {
        assert_ne!(Term::int(1), Term::Float(1.0));
    }

    #[test]
    fn test_float_formatting_roundtrips() {
        assert_eq!(format_float(3.5), "3.5");
        assert_eq!(format_float(1.0), "1.0");
        assert_eq!(format_float(1e30), "1.0e30");
    }

    #[test]
    fn test_occurs() {
        let x = Term::var();
        let t = Term::compound("f", vec![Term::compound("g", vec![x.clone()])]);
        if let Term::Var(c) = &x {
            assert!(t.occurs(c.id));
        }
        assert!(!Term::atom("a").occurs(0));
    }
}
