//! Foreign (built-in) predicates.
//!
//! The registry maps predicate tags to implementations, looked up by the
//! machine after its control constructs and before the clause database.
//! Embedders add their own predicates through the `Foreign` trait; the
//! standard set is registered by `with_standard_predicates`.
//!
//! Nondeterministic predicates return `Resolved::Redo` with a `Choices`
//! state; the machine drives further solutions through it on backtracking.

use std::cmp::Ordering;
use std::collections::VecDeque;
use std::sync::Arc;

use dashmap::DashMap;
use num_bigint::BigInt;
use num_traits::{Signed, ToPrimitive};

use parking_lot::Mutex;

use super::arith::{compare_numbers, eval};
use super::database::Clause;
use super::error::PrologError;
use super::machine::{Choices, Interpreter, Outcome, Resolved};
use super::operators::OpType;
use super::streams::{EofAction, PrologStream, StreamMode, StreamType};
use super::symbol::{tag, Atom, CompoundTag};
use super::term::{compare_terms, copy_term_fresh, Term};
use crate::reader::{StreamSource, TermStream};
use crate::writer::{term_to_string, WriteOptions};

/// Implemented by all foreign predicates
pub trait Foreign: Send + Sync {
    fn call(&self, interp: &mut Interpreter, args: &[Term]) -> Result<Resolved, PrologError>;
}

type NativeFn = fn(&mut Interpreter, &[Term]) -> Result<Resolved, PrologError>;

struct Native(NativeFn);

impl Foreign for Native {
    fn call(&self, interp: &mut Interpreter, args: &[Term]) -> Result<Resolved, PrologError> {
        (self.0)(interp, args)
    }
}

/// Name-keyed registry of foreign predicates
pub struct BuiltinRegistry {
    map: DashMap<CompoundTag, Arc<dyn Foreign>>,
}

impl BuiltinRegistry {
    pub fn empty() -> Self {
        BuiltinRegistry {
            map: DashMap::new(),
        }
    }

    pub fn register(&self, name: &str, arity: usize, predicate: Arc<dyn Foreign>) {
        self.map.insert(tag(name, arity), predicate);
    }

    fn native(&self, name: &str, arity: usize, f: NativeFn) {
        self.register(name, arity, Arc::new(Native(f)));
    }

    pub fn get(&self, key: CompoundTag) -> Option<Arc<dyn Foreign>> {
        self.map.get(&key).map(|e| Arc::clone(&e))
    }

    pub fn contains(&self, key: CompoundTag) -> bool {
        self.map.contains_key(&key)
    }

    /// The standard predicate set
    pub fn with_standard_predicates() -> Self {
        let r = BuiltinRegistry::empty();
        // unification
        r.native("=", 2, bi_unify);
        r.native("\\=", 2, bi_not_unifiable);
        r.native("unify_with_occurs_check", 2, bi_unify_occurs);
        // type tests
        r.native("var", 1, bi_var);
        r.native("nonvar", 1, bi_nonvar);
        r.native("atom", 1, bi_atom);
        r.native("number", 1, bi_number);
        r.native("integer", 1, bi_integer);
        r.native("float", 1, bi_float);
        r.native("atomic", 1, bi_atomic);
        r.native("compound", 1, bi_compound);
        r.native("callable", 1, bi_callable);
        r.native("is_list", 1, bi_is_list);
        r.native("ground", 1, bi_ground);
        // term ordering
        r.native("==", 2, bi_term_eq);
        r.native("\\==", 2, bi_term_ne);
        r.native("@<", 2, bi_term_lt);
        r.native("@>", 2, bi_term_gt);
        r.native("@=<", 2, bi_term_le);
        r.native("@>=", 2, bi_term_ge);
        r.native("compare", 3, bi_compare);
        // term construction and decomposition
        r.native("functor", 3, bi_functor);
        r.native("arg", 3, bi_arg);
        r.native("=..", 2, bi_univ);
        r.native("copy_term", 2, bi_copy_term);
        // arithmetic
        r.native("is", 2, bi_is);
        r.native("=:=", 2, bi_arith_eq);
        r.native("=\\=", 2, bi_arith_ne);
        r.native("<", 2, bi_arith_lt);
        r.native(">", 2, bi_arith_gt);
        r.native("=<", 2, bi_arith_le);
        r.native(">=", 2, bi_arith_ge);
        r.native("between", 3, bi_between);
        // atoms and codes
        r.native("atom_codes", 2, bi_atom_codes);
        r.native("atom_chars", 2, bi_atom_chars);
        r.native("char_code", 2, bi_char_code);
        r.native("atom_length", 2, bi_atom_length);
        r.native("atom_concat", 3, bi_atom_concat);
        r.native("number_codes", 2, bi_number_codes);
        // database
        r.native("assert", 1, bi_assertz);
        r.native("assertz", 1, bi_assertz);
        r.native("asserta", 1, bi_asserta);
        r.native("retract", 1, bi_retract);
        r.native("abolish", 1, bi_abolish);
        r.native("clause", 2, bi_clause);
        r.native("dynamic", 1, bi_dynamic);
        r.native("discontiguous", 1, bi_discontiguous);
        // all solutions
        r.native("findall", 3, bi_findall);
        r.native("forall", 2, bi_forall);
        r.native("bagof", 3, bi_bagof);
        r.native("setof", 3, bi_setof);
        // operators and flags
        r.native("op", 3, bi_op);
        r.native("current_op", 3, bi_current_op);
        r.native("set_prolog_flag", 2, bi_set_flag);
        r.native("current_prolog_flag", 2, bi_current_flag);
        r.native("char_conversion", 2, bi_char_conversion);
        // loading
        r.native("ensure_loaded", 1, bi_ensure_loaded);
        r.native("consult", 1, bi_ensure_loaded);
        r.native("initialization", 1, bi_initialization);
        // streams
        r.native("open", 3, bi_open3);
        r.native("open", 4, bi_open4);
        r.native("close", 1, bi_close);
        r.native("close", 2, bi_close);
        r.native("set_input", 1, bi_set_input);
        r.native("set_output", 1, bi_set_output);
        r.native("current_input", 1, bi_current_input);
        r.native("current_output", 1, bi_current_output);
        r.native("flush_output", 0, bi_flush0);
        r.native("flush_output", 1, bi_flush1);
        r.native("stream_position", 2, bi_stream_position);
        r.native("set_stream_position", 2, bi_set_stream_position);
        // character and byte i/o
        r.native("get_char", 1, bi_get_char1);
        r.native("get_char", 2, bi_get_char2);
        r.native("peek_char", 1, bi_peek_char1);
        r.native("peek_char", 2, bi_peek_char2);
        r.native("put_char", 1, bi_put_char1);
        r.native("put_char", 2, bi_put_char2);
        r.native("get_code", 1, bi_get_code1);
        r.native("get_code", 2, bi_get_code2);
        r.native("get_byte", 1, bi_get_byte1);
        r.native("get_byte", 2, bi_get_byte2);
        r.native("peek_byte", 1, bi_peek_byte1);
        r.native("peek_byte", 2, bi_peek_byte2);
        r.native("put_byte", 1, bi_put_byte1);
        r.native("put_byte", 2, bi_put_byte2);
        r.native("nl", 0, bi_nl0);
        r.native("nl", 1, bi_nl1);
        // term i/o
        r.native("read", 1, bi_read1);
        r.native("read", 2, bi_read2);
        r.native("read_term", 2, bi_read_term2);
        r.native("read_term", 3, bi_read_term3);
        r.native("write", 1, bi_write1);
        r.native("write", 2, bi_write2);
        r.native("writeq", 1, bi_writeq1);
        r.native("writeq", 2, bi_writeq2);
        r.native("write_canonical", 1, bi_write_canonical1);
        r.native("write_canonical", 2, bi_write_canonical2);
        r.native("write_term", 2, bi_write_term2);
        r.native("write_term", 3, bi_write_term3);
        r
    }
}

fn det(success: bool) -> Result<Resolved, PrologError> {
    Ok(if success { Resolved::True } else { Resolved::Fail })
}

// ---------------------------------------------------------------------------
// argument helpers

fn need_atom(t: &Term) -> Result<Atom, PrologError> {
    match t.deref() {
        Term::Var(_) => Err(PrologError::instantiation()),
        Term::Atom(a) => Ok(a),
        other => Err(PrologError::type_error("atom", other)),
    }
}

fn need_int(t: &Term) -> Result<BigInt, PrologError> {
    match t.deref() {
        Term::Var(_) => Err(PrologError::instantiation()),
        Term::Int(n) => Ok(n),
        other => Err(PrologError::type_error("integer", other)),
    }
}

fn need_callable(t: &Term) -> Result<(CompoundTag, Term), PrologError> {
    let t = t.deref();
    match &t {
        Term::Var(_) => Err(PrologError::instantiation()),
        Term::Atom(_) | Term::Compound(_) => {
            Ok((t.callable_tag().expect("callable"), t.clone()))
        }
        other => Err(PrologError::type_error("callable", other.clone())),
    }
}

/// One-character atom
fn need_char(t: &Term) -> Result<char, PrologError> {
    let a = need_atom(t)?;
    let mut chars = a.as_str().chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(c),
        _ => Err(PrologError::type_error("character", Term::Atom(a))),
    }
}

/// `Name/Arity` predicate indicator
fn need_indicator(t: &Term) -> Result<CompoundTag, PrologError> {
    let t = t.deref();
    match &t {
        Term::Var(_) => Err(PrologError::instantiation()),
        Term::Compound(c) if c.tag == tag("/", 2) => {
            let name = need_atom(&c.args[0])?;
            let arity = need_int(&c.args[1])?;
            let arity = arity
                .to_usize()
                .ok_or_else(|| PrologError::domain_error("not_less_than_zero", c.args[1].deref()))?;
            Ok(CompoundTag::new(name, arity))
        }
        other => Err(PrologError::type_error("predicate_indicator", other.clone())),
    }
}

// ---------------------------------------------------------------------------
// unification

fn bi_unify(interp: &mut Interpreter, args: &[Term]) -> Result<Resolved, PrologError> {
    det(interp.unify(&args[0], &args[1]))
}

fn bi_not_unifiable(interp: &mut Interpreter, args: &[Term]) -> Result<Resolved, PrologError> {
    let mark = interp.trail.mark();
    let unifies = interp.unify(&args[0], &args[1]);
    interp.trail.undo_to(mark);
    det(!unifies)
}

fn bi_unify_occurs(interp: &mut Interpreter, args: &[Term]) -> Result<Resolved, PrologError> {
    let ok = super::unify::unify_with_occurs_check(&mut interp.trail, &args[0], &args[1]);
    det(ok)
}

// ---------------------------------------------------------------------------
// type tests

fn bi_var(_: &mut Interpreter, args: &[Term]) -> Result<Resolved, PrologError> {
    det(matches!(args[0].deref(), Term::Var(_)))
}

fn bi_nonvar(_: &mut Interpreter, args: &[Term]) -> Result<Resolved, PrologError> {
    det(!matches!(args[0].deref(), Term::Var(_)))
}

fn bi_atom(_: &mut Interpreter, args: &[Term]) -> Result<Resolved, PrologError> {
    det(matches!(args[0].deref(), Term::Atom(_)))
}

fn bi_number(_: &mut Interpreter, args: &[Term]) -> Result<Resolved, PrologError> {
    det(args[0].deref().is_number())
}

fn bi_integer(_: &mut Interpreter, args: &[Term]) -> Result<Resolved, PrologError> {
    det(matches!(args[0].deref(), Term::Int(_)))
}

fn bi_float(_: &mut Interpreter, args: &[Term]) -> Result<Resolved, PrologError> {
    det(matches!(args[0].deref(), Term::Float(_)))
}

fn bi_atomic(_: &mut Interpreter, args: &[Term]) -> Result<Resolved, PrologError> {
    det(args[0].deref().is_atomic())
}

fn bi_compound(_: &mut Interpreter, args: &[Term]) -> Result<Resolved, PrologError> {
    det(matches!(args[0].deref(), Term::Compound(_)))
}

fn bi_callable(_: &mut Interpreter, args: &[Term]) -> Result<Resolved, PrologError> {
    det(args[0].deref().is_callable())
}

fn bi_is_list(_: &mut Interpreter, args: &[Term]) -> Result<Resolved, PrologError> {
    det(args[0].list_elements().is_some())
}

fn bi_ground(_: &mut Interpreter, args: &[Term]) -> Result<Resolved, PrologError> {
    det(args[0].is_ground())
}

// ---------------------------------------------------------------------------
// term ordering

fn bi_term_eq(_: &mut Interpreter, args: &[Term]) -> Result<Resolved, PrologError> {
    det(compare_terms(&args[0], &args[1]) == Ordering::Equal)
}

fn bi_term_ne(_: &mut Interpreter, args: &[Term]) -> Result<Resolved, PrologError> {
    det(compare_terms(&args[0], &args[1]) != Ordering::Equal)
}

fn bi_term_lt(_: &mut Interpreter, args: &[Term]) -> Result<Resolved, PrologError> {
    det(compare_terms(&args[0], &args[1]) == Ordering::Less)
}

fn bi_term_gt(_: &mut Interpreter, args: &[Term]) -> Result<Resolved, PrologError> {
    det(compare_terms(&args[0], &args[1]) == Ordering::Greater)
}

fn bi_term_le(_: &mut Interpreter, args: &[Term]) -> Result<Resolved, PrologError> {
    det(compare_terms(&args[0], &args[1]) != Ordering::Greater)
}

fn bi_term_ge(_: &mut Interpreter, args: &[Term]) -> Result<Resolved, PrologError> {
    det(compare_terms(&args[0], &args[1]) != Ordering::Less)
}

fn bi_compare(interp: &mut Interpreter, args: &[Term]) -> Result<Resolved, PrologError> {
    let order = args[0].deref();
    if let Term::Atom(a) = &order {
        if !matches!(a.as_str(), "<" | "=" | ">") {
            return Err(PrologError::domain_error("order", order.clone()));
        }
    } else if !matches!(order, Term::Var(_)) {
        return Err(PrologError::type_error("atom", order.clone()));
    }
    let result = match compare_terms(&args[1], &args[2]) {
        Ordering::Less => "<",
        Ordering::Equal => "=",
        Ordering::Greater => ">",
    };
    det(interp.unify(&args[0], &Term::atom(result)))
}

// ---------------------------------------------------------------------------
// term construction and decomposition

fn bi_functor(interp: &mut Interpreter, args: &[Term]) -> Result<Resolved, PrologError> {
    let t = args[0].deref();
    match &t {
        Term::Var(_) => {
            let arity = need_int(&args[2])?;
            if arity.is_negative() {
                return Err(PrologError::domain_error(
                    "not_less_than_zero",
                    args[2].deref(),
                ));
            }
            let arity = arity
                .to_usize()
                .ok_or_else(|| PrologError::representation_error("max_arity"))?;
            let name = args[1].deref();
            if matches!(name, Term::Var(_)) {
                return Err(PrologError::instantiation());
            }
            if arity == 0 {
                if !name.is_atomic() {
                    return Err(PrologError::type_error("atomic", name));
                }
                return det(interp.unify(&args[0], &name));
            }
            let name = match name {
                Term::Atom(a) => a,
                other => return Err(PrologError::type_error("atom", other)),
            };
            let fresh: Vec<Term> = (0..arity).map(|_| Term::var()).collect();
            let built = Term::compound_tagged(CompoundTag::new(name, arity), fresh);
            det(interp.unify(&args[0], &built))
        }
        Term::Compound(c) => {
            let ok = interp.unify(&args[1], &Term::Atom(c.tag.name))
                && interp.unify(&args[2], &Term::int(c.tag.arity as i64));
            det(ok)
        }
        atomic => {
            let ok = interp.unify(&args[1], atomic) && interp.unify(&args[2], &Term::int(0));
            det(ok)
        }
    }
}

fn bi_arg(interp: &mut Interpreter, args: &[Term]) -> Result<Resolved, PrologError> {
    let n = need_int(&args[0])?;
    let t = args[1].deref();
    let c = match &t {
        Term::Var(_) => return Err(PrologError::instantiation()),
        Term::Compound(c) => c,
        other => return Err(PrologError::type_error("compound", other.clone())),
    };
    match n.to_usize() {
        Some(i) if i >= 1 && i <= c.tag.arity => {
            // the selected argument is unified, not identity-compared
            det(interp.unify(&args[2], &c.args[i - 1]))
        }
        _ => det(false),
    }
}

fn bi_univ(interp: &mut Interpreter, args: &[Term]) -> Result<Resolved, PrologError> {
    let t = args[0].deref();
    match &t {
        Term::Var(_) => {
            let items = args[1].list_elements().ok_or_else(|| {
                if is_partial_list(&args[1]) {
                    PrologError::instantiation()
                } else {
                    PrologError::type_error("list", args[1].deref())
                }
            })?;
            let head = items
                .first()
                .ok_or_else(|| PrologError::domain_error("non_empty_list", args[1].deref()))?
                .deref();
            if items.len() == 1 {
                if !head.is_atomic() {
                    return Err(PrologError::type_error("atomic", head));
                }
                return det(interp.unify(&args[0], &head));
            }
            let name = match head {
                Term::Atom(a) => a,
                Term::Var(_) => return Err(PrologError::instantiation()),
                other => return Err(PrologError::type_error("atom", other)),
            };
            let built = Term::compound_tagged(
                CompoundTag::new(name, items.len() - 1),
                items[1..].to_vec(),
            );
            det(interp.unify(&args[0], &built))
        }
        Term::Compound(c) => {
            let mut items = vec![Term::Atom(c.tag.name)];
            items.extend(c.args.iter().cloned());
            det(interp.unify(&args[1], &Term::list(items)))
        }
        atomic => det(interp.unify(&args[1], &Term::list(vec![atomic.clone()]))),
    }
}

fn bi_copy_term(interp: &mut Interpreter, args: &[Term]) -> Result<Resolved, PrologError> {
    let copy = copy_term_fresh(&args[0]);
    det(interp.unify(&copy, &args[1]))
}

// ---------------------------------------------------------------------------
// arithmetic

fn bi_is(interp: &mut Interpreter, args: &[Term]) -> Result<Resolved, PrologError> {
    let value = eval(&args[1])?.into_term();
    det(interp.unify(&args[0], &value))
}

fn arith_compare(args: &[Term]) -> Result<Ordering, PrologError> {
    let a = eval(&args[0])?;
    let b = eval(&args[1])?;
    compare_numbers(&a, &b)
}

fn bi_arith_eq(_: &mut Interpreter, args: &[Term]) -> Result<Resolved, PrologError> {
    det(arith_compare(args)? == Ordering::Equal)
}

fn bi_arith_ne(_: &mut Interpreter, args: &[Term]) -> Result<Resolved, PrologError> {
    det(arith_compare(args)? != Ordering::Equal)
}

fn bi_arith_lt(_: &mut Interpreter, args: &[Term]) -> Result<Resolved, PrologError> {
    det(arith_compare(args)? == Ordering::Less)
}

fn bi_arith_gt(_: &mut Interpreter, args: &[Term]) -> Result<Resolved, PrologError> {
    det(arith_compare(args)? == Ordering::Greater)
}

fn bi_arith_le(_: &mut Interpreter, args: &[Term]) -> Result<Resolved, PrologError> {
    det(arith_compare(args)? != Ordering::Greater)
}

fn bi_arith_ge(_: &mut Interpreter, args: &[Term]) -> Result<Resolved, PrologError> {
    det(arith_compare(args)? != Ordering::Less)
}

struct BetweenChoices {
    next: BigInt,
    high: BigInt,
    out: Term,
}

impl Choices for BetweenChoices {
    fn retry(&mut self, interp: &mut Interpreter) -> Option<()> {
        while self.next <= self.high {
            let candidate = Term::Int(self.next.clone());
            self.next += 1;
            let mark = interp.trail.mark();
            if interp.unify(&self.out, &candidate) {
                return Some(());
            }
            interp.trail.undo_to(mark);
        }
        None
    }
}

fn bi_between(_: &mut Interpreter, args: &[Term]) -> Result<Resolved, PrologError> {
    let low = need_int(&args[0])?;
    let high = need_int(&args[1])?;
    match args[2].deref() {
        Term::Int(x) => det(low <= x && x <= high),
        Term::Var(_) => Ok(Resolved::Redo(Box::new(BetweenChoices {
            next: low,
            high,
            out: args[2].clone(),
        }))),
        other => Err(PrologError::type_error("integer", other)),
    }
}

// ---------------------------------------------------------------------------
// atoms and codes

fn codes_to_string(t: &Term) -> Result<String, PrologError> {
    let items = t.list_elements().ok_or_else(|| match t.deref() {
        Term::Var(_) => PrologError::instantiation(),
        other => PrologError::type_error("list", other),
    })?;
    let mut s = String::new();
    for item in items {
        let code = need_int(&item)?;
        let c = code
            .to_u32()
            .and_then(char::from_u32)
            .ok_or_else(|| PrologError::representation_error("character_code"))?;
        s.push(c);
    }
    Ok(s)
}

fn chars_to_string(t: &Term) -> Result<String, PrologError> {
    let items = t.list_elements().ok_or_else(|| match t.deref() {
        Term::Var(_) => PrologError::instantiation(),
        other => PrologError::type_error("list", other),
    })?;
    let mut s = String::new();
    for item in items {
        s.push(need_char(&item)?);
    }
    Ok(s)
}

fn string_to_codes(s: &str) -> Term {
    Term::list(s.chars().map(|c| Term::Int(BigInt::from(c as u32))).collect())
}

fn string_to_chars(s: &str) -> Term {
    Term::list(s.chars().map(|c| Term::atom(&c.to_string())).collect())
}

fn bi_atom_codes(interp: &mut Interpreter, args: &[Term]) -> Result<Resolved, PrologError> {
    match args[0].deref() {
        Term::Var(_) => {
            let s = codes_to_string(&args[1])?;
            det(interp.unify(&args[0], &Term::atom(&s)))
        }
        Term::Atom(a) => det(interp.unify(&args[1], &string_to_codes(a.as_str()))),
        other => Err(PrologError::type_error("atom", other)),
    }
}

fn bi_atom_chars(interp: &mut Interpreter, args: &[Term]) -> Result<Resolved, PrologError> {
    match args[0].deref() {
        Term::Var(_) => {
            let s = chars_to_string(&args[1])?;
            det(interp.unify(&args[0], &Term::atom(&s)))
        }
        Term::Atom(a) => det(interp.unify(&args[1], &string_to_chars(a.as_str()))),
        other => Err(PrologError::type_error("atom", other)),
    }
}

fn bi_char_code(interp: &mut Interpreter, args: &[Term]) -> Result<Resolved, PrologError> {
    match args[0].deref() {
        Term::Var(_) => {
            let code = need_int(&args[1])?;
            let c = code
                .to_u32()
                .and_then(char::from_u32)
                .ok_or_else(|| PrologError::representation_error("character_code"))?;
            det(interp.unify(&args[0], &Term::atom(&c.to_string())))
        }
        _ => {
            let c = need_char(&args[0])?;
            det(interp.unify(&args[1], &Term::Int(BigInt::from(c as u32))))
        }
    }
}

fn bi_atom_length(interp: &mut Interpreter, args: &[Term]) -> Result<Resolved, PrologError> {
    let a = need_atom(&args[0])?;
    let len = a.as_str().chars().count();
    det(interp.unify(&args[1], &Term::int(len as i64)))
}

struct AtomConcatChoices {
    whole: Vec<char>,
    split_at: usize,
    left: Term,
    right: Term,
}

impl Choices for AtomConcatChoices {
    fn retry(&mut self, interp: &mut Interpreter) -> Option<()> {
        while self.split_at <= self.whole.len() {
            let at = self.split_at;
            self.split_at += 1;
            let a: String = self.whole[..at].iter().collect();
            let b: String = self.whole[at..].iter().collect();
            let mark = interp.trail.mark();
            if interp.unify(&self.left, &Term::atom(&a))
                && interp.unify(&self.right, &Term::atom(&b))
            {
                return Some(());
            }
            interp.trail.undo_to(mark);
        }
        None
    }
}

fn bi_atom_concat(interp: &mut Interpreter, args: &[Term]) -> Result<Resolved, PrologError> {
    let a = args[0].deref();
    let b = args[1].deref();
    if !matches!(a, Term::Var(_)) && !matches!(b, Term::Var(_)) {
        let joined = format!("{}{}", need_atom(&a)?, need_atom(&b)?);
        return det(interp.unify(&args[2], &Term::atom(&joined)));
    }
    // enumeration mode needs the whole atom
    let whole = need_atom(&args[2])?;
    Ok(Resolved::Redo(Box::new(AtomConcatChoices {
        whole: whole.as_str().chars().collect(),
        split_at: 0,
        left: args[0].clone(),
        right: args[1].clone(),
    })))
}

fn bi_number_codes(interp: &mut Interpreter, args: &[Term]) -> Result<Resolved, PrologError> {
    match args[0].deref() {
        n if n.is_number() => det(interp.unify(&args[1], &string_to_codes(&n.to_string()))),
        Term::Var(_) => {
            let text = codes_to_string(&args[1])?;
            let parsed = crate::reader::parse_term(
                interp.environment(),
                &format!("{} .", text),
            )
            .map_err(|e| e.into_prolog_error())?;
            let value = parsed.term.deref();
            if !value.is_number() {
                return Err(PrologError::syntax_error("illegal_number"));
            }
            det(interp.unify(&args[0], &value))
        }
        other => Err(PrologError::type_error("number", other)),
    }
}

// ---------------------------------------------------------------------------
// database

fn assert_impl(
    interp: &mut Interpreter,
    args: &[Term],
    front: bool,
) -> Result<Resolved, PrologError> {
    // the stored clause is a frozen copy of the argument
    let clause = Clause::from_term(&copy_term_fresh(&args[0]))?;
    interp
        .environment()
        .database()
        .assert_clause(clause, front, false)?;
    Ok(Resolved::True)
}

fn bi_assertz(interp: &mut Interpreter, args: &[Term]) -> Result<Resolved, PrologError> {
    assert_impl(interp, args, false)
}

fn bi_asserta(interp: &mut Interpreter, args: &[Term]) -> Result<Resolved, PrologError> {
    assert_impl(interp, args, true)
}

struct RetractChoices {
    tag: CompoundTag,
    remaining: VecDeque<Arc<Clause>>,
    head: Term,
    body: Term,
}

impl Choices for RetractChoices {
    fn retry(&mut self, interp: &mut Interpreter) -> Option<()> {
        while let Some(record) = self.remaining.pop_front() {
            let mark = interp.trail.mark();
            let (h, b) = record.rename();
            if interp.unify(&self.head, &h) && interp.unify(&self.body, &b) {
                // logical update view: removing an already-removed record
                // still counts as this retract's success
                interp
                    .environment()
                    .database()
                    .remove_clause(self.tag, &record);
                return Some(());
            }
            interp.trail.undo_to(mark);
        }
        None
    }
}

fn split_clause_pattern(t: &Term) -> Result<(Term, Term), PrologError> {
    let t = t.deref();
    match &t {
        Term::Compound(c) if c.tag == tag(":-", 2) => {
            Ok((c.args[0].clone(), c.args[1].clone()))
        }
        _ => Ok((t.clone(), Term::atom("true"))),
    }
}

fn bi_retract(interp: &mut Interpreter, args: &[Term]) -> Result<Resolved, PrologError> {
    let (head, body) = split_clause_pattern(&args[0])?;
    let (key, _) = need_callable(&head)?;
    let db = interp.environment().database();
    db.require_dynamic(key, "modify")?;
    let remaining: VecDeque<Arc<Clause>> = match db.predicate(key) {
        Some(pred) => pred.snapshot().into(),
        None => VecDeque::new(),
    };
    Ok(Resolved::Redo(Box::new(RetractChoices {
        tag: key,
        remaining,
        head,
        body,
    })))
}

fn bi_abolish(interp: &mut Interpreter, args: &[Term]) -> Result<Resolved, PrologError> {
    let key = need_indicator(&args[0])?;
    interp.environment().database().abolish(key)?;
    Ok(Resolved::True)
}

struct ClauseChoices {
    remaining: VecDeque<Arc<Clause>>,
    head: Term,
    body: Term,
}

impl Choices for ClauseChoices {
    fn retry(&mut self, interp: &mut Interpreter) -> Option<()> {
        while let Some(record) = self.remaining.pop_front() {
            let mark = interp.trail.mark();
            let (h, b) = record.rename();
            if interp.unify(&self.head, &h) && interp.unify(&self.body, &b) {
                return Some(());
            }
            interp.trail.undo_to(mark);
        }
        None
    }
}

fn bi_clause(interp: &mut Interpreter, args: &[Term]) -> Result<Resolved, PrologError> {
    let (key, head) = need_callable(&args[0])?;
    let body = args[1].deref();
    if !matches!(body, Term::Var(_)) && !body.is_callable() {
        return Err(PrologError::type_error("callable", body.clone()));
    }
    let db = interp.environment().database();
    db.require_dynamic(key, "access")?;
    let remaining: VecDeque<Arc<Clause>> = match db.predicate(key) {
        Some(pred) => {
            let first_arg = match &head {
                Term::Compound(c) => Some(c.args[0].clone()),
                _ => None,
            };
            pred.snapshot_for(first_arg.as_ref()).into()
        }
        None => VecDeque::new(),
    };
    Ok(Resolved::Redo(Box::new(ClauseChoices {
        remaining,
        head,
        body: args[1].clone(),
    })))
}

/// Collect predicate indicators from `PI`, `(PI, PI)` or a list of PIs
fn indicators_of(t: &Term) -> Result<Vec<CompoundTag>, PrologError> {
    let t = t.deref();
    if let Term::Compound(c) = &t {
        if c.tag == tag(",", 2) {
            let mut out = indicators_of(&c.args[0])?;
            out.extend(indicators_of(&c.args[1])?);
            return Ok(out);
        }
    }
    if let Some(items) = t.list_elements() {
        let mut out = Vec::new();
        for item in items {
            out.push(need_indicator(&item)?);
        }
        return Ok(out);
    }
    Ok(vec![need_indicator(&t)?])
}

fn bi_dynamic(interp: &mut Interpreter, args: &[Term]) -> Result<Resolved, PrologError> {
    for key in indicators_of(&args[0])? {
        interp.environment().database().declare_dynamic(key);
    }
    Ok(Resolved::True)
}

fn bi_discontiguous(interp: &mut Interpreter, args: &[Term]) -> Result<Resolved, PrologError> {
    for key in indicators_of(&args[0])? {
        interp.environment().database().declare_discontiguous(key);
    }
    Ok(Resolved::True)
}

// ---------------------------------------------------------------------------
// all solutions

/// Run a goal to exhaustion, collecting a copy of `template` per solution
fn collect_solutions(
    interp: &mut Interpreter,
    goal: &Term,
    template: &Term,
) -> Result<Result<Vec<Term>, i32>, PrologError> {
    let mut query = interp.prepare(goal.clone());
    let mut items = Vec::new();
    loop {
        match interp.solve(&mut query) {
            Outcome::Success => items.push(copy_term_fresh(template)),
            Outcome::SuccessLast => {
                items.push(copy_term_fresh(template));
                break;
            }
            Outcome::Fail => break,
            Outcome::Halt(code) => return Ok(Err(code)),
            Outcome::Exception(ball) => {
                interp.stop(&mut query);
                // inner errors propagate out, they are not absorbed
                return Err(PrologError::from_ball(ball));
            }
        }
    }
    interp.stop(&mut query);
    Ok(Ok(items))
}

fn bi_findall(interp: &mut Interpreter, args: &[Term]) -> Result<Resolved, PrologError> {
    let result = args[2].deref();
    if !matches!(result, Term::Var(_)) && result.list_elements().is_none() {
        // partial lists are fine as output patterns; reject non-lists
        if !is_partial_list(&result) {
            return Err(PrologError::type_error("list", result));
        }
    }
    match collect_solutions(interp, &args[1], &args[0])? {
        Err(code) => Ok(Resolved::Halt(code)),
        Ok(items) => det(interp.unify(&args[2], &Term::list(items))),
    }
}

fn is_partial_list(t: &Term) -> bool {
    let mut t = t.deref();
    loop {
        match t {
            Term::Var(_) => return true,
            Term::Atom(a) if a == "[]" => return true,
            Term::Compound(ref c) if c.tag == tag(".", 2) => t = c.args[1].deref(),
            _ => return false,
        }
    }
}

fn bi_forall(interp: &mut Interpreter, args: &[Term]) -> Result<Resolved, PrologError> {
    // forall(C, A) holds when C, \+ A has no solution
    let probe = Term::compound(
        ",",
        vec![
            args[0].clone(),
            Term::compound("\\+", vec![args[1].clone()]),
        ],
    );
    match collect_solutions(interp, &probe, &Term::atom("true"))? {
        Err(code) => Ok(Resolved::Halt(code)),
        Ok(items) => det(items.is_empty()),
    }
}

/// Strip `V ^ Goal` wrappers, keeping the existentially bound terms
fn strip_carets(goal: &Term) -> (Vec<Term>, Term) {
    let mut bound = Vec::new();
    let mut g = goal.deref();
    loop {
        match &g {
            Term::Compound(c) if c.tag == tag("^", 2) => {
                bound.push(c.args[0].clone());
                let next = c.args[1].deref();
                g = next;
            }
            _ => return (bound, g),
        }
    }
}

struct GroupChoices {
    groups: VecDeque<(Term, Vec<Term>)>,
    witness: Term,
    bag: Term,
}

impl Choices for GroupChoices {
    fn retry(&mut self, interp: &mut Interpreter) -> Option<()> {
        while let Some((key, items)) = self.groups.pop_front() {
            let mark = interp.trail.mark();
            if interp.unify(&self.witness, &key)
                && interp.unify(&self.bag, &Term::list(items))
            {
                return Some(());
            }
            interp.trail.undo_to(mark);
        }
        None
    }
}

fn solutions_grouped(
    interp: &mut Interpreter,
    args: &[Term],
    sort_sets: bool,
) -> Result<Resolved, PrologError> {
    let (bound, goal) = strip_carets(&args[1]);
    // free variables: in the goal but in neither the template nor a ^ binder
    let mut excluded: Vec<u64> = args[0].variables().iter().map(|v| v.id).collect();
    for b in &bound {
        excluded.extend(b.variables().iter().map(|v| v.id));
    }
    let free: Vec<Term> = goal
        .variables()
        .into_iter()
        .filter(|v| !excluded.contains(&v.id))
        .map(Term::Var)
        .collect();

    if free.is_empty() {
        let items = match collect_solutions(interp, &goal, &args[0])? {
            Err(code) => return Ok(Resolved::Halt(code)),
            Ok(items) => items,
        };
        if items.is_empty() {
            return det(false);
        }
        let items = if sort_sets {
            sort_unique(items)
        } else {
            items
        };
        return det(interp.unify(&args[2], &Term::list(items)));
    }

    let witness = Term::compound("$witness", free.clone());
    let pair = Term::compound("-", vec![witness.clone(), args[0].clone()]);
    let pairs = match collect_solutions(interp, &goal, &pair)? {
        Err(code) => return Ok(Resolved::Halt(code)),
        Ok(items) => items,
    };
    if pairs.is_empty() {
        return det(false);
    }

    // group by witness value, in order of first occurrence
    let mut groups: Vec<(Term, Vec<Term>)> = Vec::new();
    for p in pairs {
        let (w, t) = match p.deref() {
            Term::Compound(c) => (c.args[0].clone(), c.args[1].clone()),
            _ => unreachable!("pair shape"),
        };
        match groups
            .iter_mut()
            .find(|(k, _)| compare_terms(k, &w) == Ordering::Equal)
        {
            Some((_, items)) => items.push(t),
            None => groups.push((w, vec![t])),
        }
    }
    if sort_sets {
        groups.sort_by(|a, b| compare_terms(&a.0, &b.0));
        for (_, items) in groups.iter_mut() {
            let sorted = sort_unique(std::mem::take(items));
            *items = sorted;
        }
    }
    Ok(Resolved::Redo(Box::new(GroupChoices {
        groups: groups.into(),
        witness,
        bag: args[2].clone(),
    })))
}

fn sort_unique(mut items: Vec<Term>) -> Vec<Term> {
    items.sort_by(compare_terms);
    items.dedup_by(|a, b| compare_terms(a, b) == Ordering::Equal);
    items
}

fn bi_bagof(interp: &mut Interpreter, args: &[Term]) -> Result<Resolved, PrologError> {
    solutions_grouped(interp, args, false)
}

fn bi_setof(interp: &mut Interpreter, args: &[Term]) -> Result<Resolved, PrologError> {
    solutions_grouped(interp, args, true)
}

// ---------------------------------------------------------------------------
// operators, flags, conversions

fn bi_op(interp: &mut Interpreter, args: &[Term]) -> Result<Resolved, PrologError> {
    let priority = need_int(&args[0])?
        .to_i64()
        .ok_or_else(|| PrologError::domain_error("operator_priority", args[0].deref()))?;
    let type_atom = need_atom(&args[1])?;
    let typ = OpType::from_atom(type_atom).ok_or_else(|| {
        PrologError::domain_error("operator_specifier", Term::Atom(type_atom))
    })?;
    let names: Vec<Atom> = match args[2].deref() {
        Term::Atom(a) => vec![a],
        ref t => match t.list_elements() {
            Some(items) => {
                let mut out = Vec::new();
                for item in items {
                    out.push(need_atom(&item)?);
                }
                out
            }
            None => return Err(PrologError::type_error("atom", t.clone())),
        },
    };
    for name in names {
        interp
            .environment()
            .with_operators_mut(|ops| ops.declare(priority, typ, name))?;
    }
    Ok(Resolved::True)
}

struct TripleChoices {
    triples: VecDeque<(Term, Term, Term)>,
    out: (Term, Term, Term),
}

impl Choices for TripleChoices {
    fn retry(&mut self, interp: &mut Interpreter) -> Option<()> {
        while let Some((a, b, c)) = self.triples.pop_front() {
            let mark = interp.trail.mark();
            if interp.unify(&self.out.0, &a)
                && interp.unify(&self.out.1, &b)
                && interp.unify(&self.out.2, &c)
            {
                return Some(());
            }
            interp.trail.undo_to(mark);
        }
        None
    }
}

fn bi_current_op(interp: &mut Interpreter, args: &[Term]) -> Result<Resolved, PrologError> {
    let triples: VecDeque<(Term, Term, Term)> = interp
        .environment()
        .operator_snapshot()
        .iter()
        .into_iter()
        .map(|(priority, typ, name)| {
            (
                Term::int(priority as i64),
                Term::atom(typ.as_str()),
                Term::Atom(name),
            )
        })
        .collect();
    Ok(Resolved::Redo(Box::new(TripleChoices {
        triples,
        out: (args[0].clone(), args[1].clone(), args[2].clone()),
    })))
}

fn bi_set_flag(interp: &mut Interpreter, args: &[Term]) -> Result<Resolved, PrologError> {
    interp.environment().set_flag(&args[0], &args[1])?;
    Ok(Resolved::True)
}

struct PairChoices {
    pairs: VecDeque<(Term, Term)>,
    out: (Term, Term),
}

impl Choices for PairChoices {
    fn retry(&mut self, interp: &mut Interpreter) -> Option<()> {
        while let Some((a, b)) = self.pairs.pop_front() {
            let mark = interp.trail.mark();
            if interp.unify(&self.out.0, &a) && interp.unify(&self.out.1, &b) {
                return Some(());
            }
            interp.trail.undo_to(mark);
        }
        None
    }
}

fn bi_current_flag(interp: &mut Interpreter, args: &[Term]) -> Result<Resolved, PrologError> {
    let pairs: VecDeque<(Term, Term)> = interp.environment().flag_pairs().into();
    Ok(Resolved::Redo(Box::new(PairChoices {
        pairs,
        out: (args[0].clone(), args[1].clone()),
    })))
}

fn bi_char_conversion(interp: &mut Interpreter, args: &[Term]) -> Result<Resolved, PrologError> {
    let from = need_char(&args[0])?;
    let to = need_char(&args[1])?;
    interp.environment().set_char_conversion(from, to);
    Ok(Resolved::True)
}

fn bi_ensure_loaded(interp: &mut Interpreter, args: &[Term]) -> Result<Resolved, PrologError> {
    let path = need_atom(&args[0])?;
    super::loader::ensure_loaded(interp.environment(), path.as_str())?;
    Ok(Resolved::True)
}

fn bi_initialization(interp: &mut Interpreter, args: &[Term]) -> Result<Resolved, PrologError> {
    let (_, goal) = need_callable(&args[0])?;
    interp.environment().queue_initialization(goal);
    Ok(Resolved::True)
}

// ---------------------------------------------------------------------------
// streams

fn resolve_stream(
    interp: &Interpreter,
    t: &Term,
) -> Result<Arc<Mutex<PrologStream>>, PrologError> {
    interp.environment().streams().resolve(t)
}

fn current_input(interp: &Interpreter) -> Arc<Mutex<PrologStream>> {
    interp.environment().streams().current_input()
}

fn current_output(interp: &Interpreter) -> Arc<Mutex<PrologStream>> {
    interp.environment().streams().current_output()
}

fn stream_options(
    t: &Term,
) -> Result<(StreamType, EofAction, Vec<Atom>), PrologError> {
    let mut typ = StreamType::Text;
    let mut eof_action = EofAction::EofCode;
    let mut aliases = Vec::new();
    let items = t
        .list_elements()
        .ok_or_else(|| PrologError::type_error("list", t.deref()))?;
    for opt in items {
        let opt = opt.deref();
        match &opt {
            Term::Compound(c) if c.tag == tag("type", 1) => {
                match need_atom(&c.args[0])?.as_str() {
                    "text" => typ = StreamType::Text,
                    "binary" => typ = StreamType::Binary,
                    _ => return Err(PrologError::domain_error("stream_option", opt.clone())),
                }
            }
            Term::Compound(c) if c.tag == tag("alias", 1) => {
                aliases.push(need_atom(&c.args[0])?);
            }
            Term::Compound(c) if c.tag == tag("eof_action", 1) => {
                match need_atom(&c.args[0])?.as_str() {
                    "error" => eof_action = EofAction::Error,
                    "eof_code" => eof_action = EofAction::EofCode,
                    "reset" => eof_action = EofAction::Reset,
                    _ => return Err(PrologError::domain_error("stream_option", opt.clone())),
                }
            }
            Term::Compound(c) if c.tag == tag("reposition", 1) => {
                // reposition defaults by stream type; accepted and ignored
                need_atom(&c.args[0])?;
            }
            Term::Var(_) => return Err(PrologError::instantiation()),
            other => {
                return Err(PrologError::domain_error("stream_option", other.clone()))
            }
        }
    }
    Ok((typ, eof_action, aliases))
}

fn open_impl(
    interp: &mut Interpreter,
    args: &[Term],
    options: Option<&Term>,
) -> Result<Resolved, PrologError> {
    let path = need_atom(&args[0])?;
    let mode = match need_atom(&args[1])?.as_str() {
        "read" => StreamMode::Read,
        "write" => StreamMode::Write,
        "append" => StreamMode::Append,
        _ => {
            return Err(PrologError::domain_error("io_mode", args[1].deref()));
        }
    };
    let (typ, eof_action, aliases) = match options {
        Some(t) => stream_options(t)?,
        None => (StreamType::Text, EofAction::EofCode, Vec::new()),
    };
    let handle = interp.environment().streams().open_file(
        std::path::Path::new(path.as_str()),
        mode,
        typ,
        eof_action,
        aliases,
    )?;
    det(interp.unify(&args[2], &handle))
}

fn bi_open3(interp: &mut Interpreter, args: &[Term]) -> Result<Resolved, PrologError> {
    open_impl(interp, args, None)
}

fn bi_open4(interp: &mut Interpreter, args: &[Term]) -> Result<Resolved, PrologError> {
    let opts = args[3].clone();
    open_impl(interp, &args[..3], Some(&opts))
}

fn bi_close(interp: &mut Interpreter, args: &[Term]) -> Result<Resolved, PrologError> {
    interp.environment().streams().close(&args[0])?;
    Ok(Resolved::True)
}

fn bi_set_input(interp: &mut Interpreter, args: &[Term]) -> Result<Resolved, PrologError> {
    interp.environment().streams().set_current_input(&args[0])?;
    Ok(Resolved::True)
}

fn bi_set_output(interp: &mut Interpreter, args: &[Term]) -> Result<Resolved, PrologError> {
    interp.environment().streams().set_current_output(&args[0])?;
    Ok(Resolved::True)
}

fn bi_current_input(interp: &mut Interpreter, args: &[Term]) -> Result<Resolved, PrologError> {
    let handle = current_input(interp).lock().handle_term();
    det(interp.unify(&args[0], &handle))
}

fn bi_current_output(interp: &mut Interpreter, args: &[Term]) -> Result<Resolved, PrologError> {
    let handle = current_output(interp).lock().handle_term();
    det(interp.unify(&args[0], &handle))
}

fn bi_flush0(interp: &mut Interpreter, _args: &[Term]) -> Result<Resolved, PrologError> {
    current_output(interp).lock().flush()?;
    Ok(Resolved::True)
}

fn bi_flush1(interp: &mut Interpreter, args: &[Term]) -> Result<Resolved, PrologError> {
    resolve_stream(interp, &args[0])?.lock().flush()?;
    Ok(Resolved::True)
}

fn bi_stream_position(interp: &mut Interpreter, args: &[Term]) -> Result<Resolved, PrologError> {
    let pos = resolve_stream(interp, &args[0])?.lock().position();
    det(interp.unify(&args[1], &Term::int(pos as i64)))
}

fn bi_set_stream_position(
    interp: &mut Interpreter,
    args: &[Term],
) -> Result<Resolved, PrologError> {
    let stream = resolve_stream(interp, &args[0])?;
    let pos = need_int(&args[1])?
        .to_u64()
        .ok_or_else(|| PrologError::domain_error("stream_position", args[1].deref()))?;
    stream.lock().set_position(pos)?;
    Ok(Resolved::True)
}

fn end_of_file() -> Term {
    Term::atom("end_of_file")
}

fn char_result(interp: &mut Interpreter, out: &Term, c: Option<char>) -> Result<Resolved, PrologError> {
    let value = match c {
        Some(c) => Term::atom(&c.to_string()),
        None => end_of_file(),
    };
    det(interp.unify(out, &value))
}

fn code_result(interp: &mut Interpreter, out: &Term, c: Option<char>) -> Result<Resolved, PrologError> {
    let value = match c {
        Some(c) => Term::Int(BigInt::from(c as u32)),
        None => Term::int(-1),
    };
    det(interp.unify(out, &value))
}

fn bi_get_char1(interp: &mut Interpreter, args: &[Term]) -> Result<Resolved, PrologError> {
    let c = current_input(interp).lock().get_char()?;
    char_result(interp, &args[0], c)
}

fn bi_get_char2(interp: &mut Interpreter, args: &[Term]) -> Result<Resolved, PrologError> {
    let c = resolve_stream(interp, &args[0])?.lock().get_char()?;
    char_result(interp, &args[1], c)
}

fn bi_peek_char1(interp: &mut Interpreter, args: &[Term]) -> Result<Resolved, PrologError> {
    let c = current_input(interp).lock().peek_char()?;
    char_result(interp, &args[0], c)
}

fn bi_peek_char2(interp: &mut Interpreter, args: &[Term]) -> Result<Resolved, PrologError> {
    let c = resolve_stream(interp, &args[0])?.lock().peek_char()?;
    char_result(interp, &args[1], c)
}

fn bi_put_char1(interp: &mut Interpreter, args: &[Term]) -> Result<Resolved, PrologError> {
    let c = need_char(&args[0])?;
    current_output(interp).lock().put_char(c)?;
    Ok(Resolved::True)
}

fn bi_put_char2(interp: &mut Interpreter, args: &[Term]) -> Result<Resolved, PrologError> {
    let c = need_char(&args[1])?;
    resolve_stream(interp, &args[0])?.lock().put_char(c)?;
    Ok(Resolved::True)
}

fn bi_get_code1(interp: &mut Interpreter, args: &[Term]) -> Result<Resolved, PrologError> {
    let c = current_input(interp).lock().get_char()?;
    code_result(interp, &args[0], c)
}

fn bi_get_code2(interp: &mut Interpreter, args: &[Term]) -> Result<Resolved, PrologError> {
    let c = resolve_stream(interp, &args[0])?.lock().get_char()?;
    code_result(interp, &args[1], c)
}

fn byte_result(interp: &mut Interpreter, out: &Term, b: Option<u8>) -> Result<Resolved, PrologError> {
    let value = match b {
        Some(b) => Term::int(b as i64),
        None => Term::int(-1),
    };
    det(interp.unify(out, &value))
}

fn bi_get_byte1(interp: &mut Interpreter, args: &[Term]) -> Result<Resolved, PrologError> {
    let b = current_input(interp).lock().get_byte()?;
    byte_result(interp, &args[0], b)
}

fn bi_get_byte2(interp: &mut Interpreter, args: &[Term]) -> Result<Resolved, PrologError> {
    let b = resolve_stream(interp, &args[0])?.lock().get_byte()?;
    byte_result(interp, &args[1], b)
}

fn bi_peek_byte1(interp: &mut Interpreter, args: &[Term]) -> Result<Resolved, PrologError> {
    let b = current_input(interp).lock().peek_byte()?;
    byte_result(interp, &args[0], b)
}

fn bi_peek_byte2(interp: &mut Interpreter, args: &[Term]) -> Result<Resolved, PrologError> {
    let b = resolve_stream(interp, &args[0])?.lock().peek_byte()?;
    byte_result(interp, &args[1], b)
}

fn need_byte(t: &Term) -> Result<u8, PrologError> {
    let n = need_int(t)?;
    n.to_u8()
        .ok_or_else(|| PrologError::type_error("byte", t.deref()))
}

fn bi_put_byte1(interp: &mut Interpreter, args: &[Term]) -> Result<Resolved, PrologError> {
    let b = need_byte(&args[0])?;
    current_output(interp).lock().put_byte(b)?;
    Ok(Resolved::True)
}

fn bi_put_byte2(interp: &mut Interpreter, args: &[Term]) -> Result<Resolved, PrologError> {
    let b = need_byte(&args[1])?;
    resolve_stream(interp, &args[0])?.lock().put_byte(b)?;
    Ok(Resolved::True)
}

fn bi_nl0(interp: &mut Interpreter, _args: &[Term]) -> Result<Resolved, PrologError> {
    current_output(interp).lock().put_char('\n')?;
    Ok(Resolved::True)
}

fn bi_nl1(interp: &mut Interpreter, args: &[Term]) -> Result<Resolved, PrologError> {
    resolve_stream(interp, &args[0])?.lock().put_char('\n')?;
    Ok(Resolved::True)
}

// ---------------------------------------------------------------------------
// term i/o

/// read_term options: variable_names(Pairs) and variables(Vars) are
/// honored, the rest are accepted and ignored
fn apply_read_options(
    interp: &mut Interpreter,
    options: &Term,
    result: &crate::reader::ReadResult,
) -> Result<bool, PrologError> {
    let items = options
        .list_elements()
        .ok_or_else(|| PrologError::type_error("list", options.deref()))?;
    for opt in items {
        let opt = opt.deref();
        match &opt {
            Term::Compound(c) if c.tag == tag("variable_names", 1) => {
                let pairs: Vec<Term> = result
                    .variables
                    .iter()
                    .map(|(name, var)| {
                        Term::compound("=", vec![Term::atom(name), var.clone()])
                    })
                    .collect();
                if !interp.unify(&c.args[0], &Term::list(pairs)) {
                    return Ok(false);
                }
            }
            Term::Compound(c) if c.tag == tag("variables", 1) => {
                let vars: Vec<Term> =
                    result.term.variables().into_iter().map(Term::Var).collect();
                if !interp.unify(&c.args[0], &Term::list(vars)) {
                    return Ok(false);
                }
            }
            Term::Compound(_) => {}
            Term::Var(_) => return Err(PrologError::instantiation()),
            other => return Err(PrologError::domain_error("read_option", other.clone())),
        }
    }
    Ok(true)
}

fn read_impl(
    interp: &mut Interpreter,
    stream: Arc<Mutex<PrologStream>>,
    out: &Term,
    options: Option<&Term>,
) -> Result<Resolved, PrologError> {
    let env = interp.environment().clone();
    let mut terms = TermStream::<StreamSource>::from_stream(&env, stream);
    match terms.next_term() {
        Ok(Some(result)) => {
            if let Some(options) = options {
                if !apply_read_options(interp, options, &result)? {
                    return det(false);
                }
            }
            det(interp.unify(out, &result.term))
        }
        Ok(None) => det(interp.unify(out, &end_of_file())),
        Err(e) => Err(e.into_prolog_error()),
    }
}

fn bi_read1(interp: &mut Interpreter, args: &[Term]) -> Result<Resolved, PrologError> {
    let stream = current_input(interp);
    read_impl(interp, stream, &args[0], None)
}

fn bi_read2(interp: &mut Interpreter, args: &[Term]) -> Result<Resolved, PrologError> {
    let stream = resolve_stream(interp, &args[0])?;
    read_impl(interp, stream, &args[1], None)
}

fn bi_read_term2(interp: &mut Interpreter, args: &[Term]) -> Result<Resolved, PrologError> {
    let stream = current_input(interp);
    read_impl(interp, stream, &args[0], Some(&args[1]))
}

fn bi_read_term3(interp: &mut Interpreter, args: &[Term]) -> Result<Resolved, PrologError> {
    let stream = resolve_stream(interp, &args[0])?;
    read_impl(interp, stream, &args[1], Some(&args[2]))
}

fn write_impl(
    interp: &mut Interpreter,
    stream: Arc<Mutex<PrologStream>>,
    term: &Term,
    opts: WriteOptions,
) -> Result<Resolved, PrologError> {
    let text = term_to_string(interp.environment(), term, opts);
    stream.lock().put_str(&text)?;
    Ok(Resolved::True)
}

fn bi_write1(interp: &mut Interpreter, args: &[Term]) -> Result<Resolved, PrologError> {
    let stream = current_output(interp);
    write_impl(interp, stream, &args[0], WriteOptions::plain())
}

fn bi_write2(interp: &mut Interpreter, args: &[Term]) -> Result<Resolved, PrologError> {
    let stream = resolve_stream(interp, &args[0])?;
    write_impl(interp, stream, &args[1], WriteOptions::plain())
}

fn bi_writeq1(interp: &mut Interpreter, args: &[Term]) -> Result<Resolved, PrologError> {
    let stream = current_output(interp);
    write_impl(interp, stream, &args[0], WriteOptions::quoted())
}

fn bi_writeq2(interp: &mut Interpreter, args: &[Term]) -> Result<Resolved, PrologError> {
    let stream = resolve_stream(interp, &args[0])?;
    write_impl(interp, stream, &args[1], WriteOptions::quoted())
}

fn bi_write_canonical1(interp: &mut Interpreter, args: &[Term]) -> Result<Resolved, PrologError> {
    let stream = current_output(interp);
    write_impl(interp, stream, &args[0], WriteOptions::canonical())
}

fn bi_write_canonical2(interp: &mut Interpreter, args: &[Term]) -> Result<Resolved, PrologError> {
    let stream = resolve_stream(interp, &args[0])?;
    write_impl(interp, stream, &args[1], WriteOptions::canonical())
}

fn write_options_from(t: &Term) -> Result<WriteOptions, PrologError> {
    let mut opts = WriteOptions {
        quoted: false,
        ignore_ops: false,
        numbervars: false,
    };
    let items = t
        .list_elements()
        .ok_or_else(|| PrologError::type_error("list", t.deref()))?;
    for opt in items {
        let opt = opt.deref();
        let c = match &opt {
            Term::Compound(c) if c.tag.arity == 1 => c,
            Term::Var(_) => return Err(PrologError::instantiation()),
            other => return Err(PrologError::domain_error("write_option", other.clone())),
        };
        let enabled = match c.args[0].deref() {
            Term::Atom(a) if a == "true" => true,
            Term::Atom(a) if a == "false" => false,
            other => return Err(PrologError::domain_error("write_option", other)),
        };
        match c.tag.name.as_str() {
            "quoted" => opts.quoted = enabled,
            "ignore_ops" => opts.ignore_ops = enabled,
            "numbervars" => opts.numbervars = enabled,
            _ => return Err(PrologError::domain_error("write_option", opt.clone())),
        }
    }
    Ok(opts)
}

fn bi_write_term2(interp: &mut Interpreter, args: &[Term]) -> Result<Resolved, PrologError> {
    let opts = write_options_from(&args[1])?;
    let stream = current_output(interp);
    write_impl(interp, stream, &args[0], opts)
}

fn bi_write_term3(interp: &mut Interpreter, args: &[Term]) -> Result<Resolved, PrologError> {
    let opts = write_options_from(&args[2])?;
    let stream = resolve_stream(interp, &args[0])?;
    write_impl(interp, stream, &args[1], opts)
}

