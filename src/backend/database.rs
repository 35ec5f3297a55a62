//! The clause database: per-predicate clause lists with dynamic/static
//! flags and a lazy first-argument index.
//!
//! Each predicate is an independent unit behind its own read/write lock.
//! Clause lookup clones the `Arc` clause list, which is the logical-update
//! view: clauses asserted after a lookup are invisible to it, and retracted
//! clauses stay visible to snapshots that were taken before the retract.
//!
//! The first-argument index maps the principal functor of the first clause
//! argument to the sublist of clauses that can match it; clauses whose first
//! argument is a variable belong to every bucket. The index is dropped on
//! every mutation and rebuilt lazily on the next indexed lookup.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::debug;

use super::error::{indicator, PrologError};
use super::symbol::CompoundTag;
use super::term::{copy_term, Term};

/// A stored clause: head plus body (`true` for facts)
#[derive(Debug)]
pub struct Clause {
    pub head: Term,
    pub body: Term,
}

impl Clause {
    /// Split a source term into head and body, validating the head
    pub fn from_term(t: &Term) -> Result<Clause, PrologError> {
        let t = t.deref();
        let (head, body) = match &t {
            Term::Compound(c) if c.tag.name == ":-" && c.tag.arity == 2 => {
                (c.args[0].deref(), c.args[1].deref())
            }
            _ => (t.clone(), Term::atom("true")),
        };
        match &head {
            Term::Var(_) => return Err(PrologError::instantiation()),
            Term::Atom(_) | Term::Compound(_) => {}
            _ => return Err(PrologError::type_error("callable", head.clone())),
        }
        match &body {
            Term::Int(_) | Term::Float(_) | Term::Decimal(_) | Term::Handle(_) => {
                return Err(PrologError::type_error("callable", body.clone()))
            }
            _ => {}
        }
        Ok(Clause { head, body })
    }

    pub fn tag(&self) -> CompoundTag {
        self.head.callable_tag().expect("validated head")
    }

    /// The `Head :- Body` term, or just the head for facts
    pub fn to_term(&self) -> Term {
        if self.body.is_atom("true") {
            self.head.clone()
        } else {
            Term::compound(":-", vec![self.head.clone(), self.body.clone()])
        }
    }

    /// Copy head and body with all variables renamed to fresh ones,
    /// preserving sharing between them
    pub fn rename(&self) -> (Term, Term) {
        let mut map = HashMap::new();
        let head = copy_term(&self.head, &mut map);
        let body = copy_term(&self.body, &mut map);
        (head, body)
    }
}

/// Principal-functor key of a first argument, for indexing
#[derive(Clone, Copy, Eq, PartialEq, Hash, Debug)]
enum IndexKey {
    Atom(super::symbol::Atom),
    Tag(CompoundTag),
    Int,
    Float,
    Decimal,
    Handle,
}

fn index_key(t: &Term) -> Option<IndexKey> {
    match t.deref() {
        Term::Var(_) => None,
        Term::Atom(a) => Some(IndexKey::Atom(a)),
        Term::Compound(c) => Some(IndexKey::Tag(c.tag)),
        Term::Int(_) => Some(IndexKey::Int),
        Term::Float(_) => Some(IndexKey::Float),
        Term::Decimal(_) => Some(IndexKey::Decimal),
        Term::Handle(_) => Some(IndexKey::Handle),
    }
}

struct FirstArgIndex {
    buckets: HashMap<IndexKey, Vec<Arc<Clause>>>,
    /// Clauses whose first argument is a variable, used when the call's
    /// key has no bucket of its own
    var_first: Vec<Arc<Clause>>,
}

fn build_index(clauses: &[Arc<Clause>]) -> FirstArgIndex {
    let mut buckets: HashMap<IndexKey, Vec<Arc<Clause>>> = HashMap::new();
    // Pre-create one bucket per distinct key so variable-headed clauses
    // land in every bucket in clause order
    for clause in clauses {
        if let Term::Compound(c) = &clause.head {
            if let Some(key) = index_key(&c.args[0]) {
                buckets.entry(key).or_default();
            }
        }
    }
    let mut var_first = Vec::new();
    for clause in clauses {
        let first = match &clause.head {
            Term::Compound(c) => &c.args[0],
            _ => continue,
        };
        match index_key(first) {
            Some(key) => buckets
                .get_mut(&key)
                .expect("bucket pre-created")
                .push(Arc::clone(clause)),
            None => {
                for bucket in buckets.values_mut() {
                    bucket.push(Arc::clone(clause));
                }
                var_first.push(Arc::clone(clause));
            }
        }
    }
    FirstArgIndex { buckets, var_first }
}

struct PredState {
    clauses: Vec<Arc<Clause>>,
    dynamic: bool,
    discontiguous: bool,
    public: bool,
    index: Option<FirstArgIndex>,
}

/// One user predicate: clause list, flags and lazy index behind one lock
pub struct Predicate {
    pub tag: CompoundTag,
    state: RwLock<PredState>,
}

impl Predicate {
    fn new(tag: CompoundTag, dynamic: bool) -> Self {
        Predicate {
            tag,
            state: RwLock::new(PredState {
                clauses: Vec::new(),
                dynamic,
                discontiguous: false,
                public: false,
                index: None,
            }),
        }
    }

    pub fn is_dynamic(&self) -> bool {
        self.state.read().dynamic
    }

    pub fn is_discontiguous(&self) -> bool {
        self.state.read().discontiguous
    }

    pub fn is_public(&self) -> bool {
        self.state.read().public
    }

    pub fn clause_count(&self) -> usize {
        self.state.read().clauses.len()
    }

    /// Stable snapshot of the full clause list (logical-update view)
    pub fn snapshot(&self) -> Vec<Arc<Clause>> {
        self.state.read().clauses.clone()
    }

    /// Snapshot filtered through the first-argument index. A variable call
    /// argument selects every clause.
    pub fn snapshot_for(&self, first_arg: Option<&Term>) -> Vec<Arc<Clause>> {
        let key = first_arg.and_then(index_key);
        let key = match key {
            Some(k) => k,
            None => return self.snapshot(),
        };
        {
            let state = self.state.read();
            if let Some(index) = &state.index {
                return match index.buckets.get(&key) {
                    Some(bucket) => bucket.clone(),
                    None => index.var_first.clone(),
                };
            }
        }
        let mut state = self.state.write();
        if state.index.is_none() {
            state.index = Some(build_index(&state.clauses));
        }
        let index = state.index.as_ref().expect("just built");
        match index.buckets.get(&key) {
            Some(bucket) => bucket.clone(),
            None => index.var_first.clone(),
        }
    }
}

/// The single (user-module) predicate map
#[derive(Default)]
pub struct Database {
    predicates: DashMap<CompoundTag, Arc<Predicate>>,
}

impl Database {
    pub fn new() -> Self {
        Database::default()
    }

    pub fn predicate(&self, tag: CompoundTag) -> Option<Arc<Predicate>> {
        self.predicates.get(&tag).map(|p| Arc::clone(&p))
    }

    fn predicate_or_create(&self, tag: CompoundTag, dynamic: bool) -> Arc<Predicate> {
        Arc::clone(
            &self
                .predicates
                .entry(tag)
                .or_insert_with(|| Arc::new(Predicate::new(tag, dynamic))),
        )
    }

    /// Mark a predicate dynamic, creating it empty when missing
    pub fn declare_dynamic(&self, tag: CompoundTag) {
        let pred = self.predicate_or_create(tag, true);
        pred.state.write().dynamic = true;
    }

    pub fn declare_discontiguous(&self, tag: CompoundTag) {
        let pred = self.predicate_or_create(tag, false);
        pred.state.write().discontiguous = true;
    }

    pub fn declare_public(&self, tag: CompoundTag) {
        let pred = self.predicate_or_create(tag, false);
        pred.state.write().public = true;
    }

    /// Install a clause at the front (asserta) or back (assertz).
    ///
    /// `from_source` marks loader installs: those may extend static
    /// predicates, while runtime asserts require the predicate to be
    /// dynamic (creating a fresh dynamic predicate when missing).
    pub fn assert_clause(
        &self,
        clause: Clause,
        front: bool,
        from_source: bool,
    ) -> Result<(), PrologError> {
        let tag = clause.tag();
        let pred = self.predicate_or_create(tag, !from_source);
        let mut state = pred.state.write();
        if !from_source && !state.dynamic {
            return Err(PrologError::permission_error(
                "modify",
                "static_procedure",
                indicator(tag),
            ));
        }
        debug!(predicate = %tag, front, "assert");
        let record = Arc::new(clause);
        if front {
            state.clauses.insert(0, record);
        } else {
            state.clauses.push(record);
        }
        state.index = None;
        Ok(())
    }

    /// Remove one specific clause record (identified by pointer identity).
    /// Returns false when the record was already removed.
    pub fn remove_clause(&self, tag: CompoundTag, record: &Arc<Clause>) -> bool {
        let pred = match self.predicate(tag) {
            Some(p) => p,
            None => return false,
        };
        let mut state = pred.state.write();
        let before = state.clauses.len();
        state.clauses.retain(|c| !Arc::ptr_eq(c, record));
        if state.clauses.len() != before {
            state.index = None;
            true
        } else {
            false
        }
    }

    /// Remove the predicate entirely. Only dynamic predicates may be
    /// abolished.
    pub fn abolish(&self, tag: CompoundTag) -> Result<(), PrologError> {
        if let Some(pred) = self.predicate(tag) {
            if !pred.is_dynamic() {
                return Err(PrologError::permission_error(
                    "modify",
                    "static_procedure",
                    indicator(tag),
                ));
            }
            self.predicates.remove(&tag);
            debug!(predicate = %tag, "abolish");
        }
        Ok(())
    }

    /// Guard used by clause/2 and retract/1: inspecting or mutating clauses
    /// of a non-dynamic predicate is a permission error.
    pub fn require_dynamic(&self, tag: CompoundTag, operation: &str) -> Result<(), PrologError> {
        if let Some(pred) = self.predicate(tag) {
            if !pred.is_dynamic() {
                return Err(PrologError::permission_error(
                    operation,
                    if operation == "access" {
                        "private_procedure"
                    } else {
                        "static_procedure"
                    },
                    indicator(tag),
                ));
            }
        }
        Ok(())
    }
}
