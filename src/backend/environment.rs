//! The shared environment: atom-backed operator table, flag map, clause
//! database, foreign-predicate registry, stream table, loading-error list
//! and character-conversion table.
//!
//! An `Environment` is a cheap clone handle over one shared state, the way
//! several interpreters attach to one program. Interpreter-private state
//! (trail, choice points, bindings) lives in `machine::Interpreter`.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::AtomicUsize;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use super::builtins::BuiltinRegistry;
use super::database::Database;
use super::error::PrologError;
use super::machine::Interpreter;
use super::operators::OperatorTable;
use super::streams::StreamTable;
use super::term::Term;

/// Behavior when a called procedure does not exist
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum UnknownAction {
    Error,
    Fail,
}

/// Interpretation of double-quoted tokens
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum DoubleQuotes {
    Codes,
    Chars,
    Atom,
}

/// The Prolog flag map. `bounded` is read-only and always false: integers
/// are arbitrary precision.
#[derive(Clone, Debug)]
pub struct Flags {
    pub double_quotes: DoubleQuotes,
    pub unknown: UnknownAction,
    pub char_conversion: bool,
}

impl Default for Flags {
    fn default() -> Self {
        Flags {
            double_quotes: DoubleQuotes::Codes,
            unknown: UnknownAction::Error,
            char_conversion: false,
        }
    }
}

/// A structured record of one parse/load failure, collected during
/// `ensure_loaded` instead of aborting the load
#[derive(Clone, Debug)]
pub struct LoadRecord {
    pub source: String,
    pub line: usize,
    pub reason: String,
}

pub(crate) struct EnvState {
    pub operators: RwLock<OperatorTable>,
    pub flags: RwLock<Flags>,
    pub database: Database,
    pub builtins: BuiltinRegistry,
    pub streams: StreamTable,
    pub load_errors: Mutex<Vec<LoadRecord>>,
    pub loaded_sources: Mutex<HashSet<PathBuf>>,
    /// Nesting depth of ensure_loaded; initialization goals run when the
    /// outermost load returns
    pub load_depth: AtomicUsize,
    pub init_goals: Mutex<Vec<Term>>,
    pub char_conversion: RwLock<HashMap<char, char>>,
}

/// Process-wide shared state; clone handles freely
#[derive(Clone)]
pub struct Environment {
    pub(crate) state: Arc<EnvState>,
}

impl Environment {
    pub fn new() -> Self {
        Environment {
            state: Arc::new(EnvState {
                operators: RwLock::new(OperatorTable::with_iso_defaults()),
                flags: RwLock::new(Flags::default()),
                database: Database::new(),
                builtins: BuiltinRegistry::with_standard_predicates(),
                streams: StreamTable::new(),
                load_errors: Mutex::new(Vec::new()),
                loaded_sources: Mutex::new(HashSet::new()),
                load_depth: AtomicUsize::new(0),
                init_goals: Mutex::new(Vec::new()),
                char_conversion: RwLock::new(HashMap::new()),
            }),
        }
    }

    pub fn create_interpreter(&self) -> Interpreter {
        Interpreter::new(self.clone())
    }

    pub fn database(&self) -> &Database {
        &self.state.database
    }

    pub fn builtins(&self) -> &BuiltinRegistry {
        &self.state.builtins
    }

    pub fn streams(&self) -> &StreamTable {
        &self.state.streams
    }

    /// Snapshot of the operator table for one parse or write
    pub fn operator_snapshot(&self) -> OperatorTable {
        self.state.operators.read().clone()
    }

    pub fn with_operators_mut<R>(&self, f: impl FnOnce(&mut OperatorTable) -> R) -> R {
        f(&mut self.state.operators.write())
    }

    pub fn flags(&self) -> Flags {
        self.state.flags.read().clone()
    }

    pub fn unknown_action(&self) -> UnknownAction {
        self.state.flags.read().unknown
    }

    pub fn double_quotes(&self) -> DoubleQuotes {
        self.state.flags.read().double_quotes
    }

    /// Apply set_prolog_flag/2. Unknown flags are domain errors; read-only
    /// flags raise permission errors.
    pub fn set_flag(&self, name: &Term, value: &Term) -> Result<(), PrologError> {
        let name = name.deref();
        let value = value.deref();
        let flag_atom = match &name {
            Term::Var(_) => return Err(PrologError::instantiation()),
            Term::Atom(a) => *a,
            other => return Err(PrologError::type_error("atom", other.clone())),
        };
        if matches!(value, Term::Var(_)) {
            return Err(PrologError::instantiation());
        }
        let mut flags = self.state.flags.write();
        match flag_atom.as_str() {
            "double_quotes" => {
                flags.double_quotes = match atom_name(&value)? {
                    "codes" => DoubleQuotes::Codes,
                    "chars" => DoubleQuotes::Chars,
                    "atom" => DoubleQuotes::Atom,
                    _ => return Err(flag_value_error(&name, &value)),
                }
            }
            "unknown" => {
                flags.unknown = match atom_name(&value)? {
                    "error" => UnknownAction::Error,
                    "fail" => UnknownAction::Fail,
                    _ => return Err(flag_value_error(&name, &value)),
                }
            }
            "char_conversion" => {
                flags.char_conversion = match atom_name(&value)? {
                    "on" => true,
                    "off" => false,
                    _ => return Err(flag_value_error(&name, &value)),
                }
            }
            "bounded" | "max_integer" | "min_integer" => {
                return Err(PrologError::permission_error(
                    "modify",
                    "flag",
                    name.clone(),
                ))
            }
            _ => {
                return Err(PrologError::domain_error("prolog_flag", name.clone()));
            }
        }
        Ok(())
    }

    /// Current flag values as (name, value) terms, for current_prolog_flag/2
    pub fn flag_pairs(&self) -> Vec<(Term, Term)> {
        let flags = self.state.flags.read();
        vec![
            (Term::atom("bounded"), Term::atom("false")),
            (
                Term::atom("double_quotes"),
                Term::atom(match flags.double_quotes {
                    DoubleQuotes::Codes => "codes",
                    DoubleQuotes::Chars => "chars",
                    DoubleQuotes::Atom => "atom",
                }),
            ),
            (
                Term::atom("unknown"),
                Term::atom(match flags.unknown {
                    UnknownAction::Error => "error",
                    UnknownAction::Fail => "fail",
                }),
            ),
            (
                Term::atom("char_conversion"),
                Term::atom(if flags.char_conversion { "on" } else { "off" }),
            ),
        ]
    }

    /// Install a char_conversion/2 mapping; identical characters remove
    /// the entry
    pub fn set_char_conversion(&self, from: char, to: char) {
        let mut table = self.state.char_conversion.write();
        if from == to {
            table.remove(&from);
        } else {
            table.insert(from, to);
        }
    }

    /// The conversion applied by the tokenizer when the flag is on
    pub fn convert_char(&self, c: char) -> char {
        if !self.state.flags.read().char_conversion {
            return c;
        }
        *self.state.char_conversion.read().get(&c).unwrap_or(&c)
    }

    pub fn record_load_error(&self, record: LoadRecord) {
        self.state.load_errors.lock().push(record);
    }

    /// Errors collected by loads so far
    pub fn load_errors(&self) -> Vec<LoadRecord> {
        self.state.load_errors.lock().clone()
    }

    pub fn queue_initialization(&self, goal: Term) {
        self.state.init_goals.lock().push(goal);
    }

    /// Run queued initialization goals on a fresh interpreter. Called by the
    /// loader when the outermost ensure_loaded returns, or by embedders.
    pub fn run_initialization(&self) -> Result<(), PrologError> {
        loop {
            let goal = {
                let mut queue = self.state.init_goals.lock();
                if queue.is_empty() {
                    return Ok(());
                }
                queue.remove(0)
            };
            let mut interp = self.create_interpreter();
            let mut query = interp.prepare(goal);
            match interp.solve(&mut query) {
                super::machine::Outcome::Exception(ball) => {
                    return Err(PrologError::from_ball(ball))
                }
                _ => continue,
            }
        }
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

fn atom_name(t: &Term) -> Result<&'static str, PrologError> {
    match t {
        Term::Atom(a) => Ok(a.as_str()),
        other => Err(PrologError::type_error("atom", other.clone())),
    }
}

fn flag_value_error(name: &Term, value: &Term) -> PrologError {
    PrologError::domain_error(
        "flag_value",
        Term::compound("+", vec![name.clone(), value.clone()]),
    )
}
