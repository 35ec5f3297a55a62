//! The evaluation engine: term model, unification, clause database,
//! interpreter, arithmetic, streams and loader.

pub mod arith;
pub mod builtins;
pub mod database;
pub mod environment;
pub mod error;
pub mod loader;
pub mod machine;
pub mod operators;
pub mod streams;
pub mod symbol;
pub mod term;
pub mod trail;
pub mod unify;

pub use environment::{Environment, Flags, LoadRecord};
pub use error::PrologError;
pub use loader::{ensure_loaded, load_text};
pub use machine::{Interpreter, Outcome, Port, Query, Resolved, Tracer};
pub use symbol::{atom, tag, Atom, CompoundTag};
pub use term::Term;
pub use unify::{unify, unify_with_occurs_check};
