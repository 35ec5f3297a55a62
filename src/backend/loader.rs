//! Source loading: consult a stream of terms, execute directives, install
//! clauses, queue initialization goals.
//!
//! Loading is resilient: parse failures and directive faults become
//! structured `LoadRecord` entries on the environment and loading continues
//! with the next term. `ensure_loaded` resolves and dedupes sources, so a
//! second load of the same resolved file is a no-op. Initialization goals
//! (`:- initialization(G)`) are queued and run only when the outermost load
//! returns, so a file's goals see every clause of every file it pulls in.

use std::fs;
use std::path::PathBuf;
use std::sync::atomic::Ordering as AtomicOrdering;

use tracing::{debug, warn};

use super::database::Clause;
use super::environment::{Environment, LoadRecord};
use super::error::PrologError;
use super::machine::Outcome;
use super::symbol::tag;
use super::term::Term;
use crate::reader::TermStream;

/// Load a file, idempotently. The path is resolved to its canonical form
/// for deduplication; a `.pl` extension is tried when the bare path does
/// not exist.
pub fn ensure_loaded(env: &Environment, source: &str) -> Result<(), PrologError> {
    let mut path = PathBuf::from(source);
    if !path.exists() && path.extension().is_none() {
        path.set_extension("pl");
    }
    let resolved = path
        .canonicalize()
        .map_err(|_| PrologError::existence_error("source_sink", Term::atom(source)))?;
    {
        let mut loaded = env.state.loaded_sources.lock();
        if !loaded.insert(resolved.clone()) {
            debug!(source, "already loaded");
            return Ok(());
        }
    }
    let text = fs::read_to_string(&resolved)
        .map_err(|_| PrologError::existence_error("source_sink", Term::atom(source)))?;
    debug!(source, bytes = text.len(), "loading");
    load_named(env, &text, source)
}

/// Load program text directly (consult from a string)
pub fn load_text(env: &Environment, text: &str) -> Result<(), PrologError> {
    load_named(env, text, "user")
}

fn load_named(env: &Environment, text: &str, source_id: &str) -> Result<(), PrologError> {
    env.state.load_depth.fetch_add(1, AtomicOrdering::SeqCst);
    let result = load_buffer(env, text, source_id);
    let prev = env.state.load_depth.fetch_sub(1, AtomicOrdering::SeqCst);
    if prev == 1 {
        env.run_initialization()?;
    }
    result
}

fn load_buffer(env: &Environment, text: &str, source_id: &str) -> Result<(), PrologError> {
    let mut terms = TermStream::from_text(env, text);
    loop {
        let line = terms.line();
        match terms.next_term() {
            Ok(None) => return Ok(()),
            Ok(Some(result)) => {
                if install_term(env, result.term, source_id, terms.line()) {
                    // halt during a directive stops the load
                    return Ok(());
                }
            }
            Err(e) => {
                warn!(source = source_id, line = e.line, error = %e, "parse error");
                env.record_load_error(LoadRecord {
                    source: source_id.to_string(),
                    line: if e.line > 0 { e.line } else { line },
                    reason: e.message.clone(),
                });
                terms.recover();
            }
        }
    }
}

/// Returns true when loading should stop (halt was executed)
fn install_term(env: &Environment, term: Term, source_id: &str, line: usize) -> bool {
    // directives are `:- Goal`
    if let Term::Compound(c) = &term {
        if c.tag == tag(":-", 1) {
            return run_directive(env, c.args[0].clone(), source_id, line);
        }
    }
    match Clause::from_term(&term) {
        Ok(clause) => {
            let key = clause.tag();
            if env.builtins().contains(key) {
                env.record_load_error(LoadRecord {
                    source: source_id.to_string(),
                    line,
                    reason: format!("redefinition of built-in {}", key),
                });
                return false;
            }
            if let Err(e) = env.database().assert_clause(clause, false, true) {
                env.record_load_error(LoadRecord {
                    source: source_id.to_string(),
                    line,
                    reason: e.to_string(),
                });
            }
        }
        Err(e) => {
            env.record_load_error(LoadRecord {
                source: source_id.to_string(),
                line,
                reason: e.to_string(),
            });
        }
    }
    false
}

fn run_directive(env: &Environment, goal: Term, source_id: &str, line: usize) -> bool {
    debug!(source = source_id, line, goal = %goal, "directive");
    let mut interp = env.create_interpreter();
    let mut query = interp.prepare(goal.clone());
    match interp.solve(&mut query) {
        Outcome::Success | Outcome::SuccessLast => false,
        Outcome::Fail => {
            env.record_load_error(LoadRecord {
                source: source_id.to_string(),
                line,
                reason: format!("directive failed: {}", goal),
            });
            false
        }
        Outcome::Exception(ball) => {
            env.record_load_error(LoadRecord {
                source: source_id.to_string(),
                line,
                reason: format!("directive raised {}", ball),
            });
            false
        }
        Outcome::Halt(code) => {
            debug!(code, "halt during load");
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::machine::Outcome;

    fn solve_once(env: &Environment, goal_text: &str) -> Outcome {
        let r = crate::reader::parse_term(env, goal_text).unwrap();
        let mut interp = env.create_interpreter();
        let mut q = interp.prepare(r.term);
        interp.solve(&mut q)
    }

    #[test]
    fn test_load_text_installs_clauses() {
        let env = Environment::new();
        load_text(&env, "parent(tom, bob). parent(bob, ann).").unwrap();
        assert!(matches!(
            solve_once(&env, "parent(tom, bob)."),
            Outcome::SuccessLast
        ));
        assert!(matches!(solve_once(&env, "parent(tom, ann)."), Outcome::Fail));
    }

    #[test]
    fn test_directives_run_in_order() {
        let env = Environment::new();
        load_text(
            &env,
            ":- op(700, xfx, likes).\nmary likes wine.\n",
        )
        .unwrap();
        assert!(matches!(
            solve_once(&env, "likes(mary, wine)."),
            Outcome::SuccessLast
        ));
    }

    #[test]
    fn test_load_continues_past_errors() {
        let env = Environment::new();
        load_text(&env, "good(1).\nbad(] .\ngood(2).").unwrap();
        let errors = env.load_errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].line, 2);
        assert!(matches!(solve_once(&env, "good(2)."), Outcome::SuccessLast));
    }

    #[test]
    fn test_failed_directive_is_recorded() {
        let env = Environment::new();
        load_text(&env, ":- fail.\nok.").unwrap();
        let errors = env.load_errors();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].reason.contains("directive failed"));
        assert!(matches!(solve_once(&env, "ok."), Outcome::SuccessLast));
    }

    #[test]
    fn test_initialization_runs_after_load() {
        let env = Environment::new();
        load_text(
            &env,
            ":- dynamic(seen/1).\n:- initialization(assertz(seen(marker))).\nplain.\n",
        )
        .unwrap();
        assert!(matches!(
            solve_once(&env, "seen(marker)."),
            Outcome::SuccessLast
        ));
    }

    #[test]
    fn test_dynamic_directive_permits_runtime_mutation() {
        let env = Environment::new();
        load_text(&env, ":- dynamic(counter/1).\ncounter(0).").unwrap();
        assert!(matches!(
            solve_once(&env, "assertz(counter(1))."),
            Outcome::SuccessLast
        ));
        // a static predicate installed by the loader rejects mutation
        load_text(&env, "frozen(a).").unwrap();
        match solve_once(&env, "assertz(frozen(b)).") {
            Outcome::Exception(ball) => {
                assert!(format!("{}", ball).contains("permission_error"))
            }
            other => panic!("expected permission error, got {:?}", other),
        }
    }

    #[test]
    fn test_ensure_loaded_is_idempotent() {
        let env = Environment::new();
        let dir = std::env::temp_dir();
        let path = dir.join(format!("prologtron_load_test_{}.pl", std::process::id()));
        fs::write(&path, ":- dynamic(tick/0).\n:- assertz(tick).\n").unwrap();
        let path_str = path.display().to_string();
        ensure_loaded(&env, &path_str).unwrap();
        ensure_loaded(&env, &path_str).unwrap();
        // loaded once: exactly one tick clause
        let key = tag("tick", 0);
        let pred = env.database().predicate(key).unwrap();
        assert_eq!(pred.clause_count(), 1);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_missing_file_is_existence_error() {
        let env = Environment::new();
        let err = ensure_loaded(&env, "/no/such/file/hopefully").unwrap_err();
        assert!(format!("{}", err).contains("existence_error"));
    }
}
