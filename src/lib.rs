/// PrologTron - ISO Prolog Evaluator Library
///
/// This library provides an embeddable Prolog (ISO Part 1) evaluator core:
/// first-class logical variables with sharing, sound unification with a
/// trail-based undo log, an explicit choice-point machine for
/// backtracking, a clause database with first-argument indexing, ISO
/// arithmetic, and a reader/writer pair driven by a user-mutable operator
/// table.
///
/// # Architecture
///
/// The pipeline consists of two main layers:
///
/// 1. **Reading & Writing** (`reader`, `writer` modules)
///    - Tokenizes source text with line/column tracking
///    - Parses via operator precedence over the live operator table
///    - Returns the variable-name map alongside each term
///    - Writes terms back with precedence-minimal parenthesization
///
/// 2. **Engine** (`backend` module)
///    - Terms, atoms interned for O(1) identity comparison
///    - Work-list unification recording bindings on the trail
///    - Goal-stack interpreter with explicit choice points, cut barriers
///      and goal-stack catch frames
///    - Clause database with logical-update snapshots
///    - Strict arithmetic over integers, floats and decimals
///    - Loader executing directives and collecting load errors
///
/// # Example
///
/// ```rust
/// use prologtron::backend::{load_text, Environment, Outcome};
/// use prologtron::reader::parse_term;
/// use prologtron::writer::{term_to_string, WriteOptions};
///
/// let env = Environment::new();
/// load_text(&env, "
///     append([], L, L).
///     append([H|T], L, [H|R]) :- append(T, L, R).
/// ").unwrap();
///
/// let mut interp = env.create_interpreter();
/// let goal = parse_term(&env, "append([1,2], [3,4], X).").unwrap();
/// let mut query = interp.prepare(goal.term);
///
/// // first-argument indexing makes this deterministic
/// assert_eq!(interp.solve(&mut query), Outcome::SuccessLast);
/// let (name, x) = &goal.variables[0];
/// assert_eq!(name, "X");
/// assert_eq!(term_to_string(&env, x, WriteOptions::plain()), "[1,2,3,4]");
/// ```
///
/// # Execution Model
///
/// - **Queries**: `prepare` then repeated `solve` calls enumerate
///   solutions; outcomes are Success, SuccessLast, Fail, Halt and
///   Exception carrying the uncaught ball term
/// - **Backtracking**: failure pops the newest choice point, unwinds the
///   trail to its mark and resumes the saved continuation
/// - **Sharing**: one `Environment` (atoms, operators, clauses, streams)
///   serves any number of interpreters; trails and bindings stay private
pub mod backend;
pub mod reader;
pub mod writer;

pub use backend::{
    ensure_loaded, load_text, Environment, Interpreter, Outcome, PrologError, Query, Term,
};
pub use reader::{parse_program, parse_term, ReadError, ReadResult};
pub use writer::{term_to_string, WriteOptions};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_and_query() {
        let env = Environment::new();
        load_text(&env, "double(X, Y) :- Y is X * 2.").unwrap();
        let mut interp = env.create_interpreter();
        let goal = parse_term(&env, "double(21, R).").unwrap();
        let mut q = interp.prepare(goal.term);
        assert_eq!(interp.solve(&mut q), Outcome::SuccessLast);
        assert_eq!(goal.variables[0].1.deref(), Term::int(42));
    }

    #[test]
    fn test_solutions_are_enumerated() {
        let env = Environment::new();
        load_text(&env, "color(red). color(green). color(blue).").unwrap();
        let mut interp = env.create_interpreter();
        let goal = parse_term(&env, "color(C).").unwrap();
        let mut q = interp.prepare(goal.term);
        let mut seen = Vec::new();
        loop {
            match interp.solve(&mut q) {
                Outcome::Success | Outcome::SuccessLast => {
                    seen.push(format!("{}", goal.variables[0].1.deref()));
                    if q.is_finished() {
                        break;
                    }
                }
                Outcome::Fail => break,
                other => panic!("unexpected outcome {:?}", other),
            }
        }
        assert_eq!(seen, vec!["red", "green", "blue"]);
    }

    #[test]
    fn test_invalid_syntax_reports_position() {
        let env = Environment::new();
        let err = parse_term(&env, "f(1,).").unwrap_err();
        assert_eq!(err.line, 1);
    }
}
