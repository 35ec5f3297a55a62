//! Shared helpers for the integration suites: load a program, drive a
//! query to exhaustion, and render each solution's bindings.

use prologtron::backend::{load_text, Environment, Outcome};
use prologtron::reader::parse_term;
use prologtron::writer::{term_to_string, WriteOptions};

/// Fresh environment with the given program consulted
pub fn env_with(program: &str) -> Environment {
    let env = Environment::new();
    load_text(&env, program).unwrap();
    assert!(
        env.load_errors().is_empty(),
        "test program loaded with errors: {:?}",
        env.load_errors()
    );
    env
}

/// The result of driving one query to its end
#[derive(Debug)]
pub struct Run {
    /// One entry per solution: "X = v, Y = w", or "true" for ground goals
    pub solutions: Vec<String>,
    /// "success_last", "fail", "halt:N" or "exception:<ball>"
    pub terminal: String,
}

impl Run {
    #[allow(dead_code)]
    pub fn exception(&self) -> Option<&str> {
        self.terminal.strip_prefix("exception:")
    }
}

fn render(env: &Environment, variables: &[(String, prologtron::Term)]) -> String {
    if variables.is_empty() {
        return "true".to_string();
    }
    variables
        .iter()
        .map(|(name, value)| {
            format!(
                "{} = {}",
                name,
                term_to_string(env, value, WriteOptions::quoted())
            )
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Enumerate every solution of `goal` (given as source text ending in `.`)
pub fn run(env: &Environment, goal: &str) -> Run {
    let parsed = parse_term(env, goal).expect("goal parses");
    let mut interp = env.create_interpreter();
    let mut query = interp.prepare(parsed.term);
    let mut solutions = Vec::new();
    loop {
        match interp.solve(&mut query) {
            Outcome::Success => solutions.push(render(env, &parsed.variables)),
            Outcome::SuccessLast => {
                solutions.push(render(env, &parsed.variables));
                return Run {
                    solutions,
                    terminal: "success_last".to_string(),
                };
            }
            Outcome::Fail => {
                return Run {
                    solutions,
                    terminal: "fail".to_string(),
                }
            }
            Outcome::Halt(code) => {
                return Run {
                    solutions,
                    terminal: format!("halt:{}", code),
                }
            }
            Outcome::Exception(ball) => {
                return Run {
                    solutions,
                    terminal: format!(
                        "exception:{}",
                        term_to_string(env, &ball, WriteOptions::quoted())
                    ),
                }
            }
        }
    }
}

/// Convenience: solutions of a query against an empty-program environment
#[allow(dead_code)]
pub fn run_plain(goal: &str) -> Run {
    run(&Environment::new(), goal)
}

/// Assert that the query has exactly the expected solutions, in order
#[allow(dead_code)]
pub fn expect_solutions(env: &Environment, goal: &str, expected: &[&str]) {
    let result = run(env, goal);
    assert_eq!(
        result.solutions, expected,
        "solutions of {} (terminal {})",
        goal, result.terminal
    );
}
