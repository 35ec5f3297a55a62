//! assert/retract/abolish/clause with the logical-update view.

mod common;

use common::{env_with, expect_solutions, run};
use prologtron::backend::Environment;

#[test]
fn test_assert_retract_scenario() {
    let env = Environment::new();
    let result = run(
        &env,
        "(assertz(p(1)), assertz(p(2)), retract(p(1)), p(X)).",
    );
    assert_eq!(result.solutions, vec!["X = 2"]);
    assert_eq!(result.terminal, "success_last");
}

#[test]
fn test_asserta_orders_before() {
    let env = Environment::new();
    let result = run(
        &env,
        "(assertz(q(later)), asserta(q(earlier)), findall(X, q(X), L)).",
    );
    assert_eq!(result.solutions.len(), 1);
    assert!(result.solutions[0].contains("L = [earlier,later]"));
}

#[test]
fn test_assert_rule_and_call_it() {
    let env = Environment::new();
    let result = run(
        &env,
        "(assertz((bigger(X) :- X > 10)), bigger(11)).",
    );
    assert_eq!(result.solutions.len(), 1, "terminal {}", result.terminal);
    let result2 = run(&env, "bigger(5).");
    assert_eq!(result2.terminal, "fail");
}

#[test]
fn test_retract_is_resatisfiable() {
    let env = Environment::new();
    let _ = run(&env, "(assertz(r(1)), assertz(r(2)), assertz(r(3))).");
    let result = run(&env, "retract(r(X)).");
    assert_eq!(result.solutions, vec!["X = 1", "X = 2", "X = 3"]);
    // everything retracted
    assert_eq!(run(&env, "r(_).").terminal, "fail");
}

#[test]
fn test_retract_rule_pattern() {
    let env = Environment::new();
    let _ = run(&env, "assertz((s(X) :- X > 1)).");
    let result = run(&env, "retract((s(A) :- A > 1)).");
    assert_eq!(result.solutions.len(), 1);
    assert!(result.solutions[0].starts_with("A = _G"));
    assert_eq!(run(&env, "retract((s(A) :- A > 1)).").terminal, "fail");
}

#[test]
fn test_clause_inspection() {
    let env = Environment::new();
    let _ = run(&env, "(assertz(f(a)), assertz((f(X) :- g(X)))).");
    let result = run(&env, "clause(f(A), B).");
    assert_eq!(result.solutions.len(), 2);
    assert!(result.solutions[0].contains("B = true"));
    assert!(result.solutions[1].contains("B = g("));
}

#[test]
fn test_clause_on_static_predicate_is_denied() {
    let env = env_with("frozen(1).");
    let result = run(&env, "clause(frozen(X), B).");
    assert!(result
        .exception()
        .unwrap()
        .contains("permission_error(access,private_procedure,frozen/1)"));
}

#[test]
fn test_abolish() {
    let env = Environment::new();
    let _ = run(&env, "(assertz(tmp(1)), assertz(tmp(2))).");
    expect_solutions(&env, "abolish(tmp/1).", &["true"]);
    // predicate gone entirely: calling it is an existence error again
    let result = run(&env, "tmp(_).");
    assert!(result.exception().unwrap().contains("existence_error"));
}

#[test]
fn test_retract_assert_preserves_solutions() {
    // retract then re-assert leaves the same solution set (P3)
    let env = Environment::new();
    let _ = run(&env, "(assertz(d(1)), assertz(d(2))).");
    let before = run(&env, "d(X).").solutions;
    let _ = run(&env, "(retract(d(1)), assertz(d(1))).");
    let mut after = run(&env, "d(X).").solutions;
    after.sort();
    let mut before_sorted = before.clone();
    before_sorted.sort();
    assert_eq!(before_sorted, after);
}

#[test]
fn test_logical_update_view() {
    // clauses asserted while iterating are not visible to the open query
    let env = Environment::new();
    let _ = run(&env, "(assertz(item(1)), assertz(item(2))).");
    let result = run(
        &env,
        "(findall(X, (item(X), assertz(item(99))), L)).",
    );
    assert_eq!(result.solutions.len(), 1);
    assert!(
        result.solutions[0].contains("L = [1,2]"),
        "asserted 99 must not appear: {}",
        result.solutions[0]
    );
    // but they are visible to later queries
    let later = run(&env, "findall(X, item(X), L).");
    assert!(later.solutions[0].contains("99"));
}

#[test]
fn test_retracted_clause_stays_visible_to_open_iteration() {
    let env = Environment::new();
    let _ = run(&env, "(assertz(v(1)), assertz(v(2)), assertz(v(3))).");
    // retract v(3) while iterating; the open iteration still sees it
    let result = run(&env, "findall(X, (v(X), retract(v(3))), L).");
    assert!(result.solutions[0].contains("L = [1]"));
    // v(3) was retracted on the first iteration; later solutions of v(X)
    // come from the original snapshot, but retract(v(3)) fails afterwards
    let remaining = run(&env, "findall(X, v(X), L).");
    assert!(remaining.solutions[0].contains("L = [1,2]"));
}

#[test]
fn test_dynamic_declaration_allows_empty_call() {
    let env = env_with(":- dynamic(maybe/1).");
    assert_eq!(run(&env, "maybe(_).").terminal, "fail");
}
