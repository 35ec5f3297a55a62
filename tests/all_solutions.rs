//! findall/3, forall/2, bagof/3 and setof/3.

mod common;

use common::{env_with, run};

const FACTS: &str = "
member(X, [X|_]).
member(X, [_|T]) :- member(X, T).

age(peter, 7).
age(ann, 11).
age(pat, 8).
age(tom, 5).

owns(alice, cat).
owns(alice, dog).
owns(bob, fish).
";

#[test]
fn test_findall_collects_in_order() {
    let env = env_with(FACTS);
    let result = run(&env, "findall(X, member(X, [1,2,3]), L).");
    assert_eq!(result.solutions.len(), 1);
    assert!(result.solutions[0].contains("L = [1,2,3]"));
    assert_eq!(result.terminal, "success_last");
}

#[test]
fn test_findall_empty_on_no_solutions() {
    let env = env_with(FACTS);
    let result = run(&env, "findall(X, member(X, []), L).");
    assert!(result.solutions[0].contains("L = []"));
}

#[test]
fn test_findall_copies_templates() {
    let env = env_with(FACTS);
    // each collected element is a fresh copy, so Y stays unbound outside
    let result = run(&env, "(findall(Y-A, age(Y, A), L), Y = still_free).");
    assert_eq!(result.solutions.len(), 1);
    assert!(result.solutions[0].contains("Y = still_free"));
    assert!(result.solutions[0].contains("peter-7"));
}

#[test]
fn test_findall_propagates_inner_errors() {
    let env = env_with(FACTS);
    // a type error inside the goal must escape findall, not be absorbed
    let result = run(&env, "findall(X, (member(X, [1,2]), X is foo + 1), L).");
    assert!(result
        .exception()
        .unwrap()
        .contains("type_error(evaluable"));
}

#[test]
fn test_findall_nested() {
    let env = env_with(FACTS);
    let result = run(
        &env,
        "findall(P-L, (member(P, [alice,bob]), findall(T, owns(P, T), L)), Out).",
    );
    assert!(result.solutions[0].contains("Out = [alice-[cat,dog],bob-[fish]]"));
}

#[test]
fn test_forall() {
    let env = env_with(FACTS);
    let result = run(&env, "forall(age(_, A), A < 20).");
    assert_eq!(result.solutions.len(), 1, "terminal {}", result.terminal);
    assert_eq!(run(&env, "forall(age(_, A), A < 10).").terminal, "fail");
    // vacuously true
    assert_eq!(
        run(&env, "forall(age(nobody, _), fail).").solutions,
        vec!["true"]
    );
}

#[test]
fn test_bagof_groups_by_witness() {
    let env = env_with(FACTS);
    let result = run(&env, "bagof(T, owns(P, T), Bag).");
    assert_eq!(result.solutions.len(), 2, "one solution per owner");
    assert!(result.solutions[0].contains("P = alice") && result.solutions[0].contains("Bag = [cat,dog]"));
    assert!(result.solutions[1].contains("P = bob") && result.solutions[1].contains("Bag = [fish]"));
}

#[test]
fn test_bagof_fails_on_no_solutions() {
    let env = env_with(FACTS);
    assert_eq!(run(&env, "bagof(X, owns(nobody, X), L).").terminal, "fail");
}

#[test]
fn test_caret_ignores_witness() {
    let env = env_with(FACTS);
    let result = run(&env, "bagof(T, P^owns(P, T), Bag).");
    assert_eq!(result.solutions.len(), 1);
    assert!(result.solutions[0].contains("Bag = [cat,dog,fish]"));
}

#[test]
fn test_setof_sorts_and_dedups() {
    let env = env_with(FACTS);
    let result = run(&env, "setof(X, member(X, [c,a,b,a,c]), L).");
    assert_eq!(result.solutions.len(), 1);
    assert!(result.solutions[0].contains("L = [a,b,c]"));
}

#[test]
fn test_setof_orders_witness_groups() {
    let env = env_with(FACTS);
    let result = run(&env, "setof(N, age(Kid, N), Ns).");
    // groups come back sorted by the witness (the kid's name)
    assert_eq!(result.solutions.len(), 4);
    assert!(result.solutions[0].contains("Kid = ann"));
    assert!(result.solutions[1].contains("Kid = pat"));
    assert!(result.solutions[2].contains("Kid = peter"));
    assert!(result.solutions[3].contains("Kid = tom"));
}
