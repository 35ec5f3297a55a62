//! is/2 and the comparison predicates driven through full queries.

mod common;

use common::{expect_solutions, run};
use prologtron::backend::Environment;

#[test]
fn test_precedence_in_source_text() {
    let env = Environment::new();
    expect_solutions(&env, "X is 2 + 3 * 4.", &["X = 14"]);
    expect_solutions(&env, "X is (2 + 3) * 4.", &["X = 20"]);
    expect_solutions(&env, "X is -(2) + 1.", &["X = -1"]);
}

#[test]
fn test_division_results() {
    let env = Environment::new();
    expect_solutions(&env, "X is 7 / 2.", &["X = 3.5"]);
    expect_solutions(&env, "X is 7 // 2.", &["X = 3"]);
    expect_solutions(&env, "X is 7 mod 2.", &["X = 1"]);
    expect_solutions(&env, "X is -7 mod 2.", &["X = 1"]);
    expect_solutions(&env, "X is -7 rem 2.", &["X = -1"]);
}

#[test]
fn test_zero_divisor_raises() {
    let env = Environment::new();
    let result = run(&env, "X is 1 / 0.");
    assert!(result
        .exception()
        .unwrap()
        .contains("evaluation_error(zero_divisor)"));
    let result = run(&env, "X is 1 // 0.");
    assert!(result
        .exception()
        .unwrap()
        .contains("evaluation_error(zero_divisor)"));
}

#[test]
fn test_is_unifies_not_assigns() {
    let env = Environment::new();
    let result = run(&env, "(X = 5, X is 2 + 3).");
    assert_eq!(result.solutions, vec!["X = 5"]);
    let result = run(&env, "4 is 2 + 3.");
    assert_eq!(result.terminal, "fail");
}

#[test]
fn test_comparisons() {
    let env = Environment::new();
    expect_solutions(&env, "1 + 1 =:= 2.", &["true"]);
    assert_eq!(run(&env, "1 =:= 2.").terminal, "fail");
    expect_solutions(&env, "1 =\\= 2.", &["true"]);
    expect_solutions(&env, "1 < 2.", &["true"]);
    expect_solutions(&env, "2 >= 2.", &["true"]);
    expect_solutions(&env, "2 =< 2.", &["true"]);
    // mixed kinds compare by value
    expect_solutions(&env, "1 =:= 1.0.", &["true"]);
}

#[test]
fn test_big_integers() {
    let env = Environment::new();
    expect_solutions(
        &env,
        "X is 2 ^ 100.",
        &["X = 1267650600228229401496703205376"],
    );
    expect_solutions(&env, "X is 2 ^ 100 + 1 - 2 ^ 100.", &["X = 1"]);
}

#[test]
fn test_decimals_flow_through_arithmetic() {
    let env = Environment::new();
    expect_solutions(&env, "X is 0.1d + 0.2d.", &["X = 0.3d"]);
    expect_solutions(&env, "X is decimal(25) / decimal(10).", &["X = 2.5d"]);
    // decimal contaminates the whole expression
    expect_solutions(&env, "X is 1 + 0.5d.", &["X = 1.5d"]);
}

#[test]
fn test_evaluable_errors() {
    let env = Environment::new();
    let result = run(&env, "X is foo + 1.");
    assert!(result.exception().unwrap().contains("type_error(evaluable"));
    let result = run(&env, "X is Y + 1.");
    assert!(result.exception().unwrap().contains("instantiation_error"));
    let result = run(&env, "1 < foo.");
    assert!(result.exception().unwrap().contains("type_error(evaluable"));
}

#[test]
fn test_functions() {
    let env = Environment::new();
    expect_solutions(&env, "X is abs(-3).", &["X = 3"]);
    expect_solutions(&env, "X is min(3, 5).", &["X = 3"]);
    expect_solutions(&env, "X is max(3, 5).", &["X = 5"]);
    expect_solutions(&env, "X is sign(-9).", &["X = -1"]);
    expect_solutions(&env, "X is floor(3.7).", &["X = 3"]);
    expect_solutions(&env, "X is ceiling(3.2).", &["X = 4"]);
    expect_solutions(&env, "X is round(3.5).", &["X = 4"]);
    expect_solutions(&env, "X is truncate(-3.7).", &["X = -3"]);
    expect_solutions(&env, "X is 5 xor 3.", &["X = 6"]);
    expect_solutions(&env, "X is \\ 0.", &["X = -1"]);
    expect_solutions(&env, "X is 1 << 10.", &["X = 1024"]);
}

#[test]
fn test_between() {
    let env = Environment::new();
    let result = run(&env, "between(1, 3, X).");
    assert_eq!(result.solutions, vec!["X = 1", "X = 2", "X = 3"]);
    expect_solutions(&env, "between(1, 3, 2).", &["true"]);
    assert_eq!(run(&env, "between(1, 3, 7).").terminal, "fail");
}
