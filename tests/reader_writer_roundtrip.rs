//! Round-trip properties: canonical text re-reads as the same term, and
//! operator-aware output preserves the AST shape under declared operators.

mod common;

use common::{env_with, expect_solutions, run};
use prologtron::backend::Environment;
use prologtron::reader::parse_term;
use prologtron::writer::{term_to_string, WriteOptions};
use prologtron::Term;

fn canonical_roundtrip(env: &Environment, text: &str) {
    let original = parse_term(env, text).unwrap().term;
    let canonical = term_to_string(env, &original, WriteOptions::canonical());
    let reparsed = parse_term(env, &format!("{} .", canonical))
        .unwrap_or_else(|e| panic!("canonical text {:?} fails to parse: {}", canonical, e))
        .term;
    assert!(
        prologtron::backend::term::variant(&original, &reparsed),
        "canonical round trip of {} via {:?}",
        text,
        canonical
    );
}

#[test]
fn test_canonical_roundtrip_suite() {
    let env = Environment::new();
    for text in [
        "foo.",
        "'hello world'.",
        "[].",
        "{}.",
        "f(a, b, c).",
        "[1, 2, 3].",
        "[a | b].",
        "{x, y}.",
        "1 + 2 * 3.",
        "- (1).",
        "-1.",
        "3.5.",
        "1.0e30.",
        "2.75d.",
        "12345678901234567890.",
        "f(-1, - 1).",
        "'it''s'(ok).",
        "a :- b, c ; d.",
        "[[1, 2], [3 | X], g([])].",
        "'\\n\\t'.",
    ] {
        canonical_roundtrip(&env, text);
    }
}

#[test]
fn test_quoted_roundtrip_with_operators() {
    let env = Environment::new();
    for text in [
        "1 + 2 * 3.",
        "(1 + 2) * 3.",
        "a - b - c.",
        "a - (b - c).",
        "X = Y.",
        "a :- b, !, c.",
        "\\+ a.",
        "- - a.",
        "f(a, (b, c)).",
    ] {
        let original = parse_term(&env, text).unwrap().term;
        let written = term_to_string(&env, &original, WriteOptions::quoted());
        let reparsed = parse_term(&env, &format!("{} .", written)).unwrap().term;
        assert!(
            prologtron::backend::term::variant(&original, &reparsed),
            "operator round trip of {} via {:?}",
            text,
            written
        );
    }
}

#[test]
fn test_declared_operator_scenario() {
    // declaring an operator changes both parsing and writing
    let env = env_with(":- op(700, xfx, likes).\nmary likes wine.");
    expect_solutions(&env, "likes(mary, wine).", &["true"]);
    let t = parse_term(&env, "mary likes wine.").unwrap().term;
    assert_eq!(
        term_to_string(&env, &t, WriteOptions::plain()),
        "mary likes wine"
    );
}

#[test]
fn test_operator_removal_restores_plain_parsing() {
    let env = Environment::new();
    let _ = run(&env, "op(700, xfx, approves).");
    assert!(parse_term(&env, "a approves b.").is_ok());
    let _ = run(&env, "op(0, xfx, approves).");
    assert!(parse_term(&env, "a approves b.").is_err());
}

#[test]
fn test_op_errors() {
    let env = Environment::new();
    let result = run(&env, "op(9999, xfx, bad).");
    assert!(result.exception().unwrap().contains("domain_error"));
    let result = run(&env, "op(700, sideways, bad).");
    assert!(result
        .exception()
        .unwrap()
        .contains("domain_error(operator_specifier"));
    let result = run(&env, "op(700, xfx, ',').");
    assert!(result.exception().unwrap().contains("permission_error"));
}

#[test]
fn test_current_op() {
    let env = Environment::new();
    expect_solutions(&env, "current_op(P, xfx, is).", &["P = 700"]);
    let result = run(&env, "current_op(500, yfx, O).");
    let rendered = result.solutions.join(" ");
    assert!(rendered.contains("O = +"));
    assert!(rendered.contains("O = -"));
}

#[test]
fn test_write_term_options_via_goals() {
    let env = Environment::new();
    // write_term with quoted(true) behaves like writeq; verified through
    // an in-memory output stream
    let streams = env.streams();
    let (handle, buffer) = streams.open_string_output("capture");
    let mut interp = env.create_interpreter();
    let goal = Term::compound(
        "write_term",
        vec![
            handle.clone(),
            parse_term(&env, "'needs quoting'.").unwrap().term,
            parse_term(&env, "[quoted(true)].").unwrap().term,
        ],
    );
    let mut q = interp.prepare(goal);
    assert_eq!(interp.solve(&mut q), prologtron::Outcome::SuccessLast);
    assert_eq!(buffer.take_string(), "'needs quoting'");
}
