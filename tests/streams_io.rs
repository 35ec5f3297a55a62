//! Stream predicates end to end: aliases, character and byte I/O, the
//! end-of-stream state machine and capability errors.

mod common;

use common::{expect_solutions, run};
use prologtron::backend::{Environment, Outcome};
use prologtron::reader::parse_term;
use prologtron::Term;

fn solve_goal(env: &Environment, goal: Term) -> Outcome {
    let mut interp = env.create_interpreter();
    let mut q = interp.prepare(goal);
    interp.solve(&mut q)
}

fn temp_path(name: &str) -> String {
    std::env::temp_dir()
        .join(format!("prologtron_{}_{}", std::process::id(), name))
        .display()
        .to_string()
}

#[test]
fn test_write_to_memory_stream() {
    let env = Environment::new();
    let (handle, buffer) = env.streams().open_string_output("out");
    let goal = Term::compound(
        "write",
        vec![handle, parse_term(&env, "f(X, [1,2]).").unwrap().term],
    );
    assert_eq!(solve_goal(&env, goal), Outcome::SuccessLast);
    let text = buffer.take_string();
    assert!(text.starts_with("f(_G"), "got {}", text);
    assert!(text.ends_with(",[1,2])"), "got {}", text);
}

#[test]
fn test_read_term_from_memory_stream() {
    let env = Environment::new();
    let handle = env
        .streams()
        .open_string_input("in", "point(1, 2). point(3, 4).");
    let out = Term::var();
    let goal = Term::compound("read", vec![handle.clone(), out.clone()]);
    assert_eq!(solve_goal(&env, goal), Outcome::SuccessLast);
    assert_eq!(format!("{}", out.deref()), "point(1,2)");
    // second read gets the second term
    let out2 = Term::var();
    let goal = Term::compound("read", vec![handle.clone(), out2.clone()]);
    assert_eq!(solve_goal(&env, goal), Outcome::SuccessLast);
    assert_eq!(format!("{}", out2.deref()), "point(3,4)");
    // and then end_of_file
    let out3 = Term::var();
    let goal = Term::compound("read", vec![handle, out3.clone()]);
    assert_eq!(solve_goal(&env, goal), Outcome::SuccessLast);
    assert!(out3.deref().is_atom("end_of_file"));
}

#[test]
fn test_get_and_peek_char() {
    let env = Environment::new();
    let handle = env.streams().open_string_input("in", "ab");
    let c = Term::var();
    let goal = Term::compound("peek_char", vec![handle.clone(), c.clone()]);
    assert_eq!(solve_goal(&env, goal), Outcome::SuccessLast);
    assert!(c.deref().is_atom("a"), "peek sees the first char");
    let c1 = Term::var();
    let goal = Term::compound("get_char", vec![handle.clone(), c1.clone()]);
    assert_eq!(solve_goal(&env, goal), Outcome::SuccessLast);
    assert!(c1.deref().is_atom("a"), "get consumes what peek saw");
    let c2 = Term::var();
    let goal = Term::compound("get_char", vec![handle.clone(), c2.clone()]);
    assert_eq!(solve_goal(&env, goal), Outcome::SuccessLast);
    assert!(c2.deref().is_atom("b"));
    let c3 = Term::var();
    let goal = Term::compound("get_char", vec![handle, c3.clone()]);
    assert_eq!(solve_goal(&env, goal), Outcome::SuccessLast);
    assert!(c3.deref().is_atom("end_of_file"));
}

#[test]
fn test_get_char_on_output_is_permission_error() {
    let env = Environment::new();
    let (handle, _buffer) = env.streams().open_string_output("out");
    let goal = Term::compound("get_char", vec![handle, Term::var()]);
    match solve_goal(&env, goal) {
        Outcome::Exception(ball) => {
            assert!(format!("{}", ball).contains("permission_error"))
        }
        other => panic!("expected permission error, got {:?}", other),
    }
}

#[test]
fn test_file_roundtrip_with_alias() {
    let env = Environment::new();
    let path = temp_path("roundtrip.txt");
    let program = format!(
        "(open('{path}', write, _, [alias(out)]), \
          write(out, hello(world)), \
          put_char(out, '.'), nl(out), \
          close(out)).",
        path = path
    );
    assert_eq!(run(&env, &program).terminal, "success_last");
    let read_back = format!(
        "(open('{path}', read, _, [alias(inp)]), read(inp, T), close(inp)).",
        path = path
    );
    let result = run(&env, &read_back);
    assert_eq!(result.solutions.len(), 1);
    assert!(result.solutions[0].contains("T = hello(world)"));
    let _ = std::fs::remove_file(&path);
}

#[test]
fn test_binary_file_bytes_and_reposition() {
    let env = Environment::new();
    let path = temp_path("bytes.bin");
    let program = format!(
        "(open('{path}', write, S, [type(binary)]), \
          put_byte(S, 10), put_byte(S, 20), put_byte(S, 30), \
          set_stream_position(S, 1), get_byte(S, B), \
          close(S), B =:= 20).",
        path = path
    );
    let result = run(&env, &program);
    assert_eq!(result.terminal, "success_last", "got {:?}", result);
    let _ = std::fs::remove_file(&path);
}

#[test]
fn test_eof_action_error_via_goals() {
    let env = Environment::new();
    let path = temp_path("empty.txt");
    std::fs::write(&path, "").unwrap();
    let program = format!(
        "(open('{path}', read, _, [alias(e), eof_action(error)]), \
          get_char(e, C1), get_char(e, _)).",
        path = path
    );
    let result = run(&env, &program);
    assert!(
        result
            .exception()
            .unwrap()
            .contains("permission_error(input,past_end_of_stream"),
        "got {:?}",
        result
    );
    let _ = std::fs::remove_file(&path);
}

#[test]
fn test_current_and_set_output() {
    let env = Environment::new();
    let (handle, buffer) = env.streams().open_string_output("cap");
    let set = Term::compound("set_output", vec![handle.clone()]);
    assert_eq!(solve_goal(&env, set), Outcome::SuccessLast);
    // nl/0 and write/1 now target the capture stream
    assert_eq!(run(&env, "(write(hi), nl).").terminal, "success_last");
    assert_eq!(buffer.take_string(), "hi\n");
    let cur = Term::var();
    let goal = Term::compound("current_output", vec![cur.clone()]);
    assert_eq!(solve_goal(&env, goal), Outcome::SuccessLast);
    assert_eq!(cur.deref(), handle.deref());
    // closing the capture stream falls back to user_output
    let close = Term::compound("close", vec![handle]);
    assert_eq!(solve_goal(&env, close), Outcome::SuccessLast);
}

#[test]
fn test_stream_position_tracks_reads() {
    let env = Environment::new();
    let handle = env.streams().open_string_input("in", "abc");
    let goal = parse_goal_with(&env, "get_char", &handle);
    assert_eq!(solve_goal(&env, goal), Outcome::SuccessLast);
    let pos = Term::var();
    let goal = Term::compound("stream_position", vec![handle, pos.clone()]);
    assert_eq!(solve_goal(&env, goal), Outcome::SuccessLast);
    assert_eq!(pos.deref(), Term::int(1));
}

fn parse_goal_with(_env: &Environment, name: &str, handle: &Term) -> Term {
    Term::compound(name, vec![handle.clone(), Term::var()])
}

#[test]
fn test_resolve_errors() {
    let env = Environment::new();
    let result = run(&env, "get_char(no_such_stream, _).");
    assert!(result
        .exception()
        .unwrap()
        .contains("existence_error(stream"));
    let result = run(&env, "close(42).");
    assert!(result
        .exception()
        .unwrap()
        .contains("domain_error(stream_or_alias"));
    expect_solutions(&env, "close(user_output).", &["true"]);
}
