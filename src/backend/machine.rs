//! The interpreter: an explicit state machine over a goal stack and a
//! choice-point stack.
//!
//! Control constructs (conjunction, disjunction, if-then-else, cut,
//! catch/throw, call/N, negation) are executed by the machine itself;
//! everything else dispatches to the foreign-predicate registry or to the
//! clause database. Backtracking never uses host recursion: failure pops the
//! top choice point, unwinds the trail to its mark, restores the saved goal
//! stack and resumes with the next alternative.
//!
//! # Cut
//!
//! Every goal frame carries a cut barrier, the choice-point depth at entry
//! of the predicate invocation it belongs to. `!` truncates the stack to
//! that barrier. Goals run through call/N (and the conditions of if-then)
//! get a fresh barrier, making cuts inside them local; disjunction and
//! conjunction pass the surrounding barrier through, keeping cuts inside
//! them transparent to the clause.
//!
//! # Catch
//!
//! catch/3 pushes a handler frame onto the goal stack. A handler is active
//! exactly while its frame is on the stack: succeeding past it pops it, and
//! backtracking into the guarded goal restores it, because choice points
//! snapshot the goal stack. A throw pops frames until a handler whose
//! catcher unifies with a copy of the ball, truncating choice points and
//! unwinding the trail to the handler's marks.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;

use tracing::trace;

use super::database::Clause;
use super::environment::{Environment, UnknownAction};
use super::error::PrologError;
use super::symbol::{tag, CompoundTag};
use super::term::{copy_term_fresh, Term};
use super::trail::{Trail, TrailMark};
use super::unify::unify;

/// Result of driving a query one step
#[derive(Clone, Debug, PartialEq)]
pub enum Outcome {
    /// A solution was found and more may exist
    Success,
    /// A solution was found deterministically; the query is exhausted
    SuccessLast,
    /// No (further) solution exists
    Fail,
    /// halt/0 or halt/1 was executed
    Halt(i32),
    /// An uncaught exception, carrying the thrown term
    Exception(Term),
}

/// Tracer ports, emitted when tracing is active
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Port {
    Call,
    Exit,
    Redo,
    Fail,
}

impl Port {
    fn as_str(&self) -> &'static str {
        match self {
            Port::Call => "call",
            Port::Exit => "exit",
            Port::Redo => "redo",
            Port::Fail => "fail",
        }
    }
}

/// Receives trace events together with a snapshot of the call stack
pub trait TraceSink: Send {
    fn event(&mut self, port: Port, predicate: CompoundTag, stack: &[CompoundTag]);
}

/// The per-interpreter tracer. Tracing has no semantic effect; when
/// inactive the machine skips all bookkeeping.
#[derive(Default)]
pub struct Tracer {
    active: bool,
    sink: Option<Box<dyn TraceSink>>,
    last_stack: Vec<CompoundTag>,
}

impl Tracer {
    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn set_sink(&mut self, sink: Box<dyn TraceSink>) {
        self.sink = Some(sink);
    }

    /// The call stack observed at the most recent event, outermost first
    pub fn call_stack(&self) -> &[CompoundTag] {
        &self.last_stack
    }
}

/// One entry of the goal stack
#[derive(Clone)]
enum Frame {
    /// Execute a goal under the given cut barrier
    Goal { goal: Term, cut: usize },
    /// Truncate the choice-point stack to an absolute depth (if-then commit)
    Commit(usize),
    /// Active catch/3 handler
    Catch {
        catcher: Term,
        recovery: Term,
        trail_mark: TrailMark,
        cp_depth: usize,
    },
    /// Tracer exit-port marker, pushed under a predicate's body goals
    Exit(CompoundTag),
}

/// Nondeterministic builtins yield further solutions through this trait.
/// `retry` performs the bindings of the next alternative; `None` reports
/// exhaustion. The trail is already unwound to the pre-call mark when
/// `retry` runs.
pub trait Choices: Send {
    fn retry(&mut self, interp: &mut Interpreter) -> Option<()>;
}

/// What a foreign predicate resolved to
pub enum Resolved {
    /// Deterministic success
    True,
    Fail,
    /// First solution is produced by the first `retry` call
    Redo(Box<dyn Choices>),
    Halt(i32),
}

enum Alternative {
    /// Remaining clauses of a user predicate invocation
    Clauses {
        remaining: VecDeque<Arc<Clause>>,
        goal: Term,
        cut: usize,
        tag: CompoundTag,
    },
    /// Right branch of a disjunction
    Branch { goal: Term, cut: usize },
    /// Further solutions of a nondeterministic builtin
    Retry {
        choices: Box<dyn Choices>,
        tag: CompoundTag,
    },
}

struct ChoicePoint {
    goals: Vec<Frame>,
    trail_mark: TrailMark,
    alternative: Alternative,
}

/// A prepared goal: its goal stack, choice points and progress flags.
/// Repeated `solve` calls on the same query enumerate its solutions.
pub struct Query {
    goals: Vec<Frame>,
    cps: Vec<ChoicePoint>,
    base_mark: TrailMark,
    started: bool,
    finished: bool,
}

impl Query {
    /// Number of pending choice points (used by tests and the tracer)
    pub fn choice_points(&self) -> usize {
        self.cps.len()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

/// A single-threaded Prolog execution engine. Several interpreters may
/// share one Environment; the trail, the choice points and all variable
/// bindings stay private to each interpreter.
pub struct Interpreter {
    env: Environment,
    pub(crate) trail: Trail,
    interrupt: Arc<AtomicBool>,
    tracer: Tracer,
    halted: Option<i32>,
}

impl Interpreter {
    pub fn new(env: Environment) -> Self {
        Interpreter {
            env,
            trail: Trail::new(),
            interrupt: Arc::new(AtomicBool::new(false)),
            tracer: Tracer::default(),
            halted: None,
        }
    }

    pub fn environment(&self) -> &Environment {
        &self.env
    }

    pub fn tracer(&mut self) -> &mut Tracer {
        &mut self.tracer
    }

    /// Flag checked at every call port; when set, the running query is
    /// aborted with a `user_interrupt` exception at the next safe point.
    pub fn interrupt_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.interrupt)
    }

    /// Unify under this interpreter's trail
    pub fn unify(&mut self, a: &Term, b: &Term) -> bool {
        unify(&mut self.trail, a, b)
    }

    /// Prepare a goal for execution
    pub fn prepare(&mut self, goal: Term) -> Query {
        Query {
            goals: vec![Frame::Goal { goal, cut: 0 }],
            cps: Vec::new(),
            base_mark: self.trail.mark(),
            started: false,
            finished: false,
        }
    }

    /// Abandon a query, undoing all of its bindings
    pub fn stop(&mut self, query: &mut Query) {
        query.cps.clear();
        query.goals.clear();
        query.finished = true;
        self.trail.undo_to(query.base_mark);
    }

    /// Drive the query to its next solution.
    ///
    /// Returns `Success` when a solution was found and choice points
    /// remain, `SuccessLast` for a deterministic solution, `Fail` when the
    /// search space is exhausted, `Halt` after halt/0,1, and `Exception`
    /// for an uncaught throw. After `Success` the caller reads bindings
    /// through the variable-name map obtained from the reader.
    pub fn solve(&mut self, query: &mut Query) -> Outcome {
        if query.finished {
            return Outcome::Fail;
        }
        if query.started {
            // Enumerating further solutions starts with a backtrack
            if !self.backtrack(query) {
                query.finished = true;
                self.trail.undo_to(query.base_mark);
                return Outcome::Fail;
            }
        } else {
            query.started = true;
        }
        self.run(query)
    }

    fn run(&mut self, query: &mut Query) -> Outcome {
        loop {
            if let Some(code) = self.halted.take() {
                query.finished = true;
                self.env.streams().close_all();
                return Outcome::Halt(code);
            }
            let frame = match query.goals.pop() {
                None => {
                    return if query.cps.is_empty() {
                        query.finished = true;
                        Outcome::SuccessLast
                    } else {
                        Outcome::Success
                    };
                }
                Some(f) => f,
            };
            let step = match frame {
                Frame::Commit(depth) => {
                    query.cps.truncate(depth);
                    Ok(true)
                }
                Frame::Catch { .. } => Ok(true), // handler deactivated on success
                Frame::Exit(tag) => {
                    self.trace_port(query, Port::Exit, tag);
                    Ok(true)
                }
                Frame::Goal { goal, cut } => self.step(query, goal, cut),
            };
            match step {
                Ok(true) => {}
                Ok(false) => {
                    if !self.backtrack(query) {
                        query.finished = true;
                        self.trail.undo_to(query.base_mark);
                        return Outcome::Fail;
                    }
                }
                Err(err) => match self.dispatch_throw(query, err.ball) {
                    Ok(()) => {}
                    Err(ball) => {
                        query.finished = true;
                        query.cps.clear();
                        self.trail.undo_to(query.base_mark);
                        return Outcome::Exception(ball);
                    }
                },
            }
        }
    }

    /// Execute one goal. Ok(true) continues, Ok(false) fails into
    /// backtracking, Err raises.
    fn step(&mut self, query: &mut Query, goal: Term, cut: usize) -> Result<bool, PrologError> {
        let goal = goal.deref();
        let tag = match &goal {
            Term::Var(_) => return Err(PrologError::instantiation()),
            Term::Atom(_) | Term::Compound(_) => goal.callable_tag().expect("callable"),
            other => return Err(PrologError::type_error("callable", other.clone())),
        };

        // Control constructs first
        match (tag.name.as_str(), tag.arity) {
            ("true", 0) => return Ok(true),
            ("fail", 0) | ("false", 0) => return Ok(false),
            ("!", 0) => {
                query.cps.truncate(cut);
                return Ok(true);
            }
            (",", 2) => {
                let args = compound_args(&goal);
                query.goals.push(Frame::Goal {
                    goal: args[1].clone(),
                    cut,
                });
                query.goals.push(Frame::Goal {
                    goal: args[0].clone(),
                    cut,
                });
                return Ok(true);
            }
            (";", 2) => {
                let args = compound_args(&goal);
                let left = args[0].deref();
                if let Some(ite) = as_if_then(&left) {
                    // (Cond -> Then ; Else): commit to Then on Cond's first
                    // solution, fall to Else when Cond has none
                    let depth = query.cps.len();
                    query.cps.push(ChoicePoint {
                        goals: query.goals.clone(),
                        trail_mark: self.trail.mark(),
                        alternative: Alternative::Branch {
                            goal: args[1].clone(),
                            cut,
                        },
                    });
                    query.goals.push(Frame::Goal {
                        goal: ite.1,
                        cut,
                    });
                    query.goals.push(Frame::Commit(depth));
                    query.goals.push(Frame::Goal {
                        goal: ite.0,
                        cut: query.cps.len(),
                    });
                } else {
                    query.cps.push(ChoicePoint {
                        goals: query.goals.clone(),
                        trail_mark: self.trail.mark(),
                        alternative: Alternative::Branch {
                            goal: args[1].clone(),
                            cut,
                        },
                    });
                    query.goals.push(Frame::Goal {
                        goal: args[0].clone(),
                        cut,
                    });
                }
                return Ok(true);
            }
            ("->", 2) => {
                let args = compound_args(&goal);
                let depth = query.cps.len();
                query.goals.push(Frame::Goal {
                    goal: args[1].clone(),
                    cut,
                });
                query.goals.push(Frame::Commit(depth));
                query.goals.push(Frame::Goal {
                    goal: args[0].clone(),
                    cut: depth,
                });
                return Ok(true);
            }
            ("\\+", 1) | ("not", 1) => {
                let args = compound_args(&goal);
                // \+ G is (G -> fail ; true); deterministic either way
                let encoded = Term::compound(
                    ";",
                    vec![
                        Term::compound("->", vec![args[0].clone(), Term::atom("fail")]),
                        Term::atom("true"),
                    ],
                );
                query.goals.push(Frame::Goal { goal: encoded, cut });
                return Ok(true);
            }
            ("once", 1) => {
                let args = compound_args(&goal);
                let encoded = Term::compound("->", vec![args[0].clone(), Term::atom("true")]);
                query.goals.push(Frame::Goal { goal: encoded, cut });
                return Ok(true);
            }
            ("call", n) if n >= 1 => {
                let args = compound_args(&goal);
                let target = build_call(&args[0], &args[1..])?;
                // Cuts inside a called goal are local to it
                query.goals.push(Frame::Goal {
                    goal: target,
                    cut: query.cps.len(),
                });
                return Ok(true);
            }
            ("catch", 3) => {
                let args = compound_args(&goal);
                query.goals.push(Frame::Catch {
                    catcher: args[1].clone(),
                    recovery: args[2].clone(),
                    trail_mark: self.trail.mark(),
                    cp_depth: query.cps.len(),
                });
                let cut_local = query.cps.len();
                query.goals.push(Frame::Goal {
                    goal: args[0].clone(),
                    cut: cut_local,
                });
                return Ok(true);
            }
            ("throw", 1) => {
                let args = compound_args(&goal);
                let ball = args[0].deref();
                if matches!(ball, Term::Var(_)) {
                    return Err(PrologError::instantiation());
                }
                return Err(PrologError::from_ball(ball));
            }
            ("halt", 0) => {
                self.halted = Some(0);
                return Ok(true);
            }
            ("halt", 1) => {
                let args = compound_args(&goal);
                let code = match args[0].deref() {
                    Term::Var(_) => return Err(PrologError::instantiation()),
                    Term::Int(n) => {
                        use num_traits::ToPrimitive;
                        n.to_i32().unwrap_or(1)
                    }
                    other => return Err(PrologError::type_error("integer", other)),
                };
                self.halted = Some(code);
                return Ok(true);
            }
            _ => {}
        }

        // Safe point: honor a pending interrupt before entering a predicate
        if self.interrupt.swap(false, AtomicOrdering::Relaxed) {
            return Err(PrologError::user_interrupt());
        }

        // Foreign predicates
        if let Some(builtin) = self.env.builtins().get(tag) {
            self.trace_port(query, Port::Call, tag);
            let args_owned;
            let args: &[Term] = match &goal {
                Term::Compound(c) => {
                    args_owned = c.args.clone();
                    &args_owned
                }
                _ => &[],
            };
            let mark = self.trail.mark();
            return match builtin.call(self, args)? {
                Resolved::True => {
                    self.trace_port(query, Port::Exit, tag);
                    Ok(true)
                }
                Resolved::Fail => {
                    self.trace_port(query, Port::Fail, tag);
                    Ok(false)
                }
                Resolved::Halt(code) => {
                    self.halted = Some(code);
                    Ok(true)
                }
                Resolved::Redo(mut choices) => match choices.retry(self) {
                    Some(()) => {
                        query.cps.push(ChoicePoint {
                            goals: query.goals.clone(),
                            trail_mark: mark,
                            alternative: Alternative::Retry { choices, tag },
                        });
                        self.trace_port(query, Port::Exit, tag);
                        Ok(true)
                    }
                    None => {
                        self.trace_port(query, Port::Fail, tag);
                        Ok(false)
                    }
                },
            };
        }

        // User predicates
        self.trace_port(query, Port::Call, tag);
        let pred = match self.env.database().predicate(tag) {
            Some(p) => p,
            None => {
                return match self.env.unknown_action() {
                    UnknownAction::Error => Err(PrologError::unknown_procedure(tag)),
                    UnknownAction::Fail => {
                        self.trace_port(query, Port::Fail, tag);
                        Ok(false)
                    }
                };
            }
        };
        let first_arg = match &goal {
            Term::Compound(c) => Some(c.args[0].clone()),
            _ => None,
        };
        let clauses: VecDeque<Arc<Clause>> =
            pred.snapshot_for(first_arg.as_ref()).into();
        let entry_cut = query.cps.len();
        let ok = self.try_clauses(query, clauses, goal, entry_cut, tag);
        if !ok {
            self.trace_port(query, Port::Fail, tag);
        }
        Ok(ok)
    }

    /// Try clauses in order: rename, unify the head, and on success push
    /// the body (and a choice point when clauses remain).
    fn try_clauses(
        &mut self,
        query: &mut Query,
        mut remaining: VecDeque<Arc<Clause>>,
        goal: Term,
        entry_cut: usize,
        tag: CompoundTag,
    ) -> bool {
        while let Some(clause) = remaining.pop_front() {
            let mark = self.trail.mark();
            let (head, body) = clause.rename();
            if unify(&mut self.trail, &goal, &head) {
                if !remaining.is_empty() {
                    query.cps.push(ChoicePoint {
                        goals: query.goals.clone(),
                        trail_mark: mark,
                        alternative: Alternative::Clauses {
                            remaining,
                            goal: goal.clone(),
                            cut: entry_cut,
                            tag,
                        },
                    });
                }
                if self.tracer.active {
                    query.goals.push(Frame::Exit(tag));
                }
                query.goals.push(Frame::Goal {
                    goal: body,
                    cut: entry_cut,
                });
                return true;
            }
            self.trail.undo_to(mark);
        }
        false
    }

    /// Pop choice points until one yields an alternative. Restores the goal
    /// stack snapshot and unwinds the trail for each candidate.
    fn backtrack(&mut self, query: &mut Query) -> bool {
        while let Some(cp) = query.cps.pop() {
            self.trail.undo_to(cp.trail_mark);
            query.goals = cp.goals;
            match cp.alternative {
                Alternative::Branch { goal, cut } => {
                    query.goals.push(Frame::Goal { goal, cut });
                    return true;
                }
                Alternative::Clauses {
                    remaining,
                    goal,
                    cut,
                    tag,
                } => {
                    self.trace_port(query, Port::Redo, tag);
                    if self.try_clauses(query, remaining, goal, cut, tag) {
                        return true;
                    }
                    self.trace_port(query, Port::Fail, tag);
                }
                Alternative::Retry { mut choices, tag } => {
                    self.trace_port(query, Port::Redo, tag);
                    let snapshot = query.goals.clone();
                    let mark = cp.trail_mark;
                    match choices.retry(self) {
                        Some(()) => {
                            query.cps.push(ChoicePoint {
                                goals: snapshot,
                                trail_mark: mark,
                                alternative: Alternative::Retry { choices, tag },
                            });
                            return true;
                        }
                        None => {
                            self.trace_port(query, Port::Fail, tag);
                        }
                    }
                }
            }
        }
        false
    }

    /// Unwind to the innermost active handler whose catcher unifies with a
    /// copy of the ball. Err returns the ball when no handler matches.
    fn dispatch_throw(&mut self, query: &mut Query, ball: Term) -> Result<(), Term> {
        // The ball is frozen at throw time
        let frozen = copy_term_fresh(&ball);
        loop {
            match query.goals.pop() {
                None => return Err(frozen),
                Some(Frame::Catch {
                    catcher,
                    recovery,
                    trail_mark,
                    cp_depth,
                }) => {
                    query.cps.truncate(cp_depth);
                    self.trail.undo_to(trail_mark);
                    let attempt = self.trail.mark();
                    let ball_copy = copy_term_fresh(&frozen);
                    if unify(&mut self.trail, &catcher, &ball_copy) {
                        trace!(ball = %frozen, "caught exception");
                        let cut_local = query.cps.len();
                        query.goals.push(Frame::Goal {
                            goal: recovery,
                            cut: cut_local,
                        });
                        return Ok(());
                    }
                    self.trail.undo_to(attempt);
                }
                Some(_) => {}
            }
        }
    }

    fn trace_port(&mut self, query: &Query, port: Port, tag: CompoundTag) {
        if !self.tracer.active {
            return;
        }
        let mut stack: Vec<CompoundTag> = query
            .goals
            .iter()
            .filter_map(|f| match f {
                Frame::Exit(t) => Some(*t),
                _ => None,
            })
            .collect();
        stack.reverse();
        trace!(port = port.as_str(), predicate = %tag, depth = stack.len(), "trace");
        self.tracer.last_stack = stack;
        if let Some(sink) = &mut self.tracer.sink {
            sink.event(port, tag, &self.tracer.last_stack);
        }
    }
}

fn compound_args(goal: &Term) -> &[Term] {
    match goal {
        Term::Compound(c) => &c.args,
        _ => &[],
    }
}

/// Recognize `Cond -> Then` on the left of a disjunction
fn as_if_then(t: &Term) -> Option<(Term, Term)> {
    match t {
        Term::Compound(c) if c.tag == tag("->", 2) => {
            Some((c.args[0].clone(), c.args[1].clone()))
        }
        _ => None,
    }
}

/// Extend a callable with extra arguments (call/N)
fn build_call(target: &Term, extra: &[Term]) -> Result<Term, PrologError> {
    let target = target.deref();
    match &target {
        Term::Var(_) => Err(PrologError::instantiation()),
        Term::Atom(a) => {
            if extra.is_empty() {
                Ok(target.clone())
            } else {
                Ok(Term::compound(a.as_str(), extra.to_vec()))
            }
        }
        Term::Compound(c) => {
            if extra.is_empty() {
                Ok(target.clone())
            } else {
                let mut args = c.args.clone();
                args.extend_from_slice(extra);
                Ok(Term::compound(c.tag.name.as_str(), args))
            }
        }
        other => Err(PrologError::type_error("callable", other.clone())),
    }
}
