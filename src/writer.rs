//! The term writer: the inverse of the reader.
//!
//! Respects the operator table with precedence-minimal parenthesization,
//! quotes atoms that need it, and formats numbers so they read back as the
//! same value. Options mirror write_term/3: `quoted`, `ignore_ops` and
//! `numbervars` (rendering `'$VAR'(0)`.. as `A`, `B`, .., `A1`, ..).
//!
//! Output is assembled through a token-aware emitter that inserts a space
//! exactly when two adjacent emissions would otherwise fuse into one token,
//! so `a- -1` and `- 1` survive the round trip.

use num_bigint::BigInt;
use num_traits::{Signed, ToPrimitive};

use crate::backend::environment::Environment;
use crate::backend::operators::OperatorTable;
use crate::backend::symbol::Atom;
use crate::backend::term::{format_decimal, format_float, Term};

#[derive(Copy, Clone, Debug)]
pub struct WriteOptions {
    pub quoted: bool,
    pub ignore_ops: bool,
    pub numbervars: bool,
}

impl WriteOptions {
    /// write/1: operators, no quoting
    pub fn plain() -> Self {
        WriteOptions {
            quoted: false,
            ignore_ops: false,
            numbervars: true,
        }
    }

    /// writeq/1: operators plus quoting
    pub fn quoted() -> Self {
        WriteOptions {
            quoted: true,
            ignore_ops: false,
            numbervars: true,
        }
    }

    /// write_canonical/1: quoted, operator-free, numbervars off
    pub fn canonical() -> Self {
        WriteOptions {
            quoted: true,
            ignore_ops: true,
            numbervars: false,
        }
    }
}

/// Render a term to a string under the environment's operator table
pub fn term_to_string(env: &Environment, term: &Term, opts: WriteOptions) -> String {
    let mut w = Writer {
        ops: env.operator_snapshot(),
        opts,
        out: String::new(),
    };
    w.write(term, 1200);
    w.out
}

fn is_symbol_char(c: char) -> bool {
    "+-*/\\^<>=~:.?@#&$".contains(c)
}

fn is_alnum(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// True when the atom's name needs no quotes
fn unquoted_ok(name: &str) -> bool {
    if name.is_empty() {
        return false;
    }
    // solo atoms
    if matches!(name, "!" | ";" | "[]" | "{}") {
        return true;
    }
    let mut chars = name.chars();
    let first = chars.next().expect("non-empty");
    if first.is_lowercase() && first.is_alphabetic() {
        return name.chars().all(is_alnum);
    }
    name.chars().all(is_symbol_char)
}

fn quote_atom(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 2);
    out.push('\'');
    for c in name.chars() {
        match c {
            '\'' => out.push_str("\\'"),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c if (c as u32) < 0x20 => {
                out.push_str(&format!("\\x{:x}\\", c as u32));
            }
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}

/// Letter name for `'$VAR'(n)`: A..Z, A1..Z1, ..
fn numbervar_name(n: &BigInt) -> Option<String> {
    if n.is_negative() {
        return None;
    }
    let i = n.to_u64()?;
    let letter = (b'A' + (i % 26) as u8) as char;
    let suffix = i / 26;
    Some(if suffix == 0 {
        letter.to_string()
    } else {
        format!("{}{}", letter, suffix)
    })
}

struct Writer {
    ops: OperatorTable,
    opts: WriteOptions,
    out: String,
}

impl Writer {
    /// Append, inserting a space when the junction would fuse two tokens
    fn emit(&mut self, s: &str) {
        if s.is_empty() {
            return;
        }
        if let (Some(last), Some(first)) = (self.out.chars().last(), s.chars().next()) {
            let fuses = (is_alnum(last) && is_alnum(first))
                || (is_symbol_char(last) && is_symbol_char(first))
                || (last == '\'' && first == '\'');
            if fuses {
                self.out.push(' ');
            }
        }
        self.out.push_str(s);
    }

    fn emit_atom(&mut self, a: Atom) {
        let name = a.as_str();
        if self.opts.quoted && !unquoted_ok(name) {
            let q = quote_atom(name);
            self.emit(&q);
        } else {
            self.emit(name);
        }
    }

    fn write(&mut self, term: &Term, max_prec: u16) {
        let term = term.deref();
        match &term {
            Term::Var(cell) => self.emit(&format!("_G{}", cell.id)),
            Term::Int(n) => self.emit(&n.to_string()),
            Term::Float(f) => self.emit(&format_float(*f)),
            Term::Decimal(d) => self.emit(&format_decimal(d)),
            Term::Atom(a) => self.emit_atom(*a),
            Term::Handle(h) => self.emit(&format!("$handle({})", h.id)),
            Term::Compound(c) => {
                // '$VAR'(N) under the numbervars option
                if self.opts.numbervars && c.tag.name == "$VAR" && c.tag.arity == 1 {
                    if let Term::Int(n) = c.args[0].deref() {
                        if let Some(name) = numbervar_name(&n) {
                            self.emit(&name);
                            return;
                        }
                    }
                }
                // list and curly notation survive even canonical output
                if c.tag.name == "." && c.tag.arity == 2 {
                    self.write_list(&c.args[0], &c.args[1]);
                    return;
                }
                if c.tag.name == "{}" && c.tag.arity == 1 {
                    self.emit("{");
                    self.write(&c.args[0], 1200);
                    self.emit("}");
                    return;
                }
                if !self.opts.ignore_ops {
                    if c.tag.arity == 2 {
                        if let Some(def) = self.ops.infix(c.tag.name) {
                            let (lmax, rmax) = def.arg_priorities();
                            let parens = def.priority > max_prec;
                            if parens {
                                self.emit("(");
                            }
                            self.write(&c.args[0], lmax);
                            if c.tag.name == "," {
                                self.out.push(',');
                            } else {
                                self.emit_atom(c.tag.name);
                            }
                            self.write(&c.args[1], rmax);
                            if parens {
                                self.emit(")");
                            }
                            return;
                        }
                    }
                    if c.tag.arity == 1 {
                        if let Some(def) = self.ops.prefix(c.tag.name) {
                            let (_, rmax) = def.arg_priorities();
                            let parens = def.priority > max_prec;
                            if parens {
                                self.emit("(");
                            }
                            self.emit_atom(c.tag.name);
                            // `- 1` must not re-read as the literal -1
                            if matches!(c.tag.name.as_str(), "-" | "+")
                                && matches!(
                                    c.args[0].deref(),
                                    Term::Int(_) | Term::Float(_) | Term::Decimal(_)
                                )
                            {
                                self.out.push(' ');
                            }
                            self.write(&c.args[0], rmax);
                            if parens {
                                self.emit(")");
                            }
                            return;
                        }
                        if let Some(def) = self.ops.postfix(c.tag.name) {
                            let (lmax, _) = def.arg_priorities();
                            let parens = def.priority > max_prec;
                            if parens {
                                self.emit("(");
                            }
                            self.write(&c.args[0], lmax);
                            self.emit_atom(c.tag.name);
                            if parens {
                                self.emit(")");
                            }
                            return;
                        }
                    }
                }
                // functional notation
                self.emit_atom(c.tag.name);
                self.out.push('(');
                for (i, arg) in c.args.iter().enumerate() {
                    if i > 0 {
                        self.out.push(',');
                    }
                    self.write(arg, 999);
                }
                self.out.push(')');
            }
        }
    }

    fn write_list(&mut self, head: &Term, tail: &Term) {
        self.emit("[");
        self.write(head, 999);
        let mut rest = tail.deref();
        loop {
            match rest {
                Term::Atom(a) if a == "[]" => break,
                Term::Compound(ref c) if c.tag.name == "." && c.tag.arity == 2 => {
                    self.out.push(',');
                    self.write(&c.args[0], 999);
                    rest = c.args[1].deref();
                }
                other => {
                    self.out.push('|');
                    self.write(&other, 999);
                    break;
                }
            }
        }
        self.emit("]");
    }
}
