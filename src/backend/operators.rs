//! The operator table consulted by the reader and writer.
//!
//! Operators are (name, priority, type) triples, mutable at load time via
//! `op/3`. Readers take a cloned snapshot for the duration of one parse, so
//! a directive changing the table never invalidates a parse in flight.

use std::collections::HashMap;
use std::fmt;

use super::error::PrologError;
use super::symbol::{atom, Atom};
use super::term::Term;

/// Operator kind: prefix `fx|fy`, infix `xfx|xfy|yfx`, postfix `xf|yf`.
/// An `x` argument accepts strictly lower priority, a `y` argument equal.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum OpType {
    Xfx,
    Xfy,
    Yfx,
    Fy,
    Fx,
    Xf,
    Yf,
}

impl OpType {
    pub fn from_atom(a: Atom) -> Option<OpType> {
        match a.as_str() {
            "xfx" => Some(OpType::Xfx),
            "xfy" => Some(OpType::Xfy),
            "yfx" => Some(OpType::Yfx),
            "fy" => Some(OpType::Fy),
            "fx" => Some(OpType::Fx),
            "xf" => Some(OpType::Xf),
            "yf" => Some(OpType::Yf),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OpType::Xfx => "xfx",
            OpType::Xfy => "xfy",
            OpType::Yfx => "yfx",
            OpType::Fy => "fy",
            OpType::Fx => "fx",
            OpType::Xf => "xf",
            OpType::Yf => "yf",
        }
    }

    pub fn is_prefix(&self) -> bool {
        matches!(self, OpType::Fy | OpType::Fx)
    }

    pub fn is_infix(&self) -> bool {
        matches!(self, OpType::Xfx | OpType::Xfy | OpType::Yfx)
    }

    pub fn is_postfix(&self) -> bool {
        matches!(self, OpType::Xf | OpType::Yf)
    }
}

impl fmt::Display for OpType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One operator definition
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct OpDef {
    pub priority: u16,
    pub typ: OpType,
}

impl OpDef {
    /// Maximum priority each argument position accepts
    pub fn arg_priorities(&self) -> (u16, u16) {
        let p = self.priority;
        match self.typ {
            OpType::Xfx => (p - 1, p - 1),
            OpType::Xfy => (p - 1, p),
            OpType::Yfx => (p, p - 1),
            OpType::Fy => (0, p),
            OpType::Fx => (0, p - 1),
            OpType::Xf => (p - 1, 0),
            OpType::Yf => (p, 0),
        }
    }
}

/// Mutable set of operator definitions. An atom may carry at most one prefix
/// definition and one infix-or-postfix definition at a time.
#[derive(Clone, Debug)]
pub struct OperatorTable {
    prefix: HashMap<Atom, OpDef>,
    infix: HashMap<Atom, OpDef>,
    postfix: HashMap<Atom, OpDef>,
}

impl OperatorTable {
    pub fn empty() -> Self {
        OperatorTable {
            prefix: HashMap::new(),
            infix: HashMap::new(),
            postfix: HashMap::new(),
        }
    }

    /// The ISO core operator set
    pub fn with_iso_defaults() -> Self {
        let mut t = OperatorTable::empty();
        let defs: &[(u16, OpType, &str)] = &[
            (1200, OpType::Xfx, ":-"),
            (1200, OpType::Xfx, "-->"),
            (1200, OpType::Fx, ":-"),
            (1200, OpType::Fx, "?-"),
            (1100, OpType::Xfy, ";"),
            (1100, OpType::Xfy, "|"),
            (1050, OpType::Xfy, "->"),
            (1000, OpType::Xfy, ","),
            (900, OpType::Fy, "\\+"),
            (700, OpType::Xfx, "="),
            (700, OpType::Xfx, "\\="),
            (700, OpType::Xfx, "=="),
            (700, OpType::Xfx, "\\=="),
            (700, OpType::Xfx, "@<"),
            (700, OpType::Xfx, "@>"),
            (700, OpType::Xfx, "@=<"),
            (700, OpType::Xfx, "@>="),
            (700, OpType::Xfx, "=.."),
            (700, OpType::Xfx, "is"),
            (700, OpType::Xfx, "=:="),
            (700, OpType::Xfx, "=\\="),
            (700, OpType::Xfx, "<"),
            (700, OpType::Xfx, ">"),
            (700, OpType::Xfx, "=<"),
            (700, OpType::Xfx, ">="),
            (500, OpType::Yfx, "+"),
            (500, OpType::Yfx, "-"),
            (500, OpType::Yfx, "/\\"),
            (500, OpType::Yfx, "\\/"),
            (500, OpType::Yfx, "xor"),
            (400, OpType::Yfx, "*"),
            (400, OpType::Yfx, "/"),
            (400, OpType::Yfx, "//"),
            (400, OpType::Yfx, "mod"),
            (400, OpType::Yfx, "rem"),
            (400, OpType::Yfx, "div"),
            (400, OpType::Yfx, "<<"),
            (400, OpType::Yfx, ">>"),
            (200, OpType::Xfx, "**"),
            (200, OpType::Xfy, "^"),
            (200, OpType::Fy, "-"),
            (200, OpType::Fy, "+"),
            (200, OpType::Fy, "\\"),
        ];
        for &(priority, typ, name) in defs {
            t.install(atom(name), OpDef { priority, typ });
        }
        t
    }

    fn install(&mut self, name: Atom, def: OpDef) {
        let table = match def.typ {
            t if t.is_prefix() => &mut self.prefix,
            t if t.is_infix() => &mut self.infix,
            _ => &mut self.postfix,
        };
        table.insert(name, def);
    }

    pub fn prefix(&self, name: Atom) -> Option<OpDef> {
        self.prefix.get(&name).copied()
    }

    pub fn infix(&self, name: Atom) -> Option<OpDef> {
        self.infix.get(&name).copied()
    }

    pub fn postfix(&self, name: Atom) -> Option<OpDef> {
        self.postfix.get(&name).copied()
    }

    /// True when the atom has any operator definition
    pub fn is_operator(&self, name: Atom) -> bool {
        self.prefix.contains_key(&name)
            || self.infix.contains_key(&name)
            || self.postfix.contains_key(&name)
    }

    /// Apply an `op(Priority, Type, Name)` declaration. Priority 0 removes
    /// the definition of that type.
    pub fn declare(&mut self, priority: i64, typ: OpType, name: Atom) -> Result<(), PrologError> {
        if !(0..=1200).contains(&priority) {
            return Err(PrologError::domain_error(
                "operator_priority",
                Term::int(priority),
            ));
        }
        if name == "," {
            return Err(PrologError::permission_error(
                "modify",
                "operator",
                Term::Atom(name),
            ));
        }
        if name == "[]" || name == "{}" {
            return Err(PrologError::permission_error(
                "create",
                "operator",
                Term::Atom(name),
            ));
        }
        if priority == 0 {
            match typ {
                t if t.is_prefix() => self.prefix.remove(&name),
                t if t.is_infix() => self.infix.remove(&name),
                _ => self.postfix.remove(&name),
            };
            return Ok(());
        }
        // An atom may not be both an infix and a postfix operator
        if typ.is_infix() && self.postfix.contains_key(&name)
            || typ.is_postfix() && self.infix.contains_key(&name)
        {
            return Err(PrologError::permission_error(
                "create",
                "operator",
                Term::Atom(name),
            ));
        }
        self.install(
            name,
            OpDef {
                priority: priority as u16,
                typ,
            },
        );
        Ok(())
    }

    /// All definitions, for `current_op/3`
    pub fn iter(&self) -> Vec<(u16, OpType, Atom)> {
        let mut out = Vec::new();
        for (&name, &def) in self
            .prefix
            .iter()
            .chain(self.infix.iter())
            .chain(self.postfix.iter())
        {
            out.push((def.priority, def.typ, name));
        }
        out.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.2.cmp(&b.2)));
        out
    }
}

impl Default for OperatorTable {
    fn default() -> Self {
        Self::with_iso_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iso_defaults_present() {
        let t = OperatorTable::with_iso_defaults();
        assert_eq!(
            t.infix(atom(":-")),
            Some(OpDef {
                priority: 1200,
                typ: OpType::Xfx
            })
        );
        assert!(t.prefix(atom("-")).is_some());
        assert!(t.infix(atom("-")).is_some());
        assert!(t.is_operator(atom("mod")));
        assert!(!t.is_operator(atom("likes")));
    }

    #[test]
    fn test_declare_and_remove() {
        let mut t = OperatorTable::with_iso_defaults();
        t.declare(700, OpType::Xfx, atom("likes")).unwrap();
        assert_eq!(t.infix(atom("likes")).unwrap().priority, 700);
        t.declare(0, OpType::Xfx, atom("likes")).unwrap();
        assert!(t.infix(atom("likes")).is_none());
    }

    #[test]
    fn test_comma_is_protected() {
        let mut t = OperatorTable::with_iso_defaults();
        assert!(t.declare(800, OpType::Xfy, atom(",")).is_err());
    }

    #[test]
    fn test_priority_range_checked() {
        let mut t = OperatorTable::with_iso_defaults();
        assert!(t.declare(1300, OpType::Xfx, atom("oops")).is_err());
        assert!(t.declare(-1, OpType::Xfx, atom("oops")).is_err());
    }

    #[test]
    fn test_infix_postfix_conflict() {
        let mut t = OperatorTable::empty();
        t.declare(500, OpType::Yfx, atom("after")).unwrap();
        assert!(t.declare(500, OpType::Xf, atom("after")).is_err());
    }
}
