//! Atom interning for fast identity comparison and reduced memory usage
//!
//! Prolog compares atoms by identity, so every atom name is interned exactly
//! once in a global table and represented by a 4-byte key. Interning uses
//! lasso's ThreadedRodeo, which is safe under concurrent readers and writers,
//! so several interpreters sharing one environment never race on the table.
//!
//! `CompoundTag` is the interned (functor, arity) pair used as the predicate
//! key and for fast equality of compound term shapes.

use std::cmp::Ordering;
use std::fmt;
use std::sync::OnceLock;

use lasso::{Spur, ThreadedRodeo};

/// Global interner for atom names - lazily initialized, thread-safe
static INTERNER: OnceLock<ThreadedRodeo> = OnceLock::new();

/// Get or initialize the global interner
#[inline]
fn interner() -> &'static ThreadedRodeo {
    INTERNER.get_or_init(ThreadedRodeo::new)
}

/// Interned atom - 4 bytes, O(1) comparison
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub struct Atom(Spur);

impl Atom {
    /// Intern a name and return its atom (interns if new)
    #[inline]
    pub fn new(name: &str) -> Self {
        Atom(interner().get_or_intern(name))
    }

    /// Intern an owned name without re-borrowing
    #[inline]
    pub fn from_string(name: String) -> Self {
        Atom(interner().get_or_intern(name))
    }

    /// Get the name of this atom
    #[inline]
    pub fn as_str(&self) -> &'static str {
        interner().resolve(&self.0)
    }
}

impl fmt::Debug for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Atom({:?})", self.as_str())
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<&str> for Atom {
    #[inline]
    fn from(s: &str) -> Self {
        Atom::new(s)
    }
}

impl From<String> for Atom {
    #[inline]
    fn from(s: String) -> Self {
        Atom::from_string(s)
    }
}

impl PartialEq<str> for Atom {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == other
    }
}

impl PartialEq<&str> for Atom {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}

// The standard order of terms sorts atoms alphabetically, not by intern key.
impl Ord for Atom {
    fn cmp(&self, other: &Self) -> Ordering {
        if self.0 == other.0 {
            Ordering::Equal
        } else {
            self.as_str().cmp(other.as_str())
        }
    }
}

impl PartialOrd for Atom {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Intern a name and return its atom
#[inline]
pub fn atom(name: &str) -> Atom {
    Atom::new(name)
}

/// Interned (functor, arity) pair - the predicate key
///
/// Two compound terms have equal shape iff their tags are equal, which is a
/// pair of O(1) comparisons.
#[derive(Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct CompoundTag {
    pub name: Atom,
    pub arity: usize,
}

impl CompoundTag {
    #[inline]
    pub fn new(name: Atom, arity: usize) -> Self {
        CompoundTag { name, arity }
    }
}

/// Intern a (functor, arity) pair and return its tag
#[inline]
pub fn tag(name: &str, arity: usize) -> CompoundTag {
    CompoundTag::new(Atom::new(name), arity)
}

impl fmt::Debug for CompoundTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CompoundTag({}/{})", self.name, self.arity)
    }
}

impl fmt::Display for CompoundTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.name, self.arity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_atom_identity() {
        let a1 = atom("hello");
        let a2 = atom("hello");
        let a3 = atom("world");
        assert_eq!(a1, a2);
        assert_ne!(a1, a3);
        assert_eq!(a1.as_str(), "hello");
    }

    #[test]
    fn test_atom_order_is_alphabetical() {
        // Intern in reverse order so intern keys disagree with name order
        let b = atom("zzz");
        let a = atom("aaa");
        assert!(a < b);
    }

    #[test]
    fn test_tag_equality() {
        let t1 = tag("foo", 2);
        let t2 = tag("foo", 2);
        let t3 = tag("foo", 3);
        assert_eq!(t1, t2);
        assert_ne!(t1, t3);
        assert_eq!(format!("{}", t1), "foo/2");
    }

    #[test]
    fn test_atom_partial_eq_str() {
        let a = atom("likes");
        assert!(a == "likes");
        assert!(a != "hates");
    }
}
