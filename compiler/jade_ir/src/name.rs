//! Interned string identifiers.
//!
//! Class, method, and field names appear many times across a compilation;
//! interning them gives O(1) equality and hashing and keeps IR nodes
//! `Copy`. The interner is owned by one compilation and accessed from the
//! single compiling thread, so no locking is involved.

use std::fmt;

use rustc_hash::FxHashMap;

/// Interned string identifier.
///
/// A `Name` is an index into the [`StringInterner`] that produced it.
/// Comparing two `Name`s from the same interner compares string contents.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[repr(transparent)]
pub struct Name(u32);

impl Name {
    /// Pre-interned empty string.
    pub const EMPTY: Name = Name(0);

    /// Create from a raw index. Only meaningful for indices previously
    /// returned by an interner (tests use small raw values directly).
    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Name(raw)
    }

    /// Get the raw `u32` index.
    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Name({})", self.0)
    }
}

/// String interner for one compilation.
///
/// Index 0 is always the empty string, so [`Name::EMPTY`] is valid for
/// every interner.
pub struct StringInterner {
    map: FxHashMap<String, u32>,
    strings: Vec<String>,
}

impl StringInterner {
    /// Create an interner with the empty string pre-interned.
    pub fn new() -> Self {
        let mut interner = Self {
            map: FxHashMap::default(),
            strings: Vec::with_capacity(64),
        };
        interner.map.insert(String::new(), 0);
        interner.strings.push(String::new());
        interner
    }

    /// Intern a string, returning its `Name`.
    ///
    /// Interning the same contents twice returns the same `Name`.
    pub fn intern(&mut self, s: &str) -> Name {
        if let Some(&idx) = self.map.get(s) {
            return Name(idx);
        }
        let idx = u32::try_from(self.strings.len()).unwrap_or_else(|_| {
            // 4 billion distinct identifiers in one method compilation is
            // not a reachable state; saturate rather than wrap.
            u32::MAX
        });
        self.map.insert(s.to_owned(), idx);
        self.strings.push(s.to_owned());
        Name(idx)
    }

    /// Resolve a `Name` back to its string contents.
    ///
    /// Returns the empty string for a `Name` this interner did not produce.
    pub fn resolve(&self, name: Name) -> &str {
        self.strings
            .get(name.0 as usize)
            .map_or("", String::as_str)
    }

    /// Number of interned strings (including the pre-interned empty string).
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    /// Always false: the empty string is pre-interned.
    pub fn is_empty(&self) -> bool {
        false
    }
}

impl Default for StringInterner {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests;
