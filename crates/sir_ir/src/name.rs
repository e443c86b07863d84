//! Interned identifiers.
//!
//! The teacher's `ori_ir::interner` shards a concurrent interner across 16
//! `RwLock`-guarded buckets because Ori's frontend interns identifiers from
//! multiple parser/query threads at once. SIR lowering is single-threaded
//! cooperative (§5): one lowering pass over one module, no suspension
//! points. The sharding buys nothing here and costs an extra
//! indirection per lookup, so `StringInterner` is a plain
//! `FxHashMap<Box<str>, Name>` behind no lock at all, owned by whichever
//! `Module` created it.

use rustc_hash::FxHashMap;

/// An interned string: a module name, a variable name, a field name, a
/// source-file name, or a type's canonical name (used as the composite-type
/// cache key per §4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Name(u32);

impl Name {
    /// Pre-interned empty string, used for "no name" (catch-all clauses,
    /// unknown source locations).
    pub const EMPTY: Name = Name(0);

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl Default for Name {
    fn default() -> Self {
        Name::EMPTY
    }
}

/// Owns the backing storage for every `Name` handed out for a given module.
pub struct StringInterner {
    map: FxHashMap<Box<str>, Name>,
    strings: Vec<Box<str>>,
}

impl StringInterner {
    pub fn new() -> Self {
        let mut strings = Vec::with_capacity(256);
        strings.push("".into());
        let mut map = FxHashMap::default();
        map.insert("".into(), Name::EMPTY);
        Self { map, strings }
    }

    /// Interns `s`, returning its stable `Name`. Repeated interning of the
    /// same text returns the same `Name` (invariant 7 in §8: idempotent
    /// queries).
    pub fn intern(&mut self, s: &str) -> Name {
        if let Some(&name) = self.map.get(s) {
            return name;
        }
        let idx = u32::try_from(self.strings.len())
            .expect("interner holds more than u32::MAX strings");
        let name = Name(idx);
        self.strings.push(s.into());
        self.map.insert(s.into(), name);
        name
    }

    pub fn resolve(&self, name: Name) -> &str {
        &self.strings[name.0 as usize]
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }
}

impl Default for StringInterner {
    fn default() -> Self {
        Self::new()
    }
}
