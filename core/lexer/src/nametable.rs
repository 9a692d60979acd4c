//! Identifier interning.
//!
//! The name table maps identifier text to small, stable ids. Ids are
//! assigned in insertion order and stay valid for the lifetime of the
//! table, so every later stage can carry a [`NameId`] instead of a string.
//! Deduplication is keyed by (sdbm hash, byte length), matching the wire
//! behavior of the `.east` format.

use rustc_hash::FxHashMap;

/// Stable handle into a [`NameTable`]. Identity is per-table: ids from one
/// table must not be resolved against another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NameId(u32);

impl NameId {
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// The sdbm string hash, applied over raw bytes.
#[must_use]
pub fn sdbm(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0;
    for &b in bytes {
        hash = u64::from(b)
            .wrapping_add(hash << 6)
            .wrapping_add(hash << 16)
            .wrapping_sub(hash);
    }
    hash
}

#[derive(Debug, Clone, Default)]
struct NameEntry {
    text: String,
    hash: u64,
}

/// Interning store for identifier text.
#[derive(Debug, Clone, Default)]
pub struct NameTable {
    entries: Vec<NameEntry>,
    index: FxHashMap<(u64, usize), NameId>,
}

impl NameTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the id of `text`, inserting it if it was not seen before.
    /// Byte-identical texts always resolve to the same id.
    pub fn insert(&mut self, text: &str) -> NameId {
        let hash = sdbm(text.as_bytes());
        let key = (hash, text.len());
        if let Some(&id) = self.index.get(&key) {
            return id;
        }

        let id = NameId(u32::try_from(self.entries.len()).expect("name table overflow"));
        self.entries.push(NameEntry {
            text: text.to_string(),
            hash,
        });
        self.index.insert(key, id);
        id
    }

    /// Resolves an id back to its text.
    ///
    /// # Panics
    ///
    /// Panics if `id` did not come from this table.
    #[must_use = "this is a pure lookup with no side effects"]
    pub fn get(&self, id: NameId) -> &str {
        &self.entries[id.index()].text
    }

    /// Looks up `text` without inserting it.
    #[must_use = "this is a pure lookup with no side effects"]
    pub fn lookup(&self, text: &str) -> Option<NameId> {
        let hash = sdbm(text.as_bytes());
        self.index.get(&(hash, text.len())).copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
