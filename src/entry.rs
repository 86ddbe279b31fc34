//! Entry: one key/value record with an immutability flag and cached hashes.
//!
//! Entries live behind `Arc` inside a table and may be shared by a map and
//! its not-yet-deepened clones, so the value sits behind its own lock and
//! every mutator takes `&self`.

use crate::error::{Error, Result};
use crate::hashing::{key_hash, string_hash};
use crate::text::normalize_key;
use core::cmp::Ordering;
use core::fmt;
use parking_lot::RwLock;
use std::sync::Arc;

/// Column the ` = value` part starts at in listings.
const LISTING_COLUMN: usize = 18;

#[derive(Clone, Debug)]
struct Slot {
    value: Option<Arc<str>>,
    combined_hash: i64,
}

impl Slot {
    fn new(key_raw_hash: i32, value: Option<Arc<str>>) -> Self {
        let combined_hash = combine(key_raw_hash, value.as_deref());
        Self {
            value,
            combined_hash,
        }
    }
}

fn combine(key_raw_hash: i32, value: Option<&str>) -> i64 {
    match value {
        Some(v) => i64::from(key_raw_hash ^ string_hash(v)),
        None => i64::from(key_raw_hash),
    }
}

/// A key/value record.
///
/// The key is trimmed, non-empty and fixed for the entry's lifetime. The
/// value may be absent, which is distinct from the empty string. An
/// immutable entry rejects every attempt to change its value to a
/// *different* value; re-setting the same value always succeeds.
pub struct Entry {
    key: Arc<str>,
    key_raw_hash: i32,
    key_hash: u32,
    immutable: bool,
    slot: RwLock<Slot>,
}

impl Entry {
    /// Build a standalone entry. The key is trimmed first.
    pub fn new(key: &str, value: Option<&str>, immutable: bool) -> Result<Self> {
        let key = normalize_key(key)?;
        Ok(Self::from_parts(Arc::from(key), value.map(Arc::from), immutable))
    }

    /// `key` must already be normalized.
    pub(crate) fn from_parts(key: Arc<str>, value: Option<Arc<str>>, immutable: bool) -> Self {
        let key_raw_hash = string_hash(&key);
        Self {
            key_hash: (key_raw_hash & 0x7FFF_FFFF) as u32,
            key_raw_hash,
            immutable,
            slot: RwLock::new(Slot::new(key_raw_hash, value)),
            key,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub(crate) fn key_arc(&self) -> &Arc<str> {
        &self.key
    }

    /// Current value; `None` when the entry is present without a value.
    pub fn value(&self) -> Option<Arc<str>> {
        self.slot.read().value.clone()
    }

    pub fn has_value(&self) -> bool {
        self.slot.read().value.is_some()
    }

    pub fn is_immutable(&self) -> bool {
        self.immutable
    }

    /// Slot hash, derived from the key alone.
    pub fn key_hash(&self) -> u32 {
        debug_assert_eq!(self.key_hash, key_hash(&self.key));
        self.key_hash
    }

    /// Hash over key and value, recomputed on every value change.
    pub fn combined_hash(&self) -> i64 {
        self.slot.read().combined_hash
    }

    /// Replace the value and return the previous one.
    ///
    /// Fails with [`Error::ImmutableConflict`] when the entry is immutable
    /// and `new` differs from the current value; the value stays intact.
    pub fn set_value(&self, new: Option<&str>) -> Result<Option<Arc<str>>> {
        let mut slot = self.slot.write();
        if slot.value.as_deref() == new {
            return Ok(slot.value.clone());
        }
        if self.immutable {
            return Err(Error::immutable(&self.key));
        }
        let new = new.map(Arc::from);
        let old = core::mem::replace(&mut *slot, Slot::new(self.key_raw_hash, new));
        Ok(old.value)
    }

    /// True when the current value equals `other`.
    pub fn value_eq(&self, other: Option<&str>) -> bool {
        self.slot.read().value.as_deref() == other
    }

    /// Deterministic listing order: by key only.
    pub fn cmp_key(&self, other: &Entry) -> Ordering {
        self.key.cmp(&other.key)
    }
}

impl Clone for Entry {
    /// A private copy with the same key, value and flag.
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            key_raw_hash: self.key_raw_hash,
            key_hash: self.key_hash,
            immutable: self.immutable,
            slot: RwLock::new(self.slot.read().clone()),
        }
    }
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        if core::ptr::eq(self, other) {
            return true;
        }
        self.key == other.key && other.value_eq(self.value().as_deref())
    }
}

impl Eq for Entry {}

impl fmt::Debug for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entry")
            .field("key", &self.key)
            .field("value", &self.value())
            .field("immutable", &self.immutable)
            .finish()
    }
}

impl fmt::Display for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.value() {
            Some(v) => write!(f, " {:<width$} = {}", self.key, v, width = LISTING_COLUMN - 1),
            None => write!(f, " {} ", self.key),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Invariant: keys are trimmed; empty or blank keys are rejected.
    #[test]
    fn construction_trims_and_validates() {
        let e = Entry::new("  k1\t", Some("v"), false).unwrap();
        assert_eq!(e.key(), "k1");
        assert_eq!(e.value().as_deref(), Some("v"));
        assert!(matches!(Entry::new("   ", None, false), Err(Error::EmptyKey)));
        assert!(matches!(Entry::new("", Some("v"), true), Err(Error::EmptyKey)));
    }

    /// Invariant: an absent value is distinct from the empty string.
    #[test]
    fn absent_is_not_empty() {
        let a = Entry::new("k", None, false).unwrap();
        let b = Entry::new("k", Some(""), false).unwrap();
        assert!(!a.has_value());
        assert!(b.has_value());
        assert_ne!(a, b);
        assert_eq!(a, Entry::new("k", None, true).unwrap());
    }

    /// Invariant: setting an immutable entry to the same value never fails;
    /// a different value always fails and leaves the old value intact.
    #[test]
    fn immutable_idempotence() {
        let e = Entry::new("k", Some("v"), true).unwrap();
        assert_eq!(e.set_value(Some("v")).unwrap().as_deref(), Some("v"));
        match e.set_value(Some("w")) {
            Err(Error::ImmutableConflict { key }) => assert_eq!(key, "k"),
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(e.set_value(None).is_err());
        assert_eq!(e.value().as_deref(), Some("v"));

        let n = Entry::new("n", None, true).unwrap();
        assert!(n.set_value(None).unwrap().is_none());
        assert!(n.set_value(Some("")).is_err());
    }

    /// Invariant: the combined hash follows the value; the key hash never moves.
    #[test]
    fn hashes_track_value() {
        let e = Entry::new("key", None, false).unwrap();
        let kh = e.key_hash();
        assert_eq!(e.combined_hash(), i64::from(string_hash("key")));
        let old = e.set_value(Some("value")).unwrap();
        assert!(old.is_none());
        assert_eq!(
            e.combined_hash(),
            i64::from(string_hash("key") ^ string_hash("value"))
        );
        assert_eq!(e.key_hash(), kh);
        e.set_value(None).unwrap();
        assert_eq!(e.combined_hash(), i64::from(string_hash("key")));
    }

    /// Invariant: a clone is a private copy; later changes do not leak.
    #[test]
    fn clone_is_independent() {
        let e = Entry::new("k", Some("1"), false).unwrap();
        let c = e.clone();
        e.set_value(Some("2")).unwrap();
        assert_eq!(c.value().as_deref(), Some("1"));
        assert_eq!(e.value().as_deref(), Some("2"));
    }

    /// Invariant: ordering looks at keys only; equality at keys and values.
    #[test]
    fn ordering_and_equality() {
        let a = Entry::new("a", Some("z"), false).unwrap();
        let b = Entry::new("b", Some("a"), false).unwrap();
        let a2 = Entry::new("a", Some("y"), false).unwrap();
        assert_eq!(a.cmp_key(&b), Ordering::Less);
        assert_eq!(a.cmp_key(&a2), Ordering::Equal);
        assert_ne!(a, a2);
        assert_eq!(a, a.clone());
    }

    /// Invariant: listings pad the key to a fixed column.
    #[test]
    fn display_listing() {
        let e = Entry::new("k", Some("v"), false).unwrap();
        assert_eq!(e.to_string(), format!(" k{} = v", " ".repeat(16)));
        let n = Entry::new("bare", None, false).unwrap();
        assert_eq!(n.to_string(), " bare ");
    }
}
