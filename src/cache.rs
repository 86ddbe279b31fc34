//! Ring cache of resolved localized values.
//!
//! Slots are not tagged with a language; the owner clears the whole ring
//! whenever language or region changes. A cached outcome may be "nothing
//! found", which is distinct from a found empty string.
//!
//! A hit remembers the entry itself, not its value. Values of shared
//! entries may change through a shallow clone or an `Entry` handle without
//! the owner noticing, so the value is read from the entry on every hit.

use crate::entry::Entry;
use std::sync::Arc;

/// What the cascade found for a key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Resolved {
    /// An entry was found; its value may itself be absent.
    Found(Arc<Entry>),
    NotFound,
}

impl Resolved {
    /// The found entry's current value, or `default` when nothing or an
    /// absent value was found.
    pub(crate) fn value_or(&self, default: &str) -> String {
        match self {
            Resolved::Found(e) => e.value().map_or_else(|| default.to_owned(), |v| v.to_string()),
            Resolved::NotFound => default.to_owned(),
        }
    }
}

#[derive(Debug)]
pub(crate) struct LangCache {
    ring: Vec<Option<(Arc<str>, Resolved)>>,
    next: usize,
}

impl LangCache {
    pub(crate) fn new(len: usize) -> Self {
        Self {
            ring: vec![None; len],
            next: 0,
        }
    }

    pub(crate) fn get(&self, key: &str) -> Option<&Resolved> {
        self.ring
            .iter()
            .flatten()
            .find(|(k, _)| &**k == key)
            .map(|(_, r)| r)
    }

    /// Store an outcome, overwriting the oldest slot once the ring is full.
    pub(crate) fn insert(&mut self, key: Arc<str>, outcome: Resolved) {
        if self.ring.is_empty() {
            return;
        }
        if let Some(slot) = self
            .ring
            .iter_mut()
            .flatten()
            .find(|(k, _)| **k == *key)
        {
            slot.1 = outcome;
            return;
        }
        self.ring[self.next] = Some((key, outcome));
        self.next = (self.next + 1) % self.ring.len();
    }

    pub(crate) fn clear(&mut self) {
        self.ring.iter_mut().for_each(|s| *s = None);
        self.next = 0;
    }

    #[cfg(test)]
    pub(crate) fn occupied(&self) -> usize {
        self.ring.iter().flatten().count()
    }
}
