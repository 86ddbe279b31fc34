//! Table: the open-addressing slot array with probe statistics.
//!
//! Not synchronized; `PropMap` keeps it behind a reader/writer lock.
//!
//! Layout and invariants
//! - `slots.len()` is a prime from the capacity table (or an odd number
//!   beyond it). Empty is a first-class slot state; there are no
//!   tombstones.
//! - Linear forward probing from `key_hash % capacity`, wrapping.
//! - `miss_max` is the largest probe distance recorded since the last
//!   rehash. Every live entry sits within `miss_max` steps of its natural
//!   slot, so a lookup scans exactly `miss_max + 1` slots and may step over
//!   empty ones. Removal only empties slots and never raises the bound.
//! - At most one live entry per key.

use crate::config::RehashPolicy;
use crate::entry::Entry;
use crate::error::{Error, Result};
use crate::hashing::{key_hash, prime_at_least};
use crate::text::is_valid_key;
use core::fmt;
use std::sync::Arc;

/// Extra slots added on every rehash on top of `size + capacity`.
const GROWTH_PAD: usize = 13;

/// Outcome of a key probe.
enum Probe {
    Occupied(usize),
    Vacant { slot: usize, distance: usize },
    Exhausted,
}

/// Snapshot of the probe statistics.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HashQuality {
    pub size: usize,
    pub capacity: usize,
    pub rehashes: usize,
    /// Largest probe distance since the last rehash.
    pub miss_max: usize,
    /// Sum of all probe distances since the last rehash.
    pub miss_sum: usize,
}

impl HashQuality {
    /// Average probe distance per entry, times 100.
    pub fn miss_avg_percent(&self) -> usize {
        if self.size == 0 {
            0
        } else {
            100 * self.miss_sum / self.size
        }
    }
}

impl fmt::Display for HashQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "  #  < {} / {} entries; re-hashes= {};\n  #  miss max.= {} steps, avrg.= ({}/100) steps >",
            self.size,
            self.capacity,
            self.rehashes,
            self.miss_max,
            self.miss_avg_percent()
        )
    }
}

#[derive(Clone, Debug)]
pub(crate) struct Table {
    slots: Vec<Option<Arc<Entry>>>,
    size: usize,
    miss_max: usize,
    miss_sum: usize,
    rehashes: usize,
    policy: RehashPolicy,
}

impl Table {
    pub(crate) fn new(start_capacity: usize, policy: RehashPolicy) -> Self {
        Self {
            slots: vec![None; prime_at_least(start_capacity)],
            size: 0,
            miss_max: 0,
            miss_sum: 0,
            rehashes: 0,
            policy,
        }
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.size
    }

    #[inline]
    pub(crate) fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub(crate) fn quality(&self) -> HashQuality {
        HashQuality {
            size: self.size,
            capacity: self.slots.len(),
            rehashes: self.rehashes,
            miss_max: self.miss_max,
            miss_sum: self.miss_sum,
        }
    }

    pub(crate) fn reset_rehash_count(&mut self) {
        self.rehashes = 0;
    }

    #[inline]
    fn home(&self, hash: u32) -> usize {
        hash as usize % self.slots.len()
    }

    #[inline]
    fn next(&self, i: usize) -> usize {
        if i + 1 == self.slots.len() {
            0
        } else {
            i + 1
        }
    }

    /// Slot index holding `key`, if any. Blank-bounded keys never match.
    pub(crate) fn index_of(&self, key: &str) -> Option<usize> {
        if self.size == 0 || !is_valid_key(key) {
            return None;
        }
        let mut i = self.home(key_hash(key));
        for _ in 0..=self.miss_max {
            if let Some(e) = &self.slots[i] {
                if e.key() == key {
                    return Some(i);
                }
            }
            i = self.next(i);
        }
        None
    }

    pub(crate) fn get(&self, key: &str) -> Option<&Arc<Entry>> {
        self.index_of(key).and_then(|i| self.slots[i].as_ref())
    }

    /// Probe for `key`, remembering the first free slot on the way.
    ///
    /// Keys are compared only inside the guaranteed window; past it the
    /// scan just looks for a free slot, bounded by the rehash policy.
    fn probe(&self, key: &str, hash: u32) -> Probe {
        let cap = self.slots.len();
        let mut i = self.home(hash);
        let mut vacant: Option<(usize, usize)> = None;
        for step in 0..cap {
            match &self.slots[i] {
                None => {
                    if vacant.is_none() {
                        vacant = Some((i, step));
                    }
                    if step >= self.miss_max {
                        break;
                    }
                }
                Some(e) => {
                    if step > self.miss_max {
                        if vacant.is_some() {
                            break;
                        }
                        if step > self.policy.scan_limit && self.size * 2 > cap {
                            break;
                        }
                    } else if e.key() == key {
                        return Probe::Occupied(i);
                    }
                }
            }
            i = self.next(i);
        }
        match vacant {
            Some((slot, distance)) => Probe::Vacant { slot, distance },
            None => Probe::Exhausted,
        }
    }

    /// Place a new entry at a probed free slot, or rehash when the slot is
    /// too far out for the current load.
    fn place(&mut self, entry: Arc<Entry>, probe: Probe) {
        if let Probe::Vacant { slot, distance } = probe {
            let too_far =
                distance > self.policy.max_probe && self.size * 2 > self.slots.len();
            if !too_far {
                if distance != 0 {
                    self.miss_max = self.miss_max.max(distance);
                    self.miss_sum += distance;
                }
                self.slots[slot] = Some(entry);
                self.size += 1;
                return;
            }
        }
        self.rehash(Some(entry), 0);
    }

    /// Insert `entry`, replacing the slot of an existing entry with the
    /// same key. Returns the entry that was there before.
    ///
    /// An existing immutable entry is kept (and returned) when the values
    /// agree and causes [`Error::ImmutableConflict`] when they differ.
    pub(crate) fn insert_entry(&mut self, entry: Arc<Entry>) -> Result<Option<Arc<Entry>>> {
        match self.probe(entry.key(), entry.key_hash()) {
            Probe::Occupied(i) => {
                let existing = self.slots[i].as_ref().expect("occupied slot");
                if Arc::ptr_eq(existing, &entry) {
                    return Ok(Some(entry));
                }
                if existing.is_immutable() {
                    return if existing.value_eq(entry.value().as_deref()) {
                        Ok(Some(existing.clone()))
                    } else {
                        Err(Error::immutable(entry.key()))
                    };
                }
                Ok(self.slots[i].replace(entry))
            }
            probe => {
                self.place(entry, probe);
                Ok(None)
            }
        }
    }

    /// Set `key` to `value`, changing an existing mutable entry in place.
    /// Returns `Some(previous value)` when the key was present.
    ///
    /// `key` must already be normalized.
    pub(crate) fn insert_value(
        &mut self,
        key: &str,
        value: Option<&str>,
        immutable: bool,
    ) -> Result<Option<Option<Arc<str>>>> {
        let hash = key_hash(key);
        match self.probe(key, hash) {
            Probe::Occupied(i) => {
                let existing = self.slots[i].as_ref().expect("occupied slot");
                if immutable && !existing.is_immutable() {
                    let old = existing.value();
                    let upgraded =
                        Entry::from_parts(existing.key_arc().clone(), value.map(Arc::from), true);
                    self.slots[i] = Some(Arc::new(upgraded));
                    return Ok(Some(old));
                }
                existing.set_value(value).map(Some)
            }
            probe => {
                let entry = Entry::from_parts(Arc::from(key), value.map(Arc::from), immutable);
                self.place(Arc::new(entry), probe);
                Ok(None)
            }
        }
    }

    pub(crate) fn remove_at(&mut self, i: usize) -> Option<Arc<Entry>> {
        let e = self.slots.get_mut(i)?.take()?;
        self.size -= 1;
        Some(e)
    }

    pub(crate) fn remove(&mut self, key: &str) -> Option<Arc<Entry>> {
        let i = self.index_of(key)?;
        self.remove_at(i)
    }

    /// Forget all entries and statistics. The slot array is reallocated
    /// only when it is smaller than the requested capacity or more than
    /// twice as large.
    pub(crate) fn clear(&mut self, start_capacity: usize) {
        let cap = prime_at_least(start_capacity);
        let old = self.slots.len();
        if old < cap || old - cap > cap {
            self.slots = vec![None; cap];
        } else {
            self.slots.iter_mut().for_each(|s| *s = None);
        }
        self.size = 0;
        self.miss_max = 0;
        self.miss_sum = 0;
        self.rehashes = 0;
    }

    /// Grow to the smallest table prime `>= max(size + capacity + 13,
    /// min_capacity)` and reinsert every live entry by pure linear probing.
    /// `pending` is placed first, at its natural slot.
    pub(crate) fn rehash(&mut self, pending: Option<Arc<Entry>>, min_capacity: usize) {
        let old_cap = self.slots.len();
        let needed = (self.size + old_cap + GROWTH_PAD).max(min_capacity);
        let cap = prime_at_least(needed);
        let old = core::mem::replace(&mut self.slots, vec![None; cap]);
        self.miss_max = 0;
        self.miss_sum = 0;
        self.rehashes += 1;

        if let Some(e) = pending {
            let i = self.home(e.key_hash());
            self.slots[i] = Some(e);
            self.size += 1;
        }
        for e in old.into_iter().flatten() {
            let mut i = self.home(e.key_hash());
            let mut distance = 0;
            while self.slots[i].is_some() {
                distance += 1;
                i = self.next(i);
            }
            self.slots[i] = Some(e);
            if distance != 0 {
                self.miss_max = self.miss_max.max(distance);
                self.miss_sum += distance;
            }
        }
        tracing::debug!(
            old_cap,
            new_cap = cap,
            size = self.size,
            rehashes = self.rehashes,
            miss_max = self.miss_max,
            "rehashed property table"
        );
    }

    /// Live entries in slot order.
    pub(crate) fn iter(&self) -> impl Iterator<Item = &Arc<Entry>> {
        self.slots.iter().flatten()
    }

    /// Replace every mutable entry with a private copy.
    pub(crate) fn detach_mutable(&mut self) -> usize {
        let mut copied = 0;
        for slot in self.slots.iter_mut() {
            if let Some(e) = slot {
                if !e.is_immutable() {
                    *e = Arc::new(Entry::clone(e));
                    copied += 1;
                }
            }
        }
        copied
    }

    /// Check the structural invariants; used by tests.
    #[cfg(test)]
    pub(crate) fn assert_consistent(&self) {
        let cap = self.slots.len();
        let mut seen = std::collections::HashSet::new();
        let mut live = 0;
        for (i, slot) in self.slots.iter().enumerate() {
            if let Some(e) = slot {
                live += 1;
                assert!(seen.insert(e.key().to_owned()), "duplicate key {}", e.key());
                let home = e.key_hash() as usize % cap;
                let distance = (i + cap - home) % cap;
                assert!(
                    distance <= self.miss_max,
                    "{} at distance {} beyond miss_max {}",
                    e.key(),
                    distance,
                    self.miss_max
                );
                assert_eq!(self.index_of(e.key()), Some(i));
            }
        }
        assert_eq!(live, self.size);
        assert!(self.size <= cap);
    }
}
