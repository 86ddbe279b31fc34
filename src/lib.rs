//! propmap: a concurrent string property map with measured open
//! addressing, immutable entries, shallow clones and a cached
//! language/region lookup cascade.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: hold configuration and localisation data that is filled once
//!   (many `put`s from one writer) and then read by many threads, with the
//!   occasional update.
//! - Layers:
//!   - Entry: key, optional value, immutability flag, cached hashes. The
//!     value sits behind a small lock so shared entries can change in
//!     place.
//!   - Table: open-addressing slot array with linear probing, a prime
//!     capacity, probe statistics and adaptive rehashing. Not synchronized.
//!   - PropMap: wraps the table in one reader/writer lock and adds shallow
//!     cloning, the language cascade with its ring cache, and the text
//!     load/store format.
//!
//! Constraints
//! - Keys are trimmed and never blank; values may be absent, which is
//!   distinct from the empty string.
//! - At most one live entry per key.
//! - An immutable entry never changes its value; re-setting the same value
//!   is accepted.
//! - Hashing is deterministic (31-polynomial over UTF-16 units), so slot
//!   layout and probe statistics are reproducible across runs.
//!
//! Probing and rehashing
//! - `miss_max` bounds the distance of every entry from its natural slot,
//!   so lookups scan exactly `miss_max + 1` slots. There are no
//!   tombstones: removal just empties a slot and the window stays valid.
//! - An insertion whose free slot lies too far out for the current load
//!   rehashes instead, placing the new entry during the same pass. The
//!   thresholds live in `RehashPolicy`.
//! - Rehashing always grows the table to the next prime at or above
//!   `size + capacity + 13` and resets the probe statistics.
//!
//! Concurrency
//! - Lookups and cache hits take the read lock; everything that changes
//!   slots, counters, locale or cache takes the write lock. Guards are
//!   scoped, so every exit path releases them.
//! - Load and store do their I/O outside the lock; load applies the parsed
//!   pairs under one write lock.
//!
//! Clone semantics
//! - `PropMap::clone` copies the slot array and shares the entries.
//!   `deepen` later gives the clone private copies of its mutable entries;
//!   immutable ones stay shared since they can never diverge.
//!
//! Language cascade
//! - `resolve(key, default)` tries `{language}_{region}.key`,
//!   `{language}.key` and then a pluggable `LanguageFallback`. Outcomes
//!   (including "nothing found") are cached in a small ring that is
//!   cleared whenever language, region or content change. A hit keeps the
//!   entry, not its value, so in-place changes through shared entries are
//!   seen.
//!
//! Notes and non-goals
//! - No persistence beyond the flat text format; no binary format, no
//!   transactions, no multi-key atomicity. `put_all` and `load` are not
//!   atomic across the batch.
//! - No schema or typing beyond string keys and values; the typed getters
//!   only interpret stored strings.

mod cache;
pub mod codec;
pub mod config;
pub mod entry;
pub mod error;
pub mod hashing;
pub mod lang;
mod prop_map;
mod table;
mod table_proptest;
pub mod text;

// Public surface
pub use codec::{escape, escape_key, unescape, Encoding};
pub use config::{FallbackConfig, MapConfig, RehashPolicy};
pub use entry::Entry;
pub use error::{Error, EscapeError, Result};
pub use lang::{DefaultFallback, LanguageFallback, NoFallback};
pub use prop_map::PropMap;
pub use table::HashQuality;
pub use text::{parse_bool, parse_int, parse_long};
