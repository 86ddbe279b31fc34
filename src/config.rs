//! Construction-time tunables for a `PropMap`.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Probe-distance policy deciding when `put` gives up on probing and
/// rehashes instead.
///
/// An insertion whose free slot lies more than `max_probe` steps from the
/// key's natural slot triggers a rehash once the table is more than half
/// full. While scanning past the guaranteed probe window, the search stops
/// early after `scan_limit` steps on a more than half full table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct RehashPolicy {
    pub max_probe: usize,
    pub scan_limit: usize,
}

impl Default for RehashPolicy {
    fn default() -> Self {
        Self {
            max_probe: 10,
            scan_limit: 13,
        }
    }
}

/// Languages tried by the default fallback step of the language cascade.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct FallbackConfig {
    /// First fallback language.
    pub primary: String,
    /// Region tried once with the primary language (`{primary}_{region}.key`).
    pub primary_region: String,
    /// Second fallback language.
    pub secondary: String,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            primary: "en".to_owned(),
            primary_region: "GB".to_owned(),
            secondary: "de".to_owned(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct MapConfig {
    /// Requested initial capacity; rounded up to the prime table.
    pub start_capacity: usize,
    /// Number of slots in the resolved-value ring cache.
    pub cache_len: usize,
    /// Language used when neither the caller nor the map's own `language`
    /// entry names one.
    pub default_language: String,
    pub rehash: RehashPolicy,
    pub fallback: FallbackConfig,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            start_capacity: 71,
            cache_len: 11,
            default_language: "en".to_owned(),
            rehash: RehashPolicy::default(),
            fallback: FallbackConfig::default(),
        }
    }
}

impl MapConfig {
    pub fn with_start_capacity(mut self, start_capacity: usize) -> Self {
        self.start_capacity = start_capacity;
        self
    }

    pub fn with_cache_len(mut self, cache_len: usize) -> Self {
        self.cache_len = cache_len;
        self
    }

    pub fn with_rehash_policy(mut self, rehash: RehashPolicy) -> Self {
        self.rehash = rehash;
        self
    }
}
