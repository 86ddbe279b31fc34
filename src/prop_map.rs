//! PropMap: the lock-guarded table plus clone management, the cached
//! language cascade and text persistence.
//!
//! Locking
//! - One `parking_lot::RwLock` guards the table, the locale and the cache.
//!   Lookups take the read lock; anything that touches slots, counters,
//!   locale or cache takes the write lock.
//! - Entry values sit behind their own small lock (see `entry`), taken
//!   only while the map lock is held or on an `Arc<Entry>` handed out to a
//!   caller. The map lock is never requested while an entry lock is held.
//! - Operations that read another map (`put_all`, equality) snapshot it
//!   under its read lock first and only then lock `self`, so two maps are
//!   never locked at once.
//! - Load and store do their I/O and parsing outside the lock.

use crate::cache::{LangCache, Resolved};
use crate::codec::{self, Encoding};
use crate::config::MapConfig;
use crate::entry::Entry;
use crate::error::{Error, Result};
use crate::lang::{check_language, check_region, split_locale, DefaultFallback, LanguageFallback};
use crate::table::{HashQuality, Table};
use crate::text::{normalize_key, parse_bool, parse_int, parse_long, trim_blank};
use core::fmt;
use core::sync::atomic::{AtomicBool, Ordering};
use parking_lot::RwLock;
use std::io::{Read, Write};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Default first comment line written by [`PropMap::store`].
const DEFAULT_HEADER: &str = " Map: key = value ";

#[derive(Clone, Debug, Default)]
struct Locale {
    initialized: bool,
    language: String,
    region: String,
}

struct Inner {
    table: Table,
    locale: Locale,
    cache: LangCache,
    /// Bumped on every cache clear so a resolve that raced a mutation does
    /// not store its outcome.
    generation: u64,
}

impl Inner {
    fn new(table: Table, locale: Locale, cache_len: usize) -> Self {
        Self {
            table,
            locale,
            cache: LangCache::new(cache_len),
            generation: 0,
        }
    }

    fn invalidate(&mut self) {
        self.cache.clear();
        self.generation = self.generation.wrapping_add(1);
        trace!(generation = self.generation, "cleared language cache");
    }

    /// First use: take language and region from the map's own `language`
    /// and `region` entries, else the configured default and no region.
    fn init_locale(&mut self, default_language: &str) {
        if self.locale.initialized {
            return;
        }
        let stored_language = stored_value(&self.table, "language");
        let (language, region) = match stored_language.as_deref() {
            Some(v) => split_locale(v),
            None => ("", None),
        };
        let region = match region {
            Some(r) => check_region(r),
            None => stored_value(&self.table, "region").and_then(|r| check_region(&r)),
        };
        self.locale = Locale {
            initialized: true,
            language: check_language(language).unwrap_or_else(|| default_language.to_owned()),
            region: region.unwrap_or_default(),
        };
    }

    /// Fail when a bookkeeping entry (`language`, `region`) is immutable
    /// and holds something other than `value`.
    fn check_sync(&self, key: &str, value: &str) -> Result<()> {
        match self.table.get(key) {
            Some(e) if e.is_immutable() && !e.value_eq(Some(value)) => Err(Error::immutable(key)),
            _ => Ok(()),
        }
    }

    /// Keep a bookkeeping entry in step with the locale, if the map holds
    /// one.
    fn sync_entry(&self, key: &str, value: &str) -> Result<()> {
        if let Some(e) = self.table.get(key) {
            e.set_value(Some(value))?;
        }
        Ok(())
    }

    /// The region `code` selects when it differs from the current one.
    /// Empty clears the region; an invalid code changes nothing.
    fn region_change(&self, code: &str) -> Option<String> {
        let code = trim_blank(code);
        let region = if code.is_empty() {
            String::new()
        } else {
            check_region(code)?
        };
        (region != self.locale.region).then_some(region)
    }

    /// Apply a new language and region, both checked against immutable
    /// bookkeeping entries before anything changes.
    fn apply_locale(&mut self, language: Option<String>, region: Option<String>) -> Result<()> {
        let language = language.filter(|l| *l != self.locale.language);
        if let Some(r) = &region {
            self.check_sync("region", r)?;
        }
        if let Some(l) = &language {
            self.check_sync("language", l)?;
        }
        if let Some(r) = region {
            self.sync_entry("region", &r)?;
            self.locale.region = r;
        }
        if let Some(l) = language {
            self.sync_entry("language", &l)?;
            self.locale.language = l;
        }
        self.invalidate();
        Ok(())
    }

    fn snapshot(&self) -> Vec<(Arc<str>, Option<Arc<str>>, bool)> {
        self.table
            .iter()
            .map(|e| (e.key_arc().clone(), e.value(), e.is_immutable()))
            .collect()
    }
}

fn stored_value(table: &Table, key: &str) -> Option<Arc<str>> {
    table.get(key).and_then(|e| e.value())
}

/// A concurrent string property map.
///
/// Keys are trimmed on the way in and must not be blank. Values may be
/// absent, which is distinct from the empty string. Entries may be marked
/// immutable; such an entry rejects every attempt to change its value to a
/// different one.
///
/// `clone()` is shallow: both maps share their entries until
/// [`deepen`](Self::deepen) gives the clone private copies of all mutable
/// entries. Before that, changing the value of a shared mutable entry is
/// visible through both maps; adding and removing keys is not.
///
/// [`resolve`](Self::resolve) looks keys up through the language cascade
/// and caches its outcomes per current language and region.
pub struct PropMap {
    inner: RwLock<Inner>,
    shallow: AtomicBool,
    fallback: Arc<dyn LanguageFallback>,
    config: MapConfig,
}

impl PropMap {
    pub fn new() -> Self {
        Self::with_config(MapConfig::default())
    }

    /// An empty map with at least `start_capacity` slots.
    pub fn with_capacity(start_capacity: usize) -> Self {
        Self::with_config(MapConfig::default().with_start_capacity(start_capacity))
    }

    pub fn with_config(config: MapConfig) -> Self {
        let fallback = Arc::new(DefaultFallback::new(&config.fallback));
        Self {
            inner: RwLock::new(Inner::new(
                Table::new(config.start_capacity, config.rehash),
                Locale::default(),
                config.cache_len,
            )),
            shallow: AtomicBool::new(false),
            fallback,
            config,
        }
    }

    /// Replace the last step of the language cascade.
    pub fn with_fallback<F: LanguageFallback + 'static>(mut self, fallback: F) -> Self {
        self.fallback = Arc::new(fallback);
        self.inner.get_mut().invalidate();
        self
    }

    pub fn config(&self) -> &MapConfig {
        &self.config
    }

    // ----- lookups -----

    /// The entry stored under `key`.
    ///
    /// Unlike [`get`](Self::get) this tells a missing key apart from a key
    /// present without a value.
    pub fn entry(&self, key: &str) -> Option<Arc<Entry>> {
        let key = normalize_key(key).ok()?;
        self.inner.read().table.get(key).cloned()
    }

    /// The value stored under `key`; `None` for a missing key and for a
    /// key present without a value.
    pub fn get(&self, key: &str) -> Option<String> {
        let key = normalize_key(key).ok()?;
        let inner = self.inner.read();
        let value = inner.table.get(key)?.value()?;
        Some(value.to_string())
    }

    /// Same as [`get`](Self::get).
    pub fn value(&self, key: &str) -> Option<String> {
        self.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        match normalize_key(key) {
            Ok(k) => self.inner.read().table.index_of(k).is_some(),
            Err(_) => false,
        }
    }

    pub fn len(&self) -> usize {
        self.inner.read().table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of slots in the table.
    pub fn capacity(&self) -> usize {
        self.inner.read().table.capacity()
    }

    /// The value, trimmed; `default` when it is missing or blank.
    pub fn get_trimmed(&self, key: &str, default: &str) -> String {
        match self.get(key) {
            Some(v) if !trim_blank(&v).is_empty() => trim_blank(&v).to_owned(),
            _ => default.to_owned(),
        }
    }

    /// Switch value of `key`; `default` when missing or unrecognized.
    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        self.get(key).and_then(|v| parse_bool(&v)).unwrap_or(default)
    }

    pub fn get_int(&self, key: &str, default: i32) -> i32 {
        self.get(key).and_then(|v| parse_int(&v)).unwrap_or(default)
    }

    pub fn get_long(&self, key: &str, default: i64) -> i64 {
        self.get(key).and_then(|v| parse_long(&v)).unwrap_or(default)
    }

    /// Numbered lookup: tries `key{n}`, `key0{n}` (for `n <= 9`),
    /// `key[{n}]` and, for `n == 0` only, the plain `key`.
    pub fn get_indexed(&self, key: &str, n: usize, default: &str) -> String {
        let Ok(name) = normalize_key(key) else {
            return default.to_owned();
        };
        let found = self
            .get(&format!("{name}{n}"))
            .or_else(|| (n <= 9).then(|| self.get(&format!("{name}0{n}"))).flatten())
            .or_else(|| self.get(&format!("{name}[{n}]")))
            .or_else(|| (n == 0).then(|| self.get(name)).flatten());
        found.unwrap_or_else(|| default.to_owned())
    }

    /// Prefixed lookup: tries `{pref1}.key`, `{pref2}.key`, then `key`.
    pub fn get_prefixed(
        &self,
        key: &str,
        pref1: Option<&str>,
        pref2: Option<&str>,
        default: &str,
    ) -> String {
        let Ok(name) = normalize_key(key) else {
            return default.to_owned();
        };
        [pref1, pref2]
            .into_iter()
            .flatten()
            .find_map(|p| self.get(&format!("{p}.{name}")))
            .or_else(|| self.get(name))
            .unwrap_or_else(|| default.to_owned())
    }

    // ----- mutation -----

    /// Store `value` under `key` and return the previous value.
    ///
    /// An existing mutable entry is changed in place, so a shallow clone
    /// sharing it sees the change. Fails with `EmptyKey` for a blank key and
    /// with `ImmutableConflict` when an immutable entry would change.
    pub fn put(&self, key: &str, value: Option<&str>) -> Result<Option<String>> {
        self.put_impl(key, value, false)
            .map(|old| old.flatten().map(|v| v.to_string()))
    }

    /// Like [`put`](Self::put), but the stored entry becomes immutable. A
    /// mutable entry already present is replaced.
    pub fn put_immutable(&self, key: &str, value: Option<&str>) -> Result<Option<String>> {
        self.put_impl(key, value, true)
            .map(|old| old.flatten().map(|v| v.to_string()))
    }

    fn put_impl(
        &self,
        key: &str,
        value: Option<&str>,
        immutable: bool,
    ) -> Result<Option<Option<Arc<str>>>> {
        let key = normalize_key(key)?;
        let mut inner = self.inner.write();
        let old = inner.table.insert_value(key, value, immutable)?;
        inner.invalidate();
        Ok(old)
    }

    /// Store `entry` itself, replacing the slot of a mutable entry with the
    /// same key. Returns the entry that was there before.
    pub fn put_entry(&self, entry: impl Into<Arc<Entry>>) -> Result<Option<Arc<Entry>>> {
        let mut inner = self.inner.write();
        let old = inner.table.insert_entry(entry.into())?;
        inner.invalidate();
        Ok(old)
    }

    /// Insert only if `key` is missing. Returns the value already present,
    /// or `None` after inserting.
    pub fn put_if_absent(&self, key: &str, value: Option<&str>) -> Result<Option<String>> {
        let key = normalize_key(key)?;
        let mut inner = self.inner.write();
        if let Some(e) = inner.table.get(key) {
            return Ok(e.value().map(|v| v.to_string()));
        }
        inner.table.insert_value(key, value, false)?;
        inner.invalidate();
        Ok(None)
    }

    /// Insert only if `key` is missing; reports whether it did.
    pub fn add(&self, key: &str, value: Option<&str>) -> Result<bool> {
        let key = normalize_key(key)?;
        let mut inner = self.inner.write();
        if inner.table.index_of(key).is_some() {
            return Ok(false);
        }
        inner.table.insert_value(key, value, false)?;
        inner.invalidate();
        Ok(true)
    }

    /// Change the value of an existing key; missing keys stay missing.
    /// Returns the previous value.
    pub fn replace(&self, key: &str, value: Option<&str>) -> Result<Option<String>> {
        let key = normalize_key(key)?;
        let mut inner = self.inner.write();
        let Some(e) = inner.table.get(key) else {
            return Ok(None);
        };
        let old = e.set_value(value)?;
        inner.invalidate();
        Ok(old.map(|v| v.to_string()))
    }

    /// Change the value of `key` only while it equals `expected`. Blank
    /// keys fail with `EmptyKey`, like [`put`](Self::put).
    pub fn replace_if(&self, key: &str, expected: Option<&str>, value: Option<&str>) -> Result<bool> {
        let key = normalize_key(key)?;
        let mut inner = self.inner.write();
        let replaced = match inner.table.get(key) {
            Some(e) if e.value_eq(expected) => {
                e.set_value(value)?;
                true
            }
            _ => false,
        };
        if replaced {
            inner.invalidate();
        }
        Ok(replaced)
    }

    /// Remove `key` and return its entry.
    pub fn remove(&self, key: &str) -> Option<Arc<Entry>> {
        let key = normalize_key(key).ok()?;
        let mut inner = self.inner.write();
        let removed = inner.table.remove(key)?;
        inner.invalidate();
        Some(removed)
    }

    /// Remove `key` only while its value equals `expected`. Blank keys
    /// fail with `EmptyKey`.
    pub fn remove_if(&self, key: &str, expected: Option<&str>) -> Result<bool> {
        let key = normalize_key(key)?;
        let mut inner = self.inner.write();
        match inner.table.index_of(key) {
            Some(i) if inner.table.get(key).is_some_and(|e| e.value_eq(expected)) => {
                inner.table.remove_at(i);
                inner.invalidate();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Parse one `key[=:blank]value` line, without escape decoding, and
    /// store it. Returns `true` when the key was new.
    ///
    /// A bare key stores an absent value; a separator with nothing after it
    /// stores the empty string.
    pub fn set_property(&self, line: &str) -> Result<bool> {
        match split_property(line) {
            Some((key, value)) => Ok(self.put_impl(key, value, false)?.is_none()),
            None => Ok(false),
        }
    }

    /// Like [`set_property`](Self::set_property), but existing keys are
    /// left alone.
    pub fn set_new_property(&self, line: &str) -> Result<bool> {
        match split_property(line) {
            Some((key, value)) => self.add(key, value),
            None => Ok(false),
        }
    }

    /// Store arbitrary pairs under one write lock. Returns the number of
    /// pairs stored.
    ///
    /// Not atomic: on the first failing pair the ones before it stay applied.
    pub fn put_pairs<'a, I>(&self, pairs: I) -> Result<usize>
    where
        I: IntoIterator<Item = (&'a str, Option<&'a str>)>,
    {
        let mut inner = self.inner.write();
        inner.invalidate();
        let mut applied = 0;
        for (key, value) in pairs {
            let key = normalize_key(key)?;
            inner.table.insert_value(key, value, false)?;
            applied += 1;
        }
        Ok(applied)
    }

    /// Copy every entry of `other` into this map, keeping immutability.
    ///
    /// Copies are private: later value changes on either side do not leak.
    /// Not atomic, like [`put_pairs`](Self::put_pairs).
    pub fn put_all(&self, other: &PropMap) -> Result<()> {
        if core::ptr::eq(self, other) {
            return Ok(());
        }
        let theirs = other.inner.read().snapshot();
        if theirs.is_empty() {
            return Ok(());
        }
        let mut inner = self.inner.write();
        inner.invalidate();
        if inner.table.len() < theirs.len() {
            inner.table.rehash(None, theirs.len());
        }
        for (key, value, immutable) in theirs {
            inner
                .table
                .insert_entry(Arc::new(Entry::from_parts(key, value, immutable)))?;
        }
        Ok(())
    }

    /// Remove everything and shrink back to the configured start capacity.
    pub fn clear(&self) {
        self.clear_with_capacity(self.config.start_capacity);
    }

    pub fn clear_with_capacity(&self, start_capacity: usize) {
        let mut inner = self.inner.write();
        inner.table.clear(start_capacity);
        inner.invalidate();
    }

    /// Rebuild the table one size up, resetting the probe statistics.
    pub fn rehash(&self) {
        self.inner.write().table.rehash(None, 0);
    }

    // ----- clone management -----

    /// True while this map is a clone still sharing mutable entries.
    pub fn is_shallow(&self) -> bool {
        self.shallow.load(Ordering::Acquire)
    }

    /// Give a shallow clone private copies of all its mutable entries.
    /// Immutable entries stay shared. Later calls do nothing.
    pub fn deepen(&self) {
        if !self.shallow.load(Ordering::Acquire) {
            return;
        }
        let mut inner = self.inner.write();
        if !self.shallow.load(Ordering::Acquire) {
            return;
        }
        let copied = inner.table.detach_mutable();
        inner.table.reset_rehash_count();
        // Cached hits still point at the shared entries.
        inner.invalidate();
        self.shallow.store(false, Ordering::Release);
        trace!(copied, size = inner.table.len(), "deepened clone");
    }

    // ----- language cascade -----

    fn locale(&self) -> (String, String) {
        {
            let inner = self.inner.read();
            if inner.locale.initialized {
                return (inner.locale.language.clone(), inner.locale.region.clone());
            }
        }
        let mut inner = self.inner.write();
        inner.init_locale(&self.config.default_language);
        (inner.locale.language.clone(), inner.locale.region.clone())
    }

    /// Current two-letter lower-case language.
    pub fn language(&self) -> String {
        self.locale().0
    }

    /// Current two-letter upper-case region, or empty.
    pub fn region(&self) -> String {
        self.locale().1
    }

    /// Set the language; `"de_AT"` also sets the region. An invalid code
    /// selects the default language. `language` and `region` entries in
    /// the map are kept in step. Clears the resolve cache.
    ///
    /// Fails with `ImmutableConflict`, changing nothing, when such an entry
    /// is immutable and would have to change.
    pub fn set_language(&self, code: &str) -> Result<()> {
        let (language, region) = split_locale(code);
        let language =
            check_language(language).unwrap_or_else(|| self.config.default_language.clone());
        let mut inner = self.inner.write();
        inner.init_locale(&self.config.default_language);
        let region = region.and_then(|r| inner.region_change(r));
        inner.apply_locale(Some(language), region)
    }

    /// Set the region; empty clears it, an invalid code leaves it unchanged.
    /// A `region` entry in the map is kept in step. Clears the resolve
    /// cache. Fails like [`set_language`](Self::set_language).
    pub fn set_region(&self, code: &str) -> Result<()> {
        let mut inner = self.inner.write();
        inner.init_locale(&self.config.default_language);
        let region = inner.region_change(code);
        inner.apply_locale(None, region)
    }

    /// Localized lookup.
    ///
    /// Tries `{language}_{region}.key` (with a region set), then
    /// `{language}.key`, then the fallback candidates. The first entry found
    /// wins, even one holding the empty string; an entry without a value
    /// also ends the search and yields `default`. Outcomes, including
    /// "nothing found", are cached until the language, region or key set of
    /// the map changes. A cached hit reads the entry's current value, so
    /// changes made through a shallow clone or an `Entry` handle show up.
    pub fn resolve(&self, key: &str, default: &str) -> String {
        let key = trim_blank(key);
        if key.is_empty() {
            return default.to_owned();
        }
        let (outcome, generation) = loop {
            {
                let inner = self.inner.read();
                if inner.locale.initialized {
                    if let Some(hit) = inner.cache.get(key) {
                        return hit.value_or(default);
                    }
                    break (self.cascade(&inner, key), inner.generation);
                }
            }
            self.inner.write().init_locale(&self.config.default_language);
        };
        let mut inner = self.inner.write();
        if inner.generation == generation {
            inner.cache.insert(Arc::from(key), outcome.clone());
        }
        outcome.value_or(default)
    }

    fn cascade(&self, inner: &Inner, key: &str) -> Resolved {
        let Locale {
            language, region, ..
        } = &inner.locale;
        let mut candidates = Vec::with_capacity(6);
        if !region.is_empty() {
            candidates.push(format!("{language}_{region}.{key}"));
        }
        candidates.push(format!("{language}.{key}"));
        self.fallback
            .candidates(key, language, region, &mut candidates);
        candidates
            .iter()
            .find_map(|k| inner.table.get(k))
            .map_or(Resolved::NotFound, |e| Resolved::Found(e.clone()))
    }

    // ----- views -----

    /// All entries ordered by key.
    pub fn sorted_entries(&self) -> Vec<Arc<Entry>> {
        let mut entries: Vec<Arc<Entry>> = self.inner.read().table.iter().cloned().collect();
        entries.sort_by(|a, b| a.cmp_key(b));
        entries
    }

    pub fn sorted_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .inner
            .read()
            .table
            .iter()
            .map(|e| e.key().to_owned())
            .collect();
        keys.sort_unstable();
        keys
    }

    /// A new map holding the entries whose keys start with `prefix`, the
    /// prefix stripped. An empty prefix yields a plain clone.
    pub fn sub_map(&self, prefix: &str) -> PropMap {
        if prefix.is_empty() {
            return self.clone();
        }
        let pairs: Vec<(String, Option<Arc<str>>)> = self
            .inner
            .read()
            .table
            .iter()
            .filter_map(|e| {
                let rest = e.key().strip_prefix(prefix)?;
                (!trim_blank(rest).is_empty()).then(|| (rest.to_owned(), e.value()))
            })
            .collect();
        let result = PropMap {
            inner: RwLock::new(Inner::new(
                Table::new(self.config.start_capacity, self.config.rehash),
                Locale::default(),
                self.config.cache_len,
            )),
            shallow: AtomicBool::new(false),
            fallback: self.fallback.clone(),
            config: self.config.clone(),
        };
        {
            let mut inner = result.inner.write();
            for (key, value) in &pairs {
                inner
                    .table
                    .insert_value(trim_blank(key), value.as_deref(), false)
                    .expect("fresh map holds only mutable entries");
            }
        }
        result
    }

    /// Probe statistics of the table.
    pub fn hash_quality(&self) -> HashQuality {
        self.inner.read().table.quality()
    }

    /// Wrapping sum of the combined hashes of all entries.
    pub fn table_hash(&self) -> i64 {
        self.inner
            .read()
            .table
            .iter()
            .fold(0i64, |acc, e| acc.wrapping_add(e.combined_hash()))
    }

    // ----- persistence -----

    /// Read property text from `reader` and store its pairs.
    ///
    /// `encoding` names the character set (`UTF-8` when `None`; unknown
    /// labels fall back to ISO-8859-1). On a malformed escape the pairs
    /// before the faulting line stay applied and `Error::Decode` is
    /// returned. Returns the number of pairs stored.
    pub fn load<R: Read>(&self, mut reader: R, encoding: Option<&str>) -> Result<usize> {
        let encoding = Encoding::resolve(encoding);
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        let text = encoding.decode(bytes)?;
        let applied = self.load_str(&text)?;
        debug!(applied, ?encoding, "loaded properties");
        Ok(applied)
    }

    /// Parse already decoded property text and store its pairs.
    pub fn load_str(&self, text: &str) -> Result<usize> {
        let mut pairs = Vec::new();
        let mut fault = None;
        for pair in codec::pairs(text) {
            match pair {
                Ok(p) => pairs.push(p),
                Err(e) => {
                    fault = Some(e);
                    break;
                }
            }
        }
        let applied = self.put_pairs(pairs.iter().map(|(k, v)| (k.as_str(), v.as_deref())))?;
        match fault {
            Some(e) => {
                warn!(applied, error = %e, "property load aborted");
                Err(e)
            }
            None => Ok(applied),
        }
    }

    /// Write all entries, sorted by key, to `writer`.
    ///
    /// The text starts with the `header` comment (a default one for `None`)
    /// and a timestamp comment. Keys escape every space; entries without a
    /// value are written as a bare key.
    pub fn store<W: Write>(
        &self,
        mut writer: W,
        header: Option<&str>,
        encoding: Option<&str>,
    ) -> Result<()> {
        let encoding = Encoding::resolve(encoding);
        let entries = self.sorted_entries();
        let values: Vec<Option<Arc<str>>> = entries.iter().map(|e| e.value()).collect();

        let mut out = String::with_capacity(entries.len() * 32 + 96);
        codec::write_comment(&mut out, header.unwrap_or(DEFAULT_HEADER));
        codec::write_comment(&mut out, &chrono::Local::now().to_rfc2822());
        codec::write_pairs(
            &mut out,
            entries
                .iter()
                .zip(&values)
                .map(|(e, v)| (e.key(), v.as_deref())),
        );
        writer.write_all(&encoding.encode(&out))?;
        writer.flush()?;
        debug!(entries = entries.len(), ?encoding, "stored properties");
        Ok(())
    }
}

/// Split a `key[=:blank]value` line without decoding escapes.
fn split_property(line: &str) -> Option<(&str, Option<&str>)> {
    let line = trim_blank(line);
    if line.is_empty() {
        return None;
    }
    let (key_end, value_start, separated) = codec::separator_span(line, false);
    let value = if value_start < line.len() {
        Some(&line[value_start..])
    } else if separated {
        Some("")
    } else {
        None
    };
    Some((&line[..key_end], value))
}

impl Default for PropMap {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for PropMap {
    /// Shallow copy: the slot array is copied, entries are shared until
    /// [`deepen`](PropMap::deepen). The clone starts with an empty cache.
    fn clone(&self) -> Self {
        let inner = self.inner.read();
        Self {
            inner: RwLock::new(Inner::new(
                inner.table.clone(),
                inner.locale.clone(),
                self.config.cache_len,
            )),
            shallow: AtomicBool::new(inner.table.len() != 0),
            fallback: self.fallback.clone(),
            config: self.config.clone(),
        }
    }
}

impl PartialEq for PropMap {
    /// Same keys with equal values; immutability is not compared.
    fn eq(&self, other: &Self) -> bool {
        if core::ptr::eq(self, other) {
            return true;
        }
        let mine = self.inner.read().snapshot();
        let theirs = other.inner.read();
        mine.len() == theirs.table.len()
            && mine.iter().all(|(k, v, _)| {
                theirs
                    .table
                    .get(k)
                    .is_some_and(|e| e.value_eq(v.as_deref()))
            })
    }
}

impl Eq for PropMap {}

impl fmt::Debug for PropMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("PropMap")
            .field("len", &inner.table.len())
            .field("capacity", &inner.table.capacity())
            .field("shallow", &self.is_shallow())
            .field("language", &inner.locale.language)
            .field("region", &inner.locale.region)
            .finish()
    }
}

impl fmt::Display for PropMap {
    /// Probe statistics followed by the sorted listing.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let quality = self.hash_quality();
        if quality.size == 0 {
            return f.write_str(" # < empty PropMap > ");
        }
        writeln!(f, "{quality}\n")?;
        for e in self.sorted_entries() {
            writeln!(f, "{e}")?;
        }
        Ok(())
    }
}
