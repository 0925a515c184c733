//! StrStrMap: the public container tying a [`SlotTable`] to a [`StringArena`].
//!
//! Mutations follow one shape: validate every argument, search, write the
//! arena, update the slot, run the growth or compaction check, and bump
//! `version` last. A failed validation returns before the first write, so
//! an error never leaves a partial update behind.

use crate::arena::{Compacted, StringArena};
use crate::arg::{check, StrArg};
use crate::config::{StrMapConfig, MAX_CAPACITY};
use crate::cursor::{Cursor, Iter, Keys, Values};
use crate::error::{ArgRole, Error, Result};
use crate::slot_table::{fold_hash, Claim, Entry, SlotTable};
use core::fmt;
use core::hash::BuildHasher;
use core::sync::atomic::{AtomicU64, Ordering};
use hashbrown::hash_map::DefaultHashBuilder;
use tracing::{debug, trace};

static NEXT_MAP_ID: AtomicU64 = AtomicU64::new(1);

fn check_pair<K: StrArg, V: StrArg>((k, v): &(K, V)) -> Result<(&str, &str)> {
    Ok((check(k, ArgRole::Key)?, check(v, ArgRole::Value)?))
}

fn next_map_id() -> u64 {
    NEXT_MAP_ID.fetch_add(1, Ordering::Relaxed)
}

/// Point-in-time counters describing a map's layout.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct MapStats {
    pub len: usize,
    pub capacity: usize,
    pub tombstones: usize,
    pub arena_bytes: usize,
    pub dead_bytes: usize,
    pub resizes: u64,
    pub compactions: u64,
    pub version: u64,
    /// Bytes owned on the heap by the slot table and the arena.
    pub heap_bytes: usize,
}

/// A string-to-string map that stores every key and value in one arena.
///
/// ```
/// use strstrmap::StrStrMap;
///
/// let mut m = StrStrMap::new();
/// m.set("a", "b")?;
/// m.set("c", "d")?;
/// assert_eq!(m.get("c")?, "d");
/// assert_eq!(m.get_or_default("x", "none")?, "none");
/// m.delete("a")?;
/// assert_eq!(m.len(), 1);
/// # Ok::<(), strstrmap::Error>(())
/// ```
pub struct StrStrMap<S = DefaultHashBuilder> {
    hasher: S,
    table: SlotTable,
    arena: StringArena,
    config: StrMapConfig,
    version: u64,
    id: u64,
    resizes: u64,
    compactions: u64,
}

impl StrStrMap<DefaultHashBuilder> {
    pub fn new() -> Self {
        Self::with_hasher(DefaultHashBuilder::default())
    }

    /// A map that holds `entries` keys before its first resize.
    ///
    /// # Panics
    ///
    /// Panics if `entries` needs more than [`MAX_CAPACITY`] slots, as
    /// `hashbrown::HashMap::with_capacity` does on capacity overflow.
    pub fn with_capacity(entries: usize) -> Self {
        match Self::try_with_capacity(entries) {
            Ok(m) => m,
            Err(e) => panic!("StrStrMap::with_capacity: {e}"),
        }
    }

    /// Like [`with_capacity`](Self::with_capacity), but reports
    /// `CapacityOverflow` instead of panicking.
    pub fn try_with_capacity(entries: usize) -> Result<Self> {
        let base = StrMapConfig::default();
        let slots = base.capacity_for(entries)?;
        Self::with_config(base.with_initial_capacity(slots))
    }

    pub fn with_config(config: StrMapConfig) -> Result<Self> {
        Self::with_config_and_hasher(config, DefaultHashBuilder::default())
    }

    /// Builds a map seeded from `pairs`, with the validation of
    /// [`update`](Self::update).
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: StrArg,
        V: StrArg,
    {
        let mut m = Self::new();
        m.update(pairs)?;
        Ok(m)
    }
}

impl Default for StrStrMap<DefaultHashBuilder> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> StrStrMap<S>
where
    S: BuildHasher,
{
    pub fn with_hasher(hasher: S) -> Self {
        Self::build(StrMapConfig::default(), hasher)
    }

    pub fn with_config_and_hasher(config: StrMapConfig, hasher: S) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config, hasher))
    }

    fn build(config: StrMapConfig, hasher: S) -> Self {
        Self {
            hasher,
            table: SlotTable::with_capacity(config.initial_slots()),
            arena: StringArena::new(),
            config,
            version: 0,
            id: next_map_id(),
            resizes: 0,
            compactions: 0,
        }
    }

    /// Runs before any slot or arena write, so a hasher that reads the map
    /// sees it in a consistent state.
    fn make_hash(&self, key: &str) -> u32 {
        fold_hash(self.hasher.hash_one(key))
    }

    fn find_index(&self, key: &str) -> Option<usize> {
        let hash = self.make_hash(key);
        let arena = &self.arena;
        self.table.find(hash, |e| arena.read(e.key) == key)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.table.occupied()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.table.occupied() == 0
    }

    /// Number of slots in the table.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.table.capacity()
    }

    /// Structural mutation counter; changes whenever live cursors would be
    /// invalidated.
    #[inline]
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn config(&self) -> &StrMapConfig {
        &self.config
    }

    pub fn stats(&self) -> MapStats {
        MapStats {
            len: self.table.occupied(),
            capacity: self.table.capacity(),
            tombstones: self.table.tombstones(),
            arena_bytes: self.arena.len(),
            dead_bytes: self.arena.dead_bytes(),
            resizes: self.resizes,
            compactions: self.compactions,
            version: self.version,
            heap_bytes: self.table.heap_bytes() + self.arena.heap_bytes(),
        }
    }

    /// Value for `key`, or `KeyNotFound`.
    pub fn get<K>(&self, key: &K) -> Result<&str>
    where
        K: StrArg + ?Sized,
    {
        self.try_get(key)?.ok_or(Error::KeyNotFound)
    }

    /// Value for `key`, or `default` when absent. The key is still
    /// type-checked.
    pub fn get_or_default<'a, K>(&'a self, key: &K, default: &'a str) -> Result<&'a str>
    where
        K: StrArg + ?Sized,
    {
        Ok(self.try_get(key)?.unwrap_or(default))
    }

    /// Value for `key` if present.
    pub fn try_get<K>(&self, key: &K) -> Result<Option<&str>>
    where
        K: StrArg + ?Sized,
    {
        let key = check(key, ArgRole::Key)?;
        Ok(self
            .find_index(key)
            .and_then(|i| self.table.get(i))
            .map(|e| self.arena.read(e.value)))
    }

    pub fn contains_key<K>(&self, key: &K) -> Result<bool>
    where
        K: StrArg + ?Sized,
    {
        let key = check(key, ArgRole::Key)?;
        Ok(self.find_index(key).is_some())
    }

    /// Inserts or overwrites `key`. Every call invalidates outstanding
    /// cursors, whether or not the key was new.
    pub fn set<K, V>(&mut self, key: &K, value: &V) -> Result<()>
    where
        K: StrArg + ?Sized,
        V: StrArg + ?Sized,
    {
        let key = check(key, ArgRole::Key)?;
        let value = check(value, ArgRole::Value)?;
        if self.insert_unbounded(key, value)? {
            self.maybe_grow();
        } else {
            self.maybe_compact();
        }
        self.version += 1;
        Ok(())
    }

    /// Removes `key`, or fails with `KeyNotFound`.
    pub fn delete<K>(&mut self, key: &K) -> Result<()>
    where
        K: StrArg + ?Sized,
    {
        let key = check(key, ArgRole::Key)?;
        self.take_entry(key)?;
        self.maybe_compact();
        self.version += 1;
        Ok(())
    }

    /// Removes `key` and returns its value.
    pub fn remove<K>(&mut self, key: &K) -> Result<String>
    where
        K: StrArg + ?Sized,
    {
        let key = check(key, ArgRole::Key)?;
        let entry = self.take_entry(key)?;
        let value = self.arena.read(entry.value).to_owned();
        self.maybe_compact();
        self.version += 1;
        Ok(value)
    }

    /// Applies `set` for every pair. All pairs are validated before the
    /// first write, room is reserved once up front and compaction is
    /// evaluated once at the end. A non-empty batch bumps `version` once.
    pub fn update<I, K, V>(&mut self, pairs: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: StrArg,
        V: StrArg,
    {
        let pairs: Vec<(K, V)> = pairs.into_iter().collect();
        let checked = pairs.iter().map(check_pair).collect::<Result<Vec<_>>>()?;
        if checked.is_empty() {
            return Ok(());
        }

        let bytes = checked
            .iter()
            .try_fold(0usize, |acc, (k, v)| acc.checked_add(k.len())?.checked_add(v.len()))
            .ok_or(Error::CapacityOverflow)?;
        self.reserve_slots(checked.len())?;
        self.ensure_room(bytes)?;

        for (key, value) in checked {
            self.insert_unbounded(key, value)?;
        }
        self.maybe_compact();
        self.version += 1;
        Ok(())
    }

    /// Removes every entry and returns to the configured initial capacity.
    pub fn clear(&mut self) {
        trace!(len = self.len(), "clearing map");
        self.table = SlotTable::with_capacity(self.config.initial_slots());
        self.arena = StringArena::new();
        self.version += 1;
    }

    /// Makes room for `additional` new keys with at most one table rebuild.
    ///
    /// # Panics
    ///
    /// Panics if the table would need more than [`MAX_CAPACITY`] slots.
    pub fn reserve(&mut self, additional: usize) {
        if let Err(e) = self.try_reserve(additional) {
            panic!("StrStrMap::reserve: {e}");
        }
    }

    /// Like [`reserve`](Self::reserve), but fails with `CapacityOverflow`
    /// and leaves the map untouched when the table cannot grow that far.
    pub fn try_reserve(&mut self, additional: usize) -> Result<()> {
        if self.reserve_slots(additional)? {
            self.version += 1;
        }
        Ok(())
    }

    /// Rebuilds the table at the smallest capacity for the current entries
    /// and compacts the arena.
    pub fn shrink_to_fit(&mut self) {
        let target = self
            .config
            .capacity_for(self.table.occupied())
            .map_or(self.table.capacity(), |c| c.max(self.config.initial_slots()));
        trace!(from = self.table.capacity(), to = target, "shrinking map");
        if target != self.table.capacity() || self.table.tombstones() > 0 {
            self.rehash(target);
        }
        if self.arena.dead_bytes() > 0 || self.arena.heap_bytes() > self.arena.len() {
            self.compact_arena();
        }
        self.version += 1;
    }

    /// A cursor positioned before the first entry in table order.
    pub fn cursor(&self) -> Cursor {
        Cursor::new(self.id, self.version)
    }

    pub fn iter(&self) -> Iter<'_> {
        Iter::new(self.table.entries(), &self.arena)
    }

    pub fn keys(&self) -> Keys<'_> {
        Keys::new(self.iter())
    }

    pub fn values(&self) -> Values<'_> {
        Values::new(self.iter())
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    /// The first live entry at or after slot `from`.
    pub(crate) fn entry_from(&self, from: usize) -> Option<(usize, &str, &str)> {
        self.table
            .next_occupied(from)
            .map(|(i, e)| (i, self.arena.read(e.key), self.arena.read(e.value)))
    }

    /// Writes `key -> value` without any growth or compaction check.
    /// Returns whether the key was new. The caller guarantees that
    /// claiming one more slot keeps at least one slot empty.
    fn insert_unbounded(&mut self, key: &str, value: &str) -> Result<bool> {
        let hash = self.make_hash(key);
        let arena = &self.arena;
        match self.table.find_or_claim(hash, |e| arena.read(e.key) == key) {
            Claim::Found(i) => {
                let unchanged = self
                    .table
                    .get(i)
                    .is_some_and(|e| self.arena.read(e.value) == value);
                if unchanged {
                    return Ok(false);
                }
                self.ensure_room(value.len())?;
                let new_ref = self.arena.store(value);
                if let Some(e) = self.table.get_mut(i) {
                    let old = core::mem::replace(&mut e.value, new_ref);
                    self.arena.mark_dead(old);
                }
                Ok(false)
            }
            Claim::Vacant(i) => {
                self.ensure_room(key.len() + value.len())?;
                let entry = Entry {
                    hash,
                    key: self.arena.store(key),
                    value: self.arena.store(value),
                };
                self.table.occupy(i, entry);
                Ok(true)
            }
        }
    }

    fn take_entry(&mut self, key: &str) -> Result<Entry> {
        let idx = self.find_index(key).ok_or(Error::KeyNotFound)?;
        let entry = self.table.vacate(idx).ok_or(Error::KeyNotFound)?;
        self.arena.mark_dead(entry.key);
        self.arena.mark_dead(entry.value);
        Ok(entry)
    }

    /// Checks the arena can take `extra` bytes, compacting first if that
    /// would make the difference.
    fn ensure_room(&mut self, extra: usize) -> Result<()> {
        if self.arena.check_room(extra).is_err() && self.arena.dead_bytes() > 0 {
            self.compact_arena();
        }
        self.arena.check_room(extra)
    }

    fn maybe_grow(&mut self) {
        let used = self.table.occupied() + self.table.tombstones();
        let capacity = self.table.capacity();
        if !self.config.over_load(used, capacity) {
            return;
        }
        let live = self.table.occupied();
        // Tombstone-heavy tables are rebuilt in place; full ones double.
        let step = if self.config.over_load(live * 2, capacity) {
            capacity * 2
        } else {
            capacity
        };
        // The 32-bit arena bounds live keys well below MAX_CAPACITY.
        let floor = self.config.capacity_for(live).unwrap_or(MAX_CAPACITY);
        self.rehash(step.max(floor).min(MAX_CAPACITY));
    }

    /// Returns true if the table was rebuilt. Fails before touching the
    /// table when `additional` more keys cannot fit in [`MAX_CAPACITY`].
    fn reserve_slots(&mut self, additional: usize) -> Result<bool> {
        let live = self.table.occupied();
        let used = live + self.table.tombstones();
        let capacity = self.table.capacity();
        if !self.config.over_load(used.saturating_add(additional), capacity) {
            return Ok(false);
        }
        let target = self
            .config
            .capacity_for(live.saturating_add(additional))?
            .max(capacity);
        self.rehash(target);
        Ok(true)
    }

    fn rehash(&mut self, capacity: usize) {
        let table = self.table.rebuild(capacity);
        debug!(
            old_capacity = self.table.capacity(),
            new_capacity = capacity,
            live = table.occupied(),
            tombstones_dropped = self.table.tombstones(),
            "rebuilt slot table"
        );
        self.table = table;
        self.resizes += 1;
    }

    fn maybe_compact(&mut self) {
        if self
            .config
            .wants_compaction(self.arena.dead_bytes(), self.arena.len())
        {
            self.compact_arena();
        }
    }

    fn compact_arena(&mut self) {
        let live = self.table.entries().flat_map(|e| [e.key, e.value]);
        let Compacted { arena, remap } = self.arena.compact(live);
        for (e, refs) in self.table.entries_mut().zip(remap.chunks_exact(2)) {
            e.key = refs[0];
            e.value = refs[1];
        }
        debug!(
            before = self.arena.len(),
            after = arena.len(),
            reclaimed = self.arena.dead_bytes(),
            "compacted string arena"
        );
        self.arena = arena;
        self.compactions += 1;
    }

    /// Checks the layout invariants: counters match the slots, live arena
    /// regions are disjoint and account for every non-dead byte, and the
    /// load factor holds.
    #[cfg(test)]
    pub(crate) fn assert_consistent(&self) {
        use crate::slot_table::Slot;

        let (table, arena) = (&self.table, &self.arena);
        let mut occupied = 0;
        let mut tombstones = 0;
        let mut regions = Vec::new();
        for s in table.slots() {
            match s {
                Slot::Occupied(e) => {
                    occupied += 1;
                    regions.push(e.key);
                    regions.push(e.value);
                }
                Slot::Tombstone => tombstones += 1,
                Slot::Empty => {}
            }
        }
        assert_eq!(occupied, table.occupied());
        assert_eq!(tombstones, table.tombstones());
        let live: usize = regions.iter().map(|r| r.len()).sum();
        assert_eq!(live, arena.live_bytes());
        regions.sort_by_key(|r| r.start());
        for w in regions.windows(2) {
            assert!(!w[0].overlaps(w[1]), "overlapping regions {:?} {:?}", w[0], w[1]);
        }
        assert!(!self.config.over_load(occupied + tombstones, table.capacity()));
    }
}

impl<S: Clone> Clone for StrStrMap<S> {
    /// The clone is a distinct map: cursors of the original are foreign to it.
    fn clone(&self) -> Self {
        Self {
            hasher: self.hasher.clone(),
            table: self.table.clone(),
            arena: self.arena.clone(),
            config: self.config.clone(),
            version: self.version,
            id: next_map_id(),
            resizes: self.resizes,
            compactions: self.compactions,
        }
    }
}

impl<S: BuildHasher> fmt::Debug for StrStrMap<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<S1, S2> PartialEq<StrStrMap<S2>> for StrStrMap<S1>
where
    S1: BuildHasher,
    S2: BuildHasher,
{
    fn eq(&self, other: &StrStrMap<S2>) -> bool {
        self.len() == other.len()
            && self.iter().all(|(k, v)| {
                other
                    .find_index(k)
                    .and_then(|i| other.table.get(i))
                    .is_some_and(|e| other.arena.read(e.value) == v)
            })
    }
}

impl<S: BuildHasher> Eq for StrStrMap<S> {}

impl<'a, S: BuildHasher> IntoIterator for &'a StrStrMap<S> {
    type Item = (&'a str, &'a str);
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Statically typed bulk insert.
///
/// # Panics
///
/// Panics if the arena outgrows its 32-bit offset space, as `Vec` does on
/// capacity overflow.
impl<K, V, S> Extend<(K, V)> for StrStrMap<S>
where
    K: AsRef<str>,
    V: AsRef<str>,
    S: BuildHasher,
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        let pairs = iter.into_iter().map(|(k, v)| (StrOnly(k), StrOnly(v)));
        if let Err(e) = self.update(pairs) {
            panic!("StrStrMap::extend: {e}");
        }
    }
}

impl<K, V> FromIterator<(K, V)> for StrStrMap<DefaultHashBuilder>
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut m = Self::new();
        m.extend(iter);
        m
    }
}

/// Adapts a statically known string to `StrArg`.
struct StrOnly<T>(T);

impl<T: AsRef<str>> StrArg for StrOnly<T> {
    fn type_name(&self) -> &'static str {
        "string"
    }
    fn as_str_arg(&self) -> Option<&str> {
        Some(self.0.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn sorted<S: BuildHasher>(m: &StrStrMap<S>) -> BTreeMap<String, String> {
        m.iter().map(|(k, v)| (k.to_owned(), v.to_owned())).collect()
    }

    #[test]
    fn set_get_delete_roundtrip() {
        let mut m = StrStrMap::new();
        m.set("k", "v").unwrap();
        assert_eq!(m.get("k"), Ok("v"));
        assert_eq!(m.len(), 1);
        m.delete("k").unwrap();
        assert_eq!(m.get("k"), Err(Error::KeyNotFound));
        assert_eq!(m.delete("k"), Err(Error::KeyNotFound));
        assert!(m.is_empty());
        m.assert_consistent();
    }

    /// Invariant: an overwrite keeps `len`, marks the old value dead and
    /// stores the new one; writing an equal value stores nothing.
    #[test]
    fn overwrite_accounts_dead_bytes() {
        let cfg = StrMapConfig::default().with_compaction_threshold(1.0);
        let mut m = StrStrMap::with_config(cfg).unwrap();
        m.set("key", "first").unwrap();
        m.set("key", "second!").unwrap();
        assert_eq!(m.len(), 1);
        assert_eq!(m.get("key"), Ok("second!"));
        let s = m.stats();
        assert_eq!(s.dead_bytes, "first".len());
        assert_eq!(s.arena_bytes, "keyfirstsecond!".len());

        let before = m.stats();
        m.set("key", "second!").unwrap();
        assert_eq!(m.stats().arena_bytes, before.arena_bytes);
        assert_eq!(m.version(), before.version + 1, "equal overwrite still counts");
        m.assert_consistent();
    }

    #[test]
    fn wrong_types_fail_before_mutation() {
        let mut m = StrStrMap::new();
        m.set("a", "b").unwrap();
        let v = m.version();
        assert!(m.set("c", &1i32).unwrap_err().is_type_error());
        assert!(m.set(&1i32, "c").unwrap_err().is_type_error());
        assert!(m.set(b"c".as_slice(), "d").unwrap_err().is_type_error());
        assert!(m.get(&1u8).unwrap_err().is_type_error());
        assert!(m.get_or_default(&2.0f64, "d").unwrap_err().is_type_error());
        assert!(m.delete(&1i64).unwrap_err().is_type_error());
        assert!(m.contains_key(b"a").unwrap_err().is_type_error());
        assert_eq!(m.version(), v);
        assert_eq!(m.len(), 1);
        assert_eq!(m.stats().arena_bytes, 2);
    }

    /// Invariant: an update with one bad pair writes nothing at all.
    #[test]
    fn update_is_all_or_nothing() {
        let mut m = StrStrMap::new();
        let pairs: [(&dyn StrArg, &dyn StrArg); 2] = [(&"x", &"1"), (&"y", &2u32)];
        let err = m.update(pairs).unwrap_err();
        assert_eq!(err, Error::WrongType { role: ArgRole::Value, found: "integer" });
        assert!(m.is_empty());
        assert_eq!(m.version(), 0);
        assert_eq!(m.stats().arena_bytes, 0);
    }

    #[test]
    fn update_reserves_once() {
        let mut m = StrStrMap::new();
        let pairs: Vec<(String, String)> = (0..1_000)
            .map(|i| (format!("k{i}"), format!("v{i}")))
            .collect();
        m.update(pairs.iter().map(|(k, v)| (k, v))).unwrap();
        assert_eq!(m.len(), 1_000);
        assert_eq!(m.stats().resizes, 1);
        assert_eq!(m.version(), 1, "one bump for the whole batch");
        for (k, v) in &pairs {
            assert_eq!(m.get(k), Ok(v.as_str()));
        }
        m.assert_consistent();
    }

    /// Invariant: a resize re-places every entry by its cached hash and keeps
    /// the arena references it already had.
    #[test]
    fn growth_keeps_arena_untouched() {
        let mut m = StrStrMap::new();
        for i in 0..200 {
            m.set(&format!("key-{i}"), &format!("value-{i}")).unwrap();
        }
        let s = m.stats();
        assert!(s.resizes >= 4);
        assert_eq!(s.compactions, 0);
        assert_eq!(s.dead_bytes, 0);
        assert_eq!(s.tombstones, 0);
        for i in 0..200 {
            assert_eq!(m.get(&format!("key-{i}")), Ok(format!("value-{i}").as_str()));
        }
        m.assert_consistent();
    }

    /// Invariant: churn on a fixed-size key set rebuilds the table in place
    /// to drop tombstones instead of growing without bound.
    #[test]
    fn tombstone_churn_does_not_grow_the_table() {
        let mut m = StrStrMap::new();
        for round in 0..500 {
            let k = format!("churn-{round}");
            m.set(&k, "v").unwrap();
            m.delete(&k).unwrap();
            m.assert_consistent();
        }
        assert!(m.capacity() <= 16, "capacity {}", m.capacity());
        assert!(m.stats().resizes > 0);
    }

    #[test]
    fn delete_past_threshold_compacts() {
        let mut m = StrStrMap::new();
        for i in 0..100 {
            m.set(&format!("k{i:03}"), &format!("v{i:03}")).unwrap();
        }
        for i in 0..=50 {
            m.delete(&format!("k{i:03}")).unwrap();
        }
        let s = m.stats();
        assert!(s.compactions >= 1);
        assert!(s.dead_bytes * 2 <= s.arena_bytes);
        for i in 51..100 {
            assert_eq!(m.get(&format!("k{i:03}")), Ok(format!("v{i:03}").as_str()));
        }
        m.assert_consistent();
    }

    #[test]
    fn remove_returns_the_value() {
        let mut m = StrStrMap::from_pairs([("a", "alpha"), ("b", "beta")]).unwrap();
        assert_eq!(m.remove("a"), Ok("alpha".to_string()));
        assert_eq!(m.remove("a"), Err(Error::KeyNotFound));
        assert_eq!(sorted(&m), BTreeMap::from([("b".into(), "beta".into())]));
    }

    #[test]
    fn clear_and_shrink_reset_storage() {
        let mut m = StrStrMap::new();
        for i in 0..100 {
            m.set(&i.to_string(), "x").unwrap();
        }
        for i in 0..90 {
            m.delete(&i.to_string()).unwrap();
        }
        m.shrink_to_fit();
        let s = m.stats();
        assert_eq!(s.len, 10);
        assert_eq!(s.capacity, 16);
        assert_eq!(s.tombstones, 0);
        assert_eq!(s.dead_bytes, 0);
        m.assert_consistent();

        let v = m.version();
        m.clear();
        assert!(m.is_empty());
        assert_eq!(m.capacity(), 8);
        assert_eq!(m.stats().arena_bytes, 0);
        assert!(m.version() > v);
    }

    #[test]
    fn equality_ignores_layout() {
        let a: StrStrMap = [("a", "1"), ("b", "2"), ("c", "3")].into_iter().collect();
        let mut b = StrStrMap::with_capacity(1_000);
        b.set("c", "3").unwrap();
        b.set("b", "2").unwrap();
        b.set("a", "1").unwrap();
        assert_eq!(a, b);
        b.set("a", "0").unwrap();
        assert_ne!(a, b);
        let one = StrStrMap::from_pairs([("k", "v")]).unwrap();
        assert_eq!(format!("{one:?}"), r#"{"k": "v"}"#);
    }

    #[test]
    fn clones_are_independent() {
        let mut a = StrStrMap::from_pairs([("k", "v")]).unwrap();
        let b = a.clone();
        a.set("k", "w").unwrap();
        assert_eq!(b.get("k"), Ok("v"));
        assert_ne!(a.id(), b.id());
    }

    /// Invariant: hashing happens before any write, so a hasher that reads
    /// the map it is hashing for sees a consistent map and does not panic.
    #[test]
    fn hasher_may_read_the_map() {
        use core::cell::{Cell, RefCell};
        use core::hash::Hasher;
        use std::rc::{Rc, Weak};

        type Shared = RefCell<StrStrMap<Peeking>>;

        #[derive(Default)]
        struct Link {
            map: RefCell<Weak<Shared>>,
            nested: Cell<bool>,
            reads: Cell<usize>,
        }

        #[derive(Clone)]
        struct Peeking(Rc<Link>);
        struct PeekingHasher(Rc<Link>, u64);

        impl BuildHasher for Peeking {
            type Hasher = PeekingHasher;
            fn build_hasher(&self) -> PeekingHasher {
                PeekingHasher(self.0.clone(), 0)
            }
        }
        impl Hasher for PeekingHasher {
            fn write(&mut self, bytes: &[u8]) {
                for &b in bytes {
                    self.1 = self.1.wrapping_mul(31).wrapping_add(u64::from(b));
                }
                let link = &self.0;
                if link.nested.replace(true) {
                    return;
                }
                if let Some(m) = link.map.borrow().upgrade() {
                    assert_eq!(m.borrow().contains_key("b"), Ok(true));
                    link.reads.set(link.reads.get() + 1);
                }
                link.nested.set(false);
            }
            fn finish(&self) -> u64 {
                self.1
            }
        }

        let link = Rc::new(Link::default());
        let map: Rc<Shared> = Rc::new(RefCell::new(StrStrMap::with_hasher(Peeking(link.clone()))));
        map.borrow_mut().update([("a", "1"), ("b", "2")]).unwrap();
        *link.map.borrow_mut() = Rc::downgrade(&map);

        assert_eq!(map.borrow().get("a"), Ok("1"));
        assert_eq!(map.borrow().get_or_default("zz", "d"), Ok("d"));
        assert!(link.reads.get() >= 2);
        map.borrow().assert_consistent();
    }

    /// Invariant: sizing requests past the slot limit fail deterministically
    /// and leave the map, its capacity and its version untouched.
    #[test]
    fn oversized_reservations_fail_cleanly() {
        let mut m = StrStrMap::from_pairs([("k", "v")]).unwrap();
        let (capacity, version) = (m.capacity(), m.version());
        for n in [usize::MAX, usize::MAX / 2, MAX_CAPACITY] {
            assert_eq!(m.try_reserve(n), Err(Error::CapacityOverflow), "n={n}");
        }
        assert_eq!(m.capacity(), capacity);
        assert_eq!(m.version(), version, "a failed reserve does not invalidate cursors");
        assert_eq!(m.get("k"), Ok("v"));

        assert!(matches!(
            StrStrMap::try_with_capacity(usize::MAX),
            Err(Error::CapacityOverflow)
        ));
        assert!(StrStrMap::try_with_capacity(100).unwrap().capacity() >= 128);

        m.try_reserve(1_000).unwrap();
        assert_eq!(m.version(), version + 1);
        assert!(m.capacity() >= 1_024);
        m.assert_consistent();
    }

    #[test]
    #[should_panic(expected = "StrStrMap::reserve: capacity overflow")]
    fn reserve_panics_on_capacity_overflow() {
        StrStrMap::new().reserve(usize::MAX);
    }

    #[test]
    #[should_panic(expected = "StrStrMap::with_capacity: capacity overflow")]
    fn with_capacity_panics_on_capacity_overflow() {
        let _ = StrStrMap::with_capacity(usize::MAX);
    }

    #[test]
    fn map_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<StrStrMap>();
    }
}
