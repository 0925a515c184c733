//! Iteration over a `StrStrMap`.
//!
//! Two flavours:
//! - [`Iter`], [`Keys`], [`Values`]: ordinary iterators that borrow the map.
//!   The borrow checker rules out mutation while they live.
//! - [`Cursor`]: a detached position that holds no borrow. It records the
//!   map's `version` when created and re-checks it on every step, so a
//!   cursor that outlives a `set`, `delete` or any other structural change
//!   fails with `IteratorInvalidated` on its next use instead of yielding
//!   from a table it no longer describes.
//!
//! Both walk slots in table order, not insertion order.

use crate::arena::StringArena;
use crate::error::{Error, Result};
use crate::slot_table::Entries;
use crate::str_map::StrStrMap;
use core::hash::BuildHasher;
use core::iter::FusedIterator;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CursorState {
    Active,
    /// Every entry has been visited; further steps yield `Ok(None)`.
    Exhausted,
    /// The map changed under the cursor; further steps fail.
    Invalidated,
}

/// Versioned position in a map. See the module docs.
///
/// ```
/// use strstrmap::{Error, StrStrMap};
///
/// let mut m = StrStrMap::from_pairs([("a", "b"), ("c", "d")])?;
/// let mut cur = m.cursor();
/// assert!(cur.next(&m)?.is_some());
/// m.set("e", "f")?;
/// assert_eq!(cur.next(&m), Err(Error::IteratorInvalidated));
/// # Ok::<(), Error>(())
/// ```
#[derive(Clone, Debug)]
pub struct Cursor {
    map_id: u64,
    version: u64,
    pos: usize,
    state: CursorState,
}

impl Cursor {
    pub(crate) fn new(map_id: u64, version: u64) -> Self {
        Self {
            map_id,
            version,
            pos: 0,
            state: CursorState::Active,
        }
    }

    pub fn state(&self) -> CursorState {
        self.state
    }

    /// Advances to the next entry of `map`, the map this cursor came from.
    pub fn next<'m, S>(&mut self, map: &'m StrStrMap<S>) -> Result<Option<(&'m str, &'m str)>>
    where
        S: BuildHasher,
    {
        match self.state {
            CursorState::Invalidated => return Err(Error::IteratorInvalidated),
            CursorState::Exhausted => return Ok(None),
            CursorState::Active => {}
        }
        if map.id() != self.map_id {
            return Err(Error::ForeignCursor);
        }
        if map.version() != self.version {
            self.state = CursorState::Invalidated;
            return Err(Error::IteratorInvalidated);
        }
        match map.entry_from(self.pos) {
            Some((idx, key, value)) => {
                self.pos = idx + 1;
                Ok(Some((key, value)))
            }
            None => {
                self.state = CursorState::Exhausted;
                Ok(None)
            }
        }
    }

    /// Like [`next`](Self::next) but yields only the key.
    pub fn next_key<'m, S>(&mut self, map: &'m StrStrMap<S>) -> Result<Option<&'m str>>
    where
        S: BuildHasher,
    {
        Ok(self.next(map)?.map(|(k, _)| k))
    }
}

/// Borrowing iterator over `(key, value)` pairs.
#[derive(Clone)]
pub struct Iter<'a> {
    entries: Entries<'a>,
    arena: &'a StringArena,
}

impl<'a> Iter<'a> {
    pub(crate) fn new(entries: Entries<'a>, arena: &'a StringArena) -> Self {
        Self { entries, arena }
    }
}

impl<'a> Iterator for Iter<'a> {
    type Item = (&'a str, &'a str);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.entries
            .next()
            .map(|e| (self.arena.read(e.key), self.arena.read(e.value)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.entries.size_hint()
    }
}

impl ExactSizeIterator for Iter<'_> {}
impl FusedIterator for Iter<'_> {}

#[derive(Clone)]
pub struct Keys<'a> {
    inner: Iter<'a>,
}

impl<'a> Keys<'a> {
    pub(crate) fn new(inner: Iter<'a>) -> Self {
        Self { inner }
    }
}

impl<'a> Iterator for Keys<'a> {
    type Item = &'a str;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(k, _)| k)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for Keys<'_> {}
impl FusedIterator for Keys<'_> {}

#[derive(Clone)]
pub struct Values<'a> {
    inner: Iter<'a>,
}

impl<'a> Values<'a> {
    pub(crate) fn new(inner: Iter<'a>) -> Self {
        Self { inner }
    }
}

impl<'a> Iterator for Values<'a> {
    type Item = &'a str;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, v)| v)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for Values<'_> {}
impl FusedIterator for Values<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn sample() -> StrStrMap {
        StrStrMap::from_pairs([("a", "1"), ("b", "2"), ("c", "3")]).unwrap()
    }

    /// Invariant: a cursor and `iter` visit the same entries in the same order.
    #[test]
    fn cursor_matches_iter_order() {
        let m = sample();
        let mut cur = m.cursor();
        let mut seen = Vec::new();
        while let Some(kv) = cur.next(&m).unwrap() {
            seen.push(kv);
        }
        assert_eq!(seen, m.iter().collect::<Vec<_>>());
        assert_eq!(cur.state(), CursorState::Exhausted);
        assert_eq!(cur.next(&m), Ok(None));
    }

    #[test]
    fn any_set_invalidates_even_an_overwrite() {
        let mut m = sample();
        let mut cur = m.cursor();
        let (k, _) = cur.next(&m).unwrap().unwrap();
        let k = k.to_owned();
        m.set(&k, "changed").unwrap();
        assert_eq!(cur.next(&m), Err(Error::IteratorInvalidated));
        assert_eq!(cur.state(), CursorState::Invalidated);
        assert_eq!(cur.next(&m), Err(Error::IteratorInvalidated), "invalidation is terminal");
    }

    /// Detection is lazy: the failing step may come several mutations later.
    #[test]
    fn invalidation_is_detected_on_the_next_step() {
        let mut m = sample();
        let mut cur = m.cursor();
        cur.next(&m).unwrap();
        m.delete("a").unwrap();
        m.set("a", "1").unwrap();
        assert_eq!(cur.state(), CursorState::Active);
        assert_eq!(cur.next_key(&m), Err(Error::IteratorInvalidated));
    }

    #[test]
    fn failed_mutations_do_not_invalidate() {
        let mut m = sample();
        let mut cur = m.cursor();
        cur.next(&m).unwrap();
        assert!(m.delete("zzz").is_err());
        assert!(m.set("x", &7u8).is_err());
        assert!(cur.next(&m).unwrap().is_some());
    }

    #[test]
    fn exhausted_cursor_stays_exhausted() {
        let mut m = StrStrMap::new();
        let mut cur = m.cursor();
        assert_eq!(cur.next(&m), Ok(None));
        m.set("k", "v").unwrap();
        assert_eq!(cur.next(&m), Ok(None));
    }

    #[test]
    fn cursor_rejects_a_foreign_map() {
        let a = sample();
        let b = a.clone();
        let mut cur = a.cursor();
        assert_eq!(cur.next(&b), Err(Error::ForeignCursor));
        assert_eq!(cur.state(), CursorState::Active);
        assert!(cur.next(&a).unwrap().is_some());
    }

    #[test]
    fn keys_and_values_are_exact_size() {
        let m = sample();
        let keys: BTreeSet<&str> = m.keys().collect();
        let values: BTreeSet<&str> = m.values().collect();
        assert_eq!(keys, BTreeSet::from(["a", "b", "c"]));
        assert_eq!(values, BTreeSet::from(["1", "2", "3"]));
        let mut it = m.iter();
        assert_eq!(it.len(), 3);
        it.next();
        assert_eq!(it.len(), 2);
        assert_eq!((&m).into_iter().count(), 3);
    }
}
