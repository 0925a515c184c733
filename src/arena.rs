//! StringArena: append-only text buffer holding every key and value.
//!
//! Slots never own string data; they hold [`ArenaRef`]s, `(offset, len)`
//! pairs into one contiguous buffer. The buffer is a `String`, so every
//! region appended through [`StringArena::store`] starts and ends on a
//! char boundary and reads are plain safe slices.
//!
//! Overwrites and deletes do not reclaim space. They only add to
//! `dead_bytes`; [`StringArena::compact`] later copies the live regions
//! into a fresh buffer and hands back the remapped references.

use crate::error::{Error, Result};

/// Largest arena the 32-bit references can address.
pub(crate) const MAX_ARENA_BYTES: usize = u32::MAX as usize;

/// A region of the arena. Only meaningful for the arena that issued it,
/// and only until that arena is replaced by compaction.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub(crate) struct ArenaRef {
    offset: u32,
    len: u32,
}

impl ArenaRef {
    #[inline]
    pub(crate) fn len(self) -> usize {
        self.len as usize
    }

    #[inline]
    pub(crate) fn start(self) -> usize {
        self.offset as usize
    }

    #[inline]
    pub(crate) fn end(self) -> usize {
        self.start() + self.len()
    }

    /// True when the two regions share at least one byte.
    #[cfg(test)]
    pub(crate) fn overlaps(self, other: ArenaRef) -> bool {
        self.len > 0 && other.len > 0 && self.start() < other.end() && other.start() < self.end()
    }
}

#[derive(Clone, Debug, Default)]
pub(crate) struct StringArena {
    buf: String,
    dead: usize,
}

/// Output of [`StringArena::compact`]: the new arena and, for every input
/// reference in order, its replacement.
pub(crate) struct Compacted {
    pub(crate) arena: StringArena,
    pub(crate) remap: Vec<ArenaRef>,
}

impl StringArena {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Bytes written so far, live and dead.
    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.buf.len()
    }

    #[inline]
    pub(crate) fn dead_bytes(&self) -> usize {
        self.dead
    }

    #[inline]
    pub(crate) fn live_bytes(&self) -> usize {
        self.buf.len() - self.dead
    }

    pub(crate) fn heap_bytes(&self) -> usize {
        self.buf.capacity()
    }

    /// Fails when `extra` more bytes would not be addressable.
    pub(crate) fn check_room(&self, extra: usize) -> Result<()> {
        match self.buf.len().checked_add(extra) {
            Some(total) if total <= MAX_ARENA_BYTES => Ok(()),
            _ => Err(Error::CapacityOverflow),
        }
    }

    /// Appends `s` at the write cursor. Callers run `check_room` first;
    /// `String` grows its buffer geometrically.
    pub(crate) fn store(&mut self, s: &str) -> ArenaRef {
        debug_assert!(self.check_room(s.len()).is_ok());
        let offset = self.buf.len() as u32;
        self.buf.push_str(s);
        ArenaRef {
            offset,
            len: s.len() as u32,
        }
    }

    #[inline]
    pub(crate) fn read(&self, r: ArenaRef) -> &str {
        &self.buf[r.start()..r.end()]
    }

    pub(crate) fn mark_dead(&mut self, r: ArenaRef) {
        self.dead += r.len();
        debug_assert!(self.dead <= self.buf.len());
    }

    /// Copies every region in `live` into a buffer sized to exactly the
    /// live content, preserving the iteration order of `live`.
    pub(crate) fn compact<I>(&self, live: I) -> Compacted
    where
        I: IntoIterator<Item = ArenaRef>,
    {
        let live = live.into_iter();
        let mut arena = StringArena {
            buf: String::with_capacity(self.live_bytes()),
            dead: 0,
        };
        let mut remap = Vec::with_capacity(live.size_hint().0);
        for r in live {
            remap.push(arena.store(self.read(r)));
        }
        debug_assert_eq!(arena.len(), self.live_bytes());
        Compacted { arena, remap }
    }
}
