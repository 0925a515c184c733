//! SlotTable: open-addressed index of fixed-size slots.
//!
//! The table answers "where does key K live" without holding any string
//! bytes. Each occupied slot caches a 32-bit fold of the key's hash and
//! two [`ArenaRef`]s; key equality is delegated to the caller through an
//! `eq` closure, the same shape as `hashbrown::HashTable::find`.
//!
//! Probing is triangular (`pos, pos+1, pos+3, pos+6, ...` modulo a
//! power-of-two capacity), which visits every slot exactly once per cycle.
//! Lookups skip tombstones and stop at the first empty slot. The owner
//! keeps `(occupied + tombstones) / capacity` below a load factor < 1, so
//! at least one empty slot always exists and every search terminates.

use crate::arena::ArenaRef;

/// Occupied-slot payload.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) struct Entry {
    pub(crate) hash: u32,
    pub(crate) key: ArenaRef,
    pub(crate) value: ArenaRef,
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub(crate) enum Slot {
    #[default]
    Empty,
    Tombstone,
    Occupied(Entry),
}

/// Result of [`SlotTable::find_or_claim`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum Claim {
    /// The key is stored at this index.
    Found(usize),
    /// The key is absent; this index (first tombstone seen, else the
    /// terminating empty slot) is where it should go.
    Vacant(usize),
}

#[inline]
pub(crate) fn fold_hash(h: u64) -> u32 {
    (h ^ (h >> 32)) as u32
}

struct SlotSeq {
    pos: usize,
    stride: usize,
}

impl SlotSeq {
    #[inline]
    fn advance(&mut self, mask: usize) {
        self.stride += 1;
        self.pos = (self.pos + self.stride) & mask;
    }
}

#[derive(Clone, Debug)]
pub(crate) struct SlotTable {
    slots: Box<[Slot]>,
    mask: usize,
    occupied: usize,
    tombstones: usize,
}

impl SlotTable {
    /// `capacity` must be a power of two.
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        debug_assert!(capacity.is_power_of_two());
        Self {
            slots: vec![Slot::Empty; capacity].into_boxed_slice(),
            mask: capacity - 1,
            occupied: 0,
            tombstones: 0,
        }
    }

    #[inline]
    pub(crate) fn capacity(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub(crate) fn occupied(&self) -> usize {
        self.occupied
    }

    #[inline]
    pub(crate) fn tombstones(&self) -> usize {
        self.tombstones
    }

    pub(crate) fn heap_bytes(&self) -> usize {
        self.slots.len() * core::mem::size_of::<Slot>()
    }

    #[inline]
    fn slot_seq(&self, hash: u32) -> SlotSeq {
        SlotSeq {
            pos: hash as usize & self.mask,
            stride: 0,
        }
    }

    pub(crate) fn find<F>(&self, hash: u32, mut eq: F) -> Option<usize>
    where
        F: FnMut(&Entry) -> bool,
    {
        let mut seq = self.slot_seq(hash);
        loop {
            match &self.slots[seq.pos] {
                Slot::Empty => return None,
                Slot::Occupied(e) if e.hash == hash && eq(e) => return Some(seq.pos),
                Slot::Occupied(_) | Slot::Tombstone => {}
            }
            seq.advance(self.mask);
        }
    }

    /// Like `find`, but on a miss reports the slot the key should claim,
    /// preferring the first tombstone on the search path.
    pub(crate) fn find_or_claim<F>(&self, hash: u32, mut eq: F) -> Claim
    where
        F: FnMut(&Entry) -> bool,
    {
        let mut seq = self.slot_seq(hash);
        let mut first_tombstone = None;
        loop {
            match &self.slots[seq.pos] {
                Slot::Empty => return Claim::Vacant(first_tombstone.unwrap_or(seq.pos)),
                Slot::Tombstone => {
                    first_tombstone.get_or_insert(seq.pos);
                }
                Slot::Occupied(e) if e.hash == hash && eq(e) => return Claim::Found(seq.pos),
                Slot::Occupied(_) => {}
            }
            seq.advance(self.mask);
        }
    }

    /// Fills a vacant slot. Returns true if a tombstone was reused.
    pub(crate) fn occupy(&mut self, idx: usize, entry: Entry) -> bool {
        let reused = match self.slots[idx] {
            Slot::Empty => false,
            Slot::Tombstone => true,
            Slot::Occupied(_) => {
                debug_assert!(false, "occupy on an occupied slot");
                return false;
            }
        };
        if reused {
            self.tombstones -= 1;
        }
        self.occupied += 1;
        self.slots[idx] = Slot::Occupied(entry);
        reused
    }

    /// Turns an occupied slot into a tombstone and returns its payload.
    pub(crate) fn vacate(&mut self, idx: usize) -> Option<Entry> {
        match self.slots[idx] {
            Slot::Occupied(e) => {
                self.slots[idx] = Slot::Tombstone;
                self.occupied -= 1;
                self.tombstones += 1;
                Some(e)
            }
            _ => None,
        }
    }

    #[inline]
    pub(crate) fn get(&self, idx: usize) -> Option<&Entry> {
        match self.slots.get(idx) {
            Some(Slot::Occupied(e)) => Some(e),
            _ => None,
        }
    }

    #[inline]
    pub(crate) fn get_mut(&mut self, idx: usize) -> Option<&mut Entry> {
        match self.slots.get_mut(idx) {
            Some(Slot::Occupied(e)) => Some(e),
            _ => None,
        }
    }

    /// First occupied slot at or after `from`, in table order.
    pub(crate) fn next_occupied(&self, from: usize) -> Option<(usize, &Entry)> {
        self.slots
            .get(from..)?
            .iter()
            .enumerate()
            .find_map(|(i, s)| match s {
                Slot::Occupied(e) => Some((from + i, e)),
                _ => None,
            })
    }

    pub(crate) fn entries(&self) -> Entries<'_> {
        Entries {
            slots: self.slots.iter(),
            remaining: self.occupied,
        }
    }

    pub(crate) fn entries_mut(&mut self) -> impl Iterator<Item = &mut Entry> + '_ {
        self.slots.iter_mut().filter_map(|s| match s {
            Slot::Occupied(e) => Some(e),
            _ => None,
        })
    }

    /// Builds a fresh table of `capacity` slots holding every occupied
    /// entry, placed by its cached hash. Tombstones are not carried over.
    pub(crate) fn rebuild(&self, capacity: usize) -> SlotTable {
        debug_assert!(capacity > self.occupied);
        let mut table = SlotTable::with_capacity(capacity);
        for e in self.entries() {
            table.insert_unique(*e);
        }
        table
    }

    /// Places an entry whose key is known to be absent.
    fn insert_unique(&mut self, entry: Entry) {
        let mut seq = self.slot_seq(entry.hash);
        while !matches!(self.slots[seq.pos], Slot::Empty) {
            seq.advance(self.mask);
        }
        self.slots[seq.pos] = Slot::Occupied(entry);
        self.occupied += 1;
    }

    #[cfg(test)]
    pub(crate) fn slots(&self) -> &[Slot] {
        &self.slots
    }
}

/// Occupied entries in table order.
#[derive(Clone)]
pub(crate) struct Entries<'a> {
    slots: core::slice::Iter<'a, Slot>,
    remaining: usize,
}

impl<'a> Iterator for Entries<'a> {
    type Item = &'a Entry;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        for s in self.slots.by_ref() {
            if let Slot::Occupied(e) = s {
                self.remaining -= 1;
                return Some(e);
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for Entries<'_> {}
impl core::iter::FusedIterator for Entries<'_> {}
