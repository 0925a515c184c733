//! strstrmap: a string-to-string map with low per-entry memory overhead.
//!
//! `StrStrMap` keeps the mutation, lookup and iteration contract of an
//! ordinary mapping, restricted to string keys and string values, while
//! avoiding one heap allocation per key and per value. Workloads holding
//! millions of short pairs (caches, dedup tables, in-process indexes) pay
//! for a slot and the string bytes, not for two `String` headers and two
//! allocator blocks.
//!
//! Internal Design:
//!
//! Summary
//! - Layers:
//!   - StringArena: one growable text buffer holding every key and value;
//!     entries refer to it through `(offset, len)` references.
//!   - SlotTable: open-addressed array of fixed-size slots (empty,
//!     tombstone, or occupied with a cached hash and two arena references).
//!   - StrStrMap: public surface; runs validation, probing, growth,
//!     compaction, and keeps the `version` stamp.
//!   - Cursor: detached iterator that checks `version` on every step.
//!
//! Constraints
//! - Single-threaded: no internal locking and no interior mutability.
//!   Shared references only read; mutation needs `&mut`, so sharing a
//!   mutable map across threads takes a `Mutex` or `RwLock`.
//! - No per-entry heap allocations beyond the arena and the slot array.
//! - Only strings go in. Generic call sites are type-checked at runtime via
//!   [`StrArg`]; anything else (bytes included) fails with `WrongType`
//!   before the map is touched.
//!
//! Growth and reclamation
//! - The table is rebuilt when `(live + tombstones) / capacity` exceeds the
//!   load factor. Rebuilding re-places entries by their cached hash, keeps
//!   arena references as they are, and drops every tombstone. Tables that
//!   are mostly tombstones are rebuilt at the same capacity; full ones double.
//! - Overwrites and deletes leave dead bytes behind in the arena. Once dead
//!   bytes exceed the compaction threshold, live regions are copied in table
//!   order into an exactly-sized buffer and the slots are remapped.
//! - Both are "allocate new, migrate, drop old"; nothing is moved in place.
//!
//! Versioning
//! - Every successful `set` (new key or overwrite), `delete`, `remove`,
//!   non-empty `update`, `clear`, `shrink_to_fit` and resizing `reserve`
//!   bumps `version` as its last step. Failed operations do not.
//! - A `Cursor` snapshots `version` and fails with `IteratorInvalidated`
//!   on the first step after any change. Detection is lazy.
//!
//! Notes and non-goals
//! - Iteration order is slot order, not insertion order.
//! - No persistence, no concurrent mutation, no non-string payloads.

mod arena;
mod arg;
mod config;
mod cursor;
mod error;
mod slot_table;
mod str_map;
mod str_map_proptest;

// Public surface
pub use arg::StrArg;
pub use config::{StrMapConfig, MAX_CAPACITY, MIN_CAPACITY};
pub use cursor::{Cursor, CursorState, Iter, Keys, Values};
pub use error::{ArgRole, Error, Result};
pub use str_map::{MapStats, StrStrMap};
