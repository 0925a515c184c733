//! Tunables for table growth and arena compaction.

use crate::error::{Error, Result};

/// Smallest slot table the map ever allocates.
pub const MIN_CAPACITY: usize = 8;

/// Largest slot table the map ever allocates. Arena offsets are 32-bit, so
/// more slots than this could never be filled.
pub const MAX_CAPACITY: usize = 1 << if usize::BITS > 32 { 32 } else { usize::BITS - 1 };

/// Growth and compaction policy for a [`StrStrMap`](crate::StrStrMap).
///
/// ```
/// use strstrmap::{StrMapConfig, StrStrMap};
///
/// let cfg = StrMapConfig::default()
///     .with_initial_capacity(1024)
///     .with_max_load_factor(0.6);
/// let m = StrStrMap::with_config(cfg).unwrap();
/// assert!(m.capacity() >= 1024);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct StrMapConfig {
    /// Slots allocated up front; rounded up to a power of two.
    pub initial_capacity: usize,
    /// `(live + tombstones) / capacity` above which the table is rebuilt.
    pub max_load_factor: f64,
    /// Fraction of dead arena bytes above which the arena is compacted.
    pub compaction_threshold: f64,
    /// Arenas smaller than this are never compacted.
    pub compaction_min_bytes: usize,
}

impl Default for StrMapConfig {
    fn default() -> Self {
        Self {
            initial_capacity: MIN_CAPACITY,
            max_load_factor: 0.7,
            compaction_threshold: 0.5,
            compaction_min_bytes: 0,
        }
    }
}

impl StrMapConfig {
    pub fn with_initial_capacity(mut self, slots: usize) -> Self {
        self.initial_capacity = slots;
        self
    }

    pub fn with_max_load_factor(mut self, load: f64) -> Self {
        self.max_load_factor = load;
        self
    }

    pub fn with_compaction_threshold(mut self, fraction: f64) -> Self {
        self.compaction_threshold = fraction;
        self
    }

    pub fn with_compaction_min_bytes(mut self, bytes: usize) -> Self {
        self.compaction_min_bytes = bytes;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.max_load_factor > 0.0 && self.max_load_factor < 1.0) {
            return Err(Error::InvalidConfig(format!(
                "max_load_factor must be in (0, 1), got {}",
                self.max_load_factor
            )));
        }
        if !(self.compaction_threshold > 0.0 && self.compaction_threshold <= 1.0) {
            return Err(Error::InvalidConfig(format!(
                "compaction_threshold must be in (0, 1], got {}",
                self.compaction_threshold
            )));
        }
        if self.initial_capacity > MAX_CAPACITY {
            return Err(Error::InvalidConfig(format!(
                "initial_capacity {} exceeds the addressable slot count",
                self.initial_capacity
            )));
        }
        Ok(())
    }

    /// Slot count actually allocated for `initial_capacity`.
    pub(crate) fn initial_slots(&self) -> usize {
        self.initial_capacity.max(MIN_CAPACITY).next_power_of_two()
    }

    /// Smallest power-of-two capacity holding `entries` without exceeding
    /// the load factor, or `CapacityOverflow` past [`MAX_CAPACITY`].
    pub(crate) fn capacity_for(&self, entries: usize) -> Result<usize> {
        let needed = (entries as f64 / self.max_load_factor).floor();
        if !(needed < MAX_CAPACITY as f64) {
            return Err(Error::CapacityOverflow);
        }
        // needed + 1 <= MAX_CAPACITY, itself a power of two.
        Ok((needed as usize + 1).max(MIN_CAPACITY).next_power_of_two())
    }

    /// Whether `used` occupied-or-tombstone slots overflow `capacity`.
    #[inline]
    pub(crate) fn over_load(&self, used: usize, capacity: usize) -> bool {
        used as f64 > capacity as f64 * self.max_load_factor
    }

    #[inline]
    pub(crate) fn wants_compaction(&self, dead: usize, total: usize) -> bool {
        total >= self.compaction_min_bytes
            && dead > 0
            && dead as f64 > total as f64 * self.compaction_threshold
    }
}
