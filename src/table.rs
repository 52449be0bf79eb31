//! Generation table: one power-of-two array of chain heads.
//!
//! Chains are threaded through the dictionary's entry arena, so a table only
//! stores the head key of each bucket plus its live-entry count.

use crate::error::AllocError;
use slotmap::DefaultKey;

#[derive(Debug, Default)]
pub(crate) struct Table {
    pub(crate) buckets: Vec<Option<DefaultKey>>,
    /// Entries reachable from `buckets`.
    pub(crate) used: usize,
}

impl Table {
    pub(crate) const fn empty() -> Self {
        Table {
            buckets: Vec::new(),
            used: 0,
        }
    }

    /// Allocate `size` empty buckets. `size` must be a power of two.
    pub(crate) fn with_size(size: usize) -> Result<Self, AllocError> {
        debug_assert!(size.is_power_of_two());
        let mut buckets = Vec::new();
        buckets
            .try_reserve_exact(size)
            .map_err(|_| AllocError { buckets: size })?;
        buckets.resize(size, None);
        Ok(Table { buckets, used: 0 })
    }

    #[inline]
    pub(crate) fn size(&self) -> usize {
        self.buckets.len()
    }

    #[inline]
    pub(crate) fn mask(&self) -> usize {
        self.size().wrapping_sub(1)
    }

    #[inline]
    pub(crate) fn is_allocated(&self) -> bool {
        !self.buckets.is_empty()
    }

    /// Bucket index for `hash`. Only meaningful on an allocated table.
    #[inline]
    pub(crate) fn bucket_of(&self, hash: u64) -> usize {
        (hash as usize) & self.mask()
    }
}

/// Smallest power of two that is `>= size` and `>= floor`, or `None` when
/// that would not fit in a `usize`.
pub(crate) fn next_power(size: usize, floor: usize) -> Option<usize> {
    size.max(floor).max(1).checked_next_power_of_two()
}
