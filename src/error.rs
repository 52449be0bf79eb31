//! Failure taxonomy for dictionary operations.
//!
//! Missing keys are not errors: lookups and deletes report them as `None` or
//! `false`. Everything here is returned to the caller of the operation that
//! failed; the dictionary never retries and never keeps a sticky error state.

use crate::dict::EntryHandle;
use thiserror::Error;

/// A bucket array could not be reserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("failed to allocate a bucket array of {buckets} slots")]
pub struct AllocError {
    pub buckets: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InsertError {
    /// The key is already present. Carries the existing entry so callers can
    /// overwrite it in place.
    #[error("key already present")]
    DuplicateKey(EntryHandle),
    #[error(transparent)]
    Alloc(#[from] AllocError),
}

/// Reasons an explicit resize is rejected. None of these change the
/// dictionary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ExpandError {
    #[error("a rehash is already in progress")]
    Rehashing,
    #[error("requested size {requested} is below the {used} live entries")]
    BelowOccupancy { requested: usize, used: usize },
    #[error("table already has {0} buckets")]
    SameSize(usize),
    #[error("resizing is disabled")]
    ResizeDisabled,
    #[error(transparent)]
    Alloc(#[from] AllocError),
}
