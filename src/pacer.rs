//! Time-boxed rehashing for callers that want to finish a migration from
//! their own idle loop instead of waiting for piggy-backed steps.

use crate::dict::Dict;
use crate::dict_type::DictType;
use log::trace;
use std::time::{Duration, Instant};

/// Buckets migrated between two deadline checks.
const BATCH: usize = 100;

impl<T: DictType> Dict<T> {
    /// Rehash in batches of 100 buckets until done or `budget` has elapsed.
    /// The deadline is checked after each batch, so the call may overrun by
    /// one batch. Returns the number of bucket migrations requested; 0 while
    /// a safe iterator is live.
    pub fn rehash_for(&mut self, budget: Duration) -> usize {
        if self.iterators > 0 {
            return 0;
        }
        let start = Instant::now();
        let mut rehashes = 0;
        while self.rehash(BATCH) {
            rehashes += BATCH;
            if start.elapsed() > budget {
                break;
            }
        }
        trace!(
            "paced rehash: {rehashes} steps in {:?}, rehashing={}",
            start.elapsed(),
            self.is_rehashing()
        );
        rehashes
    }

    pub fn rehash_milliseconds(&mut self, ms: u64) -> usize {
        self.rehash_for(Duration::from_millis(ms))
    }
}
