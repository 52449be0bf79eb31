//! Stateless cursor scans and random sampling.
//!
//! `scan` increments the cursor with its bits reversed, so buckets are
//! visited high-bit first. A table that doubled or halved between two calls
//! maps the remaining cursor space onto the same set of unvisited buckets,
//! which is what lets a scan survive resizes: every entry present for the
//! whole scan is reported at least once, some may be reported twice.

use crate::dict::{Dict, EntryHandle};
use crate::dict_type::{DictType, Value};
use rand::Rng;
use slotmap::DefaultKey;

#[inline]
fn next_cursor(v: u64, mask: u64) -> u64 {
    // Set the unmasked bits so the increment carries into the masked ones.
    (v | !mask).reverse_bits().wrapping_add(1).reverse_bits()
}

impl<T: DictType> Dict<T> {
    fn emit_bucket<F>(&self, table: usize, idx: usize, f: &mut F)
    where
        F: FnMut(EntryHandle, &T::Key, &Value<T::Value>),
    {
        let mut cur = self.ht[table].buckets[idx];
        while let Some(k) = cur {
            let e = &self.entries[k];
            f(EntryHandle::new(k), &e.key, &e.value);
            cur = e.next;
        }
    }

    /// Report the entries of the bucket(s) under `cursor` and return the
    /// cursor for the next call. Start with 0; a returned 0 ends the scan.
    pub fn scan<F>(&self, cursor: u64, mut f: F) -> u64
    where
        F: FnMut(EntryHandle, &T::Key, &Value<T::Value>),
    {
        if self.is_empty() {
            return 0;
        }
        let mut v = cursor;
        if !self.is_rehashing() {
            let m0 = self.ht[0].mask() as u64;
            self.emit_bucket(0, (v & m0) as usize, &mut f);
            return next_cursor(v, m0);
        }

        // Walk the small table's bucket, then every bucket of the large
        // table that expands from it.
        let (small, large) = if self.ht[0].size() <= self.ht[1].size() {
            (0, 1)
        } else {
            (1, 0)
        };
        let m0 = self.ht[small].mask() as u64;
        let m1 = self.ht[large].mask() as u64;
        self.emit_bucket(small, (v & m0) as usize, &mut f);
        loop {
            self.emit_bucket(large, (v & m1) as usize, &mut f);
            v = next_cursor(v, m1);
            if v & (m0 ^ m1) == 0 {
                break;
            }
        }
        v
    }

    /// A uniformly chosen non-empty bucket, then a uniformly chosen entry of
    /// its chain. Takes one rehash step like any other lookup.
    pub fn random_entry(&mut self) -> Option<EntryHandle> {
        self.random_entry_with(&mut rand::thread_rng())
    }

    pub fn random_entry_with<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Option<EntryHandle> {
        if self.is_empty() {
            return None;
        }
        if self.is_rehashing() && self.iterators == 0 {
            self.rehash(1);
        }
        let head: DefaultKey = match self.rehash_idx {
            Some(ridx) => {
                // Buckets of ht[0] below the cursor are already empty.
                let s0 = self.ht[0].size();
                let span = s0 + self.ht[1].size() - ridx;
                loop {
                    let h = ridx + rng.gen_range(0..span);
                    let slot = if h >= s0 {
                        self.ht[1].buckets[h - s0]
                    } else {
                        self.ht[0].buckets[h]
                    };
                    if let Some(k) = slot {
                        break k;
                    }
                }
            }
            None => {
                let s0 = self.ht[0].size();
                loop {
                    if let Some(k) = self.ht[0].buckets[rng.gen_range(0..s0)] {
                        break k;
                    }
                }
            }
        };

        let mut len = 0;
        let mut cur = Some(head);
        while let Some(k) = cur {
            len += 1;
            cur = self.entries[k].next;
        }
        let mut pick = head;
        for _ in 0..rng.gen_range(0..len) {
            match self.entries[pick].next {
                Some(k) => pick = k,
                None => break,
            }
        }
        Some(EntryHandle::new(pick))
    }
}
