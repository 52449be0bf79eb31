//! Dict: two generation tables over one entry arena, migrated incrementally.
//!
//! `ht[0]` is the live table. While a rehash is running, `ht[1]` is the
//! target, every new entry goes there, and `rehash_idx` names the next
//! `ht[0]` bucket to migrate. Each insert, delete and lookup moves one
//! bucket, unless a [`SafeIter`](crate::SafeIter) is live.

use crate::dict_type::{DictType, Value};
use crate::error::{AllocError, ExpandError, InsertError};
use crate::table::{self, Table};
use core::fmt;
use core::mem;
use log::{debug, trace, warn};
use slotmap::{DefaultKey, SlotMap};

/// Resize policy. Replaces the process-wide knobs of a server: callers that
/// bulk-load can turn growth off and still get emergency growth once chains
/// get long.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DictConfig {
    /// Grow as soon as the load factor reaches 1.
    pub resize_enabled: bool,
    /// With resizing disabled, grow anyway once `used / size` exceeds this.
    pub force_resize_ratio: usize,
    /// Bucket count of a freshly allocated table; also the shrink floor.
    pub initial_size: usize,
}

impl Default for DictConfig {
    fn default() -> Self {
        DictConfig {
            resize_enabled: true,
            force_resize_ratio: 5,
            initial_size: 4,
        }
    }
}

/// Stable reference to one entry. Stays valid across rehashing; resolves to
/// `None` once the entry is removed, even if its slot is reused.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct EntryHandle(DefaultKey);

impl EntryHandle {
    pub(crate) fn new(k: DefaultKey) -> Self {
        EntryHandle(k)
    }

    pub(crate) fn raw_handle(&self) -> DefaultKey {
        self.0
    }

    pub fn key<'a, T: DictType>(&self, dict: &'a Dict<T>) -> Option<&'a T::Key> {
        dict.entries.get(self.0).map(|e| &e.key)
    }

    pub fn value<'a, T: DictType>(&self, dict: &'a Dict<T>) -> Option<&'a Value<T::Value>> {
        dict.entries.get(self.0).map(|e| &e.value)
    }

    pub fn value_mut<'a, T: DictType>(
        &self,
        dict: &'a mut Dict<T>,
    ) -> Option<&'a mut Value<T::Value>> {
        dict.entries.get_mut(self.0).map(|e| &mut e.value)
    }

    /// Store `value` (handles go through `dup_value`) and hand back the
    /// previous one without destroying it.
    pub fn set<T: DictType>(
        &self,
        dict: &mut Dict<T>,
        value: Value<T::Value>,
    ) -> Option<Value<T::Value>> {
        if !dict.entries.contains_key(self.0) {
            return None;
        }
        let value = dict.dup_value(value);
        dict.entries
            .get_mut(self.0)
            .map(|e| mem::replace(&mut e.value, value))
    }

    pub fn set_signed<T: DictType>(&self, dict: &mut Dict<T>, n: i64) -> Option<Value<T::Value>> {
        self.set(dict, Value::Signed(n))
    }

    pub fn set_unsigned<T: DictType>(
        &self,
        dict: &mut Dict<T>,
        n: u64,
    ) -> Option<Value<T::Value>> {
        self.set(dict, Value::Unsigned(n))
    }

    pub fn set_double<T: DictType>(&self, dict: &mut Dict<T>, n: f64) -> Option<Value<T::Value>> {
        self.set(dict, Value::Double(n))
    }
}

#[derive(Debug)]
pub(crate) struct Entry<K, V> {
    pub(crate) key: K,
    pub(crate) value: Value<V>,
    /// Next entry in the same bucket chain.
    pub(crate) next: Option<DefaultKey>,
}

pub struct Dict<T: DictType> {
    pub(crate) ty: T,
    pub(crate) ht: [Table; 2],
    pub(crate) entries: SlotMap<DefaultKey, Entry<T::Key, T::Value>>,
    /// Next `ht[0]` bucket to migrate; `None` when not rehashing.
    pub(crate) rehash_idx: Option<usize>,
    /// Live safe iterators that have started walking.
    pub(crate) iterators: usize,
    config: DictConfig,
}

impl<T: DictType + Default> Default for Dict<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: DictType> fmt::Debug for Dict<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dict")
            .field("len", &self.len())
            .field("table_sizes", &self.table_sizes())
            .field("rehash_idx", &self.rehash_idx)
            .field("iterators", &self.iterators)
            .field("config", &self.config)
            .finish()
    }
}

impl<T: DictType> Dict<T> {
    /// Empty dictionary; no buckets are allocated until the first insert.
    pub fn new(ty: T) -> Self {
        Self::with_config(ty, DictConfig::default())
    }

    pub fn with_config(ty: T, config: DictConfig) -> Self {
        Dict {
            ty,
            ht: [Table::empty(), Table::empty()],
            entries: SlotMap::with_key(),
            rehash_idx: None,
            iterators: 0,
            config,
        }
    }

    pub fn dict_type(&self) -> &T {
        &self.ty
    }

    pub fn config(&self) -> &DictConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: DictConfig) {
        self.config = config;
    }

    pub fn enable_resize(&mut self) {
        self.config.resize_enabled = true;
    }

    pub fn disable_resize(&mut self) {
        self.config.resize_enabled = false;
    }

    pub fn len(&self) -> usize {
        self.ht[0].used + self.ht[1].used
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_rehashing(&self) -> bool {
        self.rehash_idx.is_some()
    }

    /// Bucket counts of the live table and the rehash target.
    pub fn table_sizes(&self) -> (usize, usize) {
        (self.ht[0].size(), self.ht[1].size())
    }

    /// Cursor of the running rehash, if any.
    pub fn rehash_index(&self) -> Option<usize> {
        self.rehash_idx
    }

    /// Number of safe iterators currently freezing the layout.
    pub fn live_iterators(&self) -> usize {
        self.iterators
    }

    /// True when the live table is mostly empty and worth shrinking with
    /// [`resize_to_fit`](Self::resize_to_fit).
    pub fn needs_shrink(&self) -> bool {
        let size = self.ht[0].size();
        size > self.config.initial_size && self.ht[0].used * 100 / size < 10
    }

    fn dup_value(&self, value: Value<T::Value>) -> Value<T::Value> {
        match value {
            Value::Handle(v) => Value::Handle(self.ty.dup_value(v)),
            other => other,
        }
    }

    fn destroy(&self, key: T::Key, value: Value<T::Value>) {
        self.ty.destroy_key(key);
        if let Value::Handle(v) = value {
            self.ty.destroy_value(v);
        }
    }

    /// Migrate a single bucket unless a safe iterator froze the layout.
    fn rehash_step(&mut self) {
        if self.iterators == 0 {
            self.rehash(1);
        }
    }

    /// Search both tables for `key`. Pure: no rehash step.
    fn lookup(&self, hash: u64, key: &T::Key) -> Option<DefaultKey> {
        for t in &self.ht {
            if t.is_allocated() {
                let mut cur = t.buckets[t.bucket_of(hash)];
                while let Some(k) = cur {
                    let e = &self.entries[k];
                    if self.ty.key_eq(key, &e.key) {
                        return Some(k);
                    }
                    cur = e.next;
                }
            }
            if !self.is_rehashing() {
                break;
            }
        }
        None
    }

    pub fn find(&mut self, key: &T::Key) -> Option<EntryHandle> {
        if self.is_empty() {
            return None;
        }
        if self.is_rehashing() {
            self.rehash_step();
        }
        let hash = self.ty.hash(key);
        self.lookup(hash, key).map(EntryHandle::new)
    }

    pub fn contains_key(&mut self, key: &T::Key) -> bool {
        self.find(key).is_some()
    }

    pub fn fetch_value(&mut self, key: &T::Key) -> Option<&Value<T::Value>> {
        let h = self.find(key)?;
        self.entries.get(h.raw_handle()).map(|e| &e.value)
    }

    /// Grow the live table when the load-factor policy asks for it.
    fn expand_if_needed(&mut self) -> Result<(), AllocError> {
        if self.is_rehashing() {
            return Ok(());
        }
        let (size, used) = (self.ht[0].size(), self.ht[0].used);
        if size == 0 {
            return self.grow_to(self.config.initial_size);
        }
        if used >= size {
            let forced = used / size > self.config.force_resize_ratio;
            if self.config.resize_enabled || forced {
                if !self.config.resize_enabled {
                    warn!("forcing growth with resize disabled: {used} entries in {size} buckets");
                }
                return self.grow_to(used.saturating_mul(2));
            }
        }
        Ok(())
    }

    /// `expand` for the growth policy: only allocation failure matters.
    fn grow_to(&mut self, size: usize) -> Result<(), AllocError> {
        match self.expand(size) {
            Err(ExpandError::Alloc(e)) => Err(e),
            _ => Ok(()),
        }
    }

    /// Bucket index for a new `key` in the table inserts currently target,
    /// or the existing entry. Grows first if needed.
    fn key_index(&mut self, key: &T::Key) -> Result<usize, InsertError> {
        self.expand_if_needed()?;
        let hash = self.ty.hash(key);
        let mut idx = 0;
        for t in &self.ht {
            idx = t.bucket_of(hash);
            let mut cur = t.buckets[idx];
            while let Some(k) = cur {
                let e = &self.entries[k];
                if self.ty.key_eq(key, &e.key) {
                    return Err(InsertError::DuplicateKey(EntryHandle::new(k)));
                }
                cur = e.next;
            }
            if !self.is_rehashing() {
                break;
            }
        }
        Ok(idx)
    }

    fn slot_for(&mut self, key: &T::Key) -> Result<usize, InsertError> {
        if self.is_rehashing() {
            self.rehash_step();
        }
        self.key_index(key)
    }

    /// Prepend a new entry to bucket `idx` of the insert target table.
    fn link(&mut self, idx: usize, key: T::Key, value: Value<T::Value>) -> EntryHandle {
        let key = self.ty.dup_key(key);
        let value = self.dup_value(value);
        let t = usize::from(self.is_rehashing());
        let next = self.ht[t].buckets[idx];
        let k = self.entries.insert(Entry { key, value, next });
        self.ht[t].buckets[idx] = Some(k);
        self.ht[t].used += 1;
        EntryHandle::new(k)
    }

    /// Add `key` with a handle value. Never overwrites.
    pub fn insert(&mut self, key: T::Key, value: T::Value) -> Result<EntryHandle, InsertError> {
        self.insert_value(key, Value::Handle(value))
    }

    pub fn insert_value(
        &mut self,
        key: T::Key,
        value: Value<T::Value>,
    ) -> Result<EntryHandle, InsertError> {
        let idx = self.slot_for(&key)?;
        Ok(self.link(idx, key, value))
    }

    /// Existing entry for `key`, or a new one holding `Value::Unsigned(0)`.
    pub fn add_or_find(&mut self, key: T::Key) -> Result<EntryHandle, AllocError> {
        match self.slot_for(&key) {
            Ok(idx) => Ok(self.link(idx, key, Value::Unsigned(0))),
            Err(InsertError::DuplicateKey(h)) => Ok(h),
            Err(InsertError::Alloc(e)) => Err(e),
        }
    }

    /// Insert or overwrite. Returns `true` if the key was added, `false` if
    /// an existing value was replaced. The new value is stored before the
    /// old one is destroyed, so both may share a resource.
    pub fn replace(&mut self, key: T::Key, value: T::Value) -> Result<bool, AllocError> {
        match self.slot_for(&key) {
            Ok(idx) => {
                self.link(idx, key, Value::Handle(value));
                Ok(true)
            }
            Err(InsertError::DuplicateKey(h)) => {
                let value = Value::Handle(self.ty.dup_value(value));
                let old = mem::replace(&mut self.entries[h.raw_handle()].value, value);
                if let Value::Handle(v) = old {
                    self.ty.destroy_value(v);
                }
                Ok(false)
            }
            Err(InsertError::Alloc(e)) => Err(e),
        }
    }

    /// Unlink the first entry matching `key` and return it.
    fn generic_delete(&mut self, key: &T::Key) -> Option<Entry<T::Key, T::Value>> {
        if self.is_empty() {
            return None;
        }
        if self.is_rehashing() {
            self.rehash_step();
        }
        let hash = self.ty.hash(key);
        for t in 0..2 {
            if self.ht[t].is_allocated() {
                let idx = self.ht[t].bucket_of(hash);
                let mut prev: Option<DefaultKey> = None;
                let mut cur = self.ht[t].buckets[idx];
                while let Some(k) = cur {
                    let next = self.entries[k].next;
                    if self.ty.key_eq(key, &self.entries[k].key) {
                        match prev {
                            Some(p) => self.entries[p].next = next,
                            None => self.ht[t].buckets[idx] = next,
                        }
                        self.ht[t].used -= 1;
                        return self.entries.remove(k);
                    }
                    prev = Some(k);
                    cur = next;
                }
            }
            if !self.is_rehashing() {
                break;
            }
        }
        None
    }

    /// Remove `key`, running the descriptor's destructors. Returns whether
    /// it was present.
    pub fn delete(&mut self, key: &T::Key) -> bool {
        match self.generic_delete(key) {
            Some(e) => {
                self.destroy(e.key, e.value);
                true
            }
            None => false,
        }
    }

    /// Remove `key` without destroying it; the caller owns the pair.
    pub fn unlink(&mut self, key: &T::Key) -> Option<(T::Key, Value<T::Value>)> {
        self.generic_delete(key).map(|e| (e.key, e.value))
    }

    /// Remove the entry behind `handle` without destroying it and without
    /// advancing the rehash, so it is usable while iterating.
    pub fn remove(&mut self, handle: EntryHandle) -> Option<(T::Key, Value<T::Value>)> {
        let target = handle.raw_handle();
        let hash = self.ty.hash(&self.entries.get(target)?.key);
        for t in 0..2 {
            if !self.ht[t].is_allocated() {
                continue;
            }
            let idx = self.ht[t].bucket_of(hash);
            let mut prev: Option<DefaultKey> = None;
            let mut cur = self.ht[t].buckets[idx];
            while let Some(k) = cur {
                let next = self.entries[k].next;
                if k == target {
                    match prev {
                        Some(p) => self.entries[p].next = next,
                        None => self.ht[t].buckets[idx] = next,
                    }
                    self.ht[t].used -= 1;
                    return self.entries.remove(k).map(|e| (e.key, e.value));
                }
                prev = Some(k);
                cur = next;
            }
        }
        None
    }

    /// Resize to the smallest power of two holding `size` entries.
    ///
    /// With no live table this just allocates one; otherwise it installs the
    /// rehash target and starts migrating from bucket 0.
    pub fn expand(&mut self, size: usize) -> Result<(), ExpandError> {
        if self.is_rehashing() {
            return Err(ExpandError::Rehashing);
        }
        let used = self.ht[0].used;
        if used > size {
            return Err(ExpandError::BelowOccupancy {
                requested: size,
                used,
            });
        }
        let real = table::next_power(size, self.config.initial_size)
            .ok_or(AllocError { buckets: usize::MAX })?;
        if real == self.ht[0].size() {
            return Err(ExpandError::SameSize(real));
        }
        let fresh = Table::with_size(real)?;
        if !self.ht[0].is_allocated() {
            trace!("allocated initial table of {real} buckets");
            self.ht[0] = fresh;
            return Ok(());
        }
        debug!(
            "rehash started: {} -> {real} buckets, {used} entries",
            self.ht[0].size()
        );
        self.ht[1] = fresh;
        self.rehash_idx = Some(0);
        Ok(())
    }

    /// Shrink (or grow) to the smallest table holding every live entry.
    pub fn resize_to_fit(&mut self) -> Result<(), ExpandError> {
        if !self.config.resize_enabled {
            return Err(ExpandError::ResizeDisabled);
        }
        if self.is_rehashing() {
            return Err(ExpandError::Rehashing);
        }
        let minimal = self.ht[0].used.max(self.config.initial_size);
        self.expand(minimal)
    }

    /// Migrate up to `n` non-empty buckets. Gives up early after `10 * n`
    /// empty buckets. Returns whether a rehash is still in progress; does
    /// nothing while a safe iterator is live.
    pub fn rehash(&mut self, n: usize) -> bool {
        if self.iterators > 0 {
            return self.is_rehashing();
        }
        let Some(mut idx) = self.rehash_idx else {
            return false;
        };
        let mut empty_visits = n.saturating_mul(10);
        let mut n = n;
        while n > 0 && self.ht[0].used != 0 {
            n -= 1;
            debug_assert!(idx < self.ht[0].size());
            while self.ht[0].buckets[idx].is_none() {
                idx += 1;
                empty_visits -= 1;
                if empty_visits == 0 {
                    self.rehash_idx = Some(idx);
                    return true;
                }
            }
            let mut cur = self.ht[0].buckets[idx].take();
            while let Some(k) = cur {
                let entry = &mut self.entries[k];
                cur = entry.next;
                let dst = self.ht[1].bucket_of(self.ty.hash(&entry.key));
                entry.next = self.ht[1].buckets[dst];
                self.ht[1].buckets[dst] = Some(k);
                self.ht[0].used -= 1;
                self.ht[1].used += 1;
            }
            idx += 1;
        }

        if self.ht[0].used == 0 {
            self.ht[0] = mem::take(&mut self.ht[1]);
            self.rehash_idx = None;
            debug!(
                "rehash complete: {} buckets, {} entries",
                self.ht[0].size(),
                self.ht[0].used
            );
            return false;
        }
        self.rehash_idx = Some(idx);
        true
    }

    /// Destroy every entry and release both tables.
    pub fn clear(&mut self) {
        self.clear_with(|| {});
    }

    /// Like [`clear`](Self::clear), calling `callback` every 65536 buckets
    /// so long clears can yield to other work.
    pub fn clear_with(&mut self, mut callback: impl FnMut()) {
        for t in 0..2 {
            for i in 0..self.ht[t].size() {
                if self.ht[t].used == 0 {
                    break;
                }
                if i & 0xffff == 0 {
                    callback();
                }
                let mut cur = self.ht[t].buckets[i].take();
                while let Some(k) = cur {
                    let Some(e) = self.entries.remove(k) else {
                        break;
                    };
                    cur = e.next;
                    self.ht[t].used -= 1;
                    self.destroy(e.key, e.value);
                }
            }
            self.ht[t] = Table::empty();
        }
        self.rehash_idx = None;
    }

    /// Read-only walk over every entry, in arena order.
    pub fn iter(&self) -> crate::iter::Iter<'_, T> {
        crate::iter::Iter::new(self)
    }

    pub fn iter_mut(&mut self) -> crate::iter::IterMut<'_, T> {
        crate::iter::IterMut::new(self)
    }

    /// Iterator that freezes rehashing while it walks and tolerates removal
    /// of the entry it just returned.
    pub fn safe_iter(&mut self) -> crate::iter::SafeIter<'_, T> {
        crate::iter::SafeIter::new(self)
    }
}

impl<T: DictType> Drop for Dict<T> {
    fn drop(&mut self) {
        self.clear();
    }
}
