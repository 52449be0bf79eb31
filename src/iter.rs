//! Iteration over a [`Dict`].
//!
//! [`Iter`]/[`IterMut`] borrow the dictionary and walk the entry arena.
//! [`SafeIter`] walks the bucket layout instead, keeps rehashing frozen for
//! as long as it is alive, and lets the caller reach the dictionary through
//! it to remove the entry it just returned.

use crate::dict::{Dict, Entry, EntryHandle};
use crate::dict_type::{DictType, Value};
use slotmap::DefaultKey;

/// Iterator over immutable entries in `Dict`.
pub struct Iter<'a, T: DictType> {
    it: slotmap::basic::Iter<'a, DefaultKey, Entry<T::Key, T::Value>>,
}

impl<'a, T: DictType> Iter<'a, T> {
    pub(crate) fn new(dict: &'a Dict<T>) -> Self {
        Iter {
            it: dict.entries.iter(),
        }
    }
}

impl<'a, T: DictType> Iterator for Iter<'a, T> {
    type Item = (EntryHandle, &'a T::Key, &'a Value<T::Value>);
    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.it
            .next()
            .map(|(k, e)| (EntryHandle::new(k), &e.key, &e.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.it.size_hint()
    }
}

/// Iterator over mutable values in `Dict`.
pub struct IterMut<'a, T: DictType> {
    it: slotmap::basic::IterMut<'a, DefaultKey, Entry<T::Key, T::Value>>,
}

impl<'a, T: DictType> IterMut<'a, T> {
    pub(crate) fn new(dict: &'a mut Dict<T>) -> Self {
        IterMut {
            it: dict.entries.iter_mut(),
        }
    }
}

impl<'a, T: DictType> Iterator for IterMut<'a, T> {
    type Item = (EntryHandle, &'a T::Key, &'a mut Value<T::Value>);
    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.it
            .next()
            .map(|(k, e)| (EntryHandle::new(k), &e.key, &mut e.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.it.size_hint()
    }
}

/// Bucket-order cursor that freezes rehashing while it walks.
///
/// The live-iterator count is bumped on the first call to `next` and dropped
/// again when the iterator is dropped, so an iterator that never advanced
/// leaves the count untouched. The walk follows the chain links of the
/// dictionary as they are when it advances, so removing other entries
/// (through [`dict_mut`](Self::dict_mut)) never hides the ones after them.
/// The successor of each returned entry is also captured before it is
/// handed out, which keeps the walk going when the returned entry itself
/// is removed (through `dict_mut` or
/// [`remove_current`](Self::remove_current)). Entries inserted mid-walk
/// may or may not be visited.
pub struct SafeIter<'a, T: DictType> {
    dict: &'a mut Dict<T>,
    /// 0 while walking the live table, 1 once it moved to the rehash target.
    table: usize,
    /// Current bucket; `None` until the first `next`.
    index: Option<usize>,
    entry: Option<DefaultKey>,
    next_entry: Option<DefaultKey>,
}

impl<'a, T: DictType> SafeIter<'a, T> {
    pub(crate) fn new(dict: &'a mut Dict<T>) -> Self {
        SafeIter {
            dict,
            table: 0,
            index: None,
            entry: None,
            next_entry: None,
        }
    }

    fn started(&self) -> bool {
        self.index.is_some() || self.table != 0
    }

    pub fn dict(&self) -> &Dict<T> {
        &*self.dict
    }

    pub fn dict_mut(&mut self) -> &mut Dict<T> {
        &mut *self.dict
    }

    /// Remove the entry most recently returned by `next`, handing it back
    /// without running destructors.
    pub fn remove_current(&mut self) -> Option<(T::Key, Value<T::Value>)> {
        let k = self.entry?;
        self.dict.remove(EntryHandle::new(k))
    }

    /// Stop iterating and unfreeze rehashing. Same as dropping.
    pub fn release(self) {}
}

impl<'a, T: DictType> Iterator for SafeIter<'a, T> {
    type Item = EntryHandle;

    fn next(&mut self) -> Option<EntryHandle> {
        loop {
            match self.entry {
                None => {
                    if !self.started() {
                        self.dict.iterators += 1;
                    }
                    let mut idx = self.index.map_or(0, |i| i + 1);
                    if idx >= self.dict.ht[self.table].size() {
                        if self.dict.is_rehashing() && self.table == 0 {
                            self.table = 1;
                            idx = 0;
                        } else {
                            self.index = Some(idx.min(self.dict.ht[self.table].size()));
                            return None;
                        }
                    }
                    self.index = Some(idx);
                    self.entry = self.dict.ht[self.table].buckets.get(idx).copied().flatten();
                }
                // Follow the live link while the current entry exists; the
                // captured successor only stands in once it is gone.
                Some(cur) => {
                    self.entry = match self.dict.entries.get(cur) {
                        Some(e) => e.next,
                        None => self.next_entry,
                    };
                }
            }
            if let Some(k) = self.entry {
                match self.dict.entries.get(k) {
                    Some(e) => {
                        self.next_entry = e.next;
                        return Some(EntryHandle::new(k));
                    }
                    // Both the current entry and its captured successor are
                    // gone; nothing links to the rest of the chain.
                    None => self.entry = None,
                }
            }
        }
    }
}

impl<'a, T: DictType> Drop for SafeIter<'a, T> {
    fn drop(&mut self) {
        if self.started() {
            debug_assert!(self.dict.iterators > 0);
            self.dict.iterators -= 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::dict_type::{BytesType, DictType, Value};
    use crate::Dict;
    use std::collections::BTreeSet;

    type NumDict = Dict<BytesType<String, ()>>;

    fn filled(n: usize) -> NumDict {
        let mut d = NumDict::default();
        for i in 0..n {
            d.insert_value(i.to_string(), Value::Signed(i as i64)).unwrap();
        }
        d
    }

    /// Invariant: `iter` yields each live entry exactly once; `iter_mut`
    /// updates values as seen by subsequent lookups.
    #[test]
    fn iteration_and_mutation() {
        let mut d = filled(20);
        let seen: BTreeSet<String> = d.iter().map(|(_h, k, _v)| k.clone()).collect();
        assert_eq!(seen.len(), 20);

        for (_h, _k, v) in d.iter_mut() {
            if let Value::Signed(n) = v {
                *n += 100;
            }
        }
        let h = d.find(&"7".to_string()).unwrap();
        assert_eq!(h.value(&d), Some(&Value::Signed(107)));
    }

    /// Invariant: a never-advanced safe iterator leaves the counter alone.
    #[test]
    fn unstarted_safe_iter_does_not_count() {
        let mut d = filled(3);
        let it = d.safe_iter();
        assert_eq!(it.dict().live_iterators(), 0);
        it.release();
        assert_eq!(d.live_iterators(), 0);
    }

    #[test]
    fn safe_iter_counts_while_alive() {
        let mut d = filled(3);
        {
            let mut it = d.safe_iter();
            assert!(it.next().is_some());
            assert_eq!(it.dict().live_iterators(), 1);
        }
        assert_eq!(d.live_iterators(), 0);
    }

    /// Invariant: draining an iterator over an empty dictionary still
    /// counts as started and is balanced on drop.
    #[test]
    fn safe_iter_on_empty_dict() {
        let mut d = NumDict::default();
        let mut it = d.safe_iter();
        assert_eq!(it.next(), None);
        assert_eq!(it.next(), None);
        drop(it);
        assert_eq!(d.live_iterators(), 0);
    }

    /// Descriptor that puts every key in one bucket.
    #[derive(Default)]
    struct Colliding;

    impl DictType for Colliding {
        type Key = String;
        type Value = ();

        fn hash(&self, _key: &String) -> u64 {
            0
        }

        fn key_eq(&self, a: &String, b: &String) -> bool {
            a == b
        }
    }

    /// Invariant: deleting the successor of the returned entry does not hide
    /// the entries behind it in the chain.
    #[test]
    fn deleting_successor_keeps_rest_of_chain() {
        let mut d = Dict::new(Colliding);
        for k in ["a", "b", "c"] {
            d.insert_value(k.to_string(), Value::Unsigned(0)).unwrap();
        }
        // Prepending leaves the chain as c -> b -> a.
        let mut seen = Vec::new();
        let mut it = d.safe_iter();
        while let Some(h) = it.next() {
            let k = h.key(it.dict()).cloned().unwrap();
            if k == "c" {
                assert!(it.dict_mut().delete(&"b".to_string()));
            }
            seen.push(k);
        }
        drop(it);
        assert_eq!(seen, vec!["c".to_string(), "a".to_string()]);
        assert_eq!(d.len(), 2);
    }

    /// Invariant: removing the returned entry mid-chain resumes at its
    /// captured successor.
    #[test]
    fn deleting_current_then_walking_on() {
        let mut d = Dict::new(Colliding);
        for k in ["a", "b", "c", "d"] {
            d.insert_value(k.to_string(), Value::Unsigned(0)).unwrap();
        }
        // Chain: d -> c -> b -> a.
        let mut seen = Vec::new();
        let mut it = d.safe_iter();
        while let Some(h) = it.next() {
            let k = h.key(it.dict()).cloned().unwrap();
            if k == "c" {
                assert!(it.remove_current().is_some());
            }
            seen.push(k);
        }
        drop(it);
        assert_eq!(seen, vec!["d", "c", "b", "a"]);
        assert_eq!(d.len(), 3);
    }

    /// Invariant: removing the entry just returned does not break the walk.
    #[test]
    fn remove_current_keeps_walking() {
        let mut d = filled(50);
        let mut it = d.safe_iter();
        let mut visited = 0;
        while it.next().is_some() {
            visited += 1;
            assert!(it.remove_current().is_some());
        }
        drop(it);
        assert_eq!(visited, 50);
        assert!(d.is_empty());
    }
}
