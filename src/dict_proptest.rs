#![cfg(test)]

// Property tests for Dict kept inside the crate so they can check table
// internals (per-table counts, chain lengths, rehash cursor bounds).

use crate::dict::{Dict, DictConfig, EntryHandle};
use crate::dict_type::{BytesType, DictType, Value};
use crate::error::InsertError;
use proptest::prelude::*;
use proptest::test_runner::TestCaseError;
use std::collections::{BTreeSet, HashMap};

// Pool-indexed operations to improve shrinking: indices shrink to earlier keys,
// pool length shrinks, and op lists shrink in length.
#[derive(Clone, Debug)]
enum OpI {
    Insert(usize, i64),
    Replace(usize, i64),
    Delete(usize),
    Unlink(usize),
    Find(usize),
    Mutate(usize, i64),
    Expand(usize),
    Rehash(usize),
    ToggleResize,
    Iterate,
    SafeWalk { delete_every: bool },
    Clear,
}

fn arb_scenario() -> impl Strategy<Value = (Vec<String>, Vec<OpI>)> {
    proptest::collection::vec("[a-z]{0,5}", 1..=24).prop_flat_map(|pool| {
        let idxs: Vec<usize> = (0..pool.len()).collect();
        let idx = proptest::sample::select(idxs);
        let op = prop_oneof![
            6 => (idx.clone(), any::<i64>()).prop_map(|(i, v)| OpI::Insert(i, v)),
            2 => (idx.clone(), any::<i64>()).prop_map(|(i, v)| OpI::Replace(i, v)),
            3 => idx.clone().prop_map(OpI::Delete),
            1 => idx.clone().prop_map(OpI::Unlink),
            3 => idx.clone().prop_map(OpI::Find),
            1 => (idx.clone(), any::<i64>()).prop_map(|(i, d)| OpI::Mutate(i, d)),
            1 => (0usize..200).prop_map(OpI::Expand),
            2 => (0usize..4).prop_map(OpI::Rehash),
            1 => Just(OpI::ToggleResize),
            1 => Just(OpI::Iterate),
            1 => any::<bool>().prop_map(|delete_every| OpI::SafeWalk { delete_every }),
            1 => Just(OpI::Clear),
        ];
        proptest::collection::vec(op, 1..120).prop_map(move |ops| (pool.clone(), ops))
    })
}

/// Structural invariants: each table's `used` matches what its chains hold,
/// every entry sits in the bucket its hash selects, and the arena holds
/// exactly the reachable entries.
fn check_structure<T: DictType>(d: &Dict<T>) -> Result<(), TestCaseError> {
    let mut reachable = 0;
    for t in &d.ht {
        let mut count = 0;
        for (idx, &head) in t.buckets.iter().enumerate() {
            let mut cur = head;
            while let Some(k) = cur {
                let e = &d.entries[k];
                prop_assert_eq!(t.bucket_of(d.ty.hash(&e.key)), idx);
                count += 1;
                cur = e.next;
            }
        }
        prop_assert_eq!(count, t.used);
        reachable += count;
    }
    prop_assert_eq!(reachable, d.entries.len());
    match d.rehash_idx {
        Some(idx) => {
            prop_assert!(d.ht[1].is_allocated());
            prop_assert!(idx < d.ht[0].size());
            for b in &d.ht[0].buckets[..idx] {
                prop_assert!(b.is_none(), "migrated bucket still populated");
            }
        }
        None => prop_assert!(!d.ht[1].is_allocated()),
    }
    Ok(())
}

// State-machine equivalence against std::collections::HashMap.
fn run_state_machine<T>(mut sut: Dict<T>, pool: Vec<String>, ops: Vec<OpI>) -> Result<(), TestCaseError>
where
    T: DictType<Key = String, Value = i64>,
{
    let mut model: HashMap<String, i64> = HashMap::new();
    let mut live: HashMap<String, EntryHandle> = HashMap::new();
    let mut stale: Vec<EntryHandle> = Vec::new();

    for op in ops {
        match op {
            OpI::Insert(i, v) => {
                let k = pool[i].clone();
                let already = model.contains_key(&k);
                match sut.insert(k.clone(), v) {
                    Ok(h) => {
                        prop_assert!(!already, "insert must fail on duplicate");
                        let prev = live.insert(k.clone(), h);
                        prop_assert!(prev.is_none());
                        model.insert(k, v);
                    }
                    Err(InsertError::DuplicateKey(h)) => {
                        prop_assert!(already, "duplicate error only when key exists");
                        prop_assert_eq!(Some(&h), live.get(&k));
                        prop_assert_eq!(h.value(&sut), Some(&Value::Handle(model[&k])));
                    }
                    Err(InsertError::Alloc(e)) => prop_assert!(false, "unexpected {e}"),
                }
            }
            OpI::Replace(i, v) => {
                let k = pool[i].clone();
                let added = sut.replace(k.clone(), v).expect("small tables allocate");
                prop_assert_eq!(added, model.insert(k.clone(), v).is_none());
                if added {
                    let h = sut.find(&k).expect("just added");
                    live.insert(k, h);
                }
            }
            OpI::Delete(i) => {
                let k = &pool[i];
                let removed = sut.delete(k);
                prop_assert_eq!(removed, model.remove(k).is_some());
                if let Some(h) = live.remove(k) {
                    stale.push(h);
                }
            }
            OpI::Unlink(i) => {
                let k = &pool[i];
                let got = sut.unlink(k);
                let expected = model.remove(k).map(|v| (k.clone(), Value::Handle(v)));
                prop_assert_eq!(got, expected);
                if let Some(h) = live.remove(k) {
                    stale.push(h);
                }
            }
            OpI::Find(i) => {
                let k = &pool[i];
                let s = sut.find(k);
                prop_assert_eq!(s.is_some(), model.contains_key(k));
                if let Some(h) = s {
                    // Handles stay stable across rehashing.
                    prop_assert_eq!(Some(&h), live.get(k));
                    prop_assert_eq!(h.value(&sut), Some(&Value::Handle(model[k])));
                }
            }
            OpI::Mutate(i, d) => {
                let k = &pool[i];
                if let Some(&h) = live.get(k) {
                    match h.value_mut(&mut sut).and_then(Value::as_handle_mut) {
                        Some(vr) => {
                            *vr = vr.saturating_add(d);
                            if let Some(mv) = model.get_mut(k) {
                                *mv = mv.saturating_add(d);
                            }
                        }
                        None => prop_assert!(false, "live handle should resolve"),
                    }
                }
            }
            OpI::Expand(n) => {
                let was_rehashing = sut.is_rehashing();
                let used = sut.len();
                if sut.expand(n).is_ok() {
                    prop_assert!(!was_rehashing && n >= used);
                }
            }
            OpI::Rehash(n) => {
                let still = sut.rehash(n);
                prop_assert_eq!(still, sut.is_rehashing());
            }
            OpI::ToggleResize => {
                if sut.config().resize_enabled {
                    sut.disable_resize();
                } else {
                    sut.enable_resize();
                }
            }
            OpI::Iterate => {
                let s_keys: BTreeSet<_> = sut.iter().map(|(_, k, _)| k.clone()).collect();
                let m_keys: BTreeSet<_> = model.keys().cloned().collect();
                prop_assert_eq!(s_keys, m_keys);
            }
            OpI::SafeWalk { delete_every } => {
                let cursor = sut.rehash_index();
                let mut seen = Vec::new();
                let mut it = sut.safe_iter();
                while let Some(h) = it.next() {
                    let k = h.key(it.dict()).cloned().expect("returned entry is live");
                    // Lookups do not advance a frozen rehash.
                    let _ = it.dict_mut().find(&k);
                    prop_assert_eq!(it.dict().rehash_index(), cursor);
                    if delete_every {
                        prop_assert!(it.dict_mut().delete(&k));
                    }
                    seen.push(k);
                }
                drop(it);
                prop_assert_eq!(sut.live_iterators(), 0);
                prop_assert_eq!(seen.len(), model.len());
                let unique: BTreeSet<_> = seen.into_iter().collect();
                let m_keys: BTreeSet<_> = model.keys().cloned().collect();
                prop_assert_eq!(unique, m_keys);
                if delete_every {
                    model.clear();
                    stale.extend(live.drain().map(|(_, h)| h));
                }
            }
            OpI::Clear => {
                sut.clear();
                model.clear();
                stale.extend(live.drain().map(|(_, h)| h));
            }
        }

        // Post-conditions after each op
        for &h in &stale {
            prop_assert!(h.value(&sut).is_none());
        }
        prop_assert_eq!(sut.len(), model.len());
        prop_assert_eq!(sut.is_empty(), model.is_empty());
        check_structure(&sut)?;
    }
    Ok(())
}

// Worst-case collisions: every key in one chain.
#[derive(Default)]
struct Colliding;

impl DictType for Colliding {
    type Key = String;
    type Value = i64;

    fn hash(&self, _key: &String) -> u64 {
        0
    }

    fn key_eq(&self, a: &String, b: &String) -> bool {
        a == b
    }
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine((pool, ops) in arb_scenario()) {
        run_state_machine(Dict::new(BytesType::<String, i64>::new()), pool, ops)?;
    }

    #[test]
    fn prop_state_machine_with_collisions((pool, ops) in arb_scenario()) {
        run_state_machine(Dict::new(Colliding), pool, ops)?;
    }

    #[test]
    fn prop_state_machine_tiny_force_ratio((pool, ops) in arb_scenario()) {
        let config = DictConfig { resize_enabled: false, force_resize_ratio: 1, initial_size: 4 };
        run_state_machine(Dict::with_config(BytesType::<String, i64>::new(), config), pool, ops)?;
    }
}

// Property: from any populated table, single-bucket steps finish the rehash
// within as many steps as the old table has buckets, and every key survives.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_rehash_terminates(n in 1usize..300, target in 1usize..2048) {
        let mut d = Dict::new(BytesType::<String, i64>::new());
        for i in 0..n {
            d.insert(format!("k{i}"), i as i64).unwrap();
        }
        while d.rehash(1) {}
        if d.expand(target).is_ok() && d.is_rehashing() {
            let bound = d.table_sizes().0;
            let mut steps = 0;
            while d.rehash(1) {
                steps += 1;
                prop_assert!(steps <= bound);
            }
        }
        prop_assert!(!d.is_rehashing());
        for i in 0..n {
            let k = format!("k{i}");
            prop_assert!(d.find(&k).is_some());
        }
        check_structure(&d)?;
    }
}
