// Dict integration suite.
//
// Each test documents what behavior is being verified and which
// invariants are assumed or asserted. The core invariants exercised:
// - Round-trip: a key inserted is findable with its value until deleted.
// - Size: len() == successful inserts - successful deletes.
// - Rehash completion: stepping or pacing ends the rehash, keys survive.
// - Freeze: a live SafeIter stops the rehash cursor from moving.
// - Ownership: dup/destroy hooks run exactly where the descriptor says.
use rehash_dict::{
    siphash, BytesType, Dict, DictType, HashSeed, InsertError, NoCaseBytesType, Value,
};
use std::cell::Cell;
use std::collections::BTreeSet;
use std::rc::Rc;
use std::time::Duration;

type NumDict = Dict<BytesType<String, ()>>;

fn key(s: &str) -> String {
    s.to_string()
}

// Test: the reference scenario.
// Assumes: default config (4-bucket floor, resizing enabled).
// Verifies: size, lookups after a paced rehash, delete.
#[test]
fn ten_keys_rehash_lookup_delete() {
    let mut d = NumDict::default();
    for j in 0..10i64 {
        d.insert_value(j.to_string(), Value::Signed(j))
            .expect("insert ok");
    }
    assert_eq!(d.len(), 10);

    while d.is_rehashing() {
        d.rehash_milliseconds(100);
    }

    for j in 0..10i64 {
        let k = j.to_string();
        let h = d.find(&k).expect("present");
        assert_eq!(h.key(&d), Some(&k));
        assert_eq!(h.value(&d).and_then(Value::as_signed), Some(j));
    }
    let h = d.find(&key("7")).expect("7 present");
    assert_eq!(h.value(&d), Some(&Value::Signed(7)));
    assert!(d.find(&key("99")).is_none());

    assert!(d.delete(&key("3")));
    assert_eq!(d.len(), 9);
    assert!(d.find(&key("3")).is_none());
}

// Test: duplicate policy.
// Assumes: insert never overwrites.
// Verifies: DuplicateKey carries the existing entry; len unchanged.
#[test]
fn duplicate_insert_is_distinguishable() {
    let mut d: Dict<BytesType<String, String>> = Dict::default();
    let h = d.insert(key("k"), key("v1")).unwrap();
    match d.insert(key("k"), key("v2")) {
        Err(InsertError::DuplicateKey(existing)) => {
            assert_eq!(existing, h);
            // Overwrite-on-conflict through the reported entry.
            existing.set(&mut d, Value::Handle(key("v2")));
        }
        other => panic!("expected duplicate, got {:?}", other),
    }
    assert_eq!(d.len(), 1);
    assert_eq!(
        d.fetch_value(&key("k")).and_then(Value::as_handle),
        Some(&key("v2"))
    );
}

// Test: iterator completeness under freeze.
// Assumes: a rehash is running when the iterator is acquired.
// Verifies: every entry exactly once; cursor unmoved by lookups/deletes.
#[test]
fn safe_iter_mid_rehash_visits_each_entry_once() {
    let mut d = NumDict::default();
    for j in 0..200i64 {
        d.insert_value(j.to_string(), Value::Signed(j)).unwrap();
    }
    while d.rehash(1) {}
    d.expand(4096).unwrap();
    d.rehash(3);
    assert!(d.is_rehashing());
    let cursor = d.rehash_index();

    let mut seen = Vec::new();
    let mut it = d.safe_iter();
    while let Some(h) = it.next() {
        let k = h.key(it.dict()).cloned().unwrap();
        assert!(it.dict_mut().find(&k).is_some());
        assert_eq!(it.dict().rehash_index(), cursor);
        seen.push(k);
    }
    assert_eq!(it.dict().live_iterators(), 1);
    it.release();
    assert_eq!(d.live_iterators(), 0);

    assert_eq!(seen.len(), 200);
    let unique: BTreeSet<_> = seen.into_iter().collect();
    assert_eq!(unique.len(), 200);

    // Unfrozen again: the next lookup moves the cursor.
    let _ = d.find(&key("0"));
    assert_ne!(d.rehash_index(), cursor);
}

// Test: deleting the current entry during a safe walk.
// Assumes: only the just-returned entry is removed.
// Verifies: walk completes; removed keys gone; the rest intact.
#[test]
fn safe_iter_tolerates_deleting_current() {
    let mut d = NumDict::default();
    for j in 0..100i64 {
        d.insert_value(j.to_string(), Value::Signed(j)).unwrap();
    }
    let mut visited = 0;
    let mut it = d.safe_iter();
    while let Some(h) = it.next() {
        visited += 1;
        let v = h.value(it.dict()).and_then(Value::as_signed).unwrap();
        if v % 2 == 0 {
            let k = h.key(it.dict()).cloned().unwrap();
            assert!(it.dict_mut().delete(&k));
        }
    }
    drop(it);
    assert_eq!(visited, 100);
    assert_eq!(d.len(), 50);
    for j in 0..100i64 {
        assert_eq!(d.contains_key(&j.to_string()), j % 2 == 1);
    }
}

// Test: iterator suppresses piggy-backed rehash steps.
// Assumes: inserts/deletes/finds normally advance the cursor.
// Verifies: with a started SafeIter, none of them do.
#[test]
fn live_iterator_freezes_rehash_progress() {
    let mut d = NumDict::default();
    for j in 0..64i64 {
        d.insert_value(j.to_string(), Value::Signed(j)).unwrap();
    }
    while d.rehash(1) {}
    d.expand(1024).unwrap();
    let cursor = d.rehash_index();

    let mut it = d.safe_iter();
    it.next();
    let dict = it.dict_mut();
    for j in 64..80i64 {
        dict.insert_value(j.to_string(), Value::Signed(j)).unwrap();
    }
    for j in 0..10i64 {
        assert!(dict.delete(&j.to_string()));
        let _ = dict.find(&(j + 20).to_string());
    }
    assert!(dict.rehash(50));
    assert_eq!(dict.rehash_index(), cursor);
    drop(it);

    while d.rehash(1) {}
    assert_eq!(d.len(), 70);
}

// Test: growth keeps going past several doublings.
// Verifies: every key findable at every point; final table fits the load.
#[test]
fn grows_through_many_doublings() {
    let mut d = NumDict::default();
    for j in 0..5000i64 {
        d.insert_value(j.to_string(), Value::Signed(j)).unwrap();
        if j % 997 == 0 {
            for probe in 0..=j {
                assert!(d.contains_key(&probe.to_string()));
            }
        }
    }
    d.rehash_for(Duration::from_secs(5));
    assert!(!d.is_rehashing());
    let (size, target) = d.table_sizes();
    assert_eq!(target, 0);
    assert!(size >= 4096);
}

struct Owning {
    dups: Rc<Cell<usize>>,
    destroyed_keys: Rc<Cell<usize>>,
    destroyed_values: Rc<Cell<usize>>,
}

impl DictType for Owning {
    type Key = Rc<String>;
    type Value = Rc<String>;

    fn hash(&self, key: &Rc<String>) -> u64 {
        siphash(key.as_bytes(), &HashSeed::DEFAULT)
    }

    fn key_eq(&self, a: &Rc<String>, b: &Rc<String>) -> bool {
        a == b
    }

    fn dup_key(&self, key: Rc<String>) -> Rc<String> {
        self.dups.set(self.dups.get() + 1);
        Rc::new(String::clone(&key))
    }

    fn destroy_key(&self, _key: Rc<String>) {
        self.destroyed_keys.set(self.destroyed_keys.get() + 1);
    }

    fn destroy_value(&self, _value: Rc<String>) {
        self.destroyed_values.set(self.destroyed_values.get() + 1);
    }
}

// Test: ownership contract.
// Assumes: dup_key copies, no value duplicator.
// Verifies: stored key is independent of the caller's handle, value is the
// caller's handle verbatim; destructors run on delete/replace/drop only.
#[test]
fn descriptor_controls_ownership() {
    let dups = Rc::new(Cell::new(0));
    let keys = Rc::new(Cell::new(0));
    let vals = Rc::new(Cell::new(0));
    let mut d = Dict::new(Owning {
        dups: dups.clone(),
        destroyed_keys: keys.clone(),
        destroyed_values: vals.clone(),
    });

    let k = Rc::new(key("a"));
    let v = Rc::new(key("va"));
    let h = d.insert(k.clone(), v.clone()).unwrap();
    assert_eq!(dups.get(), 1);
    assert_eq!(Rc::strong_count(&k), 1, "stored key must be a copy");
    assert!(!Rc::ptr_eq(h.key(&d).unwrap(), &k));
    assert!(Rc::ptr_eq(h.value(&d).and_then(Value::as_handle).unwrap(), &v));

    assert_eq!(d.replace(k.clone(), Rc::new(key("vb"))), Ok(false));
    assert_eq!(vals.get(), 1);
    assert_eq!(keys.get(), 0);

    let (uk, _uv) = d.unlink(&k).unwrap();
    assert_eq!(*uk, "a");
    assert_eq!(keys.get(), 0);

    d.insert(Rc::new(key("x")), Rc::new(key("vx"))).unwrap();
    d.insert_value(Rc::new(key("n")), Value::Signed(1)).unwrap();
    assert!(d.delete(&Rc::new(key("x"))));
    assert_eq!((keys.get(), vals.get()), (1, 2));

    drop(d);
    // "n" had a numeric value: key destroyed, no value destructor.
    assert_eq!((keys.get(), vals.get()), (2, 2));
}

// Test: case-insensitive descriptor.
#[test]
fn nocase_keys_collapse() {
    let mut d: Dict<NoCaseBytesType<String, i32>> = Dict::default();
    d.insert(key("Hello"), 1).unwrap();
    assert!(matches!(
        d.insert(key("HELLO"), 2),
        Err(InsertError::DuplicateKey(_))
    ));
    assert!(d.contains_key(&key("hello")));
    assert!(d.delete(&key("hELLo")));
    assert!(d.is_empty());
}

// Test: bulk-load suppression.
// Verifies: no growth while disabled below the force ratio; growth resumes
// on re-enable.
#[test]
fn disabled_resize_defers_growth_until_enabled() {
    let mut d = NumDict::default();
    d.disable_resize();
    for j in 0..16i64 {
        d.insert_value(j.to_string(), Value::Signed(j)).unwrap();
    }
    assert_eq!(d.table_sizes(), (4, 0));
    d.enable_resize();
    d.insert_value(key("16"), Value::Signed(16)).unwrap();
    assert!(d.is_rehashing());
    assert_eq!(d.table_sizes(), (4, 32));
}
