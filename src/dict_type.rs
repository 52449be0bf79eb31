//! Type descriptors: the per-dictionary bundle of key/value operations.

use crate::siphash::{siphash, siphash_nocase, HashSeed};
use core::fmt;
use core::marker::PhantomData;

/// Value slot of an entry. Numeric payloads are stored inline; only
/// `Handle` values go through the descriptor's duplicate/destroy hooks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value<V> {
    Handle(V),
    Signed(i64),
    Unsigned(u64),
    Double(f64),
}

impl<V> Value<V> {
    pub fn as_handle(&self) -> Option<&V> {
        match self {
            Value::Handle(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_handle_mut(&mut self) -> Option<&mut V> {
        match self {
            Value::Handle(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_signed(&self) -> Option<i64> {
        match *self {
            Value::Signed(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_unsigned(&self) -> Option<u64> {
        match *self {
            Value::Unsigned(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_double(&self) -> Option<f64> {
        match *self {
            Value::Double(n) => Some(n),
            _ => None,
        }
    }
}

/// Operations a [`Dict`](crate::Dict) uses on its keys and values.
///
/// `hash` and `key_eq` must agree: equal keys hash equally. The dictionary
/// calls `dup_*` on everything it stores and `destroy_*` on everything it
/// frees itself (delete, replace, clear, drop). Defaults store the caller's
/// value verbatim and simply drop on destroy.
pub trait DictType {
    type Key;
    type Value;

    fn hash(&self, key: &Self::Key) -> u64;

    fn key_eq(&self, a: &Self::Key, b: &Self::Key) -> bool;

    fn dup_key(&self, key: Self::Key) -> Self::Key {
        key
    }

    fn dup_value(&self, value: Self::Value) -> Self::Value {
        value
    }

    fn destroy_key(&self, key: Self::Key) {
        drop(key);
    }

    fn destroy_value(&self, value: Self::Value) {
        drop(value);
    }
}

/// Byte-string keys compared exactly and hashed with [`siphash`].
pub struct BytesType<K, V> {
    seed: HashSeed,
    _pd: PhantomData<fn(K, V)>,
}

impl<K, V> BytesType<K, V> {
    pub fn new() -> Self {
        Self::with_seed(HashSeed::DEFAULT)
    }

    pub fn with_seed(seed: HashSeed) -> Self {
        BytesType {
            seed,
            _pd: PhantomData,
        }
    }

    pub fn seed(&self) -> &HashSeed {
        &self.seed
    }
}

impl<K, V> Default for BytesType<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> fmt::Debug for BytesType<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BytesType").field("seed", &self.seed).finish()
    }
}

impl<K: AsRef<[u8]>, V> DictType for BytesType<K, V> {
    type Key = K;
    type Value = V;

    fn hash(&self, key: &K) -> u64 {
        siphash(key.as_ref(), &self.seed)
    }

    fn key_eq(&self, a: &K, b: &K) -> bool {
        a.as_ref() == b.as_ref()
    }
}

/// Byte-string keys compared ignoring ASCII case.
pub struct NoCaseBytesType<K, V> {
    seed: HashSeed,
    _pd: PhantomData<fn(K, V)>,
}

impl<K, V> NoCaseBytesType<K, V> {
    pub fn new() -> Self {
        Self::with_seed(HashSeed::DEFAULT)
    }

    pub fn with_seed(seed: HashSeed) -> Self {
        NoCaseBytesType {
            seed,
            _pd: PhantomData,
        }
    }

    pub fn seed(&self) -> &HashSeed {
        &self.seed
    }
}

impl<K, V> Default for NoCaseBytesType<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> fmt::Debug for NoCaseBytesType<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NoCaseBytesType")
            .field("seed", &self.seed)
            .finish()
    }
}

impl<K: AsRef<[u8]>, V> DictType for NoCaseBytesType<K, V> {
    type Key = K;
    type Value = V;

    fn hash(&self, key: &K) -> u64 {
        siphash_nocase(key.as_ref(), &self.seed)
    }

    fn key_eq(&self, a: &K, b: &K) -> bool {
        a.as_ref().eq_ignore_ascii_case(b.as_ref())
    }
}
