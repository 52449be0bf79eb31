//! rehash-dict: a chained hash dictionary that resizes incrementally, so
//! no single operation pays for migrating the whole table.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: bound the latency of every insert, delete and lookup while the
//!   table grows or shrinks, and allow walking the table while entries are
//!   being removed.
//! - Layers:
//!   - `siphash`: seeded SipHash-1-2 over byte spans, the default hash of
//!     the stock descriptors.
//!   - `DictType`: per-dictionary bundle of hash/compare/duplicate/destroy
//!     operations. The engine never looks at keys or values otherwise.
//!   - `Dict<T>`: two generation tables (`ht[0]` live, `ht[1]` rehash
//!     target) whose bucket chains are threaded through one slotmap arena
//!     of entries.
//!   - `SafeIter`: bucket-order cursor that freezes rehashing while alive.
//!   - `rehash_for`: time-boxed driver over the single-step rehash.
//!
//! Constraints
//! - Single-threaded: no locking. `&mut self` on every operation that may
//!   advance the rehash, including lookups.
//! - Unique keys; `insert` never overwrites and reports the existing entry.
//! - Entries are addressed by generational `EntryHandle`s, so a handle to a
//!   removed entry resolves to `None` rather than aliasing a new one.
//!
//! Rehashing
//! - `expand` installs `ht[1]` and sets the cursor to bucket 0. From then
//!   on every mutating call and every lookup migrates one non-empty bucket
//!   of `ht[0]` into `ht[1]`, and inserts go straight to `ht[1]`. When
//!   `ht[0]` is empty the tables swap and the cursor is cleared.
//! - A started `SafeIter` increments a live-iterator counter; while it is
//!   non-zero no rehash step runs, so the bucket layout the iterator walks
//!   stays put.
//! - Growth policy lives in `DictConfig`: grow at load factor 1, or, with
//!   resizing disabled, only once the load factor exceeds
//!   `force_resize_ratio`.
//!
//! Ownership
//! - Keys and values go through `DictType::dup_*` when stored and
//!   `DictType::destroy_*` when the dictionary frees them (delete, replace,
//!   clear, drop). `unlink`/`remove` hand the pair back undestroyed.
//! - Values are `Value<V>`: a handle that follows the descriptor's
//!   ownership rules, or an inline signed/unsigned/float number.
//!
//! Failure
//! - Only bucket-array allocation can fail (`AllocError`); the dictionary
//!   is left as it was before the call. Duplicate keys and rejected resizes
//!   are distinct, non-fatal errors.

pub mod dict;
mod dict_proptest;
pub mod dict_type;
pub mod error;
pub mod iter;
mod pacer;
mod scan;
pub mod siphash;
pub mod stats;
mod table;

// Public surface
pub use dict::{Dict, DictConfig, EntryHandle};
pub use dict_type::{BytesType, DictType, NoCaseBytesType, Value};
pub use error::{AllocError, ExpandError, InsertError};
pub use iter::{Iter, IterMut, SafeIter};
pub use siphash::{siphash, siphash_nocase, HashSeed};
pub use stats::{Stats, TableStats};
