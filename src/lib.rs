//! strtab: a single-threaded, string-keyed hash table whose values may be
//! reference-counted host resources, built to stay consistent when an
//! operation is abandoned part-way (a host interrupt, or a panic unwinding
//! out of a resource's release hook).
//!
//! Internal Design:
//!
//! Summary
//! - Goal: a chained hash table that a host runtime can embed and that
//!   never exposes a half-updated state, with precise ownership handoff
//!   for the values it stores.
//! - Layers:
//!   - `hashing`: the key hash (`h = h + (h << 3) + byte`, 32-bit
//!     wrapping) and the hash-then-bytes match rule.
//!   - `shared`: the host's reference-counting capability (`Shared`), the
//!     caller-facing `Value` and the in-table linear slot that must be
//!     released or transferred, never silently dropped.
//!   - `table`: bucket array, chains, growth and migration, and the public
//!     operations; `iter` and `stats` sit on top of it.
//!
//! Constraints
//! - Single-threaded: `!Send`/`!Sync` (no atomics, no locks). A
//!   multi-threaded host must wrap the whole table in one lock.
//! - Bucket counts are powers of two; growth doubles when
//!   `(len + 1) * 2 > buckets`.
//! - Entries live in a generational arena (`slotmap`); chain links are
//!   arena keys, so relinking never allocates or copies keys and values.
//!
//! Interruption policy
//! - User code (`Shared::acquire`, `Shared::release`) only runs while the
//!   table is consistent. Link surgery, bucket array installation and slot
//!   commits happen in short critical stretches that call no user code; a
//!   debug-only guard asserts they are never re-entered.
//! - Replacing a value: acquire the new reference, vacate the slot (it
//!   then holds a plain scalar), release the old reference, commit the new
//!   value.
//! - Removing: unlink and account for the entry first, release after.
//! - Growing: install the doubled array (first half copied from the old
//!   one) and the new target size, then migrate entries as a separate,
//!   restartable pass. An entry's new index modulo the old size is its old
//!   index, so every entry stays reachable throughout.
//!
//! Notes and non-goals
//! - Enumeration order (`iter`, `keys`, `first_key`/`next_key`) follows
//!   bucket placement. It is unspecified and changes with growth.
//! - Keys are non-empty strings without NUL bytes; no other key types.
//! - Average-case O(1) only; no defence against adversarial keys.

mod config;
mod critical;
mod error;
mod evaluator;
mod hashing;
mod iter;
mod shared;
mod stats;
mod table;
mod table_proptest;

// Public surface
pub use config::{Config, DEFAULT_MIN_BUCKETS};
pub use error::{Result, TableError};
pub use evaluator::Evaluator;
pub use hashing::KeyHash;
pub use iter::Iter;
pub use shared::{Bits, Shared, Value};
pub use stats::BucketStats;
pub use table::{EntryRef, Insertion, Table};
