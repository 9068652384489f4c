//! Table: string-keyed chained hash table with interruption-safe growth.
//!
//! Entries live in a generational arena; each bucket slot holds the arena
//! key of its chain head and each entry links to the next one. Growth
//! installs a doubled bucket array whose first half copies the old one,
//! then migrates entries in a separate pass (`rehash`). Until that pass
//! completes every entry is still reachable, either from its old slot `i`
//! or from its new slot `j`, with `j % old_size == i`.

use crate::config::Config;
use crate::critical::CriticalSection;
use crate::error::{Result, TableError};
use crate::evaluator::Evaluator;
use crate::hashing::KeyHash;
use crate::iter::Iter;
use crate::shared::{Shared, Stored, Value};
use core::fmt;
use slotmap::{new_key_type, SlotMap};
use tracing::{debug, trace};

new_key_type! {
    /// Arena key of an entry.
    pub(crate) struct EntryKey;
}

pub(crate) struct Entry<R: Shared> {
    pub(crate) key: Box<str>,
    pub(crate) hash: u32,
    pub(crate) value: Stored<R>,
    pub(crate) next: Option<EntryKey>,
}

/// Outcome of a successful [`Table::insert`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Insertion {
    Created,
    Replaced,
}

/// Borrowed view of a stored entry.
pub struct EntryRef<'a, R: Shared> {
    entry: &'a Entry<R>,
}

impl<'a, R: Shared> EntryRef<'a, R> {
    pub fn key(&self) -> &'a str {
        &self.entry.key
    }

    pub fn value(&self) -> &'a Value<R> {
        self.entry.value.get()
    }

    pub fn hash(&self) -> u32 {
        self.entry.hash
    }
}

impl<R: Shared + fmt::Debug> fmt::Debug for EntryRef<'_, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntryRef")
            .field("key", &self.key())
            .field("value", self.value())
            .finish()
    }
}

/// String-keyed hash table holding scalars or counted resources.
pub struct Table<R: Shared> {
    /// Size used for `hash % size` addressing.
    pub(crate) current: usize,
    /// Size being migrated toward; equals `current` unless a rehash is pending.
    pub(crate) target: usize,
    pub(crate) count: usize,
    /// Always `target` slots long.
    pub(crate) buckets: Vec<Option<EntryKey>>,
    pub(crate) entries: SlotMap<EntryKey, Entry<R>>,
    evaluator: Option<Evaluator>,
    critical: CriticalSection,
}

/// Walks one collision chain.
pub(crate) struct Chain<'a, R: Shared> {
    entries: &'a SlotMap<EntryKey, Entry<R>>,
    link: Option<EntryKey>,
}

impl<'a, R: Shared> Iterator for Chain<'a, R> {
    type Item = &'a Entry<R>;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        let entry = self.entries.get(self.link?)?;
        self.link = entry.next;
        Some(entry)
    }
}

/// Hash of a lookup key, or `None` if no stored key could match it.
#[inline]
fn probe(key: &str) -> Option<KeyHash> {
    let kh = KeyHash::of(key);
    (kh.len != 0 && kh.len == key.len()).then_some(kh)
}

#[cfg(test)]
thread_local! {
    static FAIL_ALLOC: core::cell::Cell<Option<&'static str>> = const { core::cell::Cell::new(None) };
}

/// Make the next allocation of `what` on this thread fail.
#[cfg(test)]
pub(crate) fn fail_next_alloc(what: &'static str) {
    FAIL_ALLOC.with(|f| f.set(Some(what)));
}

#[cfg(test)]
fn fail_point(what: &'static str) -> Result<()> {
    FAIL_ALLOC.with(|f| match f.get() {
        Some(w) if w == what => {
            f.set(None);
            Err(TableError::Allocation { what })
        }
        _ => Ok(()),
    })
}

#[cfg(not(test))]
#[inline(always)]
fn fail_point(_what: &'static str) -> Result<()> {
    Ok(())
}

fn alloc_key(key: &str) -> Result<Box<str>> {
    fail_point("hash entry")?;
    let mut buf = String::new();
    buf.try_reserve_exact(key.len())
        .map_err(|_| TableError::Allocation { what: "hash entry" })?;
    buf.push_str(key);
    Ok(buf.into_boxed_str())
}

/// Bucket array of `size` empty slots, the first `keep.len()` copied from `keep`.
fn alloc_buckets(size: usize, keep: &[Option<EntryKey>]) -> Result<Vec<Option<EntryKey>>> {
    fail_point("bucket array")?;
    let mut buckets = Vec::new();
    buckets
        .try_reserve_exact(size)
        .map_err(|_| TableError::Allocation { what: "bucket array" })?;
    buckets.extend_from_slice(keep);
    buckets.resize(size, None);
    Ok(buckets)
}

impl<R: Shared> Table<R> {
    pub fn new() -> Self {
        Self::with_config(Config::new())
    }

    /// Table sized for `hint` entries without growing.
    ///
    /// # Panics
    ///
    /// Panics if the bucket array cannot be allocated, as
    /// `Vec::with_capacity` does. Use [`try_with_capacity`](Self::try_with_capacity)
    /// to get an error instead.
    pub fn with_capacity(hint: usize) -> Self {
        Self::with_config(Config::new().size_hint(hint))
    }

    /// # Panics
    ///
    /// Panics if the bucket array cannot be allocated; see
    /// [`try_with_config`](Self::try_with_config).
    pub fn with_config(config: Config) -> Self {
        let size = config.initial_buckets();
        Self::from_buckets(vec![None; size])
    }

    /// Like [`with_capacity`](Self::with_capacity), reporting an
    /// unsatisfiable size as [`TableError::Allocation`].
    pub fn try_with_capacity(hint: usize) -> Result<Self> {
        Self::try_with_config(Config::new().size_hint(hint))
    }

    /// Like [`with_config`](Self::with_config), reporting an unsatisfiable
    /// size as [`TableError::Allocation`].
    pub fn try_with_config(config: Config) -> Result<Self> {
        let buckets = alloc_buckets(config.initial_buckets(), &[])?;
        Ok(Self::from_buckets(buckets))
    }

    fn from_buckets(buckets: Vec<Option<EntryKey>>) -> Self {
        let size = buckets.len();
        Self {
            current: size,
            target: size,
            count: 0,
            buckets,
            entries: SlotMap::with_key(),
            evaluator: None,
            critical: CriticalSection::new(),
        }
    }

    /// Build a table from key/value pairs, taking ownership of each value.
    /// Later pairs replace earlier ones with the same key. On error every
    /// value not yet stored is released.
    pub fn from_pairs<'k, I>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'k str, Value<R>)>,
    {
        let pairs = pairs.into_iter();
        let mut table = match Self::try_with_capacity(pairs.size_hint().0) {
            Ok(t) => t,
            Err(e) => {
                pairs.for_each(|(_, v)| v.release());
                return Err(e);
            }
        };
        table.try_extend(pairs)?;
        Ok(table)
    }

    /// Insert every pair, taking ownership of each value. Stops at the
    /// first error; pairs already stored stay stored and the remaining
    /// values are released.
    pub fn try_extend<'k, I>(&mut self, pairs: I) -> Result<()>
    where
        I: IntoIterator<Item = (&'k str, Value<R>)>,
    {
        let mut pairs = pairs.into_iter();
        while let Some((key, value)) = pairs.next() {
            if let Err(e) = self.insert_owned(key, value) {
                pairs.for_each(|(_, v)| v.release());
                return Err(e);
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Number of buckets used for addressing.
    pub fn capacity(&self) -> usize {
        self.current
    }

    pub fn evaluator(&self) -> Option<&Evaluator> {
        self.evaluator.as_ref()
    }

    pub fn has_evaluator(&self) -> bool {
        self.evaluator.is_some()
    }

    /// Install (or clear, with `None`) the evaluator; returns the previous one.
    pub fn set_evaluator(&mut self, evaluator: Option<Evaluator>) -> Option<Evaluator> {
        core::mem::replace(&mut self.evaluator, evaluator)
    }

    #[inline]
    fn rehash_pending(&self) -> bool {
        self.target > self.current
    }

    pub(crate) fn chain(&self, bucket: usize) -> Chain<'_, R> {
        Chain {
            entries: &self.entries,
            link: self.buckets[bucket],
        }
    }

    /// Slots an entry with this hash can occupy. Two of them only while a
    /// migration is pending: the old slot and the new one.
    #[inline]
    fn candidates(&self, kh: &KeyHash) -> impl Iterator<Item = usize> {
        let old = kh.index(self.current);
        let new = kh.index(self.target);
        core::iter::once(old).chain((new != old).then_some(new))
    }

    fn lookup(&self, kh: &KeyHash, key: &str) -> Option<(usize, &Entry<R>)> {
        debug_assert!(!self.critical.is_active());
        self.candidates(kh).find_map(|bucket| {
            self.chain(bucket)
                .find(|e| kh.matches(key, e.hash, &e.key))
                .map(|e| (bucket, e))
        })
    }

    /// Arena key of the entry matching `key` in `bucket`.
    fn position(&self, bucket: usize, kh: &KeyHash, key: &str) -> Option<EntryKey> {
        let mut link = self.buckets[bucket];
        while let Some(k) = link {
            let e = self.entries.get(k)?;
            if kh.matches(key, e.hash, &e.key) {
                return Some(k);
            }
            link = e.next;
        }
        None
    }

    /// Entry stored under `key`. Empty keys are never found.
    pub fn find(&self, key: &str) -> Option<EntryRef<'_, R>> {
        let kh = probe(key)?;
        self.lookup(&kh, key).map(|(_, entry)| EntryRef { entry })
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.find(key).is_some()
    }

    /// Copy of the value stored under `key`, holding its own counted
    /// reference when it is a resource.
    pub fn get(&self, key: &str) -> Option<Value<R>> {
        self.find(key).map(|e| e.value().acquire())
    }

    fn check_key(key: &str) -> Result<KeyHash> {
        probe(key).ok_or(TableError::InvalidKey)
    }

    /// Store a copy of `value` under `key`, acquiring a reference for the
    /// table when it is a resource. An existing entry has its old value
    /// released.
    pub fn insert(&mut self, key: &str, value: &Value<R>) -> Result<Insertion> {
        let kh = Self::check_key(key)?;
        self.store(kh, key, value.acquire())
    }

    /// Like [`insert`](Self::insert) but takes over the caller's reference
    /// instead of acquiring one. On error the value is released.
    pub fn insert_owned(&mut self, key: &str, value: Value<R>) -> Result<Insertion> {
        match Self::check_key(key) {
            Ok(kh) => self.store(kh, key, value),
            Err(e) => {
                value.release();
                Err(e)
            }
        }
    }

    /// `fresh` is already acquired on the table's behalf.
    fn store(&mut self, kh: KeyHash, key: &str, fresh: Value<R>) -> Result<Insertion> {
        self.rehash();

        let bucket = kh.index(self.current);
        if let Some(k) = self.position(bucket, &kh, key) {
            let stale = {
                let _cs = self.critical.enter("vacate");
                self.entries[k].value.vacate()
            };
            // The slot holds a plain scalar while user code runs.
            stale.release();
            let _cs = self.critical.enter("commit");
            self.entries[k].value.commit(fresh);
            return Ok(Insertion::Replaced);
        }

        if (self.count + 1) * 2 > self.current {
            if let Err(e) = self.grow() {
                fresh.release();
                return Err(e);
            }
            self.rehash();
        }

        let owned_key = match alloc_key(key) {
            Ok(k) => k,
            Err(e) => {
                fresh.release();
                return Err(e);
            }
        };
        let bucket = kh.index(self.current);
        let _cs = self.critical.enter("link");
        let head = self.buckets[bucket];
        let k = self.entries.insert(Entry {
            key: owned_key,
            hash: kh.hash,
            value: Stored::new(fresh),
            next: head,
        });
        self.buckets[bucket] = Some(k);
        self.count += 1;
        Ok(Insertion::Created)
    }

    /// Install a doubled bucket array. Entries are not moved; every one of
    /// them stays reachable from the copied first half.
    fn grow(&mut self) -> Result<()> {
        debug_assert!(!self.rehash_pending());
        let old = self.current;
        let new = old
            .checked_mul(2)
            .ok_or(TableError::Allocation { what: "bucket array" })?;
        let grown = alloc_buckets(new, &self.buckets[..old])?;

        let stale = {
            let _cs = self.critical.enter("install");
            let stale = core::mem::replace(&mut self.buckets, grown);
            self.target = new;
            stale
        };
        drop(stale);
        debug!(
            old_size = old,
            new_size = new,
            entries = self.count,
            "grew bucket array"
        );
        Ok(())
    }

    /// Move the entries of old bucket `i` that belong elsewhere under the
    /// target size. Returns how many moved.
    fn migrate_bucket(&mut self, i: usize) -> usize {
        let new = self.target;
        let mut moved = 0;
        let mut prev: Option<EntryKey> = None;
        let mut link = self.buckets[i];
        while let Some(k) = link {
            let (hash, next) = {
                let e = &self.entries[k];
                (e.hash, e.next)
            };
            let j = (hash as usize) % new;
            if j != i {
                let _cs = self.critical.enter("migrate");
                match prev {
                    None => self.buckets[i] = next,
                    Some(p) => self.entries[p].next = next,
                }
                self.entries[k].next = self.buckets[j];
                self.buckets[j] = Some(k);
                moved += 1;
            } else {
                prev = Some(k);
            }
            link = next;
        }
        moved
    }

    /// Complete a pending migration and adopt the target size. Idempotent
    /// and restartable; no-op when nothing is pending.
    pub(crate) fn rehash(&mut self) {
        if !self.rehash_pending() {
            return;
        }
        let moved: usize = (0..self.current).map(|i| self.migrate_bucket(i)).sum();
        self.current = self.target;
        trace!(size = self.current, moved, "rehash complete");
    }

    /// Unlink the entry for `key` and hand back its slot. The table is
    /// consistent again before the caller touches the value.
    fn unlink(&mut self, key: &str) -> Option<Stored<R>> {
        let kh = probe(key)?;
        self.rehash();

        let bucket = kh.index(self.current);
        let mut prev: Option<EntryKey> = None;
        let mut link = self.buckets[bucket];
        while let Some(k) = link {
            let (matched, next) = {
                let e = &self.entries[k];
                (kh.matches(key, e.hash, &e.key), e.next)
            };
            if matched {
                let _cs = self.critical.enter("unlink");
                match prev {
                    None => self.buckets[bucket] = next,
                    Some(p) => self.entries[p].next = next,
                }
                let entry = self.entries.remove(k)?;
                self.count -= 1;
                return Some(entry.value);
            }
            prev = Some(k);
            link = next;
        }
        None
    }

    /// Delete the entry for `key`, releasing its value. Returns whether
    /// an entry was found.
    pub fn remove(&mut self, key: &str) -> bool {
        match self.unlink(key) {
            Some(stored) => {
                stored.release();
                true
            }
            None => false,
        }
    }

    /// Delete the entry for `key` and transfer its value to the caller,
    /// who becomes responsible for releasing it.
    pub fn pop(&mut self, key: &str) -> Option<Value<R>> {
        self.unlink(key).map(Stored::into_value)
    }

    /// Detach every entry, chain by chain, leaving an empty table of the
    /// same size. Slots come back in bucket order.
    fn detach_all(&mut self) -> Vec<Stored<R>> {
        self.rehash();
        let mut slots = Vec::with_capacity(self.count);
        {
            let _cs = self.critical.enter("detach");
            for head in self.buckets.iter_mut() {
                let mut link = head.take();
                while let Some(k) = link {
                    match self.entries.remove(k) {
                        Some(entry) => {
                            link = entry.next;
                            slots.push(entry.value);
                        }
                        None => break,
                    }
                }
            }
            // Anything unreachable from the buckets still owns its value.
            slots.extend(self.entries.drain().map(|(_, entry)| entry.value));
            self.count = 0;
        }
        slots
    }

    /// Remove every entry, releasing every resource exactly once.
    pub fn clear(&mut self) {
        for slot in self.detach_all() {
            slot.release();
        }
    }

    /// Key of the first entry in enumeration order.
    ///
    /// Enumeration order is unspecified: it follows bucket placement and is
    /// only meaningful while the table is not modified.
    pub fn first_key(&self) -> Option<&str> {
        self.key_from_bucket(0)
    }

    /// Key following `key` in enumeration order, `None` after the last one.
    /// Fails with [`TableError::KeyNotFound`] if `key` is not stored.
    pub fn next_key(&self, key: &str) -> Result<Option<&str>> {
        let kh = probe(key).ok_or(TableError::KeyNotFound)?;
        let (bucket, entry) = self.lookup(&kh, key).ok_or(TableError::KeyNotFound)?;
        if let Some(next) = entry.next.and_then(|k| self.entries.get(k)) {
            return Ok(Some(&*next.key));
        }
        Ok(self.key_from_bucket(bucket + 1))
    }

    fn key_from_bucket(&self, start: usize) -> Option<&str> {
        (start..self.buckets.len()).find_map(|b| self.chain(b).next().map(|e| &*e.key))
    }

    /// All keys in enumeration order.
    pub fn keys(&self) -> Result<Vec<&str>> {
        let mut keys = Vec::with_capacity(self.count);
        for (key, _) in self.iter() {
            if keys.len() >= self.count {
                return Err(self.corrupted(self.reachable()));
            }
            keys.push(key);
        }
        if keys.len() != self.count {
            return Err(self.corrupted(keys.len()));
        }
        Ok(keys)
    }

    /// `(key, value)` pairs in enumeration order.
    pub fn iter(&self) -> Iter<'_, R> {
        Iter::new(self)
    }

    pub(crate) fn corrupted(&self, counted: usize) -> TableError {
        tracing::error!(counted, recorded = self.count, "corrupted hash table");
        TableError::CorruptedTable {
            counted,
            recorded: self.count,
        }
    }
}

impl<R: Shared> Default for Table<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Shared> Drop for Table<R> {
    fn drop(&mut self) {
        trace!(
            entries = self.count,
            buckets = self.current,
            "releasing table"
        );
        self.clear();
    }
}

impl<R: Shared> fmt::Debug for Table<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Table")
            .field("evaluator", &self.evaluator.as_ref().map(Evaluator::name))
            .field("entries", &self.count)
            .field("buckets", &self.current)
            .finish()
    }
}

#[cfg(test)]
impl<R: Shared> Table<R> {
    /// Grow without migrating, as if interrupted right after the new array
    /// was installed.
    pub(crate) fn grow_interrupted(&mut self) -> Result<()> {
        self.rehash();
        self.grow()
    }

    /// Migrate only the first `n` old buckets.
    pub(crate) fn migrate_prefix(&mut self, n: usize) {
        for i in 0..n.min(self.current) {
            self.migrate_bucket(i);
        }
    }

    pub(crate) fn is_migrating(&self) -> bool {
        self.rehash_pending()
    }

    pub(crate) fn target_size(&self) -> usize {
        self.target
    }
}
