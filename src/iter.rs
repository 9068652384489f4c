//! Iteration over stored entries in bucket order.

use crate::shared::{Shared, Value};
use crate::table::{EntryKey, Table};

/// Iterator over `(key, value)` pairs of a [`Table`].
///
/// Order follows bucket placement and is not meaningful to callers.
pub struct Iter<'a, R: Shared> {
    table: &'a Table<R>,
    bucket: usize,
    link: Option<EntryKey>,
    remaining: usize,
}

impl<'a, R: Shared> Iter<'a, R> {
    pub(crate) fn new(table: &'a Table<R>) -> Self {
        Self {
            table,
            bucket: 0,
            link: None,
            remaining: table.entries.len(),
        }
    }
}

impl<'a, R: Shared> Iterator for Iter<'a, R> {
    type Item = (&'a str, &'a Value<R>);

    fn next(&mut self) -> Option<Self::Item> {
        let table = self.table;
        loop {
            if let Some(k) = self.link {
                let entry = table.entries.get(k)?;
                self.link = entry.next;
                self.remaining = self.remaining.saturating_sub(1);
                return Some((&*entry.key, entry.value.get()));
            }
            if self.bucket >= table.buckets.len() {
                return None;
            }
            self.link = table.buckets[self.bucket];
            self.bucket += 1;
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.remaining))
    }
}

impl<'a, R: Shared> IntoIterator for &'a Table<R> {
    type Item = (&'a str, &'a Value<R>);
    type IntoIter = Iter<'a, R>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
