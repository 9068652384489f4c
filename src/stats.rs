//! Chain-length diagnostics.

use crate::error::Result;
use crate::shared::Shared;
use crate::table::Table;

/// Histogram of collision-chain lengths.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BucketStats {
    /// `histogram[n]` is the number of buckets whose chain holds `n`
    /// entries. Its length is `entries + 1`.
    pub histogram: Vec<usize>,
    pub longest_chain: usize,
    pub buckets: usize,
    pub entries: usize,
}

impl BucketStats {
    /// Mean number of key comparisons to find a stored entry.
    pub fn mean_probe_cost(&self) -> f64 {
        if self.entries == 0 {
            return 0.0;
        }
        let total: usize = self
            .histogram
            .iter()
            .enumerate()
            .map(|(len, &n)| n * len * (len + 1) / 2)
            .sum();
        total as f64 / self.entries as f64
    }
}

impl<R: Shared> Table<R> {
    /// Number of entries reachable from the buckets.
    pub(crate) fn reachable(&self) -> usize {
        let cap = self.entries.len() + 1;
        (0..self.buckets.len())
            .map(|bucket| self.chain(bucket).take(cap).count())
            .sum()
    }

    /// Walk every chain and histogram their lengths. Fails with
    /// `CorruptedTable` when the lengths do not add up to the recorded
    /// entry count; the count is reported, not repaired.
    pub fn bucket_stats(&self) -> Result<BucketStats> {
        let recorded = self.count;
        // A chain cannot legitimately be longer than the arena.
        let cap = self.entries.len() + 1;
        let mut histogram = vec![0usize; recorded + 1];
        let mut longest_chain = 0;
        let mut total = 0usize;
        for bucket in 0..self.buckets.len() {
            let len = self.chain(bucket).take(cap).count();
            if let Some(slot) = histogram.get_mut(len) {
                *slot += 1;
            }
            longest_chain = longest_chain.max(len);
            total += len;
        }
        if total != recorded {
            return Err(self.corrupted(total));
        }
        Ok(BucketStats {
            histogram,
            longest_chain,
            buckets: self.buckets.len(),
            entries: recorded,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TableError;
    use crate::shared::Value;
    use std::rc::Rc;

    #[test]
    fn empty_table_stats() {
        let t: Table<Rc<()>> = Table::new();
        let s = t.bucket_stats().unwrap();
        assert_eq!(s.histogram, vec![16]);
        assert_eq!(s.longest_chain, 0);
        assert_eq!(s.entries, 0);
        assert_eq!(s.mean_probe_cost(), 0.0);
    }

    /// Invariant: histogram covers every bucket and weights sum to the count.
    #[test]
    fn histogram_accounts_for_every_entry() {
        let mut t: Table<Rc<()>> = Table::new();
        for i in 0..100 {
            t.insert(&format!("name_{i}"), &Value::int(i)).unwrap();
        }
        let s = t.bucket_stats().unwrap();
        assert_eq!(s.histogram.len(), 101);
        assert_eq!(s.histogram.iter().sum::<usize>(), t.capacity());
        let weighted: usize = s.histogram.iter().enumerate().map(|(l, n)| l * n).sum();
        assert_eq!(weighted, 100);
        assert!(s.longest_chain >= 1);
        assert!(s.mean_probe_cost() >= 1.0);
    }

    /// Invariant: single-character keys 'a'..'g' land in distinct buckets of
    /// a 16-slot table, so every chain has length one.
    #[test]
    fn distinct_single_byte_keys_do_not_collide() {
        let mut t: Table<Rc<()>> = Table::new();
        for c in b'a'..b'a' + 7 {
            let k = (c as char).to_string();
            t.insert(&k, &Value::int(0)).unwrap();
        }
        let s = t.bucket_stats().unwrap();
        assert_eq!(s.histogram[1], 7);
        assert_eq!(s.histogram[0], 9);
        assert_eq!(s.longest_chain, 1);
        assert_eq!(s.mean_probe_cost(), 1.0);
    }

    /// Invariant: a count that disagrees with the chains is reported, both
    /// when too high and when too low, and left unrepaired.
    #[test]
    fn detects_count_mismatch() {
        let mut t: Table<Rc<()>> = Table::new();
        t.insert("a", &Value::int(1)).unwrap();
        t.insert("b", &Value::int(2)).unwrap();

        t.count = 3;
        assert_eq!(
            t.bucket_stats(),
            Err(TableError::CorruptedTable {
                counted: 2,
                recorded: 3
            })
        );
        assert_eq!(t.len(), 3);
        assert!(t.keys().is_err());

        t.count = 1;
        assert_eq!(
            t.keys(),
            Err(TableError::CorruptedTable {
                counted: 2,
                recorded: 1
            })
        );
        assert!(matches!(
            t.bucket_stats(),
            Err(TableError::CorruptedTable { counted: 2, recorded: 1 })
        ));
        assert!(t.keys().is_err());

        t.count = 2;
        assert!(t.bucket_stats().is_ok());
    }
}
