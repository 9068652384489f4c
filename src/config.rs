//! Table construction parameters.

/// Smallest bucket array a table is created with unless configured otherwise.
pub const DEFAULT_MIN_BUCKETS: usize = 16;

/// Sizing configuration for a new [`Table`](crate::Table).
///
/// The initial bucket count is the larger of `min_buckets` and twice the
/// hint rounded up to a power of two, so a table created for `n` entries
/// starts at or below the growth threshold.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Config {
    size_hint: usize,
    min_buckets: usize,
}

impl Config {
    pub const fn new() -> Self {
        Self {
            size_hint: 0,
            min_buckets: DEFAULT_MIN_BUCKETS,
        }
    }

    /// Expected number of entries.
    pub fn size_hint(mut self, hint: usize) -> Self {
        self.size_hint = hint;
        self
    }

    /// Floor for the initial bucket count; rounded up to a power of two.
    pub fn min_buckets(mut self, floor: usize) -> Self {
        self.min_buckets = floor.max(1).next_power_of_two();
        self
    }

    /// Initial bucket count implied by this configuration.
    pub fn initial_buckets(&self) -> usize {
        let doubled = self
            .size_hint
            .max(1)
            .checked_next_power_of_two()
            .and_then(|n| n.checked_mul(2))
            .unwrap_or(1usize << (usize::BITS - 1));
        doubled.max(self.min_buckets)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}
