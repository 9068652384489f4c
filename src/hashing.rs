//! Key hashing: one pass over the key bytes yields both hash and length.
//!
//! The recurrence is `hash = hash + (hash << 3) + byte` on a wrapping
//! 32-bit accumulator. Bucket placement, and therefore enumeration order,
//! depends on it, so it must not be swapped for a generic hasher.

/// Hash code and byte length of a key, computed together.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct KeyHash {
    pub hash: u32,
    pub len: usize,
}

impl KeyHash {
    /// Hash `key` up to (not including) its first NUL byte, if any.
    #[inline]
    pub fn of(key: &str) -> Self {
        let mut hash: u32 = 0;
        let mut len = 0usize;
        for &byte in key.as_bytes() {
            if byte == 0 {
                break;
            }
            hash = hash.wrapping_add(hash << 3).wrapping_add(u32::from(byte));
            len += 1;
        }
        Self { hash, len }
    }

    /// Bucket index of this hash in an array of `size` slots.
    #[inline]
    pub fn index(&self, size: usize) -> usize {
        debug_assert!(size.is_power_of_two());
        (self.hash as usize) % size
    }

    /// Full match test: the cached hash is only a fast reject, bytes decide.
    #[inline]
    pub fn matches(&self, key: &str, stored_hash: u32, stored_key: &str) -> bool {
        stored_hash == self.hash
            && stored_key.len() == self.len
            && stored_key.as_bytes() == &key.as_bytes()[..self.len]
    }
}
