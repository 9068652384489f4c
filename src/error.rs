use thiserror::Error;

/// Errors reported by table operations.
///
/// Looking up or removing a missing key is not an error; those report
/// `None`/`false`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TableError {
    /// Bucket array or entry storage could not be allocated.
    #[error("insufficient memory for {what}")]
    Allocation { what: &'static str },

    /// Key is empty or contains a NUL byte.
    #[error("invalid key: keys must be non-empty and free of NUL bytes")]
    InvalidKey,

    /// Enumeration was asked to continue from a key that is not stored.
    #[error("hash entry not found")]
    KeyNotFound,

    /// Chain lengths disagree with the recorded entry count.
    #[error("corrupted hash table: {counted} entries reachable, {recorded} recorded")]
    CorruptedTable { counted: usize, recorded: usize },

    /// Evaluator name is not a valid host symbol name.
    #[error("evaluator must be a valid symbol name, got {0:?}")]
    InvalidEvaluator(String),
}

pub type Result<T> = std::result::Result<T, TableError>;
