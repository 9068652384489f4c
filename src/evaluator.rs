//! Evaluator handles: the host callable a table forwards to when it is
//! invoked as a function.

use crate::error::{Result, TableError};
use core::fmt;

/// Validated name of a host symbol.
///
/// Names are non-empty, start with an ASCII letter or `_`, and continue
/// with ASCII letters, digits or `_`.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct Evaluator(Box<str>);

impl Evaluator {
    pub fn named(name: &str) -> Result<Self> {
        let mut chars = name.bytes();
        let valid = match chars.next() {
            Some(first) if first.is_ascii_alphabetic() || first == b'_' => {
                chars.all(|c| c.is_ascii_alphanumeric() || c == b'_')
            }
            _ => false,
        };
        if valid {
            Ok(Self(name.into()))
        } else {
            Err(TableError::InvalidEvaluator(name.to_owned()))
        }
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Evaluator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
