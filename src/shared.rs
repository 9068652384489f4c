//! Stored values and the host's reference-counting capability.
//!
//! A slot holds either a `Resource` (a shared, reference-counted host value)
//! or a plain `Scalar`. Resources enter the table through `Shared::acquire`
//! and leave it either through `Shared::release` or by transfer to a caller
//! (`pop`). The in-table wrapper `Stored` is linear: dropping one that still
//! holds a resource is a bug and panics, the only valid exits are
//! `Stored::release` and `Stored::into_value`.

use core::mem;
use std::rc::Rc;
use std::sync::Arc;

/// Reference-counting capability of host values.
pub trait Shared: Sized {
    /// Obtain one more counted reference to the same value.
    fn acquire(&self) -> Self;

    /// Give one counted reference back. Defaults to dropping it.
    fn release(self) {
        drop(self)
    }
}

impl<T: ?Sized> Shared for Rc<T> {
    #[inline]
    fn acquire(&self) -> Self {
        Rc::clone(self)
    }
}

impl<T: ?Sized> Shared for Arc<T> {
    #[inline]
    fn acquire(&self) -> Self {
        Arc::clone(self)
    }
}

/// Raw scalar payload, copied by value.
pub type Bits = u64;

/// A value as seen by callers of the table.
#[derive(Debug, PartialEq)]
pub enum Value<R> {
    Resource(R),
    Scalar(Bits),
}

impl<R> Value<R> {
    pub fn int(v: i64) -> Self {
        Value::Scalar(v as Bits)
    }

    pub fn float(v: f64) -> Self {
        Value::Scalar(v.to_bits())
    }

    pub fn is_resource(&self) -> bool {
        matches!(self, Value::Resource(_))
    }

    pub fn as_resource(&self) -> Option<&R> {
        match self {
            Value::Resource(r) => Some(r),
            Value::Scalar(_) => None,
        }
    }

    pub fn as_bits(&self) -> Option<Bits> {
        match self {
            Value::Scalar(b) => Some(*b),
            Value::Resource(_) => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        self.as_bits().map(|b| b as i64)
    }

    pub fn as_float(&self) -> Option<f64> {
        self.as_bits().map(f64::from_bits)
    }
}

impl<R: Shared> Value<R> {
    /// Copy the value, taking a fresh counted reference for resources.
    #[inline]
    pub fn acquire(&self) -> Self {
        match self {
            Value::Resource(r) => Value::Resource(r.acquire()),
            Value::Scalar(b) => Value::Scalar(*b),
        }
    }

    /// Give back the counted reference carried by a resource; no-op for scalars.
    #[inline]
    pub fn release(self) {
        if let Value::Resource(r) = self {
            r.release();
        }
    }
}

/// Placeholder held by a slot while its previous content is being released.
const VACANT: Bits = 0;

/// In-table value slot owning exactly one counted reference when it holds
/// a resource.
pub(crate) struct Stored<R: Shared> {
    value: Value<R>,
}

impl<R: Shared> Stored<R> {
    /// Take ownership of an already acquired value.
    #[inline]
    pub(crate) fn new(value: Value<R>) -> Self {
        Self { value }
    }

    #[inline]
    pub(crate) fn get(&self) -> &Value<R> {
        &self.value
    }

    /// Move the content out, leaving a plain scalar behind. After this the
    /// slot owns nothing and may be observed (or dropped) safely.
    #[inline]
    pub(crate) fn vacate(&mut self) -> Value<R> {
        mem::replace(&mut self.value, Value::Scalar(VACANT))
    }

    /// Install a new value into a vacated slot.
    #[inline]
    pub(crate) fn commit(&mut self, value: Value<R>) {
        debug_assert!(!self.value.is_resource(), "commit over a live resource");
        self.value = value;
    }

    /// Release the owned reference, consuming the slot.
    #[inline]
    pub(crate) fn release(mut self) {
        self.vacate().release();
    }

    /// Hand the owned reference to the caller without releasing it.
    #[inline]
    pub(crate) fn into_value(mut self) -> Value<R> {
        self.vacate()
    }
}

impl<R: Shared> Drop for Stored<R> {
    fn drop(&mut self) {
        // Fail fast on a leaked reference, but never turn an unwind into an abort.
        if self.value.is_resource() && !std::thread::panicking() {
            panic!("stored resource dropped without release");
        }
    }
}
