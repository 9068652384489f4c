//! Critical stretches of a table mutation.
//!
//! A stretch covers link surgery, bucket array installation or a slot
//! commit: code that leaves the table briefly inconsistent and so must
//! never call `acquire`/`release` or touch the table again. Debug builds
//! record the name of the open stretch and panic, naming both stretches,
//! if a second one is opened inside it. Release builds keep no state.

use core::cell::Cell;
use core::marker::PhantomData;

/// Records the open stretch of one table. Open one with
/// `let _cs = self.critical.enter("name");`.
#[derive(Debug)]
pub struct CriticalSection {
    #[cfg(debug_assertions)]
    open: Cell<Option<&'static str>>,
    // Tables are single-threaded.
    _local: PhantomData<*mut ()>,
}

impl CriticalSection {
    pub const fn new() -> Self {
        Self {
            #[cfg(debug_assertions)]
            open: Cell::new(None),
            _local: PhantomData,
        }
    }

    /// Open the stretch `name` until the returned guard drops.
    #[inline]
    pub fn enter(&self, name: &'static str) -> CriticalGuard<'_> {
        #[cfg(debug_assertions)]
        {
            if let Some(outer) = self.open.replace(Some(name)) {
                panic!("critical section `{name}` opened inside `{outer}`");
            }
            return CriticalGuard { owner: self };
        }

        #[cfg(not(debug_assertions))]
        {
            let _ = name;
            return CriticalGuard { _owner: PhantomData };
        }
    }

    /// Name of the open stretch. Always `None` in release builds.
    #[inline]
    pub fn current(&self) -> Option<&'static str> {
        #[cfg(debug_assertions)]
        {
            return self.open.get();
        }

        #[cfg(not(debug_assertions))]
        {
            return None;
        }
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.current().is_some()
    }
}

impl Default for CriticalSection {
    fn default() -> Self {
        Self::new()
    }
}

/// Closes its stretch on drop.
pub struct CriticalGuard<'a> {
    #[cfg(debug_assertions)]
    owner: &'a CriticalSection,
    #[cfg(not(debug_assertions))]
    _owner: PhantomData<&'a ()>,
}

impl Drop for CriticalGuard<'_> {
    fn drop(&mut self) {
        #[cfg(debug_assertions)]
        {
            let closed = self.owner.open.take();
            debug_assert!(closed.is_some());
        }
    }
}
