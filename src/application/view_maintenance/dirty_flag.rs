use std::sync::{Mutex, PoisonError};

/// Process-wide "views are stale" flag.
///
/// Writers call [`set_true`](Self::set_true) after each successful commit;
/// the refresh scheduler consumes it with
/// [`get_and_set_false`](Self::get_and_set_false). Both are linearizable, so a
/// commit that lands while a refresh is running leaves the flag set for the
/// next tick.
#[derive(Debug, Default)]
pub struct ViewDirtyFlag {
    dirty: Mutex<bool>,
}

impl ViewDirtyFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_true(&self) {
        *self.dirty.lock().unwrap_or_else(PoisonError::into_inner) = true;
    }

    /// Returns the previous value and clears the flag in one step.
    pub fn get_and_set_false(&self) -> bool {
        let mut dirty = self.dirty.lock().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *dirty, false)
    }

    pub fn is_dirty(&self) -> bool {
        *self.dirty.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
