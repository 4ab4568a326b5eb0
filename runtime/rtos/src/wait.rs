//! Waiter accounting shared by the channel-backed primitives

use core::sync::atomic::{AtomicUsize, Ordering};

/// Counts tasks currently blocked on a primitive
#[derive(Debug, Default)]
pub(crate) struct WaitCount(AtomicUsize);

impl WaitCount {
    pub(crate) const fn new() -> Self {
        Self(AtomicUsize::new(0))
    }

    /// Register the caller as blocked until the returned guard drops
    pub(crate) fn enter(&self) -> Waiting<'_> {
        self.0.fetch_add(1, Ordering::AcqRel);
        Waiting(&self.0)
    }

    pub(crate) fn get(&self) -> usize {
        self.0.load(Ordering::Acquire)
    }
}

pub(crate) struct Waiting<'a>(&'a AtomicUsize);

impl Drop for Waiting<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}
