use std::sync::atomic::{AtomicU64, Ordering};

/// A fence on the host backend is just the last submission index the single
/// in-process queue has retired. Since `Queue::submit` on this backend runs
/// every command eagerly before returning, signalling is always immediate:
/// there is never a value in flight that hasn't already been reached.
#[derive(Debug)]
pub struct Fence {
    pub(crate) reached: AtomicU64,
}

impl Fence {
    pub(crate) fn new(signalled: bool) -> Self {
        Self {
            reached: AtomicU64::new(if signalled { 1 } else { 0 }),
        }
    }

    pub(crate) fn value(&self) -> u64 {
        self.reached.load(Ordering::Acquire)
    }

    pub(crate) fn signal(&self, value: u64) {
        self.reached.fetch_max(value, Ordering::AcqRel);
    }
}

impl crate::Fence for Fence {}
