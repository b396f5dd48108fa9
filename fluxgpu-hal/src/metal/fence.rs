use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Metal has no GPU-visible timeline object a CPU thread can wait on
/// directly; the highest reached value is instead bumped from a completion
/// handler registered on the command buffer that carried the signal (see
/// `queue.rs`), the same mechanism the source toolchain's dispatch-semaphore
/// based fence uses.
#[derive(Debug)]
pub struct Fence {
    pub(crate) reached: Arc<AtomicU64>,
}

impl Fence {
    pub(crate) fn new(signalled: bool) -> Self {
        Self {
            reached: Arc::new(AtomicU64::new(if signalled { 1 } else { 0 })),
        }
    }

    pub(crate) fn value(&self) -> u64 {
        self.reached.load(Ordering::Acquire)
    }

    pub(crate) fn handle(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.reached)
    }
}

impl crate::Fence for Fence {}
