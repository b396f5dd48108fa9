//! Cross-queue synchronization primitive.
//!
//! Wraps a backend fence (`fluxgpu_hal::Fence`) with the small state machine
//! the source toolchain's fence object exposes: `fresh → signalled ↔
//! waited`. The actual wait/signal mechanics are the backend's (a Vulkan
//! timeline semaphore, a CUDA event, an atomic counter on the host backend);
//! this module only tracks the highest value this fence has been asked to
//! reach and the state label for debugging/assertions.

use std::mem::ManuallyDrop;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use fluxgpu_hal::{Api, Device as HalDevice, FenceValue};

use crate::device::Device;
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FenceState {
    Fresh,
    Signalled,
    Waited,
}

pub struct Fence<A: Api> {
    device: Arc<Device<A>>,
    // Wrapped so the compiler-generated `Drop` glue for `Fence` never runs
    // the backend handle's destructor; our own `Drop` impl below does that
    // exactly once via `hal::Device::destroy_fence`.
    pub(crate) raw: ManuallyDrop<A::Fence>,
    /// Highest value anything has asked this fence to reach (via a signalling
    /// launch); not necessarily the value the device has actually reached.
    target: AtomicU64,
    state: parking_lot::Mutex<FenceState>,
    pub label: Option<String>,
}

impl<A: Api> std::fmt::Debug for Fence<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fence")
            .field("state", &*self.state.lock())
            .field("label", &self.label)
            .finish()
    }
}

impl<A: Api> Fence<A> {
    pub fn new(device: Arc<Device<A>>, desc: &fluxgpu_types::FenceDescriptor) -> Result<Arc<Self>> {
        let raw = unsafe { device.raw.create_fence(desc.signalled)? };
        let state = if desc.signalled { FenceState::Signalled } else { FenceState::Fresh };
        Ok(Arc::new(Self {
            device,
            raw: ManuallyDrop::new(raw),
            target: AtomicU64::new(0),
            state: parking_lot::Mutex::new(state),
            label: None,
        }))
    }

    pub fn with_label(mut self: Arc<Self>, label: impl Into<String>) -> Arc<Self> {
        Arc::get_mut(&mut self)
            .expect("label set immediately after construction, before any other reference exists")
            .label = Some(label.into());
        self
    }

    pub fn state(&self) -> FenceState {
        *self.state.lock()
    }

    /// Records that a submission has been asked to signal this fence to
    /// `value` once it completes. Called by `crate::queue::Queue::submit`
    /// immediately before handing `value` to the backend as the signal
    /// target; does not itself wait.
    pub(crate) fn mark_signal_target(&self, value: FenceValue) {
        self.target.fetch_max(value, Ordering::AcqRel);
        *self.state.lock() = FenceState::Signalled;
    }

    /// Highest value the backend reports this fence has actually reached.
    pub fn current_value(&self) -> Result<FenceValue> {
        Ok(unsafe { self.device.raw.get_fence_value(&self.raw)? })
    }

    /// Blocks the calling thread until this fence reaches `value`, or
    /// `timeout_ms` elapses (`None` blocks unbounded, matching `finish()`'s
    /// contract). A wait transitions the fence into `Waited`; it may still
    /// be signalled to a higher value afterward.
    pub fn wait(&self, value: FenceValue, timeout_ms: Option<u32>) -> Result<bool> {
        let reached = unsafe { self.device.raw.wait_for_fence(&self.raw, value, timeout_ms)? };
        if reached {
            *self.state.lock() = FenceState::Waited;
        }
        Ok(reached)
    }
}

impl<A: Api> Drop for Fence<A> {
    fn drop(&mut self) {
        let raw = unsafe { ManuallyDrop::take(&mut self.raw) };
        unsafe { self.device.raw.destroy_fence(raw) };
    }
}
