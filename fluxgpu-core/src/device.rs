//! Immutable device capability record.
//!
//! Everything here is fixed at [`crate::context::Context::create`] time,
//! mirroring the source toolchain's device object: a `Device` never mutates
//! after enumeration, so it is safe to share across host threads without a
//! lock (see the concurrency model's "memory objects/devices are immutable,
//! safe to share" rule).

use fluxgpu_hal::Api;
use fluxgpu_types::{Backend, DeviceLimits, Vendor};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    Gpu,
    Cpu,
    Other,
}

pub struct Device<A: Api> {
    pub(crate) raw: A::Device,
    pub(crate) raw_id: A::RawDeviceId,
    pub name: String,
    pub vendor: Vendor,
    pub kind: DeviceKind,
    pub limits: DeviceLimits,
    pub backend: Backend,

    /// Best-effort resource accounting, incremented/decremented by
    /// `crate::buffer`/`crate::image` creation and destruction. Only ever
    /// non-zero when the `counters` feature is enabled; see
    /// `Context::get_memory_usage`.
    pub(crate) bytes_allocated: std::sync::atomic::AtomicU64,
}

impl<A: Api> std::fmt::Debug for Device<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device")
            .field("name", &self.name)
            .field("vendor", &self.vendor)
            .field("kind", &self.kind)
            .field("backend", &self.backend)
            .finish()
    }
}

impl<A: Api> Device<A> {
    pub fn limits(&self) -> &DeviceLimits {
        &self.limits
    }

    pub fn raw_id(&self) -> &A::RawDeviceId {
        &self.raw_id
    }

    pub fn is_host(&self) -> bool {
        self.backend.is_host()
    }

    #[cfg(feature = "counters")]
    pub(crate) fn account(&self, delta: i64) {
        use std::sync::atomic::Ordering;
        if delta >= 0 {
            self.bytes_allocated.fetch_add(delta as u64, Ordering::Relaxed);
        } else {
            self.bytes_allocated.fetch_sub((-delta) as u64, Ordering::Relaxed);
        }
    }

    #[cfg(not(feature = "counters"))]
    pub(crate) fn account(&self, _delta: i64) {}

    pub(crate) fn bytes_allocated(&self) -> u64 {
        self.bytes_allocated.load(std::sync::atomic::Ordering::Relaxed)
    }
}
