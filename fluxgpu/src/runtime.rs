//! Backend selection: the one place a caller crosses from "I don't yet know
//! which native backend I'm running on" to a concrete, statically-typed
//! `fluxgpu_core::context::Context<A>`.
//!
//! [`AnyContext`] plays the same role wgpu's `context.rs` draws between its
//! `wgpu-core` and WebGPU implementations, enumerated here over five native
//! backends instead of two web targets. Past this boundary, every resource
//! type (`Buffer<A>`, `Image<A>`, `Queue<A>`, ...) is exactly the generic
//! `fluxgpu-core` type — this crate does not re-wrap them, since a caller
//! who has already matched down to one backend variant has no further use
//! for erasure.

use std::sync::Arc;

use fluxgpu_core::context::{Context, DeviceSelector};
use fluxgpu_core::device::DeviceKind;
use fluxgpu_types::{Backend, Vendor};

use crate::error::{Result, RuntimeError};
use crate::options::RuntimeOptions;
use crate::probe;

/// Backend-erased summary of one enumerated device, for introspection
/// before a caller has committed to a concrete `Context<A>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceSummary {
    pub name: String,
    pub vendor: Vendor,
    pub kind: DeviceKind,
    pub backend: Backend,
}

/// Preference order [`AnyContext::open_preferred`] walks: discrete-style
/// native backends first, the host-CPU emulator last as the guaranteed
/// fallback.
const PREFERRED_ORDER: [Backend; 5] = [Backend::Vulkan, Backend::Metal, Backend::Cuda, Backend::OpenCl, Backend::Host];

/// An opened [`Context`], erased over which backend actually produced it.
pub enum AnyContext {
    #[cfg(feature = "vulkan")]
    Vulkan(Arc<Context<fluxgpu_hal::vulkan::Api>>),
    #[cfg(all(feature = "metal", any(target_os = "macos", target_os = "ios")))]
    Metal(Arc<Context<fluxgpu_hal::metal::Api>>),
    #[cfg(feature = "cuda")]
    Cuda(Arc<Context<fluxgpu_hal::cuda::Api>>),
    #[cfg(feature = "opencl")]
    OpenCl(Arc<Context<fluxgpu_hal::opencl::Api>>),
    #[cfg(feature = "host")]
    Host(Arc<Context<fluxgpu_hal::host::Api>>),
}

impl Clone for AnyContext {
    fn clone(&self) -> Self {
        match self {
            #[cfg(feature = "vulkan")]
            Self::Vulkan(ctx) => Self::Vulkan(Arc::clone(ctx)),
            #[cfg(all(feature = "metal", any(target_os = "macos", target_os = "ios")))]
            Self::Metal(ctx) => Self::Metal(Arc::clone(ctx)),
            #[cfg(feature = "cuda")]
            Self::Cuda(ctx) => Self::Cuda(Arc::clone(ctx)),
            #[cfg(feature = "opencl")]
            Self::OpenCl(ctx) => Self::OpenCl(Arc::clone(ctx)),
            #[cfg(feature = "host")]
            Self::Host(ctx) => Self::Host(Arc::clone(ctx)),
        }
    }
}

impl std::fmt::Debug for AnyContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnyContext").field("backend", &self.backend()).finish()
    }
}

impl AnyContext {
    pub fn backend(&self) -> Backend {
        match self {
            #[cfg(feature = "vulkan")]
            Self::Vulkan(_) => Backend::Vulkan,
            #[cfg(all(feature = "metal", any(target_os = "macos", target_os = "ios")))]
            Self::Metal(_) => Backend::Metal,
            #[cfg(feature = "cuda")]
            Self::Cuda(_) => Backend::Cuda,
            #[cfg(feature = "opencl")]
            Self::OpenCl(_) => Backend::OpenCl,
            #[cfg(feature = "host")]
            Self::Host(_) => Backend::Host,
        }
    }

    /// Backend-erased device list, for introspection that doesn't need the
    /// concrete `Context<A>` yet.
    pub fn devices(&self) -> Vec<DeviceSummary> {
        let backend = self.backend();
        let summarize = |name: &str, vendor: Vendor, kind: DeviceKind| DeviceSummary {
            name: name.to_string(),
            vendor,
            kind,
            backend,
        };
        match self {
            #[cfg(feature = "vulkan")]
            Self::Vulkan(ctx) => ctx.devices().iter().map(|d| summarize(&d.name, d.vendor, d.kind)).collect(),
            #[cfg(all(feature = "metal", any(target_os = "macos", target_os = "ios")))]
            Self::Metal(ctx) => ctx.devices().iter().map(|d| summarize(&d.name, d.vendor, d.kind)).collect(),
            #[cfg(feature = "cuda")]
            Self::Cuda(ctx) => ctx.devices().iter().map(|d| summarize(&d.name, d.vendor, d.kind)).collect(),
            #[cfg(feature = "opencl")]
            Self::OpenCl(ctx) => ctx.devices().iter().map(|d| summarize(&d.name, d.vendor, d.kind)).collect(),
            #[cfg(feature = "host")]
            Self::Host(ctx) => ctx.devices().iter().map(|d| summarize(&d.name, d.vendor, d.kind)).collect(),
        }
    }

    fn matches_whitelist(&self, whitelist: &[String]) -> bool {
        whitelist.is_empty() || self.devices().iter().any(|d| whitelist.iter().any(|w| w == &d.name))
    }

    /// Opens exactly `backend`. Fails with [`RuntimeError::BackendDisabled`]
    /// if this build has no support for it compiled in, or with
    /// [`RuntimeError::NoWhitelistedDevice`] if `options.device_whitelist`
    /// is non-empty and matches none of the backend's enumerated devices.
    pub fn open(backend: Backend, options: &RuntimeOptions) -> Result<Self> {
        let ctx = match backend {
            #[cfg(feature = "vulkan")]
            Backend::Vulkan => Self::Vulkan(Context::create(options.context_flags)?),
            #[cfg(not(feature = "vulkan"))]
            Backend::Vulkan => return Err(RuntimeError::BackendDisabled(Backend::Vulkan)),

            #[cfg(all(feature = "metal", any(target_os = "macos", target_os = "ios")))]
            Backend::Metal => Self::Metal(Context::create(options.context_flags)?),
            #[cfg(not(all(feature = "metal", any(target_os = "macos", target_os = "ios"))))]
            Backend::Metal => return Err(RuntimeError::BackendDisabled(Backend::Metal)),

            #[cfg(feature = "cuda")]
            Backend::Cuda => Self::Cuda(Context::create(options.context_flags)?),
            #[cfg(not(feature = "cuda"))]
            Backend::Cuda => return Err(RuntimeError::BackendDisabled(Backend::Cuda)),

            #[cfg(feature = "opencl")]
            Backend::OpenCl => Self::OpenCl(Context::create(options.context_flags)?),
            #[cfg(not(feature = "opencl"))]
            Backend::OpenCl => return Err(RuntimeError::BackendDisabled(Backend::OpenCl)),

            #[cfg(feature = "host")]
            Backend::Host => Self::Host(Context::create(options.context_flags)?),
            #[cfg(not(feature = "host"))]
            Backend::Host => return Err(RuntimeError::BackendDisabled(Backend::Host)),
        };
        if !ctx.matches_whitelist(&options.device_whitelist) {
            return Err(RuntimeError::NoWhitelistedDevice(backend));
        }
        Ok(ctx)
    }

    /// Walks [`PREFERRED_ORDER`], opening the first backend that is both
    /// compiled in and has at least one device available, skipping any
    /// backend [`crate::available_backends`] has already probed as absent.
    pub fn open_preferred(options: &RuntimeOptions) -> Result<Self> {
        let mut tried = Vec::new();
        for &backend in &PREFERRED_ORDER {
            if !is_available(backend) {
                continue;
            }
            tried.push(backend);
            if let Ok(ctx) = Self::open(backend, options) {
                return Ok(ctx);
            }
        }
        Err(RuntimeError::NoBackendAvailable { tried })
    }

    /// Picks one device out of this context's enumeration by the same
    /// selection rules as [`fluxgpu_core::context::Context::get_device`],
    /// surfaced here so a caller can inspect a device before matching down
    /// to the concrete `Context<A>` for resource creation.
    pub fn select_device(&self, selector: DeviceSelector) -> DeviceSummary {
        let backend = self.backend();
        match self {
            #[cfg(feature = "vulkan")]
            Self::Vulkan(ctx) => {
                let d = ctx.get_device(selector);
                DeviceSummary { name: d.name.clone(), vendor: d.vendor, kind: d.kind, backend }
            }
            #[cfg(all(feature = "metal", any(target_os = "macos", target_os = "ios")))]
            Self::Metal(ctx) => {
                let d = ctx.get_device(selector);
                DeviceSummary { name: d.name.clone(), vendor: d.vendor, kind: d.kind, backend }
            }
            #[cfg(feature = "cuda")]
            Self::Cuda(ctx) => {
                let d = ctx.get_device(selector);
                DeviceSummary { name: d.name.clone(), vendor: d.vendor, kind: d.kind, backend }
            }
            #[cfg(feature = "opencl")]
            Self::OpenCl(ctx) => {
                let d = ctx.get_device(selector);
                DeviceSummary { name: d.name.clone(), vendor: d.vendor, kind: d.kind, backend }
            }
            #[cfg(feature = "host")]
            Self::Host(ctx) => {
                let d = ctx.get_device(selector);
                DeviceSummary { name: d.name.clone(), vendor: d.vendor, kind: d.kind, backend }
            }
        }
    }

    #[cfg(feature = "vulkan")]
    pub fn as_vulkan(&self) -> Option<&Arc<Context<fluxgpu_hal::vulkan::Api>>> {
        match self {
            Self::Vulkan(ctx) => Some(ctx),
            #[allow(unreachable_patterns)]
            _ => None,
        }
    }

    #[cfg(all(feature = "metal", any(target_os = "macos", target_os = "ios")))]
    pub fn as_metal(&self) -> Option<&Arc<Context<fluxgpu_hal::metal::Api>>> {
        match self {
            Self::Metal(ctx) => Some(ctx),
            #[allow(unreachable_patterns)]
            _ => None,
        }
    }

    #[cfg(feature = "cuda")]
    pub fn as_cuda(&self) -> Option<&Arc<Context<fluxgpu_hal::cuda::Api>>> {
        match self {
            Self::Cuda(ctx) => Some(ctx),
            #[allow(unreachable_patterns)]
            _ => None,
        }
    }

    #[cfg(feature = "opencl")]
    pub fn as_opencl(&self) -> Option<&Arc<Context<fluxgpu_hal::opencl::Api>>> {
        match self {
            Self::OpenCl(ctx) => Some(ctx),
            #[allow(unreachable_patterns)]
            _ => None,
        }
    }

    #[cfg(feature = "host")]
    pub fn as_host(&self) -> Option<&Arc<Context<fluxgpu_hal::host::Api>>> {
        match self {
            Self::Host(ctx) => Some(ctx),
            #[allow(unreachable_patterns)]
            _ => None,
        }
    }
}

/// Whether `backend` is compiled into this build and has at least one
/// device available right now. Cached per-process after the first call per
/// backend (see [`crate::probe`]).
pub fn is_available(backend: Backend) -> bool {
    probe::is_available(backend, || AnyContext::open(backend, &RuntimeOptions::default()).is_ok())
}

/// Every backend [`is_available`] currently reports `true` for, in
/// [`PREFERRED_ORDER`].
pub fn available_backends() -> Vec<Backend> {
    PREFERRED_ORDER.iter().copied().filter(|&b| is_available(b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preferred_order_ends_with_host() {
        assert_eq!(PREFERRED_ORDER.last(), Some(&Backend::Host));
    }

    #[cfg(feature = "host")]
    #[test]
    fn host_backend_is_always_available() {
        assert!(is_available(Backend::Host));
        assert!(available_backends().contains(&Backend::Host));
    }

    #[cfg(feature = "host")]
    #[test]
    fn open_preferred_succeeds_with_only_host_compiled() {
        let ctx = AnyContext::open_preferred(&RuntimeOptions::default()).expect("host backend always opens");
        assert_eq!(ctx.backend(), Backend::Host);
        assert!(!ctx.devices().is_empty());
    }
}
