//! Device-independent core of fluxgpu: context, device enumeration, memory
//! objects, program loading, argument marshalling, command submission and
//! graphics.
//!
//! Every module here is generic over `A: fluxgpu_hal::Api`; a backend's
//! concrete `Api` implementation (vulkan/metal/cuda/opencl/host) lives one
//! layer down in `fluxgpu-hal`. The facade crate, `fluxgpu`, monomorphizes
//! this crate's types over whichever backend a process selects at runtime
//! and exposes the result as a backend-erased public API via
//! [`gfx_select!`].

#![allow(
    clippy::too_many_arguments,
    clippy::new_without_default,
)]
#![warn(
    trivial_casts,
    trivial_numeric_casts,
    unused_extern_crates,
    unused_qualifications,
)]

pub mod argument;
pub mod buffer;
pub mod context;
pub mod device;
pub mod error;
pub mod fence;
pub mod image;
pub mod indirect;
pub mod program;
pub mod queue;
pub mod registry;
pub mod render;

pub use fluxgpu_hal::{MAX_BOUND_ARGUMENTS, MAX_COLOR_ATTACHMENTS, MAX_VERTEX_BUFFERS};

/// The index of a queue submission, handed out monotonically by
/// `queue::Queue` and compared against by `fence::Fence`.
pub type SubmissionIndex = fluxgpu_types::FenceValue;

/// Dispatches a call to the appropriately-monomorphized entry point based on
/// a runtime [`fluxgpu_types::Backend`] value.
///
/// ```ignore
/// gfx_select!(backend => some_generic_fn::<_>(args...))
/// ```
///
/// This crate is built generic over `A: fluxgpu_hal::Api` so every module's
/// logic is compiled once per backend with full static knowledge of that
/// backend's associated types; callers holding only a runtime `Backend`
/// value (selected via `Context::devices()[i].backend`) use this macro as
/// the boundary between that dynamic value and the monomorphized API below
/// it, the same role the analogous dispatch macro plays in `fluxgpu`'s
/// facade layer.
#[macro_export]
macro_rules! gfx_select {
    ($backend:expr => $call:ident ( $($arg:expr),* $(,)? )) => {
        match $backend {
            #[cfg(feature = "vulkan")]
            $crate::__private::Backend::Vulkan => $call::<fluxgpu_hal::vulkan::Api>( $($arg),* ),
            #[cfg(all(feature = "metal", any(target_os = "macos", target_os = "ios")))]
            $crate::__private::Backend::Metal => $call::<fluxgpu_hal::metal::Api>( $($arg),* ),
            #[cfg(feature = "cuda")]
            $crate::__private::Backend::Cuda => $call::<fluxgpu_hal::cuda::Api>( $($arg),* ),
            #[cfg(feature = "opencl")]
            $crate::__private::Backend::OpenCl => $call::<fluxgpu_hal::opencl::Api>( $($arg),* ),
            #[cfg(feature = "host")]
            $crate::__private::Backend::Host => $call::<fluxgpu_hal::host::Api>( $($arg),* ),
            #[allow(unreachable_patterns)]
            other => panic!("backend {other:?} not enabled in this build"),
        }
    };
}

#[doc(hidden)]
pub mod __private {
    pub use fluxgpu_types::Backend;
}
