//! Public-facing entry point for fluxgpu: a cross-backend GPU compute and
//! graphics runtime (Vulkan, Metal, CUDA, OpenCL, and an in-process host-CPU
//! reference backend).
//!
//! The device-independent logic — context, buffer, image, program, queue,
//! render pass/pipeline/renderer, indirect command pipelines — lives in
//! [`fluxgpu_core`], generic over a backend's [`fluxgpu_hal::Api`]
//! implementation. This crate adds exactly one thing on top: backend
//! discovery and selection, via [`AnyContext`]. Past that selection point,
//! work the concrete generic API directly (`fluxgpu_core::buffer::Buffer`,
//! `fluxgpu_core::queue::Queue`, ...) the same way an application using
//! `wgpu` eventually works against a concrete `wgpu::Device`.
//!
//! ```no_run
//! use fluxgpu::{AnyContext, RuntimeOptions};
//!
//! let ctx = AnyContext::open_preferred(&RuntimeOptions::default())?;
//! println!("running on {:?}: {:?}", ctx.backend(), ctx.devices());
//! # Ok::<(), fluxgpu::RuntimeError>(())
//! ```

#![warn(
    trivial_casts,
    trivial_numeric_casts,
    unused_extern_crates,
    unused_qualifications,
)]

mod error;
mod options;
mod probe;
mod runtime;

pub use error::{Result, RuntimeError};
pub use options::RuntimeOptions;
pub use runtime::{available_backends, is_available, AnyContext, DeviceSummary};

pub use fluxgpu_types::Backend;

pub use fluxgpu_core;
pub use fluxgpu_hal;
