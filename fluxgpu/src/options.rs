//! Caller-populated runtime configuration.
//!
//! Deliberately not a config-file format: source-level toolchain invocation,
//! JSON/config parsing and the rest of the platform-integration surface are
//! out of scope for this runtime, so there is nothing here to deserialize.
//! A caller fills in [`RuntimeOptions`] from whatever configuration system
//! their own application already has.

use std::path::PathBuf;

use fluxgpu_core::context::ContextFlags;

/// Top-level knobs a caller sets before opening a [`crate::AnyContext`].
#[derive(Debug, Clone)]
pub struct RuntimeOptions {
    /// Directories searched, in order, for an external toolchain binary or
    /// precompiled program archive. The runtime never invokes a toolchain
    /// itself; this is handed to that out-of-scope collaborator.
    pub toolchain_search_paths: Vec<PathBuf>,
    /// If non-empty, only devices whose name appears here are considered by
    /// [`crate::AnyContext::open_preferred`]'s device selection.
    pub device_whitelist: Vec<String>,
    /// Requests the backend's validation/debug layer, where one exists
    /// (Vulkan validation layers, a CUDA/Metal debug runtime). Ignored by
    /// backends with no such concept (the host backend).
    pub validation_layers: bool,
    /// Capability flags passed straight through to
    /// [`fluxgpu_core::context::Context::create`].
    pub context_flags: ContextFlags,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            toolchain_search_paths: Vec::new(),
            device_whitelist: Vec::new(),
            validation_layers: cfg!(debug_assertions),
            context_flags: ContextFlags::RESOURCE_REGISTRY,
        }
    }
}
