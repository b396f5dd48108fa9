use fluxgpu_types::Backend;

/// Errors surfaced at the facade boundary: every [`fluxgpu_core::error::CoreError`]
/// plus the backend-selection failures that only make sense once several
/// backends are in play at once.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Core(#[from] fluxgpu_core::error::CoreError),

    /// No compiled-in backend produced a usable context; `tried` is the
    /// selection order [`crate::AnyContext::open_preferred`] attempted.
    #[error("no backend is available (tried: {tried:?})")]
    NoBackendAvailable { tried: Vec<Backend> },

    /// `backend` was asked for explicitly but this build has no support for
    /// it compiled in (its Cargo feature is off, or on a platform it never
    /// builds on, as with Metal off Apple targets).
    #[error("backend {0} is not compiled into this build")]
    BackendDisabled(Backend),

    /// `open_preferred`'s whitelist (`RuntimeOptions::device_whitelist`)
    /// excluded every device a backend enumerated.
    #[error("backend {0} enumerated no device matching the configured whitelist")]
    NoWhitelistedDevice(Backend),
}

pub type Result<T> = std::result::Result<T, RuntimeError>;
