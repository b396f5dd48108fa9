//! Error kinds shared by every module in this crate.
//!
//! Mirrors the error taxonomy used throughout: invalid-argument,
//! unsupported, resource-exhausted, backend-internal, and (debug-only)
//! programming-invariant violations. No panics or exceptions cross a public
//! API boundary; every fallible operation returns a [`Result`].

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    /// Size/offset out of bounds, null where forbidden, arity mismatch at
    /// launch. Not fatal; the offending call simply fails.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Feature requested that the device does not provide.
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// Allocation or descriptor-pool exhaustion.
    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),

    /// Driver error propagated up from `fluxgpu-hal`.
    #[error("backend error: {0}")]
    Backend(#[from] fluxgpu_hal::DeviceError),

    /// No device could be opened for this backend.
    #[error("instance error: {0}")]
    Instance(#[from] fluxgpu_hal::InstanceError),

    /// Debug-only: a size mismatch on launch, a map/unmap pointer mismatch,
    /// a transition from an impossible layout. Logged; the caller may
    /// choose to continue, but behavior past this point is unspecified.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;

/// Logs `err` at error level and returns it, the uniform "report to the log"
/// step every error kind in this crate's contract requires before surfacing
/// a failure to the caller.
pub(crate) fn log_err(err: CoreError) -> CoreError {
    log::error!("{err}");
    err
}
