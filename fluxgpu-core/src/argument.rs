//! Launch argument marshalling.
//!
//! [`Arg`] is the tagged union every launch argument category collapses
//! into before it reaches a backend; [`marshal`] walks a [`FunctionEntry`]'s
//! `args` table in lockstep with a caller-supplied `&[Arg]` and validates
//! each position against its `ArgInfoFlags`, the same "walk args[] in
//! lockstep" contract the launch path describes. Raw pointers and null are
//! rejected by construction: there is no `Arg` variant for them.

use std::sync::Arc;

use fluxgpu_hal::Api;
use fluxgpu_types::ArgInfoFlags;

use crate::buffer::Buffer;
use crate::error::{CoreError, Result};
use crate::image::Image;
use crate::program::FunctionEntry;

/// One launch argument. Every positional slot in a launch's argument vector
/// is one of these; there is deliberately no "raw pointer" or "null"
/// variant.
pub enum Arg<A: Api> {
    Buffer(Arc<Buffer<A>>),
    BufferArray(Vec<Arc<Buffer<A>>>),
    Image(Arc<Image<A>>),
    ImageArray(Vec<Arc<Image<A>>>),
    ArgumentBuffer(Arc<Buffer<A>>),
    /// Plain-old-data passed by value, already serialized to bytes.
    Pod(Vec<u8>),
    /// Contiguous span of POD values, passed as one binding.
    PodSlice(Vec<u8>),
}

impl<A: Api> Arg<A> {
    fn matches(&self, flags: ArgInfoFlags) -> bool {
        match self {
            Arg::Buffer(_) => flags.contains(ArgInfoFlags::BUFFER) && !flags.contains(ArgInfoFlags::ARRAY),
            Arg::BufferArray(_) => flags.contains(ArgInfoFlags::BUFFER) && flags.contains(ArgInfoFlags::ARRAY),
            Arg::Image(_) => flags.contains(ArgInfoFlags::IMAGE) && !flags.contains(ArgInfoFlags::ARRAY),
            Arg::ImageArray(_) => flags.contains(ArgInfoFlags::IMAGE) && flags.contains(ArgInfoFlags::ARRAY),
            Arg::ArgumentBuffer(_) => flags.contains(ArgInfoFlags::ARGUMENT_BUFFER),
            Arg::Pod(_) | Arg::PodSlice(_) => flags.contains(ArgInfoFlags::CONSTANT),
        }
    }

    fn byte_len(&self) -> Option<u64> {
        match self {
            Arg::Pod(bytes) | Arg::PodSlice(bytes) => Some(bytes.len() as u64),
            _ => None,
        }
    }
}

/// Result of marshalling: one resolved binding per `args[]` position, ready
/// for a backend to encode into its native slots. `fluxgpu-core` stops here;
/// turning a `ResolvedArg` into a `vkUpdateDescriptorSet` call or a CUDA
/// kernel-param blob is backend-specific and lives one layer down, outside
/// this crate's scope.
pub enum ResolvedArg<'a, A: Api> {
    Buffer(&'a Arc<Buffer<A>>),
    BufferArray(&'a [Arc<Buffer<A>>]),
    Image(&'a Arc<Image<A>>),
    ImageArray(&'a [Arc<Image<A>>]),
    ArgumentBuffer(&'a Arc<Buffer<A>>),
    Pod(&'a [u8]),
}

/// Validates `args` against `entry.args` and, in debug builds, the
/// function's declared `args_size`, then returns the resolved bindings in
/// order. Debug-only because the size assertion inspects POD payload sizes
/// that release builds trust the caller to have gotten right, matching the
/// contract's "debug-build size assertion against `function_entry.args_size`"
/// clause.
pub fn marshal<'a, A: Api>(entry: &FunctionEntry<A>, args: &'a [Arg<A>]) -> Result<Vec<ResolvedArg<'a, A>>> {
    if args.len() != entry.info.args.len() {
        return Err(CoreError::InvalidArgument(format!(
            "launch supplied {} arguments, function entry declares {}",
            args.len(),
            entry.info.args.len()
        )));
    }

    let mut resolved = Vec::with_capacity(args.len());
    let mut pod_bytes = 0u64;
    for (idx, (arg, info)) in args.iter().zip(entry.info.args.iter()).enumerate() {
        if !arg.matches(info.flags) {
            return Err(CoreError::InvalidArgument(format!(
                "argument {idx} does not match declared kind {:?}",
                info.flags
            )));
        }
        if let Some(len) = arg.byte_len() {
            pod_bytes += len;
        }
        resolved.push(match arg {
            Arg::Buffer(b) => ResolvedArg::Buffer(b),
            Arg::BufferArray(v) => ResolvedArg::BufferArray(v),
            Arg::Image(i) => ResolvedArg::Image(i),
            Arg::ImageArray(v) => ResolvedArg::ImageArray(v),
            Arg::ArgumentBuffer(b) => ResolvedArg::ArgumentBuffer(b),
            Arg::Pod(bytes) | Arg::PodSlice(bytes) => ResolvedArg::Pod(bytes),
        });
    }

    debug_assert!(
        entry.args_size == 0 || pod_bytes <= entry.args_size as u64,
        "marshalled POD payload ({pod_bytes} bytes) exceeds function entry's declared args_size ({})",
        entry.args_size
    );

    Ok(resolved)
}

/// Resolves a launch's effective local work-group size and validates it
/// against the device's `max_work_group_size`. Three rules apply in order:
/// the function's declared `required_local_size` overrides any
/// caller-supplied value outright; any remaining zero component of the
/// caller's value is promoted to 1 rather than rejected; the result is then
/// clamped-checked against the device limits. `local_size` of `None` (with
/// no required size) resolves to `[1, 1, 1]`.
pub fn check_local_work_size(
    required_local_size: Option<[u32; 3]>,
    global_size: [u32; 3],
    local_size: Option<[u32; 3]>,
    max_work_group_size: [u32; 3],
    max_total_local_size: u32,
) -> Result<[u32; 3]> {
    if global_size.iter().any(|&g| g == 0) {
        return Err(CoreError::InvalidArgument("global_work_size must be non-zero in every executed dimension".into()));
    }

    let mut local = match required_local_size {
        Some(required) => required,
        None => local_size.unwrap_or([1, 1, 1]),
    };
    for dim in 0..3 {
        if local[dim] == 0 {
            local[dim] = 1;
        }
    }

    for dim in 0..3 {
        if local[dim] > max_work_group_size[dim] {
            return Err(CoreError::Unsupported(format!(
                "local_work_size[{dim}]={} exceeds device max_work_group_size[{dim}]={}",
                local[dim], max_work_group_size[dim]
            )));
        }
    }
    let total: u64 = local.iter().map(|&v| v as u64).product();
    if total > max_total_local_size as u64 {
        return Err(CoreError::Unsupported(format!(
            "local work-group total size {total} exceeds device limit {max_total_local_size}"
        )));
    }
    Ok(local)
}

/// Resolves the dispatch grid (number of work-groups per dimension) as
/// `ceil(global / local)`, the standard OpenCL/Metal/Vulkan compute
/// convention.
pub fn resolve_grid(global_size: [u32; 3], local_size: [u32; 3]) -> [u32; 3] {
    let mut grid = [0u32; 3];
    for dim in 0..3 {
        let l = local_size[dim].max(1);
        grid[dim] = (global_size[dim] + l - 1) / l;
    }
    grid
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_grid_rounds_up() {
        assert_eq!(resolve_grid([10, 10, 1], [4, 4, 1]), [3, 3, 1]);
        assert_eq!(resolve_grid([16, 16, 1], [4, 4, 1]), [4, 4, 1]);
        assert_eq!(resolve_grid([10, 10, 1], [1, 1, 1]), [10, 10, 1]);
    }

    #[test]
    fn check_local_work_size_rejects_zero_global() {
        let err = check_local_work_size(None, [0, 1, 1], None, [256, 256, 256], 256);
        assert!(err.is_err());
    }

    #[test]
    fn check_local_work_size_rejects_oversized_group() {
        let err = check_local_work_size(None, [16, 16, 1], Some([32, 32, 1]), [16, 16, 16], 1024);
        assert!(err.is_err());
    }

    #[test]
    fn check_local_work_size_promotes_zero_components_to_one() {
        let resolved = check_local_work_size(None, [16, 8, 8], Some([0, 8, 8]), [16, 16, 16], 1024).unwrap();
        assert_eq!(resolved, [1, 8, 8]);
    }

    #[test]
    fn check_local_work_size_required_size_overrides_caller() {
        let resolved = check_local_work_size(Some([4, 4, 1]), [16, 16, 1], Some([8, 8, 1]), [16, 16, 16], 1024).unwrap();
        assert_eq!(resolved, [4, 4, 1]);
    }
}
