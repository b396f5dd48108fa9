use bitflags::bitflags;

bitflags! {
    /// Allocation-time flags for a [`crate::BufferDescriptor`] or image
    /// descriptor, controlling storage location and host visibility.
    #[repr(transparent)]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct MemoryFlags: u32 {
        /// Allocate in device-local memory (the default if neither this nor
        /// `HOST_VISIBLE` is set on a backend that distinguishes the two).
        const DEVICE_LOCAL   = 1 << 0;
        /// Allocation must be mappable for host read/write.
        const HOST_VISIBLE   = 1 << 1;
        /// Host-side reads/writes are cache-coherent with the device without
        /// an explicit flush/invalidate (the "host-coherent fast path").
        const HOST_COHERENT  = 1 << 2;
        /// Host may read through a mapping.
        const HOST_READ      = 1 << 3;
        /// Host may write through a mapping.
        const HOST_WRITE     = 1 << 4;
        /// Usable as the source of a copy.
        const COPY_SRC       = 1 << 5;
        /// Usable as the destination of a copy.
        const COPY_DST       = 1 << 6;
        /// Usable as a render pass color/depth attachment.
        const RENDER_TARGET  = 1 << 7;
        /// Usable as a vertex/index buffer input.
        const VERTEX_BUFFER  = 1 << 8;
        /// Usable as an indirect-command source buffer.
        const INDIRECT       = 1 << 9;
        /// No backend sharing (OpenGL interop) requested for this allocation.
        const NO_SHARING     = 1 << 10;
    }
}

impl Default for MemoryFlags {
    fn default() -> Self {
        MemoryFlags::DEVICE_LOCAL | MemoryFlags::COPY_SRC | MemoryFlags::COPY_DST
    }
}

/// How a mapped memory object may be accessed by the host while mapped.
/// Distinct from [`MemoryFlags::HOST_READ`]/`HOST_WRITE`, which describe
/// what the allocation *permits*; this describes what a single `map` call
/// *requests*.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum HostAccess {
    ReadOnly,
    WriteOnly,
    ReadWrite,
    /// Write-only with no guarantee the previous contents are readable back;
    /// lets a backend hand out a fresh staging range instead of waiting on
    /// prior GPU reads, trading that guarantee for lower map latency.
    WriteDiscard,
}

impl HostAccess {
    pub fn allows_read(self) -> bool {
        matches!(self, HostAccess::ReadOnly | HostAccess::ReadWrite)
    }

    pub fn allows_write(self) -> bool {
        matches!(
            self,
            HostAccess::WriteOnly | HostAccess::ReadWrite | HostAccess::WriteDiscard
        )
    }
}

bitflags! {
    /// Per-function metadata flags carried alongside a
    /// [`crate::ImageDescriptor`]-adjacent program entry (see
    /// `fluxgpu_core::program::FunctionEntry`).
    #[repr(transparent)]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct FunctionFlags: u32 {
        /// Function is a compute kernel, launched via `Queue::execute`.
        const KERNEL          = 1 << 0;
        /// Function is a vertex stage of a render pipeline.
        const VERTEX          = 1 << 1;
        /// Function is a fragment stage of a render pipeline.
        const FRAGMENT        = 1 << 2;
        /// Function may be the target of an indirect command pipeline entry.
        const INDIRECTABLE    = 1 << 3;
        /// Function requires a fixed/known work-group size at compile time.
        const FIXED_WORK_SIZE = 1 << 4;
        /// Function performs an unformatted host-side printf by staging
        /// arguments into a sink buffer that is drained after completion.
        const USES_SOFT_PRINTF = 1 << 5;
        /// Function reads or writes device-side atomics.
        const USES_ATOMICS     = 1 << 6;
    }
}

bitflags! {
    /// Per-argument classification flags accompanying an `arg_info` table
    /// entry; distinguishes how `fluxgpu-core::argument` marshals a given
    /// positional argument into backend-native binding slots.
    #[repr(transparent)]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct ArgInfoFlags: u32 {
        const BUFFER          = 1 << 0;
        const IMAGE           = 1 << 1;
        const ARRAY           = 1 << 2;
        const ARGUMENT_BUFFER = 1 << 3;
        const CONSTANT        = 1 << 4;
        /// Argument is read-only from the function's perspective.
        const READ_ONLY       = 1 << 5;
        /// Argument is write-only from the function's perspective.
        const WRITE_ONLY      = 1 << 6;
        /// Argument is a stage-input (vertex buffer) binding, not a
        /// general-purpose resource binding.
        const STAGE_INPUT     = 1 << 7;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_access_read_write_matrix() {
        assert!(HostAccess::ReadOnly.allows_read());
        assert!(!HostAccess::ReadOnly.allows_write());
        assert!(HostAccess::WriteOnly.allows_write());
        assert!(!HostAccess::WriteOnly.allows_read());
        assert!(HostAccess::ReadWrite.allows_read());
        assert!(HostAccess::ReadWrite.allows_write());
        assert!(HostAccess::WriteDiscard.allows_write());
        assert!(!HostAccess::WriteDiscard.allows_read());
    }

    #[test]
    fn memory_flags_default_is_device_local_copyable() {
        let flags = MemoryFlags::default();
        assert!(flags.contains(MemoryFlags::DEVICE_LOCAL));
        assert!(flags.contains(MemoryFlags::COPY_SRC));
        assert!(flags.contains(MemoryFlags::COPY_DST));
        assert!(!flags.contains(MemoryFlags::HOST_VISIBLE));
    }
}
