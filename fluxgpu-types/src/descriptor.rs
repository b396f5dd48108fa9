use crate::MemoryFlags;

/// Descriptor for allocating a linear memory object.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BufferDescriptor {
    pub size: u64,
    pub usage: MemoryFlags,
    pub label: Option<String>,
}

impl BufferDescriptor {
    pub fn new(size: u64, usage: MemoryFlags) -> Self {
        Self {
            size,
            usage,
            label: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// Creation parameters for a [`crate::Backend`]'s queue; most backends only
/// have one logical queue family fit for general submission, so this is
/// deliberately small.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct QueueDescriptor {
    /// Hint that this queue will primarily carry copy/transfer work, letting
    /// a backend prefer a dedicated DMA-capable queue family if one exists.
    pub prefer_transfer: bool,
}

/// Creation parameters for a fence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FenceDescriptor {
    /// Start the fence already signalled at value 0, so a first `wait`
    /// against it without any prior submission does not block.
    pub signalled: bool,
}

/// Parameters fixing the shape of an indirect command pipeline's backing
/// storage: how many draw/dispatch entries it holds and how many buffer
/// bindings each stage may reference, used to size backend descriptor pools
/// up front rather than growing them per-entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IndirectCommandPipelineDescriptor {
    pub max_command_count: u32,
    pub max_vertex_buffers: u32,
    pub max_fragment_buffers: u32,
    pub max_kernel_buffers: u32,
    /// Override the renderer's drawable size used to resolve sentinel
    /// viewport/scissor rects baked into indirect render commands, rather
    /// than resolving at the active render target's size. The one VR
    /// touchpoint this runtime needs.
    pub render_target_size: Option<[u32; 2]>,
}

impl Default for IndirectCommandPipelineDescriptor {
    fn default() -> Self {
        Self {
            max_command_count: 0,
            max_vertex_buffers: 0,
            max_fragment_buffers: 0,
            max_kernel_buffers: 0,
            render_target_size: None,
        }
    }
}
