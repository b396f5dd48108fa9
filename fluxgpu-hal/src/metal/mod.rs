/*!
# Metal backend internals.

Built on top of `metal-rs`'s thin Objective-C wrapper. Metal has no
equivalent of a `VkFence`/timeline semaphore pair to straddle; instead a
fence here is a small shared counter bumped from a completion handler
registered on the command buffer (`MTLCommandBuffer::add_completed_handler`),
mirroring how the source toolchain's `metal_fence` waits on a dispatch
semaphore rather than polling a driver object.
!*/

mod device;
mod fence;
mod instance;
mod queue;

use std::sync::Arc;

pub use device::Device;
pub use instance::Instance;
pub use queue::Queue;

use fence::Fence;

#[derive(Clone, Debug)]
pub struct Api;

impl crate::Api for Api {
    type Instance = Instance;
    type RawDeviceId = u64;
    type Device = Device;
    type Queue = Queue;
    type Fence = Fence;
    type Buffer = Buffer;
    type Image = Image;
    type Program = Program;
    type CommandEncoder = CommandEncoder;

    const BACKEND: fluxgpu_types::Backend = fluxgpu_types::Backend::Metal;
}

impl crate::Fence for Fence {}

#[derive(Debug)]
pub struct Buffer {
    pub(crate) raw: metal::Buffer,
    pub(crate) size: u64,
    pub(crate) host_visible: bool,
}

// `metal::Buffer`/`metal::Texture` are reference-counted Objective-C
// handles; metal-rs's wrapper types are not `Send + Sync` by default
// because the underlying object isn't thread-confined by Metal itself,
// only by convention. Resources are only ever touched behind the owning
// `Device`'s API surface, same contract as every other backend here.
unsafe impl Send for Buffer {}
unsafe impl Sync for Buffer {}

#[derive(Debug)]
pub struct Image {
    pub(crate) raw: metal::Texture,
    pub(crate) mip_levels: u32,
    pub(crate) extent: (u32, u32, u32),
    pub(crate) bytes_per_texel: u32,
}

unsafe impl Send for Image {}
unsafe impl Sync for Image {}

#[derive(Debug)]
pub struct Program {
    pub(crate) function: metal::Function,
}

unsafe impl Send for Program {}
unsafe impl Sync for Program {}

pub struct CommandEncoder {
    pub(crate) device: Arc<device::DeviceShared>,
    pub(crate) active: Option<metal::CommandBuffer>,
}

impl std::fmt::Debug for CommandEncoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandEncoder")
            .field("has_active", &self.active.is_some())
            .finish()
    }
}

unsafe impl Send for CommandEncoder {}
unsafe impl Sync for CommandEncoder {}

#[derive(Debug)]
pub struct CommandBuffer {
    pub(crate) raw: metal::CommandBuffer,
}

unsafe impl Send for CommandBuffer {}
unsafe impl Sync for CommandBuffer {}
