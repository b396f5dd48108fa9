/*!
# Vulkan backend internals.

## Stack memory

Ash expects slices, which argument marshalling doesn't generally have lying
around; we cope with the usual combination of temporarily heap-allocating a
`Vec` where the overhead is acceptable, and growing local `ArrayVec`/
`SmallVec` storage on the hot submission path.

## Fences

If timeline semaphores are available, they are used 1:1 with
[`crate::Fence`]. Otherwise a pool of `VkFence` objects is managed behind
each fence (see `fence.rs`).
!*/

mod device;
mod fence;
mod instance;
mod queue;

use std::sync::Arc;

use ash::vk;

pub use device::Device;
pub use instance::Instance;
pub use queue::Queue;

use fence::Fence;

const MILLIS_TO_NANOS: u64 = 1_000_000;

#[derive(Clone, Debug)]
pub struct Api;

impl crate::Api for Api {
    type Instance = Instance;
    type RawDeviceId = vk::PhysicalDevice;
    type Device = Device;
    type Queue = Queue;
    type Fence = Fence;
    type Buffer = Buffer;
    type Image = Image;
    type Program = Program;
    type CommandEncoder = CommandEncoder;

    const BACKEND: fluxgpu_types::Backend = fluxgpu_types::Backend::Vulkan;
}

impl crate::Fence for Fence {}

/// Dispatches to either a promoted-core function pointer or an explicit
/// extension loader, depending on whether the device's Vulkan version
/// already includes the functionality as core.
#[derive(Debug)]
pub(crate) enum ExtensionFn<T> {
    /// The extension provides the function, and a `T` loader is available.
    Extension(T),
    /// The core API provides the function; no explicit loader is needed.
    Promoted,
}

#[derive(Debug)]
pub struct Buffer {
    pub(crate) raw: vk::Buffer,
    pub(crate) memory: vk::DeviceMemory,
    pub(crate) size: u64,
    pub(crate) host_visible: bool,
}

#[derive(Debug)]
pub struct Image {
    pub(crate) raw: vk::Image,
    pub(crate) memory: vk::DeviceMemory,
    pub(crate) view: vk::ImageView,
    pub(crate) extent: vk::Extent3D,
    pub(crate) mip_levels: u32,
    pub(crate) aspect: vk::ImageAspectFlags,
}

#[derive(Debug)]
pub struct Program {
    pub(crate) module: vk::ShaderModule,
    pub(crate) entry_point: std::ffi::CString,
}

#[derive(Debug)]
pub struct CommandEncoder {
    pub(crate) device: Arc<device::DeviceShared>,
    pub(crate) pool: vk::CommandPool,
    pub(crate) active: Option<vk::CommandBuffer>,
}

#[derive(Debug)]
pub struct CommandBuffer {
    pub(crate) raw: vk::CommandBuffer,
}

pub(crate) fn map_vk_result(result: vk::Result) -> crate::DeviceError {
    match result {
        vk::Result::ERROR_OUT_OF_DEVICE_MEMORY | vk::Result::ERROR_OUT_OF_HOST_MEMORY => {
            crate::DeviceError::OutOfMemory
        }
        vk::Result::ERROR_DEVICE_LOST => crate::DeviceError::Lost,
        other => crate::DeviceError::ResourceCreationFailed(format!("{other:?}")),
    }
}

impl From<vk::Result> for crate::DeviceError {
    fn from(result: vk::Result) -> Self {
        map_vk_result(result)
    }
}
