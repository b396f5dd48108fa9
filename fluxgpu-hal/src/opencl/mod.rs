/*!
# OpenCL backend internals.

Built on `opencl3`'s safe wrappers over the ICD loader. Fences map onto
`opencl3::event::Event`: every queue submission enqueues a marker and
`Device::wait_for_fence`/`get_fence_value` wait on or poll that event,
mirroring how the source toolchain's `opencl_queue` tracks in-flight work
through `cl_event`s rather than a driver-native timeline object.
!*/

mod device;
mod fence;
mod instance;
mod queue;

pub use device::Device;
pub use instance::Instance;
pub use queue::Queue;

use fence::Fence;

#[derive(Clone, Debug)]
pub struct Api;

impl crate::Api for Api {
    type Instance = Instance;
    type RawDeviceId = RawDeviceId;
    type Device = Device;
    type Queue = Queue;
    type Fence = Fence;
    type Buffer = Buffer;
    type Image = Image;
    type Program = Program;
    type CommandEncoder = CommandEncoder;

    const BACKEND: fluxgpu_types::Backend = fluxgpu_types::Backend::OpenCl;
}

impl crate::Fence for Fence {}

/// `cl_device_id` is a raw pointer under the hood; platforms never move it
/// to another thread's address space, so it is safe to pass around this
/// process the same way every other backend's opaque device handle is.
#[derive(Clone, Copy, Debug)]
pub struct RawDeviceId(pub(crate) opencl3::device::cl_device_id);

unsafe impl Send for RawDeviceId {}
unsafe impl Sync for RawDeviceId {}

#[derive(Debug)]
pub struct Buffer {
    pub(crate) raw: opencl3::memory::Buffer<u8>,
    pub(crate) size: u64,
    pub(crate) host_visible: bool,
}

unsafe impl Send for Buffer {}
unsafe impl Sync for Buffer {}

/// Mip levels as linear buffers rather than `cl_image` objects: avoids
/// committing to a specific `cl_image_format`/`cl_image_desc` mapping for
/// every packed [`fluxgpu_types::ImageType`] this backend might be asked to
/// allocate, at the cost of losing sampler-hardware interpolation. Adequate
/// for the read/write/copy access this backend's image contract requires.
#[derive(Debug)]
pub struct Image {
    pub(crate) mip_levels: Vec<opencl3::memory::Buffer<u8>>,
}

unsafe impl Send for Image {}
unsafe impl Sync for Image {}

#[derive(Debug)]
pub struct Program {
    pub(crate) kernel: opencl3::kernel::Kernel,
    // Kept alive for as long as `kernel` references it.
    pub(crate) _program: opencl3::program::Program,
}

unsafe impl Send for Program {}
unsafe impl Sync for Program {}

/// Like the CUDA backend, there is no secondary command buffer distinct
/// from the queue it will run on; recording just appends to a plain list
/// replayed at submission.
#[derive(Debug, Default)]
pub struct CommandEncoder {
    pub(crate) commands: Vec<Command>,
}

unsafe impl Send for CommandEncoder {}
unsafe impl Sync for CommandEncoder {}

#[derive(Debug)]
pub enum Command {
    CopyBufferToBuffer {
        src: opencl3::memory::cl_mem,
        src_offset: u64,
        dst: opencl3::memory::cl_mem,
        dst_offset: u64,
        size: u64,
    },
    FillBuffer {
        dst: opencl3::memory::cl_mem,
        offset: u64,
        size: u64,
        value: u8,
    },
}

#[derive(Debug)]
pub struct CommandBuffer {
    pub(crate) commands: Vec<Command>,
}

unsafe impl Send for CommandBuffer {}
unsafe impl Sync for CommandBuffer {}

impl crate::CommandEncoder for CommandEncoder {
    type A = Api;
    type CommandBuffer = CommandBuffer;

    unsafe fn begin_encoding(&mut self, _label: Option<&str>) -> Result<(), crate::DeviceError> {
        self.commands.clear();
        Ok(())
    }

    unsafe fn end_encoding(&mut self) -> Result<CommandBuffer, crate::DeviceError> {
        Ok(CommandBuffer {
            commands: std::mem::take(&mut self.commands),
        })
    }

    unsafe fn copy_buffer_to_buffer(
        &mut self,
        src: &Buffer,
        src_offset: u64,
        dst: &Buffer,
        dst_offset: u64,
        size: u64,
    ) {
        use opencl3::memory::ClMem;
        self.commands.push(Command::CopyBufferToBuffer {
            src: src.raw.get(),
            src_offset,
            dst: dst.raw.get(),
            dst_offset,
            size,
        });
    }

    unsafe fn fill_buffer(&mut self, buffer: &Buffer, offset: u64, size: u64, value: u8) {
        use opencl3::memory::ClMem;
        self.commands.push(Command::FillBuffer {
            dst: buffer.raw.get(),
            offset,
            size,
            value,
        });
    }

    /// Images here are per-mip-level `cl_mem` buffers (see [`Image::mip_levels`]),
    /// so a buffer/image copy enqueues the exact same `clEnqueueCopyBuffer`
    /// a buffer/buffer copy would, just against the mip level's own handle.
    unsafe fn copy_buffer_to_image(&mut self, src: &Buffer, src_offset: u64, dst: &Image, mip_level: u32, size: u64) {
        use opencl3::memory::ClMem;
        self.commands.push(Command::CopyBufferToBuffer {
            src: src.raw.get(),
            src_offset,
            dst: dst.mip_levels[mip_level as usize].get(),
            dst_offset: 0,
            size,
        });
    }

    unsafe fn copy_image_to_buffer(&mut self, src: &Image, mip_level: u32, dst: &Buffer, dst_offset: u64, size: u64) {
        use opencl3::memory::ClMem;
        self.commands.push(Command::CopyBufferToBuffer {
            src: src.mip_levels[mip_level as usize].get(),
            src_offset: 0,
            dst: dst.raw.get(),
            dst_offset,
            size,
        });
    }

    unsafe fn fill_image(&mut self, image: &Image, mip_level: u32, size: u64, value: u8) {
        use opencl3::memory::ClMem;
        self.commands.push(Command::FillBuffer {
            dst: image.mip_levels[mip_level as usize].get(),
            offset: 0,
            size,
            value,
        });
    }
}

pub(crate) fn cl_result<T, E: std::fmt::Debug>(
    result: Result<T, E>,
) -> Result<T, crate::DeviceError> {
    result.map_err(|e| crate::DeviceError::ResourceCreationFailed(format!("{e:?}")))
}
