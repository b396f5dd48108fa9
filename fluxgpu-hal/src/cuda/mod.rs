/*!
# CUDA backend internals.

Talks to the driver API directly through `cudarc`'s `sys` bindings rather
than its higher-level safe wrappers, since this backend's resource model
(bare device pointers, a single context per device, events as fences)
maps onto the driver API 1:1 and doesn't benefit from an intermediate
abstraction the way the Vulkan backend benefits from `ash`.

Every call into `cudarc::driver::sys` is wrapped with [`cu_result`] so a
non-success `CUresult` becomes a [`crate::DeviceError`] instead of being
silently ignored, the same discipline `map_vk_result` applies on the
Vulkan side.
!*/

mod device;
mod fence;
mod instance;
mod queue;

use cudarc::driver::sys as cu;

pub use device::Device;
pub use instance::Instance;
pub use queue::Queue;

use fence::Fence;

#[derive(Clone, Debug)]
pub struct Api;

impl crate::Api for Api {
    type Instance = Instance;
    type RawDeviceId = cu::CUdevice;
    type Device = Device;
    type Queue = Queue;
    type Fence = Fence;
    type Buffer = Buffer;
    type Image = Image;
    type Program = Program;
    type CommandEncoder = CommandEncoder;

    const BACKEND: fluxgpu_types::Backend = fluxgpu_types::Backend::Cuda;
}

#[derive(Debug)]
pub struct Buffer {
    pub(crate) ptr: cu::CUdeviceptr,
    pub(crate) size: u64,
    /// Host-side pointer to the same pinned allocation when created with
    /// [`fluxgpu_types::MemoryFlags::HOST_VISIBLE`] (`cuMemHostAlloc`
    /// instead of `cuMemAlloc`), mapped into the device's address space via
    /// `cuMemHostGetDevicePointer_v2` so it can still back `ptr` above.
    pub(crate) host_ptr: Option<*mut std::ffi::c_void>,
}

unsafe impl Send for Buffer {}
unsafe impl Sync for Buffer {}

#[derive(Debug)]
pub struct Image {
    pub(crate) ptr: cu::CUdeviceptr,
    pub(crate) mip_offsets: Vec<u64>,
    pub(crate) total_size: u64,
}

#[derive(Debug)]
pub struct Program {
    pub(crate) module: cu::CUmodule,
    pub(crate) function: cu::CUfunction,
}

unsafe impl Send for Program {}
unsafe impl Sync for Program {}

/// Encoding on CUDA records nothing on its own: calls are appended to a
/// plain list and replayed onto the stream at submission time, since the
/// driver API has no notion of a secondary command buffer distinct from
/// the stream it will run on.
#[derive(Debug, Default)]
pub struct CommandEncoder {
    pub(crate) commands: Vec<Command>,
}

#[derive(Debug)]
pub enum Command {
    CopyBufferToBuffer {
        src: cu::CUdeviceptr,
        src_offset: u64,
        dst: cu::CUdeviceptr,
        dst_offset: u64,
        size: u64,
    },
    FillBuffer {
        dst: cu::CUdeviceptr,
        offset: u64,
        size: u64,
        value: u8,
    },
}

#[derive(Debug)]
pub struct CommandBuffer {
    pub(crate) commands: Vec<Command>,
}

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
        self.commands.push(Command::CopyBufferToBuffer {
            src: src.ptr,
            src_offset,
            dst: dst.ptr,
            dst_offset,
            size,
        });
    }

    unsafe fn fill_buffer(&mut self, buffer: &Buffer, offset: u64, size: u64, value: u8) {
        self.commands.push(Command::FillBuffer {
            dst: buffer.ptr,
            offset,
            size,
            value,
        });
    }

    /// Images here are just device memory laid out mip-by-mip (see
    /// [`Image::mip_offsets`]), so a buffer/image copy is exactly the same
    /// `cuMemcpyDtoDAsync_v2` a buffer/buffer copy is, just with the image
    /// side's address computed as `ptr + mip_offsets[level]`.
    unsafe fn copy_buffer_to_image(&mut self, src: &Buffer, src_offset: u64, dst: &Image, mip_level: u32, size: u64) {
        self.commands.push(Command::CopyBufferToBuffer {
            src: src.ptr,
            src_offset,
            dst: dst.ptr + dst.mip_offsets[mip_level as usize],
            dst_offset: 0,
            size,
        });
    }

    unsafe fn copy_image_to_buffer(&mut self, src: &Image, mip_level: u32, dst: &Buffer, dst_offset: u64, size: u64) {
        self.commands.push(Command::CopyBufferToBuffer {
            src: src.ptr + src.mip_offsets[mip_level as usize],
            src_offset: 0,
            dst: dst.ptr,
            dst_offset,
            size,
        });
    }

    unsafe fn fill_image(&mut self, image: &Image, mip_level: u32, size: u64, value: u8) {
        self.commands.push(Command::FillBuffer {
            dst: image.ptr + image.mip_offsets[mip_level as usize],
            offset: 0,
            size,
            value,
        });
    }
}

pub(crate) fn cu_result(result: cu::CUresult) -> Result<(), crate::DeviceError> {
    if result == cu::CUresult::CUDA_SUCCESS {
        Ok(())
    } else {
        match result {
            cu::CUresult::CUDA_ERROR_OUT_OF_MEMORY => Err(crate::DeviceError::OutOfMemory),
            cu::CUresult::CUDA_ERROR_ILLEGAL_ADDRESS
            | cu::CUresult::CUDA_ERROR_ECC_UNCORRECTABLE => Err(crate::DeviceError::Lost),
            other => Err(crate::DeviceError::ResourceCreationFailed(format!(
                "{other:?}"
            ))),
        }
    }
}
