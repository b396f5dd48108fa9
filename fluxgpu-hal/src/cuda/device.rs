use cudarc::driver::sys as cu;
use fluxgpu_types::{mip_level_extent, BufferDescriptor, DeviceLimits, ImageDescriptor, MemoryFlags};

use super::{cu_result, Buffer, CommandEncoder, Fence, Image, Program};
use crate::DeviceError;

#[derive(Debug)]
pub struct Device {
    pub(crate) context: cu::CUcontext,
    pub(crate) device: cu::CUdevice,
    limits: DeviceLimits,
}

unsafe impl Send for Device {}
unsafe impl Sync for Device {}

impl Device {
    pub(crate) fn open(
        device: cu::CUdevice,
        limits: DeviceLimits,
    ) -> Result<(Self, super::Queue), DeviceError> {
        let mut context = std::ptr::null_mut();
        cu_result(unsafe { cu::cuCtxCreate_v2(&mut context, 0, device) })?;

        let mut stream = std::ptr::null_mut();
        cu_result(unsafe {
            cu::cuStreamCreate(&mut stream, cu::CUstream_flags::CU_STREAM_NON_BLOCKING as u32)
        })?;

        let dev = Self {
            context,
            device,
            limits,
        };
        let queue = super::Queue::new(context, stream);
        Ok((dev, queue))
    }

    /// Loads a PTX/cubin module produced by the FUBAR toolchain and resolves
    /// one kernel entry point out of it.
    pub fn create_shader_module(
        &self,
        module_image: &[u8],
        entry_point: &str,
    ) -> Result<Program, DeviceError> {
        cu_result(unsafe { cu::cuCtxSetCurrent(self.context) })?;

        let mut module = std::ptr::null_mut();
        cu_result(unsafe {
            cu::cuModuleLoadData(&mut module, module_image.as_ptr() as *const std::ffi::c_void)
        })?;

        let name = std::ffi::CString::new(entry_point)
            .map_err(|_| DeviceError::ResourceCreationFailed("entry point has embedded NUL".into()))?;
        let mut function = std::ptr::null_mut();
        cu_result(unsafe { cu::cuModuleGetFunction(&mut function, module, name.as_ptr()) })?;

        Ok(Program { module, function })
    }

    pub fn destroy_shader_module(&self, program: Program) {
        unsafe { cu::cuModuleUnload(program.module) };
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        unsafe { cu::cuCtxDestroy_v2(self.context) };
    }
}

impl crate::Device for Device {
    type A = super::Api;

    fn limits(&self) -> &DeviceLimits {
        &self.limits
    }

    unsafe fn create_buffer(&self, desc: &BufferDescriptor) -> Result<Buffer, DeviceError> {
        cu_result(cu::cuCtxSetCurrent(self.context))?;

        if desc.usage.intersects(MemoryFlags::HOST_VISIBLE | MemoryFlags::HOST_READ | MemoryFlags::HOST_WRITE) {
            let mut host_ptr = std::ptr::null_mut();
            cu_result(cu::cuMemHostAlloc(
                &mut host_ptr,
                (desc.size as usize).max(1),
                cu::CU_MEMHOSTALLOC_DEVICEMAP,
            ))?;
            let mut ptr = 0;
            cu_result(cu::cuMemHostGetDevicePointer_v2(&mut ptr, host_ptr, 0))?;
            Ok(Buffer {
                ptr,
                size: desc.size,
                host_ptr: Some(host_ptr),
            })
        } else {
            let mut ptr = 0;
            cu_result(cu::cuMemAlloc_v2(&mut ptr, (desc.size as usize).max(1)))?;
            Ok(Buffer {
                ptr,
                size: desc.size,
                host_ptr: None,
            })
        }
    }

    unsafe fn destroy_buffer(&self, buffer: Buffer) {
        match buffer.host_ptr {
            Some(host_ptr) => {
                cu::cuMemFreeHost(host_ptr);
            }
            None => {
                cu::cuMemFree_v2(buffer.ptr);
            }
        }
    }

    unsafe fn map_buffer(
        &self,
        buffer: &Buffer,
        offset: u64,
        size: u64,
    ) -> Result<crate::BufferMapping, DeviceError> {
        let host_ptr = buffer.host_ptr.ok_or_else(|| {
            DeviceError::Unsupported("buffer was not allocated host-visible (pinned)".into())
        })?;
        let ptr = (host_ptr as *mut u8).add(offset as usize);
        Ok(crate::BufferMapping {
            ptr: std::ptr::NonNull::new(ptr).expect("cuMemHostAlloc never returns null on success"),
            size,
        })
    }

    unsafe fn unmap_buffer(&self, _buffer: &Buffer) -> Result<(), DeviceError> {
        // Mapped via unified addressing; already coherent with the device.
        Ok(())
    }

    unsafe fn create_image(&self, desc: &ImageDescriptor) -> Result<Image, DeviceError> {
        // Linear device memory laid out mip-by-mip rather than a CUDA array
        // bound to a texture/surface object: sufficient for the buffer-like
        // read/write access this backend's image contract requires, without
        // committing to the texture-reference API's separate binding step.
        cu_result(cu::cuCtxSetCurrent(self.context))?;
        let bytes_per_texel = desc.format.bytes_per_texel() as u64;
        let levels = desc.resolved_mip_levels(self.limits.max_mip_levels);
        let mut mip_offsets = Vec::with_capacity(levels as usize);
        let mut total_size = 0u64;
        for level in 0..levels {
            mip_offsets.push(total_size);
            let w = mip_level_extent(desc.width, level) as u64;
            let h = mip_level_extent(desc.height.max(1), level) as u64;
            let d = mip_level_extent(desc.depth.max(1), level) as u64;
            let layers = desc.layers.max(1) as u64;
            let samples = desc.samples.max(1) as u64;
            total_size += w * h * d * layers * samples * bytes_per_texel;
        }

        let mut ptr = 0;
        cu_result(cu::cuMemAlloc_v2(&mut ptr, total_size as usize))?;
        Ok(Image {
            ptr,
            mip_offsets,
            total_size,
        })
    }

    unsafe fn destroy_image(&self, image: Image) {
        cu::cuMemFree_v2(image.ptr);
    }

    unsafe fn create_fence(&self, signalled: bool) -> Result<Fence, DeviceError> {
        Fence::new(signalled)
    }

    unsafe fn destroy_fence(&self, _fence: Fence) {}

    unsafe fn get_fence_value(&self, fence: &Fence) -> Result<crate::FenceValue, DeviceError> {
        Ok(fence.poll())
    }

    unsafe fn wait_for_fence(
        &self,
        fence: &Fence,
        value: crate::FenceValue,
        timeout_ms: Option<u32>,
    ) -> Result<bool, DeviceError> {
        match timeout_ms {
            // `cuEventSynchronize` has no timeout parameter; an indefinite
            // wait maps onto it directly.
            None => {
                fence.wait(value)?;
                Ok(true)
            }
            Some(ms) => {
                let deadline = std::time::Instant::now() + std::time::Duration::from_millis(ms as u64);
                while fence.poll() < value {
                    if std::time::Instant::now() >= deadline {
                        return Ok(false);
                    }
                    std::thread::yield_now();
                }
                Ok(true)
            }
        }
    }

    unsafe fn create_command_encoder(&self) -> Result<CommandEncoder, DeviceError> {
        Ok(CommandEncoder::default())
    }

    unsafe fn create_queue(&self) -> Result<super::Queue, DeviceError> {
        cu_result(unsafe { cu::cuCtxSetCurrent(self.context) })?;
        let mut stream = std::ptr::null_mut();
        cu_result(unsafe { cu::cuStreamCreate(&mut stream, cu::CUstream_flags::CU_STREAM_NON_BLOCKING as u32) })?;
        Ok(super::Queue::new(self.context, stream))
    }

    unsafe fn create_program(&self, payload: &[u8], entry_point: &str) -> Result<Program, DeviceError> {
        self.create_shader_module(payload, entry_point)
    }

    unsafe fn destroy_program(&self, program: Program) {
        self.destroy_shader_module(program)
    }
}
