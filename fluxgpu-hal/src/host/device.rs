use parking_lot::Mutex;

use fluxgpu_types::{mip_level_extent, BufferDescriptor, DeviceLimits, ImageDescriptor};

use super::{Buffer, CommandEncoder, Fence, Image, Program};
use crate::DeviceError;

#[derive(Debug)]
pub struct Device {
    limits: DeviceLimits,
}

impl Device {
    pub(crate) fn new(limits: DeviceLimits) -> Self {
        Self { limits }
    }

    /// Registers a host-executable entry point under `desc`'s FUBAR-reported
    /// name. Real toolchains compile a kernel string; the host backend only
    /// needs the name to exist so `fluxgpu-core::program` can resolve it.
    pub fn create_shader_module(&self, entry_point: &str) -> Result<Program, DeviceError> {
        Ok(Program {
            entry_point: entry_point.to_string(),
        })
    }

    pub fn destroy_shader_module(&self, _program: Program) {}
}

impl crate::Device for Device {
    type A = super::Api;

    fn limits(&self) -> &DeviceLimits {
        &self.limits
    }

    unsafe fn create_buffer(&self, desc: &BufferDescriptor) -> Result<Buffer, DeviceError> {
        if desc.size > self.limits.max_mem_alloc {
            return Err(DeviceError::OutOfMemory);
        }
        Ok(Buffer {
            data: Mutex::new(vec![0u8; desc.size as usize]),
            mapping: Mutex::new(None),
        })
    }

    unsafe fn destroy_buffer(&self, _buffer: Buffer) {}

    unsafe fn map_buffer(
        &self,
        buffer: &Buffer,
        offset: u64,
        size: u64,
    ) -> Result<crate::BufferMapping, DeviceError> {
        let (offset, size) = (offset as usize, size as usize);
        let mut chunk = buffer.data.lock()[offset..offset + size].to_vec();
        let ptr = chunk.as_mut_ptr();
        let len = chunk.len();
        std::mem::forget(chunk);
        *buffer.mapping.lock() = Some(super::HostMapping { ptr, len, offset });
        Ok(crate::BufferMapping {
            ptr: std::ptr::NonNull::new(ptr).expect("leaked allocation is never null"),
            size: len as u64,
        })
    }

    unsafe fn unmap_buffer(&self, buffer: &Buffer) -> Result<(), DeviceError> {
        if let Some(mapping) = buffer.mapping.lock().take() {
            let chunk = Vec::from_raw_parts(mapping.ptr, mapping.len, mapping.len);
            buffer.data.lock()[mapping.offset..mapping.offset + mapping.len].copy_from_slice(&chunk);
        }
        Ok(())
    }

    unsafe fn create_image(&self, desc: &ImageDescriptor) -> Result<Image, DeviceError> {
        let bytes_per_texel = desc.format.bytes_per_texel() as usize;
        let levels = desc.resolved_mip_levels(self.limits.max_mip_levels);
        let mip_levels = (0..levels)
            .map(|level| {
                let w = mip_level_extent(desc.width, level) as usize;
                let h = mip_level_extent(desc.height.max(1), level) as usize;
                let d = mip_level_extent(desc.depth.max(1), level) as usize;
                let layers = desc.layers.max(1) as usize;
                let samples = desc.samples.max(1) as usize;
                Mutex::new(vec![0u8; w * h * d * layers * samples * bytes_per_texel])
            })
            .collect();

        Ok(Image {
            format: desc.format,
            base_extent: (desc.width, desc.height.max(1), desc.depth.max(1)),
            mip_levels,
        })
    }

    unsafe fn destroy_image(&self, _image: Image) {}

    unsafe fn create_fence(&self, signalled: bool) -> Result<Fence, DeviceError> {
        Ok(Fence::new(signalled))
    }

    unsafe fn destroy_fence(&self, _fence: Fence) {}

    unsafe fn get_fence_value(&self, fence: &Fence) -> Result<crate::FenceValue, DeviceError> {
        Ok(fence.value())
    }

    unsafe fn wait_for_fence(
        &self,
        fence: &Fence,
        value: crate::FenceValue,
        _timeout_ms: Option<u32>,
    ) -> Result<bool, DeviceError> {
        // Submission already ran to completion by the time a fence is
        // signalled (see `queue.rs`), so there is never an actual wait: the
        // value has either already been reached or never will be.
        Ok(fence.value() >= value)
    }

    unsafe fn create_command_encoder(&self) -> Result<CommandEncoder, DeviceError> {
        Ok(CommandEncoder::default())
    }

    unsafe fn create_queue(&self) -> Result<super::Queue, DeviceError> {
        Ok(super::Queue::new())
    }

    unsafe fn create_program(&self, _payload: &[u8], entry_point: &str) -> Result<Program, DeviceError> {
        self.create_shader_module(entry_point)
    }

    unsafe fn destroy_program(&self, program: Program) {
        self.destroy_shader_module(program)
    }
}
