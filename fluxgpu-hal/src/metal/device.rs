use fluxgpu_types::{
    BufferDescriptor, DeviceLimits, ImageChannelLayout, ImageDataType, ImageDescriptor, ImageDim,
    ImageTypeFlags, MemoryFlags,
};

use super::{Buffer, CommandEncoder, Fence, Image, Program};
use crate::DeviceError;

#[derive(Debug)]
pub struct DeviceShared {
    pub(crate) raw: metal::Device,
    pub(crate) command_queue: metal::CommandQueue,
}

#[derive(Debug)]
pub struct Device {
    pub(crate) shared: std::sync::Arc<DeviceShared>,
    pub(crate) limits: DeviceLimits,
}

unsafe impl Send for DeviceShared {}
unsafe impl Sync for DeviceShared {}

impl Device {
    /// Resolves a compiled `.metallib` function by name, the Metal leg of
    /// `fluxgpu-core::program`'s FUBAR loader.
    pub fn create_shader_module(
        &self,
        library_bytes: &[u8],
        entry_point: &str,
    ) -> Result<Program, DeviceError> {
        let library = self
            .shared
            .raw
            .new_library_with_data(library_bytes)
            .map_err(|e| DeviceError::ResourceCreationFailed(e.to_string()))?;
        let function = library
            .get_function(entry_point, None)
            .map_err(|e| DeviceError::ResourceCreationFailed(e.to_string()))?;
        Ok(Program { function })
    }

    pub fn destroy_shader_module(&self, _program: Program) {}
}

fn resource_options_for(usage: MemoryFlags) -> metal::MTLResourceOptions {
    let mut options = metal::MTLResourceOptions::empty();
    if usage.contains(MemoryFlags::HOST_VISIBLE) || usage.contains(MemoryFlags::HOST_COHERENT) {
        options |= metal::MTLResourceOptions::StorageModeShared;
    } else {
        options |= metal::MTLResourceOptions::StorageModePrivate;
    }
    options
}

pub(crate) fn conv_pixel_format(
    layout: ImageChannelLayout,
    data_type: ImageDataType,
    bits_per_channel: u8,
) -> metal::MTLPixelFormat {
    use metal::MTLPixelFormat::*;
    match (layout, data_type, bits_per_channel) {
        (ImageChannelLayout::Rgba, ImageDataType::UnsignedNormalized, 8) => RGBA8Unorm,
        (ImageChannelLayout::Rgba, ImageDataType::Float, 16) => RGBA16Float,
        (ImageChannelLayout::Rgba, ImageDataType::Float, 32) => RGBA32Float,
        (ImageChannelLayout::Rgba, ImageDataType::UnsignedInt, 8) => RGBA8Uint,
        (ImageChannelLayout::R, ImageDataType::Float, 32) => R32Float,
        (ImageChannelLayout::R, ImageDataType::UnsignedNormalized, 8) => R8Unorm,
        _ => RGBA8Unorm,
    }
}

impl crate::Device for Device {
    type A = super::Api;

    fn limits(&self) -> &DeviceLimits {
        &self.limits
    }

    unsafe fn create_buffer(&self, desc: &BufferDescriptor) -> Result<Buffer, DeviceError> {
        let options = resource_options_for(desc.usage);
        let raw = self.shared.raw.new_buffer(desc.size, options);
        if let Some(label) = &desc.label {
            raw.set_label(label);
        }
        let host_visible = options.contains(metal::MTLResourceOptions::StorageModeShared);
        Ok(Buffer {
            raw,
            size: desc.size,
            host_visible,
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
                "buffer was not allocated with shared storage mode".into(),
            ));
        }
        let base = buffer.raw.contents() as *mut u8;
        let ptr = base.add(offset as usize);
        Ok(crate::BufferMapping {
            ptr: std::ptr::NonNull::new(ptr).expect("MTLBuffer::contents() never returns null"),
            size,
        })
    }

    unsafe fn unmap_buffer(&self, _buffer: &Buffer) -> Result<(), DeviceError> {
        // Shared-storage buffers are coherent with the CPU cache already;
        // nothing to flush.
        Ok(())
    }

    unsafe fn create_image(&self, desc: &ImageDescriptor) -> Result<Image, DeviceError> {
        let descriptor = metal::TextureDescriptor::new();
        descriptor.set_pixel_format(conv_pixel_format(
            desc.format.channel_layout,
            desc.format.data_type,
            desc.format.bits_per_channel,
        ));
        let texture_type = match (desc.format.dim, desc.format.is_array(), desc.format.is_cube()) {
            (_, _, true) => metal::MTLTextureType::Cube,
            (ImageDim::D1, false, _) => metal::MTLTextureType::D1,
            (ImageDim::D1, true, _) => metal::MTLTextureType::D1Array,
            (ImageDim::D2, false, _) if desc.samples > 1 => metal::MTLTextureType::D2Multisample,
            (ImageDim::D2, false, _) => metal::MTLTextureType::D2,
            (ImageDim::D2, true, _) => metal::MTLTextureType::D2Array,
            (ImageDim::D3, _, _) => metal::MTLTextureType::D3,
        };
        descriptor.set_texture_type(texture_type);
        descriptor.set_width(desc.width as u64);
        descriptor.set_height(desc.height.max(1) as u64);
        descriptor.set_depth(desc.depth.max(1) as u64);
        descriptor.set_array_length(desc.layers.max(1) as u64);
        descriptor.set_sample_count(desc.samples.max(1) as u64);
        let mip_levels = desc.resolved_mip_levels(self.limits.max_mip_levels);
        descriptor.set_mipmap_level_count(mip_levels as u64);

        let mut usage = metal::MTLTextureUsage::ShaderRead;
        if desc.usage.contains(MemoryFlags::RENDER_TARGET) {
            usage |= metal::MTLTextureUsage::RenderTarget;
        }
        if desc.format.flags.contains(ImageTypeFlags::READ_WRITE) {
            usage |= metal::MTLTextureUsage::ShaderWrite;
        }
        descriptor.set_usage(usage);

        let raw = self.shared.raw.new_texture(&descriptor);
        if let Some(label) = &desc.label {
            raw.set_label(label);
        }
        Ok(Image {
            raw,
            mip_levels,
            extent: (desc.width, desc.height.max(1), desc.depth.max(1)),
            bytes_per_texel: desc.format.bytes_per_texel() as u32,
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
        timeout_ms: Option<u32>,
    ) -> Result<bool, DeviceError> {
        let deadline = timeout_ms.map(|ms| std::time::Instant::now() + std::time::Duration::from_millis(ms as u64));
        loop {
            if fence.value() >= value {
                return Ok(true);
            }
            if let Some(deadline) = deadline {
                if std::time::Instant::now() >= deadline {
                    return Ok(false);
                }
            }
            std::thread::yield_now();
        }
    }

    unsafe fn create_command_encoder(&self) -> Result<CommandEncoder, DeviceError> {
        Ok(CommandEncoder {
            device: std::sync::Arc::clone(&self.shared),
            active: None,
        })
    }

    unsafe fn create_queue(&self) -> Result<super::Queue, DeviceError> {
        let raw = self.shared.raw.new_command_queue();
        Ok(super::Queue::new(std::sync::Arc::clone(&self.shared), raw))
    }

    unsafe fn create_program(&self, payload: &[u8], entry_point: &str) -> Result<Program, DeviceError> {
        self.create_shader_module(payload, entry_point)
    }

    unsafe fn destroy_program(&self, program: Program) {
        self.destroy_shader_module(program)
    }
}

impl crate::CommandEncoder for CommandEncoder {
    type A = super::Api;
    type CommandBuffer = super::CommandBuffer;

    unsafe fn begin_encoding(&mut self, label: Option<&str>) -> Result<(), DeviceError> {
        let command_buffer = self.device.command_queue.new_command_buffer().to_owned();
        if let Some(label) = label {
            command_buffer.set_label(label);
        }
        self.active = Some(command_buffer);
        Ok(())
    }

    unsafe fn end_encoding(&mut self) -> Result<super::CommandBuffer, DeviceError> {
        let raw = self.active.take().expect("end_encoding without begin_encoding");
        Ok(super::CommandBuffer { raw })
    }

    unsafe fn copy_buffer_to_buffer(
        &mut self,
        src: &Buffer,
        src_offset: u64,
        dst: &Buffer,
        dst_offset: u64,
        size: u64,
    ) {
        let command_buffer = self.active.as_ref().expect("copy recorded outside begin/end_encoding");
        let blit = command_buffer.new_blit_command_encoder();
        blit.copy_from_buffer(&src.raw, src_offset, &dst.raw, dst_offset, size);
        blit.end_encoding();
    }

    unsafe fn fill_buffer(&mut self, buffer: &Buffer, offset: u64, size: u64, value: u8) {
        let command_buffer = self.active.as_ref().expect("fill recorded outside begin/end_encoding");
        let blit = command_buffer.new_blit_command_encoder();
        blit.fill_buffer(&buffer.raw, metal::NSRange::new(offset, size), value);
        blit.end_encoding();
    }

    unsafe fn copy_buffer_to_image(&mut self, src: &Buffer, src_offset: u64, dst: &Image, mip_level: u32, _size: u64) {
        let command_buffer = self.active.as_ref().expect("copy recorded outside begin/end_encoding");
        let blit = command_buffer.new_blit_command_encoder();
        let (w, h, d) = mip_extent(dst.extent, mip_level);
        let bytes_per_row = w as u64 * dst.bytes_per_texel as u64;
        let bytes_per_image = bytes_per_row * h as u64;
        blit.copy_from_buffer_to_texture(
            &src.raw,
            src_offset,
            bytes_per_row,
            bytes_per_image,
            metal::MTLSize::new(w as u64, h as u64, d as u64),
            &dst.raw,
            0,
            mip_level as u64,
            metal::MTLOrigin::new(0, 0, 0),
            metal::MTLBlitOption::empty(),
        );
        blit.end_encoding();
    }

    unsafe fn copy_image_to_buffer(&mut self, src: &Image, mip_level: u32, dst: &Buffer, dst_offset: u64, _size: u64) {
        let command_buffer = self.active.as_ref().expect("copy recorded outside begin/end_encoding");
        let blit = command_buffer.new_blit_command_encoder();
        let (w, h, d) = mip_extent(src.extent, mip_level);
        let bytes_per_row = w as u64 * src.bytes_per_texel as u64;
        let bytes_per_image = bytes_per_row * h as u64;
        blit.copy_from_texture_to_buffer(
            &src.raw,
            0,
            mip_level as u64,
            metal::MTLOrigin::new(0, 0, 0),
            metal::MTLSize::new(w as u64, h as u64, d as u64),
            &dst.raw,
            dst_offset,
            bytes_per_row,
            bytes_per_image,
            metal::MTLBlitOption::empty(),
        );
        blit.end_encoding();
    }

    /// No texture-fill primitive exists on `MTLBlitCommandEncoder`; stage
    /// through a shared-storage scratch buffer filled the same way
    /// `fill_buffer` fills a real buffer, then blit it into the mip level.
    unsafe fn fill_image(&mut self, image: &Image, mip_level: u32, size: u64, value: u8) {
        let command_buffer = self.active.as_ref().expect("fill recorded outside begin/end_encoding");
        let staging = self
            .device
            .raw
            .new_buffer(size, metal::MTLResourceOptions::StorageModeShared);
        let blit = command_buffer.new_blit_command_encoder();
        blit.fill_buffer(&staging, metal::NSRange::new(0, size), value);
        let (w, h, d) = mip_extent(image.extent, mip_level);
        let bytes_per_row = w as u64 * image.bytes_per_texel as u64;
        let bytes_per_image = bytes_per_row * h as u64;
        blit.copy_from_buffer_to_texture(
            &staging,
            0,
            bytes_per_row,
            bytes_per_image,
            metal::MTLSize::new(w as u64, h as u64, d as u64),
            &image.raw,
            0,
            mip_level as u64,
            metal::MTLOrigin::new(0, 0, 0),
            metal::MTLBlitOption::empty(),
        );
        blit.end_encoding();
    }
}

fn mip_extent(base: (u32, u32, u32), level: u32) -> (u32, u32, u32) {
    (
        fluxgpu_types::mip_level_extent(base.0, level),
        fluxgpu_types::mip_level_extent(base.1, level),
        fluxgpu_types::mip_level_extent(base.2, level),
    )
}
