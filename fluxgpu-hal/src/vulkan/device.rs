use std::sync::Arc;

use ash::{extensions::khr, vk};
use fluxgpu_types::{BufferDescriptor, DeviceLimits, ImageDescriptor, MemoryFlags};
use parking_lot::Mutex;

use super::{fence::Fence, Buffer, CommandBuffer, CommandEncoder, Image, Program};
use crate::{DeviceError, ExtensionFn};

/// State shared between a `Device` and every `CommandEncoder`/`Queue`
/// created from it; kept behind an `Arc` so command encoders can outlive a
/// borrow of the `Device` that created them, matching how `wgpu-hal`'s
/// Vulkan backend threads its `DeviceShared` through submission-adjacent
/// types.
#[derive(Debug)]
pub struct DeviceShared {
    pub(crate) raw: ash::Device,
    pub(crate) physical_device: vk::PhysicalDevice,
    pub(crate) instance: ash::Instance,
    pub(crate) queue_family_index: u32,
    pub(crate) timeline_semaphore_ext: Option<ExtensionFn<khr::TimelineSemaphore>>,
    pub(crate) memory_properties: vk::PhysicalDeviceMemoryProperties,
}

#[derive(Debug)]
pub struct Device {
    pub(crate) shared: Arc<DeviceShared>,
    pub(crate) limits: DeviceLimits,
    /// Command pools are not externally synchronized in Vulkan; encoders
    /// share one pool per device behind a lock, as `wgpu-hal`'s Vulkan
    /// backend does for its single-threaded recording path.
    pub(crate) command_pool: Mutex<vk::CommandPool>,
}

impl DeviceShared {
    fn find_memory_type(&self, type_bits: u32, flags: vk::MemoryPropertyFlags) -> Option<u32> {
        (0..self.memory_properties.memory_type_count).find(|&i| {
            let suitable = (type_bits & (1 << i)) != 0;
            let supports = self.memory_properties.memory_types[i as usize]
                .property_flags
                .contains(flags);
            suitable && supports
        })
    }

    fn allocate_for(
        &self,
        requirements: vk::MemoryRequirements,
        usage: MemoryFlags,
    ) -> Result<vk::DeviceMemory, DeviceError> {
        let wants_host_visible = usage.intersects(MemoryFlags::HOST_VISIBLE | MemoryFlags::HOST_READ | MemoryFlags::HOST_WRITE);
        let mut property_flags = if wants_host_visible {
            vk::MemoryPropertyFlags::HOST_VISIBLE
        } else {
            vk::MemoryPropertyFlags::DEVICE_LOCAL
        };
        if wants_host_visible && usage.contains(MemoryFlags::HOST_COHERENT) {
            property_flags |= vk::MemoryPropertyFlags::HOST_COHERENT;
        }

        let type_index = self
            .find_memory_type(requirements.memory_type_bits, property_flags)
            .or_else(|| {
                self.find_memory_type(requirements.memory_type_bits, vk::MemoryPropertyFlags::empty())
            })
            .ok_or(DeviceError::Unsupported(
                "no compatible Vulkan memory type for requested usage".into(),
            ))?;

        let info = vk::MemoryAllocateInfo::builder()
            .allocation_size(requirements.size)
            .memory_type_index(type_index);
        unsafe { self.raw.allocate_memory(&info, None).map_err(Into::into) }
    }
}

impl crate::Device for Device {
    type A = super::Api;

    fn limits(&self) -> &DeviceLimits {
        &self.limits
    }

    unsafe fn create_buffer(&self, desc: &BufferDescriptor) -> Result<Buffer, DeviceError> {
        let mut usage = vk::BufferUsageFlags::empty();
        if desc.usage.contains(MemoryFlags::COPY_SRC) {
            usage |= vk::BufferUsageFlags::TRANSFER_SRC;
        }
        if desc.usage.contains(MemoryFlags::COPY_DST) {
            usage |= vk::BufferUsageFlags::TRANSFER_DST;
        }
        if desc.usage.contains(MemoryFlags::VERTEX_BUFFER) {
            usage |= vk::BufferUsageFlags::VERTEX_BUFFER;
        }
        if desc.usage.contains(MemoryFlags::INDIRECT) {
            usage |= vk::BufferUsageFlags::INDIRECT_BUFFER;
        }
        // Every buffer may be bound as a storage buffer for a kernel launch.
        usage |= vk::BufferUsageFlags::STORAGE_BUFFER;

        let info = vk::BufferCreateInfo::builder()
            .size(desc.size.max(1))
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let raw = self.shared.raw.create_buffer(&info, None)?;
        let requirements = self.shared.raw.get_buffer_memory_requirements(raw);
        let memory = match self.shared.allocate_for(requirements, desc.usage) {
            Ok(memory) => memory,
            Err(err) => {
                self.shared.raw.destroy_buffer(raw, None);
                return Err(err);
            }
        };
        self.shared.raw.bind_buffer_memory(raw, memory, 0)?;

        let host_visible = desc
            .usage
            .intersects(MemoryFlags::HOST_VISIBLE | MemoryFlags::HOST_READ | MemoryFlags::HOST_WRITE);

        Ok(Buffer {
            raw,
            memory,
            size: desc.size,
            host_visible,
        })
    }

    unsafe fn destroy_buffer(&self, buffer: Buffer) {
        self.shared.raw.destroy_buffer(buffer.raw, None);
        self.shared.raw.free_memory(buffer.memory, None);
    }

    unsafe fn map_buffer(
        &self,
        buffer: &Buffer,
        offset: u64,
        size: u64,
    ) -> Result<crate::BufferMapping, DeviceError> {
        if !buffer.host_visible {
            return Err(DeviceError::Unsupported(
                "buffer was not allocated host-visible".into(),
            ));
        }
        let ptr = self
            .shared
            .raw
            .map_memory(buffer.memory, offset, size, vk::MemoryMapFlags::empty())?;
        Ok(crate::BufferMapping {
            ptr: std::ptr::NonNull::new(ptr as *mut u8)
                .expect("vkMapMemory never returns null on success"),
            size,
        })
    }

    unsafe fn unmap_buffer(&self, buffer: &Buffer) -> Result<(), DeviceError> {
        self.shared.raw.unmap_memory(buffer.memory);
        Ok(())
    }

    unsafe fn create_image(&self, desc: &ImageDescriptor) -> Result<Image, DeviceError> {
        let extent = vk::Extent3D {
            width: desc.width.max(1),
            height: desc.height.max(1),
            depth: desc.depth.max(1),
        };
        let mip_levels = desc.resolved_mip_levels(self.limits.max_mip_levels);

        let image_type = match desc.format.dim {
            fluxgpu_types::ImageDim::D1 => vk::ImageType::TYPE_1D,
            fluxgpu_types::ImageDim::D2 => vk::ImageType::TYPE_2D,
            fluxgpu_types::ImageDim::D3 => vk::ImageType::TYPE_3D,
        };
        let format = conv_image_format(desc.format);

        let mut usage = vk::ImageUsageFlags::SAMPLED | vk::ImageUsageFlags::STORAGE;
        if desc.usage.contains(MemoryFlags::COPY_SRC) {
            usage |= vk::ImageUsageFlags::TRANSFER_SRC;
        }
        if desc.usage.contains(MemoryFlags::COPY_DST) {
            usage |= vk::ImageUsageFlags::TRANSFER_DST;
        }
        if desc.usage.contains(MemoryFlags::RENDER_TARGET) {
            usage |= if desc.format.is_depth() {
                vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT
            } else {
                vk::ImageUsageFlags::COLOR_ATTACHMENT
            };
        }

        let info = vk::ImageCreateInfo::builder()
            .image_type(image_type)
            .format(format)
            .extent(extent)
            .mip_levels(mip_levels)
            .array_layers(desc.layers.max(1))
            .samples(sample_count(desc.samples))
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);

        let raw = self.shared.raw.create_image(&info, None)?;
        let requirements = self.shared.raw.get_image_memory_requirements(raw);
        let memory = match self
            .shared
            .allocate_for(requirements, MemoryFlags::DEVICE_LOCAL)
        {
            Ok(memory) => memory,
            Err(err) => {
                self.shared.raw.destroy_image(raw, None);
                return Err(err);
            }
        };
        self.shared.raw.bind_image_memory(raw, memory, 0)?;

        let view_type = match (desc.format.dim, desc.format.is_array(), desc.format.is_cube()) {
            (fluxgpu_types::ImageDim::D1, false, _) => vk::ImageViewType::TYPE_1D,
            (fluxgpu_types::ImageDim::D1, true, _) => vk::ImageViewType::TYPE_1D_ARRAY,
            (fluxgpu_types::ImageDim::D2, false, false) => vk::ImageViewType::TYPE_2D,
            (fluxgpu_types::ImageDim::D2, true, false) => vk::ImageViewType::TYPE_2D_ARRAY,
            (fluxgpu_types::ImageDim::D2, false, true) => vk::ImageViewType::CUBE,
            (fluxgpu_types::ImageDim::D2, true, true) => vk::ImageViewType::CUBE_ARRAY,
            (fluxgpu_types::ImageDim::D3, _, _) => vk::ImageViewType::TYPE_3D,
        };
        let aspect = if desc.format.is_depth() {
            vk::ImageAspectFlags::DEPTH
        } else {
            vk::ImageAspectFlags::COLOR
        };
        let view_info = vk::ImageViewCreateInfo::builder()
            .image(raw)
            .view_type(view_type)
            .format(format)
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: aspect,
                base_mip_level: 0,
                level_count: mip_levels,
                base_array_layer: 0,
                layer_count: desc.layers.max(1),
            });
        let view = match self.shared.raw.create_image_view(&view_info, None) {
            Ok(view) => view,
            Err(err) => {
                self.shared.raw.destroy_image(raw, None);
                self.shared.raw.free_memory(memory, None);
                return Err(err.into());
            }
        };

        Ok(Image {
            raw,
            memory,
            view,
            extent,
            mip_levels,
            aspect,
        })
    }

    unsafe fn destroy_image(&self, image: Image) {
        self.shared.raw.destroy_image_view(image.view, None);
        self.shared.raw.destroy_image(image.raw, None);
        self.shared.raw.free_memory(image.memory, None);
    }

    unsafe fn create_fence(&self, signalled: bool) -> Result<Fence, DeviceError> {
        if let Some(ref ext) = self.shared.timeline_semaphore_ext {
            let mut type_info = vk::SemaphoreTypeCreateInfo::builder()
                .semaphore_type(vk::SemaphoreType::TIMELINE)
                .initial_value(if signalled { 1 } else { 0 });
            let info = vk::SemaphoreCreateInfo::builder().push_next(&mut type_info);
            let raw = self.shared.raw.create_semaphore(&info, None)?;
            let _ = ext;
            Ok(Fence::TimelineSemaphore(raw))
        } else {
            Ok(Fence::FencePool {
                last_completed: if signalled { 1 } else { 0 },
                active: Vec::new(),
                free: Vec::new(),
            })
        }
    }

    unsafe fn destroy_fence(&self, fence: Fence) {
        match fence {
            Fence::TimelineSemaphore(raw) => self.shared.raw.destroy_semaphore(raw, None),
            Fence::FencePool { active, free, .. } => {
                for (_, raw) in active {
                    self.shared.raw.destroy_fence(raw, None);
                }
                for raw in free {
                    self.shared.raw.destroy_fence(raw, None);
                }
            }
        }
    }

    unsafe fn get_fence_value(&self, fence: &Fence) -> Result<crate::FenceValue, DeviceError> {
        fence.get_latest(&self.shared.raw, self.shared.timeline_semaphore_ext.as_ref())
    }

    unsafe fn wait_for_fence(
        &self,
        fence: &Fence,
        value: crate::FenceValue,
        timeout_ms: Option<u32>,
    ) -> Result<bool, DeviceError> {
        let timeout_ns = timeout_ms.map_or(u64::MAX, |ms| ms as u64 * super::MILLIS_TO_NANOS);
        fence.wait(
            &self.shared.raw,
            self.shared.timeline_semaphore_ext.as_ref(),
            value,
            timeout_ns,
        )
    }

    unsafe fn create_command_encoder(&self) -> Result<CommandEncoder, DeviceError> {
        Ok(CommandEncoder {
            device: Arc::clone(&self.shared),
            pool: *self.command_pool.lock(),
            active: None,
        })
    }

    unsafe fn create_queue(&self) -> Result<super::Queue, DeviceError> {
        let raw = self.shared.raw.get_device_queue(self.shared.queue_family_index, 0);
        Ok(super::Queue::new(Arc::clone(&self.shared), raw))
    }

    unsafe fn create_program(&self, payload: &[u8], entry_point: &str) -> Result<Program, DeviceError> {
        if payload.len() % 4 != 0 {
            return Err(DeviceError::ResourceCreationFailed("SPIR-V payload is not a multiple of 4 bytes".into()));
        }
        let words: Vec<u32> = payload
            .chunks_exact(4)
            .map(|c| u32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        self.create_shader_module(&words, entry_point)
    }

    unsafe fn destroy_program(&self, program: Program) {
        self.destroy_shader_module(program)
    }
}

impl crate::CommandEncoder for CommandEncoder {
    type A = super::Api;
    type CommandBuffer = CommandBuffer;

    unsafe fn begin_encoding(&mut self, label: Option<&str>) -> Result<(), DeviceError> {
        let alloc_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(self.pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);
        let buffers = self.device.raw.allocate_command_buffers(&alloc_info)?;
        let raw = buffers[0];
        let begin_info = vk::CommandBufferBeginInfo::builder()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        self.device.raw.begin_command_buffer(raw, &begin_info)?;
        if let Some(label) = label {
            log::trace!("vulkan: begin command buffer {label:?}");
        }
        self.active = Some(raw);
        Ok(())
    }

    unsafe fn end_encoding(&mut self) -> Result<CommandBuffer, DeviceError> {
        let raw = self
            .active
            .take()
            .expect("end_encoding called without a matching begin_encoding");
        self.device.raw.end_command_buffer(raw)?;
        Ok(CommandBuffer { raw })
    }

    unsafe fn copy_buffer_to_buffer(
        &mut self,
        src: &Buffer,
        src_offset: u64,
        dst: &Buffer,
        dst_offset: u64,
        size: u64,
    ) {
        let region = vk::BufferCopy {
            src_offset,
            dst_offset,
            size,
        };
        let raw = self.active.expect("copy recorded outside begin/end_encoding");
        self.device
            .raw
            .cmd_copy_buffer(raw, src.raw, dst.raw, &[region]);
    }

    unsafe fn fill_buffer(&mut self, buffer: &Buffer, offset: u64, size: u64, value: u8) {
        // vkCmdFillBuffer only takes a 4-byte word; splat `value` across it,
        // matching the semantics of a byte-wise memset for any `value`.
        let word = u32::from_ne_bytes([value; 4]);
        let raw = self.active.expect("fill recorded outside begin/end_encoding");
        self.device.raw.cmd_fill_buffer(raw, buffer.raw, offset, size, word);
    }

    unsafe fn copy_buffer_to_image(&mut self, src: &Buffer, src_offset: u64, dst: &Image, mip_level: u32, _size: u64) {
        let raw = self.active.expect("copy recorded outside begin/end_encoding");
        let device = &self.device.raw;
        transition_for_copy(device, raw, dst, mip_level, vk::ImageLayout::TRANSFER_DST_OPTIMAL, vk::AccessFlags::TRANSFER_WRITE);
        let region = vk::BufferImageCopy::builder()
            .buffer_offset(src_offset)
            .image_subresource(vk::ImageSubresourceLayers {
                aspect_mask: dst.aspect,
                mip_level,
                base_array_layer: 0,
                layer_count: 1,
            })
            .image_extent(mip_extent(dst.extent, mip_level));
        device.cmd_copy_buffer_to_image(raw, src.raw, dst.raw, vk::ImageLayout::TRANSFER_DST_OPTIMAL, &[region.build()]);
    }

    unsafe fn copy_image_to_buffer(&mut self, src: &Image, mip_level: u32, dst: &Buffer, dst_offset: u64, _size: u64) {
        let raw = self.active.expect("copy recorded outside begin/end_encoding");
        let device = &self.device.raw;
        transition_for_copy(device, raw, src, mip_level, vk::ImageLayout::TRANSFER_SRC_OPTIMAL, vk::AccessFlags::TRANSFER_READ);
        let region = vk::BufferImageCopy::builder()
            .buffer_offset(dst_offset)
            .image_subresource(vk::ImageSubresourceLayers {
                aspect_mask: src.aspect,
                mip_level,
                base_array_layer: 0,
                layer_count: 1,
            })
            .image_extent(mip_extent(src.extent, mip_level));
        device.cmd_copy_image_to_buffer(raw, src.raw, vk::ImageLayout::TRANSFER_SRC_OPTIMAL, dst.raw, &[region.build()]);
    }

    unsafe fn fill_image(&mut self, image: &Image, mip_level: u32, _size: u64, value: u8) {
        let raw = self.active.expect("fill recorded outside begin/end_encoding");
        let device = &self.device.raw;
        transition_for_copy(device, raw, image, mip_level, vk::ImageLayout::TRANSFER_DST_OPTIMAL, vk::AccessFlags::TRANSFER_WRITE);
        let color = vk::ClearColorValue {
            float32: [value as f32 / 255.0; 4],
        };
        let range = vk::ImageSubresourceRange {
            aspect_mask: image.aspect,
            base_mip_level: mip_level,
            level_count: 1,
            base_array_layer: 0,
            layer_count: 1,
        };
        device.cmd_clear_color_image(raw, image.raw, vk::ImageLayout::TRANSFER_DST_OPTIMAL, &color, &[range]);
    }
}

/// Discards whatever the image's mip level currently holds and transitions
/// it straight from `UNDEFINED` into a transfer layout. Correct for the
/// upload/zero paths this backend's image contract uses; a real readback
/// after rendering would need the true current layout tracked, which this
/// HAL layer leaves to `fluxgpu-core::image` (see its `current_layout`
/// field) and does not yet feed back into this barrier.
unsafe fn transition_for_copy(
    device: &ash::Device,
    cmd: vk::CommandBuffer,
    image: &Image,
    mip_level: u32,
    new_layout: vk::ImageLayout,
    dst_access: vk::AccessFlags,
) {
    let barrier = vk::ImageMemoryBarrier::builder()
        .old_layout(vk::ImageLayout::UNDEFINED)
        .new_layout(new_layout)
        .src_access_mask(vk::AccessFlags::empty())
        .dst_access_mask(dst_access)
        .image(image.raw)
        .subresource_range(vk::ImageSubresourceRange {
            aspect_mask: image.aspect,
            base_mip_level: mip_level,
            level_count: 1,
            base_array_layer: 0,
            layer_count: 1,
        });
    device.cmd_pipeline_barrier(
        cmd,
        vk::PipelineStageFlags::TOP_OF_PIPE,
        vk::PipelineStageFlags::TRANSFER,
        vk::DependencyFlags::empty(),
        &[],
        &[],
        &[barrier.build()],
    );
}

fn mip_extent(base: vk::Extent3D, level: u32) -> vk::Extent3D {
    vk::Extent3D {
        width: fluxgpu_types::mip_level_extent(base.width, level),
        height: fluxgpu_types::mip_level_extent(base.height, level),
        depth: fluxgpu_types::mip_level_extent(base.depth, level),
    }
}

fn sample_count(samples: u32) -> vk::SampleCountFlags {
    match samples {
        1 => vk::SampleCountFlags::TYPE_1,
        2 => vk::SampleCountFlags::TYPE_2,
        4 => vk::SampleCountFlags::TYPE_4,
        8 => vk::SampleCountFlags::TYPE_8,
        16 => vk::SampleCountFlags::TYPE_16,
        _ => vk::SampleCountFlags::TYPE_1,
    }
}

fn conv_image_format(ty: fluxgpu_types::ImageType) -> vk::Format {
    use fluxgpu_types::{ImageChannelLayout as L, ImageDataType as D};
    match (ty.channel_layout, ty.bits_per_channel, ty.data_type) {
        (L::Rgba, 8, D::UnsignedNormalized) => vk::Format::R8G8B8A8_UNORM,
        (L::Rgba, 8, D::Float) => vk::Format::R8G8B8A8_UNORM,
        (L::Rgba, 32, D::Float) => vk::Format::R32G32B32A32_SFLOAT,
        (L::Rgba, 16, D::Float) => vk::Format::R16G16B16A16_SFLOAT,
        (L::R, 32, D::Float) => vk::Format::R32_SFLOAT,
        (L::R, 32, D::UnsignedInt) => vk::Format::R32_UINT,
        (L::R, 8, D::UnsignedNormalized) => vk::Format::R8_UNORM,
        _ if ty.is_depth() => vk::Format::D32_SFLOAT,
        _ => vk::Format::R8G8B8A8_UNORM,
    }
}

// `Program` creation (shader module loading) is owned by
// `fluxgpu-core::program`'s FUBAR loader, which hands this backend raw
// SPIR-V bytes; see `Device::create_shader_module` called from there.
impl Device {
    pub unsafe fn create_shader_module(
        &self,
        spirv: &[u32],
        entry_point: &str,
    ) -> Result<Program, DeviceError> {
        let info = vk::ShaderModuleCreateInfo::builder().code(spirv);
        let module = self.shared.raw.create_shader_module(&info, None)?;
        Ok(Program {
            module,
            entry_point: std::ffi::CString::new(entry_point)
                .map_err(|_| DeviceError::Unsupported("entry point contains NUL byte".into()))?,
        })
    }

    pub unsafe fn destroy_shader_module(&self, program: Program) {
        self.shared.raw.destroy_shader_module(program.module, None);
    }
}
