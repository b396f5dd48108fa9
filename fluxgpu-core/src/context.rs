//! Root object: owns device enumeration, default queues, the program
//! registry, and the optional resource registry.

use std::sync::Arc;

use bitflags::bitflags;
use fluxgpu_hal::{Api, Device as HalDevice, Instance as HalInstance};
use fluxgpu_types::{
    BufferDescriptor, FenceDescriptor, ImageDescriptor, IndirectCommandPipelineDescriptor,
    QueueDescriptor, RenderPassDescriptor, RenderPipelineDescriptor, Vendor,
};

use crate::buffer::Buffer;
use crate::device::{Device, DeviceKind};
use crate::error::{CoreError, Result};
use crate::fence::Fence;
use crate::image::Image;
use crate::indirect::{IndirectCommandPipeline, IndirectKind};
use crate::program::{FubarEntry, FunctionInfo, Program, ProgramData};
use crate::queue::Queue;
use crate::registry::Registry;
use crate::render::{RenderPass, RenderPipeline};

bitflags! {
    /// Capability flags selected when a [`Context`] is created: which
    /// optional subsystems it carries.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ContextFlags: u32 {
        const GRAPHICS         = 1 << 0;
        const VR               = 1 << 1;
        const TOOLCHAIN        = 1 << 2;
        const RESOURCE_REGISTRY = 1 << 3;
    }
}

/// Resolves a device out of `Context::get_device`'s enumerated list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceSelector {
    Any,
    Fastest,
    FastestGpu,
    FastestCpu,
    Gpu(u32),
    Cpu(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryUsage {
    pub global_used: u64,
    pub global_total: u64,
    pub local_used: u64,
    pub local_total: u64,
}

pub struct Context<A: Api> {
    instance: A::Instance,
    devices: Vec<Arc<Device<A>>>,
    default_queues: Vec<Arc<Queue<A>>>,
    flags: ContextFlags,
    pub buffers: Registry<Buffer<A>>,
    pub images: Registry<Image<A>>,
}

impl<A: Api> std::fmt::Debug for Context<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context").field("devices", &self.devices.len()).finish()
    }
}

impl<A: Api> Context<A> {
    /// Enumerates every device this backend can see and opens each one with
    /// its default queue. A context is supported iff at least one device
    /// enumerated; otherwise returns [`CoreError::Unsupported`].
    pub fn create(flags: ContextFlags) -> Result<Arc<Self>> {
        let instance = A::Instance::init()?;
        let exposed = instance.enumerate_devices();
        if exposed.is_empty() {
            return Err(CoreError::Unsupported(format!("no {} device found", A::BACKEND)));
        }

        let mut devices = Vec::with_capacity(exposed.len());
        let mut default_queues = Vec::with_capacity(exposed.len());
        for record in &exposed {
            let (raw_device, raw_queue) = instance.open(record)?;
            let device = Arc::new(Device {
                raw: raw_device,
                raw_id: record.device_id.clone(),
                name: record.name.clone(),
                vendor: record.vendor,
                kind: if record.is_host { DeviceKind::Cpu } else { DeviceKind::Gpu },
                limits: record.limits,
                backend: A::BACKEND,
                bytes_allocated: std::sync::atomic::AtomicU64::new(0),
            });
            let queue = Queue::new(Arc::clone(&device), raw_queue, &QueueDescriptor::default())?;
            devices.push(device);
            default_queues.push(queue);
        }

        Ok(Arc::new(Self {
            instance,
            devices,
            default_queues,
            flags,
            buffers: Registry::new(),
            images: Registry::new(),
        }))
    }

    pub fn flags(&self) -> ContextFlags {
        self.flags
    }

    pub fn devices(&self) -> &[Arc<Device<A>>] {
        &self.devices
    }

    /// The context-owned default queue for `device`, created alongside it.
    pub fn default_queue(&self, device: &Arc<Device<A>>) -> Option<&Arc<Queue<A>>> {
        let idx = self.devices.iter().position(|d| Arc::ptr_eq(d, device))?;
        self.default_queues.get(idx)
    }

    /// Resolves `selector` to one device. With no match, returns the first
    /// device and logs an error rather than failing the call, per the
    /// contract.
    pub fn get_device(&self, selector: DeviceSelector) -> Arc<Device<A>> {
        let found = match selector {
            DeviceSelector::Any => self.devices.first(),
            DeviceSelector::Fastest => self.devices.iter().max_by_key(|d| d.limits.compute_units),
            DeviceSelector::FastestGpu => self
                .devices
                .iter()
                .filter(|d| d.kind == DeviceKind::Gpu)
                .max_by_key(|d| d.limits.compute_units),
            DeviceSelector::FastestCpu => self
                .devices
                .iter()
                .filter(|d| d.kind == DeviceKind::Cpu)
                .max_by_key(|d| d.limits.compute_units),
            DeviceSelector::Gpu(n) => self.devices.iter().filter(|d| d.kind == DeviceKind::Gpu).nth(n as usize),
            DeviceSelector::Cpu(n) => self.devices.iter().filter(|d| d.kind == DeviceKind::Cpu).nth(n as usize),
        };
        match found {
            Some(device) => Arc::clone(device),
            None => {
                log::error!("get_device({selector:?}) matched no device, falling back to the first enumerated one");
                Arc::clone(&self.devices[0])
            }
        }
    }

    /// Matches an externally-enumerated device record by (vendor, name);
    /// this runtime carries no device UUID, so identity always falls back
    /// to that pair.
    pub fn get_corresponding_device(&self, vendor: Vendor, name: &str) -> Option<Arc<Device<A>>> {
        self.devices.iter().find(|d| d.vendor == vendor && d.name == name).cloned()
    }

    pub fn create_queue(&self, device: &Arc<Device<A>>, desc: &QueueDescriptor) -> Result<Arc<Queue<A>>> {
        let raw_queue = unsafe { device.raw.create_queue()? };
        Queue::new(Arc::clone(device), raw_queue, desc)
    }

    pub fn create_fence(&self, device: &Arc<Device<A>>, desc: &FenceDescriptor) -> Result<Arc<Fence<A>>> {
        Fence::new(Arc::clone(device), desc)
    }

    pub fn create_buffer(&self, device: &Arc<Device<A>>, desc: &BufferDescriptor) -> Result<Arc<Buffer<A>>> {
        let buffer = Buffer::new(Arc::clone(device), desc)?;
        if self.flags.contains(ContextFlags::RESOURCE_REGISTRY) {
            if let Some(label) = &buffer.label {
                self.buffers.insert(label, &buffer);
            }
        }
        Ok(buffer)
    }

    pub fn create_image(&self, device: &Arc<Device<A>>, queue: &Queue<A>, desc: &ImageDescriptor, initial_data: Option<&[u8]>) -> Result<Arc<Image<A>>> {
        let image = Image::new(Arc::clone(device), queue, desc, initial_data)?;
        if self.flags.contains(ContextFlags::RESOURCE_REGISTRY) {
            if let Some(label) = &image.label {
                self.images.insert(label, &image);
            }
        }
        Ok(image)
    }

    pub fn create_render_pass(&self, device: &Arc<Device<A>>, desc: RenderPassDescriptor) -> Result<Arc<RenderPass<A>>> {
        RenderPass::new(Arc::clone(device), desc)
    }

    /// `target_size` resolves any `FULL_SIZE` sentinel viewport/scissor rect
    /// in `desc`; pass the current screen (or VR render target) size.
    pub fn create_render_pipeline(
        &self,
        device: &Arc<Device<A>>,
        desc: RenderPipelineDescriptor,
        target_size: [u32; 2],
    ) -> Result<Arc<RenderPipeline<A>>> {
        RenderPipeline::new(Arc::clone(device), desc, target_size)
    }

    pub fn create_indirect_command_pipeline(
        &self,
        device: &Arc<Device<A>>,
        kind: IndirectKind,
        desc: &IndirectCommandPipelineDescriptor,
    ) -> Result<Arc<IndirectCommandPipeline<A>>> {
        IndirectCommandPipeline::new(Arc::clone(device), kind, desc)
    }

    pub fn add_program_data(&self, data: &ProgramData) -> Result<Arc<Program<A>>> {
        Program::from_program_data(&self.devices, data)
    }

    pub fn add_universal_binary(&self, entries: &[FubarEntry]) -> Result<Arc<Program<A>>> {
        Program::from_universal_binary(&self.devices, entries)
    }

    pub fn add_precompiled_program_file(&self, payload: &[u8], function_infos: &[FunctionInfo]) -> Result<Arc<Program<A>>> {
        Program::from_precompiled(&self.devices, payload, function_infos)
    }

    /// Snapshot of global/local heap usage for `device`. Total figures come
    /// straight from `DeviceLimits`; used figures are this runtime's own
    /// best-effort allocation counter (see `Device::bytes_allocated`), not a
    /// driver-reported value, since none of the backends here expose one
    /// uniformly.
    pub fn get_memory_usage(&self, device: &Arc<Device<A>>) -> MemoryUsage {
        MemoryUsage {
            global_used: device.bytes_allocated(),
            global_total: device.limits.global_mem_size,
            local_used: 0,
            local_total: device.limits.local_mem_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_flags_compose() {
        let flags = ContextFlags::GRAPHICS | ContextFlags::RESOURCE_REGISTRY;
        assert!(flags.contains(ContextFlags::GRAPHICS));
        assert!(flags.contains(ContextFlags::RESOURCE_REGISTRY));
        assert!(!flags.contains(ContextFlags::VR));
    }
}
