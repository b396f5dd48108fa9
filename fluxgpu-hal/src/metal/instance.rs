use std::sync::Arc;

use fluxgpu_types::{DeviceLimits, Vendor};

use super::device::{Device, DeviceShared};
use crate::{DeviceError, ExposedDevice, InstanceError};

#[derive(Debug)]
pub struct Instance;

impl crate::Instance for Instance {
    type A = super::Api;

    fn init() -> Result<Self, InstanceError> {
        Ok(Instance)
    }

    fn enumerate_devices(&self) -> Vec<ExposedDevice<Self::A>> {
        metal::Device::all()
            .into_iter()
            .map(|raw| {
                let device_id = raw.registry_id();
                let name = raw.name().to_string();
                let vendor = if name.to_ascii_lowercase().contains("apple") {
                    Vendor::Apple
                } else {
                    Vendor::Unknown
                };
                ExposedDevice {
                    device_id,
                    name,
                    vendor,
                    is_host: false,
                    limits: device_limits_from_mtl(&raw),
                }
            })
            .collect()
    }

    fn open(
        &self,
        exposed: &ExposedDevice<Self::A>,
    ) -> Result<(Device, super::Queue), DeviceError> {
        let raw = metal::Device::all()
            .into_iter()
            .find(|d| d.registry_id() == exposed.device_id)
            .ok_or(DeviceError::ResourceCreationFailed(
                "Metal device no longer present".into(),
            ))?;

        let queue_raw = raw.new_command_queue();

        let shared = Arc::new(DeviceShared {
            raw,
            command_queue: queue_raw.clone(),
        });
        let device = Device {
            shared: Arc::clone(&shared),
            limits: exposed.limits,
        };
        let queue = super::Queue::new(shared, queue_raw);
        Ok((device, queue))
    }
}

fn device_limits_from_mtl(raw: &metal::Device) -> DeviceLimits {
    let max_threads = raw.max_threads_per_threadgroup();
    DeviceLimits {
        compute_units: 0,
        clock_mhz: 0,
        global_mem_size: raw.recommended_max_working_set_size(),
        local_mem_size: 32 * 1024,
        constant_mem_size: 0,
        max_mem_alloc: raw.max_buffer_length(),
        max_work_group_size: [
            max_threads.width as u32,
            max_threads.height as u32,
            max_threads.depth as u32,
        ],
        max_total_local_size: (max_threads.width * max_threads.height * max_threads.depth) as u32,
        max_image_1d_dim: 16384,
        max_image_2d_dim: [16384, 16384],
        max_image_3d_dim: [2048, 2048, 2048],
        max_mip_levels: 15,
        double_support: false,
        unified_memory: raw.has_unified_memory(),
        basic_64_bit_atomics_support: true,
        extended_64_bit_atomics_support: false,
        sub_group_support: true,
        cooperative_kernel_support: false,
        image_support: true,
        image_depth_support: true,
        image_msaa_support: true,
        image_cube_support: true,
        image_mipmap_support: true,
        image_gather_support: true,
        image_read_write_support: true,
    }
}
