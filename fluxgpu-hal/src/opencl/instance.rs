use fluxgpu_types::{DeviceLimits, Vendor};
use opencl3::device::{CL_DEVICE_TYPE_ALL};

use super::device::Device;
use super::{cl_result, RawDeviceId};
use crate::{DeviceError, ExposedDevice, InstanceError};

#[derive(Debug)]
pub struct Instance;

impl crate::Instance for Instance {
    type A = super::Api;

    fn init() -> Result<Self, InstanceError> {
        Ok(Instance)
    }

    fn enumerate_devices(&self) -> Vec<ExposedDevice<Self::A>> {
        let platforms = match opencl3::platform::get_platforms() {
            Ok(platforms) => platforms,
            Err(err) => {
                log::warn!("failed to enumerate OpenCL platforms: {err}");
                return Vec::new();
            }
        };

        platforms
            .into_iter()
            .flat_map(|platform| {
                platform
                    .get_devices(CL_DEVICE_TYPE_ALL)
                    .unwrap_or_default()
                    .into_iter()
                    .map(opencl3::device::Device::new)
                    .collect::<Vec<_>>()
            })
            .filter_map(|device| {
                let name = device.name().ok()?;
                let vendor_id = device.vendor_id().unwrap_or(0);
                let vendor = Vendor::from_pci_id(vendor_id);
                let limits = device_limits_from_cl(&device);
                Some(ExposedDevice {
                    device_id: RawDeviceId(device.id()),
                    name,
                    vendor,
                    is_host: false,
                    limits,
                })
            })
            .collect()
    }

    fn open(&self, exposed: &ExposedDevice<Self::A>) -> Result<(Device, super::Queue), DeviceError> {
        let device = opencl3::device::Device::new(exposed.device_id.0);
        let context = cl_result(opencl3::context::Context::from_device(&device))
            .map_err(|_| DeviceError::ResourceCreationFailed("clCreateContext failed".into()))?;
        let queue_raw = cl_result(opencl3::command_queue::CommandQueue::create_default(
            &context, 0,
        ))
        .map_err(|_| DeviceError::ResourceCreationFailed("clCreateCommandQueue failed".into()))?;
        // A second in-order queue dedicated to `map_buffer`/`unmap_buffer`,
        // so mapping never has to borrow the caller-visible submission
        // queue out from under a pending `Queue::submit`.
        let map_queue_raw = cl_result(opencl3::command_queue::CommandQueue::create_default(
            &context, 0,
        ))
        .map_err(|_| DeviceError::ResourceCreationFailed("clCreateCommandQueue failed".into()))?;

        let context = std::sync::Arc::new(context);
        let dev = Device::new(std::sync::Arc::clone(&context), map_queue_raw, exposed.limits);
        let queue = super::Queue::new(context, queue_raw);
        Ok((dev, queue))
    }
}

fn device_limits_from_cl(device: &opencl3::device::Device) -> DeviceLimits {
    let max_work_item_sizes = device.max_work_item_sizes().unwrap_or_else(|_| vec![1, 1, 1]);
    DeviceLimits {
        compute_units: device.max_compute_units().unwrap_or(1),
        clock_mhz: device.max_clock_frequency().unwrap_or(0),
        global_mem_size: device.global_mem_size().unwrap_or(0),
        local_mem_size: device.local_mem_size().unwrap_or(0),
        constant_mem_size: device.max_constant_buffer_size().unwrap_or(0),
        max_mem_alloc: device.max_mem_alloc_size().unwrap_or(0),
        max_work_group_size: [
            *max_work_item_sizes.first().unwrap_or(&1) as u32,
            *max_work_item_sizes.get(1).unwrap_or(&1) as u32,
            *max_work_item_sizes.get(2).unwrap_or(&1) as u32,
        ],
        max_total_local_size: device.max_work_group_size().unwrap_or(1) as u32,
        max_image_1d_dim: device.image2d_max_width().unwrap_or(0) as u32,
        max_image_2d_dim: [
            device.image2d_max_width().unwrap_or(0) as u32,
            device.image2d_max_height().unwrap_or(0) as u32,
        ],
        max_image_3d_dim: [
            device.image3d_max_width().unwrap_or(0) as u32,
            device.image3d_max_height().unwrap_or(0) as u32,
            device.image3d_max_depth().unwrap_or(0) as u32,
        ],
        max_mip_levels: 16,
        double_support: device.double_fp_config().map(|c| c != 0).unwrap_or(false),
        unified_memory: device.host_unified_memory().unwrap_or(0) != 0,
        basic_64_bit_atomics_support: true,
        extended_64_bit_atomics_support: false,
        sub_group_support: false,
        cooperative_kernel_support: false,
        image_support: device.image_support().unwrap_or(0) != 0,
        image_depth_support: true,
        image_msaa_support: false,
        image_cube_support: false,
        image_mipmap_support: false,
        image_gather_support: false,
        image_read_write_support: true,
    }
}
