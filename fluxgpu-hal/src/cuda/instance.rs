use cudarc::driver::sys as cu;
use fluxgpu_types::{DeviceLimits, Vendor};

use super::cu_result;
use super::device::Device;
use crate::{DeviceError, ExposedDevice, InstanceError};

#[derive(Debug)]
pub struct Instance;

impl crate::Instance for Instance {
    type A = super::Api;

    fn init() -> Result<Self, InstanceError> {
        cu_result(unsafe { cu::cuInit(0) })
            .map_err(|e| InstanceError::Failed(format!("cuInit: {e}")))?;
        Ok(Instance)
    }

    fn enumerate_devices(&self) -> Vec<ExposedDevice<Self::A>> {
        let mut count = 0;
        if cu_result(unsafe { cu::cuDeviceGetCount(&mut count) }).is_err() {
            return Vec::new();
        }

        (0..count)
            .filter_map(|ordinal| {
                let mut device = 0;
                cu_result(unsafe { cu::cuDeviceGet(&mut device, ordinal) }).ok()?;

                let mut name_buf = [0i8; 256];
                unsafe { cu::cuDeviceGetName(name_buf.as_mut_ptr(), name_buf.len() as i32, device) };
                let name = unsafe { std::ffi::CStr::from_ptr(name_buf.as_ptr()) }
                    .to_string_lossy()
                    .into_owned();

                Some(ExposedDevice {
                    device_id: device,
                    name,
                    vendor: Vendor::Nvidia,
                    is_host: false,
                    limits: device_limits_from_cu(device),
                })
            })
            .collect()
    }

    fn open(&self, exposed: &ExposedDevice<Self::A>) -> Result<(Device, super::Queue), DeviceError> {
        Device::open(exposed.device_id, exposed.limits)
    }
}

fn cu_attribute(device: cu::CUdevice, attrib: cu::CUdevice_attribute) -> i32 {
    let mut value = 0;
    unsafe { cu::cuDeviceGetAttribute(&mut value, attrib, device) };
    value
}

fn device_limits_from_cu(device: cu::CUdevice) -> DeviceLimits {
    use cu::CUdevice_attribute::*;
    let mut free = 0usize;
    let mut total = 0usize;
    unsafe { cu::cuMemGetInfo_v2(&mut free, &mut total) };

    let max_x = cu_attribute(device, CU_DEVICE_ATTRIBUTE_MAX_BLOCK_DIM_X) as u32;
    let max_y = cu_attribute(device, CU_DEVICE_ATTRIBUTE_MAX_BLOCK_DIM_Y) as u32;
    let max_z = cu_attribute(device, CU_DEVICE_ATTRIBUTE_MAX_BLOCK_DIM_Z) as u32;

    DeviceLimits {
        compute_units: cu_attribute(device, CU_DEVICE_ATTRIBUTE_MULTIPROCESSOR_COUNT) as u32,
        clock_mhz: cu_attribute(device, CU_DEVICE_ATTRIBUTE_CLOCK_RATE) as u32 / 1000,
        global_mem_size: total as u64,
        local_mem_size: cu_attribute(device, CU_DEVICE_ATTRIBUTE_MAX_SHARED_MEMORY_PER_BLOCK) as u64,
        constant_mem_size: cu_attribute(device, CU_DEVICE_ATTRIBUTE_TOTAL_CONSTANT_MEMORY) as u64,
        max_mem_alloc: total as u64,
        max_work_group_size: [max_x, max_y, max_z],
        max_total_local_size: cu_attribute(device, CU_DEVICE_ATTRIBUTE_MAX_THREADS_PER_BLOCK) as u32,
        max_image_1d_dim: cu_attribute(device, CU_DEVICE_ATTRIBUTE_MAXIMUM_TEXTURE1D_WIDTH) as u32,
        max_image_2d_dim: [
            cu_attribute(device, CU_DEVICE_ATTRIBUTE_MAXIMUM_TEXTURE2D_WIDTH) as u32,
            cu_attribute(device, CU_DEVICE_ATTRIBUTE_MAXIMUM_TEXTURE2D_HEIGHT) as u32,
        ],
        max_image_3d_dim: [
            cu_attribute(device, CU_DEVICE_ATTRIBUTE_MAXIMUM_TEXTURE3D_WIDTH) as u32,
            cu_attribute(device, CU_DEVICE_ATTRIBUTE_MAXIMUM_TEXTURE3D_HEIGHT) as u32,
            cu_attribute(device, CU_DEVICE_ATTRIBUTE_MAXIMUM_TEXTURE3D_DEPTH) as u32,
        ],
        max_mip_levels: 16,
        double_support: true,
        unified_memory: cu_attribute(device, CU_DEVICE_ATTRIBUTE_UNIFIED_ADDRESSING) != 0,
        basic_64_bit_atomics_support: true,
        extended_64_bit_atomics_support: true,
        sub_group_support: true,
        cooperative_kernel_support: cu_attribute(
            device,
            CU_DEVICE_ATTRIBUTE_COOPERATIVE_LAUNCH,
        ) != 0,
        image_support: true,
        image_depth_support: false,
        image_msaa_support: false,
        image_cube_support: false,
        image_mipmap_support: true,
        image_gather_support: true,
        image_read_write_support: false,
    }
}
