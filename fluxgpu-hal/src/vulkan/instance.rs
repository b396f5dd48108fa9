use std::ffi::CString;
use std::sync::Arc;

use ash::{extensions::khr, vk};
use fluxgpu_types::{DeviceLimits, Vendor};
use parking_lot::Mutex;

use super::device::{Device, DeviceShared};
use crate::{DeviceError, ExposedDevice, InstanceError};

#[derive(Debug)]
pub struct Instance {
    pub(crate) entry: ash::Entry,
    pub(crate) raw: ash::Instance,
}

impl Drop for Instance {
    fn drop(&mut self) {
        unsafe { self.raw.destroy_instance(None) };
    }
}

impl crate::Instance for Instance {
    type A = super::Api;

    fn init() -> Result<Self, InstanceError> {
        let entry = unsafe {
            ash::Entry::load().map_err(|e| InstanceError::Failed(format!("loading Vulkan loader: {e}")))?
        };

        let app_info = vk::ApplicationInfo::builder()
            .application_name(c"fluxgpu")
            .api_version(vk::API_VERSION_1_1);
        let create_info = vk::InstanceCreateInfo::builder().application_info(&app_info);

        let raw = unsafe {
            entry
                .create_instance(&create_info, None)
                .map_err(|e| InstanceError::Failed(format!("vkCreateInstance: {e:?}")))?
        };

        Ok(Self { entry, raw })
    }

    fn enumerate_devices(&self) -> Vec<ExposedDevice<Self::A>> {
        let physical_devices = match unsafe { self.raw.enumerate_physical_devices() } {
            Ok(devices) => devices,
            Err(err) => {
                log::warn!("vkEnumeratePhysicalDevices failed: {err:?}");
                return Vec::new();
            }
        };

        physical_devices
            .into_iter()
            .map(|physical_device| {
                let properties = unsafe { self.raw.get_physical_device_properties(physical_device) };
                let name = unsafe { std::ffi::CStr::from_ptr(properties.device_name.as_ptr()) }
                    .to_string_lossy()
                    .into_owned();
                let vendor = Vendor::from_pci_id(properties.vendor_id);
                let limits = device_limits_from_vk(&properties.limits);
                ExposedDevice {
                    device_id: physical_device,
                    name,
                    vendor,
                    is_host: false,
                    limits,
                }
            })
            .collect()
    }

    fn open(
        &self,
        exposed: &ExposedDevice<Self::A>,
    ) -> Result<(Device, super::Queue), DeviceError> {
        let physical_device = exposed.device_id;

        let queue_families =
            unsafe { self.raw.get_physical_device_queue_family_properties(physical_device) };
        let queue_family_index = queue_families
            .iter()
            .position(|props| props.queue_flags.contains(vk::QueueFlags::COMPUTE))
            .ok_or(DeviceError::Unsupported(
                "no queue family supports compute".into(),
            ))? as u32;

        let queue_priorities = [1.0_f32];
        let queue_info = vk::DeviceQueueCreateInfo::builder()
            .queue_family_index(queue_family_index)
            .queue_priorities(&queue_priorities);
        let queue_infos = [queue_info.build()];

        let extensions: Vec<CString> = {
            let available = unsafe {
                self.raw
                    .enumerate_device_extension_properties(physical_device)
                    .unwrap_or_default()
            };
            let wants = [khr::TimelineSemaphore::name()];
            wants
                .into_iter()
                .filter(|name| {
                    available.iter().any(|ext| unsafe {
                        std::ffi::CStr::from_ptr(ext.extension_name.as_ptr()) == *name
                    })
                })
                .map(|name| name.to_owned())
                .collect()
        };
        let extension_ptrs: Vec<*const i8> = extensions.iter().map(|s| s.as_ptr()).collect();

        let mut timeline_features =
            vk::PhysicalDeviceTimelineSemaphoreFeatures::builder().timeline_semaphore(true);
        let has_timeline = !extensions.is_empty();

        let mut device_info = vk::DeviceCreateInfo::builder()
            .queue_create_infos(&queue_infos)
            .enabled_extension_names(&extension_ptrs);
        if has_timeline {
            device_info = device_info.push_next(&mut timeline_features);
        }

        let raw = unsafe {
            self.raw
                .create_device(physical_device, &device_info, None)?
        };

        let memory_properties = unsafe { self.raw.get_physical_device_memory_properties(physical_device) };

        let shared = Arc::new(DeviceShared {
            raw,
            physical_device,
            instance: self.raw.clone(),
            queue_family_index,
            timeline_semaphore_ext: if has_timeline {
                Some(crate::ExtensionFn::Promoted)
            } else {
                None
            },
            memory_properties,
        });

        let pool_info = vk::CommandPoolCreateInfo::builder()
            .queue_family_index(queue_family_index)
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);
        let command_pool = unsafe { shared.raw.create_command_pool(&pool_info, None)? };

        let raw_queue = unsafe { shared.raw.get_device_queue(queue_family_index, 0) };

        let device = Device {
            shared: Arc::clone(&shared),
            limits: exposed.limits,
            command_pool: Mutex::new(command_pool),
        };
        let queue = super::Queue::new(shared, raw_queue);

        Ok((device, queue))
    }
}

fn device_limits_from_vk(limits: &vk::PhysicalDeviceLimits) -> DeviceLimits {
    DeviceLimits {
        compute_units: 0,
        clock_mhz: 0,
        global_mem_size: 0,
        local_mem_size: limits.max_compute_shared_memory_size as u64,
        constant_mem_size: 0,
        max_mem_alloc: u64::MAX,
        max_work_group_size: limits.max_compute_work_group_size,
        max_total_local_size: limits.max_compute_work_group_invocations,
        max_image_1d_dim: limits.max_image_dimension1_d,
        max_image_2d_dim: [limits.max_image_dimension2_d, limits.max_image_dimension2_d],
        max_image_3d_dim: [
            limits.max_image_dimension3_d,
            limits.max_image_dimension3_d,
            limits.max_image_dimension3_d,
        ],
        max_mip_levels: 16,
        double_support: true,
        unified_memory: false,
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
