use std::sync::Arc;

use arrayvec::ArrayVec;
use ash::vk;

use super::device::DeviceShared;
use super::{fence::Fence, CommandBuffer};
use crate::DeviceError;

#[derive(Debug)]
pub struct Queue {
    device: Arc<DeviceShared>,
    raw: vk::Queue,
}

impl Queue {
    pub(crate) fn new(device: Arc<DeviceShared>, raw: vk::Queue) -> Self {
        Self { device, raw }
    }

    /// Nanosecond duration of one timestamp tick, used by
    /// `fluxgpu-core`'s profiling layer to convert raw GPU timestamps.
    pub unsafe fn get_timestamp_period(&self) -> f32 {
        let properties = self
            .device
            .instance
            .get_physical_device_properties(self.device.physical_device);
        properties.limits.timestamp_period
    }
}

impl crate::Queue for Queue {
    type A = super::Api;

    unsafe fn submit(
        &self,
        command_buffers: &[&CommandBuffer],
        signal_fence: Option<(&mut Fence, crate::FenceValue)>,
    ) -> Result<(), DeviceError> {
        let mut fence_raw = vk::Fence::null();
        let mut signal_semaphores = ArrayVec::<_, 1>::new();
        let mut signal_values = ArrayVec::<_, 1>::new();

        if let Some((fence, value)) = signal_fence {
            fence.maintain(&self.device.raw)?;
            match *fence {
                Fence::TimelineSemaphore(raw) => {
                    signal_semaphores.push(raw);
                    signal_values.push(value);
                }
                Fence::FencePool {
                    ref mut active,
                    ref mut free,
                    ..
                } => {
                    fence_raw = match free.pop() {
                        Some(raw) => raw,
                        None => self
                            .device
                            .raw
                            .create_fence(&vk::FenceCreateInfo::builder(), None)?,
                    };
                    active.push((value, fence_raw));
                }
            }
        }

        let vk_cmd_buffers = command_buffers.iter().map(|cmd| cmd.raw).collect::<Vec<_>>();

        let mut vk_info = vk::SubmitInfo::builder()
            .command_buffers(&vk_cmd_buffers)
            .signal_semaphores(&signal_semaphores);

        let mut vk_timeline_info;
        if !signal_values.is_empty() {
            vk_timeline_info =
                vk::TimelineSemaphoreSubmitInfo::builder().signal_semaphore_values(&signal_values);
            vk_info = vk_info.push_next(&mut vk_timeline_info);
        }

        profiling::scope!("vkQueueSubmit");
        self.device
            .raw
            .queue_submit(self.raw, &[vk_info.build()], fence_raw)?;
        Ok(())
    }
}
