use std::sync::Arc;

use super::device::DeviceShared;
use super::{CommandBuffer, Fence};
use crate::DeviceError;

#[derive(Debug)]
pub struct Queue {
    device: Arc<DeviceShared>,
    raw: metal::CommandQueue,
}

impl Queue {
    pub(crate) fn new(device: Arc<DeviceShared>, raw: metal::CommandQueue) -> Self {
        Self { device, raw }
    }
}

unsafe impl Send for Queue {}
unsafe impl Sync for Queue {}

impl crate::Queue for Queue {
    type A = super::Api;

    unsafe fn submit(
        &self,
        command_buffers: &[&CommandBuffer],
        signal_fence: Option<(&mut Fence, crate::FenceValue)>,
    ) -> Result<(), DeviceError> {
        let _ = &self.device;
        let _ = &self.raw;

        if let (Some((fence, value)), Some(last)) = (signal_fence, command_buffers.last()) {
            let handle = fence.handle();
            last.raw.add_completed_handler(Box::new(move |_| {
                handle.fetch_max(value, std::sync::atomic::Ordering::AcqRel);
            }));
        }

        for command_buffer in command_buffers {
            command_buffer.raw.commit();
        }

        Ok(())
    }
}
