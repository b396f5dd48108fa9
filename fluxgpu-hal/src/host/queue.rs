use super::{CommandBuffer, Fence};
use crate::DeviceError;

/// The host backend has no hardware submission queue; by the time a
/// `CommandBuffer` reaches `submit`, every operation it represents has
/// already run against the buffer/image storage during encoding. All that is
/// left to do here is fence bookkeeping, in the order submissions arrive.
#[derive(Debug, Default)]
pub struct Queue;

impl Queue {
    pub(crate) fn new() -> Self {
        Self
    }
}

impl crate::Queue for Queue {
    type A = super::Api;

    unsafe fn submit(
        &self,
        _command_buffers: &[&CommandBuffer],
        signal_fence: Option<(&mut Fence, crate::FenceValue)>,
    ) -> Result<(), DeviceError> {
        if let Some((fence, value)) = signal_fence {
            fence.signal(value);
        }
        Ok(())
    }
}
