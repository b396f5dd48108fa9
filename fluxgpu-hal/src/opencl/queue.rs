use std::sync::Arc;

use opencl3::command_queue::CommandQueue;
use opencl3::context::Context;

use super::{cl_result, Command, CommandBuffer, Fence};
use crate::DeviceError;

#[derive(Debug)]
pub struct Queue {
    #[allow(dead_code)]
    context: Arc<Context>,
    raw: CommandQueue,
}

impl Queue {
    pub(crate) fn new(context: Arc<Context>, raw: CommandQueue) -> Self {
        Self { context, raw }
    }
}

impl crate::Queue for Queue {
    type A = super::Api;

    unsafe fn submit(
        &self,
        command_buffers: &[&CommandBuffer],
        signal_fence: Option<(&mut Fence, crate::FenceValue)>,
    ) -> Result<(), DeviceError> {
        let mut last_event = None;

        for command_buffer in command_buffers {
            for command in &command_buffer.commands {
                let event = match *command {
                    Command::CopyBufferToBuffer {
                        src,
                        src_offset,
                        dst,
                        dst_offset,
                        size,
                    } => cl_result(self.raw.enqueue_copy_buffer(
                        src,
                        dst,
                        src_offset as usize,
                        dst_offset as usize,
                        size as usize,
                        &[],
                    ))?,
                    Command::FillBuffer {
                        dst,
                        offset,
                        size,
                        value,
                    } => cl_result(self.raw.enqueue_fill_buffer(
                        dst,
                        &[value],
                        offset as usize,
                        size as usize,
                        &[],
                    ))?,
                };
                last_event = Some(event);
            }
        }

        cl_result(self.raw.flush())?;

        if let Some((fence, value)) = signal_fence {
            if let Some(event) = last_event {
                fence.set_pending(event, value);
            } else {
                // No commands in this submission: nothing to wait on, so the
                // fence is already at the requested value.
                fence.set_pending_immediate(value);
            }
        }

        Ok(())
    }
}
