use cudarc::driver::sys as cu;

use super::{cu_result, Command, CommandBuffer, Fence};
use crate::DeviceError;

#[derive(Debug)]
pub struct Queue {
    context: cu::CUcontext,
    stream: cu::CUstream,
}

unsafe impl Send for Queue {}
unsafe impl Sync for Queue {}

impl Queue {
    pub(crate) fn new(context: cu::CUcontext, stream: cu::CUstream) -> Self {
        Self { context, stream }
    }
}

impl Drop for Queue {
    fn drop(&mut self) {
        unsafe { cu::cuStreamDestroy_v2(self.stream) };
    }
}

impl crate::Queue for Queue {
    type A = super::Api;

    unsafe fn submit(
        &self,
        command_buffers: &[&CommandBuffer],
        signal_fence: Option<(&mut Fence, crate::FenceValue)>,
    ) -> Result<(), DeviceError> {
        cu_result(cu::cuCtxSetCurrent(self.context))?;

        for command_buffer in command_buffers {
            for command in &command_buffer.commands {
                match *command {
                    Command::CopyBufferToBuffer {
                        src,
                        src_offset,
                        dst,
                        dst_offset,
                        size,
                    } => {
                        cu_result(cu::cuMemcpyDtoDAsync_v2(
                            dst + dst_offset,
                            src + src_offset,
                            size as usize,
                            self.stream,
                        ))?;
                    }
                    Command::FillBuffer {
                        dst,
                        offset,
                        size,
                        value,
                    } => {
                        cu_result(cu::cuMemsetD8Async(
                            dst + offset,
                            value,
                            size as usize,
                            self.stream,
                        ))?;
                    }
                }
            }
        }

        if let Some((fence, value)) = signal_fence {
            fence.record(self.stream, value)?;
        }

        Ok(())
    }
}
