use cudarc::driver::sys as cu;
use parking_lot::Mutex;

use super::cu_result;
use crate::DeviceError;

/// A CUDA fence pairs the last submission value with a `CUevent` recorded
/// on the stream at that submission; `cuEventSynchronize`/`cuEventQuery`
/// give the wait/poll primitives `Device::wait_for_fence`/`get_fence_value`
/// need, without requiring a dedicated host callback thread.
#[derive(Debug)]
pub struct Fence {
    pub(crate) event: cu::CUevent,
    pub(crate) state: Mutex<FenceState>,
}

#[derive(Debug)]
pub(crate) struct FenceState {
    pub(crate) last_recorded: u64,
    pub(crate) last_completed: u64,
}

unsafe impl Send for Fence {}
unsafe impl Sync for Fence {}

impl Fence {
    pub(crate) fn new(signalled: bool) -> Result<Self, DeviceError> {
        let mut event = std::ptr::null_mut();
        cu_result(unsafe { cu::cuEventCreate(&mut event, cu::CUevent_flags::CU_EVENT_DEFAULT as u32) })?;
        Ok(Self {
            event,
            state: Mutex::new(FenceState {
                last_recorded: if signalled { 1 } else { 0 },
                last_completed: if signalled { 1 } else { 0 },
            }),
        })
    }

    pub(crate) fn record(&self, stream: cu::CUstream, value: u64) -> Result<(), DeviceError> {
        cu_result(unsafe { cu::cuEventRecord(self.event, stream) })?;
        self.state.lock().last_recorded = value;
        Ok(())
    }

    pub(crate) fn poll(&self) -> u64 {
        let mut state = self.state.lock();
        if state.last_completed < state.last_recorded {
            let ready = unsafe { cu::cuEventQuery(self.event) } == cu::CUresult::CUDA_SUCCESS;
            if ready {
                state.last_completed = state.last_recorded;
            }
        }
        state.last_completed
    }

    pub(crate) fn wait(&self, value: u64) -> Result<(), DeviceError> {
        if self.poll() >= value {
            return Ok(());
        }
        cu_result(unsafe { cu::cuEventSynchronize(self.event) })?;
        let mut state = self.state.lock();
        state.last_completed = state.last_recorded;
        Ok(())
    }
}

impl Drop for Fence {
    fn drop(&mut self) {
        unsafe { cu::cuEventDestroy_v2(self.event) };
    }
}

impl crate::Fence for Fence {}
