use parking_lot::Mutex;

use crate::DeviceError;

use super::cl_result;

/// An OpenCL fence holds the marker event of the most recent submission
/// that was asked to signal it, plus the highest value actually observed
/// complete. `clWaitForEvents`/`clGetEventInfo` back `wait_for_fence`/
/// `get_fence_value` respectively.
#[derive(Debug)]
pub struct Fence {
    state: Mutex<FenceState>,
}

#[derive(Debug)]
struct FenceState {
    event: Option<opencl3::event::Event>,
    pending_value: u64,
    completed_value: u64,
}

unsafe impl Send for Fence {}
unsafe impl Sync for Fence {}

impl Fence {
    pub(crate) fn new(signalled: bool) -> Self {
        Self {
            state: Mutex::new(FenceState {
                event: None,
                pending_value: if signalled { 1 } else { 0 },
                completed_value: if signalled { 1 } else { 0 },
            }),
        }
    }

    pub(crate) fn set_pending(&self, event: opencl3::event::Event, value: u64) {
        let mut state = self.state.lock();
        state.event = Some(event);
        state.pending_value = value;
    }

    pub(crate) fn set_pending_immediate(&self, value: u64) {
        let mut state = self.state.lock();
        state.event = None;
        state.pending_value = value;
        state.completed_value = value;
    }

    pub(crate) fn poll(&self) -> Result<u64, DeviceError> {
        const CL_COMPLETE: i32 = 0;
        let mut state = self.state.lock();
        if state.completed_value < state.pending_value {
            if let Some(event) = &state.event {
                let status = cl_result(event.command_execution_status())?;
                if status == CL_COMPLETE {
                    state.completed_value = state.pending_value;
                }
            }
        }
        Ok(state.completed_value)
    }

    pub(crate) fn wait(&self, value: u64) -> Result<bool, DeviceError> {
        if self.poll()? >= value {
            return Ok(true);
        }
        // Only one fence waiter is expected at a time; take the event out
        // rather than holding the lock across the blocking wait.
        let event = self.state.lock().event.take();
        if let Some(event) = event {
            cl_result(event.wait())?;
        }
        let mut state = self.state.lock();
        state.completed_value = state.pending_value;
        Ok(true)
    }
}

impl crate::Fence for Fence {}
