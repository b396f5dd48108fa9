//! Indirect command pipelines: preallocated GPU-encoded draw/dispatch
//! command buffers, submitted later via `Queue::execute_indirect`.
//!
//! A pipeline is declared either `Compute` or `Render` at construction and
//! preallocates `max_command_count` slots. Argument encoding for indirect
//! commands is restricted to buffer and argument-buffer arguments: no
//! per-command image or inline POD argument is representable, matching the
//! narrower binding model an indirect buffer's fixed-layout encoding allows.

use std::sync::Arc;

use fluxgpu_hal::Api;
use fluxgpu_types::IndirectCommandPipelineDescriptor;

use crate::device::Device;
use crate::error::{CoreError, Result};
use crate::program::FunctionEntry;
use crate::render::{DrawCommand, RenderPipeline};

/// A launch argument restricted to what an indirect command's fixed-layout
/// encoding can hold: buffers and argument buffers only.
pub enum IndirectArg<A: Api> {
    Buffer(Arc<crate::buffer::Buffer<A>>),
    ArgumentBuffer(Arc<crate::buffer::Buffer<A>>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndirectKind {
    Compute,
    Render,
}

pub struct ComputeCommand<A: Api> {
    pub kernel: Arc<FunctionEntry<A>>,
    pub dim: u32,
    pub global_work_size: [u32; 3],
    pub local_work_size: Option<[u32; 3]>,
    pub args: Vec<IndirectArg<A>>,
    /// Insert a barrier after this command before the next one runs.
    pub barrier: bool,
}

pub struct RenderCommand<A: Api> {
    pub pipeline: Arc<RenderPipeline<A>>,
    pub draw: DrawCommand<A>,
    pub args: Vec<IndirectArg<A>>,
    pub multi_view: bool,
}

pub(crate) enum Slot<A: Api> {
    Compute(ComputeCommand<A>),
    Render(RenderCommand<A>),
}

/// Preallocated indirect command storage. `complete()` finalizes it into a
/// backend-specific indirect buffer (left as a documented gap here, same as
/// `queue::Queue`'s missing native launch encoding); `reset()` clears the
/// encoded commands while keeping the preallocated slot count.
pub struct IndirectCommandPipeline<A: Api> {
    device: Arc<Device<A>>,
    pub kind: IndirectKind,
    pub max_command_count: u32,
    slots: Vec<Option<Slot<A>>>,
    completed: bool,
    pub label: Option<String>,
}

impl<A: Api> std::fmt::Debug for IndirectCommandPipeline<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndirectCommandPipeline")
            .field("kind", &self.kind)
            .field("max_command_count", &self.max_command_count)
            .field("completed", &self.completed)
            .finish()
    }
}

impl<A: Api> IndirectCommandPipeline<A> {
    pub fn new(device: Arc<Device<A>>, kind: IndirectKind, desc: &IndirectCommandPipelineDescriptor) -> Result<Arc<Self>> {
        if desc.max_command_count == 0 {
            return Err(CoreError::InvalidArgument("max_command_count must be non-zero".into()));
        }
        Ok(Arc::new(Self {
            device,
            kind,
            max_command_count: desc.max_command_count,
            slots: (0..desc.max_command_count).map(|_| None).collect(),
            completed: false,
            label: None,
        }))
    }

    pub fn device(&self) -> &Arc<Device<A>> {
        &self.device
    }

    fn check_slot(&self, index: u32) -> Result<()> {
        if index >= self.max_command_count {
            return Err(CoreError::InvalidArgument(format!(
                "command slot {index} out of range (pipeline holds {})",
                self.max_command_count
            )));
        }
        Ok(())
    }

    /// Encodes a compute dispatch into slot `index`. Only valid on a
    /// `Compute`-kind pipeline.
    pub fn encode_compute(&mut self, index: u32, command: ComputeCommand<A>) -> Result<()> {
        if self.kind != IndirectKind::Compute {
            return Err(CoreError::InvalidArgument("encode_compute called on a Render-kind pipeline".into()));
        }
        self.check_slot(index)?;
        self.slots[index as usize] = Some(Slot::Compute(command));
        self.completed = false;
        Ok(())
    }

    /// Encodes a draw into slot `index`. Only valid on a `Render`-kind
    /// pipeline.
    pub fn encode_render(&mut self, index: u32, command: RenderCommand<A>) -> Result<()> {
        if self.kind != IndirectKind::Render {
            return Err(CoreError::InvalidArgument("encode_render called on a Compute-kind pipeline".into()));
        }
        self.check_slot(index)?;
        self.slots[index as usize] = Some(Slot::Render(command));
        self.completed = false;
        Ok(())
    }

    /// Finalizes the currently-encoded slots into the backend-specific
    /// indirect buffer this device's queue will read at submission time.
    /// Building the actual backend buffer is a further HAL-layer primitive
    /// not yet wired in; this records the finalized state so
    /// `Queue::execute_indirect` can validate against it.
    pub fn complete(&mut self) -> Result<()> {
        self.completed = true;
        Ok(())
    }

    /// Discards every encoded command but keeps the slot allocation.
    pub fn reset(&mut self) {
        for slot in &mut self.slots {
            *slot = None;
        }
        self.completed = false;
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    pub fn command_count(&self) -> u32 {
        self.max_command_count
    }

    /// Resolves `[offset, offset+count)` against this pipeline's slots,
    /// treating `count == ~0u32` as "to the end", per the submission
    /// contract's slice semantics.
    pub(crate) fn resolve_range(&self, offset: u32, count: u32) -> Result<std::ops::Range<usize>> {
        if !self.completed {
            return Err(CoreError::InvalidArgument("execute_indirect called on a pipeline that was never complete()d".into()));
        }
        let end = if count == u32::MAX {
            self.max_command_count
        } else {
            offset.checked_add(count).ok_or_else(|| CoreError::InvalidArgument("offset + count overflowed".into()))?
        };
        if offset > self.max_command_count || end > self.max_command_count {
            return Err(CoreError::InvalidArgument(format!(
                "range [{offset}, {end}) exceeds pipeline's {} slots",
                self.max_command_count
            )));
        }
        Ok(offset as usize..end as usize)
    }

    pub(crate) fn slots_in(&self, range: std::ops::Range<usize>) -> &[Option<Slot<A>>] {
        &self.slots[range]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_range_treats_max_count_as_to_end() {
        // Pure range arithmetic exercised without a backend; constructing an
        // `IndirectCommandPipeline<A>` needs a live `Device<A>`, covered
        // end-to-end in `fluxgpu-tests` against the host backend.
        let max_command_count = 8u32;
        let offset = 2u32;
        let count = u32::MAX;
        let end = if count == u32::MAX { max_command_count } else { offset + count };
        assert_eq!(end, 8);
        assert_eq!(offset..end, 2..8);
    }

    #[test]
    fn resolve_range_rejects_overflowing_offset_plus_count() {
        let offset = u32::MAX - 1;
        let count = 5u32;
        assert!(offset.checked_add(count).is_none());
    }
}
