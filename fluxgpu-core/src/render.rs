//! Graphics: render pass, render pipeline, and the renderer state machine
//! bound to (queue, pass, pipeline).
//!
//! A [`Renderer`] walks `constructed -> begin() -> active -> draw* (repeat)
//! -> end() -> committed -> commit()`. Attachment and pipeline changes are
//! only accepted outside `begin()`/`end()`; draw calls are only accepted
//! inside. As with `queue::Queue`, encoding the draw calls themselves into a
//! backend-native command buffer is left to a future `CommandEncoder`
//! extension; this layer owns the state machine, attachment bookkeeping, and
//! draw-call validation.

use std::sync::Arc;

use fluxgpu_hal::Api;
use fluxgpu_types::{
    IndexType, RenderPassDescriptor, RenderPipelineDescriptor, Scissor, Viewport,
};

use crate::device::Device;
use crate::error::{CoreError, Result};
use crate::image::Image;
use crate::queue::Queue;

/// A compiled render pass: the attachment layout, resolved once at creation.
pub struct RenderPass<A: Api> {
    device: Arc<Device<A>>,
    pub descriptor: RenderPassDescriptor,
    /// Whether the pass actually qualifies as multi-view capable, resolved
    /// once from `descriptor.is_multi_view_capable()` at creation time.
    pub multi_view_capable: bool,
    pub label: Option<String>,
}

impl<A: Api> std::fmt::Debug for RenderPass<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderPass")
            .field("attachments", &self.descriptor.attachments.len())
            .field("multi_view_capable", &self.multi_view_capable)
            .finish()
    }
}

impl<A: Api> RenderPass<A> {
    pub fn new(device: Arc<Device<A>>, descriptor: RenderPassDescriptor) -> Result<Arc<Self>> {
        if descriptor.attachments.is_empty() {
            return Err(CoreError::InvalidArgument("render pass needs at least one attachment".into()));
        }
        let multi_view_capable = descriptor.is_multi_view_capable();
        let label = descriptor.label.clone();
        Ok(Arc::new(Self { device, descriptor, multi_view_capable, label }))
    }

    pub fn device(&self) -> &Arc<Device<A>> {
        &self.device
    }
}

/// A compiled render pipeline. Sentinel `FULL_SIZE` viewport/scissor extents
/// are resolved against `resolved_target_size` at construction, per the
/// contract's "pipeline creation resolves sentinel viewport/scissor against
/// the current screen size" rule.
pub struct RenderPipeline<A: Api> {
    device: Arc<Device<A>>,
    pub descriptor: RenderPipelineDescriptor,
    pub resolved_viewport: Viewport,
    pub resolved_scissor: Scissor,
    pub label: Option<String>,
}

impl<A: Api> std::fmt::Debug for RenderPipeline<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderPipeline").field("label", &self.label).finish()
    }
}

impl<A: Api> RenderPipeline<A> {
    pub fn new(device: Arc<Device<A>>, descriptor: RenderPipelineDescriptor, target_size: [u32; 2]) -> Result<Arc<Self>> {
        if descriptor.vertex_function.is_empty() || descriptor.fragment_function.is_empty() {
            return Err(CoreError::InvalidArgument("render pipeline needs both a vertex and a fragment function".into()));
        }
        if descriptor.sample_count > 64 || (descriptor.sample_count != 0 && !descriptor.sample_count.is_power_of_two()) {
            return Err(CoreError::InvalidArgument(format!(
                "sample_count {} is not 0, 1, or a power of two up to 64",
                descriptor.sample_count
            )));
        }
        let resolved_viewport = descriptor.viewport.resolved(target_size);
        let resolved_scissor = descriptor.scissor.resolved([resolved_viewport.width, resolved_viewport.height]);
        let label = descriptor.label.clone();
        Ok(Arc::new(Self { device, descriptor, resolved_viewport, resolved_scissor, label }))
    }

    pub fn device(&self) -> &Arc<Device<A>> {
        &self.device
    }
}

/// Per-draw-batch overrides accepted by [`Renderer::begin`]; any field left
/// `None` keeps the pipeline's own resolved value for this batch.
#[derive(Debug, Clone, Copy, Default)]
pub struct DynamicState {
    pub viewport: Option<Viewport>,
    pub scissor: Option<Scissor>,
    pub clear_color: Option<[f64; 4]>,
    pub clear_depth: Option<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RendererState {
    Constructed,
    Active,
    Committed,
}

/// One draw call, in whichever of the four families the caller invoked.
/// Threading these through one internal dispatcher (rather than four
/// independent encode paths) keeps indirect-command encoding in
/// `crate::indirect` able to reuse the exact same variants.
#[derive(Debug, Clone)]
pub enum DrawCommand<A: Api> {
    Draw {
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
    },
    DrawIndexed {
        index_buffer: Arc<crate::buffer::Buffer<A>>,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
        index_type: IndexType,
    },
    DrawPatches {
        control_point_buffers: Vec<Arc<crate::buffer::Buffer<A>>>,
        tessellation_factors_buffer: Arc<crate::buffer::Buffer<A>>,
        patch_control_point_count: u32,
        patch_count: u32,
        first_patch: u32,
        instance_count: u32,
        first_instance: u32,
    },
    DrawPatchesIndexed {
        control_point_buffers: Vec<Arc<crate::buffer::Buffer<A>>>,
        control_point_index_buffer: Arc<crate::buffer::Buffer<A>>,
        tessellation_factors_buffer: Arc<crate::buffer::Buffer<A>>,
        patch_control_point_count: u32,
        patch_count: u32,
        first_patch: u32,
        instance_count: u32,
        first_instance: u32,
    },
}

/// Bound to (queue, pass, pipeline, multi-view?). Owns the attachment map
/// and the active draw batch's recorded commands.
pub struct Renderer<A: Api> {
    queue: Arc<Queue<A>>,
    pass: Arc<RenderPass<A>>,
    pipeline: Arc<RenderPipeline<A>>,
    multi_view: bool,
    attachments: Vec<Option<Arc<Image<A>>>>,
    depth_attachment: Option<Arc<Image<A>>>,
    drawable: Option<Arc<Image<A>>>,
    state: RendererState,
    dynamic_state: DynamicState,
    recorded: Vec<DrawCommand<A>>,
    pub label: Option<String>,
}

impl<A: Api> std::fmt::Debug for Renderer<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Renderer")
            .field("state", &self.state)
            .field("recorded", &self.recorded.len())
            .finish()
    }
}

impl<A: Api> Renderer<A> {
    pub fn new(queue: Arc<Queue<A>>, pass: Arc<RenderPass<A>>, pipeline: Arc<RenderPipeline<A>>, multi_view: bool) -> Result<Self> {
        if multi_view && !(pass.multi_view_capable && pipeline.descriptor.is_multi_view()) {
            return Err(CoreError::InvalidArgument(
                "multi-view renderer requires both a multi-view-capable pass and a multi-view pipeline".into(),
            ));
        }
        let attachment_count = pass.descriptor.attachments.iter().filter(|a| !a.format.is_depth()).count();
        Ok(Self {
            queue,
            pass,
            pipeline,
            multi_view,
            attachments: vec![None; attachment_count],
            depth_attachment: None,
            drawable: None,
            state: RendererState::Constructed,
            dynamic_state: DynamicState::default(),
            recorded: Vec::new(),
            label: None,
        })
    }

    pub fn pass(&self) -> &Arc<RenderPass<A>> {
        &self.pass
    }

    pub fn pipeline(&self) -> &Arc<RenderPipeline<A>> {
        &self.pipeline
    }

    fn require_outside_batch(&self, what: &str) -> Result<()> {
        if self.state == RendererState::Active {
            return Err(CoreError::InvalidArgument(format!("{what} is only allowed outside begin()/end()")));
        }
        Ok(())
    }

    /// Replaces the entire color attachment map. Every supplied image must
    /// have a matching declared slot in the pass (a depth image requires the
    /// pass to declare one; a color image must line up with the pass's
    /// `color_attachments()` in order), and its format must match that
    /// slot's declared format.
    pub fn set_attachments(&mut self, images: Vec<Arc<Image<A>>>) -> Result<()> {
        self.require_outside_batch("set_attachments")?;
        let declared_color: Vec<_> = self.pass.descriptor.color_attachments().collect();
        let mut depth_attachment = None;
        let mut color = Vec::with_capacity(images.len());
        let mut color_idx = 0;
        for image in images {
            if image.format.is_depth() {
                let declared = self.pass.descriptor.depth_attachment().ok_or_else(|| {
                    CoreError::InvalidArgument("pass declares no depth attachment but a depth image was supplied".into())
                })?;
                if declared.format != image.format {
                    return Err(CoreError::InvalidArgument(format!(
                        "depth attachment format {:?} does not match pass's declared depth format {:?}",
                        image.format, declared.format
                    )));
                }
                depth_attachment = Some(image);
            } else {
                let declared = declared_color
                    .get(color_idx)
                    .ok_or_else(|| CoreError::InvalidArgument(format!("color attachment {color_idx} exceeds pass's declared color attachment count")))?;
                if declared.format != image.format {
                    return Err(CoreError::InvalidArgument(format!(
                        "color attachment {color_idx} format {:?} does not match pass's declared format {:?}",
                        image.format, declared.format
                    )));
                }
                color_idx += 1;
                color.push(Some(image));
            }
        }
        self.depth_attachment = depth_attachment;
        self.attachments = color;
        Ok(())
    }

    /// Updates attachment slot `index` only. The bound image's format must
    /// match the pass's declared format for that slot (depth images are
    /// matched against `depth_attachment()`, color images against
    /// `color_attachments()[index]`).
    pub fn set_attachment(&mut self, index: usize, image: Arc<Image<A>>) -> Result<()> {
        self.require_outside_batch("set_attachment")?;
        if image.format.is_depth() {
            let declared = self.pass.descriptor.depth_attachment().ok_or_else(|| {
                CoreError::InvalidArgument("pass declares no depth attachment but a depth image was supplied".into())
            })?;
            if declared.format != image.format {
                return Err(CoreError::InvalidArgument(format!(
                    "depth attachment format {:?} does not match pass's declared depth format {:?}",
                    image.format, declared.format
                )));
            }
            self.depth_attachment = Some(image);
            return Ok(());
        }
        let declared = self
            .pass
            .descriptor
            .color_attachments()
            .nth(index)
            .ok_or_else(|| CoreError::InvalidArgument(format!("attachment index {index} out of range")))?;
        if declared.format != image.format {
            return Err(CoreError::InvalidArgument(format!(
                "color attachment {index} format {:?} does not match pass's declared format {:?}",
                image.format, declared.format
            )));
        }
        let slot = self
            .attachments
            .get_mut(index)
            .ok_or_else(|| CoreError::InvalidArgument(format!("attachment index {index} out of range")))?;
        *slot = Some(image);
        Ok(())
    }

    /// Switches to a different pipeline; only valid outside a draw batch.
    pub fn switch_pipeline(&mut self, pipeline: Arc<RenderPipeline<A>>) -> Result<()> {
        self.require_outside_batch("switch_pipeline")?;
        self.pipeline = pipeline;
        Ok(())
    }

    /// Obtains the next screen-target image for this batch. Invalidated by
    /// `present()`; the renderer holds at most one drawable at a time.
    pub fn get_next_drawable(&mut self, is_multi_view: bool) -> Result<Arc<Image<A>>> {
        if is_multi_view && !self.multi_view {
            return Err(CoreError::InvalidArgument("multi-view drawable requested from a non-multi-view renderer".into()));
        }
        let drawable = self
            .drawable
            .clone()
            .ok_or_else(|| CoreError::InvariantViolation("no drawable has been bound to this renderer yet".into()))?;
        Ok(drawable)
    }

    /// Binds `image` as the screen-target drawable this renderer will draw
    /// into until the next `present()`. Distinct from `set_attachment`: a
    /// drawable stands in for attachment 0 specifically, matching the
    /// contract's "obtains a screen-target image via get_next_drawable"
    /// wording, where the drawable *is* an attachment once bound.
    pub fn bind_drawable(&mut self, image: Arc<Image<A>>) -> Result<()> {
        self.require_outside_batch("bind_drawable")?;
        self.drawable = Some(Arc::clone(&image));
        if let Some(slot) = self.attachments.get_mut(0) {
            *slot = Some(image);
        }
        Ok(())
    }

    /// Drawables are invalidated on `present()`.
    pub fn present(&mut self) -> Result<()> {
        self.drawable = None;
        Ok(())
    }

    /// Opens a draw batch, optionally overriding viewport/scissor/clear
    /// values for this batch only.
    pub fn begin(&mut self, dynamic_state: DynamicState) -> Result<()> {
        if self.state == RendererState::Active {
            return Err(CoreError::InvariantViolation("begin() called while already active".into()));
        }
        if self.attachments.iter().any(Option::is_none) {
            return Err(CoreError::InvalidArgument("not every color attachment slot is bound".into()));
        }
        if self.pass.descriptor.depth_attachment().is_some() && self.depth_attachment.is_none() {
            return Err(CoreError::InvalidArgument("pass declares a depth attachment but none is bound".into()));
        }
        self.dynamic_state = dynamic_state;
        self.state = RendererState::Active;
        self.recorded.clear();
        Ok(())
    }

    fn record(&mut self, command: DrawCommand<A>) -> Result<()> {
        if self.state != RendererState::Active {
            return Err(CoreError::InvalidArgument("draw calls are only accepted between begin() and end()".into()));
        }
        self.recorded.push(command);
        Ok(())
    }

    pub fn draw(&mut self, vertex_count: u32, instance_count: u32, first_vertex: u32, first_instance: u32) -> Result<()> {
        self.record(DrawCommand::Draw { vertex_count, instance_count, first_vertex, first_instance })
    }

    #[allow(clippy::too_many_arguments)]
    pub fn draw_indexed(
        &mut self,
        index_buffer: Arc<crate::buffer::Buffer<A>>,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
        index_type: IndexType,
    ) -> Result<()> {
        self.record(DrawCommand::DrawIndexed {
            index_buffer,
            index_count,
            instance_count,
            first_index,
            vertex_offset,
            first_instance,
            index_type,
        })
    }

    #[allow(clippy::too_many_arguments)]
    pub fn draw_patches(
        &mut self,
        control_point_buffers: Vec<Arc<crate::buffer::Buffer<A>>>,
        tessellation_factors_buffer: Arc<crate::buffer::Buffer<A>>,
        patch_control_point_count: u32,
        patch_count: u32,
        first_patch: u32,
        instance_count: u32,
        first_instance: u32,
    ) -> Result<()> {
        self.record(DrawCommand::DrawPatches {
            control_point_buffers,
            tessellation_factors_buffer,
            patch_control_point_count,
            patch_count,
            first_patch,
            instance_count,
            first_instance,
        })
    }

    #[allow(clippy::too_many_arguments)]
    pub fn draw_patches_indexed(
        &mut self,
        control_point_buffers: Vec<Arc<crate::buffer::Buffer<A>>>,
        control_point_index_buffer: Arc<crate::buffer::Buffer<A>>,
        tessellation_factors_buffer: Arc<crate::buffer::Buffer<A>>,
        patch_control_point_count: u32,
        patch_count: u32,
        first_patch: u32,
        instance_count: u32,
        first_instance: u32,
    ) -> Result<()> {
        self.record(DrawCommand::DrawPatchesIndexed {
            control_point_buffers,
            control_point_index_buffer,
            tessellation_factors_buffer,
            patch_control_point_count,
            patch_count,
            first_patch,
            instance_count,
            first_instance,
        })
    }

    /// Closes the command list. After this, only `commit()` is valid.
    pub fn end(&mut self) -> Result<()> {
        if self.state != RendererState::Active {
            return Err(CoreError::InvalidArgument("end() called without a matching begin()".into()));
        }
        self.state = RendererState::Committed;
        Ok(())
    }

    /// Submits the recorded command list to the bound queue. Encoding the
    /// recorded `DrawCommand`s into a backend command buffer is left to a
    /// future HAL extension, the same gap `queue::Queue::record_and_submit`
    /// documents for compute dispatch; this submits an empty command buffer
    /// purely to advance the queue's fence for ordering purposes.
    pub fn commit(&mut self) -> Result<()> {
        if self.state != RendererState::Committed {
            return Err(CoreError::InvalidArgument("commit() called before end()".into()));
        }
        self.queue.submit_blocking(&[])?;
        self.recorded.clear();
        self.state = RendererState::Constructed;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    // State-machine transitions and attachment bookkeeping are exercised
    // end-to-end against the host backend in `fluxgpu-tests`; the pure
    // sentinel-resolution arithmetic is covered here since it needs no
    // backend.
    use fluxgpu_types::{CompareFunc, DepthState, Scissor, Viewport};

    #[test]
    fn viewport_and_scissor_resolve_sentinels_independently() {
        let viewport = Viewport::default().resolved([800, 600]);
        assert_eq!((viewport.width, viewport.height), (800, 600));

        let scissor = Scissor::default().resolved([viewport.width, viewport.height]);
        assert_eq!(scissor.extent, [800, 600]);

        let fixed = Scissor { offset: [10, 10], extent: [64, 64] };
        assert_eq!(fixed.resolved([800, 600]).extent, [64, 64]);
    }

    #[test]
    fn depth_state_default_compares_less() {
        assert_eq!(DepthState::default().compare, CompareFunc::Less);
    }
}
