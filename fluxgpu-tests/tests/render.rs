//! Renderer state-machine transitions and attachment bookkeeping.
//!
//! `Renderer::commit` submits an empty command buffer purely to advance the
//! queue's fence (see `fluxgpu_core::render`): no pixel actually gets
//! produced on the host backend. What's tested here is everything the
//! runtime itself owns regardless of backend: the begin/draw/end/commit state
//! machine, attachment slot validation, and multi-view gating.

mod common;

use std::sync::Arc;

use fluxgpu_core::render::DynamicState;
use fluxgpu_types::{
    AttachmentDescriptor, ClearValue, ColorAttachmentState, CullMode, DepthState, ImageChannelLayout, ImageDataType,
    ImageDescriptor, ImageDim, ImageType, ImageTypeFlags, IndexType, LoadOp, MemoryFlags, PrimitiveKind,
    RenderPassDescriptor, RenderPipelineDescriptor, RenderPipelineFlags, StoreOp, Winding,
};

fn color_format() -> ImageType {
    ImageType::new(ImageDim::D2, ImageChannelLayout::Rgba, ImageDataType::UnsignedNormalized, 8, ImageTypeFlags::empty())
}

fn depth_format() -> ImageType {
    ImageType::new(ImageDim::D2, ImageChannelLayout::R, ImageDataType::Float, 32, ImageTypeFlags::DEPTH)
}

fn color_attachment() -> AttachmentDescriptor {
    AttachmentDescriptor {
        format: color_format(),
        load_op: LoadOp::Clear,
        store_op: StoreOp::Store,
        clear_value: ClearValue::default(),
        automatic_multi_view_transformation: false,
    }
}

fn single_color_pass() -> RenderPassDescriptor {
    RenderPassDescriptor { attachments: vec![color_attachment()], multi_view: false, label: None }
}

fn depth_attachment() -> AttachmentDescriptor {
    AttachmentDescriptor {
        format: depth_format(),
        load_op: LoadOp::Clear,
        store_op: StoreOp::Store,
        clear_value: ClearValue::default(),
        automatic_multi_view_transformation: false,
    }
}

fn color_and_depth_pass() -> RenderPassDescriptor {
    RenderPassDescriptor { attachments: vec![color_attachment(), depth_attachment()], multi_view: false, label: None }
}

fn basic_pipeline() -> RenderPipelineDescriptor {
    RenderPipelineDescriptor {
        vertex_function: "vs_main".to_string(),
        fragment_function: "fs_main".to_string(),
        primitive_kind: PrimitiveKind::Triangle,
        cull_mode: CullMode::Back,
        front_face: Winding::CounterClockwise,
        sample_count: 1,
        viewport: Default::default(),
        scissor: Default::default(),
        depth_state: DepthState::default(),
        blend_constants: [0.0; 4],
        color_attachments: vec![ColorAttachmentState::default()],
        depth_attachment_format: None,
        tessellation: None,
        flags: RenderPipelineFlags::empty(),
        label: None,
    }
}

fn color_image(ctx: &common::TestingContext, width: u32, height: u32) -> Arc<fluxgpu_core::image::Image<fluxgpu_hal::host::Api>> {
    let desc = ImageDescriptor {
        format: color_format(),
        width,
        height,
        depth: 1,
        layers: 1,
        samples: 1,
        mip_levels: 1,
        usage: MemoryFlags::HOST_READ | MemoryFlags::HOST_WRITE | MemoryFlags::RENDER_TARGET,
        label: None,
    };
    ctx.context.create_image(&ctx.device, &ctx.queue, &desc, None).unwrap()
}

#[test]
fn begin_fails_until_every_color_attachment_slot_is_bound() {
    let ctx = common::setup();
    let pass = ctx.context.create_render_pass(&ctx.device, single_color_pass()).unwrap();
    let pipeline = ctx.context.create_render_pipeline(&ctx.device, basic_pipeline(), [640, 480]).unwrap();
    let mut renderer = fluxgpu_core::render::Renderer::new(Arc::clone(&ctx.queue), pass, pipeline, false).unwrap();

    assert!(renderer.begin(DynamicState::default()).is_err());

    renderer.set_attachment(0, color_image(&ctx, 640, 480)).unwrap();
    assert!(renderer.begin(DynamicState::default()).is_ok());
}

#[test]
fn draw_calls_are_rejected_outside_a_batch() {
    let ctx = common::setup();
    let pass = ctx.context.create_render_pass(&ctx.device, single_color_pass()).unwrap();
    let pipeline = ctx.context.create_render_pipeline(&ctx.device, basic_pipeline(), [640, 480]).unwrap();
    let mut renderer = fluxgpu_core::render::Renderer::new(Arc::clone(&ctx.queue), pass, pipeline, false).unwrap();
    renderer.set_attachment(0, color_image(&ctx, 640, 480)).unwrap();

    assert!(renderer.draw(3, 1, 0, 0).is_err());

    renderer.begin(DynamicState::default()).unwrap();
    assert!(renderer.draw(3, 1, 0, 0).is_ok());
    renderer.end().unwrap();
    assert!(renderer.draw(3, 1, 0, 0).is_err());
}

#[test]
fn attachment_changes_are_rejected_while_a_batch_is_active() {
    let ctx = common::setup();
    let pass = ctx.context.create_render_pass(&ctx.device, single_color_pass()).unwrap();
    let pipeline = ctx.context.create_render_pipeline(&ctx.device, basic_pipeline(), [640, 480]).unwrap();
    let mut renderer = fluxgpu_core::render::Renderer::new(Arc::clone(&ctx.queue), pass, pipeline, false).unwrap();
    renderer.set_attachment(0, color_image(&ctx, 640, 480)).unwrap();
    renderer.begin(DynamicState::default()).unwrap();

    assert!(renderer.set_attachment(0, color_image(&ctx, 640, 480)).is_err());
    assert!(renderer.set_attachments(vec![]).is_err());
}

#[test]
fn set_attachments_routes_depth_formatted_images_to_the_depth_slot() {
    let ctx = common::setup();
    let pass = ctx.context.create_render_pass(&ctx.device, color_and_depth_pass()).unwrap();
    let pipeline = ctx.context.create_render_pipeline(&ctx.device, basic_pipeline(), [640, 480]).unwrap();
    let mut renderer = fluxgpu_core::render::Renderer::new(Arc::clone(&ctx.queue), pass, pipeline, false).unwrap();

    let depth_desc = ImageDescriptor {
        format: depth_format(),
        width: 640,
        height: 480,
        depth: 1,
        layers: 1,
        samples: 1,
        mip_levels: 1,
        usage: MemoryFlags::default(),
        label: None,
    };
    let depth = ctx.context.create_image(&ctx.device, &ctx.queue, &depth_desc, None).unwrap();
    let color = color_image(&ctx, 640, 480);

    renderer.set_attachments(vec![color, depth]).unwrap();
    assert!(renderer.begin(DynamicState::default()).is_ok());
}

#[test]
fn set_attachments_rejects_a_depth_image_when_the_pass_declares_no_depth_attachment() {
    let ctx = common::setup();
    let pass = ctx.context.create_render_pass(&ctx.device, single_color_pass()).unwrap();
    let pipeline = ctx.context.create_render_pipeline(&ctx.device, basic_pipeline(), [640, 480]).unwrap();
    let mut renderer = fluxgpu_core::render::Renderer::new(Arc::clone(&ctx.queue), pass, pipeline, false).unwrap();

    let depth_desc = ImageDescriptor {
        format: depth_format(),
        width: 640,
        height: 480,
        depth: 1,
        layers: 1,
        samples: 1,
        mip_levels: 1,
        usage: MemoryFlags::default(),
        label: None,
    };
    let depth = ctx.context.create_image(&ctx.device, &ctx.queue, &depth_desc, None).unwrap();
    let color = color_image(&ctx, 640, 480);

    assert!(renderer.set_attachments(vec![color, depth]).is_err());
}

#[test]
fn begin_rejects_an_unbound_depth_slot_when_the_pass_declares_one() {
    let ctx = common::setup();
    let pass = ctx.context.create_render_pass(&ctx.device, color_and_depth_pass()).unwrap();
    let pipeline = ctx.context.create_render_pipeline(&ctx.device, basic_pipeline(), [640, 480]).unwrap();
    let mut renderer = fluxgpu_core::render::Renderer::new(Arc::clone(&ctx.queue), pass, pipeline, false).unwrap();

    let color = color_image(&ctx, 640, 480);
    renderer.set_attachment(0, color).unwrap();

    assert!(renderer.begin(DynamicState::default()).is_err());
}

#[test]
fn commit_requires_end_to_have_run_first() {
    let ctx = common::setup();
    let pass = ctx.context.create_render_pass(&ctx.device, single_color_pass()).unwrap();
    let pipeline = ctx.context.create_render_pipeline(&ctx.device, basic_pipeline(), [640, 480]).unwrap();
    let mut renderer = fluxgpu_core::render::Renderer::new(Arc::clone(&ctx.queue), pass, pipeline, false).unwrap();
    renderer.set_attachment(0, color_image(&ctx, 640, 480)).unwrap();

    assert!(renderer.commit().is_err());

    renderer.begin(DynamicState::default()).unwrap();
    renderer.draw(3, 1, 0, 0).unwrap();
    assert!(renderer.commit().is_err());

    renderer.end().unwrap();
    renderer.commit().unwrap();
}

#[test]
fn draw_indexed_is_recorded_the_same_way_as_draw() {
    let ctx = common::setup();
    let pass = ctx.context.create_render_pass(&ctx.device, single_color_pass()).unwrap();
    let pipeline = ctx.context.create_render_pipeline(&ctx.device, basic_pipeline(), [640, 480]).unwrap();
    let mut renderer = fluxgpu_core::render::Renderer::new(Arc::clone(&ctx.queue), pass, pipeline, false).unwrap();
    renderer.set_attachment(0, color_image(&ctx, 640, 480)).unwrap();

    let index_buffer = ctx
        .context
        .create_buffer(
            &ctx.device,
            &fluxgpu_types::BufferDescriptor::new(
                12,
                MemoryFlags::HOST_READ | MemoryFlags::HOST_WRITE | MemoryFlags::INDIRECT,
            ),
        )
        .unwrap();

    renderer.begin(DynamicState::default()).unwrap();
    renderer
        .draw_indexed(index_buffer, 3, 1, 0, 0, 0, IndexType::U16)
        .unwrap();
    renderer.end().unwrap();
    renderer.commit().unwrap();
}

#[test]
fn a_non_multi_view_pipeline_rejects_a_multi_view_renderer() {
    let ctx = common::setup();
    let pass = ctx.context.create_render_pass(&ctx.device, single_color_pass()).unwrap();
    let pipeline = ctx.context.create_render_pipeline(&ctx.device, basic_pipeline(), [640, 480]).unwrap();
    assert!(fluxgpu_core::render::Renderer::new(Arc::clone(&ctx.queue), pass, pipeline, true).is_err());
}

#[test]
fn get_next_drawable_fails_before_a_drawable_is_bound() {
    let ctx = common::setup();
    let pass = ctx.context.create_render_pass(&ctx.device, single_color_pass()).unwrap();
    let pipeline = ctx.context.create_render_pipeline(&ctx.device, basic_pipeline(), [640, 480]).unwrap();
    let mut renderer = fluxgpu_core::render::Renderer::new(Arc::clone(&ctx.queue), pass, pipeline, false).unwrap();

    assert!(renderer.get_next_drawable(false).is_err());

    renderer.bind_drawable(color_image(&ctx, 640, 480)).unwrap();
    assert!(renderer.get_next_drawable(false).is_ok());

    renderer.present().unwrap();
    assert!(renderer.get_next_drawable(false).is_err());
}
