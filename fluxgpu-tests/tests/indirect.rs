//! Indirect command pipeline bookkeeping and `execute_indirect` range
//! validation.
//!
//! `complete()` never actually builds a backend indirect buffer on the host
//! backend (see `fluxgpu_core::indirect`): what's tested here is the
//! completed/not-completed gate, slot-count bookkeeping, and the
//! `[offset, offset+count)` range validation `execute_indirect` performs
//! before it ever gets to a backend submission. `resolve_range`/`slots_in`
//! are crate-private, so every assertion here goes through the public
//! `IndirectCommandPipeline` methods and `Queue::execute_indirect` directly.

mod common;

use fluxgpu_core::indirect::{IndirectCommandPipeline, IndirectKind};
use fluxgpu_core::queue::ExecuteParams;
use fluxgpu_types::IndirectCommandPipelineDescriptor;

fn pipeline_descriptor(max_command_count: u32) -> IndirectCommandPipelineDescriptor {
    IndirectCommandPipelineDescriptor { max_command_count, ..Default::default() }
}

#[test]
fn a_zero_slot_pipeline_is_rejected_at_construction() {
    let ctx = common::setup();
    let result = IndirectCommandPipeline::new(
        std::sync::Arc::clone(&ctx.device),
        IndirectKind::Compute,
        &pipeline_descriptor(0),
    );
    assert!(result.is_err());
}

#[test]
fn command_count_matches_what_was_requested_and_reset_does_not_change_it() {
    let ctx = common::setup();
    let mut pipeline = IndirectCommandPipeline::new(
        std::sync::Arc::clone(&ctx.device),
        IndirectKind::Compute,
        &pipeline_descriptor(8),
    )
    .unwrap();
    assert_eq!(pipeline.command_count(), 8);

    std::sync::Arc::get_mut(&mut pipeline).unwrap().reset();
    assert_eq!(pipeline.command_count(), 8);
}

#[test]
fn encode_compute_on_a_render_kind_pipeline_is_rejected() {
    let ctx = common::setup();
    let mut pipeline = IndirectCommandPipeline::new(
        std::sync::Arc::clone(&ctx.device),
        IndirectKind::Render,
        &pipeline_descriptor(4),
    )
    .unwrap();
    let pipeline = std::sync::Arc::get_mut(&mut pipeline).unwrap();

    let program = ctx
        .context
        .add_precompiled_program_file(
            &[],
            &[fluxgpu_core::program::FunctionInfo {
                name: "noop".to_string(),
                args: vec![],
                required_local_size: None,
                required_simd_width: None,
                dimensionality: 1,
                flags: fluxgpu_types::FunctionFlags::KERNEL,
            }],
        )
        .unwrap();
    let entry = program.function(&ctx.device, "noop").unwrap();

    let command = fluxgpu_core::indirect::ComputeCommand {
        kernel: entry,
        dim: 1,
        global_work_size: [1, 1, 1],
        local_work_size: None,
        args: vec![],
        barrier: false,
    };
    assert!(pipeline.encode_compute(0, command).is_err());
}

#[test]
fn encoding_an_out_of_range_slot_is_rejected() {
    let ctx = common::setup();
    let mut pipeline = IndirectCommandPipeline::new(
        std::sync::Arc::clone(&ctx.device),
        IndirectKind::Compute,
        &pipeline_descriptor(2),
    )
    .unwrap();
    let pipeline = std::sync::Arc::get_mut(&mut pipeline).unwrap();

    let program = ctx
        .context
        .add_precompiled_program_file(
            &[],
            &[fluxgpu_core::program::FunctionInfo {
                name: "noop".to_string(),
                args: vec![],
                required_local_size: None,
                required_simd_width: None,
                dimensionality: 1,
                flags: fluxgpu_types::FunctionFlags::KERNEL,
            }],
        )
        .unwrap();
    let entry = program.function(&ctx.device, "noop").unwrap();

    let command = fluxgpu_core::indirect::ComputeCommand {
        kernel: entry,
        dim: 1,
        global_work_size: [1, 1, 1],
        local_work_size: None,
        args: vec![],
        barrier: false,
    };
    assert!(pipeline.encode_compute(2, command).is_err());
}

#[test]
fn execute_indirect_is_rejected_before_complete_is_called() {
    let ctx = common::setup();
    let pipeline = IndirectCommandPipeline::new(
        std::sync::Arc::clone(&ctx.device),
        IndirectKind::Compute,
        &pipeline_descriptor(4),
    )
    .unwrap();

    let result = ctx.queue.execute_indirect(&pipeline, ExecuteParams::default(), None, 0, 4);
    assert!(result.is_err());
}

#[test]
fn execute_indirect_accepts_the_to_the_end_sentinel_and_a_valid_subrange() {
    let ctx = common::setup();
    let mut pipeline = IndirectCommandPipeline::new(
        std::sync::Arc::clone(&ctx.device),
        IndirectKind::Compute,
        &pipeline_descriptor(4),
    )
    .unwrap();
    std::sync::Arc::get_mut(&mut pipeline).unwrap().complete().unwrap();

    ctx.queue.execute_indirect(&pipeline, ExecuteParams::default(), None, 0, u32::MAX).unwrap();
    ctx.queue.execute_indirect(&pipeline, ExecuteParams::default(), None, 1, 2).unwrap();
}

#[test]
fn execute_indirect_rejects_a_range_past_the_slot_count() {
    let ctx = common::setup();
    let mut pipeline = IndirectCommandPipeline::new(
        std::sync::Arc::clone(&ctx.device),
        IndirectKind::Compute,
        &pipeline_descriptor(4),
    )
    .unwrap();
    std::sync::Arc::get_mut(&mut pipeline).unwrap().complete().unwrap();

    assert!(ctx.queue.execute_indirect(&pipeline, ExecuteParams::default(), None, 3, 4).is_err());
}

#[test]
fn reset_clears_the_completed_flag() {
    let ctx = common::setup();
    let mut pipeline = IndirectCommandPipeline::new(
        std::sync::Arc::clone(&ctx.device),
        IndirectKind::Compute,
        &pipeline_descriptor(4),
    )
    .unwrap();
    let pipeline_mut = std::sync::Arc::get_mut(&mut pipeline).unwrap();
    pipeline_mut.complete().unwrap();
    assert!(pipeline_mut.is_completed());

    pipeline_mut.reset();
    assert!(!pipeline_mut.is_completed());
    assert!(ctx.queue.execute_indirect(&pipeline, ExecuteParams::default(), None, 0, 1).is_err());
}
