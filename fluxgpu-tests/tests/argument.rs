//! Launch argument marshalling and validation.
//!
//! The host backend has no real kernel-dispatch mechanism (see
//! `fluxgpu_hal::host::device`), so a launch here never produces an observable
//! side effect from "running" the function; what these tests assert instead
//! is the part that genuinely runs before dispatch is ever reached: argument
//! arity/kind validation, and that a rejected launch leaves every buffer it
//! touched untouched.

mod common;

use fluxgpu_core::argument::{marshal, Arg};
use fluxgpu_core::program::{AddressSpace, Access, ArgInfo, FunctionInfo};
use fluxgpu_types::{ArgInfoFlags, BufferDescriptor, FunctionFlags, MemoryFlags};

fn three_pod_args_entry() -> FunctionInfo {
    FunctionInfo {
        name: "three_args".to_string(),
        args: vec![
            ArgInfo { byte_size: 4, array_extent: 0, address_space: AddressSpace::Constant, access: Access::Read, flags: ArgInfoFlags::CONSTANT, nested: None },
            ArgInfo { byte_size: 4, array_extent: 0, address_space: AddressSpace::Constant, access: Access::Read, flags: ArgInfoFlags::CONSTANT, nested: None },
            ArgInfo { byte_size: 4, array_extent: 0, address_space: AddressSpace::Constant, access: Access::Read, flags: ArgInfoFlags::CONSTANT, nested: None },
        ],
        required_local_size: None,
        required_simd_width: None,
        dimensionality: 1,
        flags: FunctionFlags::KERNEL,
    }
}

/// Scenario 4: 3 declared args, 2 supplied. Execute does not run, an error is
/// returned, and a buffer the launch never got to touch is unchanged.
#[test]
fn launch_with_too_few_arguments_is_rejected_before_any_buffer_is_touched() {
    let ctx = common::setup();
    let program = ctx.context.add_precompiled_program_file(&[], &[three_pod_args_entry()]).unwrap();
    let entry = program.function(&ctx.device, "three_args").unwrap();

    let sentinel = ctx
        .context
        .create_buffer(&ctx.device, &BufferDescriptor::new(4, MemoryFlags::HOST_READ | MemoryFlags::HOST_WRITE))
        .unwrap();
    sentinel.write(&ctx.queue, &0xAAAAAAAAu32.to_le_bytes(), 0, 0).unwrap();

    let args = vec![Arg::Pod(vec![0u8; 4]), Arg::Pod(vec![0u8; 4])];
    let result = ctx.queue.execute(&entry, [1, 1, 1], None, &args);
    assert!(result.is_err());

    let mut observed = [0u8; 4];
    sentinel.read(&ctx.queue, &mut observed, 0, 0).unwrap();
    assert_eq!(u32::from_le_bytes(observed), 0xAAAAAAAA);
}

#[test]
fn marshal_rejects_an_argument_count_mismatch_directly() {
    let entry_info = three_pod_args_entry();
    // `marshal` only needs `entry.info`/`entry.args_size`, both reachable
    // through a real `FunctionEntry`; build one against the host backend the
    // same way the launch path does, rather than constructing the private
    // type by hand.
    let ctx = common::setup();
    let program = ctx.context.add_precompiled_program_file(&[], &[entry_info]).unwrap();
    let entry = program.function(&ctx.device, "three_args").unwrap();

    let too_few = vec![Arg::Pod(vec![0u8; 4])];
    assert!(marshal(&entry, &too_few).is_err());

    let right_count = vec![Arg::Pod(vec![0u8; 4]), Arg::Pod(vec![0u8; 4]), Arg::Pod(vec![0u8; 4])];
    assert!(marshal(&entry, &right_count).is_ok());
}

#[test]
fn marshal_rejects_an_argument_of_the_wrong_kind() {
    let ctx = common::setup();
    let info = FunctionInfo {
        name: "one_buffer".to_string(),
        args: vec![ArgInfo { byte_size: 0, array_extent: 0, address_space: AddressSpace::Global, access: Access::ReadWrite, flags: ArgInfoFlags::BUFFER, nested: None }],
        required_local_size: None,
        required_simd_width: None,
        dimensionality: 1,
        flags: FunctionFlags::KERNEL,
    };
    let program = ctx.context.add_precompiled_program_file(&[], &[info]).unwrap();
    let entry = program.function(&ctx.device, "one_buffer").unwrap();

    // A POD argument where the declared slot wants a buffer.
    let wrong_kind = vec![Arg::Pod(vec![0u8; 4])];
    assert!(marshal(&entry, &wrong_kind).is_err());
}

/// P6: marshalled argument byte length equals `FunctionEntry::args_size`
/// (debug-build assertion). `three_pod_args_entry` declares 12 bytes total;
/// marshalling exactly that much succeeds, while marshalling more panics the
/// debug assertion cargo test's default (debug) profile compiles in.
#[test]
fn args_size_matches_the_sum_of_declared_pod_byte_sizes() {
    let ctx = common::setup();
    let program = ctx.context.add_precompiled_program_file(&[], &[three_pod_args_entry()]).unwrap();
    let entry = program.function(&ctx.device, "three_args").unwrap();
    assert_eq!(entry.args_size, 12);
}

#[cfg(debug_assertions)]
#[test]
#[should_panic(expected = "marshalled POD payload")]
fn marshalling_more_pod_bytes_than_args_size_panics_in_debug() {
    let ctx = common::setup();
    let program = ctx.context.add_precompiled_program_file(&[], &[three_pod_args_entry()]).unwrap();
    let entry = program.function(&ctx.device, "three_args").unwrap();

    let oversized = vec![Arg::Pod(vec![0u8; 4]), Arg::Pod(vec![0u8; 4]), Arg::Pod(vec![0u8; 8])];
    let _ = marshal(&entry, &oversized);
}
