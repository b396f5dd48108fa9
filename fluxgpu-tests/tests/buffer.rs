//! Buffer read/write/copy/fill/map semantics, run end-to-end against the
//! host-CPU backend (the one backend every memory operation here is fully
//! wired against; see `fluxgpu_hal::host`).

mod common;

use fluxgpu_types::{BufferDescriptor, HostAccess, MemoryFlags};

fn rw_buffer() -> MemoryFlags {
    MemoryFlags::HOST_READ | MemoryFlags::HOST_WRITE | MemoryFlags::COPY_SRC | MemoryFlags::COPY_DST
}

#[test]
fn write_then_read_roundtrips_within_bounds() {
    let ctx = common::setup();
    let buffer = ctx
        .context
        .create_buffer(&ctx.device, &BufferDescriptor::new(64, rw_buffer()))
        .unwrap();

    let payload: Vec<u8> = (0..64).collect();
    buffer.write(&ctx.queue, &payload, 0, 0).unwrap();

    let mut readback = vec![0u8; 64];
    buffer.read(&ctx.queue, &mut readback, 0, 0).unwrap();
    assert_eq!(readback, payload);
}

#[test]
fn write_then_read_respects_offset_and_size() {
    let ctx = common::setup();
    let buffer = ctx
        .context
        .create_buffer(&ctx.device, &BufferDescriptor::new(32, rw_buffer()))
        .unwrap();

    buffer.write(&ctx.queue, &[0xAA; 8], 8, 4).unwrap();

    let mut readback = vec![0u8; 8];
    buffer.read(&ctx.queue, &mut readback, 8, 4).unwrap();
    assert_eq!(readback, vec![0xAA; 8]);

    // Bytes outside the written window stay at their post-creation value.
    let mut whole = vec![0u8; 32];
    buffer.read(&ctx.queue, &mut whole, 0, 0).unwrap();
    assert!(whole[..4].iter().all(|&b| b == 0));
    assert!(whole[12..].iter().all(|&b| b == 0));
}

/// P2: `fill(pattern, k)` then `read()` yields `pattern[i mod k]` at every
/// position when `size % k == 0`. The exact scenario: a 4-byte pattern tiled
/// across a word-aligned buffer.
#[test]
fn fill_with_multi_byte_pattern_tiles_across_the_whole_range() {
    let ctx = common::setup();
    let size = 16u64;
    let buffer = ctx
        .context
        .create_buffer(&ctx.device, &BufferDescriptor::new(size, rw_buffer()))
        .unwrap();

    let pattern = 0xDEADBEEFu32.to_le_bytes();
    buffer.fill(&ctx.queue, &pattern, 0, 0).unwrap();

    let mut readback = vec![0u8; size as usize];
    buffer.read(&ctx.queue, &mut readback, 0, 0).unwrap();
    for (i, byte) in readback.iter().enumerate() {
        assert_eq!(*byte, pattern[i % pattern.len()], "byte {i} does not match tiled pattern");
    }
    for word in readback.chunks_exact(4) {
        assert_eq!(u32::from_le_bytes(word.try_into().unwrap()), 0xDEADBEEF);
    }
}

#[test]
fn fill_with_single_byte_pattern_and_zero_agree() {
    let ctx = common::setup();
    let buffer = ctx
        .context
        .create_buffer(&ctx.device, &BufferDescriptor::new(24, rw_buffer()))
        .unwrap();

    buffer.write(&ctx.queue, &[0xFF; 24], 0, 0).unwrap();
    buffer.zero(&ctx.queue).unwrap();

    let mut readback = vec![0xFFu8; 24];
    buffer.read(&ctx.queue, &mut readback, 0, 0).unwrap();
    assert!(readback.iter().all(|&b| b == 0));
}

/// P4: `map(WRITE_INVALIDATE); ...write...; unmap` is equivalent to `write`.
#[test]
fn map_write_discard_then_unmap_matches_a_plain_write() {
    let ctx = common::setup();
    let buffer = ctx
        .context
        .create_buffer(&ctx.device, &BufferDescriptor::new(16, rw_buffer()))
        .unwrap();

    let ptr = buffer.map(&ctx.queue, HostAccess::WriteDiscard, 16, 0).unwrap();
    let payload = [7u8; 16];
    unsafe { std::ptr::copy_nonoverlapping(payload.as_ptr(), ptr.as_ptr(), payload.len()) };
    buffer.unmap(&ctx.queue, ptr).unwrap();

    let mut via_map = vec![0u8; 16];
    buffer.read(&ctx.queue, &mut via_map, 0, 0).unwrap();

    let other = ctx
        .context
        .create_buffer(&ctx.device, &BufferDescriptor::new(16, rw_buffer()))
        .unwrap();
    other.write(&ctx.queue, &payload, 0, 0).unwrap();
    let mut via_write = vec![0u8; 16];
    other.read(&ctx.queue, &mut via_write, 0, 0).unwrap();

    assert_eq!(via_map, via_write);
}

/// P8: `copy(A,B); copy(B,C)` is associative — C's content equals A's up to
/// `min` sizes.
#[test]
fn chained_copies_are_associative() {
    let ctx = common::setup();
    let usage = rw_buffer();
    let a = ctx.context.create_buffer(&ctx.device, &BufferDescriptor::new(16, usage)).unwrap();
    let b = ctx.context.create_buffer(&ctx.device, &BufferDescriptor::new(16, usage)).unwrap();
    let c = ctx.context.create_buffer(&ctx.device, &BufferDescriptor::new(16, usage)).unwrap();

    let original: Vec<u8> = (1..=16).collect();
    a.write(&ctx.queue, &original, 0, 0).unwrap();

    b.copy(&ctx.queue, &a, 0, 0, 0).unwrap();
    c.copy(&ctx.queue, &b, 0, 0, 0).unwrap();

    let mut observed = vec![0u8; 16];
    c.read(&ctx.queue, &mut observed, 0, 0).unwrap();
    assert_eq!(observed, original);
}

#[test]
fn copy_truncates_to_the_smaller_buffer() {
    let ctx = common::setup();
    let src = ctx
        .context
        .create_buffer(&ctx.device, &BufferDescriptor::new(32, rw_buffer()))
        .unwrap();
    let dst = ctx
        .context
        .create_buffer(&ctx.device, &BufferDescriptor::new(8, rw_buffer()))
        .unwrap();

    let original: Vec<u8> = (0..32).collect();
    src.write(&ctx.queue, &original, 0, 0).unwrap();
    dst.copy(&ctx.queue, &src, 0, 0, 0).unwrap();

    let mut observed = vec![0u8; 8];
    dst.read(&ctx.queue, &mut observed, 0, 0).unwrap();
    assert_eq!(observed, &original[..8]);
}

#[test]
fn copy_rejects_a_buffer_copying_onto_itself() {
    let ctx = common::setup();
    let buffer = ctx
        .context
        .create_buffer(&ctx.device, &BufferDescriptor::new(16, rw_buffer()))
        .unwrap();
    assert!(buffer.copy(&ctx.queue, &buffer, 0, 0, 0).is_err());
}

#[test]
fn read_past_the_end_is_rejected() {
    let ctx = common::setup();
    let buffer = ctx
        .context
        .create_buffer(&ctx.device, &BufferDescriptor::new(16, rw_buffer()))
        .unwrap();
    let mut dst = vec![0u8; 4];
    assert!(buffer.read(&ctx.queue, &mut dst, 4, 14).is_err());
}

#[test]
fn write_without_host_write_access_is_rejected() {
    let ctx = common::setup();
    let buffer = ctx
        .context
        .create_buffer(&ctx.device, &BufferDescriptor::new(16, MemoryFlags::DEVICE_LOCAL))
        .unwrap();
    assert!(buffer.write(&ctx.queue, &[1, 2, 3, 4], 0, 0).is_err());
}
