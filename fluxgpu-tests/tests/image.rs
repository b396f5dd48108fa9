//! Image mip-chain resolution, zeroing, and map/unmap round-tripping.

mod common;

use fluxgpu_types::{
    ImageChannelLayout, ImageDataType, ImageDescriptor, ImageDim, ImageType, ImageTypeFlags, MemoryFlags,
};

fn mipmapped_rgba8(width: u32, height: u32, mip_levels: u32) -> ImageDescriptor {
    ImageDescriptor {
        format: ImageType::new(
            ImageDim::D2,
            ImageChannelLayout::Rgba,
            ImageDataType::UnsignedNormalized,
            8,
            ImageTypeFlags::MIPMAPPED,
        ),
        width,
        height,
        depth: 1,
        layers: 1,
        samples: 1,
        mip_levels,
        usage: MemoryFlags::HOST_READ | MemoryFlags::HOST_WRITE | MemoryFlags::COPY_SRC | MemoryFlags::COPY_DST,
        label: None,
    }
}

/// Scenario 2: a 512x512 RGBA8-unorm mip-mapped image with 10 levels, zeroed,
/// every level observed all-zero with the `max(1, dim >> level)` extent.
#[test]
fn zeroed_mip_chain_is_all_zero_with_correct_per_level_dimensions() {
    let ctx = common::setup();
    let desc = mipmapped_rgba8(512, 512, 10);
    let image = ctx.context.create_image(&ctx.device, &ctx.queue, &desc, None).unwrap();

    assert_eq!(image.mip_levels, 10);

    let mapped = image.map(&ctx.queue).unwrap();
    assert!(mapped.iter().all(|&b| b == 0));

    let mut expected_total = 0u64;
    let mut expected_dims = Vec::new();
    fluxgpu_core::image::apply_on_levels(desc.format, (512, 512, 1), 10, |lvl| {
        expected_dims.push(lvl.extent);
        expected_total += lvl.size_bytes;
    });
    assert_eq!(mapped.len() as u64, expected_total);
    assert_eq!(expected_dims[0], (512, 512, 1));
    assert_eq!(expected_dims[9], (1, 1, 1));
}

/// P3: mip-chain level `l` has dimension `max(1, dim >> l)`.
#[test]
fn every_level_halves_until_it_floors_at_one() {
    let desc = mipmapped_rgba8(300, 100, 0);
    assert_eq!(desc.resolved_mip_levels(u32::MAX), 9); // 300 needs 9 bits, so the chain runs 512 down to 1

    let mut levels = Vec::new();
    fluxgpu_core::image::apply_on_levels(desc.format, (300, 100, 1), desc.resolved_mip_levels(u32::MAX), |lvl| {
        levels.push(lvl.extent)
    });
    assert_eq!(levels[0], (300, 100, 1));
    assert_eq!(*levels.last().unwrap(), (1, 1, 1));
    for window in levels.windows(2) {
        let (prev, next) = (window[0], window[1]);
        assert_eq!(next.0, (prev.0 >> 1).max(1));
        assert_eq!(next.1, (prev.1 >> 1).max(1));
    }
}

/// P7: two successive `zero()` calls yield the same all-zero content as one.
#[test]
fn double_zero_is_idempotent() {
    let ctx = common::setup();
    let desc = mipmapped_rgba8(64, 64, 4);
    let image = ctx.context.create_image(&ctx.device, &ctx.queue, &desc, None).unwrap();

    image.zero(&ctx.queue).unwrap();
    let first = image.map(&ctx.queue).unwrap();
    image.zero(&ctx.queue).unwrap();
    let second = image.map(&ctx.queue).unwrap();

    assert_eq!(first, second);
    assert!(second.iter().all(|&b| b == 0));
}

#[test]
fn unmap_writes_back_exactly_what_was_mapped() {
    let ctx = common::setup();
    let desc = mipmapped_rgba8(16, 16, 1);
    let image = ctx.context.create_image(&ctx.device, &ctx.queue, &desc, None).unwrap();

    let mut data = image.map(&ctx.queue).unwrap();
    for (i, byte) in data.iter_mut().enumerate() {
        *byte = (i % 256) as u8;
    }
    image.unmap(&ctx.queue, &data).unwrap();

    let readback = image.map(&ctx.queue).unwrap();
    assert_eq!(readback, data);
}

#[test]
fn an_explicit_single_level_descriptor_stays_at_one_level() {
    let desc = ImageDescriptor {
        format: ImageType::new(ImageDim::D2, ImageChannelLayout::Rgba, ImageDataType::UnsignedNormalized, 8, ImageTypeFlags::empty()),
        width: 128,
        height: 128,
        depth: 1,
        layers: 1,
        samples: 1,
        mip_levels: 1,
        usage: MemoryFlags::default(),
        label: None,
    };
    assert_eq!(desc.resolved_mip_levels(u32::MAX), 1);
}

#[test]
fn a_zero_mip_levels_request_resolves_to_the_full_chain_regardless_of_the_mipmapped_flag() {
    let desc = ImageDescriptor {
        format: ImageType::new(ImageDim::D2, ImageChannelLayout::Rgba, ImageDataType::UnsignedNormalized, 8, ImageTypeFlags::empty()),
        width: 128,
        height: 128,
        depth: 1,
        layers: 1,
        samples: 1,
        mip_levels: 0,
        usage: MemoryFlags::default(),
        label: None,
    };
    assert_eq!(desc.resolved_mip_levels(u32::MAX), 8);
}
