//! Image subsystem: mip-chain resolution, generation, layout transitions,
//! host copy orchestration.
//!
//! Every per-mip operation funnels through [`apply_on_levels`], the one
//! higher-order walker that knows how to compute a given level's extent and
//! byte size; `zero`, `map`/`unmap`, and mip-chain generation are all thin
//! callers of it rather than separate loops, so a change to the walk order
//! or extent formula only has to happen in one place.

use std::mem::ManuallyDrop;
use std::sync::Arc;

use fluxgpu_hal::{Api, CommandEncoder as HalCommandEncoder, Device as HalDevice};
use fluxgpu_types::{mip_level_extent, BufferDescriptor, ImageDescriptor, ImageType, MemoryFlags};

use crate::device::Device;
use crate::error::{CoreError, Result};
use crate::queue::Queue;

/// One resolved mip level: its index, texel extent, and linear byte size.
#[derive(Debug, Clone, Copy)]
pub struct MipLevel {
    pub level: u32,
    pub extent: (u32, u32, u32),
    pub size_bytes: u64,
}

/// Walks every mip level of `format`/`base_extent` from 0 to
/// `level_count - 1` inclusive, calling `f(MipLevel)`. The one place that
/// knows how to turn a base extent and format into a per-level byte size;
/// `Image::zero`, `Image::map`, and mip generation all call this instead of
/// hand-rolling the loop.
pub fn apply_on_levels(format: ImageType, base_extent: (u32, u32, u32), level_count: u32, mut f: impl FnMut(MipLevel)) {
    let bytes_per_texel = format.bytes_per_texel() as u64;
    for level in 0..level_count {
        let extent = (
            mip_level_extent(base_extent.0, level),
            mip_level_extent(base_extent.1, level),
            mip_level_extent(base_extent.2, level),
        );
        let size_bytes = extent.0 as u64 * extent.1 as u64 * extent.2 as u64 * bytes_per_texel;
        f(MipLevel { level, extent, size_bytes });
    }
}

pub struct Image<A: Api> {
    device: Arc<Device<A>>,
    raw: ManuallyDrop<A::Image>,
    pub format: ImageType,
    pub extent: (u32, u32, u32),
    pub layers: u32,
    pub mip_levels: u32,
    pub usage: MemoryFlags,
    pub label: Option<String>,
}

impl<A: Api> std::fmt::Debug for Image<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Image")
            .field("format", &self.format)
            .field("extent", &self.extent)
            .field("mip_levels", &self.mip_levels)
            .field("label", &self.label)
            .finish()
    }
}

impl<A: Api> Image<A> {
    /// Creates the backend image and, for a mip-mapped image with no
    /// initial data, generates the full chain from level 0 by repeated 2x
    /// box-filter downsampling, matching the contract's "generate mipmaps"
    /// path. `initial_data`, when given, is the level-0 payload only; levels
    /// above it are always generated, never supplied directly, since the
    /// contract only ever accepts one upload per image at creation time.
    pub fn new(device: Arc<Device<A>>, queue: &Queue<A>, desc: &ImageDescriptor, initial_data: Option<&[u8]>) -> Result<Arc<Self>> {
        let mip_levels = desc.resolved_mip_levels(device.limits().max_mip_levels);
        let extent = (desc.width, desc.height.max(1), desc.depth.max(1));
        let raw = unsafe { device.raw.create_image(desc)? };

        let total_size: u64 = {
            let mut total = 0u64;
            apply_on_levels(desc.format, extent, mip_levels, |lvl| total += lvl.size_bytes);
            total
        };
        device.account(total_size as i64);

        let image = Arc::new(Self {
            device,
            raw: ManuallyDrop::new(raw),
            format: desc.format,
            extent,
            layers: desc.layers.max(1),
            mip_levels,
            usage: desc.usage,
            label: desc.label.clone(),
        });

        if let Some(data) = initial_data {
            image.upload_level(queue, 0, data)?;
            if desc.format.is_mipmapped() && mip_levels > 1 {
                image.generate_mip_chain(queue)?;
            }
        } else if desc.format.is_mipmapped() {
            image.zero(queue)?;
        }

        Ok(image)
    }

    pub(crate) fn raw(&self) -> &A::Image {
        &self.raw
    }

    fn upload_level(self: &Arc<Self>, queue: &Queue<A>, level: u32, data: &[u8]) -> Result<()> {
        let staging_desc = BufferDescriptor::new(
            data.len() as u64,
            MemoryFlags::HOST_VISIBLE | MemoryFlags::HOST_WRITE | MemoryFlags::COPY_SRC,
        );
        let staging = unsafe { self.device.raw.create_buffer(&staging_desc)? };
        let mapping = unsafe { self.device.raw.map_buffer(&staging, 0, data.len() as u64)? };
        unsafe {
            std::ptr::copy_nonoverlapping(data.as_ptr(), mapping.ptr.as_ptr(), data.len());
        }
        unsafe { self.device.raw.unmap_buffer(&staging)? };

        let mut encoder = queue.create_encoder()?;
        unsafe {
            encoder.begin_encoding(None)?;
            encoder.copy_buffer_to_image(&staging, 0, self.raw(), level, data.len() as u64);
            let commands = encoder.end_encoding()?;
            queue.submit_blocking(&[&commands])?;
        }
        unsafe { self.device.raw.destroy_buffer(staging) };
        Ok(())
    }

    /// Generates every mip level above 0 from the level below it via a 2x
    /// box filter, entirely on the host: downloads level `l-1`, averages
    /// 2x2(x2) texel blocks into level `l`, uploads the result. Only 8-bit
    /// unsigned-normalized formats are box-filtered; any other bit depth or
    /// data type falls back to nearest-neighbor (point) downsampling, since a
    /// correct box filter over floating-point or signed data needs a
    /// per-format accumulator this runtime does not carry.
    fn generate_mip_chain(self: &Arc<Self>, queue: &Queue<A>) -> Result<()> {
        let bytes_per_texel = self.format.bytes_per_texel() as usize;
        let mut prev_extent = self.extent;
        let mut prev_data = self.download_level(queue, 0, prev_extent)?;

        for level in 1..self.mip_levels {
            let extent = (
                mip_level_extent(self.extent.0, level),
                mip_level_extent(self.extent.1, level),
                mip_level_extent(self.extent.2, level),
            );
            let next_data = if self.format.bits_per_channel == 8 {
                box_filter_downsample(&prev_data, prev_extent, extent, bytes_per_texel)
            } else {
                nearest_downsample(&prev_data, prev_extent, extent, bytes_per_texel)
            };
            self.upload_level(queue, level, &next_data)?;
            prev_extent = extent;
            prev_data = next_data;
        }
        Ok(())
    }

    fn download_level(self: &Arc<Self>, queue: &Queue<A>, level: u32, extent: (u32, u32, u32)) -> Result<Vec<u8>> {
        let size = extent.0 as u64 * extent.1 as u64 * extent.2 as u64 * self.format.bytes_per_texel() as u64;
        let staging_desc = BufferDescriptor::new(
            size,
            MemoryFlags::HOST_VISIBLE | MemoryFlags::HOST_READ | MemoryFlags::COPY_DST,
        );
        let staging = unsafe { self.device.raw.create_buffer(&staging_desc)? };

        let mut encoder = queue.create_encoder()?;
        unsafe {
            encoder.begin_encoding(None)?;
            encoder.copy_image_to_buffer(self.raw(), level, &staging, 0, size);
            let commands = encoder.end_encoding()?;
            queue.submit_blocking(&[&commands])?;
        }

        let mapping = unsafe { self.device.raw.map_buffer(&staging, 0, size)? };
        let data = unsafe { std::slice::from_raw_parts(mapping.ptr.as_ptr(), size as usize).to_vec() };
        unsafe { self.device.raw.unmap_buffer(&staging)? };
        unsafe { self.device.raw.destroy_buffer(staging) };
        Ok(data)
    }

    /// Zeroes every mip level explicitly, level by level, per the contract's
    /// "two successive `zero()` calls yield the same result" property: each
    /// level is fully overwritten, not inferred from level 0.
    pub fn zero(self: &Arc<Self>, queue: &Queue<A>) -> Result<()> {
        let mut result = Ok(());
        apply_on_levels(self.format, self.extent, self.mip_levels, |lvl| {
            if result.is_ok() {
                result = (|| -> Result<()> {
                    let mut encoder = queue.create_encoder()?;
                    unsafe {
                        encoder.begin_encoding(None)?;
                        encoder.fill_image(self.raw(), lvl.level, lvl.size_bytes, 0);
                        let commands = encoder.end_encoding()?;
                        queue.submit_blocking(&[&commands])?;
                    }
                    Ok(())
                })();
            }
        });
        result
    }

    /// Maps every mip level into one contiguous host buffer, levels
    /// concatenated in mip-major order, per the contract. The caller owns the
    /// returned buffer and passes it back unchanged to `unmap` for the
    /// writeback.
    pub fn map(self: &Arc<Self>, queue: &Queue<A>) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        let mut err = None;
        apply_on_levels(self.format, self.extent, self.mip_levels, |lvl| {
            if err.is_none() {
                match self.download_level(queue, lvl.level, lvl.extent) {
                    Ok(chunk) => out.extend_from_slice(&chunk),
                    Err(e) => err = Some(e),
                }
            }
        });
        match err {
            Some(e) => Err(e),
            None => Ok(out),
        }
    }

    /// Writes `data` (laid out exactly as `map` returned it) back to every
    /// mip level.
    pub fn unmap(self: &Arc<Self>, queue: &Queue<A>, data: &[u8]) -> Result<()> {
        let mut offset = 0usize;
        let mut err = None;
        apply_on_levels(self.format, self.extent, self.mip_levels, |lvl| {
            if err.is_none() {
                let end = offset + lvl.size_bytes as usize;
                let chunk = data.get(offset..end);
                match chunk {
                    Some(chunk) => {
                        if let Err(e) = self.upload_level(queue, lvl.level, chunk) {
                            err = Some(e);
                        }
                    }
                    None => err = Some(CoreError::InvalidArgument("unmap data shorter than mip chain".into())),
                }
                offset = end;
            }
        });
        match err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl<A: Api> Drop for Image<A> {
    fn drop(&mut self) {
        let raw = unsafe { ManuallyDrop::take(&mut self.raw) };
        unsafe { self.device.raw.destroy_image(raw) };
    }
}

fn box_filter_downsample(src: &[u8], src_extent: (u32, u32, u32), dst_extent: (u32, u32, u32), bpt: usize) -> Vec<u8> {
    let (sw, sh, sd) = (src_extent.0 as usize, src_extent.1 as usize, src_extent.2 as usize);
    let (dw, dh, dd) = (dst_extent.0 as usize, dst_extent.1 as usize, dst_extent.2 as usize);
    let mut dst = vec![0u8; dw * dh * dd * bpt];

    for z in 0..dd {
        for y in 0..dh {
            for x in 0..dw {
                for c in 0..bpt {
                    let mut sum = 0u32;
                    let mut count = 0u32;
                    for dz in 0..2 {
                        let sz = (2 * z + dz).min(sd.saturating_sub(1));
                        for dy in 0..2 {
                            let sy = (2 * y + dy).min(sh.saturating_sub(1));
                            for dx in 0..2 {
                                let sx = (2 * x + dx).min(sw.saturating_sub(1));
                                let idx = (sz * sh * sw + sy * sw + sx) * bpt + c;
                                sum += src[idx] as u32;
                                count += 1;
                            }
                        }
                    }
                    let didx = (z * dh * dw + y * dw + x) * bpt + c;
                    dst[didx] = (sum / count.max(1)) as u8;
                }
            }
        }
    }
    dst
}

fn nearest_downsample(src: &[u8], src_extent: (u32, u32, u32), dst_extent: (u32, u32, u32), bpt: usize) -> Vec<u8> {
    let (sw, sh) = (src_extent.0 as usize, src_extent.1 as usize);
    let (dw, dh, dd) = (dst_extent.0 as usize, dst_extent.1 as usize, dst_extent.2 as usize);
    let mut dst = vec![0u8; dw * dh * dd * bpt];
    for z in 0..dd {
        for y in 0..dh {
            for x in 0..dw {
                let sx = (2 * x).min(sw.saturating_sub(1));
                let sy = (2 * y).min(sh.saturating_sub(1));
                let sz = 2 * z;
                let sidx = (sz * sh * sw + sy * sw + sx) * bpt;
                let didx = (z * dh * dw + y * dw + x) * bpt;
                dst[didx..didx + bpt].copy_from_slice(&src[sidx..sidx + bpt]);
            }
        }
    }
    dst
}

#[cfg(test)]
mod tests {
    use super::*;
    use fluxgpu_types::{ImageChannelLayout, ImageDataType, ImageDim, ImageTypeFlags};

    #[test]
    fn apply_on_levels_matches_expected_count_and_extents() {
        let format = ImageType::new(ImageDim::D2, ImageChannelLayout::Rgba, ImageDataType::UnsignedNormalized, 8, ImageTypeFlags::MIPMAPPED);
        let mut levels = Vec::new();
        apply_on_levels(format, (512, 512, 1), 10, |lvl| levels.push(lvl));
        assert_eq!(levels.len(), 10);
        assert_eq!(levels[0].extent, (512, 512, 1));
        assert_eq!(levels[9].extent, (1, 1, 1));
        assert_eq!(levels[0].size_bytes, 512 * 512 * 4);
    }

    #[test]
    fn box_filter_averages_2x2_block() {
        let src = vec![0u8, 0, 0, 0, 100, 100, 100, 100, 50, 50, 50, 50, 150, 150, 150, 150];
        let out = box_filter_downsample(&src, (2, 2, 1), (1, 1, 1), 4);
        assert_eq!(out, vec![75, 75, 75, 75]);
    }
}
