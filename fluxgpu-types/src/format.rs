use bitflags::bitflags;

/// Base dimensionality of an image, independent of array/cube/MSAA framing.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ImageDim {
    D1 = 1,
    D2 = 2,
    D3 = 3,
}

/// Channel layout of an image's texel format.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ImageChannelLayout {
    R = 1,
    Rg = 2,
    Rgb = 3,
    Rgba = 4,
}

impl ImageChannelLayout {
    pub fn channel_count(self) -> u32 {
        self as u8 as u32
    }
}

/// How the bits of each channel are interpreted.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ImageDataType {
    UnsignedInt,
    SignedInt,
    Float,
    /// Integer storage, sampled/resolved as `[0, 1]` floating point.
    UnsignedNormalized,
    /// Integer storage, sampled/resolved as `[-1, 1]` floating point.
    SignedNormalized,
}

bitflags! {
    /// Sub-type flags layered on top of [`ImageDim`]/[`ImageChannelLayout`]/
    /// [`ImageDataType`] to fully describe an image resource, following the
    /// packed bitfield shape used by the source toolchain's image-type
    /// enumeration: dimension and format occupy low bits, orthogonal
    /// capability flags occupy high bits, so a 32-bit value is sufficient to
    /// round-trip through the FUBAR binary header (see `fluxgpu_core::program`).
    #[repr(transparent)]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct ImageTypeFlags: u32 {
        const ARRAY     = 1 << 0;
        const BUFFER    = 1 << 1;
        const CUBE      = 1 << 2;
        const DEPTH     = 1 << 3;
        const STENCIL   = 1 << 4;
        const MSAA      = 1 << 5;
        const MIPMAPPED = 1 << 6;
        /// Usable as both a sampled read source and a write target.
        const READ_WRITE = 1 << 7;
    }
}

/// A fully packed image type: dimension, channel layout, data type and the
/// orthogonal capability flags above, mirroring the wire format carried in
/// `fluxgpu-core`'s program metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ImageType {
    pub dim: ImageDim,
    pub channel_layout: ImageChannelLayout,
    pub data_type: ImageDataType,
    /// Bits per channel; one of 8, 16, 32 or 64.
    pub bits_per_channel: u8,
    pub flags: ImageTypeFlags,
}

impl ImageType {
    pub fn new(
        dim: ImageDim,
        channel_layout: ImageChannelLayout,
        data_type: ImageDataType,
        bits_per_channel: u8,
        flags: ImageTypeFlags,
    ) -> Self {
        debug_assert!(
            matches!(bits_per_channel, 8 | 16 | 32 | 64),
            "bits_per_channel must be 8, 16, 32 or 64"
        );
        Self {
            dim,
            channel_layout,
            data_type,
            bits_per_channel,
            flags,
        }
    }

    pub fn is_array(&self) -> bool {
        self.flags.contains(ImageTypeFlags::ARRAY)
    }

    pub fn is_cube(&self) -> bool {
        self.flags.contains(ImageTypeFlags::CUBE)
    }

    pub fn is_depth(&self) -> bool {
        self.flags.contains(ImageTypeFlags::DEPTH)
    }

    pub fn is_msaa(&self) -> bool {
        self.flags.contains(ImageTypeFlags::MSAA)
    }

    pub fn is_mipmapped(&self) -> bool {
        self.flags.contains(ImageTypeFlags::MIPMAPPED)
    }

    /// Size in bytes of a single texel of this format.
    pub fn bytes_per_texel(&self) -> u32 {
        self.channel_layout.channel_count() * (self.bits_per_channel as u32 / 8)
    }
}

/// The dimension of a single mip level, computed the same way on every
/// backend: halved per level, floored to 1. Shared by
/// `fluxgpu-core::image`'s mip-chain walker so every backend generates an
/// identical chain length for a given base extent.
pub fn mip_level_extent(base_extent: u32, level: u32) -> u32 {
    (base_extent >> level).max(1)
}

/// Number of mip levels in a full chain down to a 1x1(x1) base extent.
pub fn full_mip_chain_levels(max_extent: u32) -> u32 {
    if max_extent == 0 {
        1
    } else {
        32 - max_extent.leading_zeros()
    }
}

/// Descriptor for allocating an image resource. `format` carries the full
/// packed type; `width`/`height`/`depth` are always texel-addressed (i.e.
/// `depth` is 1 for a 2D image, and is instead the layer count when
/// `format.is_array()`).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ImageDescriptor {
    pub format: ImageType,
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    /// Array layer count; 1 if `format` is not an array type.
    pub layers: u32,
    /// MSAA sample count; 1 if `format` is not an MSAA type.
    pub samples: u32,
    /// Requested mip levels; 0 means "generate a full chain down to 1x1".
    pub mip_levels: u32,
    pub usage: crate::MemoryFlags,
    pub label: Option<String>,
}

impl ImageDescriptor {
    /// Resolves `mip_levels == 0` into the full chain length implied by this
    /// image's base extent, per the `max(1, dim >> level)` walk, then clamps
    /// against `max_mip_levels` (a device's `DeviceLimits::max_mip_levels`),
    /// per `mip_level_count = min(mip_level_limit, ...)`.
    pub fn resolved_mip_levels(&self, max_mip_levels: u32) -> u32 {
        let natural = if self.mip_levels != 0 {
            self.mip_levels
        } else {
            let max_extent = self.width.max(self.height).max(self.depth);
            full_mip_chain_levels(max_extent)
        };
        natural.min(max_mip_levels.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mip_level_extent_floors_at_one() {
        assert_eq!(mip_level_extent(256, 0), 256);
        assert_eq!(mip_level_extent(256, 8), 1);
        assert_eq!(mip_level_extent(256, 20), 1);
        assert_eq!(mip_level_extent(3, 1), 1);
    }

    #[test]
    fn full_mip_chain_levels_matches_pow2() {
        assert_eq!(full_mip_chain_levels(1), 1);
        assert_eq!(full_mip_chain_levels(256), 9);
        assert_eq!(full_mip_chain_levels(255), 8);
    }

    #[test]
    fn bytes_per_texel_rgba8() {
        let ty = ImageType::new(
            ImageDim::D2,
            ImageChannelLayout::Rgba,
            ImageDataType::UnsignedNormalized,
            8,
            ImageTypeFlags::empty(),
        );
        assert_eq!(ty.bytes_per_texel(), 4);
    }
}
