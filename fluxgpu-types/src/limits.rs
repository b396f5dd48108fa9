/// Fixed capability/limit record reported by a device at enumeration time.
///
/// Field naming follows the capability record the original toolchain's
/// device description carries (compute units, work-group/image size caps,
/// feature-support booleans); expressed here as a flat `Copy` struct instead
/// of a class hierarchy since `fluxgpu-core::device::Device` only ever needs
/// to read it, never subclass it.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DeviceLimits {
    pub compute_units: u32,
    pub clock_mhz: u32,
    pub global_mem_size: u64,
    pub local_mem_size: u64,
    pub constant_mem_size: u64,
    pub max_mem_alloc: u64,

    pub max_work_group_size: [u32; 3],
    pub max_total_local_size: u32,

    pub max_image_1d_dim: u32,
    pub max_image_2d_dim: [u32; 2],
    pub max_image_3d_dim: [u32; 3],
    pub max_mip_levels: u32,

    pub double_support: bool,
    pub unified_memory: bool,
    pub basic_64_bit_atomics_support: bool,
    pub extended_64_bit_atomics_support: bool,
    pub sub_group_support: bool,
    pub cooperative_kernel_support: bool,

    pub image_support: bool,
    pub image_depth_support: bool,
    pub image_msaa_support: bool,
    pub image_cube_support: bool,
    pub image_mipmap_support: bool,
    pub image_gather_support: bool,
    pub image_read_write_support: bool,
}

impl Default for DeviceLimits {
    /// Conservative limits matching the host-CPU reference backend: no
    /// hardware image units, no atomics wider than 32 bit, a single
    /// "compute unit" standing in for the calling thread pool.
    fn default() -> Self {
        Self {
            compute_units: 1,
            clock_mhz: 0,
            global_mem_size: 0,
            local_mem_size: 0,
            constant_mem_size: 0,
            max_mem_alloc: u64::MAX,

            max_work_group_size: [1, 1, 1],
            max_total_local_size: 1,

            max_image_1d_dim: 0,
            max_image_2d_dim: [0, 0],
            max_image_3d_dim: [0, 0, 0],
            max_mip_levels: 1,

            double_support: true,
            unified_memory: true,
            basic_64_bit_atomics_support: true,
            extended_64_bit_atomics_support: false,
            sub_group_support: false,
            cooperative_kernel_support: false,

            image_support: false,
            image_depth_support: false,
            image_msaa_support: false,
            image_cube_support: false,
            image_mipmap_support: false,
            image_gather_support: false,
            image_read_write_support: false,
        }
    }
}
