//! Hardware abstraction layer for fluxgpu.
//!
//! Each backend (`vulkan`, `metal`, `cuda`, `opencl`, `host`) implements the
//! [`Api`] trait and its associated-type family. `fluxgpu-core` is generic
//! over `A: Api` and never references a concrete backend directly; this
//! mirrors how `wgpu-core` is generic over `wgpu_hal::Api`.
//!
//! Only `host` is unconditionally compiled; the others are cfg-gated behind
//! their own Cargo feature and, where relevant, a target-OS constraint
//! (Metal only builds on Apple targets).

use std::fmt;

pub use fluxgpu_types::{Backend, DeviceLimits, Vendor};

#[cfg(feature = "host")]
pub mod host;

#[cfg(feature = "vulkan")]
pub mod vulkan;

#[cfg(all(feature = "metal", any(target_os = "macos", target_os = "ios")))]
pub mod metal;

#[cfg(feature = "cuda")]
pub mod cuda;

#[cfg(feature = "opencl")]
pub mod opencl;

/// A submission index. Fences compare values of this type; a fence is
/// considered "reached" a value once every submission up to and including
/// that value has completed on the device.
pub type FenceValue = fluxgpu_types::FenceValue;

/// Upper bound on simultaneously bound buffer/image arguments in a single
/// function launch, shared by every backend's descriptor-pool sizing.
pub const MAX_BOUND_ARGUMENTS: usize = 64;
/// Upper bound on color attachments in a single render pass.
pub const MAX_COLOR_ATTACHMENTS: usize = 8;
/// Upper bound on vertex buffer bindings in a single render pipeline.
pub const MAX_VERTEX_BUFFERS: usize = 16;

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum DeviceError {
    #[error("out of memory")]
    OutOfMemory,
    #[error("device lost")]
    Lost,
    #[error("resource creation failed: {0}")]
    ResourceCreationFailed(String),
    #[error("unsupported: {0}")]
    Unsupported(String),
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum InstanceError {
    #[error("no compatible device found for this backend")]
    NoCompatibleDevice,
    #[error("backend initialization failed: {0}")]
    Failed(String),
}

/// A device-enumeration record produced by [`Instance::enumerate_devices`].
/// Deliberately mirrors [`fluxgpu_types::DeviceLimits`] plus identity fields
/// a caller picks a device by.
#[derive(Debug, Clone)]
pub struct ExposedDevice<A: Api> {
    pub device_id: A::RawDeviceId,
    pub name: String,
    pub vendor: Vendor,
    pub is_host: bool,
    pub limits: DeviceLimits,
}

/// The root trait every backend implements. Associated types stand in for
/// backend-native handles (a Vulkan `VkDevice`, a CUDA `CUdevice`, ...); the
/// sub-traits below (`Instance`, `Device`, `Queue`, `Fence`) are implemented
/// on those associated types.
pub trait Api: Clone + fmt::Debug + Sized + Send + Sync + 'static {
    type Instance: Instance<A = Self>;
    type RawDeviceId: Clone + fmt::Debug + Send + Sync;
    type Device: Device<A = Self>;
    type Queue: Queue<A = Self>;
    type Fence: Fence;
    type Buffer: fmt::Debug + Send + Sync;
    type Image: fmt::Debug + Send + Sync;
    type Program: fmt::Debug + Send + Sync;
    type CommandEncoder: CommandEncoder<A = Self>;

    const BACKEND: Backend;
}

pub trait Instance: Sized + fmt::Debug + Send + Sync {
    type A: Api;

    /// Backend-specific initialization (loading the driver entry point,
    /// creating a `VkInstance`/`CUcontext`/ICD platform handle). Never
    /// touches a specific device.
    fn init() -> Result<Self, InstanceError>;

    /// Enumerate every device this backend can see. Order is not stable
    /// across driver updates; callers that need a stable handle should key
    /// off `ExposedDevice::name` plus `vendor`, not index.
    fn enumerate_devices(&self) -> Vec<ExposedDevice<Self::A>>;

    /// Create a logical device + its default queue for one enumerated
    /// device record.
    fn open(
        &self,
        exposed: &ExposedDevice<Self::A>,
    ) -> Result<(<Self::A as Api>::Device, <Self::A as Api>::Queue), DeviceError>;
}

/// Result of [`Device::map_buffer`]: a host pointer valid for `size` bytes
/// until the matching [`Device::unmap_buffer`] call.
#[derive(Debug)]
pub struct BufferMapping {
    pub ptr: std::ptr::NonNull<u8>,
    pub size: u64,
}

unsafe impl Send for BufferMapping {}
unsafe impl Sync for BufferMapping {}

pub trait Device: Sized + fmt::Debug + Send + Sync {
    type A: Api;

    fn limits(&self) -> &DeviceLimits;

    unsafe fn create_buffer(
        &self,
        desc: &fluxgpu_types::BufferDescriptor,
    ) -> Result<<Self::A as Api>::Buffer, DeviceError>;
    unsafe fn destroy_buffer(&self, buffer: <Self::A as Api>::Buffer);

    /// Expose `size` bytes of `buffer` starting at `offset` as a host
    /// pointer. Only guaranteed to succeed for a buffer created with
    /// [`fluxgpu_types::MemoryFlags::HOST_VISIBLE`]; callers needing to read
    /// or write a device-local buffer must stage through a host-visible one
    /// and a `copy_buffer_to_buffer` instead, mirroring how a non-mappable
    /// `wgpu::Buffer` is handled one layer up.
    unsafe fn map_buffer(
        &self,
        buffer: &<Self::A as Api>::Buffer,
        offset: u64,
        size: u64,
    ) -> Result<BufferMapping, DeviceError>;
    unsafe fn unmap_buffer(&self, buffer: &<Self::A as Api>::Buffer) -> Result<(), DeviceError>;

    unsafe fn create_image(
        &self,
        desc: &fluxgpu_types::ImageDescriptor,
    ) -> Result<<Self::A as Api>::Image, DeviceError>;
    unsafe fn destroy_image(&self, image: <Self::A as Api>::Image);

    unsafe fn create_fence(&self, signalled: bool) -> Result<<Self::A as Api>::Fence, DeviceError>;
    unsafe fn destroy_fence(&self, fence: <Self::A as Api>::Fence);

    /// Highest value `fence` is known to have reached without blocking.
    unsafe fn get_fence_value(&self, fence: &<Self::A as Api>::Fence) -> Result<FenceValue, DeviceError>;

    /// Block the calling thread until `fence` reaches `value`, or
    /// `timeout_ms` elapses (`None` blocks indefinitely). Returns whether the
    /// fence reached the value (`true`) or the wait timed out (`false`).
    unsafe fn wait_for_fence(
        &self,
        fence: &<Self::A as Api>::Fence,
        value: FenceValue,
        timeout_ms: Option<u32>,
    ) -> Result<bool, DeviceError>;

    unsafe fn create_command_encoder(
        &self,
    ) -> Result<<Self::A as Api>::CommandEncoder, DeviceError>;

    /// Opens an additional queue against this already-open device, for
    /// callers that want more than the one default queue `Instance::open`
    /// hands back. Every backend here implements this by creating a fresh
    /// native queue/stream bound to the same device/context state, never by
    /// reopening the device itself.
    unsafe fn create_queue(&self) -> Result<<Self::A as Api>::Queue, DeviceError>;

    /// Loads a compiled device-native binary and resolves one entry point
    /// out of it. `payload`'s expected shape is backend-specific (SPIR-V
    /// words on Vulkan, a `.metallib` blob on Metal, PTX/cubin on CUDA,
    /// UTF-8 OpenCL C source on OpenCL); `fluxgpu-core::program`'s loader is
    /// responsible for handing each backend the triple its FUBAR index
    /// selected for it.
    unsafe fn create_program(
        &self,
        payload: &[u8],
        entry_point: &str,
    ) -> Result<<Self::A as Api>::Program, DeviceError>;
    unsafe fn destroy_program(&self, program: <Self::A as Api>::Program);
}

pub trait Queue: Sized + fmt::Debug + Send + Sync {
    type A: Api;

    /// Submit previously-recorded command buffers, optionally signalling
    /// `fence` to `value` once the whole batch has retired.
    unsafe fn submit(
        &self,
        command_buffers: &[&<<Self::A as Api>::CommandEncoder as CommandEncoder>::CommandBuffer],
        signal_fence: Option<(&mut <Self::A as Api>::Fence, FenceValue)>,
    ) -> Result<(), DeviceError>;
}

/// Cross-queue/cross-thread synchronization primitive. A bare data holder —
/// operations on it (`get_fence_value`, `wait_for_fence`) live on [`Device`]
/// because every real backend needs the owning device handle to query or
/// wait on one. See `fluxgpu-core::fence` for the state machine built atop
/// this (fresh → signalled ↔ waited).
pub trait Fence: Sized + fmt::Debug + Send + Sync {}

pub trait CommandEncoder: Sized + fmt::Debug + Send + Sync {
    type A: Api;
    type CommandBuffer: fmt::Debug + Send + Sync;

    unsafe fn begin_encoding(&mut self, label: Option<&str>) -> Result<(), DeviceError>;
    unsafe fn end_encoding(&mut self) -> Result<Self::CommandBuffer, DeviceError>;

    unsafe fn copy_buffer_to_buffer(
        &mut self,
        src: &<Self::A as Api>::Buffer,
        src_offset: u64,
        dst: &<Self::A as Api>::Buffer,
        dst_offset: u64,
        size: u64,
    );

    unsafe fn fill_buffer(&mut self, buffer: &<Self::A as Api>::Buffer, offset: u64, size: u64, value: u8);

    /// Upload `size` linear bytes from `src` into mip level `mip_level` of
    /// `dst`, starting at `src_offset`. Every backend's image storage is
    /// addressed per whole mip level (see [`fluxgpu_types::mip_level_extent`]),
    /// so callers never need a sub-region offset into the image side.
    unsafe fn copy_buffer_to_image(
        &mut self,
        src: &<Self::A as Api>::Buffer,
        src_offset: u64,
        dst: &<Self::A as Api>::Image,
        mip_level: u32,
        size: u64,
    );

    /// Symmetric to [`CommandEncoder::copy_buffer_to_image`].
    unsafe fn copy_image_to_buffer(
        &mut self,
        src: &<Self::A as Api>::Image,
        mip_level: u32,
        dst: &<Self::A as Api>::Buffer,
        dst_offset: u64,
        size: u64,
    );

    /// Byte-fill mip level `mip_level` of `image`, as [`CommandEncoder::fill_buffer`]
    /// does for a linear buffer.
    unsafe fn fill_image(&mut self, image: &<Self::A as Api>::Image, mip_level: u32, size: u64, value: u8);
}
