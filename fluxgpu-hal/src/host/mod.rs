/*!
# Host-CPU reference backend.

Always compiled in, and the only backend the test suite (`fluxgpu-tests`)
requires: every operation the other backends dispatch to a real device is
performed in-process against a plain heap allocation, with fences modeled as
an atomic counter rather than a GPU-side signal. This gives every behavior
described in the CORE's spec (buffer/image lifecycle, fence ordering,
argument marshalling, the renderer state machine) a deterministic,
hardware-free execution path to validate against.
!*/

mod device;
mod fence;
mod queue;

pub use device::Device;
pub use fence::Fence;
pub use queue::Queue;

#[derive(Clone, Debug)]
pub struct Api;

impl crate::Api for Api {
    type Instance = Instance;
    type RawDeviceId = ();
    type Device = Device;
    type Queue = Queue;
    type Fence = Fence;
    type Buffer = Buffer;
    type Image = Image;
    type Program = Program;
    type CommandEncoder = CommandEncoder;

    const BACKEND: fluxgpu_types::Backend = fluxgpu_types::Backend::Host;
}

#[derive(Debug)]
pub struct Instance;

impl crate::Instance for Instance {
    type A = Api;

    fn init() -> Result<Self, crate::InstanceError> {
        Ok(Instance)
    }

    fn enumerate_devices(&self) -> Vec<crate::ExposedDevice<Api>> {
        vec![crate::ExposedDevice {
            device_id: (),
            name: "Host CPU".to_string(),
            vendor: fluxgpu_types::Vendor::Host,
            is_host: true,
            limits: host_limits(),
        }]
    }

    fn open(
        &self,
        exposed: &crate::ExposedDevice<Api>,
    ) -> Result<(Device, Queue), crate::DeviceError> {
        let device = Device::new(exposed.limits);
        let queue = Queue::new();
        Ok((device, queue))
    }
}

fn host_limits() -> fluxgpu_types::DeviceLimits {
    let threads = std::thread::available_parallelism()
        .map(|n| n.get() as u32)
        .unwrap_or(1);
    fluxgpu_types::DeviceLimits {
        compute_units: threads,
        max_total_local_size: threads,
        max_work_group_size: [threads, 1, 1],
        image_support: true,
        image_depth_support: true,
        image_mipmap_support: true,
        image_gather_support: true,
        image_read_write_support: true,
        image_cube_support: true,
        // No real texture unit to cap this; a heap allocation has no mip
        // count it can't hold.
        max_mip_levels: u32::MAX,
        ..fluxgpu_types::DeviceLimits::default()
    }
}

/// A host allocation. Always both host-visible and host-coherent since it
/// *is* host memory; `Device::create_buffer` never has to decide between a
/// device-local and a staging path the way a real GPU backend does.
#[derive(Debug)]
pub struct Buffer {
    pub(crate) data: parking_lot::Mutex<Vec<u8>>,
    pub(crate) mapping: parking_lot::Mutex<Option<HostMapping>>,
}

/// Bookkeeping for one live `map_buffer` call: the range mapped out of
/// `Buffer::data` plus the leaked copy the caller is currently writing
/// through, written back to `data` on `unmap_buffer`.
#[derive(Debug)]
pub(crate) struct HostMapping {
    pub(crate) ptr: *mut u8,
    pub(crate) len: usize,
    pub(crate) offset: usize,
}

unsafe impl Send for HostMapping {}
unsafe impl Sync for HostMapping {}

/// A host image: a flat byte buffer per mip level, addressed row-major with
/// no backend-specific tiling, since there is no hardware texture unit to
/// satisfy.
#[derive(Debug)]
pub struct Image {
    pub(crate) format: fluxgpu_types::ImageType,
    pub(crate) base_extent: (u32, u32, u32),
    pub(crate) mip_levels: Vec<parking_lot::Mutex<Vec<u8>>>,
}

/// A host "program" is just a boxed closure taking the marshalled argument
/// list, registered by `fluxgpu-core::program`'s FUBAR loader when it
/// recognizes the host target in a binary's toolchain tag.
pub struct Program {
    pub(crate) entry_point: String,
}

impl std::fmt::Debug for Program {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Program")
            .field("entry_point", &self.entry_point)
            .finish()
    }
}

/// Command "encoding" on the host backend executes eagerly: there is no
/// device-side queue to defer into, so each recorded operation performs its
/// memory effect immediately against the borrowed buffer's interior-mutable
/// storage. `CommandBuffer` ends up empty; `Queue::submit` only has fence
/// bookkeeping left to do.
#[derive(Debug, Default)]
pub struct CommandEncoder {
    recording: bool,
}

#[derive(Debug, Default)]
pub struct CommandBuffer;

impl crate::CommandEncoder for CommandEncoder {
    type A = Api;
    type CommandBuffer = CommandBuffer;

    unsafe fn begin_encoding(&mut self, _label: Option<&str>) -> Result<(), crate::DeviceError> {
        self.recording = true;
        Ok(())
    }

    unsafe fn end_encoding(&mut self) -> Result<CommandBuffer, crate::DeviceError> {
        self.recording = false;
        Ok(CommandBuffer)
    }

    unsafe fn copy_buffer_to_buffer(
        &mut self,
        src: &Buffer,
        src_offset: u64,
        dst: &Buffer,
        dst_offset: u64,
        size: u64,
    ) {
        debug_assert!(self.recording, "copy recorded outside begin/end_encoding");
        let src_guard = src.data.lock();
        let (src_offset, size) = (src_offset as usize, size as usize);
        let chunk = src_guard[src_offset..src_offset + size].to_vec();
        drop(src_guard);
        let mut dst_guard = dst.data.lock();
        let dst_offset = dst_offset as usize;
        dst_guard[dst_offset..dst_offset + size].copy_from_slice(&chunk);
    }

    unsafe fn fill_buffer(&mut self, buffer: &Buffer, offset: u64, size: u64, value: u8) {
        debug_assert!(self.recording, "fill recorded outside begin/end_encoding");
        let mut guard = buffer.data.lock();
        let (offset, size) = (offset as usize, size as usize);
        guard[offset..offset + size].fill(value);
    }

    unsafe fn copy_buffer_to_image(&mut self, src: &Buffer, src_offset: u64, dst: &Image, mip_level: u32, size: u64) {
        debug_assert!(self.recording, "copy recorded outside begin/end_encoding");
        let src_offset = src_offset as usize;
        let size = size as usize;
        let chunk = src.data.lock()[src_offset..src_offset + size].to_vec();
        dst.mip_levels[mip_level as usize].lock()[..size].copy_from_slice(&chunk);
    }

    unsafe fn copy_image_to_buffer(&mut self, src: &Image, mip_level: u32, dst: &Buffer, dst_offset: u64, size: u64) {
        debug_assert!(self.recording, "copy recorded outside begin/end_encoding");
        let dst_offset = dst_offset as usize;
        let size = size as usize;
        let chunk = src.mip_levels[mip_level as usize].lock()[..size].to_vec();
        dst.data.lock()[dst_offset..dst_offset + size].copy_from_slice(&chunk);
    }

    unsafe fn fill_image(&mut self, image: &Image, mip_level: u32, size: u64, value: u8) {
        debug_assert!(self.recording, "fill recorded outside begin/end_encoding");
        image.mip_levels[mip_level as usize].lock()[..size as usize].fill(value);
    }
}
