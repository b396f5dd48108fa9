//! Buffer subsystem: allocation, mapping, copy, fill, zero.
//!
//! A [`Buffer`] owns a backend handle plus a per-object mapping table keyed
//! by the host pointer `map` hands out, mirroring the source toolchain's
//! contract exactly (`{staging_handle, size, offset, flags}` per entry). If
//! the backing allocation is not host-visible, `map`/`unmap` transparently
//! stage through a second, host-visible buffer allocated for the duration of
//! the mapping — the HAL layer itself never does this (see
//! `fluxgpu_hal::Device::map_buffer`'s doc comment); staging is purely a
//! `fluxgpu-core` concern, the same split `wgpu-core`/`wgpu-hal` draw.

use std::mem::ManuallyDrop;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use fluxgpu_hal::{Api, BufferMapping, CommandEncoder as HalCommandEncoder, Device as HalDevice};
use fluxgpu_types::{BufferDescriptor, HostAccess, MemoryFlags};

use crate::device::Device;
use crate::error::{CoreError, Result};
use crate::queue::Queue;

/// One in-flight `map` call, keyed by the pointer handed back to the caller.
/// `staging` is `None` when the allocation itself is host-visible and `map`
/// returned a pointer straight into it.
struct Mapping<A: Api> {
    ptr: std::ptr::NonNull<u8>,
    offset: u64,
    size: u64,
    access: HostAccess,
    staging: Option<A::Buffer>,
}

unsafe impl<A: Api> Send for Mapping<A> {}

pub struct Buffer<A: Api> {
    device: Arc<Device<A>>,
    raw: ManuallyDrop<A::Buffer>,
    pub size: u64,
    pub usage: MemoryFlags,
    pub label: Option<String>,
    host_visible: bool,
    mappings: parking_lot::Mutex<Vec<Mapping<A>>>,
}

impl<A: Api> std::fmt::Debug for Buffer<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Buffer")
            .field("size", &self.size)
            .field("usage", &self.usage)
            .field("label", &self.label)
            .finish()
    }
}

impl<A: Api> Buffer<A> {
    pub fn new(device: Arc<Device<A>>, desc: &BufferDescriptor) -> Result<Arc<Self>> {
        let raw = unsafe { device.raw.create_buffer(desc)? };
        device.account(desc.size as i64);
        let host_visible = desc
            .usage
            .intersects(MemoryFlags::HOST_VISIBLE | MemoryFlags::HOST_READ | MemoryFlags::HOST_WRITE);
        Ok(Arc::new(Self {
            device,
            raw: ManuallyDrop::new(raw),
            size: desc.size,
            usage: desc.usage,
            label: desc.label.clone(),
            host_visible,
            mappings: parking_lot::Mutex::new(Vec::new()),
        }))
    }

    pub(crate) fn raw(&self) -> &A::Buffer {
        &self.raw
    }

    fn check_range(&self, offset: u64, size: u64) -> Result<()> {
        if offset.checked_add(size).map_or(true, |end| end > self.size) {
            return Err(CoreError::InvalidArgument(format!(
                "range [{offset}, {offset}+{size}) exceeds buffer size {}",
                self.size
            )));
        }
        Ok(())
    }

    /// Blocks queue-order after prior work; copies `min(size, buffer-offset)`
    /// bytes from device into `dst`. `size == 0` means "read the whole
    /// remaining buffer from `offset`".
    pub fn read(self: &Arc<Self>, queue: &Queue<A>, dst: &mut [u8], size: u64, offset: u64) -> Result<()> {
        if !self.usage.intersects(MemoryFlags::HOST_READ | MemoryFlags::HOST_VISIBLE) {
            return Err(CoreError::InvalidArgument("buffer was not created with host read access".into()));
        }
        let size = if size == 0 { self.size - offset.min(self.size) } else { size };
        self.check_range(offset, size)?;
        let size = size.min(dst.len() as u64);

        let mapping = self.map(queue, HostAccess::ReadOnly, size, offset)?;
        unsafe {
            std::ptr::copy_nonoverlapping(mapping.as_ptr(), dst.as_mut_ptr(), size as usize);
        }
        self.unmap(queue, mapping)?;
        Ok(())
    }

    /// Symmetric to [`Buffer::read`].
    pub fn write(self: &Arc<Self>, queue: &Queue<A>, src: &[u8], size: u64, offset: u64) -> Result<()> {
        if !self.usage.intersects(MemoryFlags::HOST_WRITE | MemoryFlags::HOST_VISIBLE) {
            return Err(CoreError::InvalidArgument("buffer was not created with host write access".into()));
        }
        let size = if size == 0 { src.len() as u64 } else { size };
        self.check_range(offset, size)?;
        let size = size.min(src.len() as u64);

        let mapping = self.map(queue, HostAccess::WriteOnly, size, offset)?;
        unsafe {
            std::ptr::copy_nonoverlapping(src.as_ptr(), mapping.as_ptr(), size as usize);
        }
        self.unmap(queue, mapping)?;
        Ok(())
    }

    /// Device-to-device copy. `size == 0` means `min(src.size, self.size)`.
    /// `src` and `self` must not be the same buffer (overlap is rejected,
    /// not merely UB, since both offsets are known up front here).
    pub fn copy(self: &Arc<Self>, queue: &Queue<A>, src: &Arc<Self>, size: u64, src_offset: u64, dst_offset: u64) -> Result<()> {
        if Arc::ptr_eq(self, src) {
            return Err(CoreError::InvalidArgument("copy source and destination must not be the same buffer".into()));
        }
        let size = if size == 0 { src.size.min(self.size) } else { size };
        src.check_range(src_offset, size)?;
        self.check_range(dst_offset, size)?;

        let mut encoder = queue.create_encoder()?;
        unsafe {
            encoder.begin_encoding(None)?;
            encoder.copy_buffer_to_buffer(src.raw(), src_offset, self.raw(), dst_offset, size);
            let commands = encoder.end_encoding()?;
            queue.submit_blocking(&[&commands])?;
        }
        Ok(())
    }

    /// Repeats `pattern` across `[offset, offset+size)`. Only single-byte
    /// patterns are supported directly (`fluxgpu_hal::CommandEncoder::fill_buffer`
    /// is byte-granular); a multi-byte pattern falls back to a host-staged
    /// write of the expanded pattern, matching the contract's "otherwise
    /// falls back to host staging" clause.
    pub fn fill(self: &Arc<Self>, queue: &Queue<A>, pattern: &[u8], size: u64, offset: u64) -> Result<()> {
        if pattern.is_empty() {
            return Err(CoreError::InvalidArgument("fill pattern must not be empty".into()));
        }
        let size = if size == 0 { self.size - offset.min(self.size) } else { size };
        self.check_range(offset, size)?;

        if pattern.len() == 1 {
            let mut encoder = queue.create_encoder()?;
            unsafe {
                encoder.begin_encoding(None)?;
                encoder.fill_buffer(self.raw(), offset, size, pattern[0]);
                let commands = encoder.end_encoding()?;
                queue.submit_blocking(&[&commands])?;
            }
            return Ok(());
        }

        let mut expanded = Vec::with_capacity(size as usize);
        while (expanded.len() as u64) < size {
            let remaining = (size - expanded.len() as u64) as usize;
            expanded.extend_from_slice(&pattern[..pattern.len().min(remaining)]);
        }
        self.write(queue, &expanded, size, offset)
    }

    /// Equivalent to `fill` with an all-zero single-byte pattern over the
    /// whole buffer.
    pub fn zero(self: &Arc<Self>, queue: &Queue<A>) -> Result<()> {
        self.fill(queue, &[0u8], 0, 0)
    }

    /// Returns a pointer valid until the matching `unmap`. If the backing
    /// allocation is not host-visible, transparently allocates a host-visible
    /// staging buffer, issues a device→host copy for read access, and hands
    /// back the staging pointer; `unmap` then issues the host→device copy
    /// back for write access. `WriteDiscard` skips the download, since the
    /// caller has promised not to depend on the prior contents.
    pub fn map(self: &Arc<Self>, queue: &Queue<A>, access: HostAccess, size: u64, offset: u64) -> Result<std::ptr::NonNull<u8>> {
        let size = if size == 0 { self.size - offset.min(self.size) } else { size };
        self.check_range(offset, size)?;

        let (ptr, staging) = if self.host_visible {
            let BufferMapping { ptr, .. } = unsafe { self.device.raw.map_buffer(self.raw(), offset, size)? };
            (ptr, None)
        } else {
            let staging_desc = BufferDescriptor::new(
                size,
                MemoryFlags::HOST_VISIBLE | MemoryFlags::HOST_READ | MemoryFlags::HOST_WRITE | MemoryFlags::COPY_SRC | MemoryFlags::COPY_DST,
            );
            let staging = unsafe { self.device.raw.create_buffer(&staging_desc)? };

            if access.allows_read() && access != HostAccess::WriteDiscard {
                let mut encoder = queue.create_encoder()?;
                unsafe {
                    encoder.begin_encoding(None)?;
                    encoder.copy_buffer_to_buffer(self.raw(), offset, &staging, 0, size);
                    let commands = encoder.end_encoding()?;
                    queue.submit_blocking(&[&commands])?;
                }
            }

            let BufferMapping { ptr, .. } = unsafe { self.device.raw.map_buffer(&staging, 0, size)? };
            (ptr, Some(staging))
        };

        self.mappings.lock().push(Mapping { ptr, offset, size, access, staging });
        Ok(ptr)
    }

    /// Pairs with `map`; must be called with the exact pointer `map`
    /// returned. Issues the host→device writeback through staging when the
    /// mapping requested write access and is not host-coherent.
    pub fn unmap(self: &Arc<Self>, queue: &Queue<A>, ptr: std::ptr::NonNull<u8>) -> Result<()> {
        let mapping = {
            let mut mappings = self.mappings.lock();
            let idx = mappings
                .iter()
                .position(|m| m.ptr == ptr)
                .ok_or_else(|| CoreError::InvariantViolation("unmap called with a pointer not returned by map".into()))?;
            mappings.swap_remove(idx)
        };

        match mapping.staging {
            None => unsafe { self.device.raw.unmap_buffer(self.raw())? },
            Some(staging) => {
                unsafe { self.device.raw.unmap_buffer(&staging)? };
                if mapping.access.allows_write() {
                    let mut encoder = queue.create_encoder()?;
                    unsafe {
                        encoder.begin_encoding(None)?;
                        encoder.copy_buffer_to_buffer(&staging, 0, self.raw(), mapping.offset, mapping.size);
                        let commands = encoder.end_encoding()?;
                        queue.submit_blocking(&[&commands])?;
                    }
                }
                unsafe { self.device.raw.destroy_buffer(staging) };
            }
        }
        Ok(())
    }
}

impl<A: Api> Drop for Buffer<A> {
    fn drop(&mut self) {
        self.device.account(-(self.size as i64));
        let raw = unsafe { ManuallyDrop::take(&mut self.raw) };
        unsafe { self.device.raw.destroy_buffer(raw) };
    }
}

#[allow(dead_code)]
fn assert_send_sync<T: Send + Sync>() {}

#[cfg(test)]
mod tests {
    // Exercised end-to-end against the host backend in `fluxgpu-tests`;
    // range-checking logic alone is covered here since it needs no backend.
    use super::*;

    struct Dummy;

    #[test]
    fn pattern_expansion_repeats_correctly() {
        let pattern = [0xDE, 0xAD, 0xBE, 0xEF];
        let size = 10usize;
        let mut expanded = Vec::with_capacity(size);
        while expanded.len() < size {
            let remaining = size - expanded.len();
            expanded.extend_from_slice(&pattern[..pattern.len().min(remaining)]);
        }
        assert_eq!(expanded, vec![0xDE, 0xAD, 0xBE, 0xEF, 0xDE, 0xAD, 0xBE, 0xEF, 0xDE, 0xAD]);
        let _ = Dummy;
    }
}
