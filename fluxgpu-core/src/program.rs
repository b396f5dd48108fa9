//! Programs and function entries: the FUBAR universal-binary loader and the
//! per-device specialization it produces.

use std::collections::HashMap;
use std::mem::ManuallyDrop;
use std::sync::Arc;

use fluxgpu_hal::{Api, Device as HalDevice};
use fluxgpu_types::{ArgInfoFlags, Backend, FunctionFlags};

use crate::device::Device;
use crate::error::{CoreError, Result};

/// Address space an argument binding lives in, carried alongside byte size
/// and array extent in [`ArgInfo`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressSpace {
    Global,
    Local,
    Constant,
    Image,
    Unknown,
}

/// Access an `arg_info` declares for its binding; read-only image arguments
/// must populate a read descriptor, write images a write descriptor, per
/// the marshalling contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
    ReadWrite,
    Unspecified,
}

/// One declared argument of a [`FunctionInfo`]. `nested`, when set, is the
/// argument-buffer's own field table, recursively describing its layout —
/// mirrors an `ARGUMENT_BUFFER`-flagged `arg_info` carrying a nested
/// function_info.
#[derive(Debug, Clone)]
pub struct ArgInfo {
    pub byte_size: u32,
    /// Array extent; 0 for a scalar argument.
    pub array_extent: u32,
    pub address_space: AddressSpace,
    pub access: Access,
    pub flags: ArgInfoFlags,
    pub nested: Option<Vec<ArgInfo>>,
}

/// One named entry point in a [`ProgramData`]'s function-info table.
#[derive(Debug, Clone)]
pub struct FunctionInfo {
    pub name: String,
    pub args: Vec<ArgInfo>,
    pub required_local_size: Option<[u32; 3]>,
    pub required_simd_width: Option<u32>,
    pub dimensionality: u32,
    pub flags: FunctionFlags,
}

/// Toolchain-produced payload: either a path to a file the runtime should
/// load and compile, or source text to compile directly.
#[derive(Debug, Clone)]
pub enum ProgramSource {
    Source(String),
    File(std::path::PathBuf),
}

/// Result of invoking the external toolchain: the authoritative function
/// metadata plus the opaque binary payload it produced for one specific
/// backend target. The binary itself is never inspected by this crate.
#[derive(Debug, Clone)]
pub struct ProgramData {
    pub payload: Vec<u8>,
    pub function_infos: Vec<FunctionInfo>,
}

/// One `(target_tag, device_filter, payload)` triple out of a FUBAR archive
/// index.
#[derive(Debug, Clone)]
pub struct FubarEntry {
    pub target_tag: String,
    /// Matched against a device's `Vendor`/backend at load time; `None`
    /// matches any device of the selected backend.
    pub device_filter: Option<fluxgpu_types::Vendor>,
    pub payload: Vec<u8>,
    pub function_infos: Vec<FunctionInfo>,
}

fn target_tag_for_backend(backend: Backend) -> &'static str {
    match backend {
        Backend::Vulkan => "SPIRV_VULKAN",
        Backend::Metal => "AIR",
        Backend::Cuda => "PTX",
        Backend::OpenCl => "SPIRV_OPENCL",
        Backend::Host => "HOST_COMPUTE_CPU",
    }
}

/// A device-side specialization of one function: the backend's loaded
/// program handle plus the metadata needed to validate and marshal a
/// launch against it.
pub struct FunctionEntry<A: Api> {
    pub(crate) raw: ManuallyDrop<A::Program>,
    device: Arc<Device<A>>,
    pub info: FunctionInfo,
    /// Sum of every non-nested `ArgInfo::byte_size`, the debug-build launch
    /// size assertion compares marshalled POD bytes against.
    pub args_size: u32,
}

impl<A: Api> std::fmt::Debug for FunctionEntry<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionEntry").field("name", &self.info.name).finish()
    }
}

impl<A: Api> Drop for FunctionEntry<A> {
    fn drop(&mut self) {
        let raw = unsafe { ManuallyDrop::take(&mut self.raw) };
        unsafe { self.device.raw.destroy_program(raw) };
    }
}

/// A loaded program, specialized per device. `function(name)` returns the
/// per-device entry map; launch on a queue selects the entry for
/// `queue.device`.
pub struct Program<A: Api> {
    /// Keyed by device identity (`Device::raw_id` debug string, since
    /// `A::RawDeviceId` need not be hashable); good enough for the small,
    /// fixed device counts this runtime targets.
    entries: HashMap<String, HashMap<String, Arc<FunctionEntry<A>>>>,
}

impl<A: Api> std::fmt::Debug for Program<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Program").field("devices", &self.entries.len()).finish()
    }
}

fn device_key<A: Api>(device: &Device<A>) -> String {
    format!("{:?}", device.raw_id())
}

impl<A: Api> Program<A> {
    fn empty() -> Self {
        Self { entries: HashMap::new() }
    }

    /// Compiles `data` for every device in `devices` and records each
    /// resulting [`FunctionEntry`] under its function name.
    pub fn from_program_data(devices: &[Arc<Device<A>>], data: &ProgramData) -> Result<Arc<Self>> {
        let mut program = Self::empty();
        for device in devices {
            let mut per_function = HashMap::new();
            for info in &data.function_infos {
                let raw = unsafe { device.raw.create_program(&data.payload, &info.name)? };
                let args_size = info.args.iter().map(|a| a.byte_size).sum();
                per_function.insert(
                    info.name.clone(),
                    Arc::new(FunctionEntry {
                        raw: ManuallyDrop::new(raw),
                        device: Arc::clone(device),
                        info: info.clone(),
                        args_size,
                    }),
                );
            }
            program.entries.insert(device_key(device), per_function);
        }
        Ok(Arc::new(program))
    }

    /// Opens a FUBAR archive, selecting for each device the entry whose
    /// `target_tag` matches the device's backend and whose `device_filter`
    /// (if any) matches its vendor.
    pub fn from_universal_binary(devices: &[Arc<Device<A>>], entries: &[FubarEntry]) -> Result<Arc<Self>> {
        let mut program = Self::empty();
        for device in devices {
            let tag = target_tag_for_backend(device.backend);
            let chosen = entries
                .iter()
                .find(|e| e.target_tag == tag && e.device_filter.map_or(true, |v| v == device.vendor))
                .ok_or_else(|| CoreError::Unsupported(format!("no FUBAR entry matches backend {} / vendor {:?}", device.backend, device.vendor)))?;

            let mut per_function = HashMap::new();
            for info in &chosen.function_infos {
                let raw = unsafe { device.raw.create_program(&chosen.payload, &info.name)? };
                let args_size = info.args.iter().map(|a| a.byte_size).sum();
                per_function.insert(
                    info.name.clone(),
                    Arc::new(FunctionEntry {
                        raw: ManuallyDrop::new(raw),
                        device: Arc::clone(device),
                        info: info.clone(),
                        args_size,
                    }),
                );
            }
            program.entries.insert(device_key(device), per_function);
        }
        Ok(Arc::new(program))
    }

    /// Loads a backend-native binary whose function metadata is supplied
    /// out-of-band rather than recovered from a toolchain invocation.
    pub fn from_precompiled(devices: &[Arc<Device<A>>], payload: &[u8], function_infos: &[FunctionInfo]) -> Result<Arc<Self>> {
        Self::from_program_data(
            devices,
            &ProgramData {
                payload: payload.to_vec(),
                function_infos: function_infos.to_vec(),
            },
        )
    }

    /// Looks up `name`'s entry for `device`. Returns `None` if the function
    /// does not exist or was never specialized for this device.
    pub fn function(&self, device: &Device<A>, name: &str) -> Option<Arc<FunctionEntry<A>>> {
        self.entries.get(&device_key(device))?.get(name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_tag_mapping_is_stable() {
        assert_eq!(target_tag_for_backend(Backend::Vulkan), "SPIRV_VULKAN");
        assert_eq!(target_tag_for_backend(Backend::Metal), "AIR");
        assert_eq!(target_tag_for_backend(Backend::Cuda), "PTX");
        assert_eq!(target_tag_for_backend(Backend::OpenCl), "SPIRV_OPENCL");
        assert_eq!(target_tag_for_backend(Backend::Host), "HOST_COMPUTE_CPU");
    }
}
