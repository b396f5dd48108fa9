/// Reported GPU/compute device vendor, and separately the vendor of the
/// platform/driver stack exposing it (the two differ for e.g. an NVIDIA GPU
/// exposed through a vendor-neutral OpenCL ICD loader).
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Vendor {
    Unknown = 0,
    Nvidia,
    Intel,
    Amd,
    Apple,
    /// Portable Computing Language — a common software OpenCL implementation.
    Pocl,
    /// Reported for a device enumerated through the CUDA driver API, where
    /// the driver does not separately distinguish a "platform vendor".
    Cuda,
    /// The in-process host-CPU reference backend.
    Host,
}

impl Default for Vendor {
    fn default() -> Self {
        Vendor::Unknown
    }
}

impl Vendor {
    /// Best-effort classification from the vendor ID a driver reports
    /// (PCI vendor ID for Vulkan/OpenCL, or a CUDA/Metal-specific string
    /// match performed by the caller before falling back to this).
    pub fn from_pci_id(id: u32) -> Self {
        match id {
            0x10de => Vendor::Nvidia,
            0x8086 => Vendor::Intel,
            0x1002 | 0x1022 => Vendor::Amd,
            0x106b => Vendor::Apple,
            _ => Vendor::Unknown,
        }
    }
}
