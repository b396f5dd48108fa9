/// Identifies which [`fluxgpu_hal::Api`] implementation backs a `Context`.
///
/// Mirrors the handful of native compute/graphics backends this runtime
/// targets. `Host` is always compiled in and is the only backend guaranteed
/// to be available in an environment with no GPU driver installed.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Backend {
    Vulkan = 0,
    Metal = 1,
    Cuda = 2,
    OpenCl = 3,
    Host = 4,
}

impl Backend {
    pub const ALL: [Backend; 5] = [
        Backend::Vulkan,
        Backend::Metal,
        Backend::Cuda,
        Backend::OpenCl,
        Backend::Host,
    ];

    pub fn is_host(self) -> bool {
        matches!(self, Backend::Host)
    }
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Backend::Vulkan => "Vulkan",
            Backend::Metal => "Metal",
            Backend::Cuda => "CUDA",
            Backend::OpenCl => "OpenCL",
            Backend::Host => "Host",
        };
        f.write_str(name)
    }
}
