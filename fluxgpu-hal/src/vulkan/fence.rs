use ash::{extensions::khr, vk};

use crate::vulkan::ExtensionFn;
use crate::FenceValue;

/// The Vulkan backend's [`crate::Fence`] implementation.
///
/// This is an `enum` because there are two possible implementations of a
/// fence on Vulkan: timeline semaphores, which behave exactly the way
/// [`crate::Fence`] is specified to, and a pool of binary `VkFence`s each
/// paired with the submission value it stands for, for devices without
/// `VK_KHR_timeline_semaphore`.
///
/// [`TimelineSemaphore`]: Fence::TimelineSemaphore
/// [`FencePool`]: Fence::FencePool
#[derive(Debug)]
pub enum Fence {
    /// A Vulkan [timeline semaphore].
    ///
    /// [timeline semaphore]: https://registry.khronos.org/vulkan/specs/1.3-extensions/html/vkspec.html#synchronization-semaphores
    TimelineSemaphore(vk::Semaphore),

    /// A collection of Vulkan fences, each associated with a [`FenceValue`].
    ///
    /// The effective value of this variant is the greater of
    /// `last_completed` and the maximum value associated with a signalled
    /// fence in `active`. Fences only have two states ("signaled" and
    /// "unsignaled"), so a separate fence per submission we might want to
    /// wait on is required, each remembering which value it represents.
    FencePool {
        last_completed: FenceValue,
        /// Pending fence values, ascending.
        active: Vec<(FenceValue, vk::Fence)>,
        free: Vec<vk::Fence>,
    },
}

impl Fence {
    /// Highest value among the signalled fences in `active`, skipping any
    /// already known to be below `last_completed` (they remain in `active`
    /// only because `maintain` hasn't reclaimed them yet).
    fn check_active(
        device: &ash::Device,
        mut last_completed: FenceValue,
        active: &[(FenceValue, vk::Fence)],
    ) -> Result<FenceValue, crate::DeviceError> {
        for &(value, raw) in active.iter() {
            unsafe {
                if value > last_completed && device.get_fence_status(raw)? {
                    last_completed = value;
                }
            }
        }
        Ok(last_completed)
    }

    pub(super) fn get_latest(
        &self,
        device: &ash::Device,
        extension: Option<&ExtensionFn<khr::TimelineSemaphore>>,
    ) -> Result<FenceValue, crate::DeviceError> {
        match *self {
            Self::TimelineSemaphore(raw) => unsafe {
                Ok(match *extension.unwrap() {
                    ExtensionFn::Extension(ref ext) => ext.get_semaphore_counter_value(raw)?,
                    ExtensionFn::Promoted => device.get_semaphore_counter_value(raw)?,
                })
            },
            Self::FencePool {
                last_completed,
                ref active,
                free: _,
            } => Self::check_active(device, last_completed, active),
        }
    }

    /// Recycle signalled fences back into `free`. Skipping this just means
    /// `Queue::submit` allocates a new `VkFence` every call.
    pub(super) fn maintain(&mut self, device: &ash::Device) -> Result<(), crate::DeviceError> {
        match *self {
            Self::TimelineSemaphore(_) => {}
            Self::FencePool {
                ref mut last_completed,
                ref mut active,
                ref mut free,
            } => {
                let latest = Self::check_active(device, *last_completed, active)?;
                let base_free = free.len();
                for &(value, raw) in active.iter() {
                    if value <= latest {
                        free.push(raw);
                    }
                }
                if free.len() != base_free {
                    active.retain(|&(value, _)| value > latest);
                    unsafe {
                        device.reset_fences(&free[base_free..])?;
                    }
                }
                *last_completed = latest;
            }
        }
        Ok(())
    }

    pub(super) fn wait(
        &self,
        device: &ash::Device,
        extension: Option<&ExtensionFn<khr::TimelineSemaphore>>,
        value: FenceValue,
        timeout_ns: u64,
    ) -> Result<bool, crate::DeviceError> {
        if self.get_latest(device, extension)? >= value {
            return Ok(true);
        }
        unsafe {
            match *self {
                Self::TimelineSemaphore(raw) => {
                    let semaphores = [raw];
                    let values = [value];
                    let info = vk::SemaphoreWaitInfo::builder()
                        .semaphores(&semaphores)
                        .values(&values);
                    let result = match *extension.unwrap() {
                        ExtensionFn::Extension(ref ext) => ext.wait_semaphores(&info, timeout_ns),
                        ExtensionFn::Promoted => device.wait_semaphores(&info, timeout_ns),
                    };
                    match result {
                        Ok(()) => Ok(true),
                        Err(vk::Result::TIMEOUT) => Ok(false),
                        Err(other) => Err(other.into()),
                    }
                }
                Self::FencePool { ref active, .. } => {
                    let Some(&(_, raw)) = active.iter().find(|&&(v, _)| v >= value) else {
                        return Ok(false);
                    };
                    match device.wait_for_fences(&[raw], true, timeout_ns) {
                        Ok(()) => Ok(true),
                        Err(vk::Result::TIMEOUT) => Ok(false),
                        Err(other) => Err(other.into()),
                    }
                }
            }
        }
    }
}
