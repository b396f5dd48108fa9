//! Shared setup for the scenarios in this crate.
//!
//! Every test here runs against the host-CPU backend exclusively: it is the
//! one backend guaranteed to build and pass on any machine running this
//! suite, and the one place in the runtime where a "device" is just a heap
//! allocation rather than a real driver. Tests exercise the bookkeeping,
//! validation, and state-machine behavior this runtime actually implements;
//! see each module's doc comment for what is (and is not) asserted about
//! kernel/draw execution itself.

use std::sync::Arc;

use fluxgpu_core::context::{Context, ContextFlags};
use fluxgpu_core::device::Device;
use fluxgpu_core::queue::Queue;
use fluxgpu_hal::host::Api;

pub struct TestingContext {
    pub context: Arc<Context<Api>>,
    pub device: Arc<Device<Api>>,
    pub queue: Arc<Queue<Api>>,
}

pub fn setup() -> TestingContext {
    let _ = env_logger::builder().is_test(true).try_init();
    let context = Context::<Api>::create(ContextFlags::RESOURCE_REGISTRY).expect("host backend always opens");
    let device = Arc::clone(&context.devices()[0]);
    let queue = Arc::clone(context.default_queue(&device).expect("device opened with a default queue"));
    TestingContext { context, device, queue }
}
