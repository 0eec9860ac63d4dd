//! One device's context, command queue and program.

use opencl3::{
    command_queue::{CL_QUEUE_PROFILING_ENABLE, CommandQueue},
    context::Context,
    device::Device,
    kernel::Kernel,
    program::Program,
};

#[cfg(feature = "metrics")]
use std::time::Instant;

use crate::{Result, platform, program};

/// Owns every runtime handle acquired for a device run. Field order is the
/// release order: program, queue, context.
#[derive(Debug)]
pub struct DeviceSession {
    program: Program,
    queue: CommandQueue,
    context: Context,
    device: Device,
    name: String,
}

impl DeviceSession {
    pub fn open(device: Device, source: &str, options: &str) -> Result<Self> {
        let name = platform::device_name(&device)?;
        log::debug!("opening session on {name}");

        let context = Context::from_device(&device)?;
        // OpenCL 1.2 entry point, still the only one some drivers expose.
        #[allow(deprecated)]
        let queue = CommandQueue::create(&context, context.default_device(), CL_QUEUE_PROFILING_ENABLE)?;

        #[cfg(feature = "metrics")]
        let t = Instant::now();

        let program = program::build(&context, source, options)?;

        #[cfg(feature = "metrics")]
        crate::metrics::record("program_build", t);

        Ok(Self { program, queue, context, device, name })
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn device_name(&self) -> &str {
        &self.name
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn queue(&self) -> &CommandQueue {
        &self.queue
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn kernel(&self, name: &str) -> Result<Kernel> {
        Ok(Kernel::create(&self.program, name)?)
    }

    /// Blocks until everything enqueued so far has completed.
    pub fn finish(&self) -> Result<()> {
        self.queue.finish()?;
        Ok(())
    }
}

impl Drop for DeviceSession {
    fn drop(&mut self) {
        log::trace!("releasing session on {}", self.name);
    }
}
