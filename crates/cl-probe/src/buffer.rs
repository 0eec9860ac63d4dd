//! Typed device buffers that carry their synchronisation state in the type.
//!
//! A buffer starts out `Queued` (allocated, contents undefined), becomes
//! `InFlight` while a transfer or kernel touching it is pending, and `Ready`
//! once that work has been waited on. Host slices handed to non-blocking
//! transfers stay borrowed by the returned [`EventGuard`].

use bytemuck::Pod;
use opencl3::{
    command_queue::CommandQueue,
    context::Context,
    event::{Event, wait_for_events},
    memory::Buffer,
    types::{CL_NON_BLOCKING, cl_event, cl_mem_flags},
};
use std::{fmt, marker::PhantomData, ptr};

#[cfg(feature = "metrics")]
use std::time::Instant;

use crate::{ClError, Result};

// ─── Typ‑State‑Marker ────────────────────────────────────────────────
mod sealed {
    pub trait Sealed {}
}

pub trait State: sealed::Sealed {
    const NAME: &'static str;
}

pub struct Queued;
impl sealed::Sealed for Queued {}
impl State for Queued {
    const NAME: &'static str = "Queued";
}

pub struct InFlight;
impl sealed::Sealed for InFlight {}
impl State for InFlight {
    const NAME: &'static str = "InFlight";
}

pub struct Ready;
impl sealed::Sealed for Ready {}
impl State for Ready {
    const NAME: &'static str = "Ready";
}

// Travels with the buffer through every state transition, so the metrics
// counters see exactly one alloc and one free.
#[cfg_attr(not(feature = "metrics"), allow(dead_code))]
struct Allocation {
    bytes: usize,
}

impl Allocation {
    fn new(bytes: usize) -> Self {
        #[cfg(feature = "metrics")]
        crate::metrics::track_alloc(bytes);
        Self { bytes }
    }
}

impl Drop for Allocation {
    fn drop(&mut self) {
        #[cfg(feature = "metrics")]
        crate::metrics::track_free(self.bytes);
    }
}

pub struct DeviceBuffer<T, S: State> {
    buf: Buffer<T>,
    len: usize,
    _alloc: Allocation,
    _state: PhantomData<S>,
}

impl<T, S: State> fmt::Debug for DeviceBuffer<T, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceBuffer")
            .field("len", &self.len)
            .field("elem", &std::any::type_name::<T>())
            .field("state", &S::NAME)
            .finish()
    }
}

// ── Queued ───────────────────────────────────────────────────────────
impl<T: Pod> DeviceBuffer<T, Queued> {
    /// Allocates `len` elements on the device. Zero-length buffers are
    /// rejected before the runtime is called.
    pub fn new(ctx: &Context, flags: cl_mem_flags, len: usize) -> Result<Self> {
        if len == 0 {
            return Err(ClError::InvalidSize(len));
        }

        #[cfg(feature = "metrics")]
        let t = Instant::now();

        let buf = unsafe { Buffer::<T>::create(ctx, flags, len, ptr::null_mut())? };

        #[cfg(feature = "metrics")]
        crate::metrics::record("buffer_create", t);

        Ok(Self {
            buf,
            len,
            _alloc: Allocation::new(len * std::mem::size_of::<T>()),
            _state: PhantomData,
        })
    }

    /// Allocate, upload and wait: the common path for kernel inputs.
    pub fn from_slice(
        ctx: &Context,
        queue: &CommandQueue,
        flags: cl_mem_flags,
        data: &[T],
    ) -> Result<DeviceBuffer<T, Ready>> {
        let (in_flight, guard) = Self::new(ctx, flags, data.len())?.enqueue_write(queue, data)?;
        in_flight.into_ready(guard)
    }

    pub fn enqueue_write<'a>(
        mut self,
        queue: &CommandQueue,
        host: &'a [T],
    ) -> Result<(DeviceBuffer<T, InFlight>, EventGuard<'a>)> {
        self.check_len(host.len())?;

        #[cfg(feature = "metrics")]
        let t = Instant::now();

        let evt = unsafe {
            queue.enqueue_write_buffer(&mut self.buf, CL_NON_BLOCKING, 0, host, &[])?
        };

        #[cfg(feature = "metrics")]
        crate::metrics::record("enqueue_write", t);

        Ok((self.transition(), EventGuard::new(evt)))
    }

    /// Hands the buffer to a kernel as an output.
    pub fn launch(self) -> DeviceBuffer<T, InFlight> {
        self.transition()
    }
}

// ── InFlight ─────────────────────────────────────────────────────────
impl<T: Pod> DeviceBuffer<T, InFlight> {
    pub fn into_ready(self, guard: EventGuard<'_>) -> Result<DeviceBuffer<T, Ready>> {
        guard.wait()?;
        Ok(self.transition())
    }

    /// Waits for the kernel event that writes this buffer.
    pub fn complete(self, evt: &Event) -> Result<DeviceBuffer<T, Ready>> {
        evt.wait()?;
        Ok(self.transition())
    }

    /// Queues a read that starts once `after` has completed. The returned
    /// guard covers both the producing command and the copy.
    pub fn enqueue_read_after<'a>(
        &self,
        queue: &CommandQueue,
        after: &Event,
        host_out: &'a mut [T],
    ) -> Result<EventGuard<'a>> {
        self.read_into(queue, host_out, &[after.get()])
    }
}

// ── Ready → Host ─────────────────────────────────────────────────────
impl<T: Pod> DeviceBuffer<T, Ready> {
    pub fn enqueue_read<'a>(
        &self,
        queue: &CommandQueue,
        host_out: &'a mut [T],
    ) -> Result<EventGuard<'a>> {
        self.read_into(queue, host_out, &[])
    }

    pub fn read_to_vec(&self, queue: &CommandQueue) -> Result<Vec<T>> {
        let mut out = vec![T::zeroed(); self.len];
        self.enqueue_read(queue, &mut out)?.wait()?;
        Ok(out)
    }
}

// ── Accessors (alle States) ──────────────────────────────────────────
impl<T, S: State> DeviceBuffer<T, S> {
    pub fn raw(&self) -> &Buffer<T> {
        &self.buf
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn size_bytes(&self) -> usize {
        self.len * std::mem::size_of::<T>()
    }

    fn transition<N: State>(self) -> DeviceBuffer<T, N> {
        DeviceBuffer {
            buf: self.buf,
            len: self.len,
            _alloc: self._alloc,
            _state: PhantomData,
        }
    }

    fn check_len(&self, actual: usize) -> Result<()> {
        if actual != self.len {
            return Err(ClError::LengthMismatch { expected: self.len, actual });
        }
        Ok(())
    }

    fn read_into<'a>(
        &self,
        queue: &CommandQueue,
        host_out: &'a mut [T],
        wait_list: &[cl_event],
    ) -> Result<EventGuard<'a>> {
        self.check_len(host_out.len())?;

        #[cfg(feature = "metrics")]
        let t = Instant::now();

        let evt = unsafe {
            queue.enqueue_read_buffer(&self.buf, CL_NON_BLOCKING, 0, host_out, wait_list)?
        };

        #[cfg(feature = "metrics")]
        crate::metrics::record("enqueue_read", t);

        Ok(EventGuard::new(evt))
    }
}

// ── Guard (wartet bei Drop auf Event) ────────────────────────────────

/// A pending command. `'a` is the host memory the command reads or writes;
/// dropping the guard blocks until the command has finished.
#[must_use = "dropping an EventGuard blocks until the command completes"]
#[derive(Debug)]
pub struct EventGuard<'a> {
    evt: Event,
    _host: PhantomData<&'a mut [u8]>,
}

impl Drop for EventGuard<'_> {
    fn drop(&mut self) {
        let _ = self.evt.wait();
    }
}

impl<'a> EventGuard<'a> {
    pub fn new(evt: Event) -> Self {
        Self { evt, _host: PhantomData }
    }

    pub fn event(&self) -> &Event {
        &self.evt
    }

    pub fn wait(self) -> Result<()> {
        self.evt.wait()?;
        Ok(())
    }

    /// Waits for every guard with a single `clWaitForEvents` call.
    pub fn wait_all<I>(guards: I) -> Result<()>
    where
        I: IntoIterator<Item = EventGuard<'a>>,
    {
        let guards: Vec<_> = guards.into_iter().collect();
        if guards.is_empty() {
            return Ok(());
        }
        let ids: Vec<cl_event> = guards.iter().map(|g| g.evt.get()).collect();
        wait_for_events(&ids)?;
        Ok(())
    }
}

/// Device-side duration of a finished command in milliseconds. `None` when
/// the queue was created without profiling or the runtime has no data.
pub fn kernel_millis(evt: &Event) -> Option<f64> {
    let start = evt.profiling_command_start().ok()?;
    let end = evt.profiling_command_end().ok()?;
    Some(end.saturating_sub(start) as f64 / 1_000_000.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_names() {
        assert_eq!(<Queued as State>::NAME, "Queued");
        assert_eq!(<InFlight as State>::NAME, "InFlight");
        assert_eq!(<Ready as State>::NAME, "Ready");
    }

    #[test]
    fn state_markers_are_zero_sized() {
        assert_eq!(std::mem::size_of::<PhantomData<Queued>>(), 0);
        assert_eq!(std::mem::size_of::<Ready>(), 0);
    }
}
