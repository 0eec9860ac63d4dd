//! Minimum-finding bandwidth benchmark: `minp` computes one minimum per work
//! group, `reduce` folds those into element 0. Repeated `loops` times.

use opencl3::{
    event::Event,
    kernel::{ExecuteKernel, Kernel},
    memory::{CL_MEM_READ_ONLY, CL_MEM_READ_WRITE, CL_MEM_WRITE_ONLY},
    types::cl_uint,
};
use std::{
    fmt,
    time::{Duration, Instant, SystemTime, UNIX_EPOCH},
};

use super::{WorkloadConfig, write_timing};
use crate::{
    ClError, DeviceBuffer, DeviceSession, InFlight, Queued, Result, buffer::kernel_millis,
    platform,
};

pub const ITEMS: usize = 4096 * 4096;
pub const WAVEFRONT: usize = 64;
/// Wavefronts scheduled per compute unit on non-CPU devices.
pub const WAVES_PER_SIMD: usize = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MinpLayout {
    pub global: usize,
    pub local: usize,
    pub groups: usize,
    /// Work items stride by the global size instead of walking a chunk.
    pub strided: bool,
}

/// Work sizes for `items` `uint`s read as `uint4`. The global size always
/// divides `items / 4` so every lane is visited exactly once.
pub fn layout(cpu: bool, compute_units: u32, items: usize) -> Result<MinpLayout> {
    let quads = items / 4;
    if items % 4 != 0 || quads == 0 {
        return Err(ClError::InvalidArgument(format!(
            "minp needs a non-zero multiple of 4 items, got {items}"
        )));
    }
    let units = compute_units.max(1) as usize;

    let (mut global, step, local) = if cpu {
        (units, 1, 1)
    } else {
        (units * WAVES_PER_SIMD * WAVEFRONT, WAVEFRONT, WAVEFRONT)
    };
    while quads % global != 0 {
        global += step;
        if global > quads {
            return Err(ClError::InvalidWorkGrid {
                global,
                local,
                reason: "no work size divides the item count",
            });
        }
    }

    Ok(MinpLayout { global, local, groups: global / local, strided: !cpu })
}

/// `b = a * (b & 0xffff) + (b >> 16)` with `a = b = seed`; returns the
/// values and their minimum.
pub fn generate(count: usize, seed: u32) -> (Vec<u32>, u32) {
    let a = seed;
    let mut b = seed;
    let mut min = u32::MAX;
    let values = (0..count)
        .map(|_| {
            b = a.wrapping_mul(b & 0xffff).wrapping_add(b >> 16);
            min = min.min(b);
            b
        })
        .collect();
    (values, min)
}

pub fn clock_seed() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as u32)
        .unwrap_or(1)
}

#[derive(Debug, Clone)]
pub struct MinpReport {
    pub layout: MinpLayout,
    pub loops: usize,
    pub elapsed: Duration,
    /// `[groups, threads, count, stride]` as written by work item 0.
    pub dbg: [u32; 4],
    pub gpu_min: u32,
    pub cpu_min: u32,
    /// `minp` + `reduce` device time of the final pass.
    pub kernel_ms: Option<f64>,
}

impl MinpReport {
    pub fn bandwidth_gbps(&self) -> f64 {
        let bytes = (ITEMS * std::mem::size_of::<cl_uint>() * self.loops) as f64;
        bytes / self.elapsed.as_secs_f64().max(f64::MIN_POSITIVE) / 1e9
    }

    pub fn passed(&self) -> bool {
        self.gpu_min == self.cpu_min
    }
}

impl fmt::Display for MinpReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [groups, threads, count, stride] = self.dbg;
        writeln!(
            f,
            "B/W {:.2} GB/sec, {groups} groups, {threads} threads, count {count}, stride {stride}",
            self.bandwidth_gbps()
        )?;
        if self.passed() {
            writeln!(f, "result correct")?;
        } else {
            writeln!(f, "result incorrect ({} != {})", self.gpu_min, self.cpu_min)?;
        }
        write_timing(f, self.kernel_ms)
    }
}

struct Pass<'a> {
    minp: &'a Kernel,
    reduce: &'a Kernel,
    layout: MinpLayout,
    items: cl_uint,
    dev: cl_uint,
}

impl Pass<'_> {
    // Both launches go to the same in-order queue; `reduce` additionally
    // waits on the `minp` event. Returns both events in launch order.
    fn enqueue(
        &self,
        session: &DeviceSession,
        src: &DeviceBuffer<u32, impl crate::State>,
        dst: &DeviceBuffer<u32, InFlight>,
        dbg: &DeviceBuffer<u32, InFlight>,
    ) -> Result<(Event, Event)> {
        let queue = session.queue();
        let minp_evt = unsafe {
            ExecuteKernel::new(self.minp)
                .set_arg(src.raw())
                .set_arg(dst.raw())
                .set_arg_local_buffer(std::mem::size_of::<cl_uint>())
                .set_arg(dbg.raw())
                .set_arg(&self.items)
                .set_arg(&self.dev)
                .set_global_work_size(self.layout.global)
                .set_local_work_size(self.layout.local)
                .enqueue_nd_range(queue)?
        };
        let reduce_evt = unsafe {
            ExecuteKernel::new(self.reduce)
                .set_arg(src.raw())
                .set_arg(dst.raw())
                .set_global_work_size(self.layout.groups)
                .set_wait_event(&minp_evt)
                .enqueue_nd_range(queue)?
        };
        Ok((minp_evt, reduce_evt))
    }
}

pub fn run(session: &DeviceSession, cfg: &WorkloadConfig) -> Result<MinpReport> {
    let device = session.device();
    let compute_units = device.max_compute_units()?;
    let cpu = platform::is_cpu(device.dev_type()?);
    let layout = layout(cpu, compute_units, ITEMS)?;
    log::debug!("minp layout {layout:?} ({compute_units} compute units)");

    let seed = cfg.seed.unwrap_or_else(clock_seed);
    let (values, cpu_min) = generate(ITEMS, seed);

    let ctx = session.context();
    let queue = session.queue();
    let src = DeviceBuffer::<u32, Queued>::from_slice(ctx, queue, CL_MEM_READ_ONLY, &values)?;
    let dst = DeviceBuffer::<u32, Queued>::new(ctx, CL_MEM_READ_WRITE, layout.groups)?.launch();
    // Work item 0 writes four debug words even when the grid is smaller.
    let dbg_len = layout.global.max(4);
    let dbg = DeviceBuffer::<u32, Queued>::new(ctx, CL_MEM_WRITE_ONLY, dbg_len)?.launch();

    let minp = session.kernel("minp")?;
    let reduce = session.kernel("reduce")?;
    let pass = Pass {
        minp: &minp,
        reduce: &reduce,
        layout,
        items: ITEMS as cl_uint,
        dev: u32::from(layout.strided),
    };

    let t0 = Instant::now();
    let (mut last_minp, mut last) = pass.enqueue(session, &src, &dst, &dbg)?;
    for _ in 1..cfg.loops {
        (last_minp, last) = pass.enqueue(session, &src, &dst, &dbg)?;
    }
    session.finish()?;
    let elapsed = t0.elapsed();

    let dst = dst.complete(&last)?.read_to_vec(queue)?;
    let dbg_words = dbg.complete(&last)?.read_to_vec(queue)?;
    let kernel_ms = pass_millis(&last_minp, &last);

    Ok(MinpReport {
        layout,
        loops: cfg.loops,
        elapsed,
        dbg: [dbg_words[0], dbg_words[1], dbg_words[2], dbg_words[3]],
        gpu_min: dst[0],
        cpu_min,
        kernel_ms,
    })
}

fn pass_millis(minp: &Event, reduce: &Event) -> Option<f64> {
    Some(kernel_millis(minp)? + kernel_millis(reduce)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cpu_layout_is_one_item_per_core() {
        let l = layout(true, 4, ITEMS).unwrap();
        assert_eq!(l, MinpLayout { global: 4, local: 1, groups: 4, strided: false });
    }

    #[test]
    fn cpu_layout_grows_until_it_divides() {
        let l = layout(true, 6, ITEMS).unwrap();
        assert_eq!(l.global, 8);
        assert_eq!((ITEMS / 4) % l.global, 0);
    }

    #[test]
    fn gpu_layout_rounds_up_by_wavefronts() {
        let l = layout(false, 20, ITEMS).unwrap();
        assert_eq!(l.global, 16384);
        assert_eq!(l.local, 64);
        assert_eq!(l.groups, 256);
        assert!(l.strided);

        assert_eq!(layout(false, 1, ITEMS).unwrap().global, 512);
    }

    #[test]
    fn zero_compute_units_treated_as_one() {
        assert_eq!(layout(true, 0, 16).unwrap().global, 1);
    }

    #[test]
    fn unusable_item_counts_are_rejected() {
        assert!(layout(true, 4, 0).is_err());
        assert!(layout(true, 4, 10).is_err());
        // 64 quads, smallest GPU grid is 448 items.
        assert!(layout(false, 1, 256).is_err());
    }

    #[test]
    fn generator_is_deterministic() {
        let (values, min) = generate(3, 2);
        assert_eq!(values, vec![4, 8, 16]);
        assert_eq!(min, 4);

        let (a, min_a) = generate(1000, 0x5eed);
        let (b, _) = generate(1000, 0x5eed);
        assert_eq!(a, b);
        assert_eq!(min_a, *a.iter().min().unwrap());
    }

    #[test]
    fn report_output() {
        let report = MinpReport {
            layout: layout(false, 20, ITEMS).unwrap(),
            loops: 500,
            elapsed: Duration::from_secs(1),
            dbg: [256, 16384, 256, 16384],
            gpu_min: 7,
            cpu_min: 7,
            kernel_ms: None,
        };
        let text = report.to_string();
        let header = "B/W 33.55 GB/sec, 256 groups, 16384 threads, count 256, stride 16384\n";
        assert!(text.starts_with(header));
        assert!(text.ends_with("result correct\n"));
    }

    #[test]
    fn report_appends_kernel_time_when_profiled() {
        let report = MinpReport {
            layout: layout(true, 4, ITEMS).unwrap(),
            loops: 1,
            elapsed: Duration::from_millis(10),
            dbg: [4, 4, 1048576, 1],
            gpu_min: 3,
            cpu_min: 2,
            kernel_ms: Some(1.5),
        };
        let text = report.to_string();
        assert!(!report.passed());
        assert!(text.ends_with("result incorrect (3 != 2)\nkernel time 1.500 ms\n"));
    }
}
