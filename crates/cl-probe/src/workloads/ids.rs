//! Thread-id probe: every work item writes its global, group and local id.

use opencl3::{kernel::ExecuteKernel, memory::CL_MEM_WRITE_ONLY};
use std::fmt;

use super::{WorkloadConfig, shown, write_timing};
use crate::{
    DeviceBuffer, DeviceSession, EventGuard, Queued, Result, buffer::kernel_millis,
};

#[derive(Debug, Clone)]
pub struct IdsReport {
    pub global_ids: Vec<i32>,
    pub group_ids: Vec<i32>,
    pub local_ids: Vec<i32>,
    pub local_size: usize,
    pub rows: Option<usize>,
    pub kernel_ms: Option<f64>,
}

/// `(global, group, local)` the runtime must report for item `i`.
pub fn expected(i: usize, local_size: usize) -> (i32, i32, i32) {
    (i as i32, (i / local_size) as i32, (i % local_size) as i32)
}

impl IdsReport {
    pub fn mismatches(&self) -> usize {
        (0..self.global_ids.len())
            .filter(|&i| {
                let got = (self.global_ids[i], self.group_ids[i], self.local_ids[i]);
                got != expected(i, self.local_size)
            })
            .count()
    }

    pub fn passed(&self) -> bool {
        self.mismatches() == 0
    }
}

impl fmt::Display for IdsReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for i in 0..shown(self.global_ids.len(), self.rows) {
            writeln!(
                f,
                "global_id = {} group_id = {} local_id = {}",
                self.global_ids[i], self.group_ids[i], self.local_ids[i]
            )?;
        }
        writeln!(
            f,
            "get_ids: {} work items, {} mismatches",
            self.global_ids.len(),
            self.mismatches()
        )?;
        write_timing(f, self.kernel_ms)
    }
}

pub fn run(session: &DeviceSession, cfg: &WorkloadConfig) -> Result<IdsReport> {
    let ctx = session.context();
    let queue = session.queue();
    let n = cfg.grid.global();

    let global_buf = DeviceBuffer::<i32, Queued>::new(ctx, CL_MEM_WRITE_ONLY, n)?.launch();
    let group_buf = DeviceBuffer::<i32, Queued>::new(ctx, CL_MEM_WRITE_ONLY, n)?.launch();
    let local_buf = DeviceBuffer::<i32, Queued>::new(ctx, CL_MEM_WRITE_ONLY, n)?.launch();

    let kernel = session.kernel("get_ids")?;
    let evt = unsafe {
        ExecuteKernel::new(&kernel)
            .set_arg(global_buf.raw())
            .set_arg(group_buf.raw())
            .set_arg(local_buf.raw())
            .set_global_work_size(n)
            .set_local_work_size(cfg.grid.local())
            .enqueue_nd_range(queue)?
    };

    let mut global_ids = vec![0_i32; n];
    let mut group_ids = vec![0_i32; n];
    let mut local_ids = vec![0_i32; n];
    EventGuard::wait_all([
        global_buf.enqueue_read_after(queue, &evt, &mut global_ids)?,
        group_buf.enqueue_read_after(queue, &evt, &mut group_ids)?,
        local_buf.enqueue_read_after(queue, &evt, &mut local_ids)?,
    ])?;
    session.finish()?;

    Ok(IdsReport {
        global_ids,
        group_ids,
        local_ids,
        local_size: cfg.grid.local(),
        rows: cfg.rows,
        kernel_ms: kernel_millis(&evt),
    })
}
