//! Parallel sum: per-item partial sums folded per work group in local memory.

use opencl3::{
    kernel::ExecuteKernel,
    memory::{CL_MEM_READ_ONLY, CL_MEM_WRITE_ONLY},
    types::cl_uint,
};
use std::fmt;

use super::{WorkGrid, WorkloadConfig, write_timing};
use crate::{
    ClError, DeviceBuffer, DeviceSession, EventGuard, Queued, Result, buffer::kernel_millis,
};

#[derive(Debug, Clone)]
pub struct SumReport {
    pub opencl_sum: i64,
    pub normal_sum: i64,
    pub groups: usize,
    pub kernel_ms: Option<f64>,
}

impl SumReport {
    pub fn passed(&self) -> bool {
        self.opencl_sum == self.normal_sum
    }
}

impl fmt::Display for SumReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "OpenCL sum = {}", self.opencl_sum)?;
        writeln!(f, "Normal sum = {}", self.normal_sum)?;
        write_timing(f, self.kernel_ms)
    }
}

/// `global * global` ones; each work item owns `global` of them.
pub fn inputs(grid: &WorkGrid) -> Result<Vec<i32>> {
    let global = grid.global();
    let total = global.checked_mul(global).ok_or(ClError::InvalidWorkGrid {
        global,
        local: grid.local(),
        reason: "global size squared overflows",
    })?;
    Ok(vec![1; total])
}

pub fn reference(numbers: &[i32]) -> i64 {
    numbers.iter().map(|&x| i64::from(x)).sum()
}

pub fn run(session: &DeviceSession, cfg: &WorkloadConfig) -> Result<SumReport> {
    let grid = cfg.grid;
    grid.require_pow2_local()?;
    let per_item = cl_uint::try_from(grid.global())
        .map_err(|_| ClError::InvalidArgument("global size exceeds cl_uint".into()))?;

    let ctx = session.context();
    let queue = session.queue();
    let numbers = inputs(&grid)?;

    let numbers_buf =
        DeviceBuffer::<i32, Queued>::from_slice(ctx, queue, CL_MEM_READ_ONLY, &numbers)?;
    let sums_buf =
        DeviceBuffer::<i32, Queued>::new(ctx, CL_MEM_WRITE_ONLY, grid.groups())?.launch();

    let kernel = session.kernel("sum_numbers")?;
    let evt = unsafe {
        ExecuteKernel::new(&kernel)
            .set_arg(numbers_buf.raw())
            .set_arg_local_buffer(grid.local() * std::mem::size_of::<i32>())
            .set_arg(sums_buf.raw())
            .set_arg(&per_item)
            .set_global_work_size(grid.global())
            .set_local_work_size(grid.local())
            .enqueue_nd_range(queue)?
    };

    let mut sums = vec![0_i32; grid.groups()];
    EventGuard::wait_all([sums_buf.enqueue_read_after(queue, &evt, &mut sums)?])?;
    session.finish()?;

    Ok(SumReport {
        opencl_sum: reference(&sums),
        normal_sum: reference(&numbers),
        groups: grid.groups(),
        kernel_ms: kernel_millis(&evt),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_grid_sums_to_one_mebi() {
        let numbers = inputs(&WorkGrid::default()).unwrap();
        assert_eq!(numbers.len(), 1024 * 1024);
        assert_eq!(reference(&numbers), 1_048_576);
    }

    #[test]
    fn reference_does_not_overflow_i32() {
        assert_eq!(reference(&[i32::MAX, i32::MAX]), 2 * i64::from(i32::MAX));
    }

    #[test]
    fn report_compares_sums() {
        let mut report = SumReport {
            opencl_sum: 256,
            normal_sum: 256,
            groups: 4,
            kernel_ms: Some(0.25),
        };
        assert!(report.passed());
        assert_eq!(
            report.to_string(),
            "OpenCL sum = 256\nNormal sum = 256\nkernel time 0.250 ms\n"
        );
        report.opencl_sum = 255;
        assert!(!report.passed());
    }
}
