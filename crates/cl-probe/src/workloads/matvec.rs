//! Dense matrix-vector product `c = aa · b`, one row per work item.

use opencl3::{
    kernel::ExecuteKernel,
    memory::{CL_MEM_READ_ONLY, CL_MEM_WRITE_ONLY},
    types::cl_uint,
};
use std::fmt;

use super::{WorkloadConfig, shown, write_timing};
use crate::{
    ClError, DeviceBuffer, DeviceSession, EventGuard, Queued, Result, buffer::kernel_millis,
};

/// Largest accepted `|gpu - cpu| / max(|cpu|, 1)`.
pub const TOLERANCE: f64 = 1e-3;

#[derive(Debug, Clone)]
pub struct MatvecReport {
    pub c: Vec<f32>,
    pub max_rel_err: f64,
    pub rows: Option<usize>,
    pub kernel_ms: Option<f64>,
}

impl MatvecReport {
    pub fn passed(&self) -> bool {
        self.max_rel_err <= TOLERANCE
    }
}

impl fmt::Display for MatvecReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, v) in self.c.iter().take(shown(self.c.len(), self.rows)).enumerate() {
            writeln!(f, "c[{i}] {v:.6}")?;
        }
        writeln!(
            f,
            "matrix_multiply: n = {}, max relative error {:.3e}",
            self.c.len(),
            self.max_rel_err
        )?;
        write_timing(f, self.kernel_ms)
    }
}

/// `aa[i*n + j] = 1.1 * i * j`, `b[i] = 2.2 * i`, computed in `f32`.
pub fn inputs(n: usize) -> (Vec<f32>, Vec<f32>) {
    let mut aa = Vec::with_capacity(n * n);
    for i in 0..n {
        for j in 0..n {
            aa.push(1.1_f32 * i as f32 * j as f32);
        }
    }
    let b = (0..n).map(|i| 2.2_f32 * i as f32).collect();
    (aa, b)
}

/// Row-major product accumulated in `f64`.
pub fn reference(aa: &[f32], b: &[f32]) -> Vec<f64> {
    let n = b.len();
    if n == 0 {
        return Vec::new();
    }
    aa.chunks_exact(n)
        .map(|row| {
            row.iter()
                .zip(b)
                .map(|(&x, &y)| f64::from(x) * f64::from(y))
                .sum::<f64>()
        })
        .collect()
}

pub fn max_relative_error(got: &[f32], want: &[f64]) -> f64 {
    got.iter()
        .zip(want)
        .map(|(&g, &w)| (f64::from(g) - w).abs() / w.abs().max(1.0))
        .fold(0.0, f64::max)
}

pub fn run(session: &DeviceSession, cfg: &WorkloadConfig) -> Result<MatvecReport> {
    let n = cfg.grid.global();
    let n_arg = cl_uint::try_from(n)
        .map_err(|_| ClError::InvalidArgument("matrix size exceeds cl_uint".into()))?;

    let ctx = session.context();
    let queue = session.queue();
    let (aa, b) = inputs(n);

    let aa_buf = DeviceBuffer::<f32, Queued>::from_slice(ctx, queue, CL_MEM_READ_ONLY, &aa)?;
    let b_buf = DeviceBuffer::<f32, Queued>::from_slice(ctx, queue, CL_MEM_READ_ONLY, &b)?;
    let c_buf = DeviceBuffer::<f32, Queued>::new(ctx, CL_MEM_WRITE_ONLY, n)?.launch();

    let kernel = session.kernel("matrix_multiply")?;
    let evt = unsafe {
        ExecuteKernel::new(&kernel)
            .set_arg(&n_arg)
            .set_arg(aa_buf.raw())
            .set_arg(b_buf.raw())
            .set_arg(c_buf.raw())
            .set_global_work_size(n)
            .set_local_work_size(cfg.grid.local())
            .enqueue_nd_range(queue)?
    };

    let mut c = vec![0.0_f32; n];
    EventGuard::wait_all([c_buf.enqueue_read_after(queue, &evt, &mut c)?])?;
    session.finish()?;

    let max_rel_err = max_relative_error(&c, &reference(&aa, &b));
    Ok(MatvecReport { c, max_rel_err, rows: cfg.rows, kernel_ms: kernel_millis(&evt) })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inputs_follow_formula() {
        let (aa, b) = inputs(4);
        assert_eq!(aa.len(), 16);
        assert_eq!(aa[0], 0.0);
        assert_eq!(aa[2 * 4 + 3], 1.1_f32 * 2.0 * 3.0);
        assert_eq!(b, vec![0.0, 2.2, 4.4, 2.2_f32 * 3.0]);
    }

    #[test]
    fn reference_small_product() {
        let aa = [1.0, 2.0, 3.0, 4.0];
        let b = [5.0, 6.0];
        assert_eq!(reference(&aa, &b), vec![17.0, 39.0]);
    }

    #[test]
    fn first_row_is_zero() {
        let (aa, b) = inputs(32);
        let c = reference(&aa, &b);
        assert_eq!(c[0], 0.0);
        assert!(c[31] > c[30]);
    }

    #[test]
    fn relative_error_uses_unit_floor_near_zero() {
        assert_eq!(max_relative_error(&[0.5], &[0.0]), 0.5);
        assert!((max_relative_error(&[101.0], &[100.0]) - 0.01).abs() < 1e-12);
    }

    #[test]
    fn report_thresholds_on_tolerance() {
        let ok = MatvecReport {
            c: vec![0.0, 1.0],
            max_rel_err: 1e-6,
            rows: Some(1),
            kernel_ms: None,
        };
        assert!(ok.passed());
        assert!(ok.to_string().starts_with("c[0] 0.000000\nmatrix_multiply: n = 2"));
        let bad = MatvecReport { max_rel_err: 0.1, ..ok };
        assert!(!bad.passed());
    }
}
