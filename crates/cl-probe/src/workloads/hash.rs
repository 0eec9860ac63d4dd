//! lookup3 string hashing on the device, checked against the CPU hash.

use opencl3::{
    kernel::ExecuteKernel,
    memory::{CL_MEM_READ_ONLY, CL_MEM_WRITE_ONLY},
    types::cl_uint,
};
use std::fmt;

use super::{WorkloadConfig, shown, write_timing};
use crate::{
    DeviceBuffer, DeviceSession, EventGuard, Queued, Result, buffer::kernel_millis, lookup3,
};

pub const KEY_LEN: usize = 100;
pub const CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz";

#[derive(Debug, Clone)]
pub struct HashReport {
    pub gpu: Vec<u32>,
    pub cpu: Vec<u32>,
    pub rows: Option<usize>,
    pub kernel_ms: Option<f64>,
}

impl HashReport {
    pub fn mismatches(&self) -> usize {
        self.gpu.iter().zip(&self.cpu).filter(|(g, c)| g != c).count()
    }

    pub fn passed(&self) -> bool {
        self.gpu.len() == self.cpu.len() && self.mismatches() == 0
    }
}

impl fmt::Display for HashReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "run_hash_test():")?;
        let rows = shown(self.gpu.len(), self.rows);
        for (i, (g, c)) in self.gpu.iter().zip(&self.cpu).take(rows).enumerate() {
            writeln!(f, "{i}: {g} {c}")?;
        }
        writeln!(f, "hash: {} keys, {} mismatches", self.gpu.len(), self.mismatches())?;
        write_timing(f, self.kernel_ms)
    }
}

/// `total` bytes of the alphabet repeated end to end. Key boundaries do not
/// line up with the alphabet, so neighbouring keys differ.
pub fn fill_keys(total: usize) -> Vec<u8> {
    CHARSET.iter().copied().cycle().take(total).collect()
}

pub fn run(session: &DeviceSession, cfg: &WorkloadConfig) -> Result<HashReport> {
    let ctx = session.context();
    let queue = session.queue();
    let n = cfg.grid.global();
    let keys = fill_keys(n * KEY_LEN);
    let len = KEY_LEN as cl_uint;
    let seed: cl_uint = cfg.hash_seed;

    let keys_buf = DeviceBuffer::<u8, Queued>::from_slice(ctx, queue, CL_MEM_READ_ONLY, &keys)?;
    let hashes_buf = DeviceBuffer::<u32, Queued>::new(ctx, CL_MEM_WRITE_ONLY, n)?.launch();

    let kernel = session.kernel("lookup3_hash_keys")?;
    let evt = unsafe {
        ExecuteKernel::new(&kernel)
            .set_arg(keys_buf.raw())
            .set_arg(&len)
            .set_arg(&seed)
            .set_arg(hashes_buf.raw())
            .set_global_work_size(n)
            .set_local_work_size(cfg.grid.local())
            .enqueue_nd_range(queue)?
    };

    let mut gpu = vec![0_u32; n];
    EventGuard::wait_all([hashes_buf.enqueue_read_after(queue, &evt, &mut gpu)?])?;
    session.finish()?;

    Ok(HashReport {
        gpu,
        cpu: lookup3::hash_keys(&keys, KEY_LEN, seed),
        rows: cfg.rows,
        kernel_ms: kernel_millis(&evt),
    })
}
