//! The canned workloads. Each one owns its kernel and buffers for the
//! duration of a run and returns a printable report.

pub mod hash;
pub mod ids;
pub mod matvec;
pub mod minp;
pub mod sum;

use std::fmt;

use crate::{ClError, DeviceSession, Result};

pub const GLOBAL_SIZE: usize = 1024;
pub const LOCAL_SIZE: usize = 16;
pub const NLOOPS: usize = 500;

/// 1-D NDRange: `local` divides `global`, both non-zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkGrid {
    global: usize,
    local: usize,
}

impl WorkGrid {
    pub fn new(global: usize, local: usize) -> Result<Self> {
        let reject = |reason| Err(ClError::InvalidWorkGrid { global, local, reason });
        if global == 0 {
            return reject("global size must be non-zero");
        }
        if local == 0 {
            return reject("local size must be non-zero");
        }
        if global % local != 0 {
            return reject("local size must divide global size");
        }
        Ok(Self { global, local })
    }

    pub fn global(&self) -> usize {
        self.global
    }

    pub fn local(&self) -> usize {
        self.local
    }

    pub fn groups(&self) -> usize {
        self.global / self.local
    }

    /// Tree reductions in local memory halve the group each step.
    pub fn require_pow2_local(&self) -> Result<()> {
        if !self.local.is_power_of_two() {
            return Err(ClError::InvalidWorkGrid {
                global: self.global,
                local: self.local,
                reason: "local size must be a power of two",
            });
        }
        Ok(())
    }
}

impl Default for WorkGrid {
    fn default() -> Self {
        Self { global: GLOBAL_SIZE, local: LOCAL_SIZE }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkloadConfig {
    pub grid: WorkGrid,
    /// minp + reduce passes.
    pub loops: usize,
    /// minp input generator seed; wall-clock seconds when `None`.
    pub seed: Option<u32>,
    pub hash_seed: u32,
    /// Per-item lines printed; all when `None`.
    pub rows: Option<usize>,
}

impl WorkloadConfig {
    pub fn new(grid: WorkGrid, loops: usize) -> Result<Self> {
        if loops == 0 {
            return Err(ClError::InvalidArgument("loops must be at least 1".into()));
        }
        Ok(Self { grid, loops, ..Self::default() })
    }
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            grid: WorkGrid::default(),
            loops: NLOOPS,
            seed: None,
            hash_seed: 0,
            rows: None,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WorkloadKind {
    Ids,
    Sum,
    Matvec,
    Hash,
    Minp,
}

impl WorkloadKind {
    pub const ALL: [WorkloadKind; 5] = [
        WorkloadKind::Ids,
        WorkloadKind::Sum,
        WorkloadKind::Matvec,
        WorkloadKind::Hash,
        WorkloadKind::Minp,
    ];

    pub fn name(self) -> &'static str {
        match self {
            WorkloadKind::Ids => "get_ids",
            WorkloadKind::Sum => "sum_numbers",
            WorkloadKind::Matvec => "matrix_multiply",
            WorkloadKind::Hash => "hash",
            WorkloadKind::Minp => "minp",
        }
    }

    pub fn run(self, session: &DeviceSession, cfg: &WorkloadConfig) -> Result<Report> {
        log::info!("running {} on {}", self.name(), session.device_name());
        let report = match self {
            WorkloadKind::Ids => Report::Ids(ids::run(session, cfg)?),
            WorkloadKind::Sum => Report::Sum(sum::run(session, cfg)?),
            WorkloadKind::Matvec => Report::Matvec(matvec::run(session, cfg)?),
            WorkloadKind::Hash => Report::Hash(hash::run(session, cfg)?),
            WorkloadKind::Minp => Report::Minp(minp::run(session, cfg)?),
        };
        if !report.passed() {
            log::warn!("{} produced wrong results on {}", self.name(), session.device_name());
        }
        Ok(report)
    }
}

#[derive(Debug, Clone)]
pub enum Report {
    Ids(ids::IdsReport),
    Sum(sum::SumReport),
    Matvec(matvec::MatvecReport),
    Hash(hash::HashReport),
    Minp(minp::MinpReport),
}

impl Report {
    pub fn passed(&self) -> bool {
        match self {
            Report::Ids(r) => r.passed(),
            Report::Sum(r) => r.passed(),
            Report::Matvec(r) => r.passed(),
            Report::Hash(r) => r.passed(),
            Report::Minp(r) => r.passed(),
        }
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Report::Ids(r) => fmt::Display::fmt(r, f),
            Report::Sum(r) => fmt::Display::fmt(r, f),
            Report::Matvec(r) => fmt::Display::fmt(r, f),
            Report::Hash(r) => fmt::Display::fmt(r, f),
            Report::Minp(r) => fmt::Display::fmt(r, f),
        }
    }
}

/// Number of per-item lines to print out of `len`.
pub(crate) fn shown(len: usize, rows: Option<usize>) -> usize {
    rows.map_or(len, |r| r.min(len))
}

pub(crate) fn write_timing(f: &mut fmt::Formatter<'_>, kernel_ms: Option<f64>) -> fmt::Result {
    match kernel_ms {
        Some(ms) => writeln!(f, "kernel time {ms:.3} ms"),
        None => Ok(()),
    }
}
