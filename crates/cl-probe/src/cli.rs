//! Command-line arguments and the validated run configuration.

use clap::{ArgAction, Parser, ValueEnum};
use std::path::PathBuf;

use crate::{
    Result,
    platform::DeviceKind,
    program::KernelSource,
    workloads::{GLOBAL_SIZE, LOCAL_SIZE, NLOOPS, WorkGrid, WorkloadConfig, WorkloadKind},
};

/// Enumerate OpenCL platforms and devices and run canned kernels on each.
#[derive(Parser, Debug)]
#[command(name = "cl-probe", version, about, long_about = None)]
pub struct CliArgs {
    /// OpenCL C source to build; the bundled test.cl when omitted
    #[arg(short = 'k', long, value_name = "PATH")]
    pub kernel_file: Option<PathBuf>,

    /// Workloads to run on every device, in order
    #[arg(
        short = 'w',
        long = "workload",
        value_enum,
        num_args = 1..,
        default_values_t = [WorkloadChoice::Matvec]
    )]
    pub workloads: Vec<WorkloadChoice>,

    /// Device types to enumerate
    #[arg(short = 't', long, value_enum, default_value_t = DeviceKind::All)]
    pub device_type: DeviceKind,

    /// Only use the first platform whose name contains this string
    #[arg(short = 'p', long, value_name = "SUBSTR")]
    pub platform: Option<String>,

    /// Only use the first device per platform whose name contains this string
    #[arg(short = 'd', long, value_name = "SUBSTR")]
    pub device: Option<String>,

    /// Global work size
    #[arg(long, default_value_t = GLOBAL_SIZE)]
    pub global_size: usize,

    /// Work-group size
    #[arg(long, default_value_t = LOCAL_SIZE)]
    pub local_size: usize,

    /// minp + reduce passes
    #[arg(long, default_value_t = NLOOPS)]
    pub loops: usize,

    /// Seed for the minp input generator; wall-clock seconds when omitted
    #[arg(long)]
    pub seed: Option<u32>,

    /// Initial value for the lookup3 hash
    #[arg(long, default_value_t = 0)]
    pub hash_seed: u32,

    /// Options passed to the OpenCL compiler
    #[arg(long, default_value = "", allow_hyphen_values = true)]
    pub build_options: String,

    /// Print at most N per-item result lines
    #[arg(long, value_name = "N")]
    pub rows: Option<usize>,

    /// Dump device properties before running
    #[arg(long)]
    pub info: bool,

    /// More log output (-v info, -vv debug, -vvv trace)
    #[arg(short = 'v', long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Errors only
    #[arg(short = 'q', long, conflicts_with = "verbose")]
    pub quiet: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkloadChoice {
    Ids,
    Sum,
    Matvec,
    Hash,
    Minp,
    All,
}

/// Expands `all`, keeps first-seen order, drops repeats.
pub fn expand(choices: &[WorkloadChoice]) -> Vec<WorkloadKind> {
    let mut out: Vec<WorkloadKind> = Vec::new();
    for choice in choices {
        let kinds: &[WorkloadKind] = match choice {
            WorkloadChoice::Ids => &[WorkloadKind::Ids],
            WorkloadChoice::Sum => &[WorkloadKind::Sum],
            WorkloadChoice::Matvec => &[WorkloadKind::Matvec],
            WorkloadChoice::Hash => &[WorkloadKind::Hash],
            WorkloadChoice::Minp => &[WorkloadKind::Minp],
            WorkloadChoice::All => &WorkloadKind::ALL,
        };
        for kind in kinds {
            if !out.contains(kind) {
                out.push(*kind);
            }
        }
    }
    out
}

#[derive(Debug, Clone)]
pub struct HarnessConfig {
    pub source: KernelSource,
    pub workloads: Vec<WorkloadKind>,
    pub device_kind: DeviceKind,
    pub platform_filter: Option<String>,
    pub device_filter: Option<String>,
    pub build_options: String,
    pub print_info: bool,
    pub workload: WorkloadConfig,
}

impl CliArgs {
    pub fn config(&self) -> Result<HarnessConfig> {
        let grid = WorkGrid::new(self.global_size, self.local_size)?;
        let mut workload = WorkloadConfig::new(grid, self.loops)?;
        workload.seed = self.seed;
        workload.hash_seed = self.hash_seed;
        workload.rows = self.rows;

        let source = match &self.kernel_file {
            Some(path) => KernelSource::File(path.clone()),
            None => KernelSource::Embedded,
        };

        Ok(HarnessConfig {
            source,
            workloads: expand(&self.workloads),
            device_kind: self.device_type,
            platform_filter: self.platform.clone(),
            device_filter: self.device.clone(),
            build_options: self.build_options.clone(),
            print_info: self.info,
            workload,
        })
    }

    pub fn log_filter(&self) -> log::LevelFilter {
        if self.quiet {
            return log::LevelFilter::Error;
        }
        match self.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ClError;

    fn parse(args: &[&str]) -> CliArgs {
        CliArgs::try_parse_from(std::iter::once("cl-probe").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn defaults_run_matvec_with_embedded_source() {
        let args = parse(&[]);
        let cfg = args.config().unwrap();
        assert_eq!(cfg.workloads, vec![WorkloadKind::Matvec]);
        assert_eq!(cfg.source, KernelSource::Embedded);
        assert_eq!(cfg.device_kind, DeviceKind::All);
        assert_eq!(cfg.workload.grid, WorkGrid::default());
        assert_eq!(cfg.workload.loops, 500);
        assert_eq!(cfg.workload.seed, None);
        assert_eq!(args.log_filter(), log::LevelFilter::Warn);
    }

    #[test]
    fn all_expands_in_order_without_repeats() {
        let cfg = parse(&["-w", "hash", "all"]).config().unwrap();
        assert_eq!(
            cfg.workloads,
            vec![
                WorkloadKind::Hash,
                WorkloadKind::Ids,
                WorkloadKind::Sum,
                WorkloadKind::Matvec,
                WorkloadKind::Minp
            ]
        );
    }

    #[test]
    fn filters_and_sizes() {
        let args = parse(&[
            "-k", "kernels/test.cl", "-t", "gpu", "-p", "AMD", "-d", "gfx", "--global-size", "256",
            "--local-size", "32", "--loops", "10", "--seed", "42", "--rows", "4", "--info", "-vv",
        ]);
        let cfg = args.config().unwrap();
        assert_eq!(cfg.source, KernelSource::File(PathBuf::from("kernels/test.cl")));
        assert_eq!(cfg.device_kind, DeviceKind::Gpu);
        assert_eq!(cfg.platform_filter.as_deref(), Some("AMD"));
        assert_eq!(cfg.device_filter.as_deref(), Some("gfx"));
        assert_eq!(cfg.workload.grid.groups(), 8);
        assert_eq!(cfg.workload.loops, 10);
        assert_eq!(cfg.workload.seed, Some(42));
        assert_eq!(cfg.workload.rows, Some(4));
        assert!(cfg.print_info);
        assert_eq!(args.log_filter(), log::LevelFilter::Debug);
    }

    #[test]
    fn build_options_may_start_with_a_dash() {
        let cfg = parse(&["--build-options", "-cl-fast-relaxed-math"]).config().unwrap();
        assert_eq!(cfg.build_options, "-cl-fast-relaxed-math");
    }

    #[test]
    fn bad_grid_is_rejected_at_config_time() {
        let err = parse(&["--global-size", "1000", "--local-size", "16"]).config().unwrap_err();
        assert!(matches!(err, ClError::InvalidWorkGrid { global: 1000, local: 16, .. }));
        assert!(parse(&["--loops", "0"]).config().is_err());
    }

    #[test]
    fn quiet_conflicts_with_verbose() {
        assert!(CliArgs::try_parse_from(["cl-probe", "-q", "-v"]).is_err());
        assert_eq!(parse(&["-q"]).log_filter(), log::LevelFilter::Error);
    }

    #[test]
    fn unknown_workload_is_a_parse_error() {
        assert!(CliArgs::try_parse_from(["cl-probe", "-w", "fft"]).is_err());
    }
}
