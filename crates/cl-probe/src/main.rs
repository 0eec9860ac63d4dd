use clap::Parser;
use cl_probe::{
    ClError, DeviceSession,
    cli::{CliArgs, HarnessConfig},
    platform::{self, DeviceReport},
};
use opencl3::{device::Device, platform::Platform};
use std::process::ExitCode;

fn main() -> ExitCode {
    let args = CliArgs::parse();
    env_logger::Builder::new()
        .filter_level(args.log_filter())
        .parse_default_env()
        .init();

    match run(&args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            eprintln!("{e}");
            ExitCode::from(2)
        }
    }
}

/// `Ok(false)` when some workload produced wrong results.
fn run(args: &CliArgs) -> Result<bool, ClError> {
    let cfg = args.config()?;
    let source = cfg.source.load()?;
    log::info!("kernel source: {}", cfg.source.describe());

    // 1. Plattformen
    let platforms = select_platforms(&cfg)?;
    if platforms.is_empty() {
        log::warn!("{}", no_platform_message(cfg.platform_filter.as_deref()));
        return Ok(true);
    }
    platform::print_platform_names(&platforms)?;

    // 2. Geräte & Workloads
    let mut all_passed = true;
    for p in &platforms {
        let devices = select_devices(p, &cfg)?;
        if devices.is_empty() {
            let name = platform::platform_name(p)?;
            log::info!("{}", no_device_message(&name, cfg.device_filter.as_deref()));
            continue;
        }
        platform::print_device_names(&devices)?;

        for device in devices {
            if cfg.print_info {
                print!("{}", DeviceReport::query(&device)?);
            }

            let session = DeviceSession::open(device, &source, &cfg.build_options)?;
            for kind in &cfg.workloads {
                let report = kind.run(&session, &cfg.workload)?;
                print!("{report}");
                all_passed &= report.passed();
            }
        }
    }

    #[cfg(feature = "metrics")]
    cl_probe::summary();

    Ok(all_passed)
}

fn select_platforms(cfg: &HarnessConfig) -> Result<Vec<Platform>, ClError> {
    match &cfg.platform_filter {
        Some(pattern) => Ok(platform::find_platform(pattern)?.into_iter().collect()),
        None => platform::platforms(),
    }
}

fn select_devices(p: &Platform, cfg: &HarnessConfig) -> Result<Vec<Device>, ClError> {
    match &cfg.device_filter {
        Some(pattern) => {
            Ok(platform::find_device(p, cfg.device_kind, pattern)?.into_iter().collect())
        }
        None => platform::devices(p, cfg.device_kind),
    }
}

fn no_platform_message(filter: Option<&str>) -> String {
    match filter {
        Some(pattern) => format!("no OpenCL platform name contains {pattern:?}"),
        None => "no OpenCL platform found".to_owned(),
    }
}

fn no_device_message(platform: &str, filter: Option<&str>) -> String {
    match filter {
        Some(pattern) => {
            format!("platform {platform} has no device whose name contains {pattern:?}")
        }
        None => format!("platform {platform} has no matching device"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unmatched_platform_filter_is_named() {
        assert_eq!(no_platform_message(None), "no OpenCL platform found");
        assert_eq!(
            no_platform_message(Some("NVIDIA")),
            "no OpenCL platform name contains \"NVIDIA\""
        );
    }

    #[test]
    fn unmatched_device_filter_is_named() {
        assert_eq!(no_device_message("pocl", None), "platform pocl has no matching device");
        assert_eq!(
            no_device_message("pocl", Some("gfx")),
            "platform pocl has no device whose name contains \"gfx\""
        );
    }
}
