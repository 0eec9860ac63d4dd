//! Platform and device enumeration, name lookup and the device info dump.

use opencl3::{
    device::{
        CL_DEVICE_TYPE_ACCELERATOR, CL_DEVICE_TYPE_ALL, CL_DEVICE_TYPE_CPU,
        CL_DEVICE_TYPE_DEFAULT, CL_DEVICE_TYPE_GPU, Device,
    },
    platform::{Platform, get_platforms},
    types::{cl_device_type, cl_uint, cl_ulong},
};
use std::fmt;

use crate::{
    ClError, Result,
    codes::{DEVICE_NOT_FOUND, PLATFORM_NOT_FOUND_KHR},
};

/// Device type filter as accepted on the command line.
#[derive(clap::ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DeviceKind {
    #[default]
    All,
    Gpu,
    Cpu,
    Accelerator,
    Default,
}

impl DeviceKind {
    pub fn mask(self) -> cl_device_type {
        match self {
            DeviceKind::All => CL_DEVICE_TYPE_ALL,
            DeviceKind::Gpu => CL_DEVICE_TYPE_GPU,
            DeviceKind::Cpu => CL_DEVICE_TYPE_CPU,
            DeviceKind::Accelerator => CL_DEVICE_TYPE_ACCELERATOR,
            DeviceKind::Default => CL_DEVICE_TYPE_DEFAULT,
        }
    }
}

/// Every installed platform. No runtime installed is not an error.
pub fn platforms() -> Result<Vec<Platform>> {
    match get_platforms() {
        Ok(list) => Ok(list),
        Err(e) if e.0 == PLATFORM_NOT_FOUND_KHR => Ok(Vec::new()),
        Err(e) => Err(e.into()),
    }
}

/// Devices of `kind` on `platform`; empty when the platform has none.
pub fn devices(platform: &Platform, kind: DeviceKind) -> Result<Vec<Device>> {
    match platform.get_devices(kind.mask()) {
        Ok(ids) => Ok(ids.into_iter().map(Device::new).collect()),
        Err(e) if e.0 == DEVICE_NOT_FOUND => Ok(Vec::new()),
        Err(e) => Err(e.into()),
    }
}

pub fn platform_name(platform: &Platform) -> Result<String> {
    Ok(trim_info(platform.name()?))
}

pub fn device_name(device: &Device) -> Result<String> {
    Ok(trim_info(device.name()?))
}

// Info strings come back NUL-terminated from some drivers.
fn trim_info(s: String) -> String {
    s.trim_end_matches('\0').trim().to_owned()
}

/// First platform whose name contains `pattern`.
pub fn find_platform(pattern: &str) -> Result<Option<Platform>> {
    for platform in platforms()? {
        if platform_name(&platform)?.contains(pattern) {
            return Ok(Some(platform));
        }
    }
    Ok(None)
}

/// First device of `kind` on `platform` whose name contains `pattern`.
pub fn find_device(platform: &Platform, kind: DeviceKind, pattern: &str) -> Result<Option<Device>> {
    for device in devices(platform, kind)? {
        if device_name(&device)?.contains(pattern) {
            return Ok(Some(device));
        }
    }
    Ok(None)
}

pub fn format_names<I>(header: &str, names: I) -> String
where
    I: IntoIterator<Item = String>,
{
    let mut out = format!("{header}\n");
    for (i, name) in names.into_iter().enumerate() {
        out.push_str(&format!("    [{i}] {name}\n"));
    }
    out
}

pub fn print_platform_names(platforms: &[Platform]) -> Result<()> {
    let names = platforms.iter().map(platform_name).collect::<Result<Vec<_>>>()?;
    print!("{}", format_names("Platform names:", names));
    Ok(())
}

pub fn print_device_names(devices: &[Device]) -> Result<()> {
    let names = devices.iter().map(device_name).collect::<Result<Vec<_>>>()?;
    print!("{}", format_names("Device names:", names));
    Ok(())
}

/// `CL_DEVICE_TYPE_*` bits as a readable label, e.g. `GPU` or `CPU|DEFAULT`.
pub fn type_label(bits: cl_device_type) -> String {
    let mut parts = Vec::new();
    if bits & CL_DEVICE_TYPE_DEFAULT != 0 {
        parts.push("DEFAULT");
    }
    if bits & CL_DEVICE_TYPE_CPU != 0 {
        parts.push("CPU");
    }
    if bits & CL_DEVICE_TYPE_GPU != 0 {
        parts.push("GPU");
    }
    if bits & CL_DEVICE_TYPE_ACCELERATOR != 0 {
        parts.push("ACCELERATOR");
    }
    if parts.is_empty() {
        return format!("UNKNOWN({bits:#x})");
    }
    parts.join("|")
}

pub fn is_cpu(bits: cl_device_type) -> bool {
    bits & CL_DEVICE_TYPE_CPU != 0
}

/// Snapshot of the properties printed by `--info`.
#[derive(Debug, Clone, Default)]
pub struct DeviceReport {
    pub device_type: cl_device_type,
    pub vendor_id: cl_uint,
    pub max_compute_units: cl_uint,
    pub max_work_item_dimensions: cl_uint,
    pub max_work_group_size: usize,
    pub max_work_item_sizes: Vec<usize>,
    /// char, short, int, long, float, double.
    pub preferred_vector_widths: [cl_uint; 6],
    pub max_clock_frequency: cl_uint,
    pub address_bits: cl_uint,
    pub max_read_image_args: cl_uint,
    pub max_write_image_args: cl_uint,
    pub max_mem_alloc_size: cl_ulong,
    pub image2d_max: [usize; 2],
    pub image3d_max: [usize; 3],
    pub image_support: bool,
    pub max_parameter_size: usize,
    pub max_samplers: cl_uint,
    pub mem_base_addr_align: cl_uint,
    pub min_data_type_align_size: cl_uint,
    pub single_fp_config: cl_ulong,
    pub global_mem_cache_type: cl_uint,
    pub global_mem_cacheline_size: cl_uint,
    pub global_mem_cache_size: cl_ulong,
    pub global_mem_size: cl_ulong,
    pub max_constant_buffer_size: cl_ulong,
    pub max_constant_args: cl_uint,
    pub local_mem_type: cl_uint,
    pub local_mem_size: cl_ulong,
    pub error_correction_support: bool,
    pub profiling_timer_resolution: usize,
    pub endian_little: bool,
    pub available: bool,
    pub compiler_available: bool,
    pub execution_capabilities: cl_ulong,
    pub queue_properties: cl_ulong,
    pub name: String,
    pub vendor: String,
    pub driver_version: String,
    pub profile: String,
    pub version: String,
    /// Raw `cl_platform_id`.
    pub platform: usize,
    /// Zero on devices without `cl_khr_fp64`.
    pub double_fp_config: cl_ulong,
}

impl DeviceReport {
    pub fn query(device: &Device) -> Result<Self, ClError> {
        Ok(Self {
            device_type: device.dev_type()?,
            vendor_id: device.vendor_id()?,
            max_compute_units: device.max_compute_units()?,
            max_work_item_dimensions: device.max_work_item_dimensions()?,
            max_work_group_size: device.max_work_group_size()?,
            max_work_item_sizes: device.max_work_item_sizes()?,
            preferred_vector_widths: [
                device.max_preferred_vector_width_char()?,
                device.max_preferred_vector_width_short()?,
                device.max_preferred_vector_width_int()?,
                device.max_preferred_vector_width_long()?,
                device.max_preferred_vector_width_float()?,
                device.max_preferred_vector_width_double()?,
            ],
            max_clock_frequency: device.max_clock_frequency()?,
            address_bits: device.address_bits()?,
            max_read_image_args: device.max_read_image_args()?,
            max_write_image_args: device.max_write_image_args()?,
            max_mem_alloc_size: device.max_mem_alloc_size()?,
            image2d_max: [device.image2d_max_width()?, device.image2d_max_height()?],
            image3d_max: [
                device.image3d_max_width()?,
                device.image3d_max_height()?,
                device.image3d_max_depth()?,
            ],
            image_support: device.image_support()?,
            max_parameter_size: device.max_parameter_size()?,
            max_samplers: device.max_device_samples()?,
            mem_base_addr_align: device.mem_base_addr_align()?,
            min_data_type_align_size: device.min_data_type_align_size()?,
            single_fp_config: device.single_fp_config()?,
            global_mem_cache_type: device.global_mem_cache_type()?,
            global_mem_cacheline_size: device.global_mem_cacheline_size()?,
            global_mem_cache_size: device.global_mem_cache_size()?,
            global_mem_size: device.global_mem_size()?,
            max_constant_buffer_size: device.max_constant_buffer_size()?,
            max_constant_args: device.max_constant_args()?,
            local_mem_type: device.local_mem_type()?,
            local_mem_size: device.local_mem_size()?,
            error_correction_support: device.error_correction_support()?,
            profiling_timer_resolution: device.profiling_timer_resolution()?,
            endian_little: device.endian_little()?,
            available: device.available()?,
            compiler_available: device.compiler_available()?,
            execution_capabilities: device.execution_capabilities()?,
            queue_properties: device.queue_on_host_properties()?,
            name: trim_info(device.name()?),
            vendor: trim_info(device.vendor()?),
            driver_version: trim_info(device.driver_version()?),
            profile: trim_info(device.profile()?),
            version: trim_info(device.version()?),
            platform: device.platform()? as usize,
            // Some 1.x drivers reject the query outright when fp64 is absent.
            double_fp_config: device.double_fp_config().unwrap_or(0),
        })
    }
}

const VECTOR_WIDTH_NAMES: [&str; 6] = ["CHAR", "SHORT", "INT", "LONG", "FLOAT", "DOUBLE"];

impl fmt::Display for DeviceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sizes = self
            .max_work_item_sizes
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>()
            .join(" ");
        let flag = |b: bool| u8::from(b);

        writeln!(f, "CL_DEVICE_TYPE = {}", type_label(self.device_type))?;
        writeln!(f, "CL_DEVICE_VENDOR_ID = {}", self.vendor_id)?;
        writeln!(f, "CL_DEVICE_MAX_COMPUTE_UNITS = {}", self.max_compute_units)?;
        writeln!(f, "CL_DEVICE_MAX_WORK_ITEM_DIMENSIONS = {}", self.max_work_item_dimensions)?;
        writeln!(f, "CL_DEVICE_MAX_WORK_GROUP_SIZE = {}", self.max_work_group_size)?;
        writeln!(f, "CL_DEVICE_MAX_WORK_ITEM_SIZES = {sizes}")?;
        for (ty, width) in VECTOR_WIDTH_NAMES.iter().zip(self.preferred_vector_widths) {
            writeln!(f, "CL_DEVICE_PREFERRED_VECTOR_WIDTH_{ty} = {width}")?;
        }
        writeln!(f, "CL_DEVICE_MAX_CLOCK_FREQUENCY = {}", self.max_clock_frequency)?;
        writeln!(f, "CL_DEVICE_ADDRESS_BITS = {}", self.address_bits)?;
        writeln!(f, "CL_DEVICE_MAX_READ_IMAGE_ARGS = {}", self.max_read_image_args)?;
        writeln!(f, "CL_DEVICE_MAX_WRITE_IMAGE_ARGS = {}", self.max_write_image_args)?;
        writeln!(f, "CL_DEVICE_MAX_MEM_ALLOC_SIZE = {}", self.max_mem_alloc_size)?;
        writeln!(f, "CL_DEVICE_IMAGE2D_MAX_WIDTH = {}", self.image2d_max[0])?;
        writeln!(f, "CL_DEVICE_IMAGE2D_MAX_HEIGHT = {}", self.image2d_max[1])?;
        writeln!(f, "CL_DEVICE_IMAGE3D_MAX_WIDTH = {}", self.image3d_max[0])?;
        writeln!(f, "CL_DEVICE_IMAGE3D_MAX_HEIGHT = {}", self.image3d_max[1])?;
        writeln!(f, "CL_DEVICE_IMAGE3D_MAX_DEPTH = {}", self.image3d_max[2])?;
        writeln!(f, "CL_DEVICE_IMAGE_SUPPORT = {}", flag(self.image_support))?;
        writeln!(f, "CL_DEVICE_MAX_PARAMETER_SIZE = {}", self.max_parameter_size)?;
        writeln!(f, "CL_DEVICE_MAX_SAMPLERS = {}", self.max_samplers)?;
        writeln!(f, "CL_DEVICE_MEM_BASE_ADDR_ALIGN = {}", self.mem_base_addr_align)?;
        writeln!(f, "CL_DEVICE_MIN_DATA_TYPE_ALIGN_SIZE = {}", self.min_data_type_align_size)?;
        writeln!(f, "CL_DEVICE_SINGLE_FP_CONFIG = {:#x}", self.single_fp_config)?;
        writeln!(f, "CL_DEVICE_GLOBAL_MEM_CACHE_TYPE = {}", self.global_mem_cache_type)?;
        writeln!(f, "CL_DEVICE_GLOBAL_MEM_CACHELINE_SIZE = {}", self.global_mem_cacheline_size)?;
        writeln!(f, "CL_DEVICE_GLOBAL_MEM_CACHE_SIZE = {}", self.global_mem_cache_size)?;
        writeln!(f, "CL_DEVICE_GLOBAL_MEM_SIZE = {}", self.global_mem_size)?;
        writeln!(f, "CL_DEVICE_MAX_CONSTANT_BUFFER_SIZE = {}", self.max_constant_buffer_size)?;
        writeln!(f, "CL_DEVICE_MAX_CONSTANT_ARGS = {}", self.max_constant_args)?;
        writeln!(f, "CL_DEVICE_LOCAL_MEM_TYPE = {}", self.local_mem_type)?;
        writeln!(f, "CL_DEVICE_LOCAL_MEM_SIZE = {}", self.local_mem_size)?;
        writeln!(
            f,
            "CL_DEVICE_ERROR_CORRECTION_SUPPORT = {}",
            flag(self.error_correction_support)
        )?;
        writeln!(f, "CL_DEVICE_PROFILING_TIMER_RESOLUTION = {}", self.profiling_timer_resolution)?;
        writeln!(f, "CL_DEVICE_ENDIAN_LITTLE = {}", flag(self.endian_little))?;
        writeln!(f, "CL_DEVICE_AVAILABLE = {}", flag(self.available))?;
        writeln!(f, "CL_DEVICE_COMPILER_AVAILABLE = {}", flag(self.compiler_available))?;
        writeln!(f, "CL_DEVICE_EXECUTION_CAPABILITIES = {:#x}", self.execution_capabilities)?;
        writeln!(f, "CL_DEVICE_QUEUE_PROPERTIES = {:#x}", self.queue_properties)?;
        writeln!(f, "CL_DEVICE_NAME = {}", self.name)?;
        writeln!(f, "CL_DEVICE_VENDOR = {}", self.vendor)?;
        writeln!(f, "CL_DRIVER_VERSION = {}", self.driver_version)?;
        writeln!(f, "CL_DEVICE_PROFILE = {}", self.profile)?;
        writeln!(f, "CL_DEVICE_VERSION = {}", self.version)?;
        writeln!(f, "CL_DEVICE_PLATFORM = {:#x}", self.platform)?;
        writeln!(f, "CL_DEVICE_DOUBLE_FP_CONFIG = {:#x}", self.double_fp_config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_indexed() {
        let out = format_names("Device names:", vec!["gfx1030".to_string(), "pthread".to_string()]);
        assert_eq!(out, "Device names:\n    [0] gfx1030\n    [1] pthread\n");
    }

    #[test]
    fn empty_name_list_prints_header_only() {
        assert_eq!(format_names("Platform names:", Vec::new()), "Platform names:\n");
    }

    #[test]
    fn type_labels() {
        assert_eq!(type_label(CL_DEVICE_TYPE_GPU), "GPU");
        assert_eq!(type_label(CL_DEVICE_TYPE_CPU | CL_DEVICE_TYPE_DEFAULT), "DEFAULT|CPU");
        assert_eq!(type_label(0), "UNKNOWN(0x0)");
        assert!(is_cpu(CL_DEVICE_TYPE_CPU));
        assert!(!is_cpu(CL_DEVICE_TYPE_GPU));
    }

    #[test]
    fn device_kind_masks() {
        assert_eq!(DeviceKind::default(), DeviceKind::All);
        assert_eq!(DeviceKind::Gpu.mask(), CL_DEVICE_TYPE_GPU);
        assert_eq!(DeviceKind::All.mask(), CL_DEVICE_TYPE_ALL);
    }

    fn sample_report() -> DeviceReport {
        DeviceReport {
            device_type: CL_DEVICE_TYPE_GPU,
            vendor_id: 0x1002,
            max_compute_units: 20,
            max_work_item_dimensions: 3,
            max_work_group_size: 256,
            max_work_item_sizes: vec![1024, 1024, 1024],
            preferred_vector_widths: [4, 2, 1, 1, 1, 0],
            image_support: true,
            single_fp_config: 0xbe,
            queue_properties: 0x2,
            name: "gfx1030".into(),
            vendor: "Advanced Micro Devices, Inc.".into(),
            version: "OpenCL 2.0".into(),
            platform: 0x7f00,
            ..DeviceReport::default()
        }
    }

    #[test]
    fn report_prints_one_line_per_property() {
        let text = sample_report().to_string();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 50);
        assert_eq!(lines[0], "CL_DEVICE_TYPE = GPU");
        assert_eq!(lines[5], "CL_DEVICE_MAX_WORK_ITEM_SIZES = 1024 1024 1024");
        assert_eq!(lines[6], "CL_DEVICE_PREFERRED_VECTOR_WIDTH_CHAR = 4");
        assert_eq!(lines[11], "CL_DEVICE_PREFERRED_VECTOR_WIDTH_DOUBLE = 0");
        assert_eq!(lines[lines.len() - 2], "CL_DEVICE_PLATFORM = 0x7f00");
        assert_eq!(lines[lines.len() - 1], "CL_DEVICE_DOUBLE_FP_CONFIG = 0x0");
        for line in &lines {
            assert!(line.starts_with("CL_") && line.contains(" = "), "bad line {line:?}");
        }
    }

    #[test]
    fn report_values_and_flags() {
        let text = sample_report().to_string();
        assert!(text.contains("CL_DEVICE_IMAGE_SUPPORT = 1\n"));
        assert!(text.contains("CL_DEVICE_AVAILABLE = 0\n"));
        assert!(text.contains("CL_DEVICE_VENDOR_ID = 4098\n"));
        assert!(text.contains("CL_DEVICE_SINGLE_FP_CONFIG = 0xbe\n"));
        assert!(text.contains("CL_DEVICE_QUEUE_PROPERTIES = 0x2\n"));
        assert!(text.contains("CL_DEVICE_NAME = gfx1030\n"));
        assert!(text.contains("CL_DEVICE_VERSION = OpenCL 2.0\n"));
    }

    #[test]
    fn report_follows_driver_query_order() {
        let text = sample_report().to_string();
        let pos = |key: &str| text.find(key).unwrap();
        assert!(pos("CL_DEVICE_MAX_CLOCK_FREQUENCY") < pos("CL_DEVICE_MAX_READ_IMAGE_ARGS"));
        assert!(pos("CL_DEVICE_IMAGE3D_MAX_DEPTH") < pos("CL_DEVICE_IMAGE_SUPPORT"));
        assert!(pos("CL_DEVICE_MAX_CONSTANT_ARGS") < pos("CL_DEVICE_LOCAL_MEM_TYPE"));
        assert!(pos("CL_DEVICE_QUEUE_PROPERTIES") < pos("CL_DEVICE_NAME"));
        assert!(pos("CL_DEVICE_VERSION") < pos("CL_DEVICE_PLATFORM"));
    }

    #[test]
    fn trims_nul_terminators() {
        assert_eq!(trim_info("Intel(R) OpenCL \0".to_string()), "Intel(R) OpenCL");
    }
}
