//! Kernel source loading and program compilation.

use opencl3::{context::Context, program::Program};
use std::{fs, path::PathBuf};

use crate::{ClError, Result};

/// The kernels every workload expects, compiled in when no file is given.
pub const EMBEDDED_SOURCE: &str = include_str!("../kernels/test.cl");

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KernelSource {
    Embedded,
    File(PathBuf),
}

impl KernelSource {
    pub fn load(&self) -> Result<String> {
        match self {
            KernelSource::Embedded => Ok(EMBEDDED_SOURCE.to_owned()),
            KernelSource::File(path) => fs::read_to_string(path).map_err(|source| ClError::Source {
                path: path.clone(),
                source,
            }),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            KernelSource::Embedded => "embedded test.cl".to_owned(),
            KernelSource::File(path) => path.display().to_string(),
        }
    }
}

/// Builds `source` for every device of `context`. A failed build carries
/// the compiler log.
pub fn build(context: &Context, source: &str, options: &str) -> Result<Program> {
    log::debug!("building program ({} bytes, options {:?})", source.len(), options);
    Program::create_and_build_from_source(context, source, options)
        .map_err(|log| ClError::Build { log })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_source_defines_every_kernel() {
        let kernels =
            ["get_ids", "sum_numbers", "matrix_multiply", "lookup3_hash_keys", "minp", "reduce"];
        for name in kernels {
            assert!(
                EMBEDDED_SOURCE.contains(&format!("__kernel void {name}(")),
                "missing kernel {name}"
            );
        }
    }

    #[test]
    fn missing_file_is_a_source_error() {
        let src = KernelSource::File(PathBuf::from("/nonexistent/cl-probe/test.cl"));
        match src.load() {
            Err(ClError::Source { path, .. }) => assert!(path.ends_with("test.cl")),
            other => panic!("expected source error, got {other:?}"),
        }
    }

    #[test]
    fn file_source_is_read_verbatim() {
        let path = std::env::temp_dir().join(format!("cl-probe-{}.cl", std::process::id()));
        fs::write(&path, "__kernel void k() {}\n").unwrap();
        let text = KernelSource::File(path.clone()).load().unwrap();
        fs::remove_file(&path).unwrap();
        assert_eq!(text, "__kernel void k() {}\n");
    }
}
