// ─── Module ───────────────────────────────────────────────────────────
pub mod buffer;
pub mod cli;
pub mod codes;
pub mod lookup3;
pub mod platform;
pub mod program;
pub mod session;
pub mod workloads;

#[cfg(feature = "metrics")]
mod metrics;
#[cfg(feature = "metrics")]
pub use metrics::*;

pub use buffer::{DeviceBuffer, EventGuard, InFlight, Queued, Ready, State};
pub use codes::error_name;
pub use session::DeviceSession;

use std::path::PathBuf;

// ─── Fehler‑Typ ───────────────────────────────────────────────────────
#[derive(thiserror::Error, Debug)]
pub enum ClError {
    #[error("OpenCL error with code {code} ({})", describe(.code))]
    Api { code: i32 },
    #[error("CL compilation failed:\n{log}")]
    Build { log: String },
    #[error("failed to open kernel file {}: {source}", .path.display())]
    Source {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid buffer size: {0}")]
    InvalidSize(usize),
    #[error("host slice holds {actual} elements, device buffer holds {expected}")]
    LengthMismatch { expected: usize, actual: usize },
    #[error("invalid work grid (global {global}, local {local}): {reason}")]
    InvalidWorkGrid {
        global: usize,
        local: usize,
        reason: &'static str,
    },
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl ClError {
    /// Status code for runtime API failures, `None` for everything else.
    pub fn code(&self) -> Option<i32> {
        match self {
            ClError::Api { code } => Some(*code),
            _ => None,
        }
    }
}

impl From<opencl3::error_codes::ClError> for ClError {
    #[inline]
    fn from(err: opencl3::error_codes::ClError) -> Self {
        ClError::Api { code: err.0 }
    }
}

impl From<i32> for ClError {
    #[inline]
    fn from(code: i32) -> Self {
        ClError::Api { code }
    }
}

fn describe(code: &i32) -> &'static str {
    error_name(*code)
}

pub type Result<T, E = ClError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_names_the_code() {
        let err = ClError::from(-30);
        assert_eq!(err.code(), Some(-30));
        assert_eq!(err.to_string(), "OpenCL error with code -30 (CL_INVALID_VALUE)");
    }

    #[test]
    fn runtime_error_codes_convert() {
        let err: ClError = opencl3::error_codes::ClError(-5).into();
        assert!(matches!(err, ClError::Api { code: -5 }));
    }

    #[test]
    fn non_api_errors_have_no_code() {
        let err = ClError::Build { log: "error: expected ';'".into() };
        assert_eq!(err.code(), None);
        assert!(err.to_string().contains("expected ';'"));
    }
}
