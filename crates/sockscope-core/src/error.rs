//! Monitor error type
//!
//! One error enum covers the whole workspace. Leaves that are expected to
//! fail per-process or per-descriptor absorb those failures with sentinels
//! instead of surfacing them here; only startup and boundary failures are
//! worth a variant.

use thiserror::Error;

/// Monitor error type
#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("process table unavailable at {path}: {source}")]
    ProcTableUnavailable {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to open capture on device {device}: {reason}")]
    CaptureOpen { device: String, reason: String },

    #[error("report store initialization failed: {0}")]
    StoreInit(String),

    #[error("export failed: {0}")]
    Export(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub type MonitorResult<T> = Result<T, MonitorError>;
