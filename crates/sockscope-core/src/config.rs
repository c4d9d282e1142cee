//! Monitor configuration
//!
//! A small TOML-backed config with defaults for every field. Loading never
//! fails the run: a missing or malformed file logs a warning and falls back
//! to defaults, with CLI flags merged on top by the binary.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Connection-table poll interval in milliseconds.
    pub poll_interval_ms: u64,

    /// Snapshot interval for continuous runs, in milliseconds.
    pub report_interval_ms: u64,

    /// Bounded capacity of the connection-set channel.
    pub conn_channel_capacity: usize,

    /// Bounded capacity of the packet channel.
    pub packet_channel_capacity: usize,

    /// Process-table mount point.
    pub proc_root: PathBuf,

    /// Bytes captured per packet.
    pub snaplen: i32,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 500,
            report_interval_ms: 1000,
            conn_channel_capacity: 16,
            packet_channel_capacity: 4096,
            proc_root: PathBuf::from("/proc"),
            snaplen: 262144,
        }
    }
}

impl MonitorConfig {
    /// Load from a TOML file, falling back to defaults on any failure.
    pub fn load(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };

        match std::fs::read_to_string(path).map_err(anyhow::Error::from).and_then(|text| {
            toml::from_str::<MonitorConfig>(&text).map_err(anyhow::Error::from)
        }) {
            Ok(config) => config,
            Err(e) => {
                warn!("failed to load config from {}: {e}, using defaults", path.display());
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_without_file() {
        let config = MonitorConfig::load(None);
        assert_eq!(config.poll_interval_ms, 500);
        assert_eq!(config.proc_root, PathBuf::from("/proc"));
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "poll_interval_ms = 250").unwrap();

        let config = MonitorConfig::load(Some(file.path()));
        assert_eq!(config.poll_interval_ms, 250);
        assert_eq!(config.report_interval_ms, 1000);
    }

    #[test]
    fn malformed_file_falls_back() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "poll_interval_ms = \"not a number\"").unwrap();

        let config = MonitorConfig::load(Some(file.path()));
        assert_eq!(config, MonitorConfig::default());
    }
}
