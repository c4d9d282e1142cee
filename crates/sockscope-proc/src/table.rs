//! Handle on the process-table root
//!
//! The root is injectable so tests can point it at a synthetic tree;
//! production uses /proc.

use sockscope_core::{MonitorError, MonitorResult};
use std::fs;
use std::path::{Path, PathBuf};

/// Fallback for command and command-line fields that could not be read.
pub const UNKNOWN: &str = "?";

#[derive(Debug, Clone)]
pub struct ProcTable {
    root: PathBuf,
}

impl ProcTable {
    /// Open the process table. Fails if the root cannot be listed.
    pub fn new(root: impl Into<PathBuf>) -> MonitorResult<Self> {
        let root = root.into();
        fs::read_dir(&root).map_err(|source| MonitorError::ProcTableUnavailable {
            path: root.display().to_string(),
            source,
        })?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Numeric directory names under the root. Non-numeric entries are not
    /// processes; read failures yield an empty list.
    pub fn pids(&self) -> Vec<i32> {
        let Ok(entries) = fs::read_dir(&self.root) else {
            return Vec::new();
        };
        entries
            .flatten()
            .filter_map(|entry| entry.file_name().to_string_lossy().parse().ok())
            .collect()
    }

    pub fn pid_path(&self, pid: i32) -> PathBuf {
        self.root.join(pid.to_string())
    }

    /// Parent pid from the stat file, if the process is still around.
    pub fn parent_pid(&self, pid: i32) -> Option<i32> {
        let stat = fs::read_to_string(self.pid_path(pid).join("stat")).ok()?;
        parse_stat_ppid(&stat)
    }

    /// Short command name, "?" if unreadable.
    pub fn command(&self, pid: i32) -> String {
        match fs::read_to_string(self.pid_path(pid).join("comm")) {
            Ok(comm) => comm.trim().to_string(),
            Err(_) => UNKNOWN.to_string(),
        }
    }

    /// Full command line (NUL-separated on disk), "?" if unreadable.
    pub fn command_line(&self, pid: i32) -> String {
        match fs::read(self.pid_path(pid).join("cmdline")) {
            Ok(bytes) => bytes
                .split(|&b| b == 0)
                .filter(|part| !part.is_empty())
                .map(|part| String::from_utf8_lossy(part).to_string())
                .collect::<Vec<_>>()
                .join(" "),
            Err(_) => UNKNOWN.to_string(),
        }
    }
}

/// Parse the ppid out of a stat line: `pid (comm) state ppid ...`
///
/// The comm field can itself contain spaces and parens, so fields are
/// counted from the last `)`.
fn parse_stat_ppid(stat: &str) -> Option<i32> {
    let close_paren = stat.rfind(')')?;
    let mut fields = stat[close_paren + 1..].split_whitespace();
    let _state = fields.next()?;
    fields.next()?.parse().ok()
}
