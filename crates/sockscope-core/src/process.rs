//! Process identity attached to connections

use crate::conn::Connection;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A process observed holding a socket, re-derived every correlation cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessHandle {
    pub pid: i32,

    /// Short command name; "?" when the process could not be inspected.
    pub command: String,

    /// Full command line; "?" when the process could not be inspected.
    pub command_line: String,

    /// Owning username; "?" when the identity service had no answer.
    pub username: String,

    /// Ancestor pids, nearest parent first, at most 20 entries.
    pub ancestors: Vec<i32>,

    /// Wall-clock time this association was observed.
    pub observed_at: DateTime<Utc>,
}

/// A connection associated with one owning process.
///
/// One connection yields zero sockets (unresolved inode) or one per pid
/// sharing the inode, e.g. after a fork. Value snapshot; the whole set is
/// replaced each cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Socket {
    pub connection: Connection,
    pub process: ProcessHandle,
}

impl Socket {
    /// Flow id of the underlying connection, for joining with aggregates.
    pub fn flow_id(&self) -> String {
        self.connection.flow_id()
    }
}
