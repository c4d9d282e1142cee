//! Connection-to-process correlation
//!
//! A correlation cycle joins one published connection set against a fresh
//! inode scan: every connection whose inode is held by one or more
//! processes fans out into one socket per holder; connections nobody holds
//! (kernel-owned, other namespace, orphaned) contribute nothing. The
//! resulting socket set wholly replaces the previous cycle's.

use chrono::Utc;
use sockscope_core::{Connection, ProcessHandle, Socket};
use sockscope_proc::{ancestors, InodeIndex, ProcTable, UserDirectory};
use tokio::sync::mpsc;
use tracing::{debug, warn};

pub struct Correlator {
    table: ProcTable,
    users: UserDirectory,
}

impl Correlator {
    pub fn new(table: ProcTable) -> Self {
        Self {
            table,
            users: UserDirectory::new(),
        }
    }

    /// A correlator with an injected user directory (tests).
    pub fn with_users(table: ProcTable, users: UserDirectory) -> Self {
        Self { table, users }
    }

    /// Associate one connection set with the processes in `index`.
    ///
    /// Total over its input: unresolvable fields degrade to sentinels,
    /// unresolvable inodes drop the connection, nothing errors.
    pub fn associate(&mut self, connections: &[Connection], index: &InodeIndex) -> Vec<Socket> {
        let mut sockets = Vec::new();

        for conn in connections {
            let Some(pids) = index.pids_for(conn.inode()) else {
                continue;
            };

            for &pid in pids {
                let username = self.users.username(conn.uid()).to_string();
                sockets.push(Socket {
                    connection: conn.clone(),
                    process: ProcessHandle {
                        pid,
                        command: self.table.command(pid),
                        command_line: self.table.command_line(pid),
                        username,
                        ancestors: ancestors(pid, index.parent_map()),
                        observed_at: Utc::now(),
                    },
                });
            }
        }

        sockets
    }

    /// Driver: runs one correlation cycle per received connection set and
    /// publishes the replacement socket set downstream. The inode scan is
    /// filesystem-heavy and runs on a blocking task.
    pub async fn run(
        mut self,
        mut conn_rx: mpsc::Receiver<Vec<Connection>>,
        socket_tx: mpsc::Sender<Vec<Socket>>,
    ) {
        while let Some(connections) = conn_rx.recv().await {
            let table = self.table.clone();
            let index = match tokio::task::spawn_blocking(move || InodeIndex::scan(&table)).await {
                Ok(index) => index,
                Err(e) => {
                    warn!("inode scan task failed: {e}");
                    continue;
                }
            };

            let sockets = self.associate(&connections, &index);
            debug!(
                "correlation cycle: {} connections -> {} sockets",
                connections.len(),
                sockets.len()
            );

            if socket_tx.send(sockets).await.is_err() {
                return;
            }
        }
    }
}
