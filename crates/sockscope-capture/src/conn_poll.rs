//! Digest-gated connection-table polling
//!
//! One poller per protocol. Each tick reads the raw v4 and v6 table text,
//! digests each, and republishes only when a digest moved - the tables
//! churn far less often than the tick fires. A publication is always the
//! full union of the freshest-known parses of both families, never a
//! delta. A table that fails to read this tick counts as unchanged.

use crate::conn_parse::parse_table;
use sha2::{Digest, Sha256};
use sockscope_core::{Connection, Protocol};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, trace};

/// The v4/v6 table files for one protocol.
#[derive(Debug, Clone)]
pub struct TablePaths {
    pub v4: PathBuf,
    pub v6: PathBuf,
}

impl TablePaths {
    pub fn for_protocol(proc_root: &Path, protocol: Protocol) -> Self {
        let net = proc_root.join("net");
        match protocol {
            Protocol::Tcp => Self {
                v4: net.join("tcp"),
                v6: net.join("tcp6"),
            },
            Protocol::Udp => Self {
                v4: net.join("udp"),
                v6: net.join("udp6"),
            },
        }
    }
}

/// Change-detection state for one protocol's pair of tables.
///
/// Kept separate from the ticking task so the republish rules are plain
/// synchronous code.
#[derive(Debug)]
pub struct TableWatch {
    protocol: Protocol,
    digest_v4: Option<String>,
    digest_v6: Option<String>,
    last_v4: Vec<Connection>,
    last_v6: Vec<Connection>,
}

impl TableWatch {
    pub fn new(protocol: Protocol) -> Self {
        Self {
            protocol,
            digest_v4: None,
            digest_v6: None,
            last_v4: Vec::new(),
            last_v6: Vec::new(),
        }
    }

    /// Feed one tick's raw table text (None = read failed, treat as
    /// unchanged). Returns the full replacement set when either family
    /// changed, None when both are quiet.
    pub fn observe(&mut self, v4: Option<&str>, v6: Option<&str>) -> Option<Vec<Connection>> {
        let mut changed = false;

        if let Some(text) = v4 {
            let digest = table_digest(text);
            if self.digest_v4.as_deref() != Some(digest.as_str()) {
                self.digest_v4 = Some(digest);
                self.last_v4 = parse_table(text, self.protocol);
                changed = true;
            }
        }

        if let Some(text) = v6 {
            let digest = table_digest(text);
            if self.digest_v6.as_deref() != Some(digest.as_str()) {
                self.digest_v6 = Some(digest);
                self.last_v6 = parse_table(text, self.protocol);
                changed = true;
            }
        }

        changed.then(|| {
            self.last_v4
                .iter()
                .chain(self.last_v6.iter())
                .cloned()
                .collect()
        })
    }
}

fn table_digest(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}

/// Polls one protocol's tables on a fixed tick and publishes replacement
/// sets downstream.
pub struct ConnectionPoller {
    paths: TablePaths,
    watch: TableWatch,
    interval: Duration,
}

impl ConnectionPoller {
    pub fn new(proc_root: &Path, protocol: Protocol, interval: Duration) -> Self {
        Self {
            paths: TablePaths::for_protocol(proc_root, protocol),
            watch: TableWatch::new(protocol),
            interval,
        }
    }

    /// Tick until the downstream receiver goes away.
    pub async fn run(mut self, tx: mpsc::Sender<Vec<Connection>>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            let v4 = fs::read_to_string(&self.paths.v4).ok();
            let v6 = fs::read_to_string(&self.paths.v6).ok();

            match self.watch.observe(v4.as_deref(), v6.as_deref()) {
                Some(set) => {
                    debug!("connection table changed, publishing {} rows", set.len());
                    if tx.send(set).await.is_err() {
                        return;
                    }
                }
                None => trace!("connection tables unchanged"),
            }
        }
    }
}
