//! SQLite report store
//!
//! Persists a snapshot into a relational schema: ancestor edges with
//! generation depth, process/connection observations, protocol-specific
//! connection rows (UDP has no port columns), per-flow summaries, and
//! every retained packet sample. The schema is created when the exporter
//! is; a store that cannot be initialized fails the run up front.

use async_trait::async_trait;
use rusqlite::{params, Connection as DbConnection};
use sockscope_core::{Connection, MonitorError, MonitorResult, Snapshot, SnapshotExporter};
use std::path::{Path, PathBuf};
use tracing::info;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS parent_pid (
    pid    INTEGER,
    ppid   INTEGER,
    level  INTEGER
);
CREATE TABLE IF NOT EXISTS process_conn (
    username      TEXT,
    command       TEXT,
    command_line  TEXT,
    pid           INTEGER,
    inode         INTEGER,
    time          INTEGER
);
CREATE TABLE IF NOT EXISTS tcp_conn (
    slot       INTEGER,
    local_addr TEXT,
    local_port INTEGER,
    rem_addr   TEXT,
    rem_port   INTEGER,
    state      INTEGER,
    tx_queue   INTEGER,
    rx_queue   INTEGER,
    uid        INTEGER,
    inode      INTEGER
);
CREATE TABLE IF NOT EXISTS udp_conn (
    slot       INTEGER,
    local_addr TEXT,
    rem_addr   TEXT,
    state      INTEGER,
    tx_queue   INTEGER,
    rx_queue   INTEGER,
    uid        INTEGER,
    inode      INTEGER
);
CREATE TABLE IF NOT EXISTS conn_summary (
    device      TEXT,
    local_addr  TEXT,
    local_port  INTEGER,
    rem_addr    TEXT,
    rem_port    INTEGER,
    total_bytes INTEGER,
    first_ns    INTEGER,
    last_ns     INTEGER
);
CREATE TABLE IF NOT EXISTS packet (
    device       TEXT,
    local_addr   TEXT,
    local_port   INTEGER,
    rem_addr     TEXT,
    rem_port     INTEGER,
    size         INTEGER,
    timestamp_ns INTEGER
);
";

pub struct SqliteExporter {
    path: PathBuf,
}

impl SqliteExporter {
    /// Open the store and create the schema. Errors here are fatal to a
    /// run that selected this exporter.
    pub fn create(path: impl Into<PathBuf>) -> MonitorResult<Self> {
        let path = path.into();
        let db = DbConnection::open(&path)
            .map_err(|e| MonitorError::StoreInit(e.to_string()))?;
        db.execute_batch(SCHEMA)
            .map_err(|e| MonitorError::StoreInit(e.to_string()))?;

        info!("report store ready at {}", path.display());
        Ok(Self { path })
    }
}

#[async_trait]
impl SnapshotExporter for SqliteExporter {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn export(&self, snapshot: &Snapshot) -> MonitorResult<()> {
        let path = self.path.clone();
        let snapshot = snapshot.clone();

        tokio::task::spawn_blocking(move || write_snapshot(&path, &snapshot))
            .await
            .map_err(|e| MonitorError::Export(e.to_string()))?
            .map_err(|e| MonitorError::Export(e.to_string()))
    }
}

fn write_snapshot(path: &Path, snapshot: &Snapshot) -> rusqlite::Result<()> {
    let mut db = DbConnection::open(path)?;
    let tx = db.transaction()?;

    {
        let mut insert_parent =
            tx.prepare("INSERT INTO parent_pid (pid, ppid, level) VALUES (?1, ?2, ?3)")?;
        let mut insert_process = tx.prepare(
            "INSERT INTO process_conn (username, command, command_line, pid, inode, time) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )?;
        let mut insert_tcp = tx.prepare(
            "INSERT INTO tcp_conn (slot, local_addr, local_port, rem_addr, rem_port, state, \
             tx_queue, rx_queue, uid, inode) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        )?;
        let mut insert_udp = tx.prepare(
            "INSERT INTO udp_conn (slot, local_addr, rem_addr, state, tx_queue, rx_queue, uid, \
             inode) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )?;

        for socket in &snapshot.sockets {
            // nearest ancestor gets the highest level, the root level 1
            let depth = socket.process.ancestors.len();
            for (idx, ppid) in socket.process.ancestors.iter().enumerate() {
                insert_parent.execute(params![
                    socket.process.pid,
                    ppid,
                    (depth - idx) as i64
                ])?;
            }

            insert_process.execute(params![
                socket.process.username,
                socket.process.command,
                socket.process.command_line,
                socket.process.pid,
                socket.connection.inode() as i64,
                socket.process.observed_at.timestamp_nanos_opt().unwrap_or_default(),
            ])?;

            match &socket.connection {
                Connection::Tcp(c) => insert_tcp.execute(params![
                    c.slot as i64,
                    c.local_addr.to_string(),
                    c.local_port,
                    c.remote_addr.to_string(),
                    c.remote_port,
                    c.state,
                    c.tx_queue as i64,
                    c.rx_queue as i64,
                    c.uid,
                    c.inode as i64,
                ])?,
                Connection::Udp(c) => insert_udp.execute(params![
                    c.slot as i64,
                    c.local_addr.to_string(),
                    c.remote_addr.to_string(),
                    c.state,
                    c.tx_queue as i64,
                    c.rx_queue as i64,
                    c.uid,
                    c.inode as i64,
                ])?,
            };
        }

        let mut insert_summary = tx.prepare(
            "INSERT INTO conn_summary (device, local_addr, local_port, rem_addr, rem_port, \
             total_bytes, first_ns, last_ns) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )?;
        let mut insert_packet = tx.prepare(
            "INSERT INTO packet (device, local_addr, local_port, rem_addr, rem_port, size, \
             timestamp_ns) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )?;

        for (device, flows) in snapshot.aggregates.devices() {
            for agg in flows.values() {
                insert_summary.execute(params![
                    device,
                    agg.local_addr.to_string(),
                    agg.local_port,
                    agg.remote_addr.to_string(),
                    agg.remote_port,
                    agg.total_bytes as i64,
                    agg.first_ns,
                    agg.last_ns,
                ])?;

                for sample in &agg.samples {
                    insert_packet.execute(params![
                        device,
                        agg.local_addr.to_string(),
                        agg.local_port,
                        agg.remote_addr.to_string(),
                        agg.remote_port,
                        sample.size as i64,
                        sample.timestamp_ns,
                    ])?;
                }
            }
        }
    }

    tx.commit()
}
