//! Pipeline - the single merge point for correlation and capture streams
//!
//! The pipeline owns the canonical monitor state (current socket set plus
//! aggregate store) behind one lock and multiplexes two input channels into
//! it: full socket-set replacements from the correlator and individual
//! packet events from the capture layer. Snapshots are captured under the
//! lock and handed to exporters with the lock released; the lock is never
//! held across an await.

use crate::aggregate::AggregateStore;
use crate::error::MonitorResult;
use crate::export::SnapshotExporter;
use crate::packet::PacketEvent;
use crate::process::Socket;
use crate::snapshot::Snapshot;
use chrono::Utc;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// How long the control loop runs and when it reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Emit a snapshot every report interval and keep running.
    Continuous { report_interval: Duration },

    /// Run for a fixed duration, emit one snapshot, return.
    Batch { duration: Duration },
}

/// Canonical monitor state. Only ever touched under the pipeline lock.
#[derive(Debug, Default)]
pub struct MonitorState {
    pub sockets: Vec<Socket>,
    pub aggregates: AggregateStore,
}

/// The monitor's merge point and control loop.
pub struct Pipeline {
    state: Arc<Mutex<MonitorState>>,
    exporters: Vec<Box<dyn SnapshotExporter>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MonitorState::default())),
            exporters: Vec::new(),
        }
    }

    pub fn add_exporter(&mut self, exporter: Box<dyn SnapshotExporter>) {
        self.exporters.push(exporter);
    }

    /// Shared handle on the state, for inspection.
    pub fn state(&self) -> Arc<Mutex<MonitorState>> {
        self.state.clone()
    }

    /// Capture a consistent snapshot under the lock.
    pub fn snapshot(&self) -> Snapshot {
        let state = self.state.lock();
        Snapshot {
            sockets: state.sockets.clone(),
            aggregates: state.aggregates.clone(),
            captured_at: Utc::now(),
        }
    }

    /// Run the control loop until the mode says stop.
    ///
    /// Upstream tasks are not cancelled here; in batch mode they are
    /// reclaimed by process exit once this returns.
    pub async fn run(
        &self,
        mut socket_rx: mpsc::Receiver<Vec<Socket>>,
        mut packet_rx: mpsc::Receiver<PacketEvent>,
        mode: RunMode,
    ) -> MonitorResult<()> {
        match mode {
            RunMode::Batch { duration } => {
                info!("running for {duration:?}, one snapshot at the deadline");
                let deadline = tokio::time::sleep(duration);
                tokio::pin!(deadline);

                loop {
                    tokio::select! {
                        Some(sockets) = socket_rx.recv() => {
                            self.replace_sockets(sockets);
                        }
                        Some(event) = packet_rx.recv() => {
                            self.state.lock().aggregates.apply(&event);
                        }
                        _ = &mut deadline => {
                            let snapshot = self.snapshot();
                            self.dispatch(&snapshot).await?;
                            self.flush_exporters().await?;
                            return Ok(());
                        }
                    }
                }
            }
            RunMode::Continuous { report_interval } => {
                info!("running continuously, snapshot every {report_interval:?}");
                let mut ticker = tokio::time::interval(report_interval);
                ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
                // the first tick completes immediately; skip the empty report
                ticker.tick().await;

                loop {
                    tokio::select! {
                        Some(sockets) = socket_rx.recv() => {
                            self.replace_sockets(sockets);
                        }
                        Some(event) = packet_rx.recv() => {
                            self.state.lock().aggregates.apply(&event);
                        }
                        _ = ticker.tick() => {
                            let snapshot = self.snapshot();
                            if let Err(e) = self.dispatch(&snapshot).await {
                                warn!("snapshot export failed: {e}");
                            }
                        }
                    }
                }
            }
        }
    }

    fn replace_sockets(&self, sockets: Vec<Socket>) {
        debug!("socket set replaced, {} entries", sockets.len());
        self.state.lock().sockets = sockets;
    }

    async fn dispatch(&self, snapshot: &Snapshot) -> MonitorResult<()> {
        for exporter in &self.exporters {
            exporter.export(snapshot).await?;
        }
        Ok(())
    }

    async fn flush_exporters(&self) -> MonitorResult<()> {
        for exporter in &self.exporters {
            exporter.flush().await?;
        }
        Ok(())
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conn::{Connection, TcpConnection};
    use crate::process::ProcessHandle;
    use async_trait::async_trait;
    use std::net::{IpAddr, Ipv4Addr};

    struct CollectingExporter {
        snapshots: Arc<Mutex<Vec<Snapshot>>>,
    }

    #[async_trait]
    impl SnapshotExporter for CollectingExporter {
        fn name(&self) -> &str {
            "collect"
        }

        async fn export(&self, snapshot: &Snapshot) -> MonitorResult<()> {
            self.snapshots.lock().push(snapshot.clone());
            Ok(())
        }
    }

    fn socket(pid: i32) -> Socket {
        Socket {
            connection: Connection::Tcp(TcpConnection {
                slot: 0,
                local_addr: IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)),
                local_port: 9000,
                remote_addr: IpAddr::V4(Ipv4Addr::new(10, 0, 0, 9)),
                remote_port: 80,
                state: 1,
                tx_queue: 0,
                rx_queue: 0,
                uid: 1000,
                inode: 77,
            }),
            process: ProcessHandle {
                pid,
                command: "curl".into(),
                command_line: "curl example.org".into(),
                username: "alice".into(),
                ancestors: vec![1],
                observed_at: Utc::now(),
            },
        }
    }

    fn packet(ts: i64, size: u64) -> PacketEvent {
        PacketEvent {
            device: "eth0".into(),
            timestamp_ns: ts,
            local_addr: IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)),
            local_port: 9000,
            remote_addr: IpAddr::V4(Ipv4Addr::new(10, 0, 0, 9)),
            remote_port: 80,
            size,
        }
    }

    #[tokio::test]
    async fn batch_run_pairs_sockets_and_aggregates() {
        let snapshots = Arc::new(Mutex::new(Vec::new()));
        let mut pipeline = Pipeline::new();
        pipeline.add_exporter(Box::new(CollectingExporter {
            snapshots: snapshots.clone(),
        }));

        let (socket_tx, socket_rx) = mpsc::channel(4);
        let (packet_tx, packet_rx) = mpsc::channel(4);

        socket_tx.send(vec![socket(9)]).await.unwrap();
        packet_tx.send(packet(100, 10)).await.unwrap();
        packet_tx.send(packet(50, 20)).await.unwrap();
        drop(socket_tx);
        drop(packet_tx);

        pipeline
            .run(
                socket_rx,
                packet_rx,
                RunMode::Batch {
                    duration: Duration::from_millis(100),
                },
            )
            .await
            .unwrap();

        let snapshots = snapshots.lock();
        assert_eq!(snapshots.len(), 1);
        let snap = &snapshots[0];
        assert_eq!(snap.sockets.len(), 1);
        assert_eq!(snap.sockets[0].process.pid, 9);
        let agg = snap
            .aggregates
            .device("eth0")
            .and_then(|flows| flows.values().next())
            .unwrap();
        assert_eq!(agg.total_bytes, 30);
        assert_eq!(agg.first_ns, 50);
        assert_eq!(agg.last_ns, 100);
    }

    #[tokio::test]
    async fn socket_set_is_replaced_wholesale() {
        let pipeline = Pipeline::new();
        pipeline.replace_sockets(vec![socket(1), socket(2)]);
        pipeline.replace_sockets(vec![socket(3)]);

        let state = pipeline.state();
        let guard = state.lock();
        assert_eq!(guard.sockets.len(), 1);
        assert_eq!(guard.sockets[0].process.pid, 3);
    }
}
