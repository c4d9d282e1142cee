//! JSON reporter
//!
//! One record per device x aggregate x matching socket, joined on the flow
//! id. Records are rendered pretty-printed, one after another, on a locked
//! writer (stdout by default).

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;
use sockscope_core::{MonitorResult, PacketSample, Snapshot, SnapshotExporter, Socket};
use std::io::{self, Write};

#[derive(Serialize)]
struct OutputRecord<'a> {
    device: &'a str,
    socket: &'a Socket,
    total_bytes: u64,
    first_ns: i64,
    last_ns: i64,
    packets: &'a [PacketSample],
}

pub struct JsonExporter {
    writer: Mutex<Box<dyn Write + Send>>,
    pretty: bool,
}

impl JsonExporter {
    pub fn new(writer: Box<dyn Write + Send>, pretty: bool) -> Self {
        Self {
            writer: Mutex::new(writer),
            pretty,
        }
    }

    /// Pretty records on stdout.
    pub fn stdout() -> Self {
        Self::new(Box::new(io::stdout()), true)
    }
}

#[async_trait]
impl SnapshotExporter for JsonExporter {
    fn name(&self) -> &str {
        "json"
    }

    async fn export(&self, snapshot: &Snapshot) -> MonitorResult<()> {
        let mut writer = self.writer.lock();

        for (device, flows) in snapshot.aggregates.devices() {
            for (flow_id, agg) in flows {
                for socket in snapshot
                    .sockets
                    .iter()
                    .filter(|socket| socket.flow_id() == *flow_id)
                {
                    let record = OutputRecord {
                        device,
                        socket,
                        total_bytes: agg.total_bytes,
                        first_ns: agg.first_ns,
                        last_ns: agg.last_ns,
                        packets: &agg.samples,
                    };

                    let json = if self.pretty {
                        serde_json::to_string_pretty(&record)?
                    } else {
                        serde_json::to_string(&record)?
                    };
                    writeln!(writer, "{json}")?;
                }
            }
        }

        writer.flush()?;
        Ok(())
    }

    async fn flush(&self) -> MonitorResult<()> {
        self.writer.lock().flush()?;
        Ok(())
    }
}
