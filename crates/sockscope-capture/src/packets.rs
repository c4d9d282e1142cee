//! Per-device live capture
//!
//! Devices are enumerated once at startup from the device table. Every
//! handle is opened before any reader task spawns, so a device that cannot
//! be captured fails the whole run up front - that is an operator problem,
//! not a transient one. Readers block without a timeout; a slow pipeline
//! stalls them through the bounded channel and nothing more.

use crate::decode::decode_frame;
use pcap::{Active, Capture};
use sockscope_core::{MonitorError, MonitorResult, PacketEvent};
use std::fs;
use std::path::Path;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Device names from the device table. Only names are consumed; the
/// counters on each line are ignored.
pub fn list_devices(proc_root: &Path) -> MonitorResult<Vec<String>> {
    let text = fs::read_to_string(proc_root.join("net/dev"))?;
    Ok(text
        .lines()
        .skip(2) // two header lines
        .filter_map(|line| line.split(':').next())
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(String::from)
        .collect())
}

/// An opened capture handle for one device.
pub struct PacketCapture {
    device: String,
    handle: Capture<Active>,
}

impl PacketCapture {
    /// Open the device in promiscuous mode with an unbounded read wait.
    pub fn open(device: &str, snaplen: i32) -> MonitorResult<Self> {
        let handle = Capture::from_device(device)
            .and_then(|cap| cap.promisc(true).snaplen(snaplen).open())
            .map_err(|e| MonitorError::CaptureOpen {
                device: device.to_string(),
                reason: e.to_string(),
            })?;

        info!("capture open on {device}");
        Ok(Self {
            device: device.to_string(),
            handle,
        })
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    /// Blocking read loop; one event per frame until the receiver goes
    /// away. Run this on a blocking task.
    pub fn run(mut self, tx: mpsc::Sender<PacketEvent>) {
        loop {
            match self.handle.next_packet() {
                Ok(packet) => {
                    let ts = packet.header.ts;
                    let timestamp_ns =
                        ts.tv_sec as i64 * 1_000_000_000 + ts.tv_usec as i64 * 1_000;
                    let event = decode_frame(&self.device, timestamp_ns, packet.data);
                    if tx.blocking_send(event).is_err() {
                        return;
                    }
                }
                Err(pcap::Error::TimeoutExpired) => continue,
                Err(e) => {
                    warn!("capture read failed on {}: {e}", self.device);
                    return;
                }
            }
        }
    }
}

/// Open every device up front, then spawn one blocking reader per device.
/// Any open failure aborts before a single reader starts.
pub fn spawn_captures(
    devices: &[String],
    snaplen: i32,
    tx: &mpsc::Sender<PacketEvent>,
) -> MonitorResult<()> {
    let mut captures = Vec::with_capacity(devices.len());
    for device in devices {
        captures.push(PacketCapture::open(device, snaplen)?);
    }

    for capture in captures {
        let tx = tx.clone();
        tokio::task::spawn_blocking(move || capture.run(tx));
    }

    Ok(())
}
