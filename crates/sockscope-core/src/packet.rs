//! Decoded packet events emitted by the capture layer

use crate::conn::flow_id;
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};

/// One captured frame, decoded down to addresses and (TCP) ports.
///
/// Fields the decoder could not resolve stay at their zero defaults. The
/// event is ephemeral: the aggregator folds it away and only the
/// (timestamp, size) sample survives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PacketEvent {
    /// Capture device the frame arrived on.
    pub device: String,

    /// Capture timestamp in nanoseconds.
    pub timestamp_ns: i64,

    pub local_addr: IpAddr,
    pub local_port: u16,
    pub remote_addr: IpAddr,
    pub remote_port: u16,

    /// Full frame length in bytes.
    pub size: u64,
}

impl PacketEvent {
    /// An event with zeroed addressing, ready for the decoder to fill in.
    pub fn empty(device: impl Into<String>, timestamp_ns: i64, size: u64) -> Self {
        Self {
            device: device.into(),
            timestamp_ns,
            local_addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            local_port: 0,
            remote_addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            remote_port: 0,
            size,
        }
    }

    /// Directional flow id of the resolved 4-tuple.
    pub fn flow_id(&self) -> String {
        flow_id(
            self.local_addr,
            self.local_port,
            self.remote_addr,
            self.remote_port,
        )
    }
}
