//! Per-connection packet aggregation
//!
//! The store keys on (device, flow id) and keeps one rolling summary per
//! flow. Both directions of a conversation aggregate separately, matching
//! how ids are resolved from packets. Samples are retained for the whole
//! run with no eviction or rollup; the reporting layer needs them verbatim,
//! so the growth is accepted here rather than silently bounded.

use crate::packet::PacketEvent;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::net::IpAddr;

/// One retained packet observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PacketSample {
    pub timestamp_ns: i64,
    pub size: u64,
}

/// Rolling summary of all packets seen for one (device, flow id).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionAggregate {
    pub local_addr: IpAddr,
    pub local_port: u16,
    pub remote_addr: IpAddr,
    pub remote_port: u16,

    /// Running byte total.
    pub total_bytes: u64,

    /// Earliest sample timestamp, ns.
    pub first_ns: i64,

    /// Latest sample timestamp, ns.
    pub last_ns: i64,

    /// Every sample, in arrival order.
    pub samples: Vec<PacketSample>,
}

impl ConnectionAggregate {
    /// Seed a fresh aggregate from its first packet.
    fn seed(event: &PacketEvent) -> Self {
        Self {
            local_addr: event.local_addr,
            local_port: event.local_port,
            remote_addr: event.remote_addr,
            remote_port: event.remote_port,
            total_bytes: event.size,
            first_ns: event.timestamp_ns,
            last_ns: event.timestamp_ns,
            samples: vec![PacketSample {
                timestamp_ns: event.timestamp_ns,
                size: event.size,
            }],
        }
    }

    fn fold(&mut self, event: &PacketEvent) {
        self.total_bytes += event.size;
        if event.timestamp_ns < self.first_ns {
            self.first_ns = event.timestamp_ns;
        }
        if event.timestamp_ns > self.last_ns {
            self.last_ns = event.timestamp_ns;
        }
        self.samples.push(PacketSample {
            timestamp_ns: event.timestamp_ns,
            size: event.size,
        });
    }
}

/// device -> flow id -> aggregate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateStore {
    devices: HashMap<String, HashMap<String, ConnectionAggregate>>,
}

impl AggregateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one packet event into the store.
    pub fn apply(&mut self, event: &PacketEvent) {
        let flows = self.devices.entry(event.device.clone()).or_default();
        match flows.entry(event.flow_id()) {
            Entry::Occupied(mut occupied) => occupied.get_mut().fold(event),
            Entry::Vacant(vacant) => {
                vacant.insert(ConnectionAggregate::seed(event));
            }
        }
    }

    /// Iterate devices and their flow maps.
    pub fn devices(&self) -> impl Iterator<Item = (&String, &HashMap<String, ConnectionAggregate>)> {
        self.devices.iter()
    }

    pub fn device(&self, name: &str) -> Option<&HashMap<String, ConnectionAggregate>> {
        self.devices.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Total number of tracked (device, flow) aggregates.
    pub fn flow_count(&self) -> usize {
        self.devices.values().map(HashMap::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn event(ts: i64, size: u64) -> PacketEvent {
        PacketEvent {
            device: "eth0".into(),
            timestamp_ns: ts,
            local_addr: IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)),
            local_port: 4000,
            remote_addr: IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2)),
            remote_port: 443,
            size,
        }
    }

    #[test]
    fn accumulates_totals_and_bounds() {
        let mut store = AggregateStore::new();
        for (ts, size) in [(100, 10), (50, 20), (200, 30)] {
            store.apply(&event(ts, size));
        }

        let flows = store.device("eth0").unwrap();
        assert_eq!(flows.len(), 1);
        let agg = flows.values().next().unwrap();
        assert_eq!(agg.total_bytes, 60);
        assert_eq!(agg.first_ns, 50);
        assert_eq!(agg.last_ns, 200);
        // samples stay in arrival order, not timestamp order
        let order: Vec<i64> = agg.samples.iter().map(|s| s.timestamp_ns).collect();
        assert_eq!(order, vec![100, 50, 200]);
    }

    #[test]
    fn directions_aggregate_separately() {
        let mut store = AggregateStore::new();
        let forward = event(1, 10);
        let mut reverse = event(2, 20);
        std::mem::swap(&mut reverse.local_addr, &mut reverse.remote_addr);
        std::mem::swap(&mut reverse.local_port, &mut reverse.remote_port);

        store.apply(&forward);
        store.apply(&reverse);

        assert_eq!(store.device("eth0").unwrap().len(), 2);
    }

    #[test]
    fn devices_partition_flows() {
        let mut store = AggregateStore::new();
        let mut other = event(1, 10);
        other.device = "wlan0".into();
        store.apply(&event(1, 10));
        store.apply(&other);

        assert_eq!(store.flow_count(), 2);
        assert!(store.device("eth0").is_some());
        assert!(store.device("wlan0").is_some());
    }
}
