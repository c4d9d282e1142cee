//! sockscope core - connection/process/packet model and the monitor pipeline
//!
//! This crate provides the foundational types and the merge point for the
//! monitor:
//!
//! - **Connections**: typed rows of the kernel connection tables
//! - **Sockets**: connection x process associations
//! - **Aggregates**: per-device, per-flow packet accumulators
//! - **Pipeline**: the single lock-guarded state and its control loop

pub mod aggregate;
pub mod config;
pub mod conn;
pub mod error;
pub mod export;
pub mod packet;
pub mod pipeline;
pub mod process;
pub mod snapshot;

// Re-export commonly used types
pub use aggregate::{AggregateStore, ConnectionAggregate, PacketSample};
pub use config::MonitorConfig;
pub use conn::{Connection, ConnectionKey, Protocol, TcpConnection, UdpConnection};
pub use error::{MonitorError, MonitorResult};
pub use export::SnapshotExporter;
pub use packet::PacketEvent;
pub use pipeline::{MonitorState, Pipeline, RunMode};
pub use process::{ProcessHandle, Socket};
pub use snapshot::Snapshot;

/// Monitor version
pub const MONITOR_VERSION: &str = env!("CARGO_PKG_VERSION");
