//! Capture layer: connection-table pollers and per-device packet sources
//!
//! Two independently paced sources feed the pipeline from here. Pollers
//! re-read the kernel connection tables on a fixed tick and publish full
//! replacement sets only when a table's content digest moved. Packet
//! sources wrap one blocking capture handle per device and emit a decoded
//! event per frame.

pub mod conn_parse;
pub mod conn_poll;
pub mod decode;
pub mod packets;

pub use conn_parse::parse_table;
pub use conn_poll::{ConnectionPoller, TablePaths, TableWatch};
pub use decode::decode_frame;
pub use packets::{list_devices, spawn_captures, PacketCapture};
