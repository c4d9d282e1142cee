//! Point-in-time state handed to the reporting boundary

use crate::aggregate::AggregateStore;
use crate::process::Socket;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A consistent pairing of the socket set and aggregate store, captured
/// under the pipeline lock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub sockets: Vec<Socket>,
    pub aggregates: AggregateStore,
    pub captured_at: DateTime<Utc>,
}
