//! Reporting boundary
//!
//! Exporters consume snapshots; they never reach back into live state.
//! Implementations live in the export crate.

use crate::error::MonitorResult;
use crate::snapshot::Snapshot;
use async_trait::async_trait;

/// A destination for snapshots.
#[async_trait]
pub trait SnapshotExporter: Send + Sync {
    /// Exporter name, for logs.
    fn name(&self) -> &str;

    /// Export one snapshot.
    async fn export(&self, snapshot: &Snapshot) -> MonitorResult<()>;

    /// Flush any buffered output.
    async fn flush(&self) -> MonitorResult<()> {
        Ok(())
    }
}
