//! Snapshot exporters
//!
//! Implementations of the reporting boundary: pretty JSON records on a
//! writer, or a relational store on disk. Exporters only ever see
//! snapshots; they know nothing about live state.

pub mod json;
pub mod sqlite;

pub use json::JsonExporter;
pub use sqlite::SqliteExporter;
