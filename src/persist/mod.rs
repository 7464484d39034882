//! Session persistence
//!
//! Save file and export types plus the sinks that write snapshots.

mod sink;
mod types;

pub use sink::{read_snapshot, JsonFileSink, PersistError, SnapshotSink};
pub use types::{ExportDocument, SaveFile, CURRENT_SCHEMA_VERSION};
