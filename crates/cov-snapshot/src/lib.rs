//! Snapshot I/O (spec.md §4.G/§6, collaborator): serializing a coverage
//! run's target-path map and per-code-unit traced edges to a compact
//! binary artifact, and coalescing several such snapshots into one.

pub mod io;
pub mod snapshot;

pub use io::{SnapshotIoError, read, write};
pub use snapshot::{CodeUnitRecord, Snapshot, coalesce};
