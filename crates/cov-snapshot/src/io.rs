//! Binary (de)serialization of a [`Snapshot`], via `bincode` rather than
//! `serde_json`: a coverage snapshot is a machine-to-machine artifact
//! passed between a `trace` run and a later `coalesce` run, the same role
//! CPython's `marshal` plays in the reference implementation, not a
//! human-edited document.

use std::io::{Read as _, Write as _};
use std::path::Path;

use thiserror::Error;

use crate::snapshot::Snapshot;

#[derive(Debug, Error)]
pub enum SnapshotIoError {
    #[error("reading snapshot {path}: {source}")]
    Read {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("writing snapshot {path}: {source}")]
    Write {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("decoding snapshot {path}: {source}")]
    Decode {
        path: std::path::PathBuf,
        #[source]
        source: bincode::Error,
    },
    #[error("encoding snapshot: {0}")]
    Encode(#[source] bincode::Error),
}

pub fn write(snapshot: &Snapshot, path: impl AsRef<Path>) -> Result<(), SnapshotIoError> {
    let path = path.as_ref();
    let bytes = bincode::serialize(snapshot).map_err(SnapshotIoError::Encode)?;
    let mut file = std::fs::File::create(path).map_err(|source| SnapshotIoError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    file.write_all(&bytes).map_err(|source| SnapshotIoError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::debug!(target: "coven::snapshot", path = %path.display(), bytes = bytes.len(), "snapshot_written");
    Ok(())
}

pub fn read(path: impl AsRef<Path>) -> Result<Snapshot, SnapshotIoError> {
    let path = path.as_ref();
    let mut file = std::fs::File::open(path).map_err(|source| SnapshotIoError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes).map_err(|source| SnapshotIoError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let snapshot = bincode::deserialize(&bytes).map_err(|source| SnapshotIoError::Decode {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use cov_bytecode::{CodeUnit, Line, Offset};

    #[test]
    fn write_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.covsnap");

        let mut snapshot = Snapshot::new();
        snapshot.target_paths.insert("pkg.mod".to_string(), Some("pkg/mod.py".into()));
        snapshot.record(
            "pkg/mod.py".into(),
            CodeUnit::new("f", "pkg/mod.py"),
            [(Offset::BEGIN, Offset::real(0), Line::real(1))].into_iter().collect(),
        );

        write(&snapshot, &path).unwrap();
        let read_back = read(&path).unwrap();
        assert_eq!(read_back, snapshot);
    }

    #[test]
    fn reading_a_missing_file_is_an_error() {
        let err = read("/nonexistent/path/does-not-exist.covsnap").unwrap_err();
        assert!(matches!(err, SnapshotIoError::Read { .. }));
    }
}
