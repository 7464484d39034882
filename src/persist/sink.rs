//! Snapshot sinks
//!
//! A sink receives the full save file after every mutation. Writing is
//! fire-and-forget from the mutation's point of view: the session logs and
//! records a failure, it never undoes the change that triggered it.

use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::types::SaveFile;

/// Errors writing or reading a snapshot
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Destination for session snapshots
pub trait SnapshotSink: Send + Sync {
    fn persist(&self, save: &SaveFile) -> Result<(), PersistError>;
}

/// Writes pretty JSON next to the target path, then renames it into place
#[derive(Debug, Clone)]
pub struct JsonFileSink {
    path: PathBuf,
}

impl JsonFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "annotations.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl SnapshotSink for JsonFileSink {
    fn persist(&self, save: &SaveFile) -> Result<(), PersistError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_vec_pretty(save)?;
        let tmp = self.temp_path();
        {
            let mut file = std::fs::File::create(&tmp)?;
            file.write_all(&json)?;
            file.sync_all()?;
        }
        std::fs::rename(&tmp, &self.path)?;

        tracing::debug!(
            path = %self.path.display(),
            bytes = json.len(),
            "Snapshot written"
        );
        Ok(())
    }
}

/// Read a snapshot file if it exists
pub async fn read_snapshot(path: &Path) -> Result<Option<String>, PersistError> {
    match tokio::fs::read_to_string(path).await {
        Ok(contents) => Ok(Some(contents)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_json_file_sink_writes_snapshot() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("save.json");
        let sink = JsonFileSink::new(&path);

        sink.persist(&SaveFile::empty("session_1")).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        let parsed: SaveFile = serde_json::from_str(&written).unwrap();
        assert_eq!(parsed.session_id, "session_1");
        assert_eq!(parsed.schema_version, 2);
        assert!(!path.with_file_name("save.json.tmp").exists());
    }

    #[test]
    fn test_sink_reports_io_failure() {
        let dir = TempDir::new().unwrap();
        // a directory where the file should be
        let path = dir.path().join("taken");
        std::fs::create_dir(&path).unwrap();
        std::fs::create_dir(path.with_file_name("taken.tmp")).unwrap();

        let result = JsonFileSink::new(&path).persist(&SaveFile::empty("s"));
        assert!(matches!(result, Err(PersistError::Io(_))));
    }

    #[tokio::test]
    async fn test_read_missing_snapshot() {
        let dir = TempDir::new().unwrap();
        let missing = read_snapshot(&dir.path().join("none.json")).await.unwrap();
        assert!(missing.is_none());

        let path = dir.path().join("save.json");
        std::fs::write(&path, "{}").unwrap();
        assert_eq!(read_snapshot(&path).await.unwrap().as_deref(), Some("{}"));
    }
}
