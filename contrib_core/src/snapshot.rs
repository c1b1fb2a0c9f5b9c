//! Persistence of the contribution snapshot.

use crate::models::Contribution;
use crate::{Error, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// `Ok(None)` when no snapshot exists yet.
    async fn load(&self) -> Result<Option<Vec<Contribution>>>;

    /// Replaces the whole snapshot.
    async fn save(&self, contributions: &[Contribution]) -> Result<()>;
}

/// Pretty-printed JSON array with a trailing newline.
pub fn render(contributions: &[Contribution]) -> Result<String> {
    let mut out = serde_json::to_string_pretty(contributions)
        .map_err(|e| Error::InvalidInput(format!("serialize snapshot: {e}")))?;
    out.push('\n');
    Ok(out)
}

/// Snapshot kept in a single JSON file, replaced through a sibling temp file and a rename.
#[derive(Debug, Clone)]
pub struct FileSnapshotStore {
    path: PathBuf,
}

impl FileSnapshotStore {
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
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl SnapshotStore for FileSnapshotStore {
    #[tracing::instrument(level = "debug", skip(self), fields(path = %self.path.display()))]
    async fn load(&self) -> Result<Option<Vec<Contribution>>> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::snapshot(&self.path, "read failed", e)),
        };
        let records: Vec<Contribution> = serde_json::from_str(&raw)
            .map_err(|e| Error::snapshot(&self.path, "malformed snapshot", e))?;
        Ok(Some(records))
    }

    #[tracing::instrument(level = "debug", skip(self, contributions), fields(path = %self.path.display(), count = contributions.len()))]
    async fn save(&self, contributions: &[Contribution]) -> Result<()> {
        let body = render(contributions)?;
        let tmp = self.temp_path();
        tokio::fs::write(&tmp, body)
            .await
            .map_err(|e| Error::snapshot(&tmp, "write failed", e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| Error::snapshot(&self.path, "rename failed", e))?;
        Ok(())
    }
}

/// In-process snapshot, seeded with existing contributions.
#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    records: Mutex<Option<Vec<Contribution>>>,
    writes: AtomicUsize,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_existing(records: Vec<Contribution>) -> Self {
        Self {
            records: Mutex::new(Some(records)),
            writes: AtomicUsize::new(0),
        }
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn current(&self) -> Option<Vec<Contribution>> {
        self.records.lock().ok().and_then(|guard| guard.clone())
    }
}

#[async_trait]
impl SnapshotStore for MemorySnapshotStore {
    async fn load(&self) -> Result<Option<Vec<Contribution>>> {
        let guard = self
            .records
            .lock()
            .map_err(|_| Error::InvalidInput("snapshot lock poisoned".to_string()))?;
        Ok(guard.clone())
    }

    async fn save(&self, contributions: &[Contribution]) -> Result<()> {
        let mut guard = self
            .records
            .lock()
            .map_err(|_| Error::InvalidInput("snapshot lock poisoned".to_string()))?;
        *guard = Some(contributions.to_vec());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
