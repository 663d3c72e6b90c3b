//! Durable snapshots of collections.
//!
//! Each collection is stored as a JSON file in the data directory. Snapshots
//! are a best-effort cache of the in-memory state: a missing or unreadable
//! file is the same as no snapshot at all.

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, info, warn};

use crate::collection::Collection;
use crate::document::CollectionKind;
use crate::error::{Result, RetrievalError};

/// Reads and writes collection snapshots under a data directory.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    root: PathBuf,
}

impl SnapshotStore {
    /// Create a snapshot store rooted at `root`. Nothing is touched on disk.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Get the path for a collection snapshot.
    pub fn path(&self, kind: CollectionKind) -> PathBuf {
        self.root.join(format!("{kind}_embeddings.json"))
    }

    /// Load the snapshot for `kind`.
    ///
    /// Returns `None` when the file is absent, unreadable, or fails
    /// validation.
    pub async fn load(&self, kind: CollectionKind) -> Option<Collection> {
        let path = self.path(kind);
        match self.read(&path).await {
            Ok(Some(collection)) => {
                info!(
                    "Loaded {} {kind} from snapshot {}",
                    collection.len(),
                    path.display()
                );
                Some(collection)
            }
            Ok(None) => {
                debug!("No {kind} snapshot at {}", path.display());
                None
            }
            Err(e) => {
                warn!("Ignoring unusable {kind} snapshot {}: {e}", path.display());
                None
            }
        }
    }

    async fn read(&self, path: &Path) -> Result<Option<Collection>> {
        let content = match fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(RetrievalError::Snapshot(format!("{}: {e}", path.display())));
            }
        };

        let collection: Collection = serde_json::from_str(&content)?;
        collection.validate()?;
        Ok(Some(collection))
    }

    /// Save a collection snapshot, replacing any previous one atomically.
    pub async fn save(&self, kind: CollectionKind, collection: &Collection) -> Result<()> {
        fs::create_dir_all(&self.root)
            .await
            .map_err(|e| RetrievalError::Snapshot(format!("{}: {e}", self.root.display())))?;

        let path = self.path(kind);
        let content = serde_json::to_vec(collection)?;

        // Write atomically using a temp file
        let temp_path = path.with_extension("json.tmp");
        fs::write(&temp_path, &content)
            .await
            .map_err(|e| RetrievalError::Snapshot(format!("{}: {e}", temp_path.display())))?;

        fs::rename(&temp_path, &path)
            .await
            .map_err(|e| RetrievalError::Snapshot(format!("{}: {e}", path.display())))?;

        debug!("Saved {} {kind} to {}", collection.len(), path.display());
        Ok(())
    }
}
