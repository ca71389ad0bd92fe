//! The on-disk file produced by one transfer.

use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

/// A downloaded file staged under `<root>/<owner>/<file_name>`.
///
/// The per-owner directory keeps two requesters who pick the same name
/// from clobbering each other. Removal is synchronous so it can run from
/// `Drop` implementations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadArtifact {
    path: PathBuf,
    staging_dir: PathBuf,
}

impl DownloadArtifact {
    /// Plans the artifact location. Nothing is created on disk.
    ///
    /// `file_name` must already be a validated single path component.
    pub fn stage(root: &Path, owner: &str, file_name: &str) -> Self {
        let staging_dir = root.join(owner);
        Self {
            path: staging_dir.join(file_name),
            staging_dir,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Measures the authoritative size after streaming.
    pub async fn size_on_disk(&self) -> io::Result<u64> {
        Ok(tokio::fs::metadata(&self.path).await?.len())
    }

    /// Deletes the file and, if empty, its staging directory.
    ///
    /// Returns whether a file was removed. A missing file is not an error.
    pub fn remove(&self) -> io::Result<bool> {
        let removed = match std::fs::remove_file(&self.path) {
            Ok(()) => true,
            Err(e) if e.kind() == io::ErrorKind::NotFound => false,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "failed to delete artifact");
                return Err(e);
            }
        };

        // Fails harmlessly when another transfer of the same owner still has files.
        if let Err(e) = std::fs::remove_dir(&self.staging_dir)
            && e.kind() != io::ErrorKind::NotFound
        {
            debug!(dir = %self.staging_dir.display(), error = %e, "staging directory kept");
        }

        if removed {
            debug!(path = %self.path.display(), "artifact deleted");
        }
        Ok(removed)
    }
}
