//! Filesystem artifact store
//!
//! Every artifact is a flat file directly under the store root. Names are
//! validated before any filesystem access, and existing paths are
//! canonicalized so symlinks cannot point outside the root.

use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::types::{ArtifactEntry, ArtifactError, ArtifactStore};

/// Artifact store rooted at a local directory
#[derive(Debug, Clone)]
pub struct FsArtifactStore {
    root: PathBuf,
}

impl FsArtifactStore {
    /// Open the store, creating the root directory if missing
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, ArtifactError> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        let root = root.canonicalize()?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn validate_name(name: &str) -> Result<(), ArtifactError> {
        if name.is_empty() || name.contains('\0') {
            return Err(ArtifactError::InvalidName(name.to_string()));
        }
        if name == "."
            || name.contains("..")
            || name.contains('/')
            || name.contains('\\')
            || Path::new(name).is_absolute()
        {
            return Err(ArtifactError::EscapesRoot(name.to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl ArtifactStore for FsArtifactStore {
    async fn write(&self, name: &str, data: &[u8]) -> Result<(), ArtifactError> {
        let path = self.resolve(name)?;
        tokio::fs::write(&path, data).await?;
        debug!(artifact = %name, bytes = data.len(), "Artifact written");
        Ok(())
    }

    async fn read(&self, name: &str) -> Result<Bytes, ArtifactError> {
        let path = self.resolve(name)?;
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(ArtifactError::NotFound(name.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, name: &str) -> Result<(), ArtifactError> {
        let path = self.resolve(name)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(ArtifactError::NotFound(name.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self) -> Result<Vec<ArtifactEntry>, ArtifactError> {
        let mut entries = Vec::new();
        let mut dir = tokio::fs::read_dir(&self.root).await?;

        while let Some(entry) = dir.next_entry().await? {
            let metadata = match entry.metadata().await {
                Ok(m) => m,
                // Deleted between listing and stat
                Err(_) => continue,
            };
            if !metadata.is_file() {
                continue;
            }
            let last_access = match metadata.accessed() {
                Ok(t) => t,
                Err(_) => metadata.modified()?,
            };
            entries.push(ArtifactEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                size: metadata.len(),
                last_access,
            });
        }

        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    fn resolve(&self, name: &str) -> Result<PathBuf, ArtifactError> {
        Self::validate_name(name)?;
        let path = self.root.join(name);

        if path.exists() {
            let canonical = path.canonicalize()?;
            if !canonical.starts_with(&self.root) {
                return Err(ArtifactError::EscapesRoot(name.to_string()));
            }
            return Ok(canonical);
        }

        Ok(path)
    }
}
