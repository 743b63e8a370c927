//! Access to locally cached binaries referenced by pending uploads.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use fhirsync_core::FileLocator;

use crate::error::StorageError;

/// Reads and deletes locally cached files by locator.
#[async_trait]
pub trait LocalFileAccess: Send + Sync {
    /// Reads the whole file.
    ///
    /// Returns `Ok(None)` when no file exists at the locator.
    ///
    /// # Errors
    ///
    /// Returns an error when the locator is invalid or the file exists but
    /// cannot be read.
    async fn open_read(&self, locator: &FileLocator) -> Result<Option<Vec<u8>>, StorageError>;

    /// Deletes the file. Returns `false` if there was nothing to delete.
    async fn delete(&self, locator: &FileLocator) -> Result<bool, StorageError>;
}

/// `LocalFileAccess` over the local filesystem.
///
/// Relative locators are resolved against `root`.
#[derive(Debug, Clone)]
pub struct FsFileAccess {
    root: PathBuf,
}

impl FsFileAccess {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, locator: &FileLocator) -> Result<PathBuf, StorageError> {
        Ok(locator.resolve(&self.root)?)
    }
}

#[async_trait]
impl LocalFileAccess for FsFileAccess {
    async fn open_read(&self, locator: &FileLocator) -> Result<Option<Vec<u8>>, StorageError> {
        let path = self.resolve(locator)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, locator: &FileLocator) -> Result<bool, StorageError> {
        let path = self.resolve(locator)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                tracing::debug!(path = %path.display(), "Deleted cached file");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
