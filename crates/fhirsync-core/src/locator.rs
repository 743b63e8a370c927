use std::fmt;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Locator of a locally cached file: a `file://` URI or a filesystem path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileLocator(String);

impl FileLocator {
    pub fn new(locator: impl Into<String>) -> Self {
        Self(locator.into())
    }

    /// Builds a `file://` locator for an absolute path.
    pub fn from_path(path: &Path) -> Result<Self> {
        url::Url::from_file_path(path)
            .map(|url| Self(url.to_string()))
            .map_err(|_| CoreError::invalid_locator(path.display().to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Resolves the locator to a path. Relative paths are joined onto `root`.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidLocator` for URIs with a scheme other than
    /// `file`, `file` URIs that do not map to a local path, and relative
    /// paths containing `..` (they must stay under `root`).
    pub fn resolve(&self, root: &Path) -> Result<PathBuf> {
        if self.0.contains("://") {
            let url = url::Url::parse(&self.0)?;
            if url.scheme() != "file" {
                return Err(CoreError::invalid_locator(&self.0));
            }
            return url
                .to_file_path()
                .map_err(|_| CoreError::invalid_locator(&self.0));
        }

        let path = Path::new(&self.0);
        if path.is_absolute() {
            return Ok(path.to_path_buf());
        }
        if path
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return Err(CoreError::invalid_locator(&self.0));
        }
        Ok(root.join(path))
    }
}

impl fmt::Display for FileLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FileLocator {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}
