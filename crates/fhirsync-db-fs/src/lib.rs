//! Filesystem resource store for fhirsync.
//!
//! Each resource is one JSON file at `<root>/<ResourceType>/<id>.json`
//! holding the serialized [`StoredResource`]. Writes go to a temporary file
//! first and are renamed into place, so a crash never leaves a half-written
//! resource behind.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde_json::Value;
use time::OffsetDateTime;
use tokio::sync::Mutex;

pub use fhirsync_storage::{LocalResourceStore, StorageError, StoredResource};
use fhirsync_storage::{extract_id, extract_resource_type, with_meta};

const RESOURCE_EXTENSION: &str = "json";

/// Resource store persisted as a directory tree of JSON files.
#[derive(Debug)]
pub struct FsResourceStore {
    root: PathBuf,
    /// Serializes writers so existence checks and writes are atomic in-process.
    write_lock: Mutex<()>,
    version_counter: AtomicU64,
}

impl FsResourceStore {
    /// Opens (and creates if needed) a store rooted at `root`.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        Ok(Self {
            root,
            write_lock: Mutex::new(()),
            version_counter: AtomicU64::new(version_seed()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn type_dir(&self, resource_type: &str) -> PathBuf {
        self.root.join(resource_type)
    }

    fn resource_path(&self, resource_type: &str, id: &str) -> PathBuf {
        self.type_dir(resource_type)
            .join(format!("{id}.{RESOURCE_EXTENSION}"))
    }

    fn next_version(&self) -> String {
        self.version_counter
            .fetch_add(1, Ordering::SeqCst)
            .to_string()
    }

    async fn read_stored(&self, path: &Path) -> Result<Option<StoredResource>, StorageError> {
        match tokio::fs::read(path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_stored(&self, stored: &StoredResource) -> Result<(), StorageError> {
        let dir = self.type_dir(&stored.resource_type);
        tokio::fs::create_dir_all(&dir).await?;

        let path = self.resource_path(&stored.resource_type, &stored.id);
        let tmp = dir.join(format!(".{}.{}.tmp", stored.id, stored.version_id));
        tokio::fs::write(&tmp, serde_json::to_vec_pretty(stored)?).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }
}

/// Seeds version ids from the clock so they keep increasing across restarts.
fn version_seed() -> u64 {
    let nanos = OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000;
    u64::try_from(nanos).unwrap_or(1)
}

#[async_trait]
impl LocalResourceStore for FsResourceStore {
    async fn search_all(&self, resource_type: &str) -> Result<Vec<StoredResource>, StorageError> {
        let mut entries = match tokio::fs::read_dir(self.type_dir(resource_type)).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut resources = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(RESOURCE_EXTENSION) {
                continue;
            }
            match self.read_stored(&path).await {
                Ok(Some(stored)) => resources.push(stored),
                // Purged between listing and reading
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        category = %e.category(),
                        error = %e,
                        "Skipping unreadable resource file"
                    );
                }
            }
        }

        Ok(resources)
    }

    async fn get(&self, resource_type: &str, id: &str) -> Result<StoredResource, StorageError> {
        fhirsync_core::validate_id(id).map_err(|_| StorageError::not_found(resource_type, id))?;
        self.read_stored(&self.resource_path(resource_type, id))
            .await?
            .ok_or_else(|| StorageError::not_found(resource_type, id))
    }

    async fn create(&self, resource: &Value) -> Result<StoredResource, StorageError> {
        let resource_type = extract_resource_type(resource)?;
        let id = extract_id(resource)?.unwrap_or_else(fhirsync_core::generate_id);

        let _guard = self.write_lock.lock().await;
        let path = self.resource_path(&resource_type, &id);
        if tokio::fs::try_exists(&path).await? {
            return Err(StorageError::already_exists(&resource_type, &id));
        }

        let version_id = self.next_version();
        let now = OffsetDateTime::now_utc();
        let stored = StoredResource {
            id: id.clone(),
            version_id: version_id.clone(),
            resource_type,
            resource: with_meta(resource, &id, &version_id, now),
            last_updated: now,
            created_at: now,
        };
        self.write_stored(&stored).await?;

        tracing::debug!(resource_type = %stored.resource_type, id = %stored.id, "Stored resource");
        Ok(stored)
    }

    async fn update(&self, resource: &Value) -> Result<StoredResource, StorageError> {
        let resource_type = extract_resource_type(resource)?;
        let id = extract_id(resource)?
            .ok_or_else(|| StorageError::invalid_resource("Missing id field for update"))?;

        let _guard = self.write_lock.lock().await;
        let existing = self
            .read_stored(&self.resource_path(&resource_type, &id))
            .await?
            .ok_or_else(|| StorageError::not_found(&resource_type, &id))?;

        let version_id = self.next_version();
        let now = OffsetDateTime::now_utc();
        let stored =
            existing.new_version(version_id.clone(), with_meta(resource, &id, &version_id, now));
        self.write_stored(&stored).await?;

        Ok(stored)
    }

    async fn purge(&self, resource_type: &str, id: &str, force: bool) -> Result<(), StorageError> {
        if fhirsync_core::validate_id(id).is_err() {
            return if force {
                Ok(())
            } else {
                Err(StorageError::not_found(resource_type, id))
            };
        }

        let _guard = self.write_lock.lock().await;
        match tokio::fs::remove_file(self.resource_path(resource_type, id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound && force => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(StorageError::not_found(resource_type, id))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn backend_name(&self) -> &'static str {
        "fs"
    }
}
