use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use papaya::HashMap as PapayaHashMap;
use serde_json::Value;
use time::OffsetDateTime;

use fhirsync_storage::{
    LocalResourceStore, StorageError, StoredResource, extract_id, extract_resource_type, with_meta,
};

pub type StorageKey = String; // Format: "ResourceType/id"

pub(crate) fn make_storage_key(resource_type: &str, id: &str) -> StorageKey {
    format!("{resource_type}/{id}")
}

/// In-memory resource store using papaya lock-free HashMap.
///
/// Resources live only as long as the store. Cloning shares the same map.
#[derive(Debug, Clone)]
pub struct InMemoryResourceStore {
    pub(crate) data: Arc<PapayaHashMap<StorageKey, StoredResource>>,
    pub(crate) version_counter: Arc<AtomicU64>,
}

impl InMemoryResourceStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self {
            data: Arc::new(PapayaHashMap::new()),
            version_counter: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Generates the next version ID.
    pub(crate) fn next_version(&self) -> String {
        self.version_counter
            .fetch_add(1, Ordering::SeqCst)
            .to_string()
    }

    /// Number of stored resources across all types.
    pub fn len(&self) -> usize {
        self.data.pin().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` if `resource_type/id` is present.
    pub fn contains(&self, resource_type: &str, id: &str) -> bool {
        self.data
            .pin()
            .contains_key(&make_storage_key(resource_type, id))
    }
}

impl Default for InMemoryResourceStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LocalResourceStore for InMemoryResourceStore {
    async fn search_all(&self, resource_type: &str) -> Result<Vec<StoredResource>, StorageError> {
        let guard = self.data.pin();
        Ok(guard
            .iter()
            .filter(|(_, stored)| stored.resource_type == resource_type)
            .map(|(_, stored)| stored.clone())
            .collect())
    }

    async fn get(&self, resource_type: &str, id: &str) -> Result<StoredResource, StorageError> {
        let key = make_storage_key(resource_type, id);
        self.data
            .pin()
            .get(&key)
            .cloned()
            .ok_or_else(|| StorageError::not_found(resource_type, id))
    }

    async fn create(&self, resource: &Value) -> Result<StoredResource, StorageError> {
        let resource_type = extract_resource_type(resource)?;
        let id = extract_id(resource)?.unwrap_or_else(fhirsync_core::generate_id);
        let version_id = self.next_version();
        let now = OffsetDateTime::now_utc();

        let stored = StoredResource {
            id: id.clone(),
            version_id: version_id.clone(),
            resource_type: resource_type.clone(),
            resource: with_meta(resource, &id, &version_id, now),
            last_updated: now,
            created_at: now,
        };

        let key = make_storage_key(&resource_type, &id);
        let guard = self.data.pin();
        if guard.try_insert(key, stored.clone()).is_err() {
            return Err(StorageError::already_exists(&resource_type, &id));
        }

        Ok(stored)
    }

    async fn update(&self, resource: &Value) -> Result<StoredResource, StorageError> {
        let resource_type = extract_resource_type(resource)?;
        let id = extract_id(resource)?
            .ok_or_else(|| StorageError::invalid_resource("Missing id field for update"))?;
        let key = make_storage_key(&resource_type, &id);

        let guard = self.data.pin();
        let existing = guard
            .get(&key)
            .ok_or_else(|| StorageError::not_found(&resource_type, &id))?;

        let version_id = self.next_version();
        let now = OffsetDateTime::now_utc();
        let stored =
            existing.new_version(version_id.clone(), with_meta(resource, &id, &version_id, now));

        guard.insert(key, stored.clone());
        Ok(stored)
    }

    async fn purge(&self, resource_type: &str, id: &str, force: bool) -> Result<(), StorageError> {
        let key = make_storage_key(resource_type, id);
        let removed = self.data.pin().remove(&key).is_some();
        if !removed && !force {
            return Err(StorageError::not_found(resource_type, id));
        }
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
