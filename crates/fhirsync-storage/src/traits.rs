//! Storage traits for the on-device FHIR resource store.

use async_trait::async_trait;
use serde_json::Value;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::error::StorageError;
use crate::types::StoredResource;

/// The local FHIR resource store consulted by the sync engine.
///
/// The store is a single shared mutable resource. Each call is expected to be
/// atomic on its own; callers never group calls into transactions.
/// Implementations must be thread-safe (`Send + Sync`).
///
/// # Example
///
/// ```ignore
/// use fhirsync_storage::{LocalResourceStore, StorageError};
///
/// async fn count_documents(store: &dyn LocalResourceStore) -> Result<usize, StorageError> {
///     Ok(store.search_all("DocumentReference").await?.len())
/// }
/// ```
#[async_trait]
pub trait LocalResourceStore: Send + Sync {
    /// Returns every stored resource of `resource_type`.
    ///
    /// No filtering and no ordering guarantee: the order is whatever the
    /// backend iterates in.
    async fn search_all(&self, resource_type: &str) -> Result<Vec<StoredResource>, StorageError>;

    /// Reads a resource by type and ID.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the resource does not exist.
    async fn get(&self, resource_type: &str, id: &str) -> Result<StoredResource, StorageError>;

    /// Stores a new resource. An `id` is generated when the resource has none.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::AlreadyExists` if a resource with the same type and ID exists.
    /// Returns `StorageError::InvalidResource` if the resource is malformed.
    async fn create(&self, resource: &Value) -> Result<StoredResource, StorageError>;

    /// Replaces an existing resource. The resource must contain `resourceType` and `id`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the resource does not exist.
    /// Returns `StorageError::InvalidResource` if the resource is malformed.
    async fn update(&self, resource: &Value) -> Result<StoredResource, StorageError>;

    /// Hard-deletes a resource. Nothing is kept behind, not even a tombstone.
    ///
    /// With `force == true` purging a resource that does not exist succeeds.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the resource does not exist and `force` is false.
    async fn purge(&self, resource_type: &str, id: &str, force: bool) -> Result<(), StorageError>;

    /// Returns the name of this storage backend for logging/debugging.
    fn backend_name(&self) -> &'static str;
}

/// Extracts `resourceType` from a JSON resource.
pub fn extract_resource_type(resource: &Value) -> Result<String, StorageError> {
    resource
        .get("resourceType")
        .and_then(|v| v.as_str())
        .filter(|rt| fhirsync_core::fhir::is_valid_resource_type_name(rt))
        .map(String::from)
        .ok_or_else(|| StorageError::invalid_resource("Missing or invalid resourceType field"))
}

/// Extracts and validates `id` from a JSON resource.
pub fn extract_id(resource: &Value) -> Result<Option<String>, StorageError> {
    match resource.get("id").and_then(|v| v.as_str()) {
        Some(id) => {
            fhirsync_core::validate_id(id)
                .map_err(|e| StorageError::invalid_resource(e.to_string()))?;
            Ok(Some(id.to_string()))
        }
        None => Ok(None),
    }
}

/// Returns a copy of `resource` with `id`, `meta.versionId` and
/// `meta.lastUpdated` set the way the local store records them.
pub fn with_meta(resource: &Value, id: &str, version_id: &str, now: OffsetDateTime) -> Value {
    let mut resource = resource.clone();
    if let Some(obj) = resource.as_object_mut() {
        obj.insert("id".to_string(), Value::String(id.to_string()));
        let meta = obj
            .entry("meta")
            .or_insert_with(|| Value::Object(Default::default()));
        if let Some(meta) = meta.as_object_mut() {
            meta.insert("versionId".to_string(), Value::String(version_id.to_string()));
            meta.insert(
                "lastUpdated".to_string(),
                Value::String(now.format(&Rfc3339).unwrap_or_default()),
            );
        }
    }
    resource
}
