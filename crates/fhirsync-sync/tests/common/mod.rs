//! Scripted collaborators shared by the integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use fhirsync_client::{BinaryUploadResponse, ClientError, ClientResult, RemoteContentService};
use fhirsync_core::{FileLocator, PENDING_FILE_EXTENSION_URL};
use fhirsync_db_memory::InMemoryResourceStore;
use fhirsync_storage::{LocalFileAccess, LocalResourceStore, StorageError, StoredResource};
use fhirsync_sync::{DocumentUploadReconciler, ReconcilerConfig};
use serde_json::{Value, json};

pub fn pending_document(id: &str, locator: &str) -> Value {
    json!({
        "resourceType": "DocumentReference",
        "id": id,
        "status": "current",
        "extension": [{"url": PENDING_FILE_EXTENSION_URL, "valueUri": locator}],
        "content": [{"attachment": {"contentType": "image/jpeg", "title": locator}}]
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCall {
    Metadata(String),
    Binary {
        id: String,
        content_type: String,
        bytes: Vec<u8>,
    },
}

/// Remote server whose answers are scripted per document id.
#[derive(Default)]
pub struct ScriptedRemote {
    pub calls: Mutex<Vec<RemoteCall>>,
    metadata_failures: Mutex<HashSet<String>>,
    binary_statuses: Mutex<HashMap<String, u16>>,
    binary_errors: Mutex<HashSet<String>>,
}

impl ScriptedRemote {
    pub fn fail_metadata(&self, id: &str) {
        self.metadata_failures.lock().unwrap().insert(id.to_string());
    }

    pub fn recover_metadata(&self, id: &str) {
        self.metadata_failures.lock().unwrap().remove(id);
    }

    pub fn binary_status(&self, id: &str, status: u16) {
        self.binary_statuses
            .lock()
            .unwrap()
            .insert(id.to_string(), status);
    }

    pub fn fail_binary_transport(&self, id: &str) {
        self.binary_errors.lock().unwrap().insert(id.to_string());
    }

    pub fn calls(&self) -> Vec<RemoteCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn metadata_ids(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                RemoteCall::Metadata(id) => Some(id),
                RemoteCall::Binary { .. } => None,
            })
            .collect()
    }
}

#[async_trait]
impl RemoteContentService for ScriptedRemote {
    async fn insert_resource_metadata(
        &self,
        _resource_type: &str,
        id: &str,
        body: &Value,
    ) -> ClientResult<Value> {
        self.calls
            .lock()
            .unwrap()
            .push(RemoteCall::Metadata(id.to_string()));
        if self.metadata_failures.lock().unwrap().contains(id) {
            return Err(ClientError::http(500, "upsert failed"));
        }
        Ok(body.clone())
    }

    async fn upload_binary_content(
        &self,
        _resource_type: &str,
        id: &str,
        _attachment_path: &str,
        content_type: &str,
        body: Vec<u8>,
    ) -> ClientResult<BinaryUploadResponse> {
        self.calls.lock().unwrap().push(RemoteCall::Binary {
            id: id.to_string(),
            content_type: content_type.to_string(),
            bytes: body,
        });
        if self.binary_errors.lock().unwrap().contains(id) {
            return Err(ClientError::invalid_base_url("http://unreachable", "connection refused"));
        }
        let status = self
            .binary_statuses
            .lock()
            .unwrap()
            .get(id)
            .copied()
            .unwrap_or(200);
        Ok(BinaryUploadResponse::from_status(status, format!("status {status}")))
    }
}

/// In-memory file cache that records deletions.
#[derive(Default)]
pub struct ScriptedFiles {
    files: Mutex<HashMap<String, Vec<u8>>>,
    unreadable: Mutex<HashSet<String>>,
    pub deleted: Mutex<Vec<String>>,
}

impl ScriptedFiles {
    pub fn put(&self, locator: &str, bytes: &[u8]) {
        self.files
            .lock()
            .unwrap()
            .insert(locator.to_string(), bytes.to_vec());
    }

    pub fn make_unreadable(&self, locator: &str) {
        self.unreadable.lock().unwrap().insert(locator.to_string());
    }

    pub fn exists(&self, locator: &str) -> bool {
        self.files.lock().unwrap().contains_key(locator)
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }
}

#[async_trait]
impl LocalFileAccess for ScriptedFiles {
    async fn open_read(&self, locator: &FileLocator) -> Result<Option<Vec<u8>>, StorageError> {
        if self.unreadable.lock().unwrap().contains(locator.as_str()) {
            return Err(StorageError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "permission denied",
            )));
        }
        Ok(self.files.lock().unwrap().get(locator.as_str()).cloned())
    }

    async fn delete(&self, locator: &FileLocator) -> Result<bool, StorageError> {
        self.deleted
            .lock()
            .unwrap()
            .push(locator.as_str().to_string());
        Ok(self.files.lock().unwrap().remove(locator.as_str()).is_some())
    }
}

/// Store whose every call fails.
pub struct BrokenStore;

#[async_trait]
impl LocalResourceStore for BrokenStore {
    async fn search_all(&self, _: &str) -> Result<Vec<StoredResource>, StorageError> {
        Err(StorageError::internal("store offline"))
    }
    async fn get(&self, _: &str, _: &str) -> Result<StoredResource, StorageError> {
        Err(StorageError::internal("store offline"))
    }
    async fn create(&self, _: &Value) -> Result<StoredResource, StorageError> {
        Err(StorageError::internal("store offline"))
    }
    async fn update(&self, _: &Value) -> Result<StoredResource, StorageError> {
        Err(StorageError::internal("store offline"))
    }
    async fn purge(&self, _: &str, _: &str, _: bool) -> Result<(), StorageError> {
        Err(StorageError::internal("store offline"))
    }
    fn backend_name(&self) -> &'static str {
        "broken"
    }
}

/// Store that lists normally but refuses to purge.
pub struct UnpurgeableStore(pub InMemoryResourceStore);

#[async_trait]
impl LocalResourceStore for UnpurgeableStore {
    async fn search_all(&self, rt: &str) -> Result<Vec<StoredResource>, StorageError> {
        self.0.search_all(rt).await
    }
    async fn get(&self, rt: &str, id: &str) -> Result<StoredResource, StorageError> {
        self.0.get(rt, id).await
    }
    async fn create(&self, r: &Value) -> Result<StoredResource, StorageError> {
        self.0.create(r).await
    }
    async fn update(&self, r: &Value) -> Result<StoredResource, StorageError> {
        self.0.update(r).await
    }
    async fn purge(&self, _: &str, _: &str, _: bool) -> Result<(), StorageError> {
        Err(StorageError::internal("disk full"))
    }
    fn backend_name(&self) -> &'static str {
        "unpurgeable"
    }
}

pub struct Harness {
    pub store: InMemoryResourceStore,
    pub remote: Arc<ScriptedRemote>,
    pub files: Arc<ScriptedFiles>,
    pub reconciler: DocumentUploadReconciler,
}

impl Harness {
    pub fn new() -> Self {
        let store = InMemoryResourceStore::new();
        let remote = Arc::new(ScriptedRemote::default());
        let files = Arc::new(ScriptedFiles::default());
        let reconciler = DocumentUploadReconciler::new(
            Arc::new(store.clone()),
            Arc::clone(&remote) as Arc<dyn RemoteContentService>,
            Arc::clone(&files) as Arc<dyn LocalFileAccess>,
            ReconcilerConfig::default(),
        );
        Self {
            store,
            remote,
            files,
            reconciler,
        }
    }

    /// Stores a pending DocumentReference and its cached file.
    pub async fn add_pending(&self, id: &str) -> String {
        let locator = format!("{id}.jpg");
        self.store
            .create(&pending_document(id, &locator))
            .await
            .unwrap();
        self.files.put(&locator, format!("bytes-of-{id}").as_bytes());
        locator
    }
}
