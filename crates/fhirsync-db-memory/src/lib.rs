//! In-memory resource store for fhirsync.
//!
//! This crate provides an in-memory implementation of the `LocalResourceStore`
//! trait from `fhirsync-storage`, using papaya lock-free HashMap for
//! concurrent access. It backs tests and ephemeral runs.
//!
//! # Example
//!
//! ```ignore
//! use fhirsync_db_memory::InMemoryResourceStore;
//! use fhirsync_storage::LocalResourceStore;
//!
//! let store = InMemoryResourceStore::new();
//! let doc = serde_json::json!({
//!     "resourceType": "DocumentReference",
//!     "status": "current"
//! });
//! let created = store.create(&doc).await?;
//! ```

pub mod storage;

pub use fhirsync_storage::{LocalResourceStore, StorageError, StoredResource};
pub use storage::{InMemoryResourceStore, StorageKey};

/// Creates a new shareable in-memory store.
pub fn create_store() -> fhirsync_storage::DynStore {
    std::sync::Arc::new(InMemoryResourceStore::new())
}
