//! # fhirsync-storage
//!
//! Storage abstraction layer for the fhirsync client.
//!
//! This crate defines the contracts the sync engine consumes on the device
//! side:
//! - [`LocalResourceStore`]: search/get/create/update/purge over locally
//!   stored FHIR resources
//! - [`LocalFileAccess`]: reading and deleting locally cached binaries
//!
//! Resource store backends live in separate crates (`fhirsync-db-memory`,
//! `fhirsync-db-fs`). The filesystem [`FsFileAccess`] lives here.
//!
//! ## Example
//!
//! ```ignore
//! use fhirsync_storage::{LocalResourceStore, StorageError, StoredResource};
//!
//! async fn load_document(
//!     store: &dyn LocalResourceStore,
//!     id: &str,
//! ) -> Result<StoredResource, StorageError> {
//!     store.get("DocumentReference", id).await
//! }
//! ```

mod error;
pub mod files;
mod traits;
mod types;

pub use error::{ErrorCategory, StorageError};
pub use files::{FsFileAccess, LocalFileAccess};
pub use traits::{LocalResourceStore, extract_id, extract_resource_type, with_meta};
pub use types::StoredResource;

/// Type alias for a shared resource store trait object.
pub type DynStore = std::sync::Arc<dyn LocalResourceStore>;

/// Type alias for a shared file access trait object.
pub type DynFileAccess = std::sync::Arc<dyn LocalFileAccess>;
