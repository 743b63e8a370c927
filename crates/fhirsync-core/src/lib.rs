pub mod document;
pub mod error;
pub mod fhir;
pub mod id;
pub mod locator;

pub use document::{
    DEFAULT_CONTENT_TYPE, DOCUMENT_ATTACHMENT_PATH, PENDING_FILE_EXTENSION_URL,
    attachment_content_type, pending_file_locator, set_pending_file,
};
pub use error::{CoreError, Result};
pub use fhir::ResourceType;
pub use id::{IdError, generate_id, validate_id};
pub use locator::FileLocator;
