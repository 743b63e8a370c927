//! Remote FHIR server access for fhirsync.
//!
//! [`RemoteContentService`] is the seam the reconciler talks to;
//! [`FhirHttpClient`] is the reqwest-backed implementation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

mod base_url;
mod error;
mod http;

pub use base_url::{BaseUrlHolder, normalize_base_url};
pub use error::{ClientError, ClientResult};
pub use http::{AuthHeader, ClientOptions, FhirHttpClient};

/// Result of a binary upload that reached the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinaryUploadResponse {
    pub status_code: u16,
    pub is_successful: bool,
    pub message: String,
}

impl BinaryUploadResponse {
    pub fn from_status(status_code: u16, message: impl Into<String>) -> Self {
        Self {
            status_code,
            is_successful: (200..300).contains(&status_code),
            message: message.into(),
        }
    }
}

/// Operations the upload reconciler needs from the remote FHIR server.
#[async_trait]
pub trait RemoteContentService: Send + Sync {
    /// Creates or replaces `resource_type/id` on the server.
    ///
    /// Any non-success response is an error.
    async fn insert_resource_metadata(
        &self,
        resource_type: &str,
        id: &str,
        body: &Value,
    ) -> ClientResult<Value>;

    /// Writes raw bytes into the attachment at `attachment_path` of
    /// `resource_type/id`.
    ///
    /// Every HTTP response, successful or not, comes back as `Ok`; only a
    /// failure to get a response at all is `Err`.
    async fn upload_binary_content(
        &self,
        resource_type: &str,
        id: &str,
        attachment_path: &str,
        content_type: &str,
        body: Vec<u8>,
    ) -> ClientResult<BinaryUploadResponse>;
}
