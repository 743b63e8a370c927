//! Helpers for locally stored `DocumentReference` resources.
//!
//! A DocumentReference saved on the device may carry an extension pointing at
//! a locally cached file (a captured photo, a scanned form). While that
//! extension resolves, the resource is a pending upload.

use serde_json::Value;

use crate::error::{CoreError, Result};
use crate::locator::FileLocator;

/// Extension URL marking the locally cached file of a pending upload.
pub const PENDING_FILE_EXTENSION_URL: &str =
    "http://fhirsync.dev/StructureDefinition/pending-upload-file";

/// Element path of the binary content inside a DocumentReference.
pub const DOCUMENT_ATTACHMENT_PATH: &str = "DocumentReference.content.attachment";

/// MIME type used when the first attachment declares none.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Value keys checked on the extension, in order.
const LOCATOR_VALUE_KEYS: [&str; 3] = ["valueUri", "valueUrl", "valueString"];

/// Returns `resourceType` of a resource, if present.
pub fn resource_type(resource: &Value) -> Option<&str> {
    resource.get("resourceType").and_then(Value::as_str)
}

/// Returns the logical `id` of a resource, if present.
pub fn resource_id(resource: &Value) -> Option<&str> {
    resource.get("id").and_then(Value::as_str)
}

/// Resolves the pending-file locator from the extension with `extension_url`.
///
/// Returns `None` when the extension is missing or carries an empty value.
pub fn pending_file_locator(resource: &Value, extension_url: &str) -> Option<FileLocator> {
    let extensions = resource.get("extension")?.as_array()?;
    let extension = extensions
        .iter()
        .find(|ext| ext.get("url").and_then(Value::as_str) == Some(extension_url))?;

    LOCATOR_VALUE_KEYS
        .iter()
        .filter_map(|key| extension.get(*key).and_then(Value::as_str))
        .map(str::trim)
        .find(|value| !value.is_empty())
        .map(FileLocator::new)
}

/// Content type declared by `content[0].attachment.contentType`.
pub fn attachment_content_type(resource: &Value) -> Option<&str> {
    resource
        .get("content")?
        .as_array()?
        .first()?
        .get("attachment")?
        .get("contentType")?
        .as_str()
        .filter(|ct| !ct.is_empty())
}

/// Points the pending-file extension at `locator`, replacing any previous value.
///
/// # Errors
///
/// Returns `CoreError::InvalidResource` if `resource` is not a JSON object or
/// its `extension` element is not an array.
pub fn set_pending_file(
    resource: &mut Value,
    extension_url: &str,
    locator: &FileLocator,
) -> Result<()> {
    let obj = resource
        .as_object_mut()
        .ok_or_else(|| CoreError::invalid_resource("Resource must be a JSON object"))?;

    let extensions = obj
        .entry("extension")
        .or_insert_with(|| Value::Array(Vec::new()))
        .as_array_mut()
        .ok_or_else(|| CoreError::invalid_resource("extension must be an array"))?;

    extensions.retain(|ext| ext.get("url").and_then(Value::as_str) != Some(extension_url));
    extensions.push(serde_json::json!({
        "url": extension_url,
        "valueUri": locator.as_str(),
    }));

    Ok(())
}
