use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, header};
use serde_json::Value;

use crate::base_url::BaseUrlHolder;
use crate::error::{ClientError, ClientResult};
use crate::{BinaryUploadResponse, RemoteContentService};

const FHIR_JSON: &str = "application/fhir+json";

/// What the client needs to set the Authorization header.
#[derive(Clone)]
pub enum AuthHeader {
    Basic { username: String, password: String },
    Bearer { token: String },
}

impl fmt::Debug for AuthHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"***")
                .finish(),
            Self::Bearer { .. } => f.debug_struct("Bearer").field("token", &"***").finish(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub auth: Option<AuthHeader>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            auth: None,
        }
    }
}

/// reqwest-backed [`RemoteContentService`].
#[derive(Debug, Clone)]
pub struct FhirHttpClient {
    http: Client,
    base_url: Arc<BaseUrlHolder>,
    auth: Option<AuthHeader>,
}

impl FhirHttpClient {
    pub fn new(base_url: Arc<BaseUrlHolder>, options: ClientOptions) -> ClientResult<Self> {
        let http = Client::builder()
            .connect_timeout(options.connect_timeout)
            .timeout(options.request_timeout)
            .build()?;

        Ok(Self {
            http,
            base_url,
            auth: options.auth,
        })
    }

    /// Shared base URL holder; refresh it to retarget this client.
    pub fn base_url(&self) -> &Arc<BaseUrlHolder> {
        &self.base_url
    }

    fn resource_url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.current(), path)
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let mut req = self.http.request(method, url);
        match &self.auth {
            Some(AuthHeader::Basic { username, password }) => {
                req = req.basic_auth(username, Some(password));
            }
            Some(AuthHeader::Bearer { token }) => {
                req = req.bearer_auth(token);
            }
            None => {}
        }
        req.header(header::ACCEPT, FHIR_JSON)
    }
}

#[async_trait]
impl RemoteContentService for FhirHttpClient {
    async fn insert_resource_metadata(
        &self,
        resource_type: &str,
        id: &str,
        body: &Value,
    ) -> ClientResult<Value> {
        let url = self.resource_url(&format!("{resource_type}/{id}"));
        let payload = serde_json::to_vec(body)?;

        let resp = self
            .request(Method::PUT, &url)
            .header(header::CONTENT_TYPE, FHIR_JSON)
            .body(payload)
            .send()
            .await?;

        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();

        if !status.is_success() {
            tracing::debug!(url = %url, status = status.as_u16(), "Metadata upsert rejected");
            return Err(ClientError::http(
                status.as_u16(),
                error_message(status, &text),
            ));
        }

        // The upsert is accepted at this point; a body that isn't JSON doesn't change that.
        match serde_json::from_str(&text) {
            Ok(value) => Ok(value),
            Err(e) => {
                if !text.trim().is_empty() {
                    tracing::debug!(url = %url, error = %e, "Ignoring non-JSON upsert response body");
                }
                Ok(Value::Null)
            }
        }
    }

    async fn upload_binary_content(
        &self,
        resource_type: &str,
        id: &str,
        attachment_path: &str,
        content_type: &str,
        body: Vec<u8>,
    ) -> ClientResult<BinaryUploadResponse> {
        let url = self.resource_url(&format!("{resource_type}/{id}/$binary-access-write"));
        let size = body.len();

        let resp = self
            .request(Method::POST, &url)
            .query(&[("path", attachment_path)])
            .header(header::CONTENT_TYPE, content_type)
            .body(body)
            .send()
            .await?;

        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();

        tracing::debug!(
            url = %url,
            status = status.as_u16(),
            bytes = size,
            "Binary upload answered"
        );

        let message = if status.is_success() {
            status.canonical_reason().unwrap_or_default().to_string()
        } else {
            error_message(status, &text)
        };
        Ok(BinaryUploadResponse::from_status(status.as_u16(), message))
    }
}

/// Prefers OperationOutcome diagnostics, then the raw body, then the reason phrase.
fn error_message(status: reqwest::StatusCode, body: &str) -> String {
    if let Ok(json) = serde_json::from_str::<Value>(body)
        && json.get("resourceType").and_then(|v| v.as_str()) == Some("OperationOutcome")
        && let Some(issues) = json.get("issue").and_then(|v| v.as_array())
    {
        let msgs: Vec<&str> = issues
            .iter()
            .filter_map(|i| i.get("diagnostics").and_then(|d| d.as_str()))
            .collect();
        if !msgs.is_empty() {
            return msgs.join("; ");
        }
    }

    let body = body.trim();
    if body.is_empty() {
        status.canonical_reason().unwrap_or("Unknown status").to_string()
    } else {
        body.to_string()
    }
}
