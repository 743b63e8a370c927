//! Shared, explicitly refreshed remote base URL.

use std::sync::Arc;

use arc_swap::ArcSwap;
use url::Url;

use crate::error::{ClientError, ClientResult};

/// Holds the remote FHIR base URL.
///
/// Readers always see a complete, validated value. The URL only changes
/// through [`BaseUrlHolder::refresh_base_url`]; nothing observes config
/// in the background.
#[derive(Debug)]
pub struct BaseUrlHolder {
    current: ArcSwap<String>,
}

impl BaseUrlHolder {
    pub fn new(base_url: &str) -> ClientResult<Self> {
        let normalized = normalize_base_url(base_url)?;
        Ok(Self {
            current: ArcSwap::from_pointee(normalized),
        })
    }

    /// Current base URL, without a trailing slash.
    pub fn current(&self) -> Arc<String> {
        self.current.load_full()
    }

    /// Replaces the base URL. Returns `true` if the value changed.
    ///
    /// An invalid URL is rejected and the previous value is kept.
    pub fn refresh_base_url(&self, base_url: &str) -> ClientResult<bool> {
        let normalized = normalize_base_url(base_url)?;
        let next = Arc::new(normalized);
        let previous = self.current.swap(Arc::clone(&next));
        let changed = previous != next;
        if changed {
            tracing::info!(previous = %previous, current = %next, "Remote base URL refreshed");
        }
        Ok(changed)
    }
}

/// Validates an http(s) URL and trims trailing slashes.
pub fn normalize_base_url(base_url: &str) -> ClientResult<String> {
    let trimmed = base_url.trim().trim_end_matches('/');
    let parsed =
        Url::parse(trimmed).map_err(|e| ClientError::invalid_base_url(base_url, e.to_string()))?;

    match parsed.scheme() {
        "http" | "https" => {}
        other => {
            return Err(ClientError::invalid_base_url(
                base_url,
                format!("unsupported scheme '{other}'"),
            ));
        }
    }
    if parsed.host_str().is_none() {
        return Err(ClientError::invalid_base_url(base_url, "missing host"));
    }

    Ok(trimmed.to_string())
}
