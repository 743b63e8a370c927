//! Per-item outcomes and pass reports.

use fhirsync_core::FileLocator;
use serde::Serialize;
use serde_json::Value;

/// A locally stored DocumentReference whose cached file still awaits upload.
#[derive(Debug, Clone, Serialize)]
pub struct PendingUpload {
    pub document_reference_id: String,
    pub file_locator: FileLocator,
    pub content_type: String,
    /// The stored resource body, sent as-is as upload metadata.
    #[serde(skip)]
    pub resource: Value,
}

/// How a single pending upload ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum UploadOutcome {
    /// Uploaded; local record purged and cached file deleted.
    Success,
    /// Worth retrying; local state untouched.
    TransientFailure { status: Option<u16>, reason: String },
    /// Rejected for good; local record purged and cached file deleted.
    PermanentFailure { status: u16, message: String },
    /// The cached file is gone or unreadable; local state untouched.
    MissingLocalFile { locator: String },
}

impl UploadOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// Whether the local record and file were discarded.
    pub fn retired_locally(&self) -> bool {
        matches!(self, Self::Success | Self::PermanentFailure { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::TransientFailure { .. } => "transient_failure",
            Self::PermanentFailure { .. } => "permanent_failure",
            Self::MissingLocalFile { .. } => "missing_local_file",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ItemReport {
    pub document_reference_id: String,
    #[serde(flatten)]
    pub outcome: UploadOutcome,
}

/// Result of one reconciliation pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PassReport {
    pub items: Vec<ItemReport>,
    /// Set when the pending uploads could not be listed; no item was attempted.
    pub discovery_error: Option<String>,
    pub elapsed_ms: u64,
}

impl PassReport {
    pub fn discovery_failed(error: impl Into<String>, elapsed_ms: u64) -> Self {
        Self {
            items: Vec::new(),
            discovery_error: Some(error.into()),
            elapsed_ms,
        }
    }

    /// `true` iff discovery worked and every attempted item succeeded.
    pub fn is_success(&self) -> bool {
        self.discovery_error.is_none() && self.items.iter().all(|i| i.outcome.is_success())
    }

    /// Whether another attempt could change anything: discovery failed or an
    /// item failed without being retired locally.
    pub fn is_retryable(&self) -> bool {
        self.discovery_error.is_some()
            || self
                .items
                .iter()
                .any(|i| !i.outcome.is_success() && !i.outcome.retired_locally())
    }

    pub fn has_permanent_failures(&self) -> bool {
        self.items
            .iter()
            .any(|i| matches!(i.outcome, UploadOutcome::PermanentFailure { .. }))
    }

    /// Folds a later attempt into this report. An item seen again takes the
    /// later outcome; items retired earlier keep theirs.
    pub fn merge(&mut self, later: PassReport) {
        for item in later.items {
            match self
                .items
                .iter_mut()
                .find(|i| i.document_reference_id == item.document_reference_id)
            {
                Some(existing) => existing.outcome = item.outcome,
                None => self.items.push(item),
            }
        }
        self.discovery_error = later.discovery_error;
        self.elapsed_ms += later.elapsed_ms;
    }

    pub fn attempted(&self) -> usize {
        self.items.len()
    }

    pub fn succeeded(&self) -> usize {
        self.items.iter().filter(|i| i.outcome.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.attempted() - self.succeeded()
    }

    pub fn retired(&self) -> usize {
        self.items
            .iter()
            .filter(|i| i.outcome.retired_locally())
            .count()
    }
}
