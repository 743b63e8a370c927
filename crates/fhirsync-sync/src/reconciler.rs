//! Document upload reconciliation.
//!
//! One pass lists every locally stored `DocumentReference`, keeps those
//! whose pending-file extension resolves, and for each one:
//!
//! 1. upserts the resource on the remote server,
//! 2. reads the cached file,
//! 3. writes the bytes into the remote attachment,
//! 4. on success or permanent rejection, purges the local record and deletes
//!    the cached file.
//!
//! Items that fail transiently, or whose file is missing, are left untouched
//! so the next pass picks them up again. Items run one after another; a
//! failure never stops the pass early.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use fhirsync_client::RemoteContentService;
use fhirsync_config::SyncConfig;
use fhirsync_core::{
    DEFAULT_CONTENT_TYPE, DOCUMENT_ATTACHMENT_PATH, PENDING_FILE_EXTENSION_URL,
    attachment_content_type, pending_file_locator,
};
use fhirsync_storage::{DynFileAccess, DynStore, StorageError};
use tracing::{debug, error, info, warn};

use crate::listeners::{SyncEvent, SyncListenerRegistry};
use crate::outcome::{ItemReport, PassReport, PendingUpload, UploadOutcome};

const DOCUMENT_REFERENCE: &str = "DocumentReference";

#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// Element path handed to `$binary-access-write`.
    pub attachment_path: String,
    /// Binary upload statuses treated as permanent rejection.
    pub permanent_failure_statuses: HashSet<u16>,
    pub pending_file_extension_url: String,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            attachment_path: DOCUMENT_ATTACHMENT_PATH.to_string(),
            permanent_failure_statuses: [400, 410, 422].into_iter().collect(),
            pending_file_extension_url: PENDING_FILE_EXTENSION_URL.to_string(),
        }
    }
}

impl From<&SyncConfig> for ReconcilerConfig {
    fn from(cfg: &SyncConfig) -> Self {
        Self {
            attachment_path: cfg.attachment_path.clone(),
            permanent_failure_statuses: cfg.permanent_failure_statuses.iter().copied().collect(),
            pending_file_extension_url: cfg.pending_file_extension_url.clone(),
        }
    }
}

pub struct DocumentUploadReconciler {
    store: DynStore,
    remote: Arc<dyn RemoteContentService>,
    files: DynFileAccess,
    config: ReconcilerConfig,
    listeners: SyncListenerRegistry,
}

impl DocumentUploadReconciler {
    pub fn new(
        store: DynStore,
        remote: Arc<dyn RemoteContentService>,
        files: DynFileAccess,
        config: ReconcilerConfig,
    ) -> Self {
        Self {
            store,
            remote,
            files,
            config,
            listeners: SyncListenerRegistry::new(),
        }
    }

    /// Reports per-item outcomes to `listeners`.
    pub fn with_listeners(mut self, listeners: SyncListenerRegistry) -> Self {
        self.listeners = listeners;
        self
    }

    pub fn config(&self) -> &ReconcilerConfig {
        &self.config
    }

    /// Runs one pass. Returns `true` iff every pending upload succeeded
    /// (trivially `true` when nothing is pending).
    pub async fn reconcile_pending_uploads(&self) -> bool {
        self.reconcile().await.is_success()
    }

    /// Lists pending uploads without touching anything.
    pub async fn pending_uploads(&self) -> Result<Vec<PendingUpload>, StorageError> {
        let stored = self.store.search_all(DOCUMENT_REFERENCE).await?;
        let mut seen = HashSet::new();

        Ok(stored
            .into_iter()
            .filter_map(|stored| {
                let locator = pending_file_locator(
                    &stored.resource,
                    &self.config.pending_file_extension_url,
                )?;
                if !seen.insert(stored.id.clone()) {
                    return None;
                }
                let content_type = attachment_content_type(&stored.resource)
                    .unwrap_or(DEFAULT_CONTENT_TYPE)
                    .to_string();
                Some(PendingUpload {
                    document_reference_id: stored.id,
                    file_locator: locator,
                    content_type,
                    resource: stored.resource,
                })
            })
            .collect())
    }

    /// Runs one pass and reports what happened to each item.
    pub async fn reconcile(&self) -> PassReport {
        let started = Instant::now();

        let pending = match self.pending_uploads().await {
            Ok(pending) => pending,
            Err(e) => {
                error!(
                    backend = self.store.backend_name(),
                    category = %e.category(),
                    error = %e,
                    "Failed to list pending document uploads"
                );
                return PassReport::discovery_failed(e.to_string(), elapsed_ms(started));
            }
        };

        if pending.is_empty() {
            debug!("No pending document uploads");
            return PassReport {
                elapsed_ms: elapsed_ms(started),
                ..PassReport::default()
            };
        }

        info!(count = pending.len(), "Reconciling pending document uploads");

        let mut items = Vec::with_capacity(pending.len());
        for upload in &pending {
            let outcome = self.upload_one(upload).await;
            self.listeners.notify(&SyncEvent::ItemFinished {
                document_reference_id: upload.document_reference_id.clone(),
                outcome: outcome.clone(),
            });
            items.push(ItemReport {
                document_reference_id: upload.document_reference_id.clone(),
                outcome,
            });
        }

        let report = PassReport {
            items,
            discovery_error: None,
            elapsed_ms: elapsed_ms(started),
        };
        info!(
            attempted = report.attempted(),
            succeeded = report.succeeded(),
            failed = report.failed(),
            retired = report.retired(),
            elapsed_ms = report.elapsed_ms,
            "Document upload pass finished"
        );
        report
    }

    /// Runs the whole protocol for one item. Never fails: every error ends up
    /// classified in the returned outcome.
    async fn upload_one(&self, upload: &PendingUpload) -> UploadOutcome {
        let id = upload.document_reference_id.as_str();
        let locator = upload.file_locator.as_str();

        // 1. Metadata
        if let Err(e) = self
            .remote
            .insert_resource_metadata(DOCUMENT_REFERENCE, id, &upload.resource)
            .await
        {
            error!(
                document_reference_id = %id,
                locator = %locator,
                status = ?e.status(),
                error = %e,
                "Metadata upload failed, will retry next pass"
            );
            return UploadOutcome::TransientFailure {
                status: e.status(),
                reason: e.to_string(),
            };
        }

        // 2. Cached file
        let bytes = match self.files.open_read(&upload.file_locator).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                warn!(
                    document_reference_id = %id,
                    locator = %locator,
                    "Cached file for pending upload is missing"
                );
                return UploadOutcome::MissingLocalFile {
                    locator: locator.to_string(),
                };
            }
            Err(e) => {
                warn!(
                    document_reference_id = %id,
                    locator = %locator,
                    category = %e.category(),
                    error = %e,
                    "Cached file for pending upload is unreadable"
                );
                return UploadOutcome::MissingLocalFile {
                    locator: locator.to_string(),
                };
            }
        };

        // 3. Binary content
        let response = match self
            .remote
            .upload_binary_content(
                DOCUMENT_REFERENCE,
                id,
                &self.config.attachment_path,
                &upload.content_type,
                bytes,
            )
            .await
        {
            Ok(response) => response,
            Err(e) => {
                error!(
                    document_reference_id = %id,
                    locator = %locator,
                    error = %e,
                    "Binary upload failed, will retry next pass"
                );
                return UploadOutcome::TransientFailure {
                    status: e.status(),
                    reason: e.to_string(),
                };
            }
        };

        let status = response.status_code;
        let outcome = if response.is_successful {
            UploadOutcome::Success
        } else if self.config.permanent_failure_statuses.contains(&status) {
            warn!(
                document_reference_id = %id,
                locator = %locator,
                status,
                error = %response.message,
                "Binary upload permanently rejected, discarding local copy"
            );
            UploadOutcome::PermanentFailure {
                status,
                message: response.message,
            }
        } else {
            error!(
                document_reference_id = %id,
                locator = %locator,
                status,
                error = %response.message,
                "Binary upload failed, will retry next pass"
            );
            return UploadOutcome::TransientFailure {
                status: Some(status),
                reason: format!("HTTP {status}: {}", response.message),
            };
        };

        // 4. Retire
        if let Err(e) = self.retire(upload).await {
            error!(
                document_reference_id = %id,
                locator = %locator,
                status,
                category = %e.category(),
                error = %e,
                "Failed to purge uploaded document, will retry next pass"
            );
            return UploadOutcome::TransientFailure {
                status: Some(status),
                reason: format!("purge failed: {e}"),
            };
        }

        if outcome.is_success() {
            info!(
                document_reference_id = %id,
                locator = %locator,
                status,
                "Document uploaded"
            );
        }
        outcome
    }

    /// Purges the local record, then deletes the cached file.
    ///
    /// Only the purge decides the result; a file that cannot be deleted is
    /// logged and left behind, since without the record it is never retried.
    async fn retire(&self, upload: &PendingUpload) -> Result<(), StorageError> {
        self.store
            .purge(DOCUMENT_REFERENCE, &upload.document_reference_id, true)
            .await?;

        match self.files.delete(&upload.file_locator).await {
            Ok(true) => {}
            Ok(false) => debug!(
                document_reference_id = %upload.document_reference_id,
                locator = %upload.file_locator,
                "Cached file already gone"
            ),
            Err(e) => warn!(
                document_reference_id = %upload.document_reference_id,
                locator = %upload.file_locator,
                category = %e.category(),
                error = %e,
                "Failed to delete cached file"
            ),
        }
        Ok(())
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
