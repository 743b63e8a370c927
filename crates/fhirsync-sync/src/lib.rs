//! Upload reconciliation for locally captured FHIR documents.
//!
//! - [`DocumentUploadReconciler`] runs one pass over pending uploads.
//! - [`SyncWorker`] wraps it with whole-pass retries and periodic scheduling.
//! - [`SyncListenerRegistry`] fans progress events out to scoped subscribers.

pub mod listeners;
pub mod outcome;
pub mod reconciler;
pub mod worker;

pub use listeners::{ListenerGuard, ListenerHandle, SyncEvent, SyncListener, SyncListenerRegistry};
pub use outcome::{ItemReport, PassReport, PendingUpload, UploadOutcome};
pub use reconciler::{DocumentUploadReconciler, ReconcilerConfig};
pub use worker::{HookError, SyncHook, SyncWorker, WorkerConfig, WorkerResult};

pub use tokio_util::sync::CancellationToken;
