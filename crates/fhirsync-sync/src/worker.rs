//! Background worker driving reconciliation passes.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use fhirsync_config::SyncConfig;
use tokio::time::{MissedTickBehavior, interval, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::listeners::{SyncEvent, SyncListenerRegistry};
use crate::outcome::PassReport;
use crate::reconciler::DocumentUploadReconciler;

/// Error type for hooks.
pub type HookError = Box<dyn std::error::Error + Send + Sync>;

/// What the host scheduler should do after an invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerResult {
    Success,
    /// The pass failed, attempts remain, and some failure is worth retrying.
    Retry,
    Failure,
}

/// Runs before every pass, e.g. to re-read settings and refresh the base URL.
///
/// A failing hook is logged and the pass runs with the settings it already has.
#[async_trait]
pub trait SyncHook: Send + Sync {
    async fn before_pass(&self) -> Result<(), HookError>;
}

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub interval: Duration,
    /// Extra attempts after a failed pass within one invocation.
    pub max_task_retries: u32,
    /// Attempt `n` waits `n * retry_backoff` before running.
    pub retry_backoff: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self::from(&SyncConfig::default())
    }
}

impl From<&SyncConfig> for WorkerConfig {
    fn from(cfg: &SyncConfig) -> Self {
        Self {
            interval: cfg.interval(),
            max_task_retries: cfg.max_task_retries,
            retry_backoff: cfg.retry_backoff(),
        }
    }
}

pub struct SyncWorker {
    reconciler: Arc<DocumentUploadReconciler>,
    config: WorkerConfig,
    hook: Option<Arc<dyn SyncHook>>,
    listeners: SyncListenerRegistry,
}

impl SyncWorker {
    pub fn new(reconciler: Arc<DocumentUploadReconciler>, config: WorkerConfig) -> Self {
        Self {
            reconciler,
            config,
            hook: None,
            listeners: SyncListenerRegistry::new(),
        }
    }

    pub fn with_hook(mut self, hook: Arc<dyn SyncHook>) -> Self {
        self.hook = Some(hook);
        self
    }

    pub fn with_listeners(mut self, listeners: SyncListenerRegistry) -> Self {
        self.listeners = listeners;
        self
    }

    pub fn listeners(&self) -> &SyncListenerRegistry {
        &self.listeners
    }

    /// Runs a single pass as attempt number `attempt` (1-based).
    pub async fn run_attempt(&self, attempt: u32) -> (WorkerResult, PassReport) {
        if let Some(hook) = &self.hook
            && let Err(e) = hook.before_pass().await
        {
            warn!(error = %e, "Pre-sync hook failed, continuing with current settings");
        }

        self.listeners.notify(&SyncEvent::Started { attempt });
        let report = self.reconciler.reconcile().await;
        self.listeners.notify(&SyncEvent::Finished {
            report: report.clone(),
        });

        let result = if report.is_success() {
            WorkerResult::Success
        } else if report.is_retryable() && attempt <= self.config.max_task_retries {
            WorkerResult::Retry
        } else {
            WorkerResult::Failure
        };
        (result, report)
    }

    /// One worker invocation: passes are retried with linear backoff until
    /// one succeeds or the retry budget is spent.
    pub async fn run_once(&self) -> WorkerResult {
        self.run_once_with_report().await.0
    }

    /// Like [`Self::run_once`], also returning the outcomes of all attempts
    /// folded into one report.
    ///
    /// A permanent rejection in any attempt makes the invocation a
    /// `Failure`, even when a later attempt has nothing left to do.
    pub async fn run_once_with_report(&self) -> (WorkerResult, PassReport) {
        let mut combined = PassReport::default();
        let mut attempt = 1;
        loop {
            let (result, report) = self.run_attempt(attempt).await;
            combined.merge(report);
            match result {
                WorkerResult::Retry => {
                    let delay = self.config.retry_backoff * attempt;
                    attempt += 1;
                    warn!(
                        attempt,
                        max_attempts = self.config.max_task_retries + 1,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        "Sync pass failed, retrying"
                    );
                    self.listeners.notify(&SyncEvent::Retrying { attempt });
                    sleep(delay).await;
                }
                WorkerResult::Success if !combined.has_permanent_failures() => {
                    return (WorkerResult::Success, combined);
                }
                WorkerResult::Success | WorkerResult::Failure => {
                    warn!(
                        attempts = attempt,
                        rejected = combined.has_permanent_failures(),
                        "Sync pass failed, giving up until next run"
                    );
                    return (WorkerResult::Failure, combined);
                }
            }
        }
    }

    /// Runs [`Self::run_once`] every `interval` until `cancel` fires.
    ///
    /// Cancellation abandons an in-flight pass; already retired items stay
    /// retired and the rest are picked up by the next run.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut ticker = interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            interval_secs = self.config.interval.as_secs(),
            "Sync worker started"
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            tokio::select! {
                _ = cancel.cancelled() => {
                    warn!("Sync worker cancelled during a pass");
                    break;
                }
                result = self.run_once() => {
                    info!(result = ?result, "Sync run finished");
                }
            }
        }

        info!("Sync worker stopped");
    }
}
