use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use fhirsync_config::AppConfig;
use fhirsync_sync::{CancellationToken, SyncWorker, UploadOutcome, WorkerResult};

use crate::app;
use crate::cli::OutputFormat;
use crate::output::{self, ProgressPrinter};

pub async fn sync(cfg: &AppConfig, config_path: Option<PathBuf>, format: OutputFormat) -> Result<()> {
    let stack = app::build_sync_stack(cfg, config_path).await?;

    let _progress_guard = match format {
        OutputFormat::Table => Some(stack.listeners.subscribe(Arc::new(ProgressPrinter))),
        OutputFormat::Json => None,
    };

    let (result, report) = stack.worker.run_once_with_report().await;

    match format {
        OutputFormat::Json => output::print_json(&report)?,
        OutputFormat::Table => output::print_report_table(&report),
    }

    match result {
        WorkerResult::Success => {
            if matches!(format, OutputFormat::Table) {
                output::print_success("Sync complete");
            }
            Ok(())
        }
        WorkerResult::Retry | WorkerResult::Failure if report.has_permanent_failures() => {
            anyhow::bail!(
                "Sync failed; {} upload(s) were rejected by the server and discarded",
                report
                    .items
                    .iter()
                    .filter(|i| matches!(i.outcome, UploadOutcome::PermanentFailure { .. }))
                    .count()
            )
        }
        WorkerResult::Retry | WorkerResult::Failure => {
            anyhow::bail!("Sync failed; remaining items will be retried on the next run")
        }
    }
}

pub async fn daemon(cfg: &AppConfig, config_path: Option<PathBuf>) -> Result<()> {
    let stack = app::build_sync_stack(cfg, config_path).await?;
    let worker: Arc<SyncWorker> = Arc::new(stack.worker);

    let cancel = CancellationToken::new();
    let task = tokio::spawn({
        let worker = Arc::clone(&worker);
        let cancel = cancel.clone();
        async move { worker.run(cancel).await }
    });

    tokio::signal::ctrl_c().await?;
    tracing::info!("Interrupt received, stopping sync worker");
    cancel.cancel();
    task.await?;
    Ok(())
}
