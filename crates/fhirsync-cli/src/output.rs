use anyhow::Result;
use colored::Colorize;
use fhirsync_sync::{PassReport, PendingUpload, SyncEvent, SyncListener, UploadOutcome};
use serde::Serialize;
use tabled::builder::Builder;
use tabled::settings::Style;

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn print_success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

pub fn print_warning(msg: &str) {
    println!("{} {}", "!".yellow(), msg);
}

pub fn print_error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

pub fn print_pending_table(pending: &[PendingUpload]) {
    if pending.is_empty() {
        println!("No pending uploads.");
        return;
    }
    let mut builder = Builder::default();
    builder.push_record(["DocumentReference", "File", "ContentType"]);
    for upload in pending {
        builder.push_record([
            upload.document_reference_id.as_str(),
            upload.file_locator.as_str(),
            upload.content_type.as_str(),
        ]);
    }
    let table = builder.build().with(Style::rounded()).to_string();
    println!("{table}");
    println!("Total: {}", pending.len());
}

pub fn print_report_table(report: &PassReport) {
    if let Some(err) = &report.discovery_error {
        print_error(&format!("Could not list pending uploads: {err}"));
        return;
    }
    if report.items.is_empty() {
        println!("Nothing to upload.");
        return;
    }

    let mut builder = Builder::default();
    builder.push_record(["DocumentReference", "Outcome", "Status", "Detail"]);
    for item in &report.items {
        let (status, detail) = outcome_columns(&item.outcome);
        builder.push_record([
            item.document_reference_id.clone(),
            item.outcome.label().to_string(),
            status,
            detail,
        ]);
    }
    let table = builder.build().with(Style::rounded()).to_string();
    println!("{table}");
    println!(
        "Attempted: {}  Succeeded: {}  Failed: {}  Retired: {}",
        report.attempted(),
        report.succeeded().to_string().green(),
        report.failed().to_string().red(),
        report.retired()
    );
}

fn outcome_columns(outcome: &UploadOutcome) -> (String, String) {
    match outcome {
        UploadOutcome::Success => ("-".into(), String::new()),
        UploadOutcome::TransientFailure { status, reason } => (
            status.map_or_else(|| "-".to_string(), |s| s.to_string()),
            reason.clone(),
        ),
        UploadOutcome::PermanentFailure { status, message } => {
            (status.to_string(), message.clone())
        }
        UploadOutcome::MissingLocalFile { locator } => ("-".into(), format!("missing {locator}")),
    }
}

/// Prints one line per finished item while a pass runs.
pub struct ProgressPrinter;

impl SyncListener for ProgressPrinter {
    fn on_event(&self, event: &SyncEvent) {
        match event {
            SyncEvent::ItemFinished {
                document_reference_id,
                outcome,
            } => match outcome {
                UploadOutcome::Success => {
                    print_success(&format!("DocumentReference/{document_reference_id} uploaded"))
                }
                UploadOutcome::PermanentFailure { status, .. } => print_warning(&format!(
                    "DocumentReference/{document_reference_id} rejected (HTTP {status}), discarded"
                )),
                other => print_error(&format!(
                    "DocumentReference/{document_reference_id}: {}",
                    other.label()
                )),
            },
            SyncEvent::Retrying { attempt } => {
                print_warning(&format!("Pass failed, starting attempt {attempt}"))
            }
            SyncEvent::Started { .. } | SyncEvent::Finished { .. } => {}
        }
    }

    fn name(&self) -> &str {
        "progress-printer"
    }
}
