mod common;

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use common::Harness;
use fhirsync_sync::{
    CancellationToken, HookError, SyncEvent, SyncHook, SyncListener, SyncWorker, WorkerConfig,
    WorkerResult,
};

fn fast_config(max_task_retries: u32) -> WorkerConfig {
    WorkerConfig {
        interval: Duration::from_millis(20),
        max_task_retries,
        retry_backoff: Duration::ZERO,
    }
}

#[derive(Default)]
struct EventLog(Mutex<Vec<String>>);

impl SyncListener for EventLog {
    fn on_event(&self, event: &SyncEvent) {
        let label = match event {
            SyncEvent::Started { attempt } => format!("started:{attempt}"),
            SyncEvent::ItemFinished { .. } => "item".to_string(),
            SyncEvent::Finished { report } => format!("finished:{}", report.is_success()),
            SyncEvent::Retrying { attempt } => format!("retrying:{attempt}"),
        };
        self.0.lock().unwrap().push(label);
    }
}

#[derive(Default)]
struct CountingHook(AtomicU32);

#[async_trait]
impl SyncHook for CountingHook {
    async fn before_pass(&self) -> Result<(), HookError> {
        self.0.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct FailingHook;

#[async_trait]
impl SyncHook for FailingHook {
    async fn before_pass(&self) -> Result<(), HookError> {
        Err("config file vanished".into())
    }
}

#[tokio::test]
async fn run_once_succeeds_first_time() {
    let h = Harness::new();
    h.add_pending("doc-1").await;

    let hook = Arc::new(CountingHook::default());
    let worker = SyncWorker::new(Arc::new(h.reconciler), fast_config(3))
        .with_hook(Arc::clone(&hook) as Arc<dyn SyncHook>);

    assert_eq!(worker.run_once().await, WorkerResult::Success);
    assert_eq!(hook.0.load(Ordering::SeqCst), 1);
    assert!(h.store.is_empty());
}

#[tokio::test]
async fn run_once_retries_whole_pass_then_fails() {
    let h = Harness::new();
    h.add_pending("doc-1").await;
    h.remote.binary_status("doc-1", 503);
    let remote = Arc::clone(&h.remote);

    let log = Arc::new(EventLog::default());
    let worker = SyncWorker::new(Arc::new(h.reconciler), fast_config(2));
    let _guard = worker
        .listeners()
        .subscribe(Arc::clone(&log) as Arc<dyn SyncListener>);

    assert_eq!(worker.run_once().await, WorkerResult::Failure);

    // 1 attempt + 2 retries, each re-sending the item
    assert_eq!(remote.metadata_ids().len(), 3);
    assert_eq!(
        *log.0.lock().unwrap(),
        vec![
            "started:1",
            "finished:false",
            "retrying:2",
            "started:2",
            "finished:false",
            "retrying:3",
            "started:3",
            "finished:false",
        ]
    );
}

#[tokio::test]
async fn permanent_rejection_fails_run_without_retrying() {
    let h = Harness::new();
    h.add_pending("doc-1").await;
    h.remote.binary_status("doc-1", 422);
    let remote = Arc::clone(&h.remote);
    let store = h.store.clone();

    let worker = SyncWorker::new(Arc::new(h.reconciler), fast_config(3));
    let (result, report) = worker.run_once_with_report().await;

    assert_eq!(result, WorkerResult::Failure);
    assert_eq!(remote.metadata_ids().len(), 1);
    assert!(report.has_permanent_failures());
    assert_eq!(report.retired(), 1);
    assert!(store.is_empty());
}

#[tokio::test]
async fn rejection_is_remembered_when_a_retry_clears_the_rest() {
    let h = Harness::new();
    h.add_pending("doc-1").await;
    h.add_pending("doc-2").await;
    h.remote.binary_status("doc-1", 422);
    h.remote.fail_metadata("doc-2");
    let remote = Arc::clone(&h.remote);

    // doc-2 recovers once the first attempt is over
    struct Recover(Arc<common::ScriptedRemote>);
    impl SyncListener for Recover {
        fn on_event(&self, event: &SyncEvent) {
            if let SyncEvent::Retrying { .. } = event {
                self.0.recover_metadata("doc-2");
            }
        }
    }

    let worker = SyncWorker::new(Arc::new(h.reconciler), fast_config(3));
    let _guard = worker
        .listeners()
        .subscribe(Arc::new(Recover(Arc::clone(&remote))));
    let (result, report) = worker.run_once_with_report().await;

    assert_eq!(result, WorkerResult::Failure);
    assert_eq!(report.attempted(), 2);
    assert_eq!(report.succeeded(), 1);
    assert!(report.has_permanent_failures());
}

#[tokio::test]
async fn run_attempt_reports_retry_until_budget_spent() {
    let h = Harness::new();
    h.add_pending("doc-1").await;
    h.remote.fail_metadata("doc-1");

    let worker = SyncWorker::new(Arc::new(h.reconciler), fast_config(1));

    assert_eq!(worker.run_attempt(1).await.0, WorkerResult::Retry);
    assert_eq!(worker.run_attempt(2).await.0, WorkerResult::Failure);
}

#[tokio::test]
async fn later_attempt_can_recover() {
    let h = Harness::new();
    h.add_pending("doc-1").await;
    h.remote.binary_status("doc-1", 503);
    let remote = Arc::clone(&h.remote);
    let store = h.store.clone();

    let worker = SyncWorker::new(Arc::new(h.reconciler), fast_config(1));
    let (first, _) = worker.run_attempt(1).await;
    assert_eq!(first, WorkerResult::Retry);

    remote.binary_status("doc-1", 201);
    let (second, report) = worker.run_attempt(2).await;
    assert_eq!(second, WorkerResult::Success);
    assert_eq!(report.succeeded(), 1);
    assert!(store.is_empty());
}

#[tokio::test]
async fn failing_hook_does_not_block_pass() {
    let h = Harness::new();
    h.add_pending("doc-1").await;

    let worker = SyncWorker::new(Arc::new(h.reconciler), fast_config(0)).with_hook(Arc::new(FailingHook));
    assert_eq!(worker.run_once().await, WorkerResult::Success);
}

#[tokio::test]
async fn run_loops_until_cancelled() {
    let h = Harness::new();
    let hook = Arc::new(CountingHook::default());
    let worker = Arc::new(
        SyncWorker::new(Arc::new(h.reconciler), fast_config(0))
            .with_hook(Arc::clone(&hook) as Arc<dyn SyncHook>),
    );

    let cancel = CancellationToken::new();
    let task = tokio::spawn({
        let worker = Arc::clone(&worker);
        let cancel = cancel.clone();
        async move { worker.run(cancel).await }
    });

    // Wait for a few ticks
    for _ in 0..100 {
        if hook.0.load(Ordering::SeqCst) >= 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    cancel.cancel();

    tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("worker should stop after cancellation")
        .unwrap();
    assert!(hook.0.load(Ordering::SeqCst) >= 2);
}
