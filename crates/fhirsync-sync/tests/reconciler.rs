mod common;

use std::sync::{Arc, Mutex};

use common::{BrokenStore, Harness, RemoteCall, ScriptedFiles, ScriptedRemote, UnpurgeableStore};
use fhirsync_client::RemoteContentService;
use fhirsync_db_memory::InMemoryResourceStore;
use fhirsync_storage::{LocalFileAccess, LocalResourceStore};
use fhirsync_sync::{
    DocumentUploadReconciler, ReconcilerConfig, SyncEvent, SyncListener, SyncListenerRegistry,
    UploadOutcome,
};
use serde_json::json;

#[tokio::test]
async fn zero_pending_succeeds_without_network() {
    let h = Harness::new();
    // Not pending: no extension
    h.store
        .create(&json!({"resourceType": "DocumentReference", "id": "plain", "status": "current"}))
        .await
        .unwrap();

    assert!(h.reconciler.reconcile_pending_uploads().await);
    assert!(h.remote.calls().is_empty());
    assert!(h.store.contains("DocumentReference", "plain"));
}

#[tokio::test]
async fn metadata_failure_leaves_everything_in_place() {
    let h = Harness::new();
    let locator = h.add_pending("doc-1").await;
    h.remote.fail_metadata("doc-1");

    let report = h.reconciler.reconcile().await;

    assert!(!report.is_success());
    assert!(matches!(
        report.items[0].outcome,
        UploadOutcome::TransientFailure { status: Some(500), .. }
    ));
    assert!(h.store.contains("DocumentReference", "doc-1"));
    assert!(h.files.exists(&locator));
    assert!(h.files.deleted().is_empty());
    // No binary upload after a failed upsert
    assert_eq!(h.remote.calls(), vec![RemoteCall::Metadata("doc-1".into())]);
}

#[tokio::test]
async fn missing_file_keeps_record() {
    let h = Harness::new();
    h.store
        .create(&common::pending_document("doc-1", "gone.jpg"))
        .await
        .unwrap();

    let report = h.reconciler.reconcile().await;

    assert!(!report.is_success());
    assert_eq!(
        report.items[0].outcome,
        UploadOutcome::MissingLocalFile {
            locator: "gone.jpg".into()
        }
    );
    assert!(h.store.contains("DocumentReference", "doc-1"));
    assert!(h.files.deleted().is_empty());
}

#[tokio::test]
async fn unreadable_file_counts_as_missing() {
    let h = Harness::new();
    let locator = h.add_pending("doc-1").await;
    h.files.make_unreadable(&locator);

    assert!(!h.reconciler.reconcile_pending_uploads().await);
    assert!(h.store.contains("DocumentReference", "doc-1"));
    assert!(h.files.exists(&locator));
}

#[tokio::test]
async fn successful_upload_retires_record_and_file() {
    let h = Harness::new();
    let locator = h.add_pending("doc-1").await;

    assert!(h.reconciler.reconcile_pending_uploads().await);

    assert!(!h.store.contains("DocumentReference", "doc-1"));
    assert!(!h.files.exists(&locator));
    assert_eq!(h.files.deleted(), vec![locator]);

    let calls = h.remote.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(
        calls[1],
        RemoteCall::Binary {
            id: "doc-1".into(),
            content_type: "image/jpeg".into(),
            bytes: b"bytes-of-doc-1".to_vec(),
        }
    );
}

#[tokio::test]
async fn permanent_rejection_retires_but_fails_pass() {
    let h = Harness::new();
    let locator = h.add_pending("doc-1").await;
    h.remote.binary_status("doc-1", 422);

    let report = h.reconciler.reconcile().await;

    assert!(!report.is_success());
    assert!(matches!(
        report.items[0].outcome,
        UploadOutcome::PermanentFailure { status: 422, .. }
    ));
    assert!(!h.store.contains("DocumentReference", "doc-1"));
    assert!(!h.files.exists(&locator));
}

#[tokio::test]
async fn gone_and_bad_request_are_permanent_too() {
    for status in [400, 410] {
        let h = Harness::new();
        h.add_pending("doc-1").await;
        h.remote.binary_status("doc-1", status);

        assert!(!h.reconciler.reconcile_pending_uploads().await);
        assert!(h.store.is_empty(), "status {status} should purge");
    }
}

#[tokio::test]
async fn transient_status_then_success_on_next_pass() {
    let h = Harness::new();
    let locator = h.add_pending("doc-1").await;
    h.remote.binary_status("doc-1", 503);

    assert!(!h.reconciler.reconcile_pending_uploads().await);
    assert!(h.store.contains("DocumentReference", "doc-1"));
    assert!(h.files.exists(&locator));
    assert!(h.files.deleted().is_empty());

    h.remote.binary_status("doc-1", 200);
    assert!(h.reconciler.reconcile_pending_uploads().await);
    assert!(!h.store.contains("DocumentReference", "doc-1"));
    assert!(!h.files.exists(&locator));
}

#[tokio::test]
async fn binary_transport_error_is_transient() {
    let h = Harness::new();
    h.add_pending("doc-1").await;
    h.remote.fail_binary_transport("doc-1");

    let report = h.reconciler.reconcile().await;
    assert!(matches!(
        report.items[0].outcome,
        UploadOutcome::TransientFailure { .. }
    ));
    assert!(h.store.contains("DocumentReference", "doc-1"));
}

#[tokio::test]
async fn every_item_is_attempted_despite_failures() {
    let h = Harness::new();
    for id in ["a", "b", "c", "d", "e"] {
        h.add_pending(id).await;
    }
    h.remote.fail_metadata("b");
    h.remote.binary_status("d", 503);

    let report = h.reconciler.reconcile().await;

    assert!(!report.is_success());
    assert_eq!(report.attempted(), 5);
    assert_eq!(report.succeeded(), 3);
    assert_eq!(report.failed(), 2);

    let mut attempted = h.remote.metadata_ids();
    attempted.sort();
    assert_eq!(attempted, vec!["a", "b", "c", "d", "e"]);

    let mut left: Vec<String> = h
        .store
        .search_all("DocumentReference")
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.id)
        .collect();
    left.sort();
    assert_eq!(left, vec!["b", "d"]);
}

#[tokio::test]
async fn all_items_succeeding_passes() {
    let h = Harness::new();
    for id in ["a", "b", "c"] {
        h.add_pending(id).await;
    }

    assert!(h.reconciler.reconcile_pending_uploads().await);
    assert!(h.store.is_empty());
}

#[tokio::test]
async fn discovery_failure_fails_pass_without_attempts() {
    let remote = Arc::new(ScriptedRemote::default());
    let reconciler = DocumentUploadReconciler::new(
        Arc::new(BrokenStore),
        Arc::clone(&remote) as Arc<dyn RemoteContentService>,
        Arc::new(ScriptedFiles::default()),
        ReconcilerConfig::default(),
    );

    let report = reconciler.reconcile().await;
    assert!(!report.is_success());
    assert_eq!(report.discovery_error.as_deref(), Some("Internal error: store offline"));
    assert!(remote.calls().is_empty());
}

#[tokio::test]
async fn failed_purge_is_transient_and_keeps_file() {
    let store = InMemoryResourceStore::new();
    store
        .create(&common::pending_document("doc-1", "doc-1.jpg"))
        .await
        .unwrap();
    let files = Arc::new(ScriptedFiles::default());
    files.put("doc-1.jpg", b"jpeg");

    let reconciler = DocumentUploadReconciler::new(
        Arc::new(UnpurgeableStore(store.clone())),
        Arc::new(ScriptedRemote::default()),
        Arc::clone(&files) as Arc<dyn LocalFileAccess>,
        ReconcilerConfig::default(),
    );

    let report = reconciler.reconcile().await;
    assert!(matches!(
        report.items[0].outcome,
        UploadOutcome::TransientFailure { status: Some(200), .. }
    ));
    assert!(store.contains("DocumentReference", "doc-1"));
    assert!(files.exists("doc-1.jpg"));
}

#[tokio::test]
async fn content_type_defaults_to_octet_stream() {
    let h = Harness::new();
    h.store
        .create(&json!({
            "resourceType": "DocumentReference",
            "id": "doc-1",
            "extension": [{
                "url": fhirsync_core::PENDING_FILE_EXTENSION_URL,
                "valueString": "scan.bin"
            }]
        }))
        .await
        .unwrap();
    h.files.put("scan.bin", b"raw");

    let pending = h.reconciler.pending_uploads().await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].content_type, "application/octet-stream");

    assert!(h.reconciler.reconcile_pending_uploads().await);
}

#[tokio::test]
async fn custom_extension_url_is_honoured() {
    let store = InMemoryResourceStore::new();
    store
        .create(&json!({
            "resourceType": "DocumentReference",
            "id": "doc-1",
            "extension": [{"url": "http://example.org/local-file", "valueUri": "a.jpg"}]
        }))
        .await
        .unwrap();
    store
        .create(&common::pending_document("doc-2", "b.jpg"))
        .await
        .unwrap();

    let reconciler = DocumentUploadReconciler::new(
        Arc::new(store),
        Arc::new(ScriptedRemote::default()),
        Arc::new(ScriptedFiles::default()),
        ReconcilerConfig {
            pending_file_extension_url: "http://example.org/local-file".into(),
            ..ReconcilerConfig::default()
        },
    );

    let ids: Vec<String> = reconciler
        .pending_uploads()
        .await
        .unwrap()
        .into_iter()
        .map(|p| p.document_reference_id)
        .collect();
    assert_eq!(ids, vec!["doc-1"]);
}

struct Collect(Mutex<Vec<String>>);

impl SyncListener for Collect {
    fn on_event(&self, event: &SyncEvent) {
        if let SyncEvent::ItemFinished {
            document_reference_id,
            outcome,
        } = event
        {
            self.0
                .lock()
                .unwrap()
                .push(format!("{document_reference_id}:{}", outcome.label()));
        }
    }
}

#[tokio::test]
async fn item_outcomes_reach_listeners() {
    let store = InMemoryResourceStore::new();
    store
        .create(&common::pending_document("doc-1", "doc-1.jpg"))
        .await
        .unwrap();
    let files = Arc::new(ScriptedFiles::default());
    files.put("doc-1.jpg", b"jpeg");

    let listeners = SyncListenerRegistry::new();
    let collected = Arc::new(Collect(Mutex::new(Vec::new())));
    let _guard = listeners.subscribe(Arc::clone(&collected) as Arc<dyn SyncListener>);

    let reconciler = DocumentUploadReconciler::new(
        Arc::new(store) as Arc<dyn LocalResourceStore>,
        Arc::new(ScriptedRemote::default()),
        files,
        ReconcilerConfig::default(),
    )
    .with_listeners(listeners);

    assert!(reconciler.reconcile_pending_uploads().await);
    assert_eq!(*collected.0.lock().unwrap(), vec!["doc-1:success"]);
}
