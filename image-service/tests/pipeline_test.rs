mod common;

use common::{FailingProvider, RecordingMetadata, RecordingStorage, UrlProvider};
use image_service::services::providers::mock::MockImageProvider;
use image_service::services::storage::{ArtifactStorage, LocalStorage};
use image_service::services::{GenerationError, GenerationOrchestrator, MetadataStore};
use image_service::workers::{ReconciliationJob, ReconciliationReport, RetentionPolicy};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

struct Pipeline {
    orchestrator: GenerationOrchestrator,
    storage: Arc<RecordingStorage>,
    metadata: Arc<RecordingMetadata>,
    _dir: tempfile::TempDir,
}

async fn pipeline_with(provider: Arc<dyn image_service::services::providers::ImageProvider>) -> Pipeline {
    let dir = tempfile::tempdir().unwrap();
    let local = Arc::new(LocalStorage::new(dir.path()).await.unwrap());
    let storage = Arc::new(RecordingStorage::new(local));
    let metadata = Arc::new(RecordingMetadata::new());

    let orchestrator = GenerationOrchestrator::new(
        provider,
        Arc::clone(&storage) as Arc<dyn ArtifactStorage>,
        Arc::clone(&metadata) as Arc<dyn MetadataStore>,
        "https://store.example".to_string(),
    );

    Pipeline {
        orchestrator,
        storage,
        metadata,
        _dir: dir,
    }
}

#[tokio::test]
async fn successful_generation_persists_artifact_and_record() {
    let pipeline = pipeline_with(Arc::new(MockImageProvider::new(true))).await;

    let record = pipeline
        .orchestrator
        .generate("a red bicycle", "gen-1")
        .await
        .expect("generation should succeed");

    assert_eq!(record.prompt, "a red bicycle");
    assert_eq!(record.model, "gen-1");
    assert_eq!(record.storage_key, format!("{}.png", record.id));
    assert_eq!(
        record.url,
        format!("https://store.example/{}.png", record.id)
    );

    // The storage object derived from the id actually exists.
    let objects = pipeline.storage.list().await.unwrap();
    assert_eq!(objects.len(), 1);
    assert_eq!(objects[0].key, record.storage_key);

    // And so does the metadata row.
    let records = pipeline.metadata.list().await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].id, record.id);
}

#[tokio::test]
async fn provider_failure_has_no_side_effects() {
    let pipeline = pipeline_with(Arc::new(FailingProvider)).await;

    let err = pipeline
        .orchestrator
        .generate("a red bicycle", "gen-1")
        .await
        .expect_err("generation should fail");

    assert!(matches!(err, GenerationError::GenerationFailed(_)));
    assert_eq!(pipeline.storage.put_calls.load(Ordering::SeqCst), 0);
    assert_eq!(pipeline.metadata.insert_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn fetch_failure_has_no_side_effects() {
    // Nothing listens on port 1; the fetch fails fast.
    let provider = UrlProvider {
        url: "http://127.0.0.1:1/image.png".to_string(),
    };
    let pipeline = pipeline_with(Arc::new(provider)).await;

    let err = pipeline
        .orchestrator
        .generate("a red bicycle", "gen-1")
        .await
        .expect_err("generation should fail");

    assert!(matches!(err, GenerationError::GenerationFailed(_)));
    assert_eq!(pipeline.storage.put_calls.load(Ordering::SeqCst), 0);
    assert_eq!(pipeline.metadata.insert_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn storage_failure_skips_metadata_insert() {
    let pipeline = pipeline_with(Arc::new(MockImageProvider::new(true))).await;
    pipeline.storage.fail_puts.store(true, Ordering::SeqCst);

    let err = pipeline
        .orchestrator
        .generate("a red bicycle", "gen-1")
        .await
        .expect_err("generation should fail");

    assert!(matches!(err, GenerationError::StorageWriteFailed(_)));
    assert_eq!(pipeline.metadata.insert_calls.load(Ordering::SeqCst), 0);
    assert!(pipeline.storage.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn metadata_failure_leaves_orphan_that_reconciliation_clears() {
    let pipeline = pipeline_with(Arc::new(MockImageProvider::new(true))).await;
    pipeline.metadata.fail_insert.store(true, Ordering::SeqCst);

    let err = pipeline
        .orchestrator
        .generate("a red bicycle", "gen-1")
        .await
        .expect_err("generation should fail");

    assert!(matches!(err, GenerationError::MetadataWriteFailed(_)));

    // The artifact was written but no record exists: an orphan.
    assert_eq!(pipeline.storage.list().await.unwrap().len(), 1);
    assert!(pipeline.metadata.list().await.unwrap().is_empty());

    // A sweep with no grace period reclaims it without touching metadata.
    let job = ReconciliationJob::new(
        Arc::clone(&pipeline.storage) as Arc<dyn ArtifactStorage>,
        Arc::clone(&pipeline.metadata) as Arc<dyn MetadataStore>,
        RetentionPolicy::All,
        4,
        Duration::from_secs(0),
    );
    let report: ReconciliationReport = job.run().await;

    assert_eq!(report.orphan_objects_reclaimed, 1);
    assert_eq!(report.records_deleted, 0);
    assert!(report.errors.is_empty());
    assert!(pipeline.storage.list().await.unwrap().is_empty());
    assert_eq!(pipeline.metadata.delete_calls.load(Ordering::SeqCst), 0);
}
