use async_trait::async_trait;
use image_service::config::{
    ImageServiceConfig, MetadataBackend, ProviderBackend, StorageBackend,
};
use image_service::models::ImageRecord;
use image_service::services::metadata::{MemoryMetadataStore, MetadataError, MetadataStore};
use image_service::services::providers::{ImageProvider, ImageReference, ProviderError};
use image_service::services::storage::{ArtifactStorage, StorageError, StoredObject};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

pub const TEST_PUBLIC_DOMAIN: &str = "https://store.example";

pub struct TestApp {
    pub address: String,
    pub port: u16,
    pub metadata: Arc<dyn MetadataStore>,
    pub storage_path: String,
}

impl TestApp {
    pub async fn spawn() -> Self {
        let storage_path = format!("target/test-storage-{}", Uuid::new_v4());

        let mut config = ImageServiceConfig::load().expect("Failed to load configuration");
        config.common.port = 0; // Random port for testing
        config.metadata.backend = MetadataBackend::Memory;
        config.storage.backend = StorageBackend::Local;
        config.storage.local_path = storage_path.clone();
        config.storage.public_domain = TEST_PUBLIC_DOMAIN.to_string();
        config.provider.backend = ProviderBackend::Mock;
        config.reconcile.enabled = false;

        let app = image_service::startup::Application::build(config)
            .await
            .expect("Failed to build test application");

        let port = app.port();
        let metadata = Arc::clone(app.metadata());
        let address = format!("http://127.0.0.1:{}", port);

        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        // Wait for the server to be ready by polling the health endpoint.
        let client = reqwest::Client::new();
        let health_url = format!("{}/health", address);
        for _ in 0..50 {
            if client.get(&health_url).send().await.is_ok() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        TestApp {
            address,
            port,
            metadata,
            storage_path,
        }
    }

    /// Cleanup test resources (local artifact storage).
    pub async fn cleanup(&self) {
        let _ = tokio::fs::remove_dir_all(&self.storage_path).await;
    }
}

// Failure-injecting collaborators for pipeline and reconciliation tests.
// They wrap the real local/in-memory backends so the happy path stays real
// while individual operations can be made to fail.

pub struct FailingProvider;

#[async_trait]
impl ImageProvider for FailingProvider {
    async fn generate(
        &self,
        _prompt: &str,
        _model: &str,
    ) -> Result<ImageReference, ProviderError> {
        Err(ProviderError::ApiError("provider unavailable".to_string()))
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        Ok(())
    }
}

/// Provider that hands back a URL reference, for exercising the fetch step.
pub struct UrlProvider {
    pub url: String,
}

#[async_trait]
impl ImageProvider for UrlProvider {
    async fn generate(
        &self,
        _prompt: &str,
        _model: &str,
    ) -> Result<ImageReference, ProviderError> {
        Ok(ImageReference::Url(self.url.clone()))
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        Ok(())
    }
}

pub struct RecordingStorage {
    inner: Arc<dyn ArtifactStorage>,
    pub put_calls: AtomicUsize,
    pub delete_calls: AtomicUsize,
    pub fail_puts: AtomicBool,
    pub fail_list: AtomicBool,
    pub fail_delete_keys: Mutex<HashSet<String>>,
}

impl RecordingStorage {
    pub fn new(inner: Arc<dyn ArtifactStorage>) -> Self {
        Self {
            inner,
            put_calls: AtomicUsize::new(0),
            delete_calls: AtomicUsize::new(0),
            fail_puts: AtomicBool::new(false),
            fail_list: AtomicBool::new(false),
            fail_delete_keys: Mutex::new(HashSet::new()),
        }
    }

    pub fn fail_delete_of(&self, key: &str) {
        self.fail_delete_keys.lock().unwrap().insert(key.to_string());
    }
}

#[async_trait]
impl ArtifactStorage for RecordingStorage {
    async fn put(
        &self,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError> {
        self.put_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(StorageError::WriteFailed("injected put failure".to_string()));
        }
        self.inner.put(key, data, content_type).await
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_delete_keys.lock().unwrap().contains(key) {
            return Err(StorageError::DeleteFailed(
                "injected delete failure".to_string(),
            ));
        }
        self.inner.delete(key).await
    }

    async fn list(&self) -> Result<Vec<StoredObject>, StorageError> {
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(StorageError::ListFailed("injected list failure".to_string()));
        }
        self.inner.list().await
    }
}

pub struct RecordingMetadata {
    inner: MemoryMetadataStore,
    pub insert_calls: AtomicUsize,
    pub delete_calls: AtomicUsize,
    pub fail_insert: AtomicBool,
    pub fail_list: AtomicBool,
    pub fail_delete: AtomicBool,
    pub last_delete_ids: Mutex<Option<Vec<String>>>,
}

impl RecordingMetadata {
    pub fn new() -> Self {
        Self {
            inner: MemoryMetadataStore::new(),
            insert_calls: AtomicUsize::new(0),
            delete_calls: AtomicUsize::new(0),
            fail_insert: AtomicBool::new(false),
            fail_list: AtomicBool::new(false),
            fail_delete: AtomicBool::new(false),
            last_delete_ids: Mutex::new(None),
        }
    }

    /// Seed a record directly, bypassing the counters.
    pub async fn seed(&self, record: &ImageRecord) {
        self.inner.insert(record).await.unwrap();
    }
}

#[async_trait]
impl MetadataStore for RecordingMetadata {
    async fn insert(&self, record: &ImageRecord) -> Result<ImageRecord, MetadataError> {
        self.insert_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_insert.load(Ordering::SeqCst) {
            return Err(MetadataError::WriteFailed(
                "injected insert failure".to_string(),
            ));
        }
        self.inner.insert(record).await
    }

    async fn list(&self) -> Result<Vec<ImageRecord>, MetadataError> {
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(MetadataError::QueryFailed(
                "injected list failure".to_string(),
            ));
        }
        self.inner.list().await
    }

    async fn delete_by_ids(&self, ids: &[String]) -> Result<(), MetadataError> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_delete_ids.lock().unwrap() = Some(ids.to_vec());
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(MetadataError::DeleteFailed(
                "injected delete failure".to_string(),
            ));
        }
        self.inner.delete_by_ids(ids).await
    }

    async fn health_check(&self) -> Result<(), MetadataError> {
        self.inner.health_check().await
    }
}
