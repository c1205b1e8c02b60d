//! The generation pipeline: prompt -> provider -> artifact storage ->
//! metadata record.
//!
//! Steps run strictly in sequence; each step's failure classification
//! records whether durable state was left behind. The only state this
//! pipeline can leak is a storage object without a metadata row (provider
//! and fetch failures happen before any durable write, and the metadata
//! row is written last). That orphan is not compensated here -- a
//! compensating delete can itself fail -- it is swept up by the
//! reconciliation job.

use crate::models::ImageRecord;
use crate::services::metadata::{MetadataError, MetadataStore};
use crate::services::providers::{ImageProvider, ImageReference};
use crate::services::storage::{ArtifactStorage, StorageError};
use service_core::error::AppError;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GenerationError {
    /// Provider call or artifact fetch failed. No durable state changed;
    /// the whole request is safe to retry.
    #[error("Image generation failed: {0}")]
    GenerationFailed(String),

    /// Object write failed before any metadata write. No durable state
    /// changed.
    #[error("Artifact write failed: {0}")]
    StorageWriteFailed(#[source] StorageError),

    /// Object write succeeded, metadata write failed. A storage object now
    /// exists with no record; the reconciliation job removes it.
    #[error("Metadata write failed: {0}")]
    MetadataWriteFailed(#[source] MetadataError),
}

impl From<GenerationError> for AppError {
    fn from(err: GenerationError) -> Self {
        match err {
            GenerationError::GenerationFailed(msg) => AppError::BadGateway(msg),
            other => AppError::InternalError(anyhow::Error::new(other)),
        }
    }
}

pub struct GenerationOrchestrator {
    provider: Arc<dyn ImageProvider>,
    storage: Arc<dyn ArtifactStorage>,
    metadata: Arc<dyn MetadataStore>,
    fetch_client: reqwest::Client,
    public_domain: String,
}

impl GenerationOrchestrator {
    pub fn new(
        provider: Arc<dyn ImageProvider>,
        storage: Arc<dyn ArtifactStorage>,
        metadata: Arc<dyn MetadataStore>,
        public_domain: String,
    ) -> Self {
        let fetch_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            provider,
            storage,
            metadata,
            fetch_client,
            public_domain,
        }
    }

    /// Run the full pipeline for one request and return the record exactly
    /// as the metadata store persisted it.
    pub async fn generate(
        &self,
        prompt: &str,
        model: &str,
    ) -> Result<ImageRecord, GenerationError> {
        // 1. Ask the provider for an image. Fail fast before any durable
        //    writes.
        let reference = self.provider.generate(prompt, model).await.map_err(|e| {
            tracing::error!(model = %model, error = %e, "Provider call failed");
            GenerationError::GenerationFailed(e.to_string())
        })?;

        // 2. Resolve the reference to bytes. Still no durable writes.
        let bytes = match reference {
            ImageReference::Bytes(bytes) => bytes,
            ImageReference::Url(url) => self.fetch_artifact(&url).await?,
        };

        // 3. Fresh id, derived key and url.
        let record = ImageRecord::new(&self.public_domain, prompt.to_string(), model.to_string());

        tracing::info!(
            image_id = %record.id,
            model = %model,
            size = bytes.len(),
            "Persisting generated artifact"
        );

        // 4. Write the artifact. On failure nothing durable exists yet.
        self.storage
            .put(&record.storage_key, bytes, "image/png")
            .await
            .map_err(|e| {
                tracing::error!(
                    image_id = %record.id,
                    storage_key = %record.storage_key,
                    error = %e,
                    "Artifact write failed"
                );
                GenerationError::StorageWriteFailed(e)
            })?;

        // 5. Insert the record. A failure here leaves the object orphaned
        //    for the reconciliation sweep.
        let persisted = self.metadata.insert(&record).await.map_err(|e| {
            tracing::error!(
                image_id = %record.id,
                error = %e,
                "Metadata insert failed, artifact left for reconciliation"
            );
            GenerationError::MetadataWriteFailed(e)
        })?;

        tracing::info!(image_id = %persisted.id, url = %persisted.url, "Generation completed");
        Ok(persisted)
    }

    async fn fetch_artifact(&self, url: &str) -> Result<Vec<u8>, GenerationError> {
        let response = self.fetch_client.get(url).send().await.map_err(|e| {
            tracing::error!(error = %e, "Artifact fetch failed");
            GenerationError::GenerationFailed(format!("artifact fetch failed: {}", e))
        })?;

        if !response.status().is_success() {
            return Err(GenerationError::GenerationFailed(format!(
                "artifact fetch returned {}",
                response.status()
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| GenerationError::GenerationFailed(e.to_string()))?;

        Ok(bytes.to_vec())
    }
}
