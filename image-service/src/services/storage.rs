//! Object storage backends for generated artifacts.
//!
//! Deletes are idempotent on every backend: removing a key that does not
//! exist is success, so reconciliation sweeps can safely retry.

use crate::config::StorageConfig;
use async_trait::async_trait;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use chrono::{DateTime, Utc};
use service_core::error::AppError;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tokio::fs;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Storage write failed: {0}")]
    WriteFailed(String),

    #[error("Storage delete failed: {0}")]
    DeleteFailed(String),

    #[error("Storage list failed: {0}")]
    ListFailed(String),
}

/// A live object in the storage backend.
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub key: String,
    pub last_modified: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait ArtifactStorage: Send + Sync {
    /// Durably write a blob under `key`.
    async fn put(&self, key: &str, data: Vec<u8>, content_type: &str)
        -> Result<(), StorageError>;

    /// Delete the blob under `key`. Absence of the key is success.
    async fn delete(&self, key: &str) -> Result<(), StorageError>;

    /// List all live objects.
    async fn list(&self) -> Result<Vec<StoredObject>, StorageError>;
}

pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    pub async fn new(base_path: impl Into<PathBuf>) -> Result<Self, AppError> {
        let base_path = base_path.into();
        if !base_path.exists() {
            fs::create_dir_all(&base_path).await?;
        }
        Ok(Self { base_path })
    }
}

#[async_trait]
impl ArtifactStorage for LocalStorage {
    async fn put(
        &self,
        key: &str,
        data: Vec<u8>,
        _content_type: &str,
    ) -> Result<(), StorageError> {
        let path = self.base_path.join(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::WriteFailed(e.to_string()))?;
        }
        fs::write(path, data)
            .await
            .map_err(|e| StorageError::WriteFailed(e.to_string()))?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let path = self.base_path.join(key);
        if path.exists() {
            fs::remove_file(path)
                .await
                .map_err(|e| StorageError::DeleteFailed(e.to_string()))?;
        }
        Ok(())
    }

    async fn list(&self) -> Result<Vec<StoredObject>, StorageError> {
        let mut entries = fs::read_dir(&self.base_path)
            .await
            .map_err(|e| StorageError::ListFailed(e.to_string()))?;

        let mut objects = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StorageError::ListFailed(e.to_string()))?
        {
            let metadata = entry
                .metadata()
                .await
                .map_err(|e| StorageError::ListFailed(e.to_string()))?;
            if !metadata.is_file() {
                continue;
            }

            let key = entry.file_name().to_string_lossy().to_string();
            let last_modified = metadata.modified().ok().map(DateTime::<Utc>::from);
            objects.push(StoredObject { key, last_modified });
        }

        Ok(objects)
    }
}

pub struct S3Storage {
    client: S3Client,
    bucket: String,
}

impl S3Storage {
    pub fn new(client: S3Client, bucket: String) -> Self {
        Self { client, bucket }
    }
}

/// Build an S3 client from service configuration. Works against AWS and any
/// S3-compatible endpoint (Cloudflare R2, MinIO) via `S3_ENDPOINT`.
pub fn build_s3_client(config: &StorageConfig) -> Result<S3Client, AppError> {
    let bucket_missing = || {
        AppError::ConfigError(anyhow::anyhow!(
            "S3 storage backend selected but S3 settings are incomplete"
        ))
    };

    let access_key_id = config.s3_access_key_id.clone().ok_or_else(bucket_missing)?;
    let secret_access_key = config
        .s3_secret_access_key
        .clone()
        .ok_or_else(bucket_missing)?;
    let region = config.s3_region.clone().unwrap_or_else(|| "auto".to_string());

    let credentials = Credentials::new(
        access_key_id,
        secret_access_key,
        None,
        None,
        "image-service",
    );

    let timeouts = aws_sdk_s3::config::timeout::TimeoutConfig::builder()
        .operation_timeout(Duration::from_secs(30))
        .build();

    let mut builder = aws_sdk_s3::Config::builder()
        .behavior_version(BehaviorVersion::latest())
        .region(Region::new(region))
        .credentials_provider(credentials)
        .timeout_config(timeouts)
        .force_path_style(true);

    if let Some(endpoint) = &config.s3_endpoint {
        builder = builder.endpoint_url(endpoint.clone());
    }

    Ok(S3Client::from_conf(builder.build()))
}

#[async_trait]
impl ArtifactStorage for S3Storage {
    async fn put(
        &self,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| StorageError::WriteFailed(format!("S3 upload failed: {}", e)))?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        // S3 DeleteObject is a no-op success for missing keys, which is
        // exactly the idempotence the sweep relies on.
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StorageError::DeleteFailed(format!("S3 delete failed: {}", e)))?;
        Ok(())
    }

    async fn list(&self) -> Result<Vec<StoredObject>, StorageError> {
        let mut pages = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .into_paginator()
            .send();

        let mut objects = Vec::new();
        while let Some(page) = pages.next().await {
            let page =
                page.map_err(|e| StorageError::ListFailed(format!("S3 list failed: {}", e)))?;
            for object in page.contents() {
                let Some(key) = object.key() else { continue };
                let last_modified = object
                    .last_modified()
                    .and_then(|t| DateTime::from_timestamp(t.secs(), t.subsec_nanos()));
                objects.push(StoredObject {
                    key: key.to_string(),
                    last_modified,
                });
            }
        }

        Ok(objects)
    }
}
