//! MongoDB-backed metadata store.

use super::{MetadataError, MetadataStore};
use crate::models::ImageRecord;
use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::{
    bson::doc,
    options::{ClientOptions, FindOptions, IndexOptions},
    Client as MongoClient, Collection, Database, IndexModel,
};
use std::time::Duration;

#[derive(Clone)]
pub struct MongoMetadataStore {
    client: MongoClient,
    db: Database,
}

impl MongoMetadataStore {
    pub async fn connect(uri: &str, database: &str) -> Result<Self, MetadataError> {
        tracing::info!(uri = %uri, "Connecting to MongoDB");

        let mut options = ClientOptions::parse(uri).await.map_err(|e| {
            tracing::error!("Failed to parse MongoDB URI {}: {}", uri, e);
            MetadataError::Unavailable(e.to_string())
        })?;
        options.server_selection_timeout = Some(Duration::from_secs(5));

        let client = MongoClient::with_options(options)
            .map_err(|e| MetadataError::Unavailable(e.to_string()))?;
        let db = client.database(database);

        tracing::info!(database = %database, "Successfully connected to MongoDB database");
        Ok(Self { client, db })
    }

    pub async fn initialize_indexes(&self) -> Result<(), MetadataError> {
        // Index on created_at for the retention sweep and newest-first
        // listings.
        let created_at_index = IndexModel::builder()
            .keys(doc! { "created_at": -1 })
            .options(
                IndexOptions::builder()
                    .name("created_at_idx".to_string())
                    .build(),
            )
            .build();

        self.images()
            .create_index(created_at_index, None)
            .await
            .map_err(|e| {
                tracing::error!("Failed to create created_at index: {}", e);
                MetadataError::Unavailable(e.to_string())
            })?;

        Ok(())
    }

    pub fn client(&self) -> &MongoClient {
        &self.client
    }

    fn images(&self) -> Collection<ImageRecord> {
        self.db.collection("images")
    }
}

#[async_trait]
impl MetadataStore for MongoMetadataStore {
    async fn insert(&self, record: &ImageRecord) -> Result<ImageRecord, MetadataError> {
        self.images().insert_one(record, None).await.map_err(|e| {
            tracing::error!(image_id = %record.id, "Failed to insert image record: {}", e);
            MetadataError::WriteFailed(e.to_string())
        })?;

        // Read the row back so the caller gets exactly what was persisted.
        self.images()
            .find_one(doc! { "_id": &record.id }, None)
            .await
            .map_err(|e| MetadataError::WriteFailed(e.to_string()))?
            .ok_or_else(|| {
                MetadataError::WriteFailed(format!(
                    "record {} not found after insert",
                    record.id
                ))
            })
    }

    async fn list(&self) -> Result<Vec<ImageRecord>, MetadataError> {
        let find_options = FindOptions::builder()
            .sort(doc! { "created_at": -1 })
            .build();

        let cursor = self
            .images()
            .find(doc! {}, find_options)
            .await
            .map_err(|e| {
                tracing::error!("Failed to query image records: {}", e);
                MetadataError::QueryFailed(e.to_string())
            })?;

        cursor
            .try_collect()
            .await
            .map_err(|e| MetadataError::QueryFailed(e.to_string()))
    }

    async fn delete_by_ids(&self, ids: &[String]) -> Result<(), MetadataError> {
        if ids.is_empty() {
            return Ok(());
        }

        let result = self
            .images()
            .delete_many(doc! { "_id": { "$in": ids.to_vec() } }, None)
            .await
            .map_err(|e| {
                tracing::error!("Failed to delete image records: {}", e);
                MetadataError::DeleteFailed(e.to_string())
            })?;

        tracing::debug!(
            requested = ids.len(),
            deleted = result.deleted_count,
            "Deleted image records"
        );
        Ok(())
    }

    async fn health_check(&self) -> Result<(), MetadataError> {
        self.client
            .database("admin")
            .run_command(doc! { "ping": 1 }, None)
            .await
            .map_err(|e| {
                tracing::error!("MongoDB health check failed: {}", e);
                MetadataError::Unavailable(e.to_string())
            })?;
        Ok(())
    }
}
