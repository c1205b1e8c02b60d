//! In-memory metadata store for tests and backend-less development.

use super::{MetadataError, MetadataStore};
use crate::models::ImageRecord;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Clone, Default)]
pub struct MemoryMetadataStore {
    records: Arc<RwLock<BTreeMap<String, ImageRecord>>>,
}

impl MemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MetadataStore for MemoryMetadataStore {
    async fn insert(&self, record: &ImageRecord) -> Result<ImageRecord, MetadataError> {
        let mut records = self.records.write().await;
        records.insert(record.id.clone(), record.clone());
        // Hand back the stored copy, same contract as the MongoDB read-back.
        Ok(records[&record.id].clone())
    }

    async fn list(&self) -> Result<Vec<ImageRecord>, MetadataError> {
        let records = self.records.read().await;
        let mut all: Vec<ImageRecord> = records.values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(all)
    }

    async fn delete_by_ids(&self, ids: &[String]) -> Result<(), MetadataError> {
        let mut records = self.records.write().await;
        for id in ids {
            records.remove(id);
        }
        Ok(())
    }

    async fn health_check(&self) -> Result<(), MetadataError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn delete_by_ids_skips_missing_ids() {
        let store = MemoryMetadataStore::new();
        let record = ImageRecord::new("https://x", "p".to_string(), "m".to_string());
        store.insert(&record).await.unwrap();

        store
            .delete_by_ids(&[record.id.clone(), "no-such-id".to_string()])
            .await
            .unwrap();
        store.delete_by_ids(&[record.id.clone()]).await.unwrap();

        assert!(store.list().await.unwrap().is_empty());
    }
}
