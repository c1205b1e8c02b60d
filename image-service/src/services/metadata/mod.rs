//! Metadata store abstractions and implementations.
//!
//! One record per generated artifact, keyed by id. The MongoDB backend is
//! the production store; the in-memory backend exists for tests and
//! backend-less development, mirroring the local/S3 split on the storage
//! side.

pub mod memory;
pub mod mongo;

pub use memory::MemoryMetadataStore;
pub use mongo::MongoMetadataStore;

use crate::models::ImageRecord;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("Metadata backend unavailable: {0}")]
    Unavailable(String),

    #[error("Metadata write failed: {0}")]
    WriteFailed(String),

    #[error("Metadata query failed: {0}")]
    QueryFailed(String),

    #[error("Metadata delete failed: {0}")]
    DeleteFailed(String),
}

#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Insert a record and return it as persisted by the backend, so the
    /// caller observes the source of truth rather than its own copy.
    async fn insert(&self, record: &ImageRecord) -> Result<ImageRecord, MetadataError>;

    /// List all records, newest first.
    async fn list(&self) -> Result<Vec<ImageRecord>, MetadataError>;

    /// Delete every record whose id is in `ids`, in one call. Ids with no
    /// matching record are skipped, not errors.
    async fn delete_by_ids(&self, ids: &[String]) -> Result<(), MetadataError>;

    /// Health check.
    async fn health_check(&self) -> Result<(), MetadataError>;
}
