pub mod generation;
pub mod metadata;
pub mod providers;
pub mod storage;

pub use generation::{GenerationError, GenerationOrchestrator};
pub use metadata::{MemoryMetadataStore, MetadataError, MetadataStore, MongoMetadataStore};
pub use storage::{ArtifactStorage, LocalStorage, S3Storage, StorageError};
