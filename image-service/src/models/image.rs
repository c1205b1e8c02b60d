use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Derive the storage key for a record id. Every record owns exactly one
/// storage object, addressed by this key.
pub fn storage_key_for(id: &str) -> String {
    format!("{}.png", id)
}

/// A generated image artifact: one metadata row bound to one storage object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageRecord {
    #[serde(rename = "_id")]
    pub id: String,
    pub storage_key: String,
    pub url: String,
    pub prompt: String,
    pub model: String,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl ImageRecord {
    /// Create a fresh record. The id is generated here, once, and never
    /// reused; storage key and public url are derived from it.
    pub fn new(public_domain: &str, prompt: String, model: String) -> Self {
        let id = Uuid::new_v4().to_string();
        let storage_key = storage_key_for(&id);
        let url = format!("{}/{}", public_domain.trim_end_matches('/'), storage_key);

        Self {
            id,
            storage_key,
            url,
            prompt,
            model,
            created_at: Utc::now(),
        }
    }
}
