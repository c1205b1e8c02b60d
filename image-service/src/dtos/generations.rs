use crate::models::ImageRecord;
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct GenerateRequest {
    #[validate(length(min = 1, message = "prompt must not be empty"))]
    pub prompt: String,
    #[validate(length(min = 1, message = "model must not be empty"))]
    pub model: String,
}

/// Public representation of a persisted image record. Storage internals
/// (key, timestamps) stay internal.
#[derive(Debug, Serialize)]
pub struct ImageResponse {
    pub id: String,
    pub url: String,
    pub prompt: String,
    pub model: String,
}

impl From<ImageRecord> for ImageResponse {
    fn from(record: ImageRecord) -> Self {
        Self {
            id: record.id,
            url: record.url,
            prompt: record.prompt,
            model: record.model,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ImageListResponse {
    pub images: Vec<ImageResponse>,
    pub total: usize,
}
