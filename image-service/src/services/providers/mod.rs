//! Image provider abstractions and implementations.
//!
//! This module provides a trait-based abstraction for generative image
//! providers, allowing easy swapping between backends (OpenAI, mock).

pub mod mock;
pub mod openai;

use async_trait::async_trait;
use thiserror::Error;

/// Error type for provider operations.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Rate limited")]
    RateLimited,

    #[error("Network error: {0}")]
    NetworkError(String),
}

/// A generated image, as returned by a provider: either an address the
/// bytes can be fetched from, or the bytes themselves.
#[derive(Debug, Clone)]
pub enum ImageReference {
    Url(String),
    Bytes(Vec<u8>),
}

/// Trait for image generation providers.
#[async_trait]
pub trait ImageProvider: Send + Sync {
    /// Generate a single image for the prompt with the given model.
    async fn generate(&self, prompt: &str, model: &str)
        -> Result<ImageReference, ProviderError>;

    /// Health check.
    async fn health_check(&self) -> Result<(), ProviderError>;
}
