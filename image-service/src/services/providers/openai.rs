//! OpenAI image provider implementation.
//!
//! Implements image generation against the OpenAI images API. The API is
//! asked for a URL response; some models only return inline base64 payloads,
//! so both shapes are handled.

use super::{ImageProvider, ImageReference, ProviderError};
use async_trait::async_trait;
use base64::Engine as _;
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// OpenAI provider configuration.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub api_base: String,
    /// Requested image dimensions, e.g. "1024x1024".
    pub image_size: String,
}

/// OpenAI image provider.
pub struct OpenAiImageProvider {
    config: OpenAiConfig,
    client: Client,
}

impl OpenAiImageProvider {
    pub fn new(config: OpenAiConfig) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .expect("Failed to create HTTP client");

        Self { config, client }
    }

    fn api_url(&self) -> String {
        format!(
            "{}/images/generations",
            self.config.api_base.trim_end_matches('/')
        )
    }
}

#[async_trait]
impl ImageProvider for OpenAiImageProvider {
    async fn generate(
        &self,
        prompt: &str,
        model: &str,
    ) -> Result<ImageReference, ProviderError> {
        let request = GenerateImageRequest {
            model: model.to_string(),
            prompt: prompt.to_string(),
            n: 1,
            size: self.config.image_size.clone(),
            response_format: "url".to_string(),
        };

        let url = self.api_url();

        tracing::debug!(
            model = %model,
            prompt_len = prompt.len(),
            "Sending request to OpenAI images API"
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| ProviderError::NetworkError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();

            if status.as_u16() == 429 {
                return Err(ProviderError::RateLimited);
            }
            if status.as_u16() == 400 {
                return Err(ProviderError::InvalidRequest(error_text));
            }

            return Err(ProviderError::ApiError(format!(
                "OpenAI API error {}: {}",
                status, error_text
            )));
        }

        let api_response: GenerateImageResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::ApiError(format!("Failed to parse response: {}", e)))?;

        let image = api_response
            .data
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::ApiError("Response contained no image".to_string()))?;

        if let Some(url) = image.url {
            return Ok(ImageReference::Url(url));
        }

        if let Some(b64) = image.b64_json {
            let bytes = base64::engine::general_purpose::STANDARD
                .decode(b64)
                .map_err(|e| {
                    ProviderError::ApiError(format!("Failed to decode image payload: {}", e))
                })?;
            return Ok(ImageReference::Bytes(bytes));
        }

        Err(ProviderError::ApiError(
            "Response contained neither url nor b64_json".to_string(),
        ))
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        if self.config.api_key.is_empty() {
            return Err(ProviderError::NotConfigured(
                "OpenAI API key not set".to_string(),
            ));
        }
        Ok(())
    }
}

// API types

#[derive(Debug, Serialize)]
struct GenerateImageRequest {
    model: String,
    prompt: String,
    n: u8,
    size: String,
    response_format: String,
}

#[derive(Debug, Deserialize)]
struct GenerateImageResponse {
    data: Vec<GeneratedImage>,
}

#[derive(Debug, Deserialize)]
struct GeneratedImage {
    url: Option<String>,
    b64_json: Option<String>,
}
