//! Image generation adapter (backgrounds and avatar portraits).
//! Generation completes within one call.

use serde::{Deserialize, Serialize};

use crate::artifacts::ImageArtifact;
use crate::error::ProviderError;
use crate::http::{get_bytes, post_json, HttpProviderConfig};

/// Input for image generation.
#[derive(Debug, Clone, Serialize)]
pub struct ImageRequest {
    pub prompt: String,
    /// Provider model identifier; `None` uses the provider default.
    pub model: Option<String>,
}

#[async_trait::async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate(&self, request: &ImageRequest) -> Result<ImageArtifact, ProviderError>;
}

#[derive(Debug, Deserialize)]
struct ImageResponse {
    image_path: String,
    content_type: String,
}

pub struct HttpImageGenerator {
    client: reqwest::Client,
    config: HttpProviderConfig,
}

impl HttpImageGenerator {
    pub fn new(config: HttpProviderConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    pub fn from_env() -> Result<Self, ProviderError> {
        Ok(Self::new(HttpProviderConfig::from_env("IMAGE_PROVIDER")?))
    }
}

#[async_trait::async_trait]
impl ImageGenerator for HttpImageGenerator {
    async fn generate(&self, request: &ImageRequest) -> Result<ImageArtifact, ProviderError> {
        let response: ImageResponse =
            post_json(&self.client, &self.config, "/v1/images", request).await?;

        let bytes = get_bytes(&self.client, &self.config, &response.image_path).await?;
        Ok(ImageArtifact {
            bytes,
            content_type: response.content_type,
        })
    }
}
