//! Image-to-video generation adapter (high-priority backgrounds).
//! A long-running operation like the avatar render, with one extra
//! wrinkle: the finished video comes back either as a storage reference
//! or as inline bytes served from a download path.

use serde::{Deserialize, Serialize};

use crate::artifacts::{VideoArtifact, VideoSource};
use crate::error::{ProviderError, ProviderErrorKind};
use crate::job::{JobHandle, PollStatus, Submission};
use crate::http::{get_bytes, get_json, post_json, HttpProviderConfig};

/// Input for an image-to-video generation.
#[derive(Debug, Clone, Serialize)]
pub struct VideoRequest {
    /// Source still image.
    pub image_url: String,
    pub prompt: String,
    pub duration_secs: u32,
}

#[async_trait::async_trait]
pub trait VideoGenerator: Send + Sync {
    async fn submit(
        &self,
        request: &VideoRequest,
    ) -> Result<Submission<VideoArtifact>, ProviderError>;

    async fn poll(
        &self,
        handle: &JobHandle,
    ) -> Result<PollStatus<VideoArtifact>, ProviderError>;
}

// ---------------------------------------------------------------------------
// HTTP implementation
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    operation_id: String,
}

#[derive(Debug, Deserialize)]
struct OperationResponse {
    done: bool,
    /// Storage reference, when the provider uploaded the result itself.
    video_url: Option<String>,
    /// Download path on the provider, when the bytes must be fetched.
    video_path: Option<String>,
    error: Option<String>,
}

pub struct HttpVideoGenerator {
    client: reqwest::Client,
    config: HttpProviderConfig,
}

impl HttpVideoGenerator {
    pub fn new(config: HttpProviderConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    pub fn from_env() -> Result<Self, ProviderError> {
        Ok(Self::new(HttpProviderConfig::from_env("VIDEO_PROVIDER")?))
    }
}

#[async_trait::async_trait]
impl VideoGenerator for HttpVideoGenerator {
    async fn submit(
        &self,
        request: &VideoRequest,
    ) -> Result<Submission<VideoArtifact>, ProviderError> {
        let response: SubmitResponse =
            post_json(&self.client, &self.config, "/v1/operations", request).await?;
        tracing::debug!(operation_id = %response.operation_id, "video generation submitted");
        Ok(Submission::Accepted(JobHandle::new(response.operation_id)))
    }

    async fn poll(
        &self,
        handle: &JobHandle,
    ) -> Result<PollStatus<VideoArtifact>, ProviderError> {
        let path = format!("/v1/operations/{}", handle.external_id);
        let response: OperationResponse =
            match get_json(&self.client, &self.config, &path).await {
                Ok(r) => r,
                // Operations have an eventual-consistency window after
                // submission during which lookups 404.
                Err(e) if e.kind == ProviderErrorKind::NotFound => {
                    return Ok(PollStatus::Pending)
                }
                Err(e) => return Err(e),
            };

        if !response.done {
            return Ok(PollStatus::Pending);
        }
        if let Some(error) = response.error {
            return Ok(PollStatus::Failed(error));
        }

        // Resolve the result-shape union exactly once.
        let source = if let Some(url) = response.video_url {
            VideoSource::Url { url }
        } else if let Some(download) = response.video_path {
            let bytes = get_bytes(&self.client, &self.config, &download).await?;
            VideoSource::Inline { bytes }
        } else {
            return Ok(PollStatus::Failed(
                "operation done without a video reference".to_string(),
            ));
        };

        Ok(PollStatus::Completed(VideoArtifact {
            source,
            content_type: "video/mp4".to_string(),
        }))
    }
}
