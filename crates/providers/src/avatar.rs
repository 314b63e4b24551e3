//! Avatar render adapter. Rendering a talking-head video is a
//! long-running operation: `submit` returns a handle, `poll` checks it.

use serde::{Deserialize, Serialize};

use crate::artifacts::{VideoArtifact, VideoSource};
use crate::error::{ProviderError, ProviderErrorKind};
use crate::job::{JobHandle, PollStatus, Submission};
use crate::http::{get_json, post_json, HttpProviderConfig};

/// Input for an avatar render.
#[derive(Debug, Clone, Serialize)]
pub struct AvatarRequest {
    /// Public URL of the scene's narration audio.
    pub audio_url: String,
    /// Portrait image the avatar is rendered from; the preset portrait
    /// when the project has no completed custom design.
    pub portrait_url: String,
}

#[async_trait::async_trait]
pub trait AvatarRenderer: Send + Sync {
    async fn submit(
        &self,
        request: &AvatarRequest,
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
    id: String,
}

/// Raw poll response, decoded once into [`PollStatus`].
#[derive(Debug, Deserialize)]
struct StatusResponse {
    status: String,
    result_url: Option<String>,
    error: Option<String>,
}

pub struct HttpAvatarRenderer {
    client: reqwest::Client,
    config: HttpProviderConfig,
}

impl HttpAvatarRenderer {
    pub fn new(config: HttpProviderConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    pub fn from_env() -> Result<Self, ProviderError> {
        Ok(Self::new(HttpProviderConfig::from_env("AVATAR_PROVIDER")?))
    }
}

#[async_trait::async_trait]
impl AvatarRenderer for HttpAvatarRenderer {
    async fn submit(
        &self,
        request: &AvatarRequest,
    ) -> Result<Submission<VideoArtifact>, ProviderError> {
        let response: SubmitResponse =
            post_json(&self.client, &self.config, "/v2/renders", request).await?;
        tracing::debug!(external_id = %response.id, "avatar render submitted");
        Ok(Submission::Accepted(JobHandle::new(response.id)))
    }

    async fn poll(
        &self,
        handle: &JobHandle,
    ) -> Result<PollStatus<VideoArtifact>, ProviderError> {
        let path = format!("/v2/renders/{}", handle.external_id);
        let response: StatusResponse = match get_json(&self.client, &self.config, &path).await
        {
            Ok(r) => r,
            // A just-submitted job may not be visible yet.
            Err(e) if e.kind == ProviderErrorKind::NotFound => {
                return Ok(PollStatus::Pending)
            }
            Err(e) => return Err(e),
        };

        Ok(match response.status.as_str() {
            "pending" | "processing" => PollStatus::Pending,
            "done" => match response.result_url {
                Some(url) => PollStatus::Completed(VideoArtifact {
                    source: VideoSource::Url { url },
                    content_type: "video/mp4".to_string(),
                }),
                None => PollStatus::Failed(
                    "render reported done without a result URL".to_string(),
                ),
            },
            "error" | "rejected" => PollStatus::Failed(
                response
                    .error
                    .unwrap_or_else(|| format!("render {}", response.status)),
            ),
            other => {
                return Err(ProviderError::permanent(format!(
                    "unknown render status '{other}'"
                )))
            }
        })
    }
}
