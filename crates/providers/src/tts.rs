//! Text-to-speech adapter. Synthesis completes within one call.

use serde::{Deserialize, Serialize};

use crate::artifacts::AudioArtifact;
use crate::error::ProviderError;
use crate::http::{get_bytes, post_json, HttpProviderConfig};

/// Input for speech synthesis.
#[derive(Debug, Clone, Serialize)]
pub struct TtsRequest {
    pub script: String,
    pub voice: Option<String>,
}

#[async_trait::async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, request: &TtsRequest) -> Result<AudioArtifact, ProviderError>;
}

#[derive(Debug, Deserialize)]
struct SynthesizeResponse {
    audio_path: String,
    content_type: String,
    duration_secs: f64,
}

/// TTS backed by an HTTP provider. The synthesis call returns a download
/// path; the audio bytes are fetched in the same invocation.
pub struct HttpSpeechSynthesizer {
    client: reqwest::Client,
    config: HttpProviderConfig,
}

impl HttpSpeechSynthesizer {
    pub fn new(config: HttpProviderConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    pub fn from_env() -> Result<Self, ProviderError> {
        Ok(Self::new(HttpProviderConfig::from_env("TTS_PROVIDER")?))
    }
}

#[async_trait::async_trait]
impl SpeechSynthesizer for HttpSpeechSynthesizer {
    async fn synthesize(&self, request: &TtsRequest) -> Result<AudioArtifact, ProviderError> {
        let response: SynthesizeResponse =
            post_json(&self.client, &self.config, "/v1/speech", request).await?;

        let bytes = get_bytes(&self.client, &self.config, &response.audio_path).await?;
        tracing::debug!(
            bytes = bytes.len(),
            duration_secs = response.duration_secs,
            "speech synthesized"
        );

        Ok(AudioArtifact {
            bytes,
            content_type: response.content_type,
            duration_secs: response.duration_secs,
        })
    }
}
