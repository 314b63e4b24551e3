//! Artifact types returned by provider adapters.

use serde::{Deserialize, Serialize};

/// Synthesized speech for one scene.
#[derive(Debug, Clone)]
pub struct AudioArtifact {
    pub bytes: Vec<u8>,
    pub content_type: String,
    pub duration_secs: f64,
}

/// A generated image (background or avatar portrait).
#[derive(Debug, Clone)]
pub struct ImageArtifact {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// Where a finished video lives. Providers differ: some hand back the
/// bytes, some a storage reference. The union is resolved once here so
/// call sites never inspect raw responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum VideoSource {
    Inline { bytes: Vec<u8> },
    Url { url: String },
}

/// A finished video artifact.
#[derive(Debug, Clone)]
pub struct VideoArtifact {
    pub source: VideoSource,
    pub content_type: String,
}
