//! Shared dependencies handed to every pipeline workflow.

use std::sync::Arc;

use docureel_providers::{
    AvatarRenderer, ImageGenerator, ScriptGenerator, SpeechSynthesizer, VideoGenerator,
};
use docureel_storage::BlobStore;

use crate::config::PipelineConfig;
use crate::store::Store;

/// One bundle, constructed at bootstrap and threaded through explicit
/// constructors. Workflows hold an `Arc<PipelineDeps>`.
pub struct PipelineDeps {
    pub store: Arc<dyn Store>,
    pub blobs: Arc<dyn BlobStore>,
    pub scripts: Arc<dyn ScriptGenerator>,
    pub tts: Arc<dyn SpeechSynthesizer>,
    pub avatars: Arc<dyn AvatarRenderer>,
    pub images: Arc<dyn ImageGenerator>,
    pub videos: Arc<dyn VideoGenerator>,
    pub config: PipelineConfig,
}
