//! External provider adapters.
//!
//! One module per capability: script generation, speech synthesis,
//! avatar rendering, image generation, image-to-video generation. All
//! adapters share the [`Submission`]/[`PollStatus`] job contract and the
//! [`ProviderError`] taxonomy; provider-specific response shapes are
//! decoded exactly once, inside the adapter.

pub mod artifacts;
pub mod avatar;
pub mod error;
pub mod http;
pub mod image;
pub mod job;
pub mod script;
pub mod tts;
pub mod video;

pub use artifacts::{AudioArtifact, ImageArtifact, VideoArtifact, VideoSource};
pub use avatar::{AvatarRenderer, AvatarRequest, HttpAvatarRenderer};
pub use error::{ProviderError, ProviderErrorKind};
pub use http::HttpProviderConfig;
pub use image::{HttpImageGenerator, ImageGenerator, ImageRequest};
pub use job::{JobHandle, PollStatus, Submission};
pub use script::{
    finalize_scripts, HttpScriptGenerator, SceneScript, ScriptGenerator, ScriptRequest,
};
pub use tts::{HttpSpeechSynthesizer, SpeechSynthesizer, TtsRequest};
pub use video::{HttpVideoGenerator, VideoGenerator, VideoRequest};
