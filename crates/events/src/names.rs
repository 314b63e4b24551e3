//! Canonical event names consumed and produced by the pipeline.
//!
//! Payload is always `{project_id, scene_id?, ...}`; the envelope carries
//! the correlation ids explicitly so waiters can match without inspecting
//! the payload.

/// Document ingested; generate the project script.
pub const SCRIPT_GENERATION_REQUESTED: &str = "script.generation.requested";

/// Start (or continue, for the next scene) per-scene processing.
pub const SCENE_PROCESS_REQUESTED: &str = "scene.process.requested";

pub const TTS_REQUESTED: &str = "tts.requested";
pub const TTS_COMPLETED: &str = "tts.completed";

pub const AVATAR_REQUESTED: &str = "avatar.requested";
pub const AVATAR_COMPLETED: &str = "avatar.completed";

pub const BACKGROUND_REQUESTED: &str = "background.requested";
pub const BACKGROUND_COMPLETED: &str = "background.completed";

/// Self-chaining poll tick for a talking-avatar render.
pub const AVATAR_POLLING_REQUESTED: &str = "avatar.polling.requested";

/// Self-chaining poll tick for a background video render.
pub const VIDEO_POLLING_REQUESTED: &str = "video.polling.requested";

pub const AVATAR_DESIGN_GENERATION_REQUESTED: &str = "avatar-design.generation.requested";
pub const AVATAR_DESIGN_COMPLETED: &str = "avatar-design.completed";

/// All scenes done; gate and hand off to composition.
pub const VIDEO_COMPOSE_REQUESTED: &str = "video.compose.requested";
