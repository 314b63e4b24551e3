//! Pipeline timing and policy knobs.

use std::time::Duration;

use docureel_core::planning::BackgroundPolicy;

/// Timeouts, pauses, and attempt budgets for the scene pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// How long the orchestrator waits for a custom avatar design before
    /// falling back to the preset avatar.
    pub avatar_design_wait: Duration,
    /// Stage-completion waits. Timeouts here are fatal for the scene.
    pub tts_wait: Duration,
    pub avatar_wait: Duration,
    /// Larger than the others: the high-priority path renders video.
    pub background_wait: Duration,
    /// Pause between scenes so external calls do not burst.
    pub rate_limit_pause: Duration,
    /// Delay between status polls of a long-running job.
    pub poll_interval: Duration,
    pub avatar_poll_max_attempts: i32,
    pub video_poll_max_attempts: i32,
    pub background_policy: BackgroundPolicy,
    /// Preset avatar used when no custom design is available.
    pub preset_avatar_url: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            avatar_design_wait: Duration::from_secs(3 * 60),
            tts_wait: Duration::from_secs(5 * 60),
            avatar_wait: Duration::from_secs(5 * 60),
            background_wait: Duration::from_secs(15 * 60),
            rate_limit_pause: Duration::from_secs(2),
            poll_interval: Duration::from_secs(10),
            avatar_poll_max_attempts: 30,
            video_poll_max_attempts: 90,
            background_policy: BackgroundPolicy::AllHigh,
            preset_avatar_url: "https://assets.docureel.io/avatars/preset-01.png".to_string(),
        }
    }
}
