//! Scene planning from a target video duration.
//!
//! A project's video is cut into fixed-length scenes. The target duration
//! comes from a small fixed menu; everything downstream (scene count,
//! background priorities) is derived here.

use crate::error::CoreError;
use crate::status::BackgroundPriority;

/// Fixed length of one scene in seconds.
pub const SCENE_DURATION_SECS: u32 = 8;

/// The durations a project may request.
pub const VALID_TARGET_DURATIONS_SECS: &[u32] = &[30, 60, 180];

/// Validate that a requested target duration is on the menu.
pub fn validate_target_duration(secs: u32) -> Result<(), CoreError> {
    if VALID_TARGET_DURATIONS_SECS.contains(&secs) {
        Ok(())
    } else {
        Err(CoreError::Validation(format!(
            "Invalid target duration {secs}s. Must be one of: {}",
            VALID_TARGET_DURATIONS_SECS
                .iter()
                .map(|d| format!("{d}s"))
                .collect::<Vec<_>>()
                .join(", ")
        )))
    }
}

/// Number of scenes needed to fill `target_secs`, rounding up.
///
/// Always at least 1.
pub fn scene_count_for_duration(target_secs: u32) -> u32 {
    target_secs.div_ceil(SCENE_DURATION_SECS).max(1)
}

/// Background-generation strategy applied across a project's scenes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackgroundPolicy {
    /// Every scene gets the image-to-video treatment. The primary variant.
    #[default]
    AllHigh,
    /// First and last scenes get video backgrounds, interior scenes get
    /// static generated images. Cheaper for long projects.
    Tiered,
}

impl BackgroundPolicy {
    /// Priority for the scene at `position` (0-based) out of `total`.
    pub fn priority_for(self, position: u32, total: u32) -> BackgroundPriority {
        match self {
            Self::AllHigh => BackgroundPriority::High,
            Self::Tiered => {
                if position == 0 || position + 1 == total {
                    BackgroundPriority::High
                } else {
                    BackgroundPriority::Medium
                }
            }
        }
    }
}
