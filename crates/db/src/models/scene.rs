//! Scene entity model and DTOs.

use docureel_core::status::{BackgroundPriority, StageStatus};
use docureel_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `scenes` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Scene {
    pub id: DbId,
    pub project_id: DbId,
    /// 0-based position within the project.
    pub position: i32,
    pub script: String,
    pub tts_status: String,
    pub avatar_status: String,
    pub background_status: String,
    pub background_priority: String,
    pub audio_asset_id: Option<DbId>,
    pub avatar_asset_id: Option<DbId>,
    pub background_asset_id: Option<DbId>,
    pub error_message: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Scene {
    pub fn tts_status(&self) -> Option<StageStatus> {
        StageStatus::parse(&self.tts_status)
    }

    pub fn avatar_status(&self) -> Option<StageStatus> {
        StageStatus::parse(&self.avatar_status)
    }

    pub fn background_status(&self) -> Option<StageStatus> {
        StageStatus::parse(&self.background_status)
    }

    pub fn background_priority(&self) -> Option<BackgroundPriority> {
        BackgroundPriority::parse(&self.background_priority)
    }
}

/// DTO for one scene in the atomic bulk insert after script generation.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateScene {
    pub position: i32,
    pub script: String,
    pub background_priority: String,
}
