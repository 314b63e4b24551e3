//! Project entity model and DTOs.

use docureel_core::status::{AvatarMode, ProjectStatus, StageStatus};
use docureel_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `projects` table.
///
/// Status columns are stored as text; use the accessor methods to get the
/// typed enums (invalid text would indicate a migration bug).
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Project {
    pub id: DbId,
    pub title: String,
    pub target_duration_secs: i32,
    pub avatar_mode: String,
    pub avatar_design_status: String,
    pub avatar_design_fallback: bool,
    pub status: String,
    pub error_message: Option<String>,
    pub avatar_asset_id: Option<DbId>,
    pub manifest: Option<serde_json::Value>,
    pub deleted_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Project {
    pub fn status(&self) -> Option<ProjectStatus> {
        ProjectStatus::parse(&self.status)
    }

    pub fn avatar_mode(&self) -> Option<AvatarMode> {
        AvatarMode::parse(&self.avatar_mode)
    }

    pub fn avatar_design_status(&self) -> Option<StageStatus> {
        StageStatus::parse(&self.avatar_design_status)
    }
}

/// DTO for creating a new project.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateProject {
    pub title: String,
    pub target_duration_secs: i32,
    /// Defaults to `preset` if omitted.
    pub avatar_mode: Option<String>,
}
