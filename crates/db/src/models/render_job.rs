//! External long-running operation tracking model.

use docureel_core::status::RenderJobStatus;
use docureel_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `render_jobs` table.
///
/// Exactly one row exists per external job id (unique constraint); every
/// poll attempt updates the row in place.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct RenderJob {
    pub id: DbId,
    pub external_job_id: String,
    pub provider: String,
    pub project_id: DbId,
    pub scene_id: Option<DbId>,
    pub kind: String,
    pub status: String,
    pub error_message: Option<String>,
    pub attempts: i32,
    pub metadata: serde_json::Value,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl RenderJob {
    pub fn status(&self) -> Option<RenderJobStatus> {
        RenderJobStatus::parse(&self.status)
    }
}
