//! Generated artifact model.

use docureel_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `assets` table. Immutable once created.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Asset {
    pub id: DbId,
    pub project_id: DbId,
    pub scene_id: Option<DbId>,
    pub kind: String,
    pub file_path: String,
    pub source_url: Option<String>,
    pub provider: Option<String>,
    pub provider_job_id: Option<String>,
    pub cost_cents: Option<i32>,
    pub content_sha256: Option<String>,
    pub created_at: Timestamp,
}

/// DTO for recording a new asset.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateAsset {
    pub project_id: DbId,
    pub scene_id: Option<DbId>,
    pub kind: String,
    pub file_path: String,
    pub source_url: Option<String>,
    pub provider: Option<String>,
    pub provider_job_id: Option<String>,
    pub cost_cents: Option<i32>,
    pub content_sha256: Option<String>,
}
