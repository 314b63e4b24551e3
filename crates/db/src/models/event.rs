//! Durable event log model.

use docureel_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `pipeline_events` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PipelineEventRow {
    pub id: DbId,
    pub name: String,
    pub project_id: Option<DbId>,
    pub scene_id: Option<DbId>,
    pub payload: serde_json::Value,
    pub created_at: Timestamp,
}
