//! Workflow engine history models.

use docureel_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `workflow_runs` table: one invocation of a workflow.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct WorkflowRunRow {
    pub id: DbId,
    pub workflow_name: String,
    pub trigger_event: String,
    pub project_id: Option<DbId>,
    pub scene_id: Option<DbId>,
    pub payload: serde_json::Value,
    pub status: String,
    pub waiting_step: Option<String>,
    pub wake_at: Option<Timestamp>,
    pub wait_event_name: Option<String>,
    pub wait_timeout_at: Option<Timestamp>,
    pub attempt: i32,
    pub max_attempts: i32,
    pub error_message: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// A row from the `workflow_steps` table: one memoized step result.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct WorkflowStepRow {
    pub id: DbId,
    pub run_id: DbId,
    pub step_name: String,
    pub output: serde_json::Value,
    pub recorded_at: Timestamp,
}
