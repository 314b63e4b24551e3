//! Event payload shapes shared across workflows.

use docureel_core::types::DbId;
use serde::{Deserialize, Serialize};

/// Payload of `script.generation.requested`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptGenPayload {
    pub project_id: DbId,
    pub document_id: DbId,
}

/// Payload of the per-scene stage and orchestration events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenePayload {
    pub project_id: DbId,
    pub scene_id: DbId,
}

/// Payload of project-scoped events (avatar design, composition).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectPayload {
    pub project_id: DbId,
}

/// Payload of the self-chaining polling events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollPayload {
    pub project_id: DbId,
    pub scene_id: DbId,
    pub external_job_id: String,
    /// 0-based count of polls already performed.
    pub attempt: i32,
    pub max_attempts: i32,
}
