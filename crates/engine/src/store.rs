//! The run-history persistence seam.
//!
//! The engine never touches sqlx directly; everything goes through
//! [`RunStore`]. [`crate::pg::PgRunStore`] is the production backend,
//! [`crate::memory::MemRunStore`] backs the test suites.

use async_trait::async_trait;
use docureel_core::types::{DbId, Timestamp};
use docureel_events::PipelineEvent;

use crate::error::StoreError;

/// Lifecycle status of one workflow invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Queued,
    Running,
    Sleeping,
    Waiting,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Sleeping => "sleeping",
            Self::Waiting => "waiting",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "queued" => Some(Self::Queued),
            "running" => Some(Self::Running),
            "sleeping" => Some(Self::Sleeping),
            "waiting" => Some(Self::Waiting),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Terminal states never execute again.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// One workflow invocation.
#[derive(Debug, Clone)]
pub struct Run {
    pub id: DbId,
    pub workflow_name: String,
    pub trigger_event: String,
    pub project_id: Option<DbId>,
    pub scene_id: Option<DbId>,
    pub payload: serde_json::Value,
    pub status: RunStatus,
    /// Step currently parked on (sleep or wait), if any.
    pub waiting_step: Option<String>,
    pub wake_at: Option<Timestamp>,
    pub wait_event_name: Option<String>,
    pub wait_timeout_at: Option<Timestamp>,
    pub attempt: i32,
    pub max_attempts: i32,
    pub error_message: Option<String>,
    pub created_at: Timestamp,
}

/// Parameters for creating a queued run.
#[derive(Debug, Clone)]
pub struct NewRun {
    pub workflow_name: String,
    pub trigger_event: String,
    pub project_id: Option<DbId>,
    pub scene_id: Option<DbId>,
    pub payload: serde_json::Value,
    pub max_attempts: i32,
}

/// Durable storage for runs, step history, and the event log.
#[async_trait]
pub trait RunStore: Send + Sync {
    /// Create a queued run.
    async fn create_run(&self, new: NewRun) -> Result<Run, StoreError>;

    /// Find a run by id.
    async fn find_run(&self, id: DbId) -> Result<Option<Run>, StoreError>;

    /// Claim up to `limit` due runs (queued, or sleeping past wake time)
    /// and mark them running. Must never hand the same run to two callers.
    async fn claim_due(&self, limit: i64) -> Result<Vec<Run>, StoreError>;

    /// Park a run until `wake_at`.
    async fn park_sleep(&self, id: DbId, step: &str, wake_at: Timestamp)
        -> Result<(), StoreError>;

    /// Park a run until `event_name` arrives or `timeout_at` passes.
    async fn park_wait(
        &self,
        id: DbId,
        step: &str,
        event_name: &str,
        timeout_at: Timestamp,
    ) -> Result<(), StoreError>;

    /// Clear parked state and put the run back on the queue.
    async fn requeue(&self, id: DbId) -> Result<(), StoreError>;

    /// Mark the run completed.
    async fn complete_run(&self, id: DbId) -> Result<(), StoreError>;

    /// Mark the run failed. Returns `false` if it was already failed, so
    /// the failure hook fires at most once.
    async fn fail_run(&self, id: DbId, error_message: &str) -> Result<bool, StoreError>;

    /// Bump the attempt counter and requeue. Returns the new count.
    async fn record_retry(&self, id: DbId) -> Result<i32, StoreError>;

    /// Runs currently waiting on `event_name`.
    async fn waiting_for_event(&self, event_name: &str) -> Result<Vec<Run>, StoreError>;

    /// Waiting runs whose timeout has passed.
    async fn expired_waits(&self) -> Result<Vec<Run>, StoreError>;

    /// Recorded output for a step, if any.
    async fn find_step(
        &self,
        run_id: DbId,
        step_name: &str,
    ) -> Result<Option<serde_json::Value>, StoreError>;

    /// Record a step output. First write wins: the returned value is the
    /// authoritative output even if another writer got there first.
    async fn record_step(
        &self,
        run_id: DbId,
        step_name: &str,
        output: &serde_json::Value,
    ) -> Result<serde_json::Value, StoreError>;

    /// Append an event to the durable log, returning its id.
    async fn append_event(&self, event: &PipelineEvent) -> Result<DbId, StoreError>;

    /// Payload of the most recent logged event named `event_name` that
    /// correlates to the given scope (scene precedence, then project)
    /// and was appended at or after `since`. A waiter consults the log
    /// through this before parking, so an event published between the
    /// run's claim and its park is still delivered.
    async fn find_logged_event(
        &self,
        event_name: &str,
        project_id: Option<DbId>,
        scene_id: Option<DbId>,
        since: Timestamp,
    ) -> Result<Option<serde_json::Value>, StoreError>;
}
