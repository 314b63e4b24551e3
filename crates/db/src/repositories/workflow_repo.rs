//! Repositories for the `workflow_runs` and `workflow_steps` tables.
//!
//! `claim_due` uses `FOR UPDATE SKIP LOCKED` so multiple scheduler
//! processes never double-execute a run.

use docureel_core::types::{DbId, Timestamp};
use sqlx::PgPool;

use crate::models::workflow::{WorkflowRunRow, WorkflowStepRow};

/// Column list shared across run queries.
const RUN_COLUMNS: &str = "id, workflow_name, trigger_event, project_id, scene_id, \
    payload, status, waiting_step, wake_at, wait_event_name, wait_timeout_at, \
    attempt, max_attempts, error_message, created_at, updated_at";

/// Column list shared across step queries.
const STEP_COLUMNS: &str = "id, run_id, step_name, output, recorded_at";

/// Provides lifecycle operations for workflow runs.
pub struct WorkflowRunRepo;

impl WorkflowRunRepo {
    /// Create a queued run for a triggered workflow.
    #[allow(clippy::too_many_arguments)]
    pub async fn create(
        pool: &PgPool,
        workflow_name: &str,
        trigger_event: &str,
        project_id: Option<DbId>,
        scene_id: Option<DbId>,
        payload: &serde_json::Value,
        max_attempts: i32,
    ) -> Result<WorkflowRunRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO workflow_runs
                (workflow_name, trigger_event, project_id, scene_id, payload, max_attempts)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {RUN_COLUMNS}"
        );
        sqlx::query_as::<_, WorkflowRunRow>(&query)
            .bind(workflow_name)
            .bind(trigger_event)
            .bind(project_id)
            .bind(scene_id)
            .bind(payload)
            .bind(max_attempts)
            .fetch_one(pool)
            .await
    }

    /// Find a run by ID.
    pub async fn find_by_id(
        pool: &PgPool,
        id: DbId,
    ) -> Result<Option<WorkflowRunRow>, sqlx::Error> {
        let query = format!("SELECT {RUN_COLUMNS} FROM workflow_runs WHERE id = $1");
        sqlx::query_as::<_, WorkflowRunRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Claim up to `limit` due runs (queued, or sleeping past their wake
    /// time) and mark them running. `SKIP LOCKED` prevents double-claim
    /// across concurrent schedulers.
    pub async fn claim_due(
        pool: &PgPool,
        limit: i64,
    ) -> Result<Vec<WorkflowRunRow>, sqlx::Error> {
        let query = format!(
            "UPDATE workflow_runs
             SET status = 'running', updated_at = NOW()
             WHERE id IN (
                 SELECT id FROM workflow_runs
                 WHERE status = 'queued'
                    OR (status = 'sleeping' AND wake_at <= NOW())
                 ORDER BY created_at ASC
                 LIMIT $1
                 FOR UPDATE SKIP LOCKED
             )
             RETURNING {RUN_COLUMNS}"
        );
        sqlx::query_as::<_, WorkflowRunRow>(&query)
            .bind(limit)
            .fetch_all(pool)
            .await
    }

    /// Park a run until `wake_at` (durable sleep).
    pub async fn park_sleep(
        pool: &PgPool,
        id: DbId,
        step: &str,
        wake_at: Timestamp,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE workflow_runs
             SET status = 'sleeping', waiting_step = $2, wake_at = $3, updated_at = NOW()
             WHERE id = $1",
        )
        .bind(id)
        .bind(step)
        .bind(wake_at)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Park a run until a named event arrives or the timeout passes.
    pub async fn park_wait(
        pool: &PgPool,
        id: DbId,
        step: &str,
        event_name: &str,
        timeout_at: Timestamp,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE workflow_runs
             SET status = 'waiting', waiting_step = $2, wait_event_name = $3,
                 wait_timeout_at = $4, updated_at = NOW()
             WHERE id = $1",
        )
        .bind(id)
        .bind(step)
        .bind(event_name)
        .bind(timeout_at)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Clear the parked state and put the run back on the queue.
    pub async fn requeue(pool: &PgPool, id: DbId) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE workflow_runs
             SET status = 'queued', waiting_step = NULL, wake_at = NULL,
                 wait_event_name = NULL, wait_timeout_at = NULL, updated_at = NOW()
             WHERE id = $1",
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Mark the run completed.
    pub async fn complete(pool: &PgPool, id: DbId) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE workflow_runs SET status = 'completed', updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Mark the run failed with an error message. Returns `false` when the
    /// run was already failed, so the failure hook fires at most once.
    pub async fn fail(
        pool: &PgPool,
        id: DbId,
        error_message: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE workflow_runs
             SET status = 'failed', error_message = $2, updated_at = NOW()
             WHERE id = $1 AND status != 'failed'",
        )
        .bind(id)
        .bind(error_message)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Bump the attempt counter and requeue for retry. Returns the new
    /// attempt count.
    pub async fn record_retry(pool: &PgPool, id: DbId) -> Result<i32, sqlx::Error> {
        sqlx::query_scalar(
            "UPDATE workflow_runs
             SET attempt = attempt + 1, status = 'queued', updated_at = NOW()
             WHERE id = $1
             RETURNING attempt",
        )
        .bind(id)
        .fetch_one(pool)
        .await
    }

    /// Runs currently waiting on the named event.
    pub async fn waiting_for_event(
        pool: &PgPool,
        event_name: &str,
    ) -> Result<Vec<WorkflowRunRow>, sqlx::Error> {
        let query = format!(
            "SELECT {RUN_COLUMNS} FROM workflow_runs
             WHERE status = 'waiting' AND wait_event_name = $1"
        );
        sqlx::query_as::<_, WorkflowRunRow>(&query)
            .bind(event_name)
            .fetch_all(pool)
            .await
    }

    /// Waiting runs whose timeout has passed.
    pub async fn expired_waits(pool: &PgPool) -> Result<Vec<WorkflowRunRow>, sqlx::Error> {
        let query = format!(
            "SELECT {RUN_COLUMNS} FROM workflow_runs
             WHERE status = 'waiting' AND wait_timeout_at <= NOW()"
        );
        sqlx::query_as::<_, WorkflowRunRow>(&query)
            .fetch_all(pool)
            .await
    }
}

/// Provides memoized step-result storage.
pub struct WorkflowStepRepo;

impl WorkflowStepRepo {
    /// Find a recorded step result for a run.
    pub async fn find(
        pool: &PgPool,
        run_id: DbId,
        step_name: &str,
    ) -> Result<Option<WorkflowStepRow>, sqlx::Error> {
        let query = format!(
            "SELECT {STEP_COLUMNS} FROM workflow_steps WHERE run_id = $1 AND step_name = $2"
        );
        sqlx::query_as::<_, WorkflowStepRow>(&query)
            .bind(run_id)
            .bind(step_name)
            .fetch_optional(pool)
            .await
    }

    /// Record a step result. First write wins: on conflict the existing
    /// output is returned untouched, so concurrent replays agree.
    pub async fn record(
        pool: &PgPool,
        run_id: DbId,
        step_name: &str,
        output: &serde_json::Value,
    ) -> Result<serde_json::Value, sqlx::Error> {
        sqlx::query_scalar(
            "INSERT INTO workflow_steps (run_id, step_name, output)
             VALUES ($1, $2, $3)
             ON CONFLICT (run_id, step_name)
             DO UPDATE SET output = workflow_steps.output
             RETURNING output",
        )
        .bind(run_id)
        .bind(step_name)
        .bind(output)
        .fetch_one(pool)
        .await
    }
}
