//! Postgres-backed [`RunStore`] built on the `docureel-db` repositories.

use docureel_core::types::{DbId, Timestamp};
use docureel_db::models::workflow::WorkflowRunRow;
use docureel_db::repositories::{EventRepo, WorkflowRunRepo, WorkflowStepRepo};
use docureel_db::DbPool;
use docureel_events::PipelineEvent;

use crate::error::StoreError;
use crate::store::{NewRun, Run, RunStatus, RunStore};

/// Run store backed by the `workflow_runs`, `workflow_steps`, and
/// `pipeline_events` tables.
pub struct PgRunStore {
    pool: DbPool,
}

impl PgRunStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn map_row(row: WorkflowRunRow) -> Result<Run, StoreError> {
    let status = RunStatus::parse(&row.status).ok_or_else(|| {
        StoreError::Invariant(format!("run {} has unknown status '{}'", row.id, row.status))
    })?;
    Ok(Run {
        id: row.id,
        workflow_name: row.workflow_name,
        trigger_event: row.trigger_event,
        project_id: row.project_id,
        scene_id: row.scene_id,
        payload: row.payload,
        status,
        waiting_step: row.waiting_step,
        wake_at: row.wake_at,
        wait_event_name: row.wait_event_name,
        wait_timeout_at: row.wait_timeout_at,
        attempt: row.attempt,
        max_attempts: row.max_attempts,
        error_message: row.error_message,
        created_at: row.created_at,
    })
}

#[async_trait::async_trait]
impl RunStore for PgRunStore {
    async fn create_run(&self, new: NewRun) -> Result<Run, StoreError> {
        let row = WorkflowRunRepo::create(
            &self.pool,
            &new.workflow_name,
            &new.trigger_event,
            new.project_id,
            new.scene_id,
            &new.payload,
            new.max_attempts,
        )
        .await?;
        map_row(row)
    }

    async fn find_run(&self, id: DbId) -> Result<Option<Run>, StoreError> {
        match WorkflowRunRepo::find_by_id(&self.pool, id).await? {
            Some(row) => Ok(Some(map_row(row)?)),
            None => Ok(None),
        }
    }

    async fn claim_due(&self, limit: i64) -> Result<Vec<Run>, StoreError> {
        WorkflowRunRepo::claim_due(&self.pool, limit)
            .await?
            .into_iter()
            .map(map_row)
            .collect()
    }

    async fn park_sleep(
        &self,
        id: DbId,
        step: &str,
        wake_at: Timestamp,
    ) -> Result<(), StoreError> {
        WorkflowRunRepo::park_sleep(&self.pool, id, step, wake_at).await?;
        Ok(())
    }

    async fn park_wait(
        &self,
        id: DbId,
        step: &str,
        event_name: &str,
        timeout_at: Timestamp,
    ) -> Result<(), StoreError> {
        WorkflowRunRepo::park_wait(&self.pool, id, step, event_name, timeout_at).await?;
        Ok(())
    }

    async fn requeue(&self, id: DbId) -> Result<(), StoreError> {
        WorkflowRunRepo::requeue(&self.pool, id).await?;
        Ok(())
    }

    async fn complete_run(&self, id: DbId) -> Result<(), StoreError> {
        WorkflowRunRepo::complete(&self.pool, id).await?;
        Ok(())
    }

    async fn fail_run(&self, id: DbId, error_message: &str) -> Result<bool, StoreError> {
        Ok(WorkflowRunRepo::fail(&self.pool, id, error_message).await?)
    }

    async fn record_retry(&self, id: DbId) -> Result<i32, StoreError> {
        Ok(WorkflowRunRepo::record_retry(&self.pool, id).await?)
    }

    async fn waiting_for_event(&self, event_name: &str) -> Result<Vec<Run>, StoreError> {
        WorkflowRunRepo::waiting_for_event(&self.pool, event_name)
            .await?
            .into_iter()
            .map(map_row)
            .collect()
    }

    async fn expired_waits(&self) -> Result<Vec<Run>, StoreError> {
        WorkflowRunRepo::expired_waits(&self.pool)
            .await?
            .into_iter()
            .map(map_row)
            .collect()
    }

    async fn find_step(
        &self,
        run_id: DbId,
        step_name: &str,
    ) -> Result<Option<serde_json::Value>, StoreError> {
        Ok(WorkflowStepRepo::find(&self.pool, run_id, step_name)
            .await?
            .map(|row| row.output))
    }

    async fn record_step(
        &self,
        run_id: DbId,
        step_name: &str,
        output: &serde_json::Value,
    ) -> Result<serde_json::Value, StoreError> {
        Ok(WorkflowStepRepo::record(&self.pool, run_id, step_name, output).await?)
    }

    async fn append_event(&self, event: &PipelineEvent) -> Result<DbId, StoreError> {
        Ok(EventRepo::insert(
            &self.pool,
            &event.name,
            event.project_id,
            event.scene_id,
            &event.payload,
        )
        .await?)
    }

    async fn find_logged_event(
        &self,
        event_name: &str,
        project_id: Option<DbId>,
        scene_id: Option<DbId>,
        since: Timestamp,
    ) -> Result<Option<serde_json::Value>, StoreError> {
        Ok(
            EventRepo::find_correlated(&self.pool, event_name, project_id, scene_id, since)
                .await?
                .map(|row| row.payload),
        )
    }
}
