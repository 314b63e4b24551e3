//! Repository for the `render_jobs` table.

use docureel_core::types::DbId;
use sqlx::PgPool;

use crate::models::render_job::RenderJob;

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, external_job_id, provider, project_id, scene_id, \
    kind, status, error_message, attempts, metadata, created_at, updated_at";

/// Provides tracking operations for external long-running jobs.
pub struct RenderJobRepo;

impl RenderJobRepo {
    /// Record a newly submitted external job.
    ///
    /// The unique constraint on `external_job_id` guarantees at most one
    /// row per external operation; a duplicate submit returns the existing
    /// row unchanged.
    pub async fn create(
        pool: &PgPool,
        external_job_id: &str,
        provider: &str,
        project_id: DbId,
        scene_id: Option<DbId>,
        kind: &str,
        metadata: &serde_json::Value,
    ) -> Result<RenderJob, sqlx::Error> {
        let query = format!(
            "INSERT INTO render_jobs
                (external_job_id, provider, project_id, scene_id, kind, metadata)
             VALUES ($1, $2, $3, $4, $5, $6)
             ON CONFLICT (external_job_id) DO UPDATE SET updated_at = NOW()
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, RenderJob>(&query)
            .bind(external_job_id)
            .bind(provider)
            .bind(project_id)
            .bind(scene_id)
            .bind(kind)
            .bind(metadata)
            .fetch_one(pool)
            .await
    }

    /// Find a job by the provider's operation/job id.
    pub async fn find_by_external_id(
        pool: &PgPool,
        external_job_id: &str,
    ) -> Result<Option<RenderJob>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM render_jobs WHERE external_job_id = $1");
        sqlx::query_as::<_, RenderJob>(&query)
            .bind(external_job_id)
            .fetch_optional(pool)
            .await
    }

    /// Bump the attempt counter after a poll. Returns the new count.
    pub async fn record_attempt(
        pool: &PgPool,
        external_job_id: &str,
    ) -> Result<i32, sqlx::Error> {
        sqlx::query_scalar(
            "UPDATE render_jobs SET attempts = attempts + 1, updated_at = NOW()
             WHERE external_job_id = $1
             RETURNING attempts",
        )
        .bind(external_job_id)
        .fetch_one(pool)
        .await
    }

    /// Mark the job terminally completed. Returns `false` when the job was
    /// already terminal (duplicate webhook/poll completion).
    pub async fn complete(pool: &PgPool, external_job_id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE render_jobs SET status = 'completed', updated_at = NOW()
             WHERE external_job_id = $1 AND status = 'processing'",
        )
        .bind(external_job_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Mark the job terminally failed with a human-readable message.
    /// Returns `false` when the job was already terminal.
    pub async fn fail(
        pool: &PgPool,
        external_job_id: &str,
        error_message: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE render_jobs SET status = 'failed', error_message = $2, updated_at = NOW()
             WHERE external_job_id = $1 AND status = 'processing'",
        )
        .bind(external_job_id)
        .bind(error_message)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
