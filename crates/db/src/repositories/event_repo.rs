//! Repository for the `pipeline_events` durable event log.

use docureel_core::types::{DbId, Timestamp};
use sqlx::PgPool;

use crate::models::event::PipelineEventRow;

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, name, project_id, scene_id, payload, created_at";

/// Provides append/read operations for the event log.
pub struct EventRepo;

impl EventRepo {
    /// Append an event, returning the generated ID.
    pub async fn insert(
        pool: &PgPool,
        name: &str,
        project_id: Option<DbId>,
        scene_id: Option<DbId>,
        payload: &serde_json::Value,
    ) -> Result<DbId, sqlx::Error> {
        sqlx::query_scalar(
            "INSERT INTO pipeline_events (name, project_id, scene_id, payload)
             VALUES ($1, $2, $3, $4)
             RETURNING id",
        )
        .bind(name)
        .bind(project_id)
        .bind(scene_id)
        .bind(payload)
        .fetch_one(pool)
        .await
    }

    /// Newest event with the given name appended at or after `since`
    /// that correlates to the project/scene scope. Scene correlation
    /// takes precedence over project correlation, mirroring how waiting
    /// runs are woken.
    pub async fn find_correlated(
        pool: &PgPool,
        name: &str,
        project_id: Option<DbId>,
        scene_id: Option<DbId>,
        since: Timestamp,
    ) -> Result<Option<PipelineEventRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM pipeline_events
             WHERE name = $1
               AND created_at >= $4
               AND CASE
                     WHEN $3::BIGINT IS NOT NULL AND scene_id IS NOT NULL
                       THEN scene_id = $3
                     WHEN $2::BIGINT IS NOT NULL AND project_id IS NOT NULL
                       THEN project_id = $2
                     ELSE FALSE
                   END
             ORDER BY id DESC
             LIMIT 1"
        );
        sqlx::query_as::<_, PipelineEventRow>(&query)
            .bind(name)
            .bind(project_id)
            .bind(scene_id)
            .bind(since)
            .fetch_optional(pool)
            .await
    }

    /// List recent events ordered newest-first.
    pub async fn list_recent(
        pool: &PgPool,
        limit: i64,
    ) -> Result<Vec<PipelineEventRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM pipeline_events ORDER BY created_at DESC LIMIT $1"
        );
        sqlx::query_as::<_, PipelineEventRow>(&query)
            .bind(limit)
            .fetch_all(pool)
            .await
    }
}
