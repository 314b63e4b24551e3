//! Repository for the `scenes` table.

use docureel_core::status::Stage;
use docureel_core::types::DbId;
use sqlx::PgPool;

use crate::models::scene::{CreateScene, Scene};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, project_id, position, script, tts_status, \
    avatar_status, background_status, background_priority, audio_asset_id, \
    avatar_asset_id, background_asset_id, error_message, created_at, updated_at";

/// Status column for a stage. Static strings keep the `format!` queries
/// injection-safe.
fn status_column(stage: Stage) -> &'static str {
    match stage {
        Stage::Tts => "tts_status",
        Stage::Avatar => "avatar_status",
        Stage::Background => "background_status",
    }
}

/// Asset FK column for a stage.
fn asset_column(stage: Stage) -> &'static str {
    match stage {
        Stage::Tts => "audio_asset_id",
        Stage::Avatar => "avatar_asset_id",
        Stage::Background => "background_asset_id",
    }
}

/// Provides CRUD operations for scenes.
pub struct SceneRepo;

impl SceneRepo {
    /// Bulk-insert all scenes for a project inside one transaction.
    ///
    /// All scenes are created together or not at all -- a failure on any
    /// insert rolls the whole batch back.
    pub async fn create_bulk(
        pool: &PgPool,
        project_id: DbId,
        scenes: &[CreateScene],
    ) -> Result<Vec<Scene>, sqlx::Error> {
        let mut tx = pool.begin().await?;
        let mut created = Vec::with_capacity(scenes.len());

        let query = format!(
            "INSERT INTO scenes (project_id, position, script, background_priority)
             VALUES ($1, $2, $3, $4)
             RETURNING {COLUMNS}"
        );
        for scene in scenes {
            let row = sqlx::query_as::<_, Scene>(&query)
                .bind(project_id)
                .bind(scene.position)
                .bind(&scene.script)
                .bind(&scene.background_priority)
                .fetch_one(&mut *tx)
                .await?;
            created.push(row);
        }

        tx.commit().await?;
        Ok(created)
    }

    /// Find a scene by ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Scene>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM scenes WHERE id = $1");
        sqlx::query_as::<_, Scene>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List all scenes for a project, ordered by position ascending.
    pub async fn list_by_project(
        pool: &PgPool,
        project_id: DbId,
    ) -> Result<Vec<Scene>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM scenes WHERE project_id = $1 ORDER BY position ASC"
        );
        sqlx::query_as::<_, Scene>(&query)
            .bind(project_id)
            .fetch_all(pool)
            .await
    }

    /// Find the scene directly after `position` in the same project.
    pub async fn find_next_by_position(
        pool: &PgPool,
        project_id: DbId,
        position: i32,
    ) -> Result<Option<Scene>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM scenes
             WHERE project_id = $1 AND position > $2
             ORDER BY position ASC
             LIMIT 1"
        );
        sqlx::query_as::<_, Scene>(&query)
            .bind(project_id)
            .bind(position)
            .fetch_optional(pool)
            .await
    }

    /// Set one stage's status, optionally recording an error message.
    pub async fn set_stage_status(
        pool: &PgPool,
        id: DbId,
        stage: Stage,
        status: &str,
        error_message: Option<&str>,
    ) -> Result<Option<Scene>, sqlx::Error> {
        let column = status_column(stage);
        let query = format!(
            "UPDATE scenes
             SET {column} = $2, error_message = COALESCE($3, error_message), updated_at = NOW()
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Scene>(&query)
            .bind(id)
            .bind(status)
            .bind(error_message)
            .fetch_optional(pool)
            .await
    }

    /// Link the completed stage's artifact and mark the stage `completed`
    /// in one update.
    ///
    /// Guarded against duplicate completion: if the stage is already
    /// `completed` (a second completion event or a webhook racing the
    /// polling loop) no row is updated and `None` is returned.
    pub async fn complete_stage(
        pool: &PgPool,
        id: DbId,
        stage: Stage,
        asset_id: DbId,
    ) -> Result<Option<Scene>, sqlx::Error> {
        let status_col = status_column(stage);
        let asset_col = asset_column(stage);
        let query = format!(
            "UPDATE scenes
             SET {status_col} = 'completed', {asset_col} = $2, updated_at = NOW()
             WHERE id = $1 AND {status_col} != 'completed'
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Scene>(&query)
            .bind(id)
            .bind(asset_id)
            .fetch_optional(pool)
            .await
    }
}
