//! Repository for the `assets` table.

use docureel_core::types::DbId;
use sqlx::PgPool;

use crate::models::asset::{Asset, CreateAsset};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, project_id, scene_id, kind, file_path, source_url, \
    provider, provider_job_id, cost_cents, content_sha256, created_at";

/// Provides insert/read operations for assets. Assets are immutable.
pub struct AssetRepo;

impl AssetRepo {
    /// Record a new asset, returning the created row.
    pub async fn create(pool: &PgPool, input: &CreateAsset) -> Result<Asset, sqlx::Error> {
        let query = format!(
            "INSERT INTO assets
                (project_id, scene_id, kind, file_path, source_url, provider,
                 provider_job_id, cost_cents, content_sha256)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Asset>(&query)
            .bind(input.project_id)
            .bind(input.scene_id)
            .bind(&input.kind)
            .bind(&input.file_path)
            .bind(&input.source_url)
            .bind(&input.provider)
            .bind(&input.provider_job_id)
            .bind(input.cost_cents)
            .bind(&input.content_sha256)
            .fetch_one(pool)
            .await
    }

    /// Find an asset by ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Asset>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM assets WHERE id = $1");
        sqlx::query_as::<_, Asset>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List all assets for a scene, newest first.
    pub async fn list_by_scene(pool: &PgPool, scene_id: DbId) -> Result<Vec<Asset>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM assets WHERE scene_id = $1 ORDER BY created_at DESC"
        );
        sqlx::query_as::<_, Asset>(&query)
            .bind(scene_id)
            .fetch_all(pool)
            .await
    }
}
