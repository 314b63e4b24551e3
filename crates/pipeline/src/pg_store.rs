//! Postgres-backed pipeline [`Store`] built on the `docureel-db`
//! repositories.

use docureel_core::status::{ProjectStatus, Stage, StageStatus};
use docureel_core::types::DbId;
use docureel_core::CoreError;
use docureel_db::models::asset::{Asset, CreateAsset};
use docureel_db::models::document::Document;
use docureel_db::models::project::Project;
use docureel_db::models::render_job::RenderJob;
use docureel_db::models::scene::{CreateScene, Scene};
use docureel_db::repositories::{
    AssetRepo, DocumentRepo, ProjectRepo, RenderJobRepo, SceneRepo,
};
use docureel_db::DbPool;

use crate::store::Store;

pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn db_err(e: sqlx::Error) -> CoreError {
    CoreError::Internal(format!("database error: {e}"))
}

#[async_trait::async_trait]
impl Store for PgStore {
    async fn find_project(&self, id: DbId) -> Result<Option<Project>, CoreError> {
        ProjectRepo::find_by_id(&self.pool, id).await.map_err(db_err)
    }

    async fn set_project_status(
        &self,
        id: DbId,
        status: ProjectStatus,
        error_message: Option<&str>,
    ) -> Result<(), CoreError> {
        ProjectRepo::set_status(&self.pool, id, status.as_str(), error_message)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn set_avatar_design_status(
        &self,
        id: DbId,
        status: StageStatus,
        fallback: bool,
    ) -> Result<(), CoreError> {
        ProjectRepo::set_avatar_design_status(&self.pool, id, status.as_str(), fallback)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn set_project_avatar_asset(
        &self,
        id: DbId,
        asset_id: DbId,
    ) -> Result<(), CoreError> {
        ProjectRepo::set_avatar_asset(&self.pool, id, asset_id)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn set_project_manifest(
        &self,
        id: DbId,
        manifest: &serde_json::Value,
    ) -> Result<(), CoreError> {
        ProjectRepo::set_manifest(&self.pool, id, manifest)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn find_document(&self, id: DbId) -> Result<Option<Document>, CoreError> {
        DocumentRepo::find_by_id(&self.pool, id).await.map_err(db_err)
    }

    async fn create_scenes(
        &self,
        project_id: DbId,
        scenes: &[CreateScene],
    ) -> Result<Vec<Scene>, CoreError> {
        SceneRepo::create_bulk(&self.pool, project_id, scenes)
            .await
            .map_err(db_err)
    }

    async fn find_scene(&self, id: DbId) -> Result<Option<Scene>, CoreError> {
        SceneRepo::find_by_id(&self.pool, id).await.map_err(db_err)
    }

    async fn list_scenes(&self, project_id: DbId) -> Result<Vec<Scene>, CoreError> {
        SceneRepo::list_by_project(&self.pool, project_id)
            .await
            .map_err(db_err)
    }

    async fn next_scene(
        &self,
        project_id: DbId,
        position: i32,
    ) -> Result<Option<Scene>, CoreError> {
        SceneRepo::find_next_by_position(&self.pool, project_id, position)
            .await
            .map_err(db_err)
    }

    async fn set_stage_status(
        &self,
        scene_id: DbId,
        stage: Stage,
        status: StageStatus,
        error_message: Option<&str>,
    ) -> Result<(), CoreError> {
        SceneRepo::set_stage_status(&self.pool, scene_id, stage, status.as_str(), error_message)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn complete_stage(
        &self,
        scene_id: DbId,
        stage: Stage,
        asset_id: DbId,
    ) -> Result<bool, CoreError> {
        let updated = SceneRepo::complete_stage(&self.pool, scene_id, stage, asset_id)
            .await
            .map_err(db_err)?;
        Ok(updated.is_some())
    }

    async fn create_asset(&self, input: &CreateAsset) -> Result<Asset, CoreError> {
        AssetRepo::create(&self.pool, input).await.map_err(db_err)
    }

    async fn find_asset(&self, id: DbId) -> Result<Option<Asset>, CoreError> {
        AssetRepo::find_by_id(&self.pool, id).await.map_err(db_err)
    }

    async fn create_render_job(
        &self,
        external_job_id: &str,
        provider: &str,
        project_id: DbId,
        scene_id: Option<DbId>,
        kind: &str,
    ) -> Result<RenderJob, CoreError> {
        RenderJobRepo::create(
            &self.pool,
            external_job_id,
            provider,
            project_id,
            scene_id,
            kind,
            &serde_json::json!({}),
        )
        .await
        .map_err(db_err)
    }

    async fn find_render_job(
        &self,
        external_job_id: &str,
    ) -> Result<Option<RenderJob>, CoreError> {
        RenderJobRepo::find_by_external_id(&self.pool, external_job_id)
            .await
            .map_err(db_err)
    }

    async fn record_poll_attempt(&self, external_job_id: &str) -> Result<i32, CoreError> {
        RenderJobRepo::record_attempt(&self.pool, external_job_id)
            .await
            .map_err(db_err)
    }

    async fn complete_render_job(&self, external_job_id: &str) -> Result<bool, CoreError> {
        RenderJobRepo::complete(&self.pool, external_job_id)
            .await
            .map_err(db_err)
    }

    async fn fail_render_job(
        &self,
        external_job_id: &str,
        error_message: &str,
    ) -> Result<bool, CoreError> {
        RenderJobRepo::fail(&self.pool, external_job_id, error_message)
            .await
            .map_err(db_err)
    }
}
