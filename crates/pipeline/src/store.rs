//! Pipeline persistence seam.
//!
//! Stage workflows never touch sqlx directly; they go through [`Store`].
//! [`crate::pg_store::PgStore`] delegates to the `docureel-db`
//! repositories, [`crate::mem_store::MemStore`] backs the pipeline test
//! suites. Errors collapse into [`CoreError`]: workflows only ever
//! propagate them into step failures.

use docureel_core::status::{ProjectStatus, Stage, StageStatus};
use docureel_core::types::DbId;
use docureel_core::CoreError;
use docureel_db::models::asset::{Asset, CreateAsset};
use docureel_db::models::document::Document;
use docureel_db::models::project::Project;
use docureel_db::models::render_job::RenderJob;
use docureel_db::models::scene::{CreateScene, Scene};

#[async_trait::async_trait]
pub trait Store: Send + Sync {
    // Projects. `find_project` excludes soft-deleted rows, which keeps
    // deleted projects out of every trigger path.
    async fn find_project(&self, id: DbId) -> Result<Option<Project>, CoreError>;
    async fn set_project_status(
        &self,
        id: DbId,
        status: ProjectStatus,
        error_message: Option<&str>,
    ) -> Result<(), CoreError>;
    async fn set_avatar_design_status(
        &self,
        id: DbId,
        status: StageStatus,
        fallback: bool,
    ) -> Result<(), CoreError>;
    async fn set_project_avatar_asset(&self, id: DbId, asset_id: DbId)
        -> Result<(), CoreError>;
    async fn set_project_manifest(
        &self,
        id: DbId,
        manifest: &serde_json::Value,
    ) -> Result<(), CoreError>;

    // Documents.
    async fn find_document(&self, id: DbId) -> Result<Option<Document>, CoreError>;

    // Scenes. `create_scenes` is atomic: all rows or none.
    async fn create_scenes(
        &self,
        project_id: DbId,
        scenes: &[CreateScene],
    ) -> Result<Vec<Scene>, CoreError>;
    async fn find_scene(&self, id: DbId) -> Result<Option<Scene>, CoreError>;
    async fn list_scenes(&self, project_id: DbId) -> Result<Vec<Scene>, CoreError>;
    async fn next_scene(
        &self,
        project_id: DbId,
        position: i32,
    ) -> Result<Option<Scene>, CoreError>;
    async fn set_stage_status(
        &self,
        scene_id: DbId,
        stage: Stage,
        status: StageStatus,
        error_message: Option<&str>,
    ) -> Result<(), CoreError>;
    /// Mark a stage completed and link its artifact. Returns `false`
    /// when the stage was already completed (duplicate completion).
    async fn complete_stage(
        &self,
        scene_id: DbId,
        stage: Stage,
        asset_id: DbId,
    ) -> Result<bool, CoreError>;

    // Assets.
    async fn create_asset(&self, input: &CreateAsset) -> Result<Asset, CoreError>;
    async fn find_asset(&self, id: DbId) -> Result<Option<Asset>, CoreError>;

    // Render jobs, keyed by the provider's external id.
    async fn create_render_job(
        &self,
        external_job_id: &str,
        provider: &str,
        project_id: DbId,
        scene_id: Option<DbId>,
        kind: &str,
    ) -> Result<RenderJob, CoreError>;
    async fn find_render_job(
        &self,
        external_job_id: &str,
    ) -> Result<Option<RenderJob>, CoreError>;
    async fn record_poll_attempt(&self, external_job_id: &str) -> Result<i32, CoreError>;
    /// Returns `false` when the job was already terminal.
    async fn complete_render_job(&self, external_job_id: &str) -> Result<bool, CoreError>;
    /// Returns `false` when the job was already terminal.
    async fn fail_render_job(
        &self,
        external_job_id: &str,
        error_message: &str,
    ) -> Result<bool, CoreError>;
}
