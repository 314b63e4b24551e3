//! In-memory pipeline [`Store`] for the test suites.
//!
//! Mirrors `PgStore` semantics: atomic scene creation, the
//! already-completed guard on `complete_stage`, terminal-once render job
//! transitions, and soft-delete filtering on project reads.

use std::collections::HashMap;

use chrono::Utc;
use docureel_core::status::{ProjectStatus, Stage, StageStatus};
use docureel_core::types::DbId;
use docureel_core::CoreError;
use docureel_db::models::asset::{Asset, CreateAsset};
use docureel_db::models::document::Document;
use docureel_db::models::project::Project;
use docureel_db::models::render_job::RenderJob;
use docureel_db::models::scene::{CreateScene, Scene};
use tokio::sync::Mutex;

use crate::store::Store;

#[derive(Default)]
struct Inner {
    next_id: DbId,
    projects: HashMap<DbId, Project>,
    documents: HashMap<DbId, Document>,
    scenes: HashMap<DbId, Scene>,
    assets: HashMap<DbId, Asset>,
    /// Keyed by external job id.
    render_jobs: HashMap<String, RenderJob>,
}

impl Inner {
    fn next_id(&mut self) -> DbId {
        self.next_id += 1;
        self.next_id
    }
}

#[derive(Default)]
pub struct MemStore {
    inner: Mutex<Inner>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    // -----------------------------------------------------------------------
    // Seeding helpers for tests
    // -----------------------------------------------------------------------

    pub async fn seed_project(
        &self,
        title: &str,
        target_duration_secs: i32,
        avatar_mode: &str,
    ) -> Project {
        let mut inner = self.inner.lock().await;
        let id = inner.next_id();
        let now = Utc::now();
        let project = Project {
            id,
            title: title.to_string(),
            target_duration_secs,
            avatar_mode: avatar_mode.to_string(),
            avatar_design_status: StageStatus::Pending.as_str().to_string(),
            avatar_design_fallback: false,
            status: ProjectStatus::DocumentUploaded.as_str().to_string(),
            error_message: None,
            avatar_asset_id: None,
            manifest: None,
            deleted_at: None,
            created_at: now,
            updated_at: now,
        };
        inner.projects.insert(id, project.clone());
        project
    }

    pub async fn seed_document(&self, project_id: DbId, text: &str) -> Document {
        let mut inner = self.inner.lock().await;
        let id = inner.next_id();
        let document = Document {
            id,
            project_id,
            file_path: format!("documents/{project_id}/source.pdf"),
            page_count: Some(1),
            extracted_text: Some(text.to_string()),
            created_at: Utc::now(),
        };
        inner.documents.insert(id, document.clone());
        document
    }

    pub async fn seed_scene(
        &self,
        project_id: DbId,
        position: i32,
        script: &str,
        background_priority: &str,
    ) -> Scene {
        let mut inner = self.inner.lock().await;
        let id = inner.next_id();
        let now = Utc::now();
        let scene = Scene {
            id,
            project_id,
            position,
            script: script.to_string(),
            tts_status: StageStatus::Pending.as_str().to_string(),
            avatar_status: StageStatus::Pending.as_str().to_string(),
            background_status: StageStatus::Pending.as_str().to_string(),
            background_priority: background_priority.to_string(),
            audio_asset_id: None,
            avatar_asset_id: None,
            background_asset_id: None,
            error_message: None,
            created_at: now,
            updated_at: now,
        };
        inner.scenes.insert(id, scene.clone());
        scene
    }

    pub async fn soft_delete_project(&self, id: DbId) {
        let mut inner = self.inner.lock().await;
        if let Some(project) = inner.projects.get_mut(&id) {
            project.deleted_at = Some(Utc::now());
        }
    }

    /// Force a stage status directly (test setup only).
    pub async fn force_stage_status(&self, scene_id: DbId, stage: Stage, status: StageStatus) {
        let mut inner = self.inner.lock().await;
        if let Some(scene) = inner.scenes.get_mut(&scene_id) {
            *stage_status_mut(scene, stage) = status.as_str().to_string();
        }
    }

    pub async fn assets(&self) -> Vec<Asset> {
        let inner = self.inner.lock().await;
        let mut assets: Vec<Asset> = inner.assets.values().cloned().collect();
        assets.sort_by_key(|a| a.id);
        assets
    }

    pub async fn render_jobs(&self) -> Vec<RenderJob> {
        let inner = self.inner.lock().await;
        let mut jobs: Vec<RenderJob> = inner.render_jobs.values().cloned().collect();
        jobs.sort_by_key(|j| j.id);
        jobs
    }
}

fn stage_status_mut(scene: &mut Scene, stage: Stage) -> &mut String {
    match stage {
        Stage::Tts => &mut scene.tts_status,
        Stage::Avatar => &mut scene.avatar_status,
        Stage::Background => &mut scene.background_status,
    }
}

fn stage_asset_mut(scene: &mut Scene, stage: Stage) -> &mut Option<DbId> {
    match stage {
        Stage::Tts => &mut scene.audio_asset_id,
        Stage::Avatar => &mut scene.avatar_asset_id,
        Stage::Background => &mut scene.background_asset_id,
    }
}

#[async_trait::async_trait]
impl Store for MemStore {
    async fn find_project(&self, id: DbId) -> Result<Option<Project>, CoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .projects
            .get(&id)
            .filter(|p| p.deleted_at.is_none())
            .cloned())
    }

    async fn set_project_status(
        &self,
        id: DbId,
        status: ProjectStatus,
        error_message: Option<&str>,
    ) -> Result<(), CoreError> {
        let mut inner = self.inner.lock().await;
        if let Some(project) = inner.projects.get_mut(&id) {
            if project.deleted_at.is_none() {
                project.status = status.as_str().to_string();
                project.error_message = error_message.map(str::to_string);
                project.updated_at = Utc::now();
            }
        }
        Ok(())
    }

    async fn set_avatar_design_status(
        &self,
        id: DbId,
        status: StageStatus,
        fallback: bool,
    ) -> Result<(), CoreError> {
        let mut inner = self.inner.lock().await;
        if let Some(project) = inner.projects.get_mut(&id) {
            project.avatar_design_status = status.as_str().to_string();
            project.avatar_design_fallback = fallback;
            project.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn set_project_avatar_asset(
        &self,
        id: DbId,
        asset_id: DbId,
    ) -> Result<(), CoreError> {
        let mut inner = self.inner.lock().await;
        if let Some(project) = inner.projects.get_mut(&id) {
            project.avatar_asset_id = Some(asset_id);
        }
        Ok(())
    }

    async fn set_project_manifest(
        &self,
        id: DbId,
        manifest: &serde_json::Value,
    ) -> Result<(), CoreError> {
        let mut inner = self.inner.lock().await;
        if let Some(project) = inner.projects.get_mut(&id) {
            project.manifest = Some(manifest.clone());
        }
        Ok(())
    }

    async fn find_document(&self, id: DbId) -> Result<Option<Document>, CoreError> {
        Ok(self.inner.lock().await.documents.get(&id).cloned())
    }

    async fn create_scenes(
        &self,
        project_id: DbId,
        scenes: &[CreateScene],
    ) -> Result<Vec<Scene>, CoreError> {
        let mut inner = self.inner.lock().await;

        // Mirror the unique (project_id, position) constraint: the whole
        // batch is rejected on any duplicate.
        for spec in scenes {
            let duplicate = inner
                .scenes
                .values()
                .any(|s| s.project_id == project_id && s.position == spec.position);
            if duplicate {
                return Err(CoreError::Conflict(format!(
                    "scene position {} already exists for project {project_id}",
                    spec.position
                )));
            }
        }

        let now = Utc::now();
        let mut created = Vec::with_capacity(scenes.len());
        for spec in scenes {
            let id = inner.next_id();
            let scene = Scene {
                id,
                project_id,
                position: spec.position,
                script: spec.script.clone(),
                tts_status: StageStatus::Pending.as_str().to_string(),
                avatar_status: StageStatus::Pending.as_str().to_string(),
                background_status: StageStatus::Pending.as_str().to_string(),
                background_priority: spec.background_priority.clone(),
                audio_asset_id: None,
                avatar_asset_id: None,
                background_asset_id: None,
                error_message: None,
                created_at: now,
                updated_at: now,
            };
            inner.scenes.insert(id, scene.clone());
            created.push(scene);
        }
        Ok(created)
    }

    async fn find_scene(&self, id: DbId) -> Result<Option<Scene>, CoreError> {
        Ok(self.inner.lock().await.scenes.get(&id).cloned())
    }

    async fn list_scenes(&self, project_id: DbId) -> Result<Vec<Scene>, CoreError> {
        let inner = self.inner.lock().await;
        let mut scenes: Vec<Scene> = inner
            .scenes
            .values()
            .filter(|s| s.project_id == project_id)
            .cloned()
            .collect();
        scenes.sort_by_key(|s| s.position);
        Ok(scenes)
    }

    async fn next_scene(
        &self,
        project_id: DbId,
        position: i32,
    ) -> Result<Option<Scene>, CoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .scenes
            .values()
            .filter(|s| s.project_id == project_id && s.position > position)
            .min_by_key(|s| s.position)
            .cloned())
    }

    async fn set_stage_status(
        &self,
        scene_id: DbId,
        stage: Stage,
        status: StageStatus,
        error_message: Option<&str>,
    ) -> Result<(), CoreError> {
        let mut inner = self.inner.lock().await;
        if let Some(scene) = inner.scenes.get_mut(&scene_id) {
            *stage_status_mut(scene, stage) = status.as_str().to_string();
            if let Some(message) = error_message {
                scene.error_message = Some(message.to_string());
            }
            scene.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn complete_stage(
        &self,
        scene_id: DbId,
        stage: Stage,
        asset_id: DbId,
    ) -> Result<bool, CoreError> {
        let mut inner = self.inner.lock().await;
        let Some(scene) = inner.scenes.get_mut(&scene_id) else {
            return Ok(false);
        };
        if stage_status_mut(scene, stage).as_str() == StageStatus::Completed.as_str() {
            return Ok(false);
        }
        *stage_status_mut(scene, stage) = StageStatus::Completed.as_str().to_string();
        *stage_asset_mut(scene, stage) = Some(asset_id);
        scene.updated_at = Utc::now();
        Ok(true)
    }

    async fn create_asset(&self, input: &CreateAsset) -> Result<Asset, CoreError> {
        let mut inner = self.inner.lock().await;
        let id = inner.next_id();
        let asset = Asset {
            id,
            project_id: input.project_id,
            scene_id: input.scene_id,
            kind: input.kind.clone(),
            file_path: input.file_path.clone(),
            source_url: input.source_url.clone(),
            provider: input.provider.clone(),
            provider_job_id: input.provider_job_id.clone(),
            cost_cents: input.cost_cents,
            content_sha256: input.content_sha256.clone(),
            created_at: Utc::now(),
        };
        inner.assets.insert(id, asset.clone());
        Ok(asset)
    }

    async fn find_asset(&self, id: DbId) -> Result<Option<Asset>, CoreError> {
        Ok(self.inner.lock().await.assets.get(&id).cloned())
    }

    async fn create_render_job(
        &self,
        external_job_id: &str,
        provider: &str,
        project_id: DbId,
        scene_id: Option<DbId>,
        kind: &str,
    ) -> Result<RenderJob, CoreError> {
        let mut inner = self.inner.lock().await;
        if let Some(existing) = inner.render_jobs.get(external_job_id) {
            return Ok(existing.clone());
        }
        let id = inner.next_id();
        let now = Utc::now();
        let job = RenderJob {
            id,
            external_job_id: external_job_id.to_string(),
            provider: provider.to_string(),
            project_id,
            scene_id,
            kind: kind.to_string(),
            status: "processing".to_string(),
            error_message: None,
            attempts: 0,
            metadata: serde_json::json!({}),
            created_at: now,
            updated_at: now,
        };
        inner.render_jobs.insert(external_job_id.to_string(), job.clone());
        Ok(job)
    }

    async fn find_render_job(
        &self,
        external_job_id: &str,
    ) -> Result<Option<RenderJob>, CoreError> {
        Ok(self.inner.lock().await.render_jobs.get(external_job_id).cloned())
    }

    async fn record_poll_attempt(&self, external_job_id: &str) -> Result<i32, CoreError> {
        let mut inner = self.inner.lock().await;
        let job = inner.render_jobs.get_mut(external_job_id).ok_or_else(|| {
            CoreError::NotFound {
                entity: "render_job",
                id: 0,
            }
        })?;
        job.attempts += 1;
        job.updated_at = Utc::now();
        Ok(job.attempts)
    }

    async fn complete_render_job(&self, external_job_id: &str) -> Result<bool, CoreError> {
        let mut inner = self.inner.lock().await;
        let Some(job) = inner.render_jobs.get_mut(external_job_id) else {
            return Ok(false);
        };
        if job.status != "processing" {
            return Ok(false);
        }
        job.status = "completed".to_string();
        job.updated_at = Utc::now();
        Ok(true)
    }

    async fn fail_render_job(
        &self,
        external_job_id: &str,
        error_message: &str,
    ) -> Result<bool, CoreError> {
        let mut inner = self.inner.lock().await;
        let Some(job) = inner.render_jobs.get_mut(external_job_id) else {
            return Ok(false);
        };
        if job.status != "processing" {
            return Ok(false);
        }
        job.status = "failed".to_string();
        job.error_message = Some(error_message.to_string());
        job.updated_at = Utc::now();
        Ok(true)
    }
}
