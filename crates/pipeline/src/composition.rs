//! Composition gate workflow.
//!
//! Fired when the last scene finishes. Verifies every scene completed
//! every stage, persists the ordered manifest, and flips the project to
//! `scenes_processed`. The offline render step consumes the manifest out
//! of band.

use std::sync::Arc;

use docureel_core::manifest::{build_manifest, SceneReadiness};
use docureel_core::status::{ProjectStatus, StageStatus};
use docureel_db::models::scene::Scene;
use docureel_engine::{StepContext, Workflow, WorkflowError};
use docureel_events::names;

use crate::deps::PipelineDeps;
use crate::payloads::ProjectPayload;
use crate::store::Store;

pub struct CompositionWorkflow {
    deps: Arc<PipelineDeps>,
}

impl CompositionWorkflow {
    pub fn new(deps: Arc<PipelineDeps>) -> Self {
        Self { deps }
    }
}

async fn asset_url(store: &dyn Store, asset_id: Option<i64>) -> anyhow::Result<Option<String>> {
    match asset_id {
        Some(id) => Ok(store.find_asset(id).await?.map(|a| a.file_path)),
        None => Ok(None),
    }
}

async fn readiness(store: &dyn Store, scene: &Scene) -> anyhow::Result<SceneReadiness> {
    Ok(SceneReadiness {
        scene_id: scene.id,
        position: scene.position.max(0) as u32,
        tts: scene.tts_status().unwrap_or(StageStatus::Pending),
        avatar: scene.avatar_status().unwrap_or(StageStatus::Pending),
        background: scene.background_status().unwrap_or(StageStatus::Pending),
        audio_url: asset_url(store, scene.audio_asset_id).await?,
        avatar_url: asset_url(store, scene.avatar_asset_id).await?,
        background_url: asset_url(store, scene.background_asset_id).await?,
    })
}

#[async_trait::async_trait]
impl Workflow for CompositionWorkflow {
    fn name(&self) -> &'static str {
        "composition"
    }

    fn trigger(&self) -> &'static str {
        names::VIDEO_COMPOSE_REQUESTED
    }

    async fn run(&self, ctx: &StepContext) -> Result<(), WorkflowError> {
        let payload: ProjectPayload = ctx.trigger_payload()?;
        let deps = &self.deps;

        let scene_count: usize = ctx
            .run_step("gate-and-persist", || async {
                let scenes = deps.store.list_scenes(payload.project_id).await?;
                let mut views = Vec::with_capacity(scenes.len());
                for scene in &scenes {
                    views.push(readiness(deps.store.as_ref(), scene).await?);
                }

                // The itemized gate error names every incomplete scene.
                let manifest = build_manifest(&views)?;

                deps.store
                    .set_project_manifest(
                        payload.project_id,
                        &serde_json::to_value(&manifest)?,
                    )
                    .await?;
                deps.store
                    .set_project_status(
                        payload.project_id,
                        ProjectStatus::ScenesProcessed,
                        None,
                    )
                    .await?;
                Ok(manifest.entries.len())
            })
            .await?;

        tracing::info!(
            project_id = payload.project_id,
            scenes = scene_count,
            "composition manifest persisted"
        );
        Ok(())
    }

    async fn on_failure(&self, ctx: &StepContext, error: &WorkflowError) {
        if let Some(project_id) = ctx.project_id() {
            let message = error.to_string();
            if let Err(e) = self
                .deps
                .store
                .set_project_status(project_id, ProjectStatus::Failed, Some(&message))
                .await
            {
                tracing::error!(project_id, error = %e, "failed to persist project failure");
            }
        }
    }
}
