//! Script generation workflow.
//!
//! Turns an ingested document into one script per scene, bulk-creates the
//! Scene rows atomically, flips the project to `script_generated`, and
//! kicks off per-scene processing for the first scene.

use std::sync::Arc;

use docureel_core::planning::scene_count_for_duration;
use docureel_core::status::ProjectStatus;
use docureel_core::types::DbId;
use docureel_db::models::scene::CreateScene;
use docureel_engine::{StepContext, Workflow, WorkflowError};
use docureel_events::{names, PipelineEvent};
use docureel_providers::{finalize_scripts, ScriptRequest};
use serde::{Deserialize, Serialize};

use crate::deps::PipelineDeps;
use crate::payloads::{ScenePayload, ScriptGenPayload};

pub struct ScriptGenerationWorkflow {
    deps: Arc<PipelineDeps>,
}

impl ScriptGenerationWorkflow {
    pub fn new(deps: Arc<PipelineDeps>) -> Self {
        Self { deps }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct LoadedDocument {
    text: String,
    scene_count: usize,
}

#[async_trait::async_trait]
impl Workflow for ScriptGenerationWorkflow {
    fn name(&self) -> &'static str {
        "script-generation"
    }

    fn trigger(&self) -> &'static str {
        names::SCRIPT_GENERATION_REQUESTED
    }

    async fn run(&self, ctx: &StepContext) -> Result<(), WorkflowError> {
        let payload: ScriptGenPayload = ctx.trigger_payload()?;
        let deps = &self.deps;

        let loaded: LoadedDocument = ctx
            .run_step("load-document", || async {
                let project = deps
                    .store
                    .find_project(payload.project_id)
                    .await?
                    .ok_or_else(|| {
                        anyhow::anyhow!("project {} not found", payload.project_id)
                    })?;
                let document = deps
                    .store
                    .find_document(payload.document_id)
                    .await?
                    .ok_or_else(|| {
                        anyhow::anyhow!("document {} not found", payload.document_id)
                    })?;
                let text = document
                    .extracted_text
                    .filter(|t| !t.trim().is_empty())
                    .ok_or_else(|| {
                        anyhow::anyhow!(
                            "document {} has no extracted text",
                            payload.document_id
                        )
                    })?;
                Ok(LoadedDocument {
                    text,
                    scene_count: scene_count_for_duration(
                        project.target_duration_secs.max(0) as u32,
                    ) as usize,
                })
            })
            .await?;

        let scripts: Vec<String> = ctx
            .run_step("generate-script", || async {
                let generated = deps
                    .scripts
                    .generate(&ScriptRequest {
                        document_text: loaded.text.clone(),
                        scene_count: loaded.scene_count,
                    })
                    .await?;
                let finalized = finalize_scripts(deps.scripts.as_ref(), generated).await?;

                let mut ordered = finalized;
                ordered.sort_by_key(|s| s.position);
                Ok(ordered.into_iter().map(|s| s.script).collect::<Vec<_>>())
            })
            .await?;

        let first_scene_id: DbId = ctx
            .run_step("create-scenes", || async {
                let total = scripts.len();
                let specs: Vec<CreateScene> = scripts
                    .iter()
                    .enumerate()
                    .map(|(position, script)| CreateScene {
                        position: position as i32,
                        script: script.clone(),
                        background_priority: deps
                            .config
                            .background_policy
                            .priority_for(position as u32, total as u32)
                            .as_str()
                            .to_string(),
                    })
                    .collect();

                let scenes = deps.store.create_scenes(payload.project_id, &specs).await?;
                deps.store
                    .set_project_status(
                        payload.project_id,
                        ProjectStatus::ScriptGenerated,
                        None,
                    )
                    .await?;
                tracing::info!(
                    project_id = payload.project_id,
                    scenes = scenes.len(),
                    "script generated and scenes created"
                );
                scenes
                    .first()
                    .map(|s| s.id)
                    .ok_or_else(|| anyhow::anyhow!("no scenes were created"))
            })
            .await?;

        ctx.send_event(
            "start-first-scene",
            PipelineEvent::new(names::SCENE_PROCESS_REQUESTED)
                .for_project(payload.project_id)
                .for_scene(first_scene_id)
                .with_payload(serde_json::to_value(ScenePayload {
                    project_id: payload.project_id,
                    scene_id: first_scene_id,
                })?),
        )
        .await?;

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
