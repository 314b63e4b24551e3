//! Background generation stage workflow.
//!
//! The scene's `background_priority` picks the strategy:
//! - `low` stores a static placeholder, no external call;
//! - `medium` generates a still image synchronously;
//! - `high` generates a still image, then chains it into an
//!   image-to-video render completed by the polling loop.

use std::sync::Arc;

use docureel_core::status::{AssetKind, BackgroundPriority, Stage, StageStatus};
use docureel_engine::{StepContext, Workflow, WorkflowError};
use docureel_events::{names, PipelineEvent};
use docureel_providers::{ImageArtifact, ImageRequest, Submission, VideoRequest};
use serde::{Deserialize, Serialize};

use crate::artifact_io::{store_image, store_video, StoredAsset};
use crate::deps::PipelineDeps;
use crate::payloads::{PollPayload, ScenePayload};

pub const BACKGROUND_VIDEO_PROVIDER: &str = "video";

/// Clip length requested for high-priority backgrounds.
const BACKGROUND_VIDEO_SECS: u32 = 8;

/// Low-priority scenes get this instead of a generated image.
const PLACEHOLDER_SVG: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" width="1920" height="1080"><defs><linearGradient id="g" x1="0" y1="0" x2="1" y2="1"><stop offset="0" stop-color="#1e293b"/><stop offset="1" stop-color="#0f172a"/></linearGradient></defs><rect width="1920" height="1080" fill="url(#g)"/></svg>"##;

/// Prompt fed to the image model, derived from the scene script.
fn background_prompt(script: &str) -> String {
    let excerpt: String = script.chars().take(300).collect();
    format!(
        "cinematic abstract background illustrating the following narration, \
         no text, no people: {excerpt}"
    )
}

pub struct BackgroundStageWorkflow {
    deps: Arc<PipelineDeps>,
}

impl BackgroundStageWorkflow {
    pub fn new(deps: Arc<PipelineDeps>) -> Self {
        Self { deps }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct BackgroundPlan {
    priority: BackgroundPriority,
    script: String,
}

#[derive(Debug, Serialize, Deserialize)]
enum RenderOutcome {
    Done,
    Polling { external_job_id: String },
}

#[async_trait::async_trait]
impl Workflow for BackgroundStageWorkflow {
    fn name(&self) -> &'static str {
        "background-stage"
    }

    fn trigger(&self) -> &'static str {
        names::BACKGROUND_REQUESTED
    }

    async fn run(&self, ctx: &StepContext) -> Result<(), WorkflowError> {
        let payload: ScenePayload = ctx.trigger_payload()?;
        let deps = &self.deps;

        let plan: Option<BackgroundPlan> = ctx
            .run_step("load-scene", || async {
                let scene = deps
                    .store
                    .find_scene(payload.scene_id)
                    .await?
                    .ok_or_else(|| anyhow::anyhow!("scene {} not found", payload.scene_id))?;
                if scene.background_status() == Some(StageStatus::Completed) {
                    return Ok(None);
                }
                let priority = scene
                    .background_priority()
                    .ok_or_else(|| {
                        anyhow::anyhow!(
                            "scene {} has invalid background priority '{}'",
                            payload.scene_id,
                            scene.background_priority
                        )
                    })?;
                deps.store
                    .set_stage_status(
                        payload.scene_id,
                        Stage::Background,
                        StageStatus::Generating,
                        None,
                    )
                    .await?;
                Ok(Some(BackgroundPlan {
                    priority,
                    script: scene.script,
                }))
            })
            .await?;

        let Some(plan) = plan else {
            tracing::debug!(scene_id = payload.scene_id, "background already completed");
            return self.emit_completed(ctx, &payload).await;
        };

        if plan.priority == BackgroundPriority::Low {
            ctx.run_step("store-placeholder", || async {
                let stored = store_image(
                    deps,
                    payload.project_id,
                    Some(payload.scene_id),
                    AssetKind::BackgroundImage,
                    ImageArtifact {
                        bytes: PLACEHOLDER_SVG.as_bytes().to_vec(),
                        content_type: "image/svg+xml".to_string(),
                    },
                    "placeholder",
                )
                .await?;
                self.finish_stage(&payload, stored.asset_id).await
            })
            .await?;
            return self.emit_completed(ctx, &payload).await;
        }

        let image: StoredAsset = ctx
            .run_step("generate-image", || async {
                let artifact = deps
                    .images
                    .generate(&ImageRequest {
                        prompt: background_prompt(&plan.script),
                        model: None,
                    })
                    .await?;
                Ok(store_image(
                    deps,
                    payload.project_id,
                    Some(payload.scene_id),
                    AssetKind::BackgroundImage,
                    artifact,
                    "image",
                )
                .await?)
            })
            .await?;

        if plan.priority == BackgroundPriority::Medium {
            ctx.run_step("complete-with-image", || async {
                self.finish_stage(&payload, image.asset_id).await
            })
            .await?;
            return self.emit_completed(ctx, &payload).await;
        }

        // High priority: animate the still image.
        let outcome: RenderOutcome = ctx
            .run_step("submit-video", || async {
                let submission = deps
                    .videos
                    .submit(&VideoRequest {
                        image_url: image.url.clone(),
                        prompt: background_prompt(&plan.script),
                        duration_secs: BACKGROUND_VIDEO_SECS,
                    })
                    .await?;
                match submission {
                    Submission::Completed(video) => {
                        let stored = store_video(
                            deps,
                            payload.project_id,
                            payload.scene_id,
                            AssetKind::BackgroundVideo,
                            video,
                            BACKGROUND_VIDEO_PROVIDER,
                            None,
                        )
                        .await?;
                        self.finish_stage(&payload, stored.asset_id).await?;
                        Ok(RenderOutcome::Done)
                    }
                    Submission::Accepted(handle) => {
                        deps.store
                            .create_render_job(
                                &handle.external_id,
                                BACKGROUND_VIDEO_PROVIDER,
                                payload.project_id,
                                Some(payload.scene_id),
                                AssetKind::BackgroundVideo.as_str(),
                            )
                            .await?;
                        Ok(RenderOutcome::Polling {
                            external_job_id: handle.external_id,
                        })
                    }
                }
            })
            .await?;

        match outcome {
            RenderOutcome::Done => self.emit_completed(ctx, &payload).await,
            RenderOutcome::Polling { external_job_id } => {
                tracing::info!(
                    scene_id = payload.scene_id,
                    external_job_id = %external_job_id,
                    "background video submitted, handing off to polling loop"
                );
                ctx.send_event(
                    "start-polling",
                    PipelineEvent::new(names::VIDEO_POLLING_REQUESTED)
                        .for_project(payload.project_id)
                        .for_scene(payload.scene_id)
                        .with_payload(serde_json::to_value(PollPayload {
                            project_id: payload.project_id,
                            scene_id: payload.scene_id,
                            external_job_id,
                            attempt: 0,
                            max_attempts: deps.config.video_poll_max_attempts,
                        })?),
                )
                .await
            }
        }
    }

    async fn on_failure(&self, ctx: &StepContext, error: &WorkflowError) {
        if let Some(scene_id) = ctx.scene_id() {
            let message = error.to_string();
            if let Err(e) = self
                .deps
                .store
                .set_stage_status(
                    scene_id,
                    Stage::Background,
                    StageStatus::Failed,
                    Some(&message),
                )
                .await
            {
                tracing::error!(scene_id, error = %e, "failed to persist background failure");
            }
        }
    }
}

impl BackgroundStageWorkflow {
    async fn finish_stage(
        &self,
        payload: &ScenePayload,
        asset_id: docureel_core::types::DbId,
    ) -> anyhow::Result<()> {
        if !self
            .deps
            .store
            .complete_stage(payload.scene_id, Stage::Background, asset_id)
            .await?
        {
            tracing::warn!(
                scene_id = payload.scene_id,
                "background stage already completed, keeping existing artifact"
            );
        }
        Ok(())
    }

    async fn emit_completed(
        &self,
        ctx: &StepContext,
        payload: &ScenePayload,
    ) -> Result<(), WorkflowError> {
        ctx.send_event(
            "emit-completed",
            PipelineEvent::new(names::BACKGROUND_COMPLETED)
                .for_project(payload.project_id)
                .for_scene(payload.scene_id)
                .with_payload(serde_json::to_value(payload)?),
        )
        .await
    }
}
