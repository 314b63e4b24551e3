//! Avatar render stage workflow.
//!
//! The render is a long-running operation: the usual path creates a
//! RenderJob and hands completion to the polling loop (or the provider
//! webhook, whichever observes the terminal state first).

use std::sync::Arc;

use docureel_core::status::{AssetKind, AvatarMode, Stage, StageStatus};
use docureel_engine::{StepContext, Workflow, WorkflowError};
use docureel_events::{names, PipelineEvent};
use docureel_providers::{AvatarRequest, Submission};
use serde::{Deserialize, Serialize};

use crate::artifact_io::store_video;
use crate::deps::PipelineDeps;
use crate::payloads::{PollPayload, ScenePayload};

pub const AVATAR_PROVIDER: &str = "avatar";

pub struct AvatarStageWorkflow {
    deps: Arc<PipelineDeps>,
}

impl AvatarStageWorkflow {
    pub fn new(deps: Arc<PipelineDeps>) -> Self {
        Self { deps }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct AvatarInput {
    audio_url: String,
    portrait_url: String,
}

/// What the submit step recorded.
#[derive(Debug, Serialize, Deserialize)]
enum SubmitOutcome {
    AlreadyCompleted,
    Stored { asset_id: i64, url: String },
    Polling { external_job_id: String },
}

#[async_trait::async_trait]
impl Workflow for AvatarStageWorkflow {
    fn name(&self) -> &'static str {
        "avatar-stage"
    }

    fn trigger(&self) -> &'static str {
        names::AVATAR_REQUESTED
    }

    async fn run(&self, ctx: &StepContext) -> Result<(), WorkflowError> {
        let payload: ScenePayload = ctx.trigger_payload()?;
        let deps = &self.deps;

        let input: Option<AvatarInput> = ctx
            .run_step("load-scene", || async {
                let scene = deps
                    .store
                    .find_scene(payload.scene_id)
                    .await?
                    .ok_or_else(|| anyhow::anyhow!("scene {} not found", payload.scene_id))?;
                if scene.avatar_status() == Some(StageStatus::Completed) {
                    return Ok(None);
                }

                // The narration audio is a hard prerequisite.
                let audio_asset_id = scene.audio_asset_id.ok_or_else(|| {
                    anyhow::anyhow!("scene {} has no audio asset yet", payload.scene_id)
                })?;
                let audio = deps
                    .store
                    .find_asset(audio_asset_id)
                    .await?
                    .ok_or_else(|| anyhow::anyhow!("audio asset {audio_asset_id} not found"))?;

                let project = deps
                    .store
                    .find_project(payload.project_id)
                    .await?
                    .ok_or_else(|| {
                        anyhow::anyhow!("project {} not found", payload.project_id)
                    })?;

                // A completed custom design supplies the portrait;
                // anything else falls back to the preset avatar.
                let portrait_url = if project.avatar_mode() == Some(AvatarMode::Custom)
                    && project.avatar_design_status() == Some(StageStatus::Completed)
                {
                    match project.avatar_asset_id {
                        Some(asset_id) => deps
                            .store
                            .find_asset(asset_id)
                            .await?
                            .map(|a| a.file_path),
                        None => None,
                    }
                } else {
                    None
                };

                deps.store
                    .set_stage_status(
                        payload.scene_id,
                        Stage::Avatar,
                        StageStatus::Generating,
                        None,
                    )
                    .await?;
                Ok(Some(AvatarInput {
                    audio_url: audio.file_path,
                    portrait_url: portrait_url
                        .unwrap_or_else(|| deps.config.preset_avatar_url.clone()),
                }))
            })
            .await?;

        let Some(input) = input else {
            tracing::debug!(scene_id = payload.scene_id, "avatar already completed");
            return self.emit_completed(ctx, &payload).await;
        };

        let outcome: SubmitOutcome = ctx
            .run_step("submit", || async {
                let submission = deps
                    .avatars
                    .submit(&AvatarRequest {
                        audio_url: input.audio_url.clone(),
                        portrait_url: input.portrait_url.clone(),
                    })
                    .await?;

                match submission {
                    Submission::Completed(video) => {
                        let stored = store_video(
                            deps,
                            payload.project_id,
                            payload.scene_id,
                            AssetKind::AvatarVideo,
                            video,
                            AVATAR_PROVIDER,
                            None,
                        )
                        .await?;
                        if !deps
                            .store
                            .complete_stage(payload.scene_id, Stage::Avatar, stored.asset_id)
                            .await?
                        {
                            return Ok(SubmitOutcome::AlreadyCompleted);
                        }
                        Ok(SubmitOutcome::Stored {
                            asset_id: stored.asset_id,
                            url: stored.url,
                        })
                    }
                    Submission::Accepted(handle) => {
                        deps.store
                            .create_render_job(
                                &handle.external_id,
                                AVATAR_PROVIDER,
                                payload.project_id,
                                Some(payload.scene_id),
                                AssetKind::AvatarVideo.as_str(),
                            )
                            .await?;
                        Ok(SubmitOutcome::Polling {
                            external_job_id: handle.external_id,
                        })
                    }
                }
            })
            .await?;

        match outcome {
            SubmitOutcome::AlreadyCompleted | SubmitOutcome::Stored { .. } => {
                self.emit_completed(ctx, &payload).await
            }
            SubmitOutcome::Polling { external_job_id } => {
                tracing::info!(
                    scene_id = payload.scene_id,
                    external_job_id = %external_job_id,
                    "avatar render submitted, handing off to polling loop"
                );
                ctx.send_event(
                    "start-polling",
                    PipelineEvent::new(names::AVATAR_POLLING_REQUESTED)
                        .for_project(payload.project_id)
                        .for_scene(payload.scene_id)
                        .with_payload(serde_json::to_value(PollPayload {
                            project_id: payload.project_id,
                            scene_id: payload.scene_id,
                            external_job_id,
                            attempt: 0,
                            max_attempts: deps.config.avatar_poll_max_attempts,
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
                .set_stage_status(scene_id, Stage::Avatar, StageStatus::Failed, Some(&message))
                .await
            {
                tracing::error!(scene_id, error = %e, "failed to persist avatar failure");
            }
        }
    }
}

impl AvatarStageWorkflow {
    async fn emit_completed(
        &self,
        ctx: &StepContext,
        payload: &ScenePayload,
    ) -> Result<(), WorkflowError> {
        ctx.send_event(
            "emit-completed",
            PipelineEvent::new(names::AVATAR_COMPLETED)
                .for_project(payload.project_id)
                .for_scene(payload.scene_id)
                .with_payload(serde_json::to_value(payload)?),
        )
        .await
    }
}
