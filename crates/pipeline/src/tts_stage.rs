//! TTS stage workflow. Synthesis is synchronous: one invocation takes the
//! scene from `pending` to `completed`.

use std::sync::Arc;

use docureel_core::status::{Stage, StageStatus};
use docureel_engine::{StepContext, Workflow, WorkflowError};
use docureel_events::{names, PipelineEvent};
use docureel_providers::TtsRequest;

use crate::artifact_io::{store_audio, StoredAsset};
use crate::deps::PipelineDeps;
use crate::payloads::ScenePayload;

pub struct TtsStageWorkflow {
    deps: Arc<PipelineDeps>,
}

impl TtsStageWorkflow {
    pub fn new(deps: Arc<PipelineDeps>) -> Self {
        Self { deps }
    }
}

#[async_trait::async_trait]
impl Workflow for TtsStageWorkflow {
    fn name(&self) -> &'static str {
        "tts-stage"
    }

    fn trigger(&self) -> &'static str {
        names::TTS_REQUESTED
    }

    async fn run(&self, ctx: &StepContext) -> Result<(), WorkflowError> {
        let payload: ScenePayload = ctx.trigger_payload()?;
        let deps = &self.deps;

        let script: Option<String> = ctx
            .run_step("load-scene", || async {
                let scene = deps
                    .store
                    .find_scene(payload.scene_id)
                    .await?
                    .ok_or_else(|| anyhow::anyhow!("scene {} not found", payload.scene_id))?;
                // Re-requested after completion: nothing to synthesize.
                if scene.tts_status() == Some(StageStatus::Completed) {
                    return Ok(None);
                }
                deps.store
                    .set_stage_status(
                        payload.scene_id,
                        Stage::Tts,
                        StageStatus::Generating,
                        None,
                    )
                    .await?;
                Ok(Some(scene.script))
            })
            .await?;

        let Some(script) = script else {
            tracing::debug!(scene_id = payload.scene_id, "tts already completed");
            return self.emit_completed(ctx, &payload, None).await;
        };

        let stored: StoredAsset = ctx
            .run_step("synthesize-and-store", || async {
                let audio = deps
                    .tts
                    .synthesize(&TtsRequest {
                        script,
                        voice: None,
                    })
                    .await?;
                let stored = store_audio(
                    deps,
                    payload.project_id,
                    payload.scene_id,
                    audio,
                    "tts",
                )
                .await?;
                if !deps
                    .store
                    .complete_stage(payload.scene_id, Stage::Tts, stored.asset_id)
                    .await?
                {
                    tracing::warn!(
                        scene_id = payload.scene_id,
                        "tts stage already completed, keeping existing artifact"
                    );
                }
                Ok(stored)
            })
            .await?;

        tracing::info!(
            scene_id = payload.scene_id,
            asset_id = stored.asset_id,
            "tts completed"
        );
        self.emit_completed(ctx, &payload, Some(stored)).await
    }

    async fn on_failure(&self, ctx: &StepContext, error: &WorkflowError) {
        if let Some(scene_id) = ctx.scene_id() {
            let message = error.to_string();
            if let Err(e) = self
                .deps
                .store
                .set_stage_status(scene_id, Stage::Tts, StageStatus::Failed, Some(&message))
                .await
            {
                tracing::error!(scene_id, error = %e, "failed to persist tts failure");
            }
        }
    }
}

impl TtsStageWorkflow {
    async fn emit_completed(
        &self,
        ctx: &StepContext,
        payload: &ScenePayload,
        stored: Option<StoredAsset>,
    ) -> Result<(), WorkflowError> {
        let event_payload = match stored {
            Some(stored) => serde_json::to_value(&stored)?,
            None => serde_json::to_value(payload)?,
        };
        ctx.send_event(
            "emit-completed",
            PipelineEvent::new(names::TTS_COMPLETED)
                .for_project(payload.project_id)
                .for_scene(payload.scene_id)
                .with_payload(event_payload),
        )
        .await
    }
}
