//! Scene orchestrator.
//!
//! One run per scene, driving it TTS → avatar → background with explicit
//! wait-for-completion barriers, then chaining to the next scene by
//! position (scenes are deliberately serialized -- external providers are
//! rate-limit sensitive) or handing the project off to composition.
//!
//! Timeout policy: the avatar-design gate degrades to the preset avatar
//! on timeout; every stage-completion wait is fatal for the scene.

use std::sync::Arc;

use docureel_core::status::{AvatarMode, ProjectStatus, Stage, StageStatus};
use docureel_core::types::DbId;
use docureel_engine::{StepContext, WaitOutcome, Workflow, WorkflowError};
use docureel_events::{names, PipelineEvent};
use serde::{Deserialize, Serialize};

use crate::deps::PipelineDeps;
use crate::payloads::{ProjectPayload, ScenePayload};

pub struct SceneOrchestrator {
    deps: Arc<PipelineDeps>,
}

impl SceneOrchestrator {
    pub fn new(deps: Arc<PipelineDeps>) -> Self {
        Self { deps }
    }
}

/// Snapshot taken when the run first executes; replays branch on this,
/// not on live state, so the control flow is deterministic.
#[derive(Debug, Serialize, Deserialize)]
struct SceneSnapshot {
    position: i32,
    needs_avatar_design_gate: bool,
    tts: StageStatus,
    avatar: StageStatus,
    background: StageStatus,
}

/// One stage barrier: request event, completion event, wait step names.
struct Barrier {
    stage: Stage,
    request_step: &'static str,
    request_event: &'static str,
    wait_step: &'static str,
    completion_event: &'static str,
}

const BARRIERS: [Barrier; 3] = [
    Barrier {
        stage: Stage::Tts,
        request_step: "request-tts",
        request_event: names::TTS_REQUESTED,
        wait_step: "await-tts",
        completion_event: names::TTS_COMPLETED,
    },
    Barrier {
        stage: Stage::Avatar,
        request_step: "request-avatar",
        request_event: names::AVATAR_REQUESTED,
        wait_step: "await-avatar",
        completion_event: names::AVATAR_COMPLETED,
    },
    Barrier {
        stage: Stage::Background,
        request_step: "request-background",
        request_event: names::BACKGROUND_REQUESTED,
        wait_step: "await-background",
        completion_event: names::BACKGROUND_COMPLETED,
    },
];

impl SceneOrchestrator {
    fn wait_for(&self, stage: Stage) -> std::time::Duration {
        match stage {
            Stage::Tts => self.deps.config.tts_wait,
            Stage::Avatar => self.deps.config.avatar_wait,
            Stage::Background => self.deps.config.background_wait,
        }
    }

    fn snapshot_status(snapshot: &SceneSnapshot, stage: Stage) -> StageStatus {
        match stage {
            Stage::Tts => snapshot.tts,
            Stage::Avatar => snapshot.avatar,
            Stage::Background => snapshot.background,
        }
    }

    /// Persist a fatal stage timeout on the scene and the project.
    async fn fail_scene(
        &self,
        project_id: DbId,
        scene_id: DbId,
        stage: Stage,
        message: &str,
    ) -> Result<(), WorkflowError> {
        self.deps
            .store
            .set_stage_status(scene_id, stage, StageStatus::Failed, Some(message))
            .await
            .map_err(|e| WorkflowError::step("fail-scene", e.into()))?;
        self.deps
            .store
            .set_project_status(project_id, ProjectStatus::Failed, Some(message))
            .await
            .map_err(|e| WorkflowError::step("fail-scene", e.into()))?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl Workflow for SceneOrchestrator {
    fn name(&self) -> &'static str {
        "scene-orchestrator"
    }

    fn trigger(&self) -> &'static str {
        names::SCENE_PROCESS_REQUESTED
    }

    async fn run(&self, ctx: &StepContext) -> Result<(), WorkflowError> {
        let payload: ScenePayload = ctx.trigger_payload()?;
        let deps = &self.deps;

        let snapshot: SceneSnapshot = ctx
            .run_step("load-scene", || async {
                let project = deps
                    .store
                    .find_project(payload.project_id)
                    .await?
                    .ok_or_else(|| {
                        anyhow::anyhow!(
                            "project {} not found or deleted",
                            payload.project_id
                        )
                    })?;
                let scene = deps
                    .store
                    .find_scene(payload.scene_id)
                    .await?
                    .ok_or_else(|| anyhow::anyhow!("scene {} not found", payload.scene_id))?;

                let needs_gate = project.avatar_mode() == Some(AvatarMode::Custom)
                    && project.avatar_design_status() != Some(StageStatus::Completed);

                Ok(SceneSnapshot {
                    position: scene.position,
                    needs_avatar_design_gate: needs_gate,
                    tts: scene.tts_status().unwrap_or(StageStatus::Pending),
                    avatar: scene.avatar_status().unwrap_or(StageStatus::Pending),
                    background: scene.background_status().unwrap_or(StageStatus::Pending),
                })
            })
            .await?;

        // Optional avatar-design gate. Timeout here is a degradation, not
        // a failure: the scene proceeds with the preset avatar.
        if snapshot.needs_avatar_design_gate {
            let outcome = ctx
                .wait_for_event(
                    "avatar-design-gate",
                    names::AVATAR_DESIGN_COMPLETED,
                    deps.config.avatar_design_wait,
                )
                .await?;
            if outcome == WaitOutcome::TimedOut {
                tracing::warn!(
                    project_id = payload.project_id,
                    scene_id = payload.scene_id,
                    "avatar design not ready in time, proceeding with preset avatar"
                );
            }
        }

        for barrier in &BARRIERS {
            if Self::snapshot_status(&snapshot, barrier.stage) == StageStatus::Completed {
                continue;
            }

            ctx.send_event(
                barrier.request_step,
                PipelineEvent::new(barrier.request_event)
                    .for_project(payload.project_id)
                    .for_scene(payload.scene_id)
                    .with_payload(serde_json::to_value(&payload)?),
            )
            .await?;

            let outcome = ctx
                .wait_for_event(
                    barrier.wait_step,
                    barrier.completion_event,
                    self.wait_for(barrier.stage),
                )
                .await?;

            if outcome == WaitOutcome::TimedOut {
                let message = format!(
                    "{} stage timed out for scene {}",
                    barrier.stage, payload.scene_id
                );
                tracing::error!(
                    project_id = payload.project_id,
                    scene_id = payload.scene_id,
                    stage = %barrier.stage,
                    "stage wait timed out, failing scene"
                );
                self.fail_scene(payload.project_id, payload.scene_id, barrier.stage, &message)
                    .await?;
                return Ok(());
            }
        }

        // Brief pause before the next scene's first external call.
        ctx.sleep("rate-limit-pause", deps.config.rate_limit_pause)
            .await?;

        let next_scene_id: Option<DbId> = ctx
            .run_step("find-next-scene", || async {
                Ok(deps
                    .store
                    .next_scene(payload.project_id, snapshot.position)
                    .await?
                    .map(|s| s.id))
            })
            .await?;

        match next_scene_id {
            Some(next) => {
                ctx.send_event(
                    "chain-next-scene",
                    PipelineEvent::new(names::SCENE_PROCESS_REQUESTED)
                        .for_project(payload.project_id)
                        .for_scene(next)
                        .with_payload(serde_json::to_value(ScenePayload {
                            project_id: payload.project_id,
                            scene_id: next,
                        })?),
                )
                .await?;
            }
            None => {
                ctx.send_event(
                    "request-compose",
                    PipelineEvent::new(names::VIDEO_COMPOSE_REQUESTED)
                        .for_project(payload.project_id)
                        .with_payload(serde_json::to_value(ProjectPayload {
                            project_id: payload.project_id,
                        })?),
                )
                .await?;
            }
        }

        Ok(())
    }

    async fn on_failure(&self, ctx: &StepContext, error: &WorkflowError) {
        let message = error.to_string();
        if let Some(project_id) = ctx.project_id() {
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
