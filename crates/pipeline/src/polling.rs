//! Polling loops for long-running renders.
//!
//! Each poll tick is its own durable run: sleep, poll once, then either
//! finish the stage, re-emit the polling event with `attempt + 1`, or
//! give up at the attempt budget. Restart-safe by construction -- a tick
//! lost mid-flight is replayed from its recorded steps.

use std::sync::Arc;

use docureel_core::status::{AssetKind, Stage, StageStatus};
use docureel_core::types::DbId;
use docureel_engine::{StepContext, Workflow, WorkflowError};
use docureel_events::{names, PipelineEvent};
use docureel_providers::{JobHandle, PollStatus, VideoArtifact};
use serde::{Deserialize, Serialize};

use crate::artifact_io::store_video;
use crate::deps::PipelineDeps;
use crate::payloads::PollPayload;

/// Which render family a polling workflow drives.
#[derive(Debug, Clone, Copy)]
enum PollTarget {
    Avatar,
    BackgroundVideo,
}

impl PollTarget {
    fn stage(self) -> Stage {
        match self {
            Self::Avatar => Stage::Avatar,
            Self::BackgroundVideo => Stage::Background,
        }
    }

    fn asset_kind(self) -> AssetKind {
        match self {
            Self::Avatar => AssetKind::AvatarVideo,
            Self::BackgroundVideo => AssetKind::BackgroundVideo,
        }
    }

    fn provider(self) -> &'static str {
        match self {
            Self::Avatar => "avatar",
            Self::BackgroundVideo => "video",
        }
    }

    fn completed_event(self) -> &'static str {
        match self {
            Self::Avatar => names::AVATAR_COMPLETED,
            Self::BackgroundVideo => names::BACKGROUND_COMPLETED,
        }
    }

    fn repoll_event(self) -> &'static str {
        match self {
            Self::Avatar => names::AVATAR_POLLING_REQUESTED,
            Self::BackgroundVideo => names::VIDEO_POLLING_REQUESTED,
        }
    }
}

/// What one poll tick recorded.
#[derive(Debug, Serialize, Deserialize)]
enum PollOutcome {
    Pending,
    Completed { asset_id: DbId },
    /// The webhook finished the job before this tick did; nothing was
    /// stored and no event is owed.
    AlreadyCompleted,
    /// Render failed or the attempt budget ran out; job and stage are
    /// already marked failed.
    Failed { message: String },
}

async fn poll_once(
    deps: &PipelineDeps,
    target: PollTarget,
    handle: &JobHandle,
) -> Result<PollStatus<VideoArtifact>, anyhow::Error> {
    let status = match target {
        PollTarget::Avatar => deps.avatars.poll(handle).await?,
        PollTarget::BackgroundVideo => deps.videos.poll(handle).await?,
    };
    Ok(status)
}

async fn run_poll_tick(
    deps: &Arc<PipelineDeps>,
    ctx: &StepContext,
    target: PollTarget,
) -> Result<(), WorkflowError> {
    let payload: PollPayload = ctx.trigger_payload()?;

    ctx.sleep("inter-poll-delay", deps.config.poll_interval).await?;

    let outcome: PollOutcome = ctx
        .run_step("poll", || async {
            deps.store.record_poll_attempt(&payload.external_job_id).await?;
            let handle = JobHandle::new(payload.external_job_id.clone());

            match poll_once(deps, target, &handle).await? {
                PollStatus::Pending => {
                    if payload.attempt + 1 >= payload.max_attempts {
                        let message = format!(
                            "{} render {} still pending after {} polls",
                            target.provider(),
                            payload.external_job_id,
                            payload.max_attempts
                        );
                        deps.store
                            .fail_render_job(&payload.external_job_id, &message)
                            .await?;
                        return Ok(PollOutcome::Failed { message });
                    }
                    Ok(PollOutcome::Pending)
                }
                PollStatus::Completed(video) => {
                    // Claim the terminal transition before storing anything,
                    // or a webhook that won the race leaves this tick with a
                    // duplicate asset and an orphaned blob.
                    if !deps
                        .store
                        .complete_render_job(&payload.external_job_id)
                        .await?
                    {
                        return Ok(PollOutcome::AlreadyCompleted);
                    }
                    let stored = store_video(
                        deps,
                        payload.project_id,
                        payload.scene_id,
                        target.asset_kind(),
                        video,
                        target.provider(),
                        Some(&payload.external_job_id),
                    )
                    .await?;
                    if !deps
                        .store
                        .complete_stage(payload.scene_id, target.stage(), stored.asset_id)
                        .await?
                    {
                        // Stage finished through another path; its asset stands.
                        tracing::warn!(
                            scene_id = payload.scene_id,
                            external_job_id = %payload.external_job_id,
                            "stage already completed before poll result"
                        );
                    }
                    Ok(PollOutcome::Completed {
                        asset_id: stored.asset_id,
                    })
                }
                PollStatus::Failed(message) => {
                    deps.store
                        .fail_render_job(&payload.external_job_id, &message)
                        .await?;
                    Ok(PollOutcome::Failed { message })
                }
            }
        })
        .await?;

    match outcome {
        PollOutcome::Pending => {
            ctx.send_event(
                "schedule-next-poll",
                PipelineEvent::new(target.repoll_event())
                    .for_project(payload.project_id)
                    .for_scene(payload.scene_id)
                    .with_payload(serde_json::to_value(PollPayload {
                        attempt: payload.attempt + 1,
                        ..payload
                    })?),
            )
            .await
        }
        PollOutcome::Completed { asset_id } => {
            tracing::info!(
                scene_id = payload.scene_id,
                asset_id,
                external_job_id = %payload.external_job_id,
                "render completed via polling"
            );
            ctx.send_event(
                "emit-completed",
                PipelineEvent::new(target.completed_event())
                    .for_project(payload.project_id)
                    .for_scene(payload.scene_id)
                    .with_payload(serde_json::json!({
                        "project_id": payload.project_id,
                        "scene_id": payload.scene_id,
                        "asset_id": asset_id,
                    })),
            )
            .await
        }
        PollOutcome::AlreadyCompleted => {
            // The winning path already published the completion event.
            tracing::info!(
                scene_id = payload.scene_id,
                external_job_id = %payload.external_job_id,
                "render already completed before poll result"
            );
            Ok(())
        }
        PollOutcome::Failed { message } => Err(WorkflowError::step(
            "poll",
            anyhow::anyhow!("render {} failed: {message}", payload.external_job_id),
        )),
    }
}

async fn persist_poll_failure(deps: &PipelineDeps, ctx: &StepContext, stage: Stage, error: &WorkflowError) {
    if let Some(scene_id) = ctx.scene_id() {
        let message = error.to_string();
        if let Err(e) = deps
            .store
            .set_stage_status(scene_id, stage, StageStatus::Failed, Some(&message))
            .await
        {
            tracing::error!(scene_id, error = %e, "failed to persist render failure");
        }
    }
}

pub struct AvatarPollingWorkflow {
    deps: Arc<PipelineDeps>,
}

impl AvatarPollingWorkflow {
    pub fn new(deps: Arc<PipelineDeps>) -> Self {
        Self { deps }
    }
}

#[async_trait::async_trait]
impl Workflow for AvatarPollingWorkflow {
    fn name(&self) -> &'static str {
        "avatar-polling"
    }

    fn trigger(&self) -> &'static str {
        names::AVATAR_POLLING_REQUESTED
    }

    async fn run(&self, ctx: &StepContext) -> Result<(), WorkflowError> {
        run_poll_tick(&self.deps, ctx, PollTarget::Avatar).await
    }

    async fn on_failure(&self, ctx: &StepContext, error: &WorkflowError) {
        persist_poll_failure(&self.deps, ctx, Stage::Avatar, error).await;
    }
}

pub struct VideoPollingWorkflow {
    deps: Arc<PipelineDeps>,
}

impl VideoPollingWorkflow {
    pub fn new(deps: Arc<PipelineDeps>) -> Self {
        Self { deps }
    }
}

#[async_trait::async_trait]
impl Workflow for VideoPollingWorkflow {
    fn name(&self) -> &'static str {
        "video-polling"
    }

    fn trigger(&self) -> &'static str {
        names::VIDEO_POLLING_REQUESTED
    }

    async fn run(&self, ctx: &StepContext) -> Result<(), WorkflowError> {
        run_poll_tick(&self.deps, ctx, PollTarget::BackgroundVideo).await
    }

    async fn on_failure(&self, ctx: &StepContext, error: &WorkflowError) {
        persist_poll_failure(&self.deps, ctx, Stage::Background, error).await;
    }
}
