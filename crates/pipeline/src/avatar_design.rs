//! Custom avatar portrait generation.
//!
//! Project-scoped, runs concurrently with script generation. Quota and
//! missing-model failures are non-fatal: the project is flagged for the
//! preset fallback and the completion event still fires so waiting scene
//! orchestrators unblock immediately.

use std::sync::Arc;

use docureel_core::status::{AssetKind, AvatarMode, StageStatus};
use docureel_engine::{StepContext, Workflow, WorkflowError};
use docureel_events::{names, PipelineEvent};
use docureel_providers::{ImageRequest, ProviderError, ProviderErrorKind};
use serde::{Deserialize, Serialize};

use crate::artifact_io::store_image;
use crate::deps::PipelineDeps;

pub struct AvatarDesignWorkflow {
    deps: Arc<PipelineDeps>,
}

impl AvatarDesignWorkflow {
    pub fn new(deps: Arc<PipelineDeps>) -> Self {
        Self { deps }
    }
}

/// Payload of `avatar-design.generation.requested`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvatarDesignPayload {
    pub project_id: docureel_core::types::DbId,
    /// Portrait description; a generic prompt is used if omitted.
    pub prompt: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
enum DesignOutcome {
    /// Preset mode, or the design was already completed.
    Skipped,
    Generated { asset_id: i64 },
    /// Quota or model unavailable; project flagged for the preset.
    Fallback { reason: String },
}

fn is_fallback(error: &ProviderError) -> bool {
    matches!(
        error.kind,
        ProviderErrorKind::QuotaExceeded | ProviderErrorKind::NotFound
    )
}

const DEFAULT_PORTRAIT_PROMPT: &str =
    "professional presenter portrait, front-facing, neutral studio background";

#[async_trait::async_trait]
impl Workflow for AvatarDesignWorkflow {
    fn name(&self) -> &'static str {
        "avatar-design"
    }

    fn trigger(&self) -> &'static str {
        names::AVATAR_DESIGN_GENERATION_REQUESTED
    }

    async fn run(&self, ctx: &StepContext) -> Result<(), WorkflowError> {
        let payload: AvatarDesignPayload = ctx.trigger_payload()?;
        let deps = &self.deps;

        let outcome: DesignOutcome = ctx
            .run_step("generate-portrait", || async {
                let project = deps
                    .store
                    .find_project(payload.project_id)
                    .await?
                    .ok_or_else(|| {
                        anyhow::anyhow!("project {} not found", payload.project_id)
                    })?;
                if project.avatar_mode() != Some(AvatarMode::Custom)
                    || project.avatar_design_status() == Some(StageStatus::Completed)
                {
                    return Ok(DesignOutcome::Skipped);
                }

                deps.store
                    .set_avatar_design_status(
                        payload.project_id,
                        StageStatus::Generating,
                        false,
                    )
                    .await?;

                let prompt = payload
                    .prompt
                    .clone()
                    .unwrap_or_else(|| DEFAULT_PORTRAIT_PROMPT.to_string());

                match deps
                    .images
                    .generate(&ImageRequest {
                        prompt,
                        model: None,
                    })
                    .await
                {
                    Ok(image) => {
                        let stored = store_image(
                            deps,
                            payload.project_id,
                            None,
                            AssetKind::AvatarPortrait,
                            image,
                            "image",
                        )
                        .await?;
                        deps.store
                            .set_project_avatar_asset(payload.project_id, stored.asset_id)
                            .await?;
                        deps.store
                            .set_avatar_design_status(
                                payload.project_id,
                                StageStatus::Completed,
                                false,
                            )
                            .await?;
                        Ok(DesignOutcome::Generated {
                            asset_id: stored.asset_id,
                        })
                    }
                    Err(e) if is_fallback(&e) => {
                        tracing::warn!(
                            project_id = payload.project_id,
                            error = %e,
                            "custom avatar unavailable, falling back to preset"
                        );
                        deps.store
                            .set_avatar_design_status(
                                payload.project_id,
                                StageStatus::Failed,
                                true,
                            )
                            .await?;
                        Ok(DesignOutcome::Fallback {
                            reason: e.to_string(),
                        })
                    }
                    Err(e) => Err(e.into()),
                }
            })
            .await?;

        let fallback = match &outcome {
            DesignOutcome::Skipped => return Ok(()),
            DesignOutcome::Generated { asset_id } => {
                tracing::info!(
                    project_id = payload.project_id,
                    asset_id,
                    "custom avatar portrait ready"
                );
                false
            }
            DesignOutcome::Fallback { .. } => true,
        };

        // Fired on the fallback path too, so scene orchestrators waiting
        // on the design gate never run out their full wait.
        ctx.send_event(
            "emit-completed",
            PipelineEvent::new(names::AVATAR_DESIGN_COMPLETED)
                .for_project(payload.project_id)
                .with_payload(serde_json::json!({
                    "project_id": payload.project_id,
                    "fallback": fallback,
                })),
        )
        .await
    }

    async fn on_failure(&self, ctx: &StepContext, error: &WorkflowError) {
        // Design failure never fails the project; renders use the preset.
        if let Some(project_id) = ctx.project_id() {
            tracing::warn!(project_id, error = %error, "avatar design failed, preset will be used");
            if let Err(e) = self
                .deps
                .store
                .set_avatar_design_status(project_id, StageStatus::Failed, true)
                .await
            {
                tracing::error!(project_id, error = %e, "failed to persist design failure");
            }
        }
    }
}
