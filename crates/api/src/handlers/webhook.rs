//! Inbound webhook from the avatar render provider.
//!
//! Completion can arrive here or through the polling loop, in either
//! order; the terminal-once RenderJob transition and the stage completion
//! guard make the two paths idempotent with each other.

use axum::extract::State;
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use axum::Json;
use docureel_core::status::{Stage, StageStatus};
use docureel_db::models::asset::CreateAsset;
use docureel_events::{names, PipelineEvent};
use serde::Deserialize;
use serde_json::json;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Webhook body posted by the avatar provider.
#[derive(Debug, Deserialize)]
pub struct AvatarWebhookBody {
    /// The provider's render id (our `external_job_id`).
    pub id: String,
    /// `done`, `error`, or `rejected`.
    pub status: String,
    pub result_url: Option<String>,
    pub error: Option<String>,
}

fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), AppError> {
    let presented = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| AppError::Unauthorized("missing bearer token".to_string()))?;
    if presented != state.config.avatar_webhook_token {
        return Err(AppError::Unauthorized("invalid webhook token".to_string()));
    }
    Ok(())
}

/// `POST /webhooks/avatar`
pub async fn avatar_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<AvatarWebhookBody>,
) -> AppResult<Json<serde_json::Value>> {
    authorize(&state, &headers)?;

    let job = state
        .store
        .find_render_job(&body.id)
        .await?
        .ok_or_else(|| AppError::BadRequest(format!("unknown render job '{}'", body.id)))?;

    if job.status != "processing" {
        tracing::info!(
            external_job_id = %body.id,
            status = %job.status,
            "webhook for already-terminal render job ignored"
        );
        return Ok(Json(json!({ "status": "ignored" })));
    }

    let scene_id = job
        .scene_id
        .ok_or_else(|| AppError::BadRequest("render job has no scene".to_string()))?;

    match body.status.as_str() {
        "done" => {
            let result_url = body.result_url.ok_or_else(|| {
                AppError::BadRequest("done webhook without result_url".to_string())
            })?;

            let asset = state
                .store
                .create_asset(&CreateAsset {
                    project_id: job.project_id,
                    scene_id: Some(scene_id),
                    kind: job.kind.clone(),
                    file_path: result_url.clone(),
                    source_url: Some(result_url),
                    provider: Some(job.provider.clone()),
                    provider_job_id: Some(job.external_job_id.clone()),
                    cost_cents: None,
                    content_sha256: None,
                })
                .await?;
            state.store.complete_render_job(&body.id).await?;
            if !state
                .store
                .complete_stage(scene_id, Stage::Avatar, asset.id)
                .await?
            {
                tracing::warn!(
                    scene_id,
                    external_job_id = %body.id,
                    "stage already completed before webhook"
                );
            }

            state
                .router
                .publish(
                    PipelineEvent::new(names::AVATAR_COMPLETED)
                        .for_project(job.project_id)
                        .for_scene(scene_id)
                        .with_payload(json!({
                            "project_id": job.project_id,
                            "scene_id": scene_id,
                            "asset_id": asset.id,
                        })),
                )
                .await?;

            tracing::info!(
                scene_id,
                asset_id = asset.id,
                external_job_id = %body.id,
                "avatar render completed via webhook"
            );
            Ok(Json(json!({ "status": "processed", "asset_id": asset.id })))
        }
        "error" | "rejected" => {
            let message = body
                .error
                .unwrap_or_else(|| format!("render {}", body.status));
            state.store.fail_render_job(&body.id, &message).await?;
            state
                .store
                .set_stage_status(scene_id, Stage::Avatar, StageStatus::Failed, Some(&message))
                .await?;
            tracing::warn!(
                scene_id,
                external_job_id = %body.id,
                error = %message,
                "avatar render failed via webhook"
            );
            Ok(Json(json!({ "status": "failed" })))
        }
        other => Err(AppError::BadRequest(format!(
            "unknown webhook status '{other}'"
        ))),
    }
}
