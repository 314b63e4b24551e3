//! Manual pipeline trigger endpoints.
//!
//! These exist for operators and the frontend's "retry" buttons: they
//! publish the same events the workflows chain with, so a manual trigger
//! and an automatic one are indistinguishable to the engine.

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use docureel_core::status::{AvatarMode, StageStatus};
use docureel_core::types::DbId;
use docureel_core::CoreError;
use docureel_db::models::project::Project;
use docureel_db::repositories::RelationRepo;
use docureel_events::{names, PipelineEvent};
use docureel_pipeline::{AvatarDesignPayload, ProjectPayload, ScenePayload};
use serde_json::json;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Resolve the caller from the `x-user-id` header and require the
/// `editor` relation on the project.
async fn authorize_editor(
    state: &AppState,
    headers: &HeaderMap,
    project_id: DbId,
) -> Result<(), AppError> {
    let subject = headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::Unauthorized("missing x-user-id header".to_string()))?;

    let allowed = RelationRepo::check(
        &state.pool,
        subject,
        "project",
        &project_id.to_string(),
        "editor",
    )
    .await?;
    if !allowed {
        return Err(AppError::Forbidden(format!(
            "subject '{subject}' is not an editor of project {project_id}"
        )));
    }
    Ok(())
}

async fn load_project(state: &AppState, project_id: DbId) -> Result<Project, AppError> {
    state
        .store
        .find_project(project_id)
        .await?
        .ok_or_else(|| {
            AppError::Core(CoreError::NotFound {
                entity: "project",
                id: project_id,
            })
        })
}

/// `POST /api/v1/projects/{project_id}/process`
///
/// Starts (or restarts) per-scene processing from the first scene. For a
/// custom-avatar project whose portrait has not been generated yet, the
/// design workflow is kicked off alongside so the orchestrator's gate has
/// something to wait for.
pub async fn start_processing(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(project_id): Path<DbId>,
) -> AppResult<(StatusCode, Json<serde_json::Value>)> {
    authorize_editor(&state, &headers, project_id).await?;
    let project = load_project(&state, project_id).await?;

    let scenes = state.store.list_scenes(project_id).await?;
    let first = scenes.iter().min_by_key(|s| s.position).ok_or_else(|| {
        AppError::BadRequest(format!("project {project_id} has no scenes to process"))
    })?;

    if project.avatar_mode() == Some(AvatarMode::Custom)
        && project.avatar_design_status() == Some(StageStatus::Pending)
    {
        state
            .router
            .publish(
                PipelineEvent::new(names::AVATAR_DESIGN_GENERATION_REQUESTED)
                    .for_project(project_id)
                    .with_payload(serde_json::to_value(AvatarDesignPayload {
                        project_id,
                        prompt: None,
                    })?),
            )
            .await?;
    }

    state
        .router
        .publish(
            PipelineEvent::new(names::SCENE_PROCESS_REQUESTED)
                .for_project(project_id)
                .for_scene(first.id)
                .with_payload(serde_json::to_value(ScenePayload {
                    project_id,
                    scene_id: first.id,
                })?),
        )
        .await?;

    tracing::info!(project_id, scene_id = first.id, "scene processing requested");
    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "status": "accepted", "first_scene_id": first.id })),
    ))
}

/// `POST /api/v1/projects/{project_id}/compose`
///
/// Requests composition directly. The workflow re-checks scene readiness,
/// so calling this on an unfinished project fails the run, not the API.
pub async fn request_composition(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(project_id): Path<DbId>,
) -> AppResult<(StatusCode, Json<serde_json::Value>)> {
    authorize_editor(&state, &headers, project_id).await?;
    load_project(&state, project_id).await?;

    state
        .router
        .publish(
            PipelineEvent::new(names::VIDEO_COMPOSE_REQUESTED)
                .for_project(project_id)
                .with_payload(serde_json::to_value(ProjectPayload { project_id })?),
        )
        .await?;

    tracing::info!(project_id, "composition requested");
    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "status": "accepted" })),
    ))
}
