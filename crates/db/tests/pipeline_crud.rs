//! Integration tests for the repository layer against a real database.
//!
//! These exercise the invariants the workflow engine leans on: soft-deleted
//! projects disappear from reads, scene bulk creation is atomic, render
//! jobs are unique per external id, and step recording is first-write-wins.
//!
//! Run with a live Postgres and `DATABASE_URL` set:
//! `cargo test -p docureel-db -- --ignored`

use docureel_db::models::project::CreateProject;
use docureel_db::models::scene::CreateScene;
use docureel_db::repositories::{
    ProjectRepo, RenderJobRepo, SceneRepo, WorkflowRunRepo, WorkflowStepRepo,
};
use sqlx::PgPool;

fn new_project(title: &str) -> CreateProject {
    CreateProject {
        title: title.to_string(),
        target_duration_secs: 30,
        avatar_mode: None,
    }
}

fn new_scene(position: i32) -> CreateScene {
    CreateScene {
        position,
        script: format!("Scene {position} narration."),
        background_priority: "high".to_string(),
    }
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires a PostgreSQL instance"]
async fn soft_deleted_project_hidden_from_reads(pool: PgPool) {
    let project = ProjectRepo::create(&pool, &new_project("soft delete"))
        .await
        .unwrap();

    assert!(ProjectRepo::soft_delete(&pool, project.id).await.unwrap());
    assert!(ProjectRepo::find_by_id(&pool, project.id)
        .await
        .unwrap()
        .is_none());

    // Second soft delete is a no-op.
    assert!(!ProjectRepo::soft_delete(&pool, project.id).await.unwrap());

    assert!(ProjectRepo::restore(&pool, project.id).await.unwrap());
    assert!(ProjectRepo::find_by_id(&pool, project.id)
        .await
        .unwrap()
        .is_some());
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires a PostgreSQL instance"]
async fn scene_bulk_create_is_atomic(pool: PgPool) {
    let project = ProjectRepo::create(&pool, &new_project("bulk"))
        .await
        .unwrap();

    // Duplicate position violates uq_scenes_project_position; the whole
    // batch must roll back.
    let scenes = vec![new_scene(0), new_scene(1), new_scene(1)];
    assert!(SceneRepo::create_bulk(&pool, project.id, &scenes)
        .await
        .is_err());

    let stored = SceneRepo::list_by_project(&pool, project.id).await.unwrap();
    assert!(stored.is_empty(), "partial batch must not persist");

    let scenes = vec![new_scene(0), new_scene(1), new_scene(2), new_scene(3)];
    let created = SceneRepo::create_bulk(&pool, project.id, &scenes)
        .await
        .unwrap();
    assert_eq!(created.len(), 4);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires a PostgreSQL instance"]
async fn render_job_unique_per_external_id(pool: PgPool) {
    let project = ProjectRepo::create(&pool, &new_project("jobs"))
        .await
        .unwrap();
    let meta = serde_json::json!({});

    let first = RenderJobRepo::create(
        &pool, "op-123", "heygen", project.id, None, "avatar", &meta,
    )
    .await
    .unwrap();
    let second = RenderJobRepo::create(
        &pool, "op-123", "heygen", project.id, None, "avatar", &meta,
    )
    .await
    .unwrap();
    assert_eq!(first.id, second.id);

    // Terminal transitions fire once.
    assert!(RenderJobRepo::complete(&pool, "op-123").await.unwrap());
    assert!(!RenderJobRepo::complete(&pool, "op-123").await.unwrap());
    assert!(!RenderJobRepo::fail(&pool, "op-123", "late").await.unwrap());
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires a PostgreSQL instance"]
async fn step_recording_first_write_wins(pool: PgPool) {
    let run = WorkflowRunRepo::create(
        &pool,
        "scene-orchestrator",
        "scene.process.requested",
        None,
        None,
        &serde_json::json!({}),
        3,
    )
    .await
    .unwrap();

    let first = WorkflowStepRepo::record(&pool, run.id, "submit", &serde_json::json!(1))
        .await
        .unwrap();
    let replay = WorkflowStepRepo::record(&pool, run.id, "submit", &serde_json::json!(2))
        .await
        .unwrap();
    assert_eq!(first, serde_json::json!(1));
    assert_eq!(replay, serde_json::json!(1), "replay must not overwrite");
}
