//! Table repositories.

pub mod asset_repo;
pub mod document_repo;
pub mod event_repo;
pub mod project_repo;
pub mod relation_repo;
pub mod render_job_repo;
pub mod scene_repo;
pub mod workflow_repo;

pub use asset_repo::AssetRepo;
pub use document_repo::DocumentRepo;
pub use event_repo::EventRepo;
pub use project_repo::ProjectRepo;
pub use relation_repo::RelationRepo;
pub use render_job_repo::RenderJobRepo;
pub use scene_repo::SceneRepo;
pub use workflow_repo::{WorkflowRunRepo, WorkflowStepRepo};
