//! Row structs and DTOs, one module per table group.

pub mod asset;
pub mod document;
pub mod event;
pub mod project;
pub mod render_job;
pub mod scene;
pub mod workflow;
