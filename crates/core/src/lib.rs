//! Shared domain types and pure pipeline logic.
//!
//! This crate has no internal dependencies and no I/O. It holds:
//!
//! - [`types`] -- primitive aliases (`DbId`, `Timestamp`) used everywhere.
//! - [`error`] -- the domain-level [`CoreError`](error::CoreError).
//! - [`status`] -- the status state machines for projects, scenes, and
//!   render jobs.
//! - [`script`] -- generated-script validation (character budgets and
//!   forbidden content classes).
//! - [`planning`] -- scene planning from a target video duration and the
//!   background-priority policy.
//! - [`manifest`] -- composition readiness gating and manifest assembly.

pub mod error;
pub mod manifest;
pub mod planning;
pub mod script;
pub mod status;
pub mod types;

pub use error::CoreError;
