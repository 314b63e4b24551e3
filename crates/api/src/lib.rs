//! HTTP service for the scene pipeline.
//!
//! Exposes the avatar provider webhook, manual pipeline trigger endpoints,
//! and a health probe. Library form so integration tests can build the
//! exact router the binary serves.

pub mod config;
pub mod error;
pub mod handlers;
pub mod router;
pub mod routes;
pub mod state;

pub use config::ServerConfig;
pub use error::{AppError, AppResult};
pub use router::build_app_router;
pub use state::AppState;
