use std::sync::Arc;

use docureel_engine::EventRouter;
use docureel_pipeline::Store;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via
/// `State<AppState>`. Cheaply cloneable (everything is behind `Arc` or is
/// already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool (permission checks, health probe).
    pub pool: docureel_db::DbPool,
    pub config: Arc<ServerConfig>,
    /// Pipeline persistence seam shared with the workflows.
    pub store: Arc<dyn Store>,
    /// Durable event router; publishing here spawns workflow runs.
    pub router: Arc<EventRouter>,
}
