//! Scene-processing pipeline workflows.
//!
//! Nine durable workflows cover the document-to-manifest path:
//! script generation, the per-scene orchestrator, the three stage
//! workflows (TTS, avatar, background), the custom avatar design flow,
//! the two polling loops, and the composition gate. All of them run on
//! the `docureel-engine` scheduler and go through the [`store::Store`]
//! seam for persistence.

pub mod artifact_io;
pub mod avatar_design;
pub mod avatar_stage;
pub mod background_stage;
pub mod composition;
pub mod config;
pub mod deps;
pub mod mem_store;
pub mod orchestrator;
pub mod payloads;
pub mod pg_store;
pub mod polling;
pub mod script_stage;
pub mod store;
pub mod tts_stage;

use std::sync::Arc;

use docureel_engine::WorkflowRegistry;

pub use artifact_io::StoredAsset;
pub use avatar_design::{AvatarDesignPayload, AvatarDesignWorkflow};
pub use avatar_stage::AvatarStageWorkflow;
pub use background_stage::BackgroundStageWorkflow;
pub use composition::CompositionWorkflow;
pub use config::PipelineConfig;
pub use deps::PipelineDeps;
pub use mem_store::MemStore;
pub use orchestrator::SceneOrchestrator;
pub use payloads::{PollPayload, ProjectPayload, ScenePayload, ScriptGenPayload};
pub use pg_store::PgStore;
pub use polling::{AvatarPollingWorkflow, VideoPollingWorkflow};
pub use script_stage::ScriptGenerationWorkflow;
pub use store::Store;
pub use tts_stage::TtsStageWorkflow;

/// Register the full pipeline workflow set on a registry.
pub fn register_workflows(
    registry: WorkflowRegistry,
    deps: Arc<PipelineDeps>,
) -> WorkflowRegistry {
    registry
        .register(Arc::new(ScriptGenerationWorkflow::new(deps.clone())))
        .register(Arc::new(SceneOrchestrator::new(deps.clone())))
        .register(Arc::new(TtsStageWorkflow::new(deps.clone())))
        .register(Arc::new(AvatarStageWorkflow::new(deps.clone())))
        .register(Arc::new(BackgroundStageWorkflow::new(deps.clone())))
        .register(Arc::new(AvatarDesignWorkflow::new(deps.clone())))
        .register(Arc::new(AvatarPollingWorkflow::new(deps.clone())))
        .register(Arc::new(VideoPollingWorkflow::new(deps.clone())))
        .register(Arc::new(CompositionWorkflow::new(deps)))
}
