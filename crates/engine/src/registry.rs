//! The [`Workflow`] trait and the trigger registry.

use std::collections::HashMap;
use std::sync::Arc;

use crate::context::StepContext;
use crate::error::WorkflowError;

/// Default attempt budget for a run.
pub const DEFAULT_MAX_ATTEMPTS: i32 = 3;

/// A durable workflow definition.
///
/// Implementations must be replay-safe: the body is re-entered from the
/// top on every invocation of a run, and all side effects belong inside
/// `ctx.run_step` (or the other suspension points) so a replayed run
/// reads them from the record instead of redoing them.
#[async_trait::async_trait]
pub trait Workflow: Send + Sync {
    /// Unique workflow name, recorded on every run.
    fn name(&self) -> &'static str;

    /// Event name that spawns a new run of this workflow.
    fn trigger(&self) -> &'static str;

    /// Attempt budget before the run is marked failed.
    fn max_attempts(&self) -> i32 {
        DEFAULT_MAX_ATTEMPTS
    }

    /// The workflow body. Returning `Err(WorkflowError::Suspended(_))`
    /// means the run parked itself; any other error is a retryable
    /// failure.
    async fn run(&self, ctx: &StepContext) -> Result<(), WorkflowError>;

    /// Called exactly once when the run exhausts its attempt budget.
    /// The default does nothing.
    async fn on_failure(&self, _ctx: &StepContext, _error: &WorkflowError) {}
}

/// Maps trigger event names to the workflows they spawn.
#[derive(Default)]
pub struct WorkflowRegistry {
    by_trigger: HashMap<&'static str, Vec<Arc<dyn Workflow>>>,
    by_name: HashMap<&'static str, Arc<dyn Workflow>>,
}

impl WorkflowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a workflow under its trigger. Builder-style so worker
    /// bootstrap reads as one chain.
    pub fn register(mut self, workflow: Arc<dyn Workflow>) -> Self {
        self.by_name.insert(workflow.name(), Arc::clone(&workflow));
        self.by_trigger
            .entry(workflow.trigger())
            .or_default()
            .push(workflow);
        self
    }

    /// Workflows triggered by the named event.
    pub fn triggered_by(&self, event_name: &str) -> &[Arc<dyn Workflow>] {
        self.by_trigger
            .get(event_name)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Look up a workflow by its name.
    pub fn find(&self, workflow_name: &str) -> Option<&Arc<dyn Workflow>> {
        self.by_name.get(workflow_name)
    }

    /// All registered workflow names.
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.by_name.keys().copied().collect();
        names.sort_unstable();
        names
    }
}
