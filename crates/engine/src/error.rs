//! Engine error types.

/// Why a workflow invocation stopped before reaching the end of its body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Suspension {
    /// Parked until a wake time (durable sleep).
    Sleeping,
    /// Parked until a named event arrives or the wait times out.
    WaitingForEvent,
}

/// Error type flowing out of workflow bodies.
///
/// `Suspended` is control flow, not failure: the context has already
/// parked the run and the scheduler must simply stop executing. Every
/// other variant counts against the run's attempt budget.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    /// The run parked itself at a suspension point.
    #[error("workflow suspended ({0:?})")]
    Suspended(Suspension),

    /// A step body failed.
    #[error("step '{step}' failed: {source}")]
    Step {
        step: String,
        #[source]
        source: anyhow::Error,
    },

    /// A recorded step output (or the trigger payload) did not
    /// deserialize to the expected type.
    #[error("serialization error in step '{step}': {source}")]
    Serialization {
        step: String,
        #[source]
        source: serde_json::Error,
    },

    /// The run history store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<serde_json::Error> for WorkflowError {
    fn from(source: serde_json::Error) -> Self {
        Self::Serialization {
            step: "payload".to_string(),
            source,
        }
    }
}

impl WorkflowError {
    /// Wrap a step body failure.
    pub fn step(step: &str, source: anyhow::Error) -> Self {
        Self::Step {
            step: step.to_string(),
            source,
        }
    }

    /// Whether this error is actually a suspension (not a failure).
    pub fn is_suspension(&self) -> bool {
        matches!(self, Self::Suspended(_))
    }
}

/// Failure in the run history store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("run {0} not found")]
    RunNotFound(docureel_core::types::DbId),

    #[error("store invariant violated: {0}")]
    Invariant(String),
}
