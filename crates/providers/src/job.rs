//! Shared contract types for long-running provider jobs.

use serde::{Deserialize, Serialize};

/// Opaque handle to a long-running operation at an external provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobHandle {
    /// Provider-assigned job or operation id.
    pub external_id: String,
}

impl JobHandle {
    pub fn new(external_id: impl Into<String>) -> Self {
        Self {
            external_id: external_id.into(),
        }
    }
}

/// Outcome of submitting work to a provider.
#[derive(Debug, Clone)]
pub enum Submission<T> {
    /// The provider finished within the call.
    Completed(T),
    /// The provider accepted the work; poll with the handle.
    Accepted(JobHandle),
}

/// One non-blocking status check of a long-running job.
///
/// "Not yet visible" lookups belong in `Pending`, not in an error:
/// providers are eventually consistent and a just-submitted job may not
/// show up on the first status call.
#[derive(Debug, Clone)]
pub enum PollStatus<T> {
    Pending,
    Completed(T),
    Failed(String),
}
