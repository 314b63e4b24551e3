//! Durable step-based workflow engine.
//!
//! Workflows are short-lived invocations triggered by named events. Each
//! invocation runs to its next suspension point -- a memoized step
//! boundary, a durable sleep, or an event wait -- and yields control back
//! to the [`Scheduler`]. Step results are recorded in the run's history so
//! a retried or crash-resumed invocation replays past steps from the
//! record instead of re-executing their side effects.
//!
//! Layout:
//!
//! - [`store`] -- the [`RunStore`](store::RunStore) persistence seam.
//! - [`pg`] / [`memory`] -- Postgres-backed and in-memory store backends.
//! - [`context`] -- [`StepContext`](context::StepContext): `run_step`,
//!   `sleep`, `wait_for_event`, `send_event`.
//! - [`registry`] -- the [`Workflow`](registry::Workflow) trait and the
//!   trigger registry.
//! - [`router`] -- durable event routing: persist, satisfy waiters,
//!   spawn triggered runs, mirror to the broadcast bus.
//! - [`scheduler`] -- the claim/execute/retry loop.

pub mod context;
pub mod error;
pub mod memory;
pub mod pg;
pub mod registry;
pub mod router;
pub mod scheduler;
pub mod store;

pub use context::{StepContext, WaitOutcome};
pub use error::{StoreError, Suspension, WorkflowError};
pub use registry::{Workflow, WorkflowRegistry};
pub use router::EventRouter;
pub use scheduler::Scheduler;
pub use store::{NewRun, Run, RunStatus, RunStore};
