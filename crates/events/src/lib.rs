//! Pipeline event envelope and in-process broadcast bus.
//!
//! Durable event routing (persistence, waiter matching, workflow
//! triggering) lives in `docureel-engine`; this crate provides the shared
//! envelope type, the canonical event names, and the broadcast bus that
//! observers (live dashboards, log tails) subscribe to.

pub mod bus;
pub mod names;

pub use bus::{EventBus, PipelineEvent};
