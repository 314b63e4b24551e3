//! [`StepContext`]: the API surface a workflow body sees.
//!
//! Every durable operation is keyed by a step name that must be unique
//! within the workflow body and stable across code deploys -- the name is
//! what ties a replayed invocation back to its recorded history.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use docureel_core::types::DbId;
use docureel_events::PipelineEvent;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{Suspension, WorkflowError};
use crate::router::EventRouter;
use crate::store::{Run, RunStore};

/// How an event wait resolved.
#[derive(Debug, Clone, PartialEq)]
pub enum WaitOutcome {
    /// The awaited event arrived; carries its payload.
    Event(serde_json::Value),
    /// The timeout passed first.
    TimedOut,
}

/// Recorded output of a wait step. Written by the router (event arrival)
/// or the scheduler (timeout expiry), read back by `wait_for_event`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub(crate) enum WaitRecord {
    Event { payload: serde_json::Value },
    TimedOut,
}

impl WaitRecord {
    pub(crate) fn to_value(&self) -> serde_json::Value {
        // Serializing an internally tagged enum of JSON values cannot fail.
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// Execution context handed to a workflow body for one invocation.
pub struct StepContext {
    run: Run,
    store: Arc<dyn RunStore>,
    router: Arc<EventRouter>,
}

impl StepContext {
    pub fn new(run: Run, store: Arc<dyn RunStore>, router: Arc<EventRouter>) -> Self {
        Self { run, store, router }
    }

    /// The run being executed (a snapshot taken at claim time).
    pub fn run(&self) -> &Run {
        &self.run
    }

    pub fn run_id(&self) -> DbId {
        self.run.id
    }

    pub fn project_id(&self) -> Option<DbId> {
        self.run.project_id
    }

    pub fn scene_id(&self) -> Option<DbId> {
        self.run.scene_id
    }

    /// Deserialize the trigger event's payload.
    pub fn trigger_payload<T: DeserializeOwned>(&self) -> Result<T, WorkflowError> {
        serde_json::from_value(self.run.payload.clone()).map_err(|source| {
            WorkflowError::Serialization {
                step: "trigger".to_string(),
                source,
            }
        })
    }

    /// Execute `f` at most once for this run; on replay the recorded
    /// output is returned without re-running the body.
    pub async fn run_step<T, F, Fut>(&self, name: &str, f: F) -> Result<T, WorkflowError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        if let Some(recorded) = self.store.find_step(self.run.id, name).await? {
            tracing::debug!(run_id = self.run.id, step = name, "replaying recorded step");
            return deserialize_step(name, recorded);
        }

        let value = f().await.map_err(|e| WorkflowError::step(name, e))?;
        let output =
            serde_json::to_value(&value).map_err(|source| WorkflowError::Serialization {
                step: name.to_string(),
                source,
            })?;

        // First write wins; re-read the authoritative record in case a
        // concurrent replay got there first.
        let recorded = self.store.record_step(self.run.id, name, &output).await?;
        deserialize_step(name, recorded)
    }

    /// Durable sleep. Parks the run with a wake time; a later invocation
    /// past the wake time records the step and proceeds.
    pub async fn sleep(&self, name: &str, duration: Duration) -> Result<(), WorkflowError> {
        if self.store.find_step(self.run.id, name).await?.is_some() {
            return Ok(());
        }

        // A zero-length sleep has nothing to wait for.
        let resumed = duration.is_zero() || self.run.waiting_step.as_deref() == Some(name);
        if resumed {
            self.store
                .record_step(self.run.id, name, &serde_json::json!({ "slept": true }))
                .await?;
            return Ok(());
        }

        let wake_at = Utc::now() + chrono::Duration::from_std(duration).unwrap_or_default();
        self.store.park_sleep(self.run.id, name, wake_at).await?;
        tracing::debug!(
            run_id = self.run.id,
            step = name,
            wake_at = %wake_at,
            "run parked for durable sleep"
        );
        Err(WorkflowError::Suspended(Suspension::Sleeping))
    }

    /// Durable event wait. Parks the run until a correlated event named
    /// `event_name` arrives or `timeout` passes; the outcome is a value,
    /// not an error, so workflows can branch on `TimedOut`.
    pub async fn wait_for_event(
        &self,
        name: &str,
        event_name: &str,
        timeout: Duration,
    ) -> Result<WaitOutcome, WorkflowError> {
        if let Some(recorded) = self.store.find_step(self.run.id, name).await? {
            let record: WaitRecord = deserialize_step(name, recorded)?;
            return Ok(match record {
                WaitRecord::Event { payload } => WaitOutcome::Event(payload),
                WaitRecord::TimedOut => WaitOutcome::TimedOut,
            });
        }

        // An event published between this run's creation and this wait
        // (for instance by a stage claimed on another worker) is already
        // in the log; consult it before parking so the wake-up cannot be
        // lost.
        if let Some(payload) = self
            .store
            .find_logged_event(
                event_name,
                self.run.project_id,
                self.run.scene_id,
                self.run.created_at,
            )
            .await?
        {
            let recorded = self
                .store
                .record_step(self.run.id, name, &WaitRecord::Event { payload }.to_value())
                .await?;
            let record: WaitRecord = deserialize_step(name, recorded)?;
            return Ok(match record {
                WaitRecord::Event { payload } => WaitOutcome::Event(payload),
                WaitRecord::TimedOut => WaitOutcome::TimedOut,
            });
        }

        // A deadline in the past can never be satisfied.
        if timeout.is_zero() {
            self.store
                .record_step(self.run.id, name, &WaitRecord::TimedOut.to_value())
                .await?;
            return Ok(WaitOutcome::TimedOut);
        }

        let timeout_at = Utc::now() + chrono::Duration::from_std(timeout).unwrap_or_default();
        self.store
            .park_wait(self.run.id, name, event_name, timeout_at)
            .await?;
        tracing::debug!(
            run_id = self.run.id,
            step = name,
            event = event_name,
            timeout_at = %timeout_at,
            "run parked waiting for event"
        );
        Err(WorkflowError::Suspended(Suspension::WaitingForEvent))
    }

    /// Publish an event through the router, durably and at most once.
    pub async fn send_event(
        &self,
        name: &str,
        event: PipelineEvent,
    ) -> Result<(), WorkflowError> {
        let router = Arc::clone(&self.router);
        self.run_step(name, move || async move {
            let event_id = router.publish(event).await?;
            Ok::<DbId, anyhow::Error>(event_id)
        })
        .await?;
        Ok(())
    }
}

fn deserialize_step<T: DeserializeOwned>(
    name: &str,
    value: serde_json::Value,
) -> Result<T, WorkflowError> {
    serde_json::from_value(value).map_err(|source| WorkflowError::Serialization {
        step: name.to_string(),
        source,
    })
}
