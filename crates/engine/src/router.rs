//! Durable event routing.
//!
//! [`EventRouter::publish`] is the single entry point for events, whether
//! they come from workflow bodies, webhooks, or API handlers. Order
//! matters: the event is appended to the durable log first, then waiting
//! runs are satisfied, then new runs are spawned for triggered workflows,
//! and only then is the event mirrored onto the in-process bus.

use std::sync::Arc;

use docureel_core::types::DbId;
use docureel_events::{EventBus, PipelineEvent};

use crate::context::WaitRecord;
use crate::error::StoreError;
use crate::registry::WorkflowRegistry;
use crate::store::{NewRun, Run, RunStore};

pub struct EventRouter {
    store: Arc<dyn RunStore>,
    registry: Arc<WorkflowRegistry>,
    bus: Arc<EventBus>,
}

impl EventRouter {
    pub fn new(
        store: Arc<dyn RunStore>,
        registry: Arc<WorkflowRegistry>,
        bus: Arc<EventBus>,
    ) -> Self {
        Self {
            store,
            registry,
            bus,
        }
    }

    /// Publish an event: persist it, wake correlated waiters, spawn
    /// triggered runs, and fan out to bus observers. Returns the durable
    /// event id.
    pub async fn publish(&self, event: PipelineEvent) -> Result<DbId, StoreError> {
        let event_id = self.store.append_event(&event).await?;
        tracing::debug!(
            event = %event.name,
            event_id,
            project_id = ?event.project_id,
            scene_id = ?event.scene_id,
            "event persisted"
        );

        for run in self.store.waiting_for_event(&event.name).await? {
            if !correlates(&run, &event) {
                continue;
            }
            if let Some(step) = &run.waiting_step {
                let record = WaitRecord::Event {
                    payload: event.payload.clone(),
                }
                .to_value();
                self.store.record_step(run.id, step, &record).await?;
            }
            self.store.requeue(run.id).await?;
            tracing::info!(
                run_id = run.id,
                workflow = %run.workflow_name,
                event = %event.name,
                "waiting run satisfied"
            );
        }

        for workflow in self.registry.triggered_by(&event.name) {
            let run = self
                .store
                .create_run(NewRun {
                    workflow_name: workflow.name().to_string(),
                    trigger_event: event.name.clone(),
                    project_id: event.project_id,
                    scene_id: event.scene_id,
                    payload: event.payload.clone(),
                    max_attempts: workflow.max_attempts(),
                })
                .await?;
            tracing::info!(
                run_id = run.id,
                workflow = workflow.name(),
                event = %event.name,
                "run queued"
            );
        }

        self.bus.publish(event);
        Ok(event_id)
    }
}

/// Whether an event belongs to a waiter with the given project/scene
/// scope. Scene correlation takes precedence over project correlation;
/// an event with neither id never wakes anything. Shared with the run
/// stores so log lookups and wake-ups agree on correlation.
pub(crate) fn scope_matches(
    project_id: Option<DbId>,
    scene_id: Option<DbId>,
    event: &PipelineEvent,
) -> bool {
    if let (Some(waiter_scene), Some(event_scene)) = (scene_id, event.scene_id) {
        return waiter_scene == event_scene;
    }
    if let (Some(waiter_project), Some(event_project)) = (project_id, event.project_id) {
        return waiter_project == event_project;
    }
    false
}

fn correlates(run: &Run, event: &PipelineEvent) -> bool {
    scope_matches(run.project_id, run.scene_id, event)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::RunStatus;

    fn run_with(project_id: Option<DbId>, scene_id: Option<DbId>) -> Run {
        Run {
            id: 1,
            workflow_name: "w".to_string(),
            trigger_event: "t".to_string(),
            project_id,
            scene_id,
            payload: serde_json::Value::Null,
            status: RunStatus::Waiting,
            waiting_step: Some("wait".to_string()),
            wake_at: None,
            wait_event_name: Some("x.done".to_string()),
            wait_timeout_at: None,
            attempt: 0,
            max_attempts: 3,
            error_message: None,
            created_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn scene_correlation_takes_precedence() {
        let run = run_with(Some(1), Some(10));
        let same_scene = PipelineEvent::new("x.done").for_project(99).for_scene(10);
        let other_scene = PipelineEvent::new("x.done").for_project(1).for_scene(11);
        assert!(correlates(&run, &same_scene));
        assert!(!correlates(&run, &other_scene));
    }

    #[test]
    fn falls_back_to_project_correlation() {
        let run = run_with(Some(1), None);
        assert!(correlates(&run, &PipelineEvent::new("x.done").for_project(1)));
        assert!(!correlates(&run, &PipelineEvent::new("x.done").for_project(2)));
    }

    #[test]
    fn uncorrelated_event_never_matches() {
        let run = run_with(Some(1), Some(10));
        assert!(!correlates(&run, &PipelineEvent::new("x.done")));
    }
}
