//! In-memory [`RunStore`] backend.
//!
//! Used by the engine and pipeline test suites so durable-execution
//! behavior can be exercised without a PostgreSQL instance. Semantics
//! mirror `PgRunStore`, including first-write-wins step recording and
//! the fail-once guard.

use std::collections::HashMap;

use chrono::Utc;
use docureel_core::types::{DbId, Timestamp};
use docureel_events::PipelineEvent;
use tokio::sync::Mutex;

use crate::error::StoreError;
use crate::store::{NewRun, Run, RunStatus, RunStore};

#[derive(Default)]
struct Inner {
    next_run_id: DbId,
    next_event_id: DbId,
    runs: HashMap<DbId, Run>,
    /// Keyed by (run_id, step_name).
    steps: HashMap<(DbId, String), serde_json::Value>,
    events: Vec<PipelineEvent>,
}

/// In-memory run store protected by a single async mutex.
#[derive(Default)]
pub struct MemRunStore {
    inner: Mutex<Inner>,
}

impl MemRunStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the durable event log, oldest first.
    pub async fn events(&self) -> Vec<PipelineEvent> {
        self.inner.lock().await.events.clone()
    }

    /// Snapshot of every run, ordered by id.
    pub async fn runs(&self) -> Vec<Run> {
        let inner = self.inner.lock().await;
        let mut runs: Vec<Run> = inner.runs.values().cloned().collect();
        runs.sort_by_key(|r| r.id);
        runs
    }

    /// Recorded step outputs for a run, ordered by step name.
    pub async fn steps_for_run(&self, run_id: DbId) -> Vec<(String, serde_json::Value)> {
        let inner = self.inner.lock().await;
        let mut steps: Vec<(String, serde_json::Value)> = inner
            .steps
            .iter()
            .filter(|((id, _), _)| *id == run_id)
            .map(|((_, name), out)| (name.clone(), out.clone()))
            .collect();
        steps.sort_by(|a, b| a.0.cmp(&b.0));
        steps
    }
}

fn get_run_mut(inner: &mut Inner, id: DbId) -> Result<&mut Run, StoreError> {
    inner.runs.get_mut(&id).ok_or(StoreError::RunNotFound(id))
}

#[async_trait::async_trait]
impl RunStore for MemRunStore {
    async fn create_run(&self, new: NewRun) -> Result<Run, StoreError> {
        let mut inner = self.inner.lock().await;
        inner.next_run_id += 1;
        let run = Run {
            id: inner.next_run_id,
            workflow_name: new.workflow_name,
            trigger_event: new.trigger_event,
            project_id: new.project_id,
            scene_id: new.scene_id,
            payload: new.payload,
            status: RunStatus::Queued,
            waiting_step: None,
            wake_at: None,
            wait_event_name: None,
            wait_timeout_at: None,
            attempt: 0,
            max_attempts: new.max_attempts,
            error_message: None,
            created_at: Utc::now(),
        };
        inner.runs.insert(run.id, run.clone());
        Ok(run)
    }

    async fn find_run(&self, id: DbId) -> Result<Option<Run>, StoreError> {
        Ok(self.inner.lock().await.runs.get(&id).cloned())
    }

    async fn claim_due(&self, limit: i64) -> Result<Vec<Run>, StoreError> {
        let mut inner = self.inner.lock().await;
        let now = Utc::now();
        let mut due: Vec<DbId> = inner
            .runs
            .values()
            .filter(|r| {
                r.status == RunStatus::Queued
                    || (r.status == RunStatus::Sleeping
                        && r.wake_at.is_some_and(|w| w <= now))
            })
            .map(|r| r.id)
            .collect();
        due.sort_unstable();
        due.truncate(limit.max(0) as usize);

        let mut claimed = Vec::with_capacity(due.len());
        for id in due {
            let run = get_run_mut(&mut inner, id)?;
            run.status = RunStatus::Running;
            claimed.push(run.clone());
        }
        Ok(claimed)
    }

    async fn park_sleep(
        &self,
        id: DbId,
        step: &str,
        wake_at: Timestamp,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        let run = get_run_mut(&mut inner, id)?;
        run.status = RunStatus::Sleeping;
        run.waiting_step = Some(step.to_string());
        run.wake_at = Some(wake_at);
        run.wait_event_name = None;
        run.wait_timeout_at = None;
        Ok(())
    }

    async fn park_wait(
        &self,
        id: DbId,
        step: &str,
        event_name: &str,
        timeout_at: Timestamp,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        let run = get_run_mut(&mut inner, id)?;
        run.status = RunStatus::Waiting;
        run.waiting_step = Some(step.to_string());
        run.wait_event_name = Some(event_name.to_string());
        run.wait_timeout_at = Some(timeout_at);
        run.wake_at = None;
        Ok(())
    }

    async fn requeue(&self, id: DbId) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        let run = get_run_mut(&mut inner, id)?;
        run.status = RunStatus::Queued;
        run.waiting_step = None;
        run.wake_at = None;
        run.wait_event_name = None;
        run.wait_timeout_at = None;
        Ok(())
    }

    async fn complete_run(&self, id: DbId) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        let run = get_run_mut(&mut inner, id)?;
        run.status = RunStatus::Completed;
        run.waiting_step = None;
        run.wake_at = None;
        run.wait_event_name = None;
        run.wait_timeout_at = None;
        Ok(())
    }

    async fn fail_run(&self, id: DbId, error_message: &str) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().await;
        let run = get_run_mut(&mut inner, id)?;
        if run.status == RunStatus::Failed {
            return Ok(false);
        }
        run.status = RunStatus::Failed;
        run.error_message = Some(error_message.to_string());
        run.waiting_step = None;
        run.wake_at = None;
        run.wait_event_name = None;
        run.wait_timeout_at = None;
        Ok(true)
    }

    async fn record_retry(&self, id: DbId) -> Result<i32, StoreError> {
        let mut inner = self.inner.lock().await;
        let run = get_run_mut(&mut inner, id)?;
        run.attempt += 1;
        run.status = RunStatus::Queued;
        run.waiting_step = None;
        run.wake_at = None;
        run.wait_event_name = None;
        run.wait_timeout_at = None;
        Ok(run.attempt)
    }

    async fn waiting_for_event(&self, event_name: &str) -> Result<Vec<Run>, StoreError> {
        let inner = self.inner.lock().await;
        let mut waiting: Vec<Run> = inner
            .runs
            .values()
            .filter(|r| {
                r.status == RunStatus::Waiting
                    && r.wait_event_name.as_deref() == Some(event_name)
            })
            .cloned()
            .collect();
        waiting.sort_by_key(|r| r.id);
        Ok(waiting)
    }

    async fn expired_waits(&self) -> Result<Vec<Run>, StoreError> {
        let inner = self.inner.lock().await;
        let now = Utc::now();
        let mut expired: Vec<Run> = inner
            .runs
            .values()
            .filter(|r| {
                r.status == RunStatus::Waiting
                    && r.wait_timeout_at.is_some_and(|t| t <= now)
            })
            .cloned()
            .collect();
        expired.sort_by_key(|r| r.id);
        Ok(expired)
    }

    async fn find_step(
        &self,
        run_id: DbId,
        step_name: &str,
    ) -> Result<Option<serde_json::Value>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner.steps.get(&(run_id, step_name.to_string())).cloned())
    }

    async fn record_step(
        &self,
        run_id: DbId,
        step_name: &str,
        output: &serde_json::Value,
    ) -> Result<serde_json::Value, StoreError> {
        let mut inner = self.inner.lock().await;
        let entry = inner
            .steps
            .entry((run_id, step_name.to_string()))
            .or_insert_with(|| output.clone());
        Ok(entry.clone())
    }

    async fn append_event(&self, event: &PipelineEvent) -> Result<DbId, StoreError> {
        let mut inner = self.inner.lock().await;
        inner.next_event_id += 1;
        inner.events.push(event.clone());
        Ok(inner.next_event_id)
    }

    async fn find_logged_event(
        &self,
        event_name: &str,
        project_id: Option<DbId>,
        scene_id: Option<DbId>,
        since: Timestamp,
    ) -> Result<Option<serde_json::Value>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .events
            .iter()
            .rev()
            .find(|e| {
                e.name == event_name
                    && e.timestamp >= since
                    && crate::router::scope_matches(project_id, scene_id, e)
            })
            .map(|e| e.payload.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn new_run(name: &str) -> NewRun {
        NewRun {
            workflow_name: name.to_string(),
            trigger_event: "test.trigger".to_string(),
            project_id: Some(1),
            scene_id: None,
            payload: serde_json::json!({}),
            max_attempts: 3,
        }
    }

    #[tokio::test]
    async fn claim_due_marks_running_and_skips_parked() {
        let store = MemRunStore::new();
        let queued = store.create_run(new_run("a")).await.unwrap();
        let parked = store.create_run(new_run("b")).await.unwrap();
        store
            .park_sleep(parked.id, "pause", Utc::now() + Duration::hours(1))
            .await
            .unwrap();

        let claimed = store.claim_due(10).await.unwrap();
        assert_eq!(claimed.len(), 1);
        assert_eq!(claimed[0].id, queued.id);
        assert_eq!(claimed[0].status, RunStatus::Running);

        // A second claim finds nothing.
        assert!(store.claim_due(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn sleeping_run_becomes_due_after_wake_time() {
        let store = MemRunStore::new();
        let run = store.create_run(new_run("a")).await.unwrap();
        store.claim_due(10).await.unwrap();
        store
            .park_sleep(run.id, "pause", Utc::now() - Duration::seconds(1))
            .await
            .unwrap();

        let claimed = store.claim_due(10).await.unwrap();
        assert_eq!(claimed.len(), 1);
        assert_eq!(claimed[0].waiting_step.as_deref(), Some("pause"));
    }

    #[tokio::test]
    async fn record_step_first_write_wins() {
        let store = MemRunStore::new();
        let run = store.create_run(new_run("a")).await.unwrap();

        let first = store
            .record_step(run.id, "fetch", &serde_json::json!({"v": 1}))
            .await
            .unwrap();
        let second = store
            .record_step(run.id, "fetch", &serde_json::json!({"v": 2}))
            .await
            .unwrap();

        assert_eq!(first["v"], 1);
        assert_eq!(second["v"], 1);
    }

    #[tokio::test]
    async fn fail_run_fires_once() {
        let store = MemRunStore::new();
        let run = store.create_run(new_run("a")).await.unwrap();

        assert!(store.fail_run(run.id, "boom").await.unwrap());
        assert!(!store.fail_run(run.id, "boom again").await.unwrap());

        let found = store.find_run(run.id).await.unwrap().unwrap();
        assert_eq!(found.error_message.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn find_logged_event_applies_scope_and_recency() {
        let store = MemRunStore::new();
        let before = Utc::now() - Duration::seconds(1);
        store
            .append_event(
                &PipelineEvent::new("x.done")
                    .for_scene(10)
                    .with_payload(serde_json::json!({"n": 1})),
            )
            .await
            .unwrap();
        store
            .append_event(
                &PipelineEvent::new("x.done")
                    .for_scene(11)
                    .with_payload(serde_json::json!({"n": 2})),
            )
            .await
            .unwrap();

        let hit = store
            .find_logged_event("x.done", Some(1), Some(10), before)
            .await
            .unwrap()
            .expect("scene-scoped event found");
        assert_eq!(hit["n"], 1);

        // A scope that matches no event, and a name that matches none.
        assert!(store
            .find_logged_event("x.done", None, Some(12), before)
            .await
            .unwrap()
            .is_none());
        assert!(store
            .find_logged_event("y.done", Some(1), Some(10), before)
            .await
            .unwrap()
            .is_none());

        // Events older than `since` are invisible.
        let later = Utc::now() + Duration::seconds(1);
        assert!(store
            .find_logged_event("x.done", Some(1), Some(10), later)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn expired_waits_only_returns_past_deadlines() {
        let store = MemRunStore::new();
        let expired = store.create_run(new_run("a")).await.unwrap();
        let pending = store.create_run(new_run("b")).await.unwrap();
        store
            .park_wait(expired.id, "wait", "x.done", Utc::now() - Duration::seconds(1))
            .await
            .unwrap();
        store
            .park_wait(pending.id, "wait", "x.done", Utc::now() + Duration::hours(1))
            .await
            .unwrap();

        let hits = store.expired_waits().await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, expired.id);
    }
}
