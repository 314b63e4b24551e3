//! The claim/execute/retry loop.
//!
//! One [`Scheduler`] per worker process. Each tick expires overdue event
//! waits, claims a batch of due runs, and executes them to their next
//! suspension point. Failures are retried until the run's attempt budget
//! is exhausted, at which point the workflow's failure hook fires exactly
//! once.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::context::{StepContext, WaitRecord};
use crate::error::StoreError;
use crate::registry::WorkflowRegistry;
use crate::router::EventRouter;
use crate::store::{Run, RunStore};

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
const DEFAULT_BATCH_SIZE: i64 = 16;

pub struct Scheduler {
    store: Arc<dyn RunStore>,
    registry: Arc<WorkflowRegistry>,
    router: Arc<EventRouter>,
    poll_interval: Duration,
    batch_size: i64,
}

impl Scheduler {
    pub fn new(
        store: Arc<dyn RunStore>,
        registry: Arc<WorkflowRegistry>,
        router: Arc<EventRouter>,
    ) -> Self {
        Self {
            store,
            registry,
            router,
            poll_interval: DEFAULT_POLL_INTERVAL,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Poll for due runs until cancelled.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        tracing::info!(
            workflows = ?self.registry.names(),
            "scheduler started"
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("scheduler shutting down");
                    break;
                }
                _ = interval.tick() => {
                    if let Err(e) = self.tick().await {
                        tracing::error!(error = %e, "scheduler tick failed");
                    }
                }
            }
        }
    }

    /// One scheduling pass. Returns the number of runs executed.
    pub async fn tick(&self) -> Result<usize, StoreError> {
        self.expire_waits().await?;

        let claimed = self.store.claim_due(self.batch_size).await?;
        let executed = claimed.len();
        for run in claimed {
            self.execute(run).await?;
        }
        Ok(executed)
    }

    /// Drive ticks until no run is claimable. Intended for tests, where
    /// suspension points use zero durations so every parked run resolves
    /// within a bounded number of passes.
    pub async fn run_until_idle(&self) -> Result<(), StoreError> {
        // Bounded so a self-requeueing bug fails the test instead of
        // hanging it.
        for _ in 0..1000 {
            if self.tick().await? == 0 {
                return Ok(());
            }
        }
        Err(StoreError::Invariant(
            "scheduler did not reach idle within 1000 ticks".to_string(),
        ))
    }

    /// Record a timeout outcome on every overdue wait and requeue it.
    async fn expire_waits(&self) -> Result<(), StoreError> {
        for run in self.store.expired_waits().await? {
            if let Some(step) = &run.waiting_step {
                self.store
                    .record_step(run.id, step, &WaitRecord::TimedOut.to_value())
                    .await?;
            }
            self.store.requeue(run.id).await?;
            tracing::info!(
                run_id = run.id,
                workflow = %run.workflow_name,
                event = ?run.wait_event_name,
                "event wait timed out"
            );
        }
        Ok(())
    }

    /// Execute a claimed run to its next suspension point.
    async fn execute(&self, run: Run) -> Result<(), StoreError> {
        let Some(workflow) = self.registry.find(&run.workflow_name).cloned() else {
            tracing::error!(
                run_id = run.id,
                workflow = %run.workflow_name,
                "no registered workflow for run"
            );
            self.store
                .fail_run(run.id, &format!("unknown workflow '{}'", run.workflow_name))
                .await?;
            return Ok(());
        };

        let run_id = run.id;
        let attempt = run.attempt;
        let max_attempts = run.max_attempts;
        let ctx = StepContext::new(run, Arc::clone(&self.store), Arc::clone(&self.router));

        match workflow.run(&ctx).await {
            Ok(()) => {
                self.store.complete_run(run_id).await?;
                tracing::info!(run_id, workflow = workflow.name(), "run completed");
            }
            Err(e) if e.is_suspension() => {
                // The context already parked the run.
                tracing::debug!(run_id, workflow = workflow.name(), "run suspended");
            }
            Err(e) => {
                if attempt + 1 >= max_attempts {
                    let first_failure = self.store.fail_run(run_id, &e.to_string()).await?;
                    tracing::error!(
                        run_id,
                        workflow = workflow.name(),
                        error = %e,
                        "run failed permanently"
                    );
                    if first_failure {
                        workflow.on_failure(&ctx, &e).await;
                    }
                } else {
                    let next = self.store.record_retry(run_id).await?;
                    tracing::warn!(
                        run_id,
                        workflow = workflow.name(),
                        attempt = next,
                        max_attempts,
                        error = %e,
                        "run failed, retrying"
                    );
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use assert_matches::assert_matches;
    use docureel_events::{EventBus, PipelineEvent};

    use super::*;
    use crate::context::WaitOutcome;
    use crate::error::WorkflowError;
    use crate::memory::MemRunStore;
    use crate::registry::Workflow;
    use crate::store::{NewRun, RunStatus};

    struct Harness {
        store: Arc<MemRunStore>,
        router: Arc<EventRouter>,
        scheduler: Scheduler,
    }

    fn harness(workflows: Vec<Arc<dyn Workflow>>) -> Harness {
        let store: Arc<MemRunStore> = Arc::new(MemRunStore::new());
        let mut registry = WorkflowRegistry::new();
        for w in workflows {
            registry = registry.register(w);
        }
        let registry = Arc::new(registry);
        let bus = Arc::new(EventBus::default());
        let router = Arc::new(EventRouter::new(
            store.clone() as Arc<dyn RunStore>,
            registry.clone(),
            bus,
        ));
        let scheduler = Scheduler::new(
            store.clone() as Arc<dyn RunStore>,
            registry,
            router.clone(),
        );
        Harness {
            store,
            router,
            scheduler,
        }
    }

    async fn queue_run(store: &MemRunStore, workflow: &str, max_attempts: i32) -> i64 {
        store
            .create_run(NewRun {
                workflow_name: workflow.to_string(),
                trigger_event: "test.trigger".to_string(),
                project_id: Some(1),
                scene_id: Some(10),
                payload: serde_json::json!({}),
                max_attempts,
            })
            .await
            .unwrap()
            .id
    }

    // A workflow whose single step counts how many times its body runs.
    struct Counting {
        executions: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl Workflow for Counting {
        fn name(&self) -> &'static str {
            "counting"
        }

        fn trigger(&self) -> &'static str {
            "counting.requested"
        }

        async fn run(&self, ctx: &StepContext) -> Result<(), WorkflowError> {
            ctx.run_step("count", || async {
                self.executions.fetch_add(1, Ordering::SeqCst);
                Ok(42u32)
            })
            .await?;
            // A zero-length sleep resumes immediately but still replays
            // the body from the top afterwards in the parked case.
            ctx.sleep("pause", Duration::ZERO).await?;
            ctx.run_step("after", || async { Ok("done".to_string()) })
                .await?;
            Ok(())
        }
    }

    #[tokio::test]
    async fn completed_steps_replay_from_the_record() {
        let counting = Arc::new(Counting {
            executions: AtomicUsize::new(0),
        });
        let h = harness(vec![counting.clone()]);
        let run_id = queue_run(&h.store, "counting", 3).await;

        h.scheduler.run_until_idle().await.unwrap();
        let run = h.store.find_run(run_id).await.unwrap().unwrap();
        assert_eq!(run.status, RunStatus::Completed);
        assert_eq!(counting.executions.load(Ordering::SeqCst), 1);

        let steps = h.store.steps_for_run(run_id).await;
        let names: Vec<&str> = steps.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["after", "count", "pause"]);
    }

    // Fails until the attempt counter reaches `succeed_on`, recording
    // every failure-hook invocation.
    struct Flaky {
        succeed_on: i32,
        bodies: AtomicUsize,
        failures: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl Workflow for Flaky {
        fn name(&self) -> &'static str {
            "flaky"
        }

        fn trigger(&self) -> &'static str {
            "flaky.requested"
        }

        async fn run(&self, ctx: &StepContext) -> Result<(), WorkflowError> {
            self.bodies.fetch_add(1, Ordering::SeqCst);
            if ctx.run().attempt < self.succeed_on {
                return Err(WorkflowError::step("work", anyhow::anyhow!("transient")));
            }
            ctx.run_step("work", || async { Ok(true) }).await?;
            Ok(())
        }

        async fn on_failure(&self, _ctx: &StepContext, _error: &WorkflowError) {
            self.failures.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn retries_until_success_within_budget() {
        let flaky = Arc::new(Flaky {
            succeed_on: 2,
            bodies: AtomicUsize::new(0),
            failures: AtomicUsize::new(0),
        });
        let h = harness(vec![flaky.clone()]);
        let run_id = queue_run(&h.store, "flaky", 3).await;

        h.scheduler.run_until_idle().await.unwrap();
        let run = h.store.find_run(run_id).await.unwrap().unwrap();
        assert_eq!(run.status, RunStatus::Completed);
        assert_eq!(run.attempt, 2);
        assert_eq!(flaky.bodies.load(Ordering::SeqCst), 3);
        assert_eq!(flaky.failures.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn exhausted_budget_fails_run_and_fires_hook_once() {
        let flaky = Arc::new(Flaky {
            succeed_on: i32::MAX,
            bodies: AtomicUsize::new(0),
            failures: AtomicUsize::new(0),
        });
        let h = harness(vec![flaky.clone()]);
        let run_id = queue_run(&h.store, "flaky", 3).await;

        h.scheduler.run_until_idle().await.unwrap();
        let run = h.store.find_run(run_id).await.unwrap().unwrap();
        assert_eq!(run.status, RunStatus::Failed);
        assert!(run.error_message.is_some());
        assert_eq!(flaky.bodies.load(Ordering::SeqCst), 3);
        assert_eq!(flaky.failures.load(Ordering::SeqCst), 1);
    }

    // Parks on a real (one hour) sleep: the run must stay parked.
    struct Sleeper;

    #[async_trait::async_trait]
    impl Workflow for Sleeper {
        fn name(&self) -> &'static str {
            "sleeper"
        }

        fn trigger(&self) -> &'static str {
            "sleeper.requested"
        }

        async fn run(&self, ctx: &StepContext) -> Result<(), WorkflowError> {
            ctx.sleep("nap", Duration::from_secs(3600)).await?;
            Ok(())
        }
    }

    #[tokio::test]
    async fn sleeping_run_stays_parked_until_wake_time() {
        let h = harness(vec![Arc::new(Sleeper)]);
        let run_id = queue_run(&h.store, "sleeper", 3).await;

        h.scheduler.run_until_idle().await.unwrap();
        let run = h.store.find_run(run_id).await.unwrap().unwrap();
        assert_eq!(run.status, RunStatus::Sleeping);
        assert_eq!(run.waiting_step.as_deref(), Some("nap"));
        assert!(run.wake_at.is_some());
    }

    // Waits for a correlated event and records what it saw.
    struct Waiter {
        outcome: tokio::sync::Mutex<Option<WaitOutcome>>,
        timeout: Duration,
    }

    #[async_trait::async_trait]
    impl Workflow for Waiter {
        fn name(&self) -> &'static str {
            "waiter"
        }

        fn trigger(&self) -> &'static str {
            "waiter.requested"
        }

        async fn run(&self, ctx: &StepContext) -> Result<(), WorkflowError> {
            let outcome = ctx
                .wait_for_event("await-done", "thing.done", self.timeout)
                .await?;
            *self.outcome.lock().await = Some(outcome);
            Ok(())
        }
    }

    #[tokio::test]
    async fn wait_is_satisfied_by_a_correlated_event() {
        let waiter = Arc::new(Waiter {
            outcome: tokio::sync::Mutex::new(None),
            timeout: Duration::from_secs(3600),
        });
        let h = harness(vec![waiter.clone()]);
        let run_id = queue_run(&h.store, "waiter", 3).await;

        h.scheduler.run_until_idle().await.unwrap();
        assert_eq!(
            h.store.find_run(run_id).await.unwrap().unwrap().status,
            RunStatus::Waiting
        );

        // An event for a different scene must not wake the run.
        h.router
            .publish(
                PipelineEvent::new("thing.done")
                    .for_scene(999)
                    .with_payload(serde_json::json!({"wrong": true})),
            )
            .await
            .unwrap();
        h.scheduler.run_until_idle().await.unwrap();
        assert_eq!(
            h.store.find_run(run_id).await.unwrap().unwrap().status,
            RunStatus::Waiting
        );

        h.router
            .publish(
                PipelineEvent::new("thing.done")
                    .for_scene(10)
                    .with_payload(serde_json::json!({"asset_id": 7})),
            )
            .await
            .unwrap();
        h.scheduler.run_until_idle().await.unwrap();

        assert_eq!(
            h.store.find_run(run_id).await.unwrap().unwrap().status,
            RunStatus::Completed
        );
        let outcome = waiter.outcome.lock().await.clone();
        assert_matches!(outcome, Some(WaitOutcome::Event(p)) => {
            assert_eq!(p["asset_id"], 7);
        });
    }

    #[tokio::test]
    async fn expired_wait_resolves_to_timed_out() {
        let waiter = Arc::new(Waiter {
            outcome: tokio::sync::Mutex::new(None),
            timeout: Duration::ZERO,
        });
        let h = harness(vec![waiter.clone()]);
        let run_id = queue_run(&h.store, "waiter", 3).await;

        h.scheduler.run_until_idle().await.unwrap();
        assert_eq!(
            h.store.find_run(run_id).await.unwrap().unwrap().status,
            RunStatus::Completed
        );
        assert_eq!(
            waiter.outcome.lock().await.clone(),
            Some(WaitOutcome::TimedOut)
        );
    }

    // Publishes the completion it then waits on, so the event is already
    // in the durable log when the wait runs. The wait must resolve from
    // the log instead of parking until the timeout.
    struct PublishThenWait {
        outcome: tokio::sync::Mutex<Option<WaitOutcome>>,
    }

    #[async_trait::async_trait]
    impl Workflow for PublishThenWait {
        fn name(&self) -> &'static str {
            "publish-then-wait"
        }

        fn trigger(&self) -> &'static str {
            "publish-then-wait.requested"
        }

        async fn run(&self, ctx: &StepContext) -> Result<(), WorkflowError> {
            ctx.send_event(
                "announce",
                PipelineEvent::new("thing.done")
                    .for_scene(10)
                    .with_payload(serde_json::json!({"asset_id": 3})),
            )
            .await?;
            let outcome = ctx
                .wait_for_event("await-done", "thing.done", Duration::from_secs(3600))
                .await?;
            *self.outcome.lock().await = Some(outcome);
            Ok(())
        }
    }

    #[tokio::test]
    async fn wait_resolves_from_the_log_when_the_event_arrived_first() {
        let workflow = Arc::new(PublishThenWait {
            outcome: tokio::sync::Mutex::new(None),
        });
        let h = harness(vec![workflow.clone()]);
        let run_id = queue_run(&h.store, "publish-then-wait", 3).await;

        h.scheduler.run_until_idle().await.unwrap();

        assert_eq!(
            h.store.find_run(run_id).await.unwrap().unwrap().status,
            RunStatus::Completed
        );
        let outcome = workflow.outcome.lock().await.clone();
        assert_matches!(outcome, Some(WaitOutcome::Event(p)) => {
            assert_eq!(p["asset_id"], 3);
        });
    }

    #[tokio::test]
    async fn wait_ignores_events_logged_before_the_run_existed() {
        let waiter = Arc::new(Waiter {
            outcome: tokio::sync::Mutex::new(None),
            timeout: Duration::from_secs(3600),
        });
        let h = harness(vec![waiter.clone()]);

        // Logged before the run exists: stale from an earlier round.
        h.router
            .publish(
                PipelineEvent::new("thing.done")
                    .for_scene(10)
                    .with_payload(serde_json::json!({"stale": true})),
            )
            .await
            .unwrap();

        let run_id = queue_run(&h.store, "waiter", 3).await;
        h.scheduler.run_until_idle().await.unwrap();

        assert_eq!(
            h.store.find_run(run_id).await.unwrap().unwrap().status,
            RunStatus::Waiting
        );
        assert!(waiter.outcome.lock().await.is_none());
    }

    // Publishes an event through send_event so a second workflow runs.
    struct Sender;

    #[async_trait::async_trait]
    impl Workflow for Sender {
        fn name(&self) -> &'static str {
            "sender"
        }

        fn trigger(&self) -> &'static str {
            "sender.requested"
        }

        async fn run(&self, ctx: &StepContext) -> Result<(), WorkflowError> {
            ctx.send_event(
                "emit-downstream",
                PipelineEvent::new("counting.requested").for_project(1),
            )
            .await?;
            Ok(())
        }
    }

    #[tokio::test]
    async fn send_event_spawns_triggered_runs_durably() {
        let counting = Arc::new(Counting {
            executions: AtomicUsize::new(0),
        });
        let h = harness(vec![Arc::new(Sender) as Arc<dyn Workflow>, counting.clone()]);
        queue_run(&h.store, "sender", 3).await;

        h.scheduler.run_until_idle().await.unwrap();

        let runs = h.store.runs().await;
        assert_eq!(runs.len(), 2);
        assert!(runs.iter().all(|r| r.status == RunStatus::Completed));
        assert_eq!(counting.executions.load(Ordering::SeqCst), 1);

        let events = h.store.events().await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].name, "counting.requested");
    }
}
