//! End-to-end scenarios for the orchestration engine.
//!
//! Orchestrator → worker thread → JobStore / StatusCache / WorkItemSource → events
//!
//! Verifies:
//! - Pause stops after the current item and resume continues after the checkpoint
//! - Control operations reject illegal states without side effects
//! - Fatal errors park the job in FAILED until an explicit reset
//! - Lease handover between orchestrators never reprocesses items

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::mpsc::{self, Receiver, Sender};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use proptest::prelude::*;

    use evalrun_core::{JobKind, JobRecord, JobStatus, STALLED_PAUSE_REASON, WorkItem};
    use evalrun_events::{
        BusNotifier, EventBus, InMemoryEventBus, JobEventKind, Subscription,
    };

    use crate::cache::hooked::HookedCache;
    use crate::cache::{InMemoryCache, KeyValueCache, StatusCache};
    use crate::config::EngineConfig;
    use crate::executor::{ExecutionError, ItemExecutor, ItemOutput};
    use crate::orchestrator::{Orchestrator, OrchestratorError};
    use crate::source::InMemoryWorkItemSource;
    use crate::store::{InMemoryJobStore, JobStore};
    use crate::worker::WorkerExit;

    const GATE_TIMEOUT: Duration = Duration::from_secs(10);

    /// Held by the test while the executor is parked on a gated item.
    struct GateControl {
        reached: Receiver<()>,
        release: Sender<()>,
    }

    impl GateControl {
        fn wait_reached(&self) {
            self.reached
                .recv_timeout(GATE_TIMEOUT)
                .expect("executor never reached the gated item");
        }

        fn open(&self) {
            self.release.send(()).expect("executor dropped the gate");
        }
    }

    struct Gate {
        position: u64,
        reached: Sender<()>,
        release: Receiver<()>,
    }

    /// Executor whose per-position behavior is set up by each test.
    #[derive(Default)]
    struct ScriptedExecutor {
        item_failures: Mutex<HashSet<u64>>,
        fatal: Mutex<HashSet<u64>>,
        gate: Mutex<Option<Gate>>,
        executed: Mutex<Vec<u64>>,
    }

    impl ScriptedExecutor {
        fn fail_items(&self, positions: impl IntoIterator<Item = u64>) {
            self.item_failures.lock().unwrap().extend(positions);
        }

        fn fatal_at(&self, position: u64) {
            self.fatal.lock().unwrap().insert(position);
        }

        fn clear_fatal(&self) {
            self.fatal.lock().unwrap().clear();
        }

        /// Block the executor inside `position` until the test opens the gate.
        fn gate_at(&self, position: u64) -> GateControl {
            let (reached_tx, reached_rx) = mpsc::channel();
            let (release_tx, release_rx) = mpsc::channel();
            *self.gate.lock().unwrap() = Some(Gate {
                position,
                reached: reached_tx,
                release: release_rx,
            });
            GateControl {
                reached: reached_rx,
                release: release_tx,
            }
        }

        fn executed(&self) -> Vec<u64> {
            self.executed.lock().unwrap().clone()
        }
    }

    impl ItemExecutor for ScriptedExecutor {
        fn execute(&self, _job: &JobRecord, item: &WorkItem) -> Result<ItemOutput, ExecutionError> {
            let position = item.position;
            self.executed.lock().unwrap().push(position);

            let gate = {
                let mut slot = self.gate.lock().unwrap();
                match slot.as_ref() {
                    Some(g) if g.position == position => slot.take(),
                    _ => None,
                }
            };
            if let Some(gate) = gate {
                let _ = gate.reached.send(());
                let _ = gate.release.recv_timeout(GATE_TIMEOUT);
            }

            if self.fatal.lock().unwrap().contains(&position) {
                return Err(ExecutionError::fatal("model endpoint rejected credentials"));
            }
            if self.item_failures.lock().unwrap().contains(&position) {
                return Err(ExecutionError::item(format!("no answer for item {position}")));
            }
            Ok(serde_json::json!({ "answer": format!("answer {position}") }))
        }
    }

    fn wait_until(mut done: impl FnMut() -> bool) {
        let deadline = std::time::Instant::now() + GATE_TIMEOUT;
        while !done() {
            assert!(std::time::Instant::now() < deadline, "condition not reached in time");
            std::thread::sleep(Duration::from_millis(2));
        }
    }

    struct Harness {
        orch: Orchestrator,
        store: Arc<InMemoryJobStore>,
        cache: Arc<InMemoryCache>,
        source: Arc<InMemoryWorkItemSource>,
        executor: Arc<ScriptedExecutor>,
        events: Subscription,
        config: EngineConfig,
    }

    impl Harness {
        fn new(config: EngineConfig) -> Self {
            Self::sharing(
                config,
                InMemoryJobStore::arc(),
                InMemoryCache::arc(),
                InMemoryWorkItemSource::arc(),
            )
        }

        /// A second "process" over the same durable store, cache and items.
        fn sharing(
            config: EngineConfig,
            store: Arc<InMemoryJobStore>,
            cache: Arc<InMemoryCache>,
            source: Arc<InMemoryWorkItemSource>,
        ) -> Self {
            let backend: Arc<dyn KeyValueCache> = cache.clone();
            Self::build(config, store, cache, backend, source)
        }

        /// Orchestrator talks to the cache through a [`HookedCache`], so a test
        /// can interleave a second operation with one cache round trip.
        fn hooked(config: EngineConfig) -> (Self, Arc<HookedCache>) {
            let cache = InMemoryCache::arc();
            let hooked = HookedCache::wrapping(cache.clone());
            let h = Self::build(
                config,
                InMemoryJobStore::arc(),
                cache,
                hooked.clone(),
                InMemoryWorkItemSource::arc(),
            );
            (h, hooked)
        }

        fn build(
            config: EngineConfig,
            store: Arc<InMemoryJobStore>,
            cache: Arc<InMemoryCache>,
            backend: Arc<dyn KeyValueCache>,
            source: Arc<InMemoryWorkItemSource>,
        ) -> Self {
            evalrun_observability::init();

            let bus: Arc<InMemoryEventBus> = Arc::new(InMemoryEventBus::new());
            let events = bus.subscribe();
            let executor = Arc::new(ScriptedExecutor::default());

            let orch = Orchestrator::new(
                store.clone(),
                backend,
                Arc::new(BusNotifier::new(bus)),
                config.clone(),
            );
            orch.register(JobKind::AnswerGeneration, source.clone(), executor.clone());
            orch.register(JobKind::Evaluation, source.clone(), executor.clone());

            Self {
                orch,
                store,
                cache,
                source,
                executor,
                events,
                config,
            }
        }

        fn submit(&self, kind: JobKind, total: u64) -> JobRecord {
            let job = JobRecord::new(kind, total);
            self.orch.submit(job.clone()).unwrap();
            self.source.seed(job.id, total).unwrap();
            self.store.load(job.id).unwrap()
        }

        fn status_cache(&self) -> StatusCache {
            StatusCache::new(
                self.cache.clone(),
                self.config.cache_key_prefix.clone(),
                self.config.cache_ttl,
            )
        }

        fn terminal_positions(&self, job: &JobRecord) -> Vec<u64> {
            self.source
                .items(job.id)
                .unwrap()
                .into_iter()
                .filter(|i| i.is_terminal())
                .map(|i| i.position)
                .collect()
        }
    }

    #[test]
    fn pause_after_five_items_then_resume_to_completion() {
        let h = Harness::new(EngineConfig::default().with_fetch_batch_size(4));
        let job = h.submit(JobKind::AnswerGeneration, 10);
        h.executor.fail_items([5]);
        let gate = h.executor.gate_at(5);

        h.orch.start(job.id).unwrap();
        gate.wait_reached();
        h.orch.pause(job.id, "operator request").unwrap();
        gate.open();
        assert_eq!(h.orch.wait(job.id), Some(WorkerExit::Paused));

        let paused = h.orch.get_status(job.id).unwrap();
        assert_eq!(paused.status, JobStatus::Paused);
        assert_eq!(paused.completed_count, 4);
        assert_eq!(paused.failed_count, 1);
        assert_eq!(paused.checkpoint, Some(5));
        assert_eq!(paused.pause_reason.as_deref(), Some("operator request"));
        assert_eq!(h.terminal_positions(&job), vec![1, 2, 3, 4, 5]);
        assert!(h.status_cache().interrupt_requested(job.id).unwrap());

        h.orch.resume(job.id).unwrap();
        assert_eq!(h.orch.wait(job.id), Some(WorkerExit::Completed));

        let done = h.orch.get_status(job.id).unwrap();
        assert_eq!(done.status, JobStatus::Completed);
        assert_eq!(done.completed_count, 9);
        assert_eq!(done.failed_count, 1);
        assert_eq!(done.resume_count, 1);
        assert_eq!(done.progress_percentage, 100.0);
        assert_eq!(h.executor.executed(), (1..=10).collect::<Vec<_>>());
        assert_eq!(h.source.detail(job.id, 7).unwrap(), Some(serde_json::json!({ "answer": "answer 7" })));
    }

    #[test]
    fn resume_while_running_is_rejected_without_side_effects() {
        let h = Harness::new(EngineConfig::default());
        let job = h.submit(JobKind::Evaluation, 3);
        let gate = h.executor.gate_at(1);

        h.orch.start(job.id).unwrap();
        gate.wait_reached();
        let before = h.store.load(job.id).unwrap();

        let err = h.orch.resume(job.id).unwrap_err();
        assert!(matches!(
            err,
            OrchestratorError::StateConflict {
                status: JobStatus::Running,
                operation: "resume",
                ..
            }
        ));
        let after = h.store.load(job.id).unwrap();
        assert_eq!(after.owner_lease, before.owner_lease);
        assert_eq!(after.resume_count, 0);
        assert_eq!(h.orch.active_workers(), 1);

        gate.open();
        assert_eq!(h.orch.wait(job.id), Some(WorkerExit::Completed));
        assert_eq!(h.executor.executed(), vec![1, 2, 3]);
    }

    #[test]
    fn fatal_error_then_reset_and_resume() {
        let h = Harness::new(EngineConfig::default());
        let job = h.submit(JobKind::AnswerGeneration, 10);
        h.executor.fatal_at(7);

        h.orch.start(job.id).unwrap();
        let exit = h.orch.wait(job.id);
        assert!(matches!(exit, Some(WorkerExit::Failed(ref m)) if m.contains("credentials")));

        let failed = h.orch.get_status(job.id).unwrap();
        assert_eq!(failed.status, JobStatus::Failed);
        assert_eq!(failed.checkpoint, Some(6));
        assert_eq!(failed.completed_count, 6);
        assert!(failed.error_message.as_deref().is_some_and(|m| !m.is_empty()));
        // Item 7 was attempted but never recorded.
        assert_eq!(h.terminal_positions(&job), (1..=6).collect::<Vec<_>>());

        // No automatic retry: resume is refused until an operator resets.
        assert!(h.orch.resume(job.id).unwrap_err().is_state_conflict());

        let reset = h.orch.reset_failed(job.id).unwrap();
        assert_eq!(reset.status, JobStatus::Paused);
        assert_eq!(reset.error_message, None);
        assert_eq!(reset.checkpoint, Some(6));
        assert!(h.status_cache().interrupt_requested(job.id).unwrap());

        h.executor.clear_fatal();
        h.orch.resume(job.id).unwrap();
        assert_eq!(h.orch.wait(job.id), Some(WorkerExit::Completed));

        let executed = h.executor.executed();
        assert_eq!(&executed[..7], &[1, 2, 3, 4, 5, 6, 7]);
        assert_eq!(&executed[7..], &[7, 8, 9, 10]);
        let done = h.orch.get_status(job.id).unwrap();
        assert_eq!(done.completed_count, 10);
        assert_eq!(done.resume_count, 1);
    }

    #[test]
    fn resume_on_another_orchestrator_never_reprocesses() {
        let a = Harness::new(EngineConfig::default().with_checkpoint_interval(2));
        let job = a.submit(JobKind::Evaluation, 10);
        let gate = a.executor.gate_at(3);

        a.orch.start(job.id).unwrap();
        gate.wait_reached();
        a.orch.pause(job.id, "deploy").unwrap();
        gate.open();
        assert_eq!(a.orch.wait(job.id), Some(WorkerExit::Paused));
        assert_eq!(a.orch.get_status(job.id).unwrap().checkpoint, Some(3));

        let b = Harness::sharing(
            a.config.clone(),
            a.store.clone(),
            a.cache.clone(),
            a.source.clone(),
        );
        let lease_before = a.store.load(job.id).unwrap().owner_lease;
        assert_eq!(lease_before, None);

        b.orch.resume(job.id).unwrap();
        assert_eq!(b.orch.wait(job.id), Some(WorkerExit::Completed));

        assert_eq!(a.executor.executed(), vec![1, 2, 3]);
        assert_eq!(b.executor.executed(), (4..=10).collect::<Vec<_>>());
        let done = a.orch.get_status(job.id).unwrap();
        assert_eq!(done.completed_count, 10);
        assert_eq!(done.resume_count, 1);
    }

    #[test]
    fn pause_survives_a_cache_outage() {
        let h = Harness::new(EngineConfig::default());
        let job = h.submit(JobKind::AnswerGeneration, 5);
        let gate = h.executor.gate_at(2);

        h.orch.start(job.id).unwrap();
        gate.wait_reached();
        h.cache.set_offline(true);
        h.orch.pause(job.id, "maintenance").unwrap();
        gate.open();
        assert_eq!(h.orch.wait(job.id), Some(WorkerExit::Paused));

        let paused = h.store.load(job.id).unwrap();
        assert_eq!(paused.status, JobStatus::Paused);
        assert_eq!(paused.checkpoint, Some(2));

        // The cache still says RUNNING; the next read heals it.
        h.cache.set_offline(false);
        let cache = h.status_cache();
        assert_eq!(cache.status(job.id).unwrap(), Some(JobStatus::Running));
        assert_eq!(h.orch.get_status(job.id).unwrap().status, JobStatus::Paused);
        assert_eq!(cache.status(job.id).unwrap(), Some(JobStatus::Paused));
        assert!(cache.interrupt_requested(job.id).unwrap());
    }

    #[test]
    fn stalled_job_is_reclaimed_and_resumed() {
        let h = Harness::new(EngineConfig::default());
        let job = h.submit(JobKind::AnswerGeneration, 4);
        let gate = h.executor.gate_at(1);

        h.orch.start(job.id).unwrap();
        gate.wait_reached();

        // Not stalled under a generous threshold.
        assert!(h.orch.list_stalled(Duration::from_secs(3600)).unwrap().is_empty());
        assert!(h
            .orch
            .reclaim_stalled(job.id, Duration::from_secs(3600))
            .unwrap_err()
            .is_state_conflict());

        std::thread::sleep(Duration::from_millis(5));
        let stalled = h.orch.list_stalled(Duration::ZERO).unwrap();
        assert_eq!(stalled.iter().map(|v| v.id).collect::<Vec<_>>(), vec![job.id]);

        let reclaimed = h.orch.reclaim_stalled(job.id, Duration::ZERO).unwrap();
        assert_eq!(reclaimed.status, JobStatus::Paused);
        assert_eq!(reclaimed.pause_reason.as_deref(), Some(STALLED_PAUSE_REASON));

        // The hung loop wakes up, finds its lease gone and leaves quietly.
        gate.open();
        assert_eq!(h.orch.wait(job.id), Some(WorkerExit::LeaseLost));
        let parked = h.store.load(job.id).unwrap();
        assert_eq!(parked.status, JobStatus::Paused);
        assert_eq!(parked.processed_count(), 0);

        // Item 1 was marked by the stale loop; the new loop skips it and the
        // counters are healed from the source at completion.
        h.orch.resume(job.id).unwrap();
        assert_eq!(h.orch.wait(job.id), Some(WorkerExit::Completed));
        assert_eq!(h.executor.executed(), vec![1, 2, 3, 4]);
        let done = h.orch.get_status(job.id).unwrap();
        assert_eq!(done.completed_count, 4);
        assert_eq!(done.progress_percentage, 100.0);
    }

    #[test]
    fn pause_reason_holds_when_the_loop_stops_before_pause_returns() {
        let (h, hooked) = Harness::hooked(EngineConfig::default());
        let job = h.submit(JobKind::AnswerGeneration, 50);
        let gate = h.executor.gate_at(3);

        h.orch.start(job.id).unwrap();
        gate.wait_reached();

        // Hold `pause` just after the flag goes up until the loop has parked the job.
        let (raised_tx, raised_rx) = mpsc::channel();
        let (store, job_id) = (h.store.clone(), job.id);
        hooked.after_set(":interrupt:", move || {
            let _ = raised_tx.send(());
            wait_until(|| store.load(job_id).unwrap().status == JobStatus::Paused);
        });

        let orch = &h.orch;
        let paused = std::thread::scope(|scope| {
            let pausing = scope.spawn(move || orch.pause(job_id, "operator maintenance"));
            raised_rx
                .recv_timeout(GATE_TIMEOUT)
                .expect("pause never raised the interrupt flag");
            gate.open();
            pausing.join().unwrap()
        });

        let view = paused.unwrap();
        assert_eq!(view.pause_reason.as_deref(), Some("operator maintenance"));
        assert_eq!(h.orch.wait(job.id), Some(WorkerExit::Paused));

        let stored = h.store.load(job.id).unwrap();
        assert_eq!(stored.status, JobStatus::Paused);
        assert_eq!(stored.pause_reason.as_deref(), Some("operator maintenance"));
        assert_eq!(stored.checkpoint, Some(3));
    }

    #[test]
    fn status_read_racing_a_resume_does_not_pause_the_job_again() {
        let (h, hooked) = Harness::hooked(EngineConfig::default());
        let job = h.submit(JobKind::Evaluation, 20);
        let gate = h.executor.gate_at(2);

        h.orch.start(job.id).unwrap();
        gate.wait_reached();
        h.orch.pause(job.id, "deploy").unwrap();
        gate.open();
        assert_eq!(h.orch.wait(job.id), Some(WorkerExit::Paused));

        // Park a status read inside its cache lookup, then resume meanwhile.
        let (reached_tx, reached_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        hooked.before_get(":state:", move || {
            let _ = reached_tx.send(());
            let _ = release_rx.recv_timeout(GATE_TIMEOUT);
        });
        let resumed_gate = h.executor.gate_at(5);

        let (orch, job_id) = (&h.orch, job.id);
        let (status, resumed) = std::thread::scope(|scope| {
            let reading = scope.spawn(move || orch.get_status(job_id));
            reached_rx
                .recv_timeout(GATE_TIMEOUT)
                .expect("status read never reached the cache");
            let resuming = scope.spawn(move || orch.resume(job_id));
            std::thread::sleep(Duration::from_millis(50));
            release_tx.send(()).unwrap();
            (reading.join().unwrap(), resuming.join().unwrap())
        });

        assert_eq!(status.unwrap().status, JobStatus::Paused);
        assert_eq!(resumed.unwrap().status, JobStatus::Resuming);
        assert!(!h.status_cache().interrupt_requested(job.id).unwrap());

        resumed_gate.wait_reached();
        resumed_gate.open();
        assert_eq!(h.orch.wait(job.id), Some(WorkerExit::Completed));

        let done = h.orch.get_status(job.id).unwrap();
        assert_eq!(done.status, JobStatus::Completed);
        assert_eq!(done.completed_count, 20);
        assert_eq!(done.resume_count, 1);
    }

    #[test]
    fn pause_after_the_last_item_completes_without_pause_state() {
        let h = Harness::new(EngineConfig::default());
        let job = h.submit(JobKind::Evaluation, 3);
        let gate = h.executor.gate_at(3);

        h.orch.start(job.id).unwrap();
        gate.wait_reached();
        h.orch.pause(job.id, "too late").unwrap();
        gate.open();
        assert_eq!(h.orch.wait(job.id), Some(WorkerExit::Completed));

        let done = h.orch.get_status(job.id).unwrap();
        assert_eq!(done.status, JobStatus::Completed);
        assert_eq!(done.pause_reason, None);
        assert!(!h.status_cache().interrupt_requested(job.id).unwrap());
    }

    #[test]
    fn lifecycle_events_and_monotonic_progress() {
        let h = Harness::new(EngineConfig::default().with_fetch_batch_size(3));
        let job = h.submit(JobKind::Evaluation, 8);
        h.executor.fail_items([2, 6]);

        h.orch.start(job.id).unwrap();
        assert_eq!(h.orch.wait(job.id), Some(WorkerExit::Completed));

        let events = h.events.drain();
        let kinds: Vec<_> = events.iter().map(|e| e.kind()).collect();
        assert_eq!(kinds.first(), Some(&JobEventKind::Started));
        assert_eq!(kinds.last(), Some(&JobEventKind::Completed));
        assert_eq!(kinds.iter().filter(|k| **k == JobEventKind::Progress).count(), 8);

        let mut last = 0.0;
        for event in events.iter().filter(|e| e.kind() == JobEventKind::Progress) {
            let payload = event.payload();
            let progress = payload["progress_percentage"].as_f64().unwrap();
            let processed = payload["completed_count"].as_u64().unwrap()
                + payload["failed_count"].as_u64().unwrap();
            assert!((0.0..=100.0).contains(&progress));
            assert!(progress >= last, "progress went backwards: {last} -> {progress}");
            assert!(processed <= payload["total_count"].as_u64().unwrap());
            last = progress;
        }
        assert_eq!(last, 100.0);
    }

    #[test]
    fn empty_job_completes_at_full_progress() {
        let h = Harness::new(EngineConfig::default());
        let job = h.submit(JobKind::Evaluation, 0);

        h.orch.start(job.id).unwrap();
        assert_eq!(h.orch.wait(job.id), Some(WorkerExit::Completed));

        let done = h.orch.get_status(job.id).unwrap();
        assert_eq!(done.status, JobStatus::Completed);
        assert_eq!(done.progress_percentage, 100.0);
        assert!(h.executor.executed().is_empty());
    }

    #[test]
    fn independent_jobs_run_concurrently() -> anyhow::Result<()> {
        let h = Harness::new(EngineConfig::default());
        let first = h.submit(JobKind::AnswerGeneration, 3);
        let second = h.submit(JobKind::Evaluation, 3);
        // Park the first job; the second must still finish.
        let gate = h.executor.gate_at(1);

        h.orch.start(first.id)?;
        gate.wait_reached();
        h.orch.start(second.id)?;
        assert_eq!(h.orch.wait(second.id), Some(WorkerExit::Completed));
        assert_eq!(h.orch.get_status(first.id)?.status, JobStatus::Running);

        gate.open();
        assert_eq!(h.orch.wait(first.id), Some(WorkerExit::Completed));
        Ok(())
    }

    proptest! {
        #![proptest_config(ProptestConfig { cases: 24, .. ProptestConfig::default() })]

        /// Pausing after any item k checkpoints exactly k, leaves k+1.. untouched,
        /// and the resumed loop finishes without repeating work.
        #[test]
        fn prop_pause_resume_processes_each_item_once(
            total in 2u64..16,
            pause_pick in any::<prop::sample::Index>(),
            failures in prop::collection::hash_set(1u64..16, 0..5),
            interval in 1u32..4,
            batch in 1usize..6,
        ) {
            let pause_at = 1 + pause_pick.index((total - 1) as usize) as u64;
            let h = Harness::new(
                EngineConfig::default()
                    .with_checkpoint_interval(interval)
                    .with_fetch_batch_size(batch),
            );
            let job = h.submit(JobKind::Evaluation, total);
            h.executor.fail_items(failures.iter().copied());
            let gate = h.executor.gate_at(pause_at);

            h.orch.start(job.id).unwrap();
            gate.wait_reached();
            h.orch.pause(job.id, "prop").unwrap();
            gate.open();
            prop_assert_eq!(h.orch.wait(job.id), Some(WorkerExit::Paused));

            let paused = h.orch.get_status(job.id).unwrap();
            prop_assert_eq!(paused.checkpoint, Some(pause_at));
            prop_assert_eq!(paused.completed_count + paused.failed_count, pause_at);
            prop_assert_eq!(h.terminal_positions(&job), (1..=pause_at).collect::<Vec<_>>());

            h.orch.resume(job.id).unwrap();
            prop_assert_eq!(h.orch.wait(job.id), Some(WorkerExit::Completed));

            let done = h.orch.get_status(job.id).unwrap();
            let expected_failed = failures.iter().filter(|p| **p <= total).count() as u64;
            prop_assert_eq!(done.failed_count, expected_failed);
            prop_assert_eq!(done.completed_count, total - expected_failed);
            prop_assert_eq!(done.resume_count, 1);
            prop_assert_eq!(h.executor.executed(), (1..=total).collect::<Vec<_>>());
        }
    }
}
