use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use cronbind_core::config::SchedulerConfig;
use cronbind_core::{JobKey, TriggerKey};
use dashmap::DashSet;
use rusqlite::Connection;
use tokio::sync::{mpsc, watch, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::{
    error::{EngineError, JobExecutionError, Result},
    job::JobFactory,
    schedule::{CronSchedule, ScheduleZone},
    store::JobStore,
    types::{CronTrigger, FireContext, JobDetail, RunOutcome, StoredTrigger},
};

/// Tunables for [`SchedulerEngine::initialize`].
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Replace stored jobs and triggers with the ones passed at startup.
    pub overwrite_existing_jobs: bool,
    /// Upper bound on jobs executing at the same time.
    pub thread_count: usize,
    pub poll_interval: Duration,
    /// Zone every trigger's cron fields are evaluated in.
    pub time_zone: ScheduleZone,
    /// If set, every finished fire is sent here (non-blocking).
    pub outcome_tx: Option<mpsc::Sender<RunOutcome>>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        let config = SchedulerConfig::default();
        Self {
            overwrite_existing_jobs: config.overwrite_existing_jobs,
            thread_count: config.thread_count,
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            time_zone: ScheduleZone::Local,
            outcome_tx: None,
        }
    }
}

impl EngineOptions {
    /// Fails on an unknown `time_zone` name.
    pub fn from_config(config: &SchedulerConfig) -> Result<Self> {
        Ok(Self {
            overwrite_existing_jobs: config.overwrite_existing_jobs,
            thread_count: config.thread_count,
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            time_zone: ScheduleZone::from_name(config.time_zone.as_deref())?,
            outcome_tx: None,
        })
    }

    pub fn with_outcomes(mut self, tx: mpsc::Sender<RunOutcome>) -> Self {
        self.outcome_tx = Some(tx);
        self
    }
}

/// A job together with the trigger that fires it.
#[derive(Debug, Clone)]
pub struct ScheduledJob {
    pub detail: JobDetail,
    pub trigger: CronTrigger,
}

/// A pair the store refused during initialization.
#[derive(Debug)]
pub struct RejectedJob {
    pub job_key: JobKey,
    pub trigger_key: TriggerKey,
    pub error: EngineError,
}

/// Result of [`SchedulerEngine::initialize`].
pub struct Initialized {
    pub engine: SchedulerEngine,
    /// Pairs that were not stored; every other pair is in the store.
    pub rejected: Vec<RejectedJob>,
}

/// Durable cron scheduler: SQLite store plus a polling loop that fires due
/// triggers on a bounded pool of blocking worker threads.
///
/// Cheap to clone; clones share the same store and worker pool.
#[derive(Clone)]
pub struct SchedulerEngine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    store: JobStore,
    factory: Arc<dyn JobFactory>,
    workers: Arc<Semaphore>,
    thread_count: usize,
    /// Jobs flagged disallow-concurrent that are executing right now.
    in_flight: DashSet<JobKey>,
    poll_interval: Duration,
    time_zone: ScheduleZone,
    outcome_tx: Option<mpsc::Sender<RunOutcome>>,
}

impl fmt::Debug for SchedulerEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchedulerEngine")
            .field("thread_count", &self.inner.thread_count)
            .field("poll_interval", &self.inner.poll_interval)
            .field("time_zone", &self.inner.time_zone)
            .field("in_flight", &self.inner.in_flight.len())
            .finish_non_exhaustive()
    }
}

impl SchedulerEngine {
    /// Open the store on `conn`, create the schema if needed and store every
    /// job/trigger pair.
    ///
    /// A pair the store refuses is reported in [`Initialized::rejected`];
    /// the remaining pairs are still stored. Schema failures are fatal.
    pub fn initialize(
        conn: Connection,
        jobs: Vec<ScheduledJob>,
        factory: Arc<dyn JobFactory>,
        options: EngineOptions,
    ) -> Result<Initialized> {
        let store = JobStore::new(conn)?;
        let now = Utc::now();
        let mut rejected = Vec::new();

        for mut job in jobs {
            job.trigger = job.trigger.with_time_zone(options.time_zone);
            match store.store_job_and_trigger(
                &job.detail,
                &job.trigger,
                options.overwrite_existing_jobs,
                now,
            ) {
                Ok(write) => {
                    debug!(job = %job.detail.key, trigger = %job.trigger.key, ?write, "trigger bound")
                }
                // Without overwrite the stored copy wins; the job is still scheduled.
                Err(EngineError::ObjectAlreadyExists { .. }) if !options.overwrite_existing_jobs => {
                    debug!(job = %job.detail.key, "job already stored; keeping stored copy")
                }
                Err(e) => {
                    error!(job = %job.detail.key, trigger = %job.trigger.key, "failed to store job: {e}");
                    rejected.push(RejectedJob {
                        job_key: job.detail.key,
                        trigger_key: job.trigger.key,
                        error: e,
                    });
                }
            }
        }

        let thread_count = options.thread_count.max(1);
        info!(
            thread_count,
            time_zone = %options.time_zone,
            poll_ms = options.poll_interval.as_millis() as u64,
            rejected = rejected.len(),
            "scheduler engine initialized"
        );

        let engine = Self {
            inner: Arc::new(EngineInner {
                store,
                factory,
                workers: Arc::new(Semaphore::new(thread_count)),
                thread_count,
                in_flight: DashSet::new(),
                poll_interval: options.poll_interval,
                time_zone: options.time_zone,
                outcome_tx: options.outcome_tx,
            }),
        };
        Ok(Initialized { engine, rejected })
    }

    // --- store introspection ------------------------------------------------

    pub fn job_group_names(&self) -> Result<Vec<String>> {
        self.inner.store.job_group_names()
    }

    pub fn job_keys(&self, group: &str) -> Result<Vec<JobKey>> {
        self.inner.store.job_keys(group)
    }

    pub fn trigger_keys(&self, group: &str) -> Result<Vec<TriggerKey>> {
        self.inner.store.trigger_keys(group)
    }

    pub fn job_detail(&self, key: &JobKey) -> Result<Option<JobDetail>> {
        self.inner.store.job_detail(key)
    }

    pub fn trigger(&self, key: &TriggerKey) -> Result<Option<StoredTrigger>> {
        self.inner.store.trigger(key)
    }

    pub fn check_job_exists(&self, key: &JobKey) -> Result<bool> {
        self.inner.store.check_job_exists(key)
    }

    /// Delete a job and its triggers. Returns false if nothing was stored.
    pub fn delete_job(&self, key: &JobKey) -> Result<bool> {
        self.inner.store.delete_job(key)
    }

    /// True while a disallow-concurrent job is executing.
    pub fn is_running(&self, key: &JobKey) -> bool {
        self.inner.in_flight.contains(key)
    }

    // --- firing ---------------------------------------------------------------

    /// Fire every trigger due at `now`.
    ///
    /// Each fired trigger is advanced to its next cron time after `now`. A due
    /// trigger whose disallow-concurrent job is still running is left as is,
    /// so it fires on the first tick after that execution finishes.
    pub async fn tick_at(&self, now: DateTime<Utc>) -> Result<Vec<JoinHandle<RunOutcome>>> {
        let due = self.inner.store.due_triggers(now)?;
        let mut fired = Vec::with_capacity(due.len());

        for trigger in due {
            let Some(detail) = self.inner.store.job_detail(&trigger.job_key)? else {
                warn!(trigger = %trigger.key, job = %trigger.job_key, "trigger references a missing job; deleting trigger");
                self.inner.store.delete_trigger(&trigger.key)?;
                continue;
            };

            let Some(guard) = InFlightGuard::acquire(&self.inner, &detail) else {
                debug!(job = %detail.key, trigger = %trigger.key, "previous execution still running; fire deferred");
                continue;
            };

            let next = match CronSchedule::parse(&trigger.cron_expression) {
                Ok(schedule) => schedule.in_zone(self.inner.time_zone).next_after(now),
                Err(e) => {
                    error!(trigger = %trigger.key, "stored cron expression unusable, trigger stopped: {e}");
                    None
                }
            };
            let scheduled = trigger.next_fire.unwrap_or(now);
            self.inner.store.record_fire(&trigger.key, scheduled, next)?;

            if scheduled < now - chrono::Duration::seconds(60) {
                info!(trigger = %trigger.key, %scheduled, "misfired trigger fires now");
            }

            let ctx = FireContext::new(&detail, Some(trigger.key.clone()), Some(scheduled), now);
            fired.push(self.spawn_fire(detail, ctx, guard).await?);
        }

        Ok(fired)
    }

    /// Fire a job right away, outside its schedule.
    ///
    /// Returns `None` when the job is disallow-concurrent and already running.
    pub async fn trigger_job(&self, key: &JobKey) -> Result<Option<JoinHandle<RunOutcome>>> {
        let detail = self
            .inner
            .store
            .job_detail(key)?
            .ok_or_else(|| EngineError::JobNotFound { key: key.clone() })?;

        let Some(guard) = InFlightGuard::acquire(&self.inner, &detail) else {
            debug!(job = %key, "previous execution still running; manual fire suppressed");
            return Ok(None);
        };

        let ctx = FireContext::new(&detail, None, None, Utc::now());
        Ok(Some(self.spawn_fire(detail, ctx, guard).await?))
    }

    async fn spawn_fire(
        &self,
        detail: JobDetail,
        ctx: FireContext,
        guard: InFlightGuard,
    ) -> Result<JoinHandle<RunOutcome>> {
        let permit = Arc::clone(&self.inner.workers)
            .acquire_owned()
            .await
            .map_err(|_| EngineError::WorkerPoolClosed)?;
        let inner = Arc::clone(&self.inner);

        Ok(tokio::task::spawn_blocking(move || {
            let _permit = permit;
            let _guard = guard;
            inner.execute(&detail, ctx)
        }))
    }

    /// Main event loop. Polls every `poll_interval` until `shutdown` broadcasts `true`.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!("scheduler engine started");

        let mut interval = tokio::time::interval(self.inner.poll_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.tick_at(Utc::now()).await {
                        error!("scheduler tick error: {e}");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("scheduler engine shutting down");
                        break;
                    }
                }
            }
        }
    }

    /// Wait until every executing job has returned.
    pub async fn wait_for_running_jobs(&self) {
        let all = u32::try_from(self.inner.thread_count).unwrap_or(u32::MAX);
        match self.inner.workers.acquire_many(all).await {
            Ok(permits) => drop(permits),
            Err(_) => warn!("worker pool closed while waiting for running jobs"),
        }
    }
}

impl EngineInner {
    /// Run one fire on the current (blocking) thread.
    fn execute(&self, detail: &JobDetail, mut ctx: FireContext) -> RunOutcome {
        let started = Instant::now();
        debug!(job = %detail.key, fire = %ctx.fire_instance_id(), "job firing");

        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            let job = self.factory.new_job(detail)?;
            job.execute(&mut ctx)
        }))
        .unwrap_or_else(|_| Err(JobExecutionError::new("job panicked")));

        let duration_ms = started.elapsed().as_millis() as u64;
        let error = match result {
            Ok(()) => {
                info!(job = %detail.key, duration_ms, has_result = ctx.result().is_some(), "job completed");
                None
            }
            Err(e) => {
                error!(job = %detail.key, duration_ms, "job execution failed: {e}");
                Some(e.to_string())
            }
        };

        let outcome = RunOutcome::from_context(ctx, duration_ms, error);
        if let Some(ref tx) = self.outcome_tx {
            // try_send never blocks a worker; a full channel only loses the report.
            if tx.try_send(outcome.clone()).is_err() {
                warn!(job = %detail.key, "outcome channel full or closed; outcome dropped");
            }
        }
        outcome
    }
}

/// Marks a disallow-concurrent job as running until dropped.
struct InFlightGuard {
    inner: Option<(Arc<EngineInner>, JobKey)>,
}

impl InFlightGuard {
    /// `None` if the job is disallow-concurrent and already running.
    fn acquire(inner: &Arc<EngineInner>, detail: &JobDetail) -> Option<Self> {
        if !detail.disallow_concurrent {
            return Some(Self { inner: None });
        }
        if !inner.in_flight.insert(detail.key.clone()) {
            return None;
        }
        Some(Self {
            inner: Some((Arc::clone(inner), detail.key.clone())),
        })
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if let Some((inner, key)) = self.inner.take() {
            inner.in_flight.remove(&key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::Job;
    use chrono::Timelike;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct Counting {
        runs: Arc<AtomicUsize>,
    }

    impl Job for Counting {
        fn execute(&self, ctx: &mut FireContext) -> std::result::Result<(), JobExecutionError> {
            let n = self.runs.fetch_add(1, Ordering::SeqCst) + 1;
            ctx.set_result(serde_json::json!(n));
            Ok(())
        }
    }

    struct CountingFactory {
        runs: Arc<AtomicUsize>,
    }

    impl JobFactory for CountingFactory {
        fn new_job(&self, _: &JobDetail) -> std::result::Result<Box<dyn Job>, JobExecutionError> {
            Ok(Box::new(Counting {
                runs: Arc::clone(&self.runs),
            }))
        }
    }

    /// Blocks every execution until the test sends on the gate.
    struct Gated {
        gate: Arc<Mutex<std::sync::mpsc::Receiver<()>>>,
    }

    impl Job for Gated {
        fn execute(&self, _: &mut FireContext) -> std::result::Result<(), JobExecutionError> {
            let gate = self.gate.lock().map_err(|_| JobExecutionError::new("gate poisoned"))?;
            gate.recv().map_err(|e| JobExecutionError::with_source("gate closed", e))
        }
    }

    struct GatedFactory {
        gate: Arc<Mutex<std::sync::mpsc::Receiver<()>>>,
    }

    impl JobFactory for GatedFactory {
        fn new_job(&self, _: &JobDetail) -> std::result::Result<Box<dyn Job>, JobExecutionError> {
            Ok(Box::new(Gated {
                gate: Arc::clone(&self.gate),
            }))
        }
    }

    struct Panicking;

    impl Job for Panicking {
        fn execute(&self, _: &mut FireContext) -> std::result::Result<(), JobExecutionError> {
            panic!("boom");
        }
    }

    struct PanickingFactory;

    impl JobFactory for PanickingFactory {
        fn new_job(&self, _: &JobDetail) -> std::result::Result<Box<dyn Job>, JobExecutionError> {
            Ok(Box::new(Panicking))
        }
    }

    fn scheduled(name: &str, expression: &str, disallow_concurrent: bool) -> ScheduledJob {
        let job_key = JobKey::with_default_group(format!("{name}Detail"));
        ScheduledJob {
            detail: JobDetail::new(job_key.clone())
                .durable(true)
                .disallow_concurrent(disallow_concurrent),
            trigger: CronTrigger::new(
                TriggerKey::with_default_group(format!("{name}Trigger")),
                job_key,
                expression,
            )
            .expect("trigger"),
        }
    }

    fn engine(jobs: Vec<ScheduledJob>, factory: Arc<dyn JobFactory>) -> SchedulerEngine {
        let init = SchedulerEngine::initialize(
            Connection::open_in_memory().expect("open"),
            jobs,
            factory,
            EngineOptions::default(),
        )
        .expect("initialize");
        assert!(init.rejected.is_empty());
        init.engine
    }

    fn next_fire(engine: &SchedulerEngine, name: &str) -> DateTime<Utc> {
        engine
            .trigger(&TriggerKey::with_default_group(format!("{name}Trigger")))
            .expect("read")
            .expect("present")
            .next_fire
            .expect("scheduled")
    }

    #[tokio::test]
    async fn due_trigger_fires_once_and_advances() {
        let runs = Arc::new(AtomicUsize::new(0));
        let engine = engine(
            vec![scheduled("Job1", "0 0/1 * * * ?", true)],
            Arc::new(CountingFactory { runs: Arc::clone(&runs) }),
        );

        let first = next_fire(&engine, "Job1");
        assert!(engine.tick_at(first - chrono::Duration::seconds(1)).await.expect("tick").is_empty());

        let fired = engine.tick_at(first).await.expect("tick");
        assert_eq!(fired.len(), 1);
        for handle in fired {
            let outcome = handle.await.expect("join");
            assert!(outcome.is_success());
            assert_eq!(outcome.result, Some(serde_json::json!(1)));
        }

        // Same instant again: already advanced, nothing to fire.
        assert!(engine.tick_at(first).await.expect("tick").is_empty());
        assert_eq!(next_fire(&engine, "Job1"), first + chrono::Duration::minutes(1));
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn overlapping_fire_of_disallow_concurrent_job_is_deferred() {
        let (gate_tx, gate_rx) = std::sync::mpsc::channel();
        let engine = engine(
            vec![scheduled("Slow", "0 0/1 * * * ?", true)],
            Arc::new(GatedFactory { gate: Arc::new(Mutex::new(gate_rx)) }),
        );
        let key = JobKey::with_default_group("SlowDetail");

        let first = next_fire(&engine, "Slow");
        let mut fired = engine.tick_at(first).await.expect("tick");
        assert_eq!(fired.len(), 1);
        assert!(engine.is_running(&key));

        // The next tick comes due while the first run is still blocked.
        let second = first + chrono::Duration::minutes(1);
        assert!(engine.tick_at(second).await.expect("tick").is_empty());
        assert!(engine.trigger_job(&key).await.expect("manual").is_none());

        gate_tx.send(()).expect("release");
        fired.pop().expect("handle").await.expect("join");
        assert!(!engine.is_running(&key));

        // Deferred fire goes out once the previous run finished.
        let later = engine.tick_at(second).await.expect("tick");
        assert_eq!(later.len(), 1);
        gate_tx.send(()).expect("release");
        for handle in later {
            assert!(handle.await.expect("join").is_success());
        }
    }

    #[tokio::test]
    async fn panicking_job_reports_failure_and_stays_scheduled() {
        let engine = engine(
            vec![scheduled("Bad", "0 0/1 * * * ?", true)],
            Arc::new(PanickingFactory),
        );
        let first = next_fire(&engine, "Bad");

        for handle in engine.tick_at(first).await.expect("tick") {
            let outcome = handle.await.expect("join");
            assert_eq!(outcome.error.as_deref(), Some("job panicked"));
        }
        assert!(!engine.is_running(&JobKey::with_default_group("BadDetail")));
        assert_eq!(next_fire(&engine, "Bad"), first + chrono::Duration::minutes(1));
    }

    #[tokio::test]
    async fn outcomes_are_published() {
        let (tx, mut rx) = mpsc::channel(8);
        let runs = Arc::new(AtomicUsize::new(0));
        let init = SchedulerEngine::initialize(
            Connection::open_in_memory().expect("open"),
            vec![scheduled("Job2", "0 0/1 * * * ?", true)],
            Arc::new(CountingFactory { runs }),
            EngineOptions::default().with_outcomes(tx),
        )
        .expect("initialize");

        let key = JobKey::with_default_group("Job2Detail");
        let handle = init.engine.trigger_job(&key).await.expect("fire").expect("not suppressed");
        handle.await.expect("join");

        let outcome = rx.recv().await.expect("outcome");
        assert_eq!(outcome.job_key, key);
        assert!(outcome.trigger_key.is_none());
        assert_eq!(outcome.result, Some(serde_json::json!(1)));
    }

    #[test]
    fn stored_job_is_kept_without_overwrite() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("jobs.db");
        let runs = Arc::new(AtomicUsize::new(0));

        let first = SchedulerEngine::initialize(
            Connection::open(&path).expect("open"),
            vec![scheduled("Job1", "0 0/1 * * * ?", true)],
            Arc::new(CountingFactory { runs: Arc::clone(&runs) }),
            EngineOptions::default(),
        )
        .expect("initialize");
        assert!(first.rejected.is_empty());
        drop(first);

        let options = EngineOptions {
            overwrite_existing_jobs: false,
            ..EngineOptions::default()
        };
        let second = SchedulerEngine::initialize(
            Connection::open(&path).expect("reopen"),
            vec![scheduled("Job1", "0 0/5 * * * ?", true)],
            Arc::new(CountingFactory { runs }),
            options,
        )
        .expect("initialize");
        assert!(second.rejected.is_empty());

        let stored = second
            .engine
            .trigger(&TriggerKey::with_default_group("Job1Trigger"))
            .expect("read")
            .expect("present");
        assert_eq!(stored.cron_expression, "0 0/1 * * * ?");
    }

    #[test]
    fn cron_fields_are_read_in_the_configured_zone() {
        let options = EngineOptions {
            time_zone: ScheduleZone::Named(chrono_tz::America::New_York),
            ..EngineOptions::default()
        };
        let init = SchedulerEngine::initialize(
            Connection::open_in_memory().expect("open"),
            vec![scheduled("Noon", "0 0 12 * * ?", true)],
            Arc::new(PanickingFactory),
            options,
        )
        .expect("initialize");

        let next = next_fire(&init.engine, "Noon");
        let local = next.with_timezone(&chrono_tz::America::New_York);
        assert_eq!((local.hour(), local.minute()), (12, 0));
    }

    #[test]
    fn unknown_zone_in_config_is_err() {
        let config = SchedulerConfig {
            time_zone: Some("Atlantis/Capital".to_string()),
            ..SchedulerConfig::default()
        };
        let err = EngineOptions::from_config(&config).unwrap_err();
        assert!(matches!(err, EngineError::InvalidTimeZone { .. }));

        let config = SchedulerConfig {
            time_zone: Some("Asia/Tokyo".to_string()),
            ..SchedulerConfig::default()
        };
        let options = EngineOptions::from_config(&config).expect("options");
        assert_eq!(options.time_zone, ScheduleZone::Named(chrono_tz::Asia::Tokyo));
    }

    #[tokio::test]
    async fn trigger_of_a_deleted_job_is_dropped_once() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("jobs.db");
        let runs = Arc::new(AtomicUsize::new(0));
        let init = SchedulerEngine::initialize(
            Connection::open(&path).expect("open"),
            vec![scheduled("Gone", "0 0/1 * * * ?", true)],
            Arc::new(CountingFactory { runs: Arc::clone(&runs) }),
            EngineOptions::default(),
        )
        .expect("initialize");
        let engine = init.engine;
        let first = next_fire(&engine, "Gone");

        // Remove the job row behind the engine's back, leaving its trigger.
        Connection::open(&path)
            .expect("second connection")
            .execute("DELETE FROM job_details", [])
            .expect("delete job row");

        assert!(engine.tick_at(first).await.expect("tick").is_empty());
        assert!(engine
            .trigger(&TriggerKey::with_default_group("GoneTrigger"))
            .expect("read")
            .is_none());
        assert!(engine.tick_at(first).await.expect("tick").is_empty());
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn debug_output_names_the_engine() {
        let engine = engine(Vec::new(), Arc::new(PanickingFactory));
        let text = format!("{engine:?}");
        assert!(text.starts_with("SchedulerEngine"));
        assert!(text.contains("thread_count: 10"));
    }

    #[tokio::test]
    async fn manual_fire_of_unknown_job_is_err() {
        let engine = engine(Vec::new(), Arc::new(PanickingFactory));
        let err = engine
            .trigger_job(&JobKey::with_default_group("Nope"))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::JobNotFound { .. }));
    }

    #[tokio::test]
    async fn misfired_trigger_fires_once_then_resumes() {
        let runs = Arc::new(AtomicUsize::new(0));
        let engine = engine(
            vec![scheduled("Job1", "0 0/1 * * * ?", false)],
            Arc::new(CountingFactory { runs: Arc::clone(&runs) }),
        );
        let first = next_fire(&engine, "Job1");
        let much_later = first + chrono::Duration::hours(3) + chrono::Duration::seconds(5);

        let fired = engine.tick_at(much_later).await.expect("tick");
        assert_eq!(fired.len(), 1);
        for handle in fired {
            handle.await.expect("join");
        }
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(
            next_fire(&engine, "Job1"),
            first + chrono::Duration::hours(3) + chrono::Duration::minutes(1)
        );
    }
}
