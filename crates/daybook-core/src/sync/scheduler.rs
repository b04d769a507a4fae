//! Decides when sync rounds run: after local edits settle, shortly after
//! startup, periodically with exponential backoff, and on demand.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};

use crate::Result;

use super::engine::{SyncEngine, SyncOutcome};
use super::transport::SyncTransport;

/// Scheduler timing knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Quiet period after the last local edit before syncing
    pub debounce: Duration,
    /// Delay before the startup round
    pub startup_delay: Duration,
    /// Periodic interval after a successful round
    pub base_interval: Duration,
    /// Ceiling for the periodic interval under repeated failure
    pub max_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_secs(1),
            startup_delay: Duration::from_millis(500),
            base_interval: Duration::from_secs(10),
            max_interval: Duration::from_secs(300),
        }
    }
}

/// Periodic interval that doubles on failure up to a ceiling and resets on success.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    #[must_use]
    pub fn new(base: Duration, max: Duration) -> Self {
        let max = max.max(base);
        Self {
            base,
            max,
            current: base,
        }
    }

    #[must_use]
    pub const fn current(&self) -> Duration {
        self.current
    }

    pub fn on_success(&mut self) {
        self.current = self.base;
    }

    pub fn on_failure(&mut self) {
        self.current = self.current.saturating_mul(2).min(self.max);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Syncing,
}

/// What caused a round to start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncTrigger {
    Startup,
    Change,
    Periodic,
    Manual,
}

/// Snapshot published after every scheduler transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerStatus {
    pub state: SchedulerState,
    /// Local edits not yet covered by a successful round
    pub dirty: bool,
    /// Current periodic interval
    pub interval: Duration,
    /// Completed rounds, successful or not
    pub rounds: u64,
    pub last_outcome: Option<SyncOutcome>,
    /// Local store error from the last round, if it hit one
    pub last_error: Option<String>,
}

enum Command {
    SyncNow,
    Shutdown,
}

type RoundResult = Result<SyncOutcome>;

/// Owns a [`SyncEngine`] and runs it on a single background task.
pub struct SyncScheduler<T> {
    engine: Arc<SyncEngine<T>>,
    config: SchedulerConfig,
}

impl<T> SyncScheduler<T>
where
    T: SyncTransport + 'static,
{
    pub fn new(engine: SyncEngine<T>, config: SchedulerConfig) -> Self {
        Self {
            engine: Arc::new(engine),
            config,
        }
    }

    /// Start the scheduler task on the current tokio runtime.
    pub fn spawn(self) -> SchedulerHandle {
        let backoff = Backoff::new(self.config.base_interval, self.config.max_interval);
        let status = SchedulerStatus {
            state: SchedulerState::Idle,
            dirty: false,
            interval: backoff.current(),
            rounds: 0,
            last_outcome: None,
            last_error: None,
        };
        let (status_tx, status_rx) = watch::channel(status.clone());
        let (command_tx, command_rx) = mpsc::channel(8);

        let runner = Runner {
            changes: self.engine.journal().subscribe_changes(),
            engine: self.engine,
            config: self.config,
            backoff,
            status,
            status_tx,
            dirty_in_round: false,
        };
        let task = tokio::spawn(runner.run(command_rx));

        SchedulerHandle {
            commands: command_tx,
            status: status_rx,
            task,
        }
    }
}

/// Control surface for a running [`SyncScheduler`].
pub struct SchedulerHandle {
    commands: mpsc::Sender<Command>,
    status: watch::Receiver<SchedulerStatus>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Request an immediate round. Dropped if one is already in flight.
    pub async fn sync_now(&self) {
        if self.commands.send(Command::SyncNow).await.is_err() {
            tracing::debug!("Sync scheduler already stopped");
        }
    }

    #[must_use]
    pub fn status(&self) -> SchedulerStatus {
        self.status.borrow().clone()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SchedulerStatus> {
        self.status.clone()
    }

    /// Stop scheduling. A round in flight runs to completion first.
    pub async fn shutdown(self) {
        if self.commands.send(Command::Shutdown).await.is_err() {
            tracing::debug!("Sync scheduler already stopped");
        }
        if let Err(error) = self.task.await {
            tracing::warn!("Sync scheduler task ended abnormally: {error}");
        }
    }
}

struct Runner<T> {
    engine: Arc<SyncEngine<T>>,
    config: SchedulerConfig,
    changes: watch::Receiver<u64>,
    backoff: Backoff,
    status: SchedulerStatus,
    status_tx: watch::Sender<SchedulerStatus>,
    /// Dirty flag captured when the current round started
    dirty_in_round: bool,
}

impl<T> Runner<T>
where
    T: SyncTransport + 'static,
{
    async fn run(mut self, mut commands: mpsc::Receiver<Command>) {
        let mut startup_at = Some(Instant::now() + self.config.startup_delay);
        let mut debounce_at: Option<Instant> = None;
        let mut periodic_at = Instant::now() + self.backoff.current();
        let mut in_flight: Option<oneshot::Receiver<RoundResult>> = None;
        let mut changes_open = true;
        let mut stopping = false;

        tracing::debug!(config = ?self.config, "Sync scheduler started");

        loop {
            tokio::select! {
                changed = self.changes.changed(), if changes_open => {
                    if changed.is_ok() {
                        self.status.dirty = true;
                        debounce_at = Some(Instant::now() + self.config.debounce);
                        self.publish();
                    } else {
                        changes_open = false;
                    }
                }
                () = sleep_until_some(debounce_at) => {
                    debounce_at = None;
                    self.trigger(SyncTrigger::Change, &mut in_flight);
                }
                () = sleep_until_some(startup_at) => {
                    startup_at = None;
                    self.trigger(SyncTrigger::Startup, &mut in_flight);
                }
                () = sleep_until(periodic_at) => {
                    if self.engine.journal().has_save_in_flight() {
                        tracing::debug!("Skipping periodic sync while a save is in flight");
                    } else {
                        self.trigger(SyncTrigger::Periodic, &mut in_flight);
                    }
                    periodic_at = Instant::now() + self.backoff.current();
                }
                result = wait_round(&mut in_flight) => {
                    in_flight = None;
                    self.finish(result);
                    periodic_at = Instant::now() + self.backoff.current();
                    if stopping {
                        break;
                    }
                }
                command = commands.recv(), if !stopping => match command {
                    Some(Command::SyncNow) => {
                        self.trigger(SyncTrigger::Manual, &mut in_flight);
                    }
                    Some(Command::Shutdown) | None => {
                        if in_flight.is_none() {
                            break;
                        }
                        tracing::debug!("Waiting for in-flight sync before stopping");
                        stopping = true;
                    }
                },
            }
        }

        tracing::debug!("Sync scheduler stopped");
    }

    /// Start a round unless one is already running.
    fn trigger(
        &mut self,
        trigger: SyncTrigger,
        in_flight: &mut Option<oneshot::Receiver<RoundResult>>,
    ) {
        if self.status.state == SchedulerState::Syncing {
            tracing::debug!(?trigger, "Sync already in flight; dropping trigger");
            return;
        }

        tracing::debug!(?trigger, "Starting sync round");
        self.status.state = SchedulerState::Syncing;
        self.dirty_in_round = self.status.dirty;
        self.status.dirty = false;
        self.publish();

        let engine = Arc::clone(&self.engine);
        let (done_tx, done_rx) = oneshot::channel();
        tokio::spawn(async move {
            let result = engine.sync_once().await;
            // Receiver only disappears when the scheduler task is gone
            let _ = done_tx.send(result);
        });
        *in_flight = Some(done_rx);
    }

    fn finish(&mut self, result: RoundResult) {
        self.status.state = SchedulerState::Idle;
        self.status.rounds += 1;

        match result {
            Ok(outcome) => {
                if outcome.success {
                    self.backoff.on_success();
                } else {
                    self.backoff.on_failure();
                    self.status.dirty |= self.dirty_in_round;
                }
                self.status.last_error = None;
                self.status.last_outcome = Some(outcome);
            }
            Err(error) => {
                tracing::warn!("Sync round failed on local store: {error}");
                self.backoff.on_failure();
                self.status.dirty |= self.dirty_in_round;
                self.status.last_error = Some(error.to_string());
                self.status.last_outcome = None;
            }
        }

        self.status.interval = self.backoff.current();
        tracing::debug!(interval = ?self.status.interval, "Next periodic sync scheduled");
        self.publish();
    }

    fn publish(&self) {
        self.status_tx.send_replace(self.status.clone());
    }
}

async fn sleep_until_some(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

async fn wait_round(in_flight: &mut Option<oneshot::Receiver<RoundResult>>) -> RoundResult {
    match in_flight {
        Some(done) => match done.await {
            Ok(result) => result,
            Err(_) => Err(crate::Error::Database(
                "sync round ended without reporting".to_string(),
            )),
        },
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EntryDate;
    use crate::services::JournalService;
    use crate::sync::{LoopbackTransport, SyncEndpoint};
    use pretty_assertions::assert_eq;

    const WAIT: Duration = Duration::from_secs(10);

    fn date(raw: &str) -> EntryDate {
        raw.parse().unwrap()
    }

    async fn engine() -> (SyncEngine<LoopbackTransport>, JournalService) {
        let server = JournalService::open_in_memory().await.unwrap();
        let transport = LoopbackTransport::new(SyncEndpoint::new(server.clone()));
        let local = JournalService::open_in_memory().await.unwrap();
        (SyncEngine::new(local, transport), server)
    }

    fn quiet_config() -> SchedulerConfig {
        SchedulerConfig {
            debounce: Duration::from_millis(100),
            startup_delay: Duration::from_secs(60),
            base_interval: Duration::from_secs(60),
            max_interval: Duration::from_secs(600),
        }
    }

    async fn wait_for_rounds(handle: &SchedulerHandle, rounds: u64) -> SchedulerStatus {
        let mut updates = handle.subscribe();
        let status = tokio::time::timeout(WAIT, updates.wait_for(|status| status.rounds >= rounds))
            .await
            .expect("scheduler did not complete the expected rounds")
            .unwrap()
            .clone();
        status
    }

    #[test]
    fn backoff_doubles_until_capped_and_resets() {
        let mut backoff = Backoff::new(Duration::from_secs(10), Duration::from_secs(60));
        assert_eq!(backoff.current(), Duration::from_secs(10));

        backoff.on_failure();
        assert_eq!(backoff.current(), Duration::from_secs(20));
        backoff.on_failure();
        assert_eq!(backoff.current(), Duration::from_secs(40));
        backoff.on_failure();
        assert_eq!(backoff.current(), Duration::from_secs(60));
        backoff.on_failure();
        assert_eq!(backoff.current(), Duration::from_secs(60));

        backoff.on_success();
        assert_eq!(backoff.current(), Duration::from_secs(10));
    }

    #[test]
    fn backoff_ceiling_never_below_base() {
        let mut backoff = Backoff::new(Duration::from_secs(10), Duration::from_secs(5));
        backoff.on_failure();
        assert_eq!(backoff.current(), Duration::from_secs(10));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn rapid_edits_collapse_into_one_round() {
        let (engine, server) = engine().await;
        let journal = engine.journal().clone();
        let handle = SyncScheduler::new(engine, quiet_config()).spawn();

        for message in ["d", "de", "dea", "dear diary"] {
            journal.save_entry(date("2024-03-01"), message).await.unwrap();
        }

        let status = wait_for_rounds(&handle, 1).await;
        assert!(status.last_outcome.as_ref().is_some_and(|outcome| outcome.success));
        assert!(!status.dirty);

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(handle.status().rounds, 1);
        assert_eq!(
            server
                .read_entry(&date("2024-03-01"))
                .await
                .unwrap()
                .map(|entry| entry.message),
            Some("dear diary".to_string())
        );

        handle.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn periodic_round_waits_for_save_in_flight() {
        let (engine, _server) = engine().await;
        let journal = engine.journal().clone();
        let config = SchedulerConfig {
            base_interval: Duration::from_millis(100),
            max_interval: Duration::from_millis(100),
            ..quiet_config()
        };

        let save = journal.hold_save();
        assert!(journal.has_save_in_flight());
        let handle = SyncScheduler::new(engine, config).spawn();

        // Several periodic ticks pass while the save is open
        tokio::time::sleep(Duration::from_millis(450)).await;
        assert_eq!(handle.status().rounds, 0);
        assert_eq!(handle.status().state, SchedulerState::Idle);

        drop(save);
        assert!(!journal.has_save_in_flight());
        let status = wait_for_rounds(&handle, 1).await;
        assert!(status.last_outcome.as_ref().is_some_and(|outcome| outcome.success));

        handle.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn startup_round_pulls_remote_changes() {
        let (engine, server) = engine().await;
        server
            .save_entry(date("2024-03-02"), "from another device")
            .await
            .unwrap();
        let journal = engine.journal().clone();
        let config = SchedulerConfig {
            startup_delay: Duration::from_millis(10),
            ..quiet_config()
        };
        let handle = SyncScheduler::new(engine, config).spawn();

        wait_for_rounds(&handle, 1).await;
        assert!(journal
            .read_entry(&date("2024-03-02"))
            .await
            .unwrap()
            .is_some());

        handle.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn triggers_during_a_round_are_dropped() {
        let (engine, _server) = engine().await;
        engine.transport().set_latency(Duration::from_millis(300));
        let handle = SyncScheduler::new(engine, quiet_config()).spawn();

        handle.sync_now().await;
        let mut status = handle.subscribe();
        tokio::time::timeout(
            WAIT,
            status.wait_for(|status| status.state == SchedulerState::Syncing),
        )
        .await
        .unwrap()
        .unwrap();

        handle.sync_now().await;
        handle.sync_now().await;

        wait_for_rounds(&handle, 1).await;
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(handle.status().rounds, 1);
        assert_eq!(handle.status().state, SchedulerState::Idle);

        handle.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn failures_back_off_and_success_resets() {
        let (engine, _server) = engine().await;
        engine.transport().set_offline(true);

        let config = SchedulerConfig {
            debounce: Duration::from_millis(10),
            startup_delay: Duration::from_millis(10),
            base_interval: Duration::from_millis(200),
            max_interval: Duration::from_millis(600),
        };
        let scheduler = SyncScheduler::new(engine, config);
        let engine = Arc::clone(&scheduler.engine);
        let handle = scheduler.spawn();

        let status = wait_for_rounds(&handle, 1).await;
        assert_eq!(status.interval, Duration::from_millis(400));
        let status = wait_for_rounds(&handle, 2).await;
        assert_eq!(status.interval, Duration::from_millis(600));
        let status = wait_for_rounds(&handle, 3).await;
        assert_eq!(status.interval, Duration::from_millis(600));
        assert!(status
            .last_outcome
            .as_ref()
            .is_some_and(|outcome| !outcome.success));

        engine.transport().set_offline(false);
        let mut updates = handle.subscribe();
        let status = tokio::time::timeout(
            WAIT,
            updates.wait_for(|status| {
                status
                    .last_outcome
                    .as_ref()
                    .is_some_and(|outcome| outcome.success)
            }),
        )
        .await
        .unwrap()
        .unwrap()
        .clone();
        assert_eq!(status.interval, Duration::from_millis(200));

        handle.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn shutdown_waits_for_round_in_flight() {
        let (engine, server) = engine().await;
        engine
            .journal()
            .save_entry(date("2024-03-03"), "must arrive")
            .await
            .unwrap();
        engine.transport().set_latency(Duration::from_millis(200));
        let handle = SyncScheduler::new(engine, quiet_config()).spawn();

        handle.sync_now().await;
        let mut status = handle.subscribe();
        tokio::time::timeout(
            WAIT,
            status.wait_for(|status| status.state == SchedulerState::Syncing),
        )
        .await
        .unwrap()
        .unwrap();

        handle.shutdown().await;
        assert!(server
            .read_entry(&date("2024-03-03"))
            .await
            .unwrap()
            .is_some());
    }
}
