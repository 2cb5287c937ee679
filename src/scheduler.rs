//! Schedule execution engine.
//!
//! Polls the stored schedules, fires the ones whose time of day matches the
//! wall clock, and runs the dispense sequence:
//!
//! ```text
//! start session -> RUN -> wait(duration) -> STOP -> wait(settle) -> end session -> delete schedule
//! ```
//!
//! A schedule fires at most once per local day. Each firing records a
//! dedupe key `YYYY-MM-DD-<id>`; the key set is cleared at local midnight
//! and pruned of other days after each firing. Only one feed runs at a time.
//! While one is running, or a manual session is open, due schedules are
//! deferred to the next tick without recording their key.

use chrono::{NaiveDate, NaiveDateTime};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::clock::Clock;
use crate::config::FeederConfig;
use crate::data::schedule::validate_kg;
use crate::data::FeedSchedule;
use crate::error::{Error, Result};
use crate::events::FeederEvent;
use crate::sensor::SensorState;
use crate::servo::ServoController;
use crate::session::{FeedingSessionTracker, SessionOutcome};
use crate::store::FeedStore;
use crate::utils::{date_stamp, duration_until_midnight, sleep_or_cancel};

/// Key that marks `schedule_id` as fired on `date`.
///
/// # Example
///
/// ```
/// use chrono::NaiveDate;
/// use feedflow::scheduler::dedupe_key;
///
/// let date = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
/// assert_eq!(dedupe_key(date, 7), "2024-06-01-7");
/// ```
pub fn dedupe_key(date: NaiveDate, schedule_id: i64) -> String {
    format!("{}-{}", date_stamp(date), schedule_id)
}

/// What a tick did with a due schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickAction {
    /// The feed was started in the background.
    Started(i64),
    /// Another feed was busy; the schedule is looked at again next tick.
    Deferred(i64),
    /// Not enough feed. Marked as fired for today.
    InsufficientFeed(i64),
}

/// Holds the `is_feeding` flag for as long as it lives.
struct FeedingGuard {
    flag: Arc<AtomicBool>,
}

impl FeedingGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| Self { flag: flag.clone() })
    }
}

impl Drop for FeedingGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// Fires feed schedules. Clones share state.
#[derive(Clone)]
pub struct ScheduleEngine {
    config: FeederConfig,
    sensors: Arc<SensorState>,
    session: Arc<FeedingSessionTracker>,
    servo: ServoController,
    store: Arc<dyn FeedStore>,
    events: broadcast::Sender<FeederEvent>,
    fired: Arc<Mutex<HashSet<String>>>,
    feeding: Arc<AtomicBool>,
    execution: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl ScheduleEngine {
    /// Create an engine. Events are published on `events`.
    pub fn new(
        config: FeederConfig,
        sensors: Arc<SensorState>,
        session: Arc<FeedingSessionTracker>,
        servo: ServoController,
        store: Arc<dyn FeedStore>,
        events: broadcast::Sender<FeederEvent>,
    ) -> Self {
        Self {
            config,
            sensors,
            session,
            servo,
            store,
            events,
            fired: Arc::new(Mutex::new(HashSet::new())),
            feeding: Arc::new(AtomicBool::new(false)),
            execution: Arc::new(Mutex::new(None)),
        }
    }

    /// Whether a feed is running.
    pub fn is_feeding(&self) -> bool {
        self.feeding.load(Ordering::SeqCst)
    }

    /// Whether `schedule_id` has fired on `date`.
    pub fn has_fired(&self, date: NaiveDate, schedule_id: i64) -> bool {
        self.fired.lock().contains(&dedupe_key(date, schedule_id))
    }

    /// Number of recorded dedupe keys.
    pub fn fired_count(&self) -> usize {
        self.fired.lock().len()
    }

    /// Forget every dedupe key.
    pub fn reset_dedupe(&self) {
        let mut fired = self.fired.lock();
        info!("Clearing {} schedule execution records", fired.len());
        fired.clear();
    }

    /// Receive engine events.
    pub fn subscribe_events(&self) -> broadcast::Receiver<FeederEvent> {
        self.events.subscribe()
    }

    /// Wait for the feed started by the last tick, if any, to finish.
    pub async fn wait_idle(&self) {
        let handle = self.execution.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!("Scheduled feed task panicked: {}", e);
            }
        }
    }

    fn mark_fired(&self, today: NaiveDate, key: String) {
        let prefix = format!("{}-", date_stamp(today));
        let mut fired = self.fired.lock();
        fired.insert(key);
        fired.retain(|k| k.starts_with(&prefix));
    }

    fn available_feed(&self) -> f64 {
        self.sensors.weight().unwrap_or(0.0)
    }

    /// Evaluate every schedule against `now` once.
    ///
    /// A feed that starts runs in a spawned task under `cancel`; the flag
    /// behind [`Self::is_feeding`] is already set when this returns.
    pub async fn tick(
        &self,
        now: NaiveDateTime,
        cancel: &CancellationToken,
    ) -> Result<Vec<TickAction>> {
        let schedules = self.store.list_schedules().await?;
        let today = now.date();
        let mut actions = Vec::new();

        for schedule in schedules.iter().filter(|s| s.is_due(now)) {
            let key = dedupe_key(today, schedule.id);
            if self.fired.lock().contains(&key) {
                continue;
            }

            let guard = match FeedingGuard::acquire(&self.feeding) {
                Some(guard) if !self.session.is_active() => guard,
                _ => {
                    debug!("Schedule {} deferred, feeder busy", schedule.id);
                    actions.push(TickAction::Deferred(schedule.id));
                    continue;
                }
            };

            let available = self.available_feed();
            if available < schedule.kg {
                drop(guard);
                self.mark_fired(today, key);
                warn!(
                    "Schedule {} needs {:.2} kg but only {:.2} kg is available",
                    schedule.id, schedule.kg, available
                );
                let _ = self.events.send(FeederEvent::InsufficientFeed {
                    schedule_id: schedule.id,
                    requested: schedule.kg,
                    available,
                });
                actions.push(TickAction::InsufficientFeed(schedule.id));
                continue;
            }

            self.mark_fired(today, key);

            let duration = self.config.dispense_duration(schedule.kg);
            info!(
                "Schedule {} fired: {} kg over {:?}",
                schedule.id, schedule.kg, duration
            );
            let _ = self.events.send(FeederEvent::ScheduledFeedStarted {
                schedule_id: schedule.id,
                kg: schedule.kg,
                duration,
            });

            let engine = self.clone();
            let fired = schedule.clone();
            let cancel = cancel.clone();
            let handle = tokio::spawn(async move {
                engine.execute(fired, guard, cancel).await;
            });
            *self.execution.lock() = Some(handle);

            actions.push(TickAction::Started(schedule.id));
        }

        Ok(actions)
    }

    async fn execute(
        &self,
        schedule: FeedSchedule,
        _guard: FeedingGuard,
        cancel: CancellationToken,
    ) {
        let result = match self.run_bracketed(schedule.kg, &cancel).await {
            Ok(outcome) => self
                .store
                .delete_schedule(schedule.id)
                .await
                .map(|()| outcome),
            Err(e) => Err(e),
        };

        match result {
            Ok(outcome) => {
                info!("Schedule {} completed", schedule.id);
                let _ = self.events.send(FeederEvent::ScheduleCompleted {
                    schedule_id: schedule.id,
                    outcome,
                });
            }
            Err(e) => {
                if e.is_transport_error() {
                    warn!("Scheduled feed {} interrupted: {}", schedule.id, e);
                } else {
                    error!("Scheduled feed {} failed: {}", schedule.id, e);
                }
                let _ = self.events.send(FeederEvent::ScheduledFeedFailed {
                    schedule_id: schedule.id,
                    reason: e.to_string(),
                });
            }
        }
    }

    /// Start a session, run the servo for the time `kg` takes, stop and end
    /// the session. On failure the servo is stopped and the session dropped.
    async fn run_bracketed(&self, kg: f64, cancel: &CancellationToken) -> Result<SessionOutcome> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let duration = self.config.dispense_duration(kg);
        self.session.start()?;

        let result = self.open_wait_close(duration, cancel).await;
        if result.is_err() {
            self.servo.stop_best_effort().await;
            self.session.abandon();
        }
        result
    }

    async fn open_wait_close(
        &self,
        duration: Duration,
        cancel: &CancellationToken,
    ) -> Result<SessionOutcome> {
        self.servo.open(None).await?;

        debug!("Dispensing for {:?}", duration);
        sleep_or_cancel(duration, cancel).await?;

        let outcome = self.servo.close(Some(self.session.as_ref()), cancel).await?;
        Ok(outcome.unwrap_or(SessionOutcome::NotActive))
    }

    /// Dispense `kg` kilograms now, outside any schedule.
    ///
    /// Rejected with [`Error::FeedInProgress`] while another feed or a
    /// manual session is running, and with [`Error::InsufficientFeed`] when
    /// the container holds less than `kg`.
    pub async fn dispense(&self, kg: f64, cancel: &CancellationToken) -> Result<SessionOutcome> {
        validate_kg(kg)?;

        if self.session.is_active() {
            return Err(Error::FeedInProgress);
        }
        let _guard = FeedingGuard::acquire(&self.feeding).ok_or(Error::FeedInProgress)?;

        let available = self.available_feed();
        if available < kg {
            return Err(Error::InsufficientFeed {
                requested: kg,
                available,
            });
        }

        info!("Dispensing {:.2} kg", kg);
        self.run_bracketed(kg, cancel).await
    }

    /// Tick every poll interval until `cancel` fires. The first tick is
    /// immediate.
    pub async fn run(&self, clock: Arc<dyn Clock>, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(self.config.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!("Schedule polling started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {
                    if let Err(e) = self.tick(clock.now(), &cancel).await {
                        warn!("Schedule check failed: {}", e);
                    }
                }
            }
        }

        info!("Schedule polling stopped");
    }

    /// Clear the dedupe keys at every local midnight until `cancel` fires.
    pub async fn run_midnight_reset(&self, clock: Arc<dyn Clock>, cancel: CancellationToken) {
        loop {
            let wait = duration_until_midnight(clock.now());
            debug!("Next dedupe reset in {:?}", wait);

            if sleep_or_cancel(wait, &cancel).await.is_err() {
                break;
            }
            self.reset_dedupe();
        }
    }
}
