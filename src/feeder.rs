//! The feeder controller.
//!
//! [`Feeder`] wires a [`Transport`] and a [`FeedStore`] to the sensor
//! tracker, session tracker, servo controller, schedule engine and
//! temperature logger, and runs their background tasks:
//!
//! - message decoding into [`SensorState`]
//! - connection watching: schedule polling and temperature logging run
//!   only while connected, under a token cancelled on disconnect
//! - the midnight dedupe reset

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::FeederConfig;
use crate::data::{calculate_feed_amount, Biomass};
use crate::error::{Error, Result};
use crate::events::FeederEvent;
use crate::monitor::TemperatureLogger;
use crate::protocol::Command;
use crate::scheduler::ScheduleEngine;
use crate::sensor::{SensorReading, SensorState};
use crate::servo::{ServoAction, ServoController};
use crate::session::{FeedingSessionTracker, SessionOutcome};
use crate::store::FeedStore;
use crate::transport::{ConnectionState, Transport};

/// Starts and stops the per-connection tasks.
#[derive(Clone)]
struct LinkSupervisor {
    engine: ScheduleEngine,
    temp_logger: Arc<TemperatureLogger>,
    session: Arc<FeedingSessionTracker>,
    clock: Arc<dyn Clock>,
    shutdown: CancellationToken,
    link: Arc<Mutex<Option<CancellationToken>>>,
}

impl LinkSupervisor {
    fn up(&self) {
        let mut link = self.link.lock();
        if link.is_some() {
            return;
        }

        info!("Feeder connected, starting schedule polling and temperature logging");

        let token = self.shutdown.child_token();

        let engine = self.engine.clone();
        let clock = self.clock.clone();
        let poll_token = token.clone();
        tokio::spawn(async move { engine.run(clock, poll_token).await });

        let temp_logger = self.temp_logger.clone();
        let log_token = token.clone();
        tokio::spawn(async move { temp_logger.run(log_token).await });

        *link = Some(token);
    }

    fn down(&self) {
        let Some(token) = self.link.lock().take() else {
            return;
        };

        info!("Feeder disconnected, stopping link tasks");
        token.cancel();

        // A scheduled feed abandons its own session on cancellation; this
        // catches a manual one left open by the lost link.
        if self.session.abandon() {
            warn!("Manual feeding session dropped on disconnect");
        }
    }

    fn apply(&self, state: ConnectionState) {
        debug!("Connection state: {}", state);
        if state.is_connected() {
            self.up();
        } else {
            self.down();
        }
    }

    async fn watch(self, mut rx: watch::Receiver<ConnectionState>) {
        let initial = *rx.borrow_and_update();
        self.apply(initial);

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                changed = rx.changed() => {
                    if changed.is_err() {
                        warn!("Connection state channel closed");
                        break;
                    }
                    let state = *rx.borrow_and_update();
                    self.apply(state);
                }
            }
        }

        self.down();
    }
}

/// An automated fish feeder.
pub struct Feeder {
    config: FeederConfig,
    transport: Arc<dyn Transport>,
    store: Arc<dyn FeedStore>,
    sensors: Arc<SensorState>,
    session: Arc<FeedingSessionTracker>,
    servo: ServoController,
    engine: ScheduleEngine,
    events_tx: broadcast::Sender<FeederEvent>,
    supervisor: LinkSupervisor,
    shutdown: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    is_running: AtomicBool,
}

impl Feeder {
    /// Create a feeder that reads the system clock.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] if `config` does not validate.
    pub fn new(
        transport: Arc<dyn Transport>,
        store: Arc<dyn FeedStore>,
        config: FeederConfig,
    ) -> Result<Self> {
        Self::with_clock(transport, store, config, Arc::new(SystemClock))
    }

    /// Create a feeder with an explicit clock.
    pub fn with_clock(
        transport: Arc<dyn Transport>,
        store: Arc<dyn FeedStore>,
        config: FeederConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate()?;

        let (events_tx, _) = broadcast::channel(64);
        let sensors = Arc::new(SensorState::new());
        let session = Arc::new(FeedingSessionTracker::new(sensors.clone(), store.clone()));
        let servo = ServoController::with_settle_delay(transport.clone(), config.settle_delay);

        let engine = ScheduleEngine::new(
            config.clone(),
            sensors.clone(),
            session.clone(),
            servo.clone(),
            store.clone(),
            events_tx.clone(),
        );
        let temp_logger = Arc::new(TemperatureLogger::new(
            &config,
            sensors.clone(),
            store.clone(),
            events_tx.clone(),
        ));

        let shutdown = CancellationToken::new();
        let supervisor = LinkSupervisor {
            engine: engine.clone(),
            temp_logger,
            session: session.clone(),
            clock,
            shutdown: shutdown.clone(),
            link: Arc::new(Mutex::new(None)),
        };

        Ok(Self {
            config,
            transport,
            store,
            sensors,
            session,
            servo,
            engine,
            events_tx,
            supervisor,
            shutdown,
            tasks: Mutex::new(Vec::new()),
            is_running: AtomicBool::new(false),
        })
    }

    /// Start the background tasks. Calling it again has no effect.
    pub fn start(&self) {
        if self.is_running.swap(true, Ordering::SeqCst) {
            debug!("Feeder already started");
            return;
        }

        info!("Starting feeder");

        let mut tasks = self.tasks.lock();

        let sensors = self.sensors.clone();
        let mut messages = self.transport.subscribe_messages();
        let shutdown = self.shutdown.clone();
        tasks.push(tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    message = messages.recv() => match message {
                        Ok(text) => {
                            sensors.apply_text(&text);
                        }
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!("Dropped {} feeder messages", skipped);
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            }
            debug!("Message decoder stopped");
        }));

        let supervisor = self.supervisor.clone();
        let connection = self.transport.subscribe_connection();
        tasks.push(tokio::spawn(supervisor.watch(connection)));

        let engine = self.engine.clone();
        let clock = self.supervisor.clock.clone();
        let reset_token = self.shutdown.child_token();
        tasks.push(tokio::spawn(async move {
            engine.run_midnight_reset(clock, reset_token).await;
        }));
    }

    /// Stop every background task and interrupt any running feed.
    pub async fn shutdown(&self) {
        if !self.is_running.swap(false, Ordering::SeqCst) {
            return;
        }

        info!("Shutting down feeder");
        self.shutdown.cancel();
        self.engine.wait_idle().await;

        let tasks: Vec<_> = self.tasks.lock().drain(..).collect();
        for task in tasks {
            if let Err(e) = task.await {
                error!("Feeder task panicked: {}", e);
            }
        }
    }

    /// Token for a manual operation: the current link's, so a disconnect
    /// interrupts it.
    fn operation_token(&self) -> CancellationToken {
        self.supervisor
            .link
            .lock()
            .clone()
            .unwrap_or_else(|| self.shutdown.child_token())
    }

    /// Open the outlet if the device reports it closed, close it otherwise.
    ///
    /// Opening starts a feeding session and closing ends it, so a manual
    /// open/close cycle produces one feed log.
    ///
    /// If `RUN` fails, the servo is stopped best-effort and the new session
    /// dropped. If the settle wait after `STOP` is interrupted, the session
    /// is dropped. A failed `STOP` keeps the session so the close can be
    /// retried.
    pub async fn toggle_servo(&self) -> Result<ServoAction> {
        if self.engine.is_feeding() {
            return Err(Error::FeedInProgress);
        }

        let is_closed = self.sensors.is_servo_closed();
        let result = self
            .servo
            .toggle(is_closed, Some(self.session.as_ref()), &self.operation_token())
            .await;

        match &result {
            Err(Error::SessionAlreadyActive) => {}
            Err(e) if is_closed => {
                warn!("Manual open failed: {}", e);
                self.servo.stop_best_effort().await;
                self.session.abandon();
            }
            Err(Error::Cancelled) => {
                self.session.abandon();
            }
            _ => {}
        }

        result
    }

    /// Recommended daily feed for `biomass` at the current water temperature.
    pub fn recommended_feed(&self, biomass: &Biomass) -> f64 {
        calculate_feed_amount(biomass.total_kg(), self.sensors.reading().temperature_or_zero())
    }

    /// Dispense the recommended amount for `biomass` now.
    pub async fn auto_feed(&self, biomass: &Biomass) -> Result<SessionOutcome> {
        let kg = self.recommended_feed(biomass);
        info!(
            "Auto feed: {:.2} kg for {:.2} kg biomass",
            kg,
            biomass.total_kg()
        );
        self.engine.dispense(kg, &self.operation_token()).await
    }

    /// Ask the device to report its servo state.
    pub async fn request_status(&self) -> Result<()> {
        self.transport.send_command(Command::Status).await
    }

    /// Push local records to the cloud replica and pull remote ones.
    pub async fn sync(&self) -> Result<()> {
        self.store.sync().await
    }

    /// Latest sensor snapshot.
    pub fn sensor_reading(&self) -> SensorReading {
        self.sensors.reading()
    }

    /// Whether a scheduled or automatic feed is running.
    pub fn is_feeding(&self) -> bool {
        self.engine.is_feeding()
    }

    /// Whether a feeding session is open.
    pub fn is_session_active(&self) -> bool {
        self.session.is_active()
    }

    /// Current link state.
    pub fn connection_state(&self) -> ConnectionState {
        self.transport.connection_state()
    }

    /// Receive feeder events.
    pub fn subscribe_events(&self) -> broadcast::Receiver<FeederEvent> {
        self.events_tx.subscribe()
    }

    /// Receive every sensor snapshot.
    pub fn subscribe_readings(&self) -> broadcast::Receiver<SensorReading> {
        self.sensors.subscribe()
    }

    /// The schedule engine.
    pub fn engine(&self) -> &ScheduleEngine {
        &self.engine
    }

    /// The storage backend.
    pub fn store(&self) -> &Arc<dyn FeedStore> {
        &self.store
    }

    /// The configuration in use.
    pub fn config(&self) -> &FeederConfig {
        &self.config
    }
}

impl Drop for Feeder {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
