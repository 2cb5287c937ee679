//! Feeding session tracking.
//!
//! A session brackets one dispense: the weight and temperature are captured
//! when the outlet opens and again after it has closed and settled. The
//! difference becomes a [`FeedLog`].

use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::data::{FeedLog, SessionReading, SessionSummary};
use crate::error::{Error, Result};
use crate::sensor::SensorState;
use crate::store::FeedStore;
use crate::utils::round_to_hundredths;

/// What happened when a session was ended.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionOutcome {
    /// No session was open.
    NotActive,
    /// The feed was logged.
    Logged(FeedLog),
    /// The container got heavier, so nothing was logged.
    Skipped {
        /// Negative weight difference that was observed.
        weight_used: f64,
    },
}

impl SessionOutcome {
    /// The log that was created, if any.
    pub fn feed_log(&self) -> Option<&FeedLog> {
        match self {
            Self::Logged(log) => Some(log),
            _ => None,
        }
    }
}

/// Owns the open feeding session, if any.
pub struct FeedingSessionTracker {
    sensors: Arc<SensorState>,
    store: Arc<dyn FeedStore>,
    open: Mutex<Option<SessionReading>>,
}

impl FeedingSessionTracker {
    /// Create a tracker reading from `sensors` and logging to `store`.
    pub fn new(sensors: Arc<SensorState>, store: Arc<dyn FeedStore>) -> Self {
        Self {
            sensors,
            store,
            open: Mutex::new(None),
        }
    }

    fn capture(&self) -> SessionReading {
        let reading = self.sensors.reading();
        SessionReading::new(reading.weight_or_zero(), reading.temperature_or_zero())
    }

    /// Open a session with the current readings.
    ///
    /// Fails with [`Error::SessionAlreadyActive`] if one is already open.
    pub fn start(&self) -> Result<SessionReading> {
        let mut open = self.open.lock();
        if open.is_some() {
            return Err(Error::SessionAlreadyActive);
        }

        let start = self.capture();
        *open = Some(start);

        info!(
            "Feeding session started: {:.3} kg, {:.2}°C",
            start.weight, start.temperature
        );

        Ok(start)
    }

    /// Close the open session and log the feed.
    ///
    /// The session is closed before anything is written, so a second call
    /// sees [`SessionOutcome::NotActive`] even if storage fails.
    pub async fn end(&self) -> Result<SessionOutcome> {
        let Some(start) = self.open.lock().take() else {
            warn!("Tried to end a feeding session, but none is active");
            return Ok(SessionOutcome::NotActive);
        };

        let summary = SessionSummary::new(start, self.capture());
        let weight_used = summary.weight_used();

        if !summary.is_loggable() {
            warn!(
                "Weight increased during feeding ({:.3} kg), skipping feed log",
                weight_used
            );
            return Ok(SessionOutcome::Skipped { weight_used });
        }

        let avg_temp = round_to_hundredths(summary.average_temperature());
        debug!(
            "Feeding session ended: used {:.3} kg, avg {:.2}°C",
            weight_used, avg_temp
        );

        let log = self.store.create_feed_log(weight_used, avg_temp).await?;
        info!("Feed logged: {}", log.title);

        if let Err(e) = self.store.sync().await {
            warn!("Sync after feed log failed: {}", e);
        }

        Ok(SessionOutcome::Logged(log))
    }

    /// Discard the open session without logging. Returns whether one was open.
    pub fn abandon(&self) -> bool {
        let abandoned = self.open.lock().take().is_some();
        if abandoned {
            warn!("Feeding session abandoned");
        }
        abandoned
    }

    /// Whether a session is open.
    pub fn is_active(&self) -> bool {
        self.open.lock().is_some()
    }

    /// Readings captured when the open session started.
    pub fn started_with(&self) -> Option<SessionReading> {
        *self.open.lock()
    }
}
