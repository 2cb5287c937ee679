//! Events published by a running feeder.

use std::time::Duration;

use crate::session::SessionOutcome;

/// Something the user should hear about.
///
/// Data-quality anomalies are only logged; these are the conditions that
/// block or complete an actuation, plus temperature alerts.
#[derive(Debug, Clone, PartialEq)]
pub enum FeederEvent {
    /// A schedule fired and the servo is about to run.
    ScheduledFeedStarted {
        /// Schedule that fired.
        schedule_id: i64,
        /// Requested feed in kilograms.
        kg: f64,
        /// How long the servo will run.
        duration: Duration,
    },
    /// A scheduled feed finished and the schedule was removed.
    ScheduleCompleted {
        /// Schedule that completed.
        schedule_id: i64,
        /// How the feeding session ended.
        outcome: SessionOutcome,
    },
    /// Not enough feed in the container for a schedule. The schedule is kept
    /// for the next day.
    InsufficientFeed {
        /// Schedule that could not run.
        schedule_id: i64,
        /// Requested feed in kilograms.
        requested: f64,
        /// Feed in the container in kilograms.
        available: f64,
    },
    /// A scheduled feed failed part way. The schedule is kept.
    ScheduledFeedFailed {
        /// Schedule that failed.
        schedule_id: i64,
        /// Why it failed.
        reason: String,
    },
    /// The water is at or above the alert threshold.
    HighTemperature {
        /// Measured temperature in Celsius.
        temperature: f64,
    },
}

impl FeederEvent {
    /// Schedule the event is about, if any.
    pub fn schedule_id(&self) -> Option<i64> {
        match self {
            Self::ScheduledFeedStarted { schedule_id, .. }
            | Self::ScheduleCompleted { schedule_id, .. }
            | Self::InsufficientFeed { schedule_id, .. }
            | Self::ScheduledFeedFailed { schedule_id, .. } => Some(*schedule_id),
            Self::HighTemperature { .. } => None,
        }
    }
}
