//! Feeder configuration.
//!
//! The defaults match the stock FeedFlow hardware: a continuous-rotation
//! servo that dispenses about 1 kg every 10 seconds, and a load cell that
//! needs half a second to settle after the servo stops.

use std::time::Duration;

use crate::error::{Error, Result};

/// Timing and calibration settings for a feeder.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FeederConfig {
    /// Seconds the servo must run to dispense one kilogram.
    pub seconds_per_kg: f64,
    /// Upper bound on a single scheduled run.
    pub max_dispense: Duration,
    /// Pause after `STOP` before the weight reading is trusted.
    pub settle_delay: Duration,
    /// How often schedules are checked while connected.
    pub poll_interval: Duration,
    /// How often the water temperature is logged while connected.
    pub temp_log_interval: Duration,
    /// Temperature at or above which a high-temperature alert is raised.
    pub high_temp_threshold: f64,
    /// Minimum gap between two high-temperature alerts.
    pub alert_cooldown: Duration,
}

impl FeederConfig {
    /// Default dispensing rate of the stock servo.
    pub const DEFAULT_SECONDS_PER_KG: f64 = 10.0;
    /// Default cap on one scheduled run.
    pub const DEFAULT_MAX_DISPENSE: Duration = Duration::from_secs(60);
    /// Default load-cell settle delay.
    pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(500);
    /// Default schedule poll cadence. Finer than a minute so no trigger is missed.
    pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);
    /// Default temperature logging cadence.
    pub const DEFAULT_TEMP_LOG_INTERVAL: Duration = Duration::from_secs(10);
    /// Default high-temperature alert threshold in Celsius.
    pub const DEFAULT_HIGH_TEMP_THRESHOLD: f64 = 32.0;
    /// Default alert cooldown.
    pub const DEFAULT_ALERT_COOLDOWN: Duration = Duration::from_secs(60);

    /// Create a configuration with the default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the servo dispensing rate.
    pub fn with_seconds_per_kg(mut self, seconds_per_kg: f64) -> Self {
        self.seconds_per_kg = seconds_per_kg;
        self
    }

    /// Set the maximum run time of one scheduled feed.
    pub fn with_max_dispense(mut self, max_dispense: Duration) -> Self {
        self.max_dispense = max_dispense;
        self
    }

    /// Set the settle delay.
    pub fn with_settle_delay(mut self, settle_delay: Duration) -> Self {
        self.settle_delay = settle_delay;
        self
    }

    /// Set the schedule poll interval.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Set the temperature logging interval.
    pub fn with_temp_log_interval(mut self, temp_log_interval: Duration) -> Self {
        self.temp_log_interval = temp_log_interval;
        self
    }

    /// Set the high-temperature alert threshold and cooldown.
    pub fn with_high_temp_alert(mut self, threshold: f64, cooldown: Duration) -> Self {
        self.high_temp_threshold = threshold;
        self.alert_cooldown = cooldown;
        self
    }

    /// How long the servo runs to dispense `kg` kilograms, capped at `max_dispense`.
    pub fn dispense_duration(&self, kg: f64) -> Duration {
        let secs = (kg * self.seconds_per_kg)
            .max(0.0)
            .min(self.max_dispense.as_secs_f64());
        Duration::from_secs_f64(secs)
    }

    /// Check that every setting is usable.
    pub fn validate(&self) -> Result<()> {
        if !(self.seconds_per_kg.is_finite() && self.seconds_per_kg > 0.0) {
            return Err(Error::invalid_parameter(
                "seconds_per_kg",
                self.seconds_per_kg,
            ));
        }
        if self.max_dispense.is_zero() {
            return Err(Error::invalid_parameter(
                "max_dispense",
                format!("{:?}", self.max_dispense),
            ));
        }
        // A minute-granular schedule is missed if polling is coarser than a minute.
        if self.poll_interval.is_zero() || self.poll_interval > Duration::from_secs(60) {
            return Err(Error::invalid_parameter(
                "poll_interval",
                format!("{:?}", self.poll_interval),
            ));
        }
        if self.temp_log_interval.is_zero() {
            return Err(Error::invalid_parameter(
                "temp_log_interval",
                format!("{:?}", self.temp_log_interval),
            ));
        }
        if !self.high_temp_threshold.is_finite() {
            return Err(Error::invalid_parameter(
                "high_temp_threshold",
                self.high_temp_threshold,
            ));
        }
        Ok(())
    }
}

impl Default for FeederConfig {
    fn default() -> Self {
        Self {
            seconds_per_kg: Self::DEFAULT_SECONDS_PER_KG,
            max_dispense: Self::DEFAULT_MAX_DISPENSE,
            settle_delay: Self::DEFAULT_SETTLE_DELAY,
            poll_interval: Self::DEFAULT_POLL_INTERVAL,
            temp_log_interval: Self::DEFAULT_TEMP_LOG_INTERVAL,
            high_temp_threshold: Self::DEFAULT_HIGH_TEMP_THRESHOLD,
            alert_cooldown: Self::DEFAULT_ALERT_COOLDOWN,
        }
    }
}
