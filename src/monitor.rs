//! Periodic temperature logging and high-temperature alerts.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::FeederConfig;
use crate::data::TempLog;
use crate::error::Result;
use crate::events::FeederEvent;
use crate::sensor::SensorState;
use crate::store::FeedStore;

/// Subject line of high-temperature alert records.
pub const HIGH_TEMPERATURE_SUBJECT: &str = "High Temperature Alert";

/// Decides when a high water temperature deserves an alert.
///
/// At most one alert is raised per cooldown window, however many hot samples
/// arrive in it.
#[derive(Debug)]
pub struct TemperatureAlertMonitor {
    threshold: f64,
    cooldown: Duration,
    last_alert: Mutex<Option<Instant>>,
}

impl TemperatureAlertMonitor {
    /// Create a monitor alerting at or above `threshold` Celsius.
    pub fn new(threshold: f64, cooldown: Duration) -> Self {
        Self {
            threshold,
            cooldown,
            last_alert: Mutex::new(None),
        }
    }

    /// Create a monitor from the alert settings in `config`.
    pub fn from_config(config: &FeederConfig) -> Self {
        Self::new(config.high_temp_threshold, config.alert_cooldown)
    }

    /// Alert threshold in Celsius.
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Check a sample. Returns true, and starts a new cooldown, when an
    /// alert should be raised.
    pub fn check(&self, temperature: f64) -> bool {
        if temperature < self.threshold {
            return false;
        }

        let now = Instant::now();
        let mut last_alert = self.last_alert.lock();
        match *last_alert {
            Some(at) if now.duration_since(at) < self.cooldown => {
                debug!("High temperature alert suppressed by cooldown");
                false
            }
            _ => {
                *last_alert = Some(now);
                true
            }
        }
    }

    /// Text of the alert record for `temperature`.
    pub fn alert_body(&self, temperature: f64) -> String {
        format!(
            "Temperature has reached {}°C. Please check the system immediately.",
            temperature
        )
    }
}

/// Writes the latest temperature to storage on a fixed cadence.
pub struct TemperatureLogger {
    sensors: Arc<SensorState>,
    store: Arc<dyn FeedStore>,
    monitor: TemperatureAlertMonitor,
    events: broadcast::Sender<FeederEvent>,
    interval: Duration,
}

impl TemperatureLogger {
    /// Create a logger using the interval and alert settings in `config`.
    pub fn new(
        config: &FeederConfig,
        sensors: Arc<SensorState>,
        store: Arc<dyn FeedStore>,
        events: broadcast::Sender<FeederEvent>,
    ) -> Self {
        Self {
            sensors,
            store,
            monitor: TemperatureAlertMonitor::from_config(config),
            events,
            interval: config.temp_log_interval,
        }
    }

    /// Log the current temperature, if one has been received, and raise an
    /// alert when it is too high.
    pub async fn log_once(&self) -> Result<Option<TempLog>> {
        let Some(temperature) = self.sensors.temperature() else {
            debug!("No temperature yet, skipping log");
            return Ok(None);
        };

        let log = self.store.create_temp_log(temperature).await?;

        if self.monitor.check(temperature) {
            warn!("High water temperature: {:.2}°C", temperature);
            if let Err(e) = self
                .store
                .create_alert(HIGH_TEMPERATURE_SUBJECT, &self.monitor.alert_body(temperature))
                .await
            {
                warn!("Failed to record high temperature alert: {}", e);
            }
            let _ = self.events.send(FeederEvent::HighTemperature { temperature });
        }

        if let Err(e) = self.store.sync().await {
            warn!("Sync after temperature log failed: {}", e);
        }

        Ok(Some(log))
    }

    /// Log every interval until `cancel` fires.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut interval = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!("Temperature logging started every {:?}", self.interval);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {
                    if let Err(e) = self.log_once().await {
                        warn!("Failed to log temperature: {}", e);
                    }
                }
            }
        }

        info!("Temperature logging stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn logger() -> (
        Arc<SensorState>,
        MemoryStore,
        TemperatureLogger,
        broadcast::Receiver<FeederEvent>,
    ) {
        let sensors = Arc::new(SensorState::new());
        let store = MemoryStore::new();
        let (events_tx, events) = broadcast::channel(16);
        let logger = TemperatureLogger::new(
            &FeederConfig::default(),
            sensors.clone(),
            Arc::new(store.clone()),
            events_tx,
        );
        (sensors, store, logger, events)
    }

    #[tokio::test(start_paused = true)]
    async fn test_cooldown() {
        let monitor = TemperatureAlertMonitor::new(32.0, Duration::from_secs(60));

        assert!(!monitor.check(31.9));
        assert!(monitor.check(32.0));
        assert!(!monitor.check(35.0));

        tokio::time::advance(Duration::from_secs(59)).await;
        assert!(!monitor.check(33.0));

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(monitor.check(33.0));
    }

    #[tokio::test]
    async fn test_skips_until_first_reading() {
        let (sensors, store, logger, _) = logger();
        assert_eq!(logger.log_once().await.unwrap(), None);

        sensors.apply_text("0.00,4.000,0");
        let log = logger.log_once().await.unwrap().unwrap();
        assert_eq!(log.temperature, 0.0);
        assert_eq!(store.list_temp_logs().await.unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_high_temperature_creates_alert() {
        let (sensors, store, logger, mut events) = logger();
        sensors.apply_text("33.50,4.000,0");

        logger.log_once().await.unwrap();
        logger.log_once().await.unwrap();

        let alerts = store.list_alerts().await.unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].subject, HIGH_TEMPERATURE_SUBJECT);
        assert!(alerts[0].body.contains("33.5"));
        assert_eq!(
            events.recv().await.unwrap(),
            FeederEvent::HighTemperature { temperature: 33.5 }
        );
        assert_eq!(store.list_temp_logs().await.unwrap().len(), 2);
        assert_eq!(store.sync_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_alert_storage_failure_keeps_log_and_syncs() {
        use crate::error::Error;
        use crate::store::MockFeedStore;
        use chrono::Utc;

        let mut store = MockFeedStore::new();
        store.expect_create_temp_log().times(1).returning(|temperature| {
            Ok(TempLog {
                id: 1,
                temperature,
                date_created: Utc::now(),
            })
        });
        store.expect_create_alert().times(1).returning(|_, _| {
            Err(Error::Storage {
                context: "disk full".to_string(),
            })
        });
        store.expect_sync().times(1).returning(|| Ok(()));

        let sensors = Arc::new(SensorState::new());
        let (events_tx, mut events) = broadcast::channel(16);
        let logger = TemperatureLogger::new(
            &FeederConfig::default(),
            sensors.clone(),
            Arc::new(store),
            events_tx,
        );
        sensors.apply_text("34.00,4.000,0");

        let log = logger.log_once().await.unwrap().unwrap();
        assert_eq!(log.temperature, 34.0);
        assert_eq!(
            events.recv().await.unwrap(),
            FeederEvent::HighTemperature { temperature: 34.0 }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_logs_on_interval() {
        let (sensors, store, logger, _) = logger();
        sensors.apply_text("28.00,4.000,0");

        let cancel = CancellationToken::new();
        let task = tokio::spawn({
            let cancel = cancel.clone();
            async move { logger.run(cancel).await }
        });

        tokio::time::sleep(Duration::from_secs(25)).await;
        assert_eq!(store.list_temp_logs().await.unwrap().len(), 2);

        cancel.cancel();
        task.await.unwrap();
    }
}
