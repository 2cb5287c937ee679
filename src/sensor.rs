//! Latest-value sensor state.
//!
//! Holds the most recent temperature, weight and servo flag decoded from the
//! feeder. There is no history buffer: each message overwrites the fields it
//! carries and leaves the rest alone.

use parking_lot::RwLock;
use tokio::sync::broadcast;
use tracing::{debug, trace};

use crate::protocol::DeviceMessage;

/// Snapshot of the feeder's sensors.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SensorReading {
    /// Water temperature in Celsius, once one has been received.
    pub temperature: Option<f64>,
    /// Feed container weight in kilograms, once one has been received.
    pub weight: Option<f64>,
    /// Whether the servo is running (outlet open).
    pub servo_running: bool,
}

impl SensorReading {
    /// Whether the outlet is closed.
    pub fn is_servo_closed(&self) -> bool {
        !self.servo_running
    }

    /// Temperature, or 0.0 if none has been received.
    pub fn temperature_or_zero(&self) -> f64 {
        self.temperature.unwrap_or(0.0)
    }

    /// Weight, or 0.0 if none has been received.
    pub fn weight_or_zero(&self) -> f64 {
        self.weight.unwrap_or(0.0)
    }
}

/// Tracks the latest sensor values and publishes every update.
pub struct SensorState {
    reading: RwLock<SensorReading>,
    update_tx: broadcast::Sender<SensorReading>,
}

impl SensorState {
    /// Create a tracker with no readings yet.
    pub fn new() -> Self {
        let (update_tx, _) = broadcast::channel(64);

        Self {
            reading: RwLock::new(SensorReading::default()),
            update_tx,
        }
    }

    /// Fold a decoded message into the current state.
    ///
    /// Servo sentinels only touch the servo flag. Telemetry fields that did
    /// not decode keep their previous value.
    pub fn apply(&self, message: &DeviceMessage) -> SensorReading {
        let reading = {
            let mut reading = self.reading.write();

            match message {
                DeviceMessage::Servo(state) => {
                    debug!("Servo state reported: {:?}", state);
                    reading.servo_running = state.is_running();
                }
                DeviceMessage::Telemetry(telemetry) => {
                    if let Some(temperature) = telemetry.temperature {
                        reading.temperature = Some(temperature);
                    }
                    if let Some(weight) = telemetry.weight {
                        reading.weight = Some(weight);
                    }
                    if let Some(running) = telemetry.servo_running {
                        reading.servo_running = running;
                    }
                    trace!(
                        "Telemetry: temp={:?} weight={:?} servo={}",
                        reading.temperature,
                        reading.weight,
                        reading.servo_running
                    );
                }
            }

            *reading
        };

        let _ = self.update_tx.send(reading);
        reading
    }

    /// Decode and apply a raw text message.
    pub fn apply_text(&self, text: &str) -> SensorReading {
        self.apply(&DeviceMessage::parse(text))
    }

    /// Current snapshot.
    pub fn reading(&self) -> SensorReading {
        *self.reading.read()
    }

    /// Latest temperature, if any.
    pub fn temperature(&self) -> Option<f64> {
        self.reading.read().temperature
    }

    /// Latest weight, if any.
    pub fn weight(&self) -> Option<f64> {
        self.reading.read().weight
    }

    /// Whether the outlet is closed according to the device.
    pub fn is_servo_closed(&self) -> bool {
        self.reading.read().is_servo_closed()
    }

    /// Receive every snapshot produced by [`Self::apply`].
    pub fn subscribe(&self) -> broadcast::Receiver<SensorReading> {
        self.update_tx.subscribe()
    }
}

impl Default for SensorState {
    fn default() -> Self {
        Self::new()
    }
}
