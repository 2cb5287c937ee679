//! Feeding session data structures.
//!
//! Contains the readings that bracket one dispense and the quantities
//! derived from them.

/// Weight and temperature captured at one edge of a feeding session.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SessionReading {
    /// Container weight in kilograms.
    pub weight: f64,
    /// Water temperature in Celsius.
    pub temperature: f64,
}

impl SessionReading {
    /// Create a new reading.
    pub fn new(weight: f64, temperature: f64) -> Self {
        Self {
            weight,
            temperature,
        }
    }
}

/// A closed feeding session.
///
/// A session starts when the outlet opens and ends when it closes again
/// and the load cell has settled.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SessionSummary {
    /// Readings when the outlet opened.
    pub start: SessionReading,
    /// Readings after the outlet closed.
    pub end: SessionReading,
}

impl SessionSummary {
    /// Create a summary from start and end readings.
    pub fn new(start: SessionReading, end: SessionReading) -> Self {
        Self { start, end }
    }

    /// Feed that left the container, in kilograms.
    ///
    /// Negative when the container got heavier, which happens with a refill
    /// or load-cell noise.
    pub fn weight_used(&self) -> f64 {
        self.start.weight - self.end.weight
    }

    /// Mean of the start and end water temperatures.
    pub fn average_temperature(&self) -> f64 {
        (self.start.temperature + self.end.temperature) / 2.0
    }

    /// Whether the summary describes a real dispense that can be logged.
    pub fn is_loggable(&self) -> bool {
        self.weight_used() >= 0.0
    }
}
