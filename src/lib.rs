// Allow derivable impls for clarity
#![allow(clippy::derivable_impls)]
// Allow unusual byte groupings for UUIDs which have standard format
#![allow(clippy::unusual_byte_groupings)]

//! # feedflow
//!
//! Controller library for the FeedFlow automated fish feeder.
//!
//! The feeder is a Bluetooth Low Energy peripheral with a load cell under
//! the feed container, a water temperature probe and a continuous-rotation
//! servo on the outlet. This crate decodes its telemetry, drives the servo,
//! and runs recurring feed schedules without double-firing or missing a
//! trigger.
//!
//! ## Features
//!
//! - **Live sensors**: latest temperature, weight and servo state
//! - **Feeding sessions**: weight used and average temperature per dispense
//! - **Feed rate**: daily ration from biomass and water temperature
//! - **Schedules**: once-a-day feeds with per-day dedupe and midnight reset
//! - **Temperature history**: periodic logging with high-temperature alerts
//! - **Pluggable collaborators**: [`Transport`] and [`FeedStore`] traits, with
//!   a `btleplug` transport and an in-memory store included
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use feedflow::{Feeder, FeederConfig, MemoryStore, RecordingTransport, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let transport = RecordingTransport::connected();
//!     let feeder = Feeder::new(
//!         Arc::new(transport.clone()),
//!         Arc::new(MemoryStore::new()),
//!         FeederConfig::default(),
//!     )?;
//!     feeder.start();
//!
//!     transport.push_message("28.50,5.000,0");
//!     tokio::time::sleep(std::time::Duration::from_millis(10)).await;
//!
//!     let reading = feeder.sensor_reading();
//!     println!("Water {:?}°C, feed {:?} kg", reading.temperature, reading.weight);
//!
//!     feeder.toggle_servo().await?;
//!     feeder.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! - `serde`: Enable serialization/deserialization for data types

// Public modules
pub mod ble;
pub mod clock;
pub mod config;
pub mod data;
pub mod error;
pub mod events;
pub mod feeder;
pub mod mocks;
pub mod monitor;
pub mod protocol;
pub mod scheduler;
pub mod sensor;
pub mod servo;
pub mod session;
pub mod store;
pub mod transport;
pub mod utils;

// Re-exports for convenience
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::FeederConfig;
pub use error::{Error, Result};
pub use events::FeederEvent;
pub use feeder::Feeder;
pub use mocks::RecordingTransport;
pub use monitor::{TemperatureAlertMonitor, TemperatureLogger};
pub use scheduler::{ScheduleEngine, TickAction};
pub use sensor::{SensorReading, SensorState};
pub use servo::{ServoAction, ServoController};
pub use session::{FeedingSessionTracker, SessionOutcome};
pub use store::{FeedStore, MemoryStore};
pub use transport::{ConnectionState, Transport};
pub use utils::round_to_hundredths;

// Re-export commonly used types from submodules
pub use ble::BleTransport;
pub use data::{
    calculate_feed_amount, total_dispensed, AlertLog, Biomass, FeedLog, FeedRateBand,
    FeedSchedule, NewNote, Note, NoteUpdate, ScheduleTime, ScheduleUpdate, TempLog,
};
pub use protocol::{Command, DeviceMessage, ServoState};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_exports() {
        // Verify that key types are exported
        let _ = std::any::TypeId::of::<Feeder>();
        let _ = std::any::TypeId::of::<ScheduleEngine>();
        let _ = std::any::TypeId::of::<FeedingSessionTracker>();
        let _ = std::any::TypeId::of::<Error>();
        let _ = std::any::TypeId::of::<SensorReading>();
        let _ = std::any::TypeId::of::<FeedLog>();
        let _ = std::any::TypeId::of::<MemoryStore>();
    }

    #[test]
    fn test_feed_amount_table() {
        assert_eq!(calculate_feed_amount(100.0, 25.0), 2.0);
        assert_eq!(calculate_feed_amount(100.0, 29.0), 4.0);
        assert_eq!(calculate_feed_amount(100.0, 33.0), 2.0);
    }
}
