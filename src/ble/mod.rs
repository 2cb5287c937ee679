//! BLE communication module.
//!
//! Carries commands and telemetry between the controller and a FeedFlow
//! feeder over Bluetooth Low Energy. Discovery is left to the caller: hand
//! an already-found peripheral to [`BleTransport::new`].

pub mod characteristics;
pub mod connection;
pub mod transport;
pub mod uuids;

pub use characteristics::CharacteristicHandler;
pub use connection::ConnectionManager;
pub use transport::BleTransport;
pub use uuids::*;
