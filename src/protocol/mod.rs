//! Wire protocol for the FeedFlow device.
//!
//! This module contains:
//! - Command tokens written to the command characteristic
//! - Decoding of the text messages published on the data characteristic

pub mod command;
pub mod message;

pub use command::Command;
pub use message::{DeviceMessage, ServoState, Telemetry};
