//! Error types for the feedflow crate.

use thiserror::Error;

/// The main error type for this crate.
#[derive(Error, Debug)]
pub enum Error {
    /// Bluetooth-related error from the underlying BLE library.
    #[error("Bluetooth error: {0}")]
    Bluetooth(#[from] btleplug::Error),

    /// Operation requires a connection but the feeder is not connected.
    #[error("Feeder not connected")]
    NotConnected,

    /// Failed to establish a connection to the feeder.
    #[error("Connection failed: {reason}")]
    ConnectionFailed {
        /// Description of why the connection failed.
        reason: String,
    },

    /// The transport rejected or failed to deliver a command.
    #[error("Command {command} failed: {reason}")]
    CommandFailed {
        /// The command token that was being sent.
        command: String,
        /// Description of the failure.
        reason: String,
    },

    /// A wait was interrupted because the connection went away.
    #[error("Operation cancelled")]
    Cancelled,

    /// Invalid data was received from the feeder.
    #[error("Invalid data received: {context}")]
    InvalidData {
        /// Description of what was invalid about the data.
        context: String,
    },

    /// A feeding session was started while another one is still open.
    #[error("A feeding session is already active")]
    SessionAlreadyActive,

    /// A dispense was requested while another feed is running.
    #[error("A feed is already in progress")]
    FeedInProgress,

    /// The container holds less feed than requested.
    #[error("Not enough feed: requested {requested:.2} kg, available {available:.2} kg")]
    InsufficientFeed {
        /// Requested amount in kilograms.
        requested: f64,
        /// Amount currently measured in the container.
        available: f64,
    },

    /// An invalid parameter was provided.
    #[error("Invalid parameter: {name} = {value}")]
    InvalidParameter {
        /// The name of the parameter.
        name: String,
        /// The invalid value that was provided.
        value: String,
    },

    /// The requested record does not exist.
    #[error("{kind} not found: {id}")]
    RecordNotFound {
        /// Record type, e.g. "schedule".
        kind: &'static str,
        /// The identifier that was looked up.
        id: i64,
    },

    /// The storage backend failed.
    #[error("Storage error: {context}")]
    Storage {
        /// Description of the storage failure.
        context: String,
    },

    /// Characteristic not found on the device.
    #[error("Characteristic not found: {uuid}")]
    CharacteristicNotFound {
        /// The UUID of the characteristic that was not found.
        uuid: String,
    },

    /// Service not found on the device.
    #[error("Service not found: {uuid}")]
    ServiceNotFound {
        /// The UUID of the service that was not found.
        uuid: String,
    },
}

impl Error {
    /// Shorthand for an [`Error::InvalidParameter`].
    pub(crate) fn invalid_parameter(name: &str, value: impl ToString) -> Self {
        Self::InvalidParameter {
            name: name.to_string(),
            value: value.to_string(),
        }
    }

    /// Whether this error came from the link to the device rather than local state.
    pub fn is_transport_error(&self) -> bool {
        matches!(
            self,
            Self::Bluetooth(_)
                | Self::NotConnected
                | Self::ConnectionFailed { .. }
                | Self::CommandFailed { .. }
                | Self::Cancelled
        )
    }
}

/// A specialized Result type for this crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_feed_message() {
        let err = Error::InsufficientFeed {
            requested: 10.0,
            available: 3.0,
        };
        assert_eq!(
            err.to_string(),
            "Not enough feed: requested 10.00 kg, available 3.00 kg"
        );
    }

    #[test]
    fn test_transport_classification() {
        assert!(Error::Cancelled.is_transport_error());
        assert!(Error::NotConnected.is_transport_error());
        assert!(!Error::SessionAlreadyActive.is_transport_error());
        assert!(!Error::RecordNotFound {
            kind: "schedule",
            id: 1
        }
        .is_transport_error());
    }
}
