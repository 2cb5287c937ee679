//! BLE connection management.
//!
//! Owns the link to one feeder peripheral and publishes its
//! [`ConnectionState`]. Establishing the link and announcing it are
//! separate steps: the transport only reports `Connected` once the data
//! characteristic is subscribed, so nothing sends a command into a
//! half-open link.

use btleplug::api::Peripheral as _;
use btleplug::platform::Peripheral;
use parking_lot::RwLock;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::transport::ConnectionState;

/// Connection attempts made before giving up when reconnecting.
const MAX_CONNECT_ATTEMPTS: u32 = 3;

/// Pause between connection attempts.
const RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// Manages the connection to one feeder peripheral.
pub struct ConnectionManager {
    peripheral: Peripheral,
    state_tx: watch::Sender<ConnectionState>,
    /// Reconnect after a link loss until [`Self::disconnect`] is called.
    maintain_connection: RwLock<bool>,
}

impl ConnectionManager {
    /// Create a new connection manager for a peripheral.
    pub fn new(peripheral: Peripheral) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);

        Self {
            peripheral,
            state_tx,
            maintain_connection: RwLock::new(false),
        }
    }

    /// Get the current connection state.
    pub fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    /// Check if connected.
    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    /// Watch connection state changes.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    /// Get the peripheral.
    pub fn peripheral(&self) -> &Peripheral {
        &self.peripheral
    }

    /// Whether a lost link should be re-established.
    pub fn should_reconnect(&self) -> bool {
        *self.maintain_connection.read()
    }

    /// Bring the BLE link up and discover services.
    ///
    /// On success the state is left at `Connecting`; call
    /// [`Self::mark_connected`] once the link is usable. With `maintain`
    /// set, several attempts are made and later link losses reconnect.
    pub async fn establish(&self, maintain: bool) -> Result<()> {
        let current_state = self.state();

        if current_state.is_connected() {
            debug!("Already connected");
            return Ok(());
        }

        if current_state.is_transitioning() {
            return Err(Error::ConnectionFailed {
                reason: "Connection already in progress".to_string(),
            });
        }

        *self.maintain_connection.write() = maintain;
        self.set_state(ConnectionState::Connecting);

        if self.peripheral.is_connected().await.unwrap_or(false) {
            info!("Peripheral already connected at BLE level");
            return self.discover_services().await;
        }

        let max_attempts = if maintain { MAX_CONNECT_ATTEMPTS } else { 1 };

        for attempt in 1..=max_attempts {
            debug!("Connection attempt {} of {}", attempt, max_attempts);

            match self.peripheral.connect().await {
                Ok(_) => {
                    info!("BLE link to feeder established");
                    return self.discover_services().await;
                }
                Err(e) => {
                    warn!("Connection attempt {} failed: {}", attempt, e);

                    if attempt < max_attempts {
                        tokio::time::sleep(RECONNECT_DELAY).await;
                    }
                }
            }
        }

        self.set_state(ConnectionState::Disconnected);
        Err(Error::ConnectionFailed {
            reason: format!("Failed after {} attempts", max_attempts),
        })
    }

    /// Announce that the link is ready for commands.
    pub fn mark_connected(&self) {
        self.set_state(ConnectionState::Connected);
    }

    /// Record a link loss. Subscribers see `Disconnected` immediately.
    pub fn mark_disconnected(&self) {
        self.set_state(ConnectionState::Disconnected);
    }

    /// Disconnect from the feeder and stop reconnecting.
    pub async fn disconnect(&self) -> Result<()> {
        *self.maintain_connection.write() = false;

        match self.state() {
            ConnectionState::Disconnected | ConnectionState::Disconnecting => return Ok(()),
            _ => {}
        }

        self.set_state(ConnectionState::Disconnecting);

        let result = self.peripheral.disconnect().await;
        self.set_state(ConnectionState::Disconnected);

        match result {
            Ok(_) => {
                info!("Disconnected from feeder");
                Ok(())
            }
            Err(e) => {
                error!("Failed to disconnect: {}", e);
                Err(Error::Bluetooth(e))
            }
        }
    }

    async fn discover_services(&self) -> Result<()> {
        if let Err(e) = self.peripheral.discover_services().await {
            self.set_state(ConnectionState::Disconnected);
            return Err(Error::ConnectionFailed {
                reason: format!("Service discovery failed: {}", e),
            });
        }
        Ok(())
    }

    /// Update the connection state; subscribers are only woken on change.
    fn set_state(&self, new_state: ConnectionState) {
        let mut old_state = new_state;
        let changed = self.state_tx.send_if_modified(|state| {
            if *state == new_state {
                return false;
            }
            old_state = *state;
            *state = new_state;
            true
        });

        if changed {
            debug!("Connection state changed: {} -> {}", old_state, new_state);
        }
    }
}
