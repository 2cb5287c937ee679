//! Bluetooth LE implementation of [`Transport`].

use async_trait::async_trait;
use btleplug::platform::Peripheral;
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tracing::{debug, error, info, trace, warn};

use crate::ble::characteristics::CharacteristicHandler;
use crate::ble::connection::ConnectionManager;
use crate::error::{Error, Result};
use crate::protocol::Command;
use crate::transport::{ConnectionState, Transport};

/// Transport over a FeedFlow peripheral that has already been discovered.
pub struct BleTransport {
    connection: ConnectionManager,
    /// Characteristic handler, present while connected.
    characteristics: RwLock<Option<Arc<CharacteristicHandler>>>,
    /// Text of every data characteristic notification.
    message_tx: broadcast::Sender<String>,
    /// Forwards notifications into `message_tx`.
    forward_handle: RwLock<Option<tokio::task::JoinHandle<()>>>,
}

impl BleTransport {
    /// Wrap a peripheral. No connection is made until [`Self::connect`].
    pub fn new(peripheral: Peripheral) -> Self {
        let (message_tx, _) = broadcast::channel(64);

        Self {
            connection: ConnectionManager::new(peripheral),
            characteristics: RwLock::new(None),
            message_tx,
            forward_handle: RwLock::new(None),
        }
    }

    /// Connect, subscribe to the data characteristic and start forwarding messages.
    ///
    /// The link is reported as connected only after the subscription is in place.
    pub async fn connect(&self) -> Result<()> {
        if self.connection.is_connected() {
            return Ok(());
        }

        info!("Connecting to feeder");
        self.connection.establish(true).await?;

        if let Err(e) = self.attach().await {
            self.detach().await;
            self.connection.mark_disconnected();
            return Err(e);
        }

        self.connection.mark_connected();
        info!("Feeder connected and streaming");

        Ok(())
    }

    /// Stop notifications and disconnect.
    pub async fn disconnect(&self) -> Result<()> {
        info!("Disconnecting from feeder");
        self.detach().await;
        self.connection.disconnect().await
    }

    /// Report a link loss seen by the adapter, e.g. a `DeviceDisconnected` central event.
    ///
    /// Publishes `Disconnected` first so in-flight feeds fail fast, then
    /// reconnects unless [`Self::disconnect`] was called.
    pub async fn handle_link_lost(&self) {
        warn!("Feeder link lost");
        self.connection.mark_disconnected();
        self.detach().await;

        if !self.connection.should_reconnect() {
            return;
        }

        info!("Attempting to reconnect...");
        if let Err(e) = self.connect().await {
            error!("Reconnection failed: {}", e);
        }
    }

    /// Ask the feeder to report its servo state.
    pub async fn request_status(&self) -> Result<()> {
        self.send_command(Command::Status).await
    }

    async fn attach(&self) -> Result<()> {
        let handler = Arc::new(CharacteristicHandler::new(
            self.connection.peripheral().clone(),
        ));
        handler.discover_characteristics()?;
        handler.subscribe_data().await?;

        let mut rx = handler.subscribe_notifications();
        handler.start_notifications().await?;

        let message_tx = self.message_tx.clone();
        let handle = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => {
                        if let Some(text) = event.data_message() {
                            trace!("Feeder message: {:?}", text);
                            let _ = message_tx.send(text);
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("Dropped {} feeder messages", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            debug!("Message forwarder stopped");
        });

        *self.characteristics.write() = Some(handler);
        if let Some(old) = self.forward_handle.write().replace(handle) {
            old.abort();
        }

        Ok(())
    }

    async fn detach(&self) {
        let handler = self.characteristics.write().take();
        if let Some(handler) = handler {
            handler.stop_notifications().await;
        }
        if let Some(handle) = self.forward_handle.write().take() {
            handle.abort();
        }
    }
}

#[async_trait]
impl Transport for BleTransport {
    async fn send_command(&self, command: Command) -> Result<()> {
        if !self.connection.is_connected() {
            return Err(Error::NotConnected);
        }

        let handler = self
            .characteristics
            .read()
            .clone()
            .ok_or(Error::NotConnected)?;

        debug!("Sending command {}", command);

        handler
            .write_command(command.to_bytes())
            .await
            .map_err(|e| Error::CommandFailed {
                command: command.to_string(),
                reason: e.to_string(),
            })
    }

    fn subscribe_messages(&self) -> broadcast::Receiver<String> {
        self.message_tx.subscribe()
    }

    fn subscribe_connection(&self) -> watch::Receiver<ConnectionState> {
        self.connection.subscribe()
    }
}

impl Drop for BleTransport {
    fn drop(&mut self) {
        if let Some(handle) = self.forward_handle.get_mut().take() {
            handle.abort();
        }
    }
}
