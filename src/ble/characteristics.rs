//! GATT characteristic handling.
//!
//! Caches the feeder's characteristics after service discovery, writes
//! command tokens and forwards data notifications.

use btleplug::api::{Characteristic, Peripheral as _, WriteType};
use btleplug::platform::Peripheral;
use futures::stream::StreamExt;
use parking_lot::RwLock;
use std::collections::HashMap;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace};
use uuid::Uuid;

use crate::ble::uuids::*;
use crate::error::{Error, Result};

/// Notification event from a characteristic.
#[derive(Debug, Clone)]
pub struct NotificationEvent {
    /// UUID of the characteristic that sent the notification.
    pub characteristic_uuid: Uuid,
    /// The notification data.
    pub data: Vec<u8>,
}

impl NotificationEvent {
    /// The message text if this came from the data characteristic.
    ///
    /// Invalid UTF-8 is replaced rather than rejected; the message decoder
    /// treats the result as unparseable.
    pub fn data_message(&self) -> Option<String> {
        if self.characteristic_uuid != DATA_CHARACTERISTIC_UUID {
            return None;
        }
        Some(String::from_utf8_lossy(&self.data).into_owned())
    }
}

/// Handler for the GATT characteristics of one connected feeder.
pub struct CharacteristicHandler {
    peripheral: Peripheral,
    /// Cached characteristics by UUID.
    characteristics: RwLock<HashMap<Uuid, Characteristic>>,
    notification_tx: broadcast::Sender<NotificationEvent>,
    listener_token: RwLock<Option<CancellationToken>>,
    listener_handle: RwLock<Option<tokio::task::JoinHandle<()>>>,
}

impl CharacteristicHandler {
    /// Create a handler for a peripheral whose services have been discovered.
    pub fn new(peripheral: Peripheral) -> Self {
        let (notification_tx, _) = broadcast::channel(64);

        Self {
            peripheral,
            characteristics: RwLock::new(HashMap::new()),
            notification_tx,
            listener_token: RwLock::new(None),
            listener_handle: RwLock::new(None),
        }
    }

    /// Cache the characteristics of the FeedFlow service.
    ///
    /// Fails if the service or either of its characteristics is missing.
    pub fn discover_characteristics(&self) -> Result<()> {
        let service = self
            .peripheral
            .services()
            .into_iter()
            .find(|s| is_feeder_service(&s.uuid))
            .ok_or_else(|| Error::ServiceNotFound {
                uuid: FEEDER_SERVICE_UUID.to_string(),
            })?;

        let mut chars = self.characteristics.write();
        chars.clear();
        for characteristic in service.characteristics {
            trace!("Found characteristic: {}", characteristic.uuid);
            chars.insert(characteristic.uuid, characteristic);
        }

        for required in [DATA_CHARACTERISTIC_UUID, COMMAND_CHARACTERISTIC_UUID] {
            if !chars.contains_key(&required) {
                return Err(Error::CharacteristicNotFound {
                    uuid: required.to_string(),
                });
            }
        }

        debug!("Discovered {} feeder characteristics", chars.len());

        Ok(())
    }

    fn characteristic(&self, uuid: &Uuid) -> Result<Characteristic> {
        self.characteristics
            .read()
            .get(uuid)
            .cloned()
            .ok_or_else(|| Error::CharacteristicNotFound {
                uuid: uuid.to_string(),
            })
    }

    /// Write a command token to the command characteristic.
    pub async fn write_command(&self, data: &[u8]) -> Result<()> {
        let characteristic = self.characteristic(&COMMAND_CHARACTERISTIC_UUID)?;

        self.peripheral
            .write(&characteristic, data, WriteType::WithResponse)
            .await?;

        trace!("Wrote {} command bytes", data.len());

        Ok(())
    }

    /// Enable notifications on the data characteristic.
    pub async fn subscribe_data(&self) -> Result<()> {
        let characteristic = self.characteristic(&DATA_CHARACTERISTIC_UUID)?;
        self.peripheral.subscribe(&characteristic).await?;

        debug!("Subscribed to feeder data notifications");

        Ok(())
    }

    /// Start forwarding notifications to [`Self::subscribe_notifications`] receivers.
    pub async fn start_notifications(&self) -> Result<()> {
        if self.listener_token.read().is_some() {
            return Ok(());
        }

        let mut notifications = self.peripheral.notifications().await?;
        let notification_tx = self.notification_tx.clone();
        let token = CancellationToken::new();
        let stop = token.clone();

        let handle = tokio::spawn(async move {
            debug!("Notification listener started");

            loop {
                tokio::select! {
                    _ = stop.cancelled() => break,
                    next = notifications.next() => {
                        let Some(notification) = next else {
                            debug!("Notification stream ended");
                            break;
                        };

                        let _ = notification_tx.send(NotificationEvent {
                            characteristic_uuid: notification.uuid,
                            data: notification.value,
                        });
                    }
                }
            }

            debug!("Notification listener stopped");
        });

        *self.listener_token.write() = Some(token);
        *self.listener_handle.write() = Some(handle);

        Ok(())
    }

    /// Stop listening for notifications.
    pub async fn stop_notifications(&self) {
        if let Some(token) = self.listener_token.write().take() {
            token.cancel();
        }

        let handle = self.listener_handle.write().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!("Notification listener panicked: {}", e);
            }
        }
    }

    /// Get a receiver for notification events.
    pub fn subscribe_notifications(&self) -> broadcast::Receiver<NotificationEvent> {
        self.notification_tx.subscribe()
    }
}

impl Drop for CharacteristicHandler {
    fn drop(&mut self) {
        if let Some(token) = self.listener_token.get_mut().take() {
            token.cancel();
        }
    }
}
