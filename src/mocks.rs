//! In-memory stand-ins for the feeder link.
//!
//! Useful for driving a [`crate::Feeder`] in tests and demos without hardware.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tracing::debug;

use crate::error::{Error, Result};
use crate::protocol::Command;
use crate::transport::{ConnectionState, Transport};

/// Transport that records every command and lets the caller inject
/// messages, connection changes and send failures.
///
/// Clones share state, so a test can keep one handle while the feeder owns
/// another.
#[derive(Clone)]
pub struct RecordingTransport {
    sent: Arc<Mutex<Vec<Command>>>,
    failures: Arc<Mutex<VecDeque<Option<Error>>>>,
    fail_all: Arc<Mutex<bool>>,
    message_tx: broadcast::Sender<String>,
    connection_tx: Arc<watch::Sender<ConnectionState>>,
}

impl RecordingTransport {
    /// Create a transport that starts connected.
    pub fn connected() -> Self {
        Self::with_state(ConnectionState::Connected)
    }

    /// Create a transport that starts disconnected.
    pub fn disconnected() -> Self {
        Self::with_state(ConnectionState::Disconnected)
    }

    fn with_state(state: ConnectionState) -> Self {
        let (message_tx, _) = broadcast::channel(64);
        let (connection_tx, _) = watch::channel(state);

        Self {
            sent: Arc::new(Mutex::new(Vec::new())),
            failures: Arc::new(Mutex::new(VecDeque::new())),
            fail_all: Arc::new(Mutex::new(false)),
            message_tx,
            connection_tx: Arc::new(connection_tx),
        }
    }

    /// Commands sent so far, oldest first.
    pub fn sent(&self) -> Vec<Command> {
        self.sent.lock().clone()
    }

    /// Number of times `command` was sent.
    pub fn count(&self, command: Command) -> usize {
        self.sent.lock().iter().filter(|c| **c == command).count()
    }

    /// Forget recorded commands.
    pub fn clear(&self) {
        self.sent.lock().clear();
    }

    /// Script the outcome of upcoming sends: `None` succeeds, `Some(err)` fails.
    /// Sends past the end of the script succeed.
    pub fn script_sends(&self, outcomes: impl IntoIterator<Item = Option<Error>>) {
        self.failures.lock().extend(outcomes);
    }

    /// Make every send fail until turned off again.
    pub fn fail_all_sends(&self, fail: bool) {
        *self.fail_all.lock() = fail;
    }

    /// Publish a text message as if the feeder had notified it.
    pub fn push_message(&self, text: impl Into<String>) {
        let _ = self.message_tx.send(text.into());
    }

    /// Change the connection state.
    pub fn set_connection(&self, state: ConnectionState) {
        self.connection_tx.send_replace(state);
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send_command(&self, command: Command) -> Result<()> {
        if !self.connection_tx.borrow().is_connected() {
            return Err(Error::NotConnected);
        }

        if *self.fail_all.lock() {
            return Err(Error::CommandFailed {
                command: command.to_string(),
                reason: "simulated failure".to_string(),
            });
        }

        if let Some(Some(err)) = self.failures.lock().pop_front() {
            return Err(err);
        }

        debug!("Simulated send: {}", command);
        self.sent.lock().push(command);
        Ok(())
    }

    fn subscribe_messages(&self) -> broadcast::Receiver<String> {
        self.message_tx.subscribe()
    }

    fn subscribe_connection(&self) -> watch::Receiver<ConnectionState> {
        self.connection_tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_records_commands() {
        let transport = RecordingTransport::connected();
        transport.send_command(Command::Run).await.unwrap();
        transport.send_command(Command::Stop).await.unwrap();
        assert_eq!(transport.sent(), vec![Command::Run, Command::Stop]);
        assert_eq!(transport.count(Command::Run), 1);
    }

    #[tokio::test]
    async fn test_scripted_failure() {
        let transport = RecordingTransport::connected();
        transport.script_sends([None, Some(Error::Cancelled)]);

        assert!(transport.send_command(Command::Run).await.is_ok());
        assert!(transport.send_command(Command::Stop).await.is_err());
        assert!(transport.send_command(Command::Stop).await.is_ok());
        assert_eq!(transport.sent(), vec![Command::Run, Command::Stop]);
    }

    #[tokio::test]
    async fn test_disconnected_rejects() {
        let transport = RecordingTransport::disconnected();
        assert!(matches!(
            transport.send_command(Command::Run).await,
            Err(Error::NotConnected)
        ));

        transport.set_connection(ConnectionState::Connected);
        assert_eq!(transport.connection_state(), ConnectionState::Connected);
        assert!(transport.send_command(Command::Run).await.is_ok());
    }
}
