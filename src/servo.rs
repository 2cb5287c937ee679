//! Servo actuation.
//!
//! Turns an open/close request into the matching command and, when a
//! session tracker is supplied, brackets the dispense with a feeding
//! session. The controller does not remember whether the outlet is open;
//! the caller passes in the state the device last reported.

use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::FeederConfig;
use crate::error::Result;
use crate::protocol::Command;
use crate::session::{FeedingSessionTracker, SessionOutcome};
use crate::transport::Transport;
use crate::utils::sleep_or_cancel;

/// Result of a toggle.
#[derive(Debug, Clone, PartialEq)]
pub enum ServoAction {
    /// `RUN` was sent.
    Opened,
    /// `STOP` was sent and the settle delay elapsed.
    Closed {
        /// How the session ended, when one was supplied.
        outcome: Option<SessionOutcome>,
    },
}

/// Issues `RUN`/`STOP` commands.
#[derive(Clone)]
pub struct ServoController {
    transport: Arc<dyn Transport>,
    settle_delay: Duration,
}

impl ServoController {
    /// Create a controller with the default settle delay.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self::with_settle_delay(transport, FeederConfig::DEFAULT_SETTLE_DELAY)
    }

    /// Create a controller with a custom settle delay.
    pub fn with_settle_delay(transport: Arc<dyn Transport>, settle_delay: Duration) -> Self {
        Self {
            transport,
            settle_delay,
        }
    }

    /// Pause between `STOP` and ending the session.
    pub fn settle_delay(&self) -> Duration {
        self.settle_delay
    }

    /// Open the outlet.
    ///
    /// Starts a session first if `session` is given. If the command then
    /// fails the session stays open; the caller decides whether to end or
    /// abandon it.
    pub async fn open(&self, session: Option<&FeedingSessionTracker>) -> Result<()> {
        if let Some(session) = session {
            session.start()?;
        }

        self.transport.send_command(Command::Run).await?;
        info!("Servo opened");
        Ok(())
    }

    /// Close the outlet: `STOP`, wait for the load cell to settle, then end
    /// the session if one is given.
    pub async fn close(
        &self,
        session: Option<&FeedingSessionTracker>,
        cancel: &CancellationToken,
    ) -> Result<Option<SessionOutcome>> {
        self.transport.send_command(Command::Stop).await?;
        info!("Servo closed");

        debug!("Waiting {:?} for the load cell to settle", self.settle_delay);
        sleep_or_cancel(self.settle_delay, cancel).await?;

        match session {
            Some(session) => Ok(Some(session.end().await?)),
            None => Ok(None),
        }
    }

    /// Send `STOP` without waiting or touching any session. Failures are
    /// logged and swallowed.
    pub async fn stop_best_effort(&self) {
        match self.transport.send_command(Command::Stop).await {
            Ok(()) => info!("Servo stopped after failure"),
            Err(e) => warn!("Best-effort stop failed: {}", e),
        }
    }

    /// Open when `is_closed`, close otherwise.
    pub async fn toggle(
        &self,
        is_closed: bool,
        session: Option<&FeedingSessionTracker>,
        cancel: &CancellationToken,
    ) -> Result<ServoAction> {
        if is_closed {
            self.open(session).await?;
            Ok(ServoAction::Opened)
        } else {
            let outcome = self.close(session, cancel).await?;
            Ok(ServoAction::Closed { outcome })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::sensor::SensorState;
    use crate::store::{FeedStore, MemoryStore};
    use crate::transport::MockTransport;
    use mockall::predicate::eq;
    use mockall::Sequence;

    fn session() -> (Arc<SensorState>, MemoryStore, FeedingSessionTracker) {
        let sensors = Arc::new(SensorState::new());
        let store = MemoryStore::new();
        let tracker = FeedingSessionTracker::new(sensors.clone(), Arc::new(store.clone()));
        (sensors, store, tracker)
    }

    #[tokio::test]
    async fn test_open_starts_session_then_runs() {
        let mut transport = MockTransport::new();
        transport
            .expect_send_command()
            .with(eq(Command::Run))
            .times(1)
            .returning(|_| Ok(()));

        let (sensors, _, tracker) = session();
        sensors.apply_text("28.00,5.000,0");

        let servo = ServoController::new(Arc::new(transport));
        servo.open(Some(&tracker)).await.unwrap();
        assert!(tracker.is_active());
    }

    #[tokio::test]
    async fn test_open_failure_leaves_session_open() {
        let mut transport = MockTransport::new();
        transport
            .expect_send_command()
            .returning(|_| Err(Error::NotConnected));

        let (_, _, tracker) = session();
        let servo = ServoController::new(Arc::new(transport));

        assert!(matches!(
            servo.open(Some(&tracker)).await,
            Err(Error::NotConnected)
        ));
        assert!(tracker.is_active());
    }

    #[tokio::test]
    async fn test_open_rejected_while_session_active() {
        let mut transport = MockTransport::new();
        transport.expect_send_command().never();

        let (_, _, tracker) = session();
        tracker.start().unwrap();

        let servo = ServoController::new(Arc::new(transport));
        assert!(matches!(
            servo.open(Some(&tracker)).await,
            Err(Error::SessionAlreadyActive)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_waits_for_settle_before_ending() {
        let mut transport = MockTransport::new();
        transport
            .expect_send_command()
            .with(eq(Command::Stop))
            .times(1)
            .returning(|_| Ok(()));

        let (sensors, store, tracker) = session();
        sensors.apply_text("28.00,5.000,1");
        tracker.start().unwrap();
        sensors.apply_text("28.00,3.400,0");

        // The load cell settles after the servo stopped.
        let late = sensors.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            late.apply_text("28.00,3.000,0");
        });

        let servo = ServoController::new(Arc::new(transport));
        let started = tokio::time::Instant::now();
        let outcome = servo
            .close(Some(&tracker), &CancellationToken::new())
            .await
            .unwrap();

        assert!(started.elapsed() >= Duration::from_millis(500));
        let log = outcome.as_ref().and_then(|o| o.feed_log()).unwrap();
        assert!((log.level - 2.0).abs() < 1e-9);
        assert_eq!(store.list_feed_logs().await.unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_cancelled_during_settle() {
        let mut transport = MockTransport::new();
        transport.expect_send_command().returning(|_| Ok(()));

        let (_, _, tracker) = session();
        tracker.start().unwrap();

        let token = CancellationToken::new();
        token.cancel();

        let servo = ServoController::new(Arc::new(transport));
        let result = servo.close(Some(&tracker), &token).await;
        assert!(matches!(result, Err(Error::Cancelled)));
        assert!(tracker.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_toggle_routes_by_state() {
        let mut transport = MockTransport::new();
        let mut seq = Sequence::new();
        transport
            .expect_send_command()
            .with(eq(Command::Run))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        transport
            .expect_send_command()
            .with(eq(Command::Stop))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));

        let servo = ServoController::new(Arc::new(transport));
        let token = CancellationToken::new();

        assert_eq!(
            servo.toggle(true, None, &token).await.unwrap(),
            ServoAction::Opened
        );
        assert_eq!(
            servo.toggle(false, None, &token).await.unwrap(),
            ServoAction::Closed { outcome: None }
        );
    }
}
