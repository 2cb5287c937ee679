//! Decoding of messages published by the feeder.
//!
//! The feeder notifies the data characteristic with UTF-8 text in one of two
//! shapes:
//! - A telemetry line: `<temperature>,<weight>,<0|1>`, e.g. `27.50,4.125,0`
//! - A servo sentinel: `SERVO_RUNNING`, `SERVO_STOPPED`, `STATUS:RUNNING`
//!   or `STATUS:STOPPED`
//!
//! Decoding never fails. A telemetry field that is missing or does not parse
//! decodes as `None`, and the caller keeps its previous value for that field.

use tracing::trace;

/// Sentinel sent when the servo starts spinning.
pub const SERVO_RUNNING_TOKEN: &str = "SERVO_RUNNING";
/// Sentinel sent when the servo stops.
pub const SERVO_STOPPED_TOKEN: &str = "SERVO_STOPPED";
/// Prefix of the reply to a `STATUS` command.
pub const STATUS_PREFIX: &str = "STATUS:";

/// Reported state of the dispensing servo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ServoState {
    /// Servo is spinning and feed is flowing.
    Running,
    /// Servo is stopped and the outlet is closed.
    Stopped,
}

impl ServoState {
    /// Check if the servo is running.
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }
}

impl From<bool> for ServoState {
    fn from(running: bool) -> Self {
        if running {
            Self::Running
        } else {
            Self::Stopped
        }
    }
}

/// A decoded telemetry line. Each field is `None` when it failed to decode.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Telemetry {
    /// Water temperature in Celsius.
    pub temperature: Option<f64>,
    /// Feed container weight in kilograms.
    pub weight: Option<f64>,
    /// Whether the servo is running.
    pub servo_running: Option<bool>,
}

/// A message received from the feeder.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DeviceMessage {
    /// Periodic sensor line.
    Telemetry(Telemetry),
    /// Servo state sentinel (`SERVO_*` or `STATUS:*`).
    Servo(ServoState),
}

impl DeviceMessage {
    /// Decode a message from its text form.
    pub fn parse(text: &str) -> Self {
        let text = text.trim_matches(|c: char| c.is_whitespace() || c == '\0');

        match text {
            SERVO_RUNNING_TOKEN => return Self::Servo(ServoState::Running),
            SERVO_STOPPED_TOKEN => return Self::Servo(ServoState::Stopped),
            _ => {}
        }

        if let Some(status) = text.strip_prefix(STATUS_PREFIX) {
            match status {
                "RUNNING" => return Self::Servo(ServoState::Running),
                "STOPPED" => return Self::Servo(ServoState::Stopped),
                _ => trace!("Unrecognised status reply: {:?}", text),
            }
        }

        let mut fields = text.split(',').map(str::trim);

        let temperature = fields.next().and_then(parse_number);
        let weight = fields.next().and_then(parse_number);
        let servo_running = fields.next().and_then(|flag| match flag {
            "1" => Some(true),
            "0" => Some(false),
            _ => None,
        });

        Self::Telemetry(Telemetry {
            temperature,
            weight,
            servo_running,
        })
    }

    /// Decode a message from raw notification bytes.
    ///
    /// Invalid UTF-8 sequences are replaced rather than rejected, so a
    /// corrupted byte only spoils the field it lands in.
    pub fn from_bytes(data: &[u8]) -> Self {
        Self::parse(&String::from_utf8_lossy(data))
    }

    /// The servo state carried by this message, if any.
    pub fn servo_state(&self) -> Option<ServoState> {
        match self {
            Self::Telemetry(t) => t.servo_running.map(ServoState::from),
            Self::Servo(state) => Some(*state),
        }
    }
}

fn parse_number(field: &str) -> Option<f64> {
    field.parse::<f64>().ok().filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_telemetry() {
        assert_eq!(
            DeviceMessage::parse("27.50,4.125,1"),
            DeviceMessage::Telemetry(Telemetry {
                temperature: Some(27.5),
                weight: Some(4.125),
                servo_running: Some(true),
            })
        );
    }

    #[test]
    fn test_parse_sentinels() {
        assert_eq!(
            DeviceMessage::parse("SERVO_RUNNING"),
            DeviceMessage::Servo(ServoState::Running)
        );
        assert_eq!(
            DeviceMessage::parse("SERVO_STOPPED"),
            DeviceMessage::Servo(ServoState::Stopped)
        );
        assert_eq!(
            DeviceMessage::parse("STATUS:RUNNING"),
            DeviceMessage::Servo(ServoState::Running)
        );
        assert_eq!(
            DeviceMessage::parse("STATUS:STOPPED\n"),
            DeviceMessage::Servo(ServoState::Stopped)
        );
    }

    #[test]
    fn test_malformed_fields_are_none() {
        let msg = DeviceMessage::parse("abc,3.2,x");
        assert_eq!(
            msg,
            DeviceMessage::Telemetry(Telemetry {
                temperature: None,
                weight: Some(3.2),
                servo_running: None,
            })
        );
    }

    #[test]
    fn test_missing_fields_are_none() {
        let msg = DeviceMessage::parse("26.0");
        assert_eq!(
            msg,
            DeviceMessage::Telemetry(Telemetry {
                temperature: Some(26.0),
                weight: None,
                servo_running: None,
            })
        );
    }

    #[test]
    fn test_non_finite_rejected() {
        let msg = DeviceMessage::parse("NaN,inf,0");
        assert_eq!(
            msg,
            DeviceMessage::Telemetry(Telemetry {
                temperature: None,
                weight: None,
                servo_running: Some(false),
            })
        );
    }

    #[test]
    fn test_from_bytes_with_trailing_nul() {
        let msg = DeviceMessage::from_bytes(b"25.00,0.000,0\0");
        assert_eq!(msg.servo_state(), Some(ServoState::Stopped));
    }

    #[test]
    fn test_unknown_status_reply_is_not_a_sentinel() {
        let msg = DeviceMessage::parse("STATUS:UNKNOWN");
        assert_eq!(msg.servo_state(), None);
    }
}
