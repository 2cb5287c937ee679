//! Command tokens understood by the feeder firmware.

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// A command written to the feeder's command characteristic.
///
/// Commands travel as bare ASCII tokens with no framing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Command {
    /// Spin the dispensing servo.
    Run,
    /// Stop the dispensing servo.
    Stop,
    /// Ask the device to report `STATUS:RUNNING` or `STATUS:STOPPED`.
    Status,
}

impl Command {
    /// The token sent over the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Run => "RUN",
            Self::Stop => "STOP",
            Self::Status => "STATUS",
        }
    }

    /// Encode the command as the bytes written to the characteristic.
    pub fn to_bytes(&self) -> &'static [u8] {
        self.as_str().as_bytes()
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Command {
    type Err = Error;

    /// Parse a command token. The firmware also accepts `START` and `HALT`
    /// as aliases, so they are accepted here too.
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "RUN" | "START" => Ok(Self::Run),
            "STOP" | "HALT" => Ok(Self::Stop),
            "STATUS" => Ok(Self::Status),
            other => Err(Error::InvalidData {
                context: format!("Unknown command token: {:?}", other),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_tokens() {
        assert_eq!(Command::Run.as_str(), "RUN");
        assert_eq!(Command::Stop.as_str(), "STOP");
        assert_eq!(Command::Status.as_str(), "STATUS");
        assert_eq!(Command::Run.to_bytes(), b"RUN");
    }

    #[test]
    fn test_parse_aliases() {
        assert_eq!("run".parse::<Command>().unwrap(), Command::Run);
        assert_eq!(" START ".parse::<Command>().unwrap(), Command::Run);
        assert_eq!("halt".parse::<Command>().unwrap(), Command::Stop);
        assert_eq!("STATUS".parse::<Command>().unwrap(), Command::Status);
        assert!("SPIN".parse::<Command>().is_err());
    }
}
