//! Database power state

use thiserror::Error;

/// Desired power state of a database
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum PowerState {
    Start,
    Stop,
}

/// A power state outside the closed {start, stop} set
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid state. Valid states are 'stop' or 'start'.")]
pub struct InvalidPowerState(pub String);

impl PowerState {
    /// Parse a caller-supplied state, rejecting anything but `start`/`stop`
    pub fn parse(s: &str) -> Result<Self, InvalidPowerState> {
        s.parse().map_err(|_| InvalidPowerState(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_valid_states() {
        assert_eq!(PowerState::parse("start"), Ok(PowerState::Start));
        assert_eq!(PowerState::parse("stop"), Ok(PowerState::Stop));
    }

    #[test]
    fn rejects_other_states() {
        for bad in ["", "reboot", "Start", "stopped"] {
            let err = PowerState::parse(bad).unwrap_err();
            assert_eq!(err.0, bad);
        }
    }

    #[test]
    fn display_round_trips() {
        assert_eq!(PowerState::Stop.to_string(), "stop");
    }
}
