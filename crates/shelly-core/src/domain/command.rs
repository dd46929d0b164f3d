//! Command vocabulary shared by both listeners.
//!
//! The plaintext listener is reachable from the LAN only and carries event
//! reports that the relays themselves push (`/event/{device}/{on|off}`).  The
//! TLS listener carries everything that uses device credentials.  Both route
//! tables call the same dispatcher and pass the [`TrustLevel`] of the listener
//! the request arrived on.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Trust level of the listener a request arrived on.
///
/// Ordered: `Lan < Secure`.  A command is permitted when the listener's level
/// is at least the command's [`DeviceCommand::required_trust`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TrustLevel {
    /// Cleartext listener.
    Lan,
    /// TLS listener.
    Secure,
}

impl TrustLevel {
    /// Returns `true` when a request at this level may run a command that
    /// requires `required`.
    pub fn permits(self, required: TrustLevel) -> bool {
        self >= required
    }
}

impl fmt::Display for TrustLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrustLevel::Lan => f.write_str("lan"),
            TrustLevel::Secure => f.write_str("secure"),
        }
    }
}

/// Relay state named in an event report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchState {
    On,
    Off,
}

/// The path segment was neither `on` nor `off`.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown switch state '{0}' (expected 'on' or 'off')")]
pub struct UnknownSwitchState(pub String);

impl FromStr for SwitchState {
    type Err = UnknownSwitchState;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "on" => Ok(SwitchState::On),
            "off" => Ok(SwitchState::Off),
            other => Err(UnknownSwitchState(other.to_string())),
        }
    }
}

impl fmt::Display for SwitchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SwitchState::On => f.write_str("on"),
            SwitchState::Off => f.write_str("off"),
        }
    }
}

/// What a route asks the dispatcher to do with a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceCommand {
    /// Flip the relay by issuing one outbound request to the device.
    Toggle,
    /// The device reported that its relay changed state.
    Report(SwitchState),
}

impl DeviceCommand {
    /// Minimum listener trust level this command may arrive on.
    ///
    /// Toggles embed device credentials in the outbound request, so they are
    /// only accepted over TLS.
    pub fn required_trust(self) -> TrustLevel {
        match self {
            DeviceCommand::Toggle => TrustLevel::Secure,
            DeviceCommand::Report(_) => TrustLevel::Lan,
        }
    }
}

impl fmt::Display for DeviceCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceCommand::Toggle => f.write_str("toggle"),
            DeviceCommand::Report(state) => write!(f, "report {state}"),
        }
    }
}
