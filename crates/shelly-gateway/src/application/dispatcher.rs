//! Device Command Dispatcher.
//!
//! One dispatcher serves both route tables.  Each call names the device by
//! route key, the command, and the [`TrustLevel`] of the listener the request
//! arrived on:
//!
//! ```text
//! plaintext  /event/{device}/{on|off}  → dispatch(Lan,    device, Report(state))
//! TLS        /shelly/{device}/toggle   → dispatch(Secure, device, Toggle)
//! ```
//!
//! A toggle performs exactly one outbound request through the injected
//! [`RelayClient`].  Its outcome is not validated: a failed request is logged
//! and reported as [`DispatchOutcome::RelayFailed`], never as an error, so the
//! browser always gets a success response for a known device.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{info, warn};

use shelly_core::{Device, DeviceCommand, TrustLevel};

use crate::domain::DeviceStore;

/// Failure of one outbound relay request.
#[derive(Debug, Error)]
pub enum RelayError {
    /// The device address (plus credentials) does not form a valid URL.
    #[error("device address '{0}' does not form a valid relay URL")]
    InvalidAddress(String),

    /// The request could not be completed.
    #[error("relay request to '{device}' failed: {reason}")]
    Transport { device: String, reason: String },
}

/// Issues the outbound request that switches a relay.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RelayClient: Send + Sync {
    /// Toggles `device`'s relay and returns the response body, whatever the
    /// status code.
    async fn toggle(&self, device: &Device) -> Result<String, RelayError>;
}

/// Why a command was not carried out.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    /// No device with this route key is configured.
    #[error("unknown device '{0}'")]
    UnknownDevice(String),

    /// The command needs a higher trust level than the listener provides.
    #[error("'{command}' is not permitted over the {trust} listener")]
    NotPermitted {
        command: DeviceCommand,
        trust: TrustLevel,
    },
}

/// What happened to a dispatched command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The device answered; `body` is its response text.
    Relayed { body: String },
    /// The outbound request failed.  Already logged.
    RelayFailed,
    /// An event report was recorded.
    Reported,
}

impl DispatchOutcome {
    /// Body returned to the HTTP caller.
    pub fn into_body(self) -> String {
        match self {
            DispatchOutcome::Relayed { body } => body,
            DispatchOutcome::RelayFailed | DispatchOutcome::Reported => String::new(),
        }
    }
}

/// Routes device commands from either listener to the relay client.
pub struct DeviceCommandDispatcher {
    devices: Arc<DeviceStore>,
    relay: Arc<dyn RelayClient>,
}

impl DeviceCommandDispatcher {
    pub fn new(devices: Arc<DeviceStore>, relay: Arc<dyn RelayClient>) -> Self {
        Self { devices, relay }
    }

    /// Carries out `command` on the device with route key `device_key`.
    ///
    /// # Errors
    ///
    /// [`DispatchError::NotPermitted`] when `trust` is below the command's
    /// requirement (checked before the device lookup), and
    /// [`DispatchError::UnknownDevice`] when no device matches.
    pub async fn dispatch(
        &self,
        trust: TrustLevel,
        device_key: &str,
        command: DeviceCommand,
    ) -> Result<DispatchOutcome, DispatchError> {
        if !trust.permits(command.required_trust()) {
            warn!("rejected '{command}' for '{device_key}' over the {trust} listener");
            return Err(DispatchError::NotPermitted { command, trust });
        }

        // Hold the snapshot for the whole call: a concurrent reload swaps the
        // store but cannot pull the record out from under the request.
        let devices = self.devices.snapshot();
        let device = devices
            .find(device_key)
            .ok_or_else(|| DispatchError::UnknownDevice(device_key.to_string()))?;

        match command {
            DeviceCommand::Toggle => match self.relay.toggle(device).await {
                Ok(body) => {
                    info!("toggled '{}' relay {}", device.label(), device.relay);
                    Ok(DispatchOutcome::Relayed { body })
                }
                Err(e) => {
                    warn!("toggle of '{}' not confirmed: {e}", device.label());
                    Ok(DispatchOutcome::RelayFailed)
                }
            },
            DeviceCommand::Report(state) => {
                info!("event: '{}' relay {} is {state}", device.label(), device.relay);
                Ok(DispatchOutcome::Reported)
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
