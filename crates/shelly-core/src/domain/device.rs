//! Relay device records.
//!
//! The device file is a JSON array, one object per relay channel:
//!
//! ```json
//! [
//!   { "name": "Apartment", "address": "192.168.1.92", "user": "u", "password": "p" },
//!   { "name": "Wall High", "address": "192.168.1.198", "relay": 0, "device": "shelly2.5",
//!     "user": "u", "password": "p" },
//!   { "name": "Wall Low",  "address": "192.168.1.198", "relay": 1, "device": "shelly2.5",
//!     "user": "u", "password": "p" }
//! ]
//! ```
//!
//! Only `address`, `user` and `password` are required.  A two-channel device
//! (Shelly 2.5) appears twice with the same address and a different `relay`.
//!
//! # Route keys
//!
//! HTTP routes name a device by its *route key*: the record's `name` with all
//! whitespace removed, lower-cased (`"Wall High"` → `wallhigh`).  A record
//! without a name is addressed by its `address` instead.

use secrecy::SecretString;
use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

/// Errors produced while turning device-file text into a [`DeviceTable`].
#[derive(Debug, Error)]
pub enum DeviceConfigError {
    /// The text is not a JSON array of device records.
    #[error("malformed device configuration: {0}")]
    Parse(#[from] serde_json::Error),

    /// A record has an empty `address`, so no request could ever reach it.
    #[error("device record #{index} has an empty address")]
    EmptyAddress {
        /// Zero-based position of the record in the JSON array.
        index: usize,
    },
}

/// One relay channel the gateway can switch.
///
/// `Debug` output never contains the password: [`SecretString`] prints
/// `[REDACTED]`.
#[derive(Debug, Deserialize)]
pub struct Device {
    /// Human-readable name, e.g. `"Wall High"`.  Optional.
    #[serde(default)]
    pub name: String,

    /// Host or `host:port` of the device's built-in HTTP API.
    pub address: String,

    /// Relay channel index on the device (`/relay/{relay}`).
    #[serde(default)]
    pub relay: u8,

    /// Hardware model string, e.g. `"shelly2.5"`.  Informational only.
    #[serde(default, rename = "device")]
    pub model: Option<String>,

    /// Basic-auth user configured on the device.
    pub user: String,

    /// Basic-auth password configured on the device.
    pub password: SecretString,
}

impl Device {
    /// Returns the key HTTP routes use to address this device.
    pub fn route_key(&self) -> String {
        if self.name.trim().is_empty() {
            return self.address.to_ascii_lowercase();
        }
        self.name
            .chars()
            .filter(|c| !c.is_whitespace())
            .flat_map(char::to_lowercase)
            .collect()
    }

    /// Label used in log lines: the name when present, otherwise the address.
    pub fn label(&self) -> &str {
        if self.name.trim().is_empty() {
            &self.address
        } else {
            &self.name
        }
    }
}

/// Immutable set of devices loaded from one version of the device file.
///
/// Reloading never mutates a table; the gateway builds a new one and swaps it
/// in whole, so a request always sees a consistent snapshot.
#[derive(Debug, Default)]
pub struct DeviceTable {
    devices: Vec<Device>,
}

impl DeviceTable {
    /// Builds a table from already-parsed records.
    pub fn new(devices: Vec<Device>) -> Self {
        Self { devices }
    }

    /// Parses the JSON device file.
    ///
    /// When two records share a route key the first one wins for lookups; a
    /// warning names the shadowed record.
    ///
    /// # Errors
    ///
    /// [`DeviceConfigError::Parse`] for malformed JSON and
    /// [`DeviceConfigError::EmptyAddress`] for a record without an address.
    pub fn from_json(text: &str) -> Result<Self, DeviceConfigError> {
        let devices: Vec<Device> = serde_json::from_str(text)?;

        if let Some(index) = devices.iter().position(|d| d.address.trim().is_empty()) {
            return Err(DeviceConfigError::EmptyAddress { index });
        }

        for (i, device) in devices.iter().enumerate() {
            let key = device.route_key();
            if devices[..i].iter().any(|earlier| earlier.route_key() == key) {
                warn!(
                    "device '{}' shadowed by an earlier record with route key '{key}'",
                    device.label()
                );
            }
        }

        Ok(Self { devices })
    }

    /// Looks a device up by route key (case-insensitive).
    pub fn find(&self, key: &str) -> Option<&Device> {
        let key: String = key.chars().flat_map(char::to_lowercase).collect();
        self.devices.iter().find(|d| d.route_key() == key)
    }

    /// Number of records in the table.
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    /// `true` when no devices are configured.
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Iterates over the records in file order.
    pub fn iter(&self) -> impl Iterator<Item = &Device> {
        self.devices.iter()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
