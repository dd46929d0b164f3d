//! Storage infrastructure: the files the gateway reads.
//!
//! - `settings`: the optional TOML settings file, with defaults for every key.
//! - `devices`: the JSON device file, loaded at start-up and on each TLS
//!   listener start.
//!
//! Nothing here is ever written back to disk.

pub mod devices;
pub mod settings;

pub use devices::{load_device_file, reload_devices, reload_or_keep, DeviceFileError};
pub use settings::{load_settings, GatewaySettings, SettingsError};
