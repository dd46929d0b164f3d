//! Device file loading and reload.
//!
//! The device file is read at process start and again each time the TLS
//! listener starts.  A failed read never takes the gateway down: the error is
//! logged and the store keeps whatever table it already had.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{info, warn};

use shelly_core::{DeviceConfigError, DeviceTable};

use crate::domain::DeviceStore;

/// Error reading or parsing the device file.
#[derive(Debug, Error)]
pub enum DeviceFileError {
    /// The file could not be read.
    #[error("I/O error reading device file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file content is not a valid device list.
    #[error("device file {path}: {source}")]
    Config {
        path: PathBuf,
        #[source]
        source: DeviceConfigError,
    },
}

/// Reads and parses the device file at `path`.
///
/// # Errors
///
/// [`DeviceFileError::Io`] if the file cannot be read (missing included) and
/// [`DeviceFileError::Config`] if it does not parse.
pub async fn load_device_file(path: &Path) -> Result<DeviceTable, DeviceFileError> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| DeviceFileError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    DeviceTable::from_json(&text).map_err(|source| DeviceFileError::Config {
        path: path.to_path_buf(),
        source,
    })
}

/// Loads the device file and swaps it into `store`.
///
/// Returns the number of devices now configured.
///
/// # Errors
///
/// Same as [`load_device_file`]; on error `store` is left untouched.
pub async fn reload_devices(store: &DeviceStore, path: &Path) -> Result<usize, DeviceFileError> {
    let table = load_device_file(path).await?;
    let count = table.len();
    store.replace(table);
    Ok(count)
}

/// [`reload_devices`], logging the outcome instead of returning it.
pub async fn reload_or_keep(store: &DeviceStore, path: &Path) {
    match reload_devices(store, path).await {
        Ok(count) => info!("loaded {count} device(s) from {}", path.display()),
        Err(e) => warn!(
            "{e}; keeping {} previously loaded device(s)",
            store.snapshot().len()
        ),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
