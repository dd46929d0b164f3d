//! HTTP relay client.
//!
//! A toggle is a single `GET` against the device's built-in API:
//!
//! ```text
//! http://{user}:{password}@{address}/relay/{relay}?turn=toggle
//! ```
//!
//! The credentials travel as HTTP basic auth.  The response status is not
//! checked: whatever body the device sends back is handed to the caller.
//!
//! Neither the URL nor the password ever reaches a log line or an error
//! message, which is why errors are stripped of their URL before formatting.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use tracing::debug;

use shelly_core::Device;

use crate::application::{RelayClient, RelayError};

/// [`RelayClient`] backed by a shared `reqwest` connection pool.
#[derive(Debug, Clone)]
pub struct HttpRelayClient {
    http: reqwest::Client,
}

impl HttpRelayClient {
    /// Builds a client whose requests give up after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns the `reqwest` error if the HTTP client cannot be initialised.
    pub fn new(timeout: Duration) -> reqwest::Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http })
    }

    /// Builds the toggle URL for `device`, credentials included.
    ///
    /// # Errors
    ///
    /// [`RelayError::InvalidAddress`] when the address is not a valid host.
    pub fn toggle_url(device: &Device) -> Result<reqwest::Url, RelayError> {
        let invalid = || RelayError::InvalidAddress(device.address.clone());

        let mut url = reqwest::Url::parse(&format!(
            "http://{}/relay/{}?turn=toggle",
            device.address, device.relay
        ))
        .map_err(|_| invalid())?;
        url.set_username(&device.user).map_err(|()| invalid())?;
        url.set_password(Some(device.password.expose_secret()))
            .map_err(|()| invalid())?;
        Ok(url)
    }
}

#[async_trait]
impl RelayClient for HttpRelayClient {
    async fn toggle(&self, device: &Device) -> Result<String, RelayError> {
        let url = Self::toggle_url(device)?;
        let transport = |e: reqwest::Error| RelayError::Transport {
            device: device.label().to_string(),
            reason: e.without_url().to_string(),
        };

        // reqwest moves the URL's user info into an Authorization header.
        let response = self.http.get(url).send().await.map_err(transport)?;
        debug!(
            "relay '{}' answered {}",
            device.label(),
            response.status()
        );
        response.text().await.map_err(transport)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
