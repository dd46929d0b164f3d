//! TLS set-up for the secure listener.

use axum_server::tls_rustls::RustlsConfig;

use crate::domain::TlsPaths;

/// Installs `ring` as the process-wide rustls crypto provider.
///
/// rustls refuses to pick a provider on its own when more than one is
/// compiled in.  Installing twice is harmless: later calls are ignored.
pub fn install_crypto_provider() {
    let _ = rustls::crypto::ring::default_provider().install_default();
}

/// Loads the PEM certificate chain and private key.
///
/// # Errors
///
/// Returns the I/O error when either file is missing, unreadable, or not
/// valid PEM for its purpose.
pub async fn load_credentials(paths: &TlsPaths) -> std::io::Result<RustlsConfig> {
    install_crypto_provider();
    RustlsConfig::from_pem_file(&paths.cert, &paths.key).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_credentials_fail_to_load() {
        let dir = tempfile::tempdir().unwrap();
        let paths = TlsPaths {
            cert: dir.path().join("cert.pem"),
            key: dir.path().join("privkey.pem"),
        };

        assert!(load_credentials(&paths).await.is_err());
    }

    #[tokio::test]
    async fn test_self_signed_credentials_load() {
        // Arrange
        let dir = tempfile::tempdir().unwrap();
        let certified = rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
        let paths = TlsPaths {
            cert: dir.path().join("cert.pem"),
            key: dir.path().join("privkey.pem"),
        };
        std::fs::write(&paths.cert, certified.cert.pem()).unwrap();
        std::fs::write(&paths.key, certified.key_pair.serialize_pem()).unwrap();

        // Act / Assert
        assert!(load_credentials(&paths).await.is_ok());
    }
}
