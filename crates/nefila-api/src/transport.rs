// Transport configuration for building reqwest::Client instances.
//
// Every `Session::open` builds a fresh client from this config, so the
// cookie jar and auth headers of a closed session are never reused.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use nefila_config::Settings;
use reqwest::cookie::Jar;
use reqwest::header::HeaderMap;

use crate::error::Error;

/// TLS verification mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TlsMode {
    /// Use the system certificate store.
    System,
    /// Use a custom CA certificate from the given PEM file.
    CustomCa(PathBuf),
    /// Accept any certificate (appliances ship self-signed certificates).
    DangerAcceptInvalid,
}

/// Shared transport configuration for building HTTP clients.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub tls: TlsMode,
    pub timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

impl TransportConfig {
    /// Derive transport settings: a configured CA wins, then `insecure`.
    pub fn from_settings(settings: &Settings) -> Self {
        let tls = match (&settings.ca_cert, settings.insecure) {
            (Some(path), _) => TlsMode::CustomCa(path.clone()),
            (None, true) => TlsMode::DangerAcceptInvalid,
            (None, false) => TlsMode::System,
        };
        Self {
            tls,
            timeout: Duration::from_secs(settings.timeout_secs),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Build a `reqwest::Client` with the given cookie jar and default headers.
    pub fn build_client(
        &self,
        cookie_jar: Arc<Jar>,
        headers: HeaderMap,
    ) -> Result<reqwest::Client, Error> {
        let mut builder = reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(concat!("nefila/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .cookie_provider(cookie_jar);

        match &self.tls {
            TlsMode::System => {}
            TlsMode::CustomCa(path) => {
                let cert_pem = std::fs::read(path)
                    .map_err(|e| Error::Tls(format!("failed to read CA cert: {e}")))?;
                let cert = reqwest::Certificate::from_pem(&cert_pem)
                    .map_err(|e| Error::Tls(format!("invalid CA cert: {e}")))?;
                builder = builder.add_root_certificate(cert);
            }
            TlsMode::DangerAcceptInvalid => {
                builder = builder.danger_accept_invalid_certs(true);
            }
        }

        builder
            .build()
            .map_err(|e| Error::Tls(format!("failed to build HTTP client: {e}")))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_accepts_self_signed() {
        let config = TransportConfig::default();
        assert_eq!(config.tls, TlsMode::DangerAcceptInvalid);
        assert_eq!(config.timeout, Duration::from_secs(10));
    }

    #[test]
    fn ca_cert_wins_over_insecure() {
        let settings = Settings {
            ca_cert: Some(PathBuf::from("/etc/fabric/ca.pem")),
            ..Settings::default()
        };
        let config = TransportConfig::from_settings(&settings);
        assert_eq!(
            config.tls,
            TlsMode::CustomCa(PathBuf::from("/etc/fabric/ca.pem"))
        );
    }

    #[test]
    fn strict_tls_when_not_insecure() {
        let settings = Settings {
            insecure: false,
            timeout_secs: 3,
            ..Settings::default()
        };
        let config = TransportConfig::from_settings(&settings);
        assert_eq!(config.tls, TlsMode::System);
        assert_eq!(config.timeout, Duration::from_secs(3));
    }

    #[test]
    fn missing_ca_file_is_a_tls_error() {
        let config = TransportConfig {
            tls: TlsMode::CustomCa(PathBuf::from("/definitely/not/here.pem")),
            timeout: Duration::from_secs(1),
        };
        let err = config
            .build_client(Arc::new(Jar::default()), HeaderMap::new())
            .unwrap_err();
        assert!(matches!(err, Error::Tls(_)));
    }
}
