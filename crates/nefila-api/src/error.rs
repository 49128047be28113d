use std::path::PathBuf;

use nefila_config::ConfigError;
use thiserror::Error;

use crate::family::DeviceFamily;

/// Top-level error type for the `nefila-api` crate.
///
/// Covers credential resolution, session authentication, transport and
/// response handling. Variants that involve a device carry its host.
#[derive(Debug, Error)]
pub enum Error {
    // ── Credentials ─────────────────────────────────────────────────
    /// Credential file absent and no explicit credentials given.
    #[error("credential file not found at {}", path.display())]
    ConfigNotFound { path: PathBuf },

    /// No section for the host and no `DEFAULT` section.
    #[error("no credentials for host '{host}' and no DEFAULT section")]
    CredentialsMissing { host: String },

    /// A section exists but holds no usable credential variant.
    #[error("malformed credentials in [{section}]: {reason}")]
    CredentialsMalformed { section: String, reason: String },

    /// Settings could not be loaded or the credential file could not be read.
    #[error("configuration error: {0}")]
    Settings(String),

    // ── Authentication ──────────────────────────────────────────────
    /// Device reachable but rejected the credentials or the handshake.
    #[error("authentication with {host} failed: {message}")]
    AuthenticationFailed { host: String, message: String },

    /// Wrong credential type for the requested strategy.
    #[error("wrong auth strategy: {expected} credentials required, got {got}")]
    WrongAuthStrategy {
        expected: &'static str,
        got: &'static str,
    },

    /// Request attempted on a session that is not open.
    #[error("session with {host} is not open")]
    SessionNotOpen { host: String },

    // ── Transport ───────────────────────────────────────────────────
    /// DNS, TCP, TLS or timeout failure reaching the device.
    #[error("cannot connect to {host}: {reason}")]
    ConnectionFailed {
        host: String,
        reason: String,
        #[source]
        source: Option<reqwest::Error>,
    },

    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TLS configuration or HTTP client construction error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── Responses ───────────────────────────────────────────────────
    /// Non-success HTTP status on an authenticated request.
    #[error("request to {url} failed (HTTP {status}): {message}")]
    RequestFailed {
        status: u16,
        url: String,
        message: String,
    },

    /// Response body is not the expected JSON structure, with the raw body.
    #[error("malformed response: {message}")]
    ResponseMalformed { message: String, body: String },

    // ── Resources ───────────────────────────────────────────────────
    #[error("firmware {version} is not offered by the device")]
    FirmwareNotFound { version: String },

    /// Local firmware image could not be read.
    #[error("cannot read firmware image {}: {source}", path.display())]
    FirmwareFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{operation} is not available on {family}")]
    UnsupportedFamily {
        operation: &'static str,
        family: DeviceFamily,
    },
}

/// Error kinds callers can branch on without matching payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    ConfigNotFound,
    CredentialsMissing,
    CredentialsMalformed,
    Configuration,
    ConnectionFailed,
    AuthenticationFailed,
    SessionNotOpen,
    RequestFailed,
    ResponseMalformed,
    Unsupported,
}

impl Error {
    pub(crate) fn connection(host: &str, err: reqwest::Error) -> Self {
        let reason = if err.is_timeout() {
            format!("request timed out: {err}")
        } else {
            err.to_string()
        };
        Self::ConnectionFailed {
            host: host.to_owned(),
            reason,
            source: Some(err),
        }
    }

    pub(crate) fn authentication(host: &str, message: impl Into<String>) -> Self {
        Self::AuthenticationFailed {
            host: host.to_owned(),
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ConfigNotFound { .. } => ErrorKind::ConfigNotFound,
            Self::CredentialsMissing { .. } => ErrorKind::CredentialsMissing,
            Self::CredentialsMalformed { .. } => ErrorKind::CredentialsMalformed,
            Self::Settings(_) | Self::InvalidUrl(_) | Self::Tls(_) | Self::FirmwareFile { .. } => {
                ErrorKind::Configuration
            }
            Self::ConnectionFailed { .. } => ErrorKind::ConnectionFailed,
            Self::AuthenticationFailed { .. } | Self::WrongAuthStrategy { .. } => {
                ErrorKind::AuthenticationFailed
            }
            Self::SessionNotOpen { .. } => ErrorKind::SessionNotOpen,
            Self::RequestFailed { .. } => ErrorKind::RequestFailed,
            Self::ResponseMalformed { .. } => ErrorKind::ResponseMalformed,
            Self::FirmwareNotFound { .. } | Self::UnsupportedFamily { .. } => {
                ErrorKind::Unsupported
            }
        }
    }

    /// Returns `true` if the failure is a transport problem worth retrying.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::ConnectionFailed { .. })
    }

    /// HTTP status of a failed request, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::RequestFailed { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::ConfigNotFound { path } => Self::ConfigNotFound { path },
            ConfigError::CredentialsMissing { host } => Self::CredentialsMissing { host },
            ConfigError::CredentialsMalformed { section, reason } => {
                Self::CredentialsMalformed { section, reason }
            }
            other @ (ConfigError::Validation { .. }
            | ConfigError::Figment(_)
            | ConfigError::Io(_)) => Self::Settings(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_errors_keep_their_kind() {
        let err: Error = ConfigError::CredentialsMissing {
            host: "10.0.0.5".into(),
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::CredentialsMissing);

        let err: Error = ConfigError::ConfigNotFound {
            path: PathBuf::from("/nowhere"),
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::ConfigNotFound);

        let err: Error = ConfigError::CredentialsMalformed {
            section: "fw".into(),
            reason: "empty".into(),
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::CredentialsMalformed);
    }

    #[test]
    fn io_errors_become_settings() {
        let err: Error = ConfigError::Io(std::io::Error::other("denied")).into();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(err.to_string().contains("denied"));
    }

    #[test]
    fn only_connection_failures_are_transient() {
        let auth = Error::authentication("fw", "bad password");
        assert!(!auth.is_transient());

        let conn = Error::ConnectionFailed {
            host: "fw".into(),
            reason: "refused".into(),
            source: None,
        };
        assert!(conn.is_transient());
    }

    #[test]
    fn status_is_exposed_for_request_failures() {
        let err = Error::RequestFailed {
            status: 404,
            url: "https://fw/api/v2/monitor/system/status".into(),
            message: "Not Found".into(),
        };
        assert_eq!(err.status(), Some(404));
        assert_eq!(Error::SessionNotOpen { host: "fw".into() }.status(), None);
    }
}
