//! Credential resolution and client settings for Fortinet Security Fabric clients.
//!
//! The credential file (section-based `key = value` text, one section per device
//! host plus a `DEFAULT` section) is read, never written. `Settings` carries the
//! transport tuning shared by every device client and is layered with figment.

pub mod credentials;
pub mod settings;

use std::path::PathBuf;

use thiserror::Error;

pub use credentials::{
    CredentialConfig, CredentialSection, CredentialStore, Credentials, DEFAULT_SECTION,
    credentials_path, select_section,
};
pub use settings::{Settings, config_dir, load_settings, load_settings_from, settings_path};

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    /// The credential file does not exist and nothing explicit was supplied.
    #[error("credential file not found at {}", path.display())]
    ConfigNotFound { path: PathBuf },

    /// Neither a section for the host nor a `DEFAULT` section.
    #[error("no credentials for host '{host}' and no DEFAULT section")]
    CredentialsMissing { host: String },

    /// A section (or explicit argument set) without a usable credential variant.
    #[error("malformed credentials in [{section}]: {reason}")]
    CredentialsMalformed { section: String, reason: String },

    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("settings loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}
