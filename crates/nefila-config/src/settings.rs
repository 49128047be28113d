// Client settings
//
// Transport tuning shared by every device client. Layered with figment:
// serialized defaults, then `config.toml` in the nefila config directory,
// then `NEFILA_*` environment variables.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::ConfigError;
use crate::credentials::credentials_path;

/// Request timeout used when nothing else is configured.
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Settings {
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Accept any TLS certificate. Security Fabric appliances ship
    /// self-signed certificates, so this is on unless a CA is given.
    #[serde(default = "default_insecure")]
    pub insecure: bool,

    /// PEM file with a CA certificate to trust.
    pub ca_cert: Option<PathBuf>,

    /// Credential file location override.
    pub credentials: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout(),
            insecure: default_insecure(),
            ca_cert: None,
            credentials: None,
        }
    }
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}
fn default_insecure() -> bool {
    true
}

impl Settings {
    /// The credential file these settings point at.
    pub fn credentials_path(&self) -> PathBuf {
        self.credentials.clone().unwrap_or_else(credentials_path)
    }

    fn validate(self) -> Result<Self, ConfigError> {
        if self.timeout_secs == 0 {
            return Err(ConfigError::Validation {
                field: "timeout_secs".into(),
                reason: "must be greater than zero".into(),
            });
        }
        Ok(self)
    }
}

// ── Paths ───────────────────────────────────────────────────────────

/// The per-user nefila configuration directory.
pub fn config_dir() -> PathBuf {
    ProjectDirs::from("com", "nefila", "nefila").map_or_else(dirs_fallback, |dirs| {
        dirs.config_dir().to_path_buf()
    })
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("nefila");
    p
}

/// Location of the optional settings file.
pub fn settings_path() -> PathBuf {
    config_dir().join("config.toml")
}

// ── Loading ─────────────────────────────────────────────────────────

/// Load settings from the standard location plus environment.
pub fn load_settings() -> Result<Settings, ConfigError> {
    load_settings_from(&settings_path())
}

/// Load settings from `path` plus environment. A missing file is not an
/// error; the defaults apply.
pub fn load_settings_from(path: &Path) -> Result<Settings, ConfigError> {
    let settings: Settings = Figment::new()
        .merge(Serialized::defaults(Settings::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("NEFILA_"))
        .extract()?;
    settings.validate()
}
