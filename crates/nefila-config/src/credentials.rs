// Credential file parsing and per-host resolution
//
// The file is a section-based `key = value` text format:
//
//     [DEFAULT]
//     token = 0123abcd
//
//     [10.0.0.5]
//     username = admin
//     password = s3cret
//
// Precedence is explicit arguments > host section > DEFAULT section > failure.
// DEFAULT values are never merged into a host section.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, trace};

use crate::ConfigError;
use crate::settings::config_dir;

/// Name of the fallback section, matched case-insensitively in headers.
pub const DEFAULT_SECTION: &str = "DEFAULT";

/// Environment variable overriding the credential file location.
const CREDENTIALS_ENV: &str = "NEFILA_CREDENTIALS";

/// Label used in errors for credentials passed at the call site.
const EXPLICIT_SECTION: &str = "explicit";

// ── Credentials ─────────────────────────────────────────────────────

/// Resolved credentials for one device.
///
/// The two variants are mutually exclusive; a value never changes after it
/// has been resolved.
#[derive(Debug, Clone)]
pub enum Credentials {
    /// Username/password for a form login.
    UserPassword {
        username: String,
        password: SecretString,
    },
    /// Static API token, sent as a bearer header.
    Token { token: SecretString },
}

impl Credentials {
    pub fn user_password(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::UserPassword {
            username: username.into(),
            password: SecretString::from(password.into()),
        }
    }

    pub fn token(token: impl Into<String>) -> Self {
        Self::Token {
            token: SecretString::from(token.into()),
        }
    }

    /// Assemble credentials from loose call-site arguments.
    ///
    /// Returns `Ok(None)` when nothing was supplied, meaning the credential
    /// file should be consulted. A token takes precedence over a
    /// username/password pair; half a pair is rejected.
    pub fn from_parts(
        username: Option<String>,
        password: Option<SecretString>,
        token: Option<SecretString>,
    ) -> Result<Option<Self>, ConfigError> {
        let nothing = username.as_deref().is_none_or(str::is_empty)
            && password
                .as_ref()
                .is_none_or(|p| p.expose_secret().is_empty())
            && token.as_ref().is_none_or(|t| t.expose_secret().is_empty());
        if nothing {
            return Ok(None);
        }

        CredentialSection {
            username,
            password,
            token,
        }
        .credentials(EXPLICIT_SECTION)
        .map(Some)
    }

    /// Short human label for the variant, safe to log.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UserPassword { .. } => "username/password",
            Self::Token { .. } => "token",
        }
    }

    /// The username, when this is a form-login credential.
    pub fn username(&self) -> Option<&str> {
        match self {
            Self::UserPassword { username, .. } => Some(username),
            Self::Token { .. } => None,
        }
    }
}

// ── Sections ────────────────────────────────────────────────────────

/// Raw keys of one section. Unknown keys are dropped while parsing.
#[derive(Debug, Clone, Default)]
pub struct CredentialSection {
    pub username: Option<String>,
    pub password: Option<SecretString>,
    pub token: Option<SecretString>,
}

impl CredentialSection {
    /// Turn the raw keys into a credential variant.
    ///
    /// Empty values count as missing. A token wins over a username/password
    /// pair when both are present.
    pub fn credentials(&self, section: &str) -> Result<Credentials, ConfigError> {
        let malformed = |reason: &str| ConfigError::CredentialsMalformed {
            section: section.to_owned(),
            reason: reason.to_owned(),
        };

        if let Some(token) = self.token.as_ref().filter(|t| !t.expose_secret().is_empty()) {
            return Ok(Credentials::Token {
                token: token.clone(),
            });
        }

        let username = self.username.as_deref().filter(|u| !u.is_empty());
        let password = self
            .password
            .as_ref()
            .filter(|p| !p.expose_secret().is_empty());

        match (username, password) {
            (Some(username), Some(password)) => Ok(Credentials::UserPassword {
                username: username.to_owned(),
                password: password.clone(),
            }),
            (Some(_), None) => Err(malformed("username given without a password")),
            (None, Some(_)) => Err(malformed("password given without a username")),
            (None, None) => Err(malformed("needs either a token or a username and password")),
        }
    }

    fn set(&mut self, key: &str, value: &str) {
        match key {
            "username" => self.username = Some(value.to_owned()),
            "password" => self.password = Some(SecretString::from(value.to_owned())),
            "token" => self.token = Some(SecretString::from(value.to_owned())),
            other => trace!(key = other, "ignoring unknown credential key"),
        }
    }
}

// ── Parsed file ─────────────────────────────────────────────────────

/// The parsed credential file: host sections plus an optional `DEFAULT`.
#[derive(Debug, Clone, Default)]
pub struct CredentialConfig {
    default: Option<CredentialSection>,
    hosts: HashMap<String, CredentialSection>,
}

impl CredentialConfig {
    /// Parse the credential file format.
    ///
    /// Lines are `[section]` headers, `key = value` (or `key: value`) pairs,
    /// blank lines, or comments starting with `#` / `;`. Keys are
    /// case-insensitive. Repeated sections merge; later keys win.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let mut current: Option<String> = None;

        for (idx, raw) in text.lines().enumerate() {
            let lineno = idx + 1;
            let line = raw.trim();

            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }

            if let Some(rest) = line.strip_prefix('[') {
                let name = rest
                    .strip_suffix(']')
                    .map(str::trim)
                    .filter(|n| !n.is_empty())
                    .ok_or_else(|| ConfigError::CredentialsMalformed {
                        section: current.clone().unwrap_or_default(),
                        reason: format!("line {lineno}: malformed section header {line:?}"),
                    })?;

                let name = if name.eq_ignore_ascii_case(DEFAULT_SECTION) {
                    DEFAULT_SECTION.to_owned()
                } else {
                    name.to_owned()
                };
                current = Some(name);
                continue;
            }

            let Some(section) = current.as_deref() else {
                return Err(ConfigError::CredentialsMalformed {
                    section: String::new(),
                    reason: format!("line {lineno}: key outside of any section"),
                });
            };

            let Some(split) = line.find(['=', ':']) else {
                return Err(ConfigError::CredentialsMalformed {
                    section: section.to_owned(),
                    reason: format!("line {lineno}: expected `key = value`"),
                });
            };

            let key = line[..split].trim().to_ascii_lowercase();
            let value = line[split + 1..].trim();

            if key.is_empty() {
                return Err(ConfigError::CredentialsMalformed {
                    section: section.to_owned(),
                    reason: format!("line {lineno}: empty key"),
                });
            }

            config.section_mut(section).set(&key, value);
        }

        Ok(config)
    }

    fn section_mut(&mut self, name: &str) -> &mut CredentialSection {
        if name == DEFAULT_SECTION {
            self.default.get_or_insert_with(CredentialSection::default)
        } else {
            self.hosts.entry(name.to_owned()).or_default()
        }
    }

    /// The section for exactly this host, if any.
    pub fn host(&self, host: &str) -> Option<&CredentialSection> {
        self.hosts.get(host)
    }

    /// The `DEFAULT` section, if any.
    pub fn default_section(&self) -> Option<&CredentialSection> {
        self.default.as_ref()
    }

    /// Resolve the credentials for `host` from this file alone.
    pub fn lookup(&self, host: &str) -> Result<Credentials, ConfigError> {
        let (name, section) =
            select_section(self, host).ok_or_else(|| ConfigError::CredentialsMissing {
                host: host.to_owned(),
            })?;
        debug!(host, section = name, "selected credential section");
        section.credentials(name)
    }
}

impl FromStr for CredentialConfig {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Pick the section used for `host`: the exact host section, else `DEFAULT`.
///
/// Returns the section name alongside it. Host matching is byte-exact; no
/// DNS or address normalization happens here.
pub fn select_section<'a>(
    config: &'a CredentialConfig,
    host: &str,
) -> Option<(&'a str, &'a CredentialSection)> {
    if let Some((name, section)) = config.hosts.get_key_value(host) {
        return Some((name.as_str(), section));
    }
    config
        .default
        .as_ref()
        .map(|section| (DEFAULT_SECTION, section))
}

// ── Store ───────────────────────────────────────────────────────────

/// Reads the credential file at an injectable path and resolves per-host
/// credentials from it.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at the standard per-user location (see [`credentials_path`]).
    pub fn from_default_location() -> Self {
        Self::new(credentials_path())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read and parse the credential file.
    pub fn load(&self) -> Result<CredentialConfig, ConfigError> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ConfigError::ConfigNotFound {
                    path: self.path.clone(),
                });
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };
        debug!(path = %self.path.display(), "loaded credential file");
        CredentialConfig::parse(&text)
    }

    /// Resolve the effective credentials for `host`.
    ///
    /// Explicit credentials are returned unchanged and the file is not
    /// touched. Otherwise the host section is used, then `DEFAULT`.
    pub fn resolve(
        &self,
        host: &str,
        explicit: Option<Credentials>,
    ) -> Result<Credentials, ConfigError> {
        if let Some(credentials) = explicit {
            debug!(host, kind = credentials.kind(), "using explicit credentials");
            return Ok(credentials);
        }
        self.load()?.lookup(host)
    }
}

impl Default for CredentialStore {
    fn default() -> Self {
        Self::from_default_location()
    }
}

/// Resolve the credential file path.
///
/// `NEFILA_CREDENTIALS` wins; otherwise `credentials` inside the platform
/// config directory.
pub fn credentials_path() -> PathBuf {
    std::env::var_os(CREDENTIALS_ENV)
        .filter(|v| !v.is_empty())
        .map_or_else(|| config_dir().join("credentials"), PathBuf::from)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn token_of(creds: &Credentials) -> &str {
        match creds {
            Credentials::Token { token } => token.expose_secret(),
            Credentials::UserPassword { .. } => panic!("expected token, got {creds:?}"),
        }
    }

    fn pair_of(creds: &Credentials) -> (&str, &str) {
        match creds {
            Credentials::UserPassword { username, password } => {
                (username.as_str(), password.expose_secret())
            }
            Credentials::Token { .. } => panic!("expected username/password, got {creds:?}"),
        }
    }

    #[test]
    fn parses_sections_and_keys() {
        let config = CredentialConfig::parse(
            "# fabric lab\n\
             [DEFAULT]\n\
             token = ABC\n\
             \n\
             [10.0.0.5]\n\
             username = admin\n\
             password: hunter2\n",
        )
        .unwrap();

        assert_eq!(token_of(&config.lookup("10.0.0.9").unwrap()), "ABC");
        assert_eq!(
            pair_of(&config.lookup("10.0.0.5").unwrap()),
            ("admin", "hunter2")
        );
    }

    #[test]
    fn default_header_is_case_and_whitespace_tolerant() {
        let config = CredentialConfig::parse("  [ default ]  \n  TOKEN = xyz  \n").unwrap();
        assert_eq!(token_of(&config.lookup("fw1").unwrap()), "xyz");
    }

    #[test]
    fn host_headers_are_trimmed_but_exact() {
        let config = CredentialConfig::parse("[ FW1.lab ]\ntoken = t\n").unwrap();
        assert!(config.host("FW1.lab").is_some());
        assert!(config.host("fw1.lab").is_none());
        assert!(matches!(
            config.lookup("fw1.lab"),
            Err(ConfigError::CredentialsMissing { .. })
        ));
    }

    #[test]
    fn value_keeps_separators_after_the_first() {
        let config = CredentialConfig::parse("[fw]\nusername=a\npassword = p=a:ss\n").unwrap();
        assert_eq!(pair_of(&config.lookup("fw").unwrap()), ("a", "p=a:ss"));
    }

    #[test]
    fn repeated_sections_merge() {
        let config =
            CredentialConfig::parse("[fw]\nusername = a\n[other]\ntoken = t\n[fw]\npassword = b\n")
                .unwrap();
        assert_eq!(pair_of(&config.lookup("fw").unwrap()), ("a", "b"));
    }

    #[test]
    fn token_wins_over_pair() {
        let config =
            CredentialConfig::parse("[fw]\nusername = a\npassword = b\ntoken = t\n").unwrap();
        assert_eq!(token_of(&config.lookup("fw").unwrap()), "t");
    }

    #[test]
    fn host_section_is_not_merged_with_default() {
        let config =
            CredentialConfig::parse("[DEFAULT]\npassword = fallback\n[fw]\nusername = a\n")
                .unwrap();
        match config.lookup("fw") {
            Err(ConfigError::CredentialsMalformed { section, .. }) => assert_eq!(section, "fw"),
            other => panic!("expected CredentialsMalformed, got {other:?}"),
        }
    }

    #[test]
    fn section_without_credentials_is_malformed() {
        let config = CredentialConfig::parse("[fw]\ncomment = nothing here\n").unwrap();
        assert!(matches!(
            config.lookup("fw"),
            Err(ConfigError::CredentialsMalformed { .. })
        ));
    }

    #[test]
    fn empty_values_count_as_missing() {
        let config = CredentialConfig::parse("[fw]\ntoken =\nusername = a\npassword = b\n").unwrap();
        assert_eq!(pair_of(&config.lookup("fw").unwrap()), ("a", "b"));
    }

    #[test]
    fn missing_without_default() {
        let config = CredentialConfig::parse("[fw]\ntoken = t\n").unwrap();
        match config.lookup("10.1.1.1") {
            Err(ConfigError::CredentialsMissing { host }) => assert_eq!(host, "10.1.1.1"),
            other => panic!("expected CredentialsMissing, got {other:?}"),
        }
    }

    #[test]
    fn rejects_key_outside_section() {
        let err = CredentialConfig::parse("token = t\n").unwrap_err();
        assert!(matches!(err, ConfigError::CredentialsMalformed { .. }));
    }

    #[test]
    fn rejects_broken_header() {
        let err = CredentialConfig::parse("[fw\ntoken = t\n").unwrap_err();
        match err {
            ConfigError::CredentialsMalformed { reason, .. } => assert!(reason.contains("line 1")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn rejects_line_without_separator() {
        let err = CredentialConfig::parse("[fw]\njust-a-word\n").unwrap_err();
        match err {
            ConfigError::CredentialsMalformed { section, reason } => {
                assert_eq!(section, "fw");
                assert!(reason.contains("line 2"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn select_prefers_host_over_default() {
        let config = CredentialConfig::parse("[DEFAULT]\ntoken = d\n[fw]\ntoken = h\n").unwrap();
        let (name, _) = select_section(&config, "fw").unwrap();
        assert_eq!(name, "fw");
        let (name, _) = select_section(&config, "elsewhere").unwrap();
        assert_eq!(name, DEFAULT_SECTION);
    }

    #[test]
    fn select_without_any_match() {
        let config = CredentialConfig::default();
        assert!(select_section(&config, "fw").is_none());
    }

    #[test]
    fn from_parts_nothing_means_file_lookup() {
        assert!(Credentials::from_parts(None, None, None).unwrap().is_none());
    }

    #[test]
    fn from_parts_token() {
        let creds = Credentials::from_parts(None, None, Some("t".to_owned().into()))
            .unwrap()
            .unwrap();
        assert_eq!(creds.kind(), "token");
    }

    #[test]
    fn from_parts_pair() {
        let creds = Credentials::from_parts(Some("admin".into()), Some("pw".to_owned().into()), None)
            .unwrap()
            .unwrap();
        assert_eq!(creds.username(), Some("admin"));
    }

    #[test]
    fn from_parts_half_pair_is_malformed() {
        let err = Credentials::from_parts(Some("admin".into()), None, None).unwrap_err();
        match err {
            ConfigError::CredentialsMalformed { section, .. } => assert_eq!(section, "explicit"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let creds = Credentials::user_password("admin", "hunter2");
        let rendered = format!("{creds:?}");
        assert!(!rendered.contains("hunter2"));
    }
}
