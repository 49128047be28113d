// Device client
//
// Composes credential resolution, the family's auth strategy and one
// `Session`. Response handling (status check, JSON decoding) lives here;
// the session hands back raw responses.

use std::path::PathBuf;
use std::time::Duration;

use reqwest::multipart::Form;
use secrecy::SecretString;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::{debug, warn};
use url::Url;

use nefila_config::{CredentialStore, Credentials, Settings};

use crate::error::Error;
use crate::family::DeviceFamily;
use crate::session::Session;
use crate::transport::TransportConfig;

/// Client for one Security Fabric device.
///
/// Not shareable across hosts. `open` and `close` take `&mut self`, so a
/// client cannot be opened concurrently.
#[derive(Debug)]
pub struct DeviceClient {
    family: DeviceFamily,
    host: String,
    explicit: Option<Credentials>,
    store: CredentialStore,
    session: Session,
    credentials: Option<Credentials>,
}

impl DeviceClient {
    pub fn builder(family: DeviceFamily, host: impl Into<String>) -> DeviceClientBuilder {
        DeviceClientBuilder::new(family, host)
    }

    /// Client for `host` using the credential file for authentication.
    pub fn new(family: DeviceFamily, host: impl Into<String>) -> Result<Self, Error> {
        Self::builder(family, host).build()
    }

    pub fn family(&self) -> DeviceFamily {
        self.family
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn is_open(&self) -> bool {
        self.session.is_open()
    }

    /// Credentials used by the last successful `open`.
    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    // ── Lifecycle ─────────────────────────────────────────────────────

    /// Resolve credentials and authenticate.
    ///
    /// Calling it again re-authenticates from scratch: the live session is
    /// closed before credentials are resolved, so any failure leaves the
    /// client closed.
    pub async fn open(&mut self) -> Result<(), Error> {
        debug!(host = %self.host, family = %self.family, "opening device client");
        self.credentials = None;
        self.session.close().await;

        let credentials = self
            .store
            .resolve(&self.host, self.explicit.clone())
            .inspect_err(|e| warn!(host = %self.host, error = %e, "credential resolution failed"))?;

        let strategy = self.family.strategy_for(&credentials);
        self.session
            .open(&strategy, &credentials)
            .await
            .inspect_err(|e| {
                warn!(
                    host = %self.host,
                    family = %self.family,
                    strategy = strategy.name(),
                    error = %e,
                    "authentication failed"
                );
            })?;

        self.credentials = Some(credentials);
        Ok(())
    }

    /// Close the session. Idempotent.
    pub async fn close(&mut self) {
        self.session.close().await;
    }

    // ── Resources ─────────────────────────────────────────────────────

    /// The device status document, exactly as the device serialized it.
    pub async fn status(&self) -> Result<Map<String, Value>, Error> {
        debug!(host = %self.host, family = %self.family, "fetching status");
        self.get_json(self.family.status_path()).await
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, Error> {
        let resp = self.session.get(path).await?;
        self.handle_response(resp).await
    }

    pub async fn post_json<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &(impl Serialize + Sync),
    ) -> Result<T, Error> {
        let resp = self.session.post(path, body).await?;
        self.handle_response(resp).await
    }

    pub async fn post_json_with_timeout<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &(impl Serialize + Sync),
        timeout: Duration,
    ) -> Result<T, Error> {
        let resp = self.session.post_with_timeout(path, body, timeout).await?;
        self.handle_response(resp).await
    }

    pub async fn post_multipart_json<T: DeserializeOwned>(
        &self,
        path: &str,
        form: Form,
        timeout: Duration,
    ) -> Result<T, Error> {
        let resp = self.session.post_multipart(path, form, timeout).await?;
        self.handle_response(resp).await
    }

    pub async fn put_json<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &(impl Serialize + Sync),
    ) -> Result<T, Error> {
        let resp = self.session.put(path, body).await?;
        self.handle_response(resp).await
    }

    pub async fn delete_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, Error> {
        let resp = self.session.delete(path).await?;
        self.handle_response(resp).await
    }

    // ── Response handling ─────────────────────────────────────────────

    async fn handle_response<T: DeserializeOwned>(
        &self,
        resp: reqwest::Response,
    ) -> Result<T, Error> {
        let status = resp.status();
        let url = resp.url().to_string();
        let body = resp
            .text()
            .await
            .map_err(|e| Error::connection(&self.host, e))?;

        if !status.is_success() {
            return Err(Error::RequestFailed {
                status: status.as_u16(),
                url,
                message: if body.is_empty() {
                    status.to_string()
                } else {
                    preview(&body)
                },
            });
        }

        serde_json::from_str(&body).map_err(|e| Error::ResponseMalformed {
            message: format!("{e} (body preview: {:?})", preview(&body)),
            body,
        })
    }
}

fn preview(body: &str) -> String {
    body.chars().take(200).collect()
}

// ── Builder ─────────────────────────────────────────────────────────

/// Builder for [`DeviceClient`].
///
/// Leaving username, password and token unset makes `open` consult the
/// credential file.
#[derive(Debug)]
pub struct DeviceClientBuilder {
    family: DeviceFamily,
    host: String,
    username: Option<String>,
    password: Option<SecretString>,
    token: Option<SecretString>,
    credentials_path: Option<PathBuf>,
    base_url: Option<String>,
    transport: Option<TransportConfig>,
    settings: Settings,
}

impl DeviceClientBuilder {
    pub fn new(family: DeviceFamily, host: impl Into<String>) -> Self {
        Self {
            family,
            host: host.into(),
            username: None,
            password: None,
            token: None,
            credentials_path: None,
            base_url: None,
            transport: None,
            settings: Settings::default(),
        }
    }

    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(SecretString::from(password.into()));
        self
    }

    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(SecretString::from(token.into()));
        self
    }

    /// Read credentials from this file instead of the standard location.
    pub fn credentials_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.credentials_path = Some(path.into());
        self
    }

    /// Reach the device at this URL instead of `https://{host}`.
    ///
    /// The host string is still the credential lookup key.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Use this transport instead of the one derived from settings.
    pub fn transport(mut self, transport: TransportConfig) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    pub fn family(&self) -> DeviceFamily {
        self.family
    }

    pub fn build(self) -> Result<DeviceClient, Error> {
        let explicit = Credentials::from_parts(self.username, self.password, self.token)?;

        let raw_url = self
            .base_url
            .unwrap_or_else(|| format!("https://{}", self.host));
        let base_url = Url::parse(&raw_url)?;

        let transport = self
            .transport
            .unwrap_or_else(|| TransportConfig::from_settings(&self.settings));
        let store = CredentialStore::new(
            self.credentials_path
                .unwrap_or_else(|| self.settings.credentials_path()),
        );

        Ok(DeviceClient {
            family: self.family,
            session: Session::new(self.host.clone(), base_url, transport),
            host: self.host,
            explicit,
            store,
            credentials: None,
        })
    }
}
