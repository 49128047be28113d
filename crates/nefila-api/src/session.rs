// Authenticated HTTP session with one device
//
// A session starts closed. `open` builds a fresh `reqwest::Client` (own
// cookie jar, auth headers) and runs the strategy's handshake; only a
// successful handshake moves it to `Open`. `close` drops the client, so no
// cookie or token of a closed session survives. Every request helper fails
// with `SessionNotOpen` before touching the network when not open.

use std::sync::Arc;
use std::time::Duration;

use reqwest::cookie::Jar;
use reqwest::multipart::Form;
use reqwest::{Method, RequestBuilder};
use serde::Serialize;
use tracing::{debug, warn};
use url::Url;

use nefila_config::Credentials;

use crate::auth::{AuthArtifacts, AuthStrategy};
use crate::error::Error;
use crate::transport::TransportConfig;

struct LiveSession {
    http: reqwest::Client,
    artifacts: AuthArtifacts,
}

enum SessionState {
    Closed,
    Open(LiveSession),
}

/// Transport state for one device: base URL, HTTP client and auth artifacts.
pub struct Session {
    host: String,
    base_url: Url,
    transport: TransportConfig,
    state: SessionState,
}

impl Session {
    /// Create an unauthenticated session for `host`, reached at `base_url`.
    pub fn new(host: impl Into<String>, base_url: Url, transport: TransportConfig) -> Self {
        Self {
            host: host.into(),
            base_url,
            transport,
            state: SessionState::Closed,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn is_open(&self) -> bool {
        matches!(self.state, SessionState::Open(_))
    }

    // ── Lifecycle ─────────────────────────────────────────────────────

    /// Authenticate with `strategy` and `credentials`.
    ///
    /// A live session is closed first (including its logout), so a failed
    /// re-open leaves the session closed.
    pub async fn open(
        &mut self,
        strategy: &AuthStrategy,
        credentials: &Credentials,
    ) -> Result<(), Error> {
        self.close().await;

        let headers = strategy.default_headers(credentials)?;
        let jar = Arc::new(Jar::default());
        let http = self.transport.build_client(jar, headers)?;

        debug!(host = %self.host, strategy = strategy.name(), "opening session");
        let artifacts = strategy
            .login(&http, &self.base_url, &self.host, credentials)
            .await?;

        self.state = SessionState::Open(LiveSession { http, artifacts });
        debug!(host = %self.host, "session authenticated");
        Ok(())
    }

    /// End the session and drop its transport state.
    ///
    /// Idempotent. Form-login sessions POST the family's logout endpoint
    /// first; a failed logout is logged, not returned.
    pub async fn close(&mut self) {
        let SessionState::Open(live) = std::mem::replace(&mut self.state, SessionState::Closed)
        else {
            return;
        };

        if let Some(path) = live.artifacts.logout_path() {
            match self.logout(&live, path).await {
                Ok(()) => debug!(host = %self.host, "logout complete"),
                Err(e) => warn!(host = %self.host, error = %e, "logout failed (non-fatal)"),
            }
        }
        debug!(host = %self.host, "session closed");
    }

    async fn logout(&self, live: &LiveSession, path: &str) -> Result<(), Error> {
        let url = join_path(&self.base_url, path)?;
        debug!("logging out at {}", url);
        let builder = live.artifacts.apply(&Method::POST, live.http.post(url));
        let resp = builder
            .send()
            .await
            .map_err(|e| Error::connection(&self.host, e))?;
        if resp.status().is_success() {
            Ok(())
        } else {
            Err(Error::RequestFailed {
                status: resp.status().as_u16(),
                url: resp.url().to_string(),
                message: "logout rejected".into(),
            })
        }
    }

    // ── Request helpers ───────────────────────────────────────────────

    fn live(&self) -> Result<&LiveSession, Error> {
        match &self.state {
            SessionState::Open(live) => Ok(live),
            SessionState::Closed => Err(Error::SessionNotOpen {
                host: self.host.clone(),
            }),
        }
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, Error> {
        let live = self.live()?;
        let url = join_path(&self.base_url, path)?;
        debug!("{method} {url}");
        let builder = live.http.request(method.clone(), url);
        Ok(live.artifacts.apply(&method, builder))
    }

    async fn send(&self, builder: RequestBuilder) -> Result<reqwest::Response, Error> {
        builder
            .send()
            .await
            .map_err(|e| Error::connection(&self.host, e))
    }

    /// Send a GET request. The response is returned whatever its status.
    pub async fn get(&self, path: &str) -> Result<reqwest::Response, Error> {
        let builder = self.request(Method::GET, path)?;
        self.send(builder).await
    }

    /// Send a POST request with a JSON body.
    pub async fn post(
        &self,
        path: &str,
        body: &(impl Serialize + Sync),
    ) -> Result<reqwest::Response, Error> {
        let builder = self.request(Method::POST, path)?.json(body);
        self.send(builder).await
    }

    /// POST with a per-request timeout overriding the transport default.
    pub async fn post_with_timeout(
        &self,
        path: &str,
        body: &(impl Serialize + Sync),
        timeout: Duration,
    ) -> Result<reqwest::Response, Error> {
        let builder = self.request(Method::POST, path)?.json(body).timeout(timeout);
        self.send(builder).await
    }

    /// POST a multipart form with a per-request timeout.
    pub async fn post_multipart(
        &self,
        path: &str,
        form: Form,
        timeout: Duration,
    ) -> Result<reqwest::Response, Error> {
        let builder = self
            .request(Method::POST, path)?
            .multipart(form)
            .timeout(timeout);
        self.send(builder).await
    }

    /// Send a PUT request with a JSON body.
    pub async fn put(
        &self,
        path: &str,
        body: &(impl Serialize + Sync),
    ) -> Result<reqwest::Response, Error> {
        let builder = self.request(Method::PUT, path)?.json(body);
        self.send(builder).await
    }

    /// Send a DELETE request.
    pub async fn delete(&self, path: &str) -> Result<reqwest::Response, Error> {
        let builder = self.request(Method::DELETE, path)?;
        self.send(builder).await
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("host", &self.host)
            .field("base_url", &self.base_url.as_str())
            .field("open", &self.is_open())
            .finish_non_exhaustive()
    }
}

/// Append an absolute API path to the device base URL, keeping any path
/// prefix the base URL already has.
pub(crate) fn join_path(base_url: &Url, path: &str) -> Result<Url, Error> {
    let base = base_url.as_str().trim_end_matches('/');
    let path = path.trim_start_matches('/');
    Ok(Url::parse(&format!("{base}/{path}"))?)
}
