// Authentication strategies
//
// Two handshakes cover every Security Fabric family:
// - form login that answers with a CSRF cookie, echoed back as a header
//   on state-changing requests;
// - a static bearer token, verified with one harmless GET.
// The session cookie itself lives in the client's jar.

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::{Method, RequestBuilder};
use secrecy::ExposeSecret;
use serde_json::{Map, Value};
use tracing::{debug, trace};
use url::Url;

use nefila_config::Credentials;

use crate::error::Error;
use crate::session::join_path;

/// How a form login sends its fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginEncoding {
    /// `application/x-www-form-urlencoded`
    Form,
    /// JSON object
    Json,
}

/// Parameters of a form login handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormLogin {
    pub login_path: &'static str,
    /// Endpoint POSTed on close, if the family has one.
    pub logout_path: Option<&'static str>,
    pub encoding: LoginEncoding,
    pub username_field: &'static str,
    pub password_field: &'static str,
    /// Cookie the device sets with the CSRF token on success.
    pub csrf_cookie: &'static str,
    /// Header that carries the token on later state-changing requests.
    pub csrf_header: &'static str,
}

/// Parameters of bearer-token authentication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BearerToken {
    /// GET endpoint used to confirm the token is accepted.
    pub verify_path: &'static str,
}

/// The login handshake used for a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthStrategy {
    FormCsrf(FormLogin),
    BearerToken(BearerToken),
}

/// What a successful handshake leaves behind for later requests.
#[derive(Debug, Clone)]
pub enum AuthArtifacts {
    Csrf {
        header: &'static str,
        token: String,
        logout_path: Option<&'static str>,
    },
    /// The bearer header is baked into the client's default headers.
    Bearer,
}

impl AuthStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            Self::FormCsrf(_) => "form-csrf",
            Self::BearerToken(_) => "bearer-token",
        }
    }

    /// Credential variant this strategy consumes.
    fn expects(&self) -> &'static str {
        match self {
            Self::FormCsrf(_) => "username/password",
            Self::BearerToken(_) => "token",
        }
    }

    fn wrong(&self, credentials: &Credentials) -> Error {
        Error::WrongAuthStrategy {
            expected: self.expects(),
            got: credentials.kind(),
        }
    }

    /// Headers that must be present on every request of the session.
    pub(crate) fn default_headers(&self, credentials: &Credentials) -> Result<HeaderMap, Error> {
        let mut headers = HeaderMap::new();
        match (self, credentials) {
            (Self::BearerToken(_), Credentials::Token { token }) => {
                let mut value = HeaderValue::from_str(&format!("Bearer {}", token.expose_secret()))
                    .map_err(|_| Error::CredentialsMalformed {
                        section: "token".into(),
                        reason: "token contains characters not allowed in a header".into(),
                    })?;
                value.set_sensitive(true);
                headers.insert(AUTHORIZATION, value);
            }
            (Self::FormCsrf(_), Credentials::UserPassword { .. }) => {}
            _ => return Err(self.wrong(credentials)),
        }
        Ok(headers)
    }

    /// Run the handshake over `http` and report the artifacts on success.
    pub(crate) async fn login(
        &self,
        http: &reqwest::Client,
        base_url: &Url,
        host: &str,
        credentials: &Credentials,
    ) -> Result<AuthArtifacts, Error> {
        match (self, credentials) {
            (Self::FormCsrf(form), Credentials::UserPassword { username, password }) => {
                form.login(http, base_url, host, username, password.expose_secret())
                    .await
            }
            (Self::BearerToken(bearer), Credentials::Token { .. }) => {
                bearer.verify(http, base_url, host).await
            }
            _ => Err(self.wrong(credentials)),
        }
    }
}

impl FormLogin {
    async fn login(
        &self,
        http: &reqwest::Client,
        base_url: &Url,
        host: &str,
        username: &str,
        password: &str,
    ) -> Result<AuthArtifacts, Error> {
        let url = join_path(base_url, self.login_path)?;
        debug!(host, username, "form login at {}", url);

        let request = http.post(url);
        let request = match self.encoding {
            LoginEncoding::Form => request.form(&[
                (self.username_field, username),
                (self.password_field, password),
            ]),
            LoginEncoding::Json => {
                let mut body = Map::new();
                body.insert(self.username_field.into(), Value::from(username));
                body.insert(self.password_field.into(), Value::from(password));
                request.json(&body)
            }
        };

        let resp = request
            .send()
            .await
            .map_err(|e| Error::connection(host, e))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(Error::authentication(
                host,
                format!("login rejected (HTTP {status})"),
            ));
        }

        let token = resp
            .cookies()
            .find(|c| c.name() == self.csrf_cookie)
            .map(|c| c.value().trim_matches('"').to_owned())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                Error::authentication(
                    host,
                    format!("login response carried no {} cookie", self.csrf_cookie),
                )
            })?;

        trace!(host, cookie = self.csrf_cookie, "captured CSRF token");
        Ok(AuthArtifacts::Csrf {
            header: self.csrf_header,
            token,
            logout_path: self.logout_path,
        })
    }
}

impl BearerToken {
    async fn verify(
        &self,
        http: &reqwest::Client,
        base_url: &Url,
        host: &str,
    ) -> Result<AuthArtifacts, Error> {
        let url = join_path(base_url, self.verify_path)?;
        debug!(host, "verifying API token at {}", url);

        let resp = http
            .get(url)
            .send()
            .await
            .map_err(|e| Error::connection(host, e))?;

        let status = resp.status();
        if status.is_success() {
            Ok(AuthArtifacts::Bearer)
        } else {
            Err(Error::authentication(
                host,
                format!("token rejected (HTTP {status})"),
            ))
        }
    }
}

impl AuthArtifacts {
    /// Attach the artifacts to an outgoing request.
    ///
    /// The CSRF header goes on state-changing methods only.
    pub(crate) fn apply(&self, method: &Method, builder: RequestBuilder) -> RequestBuilder {
        match self {
            Self::Csrf { header, token, .. } if is_state_changing(method) => {
                builder.header(*header, token)
            }
            Self::Csrf { .. } | Self::Bearer => builder,
        }
    }

    pub(crate) fn logout_path(&self) -> Option<&'static str> {
        match self {
            Self::Csrf { logout_path, .. } => *logout_path,
            Self::Bearer => None,
        }
    }
}

fn is_state_changing(method: &Method) -> bool {
    !matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::family::DeviceFamily;

    #[test]
    fn bearer_header_is_sensitive() {
        let strategy = AuthStrategy::BearerToken(BearerToken {
            verify_path: "/api/v2/monitor/system/status",
        });
        let headers = strategy
            .default_headers(&Credentials::token("ABC"))
            .unwrap();
        let value = headers.get(AUTHORIZATION).unwrap();
        assert_eq!(value.to_str().unwrap(), "Bearer ABC");
        assert!(value.is_sensitive());
    }

    #[test]
    fn form_login_needs_no_default_headers() {
        let strategy = DeviceFamily::FortiGate.strategy_for(&Credentials::user_password("a", "b"));
        let headers = strategy
            .default_headers(&Credentials::user_password("a", "b"))
            .unwrap();
        assert!(headers.is_empty());
    }

    #[test]
    fn mismatched_credentials_are_rejected() {
        let strategy = DeviceFamily::FortiGate.strategy_for(&Credentials::token("t"));
        match strategy.default_headers(&Credentials::user_password("a", "b")) {
            Err(Error::WrongAuthStrategy { expected, got }) => {
                assert_eq!(expected, "token");
                assert_eq!(got, "username/password");
            }
            other => panic!("expected WrongAuthStrategy, got {other:?}"),
        }
    }

    #[test]
    fn token_with_newline_is_malformed() {
        let strategy = DeviceFamily::FortiSwitch.strategy_for(&Credentials::token("x"));
        let err = strategy
            .default_headers(&Credentials::token("bad\ntoken"))
            .unwrap_err();
        assert!(matches!(err, Error::CredentialsMalformed { .. }));
    }

    #[test]
    fn csrf_header_only_on_state_changing_methods() {
        assert!(is_state_changing(&Method::POST));
        assert!(is_state_changing(&Method::PUT));
        assert!(is_state_changing(&Method::DELETE));
        assert!(!is_state_changing(&Method::GET));
    }
}
