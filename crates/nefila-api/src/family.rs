use nefila_config::Credentials;
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

use crate::auth::{AuthStrategy, BearerToken, FormLogin, LoginEncoding};

/// The Security Fabric product family of a device.
///
/// Fixes login paths, payload shape, CSRF artifacts and the status endpoint.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, IntoStaticStr,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum DeviceFamily {
    FortiGate,
    FortiAnalyzer,
    FortiManager,
    FortiTester,
    FortiSwitch,
}

const FORTIOS_LOGIN: FormLogin = FormLogin {
    login_path: "/logincheck",
    logout_path: Some("/logout"),
    encoding: LoginEncoding::Form,
    username_field: "username",
    password_field: "secretkey",
    csrf_cookie: "ccsrftoken",
    csrf_header: "X-CSRFTOKEN",
};

const FLATUI_LOGIN: FormLogin = FormLogin {
    login_path: "/cgi-bin/module/flatui_auth",
    logout_path: Some("/p/logout-api/"),
    encoding: LoginEncoding::Json,
    username_field: "username",
    password_field: "secretkey",
    csrf_cookie: "HTTP_CSRF_TOKEN",
    csrf_header: "X-CSRFToken",
};

const FORTITESTER_LOGIN: FormLogin = FormLogin {
    login_path: "/api/user/login",
    logout_path: Some("/api/user/logout"),
    encoding: LoginEncoding::Json,
    username_field: "name",
    password_field: "password",
    csrf_cookie: "csrftoken",
    csrf_header: "X-CSRFToken",
};

impl DeviceFamily {
    /// Form login parameters.
    pub fn form_login(self) -> FormLogin {
        match self {
            Self::FortiGate | Self::FortiSwitch => FORTIOS_LOGIN,
            Self::FortiAnalyzer | Self::FortiManager => FLATUI_LOGIN,
            Self::FortiTester => FORTITESTER_LOGIN,
        }
    }

    /// Endpoint returning the device status document.
    ///
    /// Also used to verify bearer tokens.
    pub fn status_path(self) -> &'static str {
        match self {
            Self::FortiGate | Self::FortiSwitch => "/api/v2/monitor/system/status",
            Self::FortiAnalyzer | Self::FortiManager => "/cgi-bin/module/flatui/sys/status",
            Self::FortiTester => "/api/system/info",
        }
    }

    /// The strategy used with `credentials` for this family.
    ///
    /// Tokens authenticate with a bearer header, username/password pairs
    /// with the family's form login. Nothing is negotiated with the device.
    pub fn strategy_for(self, credentials: &Credentials) -> AuthStrategy {
        match credentials {
            Credentials::Token { .. } => AuthStrategy::BearerToken(BearerToken {
                verify_path: self.status_path(),
            }),
            Credentials::UserPassword { .. } => AuthStrategy::FormCsrf(self.form_login()),
        }
    }
}
