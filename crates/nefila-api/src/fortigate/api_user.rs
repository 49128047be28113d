// FortiGate REST API administrators
//
// `cmdb/system/api-user` objects plus access-key generation.

use secrecy::SecretString;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tracing::debug;

use super::{API_V2, FortiGate, encode_name};
use crate::error::Error;

/// Name used when none is given.
pub const DEFAULT_API_USER: &str = "nefila-api-admin";

const DEFAULT_PROFILE: &str = "super_admin";
const DEFAULT_TRUSTHOST: &str = "192.168.0.0/16";

/// Handle on one API user of a FortiGate.
#[derive(Debug, Clone, Copy)]
pub struct ApiUser<'a> {
    fortigate: &'a FortiGate,
    name: &'a str,
}

#[derive(Deserialize)]
struct GeneratedKey {
    results: GeneratedKeyResults,
}

#[derive(Deserialize)]
struct GeneratedKeyResults {
    access_token: String,
}

impl FortiGate {
    /// Handle on the default API user, `nefila-api-admin`.
    pub fn api_user(&self) -> ApiUser<'_> {
        self.api_user_named(DEFAULT_API_USER)
    }

    pub fn api_user_named<'a>(&'a self, name: &'a str) -> ApiUser<'a> {
        ApiUser {
            fortigate: self,
            name,
        }
    }
}

impl ApiUser<'_> {
    pub fn name(&self) -> &str {
        self.name
    }

    fn object_path(&self) -> String {
        format!("{API_V2}/cmdb/system/api-user/{}", encode_name(self.name))
    }

    /// All API users.
    ///
    /// `GET /api/v2/cmdb/system/api-user`
    pub async fn list(&self) -> Result<Map<String, Value>, Error> {
        self.fortigate.get("cmdb/system/api-user").await
    }

    /// `GET /api/v2/cmdb/system/api-user/{name}`
    pub async fn get(&self) -> Result<Map<String, Value>, Error> {
        self.fortigate.client().get_json(&self.object_path()).await
    }

    /// Create the user with the default profile and trusted host, then
    /// generate its access key.
    pub async fn create_default(&self) -> Result<SecretString, Error> {
        self.create(DEFAULT_PROFILE, DEFAULT_TRUSTHOST).await
    }

    /// Create the user and generate an access key for it.
    ///
    /// `POST /api/v2/cmdb/system/api-user`, then
    /// `POST /api/v2/monitor/system/api-user/generate-key`.
    pub async fn create(&self, accprofile: &str, ipv4_trusthost: &str) -> Result<SecretString, Error> {
        debug!(name = self.name, accprofile, "creating API user");
        let body = json!({
            "name": self.name,
            "accprofile": accprofile,
            "trusthost": [{
                "id": 0,
                "type": "ipv4-trusthost",
                "ipv4-trusthost": ipv4_trusthost,
            }],
        });
        let client = self.fortigate.client();
        let _: Map<String, Value> = client
            .post_json(&format!("{API_V2}/cmdb/system/api-user"), &body)
            .await?;

        debug!(name = self.name, "generating API key");
        let key: GeneratedKey = client
            .post_json(
                &format!("{API_V2}/monitor/system/api-user/generate-key"),
                &json!({ "api-user": self.name }),
            )
            .await?;
        Ok(SecretString::from(key.results.access_token))
    }

    /// `DELETE /api/v2/cmdb/system/api-user/{name}`
    pub async fn delete(&self) -> Result<Map<String, Value>, Error> {
        debug!(name = self.name, "deleting API user");
        self.fortigate.client().delete_json(&self.object_path()).await
    }
}
