// FortiGate REST API (FortiOS `/api/v2`)
//
// Thin wrappers over `DeviceClient`: each resource fires one request against
// a fixed endpoint and returns the decoded JSON. Endpoint groups live in
// separate files as inherent methods / borrowed handles.

pub mod api_user;
pub mod dns;
pub mod firmware;
pub mod system;

use serde_json::{Map, Value};

use crate::client::{DeviceClient, DeviceClientBuilder};
use crate::error::Error;
use crate::family::DeviceFamily;

pub use api_user::{ApiUser, DEFAULT_API_USER};
pub use dns::DnsDatabase;
pub use firmware::Firmware;
pub use system::StatusSummary;

/// Prefix of every FortiOS REST endpoint.
pub(crate) const API_V2: &str = "/api/v2";

/// Client for a FortiGate firewall.
#[derive(Debug)]
pub struct FortiGate {
    client: DeviceClient,
}

impl FortiGate {
    /// FortiGate at `host`, authenticated from the credential file.
    pub fn new(host: impl Into<String>) -> Result<Self, Error> {
        Self::builder(host).build().map(|client| Self { client })
    }

    pub fn builder(host: impl Into<String>) -> DeviceClientBuilder {
        DeviceClient::builder(DeviceFamily::FortiGate, host)
    }

    pub fn client(&self) -> &DeviceClient {
        &self.client
    }

    pub fn host(&self) -> &str {
        self.client.host()
    }

    pub fn is_open(&self) -> bool {
        self.client.is_open()
    }

    pub async fn open(&mut self) -> Result<(), Error> {
        self.client.open().await
    }

    pub async fn close(&mut self) {
        self.client.close().await;
    }

    /// `GET /api/v2/monitor/system/status`
    pub async fn status(&self) -> Result<Map<String, Value>, Error> {
        self.client.status().await
    }

    pub(crate) async fn get(&self, path: &str) -> Result<Map<String, Value>, Error> {
        self.client.get_json(&format!("{API_V2}/{path}")).await
    }
}

impl TryFrom<DeviceClient> for FortiGate {
    type Error = Error;

    fn try_from(client: DeviceClient) -> Result<Self, Self::Error> {
        match client.family() {
            DeviceFamily::FortiGate => Ok(Self { client }),
            family => Err(Error::UnsupportedFamily {
                operation: "FortiGate resources",
                family,
            }),
        }
    }
}

/// Percent-encode an object name for use as one path segment.
pub(crate) fn encode_name(name: &str) -> String {
    url::form_urlencoded::byte_serialize(name.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn only_fortigate_clients_convert() {
        let fmg = DeviceClient::builder(DeviceFamily::FortiManager, "fmg")
            .token("t")
            .build()
            .unwrap();
        match FortiGate::try_from(fmg) {
            Err(Error::UnsupportedFamily { family, .. }) => {
                assert_eq!(family, DeviceFamily::FortiManager);
            }
            other => panic!("expected UnsupportedFamily, got {other:?}"),
        }

        let fgt = FortiGate::builder("fgt").token("t").build().unwrap();
        assert!(FortiGate::try_from(fgt).is_ok());
    }

    #[test]
    fn names_are_encoded() {
        assert_eq!(encode_name("lab zone"), "lab%20zone");
        assert_eq!(encode_name("a+b"), "a%2Bb");
        assert_eq!(encode_name("a/b"), "a%2Fb");
    }
}
