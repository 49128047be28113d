// FortiGate DNS database
//
// Zones under `cmdb/system/dns-database`. Adding an entry rewrites the
// zone's whole `dns-entry` table, keeping the existing entries.

use serde_json::{Map, Value, json};
use tracing::debug;

use super::{API_V2, FortiGate, encode_name};
use crate::error::Error;

/// Handle on one DNS zone of a FortiGate.
#[derive(Debug, Clone, Copy)]
pub struct DnsDatabase<'a> {
    fortigate: &'a FortiGate,
    name: &'a str,
}

impl FortiGate {
    pub fn dns_database<'a>(&'a self, name: &'a str) -> DnsDatabase<'a> {
        DnsDatabase {
            fortigate: self,
            name,
        }
    }
}

impl DnsDatabase<'_> {
    pub fn name(&self) -> &str {
        self.name
    }

    fn zone_path(&self) -> String {
        format!("{API_V2}/cmdb/system/dns-database/{}", encode_name(self.name))
    }

    /// All zones.
    ///
    /// `GET /api/v2/cmdb/system/dns-database`
    pub async fn list(&self) -> Result<Map<String, Value>, Error> {
        self.fortigate.get("cmdb/system/dns-database").await
    }

    /// Create the zone, using its name as the domain.
    ///
    /// `POST /api/v2/cmdb/system/dns-database`
    pub async fn create(&self) -> Result<Map<String, Value>, Error> {
        debug!(zone = self.name, "creating DNS zone");
        self.fortigate
            .client()
            .post_json(
                &format!("{API_V2}/cmdb/system/dns-database"),
                &json!({ "name": self.name, "domain": self.name }),
            )
            .await
    }

    /// `GET /api/v2/cmdb/system/dns-database/{name}`
    pub async fn get(&self) -> Result<Map<String, Value>, Error> {
        self.fortigate.client().get_json(&self.zone_path()).await
    }

    /// Append an `ip` → `hostname` entry to the zone.
    ///
    /// The new entry gets id `len + 1`, then the zone is updated with
    /// `PUT /api/v2/cmdb/system/dns-database/{name}`.
    pub async fn add(&self, ip: &str, hostname: &str) -> Result<Map<String, Value>, Error> {
        let zone = self.get().await?;
        let mut entries = existing_entries(&zone)?;

        let id = entries.len() + 1;
        debug!(zone = self.name, id, hostname, "adding DNS entry");
        entries.push(json!({ "id": id, "ip": ip, "hostname": hostname }));

        self.fortigate
            .client()
            .put_json(&self.zone_path(), &json!({ "dns-entry": entries }))
            .await
    }

    /// `DELETE /api/v2/cmdb/system/dns-database/{name}`
    pub async fn delete(&self) -> Result<Map<String, Value>, Error> {
        debug!(zone = self.name, "deleting DNS zone");
        self.fortigate.client().delete_json(&self.zone_path()).await
    }
}

/// `results[0]["dns-entry"]` of a zone document.
fn existing_entries(zone: &Map<String, Value>) -> Result<Vec<Value>, Error> {
    zone.get("results")
        .and_then(|results| results.get(0))
        .and_then(|first| first.get("dns-entry"))
        .and_then(Value::as_array)
        .cloned()
        .ok_or_else(|| Error::ResponseMalformed {
            message: "zone document has no results[0].dns-entry".into(),
            body: Value::Object(zone.clone()).to_string(),
        })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn as_map(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("not an object: {other}"),
        }
    }

    #[test]
    fn reads_existing_entries() {
        let zone = as_map(json!({
            "results": [{
                "name": "lab",
                "dns-entry": [{ "id": 1, "ip": "192.0.2.1", "hostname": "a" }]
            }]
        }));
        assert_eq!(existing_entries(&zone).unwrap().len(), 1);
    }

    #[test]
    fn missing_table_is_malformed() {
        let zone = as_map(json!({ "results": [] }));
        assert!(matches!(
            existing_entries(&zone),
            Err(Error::ResponseMalformed { .. })
        ));
    }
}
