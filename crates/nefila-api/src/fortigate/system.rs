// FortiGate system monitors
//
// License/registration state, web-UI state, interfaces, and the combined
// status summary built from the first two.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use super::{API_V2, FortiGate};
use crate::error::Error;

/// Condensed device status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSummary {
    pub version: String,
    pub serial: String,
    /// FortiCare registration status (e.g. `"registered"`).
    pub forticare: String,
    pub hostname: String,
    /// `{model_name}-{model_number}`, e.g. `FortiGate-VM64`.
    pub model: String,
    pub uptime_secs: u64,
}

#[derive(Deserialize)]
struct LicenseStatus {
    version: String,
    serial: String,
    results: LicenseResults,
}

#[derive(Deserialize)]
struct LicenseResults {
    forticare: ForticareStatus,
}

#[derive(Deserialize)]
struct ForticareStatus {
    status: String,
}

#[derive(Deserialize)]
struct WebUiState {
    results: WebUiResults,
}

#[derive(Deserialize)]
struct WebUiResults {
    hostname: String,
    model_name: String,
    model_number: String,
    /// Last reboot, milliseconds since the epoch.
    utc_last_reboot: i64,
}

impl FortiGate {
    /// Current license & registration status.
    ///
    /// `GET /api/v2/monitor/license/status`
    pub async fn license_status(&self) -> Result<Map<String, Value>, Error> {
        debug!(host = self.host(), "fetching license status");
        self.get("monitor/license/status").await
    }

    /// Basic system status; same document as [`FortiGate::status`].
    ///
    /// `GET /api/v2/monitor/system/status`
    pub async fn basic_status(&self) -> Result<Map<String, Value>, Error> {
        self.get("monitor/system/status").await
    }

    /// Interfaces available on the device.
    ///
    /// `GET /api/v2/monitor/system/available-interfaces`
    pub async fn interfaces(&self) -> Result<Map<String, Value>, Error> {
        debug!(host = self.host(), "listing interfaces");
        self.get("monitor/system/available-interfaces").await
    }

    /// Version, serial, registration, hostname, model and uptime in one call
    /// pair (`monitor/license/status` + `monitor/web-ui/state`).
    pub async fn summary(&self) -> Result<StatusSummary, Error> {
        let license: LicenseStatus = self
            .client()
            .get_json(&format!("{API_V2}/monitor/license/status"))
            .await?;
        let state: WebUiState = self
            .client()
            .get_json(&format!("{API_V2}/monitor/web-ui/state"))
            .await?;

        let uptime_secs = uptime_since(state.results.utc_last_reboot, Utc::now())?;
        let WebUiResults {
            hostname,
            model_name,
            model_number,
            ..
        } = state.results;

        Ok(StatusSummary {
            version: license.version,
            serial: license.serial,
            forticare: license.results.forticare.status,
            hostname,
            model: format!("{model_name}-{model_number}"),
            uptime_secs,
        })
    }
}

/// Whole seconds between the reboot timestamp and `now`, never negative.
fn uptime_since(last_reboot_ms: i64, now: DateTime<Utc>) -> Result<u64, Error> {
    let booted =
        DateTime::<Utc>::from_timestamp_millis(last_reboot_ms).ok_or_else(|| {
            Error::ResponseMalformed {
                message: format!("utc_last_reboot out of range: {last_reboot_ms}"),
                body: last_reboot_ms.to_string(),
            }
        })?;
    let secs = now.signed_duration_since(booted).num_seconds().max(0);
    Ok(u64::try_from(secs).unwrap_or_default())
}
