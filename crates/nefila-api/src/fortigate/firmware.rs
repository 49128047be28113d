// FortiGate firmware images
//
// Images offered by FortiGuard, upgrades from them, and upgrades from a
// local image upload. Upgrades get a longer timeout since the device
// downloads or receives the whole image first.

use std::path::Path;
use std::time::Duration;

use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tracing::debug;

use super::{API_V2, FortiGate};
use crate::error::Error;

const UPGRADE_TIMEOUT: Duration = Duration::from_secs(300);

/// Handle on the firmware endpoints of a FortiGate.
#[derive(Debug, Clone, Copy)]
pub struct Firmware<'a> {
    fortigate: &'a FortiGate,
}

#[derive(Deserialize)]
struct FirmwareList {
    results: FirmwareResults,
}

#[derive(Deserialize)]
struct FirmwareResults {
    #[serde(default)]
    available: Vec<FirmwareImage>,
}

#[derive(Deserialize)]
struct FirmwareImage {
    id: String,
    version: String,
}

impl FortiGate {
    pub fn firmware(&self) -> Firmware<'_> {
        Firmware { fortigate: self }
    }
}

impl Firmware<'_> {
    /// Images available from FortiGuard for this device.
    ///
    /// `GET /api/v2/monitor/system/firmware`
    pub async fn list(&self) -> Result<Map<String, Value>, Error> {
        self.fortigate.get("monitor/system/firmware").await
    }

    /// Upgrade to `version` (e.g. `"v7.4.3"`), or to the first offered
    /// image when `None`.
    ///
    /// `POST /api/v2/monitor/system/firmware/upgrade`
    pub async fn upgrade(&self, version: Option<&str>) -> Result<Map<String, Value>, Error> {
        let client = self.fortigate.client();
        let list: FirmwareList = client
            .get_json(&format!("{API_V2}/monitor/system/firmware"))
            .await?;

        let id = select_image(&list.results.available, version)?;
        debug!(host = self.fortigate.host(), image = id, "upgrading firmware");

        client
            .post_json_with_timeout(
                &format!("{API_V2}/monitor/system/firmware/upgrade"),
                &json!({ "source": "fortiguard", "filename": id }),
                UPGRADE_TIMEOUT,
            )
            .await
    }

    /// Upgrade from a local image file, uploaded as a multipart form.
    ///
    /// `POST /api/v2/monitor/system/firmware/upgrade` with
    /// `source=upload`, `scope=global` and the image as `file`.
    pub async fn upgrade_file(&self, image: &Path) -> Result<Map<String, Value>, Error> {
        let bytes = std::fs::read(image).map_err(|source| Error::FirmwareFile {
            path: image.to_path_buf(),
            source,
        })?;
        let file_name = image
            .file_name()
            .map_or_else(|| "firmware.out".to_owned(), |n| n.to_string_lossy().into_owned());
        debug!(
            host = self.fortigate.host(),
            image = %file_name,
            size = bytes.len(),
            "uploading firmware image"
        );

        let form = Form::new()
            .text("source", "upload")
            .text("scope", "global")
            .part("file", Part::bytes(bytes).file_name(file_name));

        self.fortigate
            .client()
            .post_multipart_json(
                &format!("{API_V2}/monitor/system/firmware/upgrade"),
                form,
                UPGRADE_TIMEOUT,
            )
            .await
    }
}

fn select_image<'a>(images: &'a [FirmwareImage], version: Option<&str>) -> Result<&'a str, Error> {
    let found = match version {
        Some(wanted) => images.iter().find(|image| image.version == wanted),
        None => images.first(),
    };
    found
        .map(|image| image.id.as_str())
        .ok_or_else(|| Error::FirmwareNotFound {
            version: version.unwrap_or("latest").to_owned(),
        })
}
