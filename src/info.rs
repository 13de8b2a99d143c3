use chrono::{DateTime, FixedOffset, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{OscError, OscResult};

/// Format of the OSC `dateTimeZone` fields, e.g. `2015:07:10 11:05:18+09:00`.
const DATE_TIME_ZONE_FORMAT: &str = "%Y:%m:%d %H:%M:%S%:z";
const DATE_TIME_FORMAT: &str = "%Y:%m:%d %H:%M:%S";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Endpoints {
    pub http_port: u16,
    pub http_updates_port: u16,
}

/// Response of `GET /osc/info`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CameraInfo {
    pub manufacturer: String,
    pub model: String,
    pub serial_number: String,
    pub firmware_version: String,
    pub support_url: String,
    pub endpoints: Endpoints,
    pub gps: bool,
    pub gyro: bool,
    /// Seconds since the camera booted.
    pub uptime: u64,
    /// Supported endpoints.
    pub api: Vec<String>,
    /// Supported API levels (API level 2 cameras only).
    pub api_level: Vec<u32>,
}

/// The `state` object of `POST /osc/state`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraStatus {
    /// API level 1 only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default)]
    pub battery_level: f64,
    /// API level 1 only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_changed: Option<bool>,
    /// API level 2 only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_uri: Option<String>,
    /// Vendor specific fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Response of `POST /osc/state`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CameraState {
    pub fingerprint: String,
    pub state: CameraStatus,
}

/// Response of `POST /osc/checkForUpdates`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateUpdate {
    pub state_fingerprint: String,
    /// Minimum interval in seconds before checking again.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub throttle_timeout: Option<u64>,
}

/// One entry of a file listing (`camera.listImages`, `camera.listFiles`, `camera._listAll`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    pub name: String,
    /// File URI (API level 1).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    /// Absolute download URL (API level 2).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_url: Option<String>,
    #[serde(default)]
    pub size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_time_zone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    /// Base64 encoded thumbnail, if requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FileEntry {
    /// Returns the URL (API level 2) or URI (API level 1) identifying the file.
    pub fn locator(&self) -> Option<&str> {
        self.file_url.as_deref().or(self.uri.as_deref())
    }

    /// Parses the capture time. Entries without a time zone are read as UTC.
    pub fn timestamp(&self) -> Option<DateTime<FixedOffset>> {
        if let Some(with_zone) = &self.date_time_zone {
            return DateTime::parse_from_str(with_zone, DATE_TIME_ZONE_FORMAT).ok();
        }

        let naive = NaiveDateTime::parse_from_str(self.date_time.as_deref()?, DATE_TIME_FORMAT).ok()?;
        Some(naive.and_utc().fixed_offset())
    }
}

/// Results of a file listing command.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileList {
    pub entries: Vec<FileEntry>,
    #[serde(default)]
    pub total_entries: u32,
    /// Token to fetch the next page (API level 1).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub continuation_token: Option<String>,
}

impl FileList {
    /// Reads a listing from the `results` of a listing command.
    pub fn from_results(results: Value) -> OscResult<Self> {
        if results.get("entries").is_none() {
            return Err(OscError::MissingField { field: "entries" });
        }

        Ok(serde_json::from_value(results)?)
    }
}
