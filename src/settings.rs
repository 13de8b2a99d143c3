use serde::{de::Error as _, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::{OscError, OscResult};

/// Trait implemented by all settings representing a 2D resolution.
pub trait Resolution {
    /// Gets the width.
    fn w(&self) -> u32;

    /// Gets the height.
    fn h(&self) -> u32;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
/// Specifies what the camera captures when shooting.
pub enum CaptureMode {
    #[default]
    #[serde(rename = "image")]
    Image,
    #[serde(rename = "video")]
    Video,
    /// Video mode of API level 1 firmwares.
    #[serde(rename = "_video")]
    VendorVideo,
    #[serde(rename = "interval")]
    Interval,
    #[serde(rename = "_liveStreaming")]
    LiveStreaming,
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, int_enum::IntEnum)]
/// Specifies the exposure program (`exposureProgram` option).
pub enum ExposureProgram {
    Manual = 1,
    Normal = 2,
    AperturePriority = 3,
    ShutterPriority = 4,
    IsoPriority = 9,
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, int_enum::IntEnum)]
/// Specifies the OSC API level the client talks (`clientVersion` option).
pub enum ClientVersion {
    #[default]
    V1 = 1,
    V2 = 2,
}

/// Serializes an `IntEnum` option as its integer value.
macro_rules! int_option_serde {
    ($ty:ty, $name:literal) => {
        impl Serialize for $ty {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_u8(*self as u8)
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let value = u8::deserialize(deserializer)?;

                <$ty>::try_from(value)
                    .map_err(|_| D::Error::custom(format!("unknown {} value {value}", $name)))
            }
        }
    };
}

int_option_serde!(ExposureProgram, "exposureProgram");
int_option_serde!(ClientVersion, "clientVersion");

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
/// Specifies which files `camera.listFiles` returns.
pub enum FileType {
    #[default]
    All,
    Image,
    Video,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
/// Specifies the order of file listings.
pub enum SortOrder {
    #[default]
    Newest,
    Oldest,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
/// Specifies whether the full image or its thumbnail is transferred.
pub enum ImageType {
    #[default]
    Full,
    Thumb,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Format of captured files (`fileFormat` option).
pub struct FileFormat {
    #[serde(rename = "type")]
    pub file_type: String,
    pub width: u32,
    pub height: u32,
}

impl Resolution for FileFormat {
    fn w(&self) -> u32 {
        self.width
    }

    fn h(&self) -> u32 {
        self.height
    }
}

/// Camera options, as sent with `camera.setOptions` and returned by `camera.getOptions`.
///
/// Options without a dedicated field are kept in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OscOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capture_mode: Option<CaptureMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exposure_program: Option<ExposureProgram>,
    /// Self-timer delay in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exposure_delay: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_format: Option<FileFormat>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_version: Option<ClientVersion>,
    /// Format: `YYYY:MM:DD HH:MM:SS+(-)HH:MM`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_time_zone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sleep_delay: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub off_delay: Option<u32>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl OscOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn capture_mode(mut self, capture_mode: CaptureMode) -> Self {
        self.capture_mode = Some(capture_mode);
        self
    }

    pub fn exposure_program(mut self, exposure_program: ExposureProgram) -> Self {
        self.exposure_program = Some(exposure_program);
        self
    }

    pub fn exposure_delay(mut self, seconds: u32) -> Self {
        self.exposure_delay = Some(seconds);
        self
    }

    pub fn client_version(mut self, client_version: ClientVersion) -> Self {
        self.client_version = Some(client_version);
        self
    }

    /// Sets an option without a dedicated field.
    pub fn with_option(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(name.into(), value.into());
        self
    }

    /// Reads the `options` object from the results of `camera.getOptions`.
    pub fn from_results(results: Value) -> OscResult<Self> {
        let options = results
            .get("options")
            .cloned()
            .ok_or(OscError::MissingField { field: "options" })?;

        Ok(serde_json::from_value(options)?)
    }
}

/// Parameters of `camera.listFiles` (API level 2).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListFilesRequest {
    pub file_type: FileType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_position: Option<u32>,
    pub entry_count: u32,
    /// Maximum thumbnail size; 0 omits thumbnails.
    pub max_thumb_size: u32,
    #[serde(rename = "_detail", skip_serializing_if = "Option::is_none")]
    pub detail: Option<bool>,
    #[serde(rename = "_sort", skip_serializing_if = "Option::is_none")]
    pub sort: Option<SortOrder>,
}

impl ListFilesRequest {
    pub fn new(file_type: FileType, entry_count: u32) -> Self {
        Self {
            file_type,
            start_position: None,
            entry_count,
            max_thumb_size: 0,
            detail: None,
            sort: None,
        }
    }
}
