use std::time::Duration;

/// Address the camera uses for its own access point.
pub const DEFAULT_HOST: &str = "192.168.1.1";

pub const DEFAULT_HTTP_PORT: u16 = 80;

/// Delay inserted before every `status` request while a command is in progress.
/// This is a throttle, not a timeout.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1000);

/// Default timeout for connecting to the camera.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_millis(5000);

/// Default timeout for plain request/response transfers (not applied to the live preview stream).
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_millis(30000);

/// Upper bound for a single partial live preview frame before it is dropped.
pub const DEFAULT_MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Initial capacity of the live preview accumulation buffer.
pub const PREVIEW_BUFFER_CAPACITY: usize = 256 * 1024;

/// JPEG start-of-image marker.
pub const JPEG_SOI: [u8; 2] = [0xFF, 0xD8];

/// JPEG end-of-image marker.
pub const JPEG_EOI: [u8; 2] = [0xFF, 0xD9];

pub const JSON_CONTENT_TYPE: &str = "application/json;charset=utf-8";

/// Paths of the OSC HTTP endpoints, relative to the camera's base URL.
pub mod endpoints {
    pub const INFO: &str = "/osc/info";
    pub const STATE: &str = "/osc/state";
    pub const CHECK_FOR_UPDATES: &str = "/osc/checkForUpdates";
    pub const COMMANDS_EXECUTE: &str = "/osc/commands/execute";
    pub const COMMANDS_STATUS: &str = "/osc/commands/status";
}

/// Command names accepted by `/osc/commands/execute`.
pub mod commands {
    pub const START_SESSION: &str = "camera.startSession";
    pub const UPDATE_SESSION: &str = "camera.updateSession";
    pub const CLOSE_SESSION: &str = "camera.closeSession";
    pub const TAKE_PICTURE: &str = "camera.takePicture";
    pub const LIST_IMAGES: &str = "camera.listImages";
    pub const LIST_FILES: &str = "camera.listFiles";
    pub const DELETE: &str = "camera.delete";
    pub const GET_IMAGE: &str = "camera.getImage";
    pub const GET_METADATA: &str = "camera.getMetadata";
    pub const GET_OPTIONS: &str = "camera.getOptions";
    pub const SET_OPTIONS: &str = "camera.setOptions";
    pub const RESET: &str = "camera.reset";
    pub const GET_LIVE_PREVIEW: &str = "camera.getLivePreview";

    /// Vendor extensions (API level 1 naming).
    pub mod vendor {
        pub const FINISH_WLAN: &str = "camera._finishWlan";
        pub const START_CAPTURE: &str = "camera._startCapture";
        pub const STOP_CAPTURE: &str = "camera._stopCapture";
        pub const LIST_ALL: &str = "camera._listAll";
        pub const GET_VIDEO: &str = "camera._getVideo";
        pub const GET_LIVE_PREVIEW: &str = "camera._getLivePreview";
        pub const STOP_SELF_TIMER: &str = "camera._stopSelfTimer";
    }
}
