//! An async Rust client for 360° cameras implementing the Open Spherical Camera (OSC) HTTP API.
//!
//! Commands are sent over plain HTTP/JSON on the local network (no authentication).
//! Long-running commands (taking a picture, changing options, ...) are followed through
//! the camera's `status` endpoint until they finish, and the MJPEG live preview is split
//! into individual JPEG frames as the bytes arrive.
//! This library uses the [reqwest] library for HTTP.
//!
//! [reqwest]: https://github.com/seanmonstar/reqwest
//!
//! Only one request is active per camera at a time: starting a new operation cancels
//! whatever was still running on the same [`cam::OscCam`].
//!
//! ## Example
//!
//! More examples are provided in the `demos/` folder.
//!
//! ```no_run
//! use osc_cam_rs::{cam::OscCam, util::CamUtil};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let cam = OscCam::new()?;
//!
//!     println!("Camera info: {:#?}", cam.info().await?);
//!
//!     let jpeg = cam.take_picture_and_get(None, None::<fn(_)>).await?;
//!     println!("Received {} bytes", jpeg.len());
//!
//!     Ok(())
//! }
//! ```

/// Contains the OSC endpoint paths, command names and default values.
pub mod consts;

/// Contains enums and structs for the camera options.
pub mod settings;

/// Contains the command result data model.
pub mod command;

/// Contains the camera metadata types (`/osc/info`, `/osc/state`, file listings).
pub mod info;

/// Contains the byte accumulator used by the live preview.
pub mod buffer;

/// Contains the JPEG frame demultiplexer for the live preview stream.
pub mod preview;

/// Contains the command status poller.
pub mod poller;

/// Contains various convenience methods for interacting with the camera.
pub mod util;

/// Contains the main camera struct.
pub mod cam;

use command::ErrorCode;

/// Crate-specific error enum.
/// Every function interacting with the camera returns a Result enum with this error type.
#[derive(thiserror::Error, Debug)]
pub enum OscError {
    #[error("Error while performing the HTTP request")]
    Network(#[from] reqwest::Error),

    #[error("Camera returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Invalid JSON")]
    Json(#[from] serde_json::Error),

    #[error("Internal I/O error occured")]
    Io(#[from] std::io::Error),

    #[error("Operation was cancelled")]
    Cancelled,

    #[error("Camera reported an error ({code:?}): {message}")]
    Command { code: ErrorCode, message: String },

    #[error("Invalid response format")]
    InvalidFormat,

    #[error("Response is missing the `{field}` field")]
    MissingField { field: &'static str },
}

pub type OscResult<T> = Result<T, OscError>;
