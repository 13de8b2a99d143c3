use bytes::Bytes;
use log::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{OscError, OscResult};

/// Execution state reported by the camera for a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CommandState {
    InProgress,
    Done,
    Error,
    /// Any other value. Treated as terminal.
    #[serde(other)]
    Unknown,
}

/// Progress of an in-progress command, if the camera chooses to report it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Progress {
    /// Fraction in `[0, 1]`.
    #[serde(default)]
    pub completion: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// Error codes defined by the OSC API (and the common vendor additions).
pub enum ErrorCode {
    /// 400 Invalid command is issued
    UnknownCommand,
    /// 403 Command cannot be executed due to the camera status
    DisabledCommand,
    /// 400 Insufficient required parameters to issue the command
    MissingParameter,
    /// 400 Parameter name or option name is invalid
    InvalidParameterName,
    /// 403 sessionId when command was issued is invalid
    InvalidSessionId,
    /// 400 Parameter value when command was issued is invalid
    InvalidParameterValue,
    /// 403 Process request for corrupted file
    CorruptedFile,
    /// 400 Session start not possible when camera is in exclusive use
    CameraInExclusiveUse,
    /// 403 Process request when power supply is off
    PowerOffSequenceRunning,
    /// 403 Invalid file format specified
    InvalidFileFormat,
    /// 503 Processing requests cannot be received temporarily
    ServiceUnavailable,
    /// 403 Self-timer shooting was cancelled
    CanceledShooting,
    /// 503 Other errors
    Unexpected,
    #[serde(other)]
    Unknown,
}

/// The `error` object of a failed command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandError {
    pub code: ErrorCode,
    #[serde(default)]
    pub message: String,
}

/// JSON body returned by `/osc/commands/execute` and `/osc/commands/status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandResult {
    #[serde(default)]
    pub name: String,
    pub state: CommandState,
    /// Command instance identifier, present while `state` is `inProgress`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<Progress>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<CommandError>,
}

impl CommandResult {
    pub fn is_terminal(&self) -> bool {
        self.state != CommandState::InProgress
    }

    /// Field-by-field reading for JSON objects that fail strict parsing.
    /// Only a string `state` is required, malformed side fields are left out.
    fn from_loose(body: &[u8]) -> Option<Self> {
        let value: Value = serde_json::from_slice(body).ok()?;
        let state = serde_json::from_value(value.get("state")?.as_str()?.into()).ok()?;

        let field = |name: &str| value.get(name).filter(|v| !v.is_null());

        Some(Self {
            name: field("name")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_owned(),
            state,
            id: field("id").and_then(Value::as_str).map(str::to_owned),
            progress: field("progress").and_then(|v| serde_json::from_value(v.clone()).ok()),
            results: field("results").cloned(),
            error: field("error").and_then(|v| serde_json::from_value(v.clone()).ok()),
        })
    }
}

/// A command response as handed to the caller.
///
/// Bodies that are not JSON, or lack a `state`, are passed through untouched as `Raw`
/// instead of being turned into an error: some firmwares return non-conforming bodies.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandReply {
    Result(CommandResult),
    Raw(Bytes),
}

impl CommandReply {
    /// Interprets a raw response body.
    pub fn from_body(body: Bytes) -> Self {
        match serde_json::from_slice::<CommandResult>(&body) {
            Ok(result) => Self::Result(result),
            Err(e) => match CommandResult::from_loose(&body) {
                Some(result) => {
                    debug!("Reading state and id from a non-conforming response ({e})");
                    Self::Result(result)
                }
                None => {
                    debug!("Passing through a response without a usable state ({e})");
                    Self::Raw(body)
                }
            },
        }
    }

    pub fn result(&self) -> Option<&CommandResult> {
        match self {
            Self::Result(result) => Some(result),
            Self::Raw(_) => None,
        }
    }

    pub fn state(&self) -> Option<CommandState> {
        self.result().map(|r| r.state)
    }

    /// Returns the command id if polling has to continue, i.e. the command is
    /// `inProgress` and the camera gave an id to poll with.
    pub fn pending_id(&self) -> Option<&str> {
        let result = self.result()?;

        if result.state == CommandState::InProgress {
            result.id.as_deref()
        } else {
            None
        }
    }

    /// Converts a terminal reply into the command's `results` payload.
    ///
    /// A `done` command without `results` yields `Value::Null`.
    pub fn into_results(self) -> OscResult<Value> {
        let result = match self {
            Self::Result(result) => result,
            Self::Raw(_) => return Err(OscError::InvalidFormat),
        };

        match result.state {
            CommandState::Done => Ok(result.results.unwrap_or(Value::Null)),
            CommandState::Error => {
                let (code, message) = result
                    .error
                    .map(|e| (e.code, e.message))
                    .unwrap_or((ErrorCode::Unknown, String::new()));

                Err(OscError::Command { code, message })
            }
            CommandState::InProgress | CommandState::Unknown => Err(OscError::InvalidFormat),
        }
    }
}
