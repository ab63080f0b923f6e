//! Wire protocol types for front-end ↔ host communication.
//!
//! Every inbound frame carries one JSON object with an `action` discriminator.
//! Every request gets exactly one [`Response`].

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::RequestError;

/// Language tag used when an `execute` request omits `language`.
pub const DEFAULT_LANGUAGE: &str = "text";

fn default_language() -> String {
    DEFAULT_LANGUAGE.to_string()
}

/// Run a snippet of source code.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ExecuteRequest {
    #[serde(default)]
    pub code: String,
    /// Case-insensitive language tag.
    #[serde(default = "default_language")]
    pub language: String,
    /// Caller-chosen file name inside the temp directory.
    #[serde(default)]
    pub filename: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OpenTerminalRequest {
    /// Initial command to run inside the new terminal.
    #[serde(default)]
    pub command: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CopyClipboardRequest {
    #[serde(default)]
    pub text: String,
}

/// Typed request, decoded from a frame payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Execute(ExecuteRequest),
    OpenTerminal(OpenTerminalRequest),
    CopyClipboard(CopyClipboardRequest),
    Ping,
}

impl Request {
    /// Decode a request from a frame payload.
    ///
    /// Unknown, missing or non-string actions are rejected with
    /// [`RequestError::UnknownAction`]. Fields the action does not use are ignored.
    pub fn from_value(value: Value) -> Result<Self, RequestError> {
        let action = match value.get("action") {
            Some(Value::String(action)) => action.clone(),
            Some(other) => return Err(RequestError::UnknownAction(other.to_string())),
            None => return Err(RequestError::UnknownAction("null".to_string())),
        };

        match action.as_str() {
            "execute" => fields("execute", value).map(Self::Execute),
            "open_terminal" => fields("open_terminal", value).map(Self::OpenTerminal),
            "copy_clipboard" => fields("copy_clipboard", value).map(Self::CopyClipboard),
            "ping" => Ok(Self::Ping),
            _ => Err(RequestError::UnknownAction(action)),
        }
    }

    /// Action name as it appears on the wire.
    pub fn action(&self) -> &'static str {
        match self {
            Self::Execute(_) => "execute",
            Self::OpenTerminal(_) => "open_terminal",
            Self::CopyClipboard(_) => "copy_clipboard",
            Self::Ping => "ping",
        }
    }
}

fn fields<T: DeserializeOwned>(action: &'static str, value: Value) -> Result<T, RequestError> {
    serde_json::from_value(value).map_err(|source| RequestError::InvalidFields { action, source })
}

/// Response envelope. Never carries both `data` and `error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl Response {
    pub fn success(data: Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    /// Success carrying `{"message": ...}`.
    pub fn message(message: impl Into<String>) -> Self {
        Self::success(serde_json::json!({ "message": message.into() }))
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn data(&self) -> Option<&Value> {
        self.data.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}

impl From<RequestError> for Response {
    fn from(err: RequestError) -> Self {
        Self::failure(err.to_string())
    }
}

/// Captured outcome of one subprocess run.
///
/// A non-zero `returncode` or a timeout is still a successful delivery; the
/// fields describe how the program failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub output: String,
    pub error: String,
    pub returncode: i32,
    pub command: String,
}

impl ExecutionResult {
    /// Result for a run that never produced an exit status.
    pub fn failed(error: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            output: String::new(),
            error: error.into(),
            returncode: -1,
            command: command.into(),
        }
    }

    pub fn into_response(self) -> Response {
        match serde_json::to_value(&self) {
            Ok(data) => Response::success(data),
            Err(e) => Response::failure(format!("Execution failed: {e}")),
        }
    }
}
