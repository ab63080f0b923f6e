//! Error types, one per failure tier.
//!
//! - [`FrameError`]: transport is unusable, the request loop ends.
//! - [`RequestError`]: this request failed, answered with `success: false`.
//! - Execution outcomes are not errors; see [`crate::ExecutionResult`].

use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("malformed frame: {0}")]
    Malformed(#[source] io::Error),

    #[error("failed to write frame: {0}")]
    Write(#[source] io::Error),

    /// The response could not be framed; nothing was written.
    #[error("response too large: {0}")]
    Oversized(#[source] io::Error),
}

/// Failures while turning a request into a runnable command.
#[derive(Debug, Error)]
pub enum SynthError {
    #[error("Unsupported language: {0}")]
    Unsupported(String),

    #[error("invalid filename '{0}'")]
    InvalidFilename(String),

    #[error("failed to write {}: {source}", path.display())]
    Materialize {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Failures of the terminal and clipboard integrations.
#[derive(Debug, Error)]
pub enum DesktopError {
    #[error("No suitable terminal found")]
    NoTerminal,

    #[error("no clipboard utility available on this platform")]
    NoClipboard,

    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("{program} exited with {status}")]
    Status {
        program: String,
        status: std::process::ExitStatus,
    },

    /// Primary utility failed and so did the fallback.
    #[error("{primary}; {fallback}")]
    Fallback {
        primary: Box<DesktopError>,
        fallback: Box<DesktopError>,
    },
}

impl DesktopError {
    pub fn spawn(program: impl Into<String>, source: io::Error) -> Self {
        Self::Spawn {
            program: program.into(),
            source,
        }
    }
}

/// Request-level failures. The `Display` text is what the front-end sees.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("Failed to read message: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("Unknown action: {0}")]
    UnknownAction(String),

    #[error("Invalid {action} request: {source}")]
    InvalidFields {
        action: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("Unsupported language: {0}")]
    UnsupportedLanguage(String),

    #[error("Execution failed: {0}")]
    Execution(#[source] SynthError),

    #[error("Failed to open terminal: {0}")]
    Terminal(#[source] DesktopError),

    #[error("Failed to copy to clipboard: {0}")]
    Clipboard(#[source] DesktopError),

    #[error("Host error: {0}")]
    Internal(String),
}

impl From<SynthError> for RequestError {
    fn from(err: SynthError) -> Self {
        match err {
            SynthError::Unsupported(language) => Self::UnsupportedLanguage(language),
            other => Self::Execution(other),
        }
    }
}
