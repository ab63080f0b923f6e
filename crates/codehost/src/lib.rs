//! codehost: native messaging host that runs code, opens terminals and sets the clipboard.
//!
//! A browser extension (or any other front-end) writes length-prefixed JSON
//! requests to this process's stdin; each one is answered on stdout.

pub mod bridge;
pub mod config;
pub mod desktop;
pub mod error;
pub mod host;
pub mod language;
pub mod platform;
pub mod runner;
pub mod synth;

pub use bridge::protocol::{ExecutionResult, Request, Response};
pub use config::HostConfig;
pub use desktop::{Desktop, SystemDesktop};
pub use error::{DesktopError, FrameError, RequestError, SynthError};
pub use host::Host;
pub use platform::OsFamily;
pub use runner::{DEFAULT_TIMEOUT, ProcessRunner};
pub use synth::{Argv, ExecutionStrategy, Synthesized, Synthesizer};
