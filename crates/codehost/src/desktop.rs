//! Desktop integration: terminal windows and the system clipboard.
//!
//! Both are external executables resolved via `PATH`. The [`Desktop`] trait
//! is the seam the dispatcher talks to, so request handling can be tested
//! without a display server.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::config::HostConfig;
use crate::error::DesktopError;
use crate::platform::OsFamily;
use crate::synth::Argv;

/// Terminal emulators probed on Linux, in preference order.
pub const LINUX_TERMINALS: &[&str] = &["gnome-terminal", "konsole", "xterm", "kitty", "alacritty"];

#[async_trait]
pub trait Desktop: Send + Sync {
    /// Open a new terminal window, optionally running `command` inside it.
    async fn open_terminal(&self, command: Option<&str>) -> Result<(), DesktopError>;

    /// Replace the clipboard contents with `text`.
    async fn copy_to_clipboard(&self, text: &str) -> Result<(), DesktopError>;
}

/// Clipboard writers for an OS, primary first. Each reads the text on stdin.
pub fn default_clipboard(os: OsFamily) -> Vec<Argv> {
    match os {
        OsFamily::Windows => vec![Argv::new("clip")],
        OsFamily::MacOs => vec![Argv::new("pbcopy")],
        OsFamily::Linux => vec![
            Argv::new("xclip").args(["-selection", "clipboard"]),
            Argv::new("xsel").args(["--clipboard", "--input"]),
        ],
        OsFamily::Other => Vec::new(),
    }
}

/// Build the terminal launch command for `os`.
///
/// `available` decides whether a Linux terminal executable is on the search path.
pub fn terminal_command(
    os: OsFamily,
    terminals: &[String],
    command: Option<&str>,
    available: impl Fn(&str) -> bool,
) -> Result<Argv, DesktopError> {
    let argv = match os {
        OsFamily::Windows => {
            let argv = Argv::new("cmd").args(["/C", "start", "cmd"]);
            match command {
                Some(command) => argv.arg("/K").arg(command),
                None => argv,
            }
        }
        OsFamily::MacOs => {
            let argv = Argv::new("open").args(["-a", "Terminal"]);
            match command {
                Some(command) => argv.arg("--args").arg(command),
                None => argv,
            }
        }
        OsFamily::Linux => {
            let terminal = terminals
                .iter()
                .find(|t| available(t))
                .ok_or(DesktopError::NoTerminal)?;
            tracing::debug!(terminal = %terminal, "Selected terminal emulator");
            let argv = Argv::new(terminal.as_str());
            match command {
                Some(command) => argv.arg("-e").arg(command),
                None => argv,
            }
        }
        OsFamily::Other => return Err(DesktopError::NoTerminal),
    };
    Ok(argv)
}

/// [`Desktop`] backed by real OS executables.
#[derive(Debug, Clone)]
pub struct SystemDesktop {
    os: OsFamily,
    terminals: Vec<String>,
    clipboard: Vec<Argv>,
}

impl SystemDesktop {
    pub fn new(os: OsFamily, terminals: Vec<String>, clipboard: Vec<Argv>) -> Self {
        Self {
            os,
            terminals,
            clipboard,
        }
    }

    pub fn from_config(config: &HostConfig) -> Self {
        Self::new(
            config.os,
            config.terminals.clone(),
            config.clipboard.clone(),
        )
    }
}

#[async_trait]
impl Desktop for SystemDesktop {
    async fn open_terminal(&self, command: Option<&str>) -> Result<(), DesktopError> {
        let argv = terminal_command(self.os, &self.terminals, command, |name| {
            which::which(name).is_ok()
        })?;

        let child = Command::new(argv.program())
            .args(argv.arguments())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| DesktopError::spawn(argv.program(), e))?;
        tracing::info!(pid = ?child.id(), command = %argv, "Opened terminal");
        Ok(())
    }

    async fn copy_to_clipboard(&self, text: &str) -> Result<(), DesktopError> {
        let mut failure: Option<DesktopError> = None;

        for utility in &self.clipboard {
            match pipe_to(utility, text).await {
                Ok(()) => {
                    tracing::debug!(utility = %utility.program(), bytes = text.len(), "Copied to clipboard");
                    return Ok(());
                }
                Err(e) => {
                    tracing::debug!(utility = %utility.program(), error = %e, "Clipboard utility failed");
                    failure = Some(match failure {
                        None => e,
                        Some(primary) => DesktopError::Fallback {
                            primary: Box::new(primary),
                            fallback: Box::new(e),
                        },
                    });
                }
            }
        }

        Err(failure.unwrap_or(DesktopError::NoClipboard))
    }
}

/// Feed `text` to a utility's stdin, close it, and wait for a zero exit.
async fn pipe_to(utility: &Argv, text: &str) -> Result<(), DesktopError> {
    let program = utility.program();
    let mut child = Command::new(program)
        .args(utility.arguments())
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| DesktopError::spawn(program, e))?;

    // stdin is dropped at the end of this block => EOF delivered to the utility
    if let Some(mut stdin) = child.stdin.take() {
        stdin
            .write_all(text.as_bytes())
            .await
            .map_err(|e| DesktopError::spawn(program, e))?;
    }

    let status = child
        .wait()
        .await
        .map_err(|e| DesktopError::spawn(program, e))?;
    if status.success() {
        Ok(())
    } else {
        Err(DesktopError::Status {
            program: program.to_string(),
            status,
        })
    }
}
