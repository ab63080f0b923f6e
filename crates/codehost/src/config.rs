//! Host configuration, built once at startup and read-only afterwards.

use std::path::PathBuf;
use std::time::Duration;

use crate::bridge::codec::MAX_RESPONSE_LEN;
use crate::desktop::{LINUX_TERMINALS, default_clipboard};
use crate::host::OPENED_FILE_GRACE;
use crate::language::LanguageTable;
use crate::platform::OsFamily;
use crate::runner::{DEFAULT_TIMEOUT, ProcessRunner};
use crate::synth::{Argv, Synthesizer, default_opener};

#[derive(Debug, Clone)]
pub struct HostConfig {
    pub os: OsFamily,
    pub languages: LanguageTable,
    /// Terminal emulators probed in order (Linux only).
    pub terminals: Vec<String>,
    /// Clipboard writers tried in order.
    pub clipboard: Vec<Argv>,
    /// Opens a file with its default application; fallback for unknown languages.
    pub opener: Option<Argv>,
    /// Where request source files are materialized.
    pub temp_dir: PathBuf,
    /// Wall-clock limit for `execute`.
    pub timeout: Duration,
    /// How long a file handed to the opener is kept before it is deleted.
    pub open_grace: Duration,
    /// Largest response payload written; bigger results are replaced by a failure.
    pub response_limit: usize,
}

impl HostConfig {
    /// Configuration for the OS this binary runs on.
    pub fn detect() -> Self {
        Self::for_os(OsFamily::current())
    }

    pub fn for_os(os: OsFamily) -> Self {
        let terminals = match os {
            OsFamily::Linux => LINUX_TERMINALS.iter().map(|t| t.to_string()).collect(),
            _ => Vec::new(),
        };
        Self {
            os,
            languages: LanguageTable::default(),
            terminals,
            clipboard: default_clipboard(os),
            opener: default_opener(os),
            temp_dir: std::env::temp_dir(),
            timeout: DEFAULT_TIMEOUT,
            open_grace: OPENED_FILE_GRACE,
            response_limit: MAX_RESPONSE_LEN,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_open_grace(mut self, grace: Duration) -> Self {
        self.open_grace = grace;
        self
    }

    pub fn with_response_limit(mut self, limit: usize) -> Self {
        self.response_limit = limit;
        self
    }

    pub fn with_temp_dir(mut self, temp_dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = temp_dir.into();
        self
    }

    pub fn with_clipboard(mut self, clipboard: Vec<Argv>) -> Self {
        self.clipboard = clipboard;
        self
    }

    pub fn with_opener(mut self, opener: Option<Argv>) -> Self {
        self.opener = opener;
        self
    }

    pub fn with_terminals(mut self, terminals: Vec<String>) -> Self {
        self.terminals = terminals;
        self
    }

    pub fn synthesizer(&self) -> Synthesizer {
        Synthesizer::new(
            self.languages,
            self.os,
            self.opener.clone(),
            self.temp_dir.clone(),
        )
    }

    pub fn runner(&self) -> ProcessRunner {
        ProcessRunner::new(self.timeout)
    }
}
