//! Host operating-system family.

use std::fmt;

/// OS family, detected once at startup and carried in [`crate::HostConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OsFamily {
    Windows,
    MacOs,
    /// Linux and other freedesktop-style Unix systems.
    Linux,
    /// No desktop integration available.
    Other,
}

impl OsFamily {
    pub fn current() -> Self {
        if cfg!(windows) {
            Self::Windows
        } else if cfg!(target_os = "macos") {
            Self::MacOs
        } else if cfg!(unix) {
            Self::Linux
        } else {
            Self::Other
        }
    }

    pub fn is_windows(self) -> bool {
        self == Self::Windows
    }

    /// Suffix for native executables produced by a compiler.
    pub fn executable_suffix(self) -> &'static str {
        if self.is_windows() { "exe" } else { "" }
    }
}

impl fmt::Display for OsFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Windows => "windows",
            Self::MacOs => "macos",
            Self::Linux => "linux",
            Self::Other => "other",
        };
        f.write_str(name)
    }
}
