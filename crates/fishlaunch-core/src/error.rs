use std::fmt;

use serde::Serialize;

/// Coarse failure classes reported next to user-facing error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    /// Missing or invalid game directory, or unusable settings.
    Configuration,
    /// Unreachable server, HTTP failure, or a broken transfer.
    Network,
    /// Local disk failure.
    Filesystem,
    /// Corrupt or unreadable update archive.
    Archive,
    /// Another update already owns the install directory.
    Busy,
    /// The user stopped the operation.
    Cancelled,
    /// No launchable executable, or the OS refused to start it.
    Launch,
}

impl ErrorKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Configuration => "configuration",
            Self::Network => "network",
            Self::Filesystem => "filesystem",
            Self::Archive => "archive",
            Self::Busy => "busy",
            Self::Cancelled => "cancelled",
            Self::Launch => "launch",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
