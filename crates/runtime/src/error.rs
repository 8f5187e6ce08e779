//! Error types for the WebDriver runtime.

use thiserror::Error;

/// Result type alias for runtime operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while managing a WebDriver server.
#[derive(Debug, Error)]
pub enum Error {
    /// A server is already answering on the configured URL.
    #[error("WebDriver server is already started on {url}")]
    AlreadyStarted { url: String },

    /// The `java` binary could not be spawned before a Selenium start.
    #[error("Java Runtime Environment is not installed")]
    JavaMissing(#[source] std::io::Error),

    /// Downloading or unpacking a server artifact failed.
    #[error("install failed for {artifact}: {reason}")]
    Install { artifact: String, reason: String },

    /// The server process failed to launch or exited immediately.
    #[error("failed to launch WebDriver server: {0}")]
    Launch(String),

    /// The status endpoint could not be reached.
    #[error("status probe against {url} failed")]
    StatusProbe {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The status endpoint answered with something other than 200.
    #[error("status probe against {url} answered HTTP {status}")]
    UnexpectedStatus { url: String, status: u16 },

    /// Configuration could not be read or does not describe a usable server.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Timeout waiting for a probe.
    #[error("timed out: {0}")]
    Timeout(String),

    /// I/O error.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// The derived server URL does not parse.
    #[error(transparent)]
    Url(#[from] url::ParseError),
}

impl Error {
    /// Returns true if this error means a server was already running.
    pub fn is_already_started(&self) -> bool {
        matches!(self, Error::AlreadyStarted { .. })
    }

    /// Returns true if this error came out of the status probe.
    pub fn is_status_probe(&self) -> bool {
        matches!(
            self,
            Error::StatusProbe { .. } | Error::UnexpectedStatus { .. }
        )
    }
}
