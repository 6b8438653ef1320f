//! Daemon error types.

use thiserror::Error;

/// Result type alias using `DaemonError`.
pub type Result<T> = std::result::Result<T, DaemonError>;

/// Errors from the daemon shell (endpoints, config, worker plumbing).
#[derive(Debug, Error)]
pub enum DaemonError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file problem.
    #[error("Configuration error: {message}")]
    Config {
        /// Error message.
        message: String,
    },

    /// TOML parse error.
    #[error("Configuration parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// Capture device problem.
    #[error("Capture error on {device}: {message}")]
    Capture {
        /// The device name.
        device: String,
        /// Error message.
        message: String,
    },

    /// The worker is gone.
    #[error("Worker stopped")]
    WorkerStopped,

    /// Engine-level error.
    #[error(transparent)]
    Engine(#[from] dot1x_types::Error),
}

impl DaemonError {
    /// Creates a configuration error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a capture error.
    #[must_use]
    pub fn capture(device: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Capture {
            device: device.into(),
            message: message.into(),
        }
    }
}
