//! Error handling for the recording downloader

use std::fmt;
use thiserror::Error;

/// Unified error type for the recording downloader
#[derive(Error, Debug)]
pub enum Error {
    /// The identity provider or the API rejected our credentials
    #[error("Authentication error: {0}")]
    Auth(String),

    /// A recording carries no recording files
    #[error("Recording files missing for call with id '{meeting_id}'")]
    NoFiles {
        /// Numeric meeting id, as shown in the web portal
        meeting_id: String,
    },

    /// A recording file is still being processed by the platform
    #[error("Incomplete recording for recording with id '{file_id}'")]
    IncompleteRecording {
        /// Recording file id
        file_id: String,
    },

    /// A single file transfer failed
    #[error("Download failed for '{target}': {reason}")]
    Download {
        /// Destination path or file id
        target: String,
        /// What went wrong
        reason: String,
    },

    /// The API answered with a non-success status
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Response body
        message: String,
    },

    /// Network or HTTP related errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization or deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parsing errors
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// Filesystem errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Missing or invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// General errors
    #[error("{0}")]
    General(String),
}

impl Error {
    /// Create a new authentication error
    pub fn auth<T: fmt::Display>(msg: T) -> Self {
        Error::Auth(msg.to_string())
    }

    /// Create a new download error
    pub fn download<T: fmt::Display, R: fmt::Display>(target: T, reason: R) -> Self {
        Error::Download {
            target: target.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Create a new configuration error
    pub fn config<T: fmt::Display>(msg: T) -> Self {
        Error::Config(msg.to_string())
    }

    /// Create a new general error
    pub fn general<T: fmt::Display>(msg: T) -> Self {
        Error::General(msg.to_string())
    }

    /// Whether this error must abort the whole run.
    ///
    /// Per-meeting and per-file failures are recoverable: they are reported and
    /// the run moves on to the next item. Everything else ends the run.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Error::NoFiles { .. } | Error::IncompleteRecording { .. } | Error::Download { .. }
        )
    }
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;
