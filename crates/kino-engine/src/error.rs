//! Error types for Kino Engine

use crate::types::MediaError;
use thiserror::Error;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Engine error types
#[derive(Error, Debug, Clone)]
pub enum Error {
    // Source errors
    #[error("Invalid source descriptor: {0}")]
    InvalidSource(String),

    #[error("No adapter can play mimetype {mimetype}")]
    NoCompatibleAdapter { mimetype: String },

    // Playback errors
    #[error("Platform media error: {0}")]
    Media(MediaError),

    #[error("Load aborted before the media was ready")]
    LoadAborted,

    #[error("A video rendition switch is already in progress")]
    SwitchInProgress,

    #[error("Sink operation failed: {0}")]
    Sink(String),

    // DRM errors
    #[error("DRM not supported: {system}")]
    DrmNotSupported { system: String },

    #[error("DRM setup failed: {0}")]
    Drm(String),

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid JSON: {0}")]
    Json(String),

    // Internal errors
    #[error("Engine destroyed")]
    Destroyed,
}

impl Error {
    /// Create a DRM error
    pub fn drm(msg: impl Into<String>) -> Self {
        Error::Drm(msg.into())
    }

    /// Create a sink error
    pub fn sink(msg: impl Into<String>) -> Self {
        Error::Sink(msg.into())
    }

    /// Returns true if a caller-driven retry may succeed
    pub fn is_recoverable(&self) -> bool {
        match self {
            Error::Media(e) => e.code.is_transient(),
            Error::LoadAborted | Error::SwitchInProgress | Error::Sink(_) => true,
            _ => false,
        }
    }

    /// Returns the error code for diagnostics
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::InvalidSource(_) => "INVALID_SOURCE",
            Error::NoCompatibleAdapter { .. } => "NO_ADAPTER",
            Error::Media(_) => "MEDIA",
            Error::LoadAborted => "LOAD_ABORTED",
            Error::SwitchInProgress => "SWITCH_IN_PROGRESS",
            Error::Sink(_) => "SINK",
            Error::DrmNotSupported { .. } => "DRM_UNSUPPORTED",
            Error::Drm(_) => "DRM",
            Error::InvalidConfig(_) => "INVALID_CONFIG",
            Error::Json(_) => "JSON",
            Error::Destroyed => "DESTROYED",
        }
    }
}

impl From<MediaError> for Error {
    fn from(err: MediaError) -> Self {
        Error::Media(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Json(err.to_string())
    }
}
