//! Error types for playback management

use lyric_core::CoreError;
use thiserror::Error;

/// Playback errors
#[derive(Debug, Error)]
pub enum PlaybackError {
    /// The audio graph has not been initialized (or was released)
    #[error("Audio backend unavailable")]
    BackendUnavailable,

    /// The backend could not build a node for a track
    #[error("Node creation failed: {0}")]
    NodeCreationFailed(String),

    /// Command does not apply in the current engine state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// A backend operation on an existing node failed
    #[error("Backend error: {0}")]
    Backend(String),

    /// Settings could not be read or written
    #[error("Settings error: {0}")]
    Settings(#[from] CoreError),
}

impl PlaybackError {
    /// Create a node creation error
    pub fn node_creation(msg: impl Into<String>) -> Self {
        Self::NodeCreationFailed(msg.into())
    }

    /// Create an invalid state error
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    /// Create a backend error
    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }
}

/// Result type for playback operations
pub type Result<T> = std::result::Result<T, PlaybackError>;
