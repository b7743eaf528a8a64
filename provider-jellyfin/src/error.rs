//! Error types for the Jellyfin provider

use bridge_traits::error::BridgeError;
use core_auth::AuthError;
use core_library::LibraryError;
use core_playback::PlaybackError;
use thiserror::Error;

/// Jellyfin provider errors
#[derive(Error, Debug)]
pub enum JellyfinError {
    /// Login rejected or the response carried no token
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The server answered with a non-success status
    #[error("Jellyfin API error (status {status_code}): {message}")]
    ApiError { status_code: u16, message: String },

    /// Failed to parse API response
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Catalog response above the accepted size
    #[error("Response too large: {size} bytes (limit {limit})")]
    ResponseTooLarge { size: usize, limit: usize },

    /// No credentials were set on the connector
    #[error("Not signed in")]
    NotAuthenticated,

    /// Bridge error
    #[error(transparent)]
    BridgeError(#[from] BridgeError),
}

impl JellyfinError {
    /// Whether the failure came from the transport rather than the request.
    pub fn is_transport(&self) -> bool {
        match self {
            JellyfinError::ApiError { status_code, .. } => *status_code >= 500,
            JellyfinError::BridgeError(e) => e.is_transport(),
            _ => false,
        }
    }
}

/// Result type for Jellyfin operations
pub type Result<T> = std::result::Result<T, JellyfinError>;

impl From<JellyfinError> for BridgeError {
    fn from(error: JellyfinError) -> Self {
        match error {
            JellyfinError::ApiError {
                status_code,
                message,
            } => BridgeError::HttpStatus {
                status: status_code,
                message,
            },
            JellyfinError::BridgeError(e) => e,
            other => BridgeError::OperationFailed(other.to_string()),
        }
    }
}

impl From<JellyfinError> for AuthError {
    fn from(error: JellyfinError) -> Self {
        match error {
            JellyfinError::AuthenticationFailed(reason) => {
                AuthError::AuthenticationFailed { reason }
            }
            JellyfinError::ApiError {
                status_code,
                message,
            } if status_code < 500 => AuthError::AuthenticationFailed {
                reason: format!("status {}: {}", status_code, message),
            },
            JellyfinError::NotAuthenticated => AuthError::NotAuthenticated,
            other => AuthError::Transport(other.to_string()),
        }
    }
}

impl From<JellyfinError> for LibraryError {
    fn from(error: JellyfinError) -> Self {
        match error {
            JellyfinError::ParseError(msg) => LibraryError::Parse(msg),
            JellyfinError::ResponseTooLarge { .. } => LibraryError::Parse(error.to_string()),
            JellyfinError::NotAuthenticated => LibraryError::NotAuthenticated,
            other => LibraryError::Bridge(other.into()),
        }
    }
}

impl From<JellyfinError> for PlaybackError {
    fn from(error: JellyfinError) -> Self {
        match error {
            JellyfinError::BridgeError(e) => e.into(),
            other => PlaybackError::Network(other.to_string()),
        }
    }
}
