//! # Playback Error Types
//!
//! Stream failures are recovered by the transition policy (skip forward);
//! contract violations are returned to the caller.

use bridge_traits::error::BridgeError;
use thiserror::Error;

/// Errors that can occur during playback operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlaybackError {
    // ========================================================================
    // Stream Errors
    // ========================================================================
    /// Connect or read failure while streaming.
    #[error("Network error: {0}")]
    Network(String),

    /// Stream ended before delivering a playable amount of audio.
    #[error("Stream too short: received {received} bytes, need at least {minimum}")]
    DecodeFormat { received: u64, minimum: usize },

    // ========================================================================
    // Output Errors
    // ========================================================================
    /// Audio channel could not be opened, paused, or reset.
    #[error("Audio output error: {0}")]
    Hardware(String),

    /// The session was stopped while an operation was waiting.
    #[error("Operation cancelled")]
    Cancelled,

    // ========================================================================
    // Contract Violations
    // ========================================================================
    #[error("Cannot play an empty track list")]
    EmptyQueue,

    #[error("Queue index {index} out of range (len {len})")]
    InvalidQueueIndex { index: usize, len: usize },

    #[error("No active playback session")]
    NoActiveSession,

    #[error("Invalid playback configuration: {0}")]
    InvalidConfig(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PlaybackError {
    /// Check if error is network-related.
    pub fn is_network_error(&self) -> bool {
        matches!(self, PlaybackError::Network(_))
    }

    /// Check if error is format-related.
    pub fn is_format_error(&self) -> bool {
        matches!(self, PlaybackError::DecodeFormat { .. })
    }

    /// Check if error is transient (might succeed on retry).
    pub fn is_transient(&self) -> bool {
        matches!(self, PlaybackError::Network(_) | PlaybackError::Hardware(_))
    }

    /// Programmer errors reported to the caller rather than skipped over.
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            PlaybackError::EmptyQueue
                | PlaybackError::InvalidQueueIndex { .. }
                | PlaybackError::NoActiveSession
                | PlaybackError::InvalidConfig(_)
        )
    }
}

impl From<BridgeError> for PlaybackError {
    fn from(err: BridgeError) -> Self {
        match err {
            BridgeError::AudioDevice(msg) => PlaybackError::Hardware(msg),
            other => PlaybackError::Network(other.to_string()),
        }
    }
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert!(PlaybackError::Network("reset".into()).is_network_error());
        assert!(PlaybackError::Network("reset".into()).is_transient());
        assert!(PlaybackError::DecodeFormat {
            received: 10,
            minimum: 4096
        }
        .is_format_error());
        assert!(!PlaybackError::Cancelled.is_transient());
        assert!(PlaybackError::EmptyQueue.is_contract_violation());
        assert!(PlaybackError::InvalidQueueIndex { index: 3, len: 2 }.is_contract_violation());
        assert!(!PlaybackError::Hardware("busy".into()).is_contract_violation());
    }

    #[test]
    fn test_bridge_error_conversion() {
        let err: PlaybackError = BridgeError::AudioDevice("no device".into()).into();
        assert_eq!(err, PlaybackError::Hardware("no device".into()));

        let err: PlaybackError = BridgeError::HttpStatus {
            status: 503,
            message: "unavailable".into(),
        }
        .into();
        assert!(err.is_network_error());
    }
}
