use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Bridge capability not available: {0}")]
    NotAvailable(String),

    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    #[error("HTTP {status}: {message}")]
    HttpStatus { status: u16, message: String },

    #[error("Audio device error: {0}")]
    AudioDevice(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Returns `true` when the failure came from the transport layer rather than
    /// from local state (storage, device).
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            BridgeError::OperationFailed(_) | BridgeError::HttpStatus { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
