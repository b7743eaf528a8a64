use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Authentication failed: {reason}")]
    AuthenticationFailed { reason: String },

    #[error("Server unreachable: {0}")]
    Transport(String),

    #[error("Invalid server URL: {0}")]
    InvalidServerUrl(String),

    #[error("Secure storage unavailable: {0}")]
    SecureStorageUnavailable(String),

    #[error("Stored credentials are corrupted: {0}")]
    CredentialsCorrupted(String),

    #[error("Failed to serialize {context}")]
    SerializationFailed {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Sign-in already in progress")]
    SignInInProgress,

    #[error("Authentication timed out after {0} seconds")]
    Timeout(u64),

    #[error("Not authenticated")]
    NotAuthenticated,
}

impl AuthError {
    /// Whether retrying the same request could succeed.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            AuthError::Transport(_) | AuthError::Timeout(_) | AuthError::SignInInProgress
        )
    }
}

pub type Result<T> = std::result::Result<T, AuthError>;
