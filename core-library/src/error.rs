use bridge_traits::error::BridgeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LibraryError {
    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),

    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound { entity_type: String, id: String },

    #[error("Invalid input: {field} - {message}")]
    InvalidInput { field: String, message: String },

    #[error("Failed to parse catalog response: {0}")]
    Parse(String),

    #[error("Not signed in")]
    NotAuthenticated,
}

impl LibraryError {
    /// Connect/read failures and non-success statuses.
    pub fn is_transport(&self) -> bool {
        matches!(self, LibraryError::Bridge(e) if e.is_transport())
    }
}

pub type Result<T> = std::result::Result<T, LibraryError>;
