use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// A configuration field or logging option was rejected
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid server URL '{url}': {reason}")]
    InvalidServerUrl { url: String, reason: String },

    /// A bridge the core needs was neither injected nor available as a default
    #[error("Capability missing: {capability} - {message}")]
    CapabilityMissing { capability: String, message: String },

    /// The default settings/credential file could not be located or opened
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),
}

pub type Result<T> = std::result::Result<T, Error>;
