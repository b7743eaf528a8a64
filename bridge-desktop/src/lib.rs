//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop and headless hosts
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! - `HttpClient` using `reqwest`, with streamed bodies for audio transfers
//! - `SecureStore` in the OS keychain through `keyring`, falling back to
//!   the JSON settings file when the keychain refuses writes
//! - `SettingsStore` using a single JSON file
//! - `AudioOutput` as a paced sink (no device) or, with `cpal-output`, the
//!   system sound device through `cpal`
//!
//! ## Feature Flags
//!
//! - `secure-store` (default): Keep credentials in the OS keychain
//! - `cpal-output`: Enable the sound-device output
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{JsonFileStore, PacedAudioOutput, ReqwestHttpClient};
//!
//! #[tokio::main]
//! async fn main() {
//!     let http_client = ReqwestHttpClient::new();
//!     let store = JsonFileStore::open_default().await.unwrap();
//!     let output = PacedAudioOutput::new();
//!
//!     // Use in core configuration
//! }
//! ```

mod file_store;
mod http;
mod paced_output;

#[cfg(feature = "cpal-output")]
mod cpal_output;
#[cfg(feature = "secure-store")]
mod secure_store;

pub use file_store::JsonFileStore;
pub use http::ReqwestHttpClient;
pub use paced_output::PacedAudioOutput;

#[cfg(feature = "cpal-output")]
pub use cpal_output::CpalAudioOutput;
#[cfg(feature = "secure-store")]
pub use secure_store::{default_secure_store, KeyringSecureStore};

/// Without the keychain the settings file also holds the credentials.
#[cfg(not(feature = "secure-store"))]
pub fn default_secure_store(
    fallback: std::sync::Arc<dyn bridge_traits::SecureStore>,
) -> std::sync::Arc<dyn bridge_traits::SecureStore> {
    fallback
}
