//! Credential persistence
//!
//! The saved session (server URL, access token, user id) is read once at
//! startup and written once after a successful login. It is stored as a
//! single JSON secret so the three values can never be out of step.
//!
//! ## Example
//!
//! ```no_run
//! use core_auth::{CredentialStore, Credentials};
//! use std::sync::Arc;
//! # use bridge_traits::storage::SecureStore;
//! # async fn example(secure_store: Arc<dyn SecureStore>) -> core_auth::Result<()> {
//! let store = CredentialStore::new(secure_store);
//!
//! store
//!     .store(&Credentials::new("http://10.0.0.5:8096", "token", "user-1"))
//!     .await?;
//! let restored = store.load().await?;
//! store.delete().await?;
//! # Ok(())
//! # }
//! ```

use crate::error::{AuthError, Result};
use crate::types::Credentials;
use bridge_traits::storage::SecureStore;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Key of the saved session inside the secure store.
pub const CREDENTIALS_KEY: &str = "session:credentials";

/// Persists [`Credentials`] through a host [`SecureStore`].
///
/// Token values are never logged.
#[derive(Clone)]
pub struct CredentialStore {
    secure_store: Arc<dyn SecureStore>,
}

impl CredentialStore {
    pub fn new(secure_store: Arc<dyn SecureStore>) -> Self {
        Self { secure_store }
    }

    /// Save `credentials`, replacing any previous session.
    pub async fn store(&self, credentials: &Credentials) -> Result<()> {
        let json = serde_json::to_vec(credentials).map_err(|e| AuthError::SerializationFailed {
            context: "credentials".to_string(),
            source: e,
        })?;

        self.secure_store
            .set_secret(CREDENTIALS_KEY, &json)
            .await
            .map_err(|e| {
                warn!(error = %e, "Failed to store credentials");
                AuthError::SecureStorageUnavailable(e.to_string())
            })?;

        info!(
            server_url = %credentials.server_url,
            user_id = %credentials.user_id,
            "Credentials saved"
        );
        Ok(())
    }

    /// Load the saved session.
    ///
    /// Returns:
    /// - `Ok(Some(credentials))` if a session was saved
    /// - `Ok(None)` if nothing was saved
    /// - `Err(CredentialsCorrupted)` if the saved value could not be decoded;
    ///   the bad value is removed
    pub async fn load(&self) -> Result<Option<Credentials>> {
        let data = self
            .secure_store
            .get_secret(CREDENTIALS_KEY)
            .await
            .map_err(|e| AuthError::SecureStorageUnavailable(e.to_string()))?;

        let Some(data) = data else {
            debug!("No saved credentials");
            return Ok(None);
        };

        match serde_json::from_slice::<Credentials>(&data) {
            Ok(credentials) => {
                debug!(server_url = %credentials.server_url, "Loaded saved credentials");
                Ok(Some(credentials))
            }
            Err(e) => {
                warn!(error = %e, "Saved credentials are corrupted, removing them");
                if let Err(delete_err) = self.secure_store.delete_secret(CREDENTIALS_KEY).await {
                    warn!(error = %delete_err, "Failed to remove corrupted credentials");
                }
                Err(AuthError::CredentialsCorrupted(e.to_string()))
            }
        }
    }

    /// Remove the saved session. Succeeds when nothing was saved.
    pub async fn delete(&self) -> Result<()> {
        self.secure_store
            .delete_secret(CREDENTIALS_KEY)
            .await
            .map_err(|e| AuthError::SecureStorageUnavailable(e.to_string()))?;
        info!("Saved credentials removed");
        Ok(())
    }

    pub async fn has_credentials(&self) -> Result<bool> {
        self.secure_store
            .has_secret(CREDENTIALS_KEY)
            .await
            .map_err(|e| AuthError::SecureStorageUnavailable(e.to_string()))
    }
}
