//! Credential storage in the OS keychain.

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    storage::SecureStore,
};
use keyring::Entry;
use std::sync::Arc;
use tracing::{debug, warn};

const SERVICE_NAME: &str = "emberplay";
const PROBE_KEY: &str = "emberplay.keychain-probe";

/// Keyring-based secure storage.
///
/// Uses the platform store:
/// - macOS: Keychain
/// - Windows: Credential Manager
/// - Linux: kernel keyutils
pub struct KeyringSecureStore {
    service_name: String,
}

impl KeyringSecureStore {
    pub fn new() -> Self {
        Self::with_service_name(SERVICE_NAME)
    }

    pub fn with_service_name(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
        }
    }

    /// Write and remove a throwaway entry to see whether the keychain accepts
    /// writes in this session (headless boxes and containers often refuse).
    pub fn is_available(&self) -> bool {
        let entry = match self.entry(PROBE_KEY) {
            Ok(entry) => entry,
            Err(e) => {
                debug!(error = %e, "Keychain entry rejected");
                return false;
            }
        };
        match entry.set_password("probe") {
            Ok(()) => {
                let _ = entry.delete_credential();
                true
            }
            Err(e) => {
                debug!(error = %e, "Keychain write rejected");
                false
            }
        }
    }

    fn entry(&self, key: &str) -> std::result::Result<Entry, keyring::Error> {
        Entry::new(&self.service_name, key)
    }

    fn map_keyring_error(e: keyring::Error) -> BridgeError {
        BridgeError::OperationFailed(format!("Keyring error: {}", e))
    }
}

impl Default for KeyringSecureStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SecureStore for KeyringSecureStore {
    async fn set_secret(&self, key: &str, value: &[u8]) -> Result<()> {
        let value = std::str::from_utf8(value).map_err(|_| {
            BridgeError::OperationFailed(format!("Secret {} is not valid UTF-8", key))
        })?;

        self.entry(key)
            .and_then(|entry| entry.set_password(value))
            .map_err(Self::map_keyring_error)?;

        debug!(key = key, "Stored secret in keyring");
        Ok(())
    }

    async fn get_secret(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let entry = self.entry(key).map_err(Self::map_keyring_error)?;

        match entry.get_password() {
            Ok(value) => Ok(Some(value.into_bytes())),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(Self::map_keyring_error(e)),
        }
    }

    async fn delete_secret(&self, key: &str) -> Result<()> {
        let entry = self.entry(key).map_err(Self::map_keyring_error)?;

        match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => {
                debug!(key = key, "Deleted secret from keyring");
                Ok(())
            }
            Err(e) => Err(Self::map_keyring_error(e)),
        }
    }
}

/// Secure store for desktop hosts: the keychain when it accepts writes,
/// otherwise `fallback` (the JSON settings file).
pub fn default_secure_store(fallback: Arc<dyn SecureStore>) -> Arc<dyn SecureStore> {
    let keyring = KeyringSecureStore::new();
    if keyring.is_available() {
        debug!("Using the OS keychain for credentials");
        Arc::new(keyring)
    } else {
        warn!("OS keychain unavailable, credentials will be kept in the settings file");
        fallback
    }
}
