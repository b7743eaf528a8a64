//! JSON file-backed credential and settings storage.
//!
//! One small document holds both the saved session (server URL, access token,
//! user id) and the persisted preferences. It is rewritten atomically on every
//! change and, on unix, readable only by the owning user.

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    storage::{SecureStore, SettingsStore},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, warn};

const APP_DIR: &str = "emberplay";
const FILE_NAME: &str = "config.json";

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreDocument {
    #[serde(default)]
    secrets: BTreeMap<String, String>,
    #[serde(default)]
    settings: BTreeMap<String, Value>,
}

/// JSON file store implementing both [`SecureStore`] and [`SettingsStore`].
///
/// Desktop hosts keep credentials here only when the OS keychain is
/// unavailable (see `default_secure_store`).
pub struct JsonFileStore {
    path: PathBuf,
    document: Mutex<StoreDocument>,
}

impl JsonFileStore {
    /// Open (or lazily create) the store at `path`.
    ///
    /// A missing file yields an empty store. An unreadable or corrupt file is
    /// reported as an error rather than silently discarded.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let raw = tokio::fs::read(&path).await;
        Self::from_read(path, raw)
    }

    /// Blocking variant of [`open`](Self::open) for synchronous setup code.
    pub fn open_blocking(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let raw = std::fs::read(&path);
        Self::from_read(path, raw)
    }

    fn from_read(path: PathBuf, raw: std::io::Result<Vec<u8>>) -> Result<Self> {
        let document = match raw {
            Ok(raw) if raw.iter().all(u8::is_ascii_whitespace) => StoreDocument::default(),
            Ok(raw) => serde_json::from_slice(&raw).map_err(|e| {
                BridgeError::OperationFailed(format!(
                    "Corrupt store file {}: {}",
                    path.display(),
                    e
                ))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "Store file not found, starting empty");
                StoreDocument::default()
            }
            Err(e) => return Err(BridgeError::Io(e)),
        };

        Ok(Self {
            path,
            document: Mutex::new(document),
        })
    }

    /// Open the store in the per-user configuration directory.
    pub async fn open_default() -> Result<Self> {
        Self::open(Self::default_path()?).await
    }

    /// `<config dir>/emberplay/config.json`.
    pub fn default_path() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join(APP_DIR).join(FILE_NAME))
            .ok_or_else(|| {
                BridgeError::NotAvailable("No configuration directory for this user".to_string())
            })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, document: &StoreDocument) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let encoded = serde_json::to_vec_pretty(document).map_err(|e| {
            BridgeError::OperationFailed(format!("Failed to encode store: {}", e))
        })?;

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &encoded).await?;
        restrict_permissions(&tmp).await;
        tokio::fs::rename(&tmp, &self.path).await?;

        debug!(path = %self.path.display(), bytes = encoded.len(), "Persisted store");
        Ok(())
    }

    async fn update<F>(&self, mutate: F) -> Result<()>
    where
        F: FnOnce(&mut StoreDocument),
    {
        let mut document = self.document.lock().await;
        mutate(&mut document);
        self.persist(&document).await
    }

    async fn setting(&self, key: &str) -> Option<Value> {
        self.document.lock().await.settings.get(key).cloned()
    }
}

#[cfg(unix)]
async fn restrict_permissions(path: &Path) {
    use std::os::unix::fs::PermissionsExt;

    if let Err(e) =
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).await
    {
        warn!(path = %path.display(), error = %e, "Failed to restrict store permissions");
    }
}

#[cfg(not(unix))]
async fn restrict_permissions(_path: &Path) {}

fn type_mismatch(key: &str, expected: &str) -> BridgeError {
    BridgeError::OperationFailed(format!("Type mismatch for {}: expected {}", key, expected))
}

#[async_trait]
impl SecureStore for JsonFileStore {
    async fn set_secret(&self, key: &str, value: &[u8]) -> Result<()> {
        let value = String::from_utf8(value.to_vec()).map_err(|_| {
            BridgeError::OperationFailed(format!("Secret {} is not valid UTF-8", key))
        })?;
        self.update(|doc| {
            doc.secrets.insert(key.to_string(), value);
        })
        .await?;
        debug!(key = key, "Stored secret");
        Ok(())
    }

    async fn get_secret(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let document = self.document.lock().await;
        Ok(document.secrets.get(key).map(|s| s.as_bytes().to_vec()))
    }

    async fn delete_secret(&self, key: &str) -> Result<()> {
        if !self.document.lock().await.secrets.contains_key(key) {
            return Ok(());
        }
        self.update(|doc| {
            doc.secrets.remove(key);
        })
        .await?;
        debug!(key = key, "Deleted secret");
        Ok(())
    }
}

#[async_trait]
impl SettingsStore for JsonFileStore {
    async fn set_string(&self, key: &str, value: &str) -> Result<()> {
        self.update(|doc| {
            doc.settings
                .insert(key.to_string(), Value::String(value.to_string()));
        })
        .await
    }

    async fn get_string(&self, key: &str) -> Result<Option<String>> {
        match self.setting(key).await {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s)),
            Some(_) => Err(type_mismatch(key, "string")),
        }
    }

    async fn set_bool(&self, key: &str, value: bool) -> Result<()> {
        self.update(|doc| {
            doc.settings.insert(key.to_string(), Value::Bool(value));
        })
        .await
    }

    async fn get_bool(&self, key: &str) -> Result<Option<bool>> {
        match self.setting(key).await {
            None => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(b)),
            Some(_) => Err(type_mismatch(key, "bool")),
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.update(|doc| {
            doc.settings.remove(key);
        })
        .await
    }

    async fn has_key(&self, key: &str) -> Result<bool> {
        Ok(self.setting(key).await.is_some())
    }
}
