//! # Core Configuration Module
//!
//! Provides configuration management for the player core.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a `CoreConfig`
//! holding the client identity reported to the media server and the bridges
//! the core needs. It enforces fail-fast validation so that a missing bridge
//! is reported at startup rather than on first use.
//!
//! ## Required Dependencies
//!
//! - `HttpClient` - Catalog requests and audio streams
//! - `SecureStore` - Saved access token and user id
//! - `SettingsStore` - Loop mode and shuffle preferences
//!
//! When the `desktop-shims` feature is enabled, a reqwest client, the OS
//! keychain and a JSON file store are injected automatically for whatever was
//! not provided. Credentials land in the JSON file only when the keychain
//! refuses writes.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder()
//!     .client_name("Emberplay")
//!     .device_name("Living room handheld")
//!     .device_id("b5a1c1a0-0000-4000-8000-000000000001")
//!     .server_url("http://192.168.1.20:8096")
//!     .http_client(Arc::new(MyHttpClient))
//!     .secure_store(Arc::new(MySecureStore))
//!     .settings_store(Arc::new(MySettingsStore))
//!     .build()?;
//! ```
//!
//! ## Error Handling
//!
//! ```should_panic
//! use core_runtime::config::CoreConfig;
//!
//! # #[cfg(feature = "desktop-shims")]
//! # panic!("desktop defaults fill in every bridge");
//! let config = CoreConfig::builder()
//!     .build()
//!     .expect("Should fail - missing required bridges");
//! ```

use crate::error::{Error, Result};
use bridge_traits::{HttpClient, SecureStore, SettingsStore};
use std::path::PathBuf;
use std::sync::Arc;

/// Default client name reported to the server.
pub const DEFAULT_CLIENT_NAME: &str = "Emberplay";

/// How this client identifies itself to the media server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIdentity {
    /// Application name (`Client=` in the authorization header)
    pub client_name: String,
    /// Human-readable device name (`Device=`)
    pub device_name: String,
    /// Stable per-installation identifier (`DeviceId=`)
    pub device_id: String,
    /// Application version (`Version=`)
    pub client_version: String,
}

impl Default for ClientIdentity {
    fn default() -> Self {
        Self {
            client_name: DEFAULT_CLIENT_NAME.to_string(),
            device_name: "Emberplay Device".to_string(),
            device_id: uuid::Uuid::new_v4().to_string(),
            client_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Core configuration for the player core.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    pub identity: ClientIdentity,

    /// Server to use when no saved session names one.
    pub server_url: Option<String>,

    /// HTTP transport for catalog requests and audio streams
    pub http_client: Arc<dyn HttpClient>,

    /// Credential persistence
    pub secure_store: Arc<dyn SecureStore>,

    /// Preference persistence
    pub settings_store: Arc<dyn SettingsStore>,

    /// Feature flags
    pub features: FeatureFlags,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("identity", &self.identity)
            .field("server_url", &self.server_url)
            .field("http_client", &"HttpClient { ... }")
            .field("secure_store", &"SecureStore { ... }")
            .field("settings_store", &"SettingsStore { ... }")
            .field("features", &self.features)
            .finish()
    }
}

/// Feature flags control optional behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureFlags {
    /// Persist credentials after a successful login
    pub remember_credentials: bool,

    /// Restore and persist loop mode and shuffle
    pub persist_playback_preferences: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            remember_credentials: true,
            persist_playback_preferences: true,
        }
    }
}

impl CoreConfig {
    /// Creates a new builder for constructing a `CoreConfig`.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - Client name, device name and device id are not blank
    /// - The server URL, when given, is an absolute http(s) URL
    pub fn validate(&self) -> Result<()> {
        let identity = &self.identity;
        for (field, value) in [
            ("client_name", &identity.client_name),
            ("device_name", &identity.device_name),
            ("device_id", &identity.device_id),
        ] {
            if value.trim().is_empty() {
                return Err(Error::Config(format!("{} cannot be empty", field)));
            }
            if value.contains('"') {
                return Err(Error::Config(format!(
                    "{} cannot contain double quotes",
                    field
                )));
            }
        }

        if let Some(url) = &self.server_url {
            validate_server_url(url)?;
        }

        Ok(())
    }
}

/// Checks that `url` is an absolute http(s) URL with a host.
pub fn validate_server_url(url: &str) -> Result<()> {
    let rest = url
        .strip_prefix("http://")
        .or_else(|| url.strip_prefix("https://"))
        .ok_or_else(|| Error::InvalidServerUrl {
            url: url.to_string(),
            reason: "must start with http:// or https://".to_string(),
        })?;

    if rest.is_empty() || rest.starts_with('/') {
        return Err(Error::InvalidServerUrl {
            url: url.to_string(),
            reason: "no host".to_string(),
        });
    }

    Ok(())
}

/// Removes trailing slashes so paths can be appended with `format!("{}/…")`.
pub fn normalize_server_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

#[cfg(not(feature = "desktop-shims"))]
fn capability_missing(capability: &str, purpose: &str) -> Error {
    Error::CapabilityMissing {
        capability: capability.to_string(),
        message: format!(
            "{} implementation is required for {}. \
             Desktop: enable the 'desktop-shims' feature to use the default. \
             Other hosts: inject a platform implementation.",
            capability, purpose
        ),
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_http_client() -> Result<Arc<dyn HttpClient>> {
    let client: Arc<dyn HttpClient> = Arc::new(bridge_desktop::ReqwestHttpClient::new());
    Ok(client)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_http_client() -> Result<Arc<dyn HttpClient>> {
    Err(capability_missing("HttpClient", "catalog requests and audio streams"))
}

#[cfg(feature = "desktop-shims")]
fn provide_default_store(
    store_path: Option<PathBuf>,
) -> Result<Arc<bridge_desktop::JsonFileStore>> {
    use bridge_desktop::JsonFileStore;

    let path = match store_path {
        Some(path) => path,
        None => JsonFileStore::default_path().map_err(|e| {
            Error::StoreUnavailable(format!("no location for the default store: {}", e))
        })?,
    };

    let store = JsonFileStore::open_blocking(&path)
        .map_err(|e| Error::StoreUnavailable(format!("{}: {}", path.display(), e)))?;
    Ok(Arc::new(store))
}

/// Builder for constructing [`CoreConfig`] instances.
#[derive(Default)]
pub struct CoreConfigBuilder {
    identity: ClientIdentity,
    server_url: Option<String>,
    store_path: Option<PathBuf>,
    http_client: Option<Arc<dyn HttpClient>>,
    secure_store: Option<Arc<dyn SecureStore>>,
    settings_store: Option<Arc<dyn SettingsStore>>,
    features: FeatureFlags,
}

impl CoreConfigBuilder {
    pub fn client_name(mut self, name: impl Into<String>) -> Self {
        self.identity.client_name = name.into();
        self
    }

    pub fn device_name(mut self, name: impl Into<String>) -> Self {
        self.identity.device_name = name.into();
        self
    }

    /// Sets the device id. Pass a value persisted across runs; the default
    /// is a fresh random id.
    pub fn device_id(mut self, id: impl Into<String>) -> Self {
        self.identity.device_id = id.into();
        self
    }

    pub fn client_version(mut self, version: impl Into<String>) -> Self {
        self.identity.client_version = version.into();
        self
    }

    /// Sets the server used when no saved session exists. Trailing slashes
    /// are removed.
    pub fn server_url(mut self, url: impl Into<String>) -> Self {
        self.server_url = Some(normalize_server_url(&url.into()));
        self
    }

    /// Location of the default JSON store (`desktop-shims` only).
    pub fn store_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.store_path = Some(path.into());
        self
    }

    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    pub fn secure_store(mut self, store: Arc<dyn SecureStore>) -> Self {
        self.secure_store = Some(store);
        self
    }

    pub fn settings_store(mut self, store: Arc<dyn SettingsStore>) -> Self {
        self.settings_store = Some(store);
        self
    }

    pub fn remember_credentials(mut self, enabled: bool) -> Self {
        self.features.remember_credentials = enabled;
        self
    }

    pub fn persist_playback_preferences(mut self, enabled: bool) -> Self {
        self.features.persist_playback_preferences = enabled;
        self
    }

    pub fn features(mut self, features: FeatureFlags) -> Self {
        self.features = features;
        self
    }

    /// Builds the configuration.
    ///
    /// # Errors
    ///
    /// - `Error::CapabilityMissing` when a required bridge is absent and no
    ///   desktop default is available
    /// - `Error::Config` or `Error::InvalidServerUrl` when a field fails
    ///   validation
    pub fn build(self) -> Result<CoreConfig> {
        let (secure_store, settings_store) = self.resolve_stores()?;

        let http_client = match self.http_client {
            Some(client) => client,
            None => provide_default_http_client()?,
        };

        let config = CoreConfig {
            identity: self.identity,
            server_url: self.server_url,
            http_client,
            secure_store,
            settings_store,
            features: self.features,
        };

        config.validate()?;

        Ok(config)
    }

    #[cfg(feature = "desktop-shims")]
    fn resolve_stores(&self) -> Result<(Arc<dyn SecureStore>, Arc<dyn SettingsStore>)> {
        match (&self.secure_store, &self.settings_store) {
            (Some(secure), Some(settings)) => Ok((Arc::clone(secure), Arc::clone(settings))),
            (secure, settings) => {
                let store = provide_default_store(self.store_path.clone())?;
                let secure = secure.clone().unwrap_or_else(|| {
                    let fallback: Arc<dyn SecureStore> = store.clone();
                    bridge_desktop::default_secure_store(fallback)
                });
                let settings = settings.clone().unwrap_or_else(|| {
                    let store: Arc<dyn SettingsStore> = store.clone();
                    store
                });
                Ok((secure, settings))
            }
        }
    }

    #[cfg(not(feature = "desktop-shims"))]
    fn resolve_stores(&self) -> Result<(Arc<dyn SecureStore>, Arc<dyn SettingsStore>)> {
        let _ = &self.store_path;
        let secure = self
            .secure_store
            .clone()
            .ok_or_else(|| capability_missing("SecureStore", "credential persistence"))?;
        let settings = self
            .settings_store
            .clone()
            .ok_or_else(|| capability_missing("SettingsStore", "user preferences"))?;
        Ok((secure, settings))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::{
        error::Result as BridgeResult, ByteStream, HttpRequest, HttpResponse,
    };

    struct MockHttpClient;

    #[async_trait]
    impl HttpClient for MockHttpClient {
        async fn execute(&self, _request: HttpRequest) -> BridgeResult<HttpResponse> {
            unimplemented!("not used by config tests")
        }

        async fn stream(&self, _request: HttpRequest) -> BridgeResult<ByteStream> {
            unimplemented!("not used by config tests")
        }
    }

    struct MockSecureStore;

    #[async_trait]
    impl SecureStore for MockSecureStore {
        async fn set_secret(&self, _key: &str, _value: &[u8]) -> BridgeResult<()> {
            Ok(())
        }

        async fn get_secret(&self, _key: &str) -> BridgeResult<Option<Vec<u8>>> {
            Ok(None)
        }

        async fn delete_secret(&self, _key: &str) -> BridgeResult<()> {
            Ok(())
        }
    }

    struct MockSettingsStore;

    #[async_trait]
    impl SettingsStore for MockSettingsStore {
        async fn set_string(&self, _key: &str, _value: &str) -> BridgeResult<()> {
            Ok(())
        }

        async fn get_string(&self, _key: &str) -> BridgeResult<Option<String>> {
            Ok(None)
        }

        async fn set_bool(&self, _key: &str, _value: bool) -> BridgeResult<()> {
            Ok(())
        }

        async fn get_bool(&self, _key: &str) -> BridgeResult<Option<bool>> {
            Ok(None)
        }

        async fn delete(&self, _key: &str) -> BridgeResult<()> {
            Ok(())
        }
    }

    fn complete_builder() -> CoreConfigBuilder {
        CoreConfig::builder()
            .http_client(Arc::new(MockHttpClient))
            .secure_store(Arc::new(MockSecureStore))
            .settings_store(Arc::new(MockSettingsStore))
    }

    #[test]
    fn test_builder_with_all_required_fields() {
        let config = complete_builder()
            .client_name("Tester")
            .device_name("Bench")
            .device_id("device-1")
            .client_version("9.9.9")
            .build()
            .unwrap();

        assert_eq!(config.identity.client_name, "Tester");
        assert_eq!(config.identity.device_name, "Bench");
        assert_eq!(config.identity.device_id, "device-1");
        assert_eq!(config.identity.client_version, "9.9.9");
        assert!(config.server_url.is_none());
        assert_eq!(config.features, FeatureFlags::default());
    }

    #[test]
    fn test_default_identity_has_random_device_id() {
        let a = ClientIdentity::default();
        let b = ClientIdentity::default();
        assert_eq!(a.client_name, DEFAULT_CLIENT_NAME);
        assert_ne!(a.device_id, b.device_id);
    }

    #[cfg(not(feature = "desktop-shims"))]
    #[test]
    fn test_builder_requires_http_client() {
        let err = CoreConfig::builder()
            .secure_store(Arc::new(MockSecureStore))
            .settings_store(Arc::new(MockSettingsStore))
            .build()
            .unwrap_err();

        assert!(matches!(err, Error::CapabilityMissing { .. }));
        assert!(err.to_string().contains("HttpClient"));
    }

    #[cfg(not(feature = "desktop-shims"))]
    #[test]
    fn test_builder_requires_secure_store() {
        let err = CoreConfig::builder()
            .http_client(Arc::new(MockHttpClient))
            .settings_store(Arc::new(MockSettingsStore))
            .build()
            .unwrap_err();

        let err_msg = err.to_string();
        assert!(err_msg.contains("SecureStore"));
        assert!(err_msg.contains("credential persistence"));
    }

    #[cfg(not(feature = "desktop-shims"))]
    #[test]
    fn test_builder_requires_settings_store() {
        let err = CoreConfig::builder()
            .http_client(Arc::new(MockHttpClient))
            .secure_store(Arc::new(MockSecureStore))
            .build()
            .unwrap_err();

        let err_msg = err.to_string();
        assert!(err_msg.contains("SettingsStore"));
        assert!(err_msg.contains("user preferences"));
    }

    #[test]
    fn test_server_url_is_normalized() {
        let config = complete_builder()
            .server_url("http://jellyfin.local:8096/")
            .build()
            .unwrap();

        assert_eq!(
            config.server_url.as_deref(),
            Some("http://jellyfin.local:8096")
        );
    }

    #[test]
    fn test_validate_rejects_bad_server_url() {
        let err = complete_builder()
            .server_url("jellyfin.local:8096")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("http:// or https://"));
        assert!(matches!(err, Error::InvalidServerUrl { .. }));

        assert!(validate_server_url("https://").is_err());
        assert!(validate_server_url("https:///Items").is_err());
        assert!(validate_server_url("https://music.example.com").is_ok());
    }

    #[test]
    fn test_validate_rejects_blank_identity() {
        let err = complete_builder().device_id("  ").build().unwrap_err();
        assert!(err.to_string().contains("device_id cannot be empty"));

        let err = complete_builder()
            .device_name("Bob's \"player\"")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("double quotes"));
    }

    #[test]
    fn test_builder_with_feature_flags() {
        let config = complete_builder()
            .remember_credentials(false)
            .build()
            .unwrap();

        assert!(!config.features.remember_credentials);
        assert!(config.features.persist_playback_preferences);
    }

    #[cfg(feature = "desktop-shims")]
    #[test]
    fn test_build_with_desktop_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.json");

        let config = CoreConfig::builder()
            .store_path(&path)
            .build()
            .expect("desktop defaults should succeed");

        let rt = tokio::runtime::Runtime::new().expect("runtime");
        rt.block_on(async {
            config
                .settings_store
                .set_string("playback.loop_mode", "one")
                .await
                .unwrap();
            config
                .secure_store
                .set_secret("emberplay.config-test", b"abcdef")
                .await
                .unwrap();
            assert!(config
                .secure_store
                .has_secret("emberplay.config-test")
                .await
                .unwrap());
            config
                .secure_store
                .delete_secret("emberplay.config-test")
                .await
                .unwrap();
        });
        assert!(path.exists());
    }

    #[cfg(feature = "desktop-shims")]
    #[test]
    fn test_injected_client_with_default_stores() {
        let dir = tempfile::TempDir::new().unwrap();
        let client: Arc<dyn HttpClient> = Arc::new(MockHttpClient);

        let config = CoreConfig::builder()
            .store_path(dir.path().join("config.json"))
            .http_client(client.clone())
            .settings_store(Arc::new(MockSettingsStore))
            .build()
            .unwrap();

        assert!(Arc::ptr_eq(&config.http_client, &client));
    }

    #[test]
    fn test_config_is_cloneable() {
        let config = complete_builder().build().unwrap();
        let cloned = config.clone();
        assert_eq!(cloned.identity, config.identity);
        assert!(format!("{:?}", cloned).contains("CoreConfig"));
    }
}
