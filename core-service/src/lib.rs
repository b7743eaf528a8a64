//! Core service façade and bootstrap helpers.
//!
//! This crate wires a [`CoreConfig`] (client identity plus host bridges), the
//! Jellyfin connector and the playback engine into one [`CoreService`] that
//! shares a single event bus. Desktop and headless hosts typically enable the
//! `desktop-shims` feature (which depends on `bridge-desktop`) and call
//! [`bootstrap_desktop`]; other hosts inject their own bridges and output.
//!
//! ## Usage
//!
//! ```no_run
//! # async fn example() -> core_service::Result<()> {
//! use core_auth::AuthState;
//! use core_playback::PlaybackConfig;
//! use core_runtime::config::CoreConfig;
//!
//! let config = CoreConfig::builder()
//!     .device_name("Kitchen speaker")
//!     .build()?;
//! let core = core_service::bootstrap_desktop(config, PlaybackConfig::default())?;
//!
//! if core.start(false).await? == AuthState::LoginRequired {
//!     core.login("http://192.168.1.20:8096", "alice", "hunter2").await?;
//! }
//!
//! let albums = core.albums().await;
//! if let Some(album) = albums.first() {
//!     core.play_album(&album.id, 0).await?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod preferences;

pub use error::{CoreError, Result};
pub use preferences::{PlaybackPreferences, PreferenceStore, LOOP_MODE_KEY, SHUFFLE_KEY};

use std::sync::Arc;

use bridge_traits::AudioOutput;
use core_auth::{AuthManager, AuthState, Credentials};
use core_library::{Album, CatalogBrowser, Track};
use core_playback::{LoopMode, NowPlaying, PlaybackConfig, PlaybackEngine, SessionStatus};
use core_runtime::config::CoreConfig;
use core_runtime::events::{CoreEvent, EventBus};
use provider_jellyfin::JellyfinConnector;
use tokio::sync::broadcast::Receiver;
use tracing::{info, instrument, warn};

/// Primary façade exposed to host applications.
#[derive(Clone)]
pub struct CoreService {
    inner: Arc<ServiceInner>,
}

struct ServiceInner {
    config: CoreConfig,
    events: EventBus,
    connector: Arc<JellyfinConnector>,
    auth: AuthManager,
    catalog: CatalogBrowser,
    engine: PlaybackEngine,
    preferences: PreferenceStore,
}

impl CoreService {
    /// Create a new service from a validated config and an audio output.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(
        config: CoreConfig,
        playback: PlaybackConfig,
        output: Box<dyn AudioOutput>,
    ) -> Result<Self> {
        config.validate()?;

        let events = EventBus::new(playback.event_buffer);
        let connector = Arc::new(JellyfinConnector::new(
            Arc::clone(&config.http_client),
            config.identity.clone(),
        ));
        let auth = AuthManager::new(
            connector.clone(),
            Arc::clone(&config.secure_store),
            events.clone(),
        )
        .with_remember_credentials(config.features.remember_credentials);
        let catalog = CatalogBrowser::new(connector.clone()).with_event_bus(events.clone());
        let engine =
            PlaybackEngine::with_event_bus(playback, connector.clone(), output, events.clone())?;
        let preferences = PreferenceStore::new(
            Arc::clone(&config.settings_store),
            config.features.persist_playback_preferences,
        );

        info!(
            client = %config.identity.client_name,
            device = %config.identity.device_name,
            "Core service created"
        );

        Ok(Self {
            inner: Arc::new(ServiceInner {
                config,
                events,
                connector,
                auth,
                catalog,
                engine,
                preferences,
            }),
        })
    }

    /// Restore saved preferences and the saved session.
    ///
    /// Returns `Authenticated` when the saved session was accepted by the
    /// server, `LoginRequired` otherwise.
    #[instrument(skip(self))]
    pub async fn start(&self, force_login: bool) -> Result<AuthState> {
        let preferences = self.inner.preferences.load().await;
        self.inner.engine.set_loop_mode(preferences.loop_mode).await;
        self.inner.engine.set_shuffle(preferences.shuffle).await?;

        let state = self.inner.auth.restore(force_login).await?;
        self.inner
            .connector
            .set_credentials(self.inner.auth.credentials().await);
        info!(?state, "Core service started");
        Ok(state)
    }

    /// Sign in and make the new session current for catalog and streams.
    pub async fn login(
        &self,
        server_url: &str,
        username: &str,
        password: &str,
    ) -> Result<Credentials> {
        let credentials = self.inner.auth.login(server_url, username, password).await?;
        self.inner.connector.set_credentials(Some(credentials.clone()));
        Ok(credentials)
    }

    /// Stop playback and forget the current and saved session.
    #[instrument(skip(self))]
    pub async fn sign_out(&self) -> Result<()> {
        self.inner.engine.shutdown().await;
        self.inner.connector.set_credentials(None);
        self.inner.auth.sign_out().await?;
        Ok(())
    }

    pub async fn auth_state(&self) -> AuthState {
        self.inner.auth.state().await
    }

    /// Server URL to prefill a login form with.
    pub async fn suggested_server_url(&self) -> Option<String> {
        match self.inner.auth.saved_server_url().await {
            Some(url) => Some(url),
            None => self.inner.config.server_url.clone(),
        }
    }

    /// Albums of the signed-in user; empty when signed out or unreachable.
    pub async fn albums(&self) -> Vec<Album> {
        if !self.auth_state().await.is_authenticated() {
            warn!("Album listing requested while signed out");
            return Vec::new();
        }
        self.inner.catalog.albums().await
    }

    /// Tracks of one album; empty when signed out or unreachable.
    pub async fn tracks(&self, album_id: &str) -> Vec<Track> {
        if !self.auth_state().await.is_authenticated() {
            warn!(album_id, "Track listing requested while signed out");
            return Vec::new();
        }
        self.inner.catalog.tracks(album_id).await
    }

    /// List an album and play it from `start_index`.
    ///
    /// # Errors
    ///
    /// - `CoreError::NotAuthenticated` - no session
    /// - `CoreError::EmptyAlbum` - the listing was empty or failed
    /// - any playback error from [`PlaybackEngine::play`]
    #[instrument(skip(self))]
    pub async fn play_album(&self, album_id: &str, start_index: usize) -> Result<()> {
        if !self.auth_state().await.is_authenticated() {
            return Err(CoreError::NotAuthenticated);
        }
        let tracks = self.inner.catalog.tracks(album_id).await;
        if tracks.is_empty() {
            return Err(CoreError::EmptyAlbum(album_id.to_string()));
        }
        self.play(tracks, start_index).await
    }

    pub async fn play(&self, tracks: Vec<Track>, start_index: usize) -> Result<()> {
        self.inner.engine.play(tracks, start_index).await?;
        Ok(())
    }

    pub async fn toggle_pause(&self) -> Result<SessionStatus> {
        Ok(self.inner.engine.toggle_pause().await?)
    }

    pub async fn stop(&self) {
        self.inner.engine.stop().await;
    }

    pub async fn next(&self) -> Result<()> {
        Ok(self.inner.engine.next().await?)
    }

    pub async fn previous(&self) -> Result<()> {
        Ok(self.inner.engine.previous().await?)
    }

    pub async fn set_loop_mode(&self, mode: LoopMode) {
        self.inner.engine.set_loop_mode(mode).await;
        self.inner.preferences.save_loop_mode(mode).await;
    }

    /// Advance Off → All → One → Off and remember the choice.
    pub async fn cycle_loop_mode(&self) -> LoopMode {
        let mode = self.inner.engine.cycle_loop_mode().await;
        self.inner.preferences.save_loop_mode(mode).await;
        mode
    }

    pub async fn set_shuffle(&self, enabled: bool) -> Result<()> {
        self.inner.engine.set_shuffle(enabled).await?;
        self.inner.preferences.save_shuffle(enabled).await;
        Ok(())
    }

    pub async fn toggle_shuffle(&self) -> Result<bool> {
        let enabled = !self.inner.engine.is_shuffled().await;
        self.set_shuffle(enabled).await?;
        Ok(enabled)
    }

    pub async fn now_playing(&self) -> Option<NowPlaying> {
        self.inner.engine.now_playing().await
    }

    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.inner.events.subscribe()
    }

    pub fn engine(&self) -> &PlaybackEngine {
        &self.inner.engine
    }

    pub fn config(&self) -> &CoreConfig {
        &self.inner.config
    }

    /// Stop playback and release the queue. The session stays signed in.
    pub async fn shutdown(&self) {
        self.inner.engine.shutdown().await;
        info!("Core service shut down");
    }
}

/// Default audio output for desktop hosts: the sound device with
/// `cpal-output`, the paced software sink otherwise.
#[cfg(feature = "desktop-shims")]
pub fn default_output() -> Box<dyn AudioOutput> {
    #[cfg(feature = "cpal-output")]
    {
        Box::new(bridge_desktop::CpalAudioOutput::new())
    }
    #[cfg(not(feature = "cpal-output"))]
    {
        Box::new(bridge_desktop::PacedAudioOutput::new())
    }
}

/// Convenience bootstrapper for desktop and headless hosts.
#[cfg(feature = "desktop-shims")]
pub fn bootstrap_desktop(config: CoreConfig, playback: PlaybackConfig) -> Result<CoreService> {
    CoreService::new(config, playback, default_output())
}
