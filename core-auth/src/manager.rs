//! # Authentication Manager
//!
//! Orchestrates the startup session check and the login flow.
//!
//! ## Overview
//!
//! At startup [`AuthManager::restore`] loads the saved credentials and asks
//! the server whether they are still valid. When they are not, or when the
//! user forces a fresh login, the host collects a server URL, username and
//! password and calls [`AuthManager::login`], which persists the resulting
//! session once.
//!
//! ## Usage
//!
//! ```no_run
//! use core_auth::{AuthManager, AuthState, Authenticator};
//! use core_runtime::events::EventBus;
//! use std::sync::Arc;
//! # use bridge_traits::SecureStore;
//! # async fn example(
//! #     authenticator: Arc<dyn Authenticator>,
//! #     secure_store: Arc<dyn SecureStore>,
//! # ) -> core_auth::Result<()> {
//! let manager = AuthManager::new(authenticator, secure_store, EventBus::new(100));
//!
//! if manager.restore(false).await? == AuthState::LoginRequired {
//!     manager
//!         .login("http://192.168.1.20:8096", "alice", "hunter2")
//!         .await?;
//! }
//! # Ok(())
//! # }
//! ```

use crate::authenticator::Authenticator;
use crate::credential_store::CredentialStore;
use crate::error::{AuthError, Result};
use crate::types::{AuthState, Credentials};
use bridge_traits::SecureStore;
use core_runtime::config::{normalize_server_url, validate_server_url};
use core_runtime::events::{AuthEvent, CoreEvent, EventBus};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio::time::{timeout, Duration};
use tracing::{error, info, instrument, warn};

/// Default timeout for a login request
const DEFAULT_AUTH_TIMEOUT: Duration = Duration::from_secs(30);

/// Session manager for one media server.
pub struct AuthManager {
    authenticator: Arc<dyn Authenticator>,
    store: CredentialStore,
    event_bus: EventBus,
    state: RwLock<AuthState>,
    credentials: RwLock<Option<Credentials>>,
    /// Held for the duration of a login request
    sign_in: Mutex<()>,
    remember_credentials: bool,
    auth_timeout: Duration,
}

impl AuthManager {
    pub fn new(
        authenticator: Arc<dyn Authenticator>,
        secure_store: Arc<dyn SecureStore>,
        event_bus: EventBus,
    ) -> Self {
        Self {
            authenticator,
            store: CredentialStore::new(secure_store),
            event_bus,
            state: RwLock::new(AuthState::LoginRequired),
            credentials: RwLock::new(None),
            sign_in: Mutex::new(()),
            remember_credentials: true,
            auth_timeout: DEFAULT_AUTH_TIMEOUT,
        }
    }

    /// Skip persisting credentials after login.
    pub fn with_remember_credentials(mut self, remember: bool) -> Self {
        self.remember_credentials = remember;
        self
    }

    pub fn with_auth_timeout(mut self, auth_timeout: Duration) -> Self {
        self.auth_timeout = auth_timeout;
        self
    }

    pub async fn state(&self) -> AuthState {
        *self.state.read().await
    }

    /// Credentials of the current session, if authenticated.
    pub async fn credentials(&self) -> Option<Credentials> {
        self.credentials.read().await.clone()
    }

    /// Server URL of the saved session, used to prefill a login form.
    pub async fn saved_server_url(&self) -> Option<String> {
        match self.store.load().await {
            Ok(saved) => saved.map(|c| c.server_url),
            Err(_) => None,
        }
    }

    /// Restore the saved session.
    ///
    /// Returns `Authenticated` when saved credentials exist, `force_login`
    /// is not set and the server accepts them. Every other outcome,
    /// including an unreachable server, yields `LoginRequired`. Saved
    /// credentials are kept either way.
    #[instrument(skip(self))]
    pub async fn restore(&self, force_login: bool) -> Result<AuthState> {
        if force_login {
            info!("Login forced, ignoring saved session");
            return Ok(self.set_state(AuthState::LoginRequired, None).await);
        }

        let saved = match self.store.load().await {
            Ok(saved) => saved,
            Err(AuthError::CredentialsCorrupted(reason)) => {
                warn!(%reason, "Discarded corrupted session");
                None
            }
            Err(e) => return Err(e),
        };

        let Some(credentials) = saved else {
            info!("No saved session");
            return Ok(self.set_state(AuthState::LoginRequired, None).await);
        };

        let verified = match self.authenticator.verify(&credentials).await {
            Ok(verified) => verified,
            Err(e) => {
                warn!(error = %e, server_url = %credentials.server_url, "Session check failed");
                false
            }
        };

        if !verified {
            info!(server_url = %credentials.server_url, "Saved session rejected");
            return Ok(self.set_state(AuthState::LoginRequired, None).await);
        }

        info!(user_id = %credentials.user_id, "Saved session restored");
        self.emit(AuthEvent::SessionRestored {
            user_id: credentials.user_id.clone(),
        });
        Ok(self
            .set_state(AuthState::Authenticated, Some(credentials))
            .await)
    }

    /// Log in with a username and password.
    ///
    /// # Errors
    ///
    /// - `AuthError::InvalidServerUrl` - the URL is not http(s)
    /// - `AuthError::SignInInProgress` - another login is running
    /// - `AuthError::Timeout` - the server did not answer in time
    /// - any error from the [`Authenticator`]
    #[instrument(skip(self, password), fields(server_url = %server_url))]
    pub async fn login(
        &self,
        server_url: &str,
        username: &str,
        password: &str,
    ) -> Result<Credentials> {
        validate_server_url(server_url.trim())
            .map_err(|e| AuthError::InvalidServerUrl(e.to_string()))?;
        let server_url = normalize_server_url(server_url);

        let _guard = self
            .sign_in
            .try_lock()
            .map_err(|_| AuthError::SignInInProgress)?;

        *self.state.write().await = AuthState::SigningIn;
        self.emit(AuthEvent::SigningIn {
            server_url: server_url.clone(),
        });

        let attempt = timeout(
            self.auth_timeout,
            self.authenticator
                .authenticate(&server_url, username, password),
        )
        .await
        .unwrap_or(Err(AuthError::Timeout(self.auth_timeout.as_secs())));

        let credentials = match attempt {
            Ok(credentials) => credentials,
            Err(e) => {
                error!(error = %e, "Login failed");
                self.emit(AuthEvent::AuthError {
                    message: e.to_string(),
                    recoverable: e.is_recoverable(),
                });
                self.set_state(AuthState::LoginRequired, None).await;
                return Err(e);
            }
        };

        if self.remember_credentials {
            if let Err(e) = self.store.store(&credentials).await {
                warn!(error = %e, "Signed in, but the session could not be saved");
            }
        }

        info!(user_id = %credentials.user_id, "Signed in");
        self.emit(AuthEvent::SignedIn {
            user_id: credentials.user_id.clone(),
            server_url: credentials.server_url.clone(),
        });
        self.set_state(AuthState::Authenticated, Some(credentials.clone()))
            .await;
        Ok(credentials)
    }

    /// Forget the current and saved session.
    #[instrument(skip(self))]
    pub async fn sign_out(&self) -> Result<()> {
        self.store.delete().await?;
        self.set_state(AuthState::LoginRequired, None).await;
        self.emit(AuthEvent::SignedOut);
        info!("Signed out");
        Ok(())
    }

    async fn set_state(&self, state: AuthState, credentials: Option<Credentials>) -> AuthState {
        *self.credentials.write().await = credentials;
        *self.state.write().await = state;
        state
    }

    fn emit(&self, event: AuthEvent) {
        let _ = self.event_bus.emit(CoreEvent::Auth(event));
    }
}
