use crate::error::Result;
use crate::types::Credentials;
use async_trait::async_trait;

/// Server-side login, implemented by a media-server connector.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Exchange a username and password for [`Credentials`].
    ///
    /// # Errors
    /// - `AuthError::AuthenticationFailed` when the server rejects the login
    ///   or returns no token
    /// - `AuthError::Transport` when the server cannot be reached
    async fn authenticate(
        &self,
        server_url: &str,
        username: &str,
        password: &str,
    ) -> Result<Credentials>;

    /// Check that saved credentials are still accepted.
    ///
    /// Returns `Ok(false)` for a rejected or implausible token. Transport
    /// failures are returned as errors.
    async fn verify(&self, credentials: &Credentials) -> Result<bool>;
}
