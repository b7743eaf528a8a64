use serde::{Deserialize, Serialize};
use std::fmt;

/// Tokens shorter than this are never sent to the server for verification.
pub const MIN_TOKEN_LEN: usize = 5;

/// A signed-in session on one media server.
///
/// The access token is never printed by `Debug`.
///
/// # Examples
///
/// ```
/// use core_auth::Credentials;
///
/// let credentials = Credentials::new("http://10.0.0.5:8096/", "0123456789abcdef", "user-1");
/// assert_eq!(credentials.server_url, "http://10.0.0.5:8096");
/// assert!(!format!("{:?}", credentials).contains("0123456789abcdef"));
/// ```
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// Server base URL without a trailing slash
    pub server_url: String,
    pub access_token: String,
    pub user_id: String,
}

impl Credentials {
    pub fn new(
        server_url: impl Into<String>,
        access_token: impl Into<String>,
        user_id: impl Into<String>,
    ) -> Self {
        let server_url: String = server_url.into();
        Self {
            server_url: server_url.trim().trim_end_matches('/').to_string(),
            access_token: access_token.into(),
            user_id: user_id.into(),
        }
    }

    /// Whether the token is long enough to be worth verifying.
    pub fn has_plausible_token(&self) -> bool {
        self.access_token.trim().len() >= MIN_TOKEN_LEN
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("server_url", &self.server_url)
            .field("access_token", &"[REDACTED]")
            .field("user_id", &self.user_id)
            .finish()
    }
}

/// Authentication state of the client.
///
/// # Examples
///
/// ```
/// use core_auth::AuthState;
///
/// assert!(!AuthState::LoginRequired.is_authenticated());
/// assert!(AuthState::Authenticated.is_authenticated());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum AuthState {
    /// No usable session; the user must log in
    #[default]
    LoginRequired,
    /// A login request is in flight
    SigningIn,
    /// Credentials are present and were accepted by the server
    Authenticated,
}

impl AuthState {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthState::Authenticated)
    }
}

impl fmt::Display for AuthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthState::LoginRequired => write!(f, "Login Required"),
            AuthState::SigningIn => write!(f, "Signing In..."),
            AuthState::Authenticated => write!(f, "Authenticated"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials_normalize_server_url() {
        let credentials = Credentials::new(" https://music.example.com// ", "token", "u");
        assert_eq!(credentials.server_url, "https://music.example.com");
    }

    #[test]
    fn test_plausible_token() {
        assert!(Credentials::new("http://a", "12345", "u").has_plausible_token());
        assert!(!Credentials::new("http://a", "1234", "u").has_plausible_token());
        assert!(!Credentials::new("http://a", "   ", "u").has_plausible_token());
    }

    #[test]
    fn test_credentials_serde() {
        let credentials = Credentials::new("http://a:8096", "abcdef", "u-1");
        let json = serde_json::to_string(&credentials).unwrap();
        let parsed: Credentials = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, credentials);
    }

    #[test]
    fn test_auth_state_default_and_display() {
        assert_eq!(AuthState::default(), AuthState::LoginRequired);
        assert_eq!(AuthState::SigningIn.to_string(), "Signing In...");
        assert!(!AuthState::SigningIn.is_authenticated());
    }
}
