//! Jellyfin API connector implementation
//!
//! Implements `Authenticator`, `CatalogClient` and `AudioStreamSource` over
//! the Jellyfin (and Emby-compatible) HTTP API.

use async_trait::async_trait;
use bridge_traits::error::BridgeError;
use bridge_traits::http::{ByteStream, HttpClient, HttpRequest, HttpResponse, RetryPolicy};
use bridge_traits::playback::PcmFormat;
use core_auth::{Authenticator, Credentials};
use core_library::{Album, CatalogClient, Track};
use core_playback::AudioStreamSource;
use core_runtime::config::ClientIdentity;
use core_runtime::logging::redact_query_secret;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::error::{JellyfinError, Result};
use crate::types::{AuthenticateByName, AuthenticationResult, ItemsResponse};

/// Header carrying client identity and, once signed in, the access token.
pub const AUTHORIZATION_HEADER: &str = "X-Emby-Authorization";

/// Catalog responses above this size are rejected.
pub const MAX_RESPONSE_BYTES: usize = 512 * 1024;

/// Timeout for the saved-session check at startup.
const VERIFY_TIMEOUT: Duration = Duration::from_secs(5);

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Jellyfin API connector
///
/// One connector serves one server session. Login goes through
/// [`Authenticator`]; once the resulting credentials are handed to
/// [`set_credentials`](Self::set_credentials), catalog listings and audio
/// streams are authorized with them.
///
/// # Example
///
/// ```ignore
/// use provider_jellyfin::JellyfinConnector;
/// use core_auth::Authenticator;
/// use core_library::CatalogClient;
///
/// let connector = JellyfinConnector::new(http_client, identity);
/// let credentials = connector
///     .authenticate("http://192.168.1.20:8096", "miles", "password")
///     .await?;
/// connector.set_credentials(Some(credentials));
/// let albums = connector.list_albums().await?;
/// ```
pub struct JellyfinConnector {
    http_client: Arc<dyn HttpClient>,
    identity: ClientIdentity,
    credentials: RwLock<Option<Credentials>>,
}

impl JellyfinConnector {
    pub fn new(http_client: Arc<dyn HttpClient>, identity: ClientIdentity) -> Self {
        Self {
            http_client,
            identity,
            credentials: RwLock::new(None),
        }
    }

    pub fn with_credentials(self, credentials: Credentials) -> Self {
        self.set_credentials(Some(credentials));
        self
    }

    /// Replace the session used for catalog and stream requests.
    pub fn set_credentials(&self, credentials: Option<Credentials>) {
        *self.credentials.write() = credentials;
    }

    pub fn credentials(&self) -> Option<Credentials> {
        self.credentials.read().clone()
    }

    pub fn identity(&self) -> &ClientIdentity {
        &self.identity
    }

    /// `MediaBrowser Client="…", Device="…", DeviceId="…", Version="…"[, Token="…"]`
    pub fn authorization_header(&self, token: Option<&str>) -> String {
        let identity = &self.identity;
        let mut value = format!(
            "MediaBrowser Client=\"{}\", Device=\"{}\", DeviceId=\"{}\", Version=\"{}\"",
            quote_safe(&identity.client_name),
            quote_safe(&identity.device_name),
            quote_safe(&identity.device_id),
            quote_safe(&identity.client_version),
        );
        if let Some(token) = token {
            value.push_str(&format!(", Token=\"{}\"", quote_safe(token)));
        }
        value
    }

    /// Raw PCM stream URL for `track_id`, transcoded by the server to `format`.
    pub fn stream_url(credentials: &Credentials, track_id: &str, format: PcmFormat) -> String {
        format!(
            "{}/Audio/{}/stream?static=false&audioCodec=pcm_s16le&container=raw\
             &audioSampleRate={}&audioBitRate={}&audioChannels={}&api_key={}",
            credentials.server_url,
            urlencoding::encode(track_id),
            format.sample_rate,
            format.bit_rate(),
            format.channels,
            urlencoding::encode(&credentials.access_token),
        )
    }

    fn session(&self) -> Result<Credentials> {
        self.credentials().ok_or(JellyfinError::NotAuthenticated)
    }

    /// Fetch and decode one `/Items` listing.
    #[instrument(skip(self, credentials), fields(query = %query))]
    async fn fetch_items(&self, credentials: &Credentials, query: &str) -> Result<ItemsResponse> {
        let url = format!("{}/Items?{}", credentials.server_url, query);
        let request = HttpRequest::get(url)
            .header(
                AUTHORIZATION_HEADER,
                self.authorization_header(Some(&credentials.access_token)),
            )
            .header("Accept", "application/json")
            .timeout(REQUEST_TIMEOUT);

        let response = self
            .http_client
            .execute_with_retry(request, RetryPolicy::default())
            .await?;
        let response = check_status(response)?;

        if response.body.len() > MAX_RESPONSE_BYTES {
            warn!(bytes = response.body.len(), "Catalog response too large");
            return Err(JellyfinError::ResponseTooLarge {
                size: response.body.len(),
                limit: MAX_RESPONSE_BYTES,
            });
        }

        serde_json::from_slice(&response.body)
            .map_err(|e| JellyfinError::ParseError(format!("Failed to parse items: {}", e)))
    }
}

fn quote_safe(value: &str) -> String {
    value.replace('"', "'")
}

fn check_status(response: HttpResponse) -> Result<HttpResponse> {
    if response.is_success() {
        Ok(response)
    } else {
        Err(JellyfinError::ApiError {
            status_code: response.status,
            message: String::from_utf8_lossy(&response.body).trim().to_string(),
        })
    }
}

#[async_trait]
impl Authenticator for JellyfinConnector {
    #[instrument(skip(self, password), fields(server_url = %server_url))]
    async fn authenticate(
        &self,
        server_url: &str,
        username: &str,
        password: &str,
    ) -> core_auth::Result<Credentials> {
        let server_url = server_url.trim().trim_end_matches('/');
        let body = AuthenticateByName {
            username: username.to_string(),
            pw: password.to_string(),
        };
        let request = HttpRequest::post(format!("{}/Users/authenticatebyname", server_url))
            .header(AUTHORIZATION_HEADER, self.authorization_header(None))
            .json(&body)
            .map_err(JellyfinError::from)?
            .timeout(REQUEST_TIMEOUT);

        let response = self
            .http_client
            .execute_with_retry(request, RetryPolicy::no_retry())
            .await
            .map_err(JellyfinError::from)?;
        let response = check_status(response)?;

        let result: AuthenticationResult = serde_json::from_slice(&response.body)
            .map_err(|e| JellyfinError::ParseError(format!("Failed to parse login: {}", e)))?;

        let token = result
            .access_token
            .filter(|token| !token.trim().is_empty())
            .ok_or_else(|| {
                JellyfinError::AuthenticationFailed("server returned no access token".to_string())
            })?;
        let user_id = result.user.map(|user| user.id).unwrap_or_default();

        info!(%user_id, "Authenticated with server");
        Ok(Credentials::new(server_url, token, user_id))
    }

    #[instrument(skip(self, credentials), fields(server_url = %credentials.server_url))]
    async fn verify(&self, credentials: &Credentials) -> core_auth::Result<bool> {
        if !credentials.has_plausible_token() {
            debug!("Saved token too short, skipping check");
            return Ok(false);
        }

        let request = HttpRequest::get(format!("{}/System/Info", credentials.server_url))
            .header(
                AUTHORIZATION_HEADER,
                self.authorization_header(Some(&credentials.access_token)),
            )
            .timeout(VERIFY_TIMEOUT);

        match self
            .http_client
            .execute_with_retry(request, RetryPolicy::no_retry())
            .await
        {
            Ok(response) => {
                debug!(status = response.status, "Session check answered");
                Ok(response.is_success())
            }
            Err(BridgeError::HttpStatus {
                status: 401 | 403, ..
            }) => Ok(false),
            Err(e) => Err(JellyfinError::from(e).into()),
        }
    }
}

#[async_trait]
impl CatalogClient for JellyfinConnector {
    #[instrument(skip(self))]
    async fn list_albums(&self) -> core_library::Result<Vec<Album>> {
        let credentials = self.session()?;
        let items = self
            .fetch_items(
                &credentials,
                "IncludeItemTypes=MusicAlbum&Recursive=true&SortBy=SortName",
            )
            .await?;

        let albums: Vec<Album> = items.items.into_iter().map(|i| i.into_album()).collect();
        info!(count = albums.len(), "Listed albums");
        Ok(albums)
    }

    #[instrument(skip(self), fields(album_id = %album_id))]
    async fn list_tracks(&self, album_id: &str) -> core_library::Result<Vec<Track>> {
        let credentials = self.session()?;
        let query = format!(
            "ParentId={}&SortBy=IndexNumber",
            urlencoding::encode(album_id)
        );
        let items = self.fetch_items(&credentials, &query).await?;

        let tracks: Vec<Track> = items.items.into_iter().map(|i| i.into_track()).collect();
        info!(count = tracks.len(), "Listed tracks");
        Ok(tracks)
    }
}

#[async_trait]
impl AudioStreamSource for JellyfinConnector {
    #[instrument(skip(self, track, format), fields(track_id = %track.id))]
    async fn open_stream(
        &self,
        track: &Track,
        format: PcmFormat,
    ) -> core_playback::Result<ByteStream> {
        let credentials = self.session()?;
        let url = Self::stream_url(&credentials, &track.id, format);
        debug!(url = %redact_query_secret(&url, "api_key"), "Opening audio stream");

        let request = HttpRequest::get(url)
            .header(AUTHORIZATION_HEADER, self.authorization_header(None));
        let stream = self.http_client.stream(request).await.map_err(|e| {
            warn!(error = %e, "Audio stream request failed");
            JellyfinError::from(e)
        })?;
        Ok(stream)
    }

    fn name(&self) -> &str {
        "jellyfin"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use core_auth::AuthError;
    use core_library::LibraryError;
    use core_playback::PlaybackError;
    use futures::StreamExt;
    use mockall::mock;
    use std::collections::HashMap;

    mock! {
        HttpClient {}

        #[async_trait]
        impl HttpClient for HttpClient {
            async fn execute(&self, request: HttpRequest) -> bridge_traits::error::Result<HttpResponse>;
            async fn execute_with_retry(
                &self,
                request: HttpRequest,
                policy: RetryPolicy,
            ) -> bridge_traits::error::Result<HttpResponse>;
            async fn stream(&self, request: HttpRequest) -> bridge_traits::error::Result<ByteStream>;
        }
    }

    const SERVER: &str = "http://10.0.0.5:8096";

    fn identity() -> ClientIdentity {
        ClientIdentity {
            client_name: "Emberplay".to_string(),
            device_name: "Handheld".to_string(),
            device_id: "dev-1".to_string(),
            client_version: "0.1.0".to_string(),
        }
    }

    fn credentials() -> Credentials {
        Credentials::new(SERVER, "token-abcdef", "user-1")
    }

    fn ok(body: &str) -> HttpResponse {
        HttpResponse {
            status: 200,
            headers: HashMap::new(),
            body: Bytes::from(body.to_string()),
        }
    }

    fn status(code: u16) -> HttpResponse {
        HttpResponse {
            status: code,
            headers: HashMap::new(),
            body: Bytes::from_static(b"nope"),
        }
    }

    fn connector(mock: MockHttpClient) -> JellyfinConnector {
        JellyfinConnector::new(Arc::new(mock), identity())
    }

    #[test]
    fn test_authorization_header() {
        let connector = connector(MockHttpClient::new());
        assert_eq!(
            connector.authorization_header(None),
            "MediaBrowser Client=\"Emberplay\", Device=\"Handheld\", DeviceId=\"dev-1\", Version=\"0.1.0\""
        );
        assert!(connector
            .authorization_header(Some("tok"))
            .ends_with(", Token=\"tok\""));
    }

    #[test]
    fn test_stream_url() {
        let url = JellyfinConnector::stream_url(&credentials(), "t1", PcmFormat::default());
        assert_eq!(
            url,
            "http://10.0.0.5:8096/Audio/t1/stream?static=false&audioCodec=pcm_s16le&container=raw\
             &audioSampleRate=48000&audioBitRate=1536000&audioChannels=2&api_key=token-abcdef"
        );
    }

    #[tokio::test]
    async fn test_authenticate_success() {
        let mut mock = MockHttpClient::new();
        mock.expect_execute_with_retry()
            .times(1)
            .withf(|req, policy| {
                let body: serde_json::Value =
                    serde_json::from_slice(req.body.as_ref().unwrap()).unwrap();
                req.url == "http://10.0.0.5:8096/Users/authenticatebyname"
                    && body == serde_json::json!({"Username": "miles", "Pw": "pw"})
                    && req.headers.contains_key(AUTHORIZATION_HEADER)
                    && policy.max_attempts == 1
            })
            .returning(|_, _| {
                Ok(ok(r#"{"AccessToken":"abcdef123","User":{"Id":"u-42","Name":"miles"}}"#))
            });

        let credentials = connector(mock)
            .authenticate("http://10.0.0.5:8096/", "miles", "pw")
            .await
            .unwrap();

        assert_eq!(credentials.server_url, SERVER);
        assert_eq!(credentials.access_token, "abcdef123");
        assert_eq!(credentials.user_id, "u-42");
    }

    #[tokio::test]
    async fn test_authenticate_without_token_fails() {
        let mut mock = MockHttpClient::new();
        mock.expect_execute_with_retry()
            .returning(|_, _| Ok(ok(r#"{"User":{"Id":"u-42"}}"#)));

        let result = connector(mock).authenticate(SERVER, "miles", "pw").await;
        assert!(matches!(result, Err(AuthError::AuthenticationFailed { .. })));
    }

    #[tokio::test]
    async fn test_authenticate_rejected() {
        let mut mock = MockHttpClient::new();
        mock.expect_execute_with_retry()
            .returning(|_, _| Ok(status(401)));

        let result = connector(mock).authenticate(SERVER, "miles", "bad").await;
        assert!(matches!(result, Err(AuthError::AuthenticationFailed { .. })));
    }

    #[tokio::test]
    async fn test_authenticate_unreachable() {
        let mut mock = MockHttpClient::new();
        mock.expect_execute_with_retry().returning(|_, _| {
            Err(BridgeError::OperationFailed("connection refused".to_string()))
        });

        let result = connector(mock).authenticate(SERVER, "miles", "pw").await;
        assert!(matches!(result, Err(AuthError::Transport(_))));
    }

    #[tokio::test]
    async fn test_verify_skips_short_token() {
        let mut mock = MockHttpClient::new();
        mock.expect_execute_with_retry().times(0);

        let short = Credentials::new(SERVER, "1234", "u");
        assert!(!connector(mock).verify(&short).await.unwrap());
    }

    #[tokio::test]
    async fn test_verify_checks_system_info() {
        let mut mock = MockHttpClient::new();
        mock.expect_execute_with_retry()
            .times(1)
            .withf(|req, _| {
                req.url == "http://10.0.0.5:8096/System/Info"
                    && req.timeout == Some(Duration::from_secs(5))
                    && req.headers[AUTHORIZATION_HEADER].contains("Token=\"token-abcdef\"")
            })
            .returning(|_, _| Ok(ok("{}")));

        assert!(connector(mock).verify(&credentials()).await.unwrap());
    }

    #[tokio::test]
    async fn test_verify_rejected_token() {
        let mut mock = MockHttpClient::new();
        mock.expect_execute_with_retry()
            .returning(|_, _| Ok(status(401)));

        assert!(!connector(mock).verify(&credentials()).await.unwrap());
    }

    #[tokio::test]
    async fn test_list_albums() {
        let mut mock = MockHttpClient::new();
        mock.expect_execute_with_retry()
            .times(1)
            .withf(|req, _| {
                req.url
                    == "http://10.0.0.5:8096/Items?IncludeItemTypes=MusicAlbum&Recursive=true&SortBy=SortName"
            })
            .returning(|_, _| {
                Ok(ok(r#"{"Items":[
                    {"Id":"a1","Name":"Kind of Blue","AlbumArtist":"Miles Davis","RunTimeTicks":27480000000},
                    {"Id":"a2","Name":"Blue Train"}
                ]}"#))
            });

        let albums = connector(mock)
            .with_credentials(credentials())
            .list_albums()
            .await
            .unwrap();

        assert_eq!(albums.len(), 2);
        assert_eq!(albums[0].artist.as_deref(), Some("Miles Davis"));
        assert_eq!(albums[0].duration.as_secs(), 2748);
        assert_eq!(albums[1].artist, None);
    }

    #[tokio::test]
    async fn test_list_tracks() {
        let mut mock = MockHttpClient::new();
        mock.expect_execute_with_retry()
            .times(1)
            .withf(|req, _| req.url == "http://10.0.0.5:8096/Items?ParentId=a%201&SortBy=IndexNumber")
            .returning(|_, _| {
                Ok(ok(r#"{"Items":[
                    {"Id":"t1","Name":"So What","Album":"Kind of Blue","RunTimeTicks":5620000000,"IndexNumber":1},
                    {"Id":"t2","Name":"Untitled"}
                ]}"#))
            });

        let tracks = connector(mock)
            .with_credentials(credentials())
            .list_tracks("a 1")
            .await
            .unwrap();

        assert_eq!(tracks[0].album, "Kind of Blue");
        assert_eq!(tracks[0].duration_secs(), 562);
        assert_eq!(tracks[1].album, "Unknown Album");
        assert_eq!(tracks[1].duration_secs(), 0);
    }

    #[tokio::test]
    async fn test_listing_requires_credentials() {
        let mut mock = MockHttpClient::new();
        mock.expect_execute_with_retry().times(0);

        let result = connector(mock).list_albums().await;
        assert!(matches!(result, Err(LibraryError::NotAuthenticated)));
    }

    #[tokio::test]
    async fn test_oversized_listing_rejected() {
        let mut mock = MockHttpClient::new();
        mock.expect_execute_with_retry().returning(|_, _| {
            let mut body = String::from(r#"{"Items":[],"Padding":""#);
            body.push_str(&"x".repeat(MAX_RESPONSE_BYTES));
            body.push_str("\"}");
            Ok(ok(&body))
        });

        let result = connector(mock)
            .with_credentials(credentials())
            .list_albums()
            .await;
        assert!(matches!(result, Err(LibraryError::Parse(_))));
    }

    #[tokio::test]
    async fn test_listing_server_error() {
        let mut mock = MockHttpClient::new();
        mock.expect_execute_with_retry()
            .returning(|_, _| Ok(status(500)));

        let result = connector(mock)
            .with_credentials(credentials())
            .list_tracks("a1")
            .await;
        assert!(result.unwrap_err().is_transport());
    }

    #[tokio::test]
    async fn test_open_stream() {
        let mut mock = MockHttpClient::new();
        mock.expect_stream()
            .times(1)
            .withf(|req| {
                req.url.starts_with("http://10.0.0.5:8096/Audio/t1/stream?")
                    && req.url.contains("api_key=token-abcdef")
                    && !req.headers[AUTHORIZATION_HEADER].contains("Token=")
            })
            .returning(|_| {
                let chunks: Vec<bridge_traits::error::Result<Bytes>> = vec![
                    Ok(Bytes::from_static(&[1, 2, 3])),
                    Ok(Bytes::from_static(&[4])),
                ];
                Ok(Box::pin(futures::stream::iter(chunks)))
            });

        let connector = connector(mock).with_credentials(credentials());
        let mut stream = connector
            .open_stream(&Track::new("t1", "So What"), PcmFormat::default())
            .await
            .unwrap();

        let mut received = Vec::new();
        while let Some(chunk) = stream.next().await {
            received.extend_from_slice(&chunk.unwrap());
        }
        assert_eq!(received, vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_open_stream_http_error_is_network() {
        let mut mock = MockHttpClient::new();
        mock.expect_stream().returning(|_| {
            Err(BridgeError::HttpStatus {
                status: 404,
                message: "Not Found".to_string(),
            })
        });

        let connector = connector(mock).with_credentials(credentials());
        let result = connector
            .open_stream(&Track::new("gone", "Gone"), PcmFormat::default())
            .await;
        assert!(matches!(result, Err(PlaybackError::Network(_))));
    }
}
