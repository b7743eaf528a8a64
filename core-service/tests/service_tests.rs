//! End-to-end tests of the service façade against a scripted server.

use async_trait::async_trait;
use bridge_desktop::{JsonFileStore, PacedAudioOutput};
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::http::{ByteStream, HttpClient, HttpRequest, HttpResponse, RetryPolicy};
use bridge_traits::SettingsStore;
use bytes::Bytes;
use core_auth::AuthState;
use core_playback::{LoopMode, PlaybackConfig};
use core_runtime::config::CoreConfig;
use core_runtime::events::{CoreEvent, PlaybackEvent};
use core_service::{CoreError, CoreService, LOOP_MODE_KEY};
use mockall::mock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

mock! {
    Server {}

    #[async_trait]
    impl HttpClient for Server {
        async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse>;
        async fn execute_with_retry(
            &self,
            request: HttpRequest,
            policy: RetryPolicy,
        ) -> BridgeResult<HttpResponse>;
        async fn stream(&self, request: HttpRequest) -> BridgeResult<ByteStream>;
    }
}

const SERVER: &str = "http://127.0.0.1:8096";

fn json(body: &str) -> HttpResponse {
    HttpResponse {
        status: 200,
        headers: HashMap::new(),
        body: Bytes::from(body.to_string()),
    }
}

/// Answers login, session checks, listings and streams like a small server.
fn route(request: &HttpRequest) -> BridgeResult<HttpResponse> {
    let path = request.url.trim_start_matches(SERVER);
    if path == "/Users/authenticatebyname" {
        Ok(json(r#"{"AccessToken":"token-xyz-123","User":{"Id":"user-7"}}"#))
    } else if path == "/System/Info" {
        Ok(json(r#"{"Version":"10.9.0"}"#))
    } else if path.starts_with("/Items?IncludeItemTypes=MusicAlbum") {
        Ok(json(r#"{"Items":[{"Id":"alb1","Name":"Test Album"}]}"#))
    } else if path.starts_with("/Items?ParentId=alb1") {
        Ok(json(
            r#"{"Items":[
                {"Id":"t1","Name":"One","Album":"Test Album","RunTimeTicks":10000000},
                {"Id":"t2","Name":"Two","Album":"Test Album","RunTimeTicks":10000000}
            ]}"#,
        ))
    } else if path.starts_with("/Items?ParentId=") {
        Ok(json(r#"{"Items":[]}"#))
    } else {
        Err(BridgeError::HttpStatus {
            status: 404,
            message: path.to_string(),
        })
    }
}

fn server() -> MockServer {
    let mut server = MockServer::new();
    server
        .expect_execute_with_retry()
        .returning(|request, _| route(&request));
    server.expect_stream().returning(|_| {
        let chunks: Vec<BridgeResult<Bytes>> = (0..4)
            .map(|_| Ok(Bytes::from(vec![0u8; 4096])))
            .collect();
        Ok(Box::pin(futures::stream::iter(chunks)))
    });
    server
}

struct Harness {
    _dir: TempDir,
    store: Arc<JsonFileStore>,
}

impl Harness {
    async fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(JsonFileStore::open(dir.path().join("config.json")).await.unwrap());
        Self { _dir: dir, store }
    }

    fn service(&self, http: MockServer) -> CoreService {
        let config = CoreConfig::builder()
            .client_name("Emberplay Tests")
            .device_name("ci")
            .device_id("device-ci")
            .http_client(Arc::new(http))
            .secure_store(self.store.clone())
            .settings_store(self.store.clone())
            .build()
            .unwrap();

        let playback = PlaybackConfig {
            shuffle_seed: Some(7),
            ..PlaybackConfig::low_memory()
        };
        CoreService::new(
            config,
            playback,
            Box::new(PacedAudioOutput::with_time_scale(0.0)),
        )
        .unwrap()
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_signed_out_start() {
    let harness = Harness::new().await;
    let mut http = MockServer::new();
    http.expect_execute_with_retry().times(0);
    let core = harness.service(http);

    assert_eq!(core.start(false).await.unwrap(), AuthState::LoginRequired);
    assert!(core.albums().await.is_empty());
    assert!(matches!(
        core.play_album("alb1", 0).await,
        Err(CoreError::NotAuthenticated)
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_login_is_remembered() {
    let harness = Harness::new().await;

    let core = harness.service(server());
    core.start(false).await.unwrap();
    let credentials = core.login(SERVER, "alice", "pw").await.unwrap();
    assert_eq!(credentials.user_id, "user-7");
    assert_eq!(core.auth_state().await, AuthState::Authenticated);
    assert_eq!(core.albums().await.len(), 1);

    let restarted = harness.service(server());
    assert_eq!(
        restarted.start(false).await.unwrap(),
        AuthState::Authenticated
    );
    assert_eq!(
        restarted.suggested_server_url().await.as_deref(),
        Some(SERVER)
    );
    assert_eq!(restarted.tracks("alb1").await.len(), 2);

    let forced = harness.service(server());
    assert_eq!(forced.start(true).await.unwrap(), AuthState::LoginRequired);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_sign_out_forgets_session() {
    let harness = Harness::new().await;
    let core = harness.service(server());
    core.start(false).await.unwrap();
    core.login(SERVER, "alice", "pw").await.unwrap();

    core.sign_out().await.unwrap();
    assert_eq!(core.auth_state().await, AuthState::LoginRequired);

    let mut http = MockServer::new();
    http.expect_execute_with_retry().times(0);
    let restarted = harness.service(http);
    assert_eq!(
        restarted.start(false).await.unwrap(),
        AuthState::LoginRequired
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_play_album_streams_first_track() {
    let harness = Harness::new().await;
    let core = harness.service(server());
    core.start(false).await.unwrap();
    core.login(SERVER, "alice", "pw").await.unwrap();

    let mut events = core.subscribe();
    core.play_album("alb1", 0).await.unwrap();

    let started = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if let Ok(CoreEvent::Playback(PlaybackEvent::Started { track_id, .. })) =
                events.recv().await
            {
                return track_id;
            }
        }
    })
    .await
    .unwrap();
    assert_eq!(started, "t1");

    let now = core.now_playing().await.unwrap();
    assert_eq!(now.track.album, "Test Album");
    core.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_empty_album_rejected() {
    let harness = Harness::new().await;
    let core = harness.service(server());
    core.start(false).await.unwrap();
    core.login(SERVER, "alice", "pw").await.unwrap();

    assert!(matches!(
        core.play_album("empty", 0).await,
        Err(CoreError::EmptyAlbum(_))
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_preferences_restored_on_start() {
    let harness = Harness::new().await;

    let core = harness.service(server());
    core.start(false).await.unwrap();
    assert_eq!(core.cycle_loop_mode().await, LoopMode::All);
    assert!(core.toggle_shuffle().await.unwrap());
    assert_eq!(
        harness.store.get_string(LOOP_MODE_KEY).await.unwrap().as_deref(),
        Some("all")
    );

    let restarted = harness.service(server());
    restarted.start(false).await.unwrap();
    assert_eq!(restarted.engine().loop_mode().await, LoopMode::All);
    assert!(restarted.engine().is_shuffled().await);
}
