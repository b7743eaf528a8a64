//! Catalog listing.
//!
//! [`CatalogClient`] is the boundary to the media server. [`CatalogBrowser`]
//! sits in front of it for the rest of the core: a failed listing is logged,
//! published as [`CatalogEvent::LoadFailed`] and treated as "no items".

use crate::error::Result;
use crate::models::{Album, Track};
use async_trait::async_trait;
use core_runtime::events::{CatalogEvent, CoreEvent, EventBus};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Lists the remote catalog.
#[async_trait]
pub trait CatalogClient: Send + Sync {
    /// List every music album visible to the signed-in user, sorted by name.
    async fn list_albums(&self) -> Result<Vec<Album>>;

    /// List the tracks of one album in album order.
    ///
    /// # Arguments
    /// * `album_id` - Server identifier of the album
    async fn list_tracks(&self, album_id: &str) -> Result<Vec<Track>>;
}

/// Error-tolerant front for a [`CatalogClient`].
#[derive(Clone)]
pub struct CatalogBrowser {
    client: Arc<dyn CatalogClient>,
    event_bus: Option<EventBus>,
}

impl CatalogBrowser {
    pub fn new(client: Arc<dyn CatalogClient>) -> Self {
        Self {
            client,
            event_bus: None,
        }
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// Albums, or an empty list when the server could not be reached.
    #[instrument(skip(self))]
    pub async fn albums(&self) -> Vec<Album> {
        match self.client.list_albums().await {
            Ok(albums) => {
                debug!(count = albums.len(), "Listed albums");
                self.emit(CatalogEvent::AlbumsLoaded {
                    count: albums.len(),
                });
                albums
            }
            Err(e) => {
                self.degrade("albums", &e.to_string());
                Vec::new()
            }
        }
    }

    /// Tracks of `album_id`, or an empty list on failure.
    #[instrument(skip(self))]
    pub async fn tracks(&self, album_id: &str) -> Vec<Track> {
        match self.client.list_tracks(album_id).await {
            Ok(tracks) => {
                debug!(count = tracks.len(), "Listed tracks");
                self.emit(CatalogEvent::TracksLoaded {
                    album_id: album_id.to_string(),
                    count: tracks.len(),
                });
                tracks
            }
            Err(e) => {
                self.degrade("tracks", &e.to_string());
                Vec::new()
            }
        }
    }

    fn degrade(&self, listing: &str, message: &str) {
        warn!(listing, error = %message, "Catalog listing failed, showing no items");
        self.emit(CatalogEvent::LoadFailed {
            message: message.to_string(),
        });
    }

    fn emit(&self, event: CatalogEvent) {
        if let Some(bus) = &self.event_bus {
            let _ = bus.emit(CoreEvent::Catalog(event));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LibraryError;
    use crate::models::Ticks;
    use bridge_traits::error::BridgeError;
    use mockall::mock;

    mock! {
        pub Catalog {}

        #[async_trait]
        impl CatalogClient for Catalog {
            async fn list_albums(&self) -> Result<Vec<Album>>;
            async fn list_tracks(&self, album_id: &str) -> Result<Vec<Track>>;
        }
    }

    fn sample_tracks() -> Vec<Track> {
        vec![
            Track::new("t1", "So What").with_duration(Ticks::from_secs(562)),
            Track::new("t2", "Freddie Freeloader").with_duration(Ticks::from_secs(586)),
        ]
    }

    #[tokio::test]
    async fn test_albums_pass_through() {
        let mut client = MockCatalog::new();
        client
            .expect_list_albums()
            .times(1)
            .returning(|| Ok(vec![Album::new("a1", "Kind of Blue")]));

        let bus = EventBus::new(8);
        let mut events = bus.subscribe();
        let browser = CatalogBrowser::new(Arc::new(client)).with_event_bus(bus);

        let albums = browser.albums().await;
        assert_eq!(albums.len(), 1);
        assert_eq!(albums[0].name, "Kind of Blue");
        assert_eq!(
            events.recv().await.unwrap(),
            CoreEvent::Catalog(CatalogEvent::AlbumsLoaded { count: 1 })
        );
    }

    #[tokio::test]
    async fn test_tracks_request_named_album() {
        let mut client = MockCatalog::new();
        client
            .expect_list_tracks()
            .times(1)
            .returning(|album_id: &str| {
                assert_eq!(album_id, "a1");
                Ok(sample_tracks())
            });

        let browser = CatalogBrowser::new(Arc::new(client));
        let tracks = browser.tracks("a1").await;
        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[1].name, "Freddie Freeloader");
    }

    #[tokio::test]
    async fn test_transport_failure_degrades_to_empty() {
        let mut client = MockCatalog::new();
        client.expect_list_tracks().returning(|_: &str| {
            Err(LibraryError::Bridge(BridgeError::OperationFailed(
                "connection refused".to_string(),
            )))
        });
        client
            .expect_list_albums()
            .returning(|| Err(LibraryError::Parse("truncated body".to_string())));

        let bus = EventBus::new(8);
        let mut events = bus.subscribe();
        let browser = CatalogBrowser::new(Arc::new(client)).with_event_bus(bus);

        assert!(browser.tracks("a1").await.is_empty());
        assert!(browser.albums().await.is_empty());

        match events.recv().await.unwrap() {
            CoreEvent::Catalog(CatalogEvent::LoadFailed { message }) => {
                assert!(message.contains("connection refused"));
            }
            other => panic!("unexpected event {:?}", other),
        }
    }
}
