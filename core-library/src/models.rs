//! Domain models for the remote music catalog
//!
//! Items are produced by a [`CatalogClient`](crate::catalog::CatalogClient)
//! and are read-only to the rest of the core.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Fixed-point duration resolution used by the media server (100 ns units).
pub const TICKS_PER_SECOND: i64 = 10_000_000;

/// Album label used when the server does not name one.
pub const UNKNOWN_ALBUM: &str = "Unknown Album";

// =============================================================================
// Ticks
// =============================================================================

/// Duration in server ticks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ticks(pub i64);

impl Ticks {
    pub const ZERO: Ticks = Ticks(0);

    pub fn from_secs(secs: u64) -> Self {
        Self((secs as i64).saturating_mul(TICKS_PER_SECOND))
    }

    pub fn from_duration(duration: Duration) -> Self {
        let whole = (duration.as_secs() as i64).saturating_mul(TICKS_PER_SECOND);
        Self(whole.saturating_add(duration.subsec_nanos() as i64 / 100))
    }

    /// Whole seconds; negative values clamp to zero.
    pub fn as_secs(self) -> u64 {
        (self.0.max(0) / TICKS_PER_SECOND) as u64
    }

    pub fn as_duration(self) -> Duration {
        let ticks = self.0.max(0);
        Duration::new(
            (ticks / TICKS_PER_SECOND) as u64,
            ((ticks % TICKS_PER_SECOND) * 100) as u32,
        )
    }
}

impl From<Duration> for Ticks {
    fn from(duration: Duration) -> Self {
        Self::from_duration(duration)
    }
}

impl fmt::Display for Ticks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secs = self.as_secs();
        write!(f, "{}:{:02}", secs / 60, secs % 60)
    }
}

// =============================================================================
// Domain Models
// =============================================================================

/// Playable audio item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    /// Server item identifier
    pub id: String,
    /// Display name
    pub name: String,
    /// Containing album name
    pub album: String,
    /// Containing album identifier, when known
    pub album_id: Option<String>,
    /// Position on the album
    pub index_number: Option<u32>,
    /// Run time
    pub duration: Ticks,
}

impl Track {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            album: UNKNOWN_ALBUM.to_string(),
            album_id: None,
            index_number: None,
            duration: Ticks::ZERO,
        }
    }

    pub fn with_album(mut self, album: impl Into<String>) -> Self {
        self.album = album.into();
        self
    }

    pub fn with_album_id(mut self, album_id: impl Into<String>) -> Self {
        self.album_id = Some(album_id.into());
        self
    }

    pub fn with_duration(mut self, duration: Ticks) -> Self {
        self.duration = duration;
        self
    }

    pub fn duration_secs(&self) -> u64 {
        self.duration.as_secs()
    }

    /// Validate track data
    pub fn validate(&self) -> Result<(), String> {
        if self.id.trim().is_empty() {
            return Err("Track id cannot be empty".to_string());
        }

        if self.duration.0 < 0 {
            return Err("Track duration cannot be negative".to_string());
        }

        Ok(())
    }
}

impl fmt::Display for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.album)
    }
}

/// Group of tracks as listed by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Album {
    pub id: String,
    pub name: String,
    /// Album artist, when the server reports one
    pub artist: Option<String>,
    /// Combined run time of the album's tracks
    pub duration: Ticks,
}

impl Album {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            artist: None,
            duration: Ticks::ZERO,
        }
    }

    /// Validate album data
    pub fn validate(&self) -> Result<(), String> {
        if self.id.trim().is_empty() {
            return Err("Album id cannot be empty".to_string());
        }

        if self.name.trim().is_empty() {
            return Err("Album name cannot be empty".to_string());
        }

        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ticks_conversion() {
        let ticks = Ticks(2_455_000_000);
        assert_eq!(ticks.as_secs(), 245);
        assert_eq!(ticks.as_duration(), Duration::from_millis(245_500));
        assert_eq!(Ticks::from_secs(3), Ticks(30_000_000));
        assert_eq!(Ticks::from(Duration::from_millis(1_500)), Ticks(15_000_000));
    }

    #[test]
    fn test_negative_ticks_clamp() {
        assert_eq!(Ticks(-5).as_secs(), 0);
        assert_eq!(Ticks(-5).as_duration(), Duration::ZERO);
    }

    #[test]
    fn test_ticks_display() {
        assert_eq!(Ticks::from_secs(0).to_string(), "0:00");
        assert_eq!(Ticks::from_secs(61).to_string(), "1:01");
        assert_eq!(Ticks::from_secs(3_725).to_string(), "62:05");
    }

    #[test]
    fn test_track_builder() {
        let track = Track::new("abc", "Blue in Green")
            .with_album("Kind of Blue")
            .with_album_id("album-1")
            .with_duration(Ticks::from_secs(337));

        assert_eq!(track.album, "Kind of Blue");
        assert_eq!(track.album_id.as_deref(), Some("album-1"));
        assert_eq!(track.duration_secs(), 337);
        assert_eq!(track.to_string(), "Blue in Green (Kind of Blue)");
        assert!(track.validate().is_ok());
    }

    #[test]
    fn test_track_defaults_to_unknown_album() {
        let track = Track::new("abc", "Untitled");
        assert_eq!(track.album, UNKNOWN_ALBUM);
        assert_eq!(track.duration, Ticks::ZERO);
    }

    #[test]
    fn test_track_validation() {
        let mut track = Track::new(" ", "No id");
        assert!(track.validate().is_err());

        track.id = "t1".to_string();
        track.duration = Ticks(-1);
        assert!(track.validate().is_err());
    }

    #[test]
    fn test_album_validation() {
        let mut album = Album::new("a1", "Valid Album");
        assert!(album.validate().is_ok());

        album.name = "".to_string();
        assert!(album.validate().is_err());
    }
}
