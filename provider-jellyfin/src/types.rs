//! Jellyfin API request and response types
//!
//! Only the fields the client reads are modelled; everything else in the
//! server's payloads is ignored.

use core_library::{Album, Ticks, Track, UNKNOWN_ALBUM};
use serde::{Deserialize, Serialize};

/// Body of `POST /Users/authenticatebyname`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct AuthenticateByName {
    pub username: String,
    pub pw: String,
}

/// Response of `POST /Users/authenticatebyname`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AuthenticationResult {
    #[serde(default)]
    pub access_token: Option<String>,

    #[serde(default)]
    pub user: Option<UserDto>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UserDto {
    pub id: String,

    #[serde(default)]
    pub name: Option<String>,
}

/// Response of `GET /Items`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ItemsResponse {
    #[serde(default)]
    pub items: Vec<BaseItem>,

    #[serde(default)]
    pub total_record_count: Option<u64>,
}

/// One catalog entry, album or audio track.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BaseItem {
    pub id: String,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub album: Option<String>,

    #[serde(default)]
    pub album_id: Option<String>,

    #[serde(default)]
    pub album_artist: Option<String>,

    /// Run time in 100 ns ticks
    #[serde(default)]
    pub run_time_ticks: Option<i64>,

    #[serde(default)]
    pub index_number: Option<u32>,
}

impl BaseItem {
    fn duration(&self) -> Ticks {
        Ticks(self.run_time_ticks.unwrap_or(0))
    }

    pub fn into_track(self) -> Track {
        let duration = self.duration();
        Track {
            id: self.id,
            name: self.name,
            album: self.album.unwrap_or_else(|| UNKNOWN_ALBUM.to_string()),
            album_id: self.album_id,
            index_number: self.index_number,
            duration,
        }
    }

    pub fn into_album(self) -> Album {
        let duration = self.duration();
        Album {
            id: self.id,
            name: self.name,
            artist: self.album_artist,
            duration,
        }
    }
}
