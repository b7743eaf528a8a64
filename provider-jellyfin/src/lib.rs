//! # Jellyfin Provider
//!
//! Connects the core to a Jellyfin (or Emby-compatible) media server.
//!
//! ## Overview
//!
//! [`JellyfinConnector`] implements the three server-facing seams:
//! - `core_auth::Authenticator`: username/password login and saved-session checks
//! - `core_library::CatalogClient`: album and track listings
//! - `core_playback::AudioStreamSource`: raw PCM streams transcoded by the server

pub mod connector;
pub mod error;
pub mod types;

pub use connector::{JellyfinConnector, AUTHORIZATION_HEADER, MAX_RESPONSE_BYTES};
pub use error::{JellyfinError, Result};
