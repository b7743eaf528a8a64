//! # Core Playback Traits
//!
//! The engine sits between two collaborators it does not implement:
//!
//! - **Producer side ([`AudioStreamSource`])**: a media-server connector that
//!   turns a [`Track`] into a stream of raw PCM bytes. Chunks arrive in
//!   arbitrary sizes at arbitrary times.
//! - **Consumer side ([`AudioOutput`](bridge_traits::playback::AudioOutput))**:
//!   the hardware channel, which pulls finished blocks from the ring on its
//!   own real-time cadence.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use core_playback::AudioStreamSource;
//! use core_library::Track;
//! use bridge_traits::playback::PcmFormat;
//! use futures_util::StreamExt;
//!
//! async fn count_bytes(source: &dyn AudioStreamSource, track: &Track) -> core_playback::Result<u64> {
//!     let mut stream = source.open_stream(track, PcmFormat::default()).await?;
//!     let mut total = 0u64;
//!     while let Some(chunk) = stream.next().await {
//!         total += chunk?.len() as u64;
//!     }
//!     Ok(total)
//! }
//! ```

use crate::error::Result;
use async_trait::async_trait;
use bridge_traits::http::ByteStream;
use bridge_traits::playback::PcmFormat;
use core_library::Track;

/// Source of raw linear PCM for a track.
///
/// Implementations request the server to transcode into `format` and return
/// the body as a byte stream. Dropping the stream must end the transfer so
/// that a stopped session stops consuming bandwidth.
#[async_trait]
pub trait AudioStreamSource: Send + Sync {
    /// Open the PCM stream for `track`.
    ///
    /// # Errors
    ///
    /// Returns [`PlaybackError::Network`](crate::PlaybackError::Network) when
    /// the server cannot be reached or answers with a non-success status.
    async fn open_stream(&self, track: &Track, format: PcmFormat) -> Result<ByteStream>;

    /// Name used in logs.
    fn name(&self) -> &str {
        "stream-source"
    }
}
