//! Audio hardware bridge traits and PCM types.
//!
//! The core never decodes or resamples: the media server delivers linear PCM in
//! one pre-agreed [`PcmFormat`], the core slices it into fixed-size blocks, and
//! the host output plays those blocks back in order. The two sides meet at
//! [`BlockSource`], which the output pulls from on its own real-time cadence.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::error::Result;

/// Linear PCM output format shared by the stream source and the hardware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PcmFormat {
    /// Sample rate in hertz.
    pub sample_rate: u32,
    /// Interleaved channel count.
    pub channels: u16,
    /// Bits per sample (signed little-endian integers).
    pub bits_per_sample: u16,
}

impl PcmFormat {
    /// Signed 16-bit interleaved stereo at `sample_rate`.
    pub const fn stereo_s16(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            channels: 2,
            bits_per_sample: 16,
        }
    }

    /// Size of one frame (one sample for every channel) in bytes.
    pub fn bytes_per_frame(&self) -> usize {
        self.channels as usize * (self.bits_per_sample as usize / 8)
    }

    /// Bytes consumed per second of playback.
    pub fn bytes_per_second(&self) -> usize {
        self.bytes_per_frame() * self.sample_rate as usize
    }

    /// Bit rate requested from servers that transcode on the fly.
    pub fn bit_rate(&self) -> u32 {
        self.sample_rate * self.channels as u32 * self.bits_per_sample as u32
    }

    /// Number of whole frames contained in `bytes`.
    pub fn frames_in(&self, bytes: usize) -> usize {
        match self.bytes_per_frame() {
            0 => 0,
            frame => bytes / frame,
        }
    }

    /// Playback duration of `frames` frames.
    pub fn frames_to_duration(&self, frames: u64) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_nanos(frames.saturating_mul(1_000_000_000) / self.sample_rate as u64)
    }
}

impl Default for PcmFormat {
    fn default() -> Self {
        Self::stereo_s16(48_000)
    }
}

/// One block of PCM handed from the core to the hardware.
#[derive(Debug, Clone)]
pub struct PcmBlock {
    /// Slot index inside the core's ring; passed back to [`BlockSource::release`].
    pub index: usize,
    /// Interleaved PCM bytes. Always a whole block except for the final block
    /// of a stream, which may be shorter.
    pub data: Bytes,
    /// Number of whole frames in `data`.
    pub frames: usize,
}

impl PcmBlock {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Consumer side of the core's block ring.
///
/// Called from the hardware context. Implementations never block: when no block
/// is ready, [`next_block`](BlockSource::next_block) returns `None` and the
/// output should wait and retry (or emit silence) instead of replaying stale
/// data.
pub trait BlockSource: Send + Sync {
    /// Take the oldest completely written block. `None` signals an under-run or
    /// a closed source.
    fn next_block(&self) -> Option<PcmBlock>;

    /// Report that the hardware finished playing block `index`.
    fn release(&self, index: usize);

    /// `false` once the owning session was stopped; outputs should stop pulling.
    fn is_active(&self) -> bool;
}

/// Fixed-format hardware audio channel.
///
/// The engine opens the channel once per playback session, toggles pause, and
/// resets it before the next session starts. Implementations own whatever
/// thread or callback drives the device and pull blocks from the provided
/// [`BlockSource`].
pub trait AudioOutput: Send {
    /// Configure the channel for `format` and start pulling from `source`.
    fn open(&mut self, format: PcmFormat, source: Arc<dyn BlockSource>) -> Result<()>;

    /// Suspend or resume the channel without discarding queued blocks.
    fn set_paused(&mut self, paused: bool) -> Result<()>;

    /// Stop pulling, drop any queued blocks, and return to the closed state.
    /// Must be safe to call when the channel was never opened.
    fn reset(&mut self) -> Result<()>;

    /// Human-readable backend name for logs.
    fn name(&self) -> &str {
        "audio-output"
    }
}
