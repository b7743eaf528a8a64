//! # Playback Configuration
//!
//! Sizes and timings for the block ring, the stream producer, and the
//! transition policy.

use bridge_traits::playback::PcmFormat;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Size of one ring block in bytes.
pub const AUDIO_BUF_SIZE: usize = 32 * 1024;

/// Number of blocks in the ring.
pub const NUM_BUFFERS: usize = 16;

/// Fixed output sample rate agreed with the server and the hardware.
pub const HARDWARE_RATE: u32 = 48_000;

/// Lower bound for the minimum viable stream size used by the presets.
pub const MIN_VIABLE_FLOOR: usize = 4 * 1024;

/// Playback engine configuration.
///
/// Memory held by the ring never exceeds `block_size * block_count` bytes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackConfig {
    /// Bytes per ring block.
    ///
    /// Must be a multiple of the PCM frame size.
    ///
    /// Default: 32 KiB (~170 ms of 48 kHz stereo 16-bit audio).
    #[serde(default = "default_block_size")]
    pub block_size: usize,

    /// Number of blocks in the ring.
    ///
    /// Default: 16.
    #[serde(default = "default_block_count")]
    pub block_count: usize,

    /// PCM format requested from the server and opened on the hardware.
    ///
    /// Default: 48 kHz, stereo, signed 16-bit.
    #[serde(default = "default_format")]
    pub format: PcmFormat,

    /// Elapsed time after which `previous` restarts the current track
    /// instead of moving back in the queue.
    ///
    /// Default: 3 seconds.
    #[serde(default = "default_restart_threshold")]
    pub restart_threshold: Duration,

    /// Upper bound on any single producer wait before the cancellation flag
    /// is checked again.
    ///
    /// Default: 50 ms.
    #[serde(default = "default_poll_interval")]
    pub poll_interval: Duration,

    /// Longest wait for the next chunk of an open stream before the track
    /// fails as a network error. Time spent paused does not count.
    ///
    /// Default: 15 seconds.
    #[serde(default = "default_read_timeout")]
    pub read_timeout: Duration,

    /// Streams delivering fewer bytes than this are reported as a format
    /// failure and skipped.
    ///
    /// Default: one block.
    #[serde(default = "default_min_viable_bytes")]
    pub min_viable_bytes: usize,

    /// Interval between `PositionChanged` events while playing.
    ///
    /// Default: 1 second.
    #[serde(default = "default_position_interval")]
    pub position_interval: Duration,

    /// Capacity of the event bus the engine creates when none is supplied.
    ///
    /// Default: 64.
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,

    /// Seed for the shuffle generator. `None` seeds from entropy.
    #[serde(default)]
    pub shuffle_seed: Option<u64>,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            block_size: default_block_size(),
            block_count: default_block_count(),
            format: default_format(),
            restart_threshold: default_restart_threshold(),
            poll_interval: default_poll_interval(),
            read_timeout: default_read_timeout(),
            min_viable_bytes: default_min_viable_bytes(),
            position_interval: default_position_interval(),
            event_buffer: default_event_buffer(),
            shuffle_seed: None,
        }
    }
}

impl PlaybackConfig {
    /// Smaller ring for devices with little RAM.
    ///
    /// - 8 KiB blocks
    /// - 8 blocks (~340 ms of audio buffered)
    pub fn low_memory() -> Self {
        Self {
            block_size: 8 * 1024,
            block_count: 8,
            min_viable_bytes: MIN_VIABLE_FLOOR,
            ..Default::default()
        }
    }

    /// Total bytes the ring can hold.
    pub fn ring_capacity_bytes(&self) -> usize {
        self.block_size.saturating_mul(self.block_count)
    }

    /// Playback time covered by a full ring.
    pub fn buffered_duration(&self) -> Duration {
        let frames = self.format.frames_in(self.ring_capacity_bytes()) as u64;
        self.format.frames_to_duration(frames)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.format.sample_rate == 0 {
            return Err("format.sample_rate must be > 0".to_string());
        }

        let frame = self.format.bytes_per_frame();
        if frame == 0 {
            return Err("format must have at least one channel of 8+ bits".to_string());
        }

        if self.block_size == 0 {
            return Err("block_size must be > 0".to_string());
        }

        if self.block_size % frame != 0 {
            return Err(format!(
                "block_size ({}) must be a multiple of the frame size ({})",
                self.block_size, frame
            ));
        }

        if self.block_count < 2 {
            return Err("block_count must be >= 2".to_string());
        }

        if self.poll_interval.is_zero() {
            return Err("poll_interval must be > 0".to_string());
        }

        if self.read_timeout.is_zero() {
            return Err("read_timeout must be > 0".to_string());
        }

        if self.position_interval.is_zero() {
            return Err("position_interval must be > 0".to_string());
        }

        if self.event_buffer == 0 {
            return Err("event_buffer must be > 0".to_string());
        }

        Ok(())
    }
}

fn default_block_size() -> usize {
    AUDIO_BUF_SIZE
}

fn default_block_count() -> usize {
    NUM_BUFFERS
}

fn default_format() -> PcmFormat {
    PcmFormat::stereo_s16(HARDWARE_RATE)
}

fn default_restart_threshold() -> Duration {
    Duration::from_secs(3)
}

fn default_poll_interval() -> Duration {
    Duration::from_millis(50)
}

fn default_read_timeout() -> Duration {
    Duration::from_secs(15)
}

fn default_min_viable_bytes() -> usize {
    AUDIO_BUF_SIZE.max(MIN_VIABLE_FLOOR)
}

fn default_position_interval() -> Duration {
    Duration::from_secs(1)
}

fn default_event_buffer() -> usize {
    64
}
