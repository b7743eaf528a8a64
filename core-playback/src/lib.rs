//! # Playback Engine
//!
//! Streams raw PCM from a media server to a fixed-format audio output.
//!
//! ## Overview
//!
//! This crate handles:
//! - A fixed block ring between the network producer and the hardware consumer
//! - One producer task per session, with pause and race-free cancellation
//! - Play order construction (sequential or shuffled)
//! - Loop modes and skip policy after each track
//!
//! The server transcodes to the agreed [`PcmFormat`](bridge_traits::playback::PcmFormat);
//! nothing here decodes or resamples.

pub mod config;
pub mod engine;
pub mod error;
pub mod now_playing;
pub mod queue;
pub mod ring_buffer;
pub mod session;
mod streaming;
pub mod traits;
pub mod transition;

pub use config::{PlaybackConfig, AUDIO_BUF_SIZE, HARDWARE_RATE, NUM_BUFFERS};
pub use engine::PlaybackEngine;
pub use error::{PlaybackError, Result};
pub use now_playing::{format_clock, NowPlaying};
pub use queue::QueueManager;
pub use ring_buffer::{BlockState, RingBuffer, RingStats};
pub use session::{PlaybackSession, SessionOutcome, SessionReport, SessionStats, SessionStatus};
pub use traits::AudioStreamSource;
pub use transition::{LoopMode, Terminal, Transition, TransitionController};
