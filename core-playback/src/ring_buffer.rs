//! # Block Ring for PCM Audio
//!
//! Fixed set of fixed-size blocks passed between the stream producer (an async
//! task) and the hardware consumer (a device thread or callback).
//!
//! ## Design
//!
//! ```text
//!            write()                 drain()               release()
//!   Free ──────────────▶ Filling ──────────▶ Full ─────────▶ Queued ─────────▶ Free
//!         producer enters      block is exactly     handed to       hardware done
//!                              full (or finish())   hardware
//! ```
//!
//! - Every block is in exactly one state. Both cursors advance modulo the
//!   block count in strict rotation, so blocks reach the hardware in write
//!   order.
//! - The producer only enters a block that is `Free`; when the next block is
//!   still owned by the hardware it waits. That wait is the only throttle and
//!   bounds memory to `block_size * block_count`.
//! - A block is only handed to the consumer once exactly full. The one
//!   exception is the final block of a stream, flushed by [`RingBuffer::finish`].
//! - Cancellation is a [`CancellationToken`] checked at every wait point and on
//!   every append. Once cancelled, writes fail with
//!   [`PlaybackError::Cancelled`] and drains return nothing.
//!
//! The ring is reused across sessions: [`RingBuffer::reset`] returns every
//! block to `Free`, installs a fresh token and bumps the generation.
//!
//! ## Usage
//!
//! ```rust
//! use core_playback::ring_buffer::{BlockState, RingBuffer};
//! use bridge_traits::playback::PcmFormat;
//! use std::time::Duration;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> core_playback::Result<()> {
//! let ring = RingBuffer::new(8, 4, PcmFormat::default(), Duration::from_millis(10));
//!
//! // Producer: 12 bytes fill one block and start the next
//! ring.write(&[1u8; 12]).await?;
//! assert_eq!(ring.block_states()[0], BlockState::Full);
//!
//! // Consumer: take the block, play it, hand it back
//! let block = ring.drain().expect("one full block");
//! assert_eq!(block.data.len(), 8);
//! ring.release(block.index);
//! # Ok(())
//! # }
//! ```

use crate::config::PlaybackConfig;
use crate::error::{PlaybackError, Result};
use bridge_traits::playback::{BlockSource, PcmBlock, PcmFormat};
use bytes::{Bytes, BytesMut};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Ownership state of one ring block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockState {
    /// Available to the producer.
    Free,
    /// Owned by the producer, partially written.
    Filling,
    /// Completely written, waiting for the hardware.
    Full,
    /// Handed to the hardware, not yet released.
    Queued,
}

/// Counters for the current generation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RingStats {
    /// Bytes accepted by `write`.
    pub bytes_written: u64,
    /// Bytes inside blocks marked `Full`.
    pub bytes_committed: u64,
    pub blocks_committed: u64,
    /// Blocks handed to the hardware.
    pub blocks_submitted: u64,
    /// Frames handed to the hardware; the elapsed-time source.
    pub frames_submitted: u64,
    /// Times the hardware found no block ready mid-stream.
    pub underruns: u64,
}

struct RingState {
    states: Vec<BlockState>,
    blocks: Vec<Option<Bytes>>,
    write_index: usize,
    read_index: usize,
    staging: BytesMut,
    end_of_stream: bool,
    starved: bool,
    generation: u64,
    cancel: CancellationToken,
    stats: RingStats,
    first_drain: Option<Box<dyn FnOnce() + Send>>,
}

struct RingInner {
    block_size: usize,
    format: PcmFormat,
    poll_interval: Duration,
    state: Mutex<RingState>,
    released: Notify,
}

/// Shared block ring. Cloning shares the same blocks.
#[derive(Clone)]
pub struct RingBuffer {
    inner: Arc<RingInner>,
}

impl RingBuffer {
    /// Create a ring of `block_count` blocks of `block_size` bytes.
    ///
    /// `poll_interval` bounds every wait so that cancellation is observed
    /// even if a wake-up is missed.
    pub fn new(
        block_size: usize,
        block_count: usize,
        format: PcmFormat,
        poll_interval: Duration,
    ) -> Self {
        let block_size = block_size.max(1);
        let block_count = block_count.max(1);
        Self {
            inner: Arc::new(RingInner {
                block_size,
                format,
                poll_interval,
                state: Mutex::new(RingState {
                    states: vec![BlockState::Free; block_count],
                    blocks: vec![None; block_count],
                    write_index: 0,
                    read_index: 0,
                    staging: BytesMut::with_capacity(block_size),
                    end_of_stream: false,
                    starved: false,
                    generation: 0,
                    cancel: CancellationToken::new(),
                    stats: RingStats::default(),
                    first_drain: None,
                }),
                released: Notify::new(),
            }),
        }
    }

    pub fn from_config(config: &PlaybackConfig) -> Self {
        Self::new(
            config.block_size,
            config.block_count,
            config.format,
            config.poll_interval,
        )
    }

    pub fn block_size(&self) -> usize {
        self.inner.block_size
    }

    pub fn block_count(&self) -> usize {
        self.inner.state.lock().states.len()
    }

    pub fn format(&self) -> PcmFormat {
        self.inner.format
    }

    pub fn generation(&self) -> u64 {
        self.inner.state.lock().generation
    }

    /// Token of the current generation.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.inner.state.lock().cancel.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.state.lock().cancel.is_cancelled()
    }

    /// Return every block to `Free`, drop buffered data, zero the counters,
    /// and start a new generation.
    ///
    /// The previous producer must have been joined and the hardware reset
    /// before calling this.
    pub fn reset(&self) -> u64 {
        let mut state = self.inner.state.lock();
        state.cancel.cancel();
        state.cancel = CancellationToken::new();
        state.states.fill(BlockState::Free);
        state.blocks.iter_mut().for_each(|block| *block = None);
        state.write_index = 0;
        state.read_index = 0;
        state.staging.clear();
        state.end_of_stream = false;
        state.starved = false;
        state.stats = RingStats::default();
        state.first_drain = None;
        state.generation += 1;
        debug!(generation = state.generation, "Ring reset");
        state.generation
    }

    /// Run `hook` once, right after the first block of `generation` is
    /// handed to the hardware. Ignored when `generation` is no longer current;
    /// runs at once if a block was already handed out.
    pub fn on_first_drain(&self, generation: u64, hook: impl FnOnce() + Send + 'static) {
        let mut state = self.inner.state.lock();
        if state.generation != generation || state.cancel.is_cancelled() {
            return;
        }
        if state.stats.blocks_submitted > 0 {
            drop(state);
            hook();
        } else {
            state.first_drain = Some(Box::new(hook));
        }
    }

    /// Cancel the current generation. Pending and future waits return
    /// immediately.
    pub fn cancel(&self) {
        self.inner.state.lock().cancel.cancel();
        self.inner.released.notify_one();
    }

    /// Cancel only if `generation` is still current. Returns whether it was.
    pub fn cancel_generation(&self, generation: u64) -> bool {
        let current = {
            let state = self.inner.state.lock();
            if state.generation == generation {
                state.cancel.cancel();
                true
            } else {
                false
            }
        };
        if current {
            self.inner.released.notify_one();
        }
        current
    }

    /// Append `data` to the stream, committing blocks as they fill.
    ///
    /// Waits while the next block in rotation is still owned by the hardware.
    /// Returns the number of bytes written, which is all of `data` unless the
    /// generation is cancelled, in which case the remainder is discarded and
    /// `PlaybackError::Cancelled` is returned.
    pub async fn write(&self, data: &[u8]) -> Result<usize> {
        let mut remaining = data;
        while !remaining.is_empty() {
            self.wait_for_write_slot().await?;
            let taken = self.fill(remaining)?;
            remaining = &remaining[taken..];
        }
        Ok(data.len())
    }

    fn fill(&self, data: &[u8]) -> Result<usize> {
        let mut state = self.inner.state.lock();
        if state.cancel.is_cancelled() {
            return Err(PlaybackError::Cancelled);
        }

        let slot = state.write_index;
        let current = state.states[slot];
        match current {
            BlockState::Free => state.states[slot] = BlockState::Filling,
            BlockState::Filling => {}
            // Another wake-up raced us; the caller waits again.
            BlockState::Full | BlockState::Queued => return Ok(0),
        }

        let room = self.inner.block_size - state.staging.len();
        let take = room.min(data.len());
        state.staging.extend_from_slice(&data[..take]);
        state.stats.bytes_written += take as u64;

        if state.staging.len() == self.inner.block_size {
            self.commit(&mut state);
        }
        Ok(take)
    }

    fn commit(&self, state: &mut RingState) {
        let slot = state.write_index;
        let data = state.staging.split().freeze();
        state.stats.bytes_committed += data.len() as u64;
        state.stats.blocks_committed += 1;
        state.blocks[slot] = Some(data);
        state.states[slot] = BlockState::Full;
        state.write_index = (slot + 1) % state.states.len();
        state.staging.reserve(self.inner.block_size);
        trace!(block = slot, "Block committed");
    }

    fn write_slot_available(&self) -> bool {
        let state = self.inner.state.lock();
        matches!(
            state.states[state.write_index],
            BlockState::Free | BlockState::Filling
        )
    }

    async fn wait_for_write_slot(&self) -> Result<()> {
        let token = self.cancellation_token();
        loop {
            if token.is_cancelled() {
                return Err(PlaybackError::Cancelled);
            }
            if self.write_slot_available() {
                return Ok(());
            }
            tokio::select! {
                _ = token.cancelled() => return Err(PlaybackError::Cancelled),
                _ = self.inner.released.notified() => {}
                _ = tokio::time::sleep(self.inner.poll_interval) => {}
            }
        }
    }

    /// Mark the end of the stream, handing the partially written last block
    /// (if any) to the consumer.
    pub fn finish(&self) -> Result<()> {
        let mut state = self.inner.state.lock();
        if state.cancel.is_cancelled() {
            return Err(PlaybackError::Cancelled);
        }
        if !state.staging.is_empty() {
            self.commit(&mut state);
        }
        state.end_of_stream = true;
        Ok(())
    }

    /// Take the oldest full block, or `None` when nothing is ready.
    ///
    /// Called from the hardware context; never blocks beyond the state lock.
    pub fn drain(&self) -> Option<PcmBlock> {
        let mut state = self.inner.state.lock();
        if state.cancel.is_cancelled() {
            return None;
        }

        let slot = state.read_index;
        if state.states[slot] != BlockState::Full {
            if !state.starved && !state.end_of_stream && state.stats.blocks_submitted > 0 {
                state.stats.underruns += 1;
                trace!(block = slot, "Under-run");
            }
            state.starved = true;
            return None;
        }

        let data = state.blocks[slot].take()?;
        let frames = self.inner.format.frames_in(data.len());
        state.states[slot] = BlockState::Queued;
        state.read_index = (slot + 1) % state.states.len();
        state.starved = false;
        state.stats.blocks_submitted += 1;
        state.stats.frames_submitted += frames as u64;

        let hook = if state.stats.blocks_submitted == 1 {
            state.first_drain.take()
        } else {
            None
        };
        drop(state);
        if let Some(hook) = hook {
            hook();
        }

        Some(PcmBlock {
            index: slot,
            data,
            frames,
        })
    }

    /// Return block `index` to the producer after the hardware played it.
    /// Ignored for blocks that are not currently queued.
    pub fn release(&self, index: usize) {
        {
            let mut state = self.inner.state.lock();
            match state.states.get(index) {
                Some(BlockState::Queued) => state.states[index] = BlockState::Free,
                _ => {
                    trace!(block = index, "Ignoring release of block not queued");
                    return;
                }
            }
        }
        self.inner.released.notify_one();
    }

    /// `true` once every committed block was released and nothing is staged.
    pub fn is_drained(&self) -> bool {
        let state = self.inner.state.lock();
        state.staging.is_empty() && state.states.iter().all(|s| *s == BlockState::Free)
    }

    /// Wait until the hardware has released every committed block.
    pub async fn wait_drained(&self) -> Result<()> {
        let token = self.cancellation_token();
        loop {
            if token.is_cancelled() {
                return Err(PlaybackError::Cancelled);
            }
            if self.is_drained() {
                return Ok(());
            }
            tokio::select! {
                _ = token.cancelled() => return Err(PlaybackError::Cancelled),
                _ = self.inner.released.notified() => {}
                _ = tokio::time::sleep(self.inner.poll_interval) => {}
            }
        }
    }

    pub fn stats(&self) -> RingStats {
        self.inner.state.lock().stats
    }

    /// Playback time of every block handed to the hardware this generation.
    pub fn elapsed(&self) -> Duration {
        let frames = self.inner.state.lock().stats.frames_submitted;
        self.inner.format.frames_to_duration(frames)
    }

    /// Snapshot of every block's state, by index.
    pub fn block_states(&self) -> Vec<BlockState> {
        self.inner.state.lock().states.clone()
    }

    pub fn write_index(&self) -> usize {
        self.inner.state.lock().write_index
    }

    pub fn read_index(&self) -> usize {
        self.inner.state.lock().read_index
    }
}

impl BlockSource for RingBuffer {
    fn next_block(&self) -> Option<PcmBlock> {
        self.drain()
    }

    fn release(&self, index: usize) {
        RingBuffer::release(self, index)
    }

    fn is_active(&self) -> bool {
        !self.is_cancelled()
    }
}

impl fmt::Debug for RingBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("RingBuffer")
            .field("block_size", &self.inner.block_size)
            .field("block_count", &state.states.len())
            .field("generation", &state.generation)
            .field("write_index", &state.write_index)
            .field("read_index", &state.read_index)
            .finish()
    }
}
