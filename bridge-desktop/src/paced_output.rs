//! Real-time paced output without a sound device.
//!
//! Consumes blocks at the rate real hardware would (or faster, for tests and
//! headless runs) and discards the samples. Useful on build machines, in CI,
//! and as the reference consumer for the block ring.

use bridge_traits::{
    error::{BridgeError, Result},
    playback::{AudioOutput, BlockSource, PcmFormat},
};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

const IDLE_POLL: Duration = Duration::from_millis(5);

#[derive(Default)]
struct Shared {
    paused: AtomicBool,
    stop: AtomicBool,
    blocks_played: AtomicU64,
    frames_played: AtomicU64,
    underruns: AtomicU64,
}

/// Output that drains blocks on a dedicated thread, sleeping for each block's
/// playback duration multiplied by `time_scale`.
///
/// `time_scale` of `1.0` mirrors real hardware, `0.0` releases blocks as fast
/// as they arrive.
pub struct PacedAudioOutput {
    time_scale: f64,
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
}

impl PacedAudioOutput {
    pub fn new() -> Self {
        Self::with_time_scale(1.0)
    }

    pub fn with_time_scale(time_scale: f64) -> Self {
        Self {
            time_scale: time_scale.max(0.0),
            shared: Arc::new(Shared::default()),
            worker: None,
        }
    }

    /// Blocks handed back to the source since construction.
    pub fn blocks_played(&self) -> u64 {
        self.shared.blocks_played.load(Ordering::Relaxed)
    }

    pub fn frames_played(&self) -> u64 {
        self.shared.frames_played.load(Ordering::Relaxed)
    }

    /// Times the worker found the source active but empty.
    pub fn underruns(&self) -> u64 {
        self.shared.underruns.load(Ordering::Relaxed)
    }

    pub fn is_open(&self) -> bool {
        self.worker.is_some()
    }

    fn run(shared: Arc<Shared>, source: Arc<dyn BlockSource>, format: PcmFormat, scale: f64) {
        let mut starved = false;
        while !shared.stop.load(Ordering::Acquire) && source.is_active() {
            if shared.paused.load(Ordering::Acquire) {
                thread::sleep(IDLE_POLL);
                continue;
            }

            match source.next_block() {
                Some(block) => {
                    starved = false;
                    let playtime = format.frames_to_duration(block.frames as u64);
                    if scale > 0.0 && !Self::play_for(&shared, playtime.mul_f64(scale)) {
                        break;
                    }
                    trace!(index = block.index, frames = block.frames, "Played block");
                    shared.blocks_played.fetch_add(1, Ordering::Relaxed);
                    shared
                        .frames_played
                        .fetch_add(block.frames as u64, Ordering::Relaxed);
                    source.release(block.index);
                }
                None => {
                    if !starved {
                        shared.underruns.fetch_add(1, Ordering::Relaxed);
                        starved = true;
                    }
                    thread::sleep(IDLE_POLL);
                }
            }
        }
        debug!("Paced output worker exited");
    }

    /// Sleep for `duration` in `IDLE_POLL` slices. Returns `false` as soon as
    /// a stop is requested.
    fn play_for(shared: &Shared, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        loop {
            if shared.stop.load(Ordering::Acquire) {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            thread::sleep(IDLE_POLL.min(deadline - now));
        }
    }
}

impl Default for PacedAudioOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioOutput for PacedAudioOutput {
    fn open(&mut self, format: PcmFormat, source: Arc<dyn BlockSource>) -> Result<()> {
        if format.bytes_per_frame() == 0 || format.sample_rate == 0 {
            return Err(BridgeError::AudioDevice(format!(
                "Unsupported PCM format: {:?}",
                format
            )));
        }

        self.reset()?;
        self.shared.stop.store(false, Ordering::Release);
        self.shared.paused.store(false, Ordering::Release);

        let shared = Arc::clone(&self.shared);
        let scale = self.time_scale;
        let worker = thread::Builder::new()
            .name("paced-output".to_string())
            .spawn(move || Self::run(shared, source, format, scale))?;

        debug!(
            sample_rate = format.sample_rate,
            channels = format.channels,
            time_scale = self.time_scale,
            "Opened paced output"
        );
        self.worker = Some(worker);
        Ok(())
    }

    fn set_paused(&mut self, paused: bool) -> Result<()> {
        self.shared.paused.store(paused, Ordering::Release);
        Ok(())
    }

    fn reset(&mut self) -> Result<()> {
        self.shared.stop.store(true, Ordering::Release);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("Paced output worker panicked");
            }
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "paced"
    }
}

impl Drop for PacedAudioOutput {
    fn drop(&mut self) {
        let _ = self.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::playback::PcmBlock;
    use bytes::Bytes;
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    struct VecSource {
        pending: Mutex<VecDeque<PcmBlock>>,
        released: Mutex<Vec<usize>>,
        active: AtomicBool,
    }

    impl VecSource {
        fn with_blocks(count: usize, len: usize) -> Arc<Self> {
            let pending = (0..count)
                .map(|index| PcmBlock {
                    index,
                    data: Bytes::from(vec![0u8; len]),
                    frames: len / 4,
                })
                .collect();
            Arc::new(Self {
                pending: Mutex::new(pending),
                released: Mutex::new(Vec::new()),
                active: AtomicBool::new(true),
            })
        }
    }

    impl BlockSource for VecSource {
        fn next_block(&self) -> Option<PcmBlock> {
            self.pending.lock().pop_front()
        }

        fn release(&self, index: usize) {
            self.released.lock().push(index);
        }

        fn is_active(&self) -> bool {
            self.active.load(Ordering::Acquire)
        }
    }

    fn wait_until(timeout: Duration, mut check: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if check() {
                return true;
            }
            thread::sleep(Duration::from_millis(2));
        }
        check()
    }

    #[test]
    fn releases_blocks_in_order() {
        let source = VecSource::with_blocks(4, 1024);
        let mut output = PacedAudioOutput::with_time_scale(0.0);
        output.open(PcmFormat::default(), source.clone()).unwrap();

        assert!(wait_until(Duration::from_secs(2), || source.released.lock().len() == 4));
        assert_eq!(*source.released.lock(), vec![0, 1, 2, 3]);
        assert_eq!(output.frames_played(), 4 * 256);

        output.reset().unwrap();
        assert!(!output.is_open());
    }

    #[test]
    fn paused_output_does_not_consume() {
        let source = VecSource::with_blocks(0, 0);
        let mut output = PacedAudioOutput::with_time_scale(0.0);
        output.open(PcmFormat::default(), source.clone()).unwrap();
        output.set_paused(true).unwrap();
        thread::sleep(Duration::from_millis(20));

        {
            let mut pending = source.pending.lock();
            for index in 0..2 {
                pending.push_back(PcmBlock {
                    index,
                    data: Bytes::from(vec![0u8; 64]),
                    frames: 16,
                });
            }
        }
        thread::sleep(Duration::from_millis(30));
        assert!(source.released.lock().is_empty());

        output.set_paused(false).unwrap();
        assert!(wait_until(Duration::from_secs(2), || source.released.lock().len() == 2));
    }

    #[test]
    fn reset_interrupts_a_long_block() {
        // One second of 48 kHz stereo 16-bit audio
        let source = VecSource::with_blocks(1, 192_000);
        let mut output = PacedAudioOutput::new();
        output.open(PcmFormat::default(), source.clone()).unwrap();
        assert!(wait_until(Duration::from_secs(2), || source
            .pending
            .lock()
            .is_empty()));

        let started = Instant::now();
        output.reset().unwrap();
        assert!(started.elapsed() < Duration::from_millis(50));
        assert!(source.released.lock().is_empty());
        assert_eq!(output.blocks_played(), 0);
    }

    #[test]
    fn worker_exits_when_source_deactivates() {
        let source = VecSource::with_blocks(0, 0);
        let mut output = PacedAudioOutput::with_time_scale(0.0);
        output.open(PcmFormat::default(), source.clone()).unwrap();
        assert!(wait_until(Duration::from_secs(2), || output.underruns() == 1));

        source.active.store(false, Ordering::Release);
        output.reset().unwrap();
        assert!(!output.is_open());
        assert_eq!(output.blocks_played(), 0);
    }

    #[test]
    fn rejects_degenerate_format() {
        let mut output = PacedAudioOutput::new();
        let format = PcmFormat {
            sample_rate: 48_000,
            channels: 0,
            bits_per_sample: 16,
        };
        let result = output.open(format, VecSource::with_blocks(0, 0));
        assert!(matches!(result, Err(BridgeError::AudioDevice(_))));
    }
}
