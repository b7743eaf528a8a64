//! Fakes shared by the core-playback integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::http::ByteStream;
use bridge_traits::playback::{AudioOutput, BlockSource, PcmFormat};
use bytes::Bytes;
use core_library::{Ticks, Track};
use core_playback::{AudioStreamSource, PlaybackConfig, PlaybackError, Result};
use core_runtime::events::{CoreEvent, PlaybackEvent, QueueEvent};
use futures::{stream, StreamExt};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tokio::sync::broadcast::Receiver;

/// Chunk size the fake server delivers; deliberately not a block multiple.
pub const CHUNK: usize = 24;

// ============================================================================
// Stream Source
// ============================================================================

#[derive(Debug, Clone)]
pub enum Script {
    /// `n` bytes of PCM, then end of stream.
    Pcm(usize),
    /// `n` bytes of PCM, then a transport error.
    PcmThenError(usize),
    /// `n` bytes of PCM, then the connection goes quiet without closing.
    PcmThenStall(usize),
    /// The request itself fails.
    OpenError,
    /// Never ends.
    Endless,
}

/// Source that plays a per-track script.
pub struct ScriptedSource {
    default: Script,
    scripts: HashMap<String, Script>,
    opened: Mutex<Vec<String>>,
}

impl ScriptedSource {
    pub fn new(default: Script) -> Self {
        Self {
            default,
            scripts: HashMap::new(),
            opened: Mutex::new(Vec::new()),
        }
    }

    pub fn with(mut self, track_id: &str, script: Script) -> Self {
        self.scripts.insert(track_id.to_string(), script);
        self
    }

    /// Track ids in the order their streams were opened.
    pub fn opened(&self) -> Vec<String> {
        self.opened.lock().clone()
    }
}

fn pcm_chunks(total: usize) -> Vec<BridgeResult<Bytes>> {
    let mut chunks = Vec::new();
    let mut sent = 0;
    while sent < total {
        let len = CHUNK.min(total - sent);
        chunks.push(Ok(Bytes::from(vec![(sent % 251) as u8; len])));
        sent += len;
    }
    chunks
}

#[async_trait]
impl AudioStreamSource for ScriptedSource {
    async fn open_stream(&self, track: &Track, _format: PcmFormat) -> Result<ByteStream> {
        self.opened.lock().push(track.id.clone());
        let script = self
            .scripts
            .get(&track.id)
            .cloned()
            .unwrap_or_else(|| self.default.clone());

        match script {
            Script::Pcm(total) => Ok(Box::pin(stream::iter(pcm_chunks(total)))),
            Script::PcmThenError(total) => {
                let mut chunks = pcm_chunks(total);
                chunks.push(Err(BridgeError::OperationFailed(
                    "connection reset by peer".to_string(),
                )));
                Ok(Box::pin(stream::iter(chunks)))
            }
            Script::PcmThenStall(total) => Ok(Box::pin(
                stream::iter(pcm_chunks(total)).chain(stream::pending()),
            )),
            Script::OpenError => Err(PlaybackError::Network("HTTP 500".to_string())),
            Script::Endless => Ok(Box::pin(stream::repeat_with(|| {
                Ok(Bytes::from_static(&[0u8; CHUNK]))
            }))),
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

// ============================================================================
// Outputs
// ============================================================================

#[derive(Default)]
struct DrainShared {
    stop: AtomicBool,
    paused: AtomicBool,
    bytes_played: AtomicU64,
}

/// Consumer thread that plays every block as soon as it is ready.
pub struct DrainingOutput {
    shared: Arc<DrainShared>,
    worker: Option<JoinHandle<()>>,
}

/// Counters of a [`DrainingOutput`] that stay readable after it moved into an engine.
#[derive(Clone)]
pub struct DrainProbe {
    shared: Arc<DrainShared>,
}

impl DrainProbe {
    pub fn bytes_played(&self) -> u64 {
        self.shared.bytes_played.load(Ordering::SeqCst)
    }

    pub fn is_paused(&self) -> bool {
        self.shared.paused.load(Ordering::SeqCst)
    }
}

impl DrainingOutput {
    pub fn new() -> (Self, DrainProbe) {
        let shared = Arc::new(DrainShared::default());
        (
            Self {
                shared: Arc::clone(&shared),
                worker: None,
            },
            DrainProbe { shared },
        )
    }
}

impl AudioOutput for DrainingOutput {
    fn open(&mut self, _format: PcmFormat, source: Arc<dyn BlockSource>) -> BridgeResult<()> {
        self.reset()?;
        self.shared.stop.store(false, Ordering::SeqCst);
        self.shared.paused.store(false, Ordering::SeqCst);
        let shared = Arc::clone(&self.shared);
        self.worker = Some(thread::spawn(move || {
            while !shared.stop.load(Ordering::SeqCst) && source.is_active() {
                if shared.paused.load(Ordering::SeqCst) {
                    thread::sleep(Duration::from_millis(1));
                    continue;
                }
                match source.next_block() {
                    Some(block) => {
                        shared
                            .bytes_played
                            .fetch_add(block.data.len() as u64, Ordering::SeqCst);
                        source.release(block.index);
                    }
                    None => thread::sleep(Duration::from_millis(1)),
                }
            }
        }));
        Ok(())
    }

    fn set_paused(&mut self, paused: bool) -> BridgeResult<()> {
        self.shared.paused.store(paused, Ordering::SeqCst);
        Ok(())
    }

    fn reset(&mut self) -> BridgeResult<()> {
        self.shared.stop.store(true, Ordering::SeqCst);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "draining"
    }
}

impl Drop for DrainingOutput {
    fn drop(&mut self) {
        let _ = self.reset();
    }
}

/// Output that accepts the session but never pulls a block.
#[derive(Default)]
pub struct StalledOutput;

impl AudioOutput for StalledOutput {
    fn open(&mut self, _format: PcmFormat, _source: Arc<dyn BlockSource>) -> BridgeResult<()> {
        Ok(())
    }

    fn set_paused(&mut self, _paused: bool) -> BridgeResult<()> {
        Ok(())
    }

    fn reset(&mut self) -> BridgeResult<()> {
        Ok(())
    }
}

/// Output whose device never opens.
#[derive(Default)]
pub struct FailingOutput;

impl AudioOutput for FailingOutput {
    fn open(&mut self, _format: PcmFormat, _source: Arc<dyn BlockSource>) -> BridgeResult<()> {
        Err(BridgeError::AudioDevice("no such device".to_string()))
    }

    fn set_paused(&mut self, _paused: bool) -> BridgeResult<()> {
        Ok(())
    }

    fn reset(&mut self) -> BridgeResult<()> {
        Ok(())
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Small blocks so that tests move many blocks quickly.
pub fn test_config() -> PlaybackConfig {
    PlaybackConfig {
        block_size: 64,
        block_count: 4,
        min_viable_bytes: 64,
        poll_interval: Duration::from_millis(10),
        position_interval: Duration::from_millis(20),
        event_buffer: 4096,
        shuffle_seed: Some(42),
        ..Default::default()
    }
}

/// Tracks `t0..tN`, each three minutes long.
pub fn tracks(count: usize) -> Vec<Track> {
    (0..count)
        .map(|i| {
            Track::new(format!("t{}", i), format!("Track {}", i))
                .with_album("Test Album")
                .with_duration(Ticks::from_secs(180))
        })
        .collect()
}

/// Wait for the next event matching `pick`, skipping everything else.
pub async fn next_matching<T>(
    rx: &mut Receiver<CoreEvent>,
    mut pick: impl FnMut(&CoreEvent) -> Option<T>,
) -> T {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    if let Some(value) = pick(&event) {
                        return value;
                    }
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                Err(e) => panic!("event bus closed: {}", e),
            }
        }
    })
    .await
    .expect("timed out waiting for event")
}

/// Track id of the next `Started` event.
pub async fn next_started(rx: &mut Receiver<CoreEvent>) -> String {
    next_matching(rx, |event| match event {
        CoreEvent::Playback(PlaybackEvent::Started { track_id, .. }) => Some(track_id.clone()),
        _ => None,
    })
    .await
}

/// Track id and message of the next `Failed` event.
pub async fn next_failed(rx: &mut Receiver<CoreEvent>) -> (String, String) {
    next_matching(rx, |event| match event {
        CoreEvent::Playback(PlaybackEvent::Failed { track_id, message }) => {
            Some((track_id.clone(), message.clone()))
        }
        _ => None,
    })
    .await
}

pub async fn wait_exhausted(rx: &mut Receiver<CoreEvent>) {
    next_matching(rx, |event| match event {
        CoreEvent::Queue(QueueEvent::Exhausted) => Some(()),
        _ => None,
    })
    .await
}

/// Poll `check` until it holds or five seconds pass.
pub async fn eventually<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    tokio::time::timeout(Duration::from_secs(5), async {
        while !check().await {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await
    .expect("condition not reached in time")
}
