//! # Playback Session
//!
//! One track from start to a terminal state.
//!
//! ```text
//! Idle ─▶ Starting ─▶ Playing ◀─▶ Paused
//!             │           │           │
//!             └───────────┴───────────┴──▶ Finished | Failed | Stopped
//! ```
//!
//! A session owns one producer task and borrows the engine's ring and output
//! for its lifetime. Terminal states are absorbing; the engine starts a fresh
//! session for the next track after fully stopping the previous one.

use crate::config::PlaybackConfig;
use crate::error::{PlaybackError, Result};
use crate::ring_buffer::RingBuffer;
use crate::streaming::{ProducerOutcome, StreamProducer};
use crate::traits::AudioStreamSource;
use bridge_traits::playback::{AudioOutput, BlockSource};
use core_library::Track;
use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Hardware channel shared between the engine and its sessions.
pub type SharedOutput = Arc<Mutex<Box<dyn AudioOutput>>>;

/// Lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionStatus {
    Idle,
    Starting,
    Playing,
    Paused,
    Finished,
    Failed,
    Stopped,
}

impl SessionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionStatus::Finished | SessionStatus::Failed | SessionStatus::Stopped
        )
    }

    /// Starting, playing or paused.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            SessionStatus::Starting | SessionStatus::Playing | SessionStatus::Paused
        )
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SessionStatus::Idle => "Idle",
            SessionStatus::Starting => "Starting",
            SessionStatus::Playing => "Playing",
            SessionStatus::Paused => "Paused",
            SessionStatus::Finished => "Finished",
            SessionStatus::Failed => "Failed",
            SessionStatus::Stopped => "Stopped",
        };
        f.write_str(label)
    }
}

/// Diagnostic counters for one session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStats {
    /// Bytes pulled from the network.
    pub bytes_received: u64,
    /// Bytes placed in blocks handed to the consumer side of the ring.
    pub bytes_committed: u64,
    /// Blocks handed to the hardware.
    pub blocks_submitted: u64,
    pub underruns: u64,
}

/// How a session ended on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    Finished,
    Failed(PlaybackError),
}

/// Completion notice sent from a producer task to the engine.
#[derive(Debug, Clone)]
pub struct SessionReport {
    pub generation: u64,
    pub session_id: String,
    pub track_id: String,
    pub outcome: SessionOutcome,
}

/// State shared between the control context and the producer task.
pub(crate) struct SessionShared {
    status: Mutex<SessionStatus>,
    bytes_received: AtomicU64,
}

impl SessionShared {
    pub(crate) fn new() -> Self {
        Self {
            status: Mutex::new(SessionStatus::Starting),
            bytes_received: AtomicU64::new(0),
        }
    }

    pub(crate) fn status(&self) -> SessionStatus {
        *self.status.lock()
    }

    pub(crate) fn add_received(&self, bytes: usize) {
        self.bytes_received.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub(crate) fn bytes_received(&self) -> u64 {
        self.bytes_received.load(Ordering::Relaxed)
    }

    /// First block was handed to the hardware.
    pub(crate) fn mark_playing(&self) {
        let mut status = self.status.lock();
        if *status == SessionStatus::Starting {
            *status = SessionStatus::Playing;
        }
    }

    /// Record a natural end unless the session was cancelled first.
    fn complete(&self, ring: &RingBuffer, outcome: &SessionOutcome) -> bool {
        let mut status = self.status.lock();
        if ring.is_cancelled() || status.is_terminal() {
            return false;
        }
        *status = match outcome {
            SessionOutcome::Finished => SessionStatus::Finished,
            SessionOutcome::Failed(_) => SessionStatus::Failed,
        };
        true
    }
}

/// Everything a session needs from its engine.
#[derive(Clone)]
pub(crate) struct SessionContext {
    pub(crate) config: Arc<PlaybackConfig>,
    pub(crate) source: Arc<dyn AudioStreamSource>,
    pub(crate) ring: RingBuffer,
    pub(crate) output: SharedOutput,
    pub(crate) reports: mpsc::UnboundedSender<SessionReport>,
    pub(crate) events: Option<EventBus>,
}

/// A single track being streamed to the hardware.
pub struct PlaybackSession {
    id: String,
    track: Track,
    generation: u64,
    ring: RingBuffer,
    output: SharedOutput,
    shared: Arc<SessionShared>,
    paused: watch::Sender<bool>,
    producer: Option<JoinHandle<()>>,
    ticker: Option<JoinHandle<()>>,
    stopped_by_request: bool,
    final_stats: Option<(SessionStats, Duration)>,
}

impl PlaybackSession {
    /// Reset the ring, open the hardware channel and launch the producer.
    ///
    /// The previous session must already be stopped. A hardware failure does
    /// not return an error: the session is created in `Failed` and reported
    /// through the context's channel like any other failure.
    pub(crate) async fn start(track: Track, ctx: &SessionContext) -> Self {
        let id = Uuid::new_v4().to_string();
        let generation = ctx.ring.reset();
        let shared = Arc::new(SessionShared::new());
        let (paused, paused_rx) = watch::channel(false);

        let mut session = Self {
            id,
            track,
            generation,
            ring: ctx.ring.clone(),
            output: Arc::clone(&ctx.output),
            shared: Arc::clone(&shared),
            paused,
            producer: None,
            ticker: None,
            stopped_by_request: false,
            final_stats: None,
        };

        let first_block = Arc::clone(&shared);
        ctx.ring
            .on_first_drain(generation, move || first_block.mark_playing());

        let format = ctx.config.format;
        let block_source: Arc<dyn BlockSource> = Arc::new(ctx.ring.clone());
        let opened = with_output(&ctx.output, move |output| {
            output.reset()?;
            output.open(format, block_source)
        })
        .await;

        if let Err(e) = opened {
            warn!(
                track_id = %session.track.id,
                error = %e,
                "Audio output failed to open"
            );
            let outcome = SessionOutcome::Failed(e);
            if shared.complete(&ctx.ring, &outcome) {
                ctx.ring.cancel_generation(generation);
                let _ = ctx.reports.send(session.report(outcome));
            }
            return session;
        }

        let producer = StreamProducer {
            source: Arc::clone(&ctx.source),
            ring: ctx.ring.clone(),
            track: session.track.clone(),
            format,
            min_viable_bytes: ctx.config.min_viable_bytes,
            read_timeout: ctx.config.read_timeout,
            paused: paused_rx,
            shared: Arc::clone(&shared),
        };
        let report_template = session.report(SessionOutcome::Finished);
        let ring = ctx.ring.clone();
        let reports = ctx.reports.clone();
        session.producer = Some(tokio::spawn(async move {
            let outcome = match producer.run().await {
                ProducerOutcome::Finished => SessionOutcome::Finished,
                ProducerOutcome::Failed(e) => SessionOutcome::Failed(e),
                ProducerOutcome::Stopped => return,
            };
            if shared.complete(&ring, &outcome) {
                let _ = reports.send(SessionReport {
                    outcome,
                    ..report_template
                });
            }
        }));

        if let Some(events) = ctx.events.clone() {
            session.ticker = Some(tokio::spawn(report_position(
                ctx.ring.clone(),
                Arc::clone(&session.shared),
                session.track.clone(),
                events,
                ctx.config.position_interval,
            )));
        }

        info!(
            session_id = %session.id,
            track_id = %session.track.id,
            generation,
            output = %ctx.output.lock().name(),
            "Session started"
        );
        session
    }

    fn report(&self, outcome: SessionOutcome) -> SessionReport {
        SessionReport {
            generation: self.generation,
            session_id: self.id.clone(),
            track_id: self.track.id.clone(),
            outcome,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn track(&self) -> &Track {
        &self.track
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn status(&self) -> SessionStatus {
        self.shared.status()
    }

    /// Whether [`stop`](Self::stop) was called on this session.
    pub fn was_stopped(&self) -> bool {
        self.stopped_by_request
    }

    /// Playback time handed to the hardware so far.
    pub fn elapsed(&self) -> Duration {
        match self.final_stats {
            Some((_, elapsed)) => elapsed,
            None => self.ring.elapsed(),
        }
    }

    pub fn stats(&self) -> SessionStats {
        if let Some((stats, _)) = self.final_stats {
            return stats;
        }
        let ring = self.ring.stats();
        SessionStats {
            bytes_received: self.shared.bytes_received(),
            bytes_committed: ring.bytes_committed,
            blocks_submitted: ring.blocks_submitted,
            underruns: ring.underruns,
        }
    }

    /// Stop pulling from the network and suspend the hardware channel.
    /// Queued blocks are kept. No-op unless starting or playing.
    pub fn pause(&self) -> Result<()> {
        {
            let mut status = self.shared.status.lock();
            if !matches!(*status, SessionStatus::Starting | SessionStatus::Playing) {
                return Ok(());
            }
            *status = SessionStatus::Paused;
        }
        self.paused.send_replace(true);
        self.output
            .lock()
            .set_paused(true)
            .map_err(|e| PlaybackError::Hardware(e.to_string()))?;
        debug!(session_id = %self.id, "Session paused");
        Ok(())
    }

    /// Undo [`pause`](Self::pause). No-op unless paused.
    pub fn resume(&self) -> Result<()> {
        {
            let mut status = self.shared.status.lock();
            if *status != SessionStatus::Paused {
                return Ok(());
            }
            *status = if self.ring.stats().blocks_submitted > 0 {
                SessionStatus::Playing
            } else {
                SessionStatus::Starting
            };
        }
        self.paused.send_replace(false);
        self.output
            .lock()
            .set_paused(false)
            .map_err(|e| PlaybackError::Hardware(e.to_string()))?;
        debug!(session_id = %self.id, "Session resumed");
        Ok(())
    }

    /// Cancel the producer, wait for it to exit, and reset the hardware.
    ///
    /// Safe to call in any state and more than once. A session that already
    /// reached `Finished` or `Failed` keeps that status.
    pub async fn stop(&mut self) -> SessionStatus {
        {
            let mut status = self.shared.status.lock();
            self.ring.cancel_generation(self.generation);
            if !status.is_terminal() {
                *status = SessionStatus::Stopped;
            }
        }
        self.stopped_by_request = true;

        if let Some(producer) = self.producer.take() {
            if let Err(e) = producer.await {
                warn!(session_id = %self.id, error = %e, "Producer task panicked");
            }
        }
        if let Some(ticker) = self.ticker.take() {
            let _ = ticker.await;
        }

        if self.final_stats.is_none() {
            self.final_stats = Some((self.stats(), self.ring.elapsed()));
            if let Err(e) = with_output(&self.output, |output| output.reset()).await {
                warn!(session_id = %self.id, error = %e, "Audio output reset failed");
            }
        }

        let status = self.status();
        debug!(session_id = %self.id, %status, "Session stopped");
        status
    }
}

impl Drop for PlaybackSession {
    fn drop(&mut self) {
        self.ring.cancel_generation(self.generation);
        if let Some(producer) = self.producer.take() {
            producer.abort();
        }
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
    }
}

impl fmt::Debug for PlaybackSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaybackSession")
            .field("id", &self.id)
            .field("track_id", &self.track.id)
            .field("generation", &self.generation)
            .field("status", &self.status())
            .finish()
    }
}

/// Run a blocking call against the hardware channel off the async workers.
pub(crate) async fn with_output<T, F>(output: &SharedOutput, f: F) -> Result<T>
where
    F: FnOnce(&mut dyn AudioOutput) -> bridge_traits::error::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let output = Arc::clone(output);
    tokio::task::spawn_blocking(move || {
        let mut guard = output.lock();
        f(&mut **guard)
    })
    .await
    .map_err(|e| PlaybackError::Internal(format!("audio output task failed: {}", e)))?
    .map_err(|e| PlaybackError::Hardware(e.to_string()))
}

async fn report_position(
    ring: RingBuffer,
    shared: Arc<SessionShared>,
    track: Track,
    events: EventBus,
    interval: Duration,
) {
    let token = ring.cancellation_token();
    let duration_ms = track.duration.as_duration().as_millis() as u64;
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut last = None;

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = ticker.tick() => {}
        }
        if shared.status().is_terminal() {
            break;
        }

        let position_ms = ring.elapsed().as_millis() as u64;
        if last != Some(position_ms) {
            last = Some(position_ms);
            let _ = events.emit(CoreEvent::Playback(PlaybackEvent::PositionChanged {
                track_id: track.id.clone(),
                position_ms,
                duration_ms,
            }));
        }
    }
}
