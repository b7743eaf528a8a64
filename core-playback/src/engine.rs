//! # Playback Engine
//!
//! Single owner of the block ring, the hardware channel, the play order and
//! the current session.
//!
//! ## Overview
//!
//! Control calls (`play`, `pause`, `next`, ...) run on the caller's task and
//! are serialized by one async lock. Sessions report natural completion over a
//! channel; a background task applies the transition policy to each report.
//! Reports from a session that was since replaced or explicitly stopped are
//! dropped, so a user `stop` always wins over a late `Finished`.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use core_playback::{AudioStreamSource, LoopMode, PlaybackConfig, PlaybackEngine};
//! use bridge_traits::playback::AudioOutput;
//! use core_library::Track;
//! use std::sync::Arc;
//!
//! async fn play_album(
//!     source: Arc<dyn AudioStreamSource>,
//!     output: Box<dyn AudioOutput>,
//!     tracks: Vec<Track>,
//! ) -> core_playback::Result<()> {
//!     let engine = PlaybackEngine::new(PlaybackConfig::default(), source, output)?;
//!     engine.set_loop_mode(LoopMode::All).await;
//!     engine.play(tracks, 0).await?;
//!
//!     if let Some(now) = engine.now_playing().await {
//!         println!("{} {}", now.track.name, now.clock_line());
//!     }
//!     engine.stop().await;
//!     Ok(())
//! }
//! ```

use crate::config::PlaybackConfig;
use crate::error::{PlaybackError, Result};
use crate::now_playing::NowPlaying;
use crate::queue::QueueManager;
use crate::ring_buffer::RingBuffer;
use crate::session::{
    PlaybackSession, SessionContext, SessionOutcome, SessionReport, SessionStats, SessionStatus,
};
use crate::traits::AudioStreamSource;
use crate::transition::{LoopMode, Terminal, Transition, TransitionController};
use bridge_traits::playback::AudioOutput;
use core_library::Track;
use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent, QueueEvent};
use std::sync::{Arc, Weak};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, instrument, warn};

/// Streaming playback engine. Cloning shares the same engine.
#[derive(Clone)]
pub struct PlaybackEngine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    ctx: SessionContext,
    events: EventBus,
    state: Mutex<EngineState>,
}

struct EngineState {
    tracks: Vec<Track>,
    queue: QueueManager,
    transitions: TransitionController,
    shuffle: bool,
    session: Option<PlaybackSession>,
}

impl PlaybackEngine {
    /// Create an engine with its own event bus.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(
        config: PlaybackConfig,
        source: Arc<dyn AudioStreamSource>,
        output: Box<dyn AudioOutput>,
    ) -> Result<Self> {
        let events = EventBus::new(config.event_buffer);
        Self::with_event_bus(config, source, output, events)
    }

    /// Create an engine that publishes on an existing event bus.
    ///
    /// # Errors
    ///
    /// - `InvalidConfig` when `config` fails validation
    /// - `Internal` when called outside a tokio runtime
    pub fn with_event_bus(
        config: PlaybackConfig,
        source: Arc<dyn AudioStreamSource>,
        output: Box<dyn AudioOutput>,
        events: EventBus,
    ) -> Result<Self> {
        config.validate().map_err(PlaybackError::InvalidConfig)?;
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| {
            PlaybackError::Internal("PlaybackEngine requires a tokio runtime".to_string())
        })?;

        let (reports, reports_rx) = mpsc::unbounded_channel();
        let state = EngineState {
            tracks: Vec::new(),
            queue: QueueManager::new(config.shuffle_seed),
            transitions: TransitionController::new(config.restart_threshold),
            shuffle: false,
            session: None,
        };

        info!(
            block_size = config.block_size,
            block_count = config.block_count,
            sample_rate = config.format.sample_rate,
            output = output.name(),
            source = source.name(),
            "Playback engine created"
        );

        let inner = Arc::new(EngineInner {
            ctx: SessionContext {
                ring: RingBuffer::from_config(&config),
                config: Arc::new(config),
                source,
                output: Arc::new(parking_lot::Mutex::new(output)),
                reports,
                events: Some(events.clone()),
            },
            events,
            state: Mutex::new(state),
        });
        runtime.spawn(run_transitions(Arc::downgrade(&inner), reports_rx));

        Ok(Self { inner })
    }

    pub fn config(&self) -> &PlaybackConfig {
        &self.inner.ctx.config
    }

    pub fn event_bus(&self) -> EventBus {
        self.inner.events.clone()
    }

    /// Load `tracks` as the new queue and start playing at `start_index`.
    ///
    /// # Errors
    ///
    /// `EmptyQueue` or `InvalidQueueIndex`; the current session keeps
    /// playing in that case.
    #[instrument(skip(self, tracks), fields(len = tracks.len()))]
    pub async fn play(&self, tracks: Vec<Track>, start_index: usize) -> Result<()> {
        let mut state = self.inner.state.lock().await;
        let shuffled = state.shuffle;
        state.queue.build(tracks.len(), start_index, shuffled)?;
        state.tracks = tracks;
        state.transitions.reset_failures();
        self.inner.emit(CoreEvent::Queue(QueueEvent::Built {
            len: state.tracks.len(),
            start_index,
            shuffled,
        }));
        self.inner.start_current(&mut state).await
    }

    /// Suspend the current session. Idempotent.
    pub async fn pause(&self) -> Result<()> {
        let state = self.inner.state.lock().await;
        let session = active_session(&state)?;
        if session.status() == SessionStatus::Paused {
            return Ok(());
        }
        session.pause()?;
        self.inner.emit(CoreEvent::Playback(PlaybackEvent::Paused {
            track_id: session.track().id.clone(),
            position_ms: session.elapsed().as_millis() as u64,
        }));
        info!(track_id = %session.track().id, "Playback paused");
        Ok(())
    }

    /// Resume a paused session. Idempotent.
    pub async fn resume(&self) -> Result<()> {
        let state = self.inner.state.lock().await;
        let session = active_session(&state)?;
        if session.status() != SessionStatus::Paused {
            return Ok(());
        }
        session.resume()?;
        self.inner.emit(CoreEvent::Playback(PlaybackEvent::Resumed {
            track_id: session.track().id.clone(),
            position_ms: session.elapsed().as_millis() as u64,
        }));
        info!(track_id = %session.track().id, "Playback resumed");
        Ok(())
    }

    /// Pause when playing, resume when paused. Returns the new status.
    pub async fn toggle_pause(&self) -> Result<SessionStatus> {
        if self.status().await == SessionStatus::Paused {
            self.resume().await?;
        } else {
            self.pause().await?;
        }
        Ok(self.status().await)
    }

    /// Stop the current session. No-op when nothing is playing.
    pub async fn stop(&self) {
        let mut state = self.inner.state.lock().await;
        self.inner.stop_session(&mut state, true).await;
    }

    /// Skip to the next queue entry.
    ///
    /// At the end of the queue this wraps under `Loop=All` and stops
    /// otherwise. `Loop=One` is ignored.
    pub async fn next(&self) -> Result<()> {
        let mut guard = self.inner.state.lock().await;
        let state = &mut *guard;
        if state.queue.is_empty() {
            return Err(PlaybackError::EmptyQueue);
        }
        let transition = state.transitions.next(&mut state.queue);
        info!(?transition, "Skip forward");
        self.inner.apply(state, transition).await
    }

    /// Skip back, or restart the current track once past the restart
    /// threshold.
    pub async fn previous(&self) -> Result<()> {
        let mut guard = self.inner.state.lock().await;
        let state = &mut *guard;
        if state.queue.is_empty() {
            return Err(PlaybackError::EmptyQueue);
        }
        let elapsed = state
            .session
            .as_ref()
            .map(|session| session.elapsed())
            .unwrap_or_default();
        let transition = state.transitions.previous(&mut state.queue, elapsed);
        info!(?transition, elapsed_ms = elapsed.as_millis() as u64, "Skip back");
        self.inner.apply(state, transition).await
    }

    pub async fn loop_mode(&self) -> LoopMode {
        self.inner.state.lock().await.transitions.loop_mode()
    }

    pub async fn set_loop_mode(&self, mode: LoopMode) {
        self.inner
            .state
            .lock()
            .await
            .transitions
            .set_loop_mode(mode);
        self.inner.emit(CoreEvent::Queue(QueueEvent::LoopModeChanged {
            mode: mode.to_string(),
        }));
        info!(%mode, "Loop mode changed");
    }

    /// Advance the loop mode Off → All → One → Off.
    pub async fn cycle_loop_mode(&self) -> LoopMode {
        let mode = self.loop_mode().await.cycle();
        self.set_loop_mode(mode).await;
        mode
    }

    pub async fn is_shuffled(&self) -> bool {
        self.inner.state.lock().await.shuffle
    }

    /// Turn shuffle on or off. A loaded queue is rebuilt around the current
    /// track, which keeps playing.
    pub async fn set_shuffle(&self, enabled: bool) -> Result<()> {
        let mut state = self.inner.state.lock().await;
        state.shuffle = enabled;
        state.queue.reshuffle(enabled)?;
        self.inner
            .emit(CoreEvent::Queue(QueueEvent::ShuffleChanged { enabled }));
        info!(enabled, "Shuffle changed");
        Ok(())
    }

    /// Status of the current session, `Idle` before anything played.
    pub async fn status(&self) -> SessionStatus {
        self.inner
            .state
            .lock()
            .await
            .session
            .as_ref()
            .map_or(SessionStatus::Idle, |session| session.status())
    }

    /// Whether a session is starting, playing or paused.
    pub async fn is_active(&self) -> bool {
        self.status().await.is_active()
    }

    pub async fn now_playing(&self) -> Option<NowPlaying> {
        let state = self.inner.state.lock().await;
        state.session.as_ref().map(|session| {
            NowPlaying::new(session.track().clone(), session.status(), session.elapsed())
        })
    }

    pub async fn stats(&self) -> Option<SessionStats> {
        let state = self.inner.state.lock().await;
        state.session.as_ref().map(|session| session.stats())
    }

    pub async fn current_track(&self) -> Option<Track> {
        let state = self.inner.state.lock().await;
        state.session.as_ref().map(|session| session.track().clone())
    }

    /// Catalog indices in play order.
    pub async fn play_order(&self) -> Vec<usize> {
        self.inner.state.lock().await.queue.order().to_vec()
    }

    /// Cursor position inside the play order.
    pub async fn queue_position(&self) -> Option<usize> {
        let state = self.inner.state.lock().await;
        (!state.queue.is_empty()).then(|| state.queue.position())
    }

    pub async fn tracks(&self) -> Vec<Track> {
        self.inner.state.lock().await.tracks.clone()
    }

    /// Stop playback and forget the queue.
    pub async fn shutdown(&self) {
        let mut state = self.inner.state.lock().await;
        self.inner.stop_session(&mut state, true).await;
        state.queue.clear();
        state.tracks.clear();
        debug!("Playback engine shut down");
    }
}

impl EngineInner {
    fn emit(&self, event: CoreEvent) {
        let _ = self.events.emit(event);
    }

    async fn start_current(&self, state: &mut EngineState) -> Result<()> {
        let index = state.queue.current().ok_or(PlaybackError::EmptyQueue)?;
        self.start_track(state, index).await
    }

    async fn start_track(&self, state: &mut EngineState, index: usize) -> Result<()> {
        let track = state
            .tracks
            .get(index)
            .cloned()
            .ok_or(PlaybackError::InvalidQueueIndex {
                index,
                len: state.tracks.len(),
            })?;

        self.stop_session(state, false).await;
        let session = PlaybackSession::start(track, &self.ctx).await;

        self.emit(CoreEvent::Playback(PlaybackEvent::Started {
            session_id: session.id().to_string(),
            track_id: session.track().id.clone(),
            title: session.track().name.clone(),
        }));
        self.emit(CoreEvent::Queue(QueueEvent::Advanced {
            position: state.queue.position(),
            track_index: index,
        }));
        info!(
            track_id = %session.track().id,
            title = %session.track().name,
            position = state.queue.position(),
            "Track started"
        );

        state.session = Some(session);
        Ok(())
    }

    async fn stop_session(&self, state: &mut EngineState, announce: bool) {
        let Some(session) = state.session.as_mut() else {
            return;
        };
        let was_active = session.status().is_active();
        session.stop().await;

        if announce && was_active {
            self.emit(CoreEvent::Playback(PlaybackEvent::Stopped {
                track_id: session.track().id.clone(),
            }));
            info!(track_id = %session.track().id, "Playback stopped");
        }
    }

    async fn apply(&self, state: &mut EngineState, transition: Transition) -> Result<()> {
        match transition {
            Transition::Play(index) | Transition::Restart(index) => {
                self.start_track(state, index).await
            }
            Transition::Stop => {
                self.stop_session(state, true).await;
                self.emit(CoreEvent::Queue(QueueEvent::Exhausted));
                info!("Nothing left to play");
                Ok(())
            }
        }
    }

    async fn handle_report(&self, report: SessionReport) {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;

        let current = state
            .session
            .as_ref()
            .is_some_and(|s| s.generation() == report.generation && !s.was_stopped());
        if !current {
            debug!(
                session_id = %report.session_id,
                generation = report.generation,
                "Ignoring report from a replaced session"
            );
            return;
        }

        let terminal = match &report.outcome {
            SessionOutcome::Finished => {
                info!(track_id = %report.track_id, "Track finished");
                self.emit(CoreEvent::Playback(PlaybackEvent::Finished {
                    track_id: report.track_id.clone(),
                }));
                Terminal::Finished
            }
            SessionOutcome::Failed(error) => {
                warn!(track_id = %report.track_id, error = %error, "Track failed");
                self.emit(CoreEvent::Playback(PlaybackEvent::Failed {
                    track_id: report.track_id.clone(),
                    message: error.to_string(),
                }));
                Terminal::Failed
            }
        };

        let transition = state.transitions.on_terminal(terminal, &mut state.queue);
        info!(?transition, loop_mode = %state.transitions.loop_mode(), "Transition");
        if let Err(e) = self.apply(state, transition).await {
            warn!(error = %e, "Failed to apply transition");
        }
    }
}

fn active_session(state: &EngineState) -> Result<&PlaybackSession> {
    state
        .session
        .as_ref()
        .filter(|session| session.status().is_active())
        .ok_or(PlaybackError::NoActiveSession)
}

async fn run_transitions(
    inner: Weak<EngineInner>,
    mut reports: mpsc::UnboundedReceiver<SessionReport>,
) {
    while let Some(report) = reports.recv().await {
        let Some(inner) = inner.upgrade() else {
            break;
        };
        inner.handle_report(report).await;
    }
    debug!("Transition loop exited");
}
