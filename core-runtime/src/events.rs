//! # Event Bus System
//!
//! Provides an event-driven architecture for the player core using
//! `tokio::sync::broadcast`. Modules publish typed events; front ends (a
//! screen, a status line, a test) subscribe without the publisher knowing
//! about them.
//!
//! ## Overview
//!
//! Four domains publish on one bus:
//!
//! ```text
//!   AuthManager ──┐
//! CatalogBrowser ─┼──> EventBus ──> subscribers (UI, logs, tests)
//! PlaybackEngine ─┘    (broadcast)
//!   (playback + queue)
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let event_bus = EventBus::new(100);
//! let mut subscriber = event_bus.subscribe();
//!
//! event_bus
//!     .emit(CoreEvent::Playback(PlaybackEvent::Stopped {
//!         track_id: "a1".to_string(),
//!     }))
//!     .ok();
//!
//! let event = subscriber.recv().await.unwrap();
//! assert_eq!(event.description(), "Playback stopped");
//! # }
//! ```
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: Subscriber was too slow and missed `n` events.
//!   This is non-fatal; the subscriber can continue receiving new events.
//! - **`RecvError::Closed`**: All senders have been dropped. This indicates shutdown.
//!
//! Publishers ignore send errors: having no subscriber is normal.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

// Re-export commonly used types
pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum encompassing all event categories.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Authentication-related events
    Auth(AuthEvent),
    /// Catalog browsing events
    Catalog(CatalogEvent),
    /// Playback session events
    Playback(PlaybackEvent),
    /// Play order and loop-mode events
    Queue(QueueEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Auth(e) => e.description(),
            CoreEvent::Catalog(e) => e.description(),
            CoreEvent::Playback(e) => e.description(),
            CoreEvent::Queue(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Auth(AuthEvent::AuthError { .. }) => EventSeverity::Error,
            CoreEvent::Playback(PlaybackEvent::Failed { .. }) => EventSeverity::Warning,
            CoreEvent::Catalog(CatalogEvent::LoadFailed { .. }) => EventSeverity::Warning,
            CoreEvent::Auth(AuthEvent::SignedIn { .. }) => EventSeverity::Info,
            CoreEvent::Playback(PlaybackEvent::Started { .. }) => EventSeverity::Info,
            CoreEvent::Queue(QueueEvent::Exhausted) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

// ============================================================================
// Authentication Events
// ============================================================================

/// Events related to signing in to the media server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum AuthEvent {
    /// Login request in flight.
    SigningIn {
        server_url: String,
    },
    /// Login succeeded and credentials were persisted.
    SignedIn {
        user_id: String,
        server_url: String,
    },
    /// Stored credentials were verified against the server.
    SessionRestored {
        user_id: String,
    },
    /// Stored credentials were removed.
    SignedOut,
    /// Authentication failed.
    AuthError {
        message: String,
        /// Whether retrying (e.g. with other credentials) can succeed.
        recoverable: bool,
    },
}

impl AuthEvent {
    fn description(&self) -> &str {
        match self {
            AuthEvent::SigningIn { .. } => "Authentication in progress",
            AuthEvent::SignedIn { .. } => "User signed in successfully",
            AuthEvent::SessionRestored { .. } => "Saved session restored",
            AuthEvent::SignedOut => "User signed out",
            AuthEvent::AuthError { .. } => "Authentication error",
        }
    }
}

// ============================================================================
// Catalog Events
// ============================================================================

/// Events related to listing albums and tracks.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum CatalogEvent {
    AlbumsLoaded {
        count: usize,
    },
    TracksLoaded {
        album_id: String,
        count: usize,
    },
    /// A listing failed and was degraded to an empty result.
    LoadFailed {
        message: String,
    },
}

impl CatalogEvent {
    fn description(&self) -> &str {
        match self {
            CatalogEvent::AlbumsLoaded { .. } => "Albums loaded",
            CatalogEvent::TracksLoaded { .. } => "Tracks loaded",
            CatalogEvent::LoadFailed { .. } => "Catalog listing failed",
        }
    }
}

// ============================================================================
// Playback Events
// ============================================================================

/// Events related to the active playback session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum PlaybackEvent {
    /// A new session was started.
    Started {
        session_id: String,
        track_id: String,
        title: String,
    },
    Paused {
        track_id: String,
        /// Position when paused (milliseconds).
        position_ms: u64,
    },
    Resumed {
        track_id: String,
        position_ms: u64,
    },
    /// Session stopped on request.
    Stopped {
        track_id: String,
    },
    /// Stream ended and the last block was played out.
    Finished {
        track_id: String,
    },
    /// Stream or device failure; the queue moves on.
    Failed {
        track_id: String,
        message: String,
    },
    /// Elapsed position advanced (block granularity).
    PositionChanged {
        track_id: String,
        position_ms: u64,
        duration_ms: u64,
    },
}

impl PlaybackEvent {
    fn description(&self) -> &str {
        match self {
            PlaybackEvent::Started { .. } => "Playback started",
            PlaybackEvent::Paused { .. } => "Playback paused",
            PlaybackEvent::Resumed { .. } => "Playback resumed",
            PlaybackEvent::Stopped { .. } => "Playback stopped",
            PlaybackEvent::Finished { .. } => "Track finished",
            PlaybackEvent::Failed { .. } => "Playback failed",
            PlaybackEvent::PositionChanged { .. } => "Playback position changed",
        }
    }
}

// ============================================================================
// Queue Events
// ============================================================================

/// Events related to the play order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum QueueEvent {
    /// A new play order was built.
    Built {
        len: usize,
        start_index: usize,
        shuffled: bool,
    },
    /// The cursor moved.
    Advanced {
        /// Cursor position inside the play order.
        position: usize,
        /// Catalog index at that position.
        track_index: usize,
    },
    LoopModeChanged {
        mode: String,
    },
    ShuffleChanged {
        enabled: bool,
    },
    /// The end of the play order was reached with nothing left to play.
    Exhausted,
}

impl QueueEvent {
    fn description(&self) -> &str {
        match self {
            QueueEvent::Built { .. } => "Play order built",
            QueueEvent::Advanced { .. } => "Queue cursor moved",
            QueueEvent::LoopModeChanged { .. } => "Loop mode changed",
            QueueEvent::ShuffleChanged { .. } => "Shuffle toggled",
            QueueEvent::Exhausted => "Queue exhausted",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Broadcast channel shared by every publisher in the core.
///
/// Cloning the bus clones the sender. Sends never block; a subscriber that
/// falls more than the buffer size behind gets `RecvError::Lagged`.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus with the specified buffer size.
    ///
    /// When a subscriber falls behind by more than `capacity` events it
    /// receives a `RecvError::Lagged` error.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an error
    /// if there are no active subscribers.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
