//! # Transition Controller
//!
//! Decides what plays after a session ends or the user skips.

use crate::queue::QueueManager;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

/// Repeat policy at track and queue boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoopMode {
    #[default]
    Off,
    /// Wrap to the first queue entry after the last.
    All,
    /// Replay the current track when it finishes.
    One,
}

impl LoopMode {
    /// Next mode in the user toggle cycle: Off → All → One → Off.
    pub fn cycle(self) -> Self {
        match self {
            LoopMode::Off => LoopMode::All,
            LoopMode::All => LoopMode::One,
            LoopMode::One => LoopMode::Off,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LoopMode::Off => "off",
            LoopMode::All => "all",
            LoopMode::One => "one",
        }
    }
}

impl fmt::Display for LoopMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LoopMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "off" => Ok(LoopMode::Off),
            "all" => Ok(LoopMode::All),
            "one" => Ok(LoopMode::One),
            other => Err(format!("unknown loop mode: {}", other)),
        }
    }
}

/// How a session ended, as seen by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terminal {
    Finished,
    Failed,
}

/// Decision returned to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Start the track at this catalog index; the cursor moved.
    Play(usize),
    /// Start the same catalog index again from the beginning.
    Restart(usize),
    /// Nothing left to play.
    Stop,
}

/// Loop policy, restart threshold and the consecutive failure count.
#[derive(Debug, Clone)]
pub struct TransitionController {
    loop_mode: LoopMode,
    restart_threshold: Duration,
    consecutive_failures: usize,
}

impl TransitionController {
    pub fn new(restart_threshold: Duration) -> Self {
        Self {
            loop_mode: LoopMode::Off,
            restart_threshold,
            consecutive_failures: 0,
        }
    }

    pub fn loop_mode(&self) -> LoopMode {
        self.loop_mode
    }

    pub fn set_loop_mode(&mut self, mode: LoopMode) {
        self.loop_mode = mode;
    }

    pub fn restart_threshold(&self) -> Duration {
        self.restart_threshold
    }

    pub fn consecutive_failures(&self) -> usize {
        self.consecutive_failures
    }

    /// Forget past failures, e.g. after the user picked a new list.
    pub fn reset_failures(&mut self) {
        self.consecutive_failures = 0;
    }

    /// Decide what follows a session that ended on its own.
    ///
    /// A failure never replays under `Loop=One`; it moves on like a finish.
    /// Once every queue entry has failed in a row, playback stops.
    pub fn on_terminal(&mut self, terminal: Terminal, queue: &mut QueueManager) -> Transition {
        let Some(current) = queue.current() else {
            return Transition::Stop;
        };

        match terminal {
            Terminal::Finished => {
                self.consecutive_failures = 0;
                if self.loop_mode == LoopMode::One {
                    return Transition::Restart(current);
                }
            }
            Terminal::Failed => {
                self.consecutive_failures += 1;
                if self.consecutive_failures >= queue.len() {
                    debug!(
                        failures = self.consecutive_failures,
                        "Every queue entry failed, stopping"
                    );
                    return Transition::Stop;
                }
            }
        }

        self.step_forward(queue)
    }

    /// Explicit skip forward. Ignores `Loop=One`; wraps only under `Loop=All`.
    pub fn next(&mut self, queue: &mut QueueManager) -> Transition {
        self.consecutive_failures = 0;
        if queue.is_empty() {
            return Transition::Stop;
        }
        self.step_forward(queue)
    }

    /// Explicit skip back.
    ///
    /// Past the restart threshold the current track restarts. Below it the
    /// cursor moves back one entry; at the head the current track restarts.
    pub fn previous(&mut self, queue: &mut QueueManager, elapsed: Duration) -> Transition {
        self.consecutive_failures = 0;
        let Some(current) = queue.current() else {
            return Transition::Stop;
        };

        if elapsed > self.restart_threshold {
            return Transition::Restart(current);
        }
        if queue.retreat() {
            match queue.current() {
                Some(index) => Transition::Play(index),
                None => Transition::Stop,
            }
        } else {
            Transition::Restart(current)
        }
    }

    fn step_forward(&self, queue: &mut QueueManager) -> Transition {
        if queue.advance() {
            return queue.current().map_or(Transition::Stop, Transition::Play);
        }
        if self.loop_mode == LoopMode::All {
            queue.rewind();
            return queue.current().map_or(Transition::Stop, Transition::Play);
        }
        Transition::Stop
    }
}

impl Default for TransitionController {
    fn default() -> Self {
        Self::new(Duration::from_secs(3))
    }
}
