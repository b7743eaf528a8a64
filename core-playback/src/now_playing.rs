//! Now-playing view model: what a player screen shows for the current track.

use crate::session::SessionStatus;
use core_library::Track;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Snapshot of the current session for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NowPlaying {
    pub track: Track,
    pub status: SessionStatus,
    /// Time handed to the hardware so far (block granularity).
    pub elapsed: Duration,
    pub duration: Duration,
    /// `elapsed / duration`, clamped to `[0, 1]`; zero when the duration is unknown.
    pub progress: f32,
}

impl NowPlaying {
    pub fn new(track: Track, status: SessionStatus, elapsed: Duration) -> Self {
        let duration = track.duration.as_duration();
        let progress = if duration.is_zero() {
            0.0
        } else {
            (elapsed.as_secs_f64() / duration.as_secs_f64()).clamp(0.0, 1.0) as f32
        };
        Self {
            track,
            status,
            elapsed,
            duration,
            progress,
        }
    }

    /// `"1:05 / 3:20"`
    pub fn clock_line(&self) -> String {
        format!(
            "{} / {}",
            format_clock(self.elapsed),
            format_clock(self.duration)
        )
    }
}

/// Render a duration as `m:ss`.
///
/// ```
/// use core_playback::format_clock;
/// use std::time::Duration;
///
/// assert_eq!(format_clock(Duration::from_secs(65)), "1:05");
/// assert_eq!(format_clock(Duration::from_millis(999)), "0:00");
/// ```
pub fn format_clock(duration: Duration) -> String {
    let secs = duration.as_secs();
    format!("{}:{:02}", secs / 60, secs % 60)
}
