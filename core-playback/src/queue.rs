//! # Queue Manager
//!
//! Resolves a catalog list into a play order: a permutation of the list's
//! indices plus a cursor.
//!
//! - Sequential orders rotate `[0..N)` so the chosen item comes first and the
//!   items before it follow at the end.
//! - Shuffled orders are a uniform permutation with the chosen item swapped to
//!   the head.
//!
//! Toggling shuffle always derives a fresh order; an existing order is never
//! partially reshuffled.

use crate::error::{PlaybackError, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::debug;

/// Play order over a catalog list.
///
/// # Examples
///
/// ```
/// use core_playback::QueueManager;
///
/// let mut queue = QueueManager::new(None);
/// queue.build(4, 2, false).unwrap();
/// assert_eq!(queue.order(), &[2, 3, 0, 1]);
/// assert_eq!(queue.current(), Some(2));
/// assert!(queue.advance());
/// assert_eq!(queue.current(), Some(3));
/// ```
#[derive(Debug)]
pub struct QueueManager {
    order: Vec<usize>,
    cursor: usize,
    shuffled: bool,
    rng: StdRng,
}

impl QueueManager {
    /// Create an empty queue. A seed makes shuffled orders reproducible.
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            order: Vec::new(),
            cursor: 0,
            shuffled: false,
            rng,
        }
    }

    /// Build a play order over `len` items starting at `start_index`.
    ///
    /// # Errors
    ///
    /// - `EmptyQueue` when `len` is zero
    /// - `InvalidQueueIndex` when `start_index >= len`
    ///
    /// The existing order is left untouched on error.
    pub fn build(&mut self, len: usize, start_index: usize, shuffled: bool) -> Result<()> {
        if len == 0 {
            return Err(PlaybackError::EmptyQueue);
        }
        if start_index >= len {
            return Err(PlaybackError::InvalidQueueIndex {
                index: start_index,
                len,
            });
        }

        let mut order: Vec<usize> = (0..len).collect();
        if shuffled {
            order.shuffle(&mut self.rng);
            if let Some(pos) = order.iter().position(|&i| i == start_index) {
                order.swap(0, pos);
            }
        } else {
            order.rotate_left(start_index);
        }

        debug!(len, start_index, shuffled, "Play order built");
        self.order = order;
        self.cursor = 0;
        self.shuffled = shuffled;
        Ok(())
    }

    /// Rebuild with a new shuffle flag, keeping the current item at the head.
    ///
    /// No-op on an empty queue.
    pub fn reshuffle(&mut self, shuffled: bool) -> Result<()> {
        match self.current() {
            Some(current) => self.build(self.order.len(), current, shuffled),
            None => {
                self.shuffled = shuffled;
                Ok(())
            }
        }
    }

    /// Catalog index under the cursor.
    pub fn current(&self) -> Option<usize> {
        self.order.get(self.cursor).copied()
    }

    /// Move forward. Returns `false` at the last position.
    pub fn advance(&mut self) -> bool {
        if self.cursor + 1 < self.order.len() {
            self.cursor += 1;
            true
        } else {
            false
        }
    }

    /// Move back. Returns `false` at the first position.
    pub fn retreat(&mut self) -> bool {
        if self.cursor > 0 {
            self.cursor -= 1;
            true
        } else {
            false
        }
    }

    /// Move the cursor to the first position.
    pub fn rewind(&mut self) {
        self.cursor = 0;
    }

    pub fn clear(&mut self) {
        self.order.clear();
        self.cursor = 0;
    }

    /// Cursor position inside the order.
    pub fn position(&self) -> usize {
        self.cursor
    }

    pub fn order(&self) -> &[usize] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn is_at_end(&self) -> bool {
        self.order.is_empty() || self.cursor + 1 == self.order.len()
    }

    pub fn is_shuffled(&self) -> bool {
        self.shuffled
    }
}

impl Default for QueueManager {
    fn default() -> Self {
        Self::new(None)
    }
}
