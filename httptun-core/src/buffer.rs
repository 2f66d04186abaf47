//! Adaptive read-chunk sizing for the TCP read loops.
//!
//! The read loop asks the socket for `current()` bytes each iteration. When a
//! read fills the buffer completely, traffic looks bursty and the next
//! request grows; when a read comes back much smaller than the buffer,
//! traffic looks bursty-small and the buffer shrinks back down. This keeps
//! small interactive sessions cheap while letting bulk transfers ramp up.

use httptun_common::constants::{BUFFER_GROWTH_FACTOR, INITIAL_BUFFER_SIZE, MAX_BUFFER_SIZE};

/// Tracks the current read-chunk size for one TCP connection.
#[derive(Debug, Clone, Copy)]
pub struct AdaptiveBuffer {
    size: usize,
}

impl AdaptiveBuffer {
    pub fn new() -> Self {
        Self {
            size: INITIAL_BUFFER_SIZE,
        }
    }

    /// Resume tracking at a previously recorded size, e.g. when a `Session`
    /// carries its buffer size across read-loop iterations.
    pub fn with_size(size: usize) -> Self {
        Self { size }
    }

    pub fn current(&self) -> usize {
        self.size
    }

    /// Feed in the number of bytes the last read actually returned and
    /// recompute the size for the next read.
    ///
    /// Grows when the read filled the buffer exactly (`n == size`), capped at
    /// `MAX_BUFFER_SIZE`. Shrinks when the read returned less than
    /// `size / (BUFFER_GROWTH_FACTOR * 2)`, floored at `INITIAL_BUFFER_SIZE`.
    /// Otherwise the size is left unchanged.
    pub fn record_read(&mut self, n: usize) {
        if n == self.size {
            self.size = (self.size * BUFFER_GROWTH_FACTOR).min(MAX_BUFFER_SIZE);
        } else if self.size > INITIAL_BUFFER_SIZE && n < self.size / (BUFFER_GROWTH_FACTOR * 2) {
            self.size = (self.size / BUFFER_GROWTH_FACTOR).max(INITIAL_BUFFER_SIZE);
        }
    }
}

impl Default for AdaptiveBuffer {
    fn default() -> Self {
        Self::new()
    }
}
