//! FIFO tie-break counter

use std::sync::atomic::{AtomicU64, Ordering};

/// Hands out strictly increasing sequence numbers, starting at 0
///
/// Each [`MessageQueue`](super::MessageQueue) owns one; a new queue starts
/// counting from zero again.
#[derive(Debug, Default)]
pub struct Sequencer {
    next: AtomicU64,
}

impl Sequencer {
    /// Create a sequencer starting at 0
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the next sequence number
    pub fn next(&self) -> u64 {
        self.next.fetch_add(1, Ordering::SeqCst)
    }

    /// How many numbers have been issued
    #[must_use]
    pub fn issued(&self) -> u64 {
        self.next.load(Ordering::SeqCst)
    }
}
