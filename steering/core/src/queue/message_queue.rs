//! Bounded priority queue with in-band shutdown

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use parking_lot::Mutex;
use tokio::sync::Notify;

use super::item::QueueItem;
use super::sequencer::Sequencer;
use crate::error::{Result, SteeringError};
use crate::messages::QueuedMessage;

/// Default capacity, matching the conversation manager default
pub const DEFAULT_MAX_DEPTH: usize = 100;

struct QueueState {
    /// Min-heap in service order
    heap: BinaryHeap<Reverse<QueueItem>>,
    /// Set once, never cleared
    shutdown: bool,
}

/// Bounded priority queue for conversation messages
///
/// `put` never waits: it either admits the message or fails with
/// [`SteeringError::QueueFull`]. `get` waits until an item is available.
/// Safe to share between any number of producers and one consumer.
pub struct MessageQueue {
    max_depth: usize,
    state: Mutex<QueueState>,
    sequencer: Sequencer,
    available: Notify,
}

impl Default for MessageQueue {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DEPTH)
    }
}

impl MessageQueue {
    /// Create a queue holding at most `max_depth` items
    ///
    /// Every queue is bounded. A `max_depth` of 0 is raised to 1 instead of
    /// meaning "unbounded"; [`SteeringConfig::validate`](crate::SteeringConfig::validate)
    /// rejects 0 before it gets here.
    #[must_use]
    pub fn new(max_depth: usize) -> Self {
        let max_depth = max_depth.max(1);
        Self {
            max_depth,
            state: Mutex::new(QueueState {
                heap: BinaryHeap::with_capacity(max_depth.min(DEFAULT_MAX_DEPTH) + 1),
                shutdown: false,
            }),
            sequencer: Sequencer::new(),
            available: Notify::new(),
        }
    }

    /// Maximum queue capacity
    #[must_use]
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Number of items currently held (the terminal marker included)
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().heap.len()
    }

    /// Whether the queue holds nothing
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.lock().heap.is_empty()
    }

    /// Whether the next `put` would be rejected
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.len() >= self.max_depth
    }

    /// Whether shutdown has been signaled
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.state.lock().shutdown
    }

    /// Admit a message, returning its sequence number
    ///
    /// # Errors
    ///
    /// Returns [`SteeringError::QueueFull`] when the queue is at capacity.
    pub fn put(&self, mut message: QueuedMessage) -> Result<u64> {
        let sequence = {
            let mut state = self.state.lock();
            if state.heap.len() >= self.max_depth {
                tracing::debug!(
                    request_id = %message.request_id,
                    max_depth = self.max_depth,
                    "Queue full, rejecting message"
                );
                return Err(SteeringError::QueueFull {
                    max_depth: self.max_depth,
                });
            }

            let sequence = self.sequencer.next();
            message.assign_sequence(sequence);
            tracing::trace!(
                request_id = %message.request_id,
                priority = %message.priority,
                sequence,
                depth = state.heap.len() + 1,
                "Message queued"
            );
            state.heap.push(Reverse(message.into()));
            sequence
        };

        self.available.notify_one();
        Ok(sequence)
    }

    /// Remove the next item in service order, waiting until one exists
    pub async fn get(&self) -> QueueItem {
        loop {
            if let Some(item) = self.try_get() {
                return item;
            }
            self.available.notified().await;
        }
    }

    /// Remove the next item in service order without waiting
    pub fn try_get(&self) -> Option<QueueItem> {
        self.state.lock().heap.pop().map(|Reverse(item)| item)
    }

    /// Signal the consumer to finish once every queued message is served
    ///
    /// Inserts a single terminal marker on the first call; later calls do
    /// nothing. The marker is admitted even when the queue is full, so the
    /// consumer always sees it after draining.
    pub fn signal_shutdown(&self) {
        {
            let mut state = self.state.lock();
            if state.shutdown {
                return;
            }
            state.shutdown = true;
            if state.heap.len() >= self.max_depth {
                tracing::debug!(
                    depth = state.heap.len(),
                    max_depth = self.max_depth,
                    "Queue full at shutdown, admitting terminal marker past capacity"
                );
            }
            state.heap.push(Reverse(QueueItem::SHUTDOWN));
        }

        self.available.notify_one();
    }

    /// Discard every queued message, keeping a pending terminal marker
    ///
    /// Returns the number of messages discarded.
    pub fn clear(&self) -> usize {
        let mut state = self.state.lock();
        let before = state.heap.len();
        state.heap.retain(|Reverse(item)| item.is_shutdown());
        before - state.heap.len()
    }
}

impl std::fmt::Debug for MessageQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("MessageQueue")
            .field("max_depth", &self.max_depth)
            .field("len", &state.heap.len())
            .field("shutdown", &state.shutdown)
            .field("sequences_issued", &self.sequencer.issued())
            .finish()
    }
}
