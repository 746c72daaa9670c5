//! Steering Queue
//!
//! A bounded priority queue that sits between any number of producers and
//! the single consumer feeding a conversation session.
//!
//! # Ordering
//!
//! ```text
//!   put(LOW #0) ─┐
//!   put(URGENT #1) ─┼──▶ [ URGENT #1 | NORMAL #2 | LOW #0 | SHUTDOWN ] ──▶ get()
//!   put(NORMAL #2) ─┘          served left to right
//! ```
//!
//! Higher priority is served first; within one priority the lower sequence
//! number (earlier admission) wins. The terminal marker
//! ([`QueueItem::Shutdown`]) always sorts last, so every message queued before
//! shutdown is served before the consumer stops.
//!
//! # Backpressure
//!
//! `put` never waits. When the queue holds `max_depth` items it fails with
//! [`SteeringError::QueueFull`](crate::SteeringError::QueueFull) and the
//! producer decides whether to retry, drop, or report.

mod item;
mod message_queue;
mod sequencer;

pub use item::{service_order, QueueItem};
pub use message_queue::{MessageQueue, DEFAULT_MAX_DEPTH};
pub use sequencer::Sequencer;
