//! Steering Error Types
//!
//! Only capacity exhaustion is surfaced to producers as part of normal
//! operation. Failures of individual downstream sends never appear here; they
//! stay inside the consumption task.

use thiserror::Error;

/// Errors returned by the steering queue and the conversation manager
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SteeringError {
    /// The queue is at capacity; the caller may retry, drop, or report it
    #[error("Queue full (max={max_depth})")]
    QueueFull {
        /// Capacity of the queue that rejected the message
        max_depth: usize,
    },

    /// The manager is draining its queue and does not accept new work
    #[error("Conversation manager is shutting down")]
    ShuttingDown,

    /// The consumption task could not be spawned outside a Tokio runtime
    #[error("No Tokio runtime available to run the consumption task")]
    NoRuntime,
}

impl SteeringError {
    /// Whether this error signals backpressure
    #[must_use]
    pub fn is_queue_full(&self) -> bool {
        matches!(self, Self::QueueFull { .. })
    }
}

/// Result alias for steering operations
pub type Result<T> = std::result::Result<T, SteeringError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_full_message() {
        let err = SteeringError::QueueFull { max_depth: 2 };
        assert_eq!(err.to_string(), "Queue full (max=2)");
        assert!(err.is_queue_full());
    }

    #[test]
    fn test_other_variants_are_not_backpressure() {
        assert!(!SteeringError::ShuttingDown.is_queue_full());
        assert!(!SteeringError::NoRuntime.is_queue_full());
    }
}
