//! Streaming Input Implementation
//!
//! Turns queue removals into a one-shot sequence of [`UserRecord`]s.

use std::sync::Arc;

use futures::Stream;

use super::record::UserRecord;
use crate::queue::{MessageQueue, QueueItem};

/// Sequential reader over a [`MessageQueue`] for a single consumer
///
/// Yields one record per queued message in service order and ends at the
/// terminal marker. Once ended it stays ended: build a new queue and a new
/// `StreamingInput` to start over.
pub struct StreamingInput {
    queue: Arc<MessageQueue>,
    finished: bool,
    records_yielded: u64,
}

impl StreamingInput {
    /// Create a reader over the given queue
    #[must_use]
    pub fn new(queue: Arc<MessageQueue>) -> Self {
        Self {
            queue,
            finished: false,
            records_yielded: 0,
        }
    }

    /// Whether the terminal marker has been seen
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Records produced so far
    #[must_use]
    pub fn records_yielded(&self) -> u64 {
        self.records_yielded
    }

    /// The queue being read
    #[must_use]
    pub fn queue(&self) -> &Arc<MessageQueue> {
        &self.queue
    }

    /// Wait for the next record
    ///
    /// Returns `None` at the terminal marker and on every call after it,
    /// without touching the queue again.
    pub async fn next_record(&mut self) -> Option<UserRecord> {
        if self.finished {
            return None;
        }

        match self.queue.get().await {
            QueueItem::Message(message) => {
                self.records_yielded += 1;
                Some(UserRecord::from(*message))
            }
            QueueItem::Shutdown => {
                self.finished = true;
                tracing::debug!(
                    records = self.records_yielded,
                    "Streaming input reached terminal marker"
                );
                None
            }
        }
    }

    /// Consume the reader as a [`Stream`]
    pub fn into_stream(self) -> impl Stream<Item = UserRecord> + Send {
        futures::stream::unfold(self, |mut input| async move {
            let record = input.next_record().await?;
            Some((record, input))
        })
    }
}

impl std::fmt::Debug for StreamingInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamingInput")
            .field("finished", &self.finished)
            .field("records_yielded", &self.records_yielded)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::{Attachment, QueuedMessage};
    use crate::priority::Priority;
    use futures::StreamExt;
    use std::time::Duration;

    fn msg(id: &str, content: &str, priority: Priority) -> QueuedMessage {
        QueuedMessage::new(id, content, priority, "test-session".into())
    }

    #[tokio::test]
    async fn test_yields_messages() {
        let queue = Arc::new(MessageQueue::new(10));
        let message =
            msg("req-1", "Hello", Priority::Normal).with_attachments(vec![Attachment::file("/x")]);
        queue.put(message).unwrap();
        queue.signal_shutdown();

        let mut input = StreamingInput::new(Arc::clone(&queue));
        let record = input.next_record().await.unwrap();

        assert_eq!(record.content(), "Hello");
        assert_eq!(record.request_id(), Some("req-1"));
        assert_eq!(record.metadata["priority"], "NORMAL");
        assert_eq!(record.metadata["session_id"], "test-session");
        assert!(record.metadata.contains_key("queued_at"));
        assert_eq!(record.attachments, vec![Attachment::file("/x")]);

        assert!(input.next_record().await.is_none());
        assert!(input.is_finished());
        assert_eq!(input.records_yielded(), 1);
    }

    #[tokio::test]
    async fn test_stops_on_shutdown() {
        let queue = Arc::new(MessageQueue::new(10));
        let mut input = StreamingInput::new(Arc::clone(&queue));

        let producer = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                queue.signal_shutdown();
            })
        };

        let result = tokio::time::timeout(Duration::from_secs(1), input.next_record())
            .await
            .expect("input should end after shutdown");
        assert!(result.is_none());
        producer.await.unwrap();
    }

    #[tokio::test]
    async fn test_not_restartable() {
        let queue = Arc::new(MessageQueue::new(10));
        queue.signal_shutdown();

        let mut input = StreamingInput::new(Arc::clone(&queue));
        assert!(input.next_record().await.is_none());

        // Anything queued afterwards stays in the queue
        queue.put(msg("late", "late", Priority::Urgent)).unwrap();
        assert!(input.next_record().await.is_none());
        assert_eq!(queue.len(), 1);
    }

    #[tokio::test]
    async fn test_priority_order_preserved() {
        let queue = Arc::new(MessageQueue::new(10));
        queue.put(msg("1", "low", Priority::Low)).unwrap();
        queue.put(msg("2", "urgent", Priority::Urgent)).unwrap();
        queue.put(msg("3", "high", Priority::High)).unwrap();
        queue.put(msg("4", "normal", Priority::Normal)).unwrap();
        queue.signal_shutdown();

        let contents: Vec<String> = StreamingInput::new(queue)
            .into_stream()
            .map(|record| record.message.content)
            .collect()
            .await;

        assert_eq!(contents, vec!["urgent", "high", "normal", "low"]);
    }
}
