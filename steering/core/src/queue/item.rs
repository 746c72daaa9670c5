//! Queue items and their service order

use std::cmp::Ordering;

use crate::messages::QueuedMessage;

/// An entry in the steering queue
///
/// `Shutdown` is the terminal marker: it carries nothing and is always served
/// after every message.
#[derive(Clone, Debug)]
pub enum QueueItem {
    /// A message waiting to be sent
    Message(Box<QueuedMessage>),
    /// End of the stream
    Shutdown,
}

impl QueueItem {
    /// The terminal marker
    pub const SHUTDOWN: QueueItem = QueueItem::Shutdown;

    /// Whether this is the terminal marker
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        matches!(self, Self::Shutdown)
    }

    /// The message, if this is one
    #[must_use]
    pub fn into_message(self) -> Option<QueuedMessage> {
        match self {
            Self::Message(message) => Some(*message),
            Self::Shutdown => None,
        }
    }
}

impl From<QueuedMessage> for QueueItem {
    fn from(message: QueuedMessage) -> Self {
        Self::Message(Box::new(message))
    }
}

/// Service order of two queue items
///
/// `Less` means `a` is served before `b`: higher priority first, then lower
/// sequence number. The terminal marker is greater than every message and
/// equal only to itself.
#[must_use]
pub fn service_order(a: &QueueItem, b: &QueueItem) -> Ordering {
    match (a, b) {
        (QueueItem::Message(a), QueueItem::Message(b)) => b
            .priority
            .cmp(&a.priority)
            .then_with(|| a.sequence_number().cmp(&b.sequence_number())),
        (QueueItem::Message(_), QueueItem::Shutdown) => Ordering::Less,
        (QueueItem::Shutdown, QueueItem::Message(_)) => Ordering::Greater,
        (QueueItem::Shutdown, QueueItem::Shutdown) => Ordering::Equal,
    }
}

impl PartialEq for QueueItem {
    fn eq(&self, other: &Self) -> bool {
        service_order(self, other) == Ordering::Equal
    }
}

impl Eq for QueueItem {}

impl PartialOrd for QueueItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueItem {
    fn cmp(&self, other: &Self) -> Ordering {
        service_order(self, other)
    }
}
