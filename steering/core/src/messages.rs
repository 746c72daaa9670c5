//! Queued Message Types
//!
//! The data carried from a producer through the queue to the session:
//! identifiers, attachments, and the [`QueuedMessage`] itself.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::priority::Priority;

/// Caller-supplied metadata, merged verbatim into outgoing records
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Request identifier, visible to the caller that queued the message
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(pub String);

impl RequestId {
    /// Create a request ID from a string
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The `req-<n>` form used for generated IDs
    #[must_use]
    pub fn numbered(n: u64) -> Self {
        Self(format!("req-{n}"))
    }

    /// Get the string value
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for RequestId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for RequestId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Session identifier of the conversation a message belongs to
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    /// Generate a new unique session ID
    #[must_use]
    pub fn new() -> Self {
        Self(format!("session_{}", Uuid::new_v4().simple()))
    }

    /// Get the string value
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SessionId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for SessionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// What an attachment points at
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentKind {
    /// A single file
    File,
    /// A directory tree
    Directory,
}

/// File or directory attached to a prompt
///
/// The steering core never inspects attachments; they are handed to the
/// session exactly as queued.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    /// Attachment kind
    #[serde(rename = "type")]
    pub kind: AttachmentKind,
    /// Path on the machine running the session
    pub path: String,
    /// Optional label shown instead of the path
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

impl Attachment {
    /// Attach a file
    pub fn file(path: impl Into<String>) -> Self {
        Self {
            kind: AttachmentKind::File,
            path: path.into(),
            display_name: None,
        }
    }

    /// Attach a directory
    pub fn directory(path: impl Into<String>) -> Self {
        Self {
            kind: AttachmentKind::Directory,
            path: path.into(),
            display_name: None,
        }
    }

    /// Set the display name
    #[must_use]
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }
}

/// A message waiting in the steering queue
#[derive(Clone, Debug)]
pub struct QueuedMessage {
    /// Caller-visible request identifier
    pub request_id: RequestId,
    /// Prompt text
    pub content: String,
    /// Service priority
    pub priority: Priority,
    /// Conversation this message belongs to
    pub session_id: SessionId,
    /// When the message was queued
    pub queued_at: DateTime<Utc>,
    /// Extra metadata for the outgoing record
    pub metadata: Metadata,
    /// File or directory attachments
    pub attachments: Vec<Attachment>,
    /// FIFO tie-break, assigned when the queue admits the message
    sequence_number: u64,
}

impl QueuedMessage {
    /// Create a message stamped with the current time
    pub fn new(
        request_id: impl Into<RequestId>,
        content: impl Into<String>,
        priority: Priority,
        session_id: SessionId,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            content: content.into(),
            priority,
            session_id,
            queued_at: Utc::now(),
            metadata: Metadata::new(),
            attachments: Vec::new(),
            sequence_number: 0,
        }
    }

    /// Set metadata
    #[must_use]
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Set attachments
    #[must_use]
    pub fn with_attachments(mut self, attachments: Vec<Attachment>) -> Self {
        self.attachments = attachments;
        self
    }

    /// Sequence number assigned by the queue (0 until admitted)
    #[must_use]
    pub fn sequence_number(&self) -> u64 {
        self.sequence_number
    }

    pub(crate) fn assign_sequence(&mut self, sequence: u64) {
        self.sequence_number = sequence;
    }
}
