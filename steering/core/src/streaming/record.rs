//! Normalized user records handed to the session

use serde::Serialize;

use crate::messages::{Attachment, Metadata, QueuedMessage};
use crate::session::SendRequest;

/// Record type tag
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordType {
    /// Input from the user side of the conversation
    User,
}

/// Who authored the message content
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// User input
    User,
}

/// Message body of a record
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RecordMessage {
    /// Always [`MessageRole::User`]
    pub role: MessageRole,
    /// Prompt text
    pub content: String,
}

/// A queued message in the shape the session consumes
///
/// Serializes as:
///
/// ```json
/// {
///   "type": "user",
///   "message": { "role": "user", "content": "..." },
///   "metadata": { "request_id": "...", "priority": "NORMAL", "session_id": "...",
///                 "queued_at": "2024-01-01T00:00:00+00:00", "...": "caller metadata" },
///   "attachments": []
/// }
/// ```
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct UserRecord {
    /// Record type tag
    #[serde(rename = "type")]
    pub kind: RecordType,
    /// Role and content
    pub message: RecordMessage,
    /// Reserved keys followed by caller metadata
    pub metadata: Metadata,
    /// Attachments, untouched
    pub attachments: Vec<Attachment>,
}

impl UserRecord {
    /// Prompt text
    #[must_use]
    pub fn content(&self) -> &str {
        &self.message.content
    }

    /// The `request_id` metadata entry, if it is a string
    #[must_use]
    pub fn request_id(&self) -> Option<&str> {
        self.metadata.get("request_id").and_then(|v| v.as_str())
    }

    /// Build the request forwarded to the session
    ///
    /// An empty attachment list is sent as absent.
    #[must_use]
    pub fn to_send_request(&self) -> SendRequest {
        SendRequest {
            prompt: self.message.content.clone(),
            attachments: (!self.attachments.is_empty()).then(|| self.attachments.clone()),
        }
    }
}

impl From<QueuedMessage> for UserRecord {
    fn from(message: QueuedMessage) -> Self {
        let mut metadata = Metadata::new();
        metadata.insert("request_id".into(), message.request_id.0.into());
        metadata.insert("priority".into(), message.priority.as_str().into());
        metadata.insert("session_id".into(), message.session_id.0.into());
        metadata.insert("queued_at".into(), message.queued_at.to_rfc3339().into());
        // Caller entries win on collision
        metadata.extend(message.metadata);

        Self {
            kind: RecordType::User,
            message: RecordMessage {
                role: MessageRole::User,
                content: message.content,
            },
            metadata,
            attachments: message.attachments,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::Attachment;
    use crate::priority::Priority;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn message() -> QueuedMessage {
        let mut message = QueuedMessage::new("req-7", "Hello", Priority::High, "sess-1".into());
        message.queued_at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap();
        message
    }

    #[test]
    fn test_record_shape() {
        let record = UserRecord::from(message().with_attachments(vec![Attachment::file("/a.rs")]));

        assert_eq!(
            serde_json::to_value(&record).unwrap(),
            json!({
                "type": "user",
                "message": {"role": "user", "content": "Hello"},
                "metadata": {
                    "request_id": "req-7",
                    "priority": "HIGH",
                    "session_id": "sess-1",
                    "queued_at": "2024-05-01T12:30:00+00:00"
                },
                "attachments": [{"type": "file", "path": "/a.rs"}]
            })
        );
    }

    #[test]
    fn test_caller_metadata_merged_and_wins() {
        let mut metadata = Metadata::new();
        metadata.insert("source".into(), json!("ide"));
        metadata.insert("priority".into(), json!("custom"));

        let record = UserRecord::from(message().with_metadata(metadata));
        assert_eq!(record.metadata["source"], json!("ide"));
        assert_eq!(record.metadata["priority"], json!("custom"));
        assert_eq!(record.request_id(), Some("req-7"));
    }

    #[test]
    fn test_send_request_omits_empty_attachments() {
        let record = UserRecord::from(message());
        let request = record.to_send_request();
        assert_eq!(request.prompt, "Hello");
        assert_eq!(request.attachments, None);

        let with_files =
            UserRecord::from(message().with_attachments(vec![Attachment::directory("/src")]));
        assert_eq!(
            with_files.to_send_request().attachments,
            Some(vec![Attachment::directory("/src")])
        );
    }
}
